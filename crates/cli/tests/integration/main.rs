//! End-to-end runs of the shipyard binary against a throwaway project.

mod common;

mod artifacts_tests;
