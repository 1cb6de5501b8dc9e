//! Integration tests for the orchestration core.

mod common;

mod build_tests;
mod run_tests;
mod state_tests;
