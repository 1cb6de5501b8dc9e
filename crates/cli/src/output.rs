//! Terminal reporting for the `shipyard` commands.
//!
//! Text output marks each line with a colored glyph; `--output json` swaps the
//! whole report for one pretty-printed document on stdout.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

/// How a command reports its result.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

const DONE: &str = "✓";
const FAILED: &str = "✗";
const NOTE: &str = "•";
const CAUSE: &str = "→";

/// Size of an exported file, in binary units.
pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 3] = ["KB", "MB", "GB"];

  if bytes < 1024 {
    return format!("{bytes} B");
  }
  let mut size = bytes as f64 / 1024.0;
  let mut unit = 0;
  while size >= 1024.0 && unit + 1 < UNITS.len() {
    size /= 1024.0;
    unit += 1;
  }
  format!("{size:.1} {}", UNITS[unit])
}

/// Wall time of a run: milliseconds under a second, minutes past one.
pub fn format_duration(duration: Duration) -> String {
  match duration.as_secs() {
    0 => format!("{}ms", duration.subsec_millis()),
    secs @ 1..=59 => format!("{secs}.{:02}s", duration.subsec_millis() / 10),
    secs => format!("{}m {}s", secs / 60, secs % 60),
  }
}

/// One finished artifact.
pub fn print_success(message: &str) {
  println!("{} {message}", DONE.if_supports_color(Stream::Stdout, |s| s.green()));
}

/// Print an error and its full cause chain.
pub fn print_error(error: &anyhow::Error) {
  eprintln!(
    "{} {}",
    FAILED.if_supports_color(Stream::Stderr, |s| s.red()),
    error.to_string().if_supports_color(Stream::Stderr, |s| s.red())
  );
  for cause in error.chain().skip(1) {
    eprintln!("  {CAUSE} {cause}");
  }
}

pub fn print_info(message: &str) {
  println!("{} {message}", NOTE.if_supports_color(Stream::Stdout, |s| s.blue()));
}

/// Indented `label: value` detail under the preceding line.
pub fn print_stat(label: &str, value: &str) {
  println!("  {}: {value}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()));
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("failed to encode report as JSON")?;
  println!("{json}");
  Ok(())
}
