//! datecrack - Date and numeric wordlist recovery for password-protected PDFs.
//!
//! Generates candidate wordlists (calendar dates in several layouts and
//! calendars, plus zero-padded numeric ranges), extracts a crackable hash with
//! `pdf2john`, and drives John the Ripper against it with progress reporting
//! and cooperative cancellation.

pub mod analysis;
pub mod calendar;
pub mod cancel;
pub mod config;
pub mod crack;
pub mod engine;
pub mod error;
pub mod extract;
pub mod process;
pub mod progress;
pub mod source;
pub mod wordlist;

pub use cancel::CancelToken;
pub use config::Config;
pub use crack::{CrackOutcome, CrackRequest, CrackState, Orchestrator};
pub use error::{Error, ErrorKind, Result};
pub use wordlist::WordlistJob;

/// Default progress bar style for CLI operations.
pub fn default_progress_style() -> indicatif::ProgressStyle {
    indicatif::ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
        .unwrap()
        .progress_chars("#>-")
}

/// Percent bar with a state prefix and a free-form message.
pub fn percent_progress_style() -> indicatif::ProgressStyle {
    indicatif::ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] {prefix:>12} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .unwrap()
        .progress_chars("#>-")
}
