//! Candidate sources for wordlist assembly.
//!
//! A source enumerates fixed-width digit strings in a deterministic order and
//! can report its output size without generating anything.

mod dates;
mod range;

pub use dates::{DateIter, DateSource};
pub use range::{
    CrunchGenerator, DirectGenerator, FallbackGenerator, GenerateError, NumericRangeSpec,
    RangeGenerator, RangeSource, MAX_WIDTH, PROGRESS_INTERVAL,
};

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::progress::Progress;

/// Callback receiving each candidate. Returning an error stops the source.
pub type Sink<'a> = dyn FnMut(&str) -> Result<()> + 'a;

/// Source trait for generating password candidates
pub trait Source: Send + Sync {
    /// Human-readable label, e.g. `DDMMYYYY Buddhist 2000-2030`
    fn name(&self) -> String;

    /// Width of every candidate in characters
    fn width(&self) -> usize;

    /// Exact number of candidates, computed from parameters alone
    fn count(&self) -> u64;

    /// Feed every candidate, in order, into `sink`
    fn emit(&self, sink: &mut Sink<'_>, progress: &dyn Progress, cancel: &CancelToken) -> Result<u64>;

    /// Bytes this source occupies in a newline-delimited file, saturating at `u64::MAX`
    fn byte_estimate(&self) -> u64 {
        self.count().saturating_mul(self.width() as u64 + 1)
    }
}

/// Available source types
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceType {
    Gregorian,
    Buddhist,
    Numbers,
}
