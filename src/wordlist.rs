//! Wordlist assembly - run sources in order into one newline-delimited sink.
//!
//! Dedup across sources is opt-in per source. `Track` sources are filtered
//! against everything tracked so far and then added to the set. `Probe`
//! sources are only filtered, so a 100M-entry numeric pass does not grow the
//! set.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::calendar::{CalendarOffset, SerializationFormat, YearRange};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::progress::Progress;
use crate::source::{CrunchGenerator, DateSource, NumericRangeSpec, RangeSource, Source};

/// Entries written between two cancellation checks.
pub const CANCEL_CHECK_INTERVAL: u64 = 10_000;

/// Cross-source deduplication policy of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dedup {
    /// Write everything the source emits
    Off,
    /// Skip entries already tracked, then track what was written
    Track,
    /// Skip entries already tracked, track nothing
    Probe,
}

struct Task {
    source: Box<dyn Source>,
    dedup: Dedup,
}

/// Ordered list of sources targeting one sink.
#[derive(Default)]
pub struct WordlistJob {
    tasks: Vec<Task>,
}

/// Pre-generation size of one task (before dedup).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEstimate {
    pub name: String,
    pub entries: u64,
    pub bytes: u64,
}

/// Pre-generation size of a whole job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobEstimate {
    pub tasks: Vec<TaskEstimate>,
    pub entries: u64,
    pub bytes: u64,
}

impl JobEstimate {
    pub fn human_size(&self) -> String {
        format_size(self.bytes)
    }
}

/// What one task actually wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStats {
    pub name: String,
    pub emitted: u64,
    pub written: u64,
}

/// Result of a completed assembly.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssembleStats {
    pub tasks: Vec<TaskStats>,
    pub entries_written: u64,
    pub bytes_written: u64,
    pub duplicates_skipped: u64,
}

impl WordlistJob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: impl Source + 'static, dedup: Dedup) -> &mut Self {
        self.tasks.push(Task { source: Box::new(source), dedup });
        self
    }

    pub fn with(mut self, source: impl Source + 'static, dedup: Dedup) -> Self {
        self.push(source, dedup);
        self
    }

    /// Gregorian dates, Buddhist dates, then every 8-digit number.
    ///
    /// Date passes are tracked so the Buddhist pass drops exact repeats of the
    /// Gregorian one; the numeric pass only probes.
    pub fn comprehensive(range: YearRange, formats: &[SerializationFormat], crunch: Option<CrunchGenerator>) -> Result<Self> {
        if formats.is_empty() {
            return Err(Error::invalid("at least one date format is required"));
        }

        let mut job = Self::new();
        for offset in [CalendarOffset::GREGORIAN, CalendarOffset::BUDDHIST] {
            for &format in formats {
                job.push(DateSource::new(range, format, offset)?, Dedup::Track);
            }
        }

        let spec = NumericRangeSpec::full(8)?;
        let numbers = match crunch {
            Some(crunch) => RangeSource::with_crunch(spec, crunch),
            None => RangeSource::new(spec),
        };
        job.push(numbers, Dedup::Probe);
        Ok(job)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task_names(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.source.name()).collect()
    }

    /// Upper-bound entry and byte counts, computed without generating or touching disk.
    pub fn estimate(&self) -> JobEstimate {
        let tasks: Vec<TaskEstimate> = self
            .tasks
            .iter()
            .map(|t| TaskEstimate {
                name: t.source.name(),
                entries: t.source.count(),
                bytes: t.source.byte_estimate(),
            })
            .collect();

        JobEstimate {
            entries: tasks.iter().fold(0u64, |acc, t| acc.saturating_add(t.entries)),
            bytes: tasks.iter().fold(0u64, |acc, t| acc.saturating_add(t.bytes)),
            tasks,
        }
    }

    /// Assemble into `out`.
    ///
    /// On cancellation this returns [`Error::Cancelled`] after the current
    /// batch; the partially written sink is left for the caller to discard.
    pub fn write_to<W: Write>(&self, out: W, progress: &dyn Progress, cancel: &CancelToken) -> Result<AssembleStats> {
        let mut out = BufWriter::new(out);
        let estimate = self.estimate();
        let total = estimate.entries.max(1) as f64;

        let mut seen: HashSet<String> = HashSet::new();
        let mut stats = AssembleStats::default();
        let mut done_before = 0u64;
        let mut checked = 0u64;

        for (task, task_estimate) in self.tasks.iter().zip(&estimate.tasks) {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let name = task.source.name();
            info!(source = %name, entries = task_estimate.entries, dedup = ?task.dedup, "assembling source");

            let mut written = 0u64;
            let mut skipped = 0u64;
            let mut bytes = 0u64;
            let dedup = task.dedup;

            let scaled = ScaledProgress {
                inner: progress,
                offset: done_before as f64 / total * 100.0,
                share: task_estimate.entries as f64 / total,
            };

            let emitted = task.source.emit(
                &mut |entry: &str| {
                    checked += 1;
                    if checked % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                        return Err(Error::Cancelled);
                    }

                    let keep = match dedup {
                        Dedup::Off => true,
                        Dedup::Probe => !seen.contains(entry),
                        Dedup::Track => {
                            if seen.contains(entry) {
                                false
                            } else {
                                seen.insert(entry.to_string());
                                true
                            }
                        }
                    };

                    if !keep {
                        skipped += 1;
                        return Ok(());
                    }

                    out.write_all(entry.as_bytes())?;
                    out.write_all(b"\n")?;
                    written += 1;
                    bytes += entry.len() as u64 + 1;
                    Ok(())
                },
                &scaled,
                cancel,
            )?;

            debug!(source = %name, emitted, written, skipped, "source done");
            stats.entries_written += written;
            stats.bytes_written += bytes;
            stats.duplicates_skipped += skipped;
            stats.tasks.push(TaskStats { name, emitted, written });
            done_before += task_estimate.entries;
        }

        out.flush()?;
        progress.update(100.0, &format!("Complete - {} passwords", stats.entries_written));
        Ok(stats)
    }

    /// Assemble into a new file at `path`, truncating any existing one.
    pub fn write_file(&self, path: &Path, progress: &dyn Progress, cancel: &CancelToken) -> Result<AssembleStats> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        self.write_to(file, progress, cancel)
    }
}

/// Maps a source's own 0-100 progress onto its share of the whole job.
struct ScaledProgress<'a> {
    inner: &'a dyn Progress,
    offset: f64,
    share: f64,
}

impl Progress for ScaledProgress<'_> {
    fn update(&self, percent: f64, message: &str) {
        let job_percent = (self.offset + percent.clamp(0.0, 100.0) * self.share).min(100.0);
        self.inner.update(job_percent, message);
    }
}

/// Render a byte count as `B`/`KB`/`MB`/`GB`/`TB` with one decimal.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}
