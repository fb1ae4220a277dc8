//! Range source - zero-padded decimal numbers in an inclusive range.
//!
//! Generation goes through a [`RangeGenerator`] strategy. The default tries an
//! external `crunch` binary first and falls back to direct enumeration.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use super::{Sink, Source};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::process;
use crate::progress::Progress;

/// Entries between two progress reports.
pub const PROGRESS_INTERVAL: u64 = 100_000;

/// Widest supported range; the byte estimate of `10^17` entries of 18 bytes
/// still fits in a `u64`.
pub const MAX_WIDTH: usize = 17;

/// Inclusive numeric range rendered with a fixed number of digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericRangeSpec {
    min: u64,
    max: u64,
    width: usize,
}

impl NumericRangeSpec {
    /// `max` must fit in `width` digits; wider values are rejected.
    pub fn new(min: u64, max: u64, width: usize) -> Result<Self> {
        if width == 0 || width > MAX_WIDTH {
            return Err(Error::invalid(format!(
                "digit width must be between 1 and {} (got {})",
                MAX_WIDTH, width
            )));
        }
        if min > max {
            return Err(Error::invalid(format!("range minimum {} exceeds maximum {}", min, max)));
        }
        if max >= 10u64.pow(width as u32) {
            return Err(Error::invalid(format!(
                "{} does not fit in {} digits",
                max, width
            )));
        }
        Ok(Self { min, max, width })
    }

    /// Every `width`-digit number, `0` to `10^width - 1`.
    pub fn full(width: usize) -> Result<Self> {
        if width == 0 || width > MAX_WIDTH {
            return Self::new(0, 0, width);
        }
        Self::new(0, 10u64.pow(width as u32) - 1, width)
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn count(&self) -> u64 {
        self.max - self.min + 1
    }

    pub fn render(&self, n: u64) -> String {
        format!("{:0width$}", n, width = self.width)
    }
}

impl fmt::Display for NumericRangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.render(self.min), self.render(self.max))
    }
}

/// Why a generator could not produce its output.
#[derive(Debug)]
pub enum GenerateError {
    /// Generator cannot run here (tool not installed)
    Unavailable(String),
    /// Generator ran and failed before emitting anything
    Failed(String),
    /// The sink rejected an entry; never triggers a fallback
    Sink(Error),
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::Unavailable(msg) => write!(f, "generator unavailable: {}", msg),
            GenerateError::Failed(msg) => write!(f, "generator failed: {}", msg),
            GenerateError::Sink(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for GenerateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GenerateError::Sink(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Error> for GenerateError {
    fn from(err: Error) -> Self {
        GenerateError::Sink(err)
    }
}

impl From<GenerateError> for Error {
    fn from(err: GenerateError) -> Self {
        match err {
            GenerateError::Sink(e) => e,
            GenerateError::Unavailable(msg) => Error::ToolMissing(msg),
            GenerateError::Failed(msg) => {
                Error::Io(std::io::Error::new(std::io::ErrorKind::Other, msg))
            }
        }
    }
}

/// Strategy for producing the numbers of a [`NumericRangeSpec`].
///
/// Implementations must emit exactly the same entries, in the same order.
pub trait RangeGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    fn generate(
        &self,
        spec: &NumericRangeSpec,
        sink: &mut Sink<'_>,
        progress: &dyn Progress,
        cancel: &CancelToken,
    ) -> std::result::Result<u64, GenerateError>;
}

fn report(progress: &dyn Progress, spec: &NumericRangeSpec, done: u64) {
    let percent = done as f64 / spec.count() as f64 * 100.0;
    progress.update(percent, &format!("Generated {} numbers", done));
}

/// In-process enumeration.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectGenerator;

impl RangeGenerator for DirectGenerator {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn generate(
        &self,
        spec: &NumericRangeSpec,
        sink: &mut Sink<'_>,
        progress: &dyn Progress,
        _cancel: &CancelToken,
    ) -> std::result::Result<u64, GenerateError> {
        progress.update(0.0, &format!("Generating numbers {}", spec));

        let mut buf = String::with_capacity(spec.width);
        let mut done = 0u64;
        for n in spec.min..=spec.max {
            buf.clear();
            // Writing into a String cannot fail.
            let _ = fmt::Write::write_fmt(&mut buf, format_args!("{:0width$}", n, width = spec.width));
            sink(&buf)?;
            done += 1;
            if done % PROGRESS_INTERVAL == 0 {
                report(progress, spec, done);
            }
        }

        progress.update(100.0, &format!("Number generation complete - {} numbers", done));
        Ok(done)
    }
}

/// External `crunch` run into a temp file, then streamed into the sink.
///
/// Nothing reaches the sink unless crunch exits cleanly and its output has
/// exactly the expected size, so a failure can always fall back.
#[derive(Debug, Clone)]
pub struct CrunchGenerator {
    program: Option<PathBuf>,
    temp_dir: Option<PathBuf>,
}

impl CrunchGenerator {
    /// Locate `program` now; a missing binary makes every run `Unavailable`.
    pub fn new(program: impl AsRef<Path>) -> Self {
        let program = process::find_program(program.as_ref());
        if program.is_none() {
            debug!("crunch not found, numeric ranges will use direct enumeration");
        }
        Self { program, temp_dir: None }
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn is_available(&self) -> bool {
        self.program.is_some()
    }

    fn temp_file(&self) -> std::io::Result<tempfile::NamedTempFile> {
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix("datecrack-crunch-").suffix(".txt");
            b
        };
        match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }
}

impl RangeGenerator for CrunchGenerator {
    fn name(&self) -> &'static str {
        "crunch"
    }

    fn generate(
        &self,
        spec: &NumericRangeSpec,
        sink: &mut Sink<'_>,
        progress: &dyn Progress,
        cancel: &CancelToken,
    ) -> std::result::Result<u64, GenerateError> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| GenerateError::Unavailable("crunch is not installed".to_string()))?;

        let out = self
            .temp_file()
            .map_err(|e| GenerateError::Failed(format!("cannot create temp file: {}", e)))?;

        progress.update(0.0, &format!("Generating {}-digit numbers with crunch", spec.width));

        let width = spec.width.to_string();
        let start = spec.render(spec.min);
        let end = spec.render(spec.max);
        let mut child = Command::new(program)
            .args([width.as_str(), width.as_str(), "0123456789", "-s", start.as_str(), "-e", end.as_str(), "-o"])
            .arg(out.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| GenerateError::Failed(format!("cannot start crunch: {}", e)))?;

        let status = match process::wait_cancellable(&mut child, cancel) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = process::terminate(&mut child, std::time::Duration::from_secs(5));
                return Err(GenerateError::Sink(Error::Cancelled));
            }
            Err(e) => return Err(GenerateError::Failed(format!("waiting for crunch: {}", e))),
        };

        if !status.success() {
            return Err(GenerateError::Failed(format!("crunch exited with {}", status)));
        }

        let expected = spec
            .count()
            .checked_mul(spec.width as u64 + 1)
            .ok_or_else(|| GenerateError::Failed("range too large to size-check".to_string()))?;
        let actual = out
            .as_file()
            .metadata()
            .map_err(|e| GenerateError::Failed(e.to_string()))?
            .len();
        if actual != expected {
            return Err(GenerateError::Failed(format!(
                "crunch wrote {} bytes, expected {}",
                actual, expected
            )));
        }

        let reader = BufReader::new(
            File::open(out.path()).map_err(|e| GenerateError::Failed(e.to_string()))?,
        );
        let mut done = 0u64;
        for line in reader.lines() {
            let line = line.map_err(|e| GenerateError::Sink(Error::Io(e)))?;
            sink(&line)?;
            done += 1;
            if done % PROGRESS_INTERVAL == 0 {
                report(progress, spec, done);
            }
        }

        progress.update(100.0, &format!("Crunch number generation complete - {} numbers", done));
        Ok(done)
    }
}

/// Try `primary`; on `Unavailable`/`Failed` run `fallback` instead.
pub struct FallbackGenerator {
    primary: Box<dyn RangeGenerator>,
    fallback: Box<dyn RangeGenerator>,
}

impl FallbackGenerator {
    pub fn new(primary: Box<dyn RangeGenerator>, fallback: Box<dyn RangeGenerator>) -> Self {
        Self { primary, fallback }
    }
}

impl RangeGenerator for FallbackGenerator {
    fn name(&self) -> &'static str {
        self.primary.name()
    }

    fn generate(
        &self,
        spec: &NumericRangeSpec,
        sink: &mut Sink<'_>,
        progress: &dyn Progress,
        cancel: &CancelToken,
    ) -> std::result::Result<u64, GenerateError> {
        match self.primary.generate(spec, sink, progress, cancel) {
            Err(GenerateError::Unavailable(reason)) | Err(GenerateError::Failed(reason)) => {
                warn!(
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    %reason,
                    "falling back"
                );
                self.fallback
                    .generate(spec, sink, progress, cancel)
                    .map_err(|e| {
                        if !matches!(e, GenerateError::Sink(_)) {
                            progress.update(0.0, &format!("Error: {}", e));
                        }
                        e
                    })
            }
            other => other,
        }
    }
}

/// Numbers from a [`NumericRangeSpec`], produced through a [`RangeGenerator`].
pub struct RangeSource {
    spec: NumericRangeSpec,
    generator: Box<dyn RangeGenerator>,
}

impl RangeSource {
    /// Direct enumeration only.
    pub fn new(spec: NumericRangeSpec) -> Self {
        Self::with_generator(spec, Box::new(DirectGenerator))
    }

    /// Prefer `crunch`, fall back to direct enumeration.
    pub fn with_crunch(spec: NumericRangeSpec, crunch: CrunchGenerator) -> Self {
        Self::with_generator(
            spec,
            Box::new(FallbackGenerator::new(Box::new(crunch), Box::new(DirectGenerator))),
        )
    }

    pub fn with_generator(spec: NumericRangeSpec, generator: Box<dyn RangeGenerator>) -> Self {
        Self { spec, generator }
    }

    pub fn spec(&self) -> &NumericRangeSpec {
        &self.spec
    }
}

impl Source for RangeSource {
    fn name(&self) -> String {
        format!("{}-digit numbers {}", self.spec.width, self.spec)
    }

    fn width(&self) -> usize {
        self.spec.width
    }

    fn count(&self) -> u64 {
        self.spec.count()
    }

    fn emit(&self, sink: &mut Sink<'_>, progress: &dyn Progress, cancel: &CancelToken) -> Result<u64> {
        info!(range = %self.spec, generator = self.generator.name(), "generating numbers");
        Ok(self.generator.generate(&self.spec, sink, progress, cancel)?)
    }
}
