//! Hash extraction from protected documents.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::process;

/// Default locations of john's `pdf2john.pl`.
pub const PDF2JOHN_PATHS: &[&str] = &[
    "/usr/share/john/pdf2john.pl",
    "/opt/homebrew/share/john/pdf2john.pl",
    "/usr/local/share/john/pdf2john.pl",
];

/// What the extractor found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Crackable hash line
    Protected(String),
    /// Document opens without a password
    NotProtected,
}

/// Derives a crackable hash from a document.
pub trait HashExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, document: &Path) -> Result<Extraction>;
}

/// `pdf2john` (script or binary) driven as a subprocess.
#[derive(Debug, Clone)]
pub struct Pdf2John {
    script: PathBuf,
    perl: Option<PathBuf>,
    timeout: Duration,
}

impl Pdf2John {
    /// Use `script` directly. A `.pl` script is run through `perl`, which must exist.
    pub fn new(script: impl AsRef<Path>, perl: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let script = script.as_ref();
        let is_perl = script.extension().map_or(false, |e| e == "pl");

        let (script, perl) = if is_perl {
            if !script.is_file() {
                return Err(Error::ToolMissing(format!("pdf2john script {}", script.display())));
            }
            let perl = process::find_program(perl.as_ref())
                .ok_or_else(|| Error::ToolMissing("perl".to_string()))?;
            (script.to_path_buf(), Some(perl))
        } else {
            let found = process::find_program(script)
                .ok_or_else(|| Error::ToolMissing(script.display().to_string()))?;
            (found, None)
        };

        Ok(Self { script, perl, timeout })
    }

    /// Search the usual install locations, then `pdf2john` / `pdf2john.pl` on `PATH`.
    pub fn locate(perl: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let candidate = PDF2JOHN_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
            .or_else(|| process::find_program("pdf2john"))
            .or_else(|| process::find_program("pdf2john.pl"))
            .ok_or_else(|| {
                Error::ToolMissing(
                    "pdf2john not found. Please ensure John the Ripper (jumbo) is installed".to_string(),
                )
            })?;

        debug!(path = %candidate.display(), "found pdf2john");
        Self::new(candidate, perl, timeout)
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    fn command(&self, document: &Path) -> Command {
        match &self.perl {
            Some(perl) => {
                let mut cmd = Command::new(perl);
                cmd.arg(&self.script).arg(document);
                cmd
            }
            None => {
                let mut cmd = Command::new(&self.script);
                cmd.arg(document);
                cmd
            }
        }
    }
}

fn mentions_not_encrypted(text: &str) -> bool {
    text.to_lowercase().contains("not encrypted")
}

impl HashExtractor for Pdf2John {
    fn name(&self) -> &'static str {
        "pdf2john"
    }

    fn extract(&self, document: &Path) -> Result<Extraction> {
        if !document.exists() {
            return Err(Error::NotFound(document.to_path_buf()));
        }

        let out = process::run_with_timeout(&mut self.command(document), self.timeout)
            .map_err(|e| Error::ExtractionFailed(format!("cannot run {}: {}", self.script.display(), e)))?;

        if out.timed_out() {
            return Err(Error::ExtractionFailed(format!(
                "extractor timed out after {}s",
                self.timeout.as_secs()
            )));
        }

        let stdout = out.stdout.trim();
        let stderr = out.stderr.trim();

        if mentions_not_encrypted(stdout) || mentions_not_encrypted(stderr) {
            info!(document = %document.display(), "document is not protected");
            return Ok(Extraction::NotProtected);
        }

        if !out.success() {
            let detail = if stderr.is_empty() {
                match out.status {
                    Some(status) => format!("extractor exited with {}", status),
                    None => "extractor did not exit".to_string(),
                }
            } else {
                stderr.to_string()
            };
            return Err(Error::ExtractionFailed(detail));
        }

        if stdout.is_empty() {
            return Err(Error::ExtractionFailed("No hash extracted from document".to_string()));
        }

        debug!(document = %document.display(), len = stdout.len(), "hash extracted");
        Ok(Extraction::Protected(stdout.to_string()))
    }
}
