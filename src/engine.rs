//! External cracking engine (John the Ripper).

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::process;

/// Brute-force engine run as an asynchronous subprocess.
pub trait CrackEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Start cracking `hash_file` with `wordlist`. Stderr should be piped.
    fn spawn(&self, hash_file: &Path, wordlist: &Path) -> Result<Child>;

    /// Query the engine's result store for a secret recovered for `hash_file`.
    fn recovered_secret(&self, hash_file: &Path) -> Result<Option<String>>;
}

/// John the Ripper.
#[derive(Debug, Clone)]
pub struct John {
    program: PathBuf,
    show_timeout: Duration,
}

impl John {
    /// Resolve `program` now so a missing install fails before any work.
    pub fn new(program: impl AsRef<Path>) -> Result<Self> {
        let program = program.as_ref();
        let resolved = process::find_program(program).ok_or_else(|| {
            Error::ToolMissing(format!(
                "John the Ripper not found ({}). Please install john",
                program.display()
            ))
        })?;
        Ok(Self {
            program: resolved,
            show_timeout: Duration::from_secs(30),
        })
    }

    pub fn with_show_timeout(mut self, timeout: Duration) -> Self {
        self.show_timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl CrackEngine for John {
    fn name(&self) -> &'static str {
        "john"
    }

    fn spawn(&self, hash_file: &Path, wordlist: &Path) -> Result<Child> {
        let mut wordlist_arg = std::ffi::OsString::from("--wordlist=");
        wordlist_arg.push(wordlist);

        debug!(
            cmd = %process::describe(&self.program, &[wordlist_arg.as_os_str(), hash_file.as_os_str()]),
            "starting engine"
        );

        let child = Command::new(&self.program)
            .arg(&wordlist_arg)
            .arg(hash_file)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::EngineFailure(format!("cannot start {}: {}", self.program.display(), e)))?;
        Ok(child)
    }

    fn recovered_secret(&self, hash_file: &Path) -> Result<Option<String>> {
        let out = process::run_with_timeout(
            Command::new(&self.program).arg("--show").arg(hash_file),
            self.show_timeout,
        )
        .map_err(|e| Error::EngineFailure(format!("cannot query results: {}", e)))?;

        if out.timed_out() {
            return Err(Error::EngineFailure("result query timed out".to_string()));
        }
        Ok(parse_show_output(&out.stdout))
    }
}

/// Pull the secret out of `john --show` output.
///
/// The first line reads `<label>:<secret>`; anything else (e.g. the
/// "0 password hashes cracked" summary) means nothing was recovered.
pub fn parse_show_output(output: &str) -> Option<String> {
    let first = output.trim().lines().next()?;
    let (_, secret) = first.split_once(':')?;
    (!secret.is_empty()).then(|| secret.to_string())
}
