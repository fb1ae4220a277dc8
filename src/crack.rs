//! Crack orchestration: extract a hash, prepare a wordlist, drive the engine.
//!
//! One [`Orchestrator`] runs at most one `CrackSession` at a time. The
//! session owns the engine process, its cancellation token and the
//! progress polling thread; temporary hash/wordlist files are owned by the
//! orchestrator call and removed on every exit path.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::engine::CrackEngine;
use crate::error::{Error, ErrorKind, Result};
use crate::extract::{Extraction, HashExtractor};
use crate::process;
use crate::progress::CrackProgress;
use crate::wordlist::WordlistJob;

/// Percentage reported while the engine is still running.
const RUNNING_CAP: f64 = 99.0;

/// Orchestrator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrackState {
    Idle,
    ExtractingHash,
    NotProtected,
    Protected,
    GeneratingWordlist,
    Cracking,
    Found,
    Exhausted,
    Cancelled,
    Error,
}

impl CrackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrackState::Idle => "idle",
            CrackState::ExtractingHash => "extracting",
            CrackState::NotProtected => "not protected",
            CrackState::Protected => "protected",
            CrackState::GeneratingWordlist => "generating",
            CrackState::Cracking => "cracking",
            CrackState::Found => "found",
            CrackState::Exhausted => "exhausted",
            CrackState::Cancelled => "cancelled",
            CrackState::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CrackState::NotProtected
                | CrackState::Found
                | CrackState::Exhausted
                | CrackState::Cancelled
                | CrackState::Error
        )
    }
}

impl fmt::Display for CrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one crack attempt.
///
/// Either `succeeded` with no error (secret set unless the document was
/// not protected), or failed with a non-empty `error`.
#[derive(Debug, Clone)]
pub struct CrackOutcome {
    pub succeeded: bool,
    pub secret: Option<String>,
    pub elapsed: Duration,
    pub attempts: u64,
    pub error: Option<String>,
    pub state: CrackState,
    pub error_kind: Option<ErrorKind>,
}

impl CrackOutcome {
    fn found(secret: String, elapsed: Duration, attempts: u64) -> Self {
        Self {
            succeeded: true,
            secret: Some(secret),
            elapsed,
            attempts,
            error: None,
            state: CrackState::Found,
            error_kind: None,
        }
    }

    fn not_protected(elapsed: Duration) -> Self {
        Self {
            succeeded: true,
            secret: None,
            elapsed,
            attempts: 0,
            error: None,
            state: CrackState::NotProtected,
            error_kind: None,
        }
    }

    fn failed(err: &Error, elapsed: Duration, attempts: u64) -> Self {
        let state = match err {
            Error::NotFoundInWordlist => CrackState::Exhausted,
            Error::Cancelled => CrackState::Cancelled,
            _ => CrackState::Error,
        };
        Self {
            succeeded: false,
            secret: None,
            elapsed,
            attempts,
            error: Some(err.to_string()),
            state,
            error_kind: Some(err.kind()),
        }
    }

    /// True only when a secret was recovered.
    pub fn is_found(&self) -> bool {
        self.state == CrackState::Found
    }
}

/// Where the candidates come from.
pub enum WordlistSpec {
    /// Caller-supplied wordlist file
    File(PathBuf),
    /// Assembled into a temporary file before cracking
    Generate(WordlistJob),
}

/// Everything needed for one crack attempt.
pub struct CrackRequest {
    document: PathBuf,
    wordlist: WordlistSpec,
    cancel: CancelToken,
    timeout: Option<Duration>,
}

impl CrackRequest {
    pub fn with_wordlist(document: impl Into<PathBuf>, wordlist: impl Into<PathBuf>) -> Self {
        Self::new(document.into(), WordlistSpec::File(wordlist.into()))
    }

    pub fn generate(document: impl Into<PathBuf>, job: WordlistJob) -> Self {
        Self::new(document.into(), WordlistSpec::Generate(job))
    }

    fn new(document: PathBuf, wordlist: WordlistSpec) -> Self {
        Self {
            document,
            wordlist,
            cancel: CancelToken::new(),
            timeout: None,
        }
    }

    /// Use an existing token, e.g. one wired to a signal handler.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Overall limit on the cracking phase. Overrides the session default.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// A clone of the request's token; cancelling it stops the attempt.
    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn document(&self) -> &Path {
        &self.document
    }
}

/// Tunables for the cracking phase.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Progress polling period.
    pub poll_interval: Duration,
    /// Wait after a stop request before force-killing the engine.
    pub grace: Duration,
    /// Candidates per second assumed for attempt estimates.
    pub assumed_rate: u64,
    /// Directory for temporary hash/wordlist files.
    pub temp_dir: Option<PathBuf>,
    pub crack_timeout: Option<Duration>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            grace: Duration::from_secs(5),
            assumed_rate: 1000,
            temp_dir: None,
            crack_timeout: None,
        }
    }
}

/// Snapshot returned by [`Orchestrator::document_info`].
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub path: PathBuf,
    pub exists: bool,
    pub size: u64,
    /// `None` when extraction failed.
    pub protected: Option<bool>,
    pub hash: Option<String>,
    pub error: Option<String>,
}

/// Drives extractor, wordlist assembly and engine through one attempt.
pub struct Orchestrator {
    extractor: Box<dyn HashExtractor>,
    engine: Box<dyn CrackEngine>,
    settings: SessionSettings,
    state: CrackState,
}

impl Orchestrator {
    pub fn new(extractor: Box<dyn HashExtractor>, engine: Box<dyn CrackEngine>) -> Self {
        Self {
            extractor,
            engine,
            settings: SessionSettings::default(),
            state: CrackState::Idle,
        }
    }

    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// State reached by the last (or current) attempt.
    pub fn state(&self) -> CrackState {
        self.state
    }

    /// Run one attempt to completion. Never panics on tool failures; every
    /// failure becomes a terminal outcome.
    pub fn crack(&mut self, request: CrackRequest, progress: &dyn CrackProgress) -> CrackOutcome {
        let started = Instant::now();
        self.state = CrackState::Idle;
        let mut attempts = 0;

        let outcome = match self.attempt(&request, progress, &mut attempts) {
            Ok(Some(secret)) => CrackOutcome::found(secret, started.elapsed(), attempts),
            Ok(None) => CrackOutcome::not_protected(started.elapsed()),
            Err(err) => CrackOutcome::failed(&err, started.elapsed(), attempts),
        };

        if matches!(outcome.state, CrackState::Found | CrackState::Exhausted) {
            progress.update(100.0, attempts);
        }
        self.transition(outcome.state, progress);

        match &outcome.error {
            None => info!(state = %outcome.state, elapsed = ?outcome.elapsed, "attempt finished"),
            Some(error) => info!(state = %outcome.state, error = %error, "attempt failed"),
        }
        outcome
    }

    fn transition(&mut self, state: CrackState, progress: &dyn CrackProgress) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "state change");
            self.state = state;
            progress.state_changed(state);
        }
    }

    /// `Ok(None)` means the document is not protected.
    fn attempt(
        &mut self,
        request: &CrackRequest,
        progress: &dyn CrackProgress,
        attempts: &mut u64,
    ) -> Result<Option<String>> {
        if !request.document.exists() {
            return Err(Error::NotFound(request.document.clone()));
        }
        if let WordlistSpec::File(path) = &request.wordlist {
            if !path.is_file() {
                return Err(Error::NotFound(path.clone()));
            }
        }

        self.transition(CrackState::ExtractingHash, progress);
        let hash = match self.extractor.extract(&request.document)? {
            Extraction::NotProtected => {
                self.transition(CrackState::NotProtected, progress);
                return Ok(None);
            }
            Extraction::Protected(hash) => hash,
        };
        self.transition(CrackState::Protected, progress);

        let mut hash_file = self.temp_file(".hash")?;
        writeln!(hash_file, "{}", hash)?;
        hash_file.flush()?;

        if request.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // Keep the generated file alive until the engine is done with it.
        let mut generated = None;
        let (wordlist, candidates) = match &request.wordlist {
            WordlistSpec::File(path) => (path.clone(), count_lines(path)?),
            WordlistSpec::Generate(job) => {
                self.transition(CrackState::GeneratingWordlist, progress);
                let file = self.temp_file(".txt")?;
                let forward = |percent: f64, message: &str| progress.generation(percent, message);
                let stats = job.write_to(file.as_file(), &forward, &request.cancel)?;
                if stats.entries_written == 0 {
                    return Err(Error::invalid("generated wordlist is empty"));
                }
                let path = file.path().to_path_buf();
                generated = Some(file);
                (path, stats.entries_written)
            }
        };

        if request.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.transition(CrackState::Cracking, progress);
        let limit = request.timeout.or(self.settings.crack_timeout);
        let child = self.engine.spawn(hash_file.path(), &wordlist)?;
        info!(engine = self.engine.name(), candidates, "engine started");

        let session = CrackSession::new(child, request.cancel.clone());
        let report = session.run(&self.settings, limit, candidates, progress)?;
        *attempts = report.attempts;
        drop(generated);

        // An interrupt can reach the engine directly and end it before the
        // session notices the token. A secret already in the result store
        // still wins.
        match report.end {
            SessionEnd::Exited(status) if status.success() => {
                match self.engine.recovered_secret(hash_file.path())? {
                    Some(secret) => Ok(Some(secret)),
                    None if request.cancel.is_cancelled() => Err(Error::Cancelled),
                    None => Err(Error::NotFoundInWordlist),
                }
            }
            SessionEnd::Cancelled => Err(Error::Cancelled),
            _ if request.cancel.is_cancelled() => Err(Error::Cancelled),
            SessionEnd::TimedOut(limit) => Err(Error::EngineFailure(format!(
                "cracking timed out after {}s",
                limit.as_secs_f64()
            ))),
            SessionEnd::Exited(status) => {
                let stderr = report.stderr.trim();
                Err(Error::EngineFailure(if stderr.is_empty() {
                    format!("engine exited with {}", status)
                } else {
                    stderr.to_string()
                }))
            }
        }
    }

    fn temp_file(&self, suffix: &str) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("datecrack-").suffix(suffix);
        let file = match &self.settings.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file)
    }

    /// Existence, size and protection status of a document. Extraction
    /// failures land in `error` instead of being returned.
    pub fn document_info(&self, path: &Path) -> DocumentInfo {
        let mut info = DocumentInfo {
            path: path.to_path_buf(),
            exists: path.exists(),
            size: path.metadata().map(|m| m.len()).unwrap_or(0),
            protected: None,
            hash: None,
            error: None,
        };
        if !info.exists {
            info.error = Some(Error::NotFound(path.to_path_buf()).to_string());
            return info;
        }

        match self.extractor.extract(path) {
            Ok(Extraction::Protected(hash)) => {
                info.protected = Some(true);
                info.hash = Some(hash);
            }
            Ok(Extraction::NotProtected) => info.protected = Some(false),
            Err(e) => info.error = Some(e.to_string()),
        }
        info
    }
}

/// Number of lines in `path`, counting a final line without a newline.
fn count_lines(path: &Path) -> Result<u64> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut lines = 0u64;
    let mut last = None;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        lines += buf.iter().filter(|&&b| b == b'\n').count() as u64;
        last = buf.last().copied();
        let len = buf.len();
        reader.consume(len);
    }
    if matches!(last, Some(b) if b != b'\n') {
        lines += 1;
    }
    Ok(lines)
}

/// How the engine process ended.
#[derive(Debug)]
enum SessionEnd {
    Exited(ExitStatus),
    Cancelled,
    TimedOut(Duration),
}

#[derive(Debug)]
struct SessionReport {
    end: SessionEnd,
    attempts: u64,
    stderr: String,
}

/// A running engine process plus the state needed to observe and stop it.
///
/// Dropping a session kills the process if it is still running.
pub(crate) struct CrackSession {
    child: Child,
    cancel: CancelToken,
    stderr: Option<JoinHandle<String>>,
}

impl CrackSession {
    pub(crate) fn new(mut child: Child, cancel: CancelToken) -> Self {
        let stderr = process::drain(child.stderr.take());
        Self { child, cancel, stderr }
    }

    /// Wait for the engine while a polling thread reports estimated progress.
    fn run(
        mut self,
        settings: &SessionSettings,
        limit: Option<Duration>,
        candidates: u64,
        progress: &dyn CrackProgress,
    ) -> Result<SessionReport> {
        let attempts = AtomicU64::new(0);
        let (stop, stopped) = mpsc::channel::<()>();
        let cancel = self.cancel.clone();

        let end = thread::scope(|scope| {
            let poller = scope.spawn(|| {
                poll_progress(
                    stopped,
                    settings.poll_interval,
                    settings.assumed_rate,
                    candidates,
                    &attempts,
                    &cancel,
                    progress,
                )
            });

            let end = self.wait(limit, settings.grace);
            drop(stop);
            if poller.join().is_err() {
                warn!("progress poller panicked");
            }
            end
        })?;

        Ok(SessionReport {
            end,
            attempts: attempts.load(Ordering::Relaxed),
            stderr: process::collect(self.stderr.take()),
        })
    }

    fn wait(&mut self, limit: Option<Duration>, grace: Duration) -> io::Result<SessionEnd> {
        let deadline = limit.map(|l| (Instant::now() + l, l));
        loop {
            if let Some(status) = self.child.try_wait()? {
                debug!(%status, "engine exited");
                return Ok(SessionEnd::Exited(status));
            }
            if self.cancel.is_cancelled() {
                info!(pid = self.child.id(), "stopping engine on cancel");
                process::terminate(&mut self.child, grace)?;
                return Ok(SessionEnd::Cancelled);
            }
            if let Some((at, limit)) = deadline {
                if Instant::now() >= at {
                    warn!(pid = self.child.id(), ?limit, "engine timed out");
                    process::terminate(&mut self.child, grace)?;
                    return Ok(SessionEnd::TimedOut(limit));
                }
            }
            thread::sleep(process::WAIT_TICK);
        }
    }
}

impl Drop for CrackSession {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            warn!(pid = self.child.id(), "killing engine left running");
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Estimate attempts from elapsed time until `stop` disconnects or the
/// attempt is cancelled. Percent stays below 100 while the engine runs.
fn poll_progress(
    stop: mpsc::Receiver<()>,
    interval: Duration,
    rate: u64,
    candidates: u64,
    attempts: &AtomicU64,
    cancel: &CancelToken,
    progress: &dyn CrackProgress,
) {
    let started = Instant::now();
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            _ => break,
        }
        if cancel.is_cancelled() {
            break;
        }

        let estimate = (started.elapsed().as_secs_f64() * rate as f64) as u64;
        let estimate = if candidates > 0 { estimate.min(candidates) } else { estimate };
        attempts.store(estimate, Ordering::Relaxed);

        let percent = if candidates > 0 {
            estimate as f64 / candidates as f64 * 100.0
        } else {
            0.0
        };
        progress.update(percent.min(RUNNING_CAP), estimate);
    }
}
