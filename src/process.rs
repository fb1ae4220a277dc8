//! Subprocess helpers: tool lookup, bounded waits, graceful termination.

use std::ffi::OsStr;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::cancel::CancelToken;

/// How often blocking waits re-check the child.
pub(crate) const WAIT_TICK: Duration = Duration::from_millis(25);

/// Resolve `program` to an executable file.
///
/// Names containing a path separator are checked directly, bare names are
/// looked up on `PATH`.
pub fn find_program(program: impl AsRef<Path>) -> Option<PathBuf> {
    let program = program.as_ref();
    if program.components().count() > 1 {
        return is_executable(program).then(|| program.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Output of a finished (or timed out) command.
#[derive(Debug)]
pub struct Captured {
    /// `None` when the command was killed after the timeout.
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
}

impl Captured {
    pub fn timed_out(&self) -> bool {
        self.status.is_none()
    }

    pub fn success(&self) -> bool {
        self.status.map(|s| s.success()).unwrap_or(false)
    }
}

/// Read a pipe to the end on a helper thread so the child never blocks on a full pipe.
pub(crate) fn drain<R: Read + Send + 'static>(reader: Option<R>) -> Option<JoinHandle<String>> {
    reader.map(|mut r| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = r.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

pub(crate) fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Run `cmd` to completion, capturing stdout and stderr, killing it after `timeout`.
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> io::Result<Captured> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if Instant::now() >= deadline {
            warn!(pid = child.id(), ?timeout, "command timed out, killing");
            let _ = child.kill();
            let _ = child.wait();
            break None;
        }
        thread::sleep(WAIT_TICK);
    };

    Ok(Captured {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

/// Wait for `child`, polling `cancel` between checks.
///
/// Returns `Ok(None)` if cancelled; the child is still running in that case.
pub fn wait_cancellable(child: &mut Child, cancel: &CancelToken) -> io::Result<Option<ExitStatus>> {
    loop {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        thread::sleep(WAIT_TICK);
    }
}

/// Ask the child to exit, then kill it if it is still alive after `grace`.
pub fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    request_stop(child);

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait()? {
            debug!(pid = child.id(), "child exited after stop request");
            return Ok(status);
        }
        thread::sleep(WAIT_TICK);
    }

    warn!(pid = child.id(), ?grace, "child ignored stop request, killing");
    child.kill()?;
    child.wait()
}

#[cfg(unix)]
fn request_stop(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Err(e) = kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM) {
        debug!(pid = child.id(), error = %e, "SIGTERM failed");
    }
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child) {
    let _ = child.kill();
}

/// Render a command line for log messages.
pub(crate) fn describe(program: &Path, args: &[&OsStr]) -> String {
    let mut out = program.display().to_string();
    for arg in args {
        out.push(' ');
        out.push_str(&arg.to_string_lossy());
    }
    out
}

#[cfg(all(test, unix))]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    /// Write an executable `/bin/sh` script into `dir`.
    pub(crate) fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn find_program_by_path_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let tool = script(dir.path(), "fake-tool", "exit 0");

        assert_eq!(find_program(&tool), Some(tool.clone()));
        assert!(find_program(dir.path().join("absent")).is_none());
        assert!(find_program("sh").is_some());
        assert!(find_program("definitely-not-installed-tool-xyz").is_none());
    }

    #[test]
    fn non_executable_file_is_not_a_program() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        fs::write(&path, "hello").unwrap();
        assert!(find_program(&path).is_none());
    }

    #[test]
    fn run_with_timeout_captures_output() {
        let out = run_with_timeout(
            Command::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
        assert_eq!(out.status.and_then(|s| s.code()), Some(3));
        assert!(!out.success());
    }

    #[test]
    fn run_with_timeout_kills_slow_commands() {
        let started = Instant::now();
        let out = run_with_timeout(
            Command::new("sh").args(["-c", "exec sleep 30"]),
            Duration::from_millis(200),
        )
        .unwrap();

        assert!(out.timed_out());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn terminate_stops_cooperative_child() {
        let mut child = Command::new("sh").args(["-c", "exec sleep 30"]).spawn().unwrap();
        let started = Instant::now();
        let status = terminate(&mut child, Duration::from_secs(5)).unwrap();

        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn terminate_escalates_when_term_is_ignored() {
        let mut child = Command::new("sh")
            .args(["-c", "trap '' TERM; while true; do sleep 1; done"])
            .spawn()
            .unwrap();
        thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        terminate(&mut child, Duration::from_millis(300)).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(child.try_wait().unwrap().is_some());
    }

    #[test]
    fn wait_cancellable_returns_none_on_cancel() {
        let mut child = Command::new("sh").args(["-c", "exec sleep 30"]).spawn().unwrap();
        let token = CancelToken::new();
        token.cancel();

        assert!(wait_cancellable(&mut child, &token).unwrap().is_none());
        terminate(&mut child, Duration::from_secs(1)).unwrap();
    }
}
