//! Error types shared by generation and cracking.

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur while generating wordlists or cracking a document.
#[derive(Debug)]
pub enum Error {
    /// Input file does not exist
    NotFound(PathBuf),
    /// A required external tool is not installed
    ToolMissing(String),
    /// Extractor ran but produced no usable hash
    ExtractionFailed(String),
    /// Bad year range, unsupported format, malformed numeric range
    InvalidParameters(String),
    /// Engine exited abnormally for a reason other than "no password found"
    EngineFailure(String),
    /// Engine went through the whole wordlist without a hit
    NotFoundInWordlist,
    /// Stopped on request
    Cancelled,
    /// Sink or temp file I/O failed
    Io(std::io::Error),
}

/// Payload-free discriminant of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    ToolMissing,
    ExtractionFailed,
    InvalidParameters,
    EngineFailure,
    NotFoundInWordlist,
    Cancelled,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::ToolMissing(_) => ErrorKind::ToolMissing,
            Error::ExtractionFailed(_) => ErrorKind::ExtractionFailed,
            Error::InvalidParameters(_) => ErrorKind::InvalidParameters,
            Error::EngineFailure(_) => ErrorKind::EngineFailure,
            Error::NotFoundInWordlist => ErrorKind::NotFoundInWordlist,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidParameters(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(path) => write!(f, "File not found: {}", path.display()),
            Error::ToolMissing(tool) => write!(f, "Required tool not found: {}", tool),
            Error::ExtractionFailed(msg) => write!(f, "Hash extraction failed: {}", msg),
            Error::InvalidParameters(msg) => write!(f, "Invalid parameters: {}", msg),
            Error::EngineFailure(msg) => write!(f, "Cracking engine failed: {}", msg),
            Error::NotFoundInWordlist => write!(f, "No password found"),
            Error::Cancelled => write!(f, "Cancelled by user"),
            Error::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
