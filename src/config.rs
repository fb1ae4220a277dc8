//! Tool locations and timing, loadable from TOML.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::crack::{Orchestrator, SessionSettings};
use crate::engine::John;
use crate::error::{Error, Result};
use crate::extract::Pdf2John;
use crate::source::CrunchGenerator;

/// Runtime configuration. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// John the Ripper binary.
    pub john: PathBuf,
    /// Explicit extractor path; searched for when unset.
    pub pdf2john: Option<PathBuf>,
    pub perl: PathBuf,
    pub crunch: PathBuf,
    pub extract_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub termination_grace_secs: u64,
    pub crack_timeout_secs: Option<u64>,
    /// Candidates per second assumed for progress estimates.
    pub assumed_rate: u64,
    pub temp_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            john: PathBuf::from("john"),
            pdf2john: None,
            perl: PathBuf::from("perl"),
            crunch: PathBuf::from("crunch"),
            extract_timeout_secs: 60,
            poll_interval_ms: 1000,
            termination_grace_secs: 5,
            crack_timeout_secs: None,
            assumed_rate: 1000,
            temp_dir: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        let config = Self::parse(&text).map_err(|e| match e {
            Error::InvalidParameters(msg) => Error::invalid(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| Error::invalid(format!("config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::invalid("poll_interval_ms must be positive"));
        }
        if self.assumed_rate == 0 {
            return Err(Error::invalid("assumed_rate must be positive"));
        }
        if self.extract_timeout_secs == 0 {
            return Err(Error::invalid("extract_timeout_secs must be positive"));
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            grace: Duration::from_secs(self.termination_grace_secs),
            assumed_rate: self.assumed_rate,
            temp_dir: self.temp_dir.clone(),
            crack_timeout: self.crack_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn extractor(&self) -> Result<Pdf2John> {
        let timeout = Duration::from_secs(self.extract_timeout_secs);
        match &self.pdf2john {
            Some(path) => Pdf2John::new(path, &self.perl, timeout),
            None => Pdf2John::locate(&self.perl, timeout),
        }
    }

    pub fn engine(&self) -> Result<John> {
        John::new(&self.john)
    }

    /// Build an orchestrator, failing fast if either tool is missing.
    pub fn orchestrator(&self) -> Result<Orchestrator> {
        let extractor = self.extractor()?;
        let engine = self.engine()?;
        Ok(Orchestrator::new(Box::new(extractor), Box::new(engine)).with_settings(self.session_settings()))
    }

    pub fn crunch_generator(&self) -> CrunchGenerator {
        let generator = CrunchGenerator::new(&self.crunch);
        match &self.temp_dir {
            Some(dir) => generator.with_temp_dir(dir.clone()),
            None => generator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn partial_override() {
        let config = Config::parse(
            r#"
john = "/opt/john/run/john"
poll_interval_ms = 250
crack_timeout_secs = 3600
"#,
        )
        .unwrap();

        assert_eq!(config.john, PathBuf::from("/opt/john/run/john"));
        assert_eq!(config.crunch, PathBuf::from("crunch"));

        let settings = config.session_settings();
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.crack_timeout, Some(Duration::from_secs(3600)));
        assert_eq!(settings.grace, Duration::from_secs(5));
    }

    #[test]
    fn rejects_unknown_keys_and_zero_intervals() {
        let err = Config::parse("jon = \"john\"").unwrap_err();
        assert!(matches!(err, Error::InvalidParameters(_)));

        let err = Config::parse("poll_interval_ms = 0").unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datecrack.toml");
        fs::write(&path, "assumed_rate = 5000\ntemp_dir = \"/var/tmp\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.assumed_rate, 5000);
        assert_eq!(config.temp_dir, Some(PathBuf::from("/var/tmp")));

        let err = Config::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn missing_engine_fails_fast() {
        let config = Config {
            john: PathBuf::from("no-such-john-xyz"),
            ..Config::default()
        };
        assert!(matches!(config.engine(), Err(Error::ToolMissing(_))));
    }
}
