use crate::*;
use config::{Config, Environment, File};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Maximum number of options a poll may carry unless configured otherwise
pub const DEFAULT_MAX_OPTIONS: usize = 10;

/// Runtime settings
///
/// Every field has a default, so an empty config file (or none at all) is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Maximum number of options per poll. Never more than 256, since option indices are 8-bit.
    pub max_options: usize,

    /// Maximum question length in bytes
    pub max_question_len: usize,

    /// Longest permitted poll duration, if any
    pub max_duration_secs: Option<u64>,

    /// Upper bound on any single call to the cryptographic service
    pub service_timeout_ms: u64,

    /// Upper bound on the size of a ballot's ciphertext and of its attestation
    pub max_ballot_bytes: usize,

    /// Buffered events per subscriber before the slowest subscriber starts lagging
    pub event_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_options: DEFAULT_MAX_OPTIONS,
            max_question_len: 1024,
            max_duration_secs: None,
            service_timeout_ms: 30_000,
            max_ballot_bytes: 4096,
            event_capacity: 256,
        }
    }
}

impl Settings {
    /// Load settings from an optional file, overridden by `SEALEDPOLL_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!("Reading settings from path {:?}", path);
            builder = builder.add_source(File::from(path));
        }
        let settings: Settings = builder
            .add_source(Environment::with_prefix("SEALEDPOLL").try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.max_options < 2 || self.max_options > 256 {
            return Err(Error::Configuration(format!(
                "max_options must be between 2 and 256, got {}",
                self.max_options
            )));
        }
        if self.service_timeout_ms == 0 {
            return Err(Error::Configuration(
                "service_timeout_ms must be positive".to_owned(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::Configuration(
                "event_capacity must be positive".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn service_timeout(&self) -> Duration {
        Duration::from_millis(self.service_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.max_options, 10);
        assert_eq!(settings.service_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.max_ballot_bytes, 4096);
    }

    #[test]
    fn rejects_bad_limits() {
        let mut settings = Settings::default();
        settings.max_options = 1;
        assert!(matches!(
            settings.validate(),
            Err(Error::Configuration(_))
        ));

        let mut settings = Settings::default();
        settings.service_timeout_ms = 0;
        assert!(settings.validate().is_err());
    }
}
