//! Acquisition configuration.
//!
//! Tuning knobs for the session policy and the pagination budget, loadable
//! from a TOML file. Values that pass parsing can still be semantically
//! wrong (a zero page cap would make the reader loop forever requesting
//! nothing), so [`AcquisitionConfig::validate`] runs after deserialization.
//!
//! # Example (`acquisition.toml`)
//!
//! ```toml
//! connect_timeout = "15s"
//! retry_delay = "10s"
//! max_retries = 3
//! total_limit = 8192
//! per_request_cap = 1024
//! namespace_uri = "http://www.iqunet.com"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{DaqError, DaqResult};

/// Vendor namespace the device browse names live in.
pub const DEFAULT_NAMESPACE_URI: &str = "http://www.iqunet.com";

/// Session policy and pagination budget.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AcquisitionConfig {
    /// Bound on connection establishment.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Backoff after a refused reconnect.
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    /// Guarded attempts before the final unguarded one.
    pub max_retries: usize,
    /// Total samples to accumulate per variable retrieval.
    pub total_limit: usize,
    /// Samples requested per history page.
    pub per_request_cap: usize,
    /// Namespace URI resolved once per session.
    pub namespace_uri: String,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: crate::session::CONNECT_TIMEOUT,
            retry_delay: crate::session::RETRY_DELAY,
            max_retries: crate::session::MAX_RETRIES,
            total_limit: 8192,
            per_request_cap: 1024,
            namespace_uri: DEFAULT_NAMESPACE_URI.to_string(),
        }
    }
}

impl AcquisitionConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> DaqResult<Self> {
        let settings: Self = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks semantic constraints that parsing cannot.
    pub fn validate(&self) -> DaqResult<()> {
        if self.per_request_cap < 1 {
            return Err(DaqError::Configuration(
                "per_request_cap must be at least 1".into(),
            ));
        }
        if self.max_retries < 1 {
            return Err(DaqError::Configuration(
                "max_retries must be at least 1".into(),
            ));
        }
        if self.namespace_uri.is_empty() {
            return Err(DaqError::Configuration(
                "namespace_uri cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_session_policy() {
        let config = AcquisitionConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert_eq!(config.retry_delay, Duration::from_secs(10));
        assert_eq!(config.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_page_cap_fails_validation() {
        let config = AcquisitionConfig {
            per_request_cap: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DaqError::Configuration(_))
        ));
    }

    #[test]
    fn deserializes_humantime_durations() {
        let config: AcquisitionConfig =
            toml_from_str("connect_timeout = \"2s\"\nretry_delay = \"500ms\"\n");
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.retry_delay, Duration::from_millis(500));
        assert_eq!(config.total_limit, 8192);
    }

    fn toml_from_str(raw: &str) -> AcquisitionConfig {
        config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .and_then(config::Config::try_deserialize)
            .expect("valid toml")
    }
}
