use crate::{
    config_manager::{default_sync_interval, ConfigSource, FileSource, HttpSource},
    error::ConfigError,
};
use ethereum_consensus::{primitives::Slot, state_transition::Context};
use serde::{Deserialize, Serialize};
use std::{net::Ipv4Addr, path::PathBuf, time::Duration};
use url::Url;

pub const DEFAULT_BID_RETENTION_SLOTS: Slot = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: Ipv4Addr,
    pub port: u16,
    pub relays: Vec<String>,
    /// Verify the signature of every bid before it enters the auction.
    pub relay_check: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposer_config_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposer_config_url: Option<String>,
    /// Defaults to half an epoch of the configured network.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_sync_interval_secs: Option<u64>,
    pub bid_retention_slots: Slot,
    pub timeouts: Timeouts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED,
            port: 18550,
            relays: vec![],
            relay_check: true,
            proposer_config_file: None,
            proposer_config_url: None,
            config_sync_interval_secs: None,
            bid_retention_slots: DEFAULT_BID_RETENTION_SLOTS,
            timeouts: Timeouts::default(),
        }
    }
}

impl Config {
    /// The configured source of proposer config documents, if any.
    pub fn config_source(
        &self,
        http: &reqwest::Client,
    ) -> Result<Option<Box<dyn ConfigSource>>, ConfigError> {
        match (&self.proposer_config_file, &self.proposer_config_url) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingSources),
            (Some(path), None) => Ok(Some(Box::new(FileSource::new(path.clone())))),
            (None, Some(url)) => {
                let url = Url::parse(url)?;
                Ok(Some(Box::new(HttpSource::new(http.clone(), url))))
            }
            (None, None) => Ok(None),
        }
    }

    /// How often to re-read the proposer config document. Must be non-zero.
    pub fn sync_interval(&self, context: &Context) -> Result<Duration, ConfigError> {
        let interval = self
            .config_sync_interval_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| default_sync_interval(context));
        if interval.is_zero() {
            return Err(ConfigError::ZeroSyncInterval)
        }
        Ok(interval)
    }
}

/// Per-relay deadlines for each Builder API call, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub get_header_ms: u64,
    pub get_payload_ms: u64,
    pub register_validator_ms: u64,
    pub status_ms: u64,
    /// Deadline for loading the proposer config document.
    pub proposer_config_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            get_header_ms: 950,
            get_payload_ms: 4000,
            register_validator_ms: 3000,
            status_ms: 2000,
            proposer_config_ms: 10_000,
        }
    }
}

impl Timeouts {
    pub fn get_header(&self) -> Duration {
        Duration::from_millis(self.get_header_ms)
    }

    pub fn get_payload(&self) -> Duration {
        Duration::from_millis(self.get_payload_ms)
    }

    pub fn register_validator(&self) -> Duration {
        Duration::from_millis(self.register_validator_ms)
    }

    pub fn status(&self) -> Duration {
        Duration::from_millis(self.status_ms)
    }

    pub fn proposer_config(&self) -> Duration {
        Duration::from_millis(self.proposer_config_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = r#"{ "port": 18551, "timeouts": { "get_header_ms": 100 } }"#;
        let config: Config = serde_json::from_str(config).unwrap();
        assert_eq!(config.port, 18551);
        assert_eq!(config.host, Ipv4Addr::UNSPECIFIED);
        assert!(config.relay_check);
        assert_eq!(config.bid_retention_slots, 64);
        assert_eq!(config.timeouts.get_header(), Duration::from_millis(100));
        assert_eq!(config.timeouts.get_payload(), Duration::from_secs(4));
    }

    #[test]
    fn test_config_source() {
        let http = reqwest::Client::new();

        let config = Config::default();
        assert!(config.config_source(&http).unwrap().is_none());

        let config =
            Config { proposer_config_file: Some("proposers.json".into()), ..Default::default() };
        assert_eq!(config.config_source(&http).unwrap().unwrap().to_string(), "proposers.json");

        let config = Config {
            proposer_config_url: Some("https://config.example/proposers.json".to_string()),
            ..Default::default()
        };
        assert!(config.config_source(&http).unwrap().is_some());

        let config = Config {
            proposer_config_file: Some("proposers.json".into()),
            proposer_config_url: Some("https://config.example/proposers.json".to_string()),
            ..Default::default()
        };
        assert!(matches!(config.config_source(&http), Err(ConfigError::ConflictingSources)));

        let config =
            Config { proposer_config_url: Some("not a url".to_string()), ..Default::default() };
        assert!(matches!(config.config_source(&http), Err(ConfigError::Url(..))));
    }

    #[test]
    fn test_sync_interval() {
        let context = Context::for_mainnet();

        let config = Config::default();
        assert_eq!(config.sync_interval(&context).unwrap(), Duration::from_secs(192));

        let config = Config { config_sync_interval_secs: Some(30), ..Default::default() };
        assert_eq!(config.sync_interval(&context).unwrap(), Duration::from_secs(30));

        let config = Config { config_sync_interval_secs: Some(0), ..Default::default() };
        assert!(matches!(config.sync_interval(&context), Err(ConfigError::ZeroSyncInterval)));

        let mut context = Context::for_mainnet();
        context.slots_per_epoch = 1;
        context.seconds_per_slot = 1;
        let config = Config::default();
        assert!(matches!(config.sync_interval(&context), Err(ConfigError::ZeroSyncInterval)));
    }
}
