mod auction;
mod config;
mod config_manager;
mod error;
mod fan_out;
mod proposer_config;
mod registry;
mod relay_mux;
mod service;

pub use auction::{BidKey, OutstandingBid};
pub use config::{Config, Timeouts, DEFAULT_BID_RETENTION_SLOTS};
pub use config_manager::{
    default_sync_interval, ConfigSource, FileSource, HttpSource, RelayConfigManager, SyncEvent,
    DEFAULT_FETCH_TIMEOUT,
};
pub use error::{ConfigError, Error};
pub use proposer_config::{BuilderConfig, ProposerConfig, ProposerConfigFile};
pub use registry::{RelayRegistry, RelaySet, ValidatorRelays};
pub use relay_mux::{Options, RelayMux};
pub use service::{Service, ServiceHandle};
