use builder_api::RelayEntryError;
use ethereum_consensus::{primitives::BlsPublicKey, Error as ConsensusError};
use std::{path::PathBuf, time::Duration};
use thiserror::Error;

fn proposer_label(proposer: &Option<BlsPublicKey>) -> String {
    match proposer {
        Some(public_key) => format!("proposer {public_key}"),
        None => "the default config".to_string(),
    }
}

/// Errors in the relay configuration, either from the service config or a proposer config
/// document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("builder is enabled for {} but no relays are configured", proposer_label(.proposer))]
    EmptyBuilderRelays { proposer: Option<BlsPublicKey> },
    #[error("invalid proposer public key `{key}`: {reason}")]
    InvalidProposerKey { key: String, reason: String },
    #[error("invalid relay `{relay}`: {source}")]
    InvalidRelay {
        relay: String,
        #[source]
        source: RelayEntryError,
    },
    #[error("unknown relay group `{0}`")]
    UnknownRelayGroup(String),
    #[error("only one of `proposer_config_file` and `proposer_config_url` can be set")]
    ConflictingSources,
    #[error("invalid proposer config URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("could not read proposer config from `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not fetch proposer config: {0}")]
    Http(#[from] reqwest::Error),
    #[error("could not parse proposer config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("timed out loading proposer config after {0:?}")]
    FetchTimeout(Duration),
    #[error("proposer config sync interval must be non-zero")]
    ZeroSyncInterval,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Consensus(#[from] ConsensusError),
    #[error("could not start Builder API server: {0}")]
    Server(#[from] hyper::Error),
    #[error("could not build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}
