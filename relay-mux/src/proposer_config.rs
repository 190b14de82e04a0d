//! The proposer config document: per-validator relay preferences, a default for every other
//! validator and named groups of relays that both can refer to.
//!
//! ```json
//! {
//!   "proposer_config": {
//!     "0xa1d1ad...": {
//!       "fee_recipient": "0x50155530fce8a85ec7055a5f8b2be214b3daca84",
//!       "builder": { "enabled": true, "gas_limit": "30000000", "relay_groups": ["ultrasound"] }
//!     }
//!   },
//!   "default_config": {
//!     "builder": { "enabled": true, "relays": ["https://0xac6e77...@relay.example"] }
//!   },
//!   "relay_groups": { "ultrasound": ["https://0xa1559a...@relay.ultrasound.money"] }
//! }
//! ```
use ethereum_consensus::primitives::ExecutionAddress;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProposerConfigFile {
    /// Keyed by the hex-encoded validator public key, in any case.
    #[serde(default)]
    pub proposer_config: HashMap<String, ProposerConfig>,
    #[serde(default)]
    pub default_config: Option<ProposerConfig>,
    #[serde(default)]
    pub relay_groups: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProposerConfig {
    #[serde(default)]
    pub fee_recipient: Option<ExecutionAddress>,
    #[serde(default)]
    pub builder: Option<BuilderConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuilderConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, with = "gas_limit")]
    pub gas_limit: Option<u64>,
    #[serde(default)]
    pub relays: Vec<String>,
    #[serde(default)]
    pub relay_groups: Vec<String>,
}

// Accepts both a decimal string and a number.
mod gas_limit {
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_str(&value.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        match Option::<Repr>::deserialize(deserializer)? {
            Some(Repr::Number(value)) => Ok(Some(value)),
            Some(Repr::Text(value)) => value.trim().parse().map(Some).map_err(de::Error::custom),
            None => Ok(None),
        }
    }
}
