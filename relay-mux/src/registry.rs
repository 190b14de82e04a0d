use crate::{
    error::ConfigError,
    proposer_config::{BuilderConfig, ProposerConfigFile},
};
use builder_api::{relay::check_public_key_bytes, RelayEntry};
use ethereum_consensus::{primitives::BlsPublicKey, serde::try_bytes_from_hex_str};
use std::{collections::HashMap, slice, str::FromStr, sync::Arc};

/// An ordered set of relays, unique by URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelaySet(Vec<Arc<RelayEntry>>);

impl RelaySet {
    /// Parses every entry of `relays`, ignoring blank ones.
    pub fn parse<I, S>(relays: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for relay in relays {
            let relay = relay.as_ref();
            if relay.trim().is_empty() {
                continue
            }
            let entry = RelayEntry::from_str(relay)
                .map_err(|source| ConfigError::InvalidRelay { relay: relay.to_string(), source })?;
            set.insert(Arc::new(entry));
        }
        Ok(set)
    }

    /// Returns `false` if a relay with the same URL is already present.
    pub fn insert(&mut self, relay: Arc<RelayEntry>) -> bool {
        if self.contains(&relay) {
            return false
        }
        self.0.push(relay);
        true
    }

    pub fn extend(&mut self, other: &RelaySet) {
        for relay in other {
            self.insert(relay.clone());
        }
    }

    pub fn contains(&self, relay: &RelayEntry) -> bool {
        self.0.iter().any(|entry| entry.as_ref() == relay)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Arc<RelayEntry>> {
        self.0.iter()
    }
}

impl FromIterator<Arc<RelayEntry>> for RelaySet {
    fn from_iter<T: IntoIterator<Item = Arc<RelayEntry>>>(iter: T) -> Self {
        let mut set = Self::default();
        for relay in iter {
            set.insert(relay);
        }
        set
    }
}

impl<'a> IntoIterator for &'a RelaySet {
    type Item = &'a Arc<RelayEntry>;
    type IntoIter = slice::Iter<'a, Arc<RelayEntry>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatorRelays {
    Enabled(RelaySet),
    /// The validator opted out of external block building.
    Disabled,
}

/// Snapshot of which relays serve which validators.
#[derive(Debug, Clone, Default)]
pub struct RelayRegistry {
    default_relays: RelaySet,
    validators: HashMap<BlsPublicKey, ValidatorRelays>,
}

impl RelayRegistry {
    pub fn from_relays(default_relays: RelaySet) -> Self {
        Self { default_relays, validators: Default::default() }
    }

    /// Builds a registry from a proposer config `document`. `fallback` serves every validator
    /// without an entry unless the document carries a `default_config` with a builder block.
    pub fn build(document: &ProposerConfigFile, fallback: &RelaySet) -> Result<Self, ConfigError> {
        let default_builder =
            document.default_config.as_ref().and_then(|config| config.builder.as_ref());
        let default_relays = match default_builder {
            Some(builder) if builder.enabled => {
                let relays = resolve_relays(builder, &document.relay_groups)?;
                if relays.is_empty() {
                    return Err(ConfigError::EmptyBuilderRelays { proposer: None })
                }
                relays
            }
            Some(_) => RelaySet::default(),
            None => fallback.clone(),
        };

        let mut validators = HashMap::with_capacity(document.proposer_config.len());
        for (key, config) in &document.proposer_config {
            let public_key = parse_proposer_key(key)?;
            let relays = match config.builder.as_ref() {
                Some(builder) if builder.enabled => {
                    let relays = resolve_relays(builder, &document.relay_groups)?;
                    if relays.is_empty() {
                        return Err(ConfigError::EmptyBuilderRelays { proposer: Some(public_key) })
                    }
                    ValidatorRelays::Enabled(relays)
                }
                _ => ValidatorRelays::Disabled,
            };
            validators.insert(public_key, relays);
        }

        Ok(Self { default_relays, validators })
    }

    pub fn default_relays(&self) -> &RelaySet {
        &self.default_relays
    }

    pub fn validator(&self, public_key: &BlsPublicKey) -> Option<&ValidatorRelays> {
        self.validators.get(public_key)
    }

    pub fn is_opted_out(&self, public_key: &BlsPublicKey) -> bool {
        matches!(self.validators.get(public_key), Some(ValidatorRelays::Disabled))
    }

    /// Relays to query for a bid on behalf of `public_key`.
    pub fn relays_for_validator(&self, public_key: &BlsPublicKey) -> RelaySet {
        match self.validators.get(public_key) {
            Some(ValidatorRelays::Enabled(relays)) if !relays.is_empty() => relays.clone(),
            Some(ValidatorRelays::Disabled) => RelaySet::default(),
            _ => self.default_relays.clone(),
        }
    }

    /// Relays that should learn about the registration of `public_key`. Validators without an
    /// entry register with every known relay.
    pub fn relays_for_registration(&self, public_key: &BlsPublicKey) -> RelaySet {
        match self.validators.get(public_key) {
            Some(ValidatorRelays::Enabled(relays)) if !relays.is_empty() => relays.clone(),
            Some(ValidatorRelays::Disabled) => RelaySet::default(),
            _ => self.all_relays(),
        }
    }

    pub fn all_relays(&self) -> RelaySet {
        let mut relays = self.default_relays.clone();
        for validator in self.validators.values() {
            if let ValidatorRelays::Enabled(set) = validator {
                relays.extend(set);
            }
        }
        relays
    }
}

fn parse_proposer_key(key: &str) -> Result<BlsPublicKey, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidProposerKey { key: key.to_string(), reason };
    let bytes = try_bytes_from_hex_str(key.trim()).map_err(|err| invalid(err.to_string()))?;
    check_public_key_bytes(&bytes).map_err(|err| invalid(err.to_string()))?;
    BlsPublicKey::try_from(bytes.as_ref()).map_err(|err| invalid(err.to_string()))
}

fn resolve_relays(
    builder: &BuilderConfig,
    groups: &HashMap<String, Vec<String>>,
) -> Result<RelaySet, ConfigError> {
    let mut relays = RelaySet::parse(&builder.relays)?;
    for name in &builder.relay_groups {
        let group = groups.get(name).ok_or_else(|| ConfigError::UnknownRelayGroup(name.clone()))?;
        relays.extend(&RelaySet::parse(group)?);
    }
    Ok(relays)
}
