use crate::blinded_block_provider::Client;
use ethereum_consensus::{primitives::BlsPublicKey, serde::try_bytes_from_hex_str};
use std::{cmp, fmt, hash, ops::Deref, str::FromStr, sync::Arc};
use thiserror::Error;
use url::Url;

pub const BLS_PUBLIC_KEY_BYTES_LEN: usize = 48;

// Compressed encoding of the point at infinity.
const INFINITY_PUBLIC_KEY_PREFIX: u8 = 0xc0;

#[derive(Debug, Error)]
pub enum RelayEntryError {
    #[error("could not parse relay URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("relay URL has unsupported scheme `{0}`")]
    UnsupportedScheme(String),
    #[error("relay URL is missing the relay public key")]
    MissingPublicKey,
    #[error("relay public key is not valid hex: {0}")]
    InvalidHex(String),
    #[error("public key has {actual} bytes but {expected} are required")]
    InvalidLength { expected: usize, actual: usize },
    #[error("public key is the zero or point-at-infinity encoding")]
    InvalidIdentity,
    #[error("relay public key is not a valid BLS public key: {0}")]
    InvalidPublicKey(String),
}

/// Checks that `bytes` could be the encoding of a usable BLS public key: it must have the right
/// length and must not be the all-zero or point-at-infinity encoding, neither of which can ever
/// verify a signature.
pub fn check_public_key_bytes(bytes: &[u8]) -> Result<(), RelayEntryError> {
    if bytes.len() != BLS_PUBLIC_KEY_BYTES_LEN {
        return Err(RelayEntryError::InvalidLength {
            expected: BLS_PUBLIC_KEY_BYTES_LEN,
            actual: bytes.len(),
        })
    }
    let (first, rest) = bytes.split_at(1);
    let rest_is_zero = rest.iter().all(|&b| b == 0);
    if rest_is_zero && (first[0] == 0 || first[0] == INFINITY_PUBLIC_KEY_PREFIX) {
        return Err(RelayEntryError::InvalidIdentity)
    }
    Ok(())
}

/// Appends `path` to `base`, keeping any path prefix of `base`.
pub(crate) fn join_path(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    url.set_path(&format!("{prefix}/{path}"));
    url
}

/// The identity and transport address of a relay.
///
/// Parsed from `[scheme://]pubkey@host[:port][/path]`. The public key is moved out of the URL so
/// that the URL can be used as a bare transport address.
#[derive(Clone, Debug)]
pub struct RelayEntry {
    public_key: BlsPublicKey,
    url: Url,
    canonical_url: String,
}

impl RelayEntry {
    pub fn public_key(&self) -> &BlsPublicKey {
        &self.public_key
    }

    /// Transport address of the relay, without credentials.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    pub fn request_uri(&self, path: &str) -> Url {
        join_path(&self.url, path)
    }
}

impl TryFrom<Url> for RelayEntry {
    type Error = RelayEntryError;

    fn try_from(mut url: Url) -> Result<Self, Self::Error> {
        match url.scheme() {
            "http" | "https" => {}
            scheme => return Err(RelayEntryError::UnsupportedScheme(scheme.to_string())),
        }

        let public_key = url.username();
        if public_key.is_empty() {
            return Err(RelayEntryError::MissingPublicKey)
        }
        let bytes = try_bytes_from_hex_str(public_key)
            .map_err(|err| RelayEntryError::InvalidHex(err.to_string()))?;
        check_public_key_bytes(&bytes)?;
        let public_key = BlsPublicKey::try_from(bytes.as_ref())
            .map_err(|err| RelayEntryError::InvalidPublicKey(err.to_string()))?;

        // NOTE: can only fail for URLs that cannot be a base, excluded by the scheme check
        let _ = url.set_username("");
        let _ = url.set_password(None);
        let canonical_url = url.as_str().trim_end_matches('/').to_string();

        Ok(Self { public_key, url, canonical_url })
    }
}

impl FromStr for RelayEntry {
    type Err = RelayEntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let url = if s.contains("://") { Url::parse(s)? } else { Url::parse(&format!("http://{s}"))? };
        Self::try_from(url)
    }
}

impl hash::Hash for RelayEntry {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.canonical_url.hash(state);
    }
}

impl cmp::PartialEq for RelayEntry {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_url == other.canonical_url
    }
}

impl cmp::Eq for RelayEntry {}

impl fmt::Display for RelayEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut url = self.url.clone();
        let _ = url.set_username(&self.public_key.to_string());
        f.write_str(url.as_str().trim_end_matches('/'))
    }
}

/// A [`RelayEntry`] together with a client for its Builder API.
#[derive(Clone)]
pub struct Relay {
    entry: Arc<RelayEntry>,
    api: Client,
}

impl Relay {
    /// Builds a client for `entry` on top of the shared `http` connection pool.
    pub fn new(entry: Arc<RelayEntry>, http: &reqwest::Client) -> Self {
        let api = Client::with_http_client(http.clone(), entry.url().clone());
        Self { entry, api }
    }

    pub fn entry(&self) -> &Arc<RelayEntry> {
        &self.entry
    }

    pub fn public_key(&self) -> &BlsPublicKey {
        self.entry.public_key()
    }
}

impl Deref for Relay {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.api
    }
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry.canonical_url())
    }
}

impl fmt::Display for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
