use ethereum_consensus::primitives::{BlsPublicKey, Hash32, Slot};
use std::fmt;

/// The `getHeader` parameters identifying one proposer's auction for a slot.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AuctionRequest {
    #[serde(with = "crate::serde::as_str")]
    pub slot: Slot,
    /// Block the proposer builds on
    pub parent_hash: Hash32,
    pub public_key: BlsPublicKey,
}

impl fmt::Display for AuctionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { slot, parent_hash, public_key } = self;
        write!(f, "auction at slot {slot} on {parent_hash} for proposer {public_key}")
    }
}
