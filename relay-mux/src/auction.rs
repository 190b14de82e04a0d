use builder_api::{types::SignedBuilderBid, Error, RelayEntry};
use ethereum_consensus::{
    primitives::{BlsPublicKey, Hash32, Slot, U256},
    state_transition::Context,
};
use std::{collections::HashMap, fmt, sync::Arc};

/// Checks a bid returned by the relay with `relay_public_key` for an auction on `parent_hash`.
///
/// The signature is only checked when `verify_signature` is set.
pub(crate) fn validate_bid(
    bid: &mut SignedBuilderBid,
    relay_public_key: &BlsPublicKey,
    parent_hash: &Hash32,
    verify_signature: bool,
    context: &Context,
) -> Result<(), Error> {
    if &bid.message.public_key != relay_public_key {
        return Err(Error::BidPublicKeyMismatch {
            bid: bid.message.public_key.clone(),
            relay: relay_public_key.clone(),
        })
    }
    if bid.value() == &U256::default() {
        return Err(Error::ZeroValueBid)
    }
    if bid.parent_hash() != parent_hash {
        return Err(Error::BidParentHashMismatch {
            bid: bid.parent_hash().clone(),
            requested: parent_hash.clone(),
        })
    }
    if verify_signature {
        bid.verify_signature(context)?;
    }
    Ok(())
}

#[derive(Debug)]
pub(crate) struct Winner {
    pub relay: Arc<RelayEntry>,
    pub bid: SignedBuilderBid,
}

/// Reduces relay responses, in the order they arrive, to the most valuable bid.
#[derive(Debug, Default)]
pub(crate) struct Auction {
    leader: Option<Winner>,
    last_error: Option<Error>,
}

impl Auction {
    /// Returns `true` if `bid` became the leader. Bids of equal value never replace the leader.
    pub fn offer(&mut self, relay: Arc<RelayEntry>, bid: SignedBuilderBid) -> bool {
        let is_better = match &self.leader {
            Some(leader) => bid.value() > leader.bid.value(),
            None => true,
        };
        if is_better {
            self.leader = Some(Winner { relay, bid });
        }
        is_better
    }

    pub fn fail(&mut self, err: Error) {
        if !err.is_network() {
            self.last_error = Some(err);
        }
    }

    pub fn conclude(self) -> Result<Winner, Error> {
        match self.leader {
            Some(winner) => Ok(winner),
            None => Err(self.last_error.unwrap_or(Error::NoRelayResponse)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BidKey {
    pub slot: Slot,
    pub block_hash: Hash32,
}

/// The winning bid of an auction, kept until the proposer asks to open it.
#[derive(Debug, Clone)]
pub struct OutstandingBid {
    pub relay: Arc<RelayEntry>,
    pub parent_hash: Hash32,
    pub block_hash: Hash32,
    pub value: U256,
}

impl fmt::Display for OutstandingBid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { relay, parent_hash, block_hash, value } = self;
        write!(f, "block {block_hash} on {parent_hash} worth {value} from {relay}")
    }
}

#[derive(Debug)]
pub(crate) struct BidCache {
    bids: HashMap<BidKey, OutstandingBid>,
    newest_slot: Slot,
    retention_slots: Slot,
}

impl BidCache {
    pub fn new(retention_slots: Slot) -> Self {
        Self { bids: Default::default(), newest_slot: 0, retention_slots }
    }

    pub fn insert(&mut self, key: BidKey, bid: OutstandingBid) {
        self.newest_slot = self.newest_slot.max(key.slot);
        self.bids.insert(key, bid);

        let horizon = self.newest_slot.saturating_sub(self.retention_slots);
        self.bids.retain(|key, _| key.slot >= horizon);
    }

    pub fn get(&self, key: &BidKey) -> Option<&OutstandingBid> {
        self.bids.get(key)
    }

    pub fn len(&self) -> usize {
        self.bids.len()
    }
}
