use crate::{
    auction::{validate_bid, Auction, BidCache, BidKey, OutstandingBid, Winner},
    config::{Config, Timeouts},
    config_manager::RelayConfigManager,
    fan_out::{call_with_timeout, fan_out},
    registry::RelaySet,
};
use async_trait::async_trait;
use builder_api::{
    relay::{check_public_key_bytes, BLS_PUBLIC_KEY_BYTES_LEN},
    types::{
        AuctionRequest, ExecutionPayload, SignedBlindedBeaconBlock, SignedBuilderBid,
        SignedValidatorRegistration,
    },
    BlindedBlockProvider, Error, Relay, RelayEntry,
};
use ethereum_consensus::{primitives::Slot, ssz::prelude::serialize, state_transition::Context};
use futures::StreamExt;
use parking_lot::Mutex;
use std::{collections::HashMap, ops::Deref, sync::Arc};

const BLS_SIGNATURE_BYTES_LEN: usize = 96;

/// Settings of a [`RelayMux`] taken from the service [`Config`].
#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub timeouts: Timeouts,
    pub relay_check: bool,
    pub bid_retention_slots: Slot,
}

impl From<&Config> for Options {
    fn from(config: &Config) -> Self {
        Self {
            timeouts: config.timeouts,
            relay_check: config.relay_check,
            bid_retention_slots: config.bid_retention_slots,
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Multiplexes the Builder API across the relays in the current [`RelayRegistry`].
///
/// [`RelayRegistry`]: crate::RelayRegistry
#[derive(Clone)]
pub struct RelayMux(Arc<Inner>);

impl Deref for RelayMux {
    type Target = Inner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub struct Inner {
    config_manager: Arc<RelayConfigManager>,
    http: reqwest::Client,
    context: Arc<Context>,
    options: Options,
    state: Mutex<BidCache>,
}

impl RelayMux {
    pub fn new(
        config_manager: Arc<RelayConfigManager>,
        http: reqwest::Client,
        context: Arc<Context>,
        options: Options,
    ) -> Self {
        let state = Mutex::new(BidCache::new(options.bid_retention_slots));
        let inner = Inner { config_manager, http, context, options, state };
        Self(Arc::new(inner))
    }

    pub fn outstanding_bid(&self, key: &BidKey) -> Option<OutstandingBid> {
        self.state.lock().get(key).cloned()
    }

    fn relays<'a>(&'a self, set: &'a RelaySet) -> impl Iterator<Item = Relay> + 'a {
        set.iter().map(|entry| Relay::new(entry.clone(), &self.http))
    }
}

fn check_registration(registration: &SignedValidatorRegistration) -> Result<(), Error> {
    let public_key = &registration.message.public_key;
    let encoding =
        serialize(public_key).map_err(|err| Error::InvalidRegistration(err.to_string()))?;
    if encoding.len() != BLS_PUBLIC_KEY_BYTES_LEN {
        return Err(Error::InvalidRegistration(format!("public key has {} bytes", encoding.len())))
    }
    check_public_key_bytes(&encoding)
        .map_err(|err| Error::InvalidRegistration(format!("{err} for validator {public_key}")))?;

    let encoding = serialize(&registration.signature)
        .map_err(|err| Error::InvalidRegistration(err.to_string()))?;
    if encoding.len() != BLS_SIGNATURE_BYTES_LEN {
        return Err(Error::InvalidRegistration(format!("signature has {} bytes", encoding.len())))
    }
    Ok(())
}

#[async_trait]
impl BlindedBlockProvider for RelayMux {
    async fn check_status(&self) -> Result<(), Error> {
        let registry = self.config_manager.current();
        let relays = registry.all_relays();

        let calls = self.relays(&relays).map(|relay| {
            let api = relay.clone();
            (relay, async move { api.check_status().await })
        });
        let mut responses = fan_out(calls, self.options.timeouts.status());

        let mut healthy = false;
        while let Some((relay, response)) = responses.next().await {
            match response {
                Ok(()) => healthy = true,
                Err(err) => tracing::warn!(%relay, %err, "relay failed status check"),
            }
        }

        if healthy {
            Ok(())
        } else {
            Err(Error::NoRelayResponse)
        }
    }

    async fn register_validators(
        &self,
        registrations: &mut [SignedValidatorRegistration],
    ) -> Result<(), Error> {
        if registrations.is_empty() {
            return Err(Error::InvalidRegistration("no registrations provided".to_string()))
        }
        for registration in registrations.iter() {
            check_registration(registration)?;
        }

        let registry = self.config_manager.current();
        let mut batches: HashMap<Arc<RelayEntry>, Vec<SignedValidatorRegistration>> =
            HashMap::new();
        let mut opted_out = 0;
        for registration in registrations.iter() {
            let public_key = &registration.message.public_key;
            if registry.is_opted_out(public_key) {
                opted_out += 1;
                continue
            }
            for relay in &registry.relays_for_registration(public_key) {
                batches.entry(relay.clone()).or_default().push(registration.clone());
            }
        }

        if batches.is_empty() {
            return if opted_out == registrations.len() {
                tracing::debug!(opted_out, "every validator opted out of external block building");
                Ok(())
            } else {
                Err(Error::NoRelayResponse)
            }
        }

        let calls = batches.into_iter().map(|(entry, batch)| {
            let relay = Relay::new(entry, &self.http);
            let api = relay.clone();
            (relay, async move { api.register_validators(&batch).await })
        });
        let mut responses = fan_out(calls, self.options.timeouts.register_validator());

        let mut successes = 0;
        let mut last_error = None;
        while let Some((relay, response)) = responses.next().await {
            match response {
                Ok(()) => successes += 1,
                Err(err) => {
                    tracing::warn!(%relay, %err, "failed to register validators with relay");
                    last_error = Some(err);
                }
            }
        }

        tracing::debug!(count = registrations.len(), successes, "processed registrations");
        if successes > 0 {
            Ok(())
        } else {
            Err(last_error.unwrap_or(Error::NoRelayResponse))
        }
    }

    async fn fetch_best_bid(
        &self,
        auction_request: &AuctionRequest,
    ) -> Result<SignedBuilderBid, Error> {
        let registry = self.config_manager.current();
        let relays = registry.relays_for_validator(&auction_request.public_key);
        if relays.is_empty() {
            tracing::debug!(%auction_request, "no relays in scope for proposer");
            return Err(Error::NoRelayResponse)
        }

        let calls = self.relays(&relays).map(|relay| {
            let api = relay.clone();
            let auction_request = auction_request.clone();
            (relay, async move { api.fetch_best_bid(&auction_request).await })
        });
        let mut responses = fan_out(calls, self.options.timeouts.get_header());

        let mut auction = Auction::default();
        while let Some((relay, response)) = responses.next().await {
            let result = response.and_then(|mut bid| {
                validate_bid(
                    &mut bid,
                    relay.public_key(),
                    &auction_request.parent_hash,
                    self.options.relay_check,
                    &self.context,
                )
                .map(|_| bid)
            });
            match result {
                Ok(bid) => {
                    tracing::debug!(%relay, %bid, "received bid");
                    auction.offer(relay.entry().clone(), bid);
                }
                Err(err) if err.is_network() => {
                    tracing::debug!(%relay, %err, "no bid from relay");
                    auction.fail(err);
                }
                Err(err) => {
                    tracing::warn!(%relay, %err, %auction_request, "invalid bid from relay");
                    auction.fail(err);
                }
            }
        }

        let Winner { relay, bid } = auction.conclude()?;
        let key = BidKey { slot: auction_request.slot, block_hash: bid.block_hash().clone() };
        let outstanding_bid = OutstandingBid {
            relay: relay.clone(),
            parent_hash: bid.parent_hash().clone(),
            block_hash: bid.block_hash().clone(),
            value: bid.value().clone(),
        };
        let cached_bids = {
            let mut state = self.state.lock();
            state.insert(key, outstanding_bid);
            state.len()
        };

        tracing::info!(
            %auction_request,
            relay = relay.canonical_url(),
            %bid,
            cached_bids,
            "selected winning bid"
        );
        Ok(bid)
    }

    async fn open_bid(
        &self,
        signed_block: &mut SignedBlindedBeaconBlock,
    ) -> Result<ExecutionPayload, Error> {
        let key = {
            let block = signed_block.message();
            let body = block.body();
            let header = body.execution_payload_header();
            BidKey { slot: block.slot(), block_hash: header.block_hash().clone() }
        };

        let outstanding_bid = self.outstanding_bid(&key).ok_or_else(|| {
            Error::UnknownOrExpiredHeader { slot: key.slot, block_hash: key.block_hash.clone() }
        })?;

        let relay = Relay::new(outstanding_bid.relay.clone(), &self.http);
        let api = relay.clone();
        let block = signed_block.clone();
        let payload = call_with_timeout(self.options.timeouts.get_payload(), async move {
            api.open_bid(&block).await
        })
        .await
        .map_err(|err| {
            tracing::warn!(%relay, %err, slot = key.slot, "could not open bid");
            Error::PayloadUnavailable { relay: relay.to_string(), source: Box::new(err) }
        })?;

        let block_hash = payload.block_hash();
        if block_hash != &outstanding_bid.block_hash {
            tracing::warn!(%relay, %block_hash, "relay returned payload for a different block");
            return Err(Error::PayloadCommitmentMismatch {
                expected: outstanding_bid.block_hash,
                provided: block_hash.clone(),
            })
        }

        tracing::info!(slot = key.slot, %outstanding_bid, "opened bid");
        Ok(payload)
    }
}
