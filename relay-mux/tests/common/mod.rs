use async_trait::async_trait;
use builder_api::{
    blinded_block_provider::Server,
    types::{
        AuctionRequest, BuilderBid, ExecutionPayload, ExecutionPayloadHeader,
        SignedBlindedBeaconBlock, SignedBuilderBid, SignedValidatorRegistration,
    },
    ApiError, BlindedBlockProvider, Error,
};
use ethereum_consensus::{
    capella::mainnet as capella,
    crypto::SecretKey,
    primitives::{BlsPublicKey, Hash32, U256},
    state_transition::Context,
};
use parking_lot::Mutex;
use std::{
    net::Ipv4Addr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

pub fn setup_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "error".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

pub fn hash(byte: u8) -> Hash32 {
    Hash32::try_from([byte; 32].as_ref()).unwrap()
}

/// How a [`MockRelay`] answers requests.
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    /// `None` answers `getHeader` with no content.
    pub bid_value: Option<u64>,
    pub delay: Duration,
    pub block_hash: u8,
    /// Sign bids with a key other than the relay's own.
    pub forge_signature: bool,
    pub registration_error: Option<u16>,
    /// Reveal a payload with this block hash instead of the committed one.
    pub payload_block_hash: Option<u8>,
}

impl Behavior {
    pub fn bid(value: u64, block_hash: u8) -> Self {
        Self { bid_value: Some(value), block_hash, ..Default::default() }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub status: AtomicUsize,
    pub registrations: AtomicUsize,
    pub headers: AtomicUsize,
    pub payloads: AtomicUsize,
}

fn count(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

/// A relay speaking the Builder API that records how often it was called.
#[derive(Clone)]
pub struct MockRelay {
    signing_key: SecretKey,
    context: Arc<Context>,
    behavior: Arc<Mutex<Behavior>>,
    counters: Arc<Counters>,
    registered: Arc<Mutex<Vec<BlsPublicKey>>>,
}

impl MockRelay {
    pub fn new(seed: u8, behavior: Behavior) -> Self {
        let signing_key = SecretKey::try_from([seed; 32].as_ref()).unwrap();
        Self {
            signing_key,
            context: Arc::new(Context::for_mainnet()),
            behavior: Arc::new(Mutex::new(behavior)),
            counters: Default::default(),
            registered: Default::default(),
        }
    }

    pub fn public_key(&self) -> BlsPublicKey {
        self.signing_key.public_key()
    }

    /// Serves the relay on an ephemeral port and returns its relay URL.
    pub fn spawn(&self) -> String {
        let server = Server::new(Ipv4Addr::LOCALHOST, 0, self.clone());
        let (address, _) = server.spawn().unwrap();
        format!("http://{}@{address}", self.public_key())
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn registered(&self) -> Vec<BlsPublicKey> {
        self.registered.lock().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.counters.status.load(Ordering::SeqCst)
    }

    pub fn registration_calls(&self) -> usize {
        self.counters.registrations.load(Ordering::SeqCst)
    }

    pub fn header_calls(&self) -> usize {
        self.counters.headers.load(Ordering::SeqCst)
    }

    pub fn payload_calls(&self) -> usize {
        self.counters.payloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlindedBlockProvider for MockRelay {
    async fn check_status(&self) -> Result<(), Error> {
        count(&self.counters.status);
        Ok(())
    }

    async fn register_validators(
        &self,
        registrations: &mut [SignedValidatorRegistration],
    ) -> Result<(), Error> {
        count(&self.counters.registrations);
        let registration_error = self.behavior.lock().registration_error;
        if let Some(code) = registration_error {
            let message = "registration rejected".to_string();
            return Err(ApiError { code, message }.into())
        }
        let mut registered = self.registered.lock();
        registered.extend(registrations.iter().map(|r| r.message.public_key.clone()));
        Ok(())
    }

    async fn fetch_best_bid(
        &self,
        auction_request: &AuctionRequest,
    ) -> Result<SignedBuilderBid, Error> {
        count(&self.counters.headers);
        let behavior = self.behavior.lock().clone();
        tokio::time::sleep(behavior.delay).await;

        let value = behavior
            .bid_value
            .ok_or_else(|| Error::NoBidPrepared(Box::new(auction_request.clone())))?;
        let header = capella::ExecutionPayloadHeader {
            parent_hash: auction_request.parent_hash.clone(),
            block_hash: hash(behavior.block_hash),
            ..Default::default()
        };
        let bid = BuilderBid {
            header: ExecutionPayloadHeader::Capella(header),
            value: U256::from(value),
            public_key: self.public_key(),
        };
        if behavior.forge_signature {
            let forger = SecretKey::try_from([99u8; 32].as_ref()).unwrap();
            bid.sign(&forger, &self.context).map_err(Into::into)
        } else {
            bid.sign(&self.signing_key, &self.context).map_err(Into::into)
        }
    }

    async fn open_bid(
        &self,
        signed_block: &mut SignedBlindedBeaconBlock,
    ) -> Result<ExecutionPayload, Error> {
        count(&self.counters.payloads);
        let (parent_hash, block_hash) = {
            let block = signed_block.message();
            let body = block.body();
            let header = body.execution_payload_header();
            (header.parent_hash().clone(), header.block_hash().clone())
        };
        let block_hash = match self.behavior.lock().payload_block_hash {
            Some(byte) => hash(byte),
            None => block_hash,
        };
        let payload = capella::ExecutionPayload { parent_hash, block_hash, ..Default::default() };
        Ok(ExecutionPayload::Capella(payload))
    }
}
