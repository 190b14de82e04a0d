mod auction_request;
mod builder_bid;

pub use auction_request::AuctionRequest;
pub use builder_bid::{BuilderBid, SignedBuilderBid};
pub use ethereum_consensus::{
    builder::{SignedValidatorRegistration, ValidatorRegistration},
    types::mainnet::{ExecutionPayload, ExecutionPayloadHeader, SignedBlindedBeaconBlock},
};

use ethereum_consensus::Fork;

/// Response envelope used by the Builder APIs for fork-dependent data.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VersionedValue<T> {
    pub version: Fork,
    pub data: T,
}
