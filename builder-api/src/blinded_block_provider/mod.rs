mod api;

pub use api::{client::Client, server::Server};

use crate::{
    error::Error,
    types::{
        AuctionRequest, ExecutionPayload, SignedBlindedBeaconBlock, SignedBuilderBid,
        SignedValidatorRegistration,
    },
};
use async_trait::async_trait;

pub const STATUS_PATH: &str = "/eth/v1/builder/status";
pub const VALIDATORS_PATH: &str = "/eth/v1/builder/validators";
pub const BLINDED_BLOCKS_PATH: &str = "/eth/v1/builder/blinded_blocks";

pub fn header_path(auction_request: &AuctionRequest) -> String {
    let AuctionRequest { slot, parent_hash, public_key } = auction_request;
    format!("/eth/v1/builder/header/{slot}/{parent_hash}/{public_key}")
}

/// The Builder APIs, as served to a proposer.
#[async_trait]
pub trait BlindedBlockProvider {
    async fn check_status(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn register_validators(
        &self,
        registrations: &mut [SignedValidatorRegistration],
    ) -> Result<(), Error>;

    async fn fetch_best_bid(
        &self,
        auction_request: &AuctionRequest,
    ) -> Result<SignedBuilderBid, Error>;

    async fn open_bid(
        &self,
        signed_block: &mut SignedBlindedBeaconBlock,
    ) -> Result<ExecutionPayload, Error>;
}
