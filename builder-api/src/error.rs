use crate::types::AuctionRequest;
use axum::{
    extract::Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ethereum_consensus::{
    primitives::{BlsPublicKey, Hash32, Slot},
    Error as ConsensusError,
};
use std::time::Duration;
use thiserror::Error;

/// Error body returned by services implementing the Builder APIs.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[error("{message} (code {code})")]
pub struct ApiError {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("bid public key {bid} does not match relay public key {relay}")]
    BidPublicKeyMismatch { bid: BlsPublicKey, relay: BlsPublicKey },
    #[error("bid parent hash {bid} does not match requested parent hash {requested}")]
    BidParentHashMismatch { bid: Hash32, requested: Hash32 },
    #[error("bid has zero value")]
    ZeroValueBid,
    #[error("no bid prepared for request {0}")]
    NoBidPrepared(Box<AuctionRequest>),
    #[error("no relay responded successfully")]
    NoRelayResponse,
    #[error("no winning bid known for block hash {block_hash} in slot {slot}")]
    UnknownOrExpiredHeader { slot: Slot, block_hash: Hash32 },
    #[error("payload has block hash {provided} but the winning bid committed to {expected}")]
    PayloadCommitmentMismatch { expected: Hash32, provided: Hash32 },
    #[error("could not open bid with relay {relay}: {source}")]
    PayloadUnavailable { relay: String, source: Box<Error> },
    #[error("invalid validator registration: {0}")]
    InvalidRegistration(String),
    #[error("relay did not respond within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Consensus(#[from] ConsensusError),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl Error {
    /// Failures to reach a relay, as opposed to a relay answering with an error or an invalid
    /// response. A body that does not decode counts as invalid.
    pub fn is_network(&self) -> bool {
        match self {
            Self::Http(err) => !err.is_decode(),
            Self::Timeout(..) | Self::NoBidPrepared(..) => true,
            _ => false,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Api(err) => StatusCode::from_u16(err.code).unwrap_or(StatusCode::BAD_GATEWAY),
            Self::NoBidPrepared(..) => StatusCode::NO_CONTENT,
            Self::NoRelayResponse |
            Self::PayloadUnavailable { .. } |
            Self::PayloadCommitmentMismatch { .. } |
            Self::Timeout(..) |
            Self::Http(..) => StatusCode::BAD_GATEWAY,
            Self::Consensus(..) | Self::Internal(..) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let code = self.status_code();
        let message = match self {
            Self::Api(err) => err.message,
            err => err.to_string(),
        };
        (code, Json(ApiError { code: code.as_u16(), message })).into_response()
    }
}
