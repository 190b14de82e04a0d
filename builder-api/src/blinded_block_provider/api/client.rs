use crate::{
    blinded_block_provider::{header_path, BLINDED_BLOCKS_PATH, STATUS_PATH, VALIDATORS_PATH},
    error::{ApiError, Error},
    relay::join_path,
    types::{
        AuctionRequest, ExecutionPayload, SignedBlindedBeaconBlock, SignedBuilderBid,
        SignedValidatorRegistration, VersionedValue,
    },
};
use reqwest::{Response, StatusCode};
use url::Url;

/// A `Client` for a service implementing the Builder APIs.
/// Note that `Client` does not implement the `BlindedBlockProvider` trait so that
/// it can provide more flexibility to callers with respect to the types
/// it accepts.
#[derive(Clone, Debug)]
pub struct Client {
    http: reqwest::Client,
    endpoint: Url,
}

impl Client {
    pub fn new(endpoint: Url) -> Self {
        Self::with_http_client(reqwest::Client::new(), endpoint)
    }

    /// Reuses the connection pool of `http`.
    pub fn with_http_client(http: reqwest::Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn check_status(&self) -> Result<(), Error> {
        let response = self.http.get(join_path(&self.endpoint, STATUS_PATH)).send().await?;
        api_error_or_ok(response).await.map(|_| ())
    }

    pub async fn register_validators(
        &self,
        registrations: &[SignedValidatorRegistration],
    ) -> Result<(), Error> {
        let target = join_path(&self.endpoint, VALIDATORS_PATH);
        let response = self.http.post(target).json(registrations).send().await?;
        api_error_or_ok(response).await.map(|_| ())
    }

    pub async fn fetch_best_bid(
        &self,
        auction_request: &AuctionRequest,
    ) -> Result<SignedBuilderBid, Error> {
        let target = join_path(&self.endpoint, &header_path(auction_request));
        let response = self.http.get(target).send().await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Err(Error::NoBidPrepared(Box::new(auction_request.clone())))
        }

        let response = api_error_or_ok(response).await?;
        let result: VersionedValue<SignedBuilderBid> = response.json().await?;
        Ok(result.data)
    }

    pub async fn open_bid(
        &self,
        signed_block: &SignedBlindedBeaconBlock,
    ) -> Result<ExecutionPayload, Error> {
        let target = join_path(&self.endpoint, BLINDED_BLOCKS_PATH);
        let response = self.http.post(target).json(signed_block).send().await?;

        let response = api_error_or_ok(response).await?;
        let result: VersionedValue<ExecutionPayload> = response.json().await?;
        Ok(result.data)
    }
}

// Returns the response if it carries a success status, otherwise the error reported by the
// remote service. Bodies that are not an `ApiError` are passed along verbatim.
async fn api_error_or_ok(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response)
    }

    let body = response.text().await?;
    let err = serde_json::from_str::<ApiError>(&body)
        .unwrap_or_else(|_| ApiError { code: status.as_u16(), message: body });
    Err(err.into())
}
