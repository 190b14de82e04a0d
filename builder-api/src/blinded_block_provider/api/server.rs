use crate::{
    blinded_block_provider::{BlindedBlockProvider, BLINDED_BLOCKS_PATH, STATUS_PATH, VALIDATORS_PATH},
    error::{ApiError, Error},
    types::{
        AuctionRequest, ExecutionPayload, SignedBlindedBeaconBlock, SignedValidatorRegistration,
        VersionedValue,
    },
};
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, IntoMakeService},
    Router,
};
use hyper::server::conn::AddrIncoming;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::task::JoinHandle;

/// Type alias for the configured axum server
pub type BlockProviderServer = axum::Server<AddrIncoming, IntoMakeService<Router>>;

async fn handle_status_check<B: BlindedBlockProvider>(
    Extension(builder): Extension<B>,
) -> Response {
    tracing::debug!("status check");

    match builder.check_status().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => {
            let code = StatusCode::SERVICE_UNAVAILABLE;
            let message = err.to_string();
            (code, Json(ApiError { code: code.as_u16(), message })).into_response()
        }
    }
}

async fn handle_validator_registration<B: BlindedBlockProvider>(
    Extension(builder): Extension<B>,
    Json(mut registrations): Json<Vec<SignedValidatorRegistration>>,
) -> Result<(), Error> {
    tracing::debug!(count = registrations.len(), "processing registrations");

    builder.register_validators(&mut registrations).await
}

async fn handle_fetch_bid<B: BlindedBlockProvider>(
    Extension(builder): Extension<B>,
    Path(auction_request): Path<AuctionRequest>,
) -> Result<Response, Error> {
    tracing::debug!(%auction_request, "fetching best bid");

    match builder.fetch_best_bid(&auction_request).await {
        Ok(signed_bid) => {
            let response = VersionedValue { version: signed_bid.version(), data: signed_bid };
            Ok(Json(response).into_response())
        }
        Err(Error::NoBidPrepared(..) | Error::NoRelayResponse) => {
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        Err(err) => Err(err),
    }
}

async fn handle_open_bid<B: BlindedBlockProvider>(
    Extension(builder): Extension<B>,
    Json(mut block): Json<SignedBlindedBeaconBlock>,
) -> Result<Json<VersionedValue<ExecutionPayload>>, Error> {
    let slot = block.message().slot();
    tracing::debug!(slot, "opening bid");

    let payload = builder.open_bid(&mut block).await?;

    let response = VersionedValue { version: payload.version(), data: payload };
    Ok(Json(response))
}

pub struct Server<B: BlindedBlockProvider> {
    host: Ipv4Addr,
    port: u16,
    builder: B,
}

impl<B: BlindedBlockProvider + Clone + Send + Sync + 'static> Server<B> {
    pub fn new(host: Ipv4Addr, port: u16, builder: B) -> Self {
        Self { host, port, builder }
    }

    /// Configures and returns the axum server
    pub fn serve(&self) -> Result<BlockProviderServer, hyper::Error> {
        let router = Router::new()
            .route(STATUS_PATH, get(handle_status_check::<B>))
            .route(VALIDATORS_PATH, post(handle_validator_registration::<B>))
            .route(
                "/eth/v1/builder/header/:slot/:parent_hash/:public_key",
                get(handle_fetch_bid::<B>),
            )
            .route(BLINDED_BLOCKS_PATH, post(handle_open_bid::<B>))
            .layer(Extension(self.builder.clone()));
        let addr = SocketAddr::from((self.host, self.port));
        Ok(axum::Server::try_bind(&addr)?.serve(router.into_make_service()))
    }

    /// Spawns the server on a new task returning the bound address and the handle for it
    pub fn spawn(&self) -> Result<(SocketAddr, JoinHandle<()>), hyper::Error> {
        let server = self.serve()?;
        let address = server.local_addr();
        let handle = tokio::spawn(async move {
            tracing::info!("listening at {address}...");
            if let Err(err) = server.await {
                tracing::error!(%err, "error while listening for incoming")
            }
        });
        Ok((address, handle))
    }
}
