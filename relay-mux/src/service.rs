use crate::{
    config::Config,
    config_manager::{RelayConfigManager, SyncEvent},
    error::Error,
    registry::RelaySet,
    relay_mux::{Options, RelayMux},
};
use builder_api::blinded_block_provider::Server;
use ethereum_consensus::{networks::Network, state_transition::Context};
use std::{
    future::Future,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::Poll,
    time::UNIX_EPOCH,
};
use tokio::{
    sync::oneshot,
    task::{JoinError, JoinHandle},
};

fn log_sync_event(event: SyncEvent) {
    let at = event.at.duration_since(UNIX_EPOCH).map(|at| at.as_secs()).unwrap_or_default();
    match event.error {
        Some(err) => {
            tracing::error!(%err, at, "could not sync proposer config; keeping previous relays")
        }
        None => tracing::debug!(at, "synced proposer config"),
    }
}

pub struct Service {
    network: Network,
    config: Config,
}

impl Service {
    pub fn from(network: Network, config: Config) -> Self {
        Self { network, config }
    }

    /// Loads the relay configuration and spawns the [`RelayMux`] behind a Builder API server,
    /// along with a task keeping the relay configuration in sync.
    ///
    /// Fails if the initial relay configuration cannot be loaded. `context` overrides the
    /// consensus context derived from the configured network.
    pub async fn spawn(self, context: Option<Context>) -> Result<ServiceHandle, Error> {
        let Self { network, config } = self;

        let context = match context {
            Some(context) => context,
            None => Context::try_from(network)?,
        };
        let context = Arc::new(context);

        let http = reqwest::Client::builder().build()?;

        let fallback = RelaySet::parse(&config.relays)?;
        let source = config.config_source(&http)?;
        if fallback.is_empty() && source.is_none() {
            tracing::warn!("no relays configured; every request will fail");
        }

        let sync_interval = match source {
            Some(_) => Some(config.sync_interval(&context)?),
            None => None,
        };

        let config_manager = RelayConfigManager::new(fallback, source)
            .with_fetch_timeout(config.timeouts.proposer_config());
        let config_manager = Arc::new(config_manager);
        config_manager.sync().await?;
        let registry = config_manager.current();
        tracing::info!(relays = registry.all_relays().len(), "loaded relay configuration");
        for relay in registry.all_relays().iter() {
            tracing::info!(relay = relay.canonical_url(), "configured relay");
        }

        let relay_mux =
            RelayMux::new(config_manager.clone(), http, context.clone(), Options::from(&config));
        let (address, server) = Server::new(config.host, config.port, relay_mux).spawn()?;

        let (shutdown, shutdown_signal) = oneshot::channel();
        let config_sync = if let Some(interval) = sync_interval {
            tracing::info!(?interval, "syncing proposer config periodically");

            Some(tokio::spawn(async move {
                let shutdown_signal = async move {
                    let _ = shutdown_signal.await;
                };
                config_manager.run(interval, shutdown_signal, log_sync_event).await;
            }))
        } else {
            None
        };

        Ok(ServiceHandle { server, config_sync, address, _shutdown: shutdown })
    }
}

/// Contains the handles to the spawned Builder API server and config sync tasks
///
/// This struct is created by the [`Service::spawn`] function. Dropping it stops the config sync
/// task.
#[pin_project::pin_project]
pub struct ServiceHandle {
    #[pin]
    server: JoinHandle<()>,
    config_sync: Option<JoinHandle<()>>,
    address: SocketAddr,
    _shutdown: oneshot::Sender<()>,
}

impl ServiceHandle {
    /// The address the Builder API server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }
}

impl Future for ServiceHandle {
    type Output = Result<(), JoinError>;

    fn poll(self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if let Some(config_sync) = this.config_sync.as_mut() {
            let config_sync = Pin::new(config_sync).poll(cx);
            if config_sync.is_ready() {
                return config_sync
            }
        }
        this.server.poll(cx)
    }
}
