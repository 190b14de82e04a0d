use crate::{
    error::ConfigError,
    proposer_config::ProposerConfigFile,
    registry::{RelayRegistry, RelaySet},
};
use async_trait::async_trait;
use ethereum_consensus::state_transition::Context;
use parking_lot::RwLock;
use std::{
    fmt,
    future::Future,
    path::PathBuf,
    sync::Arc,
    time::{Duration, SystemTime},
};
use tokio::{sync::Mutex, time::MissedTickBehavior};
use url::Url;

/// Somewhere a proposer config document can be loaded from.
#[async_trait]
pub trait ConfigSource: fmt::Display + Send + Sync {
    async fn fetch(&self) -> Result<ProposerConfigFile, ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl fmt::Display for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    async fn fetch(&self) -> Result<ProposerConfigFile, ConfigError> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|source| ConfigError::Io { path: self.path.clone(), source })?;
        Ok(serde_json::from_slice(&data)?)
    }
}

#[derive(Debug, Clone)]
pub struct HttpSource {
    http: reqwest::Client,
    url: Url,
}

impl HttpSource {
    pub fn new(http: reqwest::Client, url: Url) -> Self {
        Self { http, url }
    }
}

impl fmt::Display for HttpSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[async_trait]
impl ConfigSource for HttpSource {
    async fn fetch(&self) -> Result<ProposerConfigFile, ConfigError> {
        let response = self.http.get(self.url.clone()).send().await?.error_for_status()?;
        let data = response.bytes().await?;
        Ok(serde_json::from_slice(&data)?)
    }
}

/// Outcome of one sync cycle of [`RelayConfigManager::run`].
#[derive(Debug)]
pub struct SyncEvent {
    pub at: SystemTime,
    pub error: Option<ConfigError>,
}

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Half an epoch.
pub fn default_sync_interval(context: &Context) -> Duration {
    Duration::from_secs(context.slots_per_epoch * context.seconds_per_slot / 2)
}

/// Owns the live [`RelayRegistry`] and keeps it in sync with a [`ConfigSource`].
///
/// Readers get the latest published snapshot from [`RelayConfigManager::current`] and are never
/// blocked by a sync in progress. A failed sync leaves the previous snapshot live.
pub struct RelayConfigManager {
    fallback: RelaySet,
    source: Option<Box<dyn ConfigSource>>,
    registry: RwLock<Arc<RelayRegistry>>,
    sync_lock: Mutex<()>,
    fetch_timeout: Duration,
}

impl RelayConfigManager {
    pub fn new(fallback: RelaySet, source: Option<Box<dyn ConfigSource>>) -> Self {
        let registry = RelayRegistry::from_relays(fallback.clone());
        Self {
            fallback,
            source,
            registry: RwLock::new(Arc::new(registry)),
            sync_lock: Mutex::new(()),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Bounds every load of the proposer config document.
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn current(&self) -> Arc<RelayRegistry> {
        self.registry.read().clone()
    }

    pub async fn sync(&self) -> Result<(), ConfigError> {
        let source = match self.source.as_ref() {
            Some(source) => source,
            None => return Ok(()),
        };

        let _guard = self.sync_lock.lock().await;
        let document = tokio::time::timeout(self.fetch_timeout, source.fetch())
            .await
            .map_err(|_| ConfigError::FetchTimeout(self.fetch_timeout))??;
        let registry = RelayRegistry::build(&document, &self.fallback)?;
        tracing::debug!(
            %source,
            validators = document.proposer_config.len(),
            relays = registry.all_relays().len(),
            "loaded proposer config"
        );

        *self.registry.write() = Arc::new(registry);
        Ok(())
    }

    /// Syncs every `interval` until `shutdown` resolves. The first sync happens one `interval`
    /// after the call. A sync in flight is abandoned on shutdown.
    ///
    /// `interval` must be non-zero.
    pub async fn run<F, O>(&self, interval: Duration, shutdown: F, mut observer: O)
    where
        F: Future<Output = ()>,
        O: FnMut(SyncEvent),
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // skip the immediate first tick
        ticker.tick().await;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }
            let error = tokio::select! {
                _ = &mut shutdown => break,
                result = self.sync() => result.err(),
            };
            observer(SyncEvent { at: SystemTime::now(), error });
        }
        tracing::debug!("stopping proposer config sync");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_consensus::crypto::SecretKey;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        sync::oneshot,
    };

    fn relay(seed: u8, host: &str) -> String {
        let public_key = SecretKey::try_from([seed; 32].as_ref()).unwrap().public_key();
        format!("https://{public_key}@{host}")
    }

    fn document(relays: &[String]) -> String {
        let relays = serde_json::to_string(relays).unwrap();
        format!(r#"{{ "default_config": {{ "builder": {{ "enabled": true, "relays": {relays} }} }} }}"#)
    }

    fn write(file: &tempfile::NamedTempFile, contents: &str) {
        std::fs::write(file.path(), contents).unwrap();
    }

    /// Serves `body` to every connection, or holds connections open without answering if `body`
    /// is `None`.
    async fn serve(body: Option<String>) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut stalled = vec![];
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                let Some(body) = body.as_ref() else {
                    stalled.push(stream);
                    continue
                };
                let mut request = vec![0u8; 4096];
                let _ = stream.read(&mut request).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        Url::parse(&format!("http://{address}/proposer-config.json")).unwrap()
    }

    fn http_source(url: Url) -> Option<Box<dyn ConfigSource>> {
        Some(Box::new(HttpSource::new(reqwest::Client::new(), url)))
    }

    #[tokio::test]
    async fn test_sync_without_source_is_noop() {
        let fallback = RelaySet::parse([relay(1, "a.example")]).unwrap();
        let manager = RelayConfigManager::new(fallback.clone(), None);
        manager.sync().await.unwrap();
        assert_eq!(manager.current().default_relays(), &fallback);
    }

    #[tokio::test]
    async fn test_failed_sync_keeps_previous_registry() {
        let file = tempfile::NamedTempFile::new().unwrap();
        write(&file, &document(&[relay(2, "b.example"), relay(3, "c.example")]));

        let fallback = RelaySet::parse([relay(1, "a.example")]).unwrap();
        let manager =
            RelayConfigManager::new(fallback, Some(Box::new(FileSource::new(file.path()))));
        manager.sync().await.unwrap();
        let before = manager.current();
        assert_eq!(before.default_relays().len(), 2);

        write(&file, "{ not json");
        assert!(matches!(manager.sync().await, Err(ConfigError::Json(..))));
        assert!(Arc::ptr_eq(&before, &manager.current()));

        write(&file, &document(&[]));
        assert!(matches!(
            manager.sync().await,
            Err(ConfigError::EmptyBuilderRelays { proposer: None })
        ));
        assert!(Arc::ptr_eq(&before, &manager.current()));

        write(&file, &document(&[relay(4, "d.example")]));
        manager.sync().await.unwrap();
        assert_eq!(manager.current().default_relays().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let manager = RelayConfigManager::new(
            RelaySet::default(),
            Some(Box::new(FileSource::new("/nonexistent/proposer-config.json"))),
        );
        assert!(matches!(manager.sync().await, Err(ConfigError::Io { .. })));
    }

    #[tokio::test]
    async fn test_run_reports_sync_events() {
        let file = tempfile::NamedTempFile::new().unwrap();
        write(&file, "{}");

        let manager = Arc::new(RelayConfigManager::new(
            RelaySet::default(),
            Some(Box::new(FileSource::new(file.path()))),
        ));

        let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let runner = manager.clone();
        let task = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            runner
                .run(Duration::from_millis(20), shutdown, move |event| {
                    let _ = events_tx.send(event);
                })
                .await;
        });

        let event = events_rx.recv().await.unwrap();
        assert!(event.error.is_none());

        write(&file, "{ not json");
        let event = loop {
            let event = events_rx.recv().await.unwrap();
            if event.error.is_some() {
                break event
            }
        };
        assert!(matches!(event.error, Some(ConfigError::Json(..))));

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
    }

    #[test]
    fn test_default_sync_interval() {
        let context = Context::for_mainnet();
        assert_eq!(default_sync_interval(&context), Duration::from_secs(192));
    }

    #[tokio::test]
    async fn test_sync_from_url() {
        let url = serve(Some(document(&[relay(2, "b.example"), relay(3, "c.example")]))).await;
        let fallback = RelaySet::parse([relay(1, "a.example")]).unwrap();
        let manager = RelayConfigManager::new(fallback, http_source(url));

        manager.sync().await.unwrap();
        assert_eq!(manager.current().default_relays().len(), 2);
    }

    #[tokio::test]
    async fn test_unresponsive_source_times_out() {
        let url = serve(None).await;
        let fallback = RelaySet::parse([relay(1, "a.example")]).unwrap();
        let manager = RelayConfigManager::new(fallback.clone(), http_source(url))
            .with_fetch_timeout(Duration::from_millis(100));

        let result = tokio::time::timeout(Duration::from_secs(5), manager.sync()).await.unwrap();
        assert!(matches!(result, Err(ConfigError::FetchTimeout(..))));
        assert_eq!(manager.current().default_relays(), &fallback);
    }

    #[tokio::test]
    async fn test_run_reports_stalled_syncs_and_stops() {
        let url = serve(None).await;
        let manager = Arc::new(
            RelayConfigManager::new(RelaySet::default(), http_source(url))
                .with_fetch_timeout(Duration::from_millis(50)),
        );

        let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let runner = manager.clone();
        let task = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            runner
                .run(Duration::from_millis(20), shutdown, move |event| {
                    let _ = events_tx.send(event);
                })
                .await;
        });

        for _ in 0..2 {
            let event = events_rx.recv().await.unwrap();
            assert!(matches!(event.error, Some(ConfigError::FetchTimeout(..))));
        }

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_sync_in_flight() {
        let url = serve(None).await;
        let manager = Arc::new(
            RelayConfigManager::new(RelaySet::default(), http_source(url))
                .with_fetch_timeout(Duration::from_secs(60)),
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let runner = manager.clone();
        let task = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            runner.run(Duration::from_millis(10), shutdown, |_| {}).await;
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    }
}
