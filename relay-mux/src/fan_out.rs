use builder_api::{Error, Relay};
use futures::stream::FuturesUnordered;
use std::{future::Future, time::Duration};

/// Runs `call` on its own task and waits at most `timeout` for it.
///
/// On timeout only the wait is abandoned; the task keeps running to completion in the background.
pub(crate) async fn call_with_timeout<T, F>(timeout: Duration, call: F) -> Result<T, Error>
where
    T: Send + 'static,
    F: Future<Output = Result<T, Error>> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::spawn(call)).await {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => Err(Error::Internal(format!("relay task failed: {err}"))),
        Err(_) => Err(Error::Timeout(timeout)),
    }
}

/// Issues one call per relay concurrently, each bounded by `timeout`.
///
/// Poll the returned stream to receive `(relay, result)` pairs in completion order.
pub(crate) fn fan_out<T, F>(
    calls: impl IntoIterator<Item = (Relay, F)>,
    timeout: Duration,
) -> FuturesUnordered<impl Future<Output = (Relay, Result<T, Error>)>>
where
    T: Send + 'static,
    F: Future<Output = Result<T, Error>> + Send + 'static,
{
    calls
        .into_iter()
        .map(|(relay, call)| async move {
            let result = call_with_timeout(timeout, call).await;
            (relay, result)
        })
        .collect()
}
