use std::future::Future;
use std::time::Duration;

use palisade_common::PalisadeError;

/// Bound a store query. Elapsed timeouts surface as `StoreTimeout` so
/// security-deciding callers can fail closed.
pub(crate) async fn bounded<T, E>(
    limit: Duration,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, PalisadeError>
where
    PalisadeError: From<E>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(PalisadeError::StoreTimeout),
    }
}
