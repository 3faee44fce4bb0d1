//! API handlers
//!
//! Author: hephaex@gmail.com

pub mod health;
pub mod kgc;
pub mod ner;

use crate::error::AppError;
use crate::state::AppContext;
use std::sync::Arc;

/// Run a CPU-bound model call off the async runtime, bounded by the
/// configured request timeout.
///
/// A blocking task cannot be cancelled: on timeout the caller gets
/// `AppError::Timeout` while the call runs to completion on the blocking
/// pool. Repeatable work such as the benchmark is cached in `AppContext`
/// so slow calls do not stack up.
pub(crate) async fn run_blocking<T, F>(state: &Arc<AppContext>, call: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&AppContext) -> kgc_core::Result<T> + Send + 'static,
{
    let timeout = state.request_timeout();
    let ctx = Arc::clone(state);
    let task = tokio::task::spawn_blocking(move || call(&ctx));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result.map_err(AppError::from),
        Ok(Err(e)) => Err(AppError::Internal(format!("Model task failed: {e}"))),
        Err(_) => Err(AppError::Timeout(timeout.as_secs())),
    }
}
