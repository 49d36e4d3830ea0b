use std::time::Duration;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Resolves once `predicate` returns true, re-checking every `interval`.
///
/// Only for conditions with no event to listen to, such as an element
/// quietly dropping out of the document.
pub async fn wait_until(mut predicate: impl FnMut() -> bool, interval: Duration) {
    while !predicate() {
        sleep(interval).await;
    }
}

#[cfg(target_arch = "wasm32")]
async fn sleep(interval: Duration) {
    gloo_timers::future::sleep(interval).await;
}

#[cfg(not(target_arch = "wasm32"))]
async fn sleep(interval: Duration) {
    tokio::time::sleep(interval).await;
}
