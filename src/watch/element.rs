use crate::host::ElementRoot;
use futures_channel::mpsc;
use futures_util::{future, StreamExt};

/// Resolves with the first element under `root` matching `selector`.
///
/// Checks once up front, then re-runs the query after every batch of
/// child-list mutations until something matches. Never times out.
pub async fn locate<R>(root: &R, selector: &str) -> R::Element
where
    R: ElementRoot + ?Sized,
{
    log::debug!("will wait for element {selector}");
    if let Some(found) = root.query_selector(selector) {
        log::debug!("element found immediately");
        return found;
    }

    let (notify, mut batches) = mpsc::unbounded::<()>();
    let _observation = root.observe_child_list(Box::new(move || {
        let _ = notify.unbounded_send(());
    }));

    while batches.next().await.is_some() {
        if let Some(found) = root.query_selector(selector) {
            log::debug!("element found after mutation");
            return found;
        }
    }

    // The host dropped the observer without a match; nothing can wake us now.
    future::pending().await
}
