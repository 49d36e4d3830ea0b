use crate::host::DocumentLifecycle;
use futures_channel::oneshot;
use futures_util::future;

/// Resolves once the hosting document has finished its initial parse.
pub async fn document_loaded<D>(document: &D)
where
    D: DocumentLifecycle + ?Sized,
{
    if document.is_loaded() {
        log::debug!("already loaded");
        return;
    }

    log::debug!("waiting for load");
    let (fire, fired) = oneshot::channel();
    let _listener = document.on_ready_state_change(Box::new(move || {
        let _ = fire.send(());
    }));
    if fired.await.is_err() {
        future::pending::<()>().await;
    }
}
