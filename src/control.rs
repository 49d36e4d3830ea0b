//! The attach/observe/synchronize loop.
//!
//! ```text
//! AwaitingPage -> AwaitingElement -> Binding -> Watching -> Lost -> AwaitingPage
//!                                       \
//!                                        -> Halted
//! ```
//!
//! One loop keeps one media element's settings in the store. Each pass
//! binds a freshly located element with a fresh synchronizer and attempt
//! counter; nothing carries over from the previous element.

use crate::config::HookConfig;
use crate::error::{Halted, SyncError};
use crate::host::{Host, MediaElement, Subscription};
use crate::sync::{MediaSettings, SettingsSynchronizer};
use crate::watch::{self, Destination};
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingPage,
    AwaitingElement,
    Binding,
    Watching,
    Lost,
    Halted,
}

enum State<M> {
    AwaitingPage,
    AwaitingElement,
    Binding(M),
    Watching(Session<M>),
    Lost,
    Halted(Halted),
}

impl<M> State<M> {
    fn phase(&self) -> Phase {
        match self {
            State::AwaitingPage => Phase::AwaitingPage,
            State::AwaitingElement => Phase::AwaitingElement,
            State::Binding(_) => Phase::Binding,
            State::Watching(_) => Phase::Watching,
            State::Lost => Phase::Lost,
            State::Halted(_) => Phase::Halted,
        }
    }
}

/// A bound element. Dropping it removes the save-on-change listener.
struct Session<M> {
    media: M,
    _save_on_change: Subscription,
}

pub struct ControlLoop<H: Host> {
    host: H,
    config: HookConfig,
    destination: Destination,
    on_phase: Option<Box<dyn FnMut(Phase)>>,
}

impl<H: Host> ControlLoop<H> {
    pub fn new(host: H, config: HookConfig) -> Result<Self, regex::Error> {
        let destination = config.destination()?;
        Ok(Self {
            host,
            config,
            destination,
            on_phase: None,
        })
    }

    /// Calls `observer` on entry to every state.
    pub fn on_phase(mut self, observer: impl FnMut(Phase) + 'static) -> Self {
        self.on_phase = Some(Box::new(observer));
        self
    }

    /// Waits for the document to finish loading, then [`run`](Self::run)s.
    pub async fn run_after_load(self) -> Halted {
        watch::document_loaded(self.host.document()).await;
        log::info!("0. loaded, starting the hook");
        self.run().await
    }

    /// Runs until the persisted settings prove unrecoverable.
    ///
    /// On a healthy page this never returns: it keeps re-binding to every
    /// new media element for the lifetime of the page.
    pub async fn run(mut self) -> Halted {
        let mut state = State::AwaitingPage;
        loop {
            if let Some(observer) = self.on_phase.as_mut() {
                observer(state.phase());
            }
            state = match state {
                State::AwaitingPage => {
                    log::info!("1. waiting until user is viewing a post");
                    watch::wait_for(self.host.navigation(), &self.destination).await;
                    State::AwaitingElement
                }
                State::AwaitingElement => {
                    log::info!("2. post detected, waiting for video");
                    let media = watch::locate(self.host.document(), &self.config.selector).await;
                    State::Binding(media)
                }
                State::Binding(media) => match self.bind(media) {
                    Ok(session) => State::Watching(session),
                    Err(halted) => State::Halted(halted),
                },
                State::Watching(session) => {
                    let interval = Duration::from_millis(self.config.poll_interval_ms);
                    watch::wait_until(|| !session.media.is_attached(), interval).await;
                    drop(session);
                    State::Lost
                }
                State::Lost => {
                    log::warn!("video element lost, searching again...");
                    State::AwaitingPage
                }
                State::Halted(halted) => {
                    log::error!(
                        "{halted}. The video element will not be manipulated from here on; \
                         reload the page to try again."
                    );
                    return halted;
                }
            };
        }
    }

    fn bind(&self, media: H::Media) -> Result<Session<H::Media>, Halted> {
        log::info!("3. video element found, loading the config");
        let sync = Rc::new(SettingsSynchronizer::new(
            self.host.store(),
            MediaSettings::fields(&media, &self.config),
        ));
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.load_settings(&sync) {
                Ok(settings) => {
                    log::info!("4. loaded config, applying to the media element");
                    settings.apply(&media);
                    let save_on_change = {
                        let sync = sync.clone();
                        media.on_volume_change(Box::new(move || {
                            log::debug!("5. saving changed volume");
                            sync.save();
                        }))
                    };
                    return Ok(Session {
                        media,
                        _save_on_change: save_on_change,
                    });
                }
                Err(err) => {
                    log::warn!(
                        "attempt {attempts}/{max_attempts} failed, clearing the config: {err}"
                    );
                    sync.clear();
                    if attempts >= max_attempts {
                        return Err(Halted {
                            attempts,
                            last_error: err,
                        });
                    }
                }
            }
        }
    }

    fn load_settings(&self, sync: &SettingsSynchronizer) -> Result<MediaSettings, SyncError> {
        let values = sync.load()?;
        MediaSettings::from_loaded(&values, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::host::KeyValueStore;
    use crate::sim::{SimHost, SimMedia};
    use std::cell::RefCell;
    use tokio::task::LocalSet;
    use tokio::time::sleep;

    const POST: &str = "https://example.com/post/123";

    fn recorder() -> (Rc<RefCell<Vec<Phase>>>, impl FnMut(Phase) + 'static) {
        let phases = Rc::new(RefCell::new(Vec::new()));
        let sink = phases.clone();
        (phases, move |phase| sink.borrow_mut().push(phase))
    }

    #[test]
    fn bind_recovers_from_a_corrupt_record() {
        let store = Rc::new(MemoryStore::with_entries([("__R34KV_volume", "oops")]));
        let host = SimHost::with_store(POST, store.clone());
        let media = SimMedia::new(0.6, true);
        let control = ControlLoop::new(host, HookConfig::default()).unwrap();

        let session = control.bind(media.clone()).unwrap();
        assert!(session.media.same_element(&media));
        assert_eq!(store.get("__R43KV_muted").as_deref(), Some("true"));
        assert_eq!(store.get("__R34KV_volume").as_deref(), Some("0.6"));
        assert_eq!(media.listener_count(), 1);
        drop(session);
        assert_eq!(media.listener_count(), 0);
    }

    #[test]
    fn bind_keeps_the_stored_volume_when_muted_is_not_a_boolean() {
        let store = Rc::new(MemoryStore::with_entries([
            ("__R43KV_muted", "0"),
            ("__R34KV_volume", "0.3"),
        ]));
        let host = SimHost::with_store(POST, store.clone());
        let media = SimMedia::new(0.5, true);
        let control = ControlLoop::new(host, HookConfig::default()).unwrap();

        let _session = control.bind(media.clone()).unwrap();
        assert_eq!(media.volume(), 0.3);
        assert!(!media.muted());
        assert_eq!(store.get("__R34KV_volume").as_deref(), Some("0.3"));
        assert_eq!(store.get("__R43KV_muted").as_deref(), Some("0"));
    }

    #[test]
    fn bind_clears_a_volume_with_no_numeric_reading() {
        let store = Rc::new(MemoryStore::with_entries([
            ("__R43KV_muted", "true"),
            ("__R34KV_volume", "\"loud\""),
        ]));
        let host = SimHost::with_store(POST, store.clone());
        let media = SimMedia::new(0.2, false);
        let control = ControlLoop::new(host, HookConfig::default()).unwrap();

        let _session = control.bind(media.clone()).unwrap();
        assert_eq!(store.get("__R43KV_muted").as_deref(), Some("false"));
        assert_eq!(store.get("__R34KV_volume").as_deref(), Some("0.2"));
    }

    #[test]
    fn invalid_pattern_is_rejected_up_front() {
        let config = HookConfig {
            path_pattern: "(".to_string(),
            ..HookConfig::default()
        };
        assert!(ControlLoop::new(SimHost::new(POST), config).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_happens_before_the_document_loads() {
        let host = SimHost::loading(POST);
        let (phases, observer) = recorder();
        let control = ControlLoop::new(host.clone(), HookConfig::default())
            .unwrap()
            .on_phase(observer);

        LocalSet::new()
            .run_until(async move {
                let handle = tokio::task::spawn_local(control.run_after_load());
                sleep(Duration::from_millis(10)).await;
                assert!(phases.borrow().is_empty());

                host.document.finish_loading();
                sleep(Duration::from_millis(10)).await;
                assert_eq!(
                    *phases.borrow(),
                    [Phase::AwaitingPage, Phase::AwaitingElement]
                );
                handle.abort();
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn phases_follow_the_documented_cycle() {
        let host = SimHost::new("https://example.com/");
        let (phases, observer) = recorder();
        let control = ControlLoop::new(host.clone(), HookConfig::default())
            .unwrap()
            .on_phase(observer);

        LocalSet::new()
            .run_until(async move {
                let handle = tokio::task::spawn_local(control.run());
                sleep(Duration::from_millis(10)).await;
                assert_eq!(*phases.borrow(), [Phase::AwaitingPage]);

                host.navigation.navigate(POST);
                sleep(Duration::from_millis(10)).await;
                assert_eq!(
                    *phases.borrow(),
                    [Phase::AwaitingPage, Phase::AwaitingElement]
                );

                let video = SimMedia::new(1.0, false);
                host.document.insert("video.video", &video);
                sleep(Duration::from_millis(10)).await;
                assert_eq!(phases.borrow().last(), Some(&Phase::Watching));

                host.document.remove(&video);
                sleep(Duration::from_millis(150)).await;
                assert_eq!(
                    *phases.borrow(),
                    [
                        Phase::AwaitingPage,
                        Phase::AwaitingElement,
                        Phase::Binding,
                        Phase::Watching,
                        Phase::Lost,
                        Phase::AwaitingPage,
                        Phase::AwaitingElement,
                    ]
                );
                assert!(!handle.is_finished());
                handle.abort();
            })
            .await;
    }
}
