//! Capabilities the hook needs from its host page.
//!
//! The browser build implements these on top of `web-sys`; the simulated host
//! in [`crate::sim`] implements them in memory. Nothing in the control loop
//! touches a global.

use std::fmt;

/// Keeps a listener, observer or timer registered for as long as it is alive.
///
/// Dropping the guard runs the teardown exactly once.
#[must_use = "dropping a subscription unregisters it immediately"]
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(teardown: impl FnOnce() + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A subscription with nothing to release.
    pub fn inert() -> Self {
        Self { teardown: None }
    }

    /// Runs the teardown now instead of at drop time.
    pub fn cancel(mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("armed", &self.teardown.is_some())
            .finish()
    }
}

/// Live handle to the media element whose settings are kept.
pub trait MediaElement: Clone + 'static {
    fn muted(&self) -> bool;
    fn volume(&self) -> f64;
    fn set_muted(&self, muted: bool);
    fn set_volume(&self, volume: f64);

    /// Whether the element is still part of the document.
    fn is_attached(&self) -> bool;

    /// Calls `callback` on every `volumechange` notification (mute toggles included).
    fn on_volume_change(&self, callback: Box<dyn FnMut()>) -> Subscription;
}

/// A subtree that can be searched and observed for structural changes.
pub trait ElementRoot {
    type Element;

    /// First match in document order.
    fn query_selector(&self, selector: &str) -> Option<Self::Element>;

    /// Calls `callback` once per batch of child-list mutations anywhere in the subtree.
    fn observe_child_list(&self, callback: Box<dyn FnMut()>) -> Subscription;
}

/// An intercepted navigation, as reported by the host's navigation API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigateEvent {
    pub destination: String,
    pub hash_change: bool,
    pub download_request: Option<String>,
}

impl NavigateEvent {
    pub fn to(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            hash_change: false,
            download_request: None,
        }
    }
}

pub trait NavigationSource {
    fn current_url(&self) -> String;
    fn subscribe(&self, callback: Box<dyn FnMut(NavigateEvent)>) -> Subscription;
}

/// Load state of the hosting document.
pub trait DocumentLifecycle {
    /// True once the document has left the `loading` state.
    fn is_loaded(&self) -> bool;

    /// Fires `callback` once, on the next ready-state change.
    fn on_ready_state_change(&self, callback: Box<dyn FnOnce()>) -> Subscription;
}

/// Durable string key/value storage, scoped to the page origin.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Everything the control loop needs from one page.
pub trait Host {
    type Media: MediaElement;
    type Root: ElementRoot<Element = Self::Media> + DocumentLifecycle;
    type Navigation: NavigationSource;

    fn document(&self) -> &Self::Root;
    fn navigation(&self) -> &Self::Navigation;
    fn store(&self) -> std::rc::Rc<dyn KeyValueStore>;
}
