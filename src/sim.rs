//! In-memory page: document, media elements, navigation and storage.
//!
//! Mirrors the browser closely enough to drive the control loop from tests
//! and other non-browser harnesses.

use crate::db::MemoryStore;
use crate::host::{
    DocumentLifecycle, ElementRoot, Host, KeyValueStore, MediaElement, NavigateEvent,
    NavigationSource, Subscription,
};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

/// Callbacks keyed by registration id, safe to fire while callbacks
/// (un)register themselves.
struct Listeners<F: ?Sized> {
    next_id: Cell<u64>,
    entries: RefCell<BTreeMap<u64, Rc<RefCell<F>>>>,
}

impl<F: ?Sized> Default for Listeners<F> {
    fn default() -> Self {
        Self {
            next_id: Cell::new(0),
            entries: RefCell::new(BTreeMap::new()),
        }
    }
}

impl<F: ?Sized + 'static> Listeners<F> {
    fn add(self: &Rc<Self>, callback: Rc<RefCell<F>>) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().insert(id, callback);
        let registry: Weak<Self> = Rc::downgrade(self);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.entries.borrow_mut().remove(&id);
            }
        })
    }

    fn snapshot(&self) -> Vec<Rc<RefCell<F>>> {
        self.entries.borrow().values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

struct MediaState {
    muted: Cell<bool>,
    volume: Cell<f64>,
    attached: Cell<bool>,
    on_volume_change: Rc<Listeners<dyn FnMut()>>,
}

/// A `<video>`/`<audio>` element.
#[derive(Clone)]
pub struct SimMedia {
    state: Rc<MediaState>,
}

impl SimMedia {
    pub fn new(volume: f64, muted: bool) -> Self {
        Self {
            state: Rc::new(MediaState {
                muted: Cell::new(muted),
                volume: Cell::new(volume),
                attached: Cell::new(false),
                on_volume_change: Rc::new(Listeners::default()),
            }),
        }
    }

    pub fn same_element(&self, other: &SimMedia) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    pub fn listener_count(&self) -> usize {
        self.state.on_volume_change.len()
    }

    fn dispatch_volume_change(&self) {
        for listener in self.state.on_volume_change.snapshot() {
            (&mut *listener.borrow_mut())();
        }
    }
}

impl std::fmt::Debug for SimMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimMedia")
            .field("muted", &self.state.muted.get())
            .field("volume", &self.state.volume.get())
            .field("attached", &self.state.attached.get())
            .finish()
    }
}

impl MediaElement for SimMedia {
    fn muted(&self) -> bool {
        self.state.muted.get()
    }

    fn volume(&self) -> f64 {
        self.state.volume.get()
    }

    fn set_muted(&self, muted: bool) {
        if self.state.muted.replace(muted) != muted {
            self.dispatch_volume_change();
        }
    }

    fn set_volume(&self, volume: f64) {
        if self.state.volume.replace(volume) != volume {
            self.dispatch_volume_change();
        }
    }

    fn is_attached(&self) -> bool {
        self.state.attached.get()
    }

    fn on_volume_change(&self, callback: Box<dyn FnMut()>) -> Subscription {
        let callback: Rc<RefCell<dyn FnMut()>> = Rc::new(RefCell::new(callback));
        self.state.on_volume_change.add(callback)
    }
}

struct Node {
    tag: String,
    classes: Vec<String>,
    media: SimMedia,
}

impl Node {
    fn matches(&self, selector: &str) -> bool {
        let mut parts = selector.split('.');
        let tag = parts.next().unwrap_or_default();
        (tag.is_empty() || tag.eq_ignore_ascii_case(&self.tag))
            && parts.all(|class| self.classes.iter().any(|c| c == class))
    }
}

struct DocumentState {
    nodes: RefCell<Vec<Node>>,
    loaded: Cell<bool>,
    observers: Rc<Listeners<dyn FnMut()>>,
    ready_state_listeners: Rc<Listeners<Option<Box<dyn FnOnce()>>>>,
}

/// A document holding media elements addressed by `tag.class` selectors.
#[derive(Clone)]
pub struct SimDocument {
    state: Rc<DocumentState>,
}

impl Default for SimDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl SimDocument {
    /// A document that has already finished loading.
    pub fn new() -> Self {
        let doc = Self::loading();
        doc.state.loaded.set(true);
        doc
    }

    pub fn loading() -> Self {
        Self {
            state: Rc::new(DocumentState {
                nodes: RefCell::new(Vec::new()),
                loaded: Cell::new(false),
                observers: Rc::new(Listeners::default()),
                ready_state_listeners: Rc::new(Listeners::default()),
            }),
        }
    }

    pub fn finish_loading(&self) {
        self.state.loaded.set(true);
        for listener in self.state.ready_state_listeners.snapshot() {
            if let Some(callback) = listener.borrow_mut().take() {
                callback();
            }
        }
    }

    /// Appends `media` as an element described by `selector` (e.g. `video.video`).
    pub fn insert(&self, selector: &str, media: &SimMedia) {
        let mut parts = selector.split('.');
        let tag = parts.next().unwrap_or_default().to_string();
        let classes = parts.map(str::to_string).collect();
        self.state.nodes.borrow_mut().push(Node {
            tag,
            classes,
            media: media.clone(),
        });
        media.state.attached.set(true);
        self.notify_child_list();
    }

    /// Detaches `media`. Its listeners stay registered, as in a browser.
    pub fn remove(&self, media: &SimMedia) {
        let removed = {
            let mut nodes = self.state.nodes.borrow_mut();
            let before = nodes.len();
            nodes.retain(|node| !node.media.same_element(media));
            before != nodes.len()
        };
        if removed {
            media.state.attached.set(false);
            self.notify_child_list();
        }
    }

    pub fn observer_count(&self) -> usize {
        self.state.observers.len()
    }

    fn notify_child_list(&self) {
        for observer in self.state.observers.snapshot() {
            (&mut *observer.borrow_mut())();
        }
    }
}

impl ElementRoot for SimDocument {
    type Element = SimMedia;

    fn query_selector(&self, selector: &str) -> Option<SimMedia> {
        self.state
            .nodes
            .borrow()
            .iter()
            .find(|node| node.matches(selector))
            .map(|node| node.media.clone())
    }

    fn observe_child_list(&self, callback: Box<dyn FnMut()>) -> Subscription {
        let callback: Rc<RefCell<dyn FnMut()>> = Rc::new(RefCell::new(callback));
        self.state.observers.add(callback)
    }
}

impl DocumentLifecycle for SimDocument {
    fn is_loaded(&self) -> bool {
        self.state.loaded.get()
    }

    fn on_ready_state_change(&self, callback: Box<dyn FnOnce()>) -> Subscription {
        self.state
            .ready_state_listeners
            .add(Rc::new(RefCell::new(Some(callback))))
    }
}

struct NavigationState {
    current: RefCell<String>,
    listeners: Rc<Listeners<dyn FnMut(NavigateEvent)>>,
}

/// Navigation API stand-in.
#[derive(Clone)]
pub struct SimNavigation {
    state: Rc<NavigationState>,
}

impl SimNavigation {
    pub fn new(current: impl Into<String>) -> Self {
        Self {
            state: Rc::new(NavigationState {
                current: RefCell::new(current.into()),
                listeners: Rc::new(Listeners::default()),
            }),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.state.listeners.len()
    }

    pub fn navigate(&self, url: &str) {
        self.dispatch(NavigateEvent::to(url), true);
    }

    pub fn navigate_hash(&self, url: &str) {
        let event = NavigateEvent {
            hash_change: true,
            ..NavigateEvent::to(url)
        };
        self.dispatch(event, true);
    }

    /// A download keeps the current document in place.
    pub fn download(&self, url: &str, filename: &str) {
        let event = NavigateEvent {
            download_request: Some(filename.to_string()),
            ..NavigateEvent::to(url)
        };
        self.dispatch(event, false);
    }

    fn dispatch(&self, event: NavigateEvent, commit: bool) {
        if commit {
            *self.state.current.borrow_mut() = event.destination.clone();
        }
        for listener in self.state.listeners.snapshot() {
            (&mut *listener.borrow_mut())(event.clone());
        }
    }
}

impl NavigationSource for SimNavigation {
    fn current_url(&self) -> String {
        self.state.current.borrow().clone()
    }

    fn subscribe(&self, callback: Box<dyn FnMut(NavigateEvent)>) -> Subscription {
        let callback: Rc<RefCell<dyn FnMut(NavigateEvent)>> = Rc::new(RefCell::new(callback));
        self.state.listeners.add(callback)
    }
}

/// A whole simulated page.
#[derive(Clone)]
pub struct SimHost {
    pub document: SimDocument,
    pub navigation: SimNavigation,
    store: Rc<dyn KeyValueStore>,
}

impl SimHost {
    pub fn new(url: &str) -> Self {
        Self::with_store(url, Rc::new(MemoryStore::new()))
    }

    pub fn with_store(url: &str, store: Rc<dyn KeyValueStore>) -> Self {
        Self {
            document: SimDocument::new(),
            navigation: SimNavigation::new(url),
            store,
        }
    }

    /// A page whose document is still parsing.
    pub fn loading(url: &str) -> Self {
        Self {
            document: SimDocument::loading(),
            ..Self::new(url)
        }
    }
}

impl Host for SimHost {
    type Media = SimMedia;
    type Root = SimDocument;
    type Navigation = SimNavigation;

    fn document(&self) -> &SimDocument {
        &self.document
    }

    fn navigation(&self) -> &SimNavigation {
        &self.navigation
    }

    fn store(&self) -> Rc<dyn KeyValueStore> {
        self.store.clone()
    }
}
