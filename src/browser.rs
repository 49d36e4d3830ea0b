//! `web-sys` implementation of the host capabilities.

use crate::config::{HookConfig, CONFIG_KEY};
use crate::control::ControlLoop;
use crate::db::LocalStorageStore;
use crate::error::HostError;
use crate::host::{
    DocumentLifecycle, ElementRoot, Host, KeyValueStore, MediaElement, NavigateEvent,
    NavigationSource, Subscription,
};
use crate::logging;
use std::rc::Rc;
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{
    window, Document, Event, EventTarget, HtmlMediaElement,
    MutationObserver, MutationObserverInit, Window,
};

fn js_error(err: JsValue) -> HostError {
    HostError::Js(err.as_string().unwrap_or_else(|| format!("{err:?}")))
}

fn listen(
    target: &EventTarget,
    event: &'static str,
    closure: Closure<dyn FnMut(Event)>,
) -> Result<Subscription, HostError> {
    target
        .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
        .map_err(js_error)?;
    let target = target.clone();
    Ok(Subscription::new(move || {
        let _ = target.remove_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
    }))
}

fn or_inert(result: Result<Subscription, HostError>, what: &str) -> Subscription {
    result.unwrap_or_else(|err| {
        log::warn!("could not {what}: {err}");
        Subscription::inert()
    })
}

#[derive(Clone)]
pub struct BrowserMedia(HtmlMediaElement);

impl MediaElement for BrowserMedia {
    fn muted(&self) -> bool {
        self.0.muted()
    }

    fn volume(&self) -> f64 {
        self.0.volume()
    }

    fn set_muted(&self, muted: bool) {
        self.0.set_muted(muted);
    }

    fn set_volume(&self, volume: f64) {
        // The element throws on anything outside 0..=1.
        self.0.set_volume(volume.clamp(0.0, 1.0));
    }

    fn is_attached(&self) -> bool {
        self.0.is_connected()
    }

    fn on_volume_change(&self, mut callback: Box<dyn FnMut()>) -> Subscription {
        let closure =
            Closure::wrap(Box::new(move |_event: Event| callback()) as Box<dyn FnMut(Event)>);
        or_inert(listen(&self.0, "volumechange", closure), "watch volumechange")
    }
}

pub struct BrowserDocument(Document);

impl ElementRoot for BrowserDocument {
    type Element = BrowserMedia;

    fn query_selector(&self, selector: &str) -> Option<BrowserMedia> {
        self.0
            .query_selector(selector)
            .ok()
            .flatten()?
            .dyn_into::<HtmlMediaElement>()
            .ok()
            .map(BrowserMedia)
    }

    fn observe_child_list(&self, mut callback: Box<dyn FnMut()>) -> Subscription {
        let closure = Closure::wrap(Box::new(
            move |_records: js_sys::Array, _observer: MutationObserver| callback(),
        )
            as Box<dyn FnMut(js_sys::Array, MutationObserver)>);

        let observe = || -> Result<MutationObserver, HostError> {
            let observer =
                MutationObserver::new(closure.as_ref().unchecked_ref()).map_err(js_error)?;
            let options = MutationObserverInit::new();
            options.set_child_list(true);
            options.set_subtree(true);
            observer
                .observe_with_options(&self.0, &options)
                .map_err(js_error)?;
            Ok(observer)
        };

        match observe() {
            Ok(observer) => Subscription::new(move || {
                observer.disconnect();
                drop(closure);
            }),
            Err(err) => {
                log::warn!("could not observe the document: {err}");
                Subscription::inert()
            }
        }
    }
}

impl DocumentLifecycle for BrowserDocument {
    fn is_loaded(&self) -> bool {
        self.0.ready_state() != "loading"
    }

    fn on_ready_state_change(&self, callback: Box<dyn FnOnce()>) -> Subscription {
        let mut callback = Some(callback);
        let closure = Closure::wrap(Box::new(move |_event: Event| {
            if let Some(callback) = callback.take() {
                callback();
            }
        }) as Box<dyn FnMut(Event)>);
        or_inert(listen(&self.0, "readystatechange", closure), "wait for load")
    }
}

/// The Navigation API (`window.navigation`), read reflectively.
pub struct BrowserNavigation(Window);

fn navigate_event(event: &Event) -> NavigateEvent {
    let event: &JsValue = event.as_ref();
    let get = |target: &JsValue, key: &str| {
        js_sys::Reflect::get(target, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED)
    };
    let destination = get(&get(event, "destination"), "url")
        .as_string()
        .unwrap_or_default();
    NavigateEvent {
        destination,
        hash_change: get(event, "hashChange").as_bool().unwrap_or(false),
        download_request: get(event, "downloadRequest").as_string(),
    }
}

impl NavigationSource for BrowserNavigation {
    fn current_url(&self) -> String {
        self.0.location().href().unwrap_or_default()
    }

    fn subscribe(&self, mut callback: Box<dyn FnMut(NavigateEvent)>) -> Subscription {
        let navigation = js_sys::Reflect::get(&self.0, &JsValue::from_str("navigation"))
            .ok()
            .and_then(|value| value.dyn_into::<EventTarget>().ok());
        let Some(navigation) = navigation else {
            log::warn!("navigation API unavailable, SPA page changes will go unnoticed");
            return Subscription::inert();
        };

        let closure = Closure::wrap(
            Box::new(move |event: Event| callback(navigate_event(&event))) as Box<dyn FnMut(Event)>
        );
        or_inert(listen(&navigation, "navigate", closure), "watch navigations")
    }
}

pub struct BrowserHost {
    document: BrowserDocument,
    navigation: BrowserNavigation,
    store: Rc<dyn KeyValueStore>,
}

impl BrowserHost {
    pub fn new() -> Result<Self, HostError> {
        let window = window().ok_or(HostError::NoWindow)?;
        let document = window.document().ok_or(HostError::NoDocument)?;
        Ok(Self {
            document: BrowserDocument(document),
            navigation: BrowserNavigation(window),
            store: Rc::new(LocalStorageStore),
        })
    }
}

impl Host for BrowserHost {
    type Media = BrowserMedia;
    type Root = BrowserDocument;
    type Navigation = BrowserNavigation;

    fn document(&self) -> &BrowserDocument {
        &self.document
    }

    fn navigation(&self) -> &BrowserNavigation {
        &self.navigation
    }

    fn store(&self) -> Rc<dyn KeyValueStore> {
        self.store.clone()
    }
}

/// Installs logging and spawns the control loop on the page's event loop.
pub fn launch() {
    let store = LocalStorageStore;
    let (config, unreadable) = HookConfig::load(&store);
    logging::init(config.verbose(&store));
    if let Some(err) = unreadable {
        log::warn!("ignoring unreadable {CONFIG_KEY}: {err}");
    }

    let host = match BrowserHost::new() {
        Ok(host) => host,
        Err(err) => {
            log::error!("cannot start: {err}");
            return;
        }
    };
    let control = match ControlLoop::new(host, config) {
        Ok(control) => control,
        Err(err) => {
            log::error!("cannot start, invalid path pattern: {err}");
            return;
        }
    };

    wasm_bindgen_futures::spawn_local(async move {
        control.run_after_load().await;
    });
}
