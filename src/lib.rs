//! Keeps a page's media element volume and mute state in `localStorage`,
//! re-binding whenever a single-page app tears the element down and builds a
//! new one.

pub mod config;
pub mod control;
pub mod db;
pub mod error;
pub mod host;
pub mod logging;
pub mod sim;
pub mod sync;
pub mod watch;

#[cfg(target_arch = "wasm32")]
pub mod browser;

pub use config::HookConfig;
pub use control::{ControlLoop, Phase};
pub use error::{Halted, HostError, SyncError};
pub use sync::{MediaSettings, SettingsSynchronizer, WatchedField};
