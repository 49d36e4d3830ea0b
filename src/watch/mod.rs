//! One-shot waits on page events.
//!
//! Each watcher resolves once and releases whatever it registered with the
//! host on the way out. Dropping a pending watcher releases it as well.

pub mod condition;
pub mod element;
pub mod load;
pub mod navigation;

pub use condition::wait_until;
pub use element::locate;
pub use load::document_loaded;
pub use navigation::{wait_for, Destination};
