use thiserror::Error;

/// Failures while loading or saving persisted settings.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("stored value for {key} is not valid JSON: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("stored value for {key} is {found}, expected {expected}")]
    Shape {
        key: String,
        expected: &'static str,
        found: String,
    },
}

impl SyncError {
    pub fn key(&self) -> &str {
        match self {
            SyncError::Decode { key, .. } | SyncError::Shape { key, .. } => key,
        }
    }
}

/// Terminal report of a control loop that gave up on the current page load.
#[derive(Debug, Error)]
#[error("could not recover persisted settings after {attempts} attempts: {last_error}")]
pub struct Halted {
    pub attempts: u32,
    #[source]
    pub last_error: SyncError,
}

/// The host page is missing something the hook cannot run without.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("no global window")]
    NoWindow,
    #[error("window has no document")]
    NoDocument,
    #[error("javascript error: {0}")]
    Js(String),
}
