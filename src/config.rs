//! Hook configuration.

use crate::host::KeyValueStore;
use crate::watch::navigation::Destination;
use serde::{Deserialize, Serialize};

/// Store key holding optional JSON overrides for [`HookConfig`].
pub const CONFIG_KEY: &str = "keepvolume.config";

/// Where and how the hook binds to the page's media element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Regex tested against the URL path. Ignored when `exact_url` is set.
    pub path_pattern: String,
    pub exact_url: Option<String>,
    pub selector: String,
    pub muted_key: String,
    pub volume_key: String,
    pub max_attempts: u32,
    pub poll_interval_ms: u64,
    /// Verbose logging is enabled while this key exists in the store.
    pub debug_flag_key: String,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            path_pattern: r"^/post/\d+".to_string(),
            exact_url: None,
            selector: "video.video".to_string(),
            // Historical key names, typo included.
            muted_key: "__R43KV_muted".to_string(),
            volume_key: "__R34KV_volume".to_string(),
            max_attempts: 3,
            poll_interval_ms: 100,
            debug_flag_key: "DEBUG_MODE".to_string(),
        }
    }
}

impl HookConfig {
    /// Reads overrides from [`CONFIG_KEY`], falling back to defaults when the
    /// record is missing or unreadable.
    ///
    /// A parse failure is handed back rather than logged, because the logger
    /// is configured from the result.
    pub fn load(store: &dyn KeyValueStore) -> (Self, Option<serde_json::Error>) {
        match store.get(CONFIG_KEY).map(|raw| serde_json::from_str(&raw)) {
            Some(Ok(config)) => (config, None),
            Some(Err(err)) => (Self::default(), Some(err)),
            None => (Self::default(), None),
        }
    }

    pub fn destination(&self) -> Result<Destination, regex::Error> {
        match &self.exact_url {
            Some(url) => Ok(Destination::exact(url.clone())),
            None => Destination::pattern(&self.path_pattern),
        }
    }

    pub fn verbose(&self, store: &dyn KeyValueStore) -> bool {
        store.get(&self.debug_flag_key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[test]
    fn defaults_when_missing() {
        let store = MemoryStore::new();
        let (config, unreadable) = HookConfig::load(&store);
        assert_eq!(config, HookConfig::default());
        assert!(unreadable.is_none());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let store = MemoryStore::with_entries([(CONFIG_KEY, r#"{"selector":"video"}"#)]);
        let (config, unreadable) = HookConfig::load(&store);
        assert!(unreadable.is_none());
        assert_eq!(config.selector, "video");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.muted_key, "__R43KV_muted");
    }

    #[test]
    fn garbage_falls_back_to_defaults_and_reports_why() {
        let store = MemoryStore::with_entries([(CONFIG_KEY, "{nope"), ("DEBUG_MODE", "1")]);
        let (config, unreadable) = HookConfig::load(&store);
        assert_eq!(config, HookConfig::default());
        assert!(unreadable.is_some_and(|err| err.is_syntax()));
        // The fallback still sees the debug flag, so the warning can be shown.
        assert!(config.verbose(&store));
    }

    #[test]
    fn debug_flag_presence_enables_verbose() {
        let config = HookConfig::default();
        let store = MemoryStore::new();
        assert!(!config.verbose(&store));
        store.set("DEBUG_MODE", "");
        assert!(config.verbose(&store));
    }
}
