//! Persisted media settings.
//!
//! A [`SettingsSynchronizer`] binds a fixed list of named fields to the durable
//! store. Each field reads its live value through a truth accessor; the store
//! holds one JSON document per field under the field's key.

use crate::config::HookConfig;
use crate::error::SyncError;
use crate::host::{KeyValueStore, MediaElement};
use serde_json::Value;
use std::rc::Rc;

/// A named setting and the function reading its live value.
pub struct WatchedField {
    key: String,
    truth: Box<dyn Fn() -> Value>,
}

impl WatchedField {
    pub fn new(key: impl Into<String>, truth: impl Fn() -> Value + 'static) -> Self {
        Self {
            key: key.into(),
            truth: Box::new(truth),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn encoded_truth(&self) -> String {
        (self.truth)().to_string()
    }
}

impl std::fmt::Debug for WatchedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchedField").field("key", &self.key).finish()
    }
}

pub struct SettingsSynchronizer {
    store: Rc<dyn KeyValueStore>,
    fields: Vec<WatchedField>,
}

impl std::fmt::Debug for SettingsSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsSynchronizer")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl SettingsSynchronizer {
    pub fn new(store: Rc<dyn KeyValueStore>, fields: Vec<WatchedField>) -> Self {
        Self { store, fields }
    }

    pub fn fields(&self) -> &[WatchedField] {
        &self.fields
    }

    /// Decoded value of every field, in declaration order.
    ///
    /// A missing record is seeded from the live value first, so both paths
    /// return what the store now holds. Stops at the first record that is not
    /// valid JSON.
    pub fn load(&self) -> Result<Vec<Value>, SyncError> {
        self.fields
            .iter()
            .map(|field| {
                let raw = match self.store.get(&field.key) {
                    Some(raw) => raw,
                    None => {
                        let encoded = field.encoded_truth();
                        self.store.set(&field.key, &encoded);
                        encoded
                    }
                };
                serde_json::from_str(&raw).map_err(|source| SyncError::Decode {
                    key: field.key.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Overwrites every record with the current live value.
    pub fn save(&self) {
        for field in &self.fields {
            self.store.set(&field.key, &field.encoded_truth());
        }
    }

    /// Removes every record, present or not.
    pub fn clear(&self) {
        for field in &self.fields {
            self.store.remove(&field.key);
        }
    }
}

/// The two settings kept for a media element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaSettings {
    pub muted: bool,
    pub volume: f64,
}

impl MediaSettings {
    /// Live settings of `media`, as persisted: `muted` first, then `volume`.
    pub fn fields<M: MediaElement>(media: &M, config: &HookConfig) -> Vec<WatchedField> {
        let muted = media.clone();
        let volume = media.clone();
        vec![
            WatchedField::new(config.muted_key.clone(), move || Value::from(muted.muted())),
            WatchedField::new(config.volume_key.clone(), move || {
                Value::from(volume.volume())
            }),
        ]
    }

    /// Interprets the output of [`SettingsSynchronizer::load`] for [`Self::fields`].
    ///
    /// Values are converted the way a page script assigning them to the
    /// element would: `muted` by truthiness, `volume` by numeric conversion.
    /// Only a volume with no finite numeric reading is an error; its range is
    /// not checked.
    pub fn from_loaded(values: &[Value], config: &HookConfig) -> Result<Self, SyncError> {
        let volume = values.get(1).unwrap_or(&Value::Null);
        Ok(Self {
            muted: values.first().is_some_and(truthy),
            volume: numeric(volume).ok_or_else(|| SyncError::Shape {
                key: config.volume_key.clone(),
                expected: "a finite number",
                found: volume.to_string(),
            })?,
        })
    }

    /// Volume goes first, then muted.
    pub fn apply<M: MediaElement>(&self, media: &M) {
        media.set_volume(self.volume);
        media.set_muted(self.muted);
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64()?,
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().ok()?,
        Value::Array(_) | Value::Object(_) => return None,
    };
    n.is_finite().then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::sim::SimMedia;
    use serde_json::json;

    fn setup(volume: f64, muted: bool) -> (Rc<MemoryStore>, SimMedia, SettingsSynchronizer) {
        let store = Rc::new(MemoryStore::new());
        let media = SimMedia::new(volume, muted);
        let sync = SettingsSynchronizer::new(
            store.clone(),
            MediaSettings::fields(&media, &HookConfig::default()),
        );
        (store, media, sync)
    }

    #[test]
    fn load_on_empty_store_seeds_from_live_values() {
        let (store, _media, sync) = setup(1.0, false);
        assert_eq!(sync.load().unwrap(), vec![json!(false), json!(1.0)]);
        assert_eq!(store.get("__R43KV_muted").as_deref(), Some("false"));
        assert_eq!(store.get("__R34KV_volume").as_deref(), Some("1.0"));
    }

    #[test]
    fn load_prefers_stored_records() {
        let (store, _media, sync) = setup(1.0, false);
        store.set("__R43KV_muted", "true");
        store.set("__R34KV_volume", "0.25");
        assert_eq!(sync.load().unwrap(), vec![json!(true), json!(0.25)]);
    }

    #[test]
    fn save_then_load_round_trips_exactly() {
        let (_store, media, sync) = setup(1.0, false);
        for volume in [0.0, 0.1, 1.0 / 3.0, 0.7000000000000001, 1.0] {
            media.set_volume(volume);
            media.set_muted(volume > 0.5);
            sync.save();
            let loaded = MediaSettings::from_loaded(&sync.load().unwrap(), &HookConfig::default())
                .unwrap();
            assert_eq!(loaded.volume.to_bits(), volume.to_bits());
            assert_eq!(loaded.muted, volume > 0.5);
        }
    }

    #[test]
    fn corrupt_record_is_a_decode_error() {
        let (store, _media, sync) = setup(1.0, false);
        store.set("__R34KV_volume", "{not json");
        let err = sync.load().unwrap_err();
        assert!(matches!(err, SyncError::Decode { .. }));
        assert_eq!(err.key(), "__R34KV_volume");
    }

    #[test]
    fn clear_is_idempotent() {
        let (store, _media, sync) = setup(1.0, false);
        store.set("unrelated", "1");
        sync.save();
        sync.clear();
        let once = store.snapshot();
        sync.clear();
        assert_eq!(store.snapshot(), once);
        assert_eq!(once.len(), 1);
        assert!(once.contains_key("unrelated"));
    }

    #[test]
    fn muted_follows_javascript_truthiness() {
        let config = HookConfig::default();
        for (stored, muted) in [
            (json!(0), false),
            (json!(""), false),
            (json!(null), false),
            (json!(1), true),
            (json!("no"), true),
            (json!(true), true),
        ] {
            let settings = MediaSettings::from_loaded(&[stored.clone(), json!(0.5)], &config)
                .unwrap_or_else(|err| panic!("{stored} rejected: {err}"));
            assert_eq!(settings.muted, muted, "muted from {stored}");
            assert_eq!(settings.volume, 0.5);
        }
    }

    #[test]
    fn volume_needs_a_number_but_not_a_range() {
        let config = HookConfig::default();
        let loud = MediaSettings::from_loaded(&[json!(false), json!(7)], &config).unwrap();
        assert_eq!(loud.volume, 7.0);
        let text = MediaSettings::from_loaded(&[json!(false), json!(" 0.3 ")], &config).unwrap();
        assert_eq!(text.volume, 0.3);

        for stored in [json!("loud"), json!([0.5]), json!({})] {
            let err = MediaSettings::from_loaded(&[json!(false), stored], &config).unwrap_err();
            assert!(matches!(err, SyncError::Shape { .. }));
            assert_eq!(err.key(), "__R34KV_volume");
        }
    }

    #[test]
    fn apply_writes_both_settings() {
        let media = SimMedia::new(1.0, false);
        MediaSettings {
            muted: true,
            volume: 0.3,
        }
        .apply(&media);
        assert!(media.muted());
        assert_eq!(media.volume(), 0.3);
    }
}
