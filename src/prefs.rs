use crate::api::types::OperationsLimit;
use crate::errors::DashResult;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

const PREFERENCES_KEY: &str = "preferences";

// ── Preference values ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Cards,
    Table,
}

/// User-facing display preferences. Injected into the coordinator and the
/// relay instead of living in ambient global storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub currency: Currency,
    pub view_mode: ViewMode,
    pub operations_limit: OperationsLimit,
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
pub struct PreferencesPatch {
    pub currency: Option<Currency>,
    pub view_mode: Option<ViewMode>,
    pub operations_limit: Option<OperationsLimit>,
}

impl Preferences {
    pub fn apply(mut self, patch: PreferencesPatch) -> Self {
        if let Some(c) = patch.currency { self.currency = c; }
        if let Some(v) = patch.view_mode { self.view_mode = v; }
        if let Some(l) = patch.operations_limit { self.operations_limit = l; }
        self
    }
}

// ── Storage ──

/// String key-value persistence for preferences.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> DashResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> DashResult<()>;
}

/// Volatile store, used when persistence is not wanted.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> DashResult<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> DashResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ── Observable cell ──

/// Current preferences plus change notification.
/// Writers persist first, then publish; readers `subscribe()`.
pub struct PreferenceCell {
    store: Arc<dyn KeyValueStore>,
    tx: watch::Sender<Preferences>,
}

impl PreferenceCell {
    pub fn load(store: Arc<dyn KeyValueStore>, defaults: Preferences) -> Self {
        let initial = match store.get(PREFERENCES_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "stored preferences unreadable, using defaults");
                defaults
            }),
            Ok(None) => defaults,
            Err(e) => {
                tracing::warn!(error = %e, "preference store unavailable, using defaults");
                defaults
            }
        };
        let (tx, _) = watch::channel(initial);
        Self { store, tx }
    }

    #[inline]
    pub fn current(&self) -> Preferences {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Preferences> {
        self.tx.subscribe()
    }

    /// Persist and publish. Subscribers are only woken on an actual change.
    pub fn update(&self, patch: PreferencesPatch) -> DashResult<Preferences> {
        let next = self.current().apply(patch);
        let raw = serde_json::to_string(&next)?;
        self.store.set(PREFERENCES_KEY, &raw)?;

        let changed = self.tx.send_if_modified(|prefs| {
            if *prefs == next {
                return false;
            }
            *prefs = next;
            true
        });
        if changed {
            tracing::info!(
                currency = ?next.currency,
                view_mode = ?next.view_mode,
                operations_limit = %next.operations_limit,
                "preferences updated"
            );
        }
        Ok(next)
    }
}
