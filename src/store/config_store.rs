//! ConfigStore
//!
//! Holds the current document generation and answers typed lookups.
//!
//! ## Lookup order
//!
//! 1. `<section>.<path>` in the document (when a section is active)
//! 2. `<path>` in the document
//! 3. Environment variable named `<path>` (scalar and list accessors only)
//! 4. `CfgError::NotFound`
//!
//! ## Generations
//!
//! Each applied document is an immutable `Generation` behind an `ArcSwap`.
//! Readers take a snapshot and never observe a half-applied document.
//! Remote changes are parsed, swapped in, diffed against the previous
//! generation, and reported to the change callback and to broadcast
//! subscribers when the diff is non-empty.

use arc_swap::ArcSwap;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{bootstrap, convert, diff, document};
use crate::config::{Settings, SettingsLoader};
use crate::constants::events;
use crate::remote::{ConsulClient, SharedRemoteStore};
use crate::types::{CfgError, ChangeDetails, ConfigEvent, Document, Result};
use crate::watch::{WatchHandle, WatchOptions, Watcher};

/// Single change subscriber, invoked on the watcher task
pub type ChangeCallback = Arc<dyn Fn(&[ChangeDetails]) + Send + Sync>;

/// One applied document
struct Generation {
    document: Arc<Document>,
    raw: Vec<u8>,
    number: u64,
}

impl Generation {
    fn empty() -> Self {
        Self {
            document: Arc::new(Document::new()),
            raw: Vec::new(),
            number: 0,
        }
    }
}

struct Inner {
    section: Option<String>,
    current: ArcSwap<Generation>,
    /// Serializes writers; readers go through `current` only
    write_lock: Mutex<()>,
    callback: RwLock<Option<ChangeCallback>>,
    events: broadcast::Sender<ConfigEvent>,
    watch: Mutex<Option<WatchHandle>>,
}

/// Section-aware configuration store. Cloning shares the same state.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<Inner>,
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("section", &self.inner.section)
            .field("generation", &self.generation())
            .field("watching", &self.is_watching())
            .finish()
    }
}

impl ConfigStore {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Store with no document; every lookup falls through to the environment
    pub fn empty(section: Option<&str>) -> Self {
        let (events, _) = broadcast::channel(events::CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                section: section.filter(|s| !s.is_empty()).map(str::to_string),
                current: ArcSwap::from_pointee(Generation::empty()),
                write_lock: Mutex::new(()),
                callback: RwLock::new(None),
                events,
                watch: Mutex::new(None),
            }),
        }
    }

    pub fn from_bytes(bytes: &[u8], section: Option<&str>) -> Result<Self> {
        let store = Self::empty(section);
        store.load_bytes(bytes)?;
        Ok(store)
    }

    pub fn from_path(path: &Path, section: Option<&str>) -> Result<Self> {
        let store = Self::empty(section);
        store.load_file(path)?;
        Ok(store)
    }

    /// Load using settings resolved from the settings file and environment
    pub async fn from_settings_env() -> Result<Self> {
        Self::load(SettingsLoader::load()?).await
    }

    /// Full startup resolution.
    ///
    /// With both a remote URL and key configured, the document comes from the
    /// remote store (seeded from the local file if the key is absent) and a
    /// watcher is started. Otherwise the first existing local file is loaded;
    /// with no file at all the store starts empty.
    pub async fn load(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let local = bootstrap::resolve_local_source(&settings);

        if let (Some(_), Some(key)) = (&settings.remote.url, &settings.remote.key) {
            let client = ConsulClient::from_settings(&settings.remote)?;
            info!("Using remote configuration '{}' at {}", key, client.address());

            return Self::connect(
                Arc::new(client),
                key,
                settings.section_name(),
                local.as_deref(),
                WatchOptions::from(&settings.watch),
            )
            .await;
        }

        info!("Remote store not configured, using local configuration");
        match local {
            Some(path) => Self::from_path(&path, settings.section_name()),
            None => {
                warn!("No local configuration file found, starting with an empty document");
                Ok(Self::empty(settings.section_name()))
            }
        }
    }

    /// Remote-backed store: fetch-or-seed `key`, then watch it for changes
    pub async fn connect(
        remote: SharedRemoteStore,
        key: &str,
        section: Option<&str>,
        local_default: Option<&Path>,
        options: WatchOptions,
    ) -> Result<Self> {
        let bytes = bootstrap::fetch_or_seed(remote.as_ref(), key, local_default).await?;

        let store = Self::empty(section);
        let parsed = document::parse(&bytes).map_err(|e| CfgError::load(key, e))?;
        store.inner.install(parsed, bytes.clone());

        // A write landing between the fetch above and the watcher's own GET
        // is delivered by `start_from` before polling begins
        let watcher = Watcher::new(remote, key, options)?;
        let weak: Weak<Inner> = Arc::downgrade(&store.inner);
        let handle = watcher
            .start_from(&bytes, move |value| {
                if let Some(inner) = weak.upgrade() {
                    inner.apply_remote_change(value);
                }
            })
            .await?;

        *store.inner.lock_watch() = Some(handle);
        Ok(store)
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Replace the document with the contents of `path`.
    /// On failure the current generation is kept.
    pub fn load_file(&self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path).map_err(|e| CfgError::load(path.display().to_string(), e))?;
        let parsed = document::parse(&bytes)
            .map_err(|e| CfgError::load(path.display().to_string(), e))?;

        let generation = self.inner.install(parsed, bytes);
        debug!("Loaded {} as generation {}", path.display(), generation);
        Ok(())
    }

    /// Replace the document with `bytes`. On failure the current generation is kept.
    pub fn load_bytes(&self, bytes: &[u8]) -> Result<()> {
        let parsed = document::parse(bytes).map_err(|e| CfgError::load("bytes", e))?;
        self.inner.install(parsed, bytes.to_vec());
        Ok(())
    }

    // =========================================================================
    // Typed Accessors
    // =========================================================================

    pub fn get_string(&self, path: &str) -> Result<String> {
        self.resolve_scalar(path, convert::value_to_string, |_, raw| Ok(raw.to_string()))
    }

    pub fn get_int(&self, path: &str) -> Result<i64> {
        self.resolve_scalar(path, convert::value_to_int, convert::parse_int)
    }

    pub fn get_float(&self, path: &str) -> Result<f64> {
        self.resolve_scalar(path, convert::value_to_float, convert::parse_float)
    }

    pub fn get_bool(&self, path: &str) -> Result<bool> {
        self.resolve_scalar(path, convert::value_to_bool, convert::parse_bool)
    }

    /// Environment values are split on `,` with surrounding `[]` removed
    pub fn get_string_list(&self, path: &str) -> Result<Vec<String>> {
        self.resolve_scalar(path, convert::value_to_string_list, |_, raw| {
            Ok(convert::split_list(raw))
        })
    }

    /// A nested map. No environment fallback.
    pub fn get_nested_section(&self, path: &str) -> Result<Map<String, Value>> {
        let generation = self.inner.current.load();
        let value = document::resolve(&generation.document, self.section(), path)
            .ok_or_else(|| CfgError::not_found(path))?;
        convert::value_to_section(path, value)
    }

    /// A nested map of maps, with scalar leaves rendered as strings
    pub fn get_nested_string_map(&self, path: &str) -> Result<HashMap<String, HashMap<String, String>>> {
        let section = self.get_nested_section(path)?;
        convert::section_to_string_map(path, &section)
    }

    fn resolve_scalar<T, D, E>(&self, path: &str, from_document: D, from_env: E) -> Result<T>
    where
        D: Fn(&str, &Value) -> Result<T>,
        E: Fn(&str, &str) -> Result<T>,
    {
        let generation = self.inner.current.load();
        if let Some(value) = document::resolve(&generation.document, self.section(), path) {
            return from_document(path, value);
        }

        match std::env::var(path) {
            Ok(raw) => from_env(path, &raw),
            Err(_) => Err(CfgError::not_found(path)),
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Snapshot of the current document
    pub fn document(&self) -> Arc<Document> {
        Arc::clone(&self.inner.current.load().document)
    }

    /// Bytes the current document was parsed from
    pub fn raw(&self) -> Vec<u8> {
        self.inner.current.load().raw.clone()
    }

    /// Bumped on every applied document; 0 before the first load
    pub fn generation(&self) -> u64 {
        self.inner.current.load().number
    }

    pub fn section(&self) -> Option<&str> {
        self.inner.section.as_deref()
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Register the change subscriber, replacing any previous one
    pub fn set_change_callback<F>(&self, callback: F)
    where
        F: Fn(&[ChangeDetails]) + Send + Sync + 'static,
    {
        let mut slot = self
            .inner
            .callback
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(Arc::new(callback));
    }

    /// Receive every `ConfigEvent` from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigEvent> {
        self.inner.events.subscribe()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub fn is_watching(&self) -> bool {
        self.inner
            .lock_watch()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the watcher, if any, and wait for it to exit
    pub async fn shutdown(&self) {
        let handle = self.inner.lock_watch().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
            info!("Configuration watch stopped");
        }
    }
}

impl Inner {
    fn lock_watch(&self) -> std::sync::MutexGuard<'_, Option<WatchHandle>> {
        self.watch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_writes(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Swap in a new generation and return its number
    fn install(&self, document: Document, raw: Vec<u8>) -> u64 {
        let _guard = self.lock_writes();
        self.store_generation(document, raw)
    }

    fn store_generation(&self, document: Document, raw: Vec<u8>) -> u64 {
        let number = self.current.load().number + 1;
        self.current.store(Arc::new(Generation {
            document: Arc::new(document),
            raw,
            number,
        }));
        number
    }

    /// Apply a value delivered by the watcher.
    ///
    /// A payload that does not parse is rejected and the current
    /// generation stays in place.
    fn apply_remote_change(&self, raw: Vec<u8>) {
        let parsed = match document::parse(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Rejected remote configuration change: {}", e);
                let _ = self.events.send(ConfigEvent::Rejected {
                    reason: e.to_string(),
                    received_at: Utc::now(),
                });
                return;
            }
        };

        let section = self.section.as_deref();
        let (generation, changes) = {
            let _guard = self.lock_writes();
            let previous = diff::compute_sections(&self.current.load().document, section);
            let next = diff::compute_sections(&parsed, section);
            let changes = diff::diff_sections(&previous, &next, section);
            (self.store_generation(parsed, raw), changes)
        };

        if changes.is_empty() {
            debug!("Applied generation {} with no visible changes", generation);
            return;
        }

        info!("Applied generation {} with {} change(s)", generation, changes.len());
        for change in &changes {
            debug!("  {}", change);
        }

        let callback = self
            .callback
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(callback) = callback {
            callback(&changes);
        }

        let _ = self.events.send(ConfigEvent::Changed {
            generation,
            changes: Arc::new(changes),
            applied_at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{KeyValuePair, MemoryStore, QueryOptions, RemoteStore};
    use crate::types::ChangeOperation;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    const SIMPLE: &str = r#"{
        "id": 999,
        "name": "RRP",
        "port": "8080",
        "rate": 26.53,
        "enabled": true,
        "hosts": ["one", "two"],
        "mixed": ["one", 2]
    }"#;

    const SECTIONED: &str = r#"{
        "port": "8080",
        "host": "localhost",
        "rules-service": {"port": "8085", "workers": 4},
        "databases": {
            "primary": {"host": "db1", "port": 5432},
            "replica": {"host": "db2", "port": 5433, "readonly": true}
        }
    }"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn set_env(name: &str, value: &str) {
        // SAFETY: each test uses its own variable name
        unsafe { std::env::set_var(name, value) };
    }

    fn recording_callback(store: &ConfigStore) -> Arc<Mutex<Vec<Vec<ChangeDetails>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.set_change_callback(move |changes| {
            sink.lock().unwrap().push(changes.to_vec());
        });
        seen
    }

    fn fast_watch() -> WatchOptions {
        WatchOptions {
            wait: Duration::from_millis(100),
            retry_backoff: Duration::from_millis(50),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[test]
    fn test_typed_accessors() {
        let store = ConfigStore::from_bytes(SIMPLE.as_bytes(), None).unwrap();

        assert_eq!(store.get_int("id").unwrap(), 999);
        assert_eq!(store.get_string("name").unwrap(), "RRP");
        assert_eq!(store.get_float("rate").unwrap(), 26.53);
        assert!(store.get_bool("enabled").unwrap());
        assert_eq!(store.get_string_list("hosts").unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn test_type_mismatch_is_conversion_error() {
        let store = ConfigStore::from_bytes(SIMPLE.as_bytes(), None).unwrap();

        assert!(store.get_int("name").unwrap_err().is_conversion());
        assert!(store.get_string("id").unwrap_err().is_conversion());
        assert!(store.get_bool("port").unwrap_err().is_conversion());
        assert!(store.get_string_list("mixed").unwrap_err().is_conversion());
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let store = ConfigStore::from_bytes(SIMPLE.as_bytes(), None).unwrap();

        let err = store.get_int("bogus").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "bogus not found");
    }

    #[test]
    fn test_path_past_a_leaf_resolves_to_the_leaf() {
        let store = ConfigStore::from_bytes(SIMPLE.as_bytes(), None).unwrap();

        assert_eq!(store.get_string("name.bogus").unwrap(), "RRP");
        assert!(store.get_nested_section("name.bogus").unwrap_err().is_conversion());
    }

    #[test]
    fn test_section_overrides_global() {
        let store = ConfigStore::from_bytes(SECTIONED.as_bytes(), Some("rules-service")).unwrap();

        assert_eq!(store.get_string("port").unwrap(), "8085");
        assert_eq!(store.get_string("host").unwrap(), "localhost");
        assert_eq!(store.get_int("workers").unwrap(), 4);

        let global = ConfigStore::from_bytes(SECTIONED.as_bytes(), None).unwrap();
        assert_eq!(global.get_string("port").unwrap(), "8080");
        assert!(global.get_int("workers").unwrap_err().is_not_found());
    }

    #[test]
    fn test_env_fallback_int() {
        let store = ConfigStore::from_bytes(SIMPLE.as_bytes(), None).unwrap();

        set_env("CFGSYNC_UNIT_TEST_INT", "777");
        assert_eq!(store.get_int("CFGSYNC_UNIT_TEST_INT").unwrap(), 777);

        set_env("CFGSYNC_UNIT_TEST_BAD_INT", "bogus");
        assert!(store.get_int("CFGSYNC_UNIT_TEST_BAD_INT").unwrap_err().is_conversion());
    }

    #[test]
    fn test_env_fallback_scalars() {
        let store = ConfigStore::empty(Some("rules-service"));

        set_env("CFGSYNC_UNIT_TEST_STRING", "hello");
        set_env("CFGSYNC_UNIT_TEST_FLOAT", "2.5");
        set_env("CFGSYNC_UNIT_TEST_BOOL", "T");

        assert_eq!(store.get_string("CFGSYNC_UNIT_TEST_STRING").unwrap(), "hello");
        assert_eq!(store.get_float("CFGSYNC_UNIT_TEST_FLOAT").unwrap(), 2.5);
        assert!(store.get_bool("CFGSYNC_UNIT_TEST_BOOL").unwrap());
    }

    #[test]
    fn test_env_fallback_list() {
        let store = ConfigStore::empty(None);

        set_env("CFGSYNC_UNIT_TEST_LIST", " one  , two  , three ");
        assert_eq!(
            store.get_string_list("CFGSYNC_UNIT_TEST_LIST").unwrap(),
            vec!["one", "two", "three"]
        );

        set_env("CFGSYNC_UNIT_TEST_BRACKET_LIST", "[a,b]");
        assert_eq!(
            store.get_string_list("CFGSYNC_UNIT_TEST_BRACKET_LIST").unwrap(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_document_wins_over_env() {
        let store = ConfigStore::from_bytes(br#"{"CFGSYNC_UNIT_TEST_SHADOWED": "doc"}"#, None).unwrap();
        set_env("CFGSYNC_UNIT_TEST_SHADOWED", "env");
        assert_eq!(store.get_string("CFGSYNC_UNIT_TEST_SHADOWED").unwrap(), "doc");
    }

    #[test]
    fn test_nested_section() {
        let store = ConfigStore::from_bytes(SECTIONED.as_bytes(), None).unwrap();

        let section = store.get_nested_section("rules-service").unwrap();
        assert_eq!(section["port"], serde_json::json!("8085"));

        let primary = store.get_nested_section("databases.primary").unwrap();
        assert_eq!(primary.len(), 2);

        assert!(store.get_nested_section("port").unwrap_err().is_conversion());
        assert!(store.get_nested_section("bogus").unwrap_err().is_not_found());
    }

    #[test]
    fn test_nested_section_has_no_env_fallback() {
        let store = ConfigStore::empty(None);
        set_env("CFGSYNC_UNIT_TEST_NESTED", "{}");
        assert!(store.get_nested_section("CFGSYNC_UNIT_TEST_NESTED").unwrap_err().is_not_found());
    }

    #[test]
    fn test_nested_string_map() {
        let store = ConfigStore::from_bytes(SECTIONED.as_bytes(), None).unwrap();

        let databases = store.get_nested_string_map("databases").unwrap();
        assert_eq!(databases["primary"]["port"], "5432");
        assert_eq!(databases["replica"]["readonly"], "true");

        let err = store.get_nested_string_map("rules-service").unwrap_err();
        assert!(err.is_conversion());
    }

    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    #[test]
    fn test_load_file_replaces_wholesale() {
        let dir = TempDir::new().unwrap();
        let first = write(&dir, "first.json", r#"{"stale": "yes", "port": "1"}"#);
        let second = write(&dir, "second.json", r#"{"port": "2"}"#);

        let store = ConfigStore::from_path(&first, None).unwrap();
        assert_eq!(store.generation(), 1);

        store.load_file(&second).unwrap();
        assert_eq!(store.generation(), 2);
        assert_eq!(store.get_string("port").unwrap(), "2");
        assert!(store.get_string("stale").unwrap_err().is_not_found());
        assert_eq!(store.raw(), br#"{"port": "2"}"#.to_vec());
    }

    #[test]
    fn test_failed_load_keeps_previous_generation() {
        let dir = TempDir::new().unwrap();
        let bad = write(&dir, "bad.json", "{ nope");

        let store = ConfigStore::from_bytes(br#"{"port": "1"}"#, None).unwrap();
        assert!(matches!(store.load_file(&bad), Err(CfgError::Load { .. })));
        assert!(matches!(
            store.load_file(&dir.path().join("missing.json")),
            Err(CfgError::Load { .. })
        ));

        assert_eq!(store.generation(), 1);
        assert_eq!(store.get_string("port").unwrap(), "1");
    }

    #[test]
    fn test_empty_store() {
        let store = ConfigStore::empty(Some(""));
        assert_eq!(store.section(), None);
        assert_eq!(store.generation(), 0);
        assert!(store.document().is_empty());
        assert!(store.get_string("port").unwrap_err().is_not_found());
        assert!(!store.is_watching());
    }

    #[tokio::test]
    async fn test_load_local_mode() {
        let dir = TempDir::new().unwrap();
        let local = write(&dir, "configuration.json", SECTIONED);

        let settings = Settings {
            local_path: local,
            ..Settings::with_section("rules-service")
        };

        let store = ConfigStore::load(settings).await.unwrap();
        assert_eq!(store.get_string("port").unwrap(), "8085");
        assert!(!store.is_watching());
    }

    #[tokio::test]
    async fn test_load_without_any_source_is_empty() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            local_path: dir.path().join("configuration.json"),
            secrets_path: dir.path().join("secrets.json"),
            ..Settings::default()
        };

        let store = ConfigStore::load(settings).await.unwrap();
        assert!(store.document().is_empty());
    }

    #[tokio::test]
    async fn test_from_settings_env_defaults_to_local_mode() {
        // No settings file or bootstrap variables in the test environment
        let store = ConfigStore::from_settings_env().await.unwrap();
        assert!(!store.is_watching());
        assert_eq!(store.section(), None);
    }

    // -------------------------------------------------------------------------
    // Change Application
    // -------------------------------------------------------------------------

    #[test]
    fn test_remote_change_reports_diff() {
        let store = ConfigStore::from_bytes(
            br#"{"port":"8080","unit-test":{"val1":1,"val2":2}}"#,
            Some("unit-test"),
        )
        .unwrap();
        let seen = recording_callback(&store);

        store
            .inner
            .apply_remote_change(br#"{"port":"1212","url":"localhost","unit-test":{"val1":9}}"#.to_vec());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let changes = &seen[0];
        assert_eq!(changes.len(), 4);
        assert!(changes.iter().any(|c| c.name == "port" && c.operation == ChangeOperation::Updated));
        assert!(changes.iter().any(|c| c.name == "url" && c.operation == ChangeOperation::Added));
        assert!(changes.iter().any(|c| c.name == "unit-test.val1" && c.operation == ChangeOperation::Updated));
        assert!(changes.iter().any(|c| c.name == "unit-test.val2" && c.operation == ChangeOperation::Deleted));

        assert_eq!(store.get_string("port").unwrap(), "1212");
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn test_identical_change_is_silent() {
        let body = br#"{"port":"8080","unit-test":{"val1":1}}"#;
        let store = ConfigStore::from_bytes(body, Some("unit-test")).unwrap();
        let seen = recording_callback(&store);
        let mut events = store.subscribe();

        store.inner.apply_remote_change(body.to_vec());

        assert!(seen.lock().unwrap().is_empty());
        assert!(events.try_recv().is_err());
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn test_non_target_section_change_is_silent() {
        let store = ConfigStore::from_bytes(
            br#"{"port":"8080","other":{"val1":1}}"#,
            Some("unit-test"),
        )
        .unwrap();
        let seen = recording_callback(&store);

        store
            .inner
            .apply_remote_change(br#"{"port":"8080","other":{"val1":2}}"#.to_vec());

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(store.get_int("other.val1").unwrap(), 2);
    }

    #[test]
    fn test_malformed_change_is_rejected() {
        let store = ConfigStore::from_bytes(br#"{"port":"8080"}"#, None).unwrap();
        let seen = recording_callback(&store);
        let mut events = store.subscribe();

        store.inner.apply_remote_change(b"{ not json".to_vec());

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(store.get_string("port").unwrap(), "8080");
        assert_eq!(store.generation(), 1);
        assert!(matches!(events.try_recv(), Ok(ConfigEvent::Rejected { .. })));
    }

    #[test]
    fn test_last_callback_wins() {
        let store = ConfigStore::from_bytes(br#"{"port":"8080"}"#, None).unwrap();
        let first = recording_callback(&store);
        let second = recording_callback(&store);

        store.inner.apply_remote_change(br#"{"port":"9090"}"#.to_vec());

        assert!(first.lock().unwrap().is_empty());
        assert_eq!(second.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_subscribers_receive_changed_event() {
        let store = ConfigStore::from_bytes(br#"{"port":"8080"}"#, None).unwrap();
        let mut first = store.subscribe();
        let mut second = store.subscribe();

        store.inner.apply_remote_change(br#"{"port":"9090"}"#.to_vec());

        for events in [&mut first, &mut second] {
            match events.try_recv().unwrap() {
                ConfigEvent::Changed { generation, changes, .. } => {
                    assert_eq!(generation, 2);
                    assert_eq!(changes.len(), 1);
                    assert_eq!(changes[0].value, Some(serde_json::json!("9090")));
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    // -------------------------------------------------------------------------
    // Remote End-to-End
    // -------------------------------------------------------------------------

    async fn next_event(events: &mut broadcast::Receiver<ConfigEvent>) -> ConfigEvent {
        tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("no event received")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_connect_seeds_and_watches() {
        let dir = TempDir::new().unwrap();
        let local = write(&dir, "configuration.json", r#"{"port":"8080","unit-test":{"val1":1}}"#);
        let remote = Arc::new(MemoryStore::new());

        let store = ConfigStore::connect(
            remote.clone(),
            "config/app",
            Some("unit-test"),
            Some(&local),
            fast_watch(),
        )
        .await
        .unwrap();

        assert_eq!(remote.put_count(), 1);
        assert_eq!(store.get_string("port").unwrap(), "8080");
        assert!(store.is_watching());

        let seen = recording_callback(&store);
        let mut events = store.subscribe();

        remote
            .put("config/app", br#"{"port":"1212","unit-test":{"val1":9}}"#)
            .await
            .unwrap();

        let event = next_event(&mut events).await;
        assert_eq!(event.changes().len(), 2);
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(store.get_int("val1").unwrap(), 9);

        store.shutdown().await;
        assert!(!store.is_watching());
    }

    #[tokio::test]
    async fn test_connect_uses_existing_remote_value() {
        let remote = Arc::new(MemoryStore::new());
        remote.put("config/app", br#"{"port":"9999"}"#).await.unwrap();

        let store = ConfigStore::connect(remote.clone(), "config/app", None, None, fast_watch())
            .await
            .unwrap();

        assert_eq!(store.get_string("port").unwrap(), "9999");
        assert_eq!(remote.put_count(), 1);
        store.shutdown().await;
    }

    /// Lets one write land right after the first read of the key
    struct WriteAfterFirstRead {
        inner: MemoryStore,
        pending: Mutex<Option<Vec<u8>>>,
    }

    #[async_trait]
    impl RemoteStore for WriteAfterFirstRead {
        async fn get(&self, key: &str, options: Option<QueryOptions>) -> Result<Option<KeyValuePair>> {
            let found = self.inner.get(key, options).await?;
            let pending = self.pending.lock().unwrap().take();
            if let Some(value) = pending {
                self.inner.put(key, &value).await?;
            }
            Ok(found)
        }

        async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
            self.inner.put(key, value).await
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key).await
        }

        fn name(&self) -> &str {
            "write-after-first-read"
        }
    }

    #[tokio::test]
    async fn test_connect_picks_up_write_before_watch_starts() {
        let remote = Arc::new(WriteAfterFirstRead {
            inner: MemoryStore::new(),
            pending: Mutex::new(Some(br#"{"port":"2"}"#.to_vec())),
        });
        remote.inner.put("config/app", br#"{"port":"1"}"#).await.unwrap();

        let store = ConfigStore::connect(remote.clone(), "config/app", None, None, fast_watch())
            .await
            .unwrap();

        assert_eq!(store.get_string("port").unwrap(), "2");
        assert_eq!(store.raw(), br#"{"port":"2"}"#.to_vec());

        // The watch follows from the newer index
        let mut events = store.subscribe();
        remote.inner.put("config/app", br#"{"port":"3"}"#).await.unwrap();
        let event = next_event(&mut events).await;
        assert_eq!(event.changes()[0].name, "port");
        assert_eq!(store.get_string("port").unwrap(), "3");

        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_connect_without_seed_fails() {
        let remote = Arc::new(MemoryStore::new());
        let err = ConfigStore::connect(remote, "config/app", None, None, fast_watch())
            .await
            .unwrap_err();
        assert!(matches!(err, CfgError::Bootstrap { .. }));
    }

    #[tokio::test]
    async fn test_watch_survives_outage_and_bad_payload() {
        let remote = Arc::new(MemoryStore::new());
        remote.put("config/app", br#"{"port":"1"}"#).await.unwrap();

        let store = ConfigStore::connect(remote.clone(), "config/app", None, None, fast_watch())
            .await
            .unwrap();
        let mut events = store.subscribe();

        remote.put("config/app", b"{ broken").await.unwrap();
        assert!(matches!(next_event(&mut events).await, ConfigEvent::Rejected { .. }));
        assert_eq!(store.get_string("port").unwrap(), "1");

        remote.set_available(false);
        tokio::time::sleep(Duration::from_millis(120)).await;
        remote.set_available(true);

        remote.put("config/app", br#"{"port":"2"}"#).await.unwrap();
        let event = next_event(&mut events).await;
        assert_eq!(event.changes()[0].name, "port");
        assert_eq!(store.get_string("port").unwrap(), "2");

        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_dropping_store_stops_watch() {
        let remote = Arc::new(MemoryStore::new());
        remote.put("config/app", b"{}").await.unwrap();

        let store = ConfigStore::connect(remote.clone(), "config/app", None, None, fast_watch())
            .await
            .unwrap();
        let weak = Arc::downgrade(&store.inner);
        drop(store);

        assert!(weak.upgrade().is_none());
    }
}
