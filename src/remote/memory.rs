//! In-Process Key-Value Store
//!
//! A `RemoteStore` held entirely in memory. Writes bump a store-wide index
//! exactly like a Consul agent, and blocking GETs park until the key's
//! modify index moves or the wait expires. Used by tests and by embedders
//! that want the watch machinery without a network hop.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::{KeyValuePair, QueryOptions, RemoteStore};
use crate::constants::watch;
use crate::types::{CfgError, Result};

#[derive(Default)]
struct MemoryState {
    entries: HashMap<String, KeyValuePair>,
    index: u64,
}

/// In-memory remote store with blocking-query support
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    changed: Notify,
    available: AtomicBool,
    failing_puts: AtomicUsize,
    put_count: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            changed: Notify::new(),
            available: AtomicBool::new(true),
            failing_puts: AtomicUsize::new(0),
            put_count: AtomicUsize::new(0),
        }
    }

    /// Simulate an outage: while unavailable every call fails with
    /// `CfgError::Transport`, including GETs already blocked.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        self.changed.notify_waiters();
    }

    /// Make the next `count` PUTs fail with a transport error
    pub fn fail_next_puts(&self, count: usize) {
        self.failing_puts.store(count, Ordering::SeqCst);
    }

    /// Number of successful PUTs so far
    pub fn put_count(&self) -> usize {
        self.put_count.load(Ordering::SeqCst)
    }

    /// Store-wide index, raised by every write
    pub fn index(&self) -> u64 {
        self.lock().index
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CfgError::transport("memory store unavailable"))
        }
    }

    fn current(&self, key: &str) -> Option<KeyValuePair> {
        self.lock().entries.get(key).cloned()
    }

    fn take_put_failure(&self) -> bool {
        self.failing_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, key: &str, options: Option<QueryOptions>) -> Result<Option<KeyValuePair>> {
        let key = key.trim_start_matches('/');
        self.check_available()?;

        let Some(options) = options.filter(|o| o.wait_index != 0) else {
            return Ok(self.current(key));
        };

        let wait = if options.wait_time.is_zero() {
            Duration::from_secs(watch::WAIT_SECS)
        } else {
            options.wait_time
        };
        let deadline = Instant::now() + wait;

        loop {
            // Registered before the state check so no write is missed
            let notified = self.changed.notified();

            self.check_available()?;
            let current = self.current(key);
            let index = current.as_ref().map_or(0, |kv| kv.modify_index);
            if index != options.wait_index {
                return Ok(current);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(current);
            }
        }
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let key = key.trim_start_matches('/');
        self.check_available()?;
        if self.take_put_failure() {
            return Err(CfgError::transport("injected PUT failure"));
        }

        {
            let mut state = self.lock();
            state.index += 1;
            let index = state.index;
            let entry = state
                .entries
                .entry(key.to_string())
                .or_insert_with(|| KeyValuePair {
                    key: key.to_string(),
                    create_index: index,
                    ..Default::default()
                });
            entry.modify_index = index;
            entry.value = value.to_vec();
        }

        self.put_count.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_waiters();
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = key.trim_start_matches('/');
        self.check_available()?;

        {
            let mut state = self.lock();
            if state.entries.remove(key).is_some() {
                state.index += 1;
            }
        }

        self.changed.notify_waiters();
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
