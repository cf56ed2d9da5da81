//! Long-Poll Watcher
//!
//! Follows one remote key and reports every new value.
//!
//! ## Loop
//!
//! 1. Initial GET (no wait) establishes the current modification index; with
//!    `start_from`, a value differing from the caller's copy is reported first
//! 2. Blocking GET with `wait_index = last index`
//! 3. Same index returned: the wait expired, poll again immediately
//! 4. New index returned: run the callback, then advance the index
//! 5. Transport error or missing key: log, back off, poll again with the same index
//!
//! Only one request is ever outstanding, so callbacks run in the order
//! changes are observed. The loop stops when its `WatchHandle` is stopped
//! or dropped.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::WatchSettings;
use crate::constants::watch as defaults;
use crate::remote::{QueryOptions, SharedRemoteStore};
use crate::types::{CfgError, Result};

/// Long-poll tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Server-side blocking wait per poll
    pub wait: Duration,
    /// Pause after a failed poll
    pub retry_backoff: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(defaults::WAIT_SECS),
            retry_backoff: Duration::from_secs(defaults::RETRY_BACKOFF_SECS),
        }
    }
}

impl From<&WatchSettings> for WatchOptions {
    fn from(settings: &WatchSettings) -> Self {
        Self {
            wait: Duration::from_secs(settings.wait_secs),
            retry_backoff: Duration::from_secs(settings.retry_backoff_secs),
        }
    }
}

// =============================================================================
// Watcher
// =============================================================================

/// Watches a single key of a remote store
pub struct Watcher {
    store: SharedRemoteStore,
    key: String,
    options: WatchOptions,
}

impl Watcher {
    pub fn new(store: SharedRemoteStore, key: impl Into<String>, options: WatchOptions) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(CfgError::watch_init(key, "key must not be empty"));
        }

        Ok(Self {
            store,
            key,
            options,
        })
    }

    /// Establish the starting index and spawn the poll loop.
    ///
    /// `callback` receives the raw value of every observed change and runs
    /// on the loop's task. Fails with `CfgError::WatchInit` if the key is
    /// missing or the store is unreachable.
    pub async fn start<F>(&self, callback: F) -> Result<WatchHandle>
    where
        F: FnMut(Vec<u8>) + Send + 'static,
    {
        self.spawn(None, callback).await
    }

    /// Like `start`, for a caller that already read the key.
    ///
    /// If the value seen by the initial GET differs from `known`, the key was
    /// written in between and `callback` gets that value before the loop runs.
    pub async fn start_from<F>(&self, known: &[u8], callback: F) -> Result<WatchHandle>
    where
        F: FnMut(Vec<u8>) + Send + 'static,
    {
        self.spawn(Some(known), callback).await
    }

    async fn spawn<F>(&self, known: Option<&[u8]>, mut callback: F) -> Result<WatchHandle>
    where
        F: FnMut(Vec<u8>) + Send + 'static,
    {
        let initial = self
            .store
            .get(&self.key, None)
            .await
            .map_err(|e| CfgError::watch_init(&self.key, e.to_string()))?
            .ok_or_else(|| CfgError::watch_init(&self.key, "key does not exist"))?;

        info!(
            "Watching '{}' on {} from index {}",
            self.key,
            self.store.name(),
            initial.modify_index
        );

        if let Some(known) = known
            && known != initial.value.as_slice()
        {
            debug!("'{}' changed before the watch started", self.key);
            callback(initial.value);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let poller = PollLoop {
            store: self.store.clone(),
            key: self.key.clone(),
            options: self.options,
            last_index: initial.modify_index,
        };
        let task = tokio::spawn(poller.run(callback, shutdown_rx));

        Ok(WatchHandle {
            shutdown: shutdown_tx,
            task: Some(task),
        })
    }
}

struct PollLoop {
    store: SharedRemoteStore,
    key: String,
    options: WatchOptions,
    last_index: u64,
}

impl PollLoop {
    async fn run<F>(mut self, mut callback: F, mut shutdown: watch::Receiver<bool>)
    where
        F: FnMut(Vec<u8>) + Send + 'static,
    {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let query = QueryOptions::blocking(self.last_index, self.options.wait);
            let outcome = tokio::select! {
                _ = shutdown.changed() => break,
                outcome = self.store.get(&self.key, Some(query)) => outcome,
            };

            match outcome {
                Ok(Some(kv)) if kv.modify_index == self.last_index => {
                    debug!("Long poll on '{}' expired without change", self.key);
                }
                Ok(Some(kv)) => {
                    debug!(
                        "'{}' changed: index {} -> {}",
                        self.key, self.last_index, kv.modify_index
                    );
                    callback(kv.value);
                    self.last_index = kv.modify_index;
                }
                Ok(None) => {
                    warn!(
                        "Watched key '{}' disappeared, retrying in {:?}",
                        self.key, self.options.retry_backoff
                    );
                    if Self::backoff(self.options.retry_backoff, &mut shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!(
                        "Watch on '{}' failed: {}, retrying in {:?}",
                        self.key, e, self.options.retry_backoff
                    );
                    if Self::backoff(self.options.retry_backoff, &mut shutdown).await {
                        break;
                    }
                }
            }
        }

        debug!("Watch loop for '{}' stopped", self.key);
    }

    /// Sleep for `delay`; returns true if shutdown was requested meanwhile
    async fn backoff(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = shutdown.changed() => true,
            _ = tokio::time::sleep(delay) => false,
        }
    }
}

// =============================================================================
// Watch Handle
// =============================================================================

/// Controls a running poll loop. Dropping the handle stops the loop.
pub struct WatchHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Signal the loop to stop without waiting for it
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Signal the loop to stop and wait until it has exited
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!("Watch task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
