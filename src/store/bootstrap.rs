//! Source selection and fetch-or-seed
//!
//! Local candidates, first existing wins:
//! 1. `local_path` (the conventional override file)
//! 2. `runtime_config_path`, or `secrets_path` when no runtime path is set
//!
//! In remote mode the chosen local file is only the seed pushed when the
//! remote key does not exist yet.

use backon::{ExponentialBuilder, Retryable};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::document;
use crate::config::Settings;
use crate::constants::network;
use crate::remote::RemoteStore;
use crate::types::{CfgError, Result};

/// Pick the local document, if any exists on disk
pub fn resolve_local_source(settings: &Settings) -> Option<PathBuf> {
    if settings.local_path.exists() {
        return Some(settings.local_path.clone());
    }

    let fallback = settings
        .runtime_config_path
        .clone()
        .unwrap_or_else(|| settings.secrets_path.clone());

    if fallback.exists() {
        Some(fallback)
    } else {
        debug!("No local configuration found (checked {})", fallback.display());
        None
    }
}

/// Return the remote value of `key`, seeding it from `local` when absent.
///
/// The local default is validated as a JSON document before it is pushed.
/// Fails with `CfgError::Bootstrap` when the store cannot be read, when no
/// local default is available to seed with, or when the seed cannot be
/// written.
pub async fn fetch_or_seed(store: &dyn RemoteStore, key: &str, local: Option<&Path>) -> Result<Vec<u8>> {
    let existing = store
        .get(key, None)
        .await
        .map_err(|e| CfgError::bootstrap(key, format!("unable to read from {}: {}", store.name(), e)))?;

    if let Some(kv) = existing {
        debug!("Using existing remote value for '{}' (index {})", key, kv.modify_index);
        return Ok(kv.value);
    }

    info!(
        "'{}' not found in {}, pushing local default configuration",
        key,
        store.name()
    );

    let path = local.ok_or_else(|| {
        CfgError::bootstrap(key, "remote key is absent and no local default configuration exists")
    })?;

    let bytes = std::fs::read(path).map_err(|e| {
        CfgError::bootstrap(
            key,
            format!("unable to read local default {}: {}", path.display(), e),
        )
    })?;

    document::parse(&bytes).map_err(|e| CfgError::load(path.display().to_string(), e))?;

    let backoff = ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(network::BASE_DELAY_MS))
        .with_max_times(network::MAX_NETWORK_RETRIES);

    (|| async { store.put(key, &bytes).await })
        .retry(backoff)
        .when(|e: &CfgError| e.is_transient())
        .notify(|e: &CfgError, delay: Duration| {
            warn!("Seeding '{}' failed: {}, retrying in {:?}", key, e, delay);
        })
        .await
        .map_err(|e| CfgError::bootstrap(key, format!("unable to push local default: {}", e)))?;

    info!("Seeded '{}' from {}", key, path.display());
    Ok(bytes)
}
