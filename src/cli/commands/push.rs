//! Push Command
//!
//! Validate a local document and write it to the configured remote key.
//!
//! Usage:
//!   cfgsync push <file>

use std::path::Path;
use tracing::info;

use crate::cli::Output;
use crate::config::Settings;
use crate::remote::{ConsulClient, RemoteStore};
use crate::store::document;
use crate::types::{CfgError, Result};

pub async fn run(settings: &Settings, file: &Path) -> Result<()> {
    let key = settings
        .remote
        .key
        .as_deref()
        .ok_or_else(|| CfgError::Config("Remote key is not configured".to_string()))?;

    let bytes = read_document(file)?;
    let client = ConsulClient::from_settings(&settings.remote)?;

    info!("Pushing {} to '{}'", file.display(), key);
    push(&client, key, &bytes).await?;

    Output::new().success(&format!("Pushed {} to '{}'", file.display(), key));
    Ok(())
}

/// Read `file` and make sure it holds a JSON object
fn read_document(file: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(file).map_err(|e| CfgError::load(file.display().to_string(), e))?;
    document::parse(&bytes).map_err(|e| CfgError::load(file.display().to_string(), e))?;
    Ok(bytes)
}

async fn push(store: &dyn RemoteStore, key: &str, bytes: &[u8]) -> Result<()> {
    store.put(key, bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryStore;
    use tempfile::TempDir;

    #[test]
    fn test_read_document_validates_json() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.json");
        let bad = dir.path().join("bad.json");
        std::fs::write(&good, r#"{"port":"8080"}"#).unwrap();
        std::fs::write(&bad, "[1,2]").unwrap();

        assert!(read_document(&good).is_ok());
        assert!(matches!(read_document(&bad), Err(CfgError::Load { .. })));
    }

    #[tokio::test]
    async fn test_push_writes_value() {
        let store = MemoryStore::new();
        push(&store, "config/app", b"{}").await.unwrap();
        let kv = store.get("config/app", None).await.unwrap().unwrap();
        assert_eq!(kv.value, b"{}".to_vec());
    }

    #[tokio::test]
    async fn test_push_requires_remote_key() {
        let settings = Settings::default();
        let err = run(&settings, Path::new("configuration.json")).await.unwrap_err();
        assert!(matches!(err, CfgError::Config(_)));
    }
}
