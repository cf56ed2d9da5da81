//! Watch Command
//!
//! Follow remote changes until Ctrl-C.
//!
//! Usage:
//!   cfgsync watch

use tokio::sync::broadcast::error::RecvError;

use crate::cli::Output;
use crate::store::ConfigStore;
use crate::types::Result;

pub async fn run(store: &ConfigStore) -> Result<()> {
    let output = Output::new();

    if !store.is_watching() {
        output.warning("Remote store not configured; nothing to watch");
        return Ok(());
    }

    let mut events = store.subscribe();
    output.info("Watching for configuration changes (Ctrl-C to stop)");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            event = events.recv() => match event {
                Ok(event) => output.event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    output.warning(&format!("Missed {} event(s)", skipped));
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    store.shutdown().await;
    output.success("Watch stopped");
    Ok(())
}
