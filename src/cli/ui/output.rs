use console::style;

use crate::types::{ChangeDetails, ChangeOperation, ConfigEvent};

/// Styled terminal output for the `cfgsync` binary. Values go to stdout,
/// status lines to stderr.
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        eprintln!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        eprintln!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        eprintln!("{} {}", style("ℹ").blue(), message);
    }

    /// Raw value, unstyled so it can be piped
    pub fn value(&self, value: &str) {
        println!("{}", value);
    }

    pub fn event(&self, event: &ConfigEvent) {
        match event {
            ConfigEvent::Changed {
                generation,
                changes,
                applied_at,
            } => {
                println!(
                    "{} generation {} ({} change(s))",
                    style(applied_at.format("%H:%M:%S")).dim(),
                    style(generation).bold(),
                    changes.len()
                );
                for change in changes.iter() {
                    self.change(change);
                }
            }
            ConfigEvent::Rejected {
                reason,
                received_at,
            } => {
                println!(
                    "{} {} {}",
                    style(received_at.format("%H:%M:%S")).dim(),
                    style("rejected").red(),
                    reason
                );
            }
        }
    }

    fn change(&self, change: &ChangeDetails) {
        let marker = match change.operation {
            ChangeOperation::Added => style("+").green(),
            ChangeOperation::Updated => style("~").yellow(),
            ChangeOperation::Deleted => style("-").red(),
        };
        match &change.value {
            Some(value) => println!("  {} {} = {}", marker, change.name, value),
            None => println!("  {} {}", marker, change.name),
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
