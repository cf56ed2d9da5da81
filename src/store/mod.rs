//! Configuration Store
//!
//! The section-aware document store and its building blocks.
//!
//! ## Modules
//!
//! - `config_store`: `ConfigStore`, typed lookups, generations, notifications
//! - `document`: Dotted-path resolution with section override
//! - `convert`: Value and environment-string coercion
//! - `diff`: Global/section partition and change classification
//! - `bootstrap`: Local source selection and remote fetch-or-seed

mod bootstrap;
mod config_store;
pub mod convert;
pub mod diff;
pub mod document;

pub use bootstrap::{fetch_or_seed, resolve_local_source};
pub use config_store::{ChangeCallback, ConfigStore};
pub use diff::{Sections, compute_sections, diff_sections, values_equal};
