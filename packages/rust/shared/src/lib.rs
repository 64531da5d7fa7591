//! Shared types, error model, and configuration for localekit.
//!
//! This crate is the foundation depended on by all other localekit crates.
//! It provides:
//! - [`LocalekitError`] — the unified error type
//! - Domain types ([`KeyPath`], [`Language`], [`LineEnding`])
//! - Configuration ([`AppConfig`], [`LocaleLayout`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BackupConfig, LocaleLayout, LocalesConfig, RtlConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{LocalekitError, Result};
pub use types::{KeyPath, Language, LineEnding, content_hash};
