//! Resource patching for localekit.
//!
//! Loads a JSON localization file, edits nested keys in place while keeping
//! insertion order and non-ASCII text intact, and writes it back with the
//! 2-space layout the resource files already use.

pub mod audit;
pub mod document;

pub use audit::{ParityReport, audit};
pub use document::{Change, ResourceDocument};
