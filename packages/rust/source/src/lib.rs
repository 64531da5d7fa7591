//! Source text patching for localekit.
//!
//! Source files are treated as plain lines. Edits locate an anchor line by a
//! literal substring or a regular expression and splice text around it,
//! skipping work that an earlier run already did.

pub mod anchor;
pub mod backup;
pub mod edits;
pub mod file;
pub mod rtl;

pub use anchor::Anchor;
pub use backup::{Backup, backup_path, create_backup};
pub use edits::{
    Attribute, EditOutcome, InsertLine, Position, PropAttribute, SourceEdit, TagAttribute,
};
pub use file::SourceFile;
pub use rtl::RtlPreset;
