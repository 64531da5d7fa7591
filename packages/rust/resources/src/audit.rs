//! Key parity between two resource files.
//!
//! Nothing on the write path enforces that every language carries the same
//! keys, so this only reports the differences.

use serde_json::{Map, Value};

use localekit_shared::KeyPath;

use crate::document::{ResourceDocument, kind_name};

/// Differences between a base resource file and another language's file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParityReport {
    /// Present in the base, absent in the other file. Only the topmost
    /// missing key of a missing subtree is listed.
    pub missing: Vec<KeyPath>,
    /// Present in the other file, absent in the base.
    pub extra: Vec<KeyPath>,
    /// Present in both with a different shape (object vs. string, ...).
    pub mismatched: Vec<(KeyPath, String)>,
    /// String leaves whose text is identical in both files, usually
    /// a sign the string was never translated.
    pub identical: Vec<KeyPath>,
}

impl ParityReport {
    /// No missing, extra or mismatched keys. Identical strings are allowed.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.mismatched.is_empty()
    }
}

/// Compare `other` against `base`.
pub fn audit(base: &ResourceDocument, other: &ResourceDocument) -> ParityReport {
    let mut report = ParityReport::default();
    compare(base.root(), other.root(), &[], &mut report);
    collect_missing(other.root(), base.root(), &[], &mut report.extra);
    tracing::debug!(
        missing = report.missing.len(),
        extra = report.extra.len(),
        mismatched = report.mismatched.len(),
        "parity audit finished"
    );
    report
}

fn compare(
    base: &Map<String, Value>,
    other: &Map<String, Value>,
    prefix: &[String],
    report: &mut ParityReport,
) {
    for (key, base_value) in base {
        let path = extend(prefix, key);
        let Some(other_value) = other.get(key) else {
            push_path(&mut report.missing, &path);
            continue;
        };
        match (base_value, other_value) {
            (Value::Object(b), Value::Object(o)) => compare(b, o, &path, report),
            (Value::String(b), Value::String(o)) => {
                if b == o && !b.trim().is_empty() {
                    push_path(&mut report.identical, &path);
                }
            }
            (b, o) if std::mem::discriminant(b) != std::mem::discriminant(o) => {
                if let Ok(key_path) = KeyPath::from_segments(path) {
                    report.mismatched.push((
                        key_path,
                        format!("{} vs {}", kind_name(b), kind_name(o)),
                    ));
                }
            }
            _ => {}
        }
    }
}

fn collect_missing(
    from: &Map<String, Value>,
    against: &Map<String, Value>,
    prefix: &[String],
    out: &mut Vec<KeyPath>,
) {
    for (key, value) in from {
        let path = extend(prefix, key);
        match (value, against.get(key)) {
            (_, None) => push_path(out, &path),
            (Value::Object(f), Some(Value::Object(a))) => collect_missing(f, a, &path, out),
            _ => {}
        }
    }
}

fn extend(prefix: &[String], key: &str) -> Vec<String> {
    let mut path = prefix.to_vec();
    path.push(key.to_string());
    path
}

fn push_path(out: &mut Vec<KeyPath>, segments: &[String]) {
    if let Ok(path) = KeyPath::from_segments(segments.iter().cloned()) {
        out.push(path);
    }
}
