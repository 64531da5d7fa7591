//! In-memory model of one resource file.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info};

use localekit_shared::{KeyPath, LocalekitError, Result};

/// Effect of a single edit on the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// The key did not exist before.
    Added,
    /// The key existed with a different value.
    Updated,
    /// The key already held exactly this value.
    Unchanged,
    /// The key was deleted.
    Removed,
    /// Nothing was done, with the reason.
    Skipped(String),
}

impl Change {
    fn between(before: Option<&Value>, after: Option<&Value>) -> Self {
        match (before, after) {
            (None, Some(_)) => Self::Added,
            (Some(_), None) => Self::Removed,
            (Some(a), Some(b)) if a == b => Self::Unchanged,
            (Some(_), Some(_)) => Self::Updated,
            (None, None) => Self::Unchanged,
        }
    }

    /// Whether the edit modified the document.
    pub fn is_modification(&self) -> bool {
        matches!(self, Self::Added | Self::Updated | Self::Removed)
    }
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Updated => write!(f, "updated"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Removed => write!(f, "removed"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
        }
    }
}

/// A parsed resource file: a JSON object whose leaves are display strings.
#[derive(Debug, Clone)]
pub struct ResourceDocument {
    path: Option<PathBuf>,
    root: Map<String, Value>,
    original: String,
    trailing_newline: bool,
}

impl ResourceDocument {
    /// Read and parse a resource file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LocalekitError::not_found(format!(
                "resource file {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| LocalekitError::io(path, e))?;
        let mut doc = Self::parse(&text).map_err(|e| match e {
            LocalekitError::Parse { message } => {
                LocalekitError::parse(format!("{}: {message}", path.display()))
            }
            other => other,
        })?;
        doc.path = Some(path.to_path_buf());
        debug!(path = %path.display(), keys = doc.root.len(), "loaded resource file");
        Ok(doc)
    }

    /// Parse resource text that is not tied to a file.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| LocalekitError::parse(format!("invalid JSON: {e}")))?;
        let Value::Object(root) = value else {
            return Err(LocalekitError::validation(
                "resource file root must be a JSON object",
            ));
        };
        Ok(Self {
            path: None,
            root,
            original: text.to_string(),
            trailing_newline: text.ends_with('\n'),
        })
    }

    /// An empty document, written without a trailing newline.
    pub fn empty() -> Self {
        Self {
            path: None,
            root: Map::new(),
            original: String::new(),
            trailing_newline: false,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Value stored at `path`, if every segment resolves.
    pub fn get(&self, path: &KeyPath) -> Option<&Value> {
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.root.get(first)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Every leaf key path in document order. Empty objects count as leaves.
    pub fn leaf_paths(&self) -> Vec<KeyPath> {
        let mut out = Vec::new();
        collect_leaves(&self.root, &[], &mut out);
        out
    }

    // -----------------------------------------------------------------------
    // Edits
    // -----------------------------------------------------------------------

    /// Make sure an object exists at `path`, creating empty objects along the way.
    pub fn ensure_object(&mut self, path: &KeyPath) -> Result<&mut Map<String, Value>> {
        ensure_objects(&mut self.root, path.segments(), path)
    }

    /// Write `value` at `path`, overwriting whatever was there.
    pub fn set(&mut self, path: &KeyPath, value: Value) -> Result<Change> {
        let before = self.get(path).cloned();
        let parent = self.parent_object(path)?;
        parent.insert(path.leaf().to_string(), value);
        let change = Change::between(before.as_ref(), self.get(path));
        debug!(key = %path, %change, "set");
        Ok(change)
    }

    /// Write `value` at `path` only when nothing is there yet.
    pub fn set_if_absent(&mut self, path: &KeyPath, value: Value) -> Result<Change> {
        if self.get(path).is_some() {
            debug!(key = %path, "set-if-absent: key present");
            return Ok(Change::Unchanged);
        }
        self.set(path, value)
    }

    /// Shallow update: each entry of `entries` replaces the same key of the
    /// object at `path`. Nested objects are replaced, not merged.
    pub fn update(&mut self, path: &KeyPath, entries: Map<String, Value>) -> Result<Change> {
        let before = self.get(path).cloned();
        let target = self.ensure_object(path)?;
        for (key, value) in entries {
            target.insert(key, value);
        }
        let change = Change::between(before.as_ref(), self.get(path));
        debug!(key = %path, %change, "update");
        Ok(change)
    }

    /// Deep merge: objects merge recursively, every other value overwrites.
    pub fn merge(&mut self, path: &KeyPath, patch: Value) -> Result<Change> {
        let before = self.get(path).cloned();
        let parent = self.parent_object(path)?;
        match parent.get_mut(path.leaf()) {
            Some(existing) => deep_merge(existing, patch),
            None => {
                parent.insert(path.leaf().to_string(), patch);
            }
        }
        let change = Change::between(before.as_ref(), self.get(path));
        debug!(key = %path, %change, "merge");
        Ok(change)
    }

    /// Delete the value at `path`, returning it.
    pub fn remove(&mut self, path: &KeyPath) -> Option<Value> {
        let parents = &path.segments()[..path.segments().len() - 1];
        let parent = object_at_mut(&mut self.root, parents)?;
        let removed = parent.shift_remove(path.leaf());
        if removed.is_some() {
            debug!(key = %path, "removed");
        }
        removed
    }

    /// Move the subtree at `from` to `to`. A missing source is skipped; an
    /// existing destination is overwritten. The paths must not nest.
    pub fn relocate(&mut self, from: &KeyPath, to: &KeyPath) -> Result<Change> {
        if from.starts_with(to) || to.starts_with(from) {
            return Err(LocalekitError::validation(format!(
                "cannot move '{from}' to '{to}': paths overlap"
            )));
        }
        let Some(value) = self.get(from).cloned() else {
            debug!(%from, %to, "relocate: source missing");
            return Ok(Change::Skipped(format!("'{from}' not present")));
        };
        // Write the destination first so a conflict leaves the source intact.
        self.set(to, value)?;
        self.remove(from);
        debug!(%from, %to, "relocated");
        Ok(Change::Updated)
    }

    // -----------------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------------

    /// Pretty JSON with 2-space indentation and literal non-ASCII text.
    pub fn render(&self) -> Result<String> {
        let mut text = serde_json::to_string_pretty(&self.root)
            .map_err(|e| LocalekitError::parse(format!("failed to serialize resource: {e}")))?;
        if self.trailing_newline {
            text.push('\n');
        }
        Ok(text)
    }

    /// Whether the rendered output differs from the text that was loaded.
    pub fn is_dirty(&self) -> Result<bool> {
        Ok(self.render()? != self.original)
    }

    /// Overwrite the file this document was loaded from.
    pub fn save(&mut self) -> Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| LocalekitError::validation("document has no file path"))?;
        self.save_to(&path)
    }

    /// Write the document to `path` and make it the document's file.
    pub fn save_to(&mut self, path: &Path) -> Result<()> {
        let text = self.render()?;
        std::fs::write(path, &text).map_err(|e| LocalekitError::io(path, e))?;
        info!(path = %path.display(), bytes = text.len(), "wrote resource file");
        self.original = text;
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    fn parent_object(&mut self, path: &KeyPath) -> Result<&mut Map<String, Value>> {
        let parents = &path.segments()[..path.segments().len() - 1];
        ensure_objects(&mut self.root, parents, path)
    }
}

fn ensure_objects<'a>(
    root: &'a mut Map<String, Value>,
    segments: &[String],
    full: &KeyPath,
) -> Result<&'a mut Map<String, Value>> {
    let mut current = root;
    for (depth, segment) in segments.iter().enumerate() {
        let entry = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match entry {
            Value::Object(map) => map,
            other => {
                let at = full.segments()[..=depth].join(".");
                return Err(LocalekitError::conflict(
                    at,
                    format!("expected an object but found {}", kind_name(other)),
                ));
            }
        };
    }
    Ok(current)
}

fn object_at_mut<'a>(
    root: &'a mut Map<String, Value>,
    segments: &[String],
) -> Option<&'a mut Map<String, Value>> {
    let mut current = root;
    for segment in segments {
        current = current.get_mut(segment)?.as_object_mut()?;
    }
    Some(current)
}

fn deep_merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn collect_leaves(map: &Map<String, Value>, prefix: &[String], out: &mut Vec<KeyPath>) {
    for (key, value) in map {
        let mut segments = prefix.to_vec();
        segments.push(key.clone());
        match value {
            Value::Object(child) if !child.is_empty() => collect_leaves(child, &segments, out),
            _ => {
                if let Ok(path) = KeyPath::from_segments(segments) {
                    out.push(path);
                }
            }
        }
    }
}

pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
