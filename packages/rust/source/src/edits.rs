//! Text edits applied to a [`SourceFile`].
//!
//! Every edit checks whether its text is already present before inserting,
//! so applying the same edit twice leaves the file unchanged.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use localekit_shared::{LocalekitError, Result};

use crate::anchor::Anchor;
use crate::file::SourceFile;

/// Lines searched after a marker when looking for the prop anchor.
const DEFAULT_WINDOW: usize = 15;

/// Result of applying one edit to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Inserted this many times.
    Applied(usize),
    /// Nothing to do, with the reason.
    Skipped(String),
    /// The anchor did not match any line.
    AnchorNotFound,
}

impl EditOutcome {
    pub fn applied(&self) -> usize {
        match self {
            Self::Applied(n) => *n,
            _ => 0,
        }
    }
}

impl std::fmt::Display for EditOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Applied(n) => write!(f, "applied {n}x"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::AnchorNotFound => write!(f, "anchor not found"),
        }
    }
}

// ---------------------------------------------------------------------------
// Insert line
// ---------------------------------------------------------------------------

/// Where an inserted line goes relative to its anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    After,
    Before,
}

/// Insert a fixed line next to an anchor line.
#[derive(Debug, Clone, Deserialize)]
pub struct InsertLine {
    pub anchor: Anchor,
    /// Line text, indentation included.
    pub line: String,
    #[serde(default)]
    pub position: Position,
    /// Skip when the file already contains this. Defaults to the trimmed line.
    #[serde(default)]
    pub guard: Option<String>,
    /// Insert next to every matching line instead of the first only.
    #[serde(default)]
    pub all: bool,
}

impl InsertLine {
    pub fn new(anchor: Anchor, line: impl Into<String>) -> Self {
        Self {
            anchor,
            line: line.into(),
            position: Position::After,
            guard: None,
            all: false,
        }
    }

    pub fn with_guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    /// Insert next to every matching line.
    pub fn at_every_match(mut self) -> Self {
        self.all = true;
        self
    }

    fn guard(&self) -> &str {
        match &self.guard {
            Some(guard) if !guard.is_empty() => guard.as_str(),
            _ => self.line.trim(),
        }
    }

    pub fn apply(&self, file: &mut SourceFile) -> EditOutcome {
        let guard = self.guard();
        if file.contains(guard) {
            debug!(guard, "line already present");
            return EditOutcome::Skipped(format!("{guard:?} already present"));
        }

        let mut count = 0;
        let mut from = 0;
        while let Some(idx) = self.anchor.find_line(&file.lines, from) {
            let at = match self.position {
                Position::After => idx + 1,
                Position::Before => idx,
            };
            file.lines.insert(at, self.line.clone());
            count += 1;
            if !self.all {
                break;
            }
            // Both the anchor and the new line sit at or before idx + 1.
            from = idx + 2;
        }

        if count == 0 {
            return EditOutcome::AnchorNotFound;
        }
        EditOutcome::Applied(count)
    }
}

// ---------------------------------------------------------------------------
// Attribute
// ---------------------------------------------------------------------------

/// A JSX attribute to add, e.g. `dir={isRTL ? 'rtl' : 'ltr'}`.
///
/// Holds a compiled matcher for `name=` so a tag that already sets the
/// attribute, with any value, is left alone.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct Attribute {
    text: String,
    present: Regex,
}

impl Attribute {
    pub fn new(text: impl Into<String>) -> Result<Self> {
        static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^\s*([A-Za-z_][\w:.-]*)\s*=").expect("valid regex")
        });

        let text = text.into();
        let name = NAME_RE
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| {
                LocalekitError::validation(format!("attribute '{text}' has no name"))
            })?;
        let present = Regex::new(&format!(r"(^|[\s{{<]){}\s*=", regex::escape(name)))
            .map_err(|e| LocalekitError::parse(e.to_string()))?;
        Ok(Self {
            text: text.trim().to_string(),
            present,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether `text` already sets this attribute.
    pub fn is_present(&self, text: &str) -> bool {
        self.present.is_match(text)
    }
}

impl TryFrom<String> for Attribute {
    type Error = LocalekitError;

    fn try_from(text: String) -> Result<Self> {
        Self::new(text)
    }
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

// ---------------------------------------------------------------------------
// Tag attribute
// ---------------------------------------------------------------------------

/// Add an attribute to every opening tag of the named components.
#[derive(Debug, Clone, Deserialize)]
pub struct TagAttribute {
    /// Component names, e.g. `Input`, `Textarea`.
    pub tags: Vec<String>,
    pub attribute: Attribute,
}

impl TagAttribute {
    pub fn new(tags: Vec<String>, attribute: impl Into<String>) -> Result<Self> {
        Ok(Self {
            tags,
            attribute: Attribute::new(attribute)?,
        })
    }

    pub fn apply(&self, file: &mut SourceFile) -> EditOutcome {
        let mut found = 0;
        let mut count = 0;
        let mut i = 0;

        while i < file.lines.len() {
            let Some(tag_len) = self.opening_tag(&file.lines[i]) else {
                i += 1;
                continue;
            };
            found += 1;

            let Some((close, end)) = tag_end(&file.lines, i, tag_len) else {
                warn!(line = i + 1, "tag never closes, leaving it alone");
                break;
            };

            let already = file.lines[i..close]
                .iter()
                .any(|line| self.attribute.is_present(line))
                || self.attribute.is_present(&file.lines[close][..end]);
            if already {
                i = close + 1;
                continue;
            }

            if close == i {
                let updated = insert_at(&file.lines[i], end, self.attribute.as_str());
                file.lines[i] = updated;
                i += 1;
            } else {
                let closing = &file.lines[close];
                let indent = leading_whitespace(closing);
                let attr_indent = if end == indent.len() {
                    format!("{indent}  ")
                } else {
                    indent.to_string()
                };
                file.lines.insert(close, format!("{attr_indent}{}", self.attribute));
                i = close + 2;
            }
            count += 1;
        }

        match (found, count) {
            (0, _) => EditOutcome::AnchorNotFound,
            (_, 0) => EditOutcome::Skipped("attribute already present".into()),
            (_, n) => EditOutcome::Applied(n),
        }
    }

    /// Byte length of `<Tag` when `line` opens one of our tags.
    fn opening_tag(&self, line: &str) -> Option<usize> {
        let trimmed = line.trim_start();
        let offset = line.len() - trimmed.len();
        self.tags.iter().find_map(|tag| {
            let rest = trimmed.strip_prefix('<')?.strip_prefix(tag.as_str())?;
            let boundary = rest
                .chars()
                .next()
                .is_none_or(|c| !(c.is_alphanumeric() || c == '_' || c == '.'));
            boundary.then_some(offset + 1 + tag.len())
        })
    }
}

/// Where the opening tag starting at `lines[start]` ends: the line index and
/// the byte offset of its `>` or `/>`.
///
/// Only a `>` outside braces and quotes counts, so arrow functions and
/// comparisons inside `{...}` are skipped, as is the closing tag of any
/// children on the same line.
fn tag_end(lines: &[String], start: usize, tag_len: usize) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (idx, line) in lines.iter().enumerate().skip(start) {
        let from = if idx == start { tag_len } else { 0 };
        let mut prev: Option<char> = None;
        for (pos, c) in line[from..].char_indices() {
            let at = from + pos;
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None => match c {
                    '"' | '\'' | '`' => quote = Some(c),
                    '{' => depth += 1,
                    '}' => depth = depth.saturating_sub(1),
                    '>' if depth == 0 && prev != Some('=') => {
                        let end = if prev == Some('/') { at - 1 } else { at };
                        return Some((idx, end));
                    }
                    _ => {}
                },
            }
            prev = Some(c);
        }
    }
    None
}

/// Splice ` attribute` into `line` before the tag end at `end`.
fn insert_at(line: &str, end: usize, attribute: &str) -> String {
    let (head, tail) = line.split_at(end);
    if tail.starts_with("/>") {
        format!("{} {attribute} {tail}", head.trim_end())
    } else {
        format!("{} {attribute}{tail}", head.trim_end())
    }
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

// ---------------------------------------------------------------------------
// Prop-anchored attribute
// ---------------------------------------------------------------------------

/// Insert an attribute line before a given prop of specific elements.
///
/// Each element is found by a marker (e.g. `id="signin-email"`); the
/// attribute lands right before the first line within `window` lines that
/// matches `prop` (e.g. `className=`), at that line's indentation.
#[derive(Debug, Clone, Deserialize)]
pub struct PropAttribute {
    pub markers: Vec<Anchor>,
    pub prop: Anchor,
    pub attribute: Attribute,
    #[serde(default = "default_window")]
    pub window: usize,
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

impl PropAttribute {
    pub fn apply(&self, file: &mut SourceFile) -> EditOutcome {
        let mut found = 0;
        let mut count = 0;

        for marker in &self.markers {
            let Some(at) = marker.find_line(&file.lines, 0) else {
                warn!(%marker, "marker not found");
                continue;
            };
            let end = (at + self.window).min(file.lines.len());
            let Some(prop_at) = (at..end).find(|&j| self.prop.matches(&file.lines[j])) else {
                warn!(%marker, prop = %self.prop, "prop not found near marker");
                continue;
            };
            found += 1;

            let tag_start = (at.saturating_sub(self.window)..=at)
                .rev()
                .find(|&k| file.lines[k].trim_start().starts_with('<'))
                .unwrap_or(at);
            if file.lines[tag_start..=prop_at]
                .iter()
                .any(|l| self.attribute.is_present(l))
            {
                debug!(%marker, "attribute already present");
                continue;
            }

            let indent = leading_whitespace(&file.lines[prop_at]).to_string();
            file.lines.insert(prop_at, format!("{indent}{}", self.attribute));
            count += 1;
        }

        match (found, count) {
            (0, _) => EditOutcome::AnchorNotFound,
            (_, 0) => EditOutcome::Skipped("attribute already present".into()),
            (_, n) => EditOutcome::Applied(n),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Any of the supported source edits.
#[derive(Debug, Clone)]
pub enum SourceEdit {
    InsertLine(InsertLine),
    TagAttribute(TagAttribute),
    PropAttribute(PropAttribute),
}

impl SourceEdit {
    /// Apply to `file`, logging what happened.
    pub fn apply(&self, file: &mut SourceFile) -> EditOutcome {
        let outcome = match self {
            Self::InsertLine(edit) => edit.apply(file),
            Self::TagAttribute(edit) => edit.apply(file),
            Self::PropAttribute(edit) => edit.apply(file),
        };
        let path = file
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".into());
        match &outcome {
            EditOutcome::Applied(n) => info!(%path, edit = %self.describe(), count = n, "applied"),
            EditOutcome::Skipped(reason) => {
                debug!(%path, edit = %self.describe(), reason = %reason, "skipped")
            }
            EditOutcome::AnchorNotFound => {
                warn!(%path, edit = %self.describe(), "anchor not found, step skipped")
            }
        }
        outcome
    }

    /// Short human-readable label.
    pub fn describe(&self) -> String {
        match self {
            Self::InsertLine(edit) => format!("insert {:?}", edit.line.trim()),
            Self::TagAttribute(edit) => {
                format!("add {} to <{}>", edit.attribute, edit.tags.join(">, <"))
            }
            Self::PropAttribute(edit) => {
                format!("add {} before {}", edit.attribute, edit.prop)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIR_ATTR: &str = "dir={isRTL ? 'rtl' : 'ltr'}";

    const PAGE: &str = "\
import { useState } from 'react';
import { useTranslation } from 'react-i18next';
import { Input } from '@/components/ui/input';

export default function Page() {
  const { t } = useTranslation();
  return (
    <form>
      <Input
        id=\"name\"
        value={name}
      />
      <Textarea
        id=\"bio\"
        className=\"h-24\">
      </Textarea>
      <InputOTP maxLength={6} />
    </form>
  );
}
";

    fn import_edit() -> InsertLine {
        InsertLine::new(
            Anchor::literal("import { useTranslation } from 'react-i18next';").unwrap(),
            "import { useLanguage } from '@/contexts/LanguageContext';",
        )
        .with_guard("useLanguage")
    }

    fn dir_edit() -> TagAttribute {
        TagAttribute::new(vec!["Input".into(), "Textarea".into()], DIR_ATTR).unwrap()
    }

    #[test]
    fn insert_after_anchor_once() {
        let mut file = SourceFile::parse(PAGE);
        assert_eq!(import_edit().apply(&mut file), EditOutcome::Applied(1));
        assert_eq!(file.lines()[2], "import { useLanguage } from '@/contexts/LanguageContext';");
        assert_eq!(import_edit().apply(&mut file), EditOutcome::Skipped("\"useLanguage\" already present".into()));
        assert_eq!(file.lines().iter().filter(|l| l.contains("useLanguage")).count(), 1);
    }

    #[test]
    fn insert_before_and_all() {
        let mut file = SourceFile::parse("x\nmark\ny\nmark\n");
        let mut edit = InsertLine::new(Anchor::literal("mark").unwrap(), "// before");
        edit.position = Position::Before;
        edit.all = true;
        assert_eq!(edit.apply(&mut file), EditOutcome::Applied(2));
        assert_eq!(file.render(), "x\n// before\nmark\ny\n// before\nmark\n");
    }

    #[test]
    fn insert_reports_missing_anchor() {
        let mut file = SourceFile::parse("const a = 1;\n");
        assert_eq!(import_edit().apply(&mut file), EditOutcome::AnchorNotFound);
        assert!(!file.is_dirty());
    }

    #[test]
    fn insert_keeps_crlf() {
        let text = PAGE.replace('\n', "\r\n");
        let mut file = SourceFile::parse(&text);
        import_edit().apply(&mut file);
        let rendered = file.render();
        assert!(rendered.contains("react-i18next';\r\nimport { useLanguage }"));
        assert!(!rendered.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn tag_attribute_multi_line_and_inline() {
        let mut file = SourceFile::parse(PAGE);
        let outcome = dir_edit().apply(&mut file);
        assert_eq!(outcome, EditOutcome::Applied(2));

        let text = file.render();
        assert!(text.contains("        value={name}\n        dir={isRTL ? 'rtl' : 'ltr'}\n      />"));
        assert!(text.contains("        id=\"bio\"\n        dir={isRTL ? 'rtl' : 'ltr'}\n        className=\"h-24\">"));
        // A different component whose name starts with a target tag is untouched.
        assert!(text.contains("<InputOTP maxLength={6} />"));
    }

    #[test]
    fn tag_attribute_single_line() {
        let mut file = SourceFile::parse("<Input id=\"a\" />\n<Input id=\"b\">\n");
        dir_edit().apply(&mut file);
        assert_eq!(
            file.render(),
            "<Input id=\"a\" dir={isRTL ? 'rtl' : 'ltr'} />\n<Input id=\"b\" dir={isRTL ? 'rtl' : 'ltr'}>\n"
        );
    }

    #[test]
    fn tag_attribute_single_line_with_children() {
        let mut file = SourceFile::parse("      <Textarea value={bio}>{bio}</Textarea>\n");
        assert_eq!(dir_edit().apply(&mut file), EditOutcome::Applied(1));
        assert_eq!(
            file.render(),
            "      <Textarea value={bio} dir={isRTL ? 'rtl' : 'ltr'}>{bio}</Textarea>\n"
        );
        assert_eq!(
            dir_edit().apply(&mut file),
            EditOutcome::Skipped("attribute already present".into())
        );
    }

    #[test]
    fn tag_end_skips_braces_and_quotes() {
        let lines = vec![
            "<Input onChange={(e) => set(e.target.value)} title=\"a > b\" />".to_string(),
        ];
        let (close, end) = tag_end(&lines, 0, "<Input".len()).unwrap();
        assert_eq!(close, 0);
        assert_eq!(&lines[0][end..], "/>");
    }

    #[test]
    fn attribute_needs_a_name() {
        assert!(Attribute::new("={x}").is_err());
        let attr = Attribute::new(DIR_ATTR).unwrap();
        assert!(attr.is_present("<Input dir=\"rtl\" />"));
        assert!(!attr.is_present("<Input data-dir=\"rtl\" />"));
    }

    #[test]
    fn tag_attribute_is_idempotent() {
        let mut file = SourceFile::parse(PAGE);
        dir_edit().apply(&mut file);
        let once = file.render();
        let again = dir_edit().apply(&mut file);
        assert_eq!(again, EditOutcome::Skipped("attribute already present".into()));
        assert_eq!(file.render(), once);
    }

    #[test]
    fn tag_attribute_ignores_arrow_functions() {
        let text = "<Input\n  onChange={(e) =>\n    set(e)}\n/>\n";
        let mut file = SourceFile::parse(text);
        dir_edit().apply(&mut file);
        assert_eq!(
            file.render(),
            "<Input\n  onChange={(e) =>\n    set(e)}\n  dir={isRTL ? 'rtl' : 'ltr'}\n/>\n"
        );
    }

    #[test]
    fn tag_attribute_without_tags_is_not_found() {
        let mut file = SourceFile::parse("<div />\n");
        assert_eq!(dir_edit().apply(&mut file), EditOutcome::AnchorNotFound);
    }

    #[test]
    fn prop_attribute_inserts_before_class_name() {
        let text = "\
              <Input
                id=\"signin-email\"
                type=\"email\"
                className=\"h-12 rounded-2xl\"
              />
";
        let edit = PropAttribute {
            markers: vec![
                Anchor::literal("id=\"signin-email\"").unwrap(),
                Anchor::literal("id=\"signup-email\"").unwrap(),
            ],
            prop: Anchor::literal("className=").unwrap(),
            attribute: Attribute::new(DIR_ATTR).unwrap(),
            window: DEFAULT_WINDOW,
        };
        let mut file = SourceFile::parse(text);
        assert_eq!(edit.apply(&mut file), EditOutcome::Applied(1));
        assert_eq!(file.lines()[3], "                dir={isRTL ? 'rtl' : 'ltr'}");
        assert_eq!(file.lines()[4], "                className=\"h-12 rounded-2xl\"");

        assert_eq!(
            edit.apply(&mut file),
            EditOutcome::Skipped("attribute already present".into())
        );
    }

    #[test]
    fn describe_labels() {
        let edit = SourceEdit::TagAttribute(dir_edit());
        assert_eq!(edit.describe(), "add dir={isRTL ? 'rtl' : 'ltr'} to <Input>, <Textarea>");
    }
}
