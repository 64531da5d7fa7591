//! Patch plan format.
//!
//! ```toml
//! [[steps]]
//! kind = "set"
//! key = "createAssignment.titleLabel"
//! values = { en = "Assignment Title", he = "כותרת המטלה" }
//!
//! [[steps]]
//! kind = "insert-line"
//! files = ["src/pages/Auth.tsx"]
//! anchor = { literal = "import { useTranslation } from 'react-i18next';" }
//! line = "import { useLanguage } from '@/contexts/LanguageContext';"
//! guard = "useLanguage"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use localekit_shared::{KeyPath, Language, LocaleLayout, LocalekitError, Result};
use localekit_source::{InsertLine, PropAttribute, SourceEdit, TagAttribute};

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// An ordered list of steps, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Plan {
    /// Optional label shown in logs.
    #[serde(default)]
    pub name: Option<String>,

    /// Project root, relative to the plan file.
    #[serde(default)]
    pub root: Option<PathBuf>,

    #[serde(default)]
    pub steps: Vec<Step>,

    /// Directory of the plan file, set by [`Plan::load`].
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Plan {
    /// Build a plan in code.
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    /// Read, parse and validate a plan file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LocalekitError::io(path, e))?;
        let mut plan = Self::parse(&content).map_err(|e| match e {
            LocalekitError::Parse { message } => {
                LocalekitError::parse(format!("{}: {message}", path.display()))
            }
            other => other,
        })?;
        plan.base_dir = path.parent().map(Path::to_path_buf);
        tracing::debug!(path = %path.display(), steps = plan.steps.len(), "loaded plan");
        Ok(plan)
    }

    /// Parse and validate plan text.
    pub fn parse(content: &str) -> Result<Self> {
        let plan: Plan =
            toml::from_str(content).map_err(|e| LocalekitError::parse(e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Check every step is complete before anything is touched.
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(LocalekitError::validation("plan has no steps"));
        }
        for (idx, step) in self.steps.iter().enumerate() {
            step.validate().map_err(|e| match e {
                LocalekitError::Validation { message } => {
                    LocalekitError::validation(format!("step {}: {message}", idx + 1))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Project root: `root` resolved against the plan's directory, falling
    /// back to the plan's directory, then the current directory.
    pub fn resolve_root(&self) -> PathBuf {
        let base = self.base_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        match &self.root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => base.join(root),
            None => base,
        }
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// One unit of work, tagged by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Step {
    /// Write a value at a key, overwriting.
    Set(ValueStep),
    /// Write a value only where the key is absent.
    SetIfAbsent(ValueStep),
    /// Replace entries of the object at a key.
    Update(ValueStep),
    /// Deep-merge an object into the key.
    Merge(ValueStep),
    /// Delete a key.
    Remove(KeyStep),
    /// Move a subtree to a new key.
    Relocate(RelocateStep),
    /// Insert a line next to an anchor.
    InsertLine(FilesStep<InsertLine>),
    /// Add an attribute to component tags.
    TagAttribute(FilesStep<TagAttribute>),
    /// Add an attribute before a prop of marked elements.
    PropAttribute(FilesStep<PropAttribute>),
    /// The configured right-to-left preset.
    Rtl(RtlStep),
}

/// Resource step carrying a value per language or one shared value.
#[derive(Debug, Clone, Deserialize)]
pub struct ValueStep {
    pub key: KeyPath,
    /// Same value for every targeted language.
    #[serde(default)]
    pub value: Option<Value>,
    /// Per-language values; a language without one is left alone.
    #[serde(default)]
    pub values: Map<String, Value>,
    /// Narrow the targeted languages.
    #[serde(default)]
    pub languages: Vec<Language>,
}

/// Resource step naming only a key.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyStep {
    pub key: KeyPath,
    #[serde(default)]
    pub languages: Vec<Language>,
}

/// Move `from` to `to`.
#[derive(Debug, Clone, Deserialize)]
pub struct RelocateStep {
    pub from: KeyPath,
    pub to: KeyPath,
    #[serde(default)]
    pub languages: Vec<Language>,
}

/// Source step: an edit applied to each listed file.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesStep<E> {
    /// Paths relative to the project root.
    pub files: Vec<PathBuf>,
    #[serde(flatten)]
    pub edit: E,
}

/// The right-to-left preset applied to each listed file.
#[derive(Debug, Clone, Deserialize)]
pub struct RtlStep {
    pub files: Vec<PathBuf>,
}

impl ValueStep {
    /// Value for `lang`: the per-language entry, else the shared value.
    pub fn value_for(&self, lang: &Language) -> Option<&Value> {
        self.values.get(lang.code()).or(self.value.as_ref())
    }

    fn validate(&self, requires_object: bool) -> Result<()> {
        if self.value.is_none() && self.values.is_empty() {
            return Err(LocalekitError::validation(format!(
                "'{}' needs `value` or `values`",
                self.key
            )));
        }
        for code in self.values.keys() {
            Language::new(code.as_str())?;
        }
        if requires_object {
            let all_objects = self.value.iter().chain(self.values.values()).all(Value::is_object);
            if !all_objects {
                return Err(LocalekitError::validation(format!(
                    "update of '{}' needs table values",
                    self.key
                )));
            }
        }
        Ok(())
    }

    /// Languages this step touches, given the configured layout.
    fn targets(&self, layout: &LocaleLayout) -> Vec<Language> {
        if !self.languages.is_empty() {
            return self.languages.clone();
        }
        if self.value.is_none() {
            return self
                .values
                .keys()
                .filter_map(|code| Language::new(code.as_str()).ok())
                .collect();
        }
        layout.languages.clone()
    }
}

impl<E> FilesStep<E> {
    fn validate(&self) -> Result<()> {
        if self.files.is_empty() {
            return Err(LocalekitError::validation("source step lists no files"));
        }
        Ok(())
    }
}

impl Step {
    fn validate(&self) -> Result<()> {
        match self {
            Self::Set(step) | Self::SetIfAbsent(step) | Self::Merge(step) => step.validate(false),
            Self::Update(step) => step.validate(true),
            Self::Remove(_) => Ok(()),
            Self::Relocate(step) => {
                if step.from.starts_with(&step.to) || step.to.starts_with(&step.from) {
                    return Err(LocalekitError::validation(format!(
                        "relocate '{}' -> '{}': paths overlap",
                        step.from, step.to
                    )));
                }
                Ok(())
            }
            Self::InsertLine(step) => step.validate(),
            Self::TagAttribute(step) => {
                step.validate()?;
                if step.edit.tags.is_empty() {
                    return Err(LocalekitError::validation("tag-attribute lists no tags"));
                }
                Ok(())
            }
            Self::PropAttribute(step) => {
                step.validate()?;
                if step.edit.markers.is_empty() {
                    return Err(LocalekitError::validation("prop-attribute lists no markers"));
                }
                Ok(())
            }
            Self::Rtl(step) => {
                if step.files.is_empty() {
                    return Err(LocalekitError::validation("rtl step lists no files"));
                }
                Ok(())
            }
        }
    }

    /// Whether the step edits resource files (as opposed to source files).
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            Self::Set(_)
                | Self::SetIfAbsent(_)
                | Self::Update(_)
                | Self::Merge(_)
                | Self::Remove(_)
                | Self::Relocate(_)
        )
    }

    /// Languages a resource step touches. Empty for source steps.
    pub fn languages(&self, layout: &LocaleLayout) -> Vec<Language> {
        let narrowed = match self {
            Self::Set(step) | Self::SetIfAbsent(step) | Self::Update(step) | Self::Merge(step) => {
                return step.targets(layout);
            }
            Self::Remove(step) => &step.languages,
            Self::Relocate(step) => &step.languages,
            _ => return Vec::new(),
        };
        if narrowed.is_empty() {
            layout.languages.clone()
        } else {
            narrowed.clone()
        }
    }

    /// Source files a source step touches. Empty for resource steps.
    pub fn files(&self) -> &[PathBuf] {
        match self {
            Self::InsertLine(step) => &step.files,
            Self::TagAttribute(step) => &step.files,
            Self::PropAttribute(step) => &step.files,
            Self::Rtl(step) => &step.files,
            _ => &[],
        }
    }

    /// The source edit of a non-preset source step.
    pub fn source_edit(&self) -> Option<SourceEdit> {
        match self {
            Self::InsertLine(step) => Some(SourceEdit::InsertLine(step.edit.clone())),
            Self::TagAttribute(step) => Some(SourceEdit::TagAttribute(step.edit.clone())),
            Self::PropAttribute(step) => Some(SourceEdit::PropAttribute(step.edit.clone())),
            _ => None,
        }
    }

    /// Short label for logs and progress output.
    pub fn label(&self) -> String {
        match self {
            Self::Set(step) => format!("set {}", step.key),
            Self::SetIfAbsent(step) => format!("set-if-absent {}", step.key),
            Self::Update(step) => format!("update {}", step.key),
            Self::Merge(step) => format!("merge {}", step.key),
            Self::Remove(step) => format!("remove {}", step.key),
            Self::Relocate(step) => format!("relocate {} -> {}", step.from, step.to),
            Self::Rtl(_) => "rtl preset".to_string(),
            other => other
                .source_edit()
                .map(|edit| edit.describe())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localekit_shared::AppConfig;

    const PLAN: &str = r#"
name = "assignment labels"
root = "../app"

[[steps]]
kind = "set"
key = "createAssignment.titleLabel"
values = { en = "Assignment Title", he = "כותרת המטלה" }

[[steps]]
kind = "update"
key = "assignments"
languages = ["en"]
value = { status = { published = "Published", draft = "Draft" } }

[[steps]]
kind = "relocate"
from = "landing.assignments"
to = "assignments"

[[steps]]
kind = "insert-line"
files = ["src/pages/Auth.tsx"]
anchor = { literal = "import { useTranslation } from 'react-i18next';" }
line = "import { useLanguage } from '@/contexts/LanguageContext';"
guard = "useLanguage"

[[steps]]
kind = "prop-attribute"
files = ["src/pages/Auth.tsx"]
markers = [{ literal = 'id="signin-email"' }]
prop = { regex = 'className=.*h-12' }
attribute = "dir={isRTL ? 'rtl' : 'ltr'}"
window = 10

[[steps]]
kind = "rtl"
files = ["src/components/CreateAssignmentDialog.tsx"]
"#;

    fn layout() -> LocaleLayout {
        LocaleLayout::try_from(&AppConfig::default()).unwrap()
    }

    #[test]
    fn parses_every_step_kind() {
        let plan = Plan::parse(PLAN).expect("parse plan");
        assert_eq!(plan.steps.len(), 6);
        assert_eq!(plan.name.as_deref(), Some("assignment labels"));
        assert!(plan.steps[0].is_resource());
        assert!(!plan.steps[3].is_resource());
        assert_eq!(plan.steps[3].files(), [PathBuf::from("src/pages/Auth.tsx")]);
        match &plan.steps[4] {
            Step::PropAttribute(step) => assert_eq!(step.edit.window, 10),
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn per_language_values_pick_targets() {
        let plan = Plan::parse(PLAN).unwrap();
        let Step::Set(step) = &plan.steps[0] else {
            panic!("expected set step");
        };
        let he = Language::new("he").unwrap();
        assert_eq!(step.value_for(&he), Some(&Value::from("כותרת המטלה")));

        let langs: Vec<String> = plan.steps[0]
            .languages(&layout())
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(langs, vec!["en", "he"]);

        let langs = plan.steps[1].languages(&layout());
        assert_eq!(langs.len(), 1);
        // Relocate without languages falls back to the layout.
        assert_eq!(plan.steps[2].languages(&layout()).len(), 2);
    }

    #[test]
    fn labels_describe_steps() {
        let plan = Plan::parse(PLAN).unwrap();
        assert_eq!(plan.steps[0].label(), "set createAssignment.titleLabel");
        assert_eq!(plan.steps[2].label(), "relocate landing.assignments -> assignments");
        assert!(plan.steps[3].label().starts_with("insert "));
    }

    #[test]
    fn root_resolves_against_plan_dir() {
        let mut plan = Plan::parse(PLAN).unwrap();
        plan.base_dir = Some(PathBuf::from("/work/plans"));
        assert_eq!(plan.resolve_root(), PathBuf::from("/work/plans/../app"));
        plan.root = None;
        assert_eq!(plan.resolve_root(), PathBuf::from("/work/plans"));
    }

    #[test]
    fn bundled_plan_is_valid() {
        let plan = Plan::parse(include_str!("../../../../plans/perleap.toml")).expect("bundled plan");
        assert_eq!(plan.steps.len(), 10);
        assert_eq!(plan.steps.iter().filter(|s| s.is_resource()).count(), 6);
    }

    #[test]
    fn load_keeps_error_kinds() {
        let dir = tempfile::tempdir().unwrap();

        let invalid = dir.path().join("invalid.toml");
        std::fs::write(&invalid, "[[steps]]\nkind = \"set\"\nkey = \"a.b\"\n").unwrap();
        match Plan::load(&invalid).unwrap_err() {
            LocalekitError::Validation { message } => assert!(message.starts_with("step 1:"), "{message}"),
            other => panic!("expected validation error, got {other}"),
        }

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[[steps]\n").unwrap();
        match Plan::load(&broken).unwrap_err() {
            LocalekitError::Parse { message } => assert!(message.contains("broken.toml"), "{message}"),
            other => panic!("expected parse error, got {other}"),
        }
    }

    #[test]
    fn rejects_incomplete_steps() {
        let missing_value = r#"
[[steps]]
kind = "set"
key = "common.completed"
"#;
        assert!(Plan::parse(missing_value).is_err());

        let scalar_update = r#"
[[steps]]
kind = "update"
key = "common"
value = "oops"
"#;
        assert!(Plan::parse(scalar_update).is_err());

        let bad_key = r#"
[[steps]]
kind = "remove"
key = "a..b"
"#;
        assert!(Plan::parse(bad_key).is_err());

        let bad_regex = r#"
[[steps]]
kind = "insert-line"
files = ["a.tsx"]
anchor = { regex = "(" }
line = "x"
"#;
        assert!(Plan::parse(bad_regex).is_err());

        assert!(Plan::parse("").is_err());
    }
}
