//! Sequential plan runner.
//!
//! Steps run strictly in order. Every step re-reads the files it touches, so
//! a later step sees what an earlier one wrote.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde_json::Value;
use tracing::{info, instrument, warn};

use localekit_resources::{Change, ResourceDocument};
use localekit_shared::{Language, LocaleLayout, LocalekitError, Result, RtlConfig};
use localekit_source::{Backup, EditOutcome, RtlPreset, SourceEdit, SourceFile, create_backup};

use crate::plan::{Plan, Step};

// ---------------------------------------------------------------------------
// Options & report
// ---------------------------------------------------------------------------

/// Settings for one run, merged from config, plan and CLI flags.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Project root that relative paths resolve against.
    pub root: PathBuf,
    /// Where resource files live.
    pub layout: LocaleLayout,
    /// Suffix for source backups; `None` disables them.
    pub backup_suffix: Option<String>,
    /// Do everything except writing files.
    pub dry_run: bool,
    /// Parameters of the `rtl` step.
    pub rtl: RtlConfig,
}

/// What happened to one file in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Resource(Change),
    Source(EditOutcome),
    /// The file does not exist; the step moved on.
    Missing,
}

impl Outcome {
    /// Whether the file content changed.
    pub fn is_modification(&self) -> bool {
        match self {
            Self::Resource(change) => change.is_modification(),
            Self::Source(outcome) => outcome.applied() > 0,
            Self::Missing => false,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resource(change) => write!(f, "{change}"),
            Self::Source(outcome) => write!(f, "{outcome}"),
            Self::Missing => write!(f, "file not found"),
        }
    }
}

/// Outcome for one file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    /// Set for resource steps.
    pub language: Option<Language>,
    /// Edit label for steps that apply several edits per file.
    pub edit: Option<String>,
    pub outcome: Outcome,
}

/// Outcome of one step.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub index: usize,
    pub label: String,
    pub files: Vec<FileOutcome>,
}

/// Result of a whole run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
    /// Files written (or that would be written on a dry run).
    pub written: BTreeSet<PathBuf>,
    /// Backups created.
    pub backups: Vec<PathBuf>,
    /// Missing files and anchors.
    pub warnings: Vec<String>,
    pub dry_run: bool,
    pub elapsed: std::time::Duration,
}

impl RunReport {
    /// Number of per-file outcomes that changed content.
    pub fn modifications(&self) -> usize {
        self.steps
            .iter()
            .flat_map(|step| &step.files)
            .filter(|file| file.outcome.is_modification())
            .count()
    }
}

/// Progress callback for reporting run status.
pub trait ProgressReporter {
    /// Called before a step starts.
    fn step_started(&self, index: usize, total: usize, label: &str);
    /// Called after each file of a step.
    fn file_done(&self, file: &FileOutcome);
    /// Called when the run completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn step_started(&self, _index: usize, _total: usize, _label: &str) {}
    fn file_done(&self, _file: &FileOutcome) {}
    fn done(&self, _report: &RunReport) {}
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Run every step of `plan` in order.
#[instrument(skip_all, fields(plan = plan.name.as_deref().unwrap_or("unnamed"), root = %options.root.display()))]
pub fn run_plan(
    plan: &Plan,
    options: &RunOptions,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    plan.validate()?;
    let start = Instant::now();
    let mut runner = Runner {
        options,
        progress,
        backups: HashMap::new(),
        resources: HashMap::new(),
        sources: HashMap::new(),
        report: RunReport {
            dry_run: options.dry_run,
            ..RunReport::default()
        },
    };

    let total = plan.steps.len();
    for (index, step) in plan.steps.iter().enumerate() {
        let label = step.label();
        progress.step_started(index + 1, total, &label);
        info!(step = index + 1, total, %label, "running step");

        let files = if step.is_resource() {
            runner.run_resource_step(step)?
        } else {
            runner.run_source_step(step)?
        };
        runner.report.steps.push(StepReport {
            index: index + 1,
            label,
            files,
        });
    }

    let mut report = runner.report;
    report.elapsed = start.elapsed();
    info!(
        steps = total,
        modified = report.modifications(),
        written = report.written.len(),
        dry_run = report.dry_run,
        "run finished"
    );
    progress.done(&report);
    Ok(report)
}

struct Runner<'a> {
    options: &'a RunOptions,
    progress: &'a dyn ProgressReporter,
    /// Backups taken this run, keyed by source path.
    backups: HashMap<PathBuf, Backup>,
    /// Files loaded this run. Later steps edit these copies rather than
    /// re-reading disk, which a dry run never updates.
    resources: HashMap<PathBuf, ResourceDocument>,
    sources: HashMap<PathBuf, SourceFile>,
    report: RunReport,
}

impl Runner<'_> {
    fn run_resource_step(&mut self, step: &Step) -> Result<Vec<FileOutcome>> {
        let mut files = Vec::new();
        for lang in step.languages(&self.options.layout) {
            let path = self.options.layout.resource_path(&self.options.root, &lang);
            let loaded = match self.resources.remove(&path) {
                Some(doc) => Ok(doc),
                None => ResourceDocument::load(&path),
            };
            let outcome = match loaded {
                Ok(mut doc) => {
                    let change = apply_resource(&mut doc, step, &lang)?;
                    if doc.is_dirty()? {
                        if !self.options.dry_run {
                            doc.save()?;
                        }
                        self.report.written.insert(path.clone());
                    }
                    self.resources.insert(path.clone(), doc);
                    Outcome::Resource(change)
                }
                Err(e) if e.is_not_found() => {
                    self.warn(format!("{lang}: resource file {} not found", path.display()));
                    Outcome::Missing
                }
                Err(e) => return Err(e),
            };
            let file = FileOutcome {
                path,
                language: Some(lang),
                edit: None,
                outcome,
            };
            self.progress.file_done(&file);
            files.push(file);
        }
        Ok(files)
    }

    fn run_source_step(&mut self, step: &Step) -> Result<Vec<FileOutcome>> {
        let edits: Vec<SourceEdit> = match step {
            Step::Rtl(_) => RtlPreset::from_config(&self.options.rtl)?.edits(),
            other => other.source_edit().into_iter().collect(),
        };
        let labelled = edits.len() > 1;

        let mut files = Vec::new();
        for relative in step.files() {
            let path = self.options.root.join(relative);
            let loaded = match self.sources.remove(&path) {
                Some(source) => Ok(source),
                None => SourceFile::load(&path),
            };
            let mut source = match loaded {
                Ok(source) => source,
                Err(e) if e.is_not_found() => {
                    self.warn(format!("source file {} not found", path.display()));
                    let file = FileOutcome {
                        path,
                        language: None,
                        edit: None,
                        outcome: Outcome::Missing,
                    };
                    self.progress.file_done(&file);
                    files.push(file);
                    continue;
                }
                Err(e) => return Err(e),
            };

            for edit in &edits {
                let outcome = edit.apply(&mut source);
                if outcome == EditOutcome::AnchorNotFound {
                    // Already logged by the edit itself.
                    self.report
                        .warnings
                        .push(format!("{}: {} (anchor not found)", path.display(), edit.describe()));
                }
                let file = FileOutcome {
                    path: path.clone(),
                    language: None,
                    edit: labelled.then(|| edit.describe()),
                    outcome: Outcome::Source(outcome),
                };
                self.progress.file_done(&file);
                files.push(file);
            }

            // Partial results are written even when some anchors were missing.
            if source.is_dirty() {
                self.write_source(&path, &mut source)?;
            }
            self.sources.insert(path, source);
        }
        Ok(files)
    }

    fn write_source(&mut self, path: &Path, source: &mut SourceFile) -> Result<()> {
        self.report.written.insert(path.to_path_buf());
        if self.options.dry_run {
            return Ok(());
        }

        if let Some(suffix) = &self.options.backup_suffix {
            if !self.backups.contains_key(path) {
                let backup = create_backup(path, suffix)?;
                self.report.backups.push(backup.backup.clone());
                self.backups.insert(path.to_path_buf(), backup);
            }
        }

        if let Err(err) = source.save() {
            if let Some(backup) = self.backups.get(path) {
                backup.restore()?;
            }
            return Err(err);
        }
        Ok(())
    }

    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.report.warnings.push(message);
    }
}

/// Apply one resource step to one language's document.
fn apply_resource(doc: &mut ResourceDocument, step: &Step, lang: &Language) -> Result<Change> {
    match step {
        Step::Set(s) | Step::SetIfAbsent(s) | Step::Update(s) | Step::Merge(s) => {
            let Some(value) = s.value_for(lang).cloned() else {
                return Ok(Change::Skipped(format!("no value for {lang}")));
            };
            match step {
                Step::Set(_) => doc.set(&s.key, value),
                Step::SetIfAbsent(_) => doc.set_if_absent(&s.key, value),
                Step::Merge(_) => doc.merge(&s.key, value),
                _ => match value {
                    Value::Object(entries) => doc.update(&s.key, entries),
                    _ => Err(LocalekitError::validation(format!(
                        "update of '{}' needs an object value",
                        s.key
                    ))),
                },
            }
        }
        Step::Remove(s) => Ok(match doc.remove(&s.key) {
            Some(_) => Change::Removed,
            None => Change::Skipped(format!("'{}' not present", s.key)),
        }),
        Step::Relocate(s) => doc.relocate(&s.from, &s.to),
        _ => Err(LocalekitError::validation("not a resource step")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localekit_shared::AppConfig;
    use std::fs;

    fn options(root: &Path) -> RunOptions {
        let config = AppConfig::default();
        RunOptions {
            root: root.to_path_buf(),
            layout: LocaleLayout::try_from(&config).unwrap(),
            backup_suffix: Some(".backup".into()),
            dry_run: false,
            rtl: config.rtl,
        }
    }

    fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn missing_resource_files_are_warnings() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/locales/en/translation.json", "{}");

        let plan = Plan::parse(
            r#"
[[steps]]
kind = "set"
key = "common.completed"
values = { en = "Completed", he = "הושלם" }
"#,
        )
        .unwrap();
        let report = run_plan(&plan, &options(dir.path()), &SilentProgress).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.steps[0].files[0].outcome, Outcome::Resource(Change::Added));
        assert_eq!(report.steps[0].files[1].outcome, Outcome::Missing);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let en = write(dir.path(), "src/locales/en/translation.json", "{}");
        let page = write(dir.path(), "src/App.tsx", "<Input />\n");

        let plan = Plan::parse(
            r#"
[[steps]]
kind = "set"
key = "common.completed"
value = "Completed"
languages = ["en"]

[[steps]]
kind = "tag-attribute"
files = ["src/App.tsx"]
tags = ["Input"]
attribute = "dir={isRTL ? 'rtl' : 'ltr'}"
"#,
        )
        .unwrap();
        let mut opts = options(dir.path());
        opts.dry_run = true;
        let report = run_plan(&plan, &opts, &SilentProgress).unwrap();

        assert_eq!(report.written.len(), 2);
        assert!(report.backups.is_empty());
        assert_eq!(fs::read_to_string(en).unwrap(), "{}");
        assert_eq!(fs::read_to_string(page).unwrap(), "<Input />\n");
    }

    #[test]
    fn backup_taken_once_before_first_write() {
        let dir = tempfile::tempdir().unwrap();
        let original = "import { useTranslation } from 'react-i18next';\n\nconst { t } = useTranslation();\n";
        let page = write(dir.path(), "src/pages/Auth.tsx", original);

        let plan = Plan::parse(
            r#"
[[steps]]
kind = "rtl"
files = ["src/pages/Auth.tsx"]

[[steps]]
kind = "insert-line"
files = ["src/pages/Auth.tsx"]
anchor = { literal = "const { isRTL } = useLanguage();" }
line = "  // direction-aware"
"#,
        )
        .unwrap();
        let report = run_plan(&plan, &options(dir.path()), &SilentProgress).unwrap();

        assert_eq!(report.backups.len(), 1);
        let backup = fs::read_to_string(dir.path().join("src/pages/Auth.tsx.backup")).unwrap();
        assert_eq!(backup, original);

        let text = fs::read_to_string(page).unwrap();
        assert!(text.contains("  const { isRTL } = useLanguage();\n  // direction-aware\n"));
        // No Input/Textarea in the file: that part of the preset warns.
        assert_eq!(report.warnings.len(), 1);
    }

    fn outcomes(report: &RunReport) -> Vec<Vec<Outcome>> {
        report
            .steps
            .iter()
            .map(|step| step.files.iter().map(|f| f.outcome.clone()).collect())
            .collect()
    }

    #[test]
    fn dry_run_sees_earlier_steps() {
        let plan = Plan::parse(
            r#"
[[steps]]
kind = "insert-line"
files = ["src/A.tsx"]
anchor = { literal = "import React from 'react';" }
line = "import { x } from 'y';"

[[steps]]
kind = "insert-line"
files = ["src/A.tsx"]
anchor = { literal = "import { x } from 'y';" }
line = "import { z } from 'w';"

[[steps]]
kind = "set"
key = "common.completed"
value = "Completed"
languages = ["en"]

[[steps]]
kind = "relocate"
from = "common.completed"
to = "status.completed"
languages = ["en"]
"#,
        )
        .unwrap();
        let source = "import React from 'react';\n";

        let dry = tempfile::tempdir().unwrap();
        let dry_page = write(dry.path(), "src/A.tsx", source);
        write(dry.path(), "src/locales/en/translation.json", "{}");
        let mut opts = options(dry.path());
        opts.dry_run = true;
        let dry_report = run_plan(&plan, &opts, &SilentProgress).unwrap();

        let real = tempfile::tempdir().unwrap();
        write(real.path(), "src/A.tsx", source);
        write(real.path(), "src/locales/en/translation.json", "{}");
        let real_report = run_plan(&plan, &options(real.path()), &SilentProgress).unwrap();

        assert_eq!(outcomes(&dry_report), outcomes(&real_report));
        assert_eq!(dry_report.steps[1].files[0].outcome, Outcome::Source(EditOutcome::Applied(1)));
        assert_eq!(dry_report.steps[3].files[0].outcome, Outcome::Resource(Change::Updated));
        assert!(dry_report.warnings.is_empty());
        assert_eq!(dry_report.written.len(), real_report.written.len());
        assert_eq!(fs::read_to_string(dry_page).unwrap(), source);
    }

    /// Swaps the page for a link to `/dev/full` when the given step starts,
    /// so the next write of the page fails.
    #[cfg(target_os = "linux")]
    struct BreakWrites {
        path: PathBuf,
        at_step: usize,
    }

    #[cfg(target_os = "linux")]
    impl ProgressReporter for BreakWrites {
        fn step_started(&self, index: usize, _total: usize, _label: &str) {
            if index == self.at_step {
                fs::remove_file(&self.path).unwrap();
                std::os::unix::fs::symlink("/dev/full", &self.path).unwrap();
            }
        }
        fn file_done(&self, _file: &FileOutcome) {}
        fn done(&self, _report: &RunReport) {}
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_write_restores_backup() {
        if !Path::new("/dev/full").exists() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let original = "import { useTranslation } from 'react-i18next';\n<Input />\n";
        let page = write(dir.path(), "src/App.tsx", original);

        let plan = Plan::parse(
            r#"
[[steps]]
kind = "insert-line"
files = ["src/App.tsx"]
anchor = { literal = "react-i18next" }
line = "import { useLanguage } from '@/contexts/LanguageContext';"

[[steps]]
kind = "tag-attribute"
files = ["src/App.tsx"]
tags = ["Input"]
attribute = "dir={isRTL ? 'rtl' : 'ltr'}"
"#,
        )
        .unwrap();
        let breaker = BreakWrites {
            path: page.clone(),
            at_step: 2,
        };
        let err = run_plan(&plan, &options(dir.path()), &breaker).unwrap_err();
        assert!(matches!(err, LocalekitError::Io { .. }), "{err}");

        let backup = fs::read(dir.path().join("src/App.tsx.backup")).unwrap();
        assert_eq!(backup, original.as_bytes());
        assert!(!fs::symlink_metadata(&page).unwrap().file_type().is_symlink());
        assert_eq!(fs::read(&page).unwrap(), backup);
    }

    #[test]
    fn update_with_scalar_value_fails() {
        let mut doc = ResourceDocument::parse("{}").unwrap();
        let step = Step::Update(crate::plan::ValueStep {
            key: "common".parse().unwrap(),
            value: Some(Value::from("x")),
            values: Default::default(),
            languages: Vec::new(),
        });
        let lang = Language::new("en").unwrap();
        assert!(apply_resource(&mut doc, &step, &lang).is_err());
    }
}
