//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use localekit_core::{
    FileOutcome, Plan, ProgressReporter, RunOptions, RunReport, RtlStep, Step, ValueStep,
    run_plan,
};
use localekit_resources::{Change, ResourceDocument, audit};
use localekit_shared::{
    AppConfig, KeyPath, Language, LocaleLayout, init_config, load_config, load_config_from,
};
use serde_json::Value;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// localekit — patch localization resources and source files.
#[derive(Parser)]
#[command(
    name = "localekit",
    version,
    about = "Patch JSON localization files and JSX/TSX sources from declarative plans.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.localekit/localekit.toml.
    #[arg(long, global = true, env = "LOCALEKIT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run a TOML patch plan.
    Run {
        /// Plan file.
        plan: PathBuf,

        /// Project root (defaults to the plan's `root`, then its directory).
        #[arg(long)]
        root: Option<PathBuf>,

        /// Report what would change without writing.
        #[arg(long)]
        dry_run: bool,

        /// Do not copy source files aside before editing.
        #[arg(long)]
        no_backup: bool,
    },

    /// Set one key in one or more resource files.
    Set {
        /// Dotted key path, e.g. common.completed.
        key: String,

        /// Value to store.
        value: String,

        /// Languages to write (defaults to the base language).
        #[arg(short, long)]
        lang: Vec<String>,

        /// Write this resource file instead of the configured layout.
        #[arg(long, conflicts_with = "lang")]
        file: Option<PathBuf>,

        /// Parse VALUE as JSON instead of a plain string.
        #[arg(long)]
        json: bool,

        /// Project root.
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Print the value stored at a key.
    Get {
        /// Dotted key path.
        key: String,

        /// Language to read (defaults to the base language).
        #[arg(short, long)]
        lang: Option<String>,

        /// Read this resource file instead of the configured layout.
        #[arg(long, conflicts_with = "lang")]
        file: Option<PathBuf>,

        /// Project root.
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Compare every language's keys with the base language.
    Audit {
        /// Reference language (defaults to config).
        #[arg(long)]
        base: Option<String>,

        /// Fail when any language misses keys.
        #[arg(long)]
        strict: bool,

        /// Project root.
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Check that JSON resource files parse and are already normalized.
    Check {
        /// Files to check.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Apply the right-to-left preset to source files.
    Rtl {
        /// Source files, relative to the root.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Project root.
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Report what would change without writing.
        #[arg(long)]
        dry_run: bool,

        /// Do not copy source files aside before editing.
        #[arg(long)]
        no_backup: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "localekit_cli=info,localekit_core=info,localekit_resources=warn,localekit_source=warn",
        1 => "localekit_cli=debug,localekit_core=debug,localekit_resources=info,localekit_source=info",
        _ => "localekit_cli=trace,localekit_core=trace,localekit_resources=trace,localekit_source=trace,localekit_shared=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Run {
            plan,
            root,
            dry_run,
            no_backup,
        } => cmd_run(&config, &plan, root, dry_run, no_backup),
        Command::Set {
            key,
            value,
            lang,
            file,
            json,
            root,
        } => match file {
            Some(file) => cmd_set_file(&file, &key, &value, json),
            None => cmd_set(&config, &key, &value, &lang, json, &root),
        },
        Command::Get {
            key,
            lang,
            file,
            root,
        } => cmd_get(&config, &key, lang.as_deref(), file.as_deref(), &root),
        Command::Audit { base, strict, root } => cmd_audit(&config, base.as_deref(), strict, &root),
        Command::Check { files } => cmd_check(&files),
        Command::Rtl {
            files,
            root,
            dry_run,
            no_backup,
        } => cmd_rtl(&config, files, &root, dry_run, no_backup),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

fn run_options(config: &AppConfig, root: PathBuf, dry_run: bool, no_backup: bool) -> Result<RunOptions> {
    let backup_suffix = (config.backup.enabled && !no_backup).then(|| config.backup.suffix.clone());
    Ok(RunOptions {
        root,
        layout: LocaleLayout::try_from(config)?,
        backup_suffix,
        dry_run,
        rtl: config.rtl.clone(),
    })
}

fn cmd_run(
    config: &AppConfig,
    plan_path: &Path,
    root: Option<PathBuf>,
    dry_run: bool,
    no_backup: bool,
) -> Result<()> {
    let plan = Plan::load(plan_path)?;
    let root = root.unwrap_or_else(|| plan.resolve_root());
    if !root.is_dir() {
        return Err(eyre!("project root '{}' is not a directory", root.display()));
    }

    info!(plan = %plan_path.display(), root = %root.display(), dry_run, "running plan");
    let options = run_options(config, root, dry_run, no_backup)?;
    let reporter = CliProgress::new();
    let report = run_plan(&plan, &options, &reporter)?;
    print_report(&report);
    Ok(())
}

fn cmd_set(
    config: &AppConfig,
    key: &str,
    value: &str,
    langs: &[String],
    json: bool,
    root: &Path,
) -> Result<()> {
    let layout = LocaleLayout::try_from(config)?;
    let key = KeyPath::parse(key)?;
    let value = parse_value(value, json)?;
    let languages = if langs.is_empty() {
        vec![layout.base_language.clone()]
    } else {
        langs
            .iter()
            .map(|code| Language::new(code.as_str()))
            .collect::<localekit_shared::Result<Vec<_>>>()?
    };

    let plan = Plan::new(vec![Step::Set(ValueStep {
        key,
        value: Some(value),
        values: Default::default(),
        languages,
    })]);
    let options = run_options(config, root.to_path_buf(), false, true)?;
    let report = run_plan(&plan, &options, &localekit_core::SilentProgress)?;
    for file in report.steps.iter().flat_map(|s| &s.files) {
        println!("  {}  {}", file.path.display(), file.outcome);
    }
    if !report.warnings.is_empty() {
        return Err(eyre!("{} resource file(s) not found", report.warnings.len()));
    }
    Ok(())
}

fn cmd_set_file(file: &Path, key: &str, value: &str, json: bool) -> Result<()> {
    let key = KeyPath::parse(key)?;
    let change = set_in_file(file, &key, parse_value(value, json)?)?;
    println!("  {}  {change}", file.display());
    Ok(())
}

/// Set `key` in one resource file, writing it only when it changed.
fn set_in_file(file: &Path, key: &KeyPath, value: Value) -> Result<Change> {
    let mut doc = ResourceDocument::load(file)?;
    let change = doc.set(key, value)?;
    if doc.is_dirty()? {
        doc.save()?;
    }
    Ok(change)
}

fn parse_value(value: &str, json: bool) -> Result<Value> {
    if json {
        serde_json::from_str::<Value>(value).map_err(|e| eyre!("VALUE is not valid JSON: {e}"))
    } else {
        Ok(Value::String(value.to_string()))
    }
}

fn cmd_get(
    config: &AppConfig,
    key: &str,
    lang: Option<&str>,
    file: Option<&Path>,
    root: &Path,
) -> Result<()> {
    let key = KeyPath::parse(key)?;
    let path = match file {
        Some(file) => file.to_path_buf(),
        None => {
            let layout = LocaleLayout::try_from(config)?;
            let lang = match lang {
                Some(code) => Language::new(code)?,
                None => layout.base_language.clone(),
            };
            layout.resource_path(root, &lang)
        }
    };
    let doc = ResourceDocument::load(&path)?;
    match doc.get(&key) {
        Some(Value::String(text)) => println!("{text}"),
        Some(other) => println!("{}", serde_json::to_string_pretty(other)?),
        None => return Err(eyre!("key '{key}' not found in {}", path.display())),
    }
    Ok(())
}

fn cmd_audit(config: &AppConfig, base: Option<&str>, strict: bool, root: &Path) -> Result<()> {
    let layout = LocaleLayout::try_from(config)?;
    let base_lang = match base {
        Some(code) => Language::new(code)?,
        None => layout.base_language.clone(),
    };
    let base_doc = ResourceDocument::load(&layout.resource_path(root, &base_lang))?;
    info!(base = %base_lang, keys = base_doc.leaf_paths().len(), "auditing key parity");

    let mut incomplete = 0;
    for lang in layout.languages.iter().filter(|l| **l != base_lang) {
        let doc = ResourceDocument::load(&layout.resource_path(root, lang))?;
        let report = audit(&base_doc, &doc);

        println!();
        println!("  {lang} vs {base_lang}");
        println!("  Missing:    {}", report.missing.len());
        for key in &report.missing {
            println!("    - {key}");
        }
        println!("  Extra:      {}", report.extra.len());
        for key in &report.extra {
            println!("    + {key}");
        }
        println!("  Mismatched: {}", report.mismatched.len());
        for (key, kinds) in &report.mismatched {
            println!("    ~ {key} ({kinds})");
        }
        println!("  Identical:  {}", report.identical.len());

        if !report.is_complete() {
            incomplete += 1;
        }
    }
    println!();

    if strict && incomplete > 0 {
        return Err(eyre!("{incomplete} language(s) are missing keys"));
    }
    Ok(())
}

fn cmd_check(files: &[PathBuf]) -> Result<()> {
    let mut failures = 0;
    for path in files {
        match ResourceDocument::load(path) {
            Ok(doc) => {
                if doc.is_dirty()? {
                    println!("  ~ {}  valid, not normalized", path.display());
                } else {
                    println!("  ✓ {}  {} keys", path.display(), doc.leaf_paths().len());
                }
            }
            Err(e) => {
                println!("  ✗ {}  {e}", path.display());
                failures += 1;
            }
        }
    }
    if failures > 0 {
        return Err(eyre!("{failures} file(s) failed to parse"));
    }
    Ok(())
}

fn cmd_rtl(
    config: &AppConfig,
    files: Vec<PathBuf>,
    root: &Path,
    dry_run: bool,
    no_backup: bool,
) -> Result<()> {
    let plan = Plan::new(vec![Step::Rtl(RtlStep { files })]);
    let options = run_options(config, root.to_path_buf(), dry_run, no_backup)?;
    let reporter = CliProgress::new();
    let report = run_plan(&plan, &options, &reporter)?;
    print_report(&report);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_report(report: &RunReport) {
    println!();
    for step in &report.steps {
        println!("  [{}] {}", step.index, step.label);
        for file in &step.files {
            let mut target = file.path.display().to_string();
            if let Some(lang) = &file.language {
                target = format!("{lang}: {target}");
            }
            match &file.edit {
                Some(edit) => println!("      {target}  {edit}: {}", file.outcome),
                None => println!("      {target}  {}", file.outcome),
            }
        }
    }
    println!();
    if report.dry_run {
        println!("  Dry run: nothing was written.");
    }
    println!("  Modified: {}", report.modifications());
    println!("  Files:    {}", report.written.len());
    println!("  Backups:  {}", report.backups.len());
    println!("  Warnings: {}", report.warnings.len());
    println!("  Time:     {:.2}s", report.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn step_started(&self, index: usize, total: usize, label: &str) {
        self.spinner.set_message(format!("[{index}/{total}] {label}"));
    }

    fn file_done(&self, file: &FileOutcome) {
        self.spinner
            .set_message(format!("{}  {}", file.path.display(), file.outcome));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}
