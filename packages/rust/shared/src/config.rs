//! Application configuration for localekit.
//!
//! User config lives at `~/.localekit/localekit.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LocalekitError, Result};
use crate::types::Language;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "localekit.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".localekit";

// ---------------------------------------------------------------------------
// Config structs (matching localekit.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where resource files live and which languages exist.
    #[serde(default)]
    pub locales: LocalesConfig,

    /// Backup behavior for source edits.
    #[serde(default)]
    pub backup: BackupConfig,

    /// Parameters of the `rtl` preset.
    #[serde(default)]
    pub rtl: RtlConfig,
}

/// `[locales]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalesConfig {
    /// Directory holding one sub-directory per language.
    #[serde(default = "default_locales_dir")]
    pub dir: String,

    /// Resource file name inside each language directory.
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Languages patched by default.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Reference language for parity audits.
    #[serde(default = "default_base_language")]
    pub base_language: String,
}

impl Default for LocalesConfig {
    fn default() -> Self {
        Self {
            dir: default_locales_dir(),
            file_name: default_file_name(),
            languages: default_languages(),
            base_language: default_base_language(),
        }
    }
}

fn default_locales_dir() -> String {
    "src/locales".into()
}
fn default_file_name() -> String {
    "translation.json".into()
}
fn default_languages() -> Vec<String> {
    vec!["en".into(), "he".into()]
}
fn default_base_language() -> String {
    "en".into()
}

/// `[backup]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Copy each source file aside before its first edit.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Suffix appended to the file name of the copy.
    #[serde(default = "default_backup_suffix")]
    pub suffix: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            suffix: default_backup_suffix(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_backup_suffix() -> String {
    ".backup".into()
}

/// `[rtl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtlConfig {
    /// Line after which the language-context import goes.
    #[serde(default = "default_import_anchor")]
    pub import_anchor: String,

    /// The import line to insert.
    #[serde(default = "default_import_line")]
    pub import_line: String,

    /// Line after which the direction hook goes.
    #[serde(default = "default_hook_anchor")]
    pub hook_anchor: String,

    /// The hook line to insert (indentation included).
    #[serde(default = "default_hook_line")]
    pub hook_line: String,

    /// Substring whose presence means the import was already added.
    #[serde(default = "default_guard")]
    pub guard: String,

    /// Component tags that receive the direction attribute.
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,

    /// Attribute text inserted into each tag.
    #[serde(default = "default_attribute")]
    pub attribute: String,
}

impl Default for RtlConfig {
    fn default() -> Self {
        Self {
            import_anchor: default_import_anchor(),
            import_line: default_import_line(),
            hook_anchor: default_hook_anchor(),
            hook_line: default_hook_line(),
            guard: default_guard(),
            tags: default_tags(),
            attribute: default_attribute(),
        }
    }
}

fn default_import_anchor() -> String {
    "import { useTranslation } from 'react-i18next';".into()
}
fn default_import_line() -> String {
    "import { useLanguage } from '@/contexts/LanguageContext';".into()
}
fn default_hook_anchor() -> String {
    "const { t } = useTranslation();".into()
}
fn default_hook_line() -> String {
    "  const { isRTL } = useLanguage();".into()
}
fn default_guard() -> String {
    "useLanguage".into()
}
fn default_tags() -> Vec<String> {
    vec!["Input".into(), "Textarea".into()]
}
fn default_attribute() -> String {
    "dir={isRTL ? 'rtl' : 'ltr'}".into()
}

// ---------------------------------------------------------------------------
// Locale layout (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime view of where resource files live.
#[derive(Debug, Clone)]
pub struct LocaleLayout {
    /// Locales directory, relative to the project root unless absolute.
    pub dir: PathBuf,
    /// File name inside each language directory.
    pub file_name: String,
    /// Languages targeted when a step does not narrow them.
    pub languages: Vec<Language>,
    /// Reference language for audits.
    pub base_language: Language,
}

impl LocaleLayout {
    /// Path of the resource file for `lang` under `root`.
    pub fn resource_path(&self, root: &Path, lang: &Language) -> PathBuf {
        root.join(&self.dir).join(lang.code()).join(&self.file_name)
    }
}

impl TryFrom<&AppConfig> for LocaleLayout {
    type Error = LocalekitError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let languages = config
            .locales
            .languages
            .iter()
            .map(|code| Language::new(code.as_str()))
            .collect::<Result<Vec<_>>>()?;
        if languages.is_empty() {
            return Err(LocalekitError::config("[locales] languages must not be empty"));
        }
        Ok(Self {
            dir: PathBuf::from(&config.locales.dir),
            file_name: config.locales.file_name.clone(),
            languages,
            base_language: Language::new(config.locales.base_language.as_str())?,
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.localekit/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LocalekitError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.localekit/localekit.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LocalekitError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| LocalekitError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LocalekitError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LocalekitError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LocalekitError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("translation.json"));
        assert!(toml_str.contains(".backup"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.locales.languages, vec!["en", "he"]);
        assert_eq!(parsed.rtl.attribute, "dir={isRTL ? 'rtl' : 'ltr'}");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[locales]
dir = "public/locales"
languages = ["en", "he", "ar"]

[backup]
enabled = false
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.locales.file_name, "translation.json");
        assert_eq!(config.locales.languages.len(), 3);
        assert!(!config.backup.enabled);
        assert_eq!(config.backup.suffix, ".backup");
        assert_eq!(config.rtl.tags, vec!["Input", "Textarea"]);
    }

    #[test]
    fn layout_resolves_resource_paths() {
        let layout = LocaleLayout::try_from(&AppConfig::default()).expect("layout");
        let he = Language::new("he").unwrap();
        let path = layout.resource_path(Path::new("/repo"), &he);
        assert_eq!(path, PathBuf::from("/repo/src/locales/he/translation.json"));
        assert_eq!(layout.base_language.code(), "en");
    }

    #[test]
    fn layout_rejects_empty_language_list() {
        let mut config = AppConfig::default();
        config.locales.languages.clear();
        assert!(LocaleLayout::try_from(&config).is_err());
    }

    #[test]
    fn load_config_from_missing_file_is_io_error() {
        let err = load_config_from(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.is_not_found());
    }
}
