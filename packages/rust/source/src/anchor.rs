//! Anchor patterns used to find insertion points.

use regex::Regex;
use serde::Deserialize;

use localekit_shared::{LocalekitError, Result};

/// A literal substring or a regular expression matched against single lines.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "AnchorSpec")]
pub enum Anchor {
    Literal(String),
    Pattern(Regex),
}

/// TOML/JSON form: `{ literal = "..." }` or `{ regex = "..." }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
enum AnchorSpec {
    Literal(String),
    Regex(String),
}

impl TryFrom<AnchorSpec> for Anchor {
    type Error = LocalekitError;

    fn try_from(spec: AnchorSpec) -> Result<Self> {
        match spec {
            AnchorSpec::Literal(text) => Self::literal(text),
            AnchorSpec::Regex(pattern) => Self::regex(&pattern),
        }
    }
}

impl Anchor {
    pub fn literal(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(LocalekitError::validation("literal anchor is empty"));
        }
        Ok(Self::Literal(text))
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| LocalekitError::parse(format!("invalid anchor regex '{pattern}': {e}")))
    }

    /// Whether `line` (without its terminator) matches.
    pub fn matches(&self, line: &str) -> bool {
        match self {
            Self::Literal(text) => line.contains(text.as_str()),
            Self::Pattern(re) => re.is_match(line),
        }
    }

    /// Index of the first matching line at or after `from`.
    pub fn find_line<S: AsRef<str>>(&self, lines: &[S], from: usize) -> Option<usize> {
        lines
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, line)| self.matches(line.as_ref()))
            .map(|(idx, _)| idx)
    }
}

impl std::fmt::Display for Anchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(text) => write!(f, "{text:?}"),
            Self::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}
