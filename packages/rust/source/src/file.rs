//! Line-oriented view of a source file.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use localekit_shared::{LineEnding, LocalekitError, Result};

/// A text file split into lines, remembering how to write it back.
///
/// Lines are stored without terminators. On render they are joined with the
/// file's dominant line ending, so a CRLF file stays CRLF after an edit.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: Option<PathBuf>,
    pub(crate) lines: Vec<String>,
    line_ending: LineEnding,
    trailing_newline: bool,
    original: String,
}

impl SourceFile {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(LocalekitError::not_found(format!(
                "source file {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| LocalekitError::io(path, e))?;
        let mut file = Self::parse(&text);
        file.path = Some(path.to_path_buf());
        debug!(path = %path.display(), lines = file.lines.len(), ending = ?file.line_ending, "loaded source file");
        Ok(file)
    }

    pub fn parse(text: &str) -> Self {
        let line_ending = LineEnding::detect(text);
        let trailing_newline = text.ends_with('\n');
        let body = text.strip_suffix('\n').unwrap_or(text);
        let lines = if text.is_empty() {
            Vec::new()
        } else {
            body.split('\n')
                .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
                .collect()
        };
        Self {
            path: None,
            lines,
            line_ending,
            trailing_newline,
            original: text.to_string(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }

    pub fn render(&self) -> String {
        let ending = self.line_ending.as_str();
        let mut text = self.lines.join(ending);
        if self.trailing_newline {
            text.push_str(ending);
        }
        text
    }

    /// Whether the rendered text differs from what was loaded.
    pub fn is_dirty(&self) -> bool {
        self.render() != self.original
    }

    /// Text as it was when loaded.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Overwrite the file this was loaded from.
    pub fn save(&mut self) -> Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| LocalekitError::validation("source has no file path"))?;
        let text = self.render();
        std::fs::write(&path, &text).map_err(|e| LocalekitError::io(&path, e))?;
        info!(path = %path.display(), lines = self.lines.len(), "wrote source file");
        self.original = text;
        Ok(())
    }
}
