use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

const TEXT_LIMIT: usize = 2000;
const CONTEXT_RADIUS: usize = 200;

/// Everything known about one failed parse.
#[derive(Debug)]
pub struct ParseFailure<'a> {
    pub context: &'a str,
    pub original: &'a str,
    pub cleaned: &'a str,
    pub error_kind: &'a str,
    pub message: &'a str,
    /// 1-based, as reported by the parser.
    pub line: Option<usize>,
    /// 1-based, counted in characters.
    pub column: Option<usize>,
}

impl ParseFailure<'_> {
    /// Character offset into the cleaned text, derived from line/column.
    pub fn position(&self) -> Option<usize> {
        let line = self.line?;
        let column = self.column.unwrap_or(1);
        let mut offset = 0;
        for (idx, text) in self.cleaned.split('\n').enumerate() {
            if idx + 1 == line {
                return Some(offset + column.saturating_sub(1).min(text.chars().count()));
            }
            offset += text.chars().count() + 1;
        }
        None
    }
}

/// Write-only sink for parse-failure records, one file per failure.
#[derive(Debug, Clone)]
pub struct DiagnosticsSink {
    dir: PathBuf,
}

impl DiagnosticsSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_parse_failure(&self, failure: &ParseFailure<'_>) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create diagnostics directory: {}", self.dir.display())
        })?;

        let now = Local::now();
        let filename = format!(
            "json_parse_error_{}_{}.txt",
            now.format("%Y%m%d_%H%M%S"),
            file_safe(failure.context)
        );
        let path = self.dir.join(filename);

        fs::write(&path, render(failure, now))
            .with_context(|| format!("Failed to write diagnostics file: {}", path.display()))?;

        Ok(path)
    }
}

fn file_safe(tag: &str) -> String {
    tag.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn head(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Render the human-readable diagnostic record.
pub fn render(failure: &ParseFailure<'_>, at: DateTime<Local>) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== JSON Parse Error Log ===");
    let _ = writeln!(out, "Context: {}", failure.context);
    let _ = writeln!(out, "Timestamp: {}", at.format("%Y-%m-%d %H:%M:%S %Z"));
    let _ = writeln!(out, "Error Type: {}", failure.error_kind);
    let _ = writeln!(out, "Error Message: {}", failure.message);

    let _ = writeln!(out, "\n=== Original Text (first {TEXT_LIMIT} chars) ===");
    out.push_str(head(failure.original, TEXT_LIMIT));
    let _ = writeln!(out, "\n\n=== Cleaned Text (first {TEXT_LIMIT} chars) ===");
    out.push_str(head(failure.cleaned, TEXT_LIMIT));

    let _ = writeln!(out, "\n\n=== Error Details ===");
    let position = failure.position();
    if let Some(pos) = position {
        let _ = writeln!(out, "Error Position: {pos}");
    }
    if let Some(line) = failure.line {
        let _ = writeln!(out, "Error Line: {line}");
    }
    if let Some(column) = failure.column {
        let _ = writeln!(out, "Error Column: {column}");
    }

    if let Some(pos) = position {
        let chars: Vec<char> = failure.cleaned.chars().collect();
        let start = pos.saturating_sub(CONTEXT_RADIUS);
        let end = (pos + CONTEXT_RADIUS).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        let _ = writeln!(out, "\n=== Error Context (char {start}-{end}) ===");
        out.push_str(&window);
        let _ = writeln!(out, "\n{}^", " ".repeat(pos - start));
        let _ = writeln!(out, "Error at position {pos}");
    }

    if let Some(line) = failure.line {
        if let Some(text) = failure.cleaned.split('\n').nth(line.saturating_sub(1)) {
            let _ = writeln!(out, "\n=== Error Line ({line}) ===");
            out.push_str(text);
            if let Some(column) = failure.column {
                let _ = write!(out, "\n{}^", " ".repeat(column.saturating_sub(1)));
            }
            out.push('\n');
        }
    }

    out
}
