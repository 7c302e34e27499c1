//! Merging model entries back onto the window items they describe.
//!
//! The join key is the item's position inside its window. Only enrichment
//! fields are read from an entry; anything the model echoes back (title,
//! link, ...) is ignored, so base fields cannot change.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::ReconciliationWarning;
use crate::models::{AnnotatedItem, Enrichment, SourceItem};

const INDEX_KEYS: &[&str] = &["index"];
const TITLE_KEYS: &[&str] = &["title_translated", "title_korean"];
const SUMMARY_KEYS: &[&str] = &["core_summary", "one_line_summary"];
const EXPLANATION_KEYS: &[&str] = &["detailed_explanation", "analysis"];

/// What happens to window items the model did not annotate when the rest of
/// the window was reconciled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PartialPolicy {
    /// Omit them from the window output.
    #[default]
    Drop,
    /// Re-emit them unenriched, in position.
    Passthrough,
}

impl FromStr for PartialPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "passthrough" | "pass-through" => Ok(Self::Passthrough),
            other => Err(format!("expected 'drop' or 'passthrough', got '{other}'")),
        }
    }
}

/// Result of reading an index-like field from a model entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexRead {
    Valid(usize),
    Missing,
    NonInteger(String),
    OutOfRange(i64),
}

/// Read the first present key of `keys` as an offset into a collection of
/// `len` elements.
pub fn read_index(entry: &Map<String, Value>, keys: &[&str], len: usize) -> IndexRead {
    let Some(value) = keys.iter().find_map(|k| entry.get(*k)).filter(|v| !v.is_null()) else {
        return IndexRead::Missing;
    };

    let as_int = value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    });

    match as_int {
        Some(i) if i >= 0 && (i as u64) < len as u64 => IndexRead::Valid(i as usize),
        Some(i) => IndexRead::OutOfRange(i),
        None => match value.as_u64() {
            Some(u) => IndexRead::OutOfRange(i64::try_from(u).unwrap_or(i64::MAX)),
            None => IndexRead::NonInteger(value.to_string()),
        },
    }
}

/// Read the first present key of `keys` as display text.
///
/// Strings are trimmed, arrays are joined line by line, other scalars are
/// rendered. Blank results count as absent.
pub fn text_field(entry: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    let text = match keys.iter().find_map(|k| entry.get(*k))? {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| match p {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

pub fn enrichment_from(entry: &Map<String, Value>) -> Enrichment {
    Enrichment {
        title_translated: text_field(entry, TITLE_KEYS),
        core_summary: text_field(entry, SUMMARY_KEYS),
        detailed_explanation: text_field(entry, EXPLANATION_KEYS),
    }
}

/// Reconciled entries of one window, keyed by window position.
#[derive(Debug, Default)]
pub struct WindowReconciliation {
    pub annotated: BTreeMap<usize, AnnotatedItem>,
    pub warnings: Vec<ReconciliationWarning>,
}

impl WindowReconciliation {
    /// Window positions that received no annotation, ascending.
    pub fn missing(&self, window_len: usize) -> Vec<usize> {
        (0..window_len)
            .filter(|pos| !self.annotated.contains_key(pos))
            .collect()
    }

    /// Window output in window order, shaped by `policy`.
    pub fn into_items(self, window: &[SourceItem], policy: PartialPolicy) -> Vec<AnnotatedItem> {
        match policy {
            PartialPolicy::Drop => self.annotated.into_values().collect(),
            PartialPolicy::Passthrough => {
                let mut annotated = self.annotated;
                window
                    .iter()
                    .enumerate()
                    .map(|(pos, item)| {
                        annotated
                            .remove(&pos)
                            .unwrap_or_else(|| AnnotatedItem::bare(item.clone()))
                    })
                    .collect()
            }
        }
    }
}

/// Merge `entries` onto copies of `window` items. `seq` is the window's
/// sequence number, used only in warnings.
pub fn reconcile_window(seq: usize, window: &[SourceItem], entries: &[Value]) -> WindowReconciliation {
    let mut out = WindowReconciliation::default();

    for (entry_no, entry) in entries.iter().enumerate() {
        let Some(fields) = entry.as_object() else {
            out.warnings.push(ReconciliationWarning::NotAnObject {
                window: seq,
                entry: entry_no,
            });
            continue;
        };

        let position = match read_index(fields, INDEX_KEYS, window.len()) {
            IndexRead::Valid(pos) => pos,
            IndexRead::Missing => {
                out.warnings.push(ReconciliationWarning::MissingIndexField {
                    window: seq,
                    entry: entry_no,
                });
                continue;
            }
            IndexRead::NonInteger(raw) => {
                out.warnings
                    .push(ReconciliationWarning::NonIntegerIndex { window: seq, raw });
                continue;
            }
            IndexRead::OutOfRange(index) => {
                out.warnings.push(ReconciliationWarning::IndexOutOfRange {
                    window: seq,
                    index,
                    window_len: window.len(),
                });
                continue;
            }
        };

        if out.annotated.contains_key(&position) {
            out.warnings.push(ReconciliationWarning::DuplicateIndex {
                window: seq,
                index: position,
            });
            continue;
        }

        let item = AnnotatedItem::bare(window[position].clone()).with_enrichment(enrichment_from(fields));
        out.annotated.insert(position, item);
    }

    for position in out.missing(window.len()) {
        out.warnings.push(ReconciliationWarning::MissingIndex {
            window: seq,
            position,
            title: window[position].title.clone(),
        });
    }

    out
}
