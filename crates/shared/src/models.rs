use serde::{Deserialize, Serialize};

/// A feed entry as produced by the collector. Identity is `link`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    pub title: String,
    pub source: String,
    pub link: String,
    pub published_at: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub category: String,
}

impl SourceItem {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source: String::new(),
            link: link.into(),
            published_at: String::new(),
            summary: String::new(),
            category: String::new(),
        }
    }
}

/// Fields the analysis stage adds to an item. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_translated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_explanation: Option<String>,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.title_translated.is_none()
            && self.core_summary.is_none()
            && self.detailed_explanation.is_none()
    }

    /// Fields present in `newer` replace ours; absent ones keep ours.
    pub fn merged_with(&self, newer: Enrichment) -> Enrichment {
        Enrichment {
            title_translated: newer.title_translated.or_else(|| self.title_translated.clone()),
            core_summary: newer.core_summary.or_else(|| self.core_summary.clone()),
            detailed_explanation: newer
                .detailed_explanation
                .or_else(|| self.detailed_explanation.clone()),
        }
    }
}

/// A source item plus whatever enrichment the model produced for it.
///
/// The base record is never edited; only `enrichment` changes between stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedItem {
    #[serde(flatten)]
    pub source: SourceItem,
    #[serde(flatten)]
    pub enrichment: Enrichment,
}

impl AnnotatedItem {
    pub fn bare(source: SourceItem) -> Self {
        Self {
            source,
            enrichment: Enrichment::default(),
        }
    }

    pub fn with_enrichment(&self, newer: Enrichment) -> Self {
        Self {
            source: self.source.clone(),
            enrichment: self.enrichment.merged_with(newer),
        }
    }

    pub fn is_enriched(&self) -> bool {
        !self.enrichment.is_empty()
    }

    /// Translated title when available, otherwise the original.
    pub fn display_title(&self) -> &str {
        self.enrichment
            .title_translated
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.source.title)
    }

    pub fn core_summary(&self) -> &str {
        self.enrichment.core_summary.as_deref().unwrap_or("")
    }

    pub fn detailed_explanation(&self) -> &str {
        self.enrichment.detailed_explanation.as_deref().unwrap_or("")
    }
}

impl From<SourceItem> for AnnotatedItem {
    fn from(source: SourceItem) -> Self {
        Self::bare(source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurationSelection {
    pub source_index: usize,
    pub justification: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratedItem {
    #[serde(flatten)]
    pub item: AnnotatedItem,
    pub selection_justification: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyIssue {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_index: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightBundle {
    #[serde(default)]
    pub key_issues: Vec<KeyIssue>,
    #[serde(default)]
    pub implications: String,
    #[serde(default)]
    pub action_items: Vec<String>,
}

impl InsightBundle {
    pub fn is_empty(&self) -> bool {
        self.key_issues.is_empty()
            && self.implications.trim().is_empty()
            && self.action_items.is_empty()
    }
}

/// Counters persisted alongside a run so a degraded report can be explained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub collected: usize,
    pub analyzed: usize,
    pub enriched: usize,
    pub fallback_windows: Vec<usize>,
    pub warnings: Vec<String>,
    pub stage_failures: Vec<String>,
}

/// Complete output of one run, as written to disk.
#[derive(Debug, Serialize, Deserialize)]
pub struct BriefingData {
    pub version: String,
    pub created_at: String,
    pub items: Vec<AnnotatedItem>,
    pub curated: Vec<CuratedItem>,
    pub insights: InsightBundle,
    #[serde(default)]
    pub summary: RunSummary,
}

impl BriefingData {
    pub fn new(
        items: Vec<AnnotatedItem>,
        curated: Vec<CuratedItem>,
        insights: InsightBundle,
        summary: RunSummary,
    ) -> Self {
        Self {
            version: "1.0".to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            items,
            curated,
            insights,
            summary,
        }
    }
}
