use anyhow::Result;
use std::collections::HashSet;
use std::fmt::Write as _;
use tracing::{info, warn};

use crate::error::StageFailure;
use crate::model::{GenerationRequest, ModelClient};
use crate::models::{AnnotatedItem, CuratedItem, CurationSelection};
use crate::parser::StructuredParser;
use crate::pipeline::StageOutput;
use crate::reconcile::{read_index, text_field, IndexRead};

const INDEX_KEYS: &[&str] = &["article_index", "source_index", "index"];
const REASON_KEYS: &[&str] = &["selection_reason", "justification", "reason"];

/// Picks the top-K articles for the configured audience, each with a short
/// justification.
pub struct NewsCurator {
    audience: String,
    language: String,
    top_k: usize,
}

impl NewsCurator {
    pub fn new(audience: impl Into<String>, language: impl Into<String>, top_k: usize) -> Self {
        Self {
            audience: audience.into(),
            language: language.into(),
            top_k,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub async fn select_top_articles(
        &self,
        model: &dyn ModelClient,
        parser: &StructuredParser,
        items: &[AnnotatedItem],
    ) -> StageOutput<Vec<CurationSelection>> {
        if items.is_empty() || self.top_k == 0 {
            return StageOutput {
                value: Vec::new(),
                failure: None,
            };
        }

        match self.try_select(model, parser, items).await {
            Ok(selections) => {
                info!(selected = selections.len(), target = self.top_k, "curation done");
                StageOutput {
                    value: selections,
                    failure: None,
                }
            }
            Err(e) => {
                let failure = StageFailure::Curation(e);
                warn!("{}, continuing without curated articles", failure);
                StageOutput {
                    value: Vec::new(),
                    failure: Some(failure),
                }
            }
        }
    }

    async fn try_select(
        &self,
        model: &dyn ModelClient,
        parser: &StructuredParser,
        items: &[AnnotatedItem],
    ) -> Result<Vec<CurationSelection>> {
        let request =
            GenerationRequest::new("curation", self.prompt(items)).with_temperature(0.3);
        let text = model.generate(&request).await?;
        let entries = parser.parse_array(&text, &request.context)?;

        let mut seen = HashSet::new();
        let mut selections = Vec::new();
        for (entry_no, entry) in entries.iter().enumerate() {
            if selections.len() == self.top_k {
                break;
            }
            let Some(fields) = entry.as_object() else {
                warn!(entry = entry_no, "curation entry is not an object, skipped");
                continue;
            };
            let source_index = match read_index(fields, INDEX_KEYS, items.len()) {
                IndexRead::Valid(idx) => idx,
                other => {
                    warn!(entry = entry_no, index = ?other, "invalid curation index, skipped");
                    continue;
                }
            };
            if !seen.insert(source_index) {
                warn!(index = source_index, "article selected twice, keeping the first");
                continue;
            }
            selections.push(CurationSelection {
                source_index,
                justification: text_field(fields, REASON_KEYS).unwrap_or_default(),
            });
        }

        Ok(selections)
    }

    fn prompt(&self, items: &[AnnotatedItem]) -> String {
        let mut list = String::new();
        for (idx, item) in items.iter().enumerate() {
            let _ = writeln!(list, "[{}] {} : {}", idx, item.display_title(), item.core_summary());
        }

        format!(
            r#"You are a strategy analyst for {audience}.
Below are today's AI news articles, already analyzed.

Select the Top {k} articles that {audience} should pay attention to.
Prefer enterprise business, developer tooling and enterprise AI services over
pure recency or virality, but include a general AI trend when it matters.

Choose {k} specific articles. Do not group them.

Output must be a valid JSON list:
[
    {{
        "article_index": 0,
        "selection_reason": "Why this article matters to {audience} ({lang}, 2-3 sentences)"
    }}
]

News list:
{list}"#,
            audience = self.audience,
            k = self.top_k,
            lang = self.language,
            list = list
        )
    }
}

/// Resolve selections against the list they were made from.
pub fn curated_items(items: &[AnnotatedItem], selections: &[CurationSelection]) -> Vec<CuratedItem> {
    selections
        .iter()
        .filter_map(|sel| {
            items.get(sel.source_index).map(|item| CuratedItem {
                item: item.clone(),
                selection_justification: sel.justification.clone(),
            })
        })
        .collect()
}
