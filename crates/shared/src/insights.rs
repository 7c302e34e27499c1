use anyhow::Result;
use serde_json::{Map, Value};
use std::fmt::Write as _;
use tracing::{info, warn};

use crate::error::StageFailure;
use crate::model::{GenerationRequest, ModelClient};
use crate::models::{CuratedItem, InsightBundle, KeyIssue};
use crate::parser::StructuredParser;
use crate::pipeline::StageOutput;
use crate::reconcile::{read_index, text_field, IndexRead};

/// Implications text used when synthesis fails outright.
pub const FAILED_IMPLICATIONS: &str = "Insight analysis failed; see the curated articles below.";

/// Cross-article synthesis over the curated set only.
pub struct InsightSynthesizer {
    audience: String,
    language: String,
}

impl InsightSynthesizer {
    pub fn new(audience: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            language: language.into(),
        }
    }

    pub async fn analyze_insights(
        &self,
        model: &dyn ModelClient,
        parser: &StructuredParser,
        curated: &[CuratedItem],
    ) -> StageOutput<InsightBundle> {
        if curated.is_empty() {
            return StageOutput {
                value: InsightBundle::default(),
                failure: None,
            };
        }

        match self.try_synthesize(model, parser, curated).await {
            Ok(bundle) => {
                info!(
                    key_issues = bundle.key_issues.len(),
                    action_items = bundle.action_items.len(),
                    "insight synthesis done"
                );
                StageOutput {
                    value: bundle,
                    failure: None,
                }
            }
            Err(e) => {
                let failure = StageFailure::Insight(e);
                warn!("{}, using placeholder insights", failure);
                StageOutput {
                    value: InsightBundle {
                        key_issues: Vec::new(),
                        implications: FAILED_IMPLICATIONS.to_string(),
                        action_items: Vec::new(),
                    },
                    failure: Some(failure),
                }
            }
        }
    }

    async fn try_synthesize(
        &self,
        model: &dyn ModelClient,
        parser: &StructuredParser,
        curated: &[CuratedItem],
    ) -> Result<InsightBundle> {
        let request =
            GenerationRequest::new("insights", self.prompt(curated)).with_temperature(0.4);
        let text = model.generate(&request).await?;
        let fields = parser.parse_object(&text, &request.context)?;
        Ok(bundle_from(&fields, curated.len()))
    }

    fn prompt(&self, curated: &[CuratedItem]) -> String {
        let mut articles = String::new();
        for (idx, article) in curated.iter().enumerate() {
            let item = &article.item;
            let _ = writeln!(articles, "[Article {}] {}", idx, item.display_title());
            let _ = writeln!(articles, "    Selection reason: {}", article.selection_justification);
            let _ = writeln!(articles, "    Core summary: {}", item.core_summary());
            let _ = writeln!(articles, "    Details: {}\n", item.detailed_explanation());
        }

        format!(
            r#"You are a strategy analyst for {audience}.
Below are the Top {n} AI news articles selected for {audience}.

Analyze them together and write, in {lang}:
1. The key issues to watch (per article or across articles)
2. The business and technical implications for {audience}
3. Action items or strategic suggestions

Output must be a single valid JSON object:
{{
    "key_issues": [
        {{
            "title": "Issue title",
            "description": "What the issue is and why it matters (2-3 sentences)",
            "related_article_index": 0
        }}
    ],
    "implications": "Overall business and technical implications (5-7 sentences)",
    "action_items": ["Action item 1", "Action item 2"]
}}

"related_article_index" is the number shown in [Article N].

Selected articles:
{articles}"#,
            audience = self.audience,
            n = curated.len(),
            lang = self.language,
            articles = articles
        )
    }
}

/// Build a bundle from whatever well-formed parts the reply contains.
fn bundle_from(fields: &Map<String, Value>, article_count: usize) -> InsightBundle {
    let key_issues = fields
        .get("key_issues")
        .and_then(Value::as_array)
        .map(|issues| {
            issues
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|issue| {
                    let title = text_field(issue, &["title"]).unwrap_or_default();
                    let description = text_field(issue, &["description"]).unwrap_or_default();
                    if title.is_empty() && description.is_empty() {
                        return None;
                    }
                    let related_index = match read_index(
                        issue,
                        &["related_article_index", "related_index"],
                        article_count,
                    ) {
                        IndexRead::Valid(idx) => Some(idx),
                        _ => None,
                    };
                    Some(KeyIssue {
                        title,
                        description,
                        related_index,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let action_items = match fields.get("action_items") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    };

    InsightBundle {
        key_issues,
        implications: text_field(fields, &["implications"]).unwrap_or_default(),
        action_items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn bundle_keeps_well_formed_parts() {
        let bundle = bundle_from(
            &fields(json!({
                "key_issues": [
                    {"title": "On-device models", "description": "Shift to edge", "related_article_index": 1},
                    {"title": "Pricing", "description": "Cheaper APIs", "related_article_index": 9},
                    {"title": "", "description": ""},
                    "stray"
                ],
                "implications": "  Expect pressure on margins. ",
                "action_items": ["Evaluate vendors", "", null]
            })),
            3,
        );

        assert_eq!(
            bundle,
            InsightBundle {
                key_issues: vec![
                    KeyIssue {
                        title: "On-device models".into(),
                        description: "Shift to edge".into(),
                        related_index: Some(1),
                    },
                    KeyIssue {
                        title: "Pricing".into(),
                        description: "Cheaper APIs".into(),
                        related_index: None,
                    },
                ],
                implications: "Expect pressure on margins.".into(),
                action_items: vec!["Evaluate vendors".into()],
            }
        );
    }

    #[test]
    fn missing_sections_yield_empty_bundle() {
        let bundle = bundle_from(&fields(json!({"unrelated": true})), 2);
        assert!(bundle.is_empty());
    }

    #[test]
    fn single_string_action_item_is_accepted() {
        let bundle = bundle_from(&fields(json!({"action_items": "Do one thing"})), 1);
        assert_eq!(bundle.action_items, vec!["Do one thing".to_string()]);
    }
}
