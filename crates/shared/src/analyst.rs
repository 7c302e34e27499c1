use crate::batch::{BatchOptions, BatchProcessor, BatchReport, WindowPrompt};
use crate::model::ModelClient;
use crate::models::SourceItem;
use crate::parser::StructuredParser;

/// Per-item deep analysis: translated title, core summary and a detailed
/// explanation for every article, several articles per model call.
pub struct NewsAnalyst {
    language: String,
}

impl NewsAnalyst {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    pub async fn analyze_all(
        &self,
        model: &dyn ModelClient,
        parser: &StructuredParser,
        items: &[SourceItem],
        options: BatchOptions,
    ) -> BatchReport {
        BatchProcessor::new(model, parser, self, options)
            .run(items)
            .await
    }
}

impl WindowPrompt for NewsAnalyst {
    fn stage(&self) -> &str {
        "analysis"
    }

    fn instructions(&self, window_len: usize) -> String {
        format!(
            r#"You are an expert AI technology analyst.
Below are {count} AI-related news articles.

For EACH article, write a "deep dive" analysis in {lang}.

Your output must be a valid JSON list, one object per article:
[
    {{
        "index": 0,
        "title_translated": "The title translated to {lang} (natural and professional)",
        "core_summary": "2-3 sentences on the main point and WHY it matters ({lang})",
        "detailed_explanation": "A detailed explanation with numbered points (1, 2, 3...), comprehensive enough that the reader understands the full context without opening the original article ({lang})"
    }}
]

Rules:
1. "index" is the number shown in [News N] for the article you are describing.
2. Produce exactly one object per article, {count} objects in total.
3. Output only the JSON list."#,
            count = window_len,
            lang = self.language
        )
    }

    fn temperature(&self) -> Option<f32> {
        Some(0.4)
    }
}
