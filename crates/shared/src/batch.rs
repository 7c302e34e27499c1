use anyhow::Result;
use std::fmt::Write as _;
use std::num::NonZeroUsize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ReconciliationWarning;
use crate::model::{GenerationRequest, ModelClient};
use crate::models::{AnnotatedItem, SourceItem};
use crate::parser::StructuredParser;
use crate::reconcile::{reconcile_window, PartialPolicy, WindowReconciliation};

const SUMMARY_LIMIT: usize = 2000;

/// Instructions a stage puts in front of the framed window.
pub trait WindowPrompt: Send + Sync {
    /// Prefix for context tags, e.g. `analysis` gives `analysis_batch_3`.
    fn stage(&self) -> &str;

    fn instructions(&self, window_len: usize) -> String;

    fn temperature(&self) -> Option<f32> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub batch_size: NonZeroUsize,
    /// Quiet period between consecutive windows.
    pub pacing: Duration,
    pub partial_policy: PartialPolicy,
}

impl BatchOptions {
    pub fn new(batch_size: NonZeroUsize) -> Self {
        Self {
            batch_size,
            pacing: Duration::from_secs(1),
            partial_policy: PartialPolicy::Drop,
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_partial_policy(mut self, policy: PartialPolicy) -> Self {
        self.partial_policy = policy;
        self
    }
}

#[derive(Debug, Default)]
pub struct WindowOutcome {
    pub items: Vec<AnnotatedItem>,
    pub warnings: Vec<ReconciliationWarning>,
    /// Set when the whole window fell back to its unannotated inputs.
    pub fallback: Option<String>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<AnnotatedItem>,
    pub warnings: Vec<ReconciliationWarning>,
    /// Sequence numbers (1-based) of windows that fell back.
    pub fallback_windows: Vec<usize>,
    pub windows: usize,
}

/// Splits items into fixed-size windows, annotates each window with one
/// model call and reconciles the reply by window position.
pub struct BatchProcessor<'a> {
    model: &'a dyn ModelClient,
    parser: &'a StructuredParser,
    prompt: &'a dyn WindowPrompt,
    options: BatchOptions,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(
        model: &'a dyn ModelClient,
        parser: &'a StructuredParser,
        prompt: &'a dyn WindowPrompt,
        options: BatchOptions,
    ) -> Self {
        Self {
            model,
            parser,
            prompt,
            options,
        }
    }

    pub async fn process_all(&self, items: &[SourceItem]) -> Vec<AnnotatedItem> {
        self.run(items).await.items
    }

    pub async fn run(&self, items: &[SourceItem]) -> BatchReport {
        let size = self.options.batch_size.get();
        info!(
            stage = self.prompt.stage(),
            items = items.len(),
            batch_size = size,
            "processing items in windows"
        );

        let mut report = BatchReport::default();
        for (idx, window) in items.chunks(size).enumerate() {
            if idx > 0 && !self.options.pacing.is_zero() {
                tokio::time::sleep(self.options.pacing).await;
            }

            let seq = idx + 1;
            let outcome = self.process_window(seq, window).await;
            if outcome.fallback.is_some() {
                report.fallback_windows.push(seq);
            }
            report.items.extend(outcome.items);
            report.warnings.extend(outcome.warnings);
            report.windows += 1;
        }

        report
    }

    pub async fn process_batch(&self, seq: usize, window: &[SourceItem]) -> Vec<AnnotatedItem> {
        self.process_window(seq, window).await.items
    }

    pub async fn process_window(&self, seq: usize, window: &[SourceItem]) -> WindowOutcome {
        if window.is_empty() {
            return WindowOutcome::default();
        }

        let request = GenerationRequest {
            context: format!("{}_batch_{}", self.prompt.stage(), seq),
            prompt: format!(
                "{}\n\nInput News:\n{}",
                self.prompt.instructions(window.len()),
                frame_window(window)
            ),
            temperature: self.prompt.temperature(),
        };

        match self.annotate(seq, window, &request).await {
            Ok(reconciliation) => {
                for warning in &reconciliation.warnings {
                    warn!(context = %request.context, "{}", warning);
                }
                let warnings = reconciliation.warnings.clone();
                let items = reconciliation.into_items(window, self.options.partial_policy);
                debug!(
                    context = %request.context,
                    produced = items.len(),
                    window_len = window.len(),
                    "window reconciled"
                );
                WindowOutcome {
                    items,
                    warnings,
                    fallback: None,
                }
            }
            Err(e) => {
                warn!(
                    context = %request.context,
                    error = %format!("{e:#}"),
                    "window failed, keeping items unannotated"
                );
                WindowOutcome {
                    items: window.iter().cloned().map(AnnotatedItem::bare).collect(),
                    warnings: Vec::new(),
                    fallback: Some(format!("{e:#}")),
                }
            }
        }
    }

    async fn annotate(
        &self,
        seq: usize,
        window: &[SourceItem],
        request: &GenerationRequest,
    ) -> Result<WindowReconciliation> {
        let text = self.model.generate(request).await?;
        let entries = self.parser.parse_array(&text, &request.context)?;
        Ok(reconcile_window(seq, window, &entries))
    }
}

/// Render a window for the model, numbering items by window position.
pub fn frame_window(window: &[SourceItem]) -> String {
    let mut out = String::new();
    for (idx, item) in window.iter().enumerate() {
        let source = if item.source.is_empty() {
            "Unknown"
        } else {
            &item.source
        };
        let _ = writeln!(out, "[News {}]", idx);
        let _ = writeln!(out, "Title: {}", item.title);
        let _ = writeln!(out, "Source: {}", source);
        if !item.category.is_empty() {
            let _ = writeln!(out, "Category: {}", item.category);
        }
        let _ = writeln!(out, "Original Summary: {}", truncate(&item.summary, SUMMARY_LIMIT));
        out.push_str("--------------------------------\n");
    }
    out
}

/// Cut `text` to at most `limit` bytes on a char boundary.
pub(crate) fn truncate(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_numbers_items_by_window_position() {
        let window = vec![
            SourceItem::new("First", "https://example.com/1"),
            SourceItem {
                source: "Wire".into(),
                category: "Chips".into(),
                summary: "Short".into(),
                ..SourceItem::new("Second", "https://example.com/2")
            },
        ];

        let framed = frame_window(&window);

        assert!(framed.starts_with("[News 0]\nTitle: First\nSource: Unknown\n"));
        assert!(framed.contains("[News 1]\nTitle: Second\nSource: Wire\nCategory: Chips\n"));
        assert!(!framed.contains("[News 2]"));
        assert!(!framed.contains("https://example.com"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "가나다";
        assert_eq!(truncate(text, 4), "가");
        assert_eq!(truncate(text, 100), text);
    }

    #[test]
    fn options_default_to_drop_policy() {
        let options = BatchOptions::new(NonZeroUsize::new(3).unwrap());
        assert_eq!(options.partial_policy, PartialPolicy::Drop);
        assert_eq!(options.pacing, Duration::from_secs(1));
    }
}
