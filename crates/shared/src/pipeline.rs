use tracing::info;

use crate::analyst::NewsAnalyst;
use crate::batch::BatchOptions;
use crate::curator::{curated_items, NewsCurator};
use crate::error::{ReconciliationWarning, StageFailure};
use crate::insights::InsightSynthesizer;
use crate::model::ModelClient;
use crate::models::{
    AnnotatedItem, BriefingData, CuratedItem, CurationSelection, InsightBundle, RunSummary,
    SourceItem,
};
use crate::parser::StructuredParser;

/// Value of a stage that may have failed; `value` is always usable.
#[derive(Debug)]
pub struct StageOutput<T> {
    pub value: T,
    pub failure: Option<StageFailure>,
}

/// Per-run lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    Collected,
    Analyzed,
    Curated,
    Synthesized,
    Reported,
}

impl RunState {
    pub fn next(self) -> Option<RunState> {
        match self {
            RunState::Collected => Some(RunState::Analyzed),
            RunState::Analyzed => Some(RunState::Curated),
            RunState::Curated => Some(RunState::Synthesized),
            RunState::Synthesized => Some(RunState::Reported),
            RunState::Reported => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub batch: BatchOptions,
    pub top_k: usize,
    /// Output language for translations and analysis.
    pub language: String,
    /// Who curation and insights are written for.
    pub audience: String,
}

#[derive(Debug)]
pub struct PipelineOutcome {
    state: RunState,
    pub collected: usize,
    pub analyzed: Vec<AnnotatedItem>,
    pub selections: Vec<CurationSelection>,
    pub curated: Vec<CuratedItem>,
    pub insights: InsightBundle,
    pub warnings: Vec<ReconciliationWarning>,
    pub fallback_windows: Vec<usize>,
    pub stage_failures: Vec<StageFailure>,
}

impl PipelineOutcome {
    fn collected(count: usize) -> Self {
        Self {
            state: RunState::Collected,
            collected: count,
            analyzed: Vec::new(),
            selections: Vec::new(),
            curated: Vec::new(),
            insights: InsightBundle::default(),
            warnings: Vec::new(),
            fallback_windows: Vec::new(),
            stage_failures: Vec::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn advance(&mut self, to: RunState) {
        debug_assert_eq!(self.state.next(), Some(to), "run state must move forward one step");
        self.state = to;
    }

    /// Report assembly finished; the run is terminal.
    pub fn mark_reported(&mut self) {
        if self.state == RunState::Synthesized {
            self.advance(RunState::Reported);
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            collected: self.collected,
            analyzed: self.analyzed.len(),
            enriched: self.analyzed.iter().filter(|i| i.is_enriched()).count(),
            fallback_windows: self.fallback_windows.clone(),
            warnings: self.warnings.iter().map(ToString::to_string).collect(),
            stage_failures: self.stage_failures.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn to_briefing(&self) -> BriefingData {
        BriefingData::new(
            self.analyzed.clone(),
            self.curated.clone(),
            self.insights.clone(),
            self.summary(),
        )
    }
}

/// Deep analysis, then curation, then insight synthesis, one model call at a
/// time. A failing stage degrades what the next one sees; it never aborts the
/// run.
pub struct StagePipeline<'a> {
    model: &'a dyn ModelClient,
    parser: StructuredParser,
    analyst: NewsAnalyst,
    curator: NewsCurator,
    synthesizer: InsightSynthesizer,
    batch: BatchOptions,
}

impl<'a> StagePipeline<'a> {
    pub fn new(model: &'a dyn ModelClient, parser: StructuredParser, settings: PipelineSettings) -> Self {
        Self {
            model,
            parser,
            analyst: NewsAnalyst::new(settings.language.clone()),
            curator: NewsCurator::new(
                settings.audience.clone(),
                settings.language.clone(),
                settings.top_k,
            ),
            synthesizer: InsightSynthesizer::new(settings.audience, settings.language),
            batch: settings.batch,
        }
    }

    pub async fn run(&self, items: &[SourceItem]) -> PipelineOutcome {
        let mut outcome = PipelineOutcome::collected(items.len());
        info!(model = self.model.name(), items = items.len(), "pipeline started");

        let report = self
            .analyst
            .analyze_all(self.model, &self.parser, items, self.batch.clone())
            .await;
        outcome.analyzed = report.items;
        outcome.warnings = report.warnings;
        outcome.fallback_windows = report.fallback_windows;
        outcome.advance(RunState::Analyzed);
        info!(
            analyzed = outcome.analyzed.len(),
            windows = report.windows,
            fallbacks = outcome.fallback_windows.len(),
            "analysis stage finished"
        );

        let selection = self
            .curator
            .select_top_articles(self.model, &self.parser, &outcome.analyzed)
            .await;
        outcome.stage_failures.extend(selection.failure);
        outcome.curated = curated_items(&outcome.analyzed, &selection.value);
        outcome.selections = selection.value;
        outcome.advance(RunState::Curated);

        let synthesis = self
            .synthesizer
            .analyze_insights(self.model, &self.parser, &outcome.curated)
            .await;
        outcome.stage_failures.extend(synthesis.failure);
        outcome.insights = synthesis.value;
        outcome.advance(RunState::Synthesized);

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_only_move_forward() {
        let mut state = RunState::Collected;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            assert!(next > state);
            state = next;
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                RunState::Collected,
                RunState::Analyzed,
                RunState::Curated,
                RunState::Synthesized,
                RunState::Reported
            ]
        );
    }

    #[test]
    fn mark_reported_requires_synthesis() {
        let mut outcome = PipelineOutcome::collected(0);
        outcome.mark_reported();
        assert_eq!(outcome.state(), RunState::Collected);
    }
}
