// Public modules
pub mod analyst;
pub mod batch;
pub mod collector;
pub mod config;
pub mod curator;
pub mod diagnostics;
pub mod error;
pub mod fence;
pub mod insights;
pub mod io;
pub mod model;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod sender;

// Re-export commonly used types
pub use analyst::NewsAnalyst;
pub use batch::{BatchOptions, BatchProcessor, BatchReport, WindowPrompt};
pub use collector::{FeedConfig, NewsCollector};
pub use config::{Config, EmailConfig};
pub use curator::NewsCurator;
pub use diagnostics::DiagnosticsSink;
pub use error::{ExtractionError, FatalPrecondition, ReconciliationWarning, StageFailure};
pub use insights::InsightSynthesizer;
pub use io::{get_default_runs_dir, list_run_files, load_run, save_run};
pub use model::{GeminiClient, GenerationRequest, ModelClient};
pub use models::{
    AnnotatedItem, BriefingData, CuratedItem, CurationSelection, Enrichment, InsightBundle,
    KeyIssue, RunSummary, SourceItem,
};
pub use parser::StructuredParser;
pub use pipeline::{PipelineOutcome, PipelineSettings, RunState, StageOutput, StagePipeline};
pub use reconcile::PartialPolicy;
pub use report::ReportBuilder;
pub use sender::EmailSender;
