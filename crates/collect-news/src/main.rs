use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use shared::{
    get_default_runs_dir, io::save_run_in, Config, EmailSender, FeedConfig, GeminiClient,
    NewsCollector, PartialPolicy, ReportBuilder, StagePipeline,
};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "collect-news")]
#[command(about = "Collect AI news from RSS feeds, analyze it with Gemini and build a daily brief")]
struct Args {
    /// Feed configuration file (overrides NEWS_FEEDS_PATH)
    #[arg(short, long)]
    feeds: Option<PathBuf>,

    /// Number of hours to look back for articles
    #[arg(long)]
    hours: Option<i64>,

    /// Items per analysis request
    #[arg(short, long)]
    batch_size: Option<NonZeroUsize>,

    /// Number of articles to curate
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Pause between analysis requests, in milliseconds
    #[arg(long)]
    pacing_ms: Option<u64>,

    /// What to do with items the model skipped in a partial reply (drop, passthrough)
    #[arg(long)]
    partial_policy: Option<PartialPolicy>,

    /// Directory for the run file and HTML report
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Email the brief once it is built
    #[arg(long)]
    send: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;

    if let Some(path) = args.feeds {
        config.feeds_path = path;
    }
    if let Some(hours) = args.hours {
        anyhow::ensure!(hours > 0, "--hours must be positive");
        config.lookback_hours = hours;
    }
    if let Some(size) = args.batch_size {
        config.batch_size = size;
    }
    if let Some(k) = args.top_k {
        config.top_k = k;
    }
    if let Some(ms) = args.pacing_ms {
        config.pacing = Duration::from_millis(ms);
    }
    if let Some(policy) = args.partial_policy {
        config.partial_policy = policy;
    }

    // Fail before any network work if the brief cannot be delivered.
    let sender = if args.send {
        Some(EmailSender::new(config.require_email()?)?)
    } else {
        None
    };

    let feeds = FeedConfig::load(&config.feeds_path)?;
    println!(
        "✓ Loaded {} sources in {} categories",
        feeds.source_count(),
        feeds.feeds.len()
    );

    println!("\n📡 Collecting articles from the past {} hours...", config.lookback_hours);
    let collector = NewsCollector::new(config.lookback_hours)?;
    let items = collector.collect(&feeds).await;

    if items.is_empty() {
        println!("No new articles found in the past {} hours.", config.lookback_hours);
        return Ok(());
    }
    println!("✓ Collected {} articles", items.len());

    println!("\n🤖 Analyzing articles with {}...", config.gemini_model);
    println!("  (This may take a few minutes...)");
    let model = GeminiClient::new(config.gemini_api_key.clone(), config.gemini_model.clone())?;
    let pipeline = StagePipeline::new(&model, config.parser(), config.pipeline_settings());
    let mut outcome = pipeline.run(&items).await;

    let summary = outcome.summary();
    println!(
        "✓ Enriched {}/{} articles, curated {}",
        summary.enriched,
        summary.analyzed,
        outcome.curated.len()
    );
    if !summary.fallback_windows.is_empty() {
        println!(
            "\n⚠ {} analysis batches fell back to raw articles: {:?}",
            summary.fallback_windows.len(),
            summary.fallback_windows
        );
    }
    for failure in &summary.stage_failures {
        println!("⚠ {}", failure);
    }

    println!("\n📝 Generating HTML brief...");
    let now = Local::now();
    let html = ReportBuilder::build_html(&outcome.curated, &outcome.analyzed, &outcome.insights, now);

    let output_dir = match args.output {
        Some(dir) => dir,
        None => get_default_runs_dir()?,
    };
    let run_path = save_run_in(
        &output_dir,
        &outcome.to_briefing(),
        &format!("news-brief-{}.json", now.format("%Y-%m-%d")),
    )
    .context("Failed to save run file")?;
    let html_path =
        ReportBuilder::save(&html, &output_dir, now).context("Failed to save HTML report")?;
    outcome.mark_reported();

    println!("✓ Run saved to: {}", run_path.display());
    println!("✓ HTML saved to: {}", html_path.display());

    if let Some(sender) = sender {
        println!("\n📧 Sending brief...");
        sender
            .send_html(&ReportBuilder::subject(now), html)
            .await
            .context("Failed to send brief")?;
        println!("✓ Sent");
    }

    println!("\n✅ Done!");

    Ok(())
}
