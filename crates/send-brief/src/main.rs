use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Parser;
use shared::{list_run_files, load_run, BriefingData, EmailConfig, EmailSender, ReportBuilder};
use std::fs;
use std::io::{self, Write as _};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "send-brief")]
#[command(about = "Render a saved news run as an HTML brief and email it")]
struct Args {
    /// Path to the run file (if not provided, will list available runs)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Write the HTML to this path instead of sending it
    #[arg(short, long)]
    output: Option<PathBuf>,
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

    let run_file = if let Some(path) = args.file {
        path
    } else {
        select_run_file()?
    };

    println!("📖 Reading run file: {}", run_file.display());
    let data = load_run(&run_file)?;
    println!(
        "✓ {} articles, {} curated",
        data.items.len(),
        data.curated.len()
    );

    let run_date = run_date(&data);
    let html = ReportBuilder::build_html(&data.curated, &data.items, &data.insights, run_date);

    if let Some(path) = args.output {
        fs::write(&path, &html)
            .with_context(|| format!("Failed to write HTML file: {}", path.display()))?;
        println!("\n✅ HTML saved to: {}", path.display());
        return Ok(());
    }

    let email = EmailConfig::from_env()?;
    let sender = EmailSender::new(&email)?;

    println!("\n📧 Sending brief to {}...", email.recipient);
    sender
        .send_html(&ReportBuilder::subject(run_date), html)
        .await
        .context("Failed to send brief")?;

    println!("\n✅ Done!");

    Ok(())
}

/// The report is dated by when the run was collected, not when it is sent.
fn run_date(data: &BriefingData) -> DateTime<Local> {
    DateTime::parse_from_rfc3339(&data.created_at)
        .map(|dt| dt.with_timezone(&Local))
        .unwrap_or_else(|_| Local::now())
}

fn select_run_file() -> Result<PathBuf> {
    let runs = list_run_files()?;

    if runs.is_empty() {
        anyhow::bail!("No run files found. Run collect-news first.");
    }

    println!("Available runs:\n");
    for (i, (path, data)) in runs.iter().enumerate() {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let created = DateTime::parse_from_rfc3339(&data.created_at)
            .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        println!(
            "  {}) {} ({} articles, created: {})",
            i + 1,
            filename,
            data.items.len(),
            created
        );
    }

    print!("\nSelect run (1-{}): ", runs.len());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let selection: usize = input
        .trim()
        .parse()
        .context("Invalid selection. Please enter a number.")?;

    if selection < 1 || selection > runs.len() {
        anyhow::bail!("Selection out of range. Please choose 1-{}", runs.len());
    }

    Ok(runs[selection - 1].0.clone())
}
