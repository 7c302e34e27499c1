use anyhow::{Context, Result};
use chrono::DateTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::models::BriefingData;

const RUN_FILE_VERSION: &str = "1.0";

/// Get the default directory for storing run files
pub fn get_default_runs_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .context("Could not determine local data directory")?
        .join("news-brief")
        .join("runs");

    fs::create_dir_all(&data_dir).context("Failed to create runs directory")?;

    Ok(data_dir)
}

/// Save run data to a JSON file in the default runs directory
pub fn save_run(data: &BriefingData, filename: &str) -> Result<PathBuf> {
    save_run_in(&get_default_runs_dir()?, data, filename)
}

pub fn save_run_in(dir: &Path, data: &BriefingData, filename: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create runs directory: {}", dir.display()))?;
    let filepath = dir.join(filename);

    let json = serde_json::to_string_pretty(data).context("Failed to serialize run data")?;

    fs::write(&filepath, json).context("Failed to write run file")?;

    Ok(filepath)
}

/// Load run data from a JSON file
pub fn load_run(filepath: &Path) -> Result<BriefingData> {
    if !filepath.exists() {
        anyhow::bail!("Run file not found: {}", filepath.display());
    }

    let content = fs::read_to_string(filepath)
        .with_context(|| format!("Failed to read run file: {}", filepath.display()))?;

    let data: BriefingData = serde_json::from_str(&content).with_context(|| {
        format!(
            "Failed to parse run JSON from {}. The file may be corrupted or not a valid run file.",
            filepath.display()
        )
    })?;

    if data.version != RUN_FILE_VERSION {
        anyhow::bail!(
            "Unsupported run file version: {}. Expected {}. Please regenerate the run with collect-news.",
            data.version,
            RUN_FILE_VERSION
        );
    }

    // An empty run is still a valid run: a quiet news day renders an empty brief.
    Ok(data)
}

/// List all available run files with metadata, newest first
pub fn list_run_files() -> Result<Vec<(PathBuf, BriefingData)>> {
    list_run_files_in(&get_default_runs_dir()?)
}

pub fn list_run_files_in(dir: &Path) -> Result<Vec<(PathBuf, BriefingData)>> {
    let mut files = Vec::new();

    if dir.exists() {
        for entry in fs::read_dir(dir).context("Failed to read runs directory")? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                match load_run(&path) {
                    Ok(data) => files.push((path, data)),
                    Err(e) => warn!(path = %path.display(), "could not load run file: {e:#}"),
                }
            }
        }
    }

    files.sort_by(|a, b| {
        let time_a = DateTime::parse_from_rfc3339(&a.1.created_at).ok();
        let time_b = DateTime::parse_from_rfc3339(&b.1.created_at).ok();
        time_b.cmp(&time_a)
    });

    Ok(files)
}
