#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use shared::{GenerationRequest, ModelClient, SourceItem};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays canned replies in order and records every request it sees.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("no scripted reply left")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn items(n: usize) -> Vec<SourceItem> {
    (0..n)
        .map(|i| SourceItem {
            title: format!("Story {i}"),
            source: "Wire".to_string(),
            link: format!("https://news.example/{i}"),
            published_at: "2026-10-15T08:00:00+00:00".to_string(),
            summary: format!("Summary of story {i}"),
            category: if i % 2 == 0 { "Research" } else { "Industry" }.to_string(),
        })
        .collect()
}

/// A well-formed analysis reply covering the given window positions.
pub fn analysis_reply(positions: &[usize]) -> String {
    let entries: Vec<String> = positions
        .iter()
        .map(|p| {
            format!(
                r#"{{"index": {p}, "title_translated": "번역 {p}", "core_summary": "core {p}", "detailed_explanation": "detail {p}"}}"#
            )
        })
        .collect();
    format!("[{}]", entries.join(", "))
}
