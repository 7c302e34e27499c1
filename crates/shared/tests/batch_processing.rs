mod common;

use common::{analysis_reply, items, ScriptedModel};
use pretty_assertions::assert_eq;
use shared::{
    BatchOptions, BatchProcessor, NewsAnalyst, PartialPolicy, ReconciliationWarning,
    StructuredParser,
};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

fn options(batch_size: usize) -> BatchOptions {
    BatchOptions::new(NonZeroUsize::new(batch_size).unwrap()).with_pacing(Duration::ZERO)
}

#[tokio::test]
async fn full_reply_keeps_window_order() {
    let model = ScriptedModel::ok(&[analysis_reply(&[2, 0, 1]).as_str()]);
    let parser = StructuredParser::without_diagnostics();
    let analyst = NewsAnalyst::new("Korean");
    let input = items(3);

    let report = analyst.analyze_all(&model, &parser, &input, options(3)).await;

    assert_eq!(report.windows, 1);
    assert!(report.warnings.is_empty());
    let links: Vec<&str> = report.items.iter().map(|i| i.source.link.as_str()).collect();
    assert_eq!(
        links,
        vec!["https://news.example/0", "https://news.example/1", "https://news.example/2"]
    );
    assert_eq!(report.items[1].display_title(), "번역 1");
    assert_eq!(report.items[1].source, input[1]);
    assert_eq!(model.requests()[0].context, "analysis_batch_1");
}

#[tokio::test]
async fn partial_reply_drops_unannotated_items() {
    let model = ScriptedModel::ok(&[analysis_reply(&[0, 2]).as_str()]);
    let parser = StructuredParser::without_diagnostics();
    let analyst = NewsAnalyst::new("Korean");
    let input = items(3);

    let report = analyst.analyze_all(&model, &parser, &input, options(3)).await;

    assert_eq!(report.items.len(), 2);
    assert!(report.items.iter().all(|i| i.is_enriched()));
    assert_eq!(report.items[0].source.link, input[0].link);
    assert_eq!(report.items[1].source.link, input[2].link);
    assert!(report.fallback_windows.is_empty());
    assert_eq!(
        report.warnings,
        vec![ReconciliationWarning::MissingIndex {
            window: 1,
            position: 1,
            title: "Story 1".to_string(),
        }]
    );
}

#[tokio::test]
async fn passthrough_policy_keeps_window_length() {
    let model = ScriptedModel::ok(&[analysis_reply(&[0, 2]).as_str()]);
    let parser = StructuredParser::without_diagnostics();
    let analyst = NewsAnalyst::new("Korean");
    let input = items(3);

    let report = analyst
        .analyze_all(
            &model,
            &parser,
            &input,
            options(3).with_partial_policy(PartialPolicy::Passthrough),
        )
        .await;

    assert_eq!(report.items.len(), 3);
    assert!(report.items[0].is_enriched());
    assert!(!report.items[1].is_enriched());
    assert_eq!(report.items[1].source, input[1]);
    assert!(report.items[2].is_enriched());
}

#[tokio::test]
async fn failed_window_falls_back_to_its_inputs() {
    let model = ScriptedModel::new(vec![
        Ok(analysis_reply(&[0, 1])),
        Err("quota exceeded".to_string()),
        Ok("I could not produce JSON today.".to_string()),
    ]);
    let parser = StructuredParser::without_diagnostics();
    let analyst = NewsAnalyst::new("Korean");
    let input = items(5);

    let report = analyst.analyze_all(&model, &parser, &input, options(2)).await;

    assert_eq!(report.windows, 3);
    assert_eq!(report.fallback_windows, vec![2, 3]);
    assert_eq!(report.items.len(), 5);
    assert!(report.items[0].is_enriched());
    assert!(report.items[1].is_enriched());
    for (item, source) in report.items[2..].iter().zip(&input[2..]) {
        assert!(!item.is_enriched());
        assert_eq!(&item.source, source);
    }

    let contexts: Vec<String> = model.requests().into_iter().map(|r| r.context).collect();
    assert_eq!(contexts, vec!["analysis_batch_1", "analysis_batch_2", "analysis_batch_3"]);
}

#[tokio::test]
async fn output_never_exceeds_input() {
    let parser = StructuredParser::without_diagnostics();
    let analyst = NewsAnalyst::new("Korean");

    for n in 0..7usize {
        for b in 1..4 {
            // Every window answers with its full range plus an out-of-range
            // and a duplicate entry.
            let windows = n.div_ceil(b);
            let replies: Vec<String> = (0..windows)
                .map(|w| {
                    let len = b.min(n - w * b);
                    let mut positions: Vec<usize> = (0..len).collect();
                    positions.push(len + 3);
                    positions.push(0);
                    analysis_reply(&positions)
                })
                .collect();
            let replies: Vec<&str> = replies.iter().map(String::as_str).collect();
            let model = ScriptedModel::ok(&replies);
            let input = items(n);

            let report = analyst.analyze_all(&model, &parser, &input, options(b)).await;

            assert_eq!(model.calls(), windows, "n={n} b={b}");
            assert!(report.items.len() <= n, "n={n} b={b}");
            assert_eq!(report.items.len(), n, "n={n} b={b}");
        }
    }
}

#[tokio::test]
async fn only_first_fenced_block_is_read() {
    let reply = format!(
        "Here you go:\n```json\n{}\n```\nAnd a second take:\n```json\n{}\n```",
        analysis_reply(&[0]),
        r#"[{"index": 1, "title_translated": "from second block"}]"#
    );
    let model = ScriptedModel::ok(&[&reply]);
    let parser = StructuredParser::without_diagnostics();
    let analyst = NewsAnalyst::new("Korean");
    let input = items(2);

    let report = analyst.analyze_all(&model, &parser, &input, options(2)).await;

    assert_eq!(report.items.len(), 1);
    assert_eq!(report.items[0].display_title(), "번역 0");
    assert!(report
        .items
        .iter()
        .all(|i| i.display_title() != "from second block"));
}

#[tokio::test]
async fn tolerant_syntax_is_accepted() {
    let reply = r#"```json
[
  // model commentary
  {index: 0, title_translated: '첫째', core_summary: "ok",},
]
```"#;
    let model = ScriptedModel::ok(&[reply]);
    let parser = StructuredParser::without_diagnostics();
    let analyst = NewsAnalyst::new("Korean");

    let report = analyst.analyze_all(&model, &parser, &items(1), options(1)).await;

    assert!(report.fallback_windows.is_empty());
    assert_eq!(report.items[0].display_title(), "첫째");
}

#[tokio::test]
async fn pacing_is_not_applied_after_last_window() {
    let parser = StructuredParser::without_diagnostics();
    let analyst = NewsAnalyst::new("Korean");
    let input = items(2);
    let model = ScriptedModel::ok(&[analysis_reply(&[0, 1]).as_str()]);

    let started = Instant::now();
    let processor = BatchProcessor::new(
        &model,
        &parser,
        &analyst,
        options(2).with_pacing(Duration::from_secs(5)),
    );
    let annotated = processor.process_all(&input).await;

    assert_eq!(annotated.len(), 2);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn pacing_separates_windows() {
    let parser = StructuredParser::without_diagnostics();
    let analyst = NewsAnalyst::new("Korean");
    let input = items(2);
    let model = ScriptedModel::ok(&[analysis_reply(&[0]).as_str(), analysis_reply(&[0]).as_str()]);

    let started = Instant::now();
    let report = analyst
        .analyze_all(
            &model,
            &parser,
            &input,
            options(1).with_pacing(Duration::from_millis(50)),
        )
        .await;

    assert_eq!(report.windows, 2);
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn parse_failures_are_written_to_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let parser = StructuredParser::new(shared::DiagnosticsSink::new(dir.path()));
    let analyst = NewsAnalyst::new("Korean");
    let model = ScriptedModel::ok(&["[{\"index\": 0, \"title_translated\": }]"]);

    let report = analyst.analyze_all(&model, &parser, &items(1), options(1)).await;

    assert_eq!(report.fallback_windows, vec![1]);
    let files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("json_parse_error_"));
    assert!(files[0].ends_with("analysis_batch_1.txt"));
}
