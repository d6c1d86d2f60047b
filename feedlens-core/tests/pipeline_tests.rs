use async_trait::async_trait;
use feedlens_core::progress::{RecordingSink, RunPhase};
use feedlens_core::report::StoredReport;
use feedlens_core::{
    parse_csv_text, ClassificationRequest, ClassifiedItem, ColumnMapping, FailureKind,
    FeedbackAnalyzer, FeedbackClassifier, FeedbackError, InsightSummarizer, KeyInsights,
    ProgressEvent, Result, Sentiment,
};
use feedlens_core::orchestrator::OrchestratorConfig;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Labels by keyword; fails any batch containing one of `failing_ids`.
#[derive(Default)]
struct KeywordClassifier {
    failing_ids: HashSet<String>,
    calls: AtomicUsize,
}

impl KeywordClassifier {
    fn failing(ids: &[&str]) -> Self {
        Self {
            failing_ids: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl FeedbackClassifier for KeywordClassifier {
    async fn classify_batch(&self, batch: &[ClassificationRequest]) -> Result<Vec<ClassifiedItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if batch
            .iter()
            .any(|r| self.failing_ids.contains(&r.feedback_text))
        {
            return Err(FeedbackError::LlmApi(
                "API error 429 Too Many Requests: rate limit".into(),
            ));
        }
        Ok(batch
            .iter()
            .map(|r| {
                let (sentiment, topic) = if r.feedback_text.contains("slow") {
                    (Sentiment::Negative, "Performance")
                } else if r.feedback_text.contains("love") {
                    (Sentiment::Positive, "UI/UX")
                } else {
                    (Sentiment::Neutral, "General")
                };
                ClassifiedItem {
                    id: r.id.clone(),
                    sentiment,
                    topics: vec![topic.to_string()],
                }
            })
            .collect())
    }
}

#[derive(Default)]
struct CountingSummarizer {
    calls: AtomicUsize,
}

#[async_trait]
impl InsightSummarizer for CountingSummarizer {
    async fn summarize(&self, _feedback_data: &str) -> Result<KeyInsights> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(KeyInsights {
            urgent_issue: "Performance".into(),
            overall_sentiment: "Overall sentiment is mixed.".into(),
        })
    }
}

fn csv_with_rows(n: usize, dated: bool) -> String {
    let mut csv = String::from(if dated { "comment,date\n" } else { "comment\n" });
    for i in 0..n {
        let text = match i % 3 {
            0 => format!("row {} is slow", i),
            1 => format!("row {} I love it", i),
            _ => format!("row {} fine", i),
        };
        if dated {
            csv.push_str(&format!("\"{}\",2024-03-0{}\n", text, 1 + i % 2));
        } else {
            csv.push_str(&format!("\"{}\"\n", text));
        }
    }
    csv
}

#[tokio::test]
async fn test_failed_middle_batch_keeps_every_row() {
    let parsed = parse_csv_text(&csv_with_rows(32, false), b',').unwrap();
    let failing = parsed.rows[20]["comment"].clone();
    let classifier = Arc::new(KeywordClassifier::failing(&[failing.as_str()]));
    let summarizer = Arc::new(CountingSummarizer::default());
    let analyzer = FeedbackAnalyzer::new(
        Arc::clone(&classifier),
        Arc::clone(&summarizer),
        OrchestratorConfig::default(),
    );
    let sink = RecordingSink::new();

    let outcome = analyzer
        .analyze(&parsed, &ColumnMapping::new("comment"), &sink)
        .await
        .unwrap();

    assert_eq!(classifier.calls.load(Ordering::SeqCst), 3);
    assert_eq!(outcome.summary.failed_batches, vec![2]);
    assert_eq!(outcome.summary.labeled_units, 17);
    assert_eq!(outcome.report.labeled_count(), 17);

    let items = &outcome.report.feedback_items;
    assert_eq!(items.len(), 32);
    let indices: Vec<usize> = items.iter().map(|u| u.original_index).collect();
    assert_eq!(indices, (0..32).collect::<Vec<_>>());
    assert!(items[15..30].iter().all(|u| !u.is_labeled() && u.topics.is_none()));

    let notice = &outcome.summary.notices[0];
    assert_eq!(notice.kind, FailureKind::Capacity);
    assert!(notice.message.contains("Batch 2 of 3"));
    assert_eq!(sink.notices().len(), 1);

    // Summary still ran over the 17 labeled rows
    assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
    assert!(outcome.report.key_insights.is_some());
}

#[tokio::test]
async fn test_phases_and_progress_order() {
    let parsed = parse_csv_text(&csv_with_rows(20, true), b',').unwrap();
    let analyzer = FeedbackAnalyzer::new(
        KeywordClassifier::default(),
        CountingSummarizer::default(),
        OrchestratorConfig::default(),
    );
    let sink = RecordingSink::new();

    let outcome = analyzer
        .analyze(
            &parsed,
            &ColumnMapping::new("comment").with_timestamp("date"),
            &sink,
        )
        .await
        .unwrap();

    let phases: Vec<RunPhase> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ProgressEvent::Phase { phase } => Some(phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            RunPhase::Classifying,
            RunPhase::Summarizing,
            RunPhase::Aggregating,
            RunPhase::Complete
        ]
    );
    let attempted: Vec<usize> = sink.progress_points().iter().map(|p| p.attempted).collect();
    assert_eq!(attempted, vec![15, 20]);

    let keys: Vec<&str> = outcome
        .report
        .sentiment_over_time
        .iter()
        .map(|p| p.bucket_key.as_str())
        .collect();
    assert_eq!(keys, vec!["2024-03-01", "2024-03-02"]);
    assert!(outcome.summary.is_complete());
}

#[tokio::test]
async fn test_all_batches_failing_skips_summary() {
    let parsed = parse_csv_text("comment\nslow\nlove\n", b',').unwrap();
    let summarizer = Arc::new(CountingSummarizer::default());
    let analyzer = FeedbackAnalyzer::new(
        KeywordClassifier::failing(&["slow"]),
        Arc::clone(&summarizer),
        OrchestratorConfig::default(),
    );

    let outcome = analyzer
        .analyze(&parsed, &ColumnMapping::new("comment"), &())
        .await
        .unwrap();

    assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
    assert!(outcome.report.key_insights.is_none());
    assert!(outcome.report.sentiment_over_time.is_empty());
    assert!(outcome.report.topic_distribution.is_empty());
    assert_eq!(outcome.summary.unprocessed_units, 2);
}

#[tokio::test]
async fn test_unknown_column_is_input_error() {
    let parsed = parse_csv_text("comment\nhello\n", b',').unwrap();
    let analyzer = FeedbackAnalyzer::new(
        KeywordClassifier::default(),
        CountingSummarizer::default(),
        OrchestratorConfig::default(),
    );

    let err = analyzer
        .analyze(&parsed, &ColumnMapping::new("text"), &())
        .await
        .unwrap_err();
    assert!(matches!(err, FeedbackError::InvalidMapping(ref c) if c == "text"));
    assert!(err.is_input_error());
}

/// Blocks the first call until released, to model a response arriving after reset.
struct GatedClassifier {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl FeedbackClassifier for GatedClassifier {
    async fn classify_batch(&self, batch: &[ClassificationRequest]) -> Result<Vec<ClassifiedItem>> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(batch
            .iter()
            .map(|r| ClassifiedItem {
                id: r.id.clone(),
                sentiment: Sentiment::Positive,
                topics: vec![],
            })
            .collect())
    }
}

#[tokio::test]
async fn test_late_response_after_reset_is_discarded() {
    let parsed = Arc::new(parse_csv_text("comment\na\nb\n", b',').unwrap());
    let classifier = Arc::new(GatedClassifier {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let analyzer = Arc::new(FeedbackAnalyzer::new(
        Arc::clone(&classifier),
        CountingSummarizer::default(),
        OrchestratorConfig::default(),
    ));
    let sink = Arc::new(RecordingSink::new());

    let run = {
        let analyzer = Arc::clone(&analyzer);
        let parsed = Arc::clone(&parsed);
        let sink = Arc::clone(&sink);
        tokio::spawn(async move {
            analyzer
                .analyze(&parsed, &ColumnMapping::new("comment"), sink.as_ref())
                .await
        })
    };

    classifier.entered.notified().await;
    analyzer.reset();
    classifier.release.notify_one();

    let result = run.await.unwrap();
    assert!(matches!(result, Err(FeedbackError::RunReset(1))));
    assert!(sink.progress_points().is_empty());
}

#[tokio::test]
async fn test_report_survives_storage_form() {
    let parsed = parse_csv_text(&csv_with_rows(6, true), b',').unwrap();
    let analyzer = FeedbackAnalyzer::new(
        KeywordClassifier::default(),
        CountingSummarizer::default(),
        OrchestratorConfig::default(),
    );
    let outcome = analyzer
        .analyze(
            &parsed,
            &ColumnMapping::new("comment").with_timestamp("date"),
            &(),
        )
        .await
        .unwrap();

    let stored = StoredReport::from_report(&outcome.report);
    let json = serde_json::to_value(&stored).unwrap();
    assert_eq!(json["feedbackItems"][0]["timestamp"], "2024-03-01T00:00:00.000Z");
    assert_eq!(stored.to_report().unwrap(), outcome.report);
}
