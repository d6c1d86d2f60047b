//! Side-by-side comparison of two reports

use crate::models::{ProcessedReport, Sentiment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PercentChange {
    /// Previous value was zero, current is not
    New,
    Unchanged,
    Percent(i64),
}

impl PercentChange {
    pub fn between(current: u64, previous: u64) -> Self {
        match (current, previous) {
            (0, 0) => PercentChange::Unchanged,
            (_, 0) => PercentChange::New,
            (cur, prev) => {
                let pct = (cur as f64 - prev as f64) / prev as f64 * 100.0;
                PercentChange::Percent(pct.round() as i64)
            }
        }
    }
}

impl std::fmt::Display for PercentChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PercentChange::New => write!(f, "new"),
            PercentChange::Unchanged => write!(f, "0%"),
            PercentChange::Percent(p) if *p > 0 => write!(f, "+{}%", p),
            PercentChange::Percent(p) => write!(f, "{}%", p),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub metric: String,
    pub current: u64,
    pub previous: u64,
    pub change: i64,
    pub percent_change: PercentChange,
    /// Whether an increase is an improvement
    pub positive_is_good: bool,
}

impl MetricDelta {
    fn new(metric: &str, current: u64, previous: u64, positive_is_good: bool) -> Self {
        Self {
            metric: metric.to_string(),
            current,
            previous,
            change: current as i64 - previous as i64,
            percent_change: PercentChange::between(current, previous),
            positive_is_good,
        }
    }

    pub fn improved(&self) -> bool {
        match self.change.signum() {
            0 => false,
            1 => self.positive_is_good,
            _ => !self.positive_is_good,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportComparison {
    pub metrics: Vec<MetricDelta>,
}

impl ReportComparison {
    pub fn metric(&self, name: &str) -> Option<&MetricDelta> {
        self.metrics.iter().find(|m| m.metric == name)
    }
}

fn count(report: &ProcessedReport, sentiment: Sentiment) -> u64 {
    report
        .feedback_items
        .iter()
        .filter(|u| u.sentiment == Some(sentiment))
        .count() as u64
}

pub fn compare(current: &ProcessedReport, previous: &ProcessedReport) -> ReportComparison {
    ReportComparison {
        metrics: vec![
            MetricDelta::new(
                "total_feedback",
                current.feedback_items.len() as u64,
                previous.feedback_items.len() as u64,
                true,
            ),
            MetricDelta::new(
                "positive",
                count(current, Sentiment::Positive),
                count(previous, Sentiment::Positive),
                true,
            ),
            MetricDelta::new(
                "negative",
                count(current, Sentiment::Negative),
                count(previous, Sentiment::Negative),
                false,
            ),
            MetricDelta::new(
                "neutral",
                count(current, Sentiment::Neutral),
                count(previous, Sentiment::Neutral),
                true,
            ),
            MetricDelta::new(
                "labeled",
                current.labeled_count() as u64,
                previous.labeled_count() as u64,
                true,
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisUnit, RawRow};
    use crate::report::build_report;

    fn report(sentiments: &[Option<Sentiment>]) -> ProcessedReport {
        let units = sentiments
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let mut unit = AnalysisUnit {
                    id: i.to_string(),
                    original_index: i,
                    full_data: RawRow::new(),
                    feedback_text: "t".into(),
                    timestamp: None,
                    sentiment: None,
                    sentiment_score: None,
                    topics: None,
                };
                if let Some(s) = s {
                    unit.apply_label(*s, vec![]);
                }
                unit
            })
            .collect();
        build_report(units, None)
    }

    #[test]
    fn test_percent_change_rules() {
        assert_eq!(PercentChange::between(0, 0), PercentChange::Unchanged);
        assert_eq!(PercentChange::between(4, 0), PercentChange::New);
        assert_eq!(PercentChange::between(3, 4), PercentChange::Percent(-25));
        assert_eq!(PercentChange::between(5, 3), PercentChange::Percent(67));
        assert_eq!(PercentChange::Percent(67).to_string(), "+67%");
    }

    #[test]
    fn test_compare_reports() {
        let previous = report(&[Some(Sentiment::Negative), Some(Sentiment::Negative), None]);
        let current = report(&[
            Some(Sentiment::Negative),
            Some(Sentiment::Positive),
            Some(Sentiment::Positive),
            Some(Sentiment::Neutral),
        ]);

        let cmp = compare(&current, &previous);
        let negative = cmp.metric("negative").unwrap();
        assert_eq!(negative.change, -1);
        assert_eq!(negative.percent_change, PercentChange::Percent(-50));
        assert!(negative.improved());

        assert_eq!(cmp.metric("positive").unwrap().percent_change, PercentChange::New);
        assert_eq!(cmp.metric("labeled").unwrap().change, 2);
        assert_eq!(cmp.metric("total_feedback").unwrap().current, 4);
    }
}
