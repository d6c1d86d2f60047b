//! Read-model projections over labeled units

use crate::models::{
    AnalysisUnit, SentimentCounts, SentimentDataPoint, TopicSentimentDistribution,
    OVERALL_BUCKET,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Topics shown by the dashboard's topic explorer
pub const DEFAULT_TOP_TOPICS: usize = 10;

/// Sentiment counts per UTC calendar date, ascending. When no labeled unit carries a
/// timestamp the series is a single "Overall" bucket instead; the two modes never mix.
/// No labeled units at all yields an empty series.
pub fn sentiment_over_time(units: &[AnalysisUnit]) -> Vec<SentimentDataPoint> {
    let mut by_date: BTreeMap<NaiveDate, SentimentCounts> = BTreeMap::new();
    let mut overall: Option<SentimentCounts> = None;

    for unit in units {
        let Some(sentiment) = unit.sentiment else {
            continue;
        };
        match unit.timestamp {
            Some(ts) => by_date.entry(ts.date_naive()).or_default().increment(sentiment),
            None => overall.get_or_insert_with(SentimentCounts::default).increment(sentiment),
        }
    }

    if !by_date.is_empty() {
        return by_date
            .into_iter()
            .map(|(date, counts)| {
                SentimentDataPoint::from_counts(date.format("%Y-%m-%d").to_string(), counts)
            })
            .collect();
    }

    overall
        .map(|counts| vec![SentimentDataPoint::from_counts(OVERALL_BUCKET, counts)])
        .unwrap_or_default()
}

/// One entry per topic seen in any unit's topic list, sorted by total descending then by
/// name. `total` counts every occurrence; the sentiment counters only count labeled units.
pub fn topic_distribution(units: &[AnalysisUnit]) -> Vec<TopicSentimentDistribution> {
    let mut by_topic: HashMap<&str, (SentimentCounts, u64)> = HashMap::new();

    for unit in units {
        let Some(topics) = &unit.topics else {
            continue;
        };
        for topic in topics {
            let entry = by_topic.entry(topic.as_str()).or_default();
            if let Some(sentiment) = unit.sentiment {
                entry.0.increment(sentiment);
            }
            entry.1 += 1;
        }
    }

    let mut distribution: Vec<TopicSentimentDistribution> = by_topic
        .into_iter()
        .map(|(topic, (counts, total))| TopicSentimentDistribution {
            topic: topic.to_string(),
            positive: counts.positive,
            negative: counts.negative,
            neutral: counts.neutral,
            total,
        })
        .collect();
    sort_by_total(&mut distribution);
    distribution
}

fn sort_by_total(distribution: &mut [TopicSentimentDistribution]) {
    distribution.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.topic.cmp(&b.topic)));
}

/// Highest-volume `n` topics. Presentation helper; the stored distribution is never truncated.
pub fn top_topics(
    distribution: &[TopicSentimentDistribution],
    n: usize,
) -> Vec<TopicSentimentDistribution> {
    let mut sorted = distribution.to_vec();
    sort_by_total(&mut sorted);
    sorted.truncate(n);
    sorted
}

/// Units whose topic list contains `topic`.
pub fn filter_by_topic<'a>(units: &'a [AnalysisUnit], topic: &str) -> Vec<&'a AnalysisUnit> {
    units
        .iter()
        .filter(|u| {
            u.topics
                .as_ref()
                .is_some_and(|topics| topics.iter().any(|t| t == topic))
        })
        .collect()
}

/// Overall sentiment split of the labeled units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentBreakdown {
    pub counts: SentimentCounts,
    pub positive_pct: u8,
    pub negative_pct: u8,
    pub neutral_pct: u8,
}

impl SentimentBreakdown {
    pub fn from_units(units: &[AnalysisUnit]) -> Self {
        let mut counts = SentimentCounts::default();
        for sentiment in units.iter().filter_map(|u| u.sentiment) {
            counts.increment(sentiment);
        }

        let total = counts.total();
        let pct = |n: u64| -> u8 {
            if total == 0 {
                0
            } else {
                ((n as f64 / total as f64) * 100.0).round() as u8
            }
        };

        Self {
            counts,
            positive_pct: pct(counts.positive),
            negative_pct: pct(counts.negative),
            neutral_pct: pct(counts.neutral),
        }
    }
}
