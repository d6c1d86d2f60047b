//! Chat-completions client backing both the batch classifier and the insight summarizer

use crate::classifier::{
    ClassificationRequest, ClassifiedItem, FeedbackClassifier, InsightSummarizer,
};
use crate::config::LlmSettings;
use crate::errors::FailureKind;
use crate::models::{is_allowed_topic, KeyInsights, Sentiment, ALLOWED_TOPICS};
use crate::{FeedbackError, Result};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for the LLM client
#[derive(Debug, Clone)]
pub struct LlmBatchConfig {
    /// API endpoint URL
    pub endpoint: String,
    /// API key, sent as a bearer token when present
    pub api_key: Option<String>,
    /// Model to use
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
    /// Rate limit (requests per second)
    pub rate_limit: Option<f32>,
    /// Total time spent retrying a rate-limited call before giving up
    pub max_retry: Duration,
    pub temperature: f32,
}

impl Default for LlmBatchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            model: "gpt-3.5-turbo".to_string(),
            timeout: Duration::from_secs(30),
            rate_limit: Some(3.0),
            max_retry: Duration::from_secs(60),
            temperature: 0.2,
        }
    }
}

impl From<&LlmSettings> for LlmBatchConfig {
    fn from(settings: &LlmSettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
            model: settings.model.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
            rate_limit: Some(settings.rate_limit as f32),
            max_retry: Duration::from_secs(settings.max_retry_secs),
            ..Default::default()
        }
    }
}

/// Minimum spacing between requests
struct RateLimiter {
    rate: f32,
    last_request: Option<tokio::time::Instant>,
}

impl RateLimiter {
    fn new(rate: f32) -> Self {
        Self {
            rate,
            last_request: None,
        }
    }

    async fn wait_if_needed(&mut self) {
        let min_interval = Duration::from_secs_f32(1.0 / self.rate);
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < min_interval {
                sleep(min_interval - elapsed).await;
            }
        }
        self.last_request = Some(tokio::time::Instant::now());
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

const CLASSIFY_SYSTEM_PROMPT: &str = "You are an expert data analyst specializing in customer feedback for a SaaS company. Respond with JSON only.";

const SUMMARY_SYSTEM_PROMPT: &str =
    "You are an expert UX researcher. Respond with a single JSON object only.";

fn classify_prompt(batch_json: &str) -> String {
    let topics = ALLOWED_TOPICS
        .iter()
        .map(|t| format!("\"{}\"", t))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "For each comment in the batch below:\n\
         1. Classify the sentiment as exactly one of \"positive\", \"negative\" or \"neutral\".\n\
         2. Assign one or more topics from this list only: [{}]. Do not invent topics; use an empty array if none apply.\n\n\
         Return a JSON array with one object per comment, each with the original \"id\", the \"sentiment\" string and a \"topics\" array.\n\n\
         Comments:\n{}",
        topics, batch_json
    )
}

fn summary_prompt(feedback_data: &str) -> String {
    format!(
        "The input is a JSON array of objects with a \"text\" comment and its \"sentiment\".\n\
         Identify the topic with the highest volume of negative feedback and return it as \"urgentIssue\". \
         Summarize the overall sentiment as \"overallSentiment\", for example \"Overall sentiment is 75% Positive.\".\n\
         Return {{\"urgentIssue\": string, \"overallSentiment\": string}}.\n\n\
         Feedback:\n{}",
        feedback_data
    )
}

/// Remove a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Turn classifier output into items. Entries with a missing id or an unknown sentiment
/// are dropped; topics outside the vocabulary are removed.
pub fn parse_classification(content: &str) -> Result<Vec<ClassifiedItem>> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| FeedbackError::LlmApi(format!("Failed to parse LLM response: {}", e)))?;

    let entries = match value {
        serde_json::Value::Array(entries) => entries,
        // Some models wrap the array in an object
        serde_json::Value::Object(map) => map
            .into_iter()
            .find_map(|(_, v)| match v {
                serde_json::Value::Array(entries) => Some(entries),
                _ => None,
            })
            .ok_or_else(|| FeedbackError::LlmApi("LLM response contains no array".to_string()))?,
        _ => {
            return Err(FeedbackError::LlmApi(
                "LLM response is not a JSON array".to_string(),
            ))
        }
    };

    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(id) = entry.get("id").and_then(|v| v.as_str()) else {
            debug!("Dropping classification without id");
            continue;
        };
        let sentiment = match entry
            .get("sentiment")
            .and_then(|v| v.as_str())
            .map(str::parse::<Sentiment>)
        {
            Some(Ok(sentiment)) => sentiment,
            _ => {
                debug!("Dropping classification for {} with invalid sentiment", id);
                continue;
            }
        };
        let topics = entry
            .get("topics")
            .and_then(|v| v.as_array())
            .map(|topics| {
                topics
                    .iter()
                    .filter_map(|t| t.as_str())
                    .filter(|t| is_allowed_topic(t))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        items.push(ClassifiedItem {
            id: id.to_string(),
            sentiment,
            topics,
        });
    }
    Ok(items)
}

pub fn parse_insights(content: &str) -> Result<KeyInsights> {
    serde_json::from_str(strip_code_fence(content))
        .map_err(|e| FeedbackError::LlmApi(format!("Failed to parse key insights: {}", e)))
}

/// LLM client shared by classification and summarization
#[derive(Clone)]
pub struct BatchLlmClient {
    client: Client,
    config: LlmBatchConfig,
    rate_limiter: Option<Arc<tokio::sync::Mutex<RateLimiter>>>,
}

impl BatchLlmClient {
    pub fn new(config: LlmBatchConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        let rate_limiter = config
            .rate_limit
            .filter(|rate| *rate > 0.0)
            .map(|rate| Arc::new(tokio::sync::Mutex::new(RateLimiter::new(rate))));

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    pub fn config(&self) -> &LlmBatchConfig {
        &self.config
    }

    /// One chat round-trip, retried with exponential backoff while the failure looks
    /// like rate limiting or unavailability. Returns the first choice's content.
    async fn complete(&self, system: &str, user: String) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user,
                },
            ],
            temperature: self.config.temperature,
        };

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.config.max_retry),
            ..Default::default()
        };

        let response = retry(backoff, || async {
            if let Some(ref rate_limiter) = self.rate_limiter {
                rate_limiter.lock().await.wait_if_needed().await;
            }
            self.make_api_call(&request).await.map_err(|e| {
                if e.failure_kind() == FailureKind::Capacity {
                    warn!("LLM call limited, will retry: {}", e);
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| FeedbackError::LlmApi("No response from LLM".to_string()))
    }

    async fn make_api_call(&self, request: &ChatRequest) -> Result<ChatResponse> {
        debug!("Making LLM API call to {}", self.config.endpoint);

        let mut builder = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .json(request);
        if let Some(ref key) = self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FeedbackError::LlmApi(format!(
                "API error {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl FeedbackClassifier for BatchLlmClient {
    async fn classify_batch(&self, batch: &[ClassificationRequest]) -> Result<Vec<ClassifiedItem>> {
        let batch_json = serde_json::to_string(batch)?;
        let content = self
            .complete(CLASSIFY_SYSTEM_PROMPT, classify_prompt(&batch_json))
            .await?;
        let items = parse_classification(&content)?;
        if items.len() < batch.len() {
            debug!(
                "Classifier returned {} usable items for {} submitted",
                items.len(),
                batch.len()
            );
        }
        Ok(items)
    }
}

#[async_trait]
impl InsightSummarizer for BatchLlmClient {
    async fn summarize(&self, feedback_data: &str) -> Result<KeyInsights> {
        let content = self
            .complete(SUMMARY_SYSTEM_PROMPT, summary_prompt(feedback_data))
            .await?;
        parse_insights(&content)
    }
}
