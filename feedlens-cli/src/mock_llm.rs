//! Offline stand-in for the chat-completions endpoint.
//!
//! Understands the two prompts the Feedlens client sends: a batch classification
//! prompt ending in a `Comments:` JSON array, and an insight prompt ending in a
//! `Feedback:` JSON array. Scenarios inject capacity failures for exercising the
//! notice paths without a real provider.

use anyhow::Result;
use governor::{DefaultDirectRateLimiter, Quota};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::info;
use uuid::Uuid;
use warp::Filter;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioType {
    /// Every call succeeds
    Classify,
    /// Every third call fails with 503
    Flaky,
    /// One call per second; the rest get 429
    RateLimited,
}

impl ScenarioType {
    pub fn parse(s: &str) -> Self {
        match s {
            "flaky" => ScenarioType::Flaky,
            "rate-limited" => ScenarioType::RateLimited,
            _ => ScenarioType::Classify,
        }
    }
}

#[derive(Deserialize)]
struct CommentIn {
    id: String,
    #[serde(rename = "feedbackText")]
    feedback_text: String,
}

#[derive(Deserialize)]
struct SummaryIn {
    text: String,
    sentiment: String,
}

/// Keyword heuristic: (sentiment, topics).
pub fn label(text: &str) -> (&'static str, Vec<&'static str>) {
    let lower = text.to_lowercase();
    let sentiment = if ["love", "great", "excellent", "easy", "fast"]
        .iter()
        .any(|w| lower.contains(w))
    {
        "positive"
    } else if ["slow", "crash", "bug", "broken", "expensive", "hate", "confusing"]
        .iter()
        .any(|w| lower.contains(w))
    {
        "negative"
    } else {
        "neutral"
    };

    let mut topics = Vec::new();
    let rules: [(&[&str], &str); 6] = [
        (&["slow", "fast", "load", "lag"], "Performance"),
        (&["price", "bill", "charge", "expensive"], "Billing"),
        (&["support", "agent", "help"], "Customer Support"),
        (&["app", "mobile", "phone"], "Mobile App"),
        (&["api", "endpoint", "integration"], "API"),
        (&["ui", "design", "button", "confusing", "layout"], "UI/UX"),
    ];
    for (words, topic) in rules {
        if words.iter().any(|w| lower.contains(w)) {
            topics.push(topic);
        }
    }
    if topics.is_empty() {
        topics.push("General");
    }
    (sentiment, topics)
}

fn json_after<'a>(content: &'a str, marker: &str) -> &'a str {
    content
        .rfind(marker)
        .map(|i| content[i + marker.len()..].trim())
        .unwrap_or("[]")
}

pub struct MockLlmServer {
    scenario: ScenarioType,
    latency_range: (u64, u64),
    requests: AtomicU64,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

#[derive(Debug)]
struct RateLimitError;
impl warp::reject::Reject for RateLimitError {}

#[derive(Debug)]
struct UnavailableError;
impl warp::reject::Reject for UnavailableError {}

impl MockLlmServer {
    pub fn new(scenario: Option<String>) -> Self {
        let scenario = scenario
            .as_deref()
            .map(ScenarioType::parse)
            .unwrap_or(ScenarioType::Classify);

        let quota = Quota::per_second(NonZeroU32::MIN);
        let rate_limiter = Arc::new(governor::RateLimiter::direct(quota));

        Self {
            scenario,
            latency_range: (5, 40),
            requests: AtomicU64::new(0),
            rate_limiter,
        }
    }

    pub fn scenario(&self) -> ScenarioType {
        self.scenario
    }

    pub async fn process_chat_request(&self, request: ChatRequest) -> Result<ChatResponse, warp::Rejection> {
        let start_time = Instant::now();
        let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;

        match self.scenario {
            ScenarioType::RateLimited if self.rate_limiter.check().is_err() => {
                return Err(warp::reject::custom(RateLimitError));
            }
            ScenarioType::Flaky if n % 3 == 0 => {
                return Err(warp::reject::custom(UnavailableError));
            }
            _ => {}
        }

        let (min, max) = self.latency_range;
        sleep(Duration::from_millis(min + rand::random::<u64>() % (max - min))).await;

        let user_content = request
            .messages
            .iter()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("");

        let content = if user_content.contains("urgentIssue") {
            self.generate_insights(user_content)
        } else {
            self.generate_labels(user_content)
        };

        info!(
            "Mock response #{} in {:?} ({:?})",
            n,
            start_time.elapsed(),
            self.scenario
        );

        Ok(ChatResponse {
            id: format!("chatcmpl-{}", Uuid::new_v4()),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp() as u64,
            model: request.model,
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content,
                },
                finish_reason: "stop".to_string(),
            }],
        })
    }

    /// Fenced like real model output.
    fn generate_labels(&self, content: &str) -> String {
        let comments: Vec<CommentIn> =
            serde_json::from_str(json_after(content, "Comments:")).unwrap_or_default();
        let labels: Vec<_> = comments
            .iter()
            .map(|c| {
                let (sentiment, topics) = label(&c.feedback_text);
                serde_json::json!({"id": c.id, "sentiment": sentiment, "topics": topics})
            })
            .collect();
        format!(
            "```json\n{}\n```",
            serde_json::Value::Array(labels)
        )
    }

    fn generate_insights(&self, content: &str) -> String {
        let feedback: Vec<SummaryIn> =
            serde_json::from_str(json_after(content, "Feedback:")).unwrap_or_default();

        let mut negative_topics: HashMap<&str, usize> = HashMap::new();
        let mut positive = 0usize;
        for item in &feedback {
            match item.sentiment.as_str() {
                "positive" => positive += 1,
                "negative" => {
                    for topic in label(&item.text).1 {
                        *negative_topics.entry(topic).or_default() += 1;
                    }
                }
                _ => {}
            }
        }

        let urgent = negative_topics
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(topic, _)| topic)
            .unwrap_or("None");
        let pct = if feedback.is_empty() {
            0
        } else {
            positive * 100 / feedback.len()
        };

        serde_json::json!({
            "urgentIssue": urgent,
            "overallSentiment": format!("Overall sentiment is {}% Positive.", pct),
        })
        .to_string()
    }
}

pub fn routes(
    mock_server: Arc<MockLlmServer>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible> + Clone {
    let chat_route = warp::path!("v1" / "chat" / "completions")
        .and(warp::post())
        .and(warp::body::json())
        .and(warp::any().map(move || mock_server.clone()))
        .and_then(handle_chat_request);

    let health_route = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", warp::http::StatusCode::OK));

    chat_route.or(health_route).recover(handle_rejection)
}

pub async fn start_mock_server(port: u16, scenario: Option<String>) -> Result<()> {
    info!("Starting mock LLM server on port {} with scenario {:?}", port, scenario);

    let mock_server = Arc::new(MockLlmServer::new(scenario));

    info!(
        "Mock LLM server ready at http://localhost:{}/v1/chat/completions",
        port
    );
    warp::serve(routes(mock_server))
        .run(([127, 0, 0, 1], port))
        .await;

    Ok(())
}

async fn handle_chat_request(
    request: ChatRequest,
    server: Arc<MockLlmServer>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let response = server.process_chat_request(request).await?;
    Ok(warp::reply::json(&response))
}

async fn handle_rejection(err: warp::Rejection) -> Result<impl warp::Reply, std::convert::Infallible> {
    let (status, kind, message) = if err.find::<RateLimitError>().is_some() {
        (
            warp::http::StatusCode::TOO_MANY_REQUESTS,
            "rate_limit_exceeded",
            "Rate limit exceeded. Please try again later.",
        )
    } else if err.find::<UnavailableError>().is_some() {
        (
            warp::http::StatusCode::SERVICE_UNAVAILABLE,
            "service_unavailable",
            "The model is overloaded. Please try again later.",
        )
    } else if err.is_not_found() {
        (warp::http::StatusCode::NOT_FOUND, "not_found", "Unknown route")
    } else {
        (
            warp::http::StatusCode::BAD_REQUEST,
            "invalid_request",
            "Request could not be processed",
        )
    };

    let response = serde_json::json!({
        "error": {"type": kind, "message": message}
    });
    Ok(warp::reply::with_status(warp::reply::json(&response), status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_labels() {
        assert_eq!(label("The app is so slow"), ("negative", vec!["Performance", "Mobile App"]));
        assert_eq!(label("Love the new design"), ("positive", vec!["UI/UX"]));
        assert_eq!(label("ok I guess"), ("neutral", vec!["General"]));
    }

    #[tokio::test]
    async fn test_classify_prompt_roundtrip() {
        let server = MockLlmServer::new(None);
        let request = ChatRequest {
            model: "gpt-3.5-turbo".into(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: "Classify...\n\nComments:\n[{\"id\":\"r-0\",\"feedbackText\":\"too slow\"}]"
                    .into(),
            }],
            temperature: None,
        };
        let response = server.process_chat_request(request).await.unwrap();
        let content = &response.choices[0].message.content;
        assert!(content.starts_with("```json"));
        assert!(content.contains("\"id\":\"r-0\""));
        assert!(content.contains("\"negative\""));
    }

    #[tokio::test]
    async fn test_flaky_fails_every_third_call() {
        let server = MockLlmServer::new(Some("flaky".into()));
        let request = ChatRequest {
            model: "m".into(),
            messages: vec![],
            temperature: None,
        };
        assert!(server.process_chat_request(request.clone()).await.is_ok());
        assert!(server.process_chat_request(request.clone()).await.is_ok());
        assert!(server.process_chat_request(request).await.is_err());
    }
}
