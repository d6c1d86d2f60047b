use feedlens_cli::mock_llm::{
    routes, start_mock_server, ChatMessage, ChatRequest, ChatResponse, MockLlmServer,
};
use std::sync::Arc;
use std::time::Duration;

fn chat(user: &str) -> ChatRequest {
    ChatRequest {
        model: "gpt-3.5-turbo".to_string(),
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: "Respond with JSON only.".to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: user.to_string(),
            },
        ],
        temperature: Some(0.2),
    }
}

#[tokio::test]
async fn test_classification_prompt_gets_labels_for_every_id() {
    let filter = routes(Arc::new(MockLlmServer::new(None)));
    let prompt = "Classify.\n\nComments:\n[{\"id\":\"a-0\",\"feedbackText\":\"Billing is too expensive\"},{\"id\":\"a-1\",\"feedbackText\":\"Great support agent\"}]";

    let resp = warp::test::request()
        .method("POST")
        .path("/v1/chat/completions")
        .json(&chat(prompt))
        .reply(&filter)
        .await;

    assert_eq!(resp.status(), 200);
    let body: ChatResponse = serde_json::from_slice(resp.body()).unwrap();
    let content = &body.choices[0].message.content;
    let json = content
        .trim_start_matches("```json")
        .trim_end_matches("```")
        .trim();
    let labels: Vec<serde_json::Value> = serde_json::from_str(json).unwrap();

    assert_eq!(labels.len(), 2);
    assert_eq!(labels[0]["id"], "a-0");
    assert_eq!(labels[0]["sentiment"], "negative");
    assert_eq!(labels[0]["topics"][0], "Billing");
    assert_eq!(labels[1]["sentiment"], "positive");
}

#[tokio::test]
async fn test_summary_prompt_names_urgent_issue() {
    let filter = routes(Arc::new(MockLlmServer::new(None)));
    let prompt = "Return {\"urgentIssue\": string, \"overallSentiment\": string}.\n\nFeedback:\n[{\"text\":\"so slow\",\"sentiment\":\"negative\"},{\"text\":\"love it\",\"sentiment\":\"positive\"}]";

    let resp = warp::test::request()
        .method("POST")
        .path("/v1/chat/completions")
        .json(&chat(prompt))
        .reply(&filter)
        .await;

    let body: ChatResponse = serde_json::from_slice(resp.body()).unwrap();
    let insights: serde_json::Value =
        serde_json::from_str(&body.choices[0].message.content).unwrap();
    assert_eq!(insights["urgentIssue"], "Performance");
    assert_eq!(insights["overallSentiment"], "Overall sentiment is 50% Positive.");
}

#[tokio::test]
async fn test_rate_limited_scenario_returns_429() {
    let filter = routes(Arc::new(MockLlmServer::new(Some("rate-limited".to_string()))));

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let resp = warp::test::request()
            .method("POST")
            .path("/v1/chat/completions")
            .json(&chat("Comments:\n[]"))
            .reply(&filter)
            .await;
        statuses.push(resp.status().as_u16());
    }

    assert_eq!(statuses[0], 200);
    assert!(statuses[1..].contains(&429));
}

#[tokio::test]
async fn test_health_route() {
    let filter = routes(Arc::new(MockLlmServer::new(None)));
    let resp = warp::test::request().path("/health").reply(&filter).await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_served_over_http() {
    let port = 3107;
    let server_handle = tokio::spawn(async move {
        start_mock_server(port, Some("flaky".to_string())).await.unwrap();
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(300)).await;

    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/v1/chat/completions", port);
    let prompt = "Comments:\n[{\"id\":\"h-0\",\"feedbackText\":\"The mobile app crashes\"}]";

    let mut statuses = Vec::new();
    let mut first: Option<ChatResponse> = None;
    for _ in 0..3 {
        let resp = client
            .post(&url)
            .header("authorization", "Bearer test-key")
            .json(&chat(prompt))
            .send()
            .await
            .unwrap();
        statuses.push(resp.status().as_u16());
        if first.is_none() {
            first = Some(resp.json().await.unwrap());
        }
    }

    assert_eq!(statuses, vec![200, 200, 503]);
    let content = &first.unwrap().choices[0].message.content;
    assert!(content.contains("\"h-0\""));
    assert!(content.contains("Mobile App"));

    let health = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), 200);

    server_handle.abort();
}
