//! HTTP gateway against a local stub of the chat-completions endpoint.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use codex_core::config::ProvidersConfig;
use codex_core::models::ProviderProtocol;
use codex_core::providers::{
    HttpProviderGateway, ProviderCallRequest, ProviderConfig, ProviderError, ProviderGateway,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone, Default)]
struct Captured {
    requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

async fn chat_completions(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let overloaded = body["model"] == "overloaded";
    captured.requests.lock().push((auth, body));

    if overloaded {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "try later"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "choices": [{"message": {"role": "assistant", "content": "stub reply"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        })),
    )
}

async fn spawn_stub() -> (String, Captured) {
    let captured = Captured::default();
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(captured.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/v1"), captured)
}

fn config(base_url: &str, model: &str) -> ProviderConfig {
    ProviderConfig {
        provider_id: "stub".to_string(),
        provider_name: "Stub".to_string(),
        protocol: ProviderProtocol::OpenAiChat,
        base_url: base_url.to_string(),
        api_key: "sk-stub".to_string(),
        model: model.to_string(),
    }
}

#[tokio::test]
async fn test_openai_call_round_trips_through_http() {
    let (base_url, captured) = spawn_stub().await;
    let providers = ProvidersConfig {
        max_tokens: 777,
        ..ProvidersConfig::default()
    };
    let gateway = HttpProviderGateway::new(&providers).unwrap();

    let response = gateway
        .call(
            &ProviderCallRequest::new("be brief", "hello"),
            &config(&base_url, "gpt-4o"),
        )
        .await
        .unwrap();

    assert_eq!(response.content, "stub reply");
    assert_eq!(response.usage.prompt_tokens, 12);
    assert_eq!(response.usage.completion_tokens, 3);
    assert_eq!(response.provider, "stub");
    assert_eq!(response.model, "gpt-4o");

    let requests = captured.requests.lock().clone();
    assert_eq!(requests.len(), 1);
    let (auth, body) = &requests[0];
    assert_eq!(auth.as_deref(), Some("Bearer sk-stub"));
    assert_eq!(body["max_tokens"], 777);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "hello");
}

#[tokio::test]
async fn test_non_success_status_maps_to_http_error() {
    let (base_url, _captured) = spawn_stub().await;
    let gateway = HttpProviderGateway::new(&ProvidersConfig::default()).unwrap();

    let err = gateway
        .call(
            &ProviderCallRequest::new("", "hello").with_max_tokens(10),
            &config(&base_url, "overloaded"),
        )
        .await
        .unwrap_err();

    match err {
        ProviderError::Http { status, body, .. } => {
            assert_eq!(status, 503);
            assert!(body.contains("try later"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unreachable_provider_is_transport_error() {
    let gateway = HttpProviderGateway::new(&ProvidersConfig::default()).unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = gateway
        .call(
            &ProviderCallRequest::new("", "hello"),
            &config(&format!("http://{addr}/v1"), "gpt-4o"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Transport { .. }));
    assert!(!err.to_string().contains("sk-stub"));
}
