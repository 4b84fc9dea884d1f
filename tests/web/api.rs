//! HTTP surface exercised in-process through the router.

use crate::common::fakes::ScriptedGateway;
use crate::common::fixtures::{definition, save_definitions, TestEngine};
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use codex_core::web::create_app;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Poll `uri` until `done` accepts the body
async fn wait_for(app: &Router, uri: &str, done: impl Fn(&Value) -> bool) -> Value {
    for _ in 0..200 {
        let (status, body) = send(app, Method::GET, uri, None).await;
        if status == StatusCode::OK && done(&body) {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{uri} never reached the expected state");
}

async fn app_with_definitions() -> (TestEngine, Router) {
    let engine = TestEngine::new(ScriptedGateway::new()).await;
    save_definitions(
        engine.store(),
        &[definition("Profile", 2, &[]), definition("Forecast", 1, &["Profile"])],
    )
    .await;
    let app = create_app(engine.state.clone());
    (engine, app)
}

#[tokio::test]
async fn test_health() {
    let (_engine, app) = app_with_definitions().await;
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_unknown_run_returns_error_body() {
    let (_engine, app) = app_with_definitions().await;
    let (status, body) = send(&app, Method::GET, &format!("/v1/runs/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert!(body["error"]["message"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_create_run_is_accepted_and_completes_in_background() {
    let (engine, app) = app_with_definitions().await;

    let (status, body) = send(&app, Method::POST, "/v1/runs", Some(json!({"subject": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/runs",
        Some(json!({"subject": "Ada Lovelace", "input": {"answers": {"born": 1815}}})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["accepted"], true);
    let run_id = body["runId"].as_str().unwrap().to_string();

    let summary = wait_for(&app, &format!("/v1/runs/{run_id}"), |b| b["status"] == "completed").await;
    let codexes = summary["codexes"].as_array().unwrap();
    assert_eq!(codexes.len(), 2);
    assert!(codexes.iter().all(|c| c["status"] == "ready"));
    assert!(!engine.gateway.calls_containing("\"born\": 1815").is_empty());

    // Finished runs cannot be cancelled
    let (status, _) = send(&app, Method::POST, &format!("/v1/runs/{run_id}/cancel"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_orchestrate_unknown_run_is_not_found() {
    let (_engine, app) = app_with_definitions().await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/orchestrate",
        Some(json!({"runId": Uuid::new_v4()})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_prerequisite_cycle_is_conflict() {
    let (_engine, app) = app_with_definitions().await;
    let (status, definitions) = send(&app, Method::GET, "/v1/definitions", None).await;
    assert_eq!(status, StatusCode::OK);
    let profile_id = definitions
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["name"] == "Profile")
        .map(|d| d["definitionId"].as_str().unwrap().to_string())
        .unwrap();

    let uri = format!("/v1/definitions/{profile_id}/prerequisites");
    let (status, body) = send(&app, Method::PUT, &uri, Some(json!({"prerequisites": ["Forecast"]}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, _) = send(&app, Method::PUT, &uri, Some(json!({"prerequisites": ["Missing"]}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Method::PUT, &uri, Some(json!({"prerequisites": []}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prerequisites"], json!([]));
}

#[tokio::test]
async fn test_save_definition_round_trips_through_api() {
    let (_engine, app) = app_with_definitions().await;
    let new_definition = serde_json::to_value(definition("Timeline", 3, &["Profile"])).unwrap();

    let (status, saved) = send(&app, Method::POST, "/v1/definitions", Some(new_definition)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["name"], "Timeline");

    let (_, listed) = send(&app, Method::GET, "/v1/definitions", None).await;
    assert_eq!(listed.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_section_generation_validates_before_accepting() {
    let (engine, app) = app_with_definitions().await;
    let run = engine
        .state
        .orchestrator
        .create_run("Ada Lovelace", Default::default())
        .await
        .unwrap();
    let codex = engine
        .store()
        .list_codexes(run.run_id)
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.name == "Profile")
        .unwrap();

    let request = |name: &str, index: i32| {
        json!({
            "codexId": codex.codex_id,
            "codexName": name,
            "sectionIndex": index,
            "inputContext": "",
        })
    };

    let (status, _) = send(&app, Method::POST, "/v1/sections/generate", Some(request("Profile", 5))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, Method::POST, "/v1/sections/generate", Some(request("Forecast", 0))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Forecast cannot start before Profile is ready
    let forecast = engine
        .store()
        .list_codexes(run.run_id)
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.name == "Forecast")
        .unwrap();
    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/sections/generate",
        Some(json!({
            "codexId": forecast.codex_id,
            "codexName": "Forecast",
            "sectionIndex": 0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("Profile"));
    assert_eq!(engine.gateway.call_count(), 0);

    let (status, body) = send(&app, Method::POST, "/v1/sections/generate", Some(request("Profile", 0))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["codexId"], json!(codex.codex_id));

    for _ in 0..200 {
        let sections = engine.store().list_sections(codex.codex_id).await.unwrap();
        if sections.iter().any(|s| s.content.is_some()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("section was never generated");
}

#[tokio::test]
async fn test_queue_endpoints() {
    let (engine, app) = app_with_definitions().await;
    let (status, _) = send(&app, Method::GET, "/v1/queue?status=bogus", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let definitions = engine.store().list_definitions().await.unwrap();
    let profile = definitions.iter().find(|d| d.name == "Profile").unwrap();

    let (status, items) = send(
        &app,
        Method::POST,
        "/v1/queue",
        Some(json!({"subjects": ["Ada"], "definitionIds": [profile.definition_id]})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let item_id = items[0]["itemId"].as_str().unwrap().to_string();

    wait_for(&app, "/v1/queue?status=completed", |b| {
        b.as_array().is_some_and(|items| items.len() == 1)
    })
    .await;

    let (status, body) = send(&app, Method::POST, &format!("/v1/queue/{item_id}/cancel"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/queue/bulk",
        Some(json!({"action": "delete", "itemIds": [item_id]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["affected"], 1);

    let (status, _) = send(&app, Method::DELETE, &format!("/v1/queue/{item_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
