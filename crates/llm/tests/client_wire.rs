use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use finrag_llm::{
    decode_double, generate_with_retry, GenerateClient, GenerationRequest, Generator, LlmError,
    RetryPolicy, Sampling,
};
use serde_json::{json, Value};

#[derive(Default)]
struct Recorder {
    busy_left: AtomicUsize,
    status: Mutex<Option<StatusCode>>,
    seen: Mutex<Vec<Value>>,
}

async fn handle(State(rec): State<Arc<Recorder>>, Json(body): Json<Value>) -> (StatusCode, String) {
    rec.seen.lock().unwrap().push(body);
    if rec
        .busy_left
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        return (StatusCode::SERVICE_UNAVAILABLE, "busy".to_string());
    }
    if let Some(status) = *rec.status.lock().unwrap() {
        return (status, "upstream exploded".to_string());
    }
    let inner = json!({"metrics": [{"value": "Revenue: 100"}]}).to_string();
    (StatusCode::OK, Value::String(inner).to_string())
}

async fn spawn(rec: Arc<Recorder>) -> String {
    let app = Router::new().route("/generate", post(handle)).with_state(rec);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/generate")
}

fn request() -> GenerationRequest {
    GenerationRequest::new(
        "Extract metrics.\npage text",
        Sampling {
            frequency_penalty: 1.0,
            temperature: 0.2,
            max_tokens: 10_000,
        },
    )
    .with_system("You are a financial reporting expert.")
    .with_schema(json!({"type": "object"}))
}

#[derive(serde::Deserialize)]
struct Payload {
    metrics: Vec<Value>,
}

#[tokio::test]
async fn posts_request_and_returns_double_encoded_body() {
    let rec = Arc::new(Recorder::default());
    let client = GenerateClient::new(spawn(rec.clone()).await);
    assert!(client.endpoint().ends_with("/generate"));
    let body = client.generate(&request()).await.unwrap();
    let payload: Payload = decode_double(&body).unwrap();
    assert_eq!(payload.metrics.len(), 1);

    let seen = rec.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["system_prompt"], "You are a financial reporting expert.");
    assert_eq!(seen[0]["max_tokens"], 10_000);
    assert_eq!(seen[0]["schema"]["type"], "object");
}

#[tokio::test]
async fn service_unavailable_maps_to_busy_and_is_retried() {
    let rec = Arc::new(Recorder {
        busy_left: AtomicUsize::new(2),
        ..Default::default()
    });
    let client = GenerateClient::new(spawn(rec.clone()).await);
    assert!(client.generate(&request()).await.unwrap_err().is_busy());

    let policy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    };
    generate_with_retry(&client, &request(), &policy)
        .await
        .unwrap();
    let seen = rec.seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[1], seen[2]);
}

#[tokio::test]
async fn other_statuses_carry_code_and_body() {
    let rec = Arc::new(Recorder::default());
    *rec.status.lock().unwrap() = Some(StatusCode::BAD_GATEWAY);
    let client = GenerateClient::new(spawn(rec).await);
    match client.generate(&request()).await.unwrap_err() {
        LlmError::Status { status, body } => {
            assert_eq!(status, 502);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("unexpected error {other:?}"),
    }
}
