use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use chat_relay::api::chat;
use chat_relay::config::{AppConfig, ModelEndpoints, RoutingConfig, ServerConfig};
use chat_relay::state::AppState;

#[derive(Default)]
struct Recorded {
    headers: Option<HeaderMap>,
    body: Option<Value>,
}

type Shared = Arc<Mutex<Recorded>>;

fn build_state(routing: RoutingConfig) -> Arc<AppState> {
    Arc::new(AppState::new(AppConfig {
        server: ServerConfig::default(),
        routing,
    }))
}

fn routing_tables(
    image: Vec<(&str, Vec<String>)>,
    text: Vec<(&str, Vec<String>)>,
    aliases: Vec<(&str, &str)>,
) -> RoutingConfig {
    let to_table = |entries: Vec<(&str, Vec<String>)>| {
        entries
            .into_iter()
            .map(|(model, endpoints)| (model.to_string(), ModelEndpoints { endpoints }))
            .collect()
    };
    RoutingConfig {
        image_support: to_table(image),
        no_image_support: to_table(text),
        model_aliases: aliases
            .into_iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect(),
    }
}

async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Upstream that records the request it saw and answers 200 with `reply`.
async fn spawn_recording_upstream(reply: Value) -> (String, Shared) {
    let recorded: Shared = Arc::default();
    let sink = Arc::clone(&recorded);
    let router = Router::new().route(
        "/v1/chat/completions",
        post(move |headers: HeaderMap, body: Bytes| {
            let sink = Arc::clone(&sink);
            async move {
                let mut guard = sink.lock().unwrap();
                guard.headers = Some(headers);
                guard.body = serde_json::from_slice(&body).ok();
                Json(reply)
            }
        }),
    );
    (spawn_upstream(router).await, recorded)
}

/// Upstream that counts hits and answers with a fixed status and body.
async fn spawn_counting_upstream(status: StatusCode, body: &'static str) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let router = Router::new().route(
        "/v1/chat/completions",
        post(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (status, body).into_response()
            }
        }),
    );
    (spawn_upstream(router).await, hits)
}

/// An endpoint that refuses connections: bind an ephemeral port, then drop
/// the listener.
async fn refused_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn call_proxy(state: Arc<AppState>, body: Value) -> (StatusCode, HeaderMap, Bytes) {
    let response = chat::handler(State(state), Bytes::from(body.to_string())).await;
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

#[tokio::test]
async fn test_forward_non_streaming() {
    let reply = json!({"id": "chatcmpl_mock", "object": "chat.completion", "choices": []});
    let (url, recorded) = spawn_recording_upstream(reply.clone()).await;
    let state = build_state(routing_tables(
        vec![],
        vec![("deepseek-v3", vec![url])],
        vec![],
    ));

    let (status, _, body) = call_proxy(
        state,
        json!({
            "model": "deepseek-v3",
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 0.3
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, reply);

    let guard = recorded.lock().unwrap();
    let headers = guard.headers.as_ref().unwrap();
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(headers["accept"], "application/json");
    let user_id = headers["userid"].to_str().unwrap();
    assert_eq!(user_id.len(), 21);
    assert!(user_id.bytes().all(|b| b.is_ascii_alphanumeric()));

    let seen = guard.body.as_ref().unwrap();
    assert_eq!(seen["model"], "deepseek-v3");
    assert_eq!(seen["temperature"], json!(0.3));
    assert_eq!(seen["messages"][0]["content"], "hi");
}

#[tokio::test]
async fn test_streaming_request_sets_event_stream_accept() {
    let (url, recorded) = spawn_recording_upstream(json!({"ok": true})).await;
    let state = build_state(routing_tables(
        vec![],
        vec![("deepseek-v3", vec![url])],
        vec![],
    ));

    let (status, _, _) = call_proxy(
        state,
        json!({
            "model": "deepseek-v3",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let guard = recorded.lock().unwrap();
    let headers = guard.headers.as_ref().unwrap();
    assert_eq!(headers["accept"], "text/event-stream");
    assert_eq!(guard.body.as_ref().unwrap()["stream"], json!(true));
}

#[tokio::test]
async fn test_sse_body_and_headers_are_relayed() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            (
                [
                    ("content-type", "text/event-stream"),
                    ("x-upstream-tag", "mock-1"),
                ],
                "data: {\"delta\":\"hel\"}\n\ndata: {\"delta\":\"lo\"}\n\ndata: [DONE]\n\n",
            )
        }),
    );
    let url = spawn_upstream(router).await;
    let state = build_state(routing_tables(
        vec![],
        vec![("deepseek-v3", vec![url])],
        vec![],
    ));

    let (status, headers, body) = call_proxy(
        state,
        json!({
            "model": "deepseek-v3",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "text/event-stream");
    assert_eq!(headers["x-upstream-tag"], "mock-1");
    let text = std::str::from_utf8(&body).unwrap();
    assert!(text.contains("data: {\"delta\":\"hel\"}"));
    assert!(text.ends_with("data: [DONE]\n\n"));
}

#[tokio::test]
async fn test_failover_advances_past_failures_and_stops_at_success() {
    let (bad_url, bad_hits) =
        spawn_counting_upstream(StatusCode::INTERNAL_SERVER_ERROR, "boom").await;
    let refused = refused_endpoint().await;
    let (good_url, recorded) = spawn_recording_upstream(json!({"winner": true})).await;
    let (late_url, late_hits) = spawn_counting_upstream(StatusCode::OK, "never seen").await;

    let state = build_state(routing_tables(
        vec![],
        vec![("deepseek-v3", vec![bad_url, refused, good_url, late_url])],
        vec![],
    ));

    let (status, _, body) = call_proxy(
        state,
        json!({"model": "deepseek-v3", "messages": [{"role": "user", "content": "hi"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["winner"], json!(true));

    assert_eq!(bad_hits.load(Ordering::SeqCst), 1);
    assert!(recorded.lock().unwrap().body.is_some());
    // No calls beyond the first success.
    assert_eq!(late_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_exhaustion_returns_bad_gateway_with_last_error() {
    let (first_url, first_hits) =
        spawn_counting_upstream(StatusCode::INTERNAL_SERVER_ERROR, "first failure").await;
    let (last_url, last_hits) =
        spawn_counting_upstream(StatusCode::SERVICE_UNAVAILABLE, "distinct-last-detail").await;

    let state = build_state(routing_tables(
        vec![],
        vec![("deepseek-v3", vec![first_url, last_url])],
        vec![],
    ));

    let (status, _, body) = call_proxy(
        state,
        json!({"model": "deepseek-v3", "messages": [{"role": "user", "content": "hi"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(first_hits.load(Ordering::SeqCst), 1);
    assert_eq!(last_hits.load(Ordering::SeqCst), 1);

    let text = std::str::from_utf8(&body).unwrap();
    // Last error wins: the final candidate's diagnostic is in the message.
    assert!(text.contains("distinct-last-detail"), "body: {text}");
    assert!(!text.contains("first failure"), "body: {text}");
}

#[tokio::test]
async fn test_image_request_routes_to_image_table() {
    let (image_url, image_recorded) = spawn_recording_upstream(json!({"table": "image"})).await;
    let (text_url, text_hits) = spawn_counting_upstream(StatusCode::OK, "{}").await;

    let state = build_state(routing_tables(
        vec![("gpt-4o-mini", vec![image_url])],
        vec![("gpt-4o-mini", vec![text_url])],
        vec![],
    ));

    let (status, _, _) = call_proxy(
        state,
        json!({
            "model": "gpt-4o-mini",
            "messages": [{
                "role": "user",
                "content": [{"type": "image_url", "image_url": {"url": "http://x/y.png", "detail": "low"}}]
            }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(text_hits.load(Ordering::SeqCst), 0);

    // The outbound body carries the forced detail level.
    let guard = image_recorded.lock().unwrap();
    let seen = guard.body.as_ref().unwrap();
    assert_eq!(
        seen["messages"][0]["content"][0]["image_url"]["detail"],
        json!("high")
    );
}

#[tokio::test]
async fn test_alias_routes_but_body_keeps_public_name() {
    let (url, recorded) = spawn_recording_upstream(json!({"ok": true})).await;
    let state = build_state(routing_tables(
        vec![("google/gemini-2.0-flash-001", vec![url])],
        vec![],
        vec![("gemini-2.0-flash", "google/gemini-2.0-flash-001")],
    ));

    let (status, _, _) = call_proxy(
        state,
        json!({
            "model": "gemini-2.0-flash",
            "messages": [{
                "role": "user",
                "content": [{"type": "image_url", "image_url": {"url": "http://x/y.png"}}]
            }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let guard = recorded.lock().unwrap();
    assert_eq!(guard.body.as_ref().unwrap()["model"], "gemini-2.0-flash");
}

#[tokio::test]
async fn test_text_request_falls_back_to_image_category() {
    let (url, _recorded) = spawn_recording_upstream(json!({"ok": true})).await;
    // Model tagged image-capable only; a plain text request must still route.
    let state = build_state(routing_tables(
        vec![("gpt-4o-mini", vec![url])],
        vec![],
        vec![],
    ));

    let (status, _, _) = call_proxy(
        state,
        json!({"model": "gpt-4o-mini", "messages": [{"role": "user", "content": "hi"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let state = build_state(RoutingConfig::default());
    let response = chat::handler(State(state), Bytes::from_static(b"{not json")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_model_is_bad_request() {
    let state = build_state(RoutingConfig::default());
    let (status, _, body) = call_proxy(
        state,
        json!({"model": "no-such-model", "messages": [{"role": "user", "content": "hi"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(std::str::from_utf8(&body).unwrap().contains("no-such-model"));
}

#[tokio::test]
async fn test_invalid_content_short_circuits_without_upstream_call() {
    let (url, hits) = spawn_counting_upstream(StatusCode::OK, "{}").await;
    let state = build_state(routing_tables(
        vec![],
        vec![("deepseek-v3", vec![url])],
        vec![],
    ));

    let (status, _, _) = call_proxy(
        state,
        json!({
            "model": "deepseek-v3",
            "messages": [{"role": "user", "content": [{"type": "bogus"}]}]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
