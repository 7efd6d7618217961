use std::time::Duration;

use axum::body::Bytes;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use desaas::constants::{FALLBACK_CODE, FALLBACK_QUESTIONS};
use desaas::{build_app, HistoryPolicy, ProxyConfig};

fn test_server(upstream_url: String, policy: HistoryPolicy) -> TestServer {
    let config = ProxyConfig::new(upstream_url).with_history_policy(policy);
    TestServer::new(build_app(&config).unwrap()).unwrap()
}

fn test_server_with_timeout(upstream_url: String, timeout: Option<Duration>) -> TestServer {
    let config = ProxyConfig::new(upstream_url).with_upstream_timeout(timeout);
    TestServer::new(build_app(&config).unwrap()).unwrap()
}

async fn stub_upstream(reply: ResponseTemplate) -> MockServer {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(reply)
        .mount(&upstream)
        .await;
    upstream
}

fn login_page_request() -> Value {
    json!({ "messages": [{ "role": "user", "content": "Build a login page" }] })
}

#[test_log::test(tokio::test)]
async fn test_login_page_scenario_uses_defaults() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "message": "user: Build a login page", "history": [] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&upstream)
        .await;

    let server = test_server(format!("{}/chat", upstream.uri()), HistoryPolicy::Empty);
    let response = server.post("/api/chat").json(&login_page_request()).await;

    response.assert_status_ok();
    response.assert_json(&json!({
        "questions": FALLBACK_QUESTIONS,
        "code": "Generated code based on the answers provided."
    }));
}

#[tokio::test]
async fn test_upstream_fields_pass_through() {
    let upstream = stub_upstream(ResponseTemplate::new(200).set_body_json(json!({
        "questions": ["Which CSS framework?"],
        "code": "<form></form>"
    })))
    .await;

    let server = test_server(format!("{}/chat", upstream.uri()), HistoryPolicy::Empty);
    let response = server.post("/api/chat").json(&login_page_request()).await;

    response.assert_status_ok();
    response.assert_json(&json!({
        "questions": ["Which CSS framework?"],
        "code": "<form></form>"
    }));
}

#[tokio::test]
async fn test_empty_code_is_replaced_with_placeholder() {
    let upstream = stub_upstream(
        ResponseTemplate::new(200).set_body_json(json!({ "questions": null, "code": "" })),
    )
    .await;

    let server = test_server(format!("{}/chat", upstream.uri()), HistoryPolicy::Empty);
    let body: Value = server.post("/api/chat").json(&login_page_request()).await.json();

    assert_eq!(body["code"], FALLBACK_CODE);
    assert_eq!(body["questions"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_multi_turn_prompt_is_flattened_in_order() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!({
            "message": "user: Build a shop\nassistant: Which framework?\nuser: React",
            "history": []
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": "ok" })))
        .expect(1)
        .mount(&upstream)
        .await;

    let server = test_server(format!("{}/chat", upstream.uri()), HistoryPolicy::Empty);
    let response = server
        .post("/api/chat")
        .json(&json!({ "messages": [
            { "role": "user", "content": "Build a shop" },
            { "role": "assistant", "content": "Which framework?" },
            { "role": "user", "content": "React" }
        ]}))
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_forward_policy_sends_prior_turns_as_history() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!({
            "message": "user: Build a shop\nassistant: Which framework?\nuser: React",
            "history": [
                { "role": "user", "content": "Build a shop" },
                { "role": "assistant", "content": "Which framework?" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&upstream)
        .await;

    let server = test_server(format!("{}/chat", upstream.uri()), HistoryPolicy::Forward);
    let response = server
        .post("/api/chat")
        .json(&json!({ "messages": [
            { "role": "user", "content": "Build a shop" },
            { "role": "assistant", "content": "Which framework?" },
            { "role": "user", "content": "React" }
        ]}))
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_malformed_turns_are_tolerated() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!({ "message": "user: \n: hello", "history": [] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&upstream)
        .await;

    let server = test_server(format!("{}/chat", upstream.uri()), HistoryPolicy::Empty);
    let response = server
        .post("/api/chat")
        .json(&json!({ "messages": [{ "role": "user" }, { "content": "hello" }] }))
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_repeated_requests_give_identical_output() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": "same" })))
        .expect(2)
        .mount(&upstream)
        .await;

    let server = test_server(format!("{}/chat", upstream.uri()), HistoryPolicy::Empty);
    let first: Value = server.post("/api/chat").json(&login_page_request()).await.json();
    let second: Value = server.post("/api/chat").json(&login_page_request()).await.json();

    assert_eq!(first, second);
    assert_eq!(first["code"], "same");
}

#[test_log::test(tokio::test)]
async fn test_unreachable_upstream_returns_500() {
    // Nothing listens on port 1.
    let server = test_server("http://127.0.0.1:1/chat".to_string(), HistoryPolicy::Empty);
    let response = server
        .post("/api/chat")
        .json(&login_page_request())
        .expect_failure()
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert!(!body["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_upstream_error_status_returns_500() {
    let upstream = stub_upstream(ResponseTemplate::new(503).set_body_string("overloaded")).await;

    let server = test_server(format!("{}/chat", upstream.uri()), HistoryPolicy::Empty);
    let response = server
        .post("/api/chat")
        .json(&login_page_request())
        .expect_failure()
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("503"));
    assert!(error.contains("overloaded"));
}

#[tokio::test]
async fn test_non_json_upstream_body_returns_500() {
    let upstream = stub_upstream(ResponseTemplate::new(200).set_body_string("<html>oops</html>")).await;

    let server = test_server(format!("{}/chat", upstream.uri()), HistoryPolicy::Empty);
    let response = server
        .post("/api/chat")
        .json(&login_page_request())
        .expect_failure()
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("unreadable body"));
}

#[test_log::test(tokio::test)]
async fn test_slow_upstream_hits_configured_timeout() {
    let upstream = stub_upstream(
        ResponseTemplate::new(200)
            .set_body_json(json!({ "code": "too late" }))
            .set_delay(Duration::from_secs(3)),
    )
    .await;

    let server = test_server_with_timeout(
        format!("{}/chat", upstream.uri()),
        Some(Duration::from_millis(200)),
    );
    let response = server
        .post("/api/chat")
        .json(&login_page_request())
        .expect_failure()
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert!(!body["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_no_timeout_waits_for_slow_upstream() {
    let upstream = stub_upstream(
        ResponseTemplate::new(200)
            .set_body_json(json!({ "code": "worth the wait" }))
            .set_delay(Duration::from_millis(500)),
    )
    .await;

    let server = test_server_with_timeout(format!("{}/chat", upstream.uri()), None);
    let response = server.post("/api/chat").json(&login_page_request()).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["code"], "worth the wait");
}

#[tokio::test]
async fn test_non_json_request_is_rejected_with_json_error() {
    let server = test_server("http://127.0.0.1:1/chat".to_string(), HistoryPolicy::Empty);

    let response = server
        .post("/api/chat")
        .text("prompt=Build a login page")
        .expect_failure()
        .await;
    response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body: Value = response.json();
    assert!(body["error"].is_string());

    let response = server
        .post("/api/chat")
        .content_type("application/json")
        .bytes(Bytes::from_static(b"{ not json"))
        .expect_failure()
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_missing_messages_is_an_empty_conversation() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!({ "message": "", "history": [] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&upstream)
        .await;

    let server = test_server(format!("{}/chat", upstream.uri()), HistoryPolicy::Empty);
    server.post("/api/chat").json(&json!({})).await.assert_status_ok();
}

#[tokio::test]
async fn test_index_page_renders() {
    let server = test_server("http://127.0.0.1:1/chat".to_string(), HistoryPolicy::Empty);
    let response = server.get("/").await;

    response.assert_status_ok();
    let html = response.text();
    assert!(html.contains("LOGIQ CURVE LLC"));
    assert!(html.contains("data-chat-endpoint="));
    assert!(html.contains(FALLBACK_QUESTIONS[0]));
}

#[tokio::test]
async fn test_static_assets_and_fallback_routes() {
    let server = test_server("http://127.0.0.1:1/chat".to_string(), HistoryPolicy::Empty);

    server.get("/static/app.js").await.assert_status_ok();
    server.get("/health").await.assert_json(&json!({ "status": "ok" }));

    let response = server.get("/static/missing.js").expect_failure().await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server.get("/nope").expect_failure().await;
    response.assert_status(StatusCode::NOT_FOUND);
    response.assert_json(&json!({ "error": "route not found" }));
}
