use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::middleware;
use serde_json::json;
use tower::util::ServiceExt;

use korp_mwe::OverflowLog;
use korp_server::handlers::{AppState, router};
use korp_server::rate_limit::{self, RateLimiter};

fn make_state() -> AppState {
    AppState { overflow: None }
}

fn resolve_request(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/resolve")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn word(lex: &str, text: &str) -> serde_json::Value {
    json!({ "text": text, "annotations": { "lex": lex } })
}

#[tokio::test]
async fn healthz_ok() {
    let app = router(make_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn resolve_contracts_a_unit() {
    let app = router(make_state());
    let request = resolve_request(json!({
        "mode": "lex",
        "words": [
            word("jag..pn.1", "Jag"),
            word("slå..vb.1|slå_fast..vbm.1", "slår"),
            word("fast..ab.1|slå_fast..vbm.1:2", "fast"),
            word("att..sn.1", "att"),
        ],
    }));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body_bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(body["mode"], "lex");
    assert_eq!(body["applicable"], true);
    assert_eq!(
        body["values"],
        json!(["jag..pn.1", "slå_fast..vbm.1", "att..sn.1"])
    );
}

#[tokio::test]
async fn resolve_rejects_unknown_mode() {
    let app = router(make_state());
    let request = resolve_request(json!({
        "mode": "pos",
        "words": [word("jag..pn.1", "Jag")],
    }));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body_bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
    assert!(
        body["error"]
            .as_str()
            .unwrap_or_default()
            .contains("unknown mode")
    );
}

#[tokio::test]
async fn structural_markup_is_inapplicable() {
    let app = router(make_state());
    let request = resolve_request(json!({
        "mode": "lex",
        "words": [
            word("jag..pn.1", "Jag"),
            { "element": "ne" },
            word("att..sn.1", "att"),
        ],
    }));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body_bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(body["applicable"], false);
    assert!(body["values"].is_null());
}

#[tokio::test]
async fn missing_text_uses_placeholder() {
    let app = router(make_state());
    let request = resolve_request(json!({
        "mode": "lex",
        "words": [{ "annotations": { "lex": "" } }],
    }));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body_bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(body["values"], json!(["noword"]));
}

#[tokio::test]
async fn overflowed_sentence_is_logged_and_inapplicable() {
    let tempdir = tempfile::tempdir().unwrap();
    let log = Arc::new(OverflowLog::new(tempdir.path().join("overflow.txt")));
    let app = router(AppState {
        overflow: Some(Arc::clone(&log)),
    });

    // Seven words, each annotated with the same eight two-word units.
    let lex: Vec<String> = (0..8).map(|u| format!("u{u}_x..vbm.1")).collect();
    let lex = lex.join("|");
    let words: Vec<serde_json::Value> = (0..7).map(|_| word(&lex, "x")).collect();
    let request = resolve_request(json!({ "mode": "lex", "words": words }));

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body_bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(body["applicable"], false);
    assert!(log.path().exists());
}

#[tokio::test]
async fn rate_limiter_rejects_after_burst() {
    let limiter = RateLimiter::new(1, 2);
    let app = router(make_state())
        .layer(middleware::from_fn_with_state(limiter, rate_limit::enforce));

    for expected in [StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .header("X-Forwarded-For", "203.0.113.9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), expected);
    }
}

#[tokio::test]
async fn unproxied_requests_are_not_limited() {
    let limiter = RateLimiter::new(1, 1);
    let app = router(make_state())
        .layer(middleware::from_fn_with_state(limiter, rate_limit::enforce));

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
