//! Rate limiting inside contract handlers.

use covenant_client::ClientError;
use covenant_core::{Contract, CovenantError, Validate};
use covenant_extract::Reply;
use covenant_ratelimit::{Period, RateLimitContext, RateLimitRule, RateLimiter};
use covenant_server::Dispatcher;
use covenant_test::TestApp;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
struct SendMagicLink {
    email: String,
}
impl Validate for SendMagicLink {}

fn send_magic_link() -> Contract<SendMagicLink, Value> {
    Contract::post("/auth/magic-link").with_request().with_response()
}

fn app(limit: u64) -> TestApp {
    let limiter = Arc::new(RateLimiter::in_memory());
    let rule = Arc::new(
        RateLimitRule::new("send-magic-link", ["email"], limit, Period::OneHour).unwrap(),
    );

    TestApp::new(Dispatcher::new().route(&send_magic_link(), move |_ctx, req: SendMagicLink| {
        let limiter = Arc::clone(&limiter);
        let rule = Arc::clone(&rule);
        async move {
            let context = RateLimitContext::from([("email".to_string(), req.email.clone())]);
            limiter.enforce(&rule, &context).await?;
            Ok::<_, CovenantError>(Reply::ok(json!({ "sent": req.email })))
        }
    }))
}

#[tokio::test]
async fn test_quota_exhaustion_returns_429() {
    let client = app(2).client();
    let request = || SendMagicLink {
        email: "ada@example.com".into(),
    };

    for _ in 0..2 {
        client.invoke(&send_magic_link(), request()).await.unwrap();
    }

    let error = client.invoke(&send_magic_link(), request()).await.unwrap_err();
    assert!(matches!(
        &error,
        ClientError::Http { status, message, .. }
            if *status == StatusCode::TOO_MANY_REQUESTS && message == "Rate limit exceeded"
    ));

    let other = SendMagicLink {
        email: "grace@example.com".into(),
    };
    assert!(client.invoke(&send_magic_link(), other).await.is_ok());
}

#[tokio::test]
async fn test_429_carries_retry_after() {
    let app = app(1);
    let body = json!({"email": "ada@example.com"});

    app.post("/auth/magic-link")
        .json(&body)
        .unwrap()
        .send()
        .await
        .assert_status(StatusCode::OK);

    let response = app.post("/auth/magic-link").json(&body).unwrap().send().await;
    response.assert_error(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded");

    let retry_after: u64 = response.header("retry-after").unwrap().parse().unwrap();
    assert!((1..=3600).contains(&retry_after), "{retry_after}");
}
