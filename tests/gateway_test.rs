//! End-to-end tests: a real gateway on an ephemeral port.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use rewrite_router::config::RewriteRule;
use rewrite_router::RewriterConfig;

mod common;
use common::{client, start_echo_upstream, TestGateway};

fn table(rules: &[(&str, &str)]) -> RewriterConfig {
    let mut config = RewriterConfig::default();
    config.rewrites = rules
        .iter()
        .map(|(source, destination)| RewriteRule::new(*source, *destination))
        .collect();
    config
}

#[tokio::test]
async fn test_resolution_json_without_upstream() {
    let gateway = TestGateway::start(RewriterConfig::default()).await;

    let res = client()
        .get(gateway.url("/acme/donate/50/month"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["destination"], "/contribution-flow");
    assert_eq!(body["params"]["collectiveSlug"], "acme");
    assert_eq!(body["params"]["verb"], "donate");
    assert_eq!(body["params"]["amount"], "50");
    assert_eq!(body["params"]["interval"], "month");
    assert!(body["uri"]
        .as_str()
        .unwrap()
        .starts_with("/contribution-flow?"));

    gateway.stop().await;
}

#[tokio::test]
async fn test_unmatched_path_is_not_found() {
    let gateway = TestGateway::start(table(&[("/signin/:token?", "/signin")])).await;

    let res = client().get(gateway.url("/nowhere")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    gateway.stop().await;
}

#[tokio::test]
async fn test_trailing_slash_redirects() {
    let gateway = TestGateway::start(table(&[("/signin/:token?", "/signin")])).await;

    let res = client()
        .get(gateway.url("/signin/abc/?next=home"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(res.headers()["location"], "/signin/abc?next=home");

    gateway.stop().await;
}

#[tokio::test]
async fn test_redirect_never_leaves_the_host() {
    let gateway = TestGateway::start(RewriterConfig::default()).await;

    let res = client()
        .get(gateway.url("//evil.example/"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(res.headers()["location"], "/evil.example");

    gateway.stop().await;
}

#[tokio::test]
async fn test_trailing_slash_resolves_when_redirect_disabled() {
    let mut config = table(&[("/signin/:token?", "/signin")]);
    config.rewriting.redirect_trailing_slash = false;
    let gateway = TestGateway::start(config).await;

    let res = client().get(gateway.url("/signin/abc/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["params"]["token"], "abc");

    gateway.stop().await;
}

#[tokio::test]
async fn test_forwards_rewritten_target_to_upstream() {
    let upstream = start_echo_upstream().await;
    let mut config = table(&[
        ("/signin/sent", "/signinLinkSent"),
        ("/signin/:token?", "/signin"),
    ]);
    config.upstream.url = Some(format!("http://{}", upstream));
    let gateway = TestGateway::start(config).await;

    let res = client()
        .get(gateway.url("/signin/abc123?next=x"))
        .header("x-request-id", "req-42")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-rewrite-destination"], "/signin");
    assert_eq!(res.headers()["x-request-id"], "req-42");
    assert_eq!(res.headers()["x-upstream-saw-request-id"], "req-42");
    assert_eq!(
        res.text().await.unwrap(),
        "GET /signin?next=x&token=abc123 HTTP/1.1"
    );

    let res = client().get(gateway.url("/signin/sent")).send().await.unwrap();
    assert_eq!(res.headers()["x-rewrite-destination"], "/signinLinkSent");
    assert_eq!(res.text().await.unwrap(), "GET /signinLinkSent HTTP/1.1");

    gateway.stop().await;
}

#[tokio::test]
async fn test_encoded_segments_forwarded_once_encoded() {
    let upstream = start_echo_upstream().await;
    let mut config = table(&[("/:collectiveSlug", "/collective-page")]);
    config.upstream.url = Some(format!("http://{}", upstream));
    let gateway = TestGateway::start(config).await;

    let res = client().get(gateway.url("/caf%C3%A9")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.text().await.unwrap(),
        "GET /collective-page?collectiveSlug=caf%C3%A9 HTTP/1.1"
    );

    gateway.stop().await;
}

#[tokio::test]
async fn test_forward_unmatched_passes_path_through() {
    let upstream = start_echo_upstream().await;
    let mut config = table(&[("/signin/:token?", "/signin")]);
    config.upstream.url = Some(format!("http://{}", upstream));
    config.rewriting.forward_unmatched = true;
    let gateway = TestGateway::start(config).await;

    let res = client()
        .get(gateway.url("/_next/static/app.js?v=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("x-rewrite-destination").is_none());
    assert_eq!(
        res.text().await.unwrap(),
        "GET /_next/static/app.js?v=1 HTTP/1.1"
    );

    gateway.stop().await;
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    // Bind then drop to get a port nobody listens on.
    let dead = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = dead.local_addr().unwrap();
    drop(dead);

    let mut config = table(&[("/signin/:token?", "/signin")]);
    config.upstream.url = Some(format!("http://{}", addr));
    let gateway = TestGateway::start(config).await;

    let res = client().get(gateway.url("/signin")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    gateway.stop().await;
}

#[tokio::test]
async fn test_generates_request_id() {
    let gateway = TestGateway::start(RewriterConfig::default()).await;

    let res = client().get(gateway.url("/help")).send().await.unwrap();
    let id = res.headers()["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());

    gateway.stop().await;
}

async fn wait_for_status(url: &str, expected: StatusCode) -> bool {
    for _ in 0..50 {
        let res = client().get(url).send().await.unwrap();
        if res.status() == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn test_hot_reload_swaps_table() {
    let gateway = TestGateway::start(table(&[("/old", "/legacy")])).await;
    assert!(wait_for_status(&gateway.url("/old"), StatusCode::OK).await);

    gateway.updates.send(table(&[("/new", "/fresh")])).unwrap();
    assert!(wait_for_status(&gateway.url("/new"), StatusCode::OK).await);
    assert!(wait_for_status(&gateway.url("/old"), StatusCode::NOT_FOUND).await);

    gateway.stop().await;
}

#[tokio::test]
async fn test_hot_reload_rejects_malformed_table() {
    let gateway = TestGateway::start(table(&[("/old", "/legacy")])).await;

    gateway
        .updates
        .send(table(&[("/broken/:id(", "/legacy")]))
        .unwrap();
    // A valid follow-up proves the broken update was processed first.
    gateway.updates.send(table(&[("/old", "/legacy"), ("/later", "/later")])).unwrap();
    assert!(wait_for_status(&gateway.url("/later"), StatusCode::OK).await);

    let res = client().get(gateway.url("/old")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    gateway.stop().await;
}
