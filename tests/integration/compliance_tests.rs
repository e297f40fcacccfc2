use crate::common::{mount_robots, test_config};
use sumi_harvest::{ComplianceGate, DenyReason, FailureKind, FetchOrchestrator};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_robots_disallow_wins_over_allow_list() {
    let server = MockServer::start().await;
    mount_robots(
        &server,
        "User-agent: *\nDisallow: /archive\n\nUser-agent: HarvestTestBot\nDisallow: /drafts",
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/drafts/today"))
        .respond_with(ResponseTemplate::new(200).set_body_string("secret"))
        .expect(0)
        .mount(&server)
        .await;

    let orchestrator = FetchOrchestrator::with_renderer(&test_config(false, None), None).unwrap();

    let outcome = orchestrator
        .fetch_with_fallback(&format!("{}/drafts/today", server.uri()))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(FailureKind::PolicyDenied));
    assert_eq!(outcome.strategy_used, None);
    assert_eq!(orchestrator.stats().policy_denied, 1);
}

#[tokio::test]
async fn test_specific_group_replaces_wildcard() {
    let server = MockServer::start().await;
    mount_robots(
        &server,
        "User-agent: *\nDisallow: /archive\n\nUser-agent: HarvestTestBot\nDisallow: /drafts",
    )
    .await;

    let gate = ComplianceGate::from_config(&test_config(false, None)).unwrap();

    let decision = gate.admit(&format!("{}/archive/2020", server.uri())).await;
    assert!(decision.allowed, "{}", decision.reason);
}

#[tokio::test]
async fn test_robots_server_error_fails_open() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(200).set_body_string("report body"))
        .mount(&server)
        .await;

    let orchestrator = FetchOrchestrator::with_renderer(&test_config(false, None), None).unwrap();
    let outcome = orchestrator
        .fetch_with_fallback(&format!("{}/report", server.uri()))
        .await;

    assert!(outcome.success);
    let policy = orchestrator.gate().robots().cached("127.0.0.1").unwrap();
    assert!(policy.allowed);
    assert!(policy.fetch_failed);
}

#[tokio::test]
async fn test_blocked_domain_denied() {
    let server = MockServer::start().await;
    let gate = ComplianceGate::from_config(&test_config(false, None)).unwrap();
    gate.block("127.0.0.1", "operator request");

    let decision = gate.admit(&format!("{}/anything", server.uri())).await;

    assert!(!decision.allowed);
    assert_eq!(decision.denial, Some(DenyReason::Blocked));
    assert!(gate.robots().is_empty());
}

#[tokio::test]
async fn test_unlisted_domain_denied() {
    let gate = ComplianceGate::from_config(&test_config(false, None)).unwrap();

    let decision = gate.admit("https://unlisted.example.net/page").await;

    assert_eq!(decision.denial, Some(DenyReason::NotAllowListed));
}
