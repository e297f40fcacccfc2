use crate::common::{test_config, StaticRenderer};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use sumi_harvest::fetch::PageRenderer;
use sumi_harvest::{FailureKind, FetchOrchestrator, HarvestError, RobotsPolicy, StrategyKind};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Accepts connections and drops them straight away
async fn resetting_server() -> (String, Arc<AtomicU32>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicU32::new(0));

    let counter = accepted.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(socket);
        }
    });

    (format!("http://{}", addr), accepted)
}

#[tokio::test]
async fn test_connection_reset_gets_exactly_three_attempts() {
    let (base, accepted) = resetting_server().await;
    let orchestrator = FetchOrchestrator::with_renderer(&test_config(false, None), None).unwrap();
    orchestrator
        .gate()
        .robots()
        .insert("127.0.0.1", RobotsPolicy::permissive(false))
        .await;

    let outcome = orchestrator
        .fetch_with_fallback(&format!("{}/article", base))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(FailureKind::TransientNetwork));
    assert_eq!(outcome.retry_count, 2);
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_server_error_gets_exactly_three_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let orchestrator = FetchOrchestrator::with_renderer(&test_config(false, None), None).unwrap();
    let outcome = orchestrator
        .fetch_with_fallback(&format!("{}/busy", server.uri()))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.status_code, Some(503));
    assert_eq!(outcome.strategy_used, Some(StrategyKind::Light));
}

#[tokio::test]
async fn test_falls_back_to_render_when_light_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/app"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let renderer: Arc<dyn PageRenderer> = Arc::new(StaticRenderer("<html><main>rendered</main></html>"));
    let orchestrator =
        FetchOrchestrator::with_renderer(&test_config(true, None), Some(renderer)).unwrap();
    assert_eq!(
        orchestrator.strategy_kinds(),
        vec![StrategyKind::Light, StrategyKind::Render]
    );

    let outcome = orchestrator
        .fetch_with_fallback(&format!("{}/app", server.uri()))
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.strategy_used, Some(StrategyKind::Render));
    assert_eq!(
        outcome.content.as_deref(),
        Some("<html><main>rendered</main></html>")
    );

    let stats = orchestrator.stats();
    assert_eq!(stats.light_failed, 1);
    assert_eq!(stats.render_success, 1);
}

#[tokio::test]
async fn test_client_error_still_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/members"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let renderer: Arc<dyn PageRenderer> = Arc::new(StaticRenderer("<html>ok</html>"));
    let orchestrator =
        FetchOrchestrator::with_renderer(&test_config(true, None), Some(renderer)).unwrap();

    let outcome = orchestrator
        .fetch_with_fallback(&format!("{}/members", server.uri()))
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.strategy_used, Some(StrategyKind::Render));
}

#[test]
fn test_unusable_user_agent_is_a_setup_error() {
    let mut config = test_config(false, None);
    config.user_agent.crawler_name = "Harvest\nBot".to_string();

    let built = FetchOrchestrator::with_renderer(&config, None);
    assert!(matches!(built, Err(HarvestError::Http(_))));
}
