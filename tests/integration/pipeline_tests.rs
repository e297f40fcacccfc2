use crate::common::{mount_robots, test_config};
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;
use sumi_harvest::{
    CandidateRecord, Extractor, FetchOrchestrator, FetchOutcome, Pipeline, PipelineOutcome,
    ValidationCoordinator,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// First line is the title, the rest is the summary
struct LineExtractor;

impl Extractor for LineExtractor {
    fn extract(&self, fetched: &FetchOutcome) -> anyhow::Result<CandidateRecord> {
        let content = fetched.content.as_deref().context("no content")?;
        let mut lines = content.lines();
        let title = lines.next().context("empty page")?.trim().to_string();
        let summary = lines.map(str::trim).collect::<Vec<_>>().join(" ");

        Ok(CandidateRecord {
            url: fetched.url.clone(),
            source_domain: "127.0.0.1".to_string(),
            title: Some(title),
            summary: Some(summary),
            ..Default::default()
        })
    }
}

fn full_record(url: &str) -> CandidateRecord {
    CandidateRecord {
        url: url.to_string(),
        source_domain: "example.com".to_string(),
        source_type: "news".to_string(),
        title: Some("Bridge closed after flood damage".to_string()),
        summary: Some("Engineers closed the old bridge while they inspect the supports.".to_string()),
        publish_date: Some(Utc::now() - Duration::days(3)),
        region: Some("Valley".to_string()),
        topics: vec!["flood".to_string(), "infrastructure".to_string()],
        full_text: None,
        links: vec!["https://transport.example.org/notices".to_string()],
        images: vec![],
    }
}

#[tokio::test]
async fn test_duplicate_detection_persists_in_sqlite() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("fingerprints.db");
    let config = test_config(false, Some(db.as_path()));

    let first = {
        let coordinator = ValidationCoordinator::from_config(&config);
        coordinator
            .validate(full_record("https://example.com/bridge"))
            .await
    };
    assert!(first.is_valid);
    assert!(!first.is_duplicate);
    assert_eq!(first.quality_score, 1.0);

    // A fresh coordinator over the same database still remembers the record
    let coordinator = ValidationCoordinator::from_config(&config);
    let again = coordinator
        .validate(full_record("https://example.com/bridge"))
        .await;
    assert!(again.is_duplicate);
    assert!(!again.is_valid);
    assert_eq!(again.duplicate_ref.as_deref(), Some("https://example.com/bridge"));
    assert_eq!(again.quality_score, 0.0);

    let stats = coordinator.stats();
    assert_eq!(stats.total_validated, 1);
    assert_eq!(stats.duplicates_found, 1);
}

#[tokio::test]
async fn test_same_content_under_new_url_is_duplicate() {
    let coordinator = ValidationCoordinator::from_config(&test_config(false, None));

    let first = coordinator
        .validate(full_record("https://example.com/a"))
        .await;
    assert!(first.is_valid);

    let mut moved = full_record("https://example.com/b");
    moved.publish_date = first.record.publish_date;
    moved.title = Some("  BRIDGE closed after   flood damage ".to_string());
    let second = coordinator.validate(moved).await;

    assert!(second.is_duplicate);
    assert_eq!(second.duplicate_ref.as_deref(), Some("https://example.com/a"));
}

#[tokio::test]
async fn test_pipeline_end_to_end() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /private\n").await;

    Mock::given(method("GET"))
        .and(path("/private/x"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Secret\nnever fetched"))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("Storm warning issued for the coast\nHigh winds are expected through Friday night."),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/dup"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("Harbour reopens to shipping\nThe harbour reopened on Monday after dredging."),
        )
        .mount(&server)
        .await;

    let config = test_config(false, None);
    let pipeline = Pipeline::new(
        FetchOrchestrator::with_renderer(&config, None).unwrap(),
        Arc::new(LineExtractor),
        ValidationCoordinator::from_config(&config),
    );

    // Seen earlier on another site
    let seen = pipeline
        .validation()
        .validate(CandidateRecord {
            url: "https://mirror.example.net/harbour".to_string(),
            source_domain: "mirror.example.net".to_string(),
            title: Some("Harbour reopens to shipping".to_string()),
            summary: Some("The harbour reopened on Monday after dredging.".to_string()),
            ..Default::default()
        })
        .await;
    assert!(seen.is_valid);

    let urls = [
        format!("{}/private/x", server.uri()),
        format!("{}/flaky", server.uri()),
        format!("{}/dup", server.uri()),
    ];
    let outcomes = pipeline.run(&urls).await;
    assert_eq!(outcomes.len(), 3);
    for (outcome, url) in outcomes.iter().zip(&urls) {
        assert_eq!(outcome.url(), url);
    }

    assert!(matches!(outcomes[0], PipelineOutcome::Denied(_)));
    assert!(outcomes[0].validation().is_none());

    match &outcomes[1] {
        PipelineOutcome::Validated { fetch, validation } => {
            assert!(fetch.retry_count >= 1);
            assert_eq!(fetch.status_code, Some(200));
            assert!(validation.is_valid, "{:?}", validation.errors);
            assert_eq!(
                validation.record.title.as_deref(),
                Some("Storm warning issued for the coast")
            );
        }
        other => panic!("expected a validated outcome, got {:?}", other),
    }
    assert!(outcomes[1].is_accepted());

    let dup = outcomes[2].validation().expect("dup page was validated");
    assert!(dup.is_duplicate);
    assert_eq!(
        dup.duplicate_ref.as_deref(),
        Some("https://mirror.example.net/harbour")
    );
    assert!(!outcomes[2].is_accepted());

    let fetch_stats = pipeline.orchestrator().stats();
    assert_eq!(fetch_stats.policy_denied, 1);
    assert_eq!(fetch_stats.light_success, 2);

    let stats = pipeline.validation().stats();
    assert_eq!(stats.total_validated, 3);
    assert_eq!(stats.duplicates_found, 1);
}

#[tokio::test]
async fn test_extraction_failure_is_reported() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /\n").await;
    Mock::given(method("GET"))
        .and(path("/blank"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;

    let config = test_config(false, None);
    let pipeline = Pipeline::new(
        FetchOrchestrator::with_renderer(&config, None).unwrap(),
        Arc::new(LineExtractor),
        ValidationCoordinator::from_config(&config),
    );

    let outcomes = pipeline.run(&[format!("{}/blank", server.uri())]).await;
    match &outcomes[0] {
        PipelineOutcome::ExtractionFailed { error, fetch } => {
            assert!(fetch.success);
            assert!(error.contains("empty page"));
        }
        other => panic!("expected extraction failure, got {:?}", other),
    }
    assert_eq!(pipeline.validation().stats().total_validated, 0);
}
