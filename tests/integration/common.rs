//! Shared fixtures

use async_trait::async_trait;
use std::path::Path;
use sumi_harvest::config::{parse_config, Config};
use sumi_harvest::fetch::{PageRenderer, RenderedPage};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Configuration allowing the mock servers' host, with fast retries
pub fn test_config(enable_render: bool, dedup_path: Option<&Path>) -> Config {
    let dedup = match dedup_path {
        Some(p) => format!("[dedup]\ndatabase-path = \"{}\"\n", p.display()),
        None => String::new(),
    };

    parse_config(&format!(
        r#"
[user-agent]
crawler-name = "HarvestTestBot"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "ops@example.com"

[compliance]
allowed-domains = ["127.0.0.1"]
rate-limit-per-second = 200.0
max-requests-per-window = 1000
window-duration-seconds = 60
robots-timeout-seconds = 2.0

[fetch]
http-timeout-seconds = 2.0
render-timeout-seconds = 2.0
max-retries = 3
max-concurrency = 4
backoff-min-ms = 1
backoff-max-ms = 5
enable-render = {enable_render}

{dedup}
"#
    ))
    .expect("test config is valid")
}

/// Serves `body` as robots.txt
pub async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Renderer that always produces the same page
pub struct StaticRenderer(pub &'static str);

#[async_trait]
impl PageRenderer for StaticRenderer {
    async fn render(&self, url: &str) -> anyhow::Result<RenderedPage> {
        Ok(RenderedPage {
            html: self.0.to_string(),
            status_code: Some(200),
            final_url: Some(url.to_string()),
        })
    }
}
