//! Browser rendering fallback
//!
//! Pages that only produce their content after running JavaScript are
//! retrieved through a `PageRenderer`. The renderer is a black box to the
//! rest of the crate: it takes a URL and hands back the rendered HTML.

use crate::fetch::{FailureKind, FetchOutcome, FetchStrategy, RetryPolicy, StrategyKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// HTML captured from a rendered page
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    /// Serialized DOM after navigation settled
    pub html: String,

    /// Status of the main document response, when the renderer knows it
    pub status_code: Option<u16>,

    /// URL the browser ended up on after redirects
    pub final_url: Option<String>,
}

/// Something that can load a URL in a browser and return the resulting HTML
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> anyhow::Result<RenderedPage>;
}

/// Expensive fallback strategy backed by a `PageRenderer`
///
/// Each render is bounded by `timeout` and retried at most once.
pub struct RenderFetchStrategy {
    renderer: Arc<dyn PageRenderer>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl RenderFetchStrategy {
    pub fn new(renderer: Arc<dyn PageRenderer>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            renderer,
            timeout,
            retry,
        }
    }

    async fn attempt(&self, url: &str) -> Result<RenderedPage, String> {
        match tokio::time::timeout(self.timeout, self.renderer.render(url)).await {
            Ok(Ok(page)) => Ok(page),
            Ok(Err(e)) => Err(format!("Render failed: {:#}", e)),
            Err(_) => Err(format!("Render timed out after {:?}", self.timeout)),
        }
    }
}

#[async_trait]
impl FetchStrategy for RenderFetchStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Render
    }

    async fn fetch(&self, url: &str) -> FetchOutcome {
        let started = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;

            let error = match self.attempt(url).await {
                Ok(page) => {
                    tracing::debug!("Rendered {} on attempt {}", url, attempts);
                    let mut headers = HashMap::new();
                    if let Some(final_url) = page.final_url {
                        headers.insert("x-final-url".to_string(), final_url);
                    }
                    return FetchOutcome::succeeded(
                        url,
                        StrategyKind::Render,
                        page.html,
                        page.status_code,
                        headers,
                    )
                    .with_retries(attempts - 1)
                    .with_elapsed(started.elapsed());
                }
                Err(e) => e,
            };

            if !self.retry.should_retry(attempts) {
                tracing::warn!("Rendering {} failed after {} attempts: {}", url, attempts, error);
                return FetchOutcome::failed(
                    url,
                    Some(StrategyKind::Render),
                    FailureKind::Render,
                    error,
                )
                .with_retries(attempts - 1)
                .with_elapsed(started.elapsed());
            }

            let delay = self.retry.backoff(attempts);
            tracing::debug!("{}; retrying render of {} in {:?}", error, url, delay);
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(feature = "browser")]
pub use chromium::ChromiumRenderer;

#[cfg(feature = "browser")]
mod chromium {
    use super::{PageRenderer, RenderedPage};
    use anyhow::Context;
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use chromiumoxide::Page;
    use futures::StreamExt;
    use std::ops::Deref;
    use std::sync::Arc;
    use tokio::runtime::Handle;
    use tokio::sync::Mutex;
    use tokio::task::JoinHandle;

    /// A running browser and the task driving its CDP connection
    struct Launched {
        browser: Arc<Browser>,
        handler: JoinHandle<()>,
    }

    impl Launched {
        /// The handler task ends when the connection to chromium is gone
        fn is_alive(&self) -> bool {
            !self.handler.is_finished()
        }
    }

    /// Closes its tab when dropped
    ///
    /// A render abandoned mid-flight (for example by the render timeout)
    /// drops the guard instead of reaching `close`, so the close is spawned
    /// onto the runtime from `Drop`.
    struct TabGuard {
        page: Page,
        url: String,
        closed: bool,
        runtime: Handle,
    }

    impl TabGuard {
        fn new(page: Page, url: &str) -> Self {
            Self {
                page,
                url: url.to_string(),
                closed: false,
                runtime: Handle::current(),
            }
        }

        async fn close(mut self) {
            self.closed = true;
            if let Err(e) = self.page.clone().close().await {
                tracing::debug!("Failed to close tab for {}: {}", self.url, e);
            }
        }
    }

    impl Deref for TabGuard {
        type Target = Page;

        fn deref(&self) -> &Page {
            &self.page
        }
    }

    impl Drop for TabGuard {
        fn drop(&mut self) {
            if self.closed {
                return;
            }
            let page = self.page.clone();
            let url = std::mem::take(&mut self.url);
            self.runtime.spawn(async move {
                match page.close().await {
                    Ok(()) => tracing::trace!("Closed abandoned tab for {}", url),
                    Err(e) => tracing::debug!("Failed to close abandoned tab for {}: {}", url, e),
                }
            });
        }
    }

    /// Headless chromium shared by every render
    ///
    /// The browser is launched on the first render and reused afterwards. If
    /// its connection dies, the next render launches a fresh one. Each render
    /// gets its own tab, closed once the HTML is captured or the render is
    /// abandoned.
    pub struct ChromiumRenderer {
        user_agent: String,
        browser: Mutex<Option<Launched>>,
    }

    impl ChromiumRenderer {
        pub fn new(user_agent: impl Into<String>) -> Self {
            Self {
                user_agent: user_agent.into(),
                browser: Mutex::new(None),
            }
        }

        async fn browser(&self) -> anyhow::Result<Arc<Browser>> {
            let mut slot = self.browser.lock().await;

            if let Some(launched) = slot.as_ref() {
                if launched.is_alive() {
                    return Ok(Arc::clone(&launched.browser));
                }
                tracing::warn!("Chromium connection lost, relaunching");
            }

            let launched = self.launch().await?;
            let browser = Arc::clone(&launched.browser);
            *slot = Some(launched);
            Ok(browser)
        }

        async fn launch(&self) -> anyhow::Result<Launched> {
            let config = BrowserConfig::builder()
                .arg(format!("--user-agent={}", self.user_agent))
                .build()
                .map_err(|e| anyhow::anyhow!("Invalid browser config: {}", e))?;

            let (browser, mut handler) = Browser::launch(config)
                .await
                .context("Failed to launch chromium")?;

            // Individual CDP errors are not fatal; the stream ends when the
            // connection closes
            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(e) = event {
                        tracing::debug!("Chromium handler error: {}", e);
                    }
                }
                tracing::debug!("Chromium handler exited");
            });

            tracing::info!("Launched headless chromium for rendering");
            Ok(Launched {
                browser: Arc::new(browser),
                handler,
            })
        }
    }

    #[async_trait]
    impl PageRenderer for ChromiumRenderer {
        async fn render(&self, url: &str) -> anyhow::Result<RenderedPage> {
            let browser = self.browser().await?;
            let tab = TabGuard::new(
                browser
                    .new_page("about:blank")
                    .await
                    .context("Failed to open tab")?,
                url,
            );

            let rendered = async {
                tab.goto(url).await.context("Navigation failed")?;
                tab.wait_for_navigation()
                    .await
                    .context("Page never settled")?;
                let html = tab.content().await.context("Failed to read DOM")?;
                let final_url = tab.url().await.ok().flatten();
                Ok::<_, anyhow::Error>(RenderedPage {
                    html,
                    status_code: None,
                    final_url,
                })
            }
            .await;

            tab.close().await;
            rendered
        }
    }

}
