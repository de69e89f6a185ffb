//! Headless-browser PDF rendering.
//!
//! Launches a fresh browser per render and tears it down before returning,
//! so the capability is never shared between in-flight conversions. Any
//! failure (launch, navigation, print) surfaces as a declined tier, not an
//! error.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::ConvertError;
use crate::models::ConversionResult;
use crate::render::{RenderCapabilities, RenderOutcome, RenderTier};
use crate::utils::{date_stamp, sanitize_title, BROWSER_USER_AGENT};

/// A4 paper in inches
const PAPER_WIDTH_IN: f64 = 8.27;
const PAPER_HEIGHT_IN: f64 = 11.7;
/// Fixed page margin in inches (roughly 20px at 96dpi)
const MARGIN_IN: f64 = 0.4;

/// Renders webpages to paginated PDFs with a headless browser
pub struct HeadlessTier {
    output_dir: PathBuf,
    page_timeout: Duration,
}

impl HeadlessTier {
    pub fn new(output_dir: PathBuf, page_timeout: Duration) -> Self {
        Self {
            output_dir,
            page_timeout,
        }
    }

    async fn render(&self, url: &str) -> Result<ConversionResult, ConvertError> {
        let config = BrowserConfig::builder()
            .new_headless_mode()
            .args(vec![
                "--no-sandbox",
                "--disable-setuid-sandbox",
                "--disable-gpu",
                "--disable-dev-shm-usage",
            ])
            .build()
            .map_err(|e| ConvertError::Fetch(format!("browser config: {}", e)))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ConvertError::Fetch(format!("browser launch: {}", e)))?;

        // Drive browser events until the browser goes away
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = self.render_page(&browser, url).await;

        // The browser is owned exclusively by this render; tear it down
        // before the capability can be reused
        if let Err(e) = browser.close().await {
            warn!(error = %e, "browser close failed");
        }
        let _ = browser.wait().await;
        events.abort();

        result
    }

    async fn render_page(
        &self,
        browser: &Browser,
        url: &str,
    ) -> Result<ConversionResult, ConvertError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ConvertError::Fetch(format!("new page: {}", e)))?;

        page.set_user_agent(BROWSER_USER_AGENT)
            .await
            .map_err(|e| ConvertError::Fetch(format!("set user agent: {}", e)))?;

        debug!(url, "navigating");
        page.goto(url)
            .await
            .map_err(|e| ConvertError::Fetch(format!("navigation: {}", e)))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| ConvertError::Fetch(format!("navigation wait: {}", e)))?;

        let title = page
            .get_title()
            .await
            .ok()
            .flatten()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "webpage".to_string());

        let file_name = format!("{}_{}.pdf", sanitize_title(&title), date_stamp());

        debug!(url, title, "printing to PDF");
        let params = PrintToPdfParams {
            print_background: Some(true),
            paper_width: Some(PAPER_WIDTH_IN),
            paper_height: Some(PAPER_HEIGHT_IN),
            margin_top: Some(MARGIN_IN),
            margin_bottom: Some(MARGIN_IN),
            margin_left: Some(MARGIN_IN),
            margin_right: Some(MARGIN_IN),
            ..Default::default()
        };
        let bytes = page
            .pdf(params)
            .await
            .map_err(|e| ConvertError::Fetch(format!("pdf print: {}", e)))?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(&file_name);
        tokio::fs::write(&path, &bytes).await?;

        let _ = page.close().await;

        Ok(ConversionResult::direct_pdf(
            url,
            title,
            path,
            file_name,
            bytes.len() as u64,
        ))
    }
}

#[async_trait]
impl RenderTier for HeadlessTier {
    fn name(&self) -> &'static str {
        "headless-browser"
    }

    fn available(&self, capabilities: RenderCapabilities) -> bool {
        capabilities.contains(RenderCapabilities::HEADLESS)
    }

    async fn attempt(&self, url: &str) -> RenderOutcome {
        match timeout(self.page_timeout, self.render(url)).await {
            Ok(Ok(result)) => RenderOutcome::Produced(result),
            Ok(Err(e)) => RenderOutcome::Declined(e.to_string()),
            Err(_) => RenderOutcome::Declined(format!(
                "render timed out after {:?}",
                self.page_timeout
            )),
        }
    }
}
