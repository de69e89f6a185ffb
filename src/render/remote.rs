//! Remote render API tier.
//!
//! Posts the target URL to a browserless-style PDF endpoint. The tier is
//! gated on the presence of an access token; no token simply means the tier
//! is skipped, never an error.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::ConvertError;
use crate::models::ConversionResult;
use crate::render::{RenderCapabilities, RenderOutcome, RenderTier};
use crate::utils::{pdf_filename_from_url, HttpClient};

/// Default browserless-compatible PDF endpoint
const DEFAULT_RENDER_ENDPOINT: &str = "https://chrome.browserless.io/pdf";

const RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Renders webpages through a hosted browser service
pub struct RemoteRenderTier {
    client: Arc<HttpClient>,
    token: Option<String>,
    endpoint: String,
    output_dir: PathBuf,
}

impl RemoteRenderTier {
    pub fn new(client: Arc<HttpClient>, token: Option<String>, output_dir: PathBuf) -> Self {
        Self {
            client,
            token,
            endpoint: DEFAULT_RENDER_ENDPOINT.to_string(),
            output_dir,
        }
    }

    /// Override the endpoint (for testing)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn render(&self, url: &str) -> Result<ConversionResult, ConvertError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| ConvertError::Fetch("no render API credential".to_string()))?;

        let endpoint = format!("{}?token={}", self.endpoint, urlencoding::encode(token));
        debug!(url, "requesting remote render");

        let response = self
            .client
            .post(&endpoint)
            .timeout(RENDER_TIMEOUT)
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ConvertError::Fetch(format!(
                "render API returned status {}",
                response.status()
            )));
        }

        let bytes = response.bytes().await?;

        let file_name = pdf_filename_from_url(url);
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(&file_name);
        tokio::fs::write(&path, &bytes).await?;

        let title = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(String::from))
            .unwrap_or_else(|| "webpage".to_string());

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
impl RenderTier for RemoteRenderTier {
    fn name(&self) -> &'static str {
        "remote-render-api"
    }

    fn available(&self, capabilities: RenderCapabilities) -> bool {
        capabilities.contains(RenderCapabilities::REMOTE_API) && self.token.is_some()
    }

    async fn attempt(&self, url: &str) -> RenderOutcome {
        match self.render(url).await {
            Ok(result) => RenderOutcome::Produced(result),
            Err(e) => RenderOutcome::Declined(e.to_string()),
        }
    }
}
