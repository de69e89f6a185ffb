//! Configuration management.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::render::RenderCapabilities;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory all artifacts are written into (flat, filename-addressed)
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Pause between batch items, in milliseconds
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// How many arXiv paper URLs in one batch trigger a selection preview
    /// instead of immediate downloads
    #[serde(default = "default_selection_threshold")]
    pub selection_threshold: usize,

    /// Render fallback chain settings
    #[serde(default)]
    pub render: RenderSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            pacing_ms: default_pacing_ms(),
            selection_threshold: default_selection_threshold(),
            render: RenderSettings::default(),
        }
    }
}

impl Settings {
    /// Inter-item pacing as a duration
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

/// Render fallback chain settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Whether a headless browser can be launched in this environment
    #[serde(default = "default_headless_enabled")]
    pub headless_enabled: bool,

    /// Access token for the remote render API; absence skips that tier
    #[serde(default = "default_render_token")]
    pub render_api_token: Option<String>,

    /// Per-page render timeout in seconds
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            headless_enabled: default_headless_enabled(),
            render_api_token: default_render_token(),
            page_timeout_secs: default_page_timeout_secs(),
        }
    }
}

impl RenderSettings {
    /// The capability descriptor injected into the render chain
    pub fn capabilities(&self) -> RenderCapabilities {
        let mut caps = RenderCapabilities::EXTRACTION;
        if self.headless_enabled {
            caps |= RenderCapabilities::HEADLESS;
        }
        if self.render_api_token.is_some() {
            caps |= RenderCapabilities::REMOTE_API;
        }
        caps
    }

    /// Per-page render timeout as a duration
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }
}

fn default_output_dir() -> PathBuf {
    std::env::var("DOCPULL_OUTPUT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./downloads"))
}

fn default_pacing_ms() -> u64 {
    std::env::var("DOCPULL_PACING_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1000)
}

fn default_selection_threshold() -> usize {
    std::env::var("DOCPULL_SELECTION_THRESHOLD")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3)
}

fn default_headless_enabled() -> bool {
    std::env::var("DOCPULL_DISABLE_HEADLESS").is_err()
}

fn default_render_token() -> Option<String> {
    std::env::var("BROWSERLESS_TOKEN").ok().filter(|t| !t.is_empty())
}

fn default_page_timeout_secs() -> u64 {
    30
}

/// Locate a settings file: `./docpull.toml`, then the platform config dir.
pub fn find_settings_file() -> Option<PathBuf> {
    let local = PathBuf::from("docpull.toml");
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("docpull").join("config.toml"))
        .filter(|path| path.exists())
}

/// Load settings from a file, layered with `DOCPULL_*` environment variables.
pub fn load_settings(path: &PathBuf) -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path.as_path()))
        .add_source(config::Environment::with_prefix("DOCPULL"))
        .build()?;

    settings.try_deserialize()
}

/// Get settings from environment variables and defaults alone.
pub fn get_settings() -> Settings {
    Settings::default()
}
