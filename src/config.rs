//! Application configuration: batches, catalog and capture tuning.
//!
//! Everything has a default that reproduces the stock run (two concepts
//! served from a local dev server, four IAB sizes). A TOML file can override
//! any part of it:
//!
//! ```toml
//! output_dir = "out"
//!
//! [capture]
//! scroll_settle_ms = 150
//! settle = { mode = "predicate", script = "window.__isiReady === true", poll_interval_ms = 200, timeout_ms = 20000 }
//!
//! [[batch]]
//! base_url = "http://127.0.0.1:5500/dev/v3"
//! concept = "v3"
//!
//! [[viewport]]
//! width = 300
//! height = 250
//! fold = 1500
//! ```

use crate::catalog::{BannerSize, ViewportCatalog, ViewportEntry};
use crate::{Error, Result, StyleOverride};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory the per-concept archives are written into
    pub output_dir: PathBuf,
    pub capture: CaptureSettings,
    #[serde(rename = "batch")]
    pub batches: Vec<BatchConfig>,
    #[serde(rename = "viewport")]
    pub viewports: Vec<ViewportEntry>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            capture: CaptureSettings::default(),
            batches: vec![
                BatchConfig::new("http://127.0.0.1:5500/dev/v1", "v1"),
                BatchConfig::new("http://127.0.0.1:5500/dev/v2", "v2"),
            ],
            viewports: ViewportCatalog::builtin().entries().to_vec(),
        }
    }
}

impl AppConfig {
    /// Read and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).map_err(|e| Error::ConfigError(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batches.is_empty() {
            return Err(Error::ConfigError("no batches configured".into()));
        }
        for batch in &self.batches {
            batch.validate()?;
        }
        let mut concepts: Vec<&str> = self.batches.iter().map(|b| b.concept.as_str()).collect();
        concepts.sort_unstable();
        if let Some(w) = concepts.windows(2).find(|w| w[0] == w[1]) {
            return Err(Error::ConfigError(format!(
                "concept '{}' is configured twice and would overwrite its archive",
                w[0]
            )));
        }
        self.catalog()?;
        self.capture.validate()
    }

    /// The viewport entries as a validated, immutable catalog.
    pub fn catalog(&self) -> Result<ViewportCatalog> {
        ViewportCatalog::new(self.viewports.clone())
    }
}

/// One orchestration run: a base URL serving `<base>/<W>x<H>/` pages and
/// the concept name the archive is labelled with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub base_url: String,
    pub concept: String,
}

impl BatchConfig {
    pub fn new(base_url: impl Into<String>, concept: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            concept: concept.into(),
        }
    }

    /// Page URL for one banner size.
    pub fn url_for(&self, size: BannerSize) -> String {
        format!("{}/{}/", self.base_url.trim_end_matches('/'), size)
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url)
            .map_err(|e| Error::ConfigError(format!("invalid base URL '{}': {}", self.base_url, e)))?;
        let c = self.concept.as_str();
        if c.is_empty() || c == "." || c == ".." || c.contains(['/', '\\']) {
            return Err(Error::ConfigError(format!("concept name '{}' is not a valid file name part", c)));
        }
        Ok(())
    }
}

impl FromStr for BatchConfig {
    type Err = Error;

    /// Parses `<base_url>=<concept>`; the concept is split off the last `=`.
    fn from_str(s: &str) -> Result<Self> {
        let (url, concept) = s
            .rsplit_once('=')
            .ok_or_else(|| Error::ConfigError(format!("expected <base_url>=<concept>, got '{}'", s)))?;
        let batch = Self::new(url.trim(), concept.trim());
        batch.validate()?;
        Ok(batch)
    }
}

/// How long to wait after navigation before touching the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SettlePolicy {
    /// Sleep a fixed wall-clock duration.
    Fixed { millis: u64 },
    /// Poll `script` until it evaluates truthy; give up after `timeout_ms`.
    Predicate {
        script: String,
        poll_interval_ms: u64,
        timeout_ms: u64,
    },
}

impl Default for SettlePolicy {
    fn default() -> Self {
        SettlePolicy::Fixed { millis: 16_000 }
    }
}

impl SettlePolicy {
    /// Longest the page can sit idle under this policy.
    pub fn max_wait_ms(&self) -> u64 {
        match self {
            SettlePolicy::Fixed { millis } => *millis,
            SettlePolicy::Predicate { timeout_ms, .. } => *timeout_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub settle: SettlePolicy,
    /// Fixed pause after the scroll position has been observed at its target
    pub scroll_settle_ms: u64,
    pub scroll_poll_interval_ms: u64,
    /// Upper bound on waiting for a scroll to land
    pub scroll_timeout_ms: u64,
    /// Default timeout for individual driver operations
    pub driver_timeout_ms: u64,
    /// Tallest composite canvas a capture may allocate; taller pages fail
    pub max_canvas_height: u32,
    /// Elements whose height is forced to the fold before capture
    pub isi_selectors: Vec<String>,
    /// Fail the capture when none of `isi_selectors` match
    pub require_isi_match: bool,
    pub user_agent: Option<String>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            settle: SettlePolicy::default(),
            scroll_settle_ms: 100,
            scroll_poll_interval_ms: 25,
            scroll_timeout_ms: 2_000,
            driver_timeout_ms: 30_000,
            max_canvas_height: 60_000,
            isi_selectors: vec!["#isiB".into(), "#isiBox".into(), "#main".into()],
            require_isi_match: false,
            user_agent: None,
        }
    }
}

impl CaptureSettings {
    pub fn validate(&self) -> Result<()> {
        if let SettlePolicy::Predicate {
            script,
            poll_interval_ms,
            ..
        } = &self.settle
        {
            if script.trim().is_empty() {
                return Err(Error::ConfigError("settle predicate script is empty".into()));
            }
            if *poll_interval_ms == 0 {
                return Err(Error::ConfigError("settle poll interval must be non-zero".into()));
            }
        }
        if self.scroll_poll_interval_ms == 0 {
            return Err(Error::ConfigError("scroll poll interval must be non-zero".into()));
        }
        if self.max_canvas_height == 0 {
            return Err(Error::ConfigError("max_canvas_height must be non-zero".into()));
        }
        if self.require_isi_match && self.isi_selectors.is_empty() {
            return Err(Error::ConfigError("require_isi_match is set but no ISI selectors are configured".into()));
        }
        Ok(())
    }

    /// Height overrides pinning every ISI selector to `fold` pixels.
    pub fn isi_overrides(&self, fold: u32) -> Vec<StyleOverride> {
        self.isi_selectors
            .iter()
            .map(|sel| StyleOverride::new(sel.as_str(), "height", format!("{}px", fold)))
            .collect()
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_stock_run() {
        let c = AppConfig::default();
        c.validate().unwrap();
        assert_eq!(c.batches.len(), 2);
        assert_eq!(c.batches[0].concept, "v1");
        assert_eq!(c.batches[1].base_url, "http://127.0.0.1:5500/dev/v2");
        assert_eq!(c.catalog().unwrap(), ViewportCatalog::builtin());
        assert_eq!(c.capture.settle, SettlePolicy::Fixed { millis: 16_000 });
    }

    #[test]
    fn url_for_appends_size_with_trailing_slash() {
        let b = BatchConfig::new("http://host/v1", "v1");
        assert_eq!(b.url_for(BannerSize::new(300, 250)), "http://host/v1/300x250/");
        let b = BatchConfig::new("http://host/v1/", "v1");
        assert_eq!(b.url_for(BannerSize::new(728, 90)), "http://host/v1/728x90/");
    }

    #[test]
    fn isi_overrides_cover_all_selectors() {
        let s = CaptureSettings::default();
        let ov = s.isi_overrides(2000);
        assert_eq!(ov.len(), 3);
        assert_eq!(ov[0], StyleOverride::new("#isiB", "height", "2000px"));
        assert_eq!(ov[2].selector, "#main");
    }

    #[test]
    fn toml_overrides_are_merged_with_defaults() {
        let c = AppConfig::from_toml_str(
            r#"
output_dir = "out"

[capture]
scroll_settle_ms = 250
settle = { mode = "predicate", script = "window.ready", poll_interval_ms = 100, timeout_ms = 5000 }

[[batch]]
base_url = "http://localhost:8080/dev/v3"
concept = "v3"

[[viewport]]
width = 300
height = 250
fold = 1200
"#,
        )
        .unwrap();

        assert_eq!(c.output_dir, PathBuf::from("out"));
        assert_eq!(c.capture.scroll_settle_ms, 250);
        assert_eq!(c.capture.driver_timeout_ms, 30_000);
        assert!(matches!(c.capture.settle, SettlePolicy::Predicate { timeout_ms: 5000, .. }));
        assert_eq!(c.batches, vec![BatchConfig::new("http://localhost:8080/dev/v3", "v3")]);
        assert_eq!(c.catalog().unwrap().fold_for(BannerSize::new(300, 250)), Some(1200));
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(AppConfig::from_toml_str("batch = []").is_err());
        assert!(AppConfig::from_toml_str(
            "[[batch]]\nbase_url = \"not a url\"\nconcept = \"v1\"\n"
        )
        .is_err());
        assert!(AppConfig::from_toml_str(
            "[[batch]]\nbase_url = \"http://h/a\"\nconcept = \"../x\"\n"
        )
        .is_err());
        assert!(AppConfig::from_toml_str(
            "[[batch]]\nbase_url = \"http://h/a\"\nconcept = \"v1\"\n[[batch]]\nbase_url = \"http://h/b\"\nconcept = \"v1\"\n"
        )
        .is_err());
        assert!(AppConfig::from_toml_str(
            "[[viewport]]\nwidth = 300\nheight = 250\nfold = 0\n"
        )
        .is_err());
        assert!(AppConfig::from_toml_str("[capture]\nmax_canvas_height = 0\n").is_err());
    }

    #[test]
    fn settle_wait_covers_both_policies() {
        assert_eq!(SettlePolicy::default().max_wait_ms(), 16_000);
        let p = SettlePolicy::Predicate {
            script: "window.ready".into(),
            poll_interval_ms: 50,
            timeout_ms: 45_000,
        };
        assert_eq!(p.max_wait_ms(), 45_000);
    }

    #[test]
    fn batch_parses_from_cli_form() {
        let b: BatchConfig = "http://127.0.0.1:5500/dev/v1=v1".parse().unwrap();
        assert_eq!(b, BatchConfig::new("http://127.0.0.1:5500/dev/v1", "v1"));

        let b: BatchConfig = "http://h/p?x=1=final".parse().unwrap();
        assert_eq!(b.base_url, "http://h/p?x=1");
        assert_eq!(b.concept, "final");

        assert!("http://h/p".parse::<BatchConfig>().is_err());
        assert!("http://h/p=".parse::<BatchConfig>().is_err());
    }
}
