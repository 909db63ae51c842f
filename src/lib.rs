//! Bannershot
//!
//! Captures full-page "important safety information" (ISI) screenshots of
//! banner creatives at several fixed sizes, stitches the scroll segments of
//! each size into one tall PNG, and zips the results per concept.
//!
//! # Features
//!
//! - **CDP Backend** (default): drives headless Chrome through the DevTools Protocol
//! - **Engine seam**: the capture pipeline runs against any [`Engine`], so it
//!   can be exercised without a browser
//! - **Concurrent batches**: one browser session per banner size, all sizes of
//!   a concept captured at once
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "cdp")]
//! # async fn run() -> bannershot::Result<()> {
//! use bannershot::{cdp::CdpLauncher, orchestrator, AppConfig};
//! use std::sync::Arc;
//!
//! let config = AppConfig::default();
//! let launcher = Arc::new(CdpLauncher::default());
//! for batch in &config.batches {
//!     let summary = orchestrator::run_batch(
//!         launcher.clone(),
//!         &config.catalog()?,
//!         batch,
//!         &config.capture,
//!         &config.output_dir,
//!     )
//!     .await?;
//!     println!("{} total bytes", summary.total_bytes);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

pub mod error;
pub use error::{Error, Result};

pub mod archive;
pub mod capture;
pub mod catalog;
pub mod config;
pub mod orchestrator;
pub mod rendering;

#[cfg(feature = "cdp")]
pub mod cdp;

// Async facade over a blocking engine (worker-thread backed)
pub mod async_api;

pub use async_api::Session;
pub use catalog::{BannerSize, ViewportCatalog, ViewportEntry};
pub use config::{AppConfig, BatchConfig, CaptureSettings, SettlePolicy};
pub use rendering::Screenshot;

/// Returns the maximum over the usual document height measurements.
pub const PAGE_HEIGHT_SCRIPT: &str = r#"Math.max(
    document.body ? document.body.scrollHeight : 0,
    document.body ? document.body.offsetHeight : 0,
    document.documentElement.clientHeight,
    document.documentElement.scrollHeight,
    document.documentElement.offsetHeight
)"#;

/// Returns the current vertical scroll offset.
pub const SCROLL_POSITION_SCRIPT: &str =
    "(window.scrollY || window.pageYOffset || document.documentElement.scrollTop || 0)";

/// Configuration for one browser session
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Window size; for captures this is banner width x fold height
    pub viewport: Viewport,
    /// Default timeout for driver operations in milliseconds
    pub timeout_ms: u64,
    /// How long the browser may go without driver traffic before it is
    /// considered dead; must outlast the longest settle wait
    pub idle_timeout_ms: u64,
    /// Optional user agent override
    pub user_agent: Option<String>,
    /// Run the browser without a visible window
    pub headless: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            timeout_ms: 30000,
            idle_timeout_ms: 60000,
            user_agent: None,
            headless: true,
        }
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// A style property forced onto the first element matching `selector`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleOverride {
    pub selector: String,
    pub property: String,
    pub value: String,
}

impl StyleOverride {
    pub fn new(selector: impl Into<String>, property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            property: property.into(),
            value: value.into(),
        }
    }

    /// Build an override from a raw `property:value` declaration.
    pub fn parse(selector: &str, declaration: &str) -> Result<Self> {
        let (property, value) = declaration
            .split_once(':')
            .ok_or_else(|| Error::ConfigError(format!("declaration '{}' is not property:value", declaration)))?;
        let property = property.trim();
        let value = value.trim().trim_end_matches(';').trim();
        if property.is_empty() || value.is_empty() {
            return Err(Error::ConfigError(format!("declaration '{}' is incomplete", declaration)));
        }
        Ok(Self::new(selector, property, value))
    }

    /// Page script that applies the override and evaluates to whether an
    /// element matched. All three parts are embedded as JSON string literals.
    pub fn to_script(&self) -> String {
        let lit = |s: &str| serde_json::Value::String(s.to_string()).to_string();
        format!(
            "(function(){{const el=document.querySelector({sel});if(!el){{return false;}}el.style.setProperty({prop},{val});return true;}})()",
            sel = lit(&self.selector),
            prop = lit(&self.property),
            val = lit(&self.value),
        )
    }
}

/// Core trait for browser engine implementations.
///
/// Engines are synchronous and single-owner; [`Session`] moves one onto a
/// worker thread and exposes it to async code.
pub trait Engine {
    /// Load a URL and wait for navigation to complete
    fn load_url(&mut self, url: &str) -> Result<()>;

    /// Evaluate JavaScript in the page's global context. `undefined` maps to `Null`.
    fn evaluate(&mut self, script: &str) -> Result<serde_json::Value>;

    /// Capture the visible viewport as an encoded PNG
    fn render_png(&self) -> Result<Vec<u8>>;

    /// Block until an element matching `selector` exists or `timeout` elapses
    fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<()>;

    // --- Higher-level helpers (default implementations) ---

    /// Full scrollable content height in CSS pixels
    fn page_height(&mut self) -> Result<u32> {
        let v = self.evaluate(PAGE_HEIGHT_SCRIPT)?;
        json_to_px(&v).ok_or_else(|| Error::ScriptError(format!("page height script returned {}", v)))
    }

    /// Scroll the window so that `y` is at the top of the viewport
    fn scroll_to(&mut self, y: u32) -> Result<()> {
        self.evaluate(&format!("window.scrollTo(0, {});", y))?;
        Ok(())
    }

    /// Current vertical scroll offset
    fn scroll_position(&mut self) -> Result<u32> {
        let v = self.evaluate(SCROLL_POSITION_SCRIPT)?;
        json_to_px(&v).ok_or_else(|| Error::ScriptError(format!("scroll position script returned {}", v)))
    }

    /// Apply a style override; `Ok(false)` when nothing matched the selector
    fn apply_style(&mut self, style: &StyleOverride) -> Result<bool> {
        let v = self.evaluate(&style.to_script())?;
        Ok(v.as_bool().unwrap_or(false))
    }

    /// Close the engine and terminate the browser process
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Launches a fresh, unshared engine per capture.
pub trait EngineFactory: Send + Sync + 'static {
    type Engine: Engine;

    fn launch(&self, config: EngineConfig) -> Result<Self::Engine>;
}

/// Interpret a script result as a non-negative pixel count, rounding up.
pub fn json_to_px(v: &serde_json::Value) -> Option<u32> {
    let n = v.as_f64()?;
    if !n.is_finite() || n < 0.0 {
        return None;
    }
    Some(n.ceil().min(u32::MAX as f64) as u32)
}

/// Whether a script result counts as "true" in JavaScript terms.
pub fn json_truthy(v: &serde_json::Value) -> bool {
    match v {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}
