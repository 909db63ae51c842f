//! Chrome DevTools Protocol adapter implementation

use crate::{Engine, EngineConfig, EngineFactory, Error, Result};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// CDP-based engine (uses the `headless_chrome` crate)
///
/// Each instance launches its own Chrome process with a window of exactly
/// the configured viewport size and drives a single tab in it.
pub struct CdpEngine {
    browser: Browser,
    tab: Arc<Tab>,
}

impl CdpEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .idle_browser_timeout(Duration::from_millis(config.idle_timeout_ms))
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;

        tab.set_default_timeout(Duration::from_millis(config.timeout_ms));

        if let Some(ua) = &config.user_agent {
            tab.set_user_agent(ua, None, None)
                .map_err(|e| Error::InitializationError(format!("Failed to set user agent: {}", e)))?;
        }

        debug!(
            "launched chrome session {}x{}",
            config.viewport.width, config.viewport.height
        );

        Ok(Self { browser, tab })
    }
}

impl Engine for CdpEngine {
    fn load_url(&mut self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| Error::LoadError(format!("Navigation to {} failed: {}", url, e)))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::LoadError(format!("Wait for navigation to {} failed: {}", url, e)))?;

        Ok(())
    }

    fn evaluate(&mut self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .tab
            .evaluate(script, true)
            .map_err(|e| Error::ScriptError(format!("Evaluation failed: {}", e)))?;

        Ok(result.value.unwrap_or(serde_json::Value::Null))
    }

    fn render_png(&self) -> Result<Vec<u8>> {
        self.tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| Error::RenderError(format!("Screenshot failed: {}", e)))
    }

    fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map_err(|e| {
                Error::CdpError(format!(
                    "element '{}' did not appear within {}ms: {}",
                    selector,
                    timeout.as_millis(),
                    e
                ))
            })?;
        Ok(())
    }

    fn close(self) -> Result<()> {
        // Dropping the browser kills the child process.
        drop(self.tab);
        drop(self.browser);
        Ok(())
    }
}

/// Launches one [`CdpEngine`] per capture.
#[derive(Debug, Clone, Default)]
pub struct CdpLauncher;

impl EngineFactory for CdpLauncher {
    type Engine = CdpEngine;

    fn launch(&self, config: EngineConfig) -> Result<CdpEngine> {
        CdpEngine::new(config)
    }
}
