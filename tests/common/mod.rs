//! Scripted in-process engine used to drive the capture pipeline without Chrome.

#![allow(dead_code)]

use bannershot::{Engine, EngineConfig, EngineFactory, Error, Result, StyleOverride};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Behaviour of one fake banner page.
#[derive(Debug, Clone)]
pub struct FakePage {
    pub height: u32,
    pub fail_navigation: bool,
    pub isi_present: bool,
    /// Settle predicate turns truthy after this many evaluations
    pub ready_after_polls: u32,
    /// Scrolling moves one pixel per position read instead of jumping
    pub scroll_creeps: bool,
}

impl FakePage {
    pub fn tall(height: u32) -> Self {
        Self {
            height,
            fail_navigation: false,
            isi_present: true,
            ready_after_polls: 0,
            scroll_creeps: false,
        }
    }
}

/// Holds every launch until `expected` launches are in flight at once.
///
/// A launch that waits longer than `timeout` fails, so a sequential caller
/// loses its captures instead of hanging.
pub struct LaunchGate {
    expected: usize,
    timeout: Duration,
    arrived: Mutex<usize>,
    all_in: Condvar,
}

impl LaunchGate {
    pub fn new(expected: usize, timeout: Duration) -> Self {
        Self {
            expected,
            timeout,
            arrived: Mutex::new(0),
            all_in: Condvar::new(),
        }
    }

    fn arrive(&self) -> Result<()> {
        let mut arrived = self.arrived.lock().unwrap();
        *arrived += 1;
        self.all_in.notify_all();
        let (arrived, wait) = self
            .all_in
            .wait_timeout_while(arrived, self.timeout, |n| *n < self.expected)
            .unwrap();
        if wait.timed_out() && *arrived < self.expected {
            return Err(Error::InitializationError(format!(
                "only {} of {} launches overlapped",
                *arrived, self.expected
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Stats {
    pub launched: usize,
    pub closed: usize,
    pub windows: Vec<(u32, u32)>,
    pub styles: Vec<StyleOverride>,
    pub screenshots: usize,
}

#[derive(Default)]
pub struct FakeBrowser {
    pages: HashMap<String, FakePage>,
    gate: Option<LaunchGate>,
    pub stats: Arc<Mutex<Stats>>,
}

impl FakeBrowser {
    pub fn with_launch_gate(mut self, gate: LaunchGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    pub fn stats(&self) -> std::sync::MutexGuard<'_, Stats> {
        self.stats.lock().unwrap()
    }
}

impl EngineFactory for FakeBrowser {
    type Engine = FakeEngine;

    fn launch(&self, config: EngineConfig) -> Result<FakeEngine> {
        if let Some(gate) = &self.gate {
            gate.arrive()?;
        }
        let mut stats = self.stats.lock().unwrap();
        stats.launched += 1;
        stats.windows.push((config.viewport.width, config.viewport.height));
        Ok(FakeEngine {
            pages: self.pages.clone(),
            width: config.viewport.width,
            fold: config.viewport.height,
            page: None,
            scroll: 0,
            target: 0,
            polls: 0,
            stats: self.stats.clone(),
        })
    }
}

pub struct FakeEngine {
    pages: HashMap<String, FakePage>,
    width: u32,
    fold: u32,
    page: Option<FakePage>,
    scroll: u32,
    target: u32,
    polls: u32,
    stats: Arc<Mutex<Stats>>,
}

/// Colour of a page row; every row up to 65535 is distinct.
pub fn row_color(y: u32) -> [u8; 4] {
    [(y % 256) as u8, ((y / 256) % 256) as u8, 0x80, 0xff]
}

impl FakeEngine {
    fn page(&self) -> Result<&FakePage> {
        self.page
            .as_ref()
            .ok_or_else(|| Error::ScriptError("no page loaded".into()))
    }
}

impl Engine for FakeEngine {
    fn load_url(&mut self, url: &str) -> Result<()> {
        let page = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| Error::LoadError(format!("404 {}", url)))?;
        if page.fail_navigation {
            return Err(Error::LoadError(format!("connection refused: {}", url)));
        }
        self.page = Some(page);
        self.scroll = 0;
        Ok(())
    }

    fn evaluate(&mut self, _script: &str) -> Result<serde_json::Value> {
        let ready_after = self.page()?.ready_after_polls;
        self.polls += 1;
        Ok(serde_json::Value::Bool(self.polls > ready_after))
    }

    fn render_png(&self) -> Result<Vec<u8>> {
        let page = self.page()?;
        let mut img = RgbaImage::new(self.width, self.fold);
        for (_, y, px) in img.enumerate_pixels_mut() {
            let page_y = self.scroll + y;
            *px = if page_y < page.height {
                Rgba(row_color(page_y))
            } else {
                Rgba([255, 255, 255, 255])
            };
        }
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(Error::from)?;
        self.stats.lock().unwrap().screenshots += 1;
        Ok(buf.into_inner())
    }

    fn wait_for_element(&self, _selector: &str, _timeout: Duration) -> Result<()> {
        self.page().map(|_| ())
    }

    fn page_height(&mut self) -> Result<u32> {
        Ok(self.page()?.height)
    }

    fn scroll_to(&mut self, y: u32) -> Result<()> {
        let page = self.page()?;
        let target = y.min(page.height.saturating_sub(self.fold));
        if !page.scroll_creeps {
            self.scroll = target;
        }
        self.target = target;
        Ok(())
    }

    fn scroll_position(&mut self) -> Result<u32> {
        if self.page()?.scroll_creeps && self.scroll < self.target {
            self.scroll += 1;
        }
        Ok(self.scroll)
    }

    fn apply_style(&mut self, style: &StyleOverride) -> Result<bool> {
        let present = self.page()?.isi_present;
        self.stats.lock().unwrap().styles.push(style.clone());
        Ok(present)
    }

    fn close(self) -> Result<()> {
        self.stats.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// Capture settings with every wait shrunk to (almost) nothing.
pub fn fast_settings() -> bannershot::CaptureSettings {
    bannershot::CaptureSettings {
        settle: bannershot::SettlePolicy::Fixed { millis: 0 },
        scroll_settle_ms: 0,
        scroll_poll_interval_ms: 1,
        scroll_timeout_ms: 500,
        ..Default::default()
    }
}

/// Read every entry of a zip archive as (name, bytes).
pub fn read_zip(path: &std::path::Path) -> Vec<(String, Vec<u8>)> {
    use std::io::Read;
    let mut zip = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    (0..zip.len())
        .map(|i| {
            let mut f = zip.by_index(i).unwrap();
            let mut buf = Vec::new();
            f.read_to_end(&mut buf).unwrap();
            (f.name().to_string(), buf)
        })
        .collect()
}
