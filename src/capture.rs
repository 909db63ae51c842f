//! Page capturer: one browser session per banner size, scrolled fold by fold
//! and stitched into a single composite PNG.

use crate::async_api::Session;
use crate::catalog::{BannerSize, ViewportEntry};
use crate::config::{BatchConfig, CaptureSettings, SettlePolicy};
use crate::rendering::{Composite, Screenshot, TilePlan};
use crate::{json_truthy, EngineConfig, EngineFactory, Error, Result, StyleOverride, Viewport};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Headroom on top of the longest expected quiet period before Chrome is
/// treated as idle.
const IDLE_MARGIN_MS: u64 = 30_000;

/// Everything needed to capture one banner size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub url: String,
    pub size: BannerSize,
    /// Window and composite width
    pub width: u32,
    /// Window height and tile height
    pub fold: u32,
    pub styles: Vec<StyleOverride>,
}

impl CaptureRequest {
    /// Request for one catalog entry of a batch, with the ISI box pinned to the fold.
    pub fn for_entry(batch: &BatchConfig, entry: &ViewportEntry, settings: &CaptureSettings) -> Self {
        Self {
            url: batch.url_for(entry.size()),
            size: entry.size(),
            width: entry.width,
            fold: entry.fold,
            styles: settings.isi_overrides(entry.fold),
        }
    }

    fn engine_config(&self, settings: &CaptureSettings) -> EngineConfig {
        EngineConfig {
            viewport: Viewport {
                width: self.width,
                height: self.fold,
            },
            timeout_ms: settings.driver_timeout_ms,
            idle_timeout_ms: settings
                .settle
                .max_wait_ms()
                .max(settings.driver_timeout_ms)
                .max(settings.scroll_timeout_ms)
                .saturating_add(IDLE_MARGIN_MS),
            user_agent: settings.user_agent.clone(),
            headless: true,
        }
    }
}

/// Capture a full page, logging and swallowing any failure.
///
/// `None` means the capture failed; the browser session has been torn down
/// either way.
pub async fn capture_full_page<F>(
    factory: Arc<F>,
    request: &CaptureRequest,
    settings: &CaptureSettings,
) -> Option<Screenshot>
where
    F: EngineFactory,
{
    match try_capture(factory, request, settings).await {
        Ok(shot) => Some(shot),
        Err(e) => {
            error!("capture of {} ({}) failed: {}", request.url, request.size, e);
            None
        }
    }
}

/// Capture a full page, returning the first error encountered.
pub async fn try_capture<F>(factory: Arc<F>, request: &CaptureRequest, settings: &CaptureSettings) -> Result<Screenshot>
where
    F: EngineFactory,
{
    let started = Instant::now();
    let session = Session::launch(factory, request.engine_config(settings)).await?;

    let result = capture_in_session(&session, request, settings).await;

    if let Err(e) = session.close().await {
        warn!("closing session for {} failed: {}", request.url, e);
    }

    if let Ok(shot) = &result {
        info!(
            "captured {} at {}x{} ({} tiles) in {:.1}s",
            request.size,
            shot.width,
            shot.height,
            shot.tiles(request.fold),
            started.elapsed().as_secs_f32()
        );
    }
    result
}

async fn capture_in_session(session: &Session, request: &CaptureRequest, settings: &CaptureSettings) -> Result<Screenshot> {
    session.goto(&request.url).await?;
    settle(session, &settings.settle).await?;
    session
        .wait_for_element("body", Duration::from_millis(settings.driver_timeout_ms))
        .await?;

    let mut matched = 0usize;
    for style in &request.styles {
        if session.apply_style(style).await? {
            matched += 1;
        } else {
            debug!("no element matches {} on {}", style.selector, request.url);
        }
    }
    if settings.require_isi_match && !request.styles.is_empty() && matched == 0 {
        return Err(Error::RenderError(format!(
            "none of the ISI selectors matched on {}",
            request.url
        )));
    }

    let page_height = session.page_height().await?;
    let plan = TilePlan::new(page_height, request.fold)?;
    if plan.canvas_height() > settings.max_canvas_height {
        return Err(Error::RenderError(format!(
            "page height {}px needs a {}px canvas, above the {}px limit",
            page_height,
            plan.canvas_height(),
            settings.max_canvas_height
        )));
    }
    debug!(
        "{}: page height {}px, {} tile(s) of {}px",
        request.size, page_height, plan.tiles, request.fold
    );

    let mut composite = Composite::new(request.width, &plan);
    for y in plan.offsets() {
        if y > 0 {
            scroll_and_settle(session, y, settings).await?;
        }
        let tile = session.screenshot().await?;
        composite.draw_tile(&tile, y)?;
    }

    tokio::task::spawn_blocking(move || composite.encode())
        .await
        .map_err(|e| Error::Other(format!("encode task failed: {}", e)))?
}

/// Wait for the page to be ready to capture.
async fn settle(session: &Session, policy: &SettlePolicy) -> Result<()> {
    match policy {
        SettlePolicy::Fixed { millis } => {
            tokio::time::sleep(Duration::from_millis(*millis)).await;
            Ok(())
        }
        SettlePolicy::Predicate {
            script,
            poll_interval_ms,
            timeout_ms,
        } => {
            let deadline = Instant::now() + Duration::from_millis(*timeout_ms);
            loop {
                if json_truthy(&session.eval(script).await?) {
                    return Ok(());
                }
                if Instant::now() >= deadline {
                    return Err(Error::Timeout(*timeout_ms));
                }
                tokio::time::sleep(Duration::from_millis(*poll_interval_ms)).await;
            }
        }
    }
}

/// Scroll to `y` and wait until the scroll offset has landed.
///
/// The offset counts as landed when it equals `y`, or when two consecutive
/// polls agree (the page bottom clamps the scroll short of `y`).
async fn scroll_and_settle(session: &Session, y: u32, settings: &CaptureSettings) -> Result<()> {
    session.scroll_to(y).await?;

    let deadline = Instant::now() + Duration::from_millis(settings.scroll_timeout_ms);
    let poll = Duration::from_millis(settings.scroll_poll_interval_ms);
    let mut last = None;
    loop {
        let pos = session.scroll_position().await?;
        if pos == y {
            break;
        }
        if last == Some(pos) {
            debug!("scroll to {} stopped at {}", y, pos);
            break;
        }
        if Instant::now() >= deadline {
            return Err(Error::Timeout(settings.scroll_timeout_ms));
        }
        last = Some(pos);
        tokio::time::sleep(poll).await;
    }

    tokio::time::sleep(settings.scroll_settle()).await;
    Ok(())
}
