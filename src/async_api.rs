use crate::{Engine, EngineConfig, EngineFactory, Error, Result, StyleOverride};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

enum Command {
    Goto(String, oneshot::Sender<Result<()>>),
    Eval(String, oneshot::Sender<Result<serde_json::Value>>),
    Screenshot(oneshot::Sender<Result<Vec<u8>>>),
    WaitFor(String, Duration, oneshot::Sender<Result<()>>),

    // Page helpers
    PageHeight(oneshot::Sender<Result<u32>>),
    ScrollTo(u32, oneshot::Sender<Result<()>>),
    ScrollPosition(oneshot::Sender<Result<u32>>),
    ApplyStyle(StyleOverride, oneshot::Sender<Result<bool>>),

    Close(oneshot::Sender<Result<()>>),
}

/// An async handle to one browser session backed by a dedicated worker thread.
///
/// The worker thread owns a synchronous [`Engine`] and executes commands sent
/// from async tasks, so many sessions can be driven from one runtime without
/// blocking it. Dropping the handle ends the worker loop, which drops the
/// engine and terminates its browser process.
pub struct Session {
    cmd_tx: Sender<Command>,
}

impl Session {
    /// Launch a new engine on its own worker thread.
    pub async fn launch<F>(factory: Arc<F>, config: EngineConfig) -> Result<Self>
    where
        F: EngineFactory,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        thread::spawn(move || {
            let mut engine = match factory.launch(config) {
                Ok(e) => e,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };

            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Goto(url, resp) => {
                        let _ = resp.send(engine.load_url(&url));
                    }
                    Command::Eval(script, resp) => {
                        let _ = resp.send(engine.evaluate(&script));
                    }
                    Command::Screenshot(resp) => {
                        let _ = resp.send(engine.render_png());
                    }
                    Command::WaitFor(selector, timeout, resp) => {
                        let _ = resp.send(engine.wait_for_element(&selector, timeout));
                    }
                    Command::PageHeight(resp) => {
                        let _ = resp.send(engine.page_height());
                    }
                    Command::ScrollTo(y, resp) => {
                        let _ = resp.send(engine.scroll_to(y));
                    }
                    Command::ScrollPosition(resp) => {
                        let _ = resp.send(engine.scroll_position());
                    }
                    Command::ApplyStyle(style, resp) => {
                        let _ = resp.send(engine.apply_style(&style));
                    }
                    Command::Close(resp) => {
                        let _ = resp.send(engine.close());
                        return;
                    }
                }
            }
            // Handle dropped without Close; the engine is dropped here.
        });

        init_rx
            .await
            .map_err(|e| Error::InitializationError(format!("Worker init canceled: {}", e)))??;

        Ok(Self { cmd_tx })
    }

    async fn request<T>(&self, what: &str, make: impl FnOnce(oneshot::Sender<Result<T>>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .map_err(|_| Error::Other(format!("{} failed: session worker has exited", what)))?;
        rx.await
            .map_err(|e| Error::Other(format!("{} canceled: {}", what, e)))?
    }

    /// Navigate to a URL
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.request("Goto", |tx| Command::Goto(url.to_string(), tx)).await
    }

    /// Evaluate JavaScript in the page and return its JSON value
    pub async fn eval(&self, script: &str) -> Result<serde_json::Value> {
        self.request("Eval", |tx| Command::Eval(script.to_string(), tx)).await
    }

    /// Capture the visible viewport as PNG bytes
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        self.request("Screenshot", Command::Screenshot).await
    }

    pub async fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.request("WaitFor", |tx| Command::WaitFor(selector.to_string(), timeout, tx))
            .await
    }

    pub async fn page_height(&self) -> Result<u32> {
        self.request("PageHeight", Command::PageHeight).await
    }

    pub async fn scroll_to(&self, y: u32) -> Result<()> {
        self.request("ScrollTo", |tx| Command::ScrollTo(y, tx)).await
    }

    pub async fn scroll_position(&self) -> Result<u32> {
        self.request("ScrollPosition", Command::ScrollPosition).await
    }

    /// Apply a style override; resolves to whether the selector matched
    pub async fn apply_style(&self, style: &StyleOverride) -> Result<bool> {
        self.request("ApplyStyle", |tx| Command::ApplyStyle(style.clone(), tx))
            .await
    }

    /// Shut down the worker and close the browser.
    pub async fn close(self) -> Result<()> {
        self.request("Close", Command::Close).await
    }
}
