use anyhow::Context;
use bannershot::catalog::BannerSize;
use bannershot::cdp::CdpLauncher;
use bannershot::{orchestrator, AppConfig, BatchConfig, SettlePolicy};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

/// Capture full-page ISI screenshots of banner creatives and zip them per concept.
///
/// Without arguments, captures the built-in catalog for the two built-in
/// concepts served from the local dev server.
#[derive(Parser, Debug)]
#[command(name = "bannershot", version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to write archives into
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Batch as <base_url>=<concept>; repeat to run several (replaces configured batches)
    #[arg(short, long = "batch", value_name = "URL=CONCEPT")]
    batches: Vec<BatchConfig>,

    /// Only capture these sizes, e.g. --only 300x250 --only 728x90
    #[arg(long, value_name = "WxH")]
    only: Vec<BannerSize>,

    /// Fixed settle delay after navigation, in milliseconds
    #[arg(long, value_name = "MS")]
    settle_ms: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if !self.batches.is_empty() {
            config.batches = self.batches;
        }
        if let Some(millis) = self.settle_ms {
            config.capture.settle = SettlePolicy::Fixed { millis };
        }
        if !self.only.is_empty() {
            config.viewports = config.catalog()?.only(&self.only)?.entries().to_vec();
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "bannershot=debug,info" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let config = cli.into_config().context("invalid configuration")?;
    let catalog = config.catalog()?;
    let launcher = Arc::new(CdpLauncher);

    let outcomes = orchestrator::run_all(launcher, &config, &catalog).await;

    let mut fatal = 0;
    for outcome in outcomes {
        match outcome.result {
            Ok(summary) => {
                println!("{} total bytes", summary.total_bytes);
                println!(
                    "archive {} has been finalized and the output file has been closed.",
                    summary.path.display()
                );
            }
            Err(e) => {
                log::error!("concept {} aborted: {}", outcome.concept, e);
                fatal += 1;
            }
        }
    }

    if fatal > 0 {
        anyhow::bail!("{} batch(es) failed to produce an archive", fatal);
    }
    Ok(())
}
