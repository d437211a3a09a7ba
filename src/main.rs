//! `danmaku-feed`: show a relay's live chat in the terminal.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;

use danmaku::config::FeedConfig;
use danmaku::{app, logging};

/// Live chat feed for the terminal.
#[derive(Debug, Parser)]
#[command(name = "danmaku-feed", version, about)]
struct Cli {
    /// Configuration file [default: <config dir>/danmaku-feed/config.toml]
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Relay `host[:port]`, overrides the config file
    #[arg(long)]
    host: Option<String>,

    /// Start with auto-scroll disabled
    #[arg(long)]
    no_auto_scroll: bool,

    /// Write diagnostics to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset, e.g. `debug` or `danmaku=trace`
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut FeedConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if self.no_auto_scroll {
            config.feed.auto_scroll = false;
        }
        if let Some(file) = self.log_file {
            config.log.file = Some(file);
        }
        if let Some(level) = self.log_level {
            config.log.level = level;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = FeedConfig::load_or_default(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate().context("invalid settings")?;

    let log_path = config
        .log
        .file
        .clone()
        .unwrap_or_else(logging::default_log_path);
    let _guard = logging::init(&log_path, &config.log.level)
        .with_context(|| format!("failed to set up logging to {}", log_path.display()))?;

    app::run(&config)
}
