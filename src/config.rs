//! Configuration: a TOML file with every field defaulted, plus overrides
//! applied from the command line.
//!
//! ```toml
//! host = "127.0.0.1:8080"
//!
//! [transport]
//! path = "/ws"
//! backoff_floor_ms = 1000
//! backoff_ceiling_ms = 30000
//!
//! [buffer]
//! soft_max = 100
//! hard_ceiling = 120
//! evict_margin_rows = 5
//!
//! [feed]
//! auto_scroll = true
//! kinds = ["text", "superchat"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;
use crate::message::MessageKind;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    /// `host[:port]` of the relay serving the feed.
    pub host: String,
    /// Transport and reconnection settings.
    pub transport: TransportConfig,
    /// Render buffer bounds.
    pub buffer: BufferConfig,
    /// Feed behaviour.
    pub feed: FeedBehaviour,
    /// Diagnostics.
    pub log: LogConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1:8080".to_string(),
            transport: TransportConfig::default(),
            buffer: BufferConfig::default(),
            feed: FeedBehaviour::default(),
            log: LogConfig::default(),
        }
    }
}

/// `[transport]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    /// Well-known path of the stream on the relay.
    pub path: String,
    /// First reconnection delay.
    pub backoff_floor_ms: u64,
    /// Maximum reconnection delay.
    pub backoff_ceiling_ms: u64,
    /// Socket read timeout; bounds how long the worker takes to notice shutdown.
    pub read_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            path: "/ws".to_string(),
            backoff_floor_ms: 1_000,
            backoff_ceiling_ms: 30_000,
            read_timeout_ms: 250,
        }
    }
}

impl TransportConfig {
    /// First reconnection delay.
    pub const fn backoff_floor(&self) -> Duration {
        Duration::from_millis(self.backoff_floor_ms)
    }

    /// Maximum reconnection delay.
    pub const fn backoff_ceiling(&self) -> Duration {
        Duration::from_millis(self.backoff_ceiling_ms)
    }

    /// Socket read timeout.
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// `[buffer]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BufferConfig {
    /// Steady-state item count eviction trims down to.
    pub soft_max: usize,
    /// Item count above which an eviction pass runs without a scroll event.
    pub hard_ceiling: usize,
    /// Rows an item must be past the top of the viewport before it is evictable.
    pub evict_margin_rows: u32,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            soft_max: 100,
            hard_ceiling: 120,
            evict_margin_rows: 5,
        }
    }
}

/// `[feed]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedBehaviour {
    /// Follow the newest message as it arrives.
    pub auto_scroll: bool,
    /// Quiet period after the last scroll before the eviction check runs.
    pub scroll_debounce_ms: u64,
    /// Allow-list of message kinds. Empty shows everything.
    pub kinds: Vec<MessageKind>,
    /// Frame tick interval of the UI loop.
    pub tick_ms: u64,
}

impl Default for FeedBehaviour {
    fn default() -> Self {
        Self {
            auto_scroll: true,
            scroll_debounce_ms: 50,
            kinds: Vec::new(),
            tick_ms: 33,
        }
    }
}

impl FeedBehaviour {
    /// Scroll debounce as a duration.
    pub const fn scroll_debounce(&self) -> Duration {
        Duration::from_millis(self.scroll_debounce_ms)
    }

    /// UI tick interval as a duration.
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// `[log]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Log file. Defaults to `danmaku-feed.log` in the platform data directory.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl FeedConfig {
    /// Parse and validate configuration from TOML text.
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source: Box::new(source),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// Load `path` if given, else the default location if it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Check ranges and cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.host.trim().is_empty() {
            return invalid("host must not be empty".to_string());
        }
        if self.host.contains("://") {
            return invalid(format!(
                "host must be host[:port] without a scheme, got {:?} (wss is not supported)",
                self.host
            ));
        }
        if !self.transport.path.starts_with('/') {
            return invalid(format!(
                "transport.path must start with '/', got {:?}",
                self.transport.path
            ));
        }
        if self.transport.backoff_floor_ms == 0 {
            return invalid("transport.backoff_floor_ms must be positive".to_string());
        }
        if self.transport.backoff_ceiling_ms < self.transport.backoff_floor_ms {
            return invalid(format!(
                "transport.backoff_ceiling_ms ({}) is below backoff_floor_ms ({})",
                self.transport.backoff_ceiling_ms, self.transport.backoff_floor_ms
            ));
        }
        if self.transport.read_timeout_ms == 0 {
            return invalid("transport.read_timeout_ms must be positive".to_string());
        }
        if self.buffer.soft_max == 0 {
            return invalid("buffer.soft_max must be positive".to_string());
        }
        if self.buffer.hard_ceiling < self.buffer.soft_max {
            return invalid(format!(
                "buffer.hard_ceiling ({}) is below soft_max ({})",
                self.buffer.hard_ceiling, self.buffer.soft_max
            ));
        }
        if self.feed.tick_ms == 0 {
            return invalid("feed.tick_ms must be positive".to_string());
        }
        self.endpoint()?;
        Ok(())
    }

    /// Stream endpoint derived from the host: `ws://<host><path>`.
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        self.relay_url("ws", &self.transport.path)
    }

    /// Base URL of the relay's image proxy: `http://<host>/proxy/image`.
    pub fn image_proxy(&self) -> Result<Url, ConfigError> {
        self.relay_url("http", "/proxy/image")
    }

    fn relay_url(&self, scheme: &str, path: &str) -> Result<Url, ConfigError> {
        let raw = format!("{scheme}://{}{path}", self.host.trim());
        Url::parse(&raw).map_err(|e| ConfigError::Invalid(format!("bad relay url {raw:?}: {e}")))
    }
}

/// `<config dir>/danmaku-feed/config.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("danmaku-feed").join("config.toml"))
}
