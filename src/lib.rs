pub mod api;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod irc;
pub mod logging;
pub mod render;
pub mod routing;
pub mod utils;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use delivery::MessageSink;
use dispatch::Dispatcher;
use error::{NotifyError, Result};
use irc::IrcConfig;
use render::{DisplayConfig, Renderer};
use routing::RoutingTable;

#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    #[serde(default)]
    pub irc: IrcConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    pub routing: RoutingTable,
}

impl NotifyConfig {
    /// Parses and validates a TOML config document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: NotifyConfig = toml::from_str(content)?;
        config.routing = config.routing.validate()?;
        if config.display.hash_width == 0 {
            return Err(NotifyError::ConfigError(
                "display.hash_width must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}

/// Load and parse the configuration file
pub fn load_config(path: impl AsRef<Path>) -> Result<NotifyConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        NotifyError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    NotifyConfig::from_toml(&content).map_err(|e| {
        NotifyError::ConfigError(format!(
            "Failed to parse config file '{}': {}",
            path.display(),
            e
        ))
    })
}

/// In-memory request counters, reset on restart.
#[derive(Debug, Default)]
pub struct EventStats {
    received: AtomicU64,
    deliveries: AtomicU64,
    dropped: AtomicU64,
    malformed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub deliveries: u64,
    pub dropped: u64,
    pub malformed: u64,
}

impl EventStats {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one per line per channel it reached.
    pub fn record_delivered(&self, deliveries: usize) {
        self.deliveries
            .fetch_add(deliveries as u64, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

pub struct AppState {
    pub dispatcher: Dispatcher,
    pub sink: Arc<dyn MessageSink>,
    pub stats: EventStats,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: &NotifyConfig, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            dispatcher: Dispatcher::new(
                Renderer::new(config.display.clone()),
                config.routing.clone(),
            ),
            sink,
            stats: EventStats::default(),
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<AppState>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r##"
        [irc]
        host = "irc.example.net"
        port = 6697
        nickname = "notify"
        ca_file = "root.crt"

        [display]
        hash_width = 8

        [routing]
        default = "#gitlab"

        [routing.groups]
        infra = ["#infra"]

        [routing.explicit]
        "infra/website" = ["#web", "#infra"]
    "##;

    #[test]
    fn parses_full_config() {
        let config = NotifyConfig::from_toml(CONFIG).unwrap();
        assert_eq!(config.irc.host, "irc.example.net");
        assert_eq!(config.irc.nickname, "notify");
        assert_eq!(config.irc.realname, "gitlab-irc");
        assert!(config.irc.tls);
        assert_eq!(config.display.hash_width, 8);
        assert_eq!(config.display.max_commit_lines, 3);
        assert_eq!(config.routing.default, "#gitlab");
        assert_eq!(
            config.routing.all_channels(),
            vec!["#gitlab", "#infra", "#web"]
        );
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = NotifyConfig::from_toml("[routing]\ndefault = \"#gitlab\"\n").unwrap();
        assert_eq!(config.irc.port, 6697);
        assert_eq!(config.irc.reconnect_delay_secs, 15);
        assert_eq!(config.display.hash_width, 7);
        assert!(config.routing.groups.is_empty());
    }

    #[test]
    fn missing_routing_section_is_rejected() {
        assert!(matches!(
            NotifyConfig::from_toml("[irc]\nhost = \"x\"\n"),
            Err(NotifyError::TomlParseError(_))
        ));
    }

    #[test]
    fn zero_hash_width_is_rejected() {
        let result =
            NotifyConfig::from_toml("[display]\nhash_width = 0\n[routing]\ndefault = \"#g\"\n");
        assert!(matches!(result, Err(NotifyError::ConfigError(_))));
    }

    #[test]
    fn load_config_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.routing.groups["infra"], vec!["#infra"]);
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config("/nonexistent/notify_config.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn stats_snapshot_counts() {
        let stats = EventStats::default();
        stats.record_received();
        stats.record_received();
        stats.record_delivered(3);
        stats.record_dropped();
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                received: 2,
                deliveries: 3,
                dropped: 1,
                malformed: 0
            }
        );
    }
}
