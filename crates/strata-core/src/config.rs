//! strata.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default topology key that names a node directly.
pub const DEFAULT_NODE_KEY: &str = "linbit.com/hostname";
/// Default namespace for auxiliary node properties.
pub const DEFAULT_AUX_PREFIX: &str = "Aux/";
pub const DEFAULT_LOG_FILTER: &str = "info,strata=debug";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid duration for {field}: {value:?}")]
    Duration { field: &'static str, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrataConfig {
    #[serde(default)]
    pub topology: TopologyConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Segment key whose value is a node name.
    #[serde(default = "default_node_key")]
    pub node_key: String,
    /// Prefix applied to segment keys when filtering nodes by property.
    #[serde(default = "default_aux_prefix")]
    pub aux_prefix: String,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            node_key: default_node_key(),
            aux_prefix: default_aux_prefix(),
        }
    }
}

/// Which placement strategy the provisioning pipeline uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulerKind {
    /// Topology-aware placement: preferred, requisite, then unconstrained.
    #[default]
    AutoplaceTopology,
    /// Single unconstrained autoplace, topology ignored.
    Autoplace,
}

impl SchedulerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerKind::AutoplaceTopology => "autoplace-topology",
            SchedulerKind::Autoplace => "autoplace",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub strategy: SchedulerKind,
    /// Deadline applied to a whole create call, e.g. "30s". Unset = none.
    pub request_timeout: Option<String>,
}

impl SchedulerConfig {
    pub fn request_timeout(&self) -> ConfigResult<Option<Duration>> {
        self.request_timeout
            .as_deref()
            .map(|raw| {
                parse_duration(raw).ok_or_else(|| ConfigError::Duration {
                    field: "scheduler.request_timeout",
                    value: raw.to_string(),
                })
            })
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_node_key() -> String {
    DEFAULT_NODE_KEY.to_string()
}

fn default_aux_prefix() -> String {
    DEFAULT_AUX_PREFIX.to_string()
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl StrataConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: StrataConfig = toml::from_str(&content)?;
        config.scheduler.request_timeout()?;
        tracing::debug!(?path, strategy = config.scheduler.strategy.as_str(), "config loaded");
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a config with every section spelled out.
    pub fn scaffold() -> Self {
        StrataConfig {
            topology: TopologyConfig::default(),
            scheduler: SchedulerConfig {
                strategy: SchedulerKind::AutoplaceTopology,
                request_timeout: Some("30s".to_string()),
            },
            log: LogConfig::default(),
        }
    }
}

/// Parse "500ms", "30s", "2m" or a bare number of seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
