//! Client configuration loaded from YAML.
//!
//! ```yaml
//! channel:
//!   server: ws://127.0.0.1:8000
//!   channel: 0
//! greeting: Hello, Server
//! connect_timeout_ms: 5000
//! reconnect:
//!   mode: backoff
//!   initial_ms: 250
//!   max_ms: 8000
//! sampling:
//!   count: 100
//!   parameterization: uniform
//! curve_kind: centripetal
//! ```
//!
//! The uniform spline takes its tension as a nested map:
//!
//! ```yaml
//! curve_kind:
//!   uniform:
//!     tension: 0.5
//! ```
//!
//! Every field except `channel` has a default. `CROW_SERVER` and
//! `CROW_CHANNEL` override the channel after loading.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::channel::{ChannelOptions, DEFAULT_GREETING, ReconnectPolicy};
use crate::curve::CurveKind;
use crate::sampler::{Parameterization, SampledPathAdapter};
use crate::types::ChannelConfig;
use crate::{CrowError, Result};

pub const ENV_SERVER: &str = "CROW_SERVER";
pub const ENV_CHANNEL: &str = "CROW_CHANNEL";

/// Sample count per frame when none is configured.
pub const DEFAULT_SAMPLE_COUNT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrowConfig {
    pub channel: ChannelConfig,

    #[serde(default = "default_greeting")]
    pub greeting: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default)]
    pub reconnect: ReconnectPolicy,

    #[serde(default)]
    pub sampling: SamplingConfig,

    /// `centripetal`, `chordal` or `uniform: {tension: 0.5}`
    #[serde(default, with = "serde_yaml_ng::with::singleton_map")]
    pub curve_kind: CurveKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplingConfig {
    pub count: usize,
    pub parameterization: Parameterization,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self { count: DEFAULT_SAMPLE_COUNT, parameterization: Parameterization::default() }
    }
}

fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

impl CrowConfig {
    /// Defaults for everything but the channel.
    pub fn new(channel: ChannelConfig) -> Self {
        Self {
            channel,
            greeting: default_greeting(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reconnect: ReconnectPolicy::default(),
            sampling: SamplingConfig::default(),
            curve_kind: CurveKind::default(),
        }
    }

    /// Read, parse, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| CrowError::io_error(path, e))?;
        let mut config = Self::from_yaml(&text)?;
        config.apply_env();
        config.validate()?;
        debug!(path = %path.display(), channel = %config.channel, "Loaded configuration");
        Ok(config)
    }

    /// Parse without environment overrides or validation.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml_ng::from_str(yaml)
            .map_err(|e| CrowError::config_invalid(format!("YAML parsing failed: {}", e)))
    }

    /// Apply `CROW_SERVER` / `CROW_CHANNEL`. A non-numeric channel is
    /// ignored with a warning.
    pub fn apply_env(&mut self) {
        let server = std::env::var(ENV_SERVER).ok();
        let channel = std::env::var(ENV_CHANNEL).ok();
        self.apply_overrides(server, channel);
    }

    fn apply_overrides(&mut self, server: Option<String>, channel: Option<String>) {
        if let Some(server) = server {
            debug!(%server, "Server overridden from environment");
            self.channel.base_url = server;
        }
        if let Some(channel) = channel {
            match channel.trim().parse::<u32>() {
                Ok(id) => {
                    debug!(channel = id, "Channel overridden from environment");
                    self.channel.channel_id = id;
                }
                Err(_) => {
                    warn!(value = %channel, "Ignoring non-numeric {}", ENV_CHANNEL);
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let server = self.channel.base_url.trim();
        if server.is_empty() {
            return Err(CrowError::config_invalid("server must not be empty"));
        }
        if !server.contains("://") {
            return Err(CrowError::config_invalid(format!(
                "server '{}' must include a scheme such as ws://",
                server
            )));
        }
        if self.connect_timeout_ms == 0 {
            return Err(CrowError::config_invalid("connect_timeout_ms must be positive"));
        }
        if self.sampling.count < SampledPathAdapter::MIN_COUNT {
            return Err(CrowError::config_invalid(format!(
                "sampling.count must be at least {}",
                SampledPathAdapter::MIN_COUNT
            )));
        }
        if let CurveKind::Uniform { tension } = self.curve_kind {
            if !tension.is_finite() {
                return Err(CrowError::config_invalid("curve tension must be finite"));
            }
        }
        if let ReconnectPolicy::Backoff { factor, .. } = self.reconnect {
            if !factor.is_finite() || factor < 1.0 {
                return Err(CrowError::config_invalid("reconnect factor must be at least 1.0"));
            }
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Connection settings for the channel manager.
    pub fn channel_options(&self) -> ChannelOptions {
        ChannelOptions {
            greeting: self.greeting.clone(),
            connect_timeout: self.connect_timeout(),
            reconnect: self.reconnect.clone(),
        }
    }

    pub fn sampler(&self) -> SampledPathAdapter {
        SampledPathAdapter::new(self.sampling.parameterization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = CrowConfig::from_yaml("channel:\n  server: ws://localhost:8000\n  channel: 2\n").unwrap();
        assert_eq!(config, CrowConfig::new(ChannelConfig::new("ws://localhost:8000", 2)));
        assert_eq!(config.greeting, "Hello, Server");
        assert_eq!(config.sampling.count, 100);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        config.validate().unwrap();
    }

    #[test]
    fn full_config_parses() {
        let yaml = r#"
channel:
  server: ws://10.0.0.5:9000/
  channel: 7
greeting: hi
connect_timeout_ms: 1500
reconnect:
  mode: fixed
  delay_ms: 300
  max_attempts: 4
sampling:
  count: 64
  parameterization: arc_length
curve_kind:
  uniform:
    tension: 0.5
"#;
        let config = CrowConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.channel.uri(), "ws://10.0.0.5:9000/down/7");
        assert_eq!(config.reconnect, ReconnectPolicy::fixed(Duration::from_millis(300)).with_max_attempts(4));
        assert_eq!(config.sampling.parameterization, Parameterization::ArcLength);
        assert_eq!(config.curve_kind, CurveKind::Uniform { tension: 0.5 });

        let options = config.channel_options();
        assert_eq!(options.greeting, "hi");
        assert_eq!(options.connect_timeout, Duration::from_millis(1500));
        config.validate().unwrap();
    }

    #[test]
    fn curve_kind_forms() {
        let base = "channel: {server: \"ws://a\", channel: 1}\n";
        for (yaml, kind) in [
            ("curve_kind: centripetal\n", CurveKind::Centripetal),
            ("curve_kind: chordal\n", CurveKind::Chordal),
            ("curve_kind: {uniform: {tension: 0.25}}\n", CurveKind::Uniform { tension: 0.25 }),
        ] {
            let config = CrowConfig::from_yaml(&format!("{base}{yaml}")).unwrap();
            assert_eq!(config.curve_kind, kind, "{yaml}");
        }

        // Serializing and reading back keeps the map form.
        let mut config = CrowConfig::new(ChannelConfig::new("ws://a", 1));
        config.curve_kind = CurveKind::Uniform { tension: 0.75 };
        let yaml = serde_yaml_ng::to_string(&config).unwrap();
        assert!(yaml.contains("uniform:"), "{yaml}");
        assert_eq!(CrowConfig::from_yaml(&yaml).unwrap(), config);
    }

    #[test]
    fn unknown_and_missing_fields_are_config_errors() {
        let err = CrowConfig::from_yaml("greeting: hi\n").unwrap_err();
        assert!(matches!(err, CrowError::Config { .. }));

        let err = CrowConfig::from_yaml("channel: {server: \"ws://a\", channel: 1}\nbogus: 1\n").unwrap_err();
        assert!(matches!(err, CrowError::Config { .. }));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let base = CrowConfig::new(ChannelConfig::new("ws://localhost:8000", 0));

        let mut config = base.clone();
        config.channel.base_url = "  ".into();
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.channel.base_url = "localhost:8000".into();
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.sampling.count = 1;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.connect_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = base;
        config.reconnect =
            ReconnectPolicy::Backoff { initial_ms: 10, max_ms: 100, factor: 0.5, max_attempts: None };
        assert!(config.validate().is_err());
    }

    #[test]
    fn overrides_replace_channel() {
        let mut config = CrowConfig::new(ChannelConfig::new("ws://localhost:8000", 0));
        config.apply_overrides(Some("ws://remote:9000".into()), Some(" 12 ".into()));
        assert_eq!(config.channel, ChannelConfig::new("ws://remote:9000", 12));

        config.apply_overrides(None, Some("twelve".into()));
        assert_eq!(config.channel.channel_id, 12);
    }

    #[test]
    fn load_reads_file_and_reports_missing_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "channel:\n  server: ws://127.0.0.1:8000\n  channel: 3").unwrap();

        let config = CrowConfig::load(file.path()).unwrap();
        // Environment overrides may apply in CI; the file itself must parse.
        assert!(!config.channel.base_url.is_empty());

        let err = CrowConfig::load("/nonexistent/crow.yaml").unwrap_err();
        assert!(matches!(err, CrowError::Io { .. }));
    }
}
