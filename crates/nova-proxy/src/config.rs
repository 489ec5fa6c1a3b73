use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::locator::LocatorConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Toml(err.message().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub locator: LocatorConfig,
}

impl ProxyConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// A simple level (`info`, `debug`, ...) or a full `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "warn".to_owned()
    }

    /// The configured level as filter directives. Bare level names are accepted in any case and
    /// `warning` is an alias for `warn`; anything else is passed through as a directive string.
    pub fn directives(&self) -> String {
        let level = self.level.trim();
        if level.is_empty() {
            return Self::default_level();
        }
        if level.eq_ignore_ascii_case("warning") {
            return "warn".to_owned();
        }
        let is_bare_level = ["trace", "debug", "info", "warn", "error"]
            .iter()
            .any(|name| level.eq_ignore_ascii_case(name));
        if is_bare_level {
            level.to_ascii_lowercase()
        } else {
            level.to_owned()
        }
    }

    /// Directive strings to try, most specific first. `RUST_LOG` refines the configured level
    /// when both parse together, and replaces it when only `RUST_LOG` parses.
    fn filter_candidates(&self, rust_log: Option<&str>) -> Vec<String> {
        let configured = self.directives();
        match rust_log.map(str::trim).filter(|value| !value.is_empty()) {
            Some(env) => vec![format!("{configured},{env}"), env.to_owned(), configured],
            None => vec![configured],
        }
    }

    fn build_filter(&self, rust_log: Option<&str>) -> EnvFilter {
        self.filter_candidates(rust_log)
            .into_iter()
            .find_map(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::default().add_directive(LevelFilter::WARN.into()))
    }

    /// The effective filter: the configured level, with `RUST_LOG` merged in when set.
    pub fn env_filter(&self) -> EnvFilter {
        self.build_filter(std::env::var("RUST_LOG").ok().as_deref())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
        }
    }
}

/// Installs a global stderr subscriber. A second call is a no-op.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = config.env_filter();
    let result = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    if result.is_err() {
        tracing::debug!(target: "nova.proxy", "tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ProxyConfig::load_from_str("").unwrap();
        assert_eq!(config, ProxyConfig::default());
        assert_eq!(config.locator.max_depth, None);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn parses_sections() {
        let config = ProxyConfig::load_from_str(
            r#"
[logging]
level = "Debug"
json = true

[locator]
max_depth = 16
"#,
        )
        .unwrap();
        assert!(config.logging.json);
        assert_eq!(config.locator.max_depth, Some(16));
        assert_eq!(config.logging.directives(), "debug");
    }

    #[test]
    fn unknown_keys_are_errors() {
        let err = ProxyConfig::load_from_str("[locator]\nmax_dept = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    fn logging(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_owned(),
            json: false,
        }
    }

    #[test]
    fn level_directives_are_normalized() {
        assert_eq!(logging("  ").directives(), "warn");
        assert_eq!(logging("WARNING").directives(), "warn");
        assert_eq!(logging(" Info ").directives(), "info");
        assert_eq!(logging("nova.proxy=trace").directives(), "nova.proxy=trace");
    }

    #[test]
    fn rust_log_refines_configured_level() {
        let config = logging("info");
        assert_eq!(config.filter_candidates(None), vec!["info".to_owned()]);
        assert_eq!(config.filter_candidates(Some("   ")), vec!["info".to_owned()]);
        assert_eq!(
            config.filter_candidates(Some(" nova.proxy=trace ")),
            vec![
                "info,nova.proxy=trace".to_owned(),
                "nova.proxy=trace".to_owned(),
                "info".to_owned(),
            ]
        );
    }

    #[test]
    fn unparsable_directives_fall_back_to_warn() {
        let filter = logging("nova.proxy=loud").build_filter(Some("app=verbose"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));

        let filter = logging("debug").build_filter(None);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }
}
