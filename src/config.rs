//! Service configuration
//!
//! Layered by [`ConfigLoader`]: built-in defaults, then an optional TOML file,
//! then `NLU__`-prefixed environment variables.

pub mod loader;

pub use loader::ConfigLoader;

use crate::error::{Error, Result};
use crate::logging::LogConfig;
use crate::nlu::Catalog;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NluConfig {
    pub server: ServerConfig,
    pub annotator: AnnotatorConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP service listens on
    pub bind_addr: String,
    /// Log filter (trace, debug, info, warn, error or an EnvFilter directive)
    pub log_level: String,
    /// Directory for rolling log files
    pub log_dir: String,
    /// Write logs to `log_dir` in addition to the console
    pub file_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            log_level: "info".to_string(),
            log_dir: "logs".to_string(),
            file_logging: false,
        }
    }
}

/// External annotator settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AnnotatorConfig {
    pub enabled: bool,
    /// Base URL; `/annotate` and `/health` are appended
    pub url: String,
    /// Per-request timeout
    pub timeout_ms: u64,
    /// Retries after the first attempt, for transport errors and 5xx only
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "http://127.0.0.1:5005".to_string(),
            timeout_ms: 800,
            max_retries: 1,
            retry_delay_ms: 100,
        }
    }
}

impl AnnotatorConfig {
    /// Upper bound on one `annotate` call including retries
    pub fn call_budget(&self) -> Duration {
        let attempts = u64::from(self.max_retries) + 1;
        Duration::from_millis(
            self.timeout_ms
                .saturating_mul(attempts)
                .saturating_add(self.retry_delay_ms.saturating_mul(u64::from(self.max_retries))),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    /// TOML file replacing some or all built-in tables
    pub path: Option<String>,
}

impl NluConfig {
    /// Checks values the deserializer cannot
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;
        if self.annotator.enabled && self.annotator.url.trim().is_empty() {
            return Err(Error::Config(
                "annotator.url must be set when the annotator is enabled".to_string(),
            ));
        }
        if self.annotator.timeout_ms == 0 {
            return Err(Error::Config("annotator.timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server.bind_addr.parse().map_err(|e| {
            Error::Config(format!(
                "invalid server.bind_addr '{}': {}",
                self.server.bind_addr, e
            ))
        })
    }

    /// The configured catalog, or the built-in one
    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog.path {
            Some(path) => Catalog::load(path),
            None => Ok(Catalog::builtin()),
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig::default()
            .with_level(&self.server.log_level)
            .with_log_dir(&self.server.log_dir)
            .with_file(self.server.file_logging)
    }

    /// Commented sample configuration
    pub fn sample_toml() -> Result<String> {
        let sample = NluConfig {
            annotator: AnnotatorConfig {
                enabled: true,
                ..AnnotatorConfig::default()
            },
            catalog: CatalogConfig {
                path: Some("config/catalog.toml".to_string()),
            },
            ..NluConfig::default()
        };

        let body = toml::to_string_pretty(&sample)
            .map_err(|e| Error::Config(format!("cannot render sample config: {}", e)))?;

        Ok(format!(
            r#"# airline-nlu configuration
#
# Save as airline-nlu.toml or config/airline-nlu.toml.
# Every key can be overridden from the environment,
# e.g. NLU__SERVER__BIND_ADDR=0.0.0.0:8080 or NLU__ANNOTATOR__ENABLED=false.

{}"#,
            body
        ))
    }

    /// Writes the sample configuration to `path`
    pub fn write_sample<P: AsRef<Path>>(path: P) -> Result<()> {
        std::fs::write(path, Self::sample_toml()?)?;
        Ok(())
    }
}
