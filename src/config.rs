//! Engine configuration
//!
//! Layered: an optional `tempo.toml` next to the process, overridden by
//! `TEMPO_`-prefixed environment variables.

use std::path::PathBuf;

use chrono::Duration;
use serde::Deserialize;

use crate::store::RetentionPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Directory scanned for `.seq` program files at startup.
    pub program_dir: Option<PathBuf>,

    /// Program used when a start request names none.
    pub default_program: Option<String>,

    /// How long terminal runs remain queryable.
    #[serde(default = "default_retention_ttl_secs")]
    pub retention_ttl_secs: i64,

    /// Cap on retained terminal runs.
    pub retention_max_terminal: Option<usize>,
}

fn default_retention_ttl_secs() -> i64 {
    86_400
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            program_dir: None,
            default_program: None,
            retention_ttl_secs: default_retention_ttl_secs(),
            retention_max_terminal: None,
        }
    }
}

impl EngineConfig {
    /// Load from `tempo.toml` (or an explicit path) plus the environment.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = match path {
            Some(p) => builder.add_source(config::File::with_name(p)),
            None => builder.add_source(config::File::with_name("tempo").required(false)),
        };

        builder
            .add_source(config::Environment::with_prefix("TEMPO"))
            .build()?
            .try_deserialize()
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            ttl: Duration::seconds(self.retention_ttl_secs),
            max_terminal: self.retention_max_terminal,
        }
    }
}
