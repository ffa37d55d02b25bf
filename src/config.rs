//! Pipeline configuration.
//! Every setting has a default; an optional TOML file overrides any subset of them.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub subset: SubsetConfig,
}

/// Gene symbol lookup service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Pause once after the whole batch of lookups
    #[serde(default = "default_post_batch_delay_ms")]
    pub post_batch_delay_ms: u64,
    /// Pause between consecutive lookups, 0 disables it
    #[serde(default)]
    pub request_interval_ms: u64,
}

fn default_base_url() -> String { "http://rest.ensembl.org".to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_post_batch_delay_ms() -> u64 { 100 }

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            post_batch_delay_ms: default_post_batch_delay_ms(),
            request_interval_ms: 0,
        }
    }
}

impl LookupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Condition labels, used for the `TPM_<label>` columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_label_a")]
    pub label_a: String,
    #[serde(default = "default_label_b")]
    pub label_b: String,
}

fn default_label_a() -> String { "HUVEC".to_string() }
fn default_label_b() -> String { "IMR90".to_string() }

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            label_a: default_label_a(),
            label_b: default_label_b(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsetConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_top_n() -> usize { crate::subset::DEFAULT_TOP_N }

impl Default for SubsetConfig {
    fn default() -> Self {
        Self { top_n: default_top_n() }
    }
}

impl PipelineConfig {
    /// Loads a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: PipelineConfig =
            toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.lookup.base_url.trim().is_empty() {
            return Err(PipelineError::Config("lookup.base_url is empty".into()));
        }
        if self.ranking.label_a == self.ranking.label_b {
            return Err(PipelineError::Config(format!(
                "ranking labels must differ, both are '{}'",
                self.ranking.label_a
            )));
        }
        Ok(())
    }
}
