//! Configuration: JSON file merged with environment overrides.
//!
//! Resolution order for each value: environment variable, then config
//! file, then built-in default. Secrets (the API token) are expected via
//! `FIELDWORK_TOKEN` rather than the file, but the file works too.

use crate::resolver::{LoopConfig, RatingWeights, SamplePools};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for both the resolver and the harvester.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub resolver: ResolverConfig,
    pub harvest: HarvestConfig,
}

/// Resolver-side knobs: loop limits, rating distribution, optional
/// replacement sample pools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub limits: LoopConfig,
    pub rating_weights: RatingWeights,
    /// When set, replaces the embedded sample pools entirely.
    pub pools: Option<SamplePools>,
}

/// Harvester-side settings for the forms API and local storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub api_base: String,
    pub form_id: String,
    pub token: String,
    pub page_size: usize,
    pub db_path: Option<PathBuf>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.typeform.com".to_string(),
            form_id: String::new(),
            token: String::new(),
            page_size: 200,
            db_path: None,
        }
    }
}

impl Config {
    /// Load from a JSON file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("cannot read config file {}", p.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("malformed config file {}", p.display()))?
            }
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    let raw = std::fs::read_to_string(&default_path).with_context(|| {
                        format!("cannot read config file {}", default_path.display())
                    })?;
                    serde_json::from_str(&raw).with_context(|| {
                        format!("malformed config file {}", default_path.display())
                    })?
                } else {
                    Config::default()
                }
            }
        };
        config.apply_env();
        Ok(config)
    }

    /// ~/.fieldwork/config.json
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".fieldwork")
            .join("config.json")
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("FIELDWORK_API_BASE") {
            self.harvest.api_base = v;
        }
        if let Ok(v) = std::env::var("FIELDWORK_FORM_ID") {
            self.harvest.form_id = v;
        }
        if let Ok(v) = std::env::var("FIELDWORK_TOKEN") {
            self.harvest.token = v;
        }
        if let Ok(v) = std::env::var("FIELDWORK_DB") {
            self.harvest.db_path = Some(PathBuf::from(v));
        }
    }

    /// Validate the fields the harvester needs before talking to the API.
    pub fn require_harvest(&self) -> Result<()> {
        if self.harvest.form_id.is_empty() {
            anyhow::bail!("form id not configured; set FIELDWORK_FORM_ID or harvest.form_id");
        }
        if self.harvest.token.is_empty() {
            anyhow::bail!("API token not configured; set FIELDWORK_TOKEN or harvest.token");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.harvest.api_base, "https://api.typeform.com");
        assert_eq!(config.harvest.page_size, 200);
        assert_eq!(config.resolver.limits.max_steps, 25);
        assert!(config.resolver.pools.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "resolver": { "limits": { "max_steps": 10 } },
                "harvest": { "form_id": "FORM1", "page_size": 50 }
            }"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.resolver.limits.max_steps, 10);
        assert_eq!(config.harvest.form_id, "FORM1");
        assert_eq!(config.harvest.page_size, 50);
        // Unspecified fields keep defaults.
        assert_eq!(config.harvest.api_base, "https://api.typeform.com");
    }

    #[test]
    fn test_require_harvest_rejects_missing_token() {
        let mut config = Config::default();
        config.harvest.form_id = "FORM1".into();
        assert!(config.require_harvest().is_err());
        config.harvest.token = "tok".into();
        assert!(config.require_harvest().is_ok());
    }
}
