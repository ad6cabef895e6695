use crate::cache::CacheSettings;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

// Engine configuration sourced from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WardenConfig {
    pub cache_ttl: Duration,
    pub cache_op_timeout: Duration,
    pub max_role_depth: usize,
    pub cache_enabled: bool,
}

#[derive(Debug, Deserialize)]
struct WardenConfigOverride {
    cache_ttl_secs: Option<u64>,
    cache_timeout_ms: Option<u64>,
    max_role_depth: Option<usize>,
    cache_enabled: Option<bool>,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            cache_op_timeout: Duration::from_millis(50),
            max_role_depth: 32,
            cache_enabled: true,
        }
    }
}

impl WardenConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let cache_ttl = match std::env::var("WARDEN_CACHE_TTL_SECS") {
            Ok(value) => Duration::from_secs(
                value
                    .parse()
                    .with_context(|| "parse WARDEN_CACHE_TTL_SECS")?,
            ),
            Err(_) => defaults.cache_ttl,
        };
        let cache_op_timeout = match std::env::var("WARDEN_CACHE_TIMEOUT_MS") {
            Ok(value) => Duration::from_millis(
                value
                    .parse()
                    .with_context(|| "parse WARDEN_CACHE_TIMEOUT_MS")?,
            ),
            Err(_) => defaults.cache_op_timeout,
        };
        let max_role_depth = match std::env::var("WARDEN_MAX_ROLE_DEPTH") {
            Ok(value) => value
                .parse()
                .with_context(|| "parse WARDEN_MAX_ROLE_DEPTH")?,
            Err(_) => defaults.max_role_depth,
        };
        let cache_enabled = match std::env::var("WARDEN_CACHE_ENABLED") {
            Ok(value) => parse_bool(&value).with_context(|| "parse WARDEN_CACHE_ENABLED")?,
            Err(_) => defaults.cache_enabled,
        };
        let config = Self {
            cache_ttl,
            cache_op_timeout,
            max_role_depth,
            cache_enabled,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("WARDEN_CONFIG") {
            let contents =
                fs::read_to_string(&path).with_context(|| format!("read WARDEN_CONFIG: {path}"))?;
            let override_cfg: WardenConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse warden config yaml")?;
            if let Some(value) = override_cfg.cache_ttl_secs {
                config.cache_ttl = Duration::from_secs(value);
            }
            if let Some(value) = override_cfg.cache_timeout_ms {
                config.cache_op_timeout = Duration::from_millis(value);
            }
            if let Some(value) = override_cfg.max_role_depth {
                config.max_role_depth = value;
            }
            if let Some(value) = override_cfg.cache_enabled {
                config.cache_enabled = value;
            }
            config.validate()?;
        }
        Ok(config)
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: self.cache_ttl,
            op_timeout: self.cache_op_timeout,
            enabled: self.cache_enabled,
        }
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.cache_ttl.is_zero(), "cache ttl must be positive");
        anyhow::ensure!(
            !self.cache_op_timeout.is_zero(),
            "cache operation timeout must be positive"
        );
        anyhow::ensure!(self.max_role_depth > 0, "max role depth must be positive");
        Ok(())
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("invalid boolean: {other}"),
    }
}
