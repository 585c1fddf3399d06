use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::MAX_MATERIALS;

pub const ENV_MAX_MATERIALS: &str = "EMISSIONS_MAX_MATERIALS";
pub const ENV_REJECT_DUPLICATE_IDS: &str = "EMISSIONS_REJECT_DUPLICATE_IDS";
pub const ENV_DATASET_PATH: &str = "EMISSIONS_DATASET_PATH";
pub const ENV_LOG_FILTER: &str = "EMISSIONS_LOG_FILTER";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Materials per calculation; more rows fail the whole calculation.
    pub max_materials: usize,
    /// Drop later rows that reuse an earlier material id.
    pub reject_duplicate_ids: bool,
    /// Factor dataset to load instead of the embedded one.
    pub dataset_path: Option<PathBuf>,
    /// `tracing-subscriber` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_materials: MAX_MATERIALS,
            reject_duplicate_ids: true,
            dataset_path: None,
            log_filter: "info".to_string(),
        }
    }
}

/// Set-but-empty variables count as unset.
fn lookup_set<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).filter(|v| !v.trim().is_empty())
}

fn env_bool<F>(lookup: &F, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup_set(lookup, name) else {
        return Ok(default);
    };
    match value.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Ok(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Ok(false),
        _ => Err(ConfigError::Env {
            name,
            value,
            expected: "a boolean (true/false, yes/no, 1/0)",
        }),
    }
}

fn env_usize<F>(lookup: &F, name: &'static str, default: usize) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup_set(lookup, name) else {
        return Ok(default);
    };
    value.trim().parse::<usize>().map_err(|_| ConfigError::Env {
        name,
        value,
        expected: "a non-negative integer",
    })
}

impl PipelineConfig {
    /// Defaults overridden by `EMISSIONS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// [`Self::from_env`] over any variable source. A variable that is set
    /// but cannot be parsed is an error, not a silent default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let cfg = Self {
            max_materials: env_usize(&lookup, ENV_MAX_MATERIALS, defaults.max_materials)?,
            reject_duplicate_ids: env_bool(
                &lookup,
                ENV_REJECT_DUPLICATE_IDS,
                defaults.reject_duplicate_ids,
            )?,
            dataset_path: lookup_set(&lookup, ENV_DATASET_PATH).map(PathBuf::from),
            log_filter: lookup_set(&lookup, ENV_LOG_FILTER).unwrap_or(defaults.log_filter),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_materials == 0 {
            return Err(ConfigError::Invalid {
                field: "max_materials",
                reason: "must be greater than zero",
            });
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "log_filter",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_unset_variables_give_defaults() {
        let cfg = PipelineConfig::from_lookup(vars(&[])).unwrap();
        assert_eq!(cfg, PipelineConfig::default());
    }

    #[test]
    fn test_variables_override_defaults() {
        let cfg = PipelineConfig::from_lookup(vars(&[
            (ENV_MAX_MATERIALS, " 20 "),
            (ENV_REJECT_DUPLICATE_IDS, "no"),
            (ENV_DATASET_PATH, "/srv/factors.json"),
            (ENV_LOG_FILTER, "debug"),
        ]))
        .unwrap();
        assert_eq!(cfg.max_materials, 20);
        assert!(!cfg.reject_duplicate_ids);
        assert_eq!(cfg.dataset_path, Some(PathBuf::from("/srv/factors.json")));
        assert_eq!(cfg.log_filter, "debug");
    }

    #[test]
    fn test_malformed_variables_are_errors() {
        let err = PipelineConfig::from_lookup(vars(&[(ENV_MAX_MATERIALS, "abc")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Env {
                name: ENV_MAX_MATERIALS,
                value: "abc".into(),
                expected: "a non-negative integer",
            }
        );

        let err =
            PipelineConfig::from_lookup(vars(&[(ENV_REJECT_DUPLICATE_IDS, "maybe")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Env {
                name: ENV_REJECT_DUPLICATE_IDS,
                ..
            }
        ));

        let zero = PipelineConfig::from_lookup(vars(&[(ENV_MAX_MATERIALS, "0")]));
        assert!(matches!(zero, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_defaults_are_valid() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.max_materials, 500);
        assert!(cfg.reject_duplicate_ids);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let cfg: PipelineConfig = serde_json::from_str(r#"{"max_materials": 20}"#).unwrap();
        assert_eq!(cfg.max_materials, 20);
        assert_eq!(cfg.log_filter, "info");
        assert!(cfg.dataset_path.is_none());
    }

    #[test]
    fn test_zero_materials_rejected() {
        let cfg = PipelineConfig {
            max_materials: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "max_materials", .. })
        ));
    }
}
