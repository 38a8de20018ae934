//! Repository-level configuration.
//!
//! Loads `.mutest.toml` from the module root and merges it with command-line
//! overrides. A command-line value always wins over the file, and the file
//! wins over built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::catalog::{EnabledTypes, MutationType};
use crate::runner::Timeouts;
use crate::scheduler::{SchedulerConfig, default_workers};
use crate::state::Thresholds;

pub const CONFIG_FILE: &str = ".mutest.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid {path}: {source}")]
    Invalid {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("unknown mutation type `{0}` (see `mutest types`)")]
    UnknownMutationType(String),
    #[error("{key} must be {expected}, got {value}")]
    OutOfRange {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Contents of `.mutest.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepoConfig {
    #[serde(default)]
    pub mutants: MutantsConfig,
    #[serde(default)]
    pub unleash: UnleashConfig,
}

/// `[mutants]`: per-type switches on top of the built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MutantsConfig {
    #[serde(default)]
    pub enable: Vec<String>,
    #[serde(default)]
    pub disable: Vec<String>,
}

/// `[unleash]`: run settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnleashConfig {
    pub workers: Option<usize>,
    pub dry_run: Option<bool>,
    pub integration: Option<bool>,
    pub timeout_multiplier: Option<f64>,
    pub timeout_allowance_ms: Option<u64>,
    pub test_cmd: Option<String>,
    /// Glob patterns of root-relative paths never mutated.
    #[serde(default)]
    pub exclude: Vec<String>,
    pub threshold_efficacy: Option<f64>,
    pub threshold_mcover: Option<f64>,
}

impl RepoConfig {
    pub fn exists(root: &Path) -> bool {
        root.join(CONFIG_FILE).exists()
    }

    /// Load `root/.mutest.toml`.
    ///
    /// A missing, empty or whitespace-only file gives the defaults. A file
    /// that does not parse is an error rather than silently ignored.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: RepoConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Invalid { path, source })?;
        tracing::info!(
            enable = config.mutants.enable.len(),
            disable = config.mutants.disable.len(),
            "loaded {CONFIG_FILE}"
        );
        Ok(config)
    }
}

/// Values given on the command line or through `MUTEST_*` variables.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub workers: Option<usize>,
    pub dry_run: bool,
    pub integration: bool,
    pub timeout_multiplier: Option<f64>,
    pub timeout_allowance_ms: Option<u64>,
    pub test_cmd: Option<String>,
    pub exclude: Vec<String>,
    pub enable: Vec<String>,
    pub disable: Vec<String>,
    pub threshold_efficacy: Option<f64>,
    pub threshold_mcover: Option<f64>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub enabled: EnabledTypes,
    pub scheduler: SchedulerConfig,
    pub integration: bool,
    pub test_cmd: Option<String>,
    pub exclude: Vec<String>,
    pub thresholds: Thresholds,
}

impl Settings {
    pub fn resolve(file: &RepoConfig, cli: &Overrides) -> Result<Self, ConfigError> {
        let mut enabled = EnabledTypes::default();
        toggle(&mut enabled, &file.mutants.enable, true)?;
        toggle(&mut enabled, &file.mutants.disable, false)?;
        toggle(&mut enabled, &cli.enable, true)?;
        toggle(&mut enabled, &cli.disable, false)?;

        let unleash = &file.unleash;
        let workers = cli.workers.or(unleash.workers).unwrap_or_else(default_workers);
        if workers == 0 {
            return Err(ConfigError::OutOfRange {
                key: "workers",
                expected: "at least 1",
                value: "0".to_string(),
            });
        }

        let defaults = Timeouts::default();
        let multiplier = cli
            .timeout_multiplier
            .or(unleash.timeout_multiplier)
            .unwrap_or(defaults.multiplier);
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ConfigError::OutOfRange {
                key: "timeout_multiplier",
                expected: "a number >= 1",
                value: multiplier.to_string(),
            });
        }
        let allowance = cli
            .timeout_allowance_ms
            .or(unleash.timeout_allowance_ms)
            .map_or(defaults.allowance, Duration::from_millis);

        let thresholds = Thresholds {
            efficacy: percentage(
                "threshold_efficacy",
                cli.threshold_efficacy.or(unleash.threshold_efficacy),
            )?,
            mutation_coverage: percentage(
                "threshold_mcover",
                cli.threshold_mcover.or(unleash.threshold_mcover),
            )?,
        };

        let mut exclude = unleash.exclude.clone();
        exclude.extend(cli.exclude.iter().cloned());

        Ok(Settings {
            enabled,
            scheduler: SchedulerConfig {
                workers,
                dry_run: cli.dry_run || unleash.dry_run.unwrap_or(false),
                timeouts: Timeouts {
                    multiplier,
                    allowance,
                },
            },
            integration: cli.integration || unleash.integration.unwrap_or(false),
            test_cmd: cli.test_cmd.clone().or_else(|| unleash.test_cmd.clone()),
            exclude,
            thresholds,
        })
    }
}

fn toggle(enabled: &mut EnabledTypes, names: &[String], on: bool) -> Result<(), ConfigError> {
    for name in names {
        let mutation_type = MutationType::from_name(name)
            .ok_or_else(|| ConfigError::UnknownMutationType(name.clone()))?;
        enabled.set(mutation_type, on);
    }
    Ok(())
}

fn percentage(key: &'static str, value: Option<f64>) -> Result<Option<f64>, ConfigError> {
    match value {
        Some(v) if !(0.0..=100.0).contains(&v) => Err(ConfigError::OutOfRange {
            key,
            expected: "a percentage between 0 and 100",
            value: v.to_string(),
        }),
        other => Ok(other),
    }
}
