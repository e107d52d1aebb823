//! Configuration – reads `~/.tagsense/config.toml`.
//!
//! Every section and field has a default, so a partial file (or no file at
//! all) is valid.  The file is never written back.
//!
//! ```toml
//! [lifecycle]
//! lost_timeout_seconds = 1.0
//!
//! [calibration]
//! collection_duration_seconds = 20.0
//! minimum_samples = 5
//!
//! [hit]
//! max_loss_window_seconds = 1.2
//! orientation_gate = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tagsense_kernel::HitPipelineConfig;
use tagsense_perception::{CalibrationConfig, LifecycleConfig, SmootherConfig, TrustConfig};
use tagsense_types::TagError;
use tracing::debug;

/// Full tracking-stack configuration, one section per component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagsenseConfig {
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Set `smoother.enabled = false` to skip feeding the smoother.
    #[serde(default)]
    pub smoother: SmootherSection,

    #[serde(default)]
    pub calibration: CalibrationConfig,

    #[serde(default)]
    pub trust: TrustConfig,

    #[serde(default)]
    pub hit: HitPipelineConfig,
}

/// `[smoother]` section: the smoother tunables plus an on/off switch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmootherSection {
    #[serde(default = "default_smoother_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub settings: SmootherConfig,
}

fn default_smoother_enabled() -> bool {
    true
}

impl Default for SmootherSection {
    fn default() -> Self {
        Self {
            enabled: default_smoother_enabled(),
            settings: SmootherConfig::default(),
        }
    }
}

impl Default for TagsenseConfig {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleConfig::default(),
            smoother: SmootherSection::default(),
            calibration: CalibrationConfig::default(),
            trust: TrustConfig::default(),
            hit: HitPipelineConfig::default(),
        }
    }
}

impl TagsenseConfig {
    /// Parse a TOML document.  Environment overrides are not applied.
    pub fn from_toml_str(raw: &str) -> Result<Self, TagError> {
        toml::from_str(raw).map_err(|e| TagError::ConfigParse(e.to_string()))
    }

    /// Render as TOML, e.g. for `tagsense config`.
    pub fn to_toml_string(&self) -> Result<String, TagError> {
        toml::to_string_pretty(self).map_err(|e| TagError::ConfigParse(e.to_string()))
    }
}

/// Return the path to `~/.tagsense/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".tagsense").join("config.toml")
}

/// Load the config from the default path.  Returns `None` if the file does
/// not exist.
pub fn load() -> Result<Option<TagsenseConfig>, TagError> {
    load_from(&config_path())
}

/// Load the config from a specific path and apply `TAGSENSE_*` overrides.
pub fn load_from(path: &Path) -> Result<Option<TagsenseConfig>, TagError> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file");
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| TagError::ConfigIo {
        path: path.display().to_string(),
        details: e.to_string(),
    })?;
    let mut cfg = TagsenseConfig::from_toml_str(&raw)?;
    apply_env_overrides(&mut cfg);
    debug!(path = %path.display(), "config loaded");
    Ok(Some(cfg))
}

/// Apply `TAGSENSE_*` environment variable overrides to `cfg`.
///
/// Unparsable values are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `TAGSENSE_LOST_TIMEOUT` | `lifecycle.lost_timeout_seconds` |
/// | `TAGSENSE_COLLECTION_DURATION` | `calibration.collection_duration_seconds` |
/// | `TAGSENSE_MIN_SAMPLES` | `calibration.minimum_samples` |
/// | `TAGSENSE_TRUST_LOW_THRESHOLD` | `trust.trust_low_threshold` |
/// | `TAGSENSE_MAX_LOSS_WINDOW` | `hit.max_loss_window_seconds` |
pub fn apply_env_overrides(cfg: &mut TagsenseConfig) {
    apply_overrides_from(cfg, |key| std::env::var(key).ok());
}

/// Same as [`apply_env_overrides`] with an injectable lookup.
pub(crate) fn apply_overrides_from<F>(cfg: &mut TagsenseConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("TAGSENSE_LOST_TIMEOUT")
        && let Ok(secs) = v.parse::<f64>()
    {
        cfg.lifecycle.lost_timeout_seconds = secs;
    }
    if let Some(v) = lookup("TAGSENSE_COLLECTION_DURATION")
        && let Ok(secs) = v.parse::<f64>()
    {
        cfg.calibration.collection_duration_seconds = secs;
    }
    if let Some(v) = lookup("TAGSENSE_MIN_SAMPLES")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.calibration.minimum_samples = n;
    }
    if let Some(v) = lookup("TAGSENSE_TRUST_LOW_THRESHOLD")
        && let Ok(t) = v.parse::<f32>()
    {
        cfg.trust.trust_low_threshold = t;
    }
    if let Some(v) = lookup("TAGSENSE_MAX_LOSS_WINDOW")
        && let Ok(secs) = v.parse::<f64>()
    {
        cfg.hit.max_loss_window_seconds = secs;
    }
}
