//! Registration configuration.
//!
//! Plain serde structs with defaults, validation, and TOML/JSON loading.
//! The CLI driver owns mode selection and passes these values into the
//! pipeline; nothing here is consulted globally.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::logging::LoggingConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationConfig {
    pub overlap: OverlapConfig,
    pub thumbs: ThumbConfig,
    pub search: SearchConfig,
    pub sanity: SanityConfig,
    pub diagnostics: DiagConfig,
    pub logging: LoggingConfig,
}

/// Overlap prediction and acceptance thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlapConfig {
    /// Minimum acceptable 2-D overlap, in working-scale pixels.
    pub min_2d_overlap: usize,
    /// Minimum acceptable 1-D overlap, in working-scale pixels.
    pub min_1d_overlap: usize,
    /// Trust in the prior transform's translation when predicting the
    /// overlap boxes; 0 disables cropping entirely.
    pub xy_conf: f64,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            min_2d_overlap: 900,
            min_1d_overlap: 20,
            xy_conf: 0.75,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbConfig {
    /// Point-grid coarsening factor for the search stage; 1 disables.
    pub decimation: usize,
}

impl Default for ThumbConfig {
    fn default() -> Self {
        Self { decimation: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Minimum acceptable correlation for the disc-limited path.
    pub r_thresh: f64,
    /// Maximum allowed translation difference from the prior, in
    /// full-resolution pixels; 0 disables both the disc radius cap and
    /// the final sanity check.
    pub translation_limit: f64,
    /// Half-span of the denovo angle sweep, degrees.
    pub half_angle_denovo: f64,
    /// Half-span of the prior-constrained sweep, degrees.
    pub half_angle_prior: f64,
    /// Denovo sweep step, degrees.
    pub sweep_step: f64,
    /// Sweeps below this correlation are failures.
    pub min_sweep_r: f64,
    /// Disc radius for the full-resolution confirmation, working pixels.
    pub full_res_radius: f64,
    /// Allow one pre-adjustment pass when the disc search scores low.
    pub pretweak: bool,
    /// Run the post-search local tweak before finishing.
    pub post_tweak: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            r_thresh: 0.25,
            translation_limit: 50.0,
            half_angle_denovo: 5.0,
            half_angle_prior: 1.0,
            sweep_step: 0.5,
            min_sweep_r: 0.1,
            full_res_radius: 10.0,
            pretweak: true,
            post_tweak: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanityConfig {
    /// Apply the translation-limit check even in override-angle mode.
    /// Historically the override mode is exempt; this flag exists so the
    /// exemption is a stated choice rather than an implicit one.
    pub enforce_in_override: bool,
}

impl Default for SanityConfig {
    fn default() -> Self {
        Self {
            enforce_in_override: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagConfig {
    /// Append a sum-of-squared-difference report per layer pair.
    /// Diagnostic only; never consulted by the pipeline.
    pub sum_sq_dif: bool,
}

impl Default for DiagConfig {
    fn default() -> Self {
        Self { sum_sq_dif: false }
    }
}

#[derive(Debug, Clone)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl RegistrationConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path)?;

        if content.trim_start().starts_with('{') {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(toml::from_str(&content)?)
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P, format: ConfigFormat) -> crate::Result<()> {
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(0.0..=1.0).contains(&self.overlap.xy_conf) {
            errors.push("overlap.xy_conf must be within [0, 1]".to_string());
        }

        if self.overlap.min_1d_overlap == 0 {
            errors.push("overlap.min_1d_overlap must be positive".to_string());
        }

        if self.thumbs.decimation == 0 {
            errors.push("thumbs.decimation must be >= 1".to_string());
        }

        if !(-1.0..=1.0).contains(&self.search.r_thresh) {
            errors.push("search.r_thresh must be within [-1, 1]".to_string());
        }

        if self.search.translation_limit < 0.0 {
            errors.push("search.translation_limit must be non-negative".to_string());
        }

        if self.search.sweep_step <= 0.0 {
            errors.push("search.sweep_step must be positive".to_string());
        }

        if self.search.half_angle_denovo <= 0.0 || self.search.half_angle_prior <= 0.0 {
            errors.push("search half-spans must be positive".to_string());
        }

        if let Err(e) = self.logging.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Load a config file when given, falling back to defaults on any problem.
pub fn load_config_or_default(config_path: Option<&str>) -> RegistrationConfig {
    match config_path {
        Some(path) => match RegistrationConfig::load_from_file(path) {
            Ok(config) => {
                if let Err(errors) = config.validate() {
                    eprintln!("Configuration validation errors:");
                    for error in errors {
                        eprintln!("  - {}", error);
                    }
                    eprintln!("Using default configuration instead.");
                    RegistrationConfig::default()
                } else {
                    config
                }
            }
            Err(e) => {
                eprintln!("Failed to load config from '{}': {}", path, e);
                eprintln!("Using default configuration.");
                RegistrationConfig::default()
            }
        },
        None => RegistrationConfig::default(),
    }
}
