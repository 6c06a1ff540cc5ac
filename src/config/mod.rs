use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use toml::Value;

use crate::model::{GatedPixelCnnConfig, PixelCnnConfig};
use crate::sampling::SamplingConfig;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DatasetConfig {
    /// Quantization levels per sub-pixel.
    pub levels: usize,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TrainingHyperparameters {
    pub epochs: usize,
    pub batch_size: usize,
    pub log_frequency: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OptimizerConfig {
    pub learning_rate: f64,
    #[serde(default = "default_lr_decay")]
    pub lr_decay: f64,
    #[serde(default = "default_grad_clip_norm")]
    pub grad_clip_norm: f32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SamplingSettings {
    pub num_images: usize,
    #[serde(default = "default_noise_scale")]
    pub noise_scale: f32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub occlude_start_row: Option<usize>,
    #[serde(default = "default_grid_columns")]
    pub grid_columns: usize,
    #[serde(default = "default_sample_output")]
    pub output: PathBuf,
}

impl SamplingSettings {
    pub fn sampling_config(&self, seed: u64) -> SamplingConfig {
        SamplingConfig {
            num_images: self.num_images,
            noise_scale: self.noise_scale,
            temperature: self.temperature,
            occlude_start_row: self.occlude_start_row,
            seed,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct PixelCnnOverrides {
    pub hidden: Option<usize>,
    pub residual_blocks: Option<usize>,
    pub stem_kernel: Option<usize>,
    pub head_hidden: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct GatedOverrides {
    pub filters: Option<usize>,
    pub interior_blocks: Option<usize>,
    pub initial_kernel: Option<usize>,
    pub interior_kernel: Option<usize>,
    pub head_hidden: Option<usize>,
    /// Length of the conditioning code; absent for the unconditioned model.
    pub code_dim: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelVariantConfig {
    PixelCnn(PixelCnnOverrides),
    Gated(GatedOverrides),
}

impl Default for ModelVariantConfig {
    fn default() -> Self {
        ModelVariantConfig::PixelCnn(PixelCnnOverrides::default())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TrainingConfig {
    pub dataset: DatasetConfig,
    pub training: TrainingHyperparameters,
    pub optimizer: OptimizerConfig,
    pub sampling: SamplingSettings,
    #[serde(default)]
    pub model: ModelVariantConfig,
}

pub fn load_training_config(paths: &[PathBuf]) -> Result<TrainingConfig> {
    if paths.is_empty() {
        return Err(anyhow!("at least one configuration path is required"));
    }

    let mut iter = paths.iter();
    let first_path = iter
        .next()
        .ok_or_else(|| anyhow!("configuration iterator unexpectedly empty"))?;
    let mut value = load_value(first_path)?;

    for path in iter {
        let overlay = load_value(path)?;
        merge_values(&mut value, overlay);
    }

    value
        .try_into::<TrainingConfig>()
        .map_err(|err| anyhow!(err))
}

fn load_value(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration file {}", path.display()))?;
    let table: toml::value::Table = toml::from_str(&content)
        .with_context(|| format!("failed to parse {} as TOML", path.display()))?;
    Ok(Value::Table(table))
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base_table), Value::Table(overlay_table)) => {
            for (key, overlay_value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(base_value) => merge_values(base_value, overlay_value),
                    None => {
                        base_table.insert(key, overlay_value);
                    }
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value;
        }
    }
}

/// Residual PixelCNN config for 28x28 single-channel images at `levels`.
pub fn build_pixel_cnn_config(overrides: &PixelCnnOverrides, levels: usize) -> PixelCnnConfig {
    let mut config = PixelCnnConfig {
        levels,
        ..PixelCnnConfig::default()
    };

    if let Some(hidden) = overrides.hidden {
        config.hidden = hidden;
    }
    if let Some(blocks) = overrides.residual_blocks {
        config.residual_blocks = blocks;
    }
    if let Some(kernel) = overrides.stem_kernel {
        config.stem_kernel = kernel;
    }
    if let Some(head_hidden) = overrides.head_hidden {
        config.head_hidden = head_hidden;
    }

    config
}

pub fn build_gated_config(
    overrides: &GatedOverrides,
    levels: usize,
    height: usize,
    width: usize,
) -> GatedPixelCnnConfig {
    let mut config = GatedPixelCnnConfig {
        levels,
        height,
        width,
        code_dim: overrides.code_dim,
        ..GatedPixelCnnConfig::default()
    };

    if let Some(filters) = overrides.filters {
        config.filters = filters;
    }
    if let Some(blocks) = overrides.interior_blocks {
        config.interior_blocks = blocks;
    }
    if let Some(kernel) = overrides.initial_kernel {
        config.initial_kernel = kernel;
    }
    if let Some(kernel) = overrides.interior_kernel {
        config.interior_kernel = kernel;
    }
    if let Some(head_hidden) = overrides.head_hidden {
        config.head_hidden = head_hidden;
    }

    config
}

fn default_seed() -> u64 {
    42
}

fn default_lr_decay() -> f64 {
    0.9995
}

fn default_grad_clip_norm() -> f32 {
    1.0
}

fn default_noise_scale() -> f32 {
    0.01
}

fn default_temperature() -> f32 {
    1.0
}

fn default_grid_columns() -> usize {
    10
}

fn default_sample_output() -> PathBuf {
    PathBuf::from("runs").join("samples.png")
}
