//! Pieces shared by the `train` and `sample` binaries.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use burn::tensor::Tensor;
use burn::tensor::backend::Backend;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::SamplingSettings;
use crate::dataset::QuantizedImages;
use crate::model::PixelModel;
use crate::render::save_grid;
use crate::sampling::{Canvas, sample_images};

/// Installs a global fmt subscriber honouring `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // a subscriber may already be installed by an embedding process
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

pub fn run_dir(backend_name: &str) -> PathBuf {
    PathBuf::from("runs").join(backend_name)
}

pub fn default_checkpoint(backend_name: &str) -> PathBuf {
    run_dir(backend_name).join("model")
}

pub fn reference_images<B: Backend>(
    images: &QuantizedImages,
    count: usize,
    device: &B::Device,
) -> Result<Tensor<B, 4>> {
    if count == 0 || count > images.len() {
        return Err(anyhow!(
            "need between 1 and {} reference images, got {count}",
            images.len()
        ));
    }
    let indices: Vec<usize> = (0..count).collect();
    Ok(images.batch::<B>(&indices, device).inputs)
}

/// Samples per `settings` (fresh, or completing occluded `images`) and
/// writes the grid to `output`.
pub fn sample_to_grid<B, M>(
    model: &M,
    images: &QuantizedImages,
    settings: &SamplingSettings,
    seed: u64,
    output: &Path,
    device: &B::Device,
) -> Result<Canvas>
where
    B: Backend,
    M: PixelModel<B>,
{
    let config = settings.sampling_config(seed);
    match config.occlude_start_row {
        Some(start_row) => info!(
            "[sample] completing {} images from row {start_row}",
            config.num_images
        ),
        None => info!("[sample] drawing {} fresh images", config.num_images),
    }
    let canvas = sample_images(model, images, &config, device)?;
    save_grid(&canvas, settings.grid_columns, output)?;
    info!("[sample] wrote {}", output.display());
    Ok(canvas)
}
