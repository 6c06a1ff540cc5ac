#![recursion_limit = "512"]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use burn_ndarray::NdArray;
use burn_pixelcnn::runtime::{default_checkpoint, init_tracing, reference_images, sample_to_grid};
use burn_pixelcnn::{
    GatedPixelCnn, ImageDataset, ModelVariantConfig, PixelCnn, SamplingSettings, TrainingConfig,
    build_gated_config, build_pixel_cnn_config, load_mnist, load_training_config,
};
use burn_wgpu::Wgpu;

#[cfg(feature = "cuda")]
use burn_cuda::Cuda;

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let mut config_paths = vec![PathBuf::from("config/base.toml")];
    config_paths.extend(args.config.clone());
    let config = load_training_config(&config_paths)?;
    let dataset = load_mnist(config.dataset.levels).context("failed to prepare MNIST")?;

    match args.backend {
        BackendArg::Wgpu => sample_backend::<Wgpu<f32>>(&config, &dataset, &args, "wgpu"),
        BackendArg::NdArray => sample_backend::<NdArray<f32>>(&config, &dataset, &args, "ndarray"),
        BackendArg::Cuda => {
            #[cfg(feature = "cuda")]
            {
                sample_backend::<Cuda<f32>>(&config, &dataset, &args, "cuda")
            }
            #[cfg(not(feature = "cuda"))]
            {
                Err(anyhow!(
                    "cuda backend selected but this build lacks `cuda` feature; rebuild with `--features cuda`"
                ))
            }
        }
    }
}

fn sample_backend<B: Backend>(
    config: &TrainingConfig,
    dataset: &ImageDataset,
    args: &Args,
    backend_name: &str,
) -> Result<()> {
    let seed = args.seed.unwrap_or(config.training.seed);
    B::seed(seed);
    let device = B::Device::default();

    let checkpoint = args
        .checkpoint
        .clone()
        .unwrap_or_else(|| default_checkpoint(backend_name));
    let mut settings = config.sampling.clone();
    apply_sampling_overrides(&mut settings, args);
    let shape = dataset.shape();
    let levels = config.dataset.levels;

    eprintln!(
        "Loading {} using {backend_name} backend.",
        format_checkpoint(&checkpoint)
    );

    match &config.model {
        ModelVariantConfig::PixelCnn(overrides) => {
            let model_config = build_pixel_cnn_config(overrides, levels);
            let model = load_record(PixelCnn::<B>::new(&model_config, &device)?, &checkpoint, &device)?;
            sample_to_grid(&model, &dataset.test, &settings, seed, &settings.output, &device)?;
        }
        ModelVariantConfig::Gated(overrides) => {
            let model_config = build_gated_config(overrides, levels, shape.height, shape.width);
            let model =
                load_record(GatedPixelCnn::<B>::new(&model_config, &device)?, &checkpoint, &device)?;
            if model.is_conditioned() {
                let reference = reference_images(&dataset.test, settings.num_images, &device)?;
                let conditioned = model.conditioned_on(reference);
                sample_to_grid(&conditioned, &dataset.test, &settings, seed, &settings.output, &device)?;
            } else {
                sample_to_grid(&model, &dataset.test, &settings, seed, &settings.output, &device)?;
            }
        }
    }

    Ok(())
}

fn load_record<B: Backend, M: Module<B>>(model: M, checkpoint: &Path, device: &B::Device) -> Result<M> {
    let mut base = checkpoint.to_path_buf();
    if base.extension().is_some_and(|ext| ext == "bin") {
        base.set_extension("");
    }
    model
        .load_file(base, &BinFileRecorder::<FullPrecisionSettings>::new(), device)
        .with_context(|| format!("failed to load checkpoint {}", format_checkpoint(checkpoint)))
}

fn apply_sampling_overrides(settings: &mut SamplingSettings, args: &Args) {
    if let Some(row) = args.occlude_from {
        settings.occlude_start_row = Some(row);
    }
    if let Some(num_images) = args.num_images {
        settings.num_images = num_images;
    }
    if let Some(temperature) = args.temperature {
        settings.temperature = temperature;
    }
    if let Some(output) = &args.output {
        settings.output = output.clone();
    }
}

fn format_checkpoint(base: &Path) -> String {
    let mut path = base.to_path_buf();
    path.set_extension("bin");
    path.display().to_string()
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Draw images from a trained PixelCNN")]
struct Args {
    /// Additional configuration files applied in order (later files override earlier ones).
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Vec<PathBuf>,
    /// Backend to sample on.
    #[arg(long, value_enum, default_value_t = BackendArg::Wgpu)]
    backend: BackendArg,
    /// Model record written by `train`, with or without the `.bin` suffix.
    #[arg(long, value_name = "PATH")]
    checkpoint: Option<PathBuf>,
    /// Keep test images above this row and complete the rest.
    #[arg(long, value_name = "ROW")]
    occlude_from: Option<usize>,
    /// Override the number of images to draw.
    #[arg(long, value_name = "N")]
    num_images: Option<usize>,
    /// Override the sampling temperature.
    #[arg(long, value_name = "T")]
    temperature: Option<f32>,
    /// Seed for the canvas noise and the categorical draws.
    #[arg(long, value_name = "N")]
    seed: Option<u64>,
    /// Where to write the PNG grid.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum BackendArg {
    Wgpu,
    #[value(name = "ndarray")]
    NdArray,
    Cuda,
}
