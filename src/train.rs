#![recursion_limit = "512"]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};

use burn::module::AutodiffModule;
use burn::optim::AdamConfig;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::AutodiffBackend;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use burn_wgpu::Wgpu;
use tracing::info;

#[cfg(feature = "cuda")]
use burn_cuda::Cuda;

use burn_pixelcnn::runtime::{default_checkpoint, init_tracing, reference_images, sample_to_grid};
use burn_pixelcnn::{
    GatedPixelCnn, ImageDataset, ModelVariantConfig, PixelCnn, PixelModel, TrainingConfig,
    TrainingOptions, build_gated_config, build_pixel_cnn_config, evaluate, fit,
    load_training_config, load_mnist,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Train a PixelCNN or Gated PixelCNN on MNIST")]
struct Args {
    /// Additional configuration files applied in order (later files override earlier ones).
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Vec<PathBuf>,
    /// Backend to use for training.
    #[arg(long, value_enum, default_value_t = BackendArg::Wgpu)]
    backend: BackendArg,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum BackendArg {
    Wgpu,
    #[value(name = "ndarray")]
    NdArray,
    Cuda,
}

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
    config_paths.extend(args.config);
    let config = load_training_config(&config_paths)?;

    let dataset = load_mnist(config.dataset.levels).context("failed to prepare MNIST")?;

    match args.backend {
        BackendArg::Wgpu => train_backend::<Autodiff<Wgpu<f32>>>(&config, &dataset, "wgpu"),
        BackendArg::NdArray => {
            train_backend::<Autodiff<NdArray<f32>>>(&config, &dataset, "ndarray")
        }
        BackendArg::Cuda => {
            #[cfg(feature = "cuda")]
            {
                train_backend::<Autodiff<Cuda<f32>>>(&config, &dataset, "cuda")
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

fn train_backend<B>(config: &TrainingConfig, dataset: &ImageDataset, backend_name: &str) -> Result<()>
where
    B: AutodiffBackend,
{
    B::seed(config.training.seed);
    let device = B::Device::default();
    let shape = dataset.shape();
    let levels = config.dataset.levels;
    let output = config.sampling.output.clone();

    match &config.model {
        ModelVariantConfig::PixelCnn(overrides) => {
            let model_config = build_pixel_cnn_config(overrides, levels);
            info!("[train:{backend_name}] {model_config:?}");
            let model = PixelCnn::<B>::new(&model_config, &device)?;
            let model = train_model(model, config, dataset, backend_name, &device)?.valid();

            sample_to_grid(
                &model,
                &dataset.test,
                &config.sampling,
                config.training.seed,
                &output,
                &device,
            )?;
        }
        ModelVariantConfig::Gated(overrides) => {
            let model_config = build_gated_config(overrides, levels, shape.height, shape.width);
            info!("[train:{backend_name}] {model_config:?}");
            let model = GatedPixelCnn::<B>::new(&model_config, &device)?;
            let model = train_model(model, config, dataset, backend_name, &device)?.valid();

            if model.is_conditioned() {
                let reference =
                    reference_images(&dataset.test, config.sampling.num_images, &device)?;
                let conditioned = model.conditioned_on(reference);
                sample_to_grid(
                    &conditioned,
                    &dataset.test,
                    &config.sampling,
                    config.training.seed,
                    &output,
                    &device,
                )?;
            } else {
                sample_to_grid(
                    &model,
                    &dataset.test,
                    &config.sampling,
                    config.training.seed,
                    &output,
                    &device,
                )?;
            }
        }
    }

    Ok(())
}

/// Fits `model`, evaluates it on the test split and saves its record.
fn train_model<B, M>(
    model: M,
    config: &TrainingConfig,
    dataset: &ImageDataset,
    backend_name: &str,
    device: &B::Device,
) -> Result<M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + PixelModel<B>,
    M::InnerModule: PixelModel<B::InnerBackend>,
{
    info!(
        "[train:{backend_name}] {} parameters, {} train / {} test images",
        model.num_params(),
        dataset.train.len(),
        dataset.test.len()
    );

    let options = TrainingOptions::from_config(&config.training, &config.optimizer);
    let optimizer = AdamConfig::new().init::<B, M>();
    let (model, summaries) = fit(model, optimizer, &dataset.train, &options, device)?;
    if let Some(last) = summaries.last() {
        info!(
            "[train:{backend_name}] final epoch mean loss {:.4}",
            last.mean_loss
        );
    }

    evaluate(
        &model.valid(),
        &dataset.test,
        config.training.batch_size,
        device,
    )?;

    save_model::<B, M>(&model, &default_checkpoint(backend_name))?;
    Ok(model)
}

fn save_model<B, M>(model: &M, path: &Path) -> Result<()>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create run directory {}", dir.display()))?;
    }
    model
        .clone()
        .save_file(path.to_path_buf(), &BinFileRecorder::<FullPrecisionSettings>::new())
        .with_context(|| format!("failed to save model to {}", path.display()))?;
    info!("[train] saved model record to {}.bin", path.display());
    Ok(())
}
