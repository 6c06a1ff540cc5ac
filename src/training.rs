//! Mini-batch training, gradient clipping and held-out evaluation.

mod clip;

pub use clip::{clip_global_norm, global_grad_norm};

use std::f64::consts::LN_2;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use burn::LearningRate;
use burn::lr_scheduler::LrScheduler;
use burn::lr_scheduler::exponential::ExponentialLrSchedulerConfig;
use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::ElementConversion;
use burn::tensor::backend::{AutodiffBackend, Backend};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use crate::config::{OptimizerConfig, TrainingHyperparameters};
use crate::dataset::{ImageBatch, QuantizedImages};
use crate::model::{PixelModel, pixel_cross_entropy};

#[derive(Clone, Debug, PartialEq)]
pub struct TrainingOptions {
    pub epochs: usize,
    pub batch_size: usize,
    pub log_frequency: usize,
    pub learning_rate: LearningRate,
    /// Per-iteration multiplicative learning-rate decay.
    pub lr_decay: f64,
    pub grad_clip_norm: f32,
    pub seed: u64,
}

impl TrainingOptions {
    pub fn from_config(training: &TrainingHyperparameters, optimizer: &OptimizerConfig) -> Self {
        Self {
            epochs: training.epochs,
            batch_size: training.batch_size,
            log_frequency: training.log_frequency,
            learning_rate: optimizer.learning_rate,
            lr_decay: optimizer.lr_decay,
            grad_clip_norm: optimizer.grad_clip_norm,
            seed: training.seed,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct StepOutcome {
    pub loss: f32,
    pub grad_norm: f32,
    pub learning_rate: LearningRate,
}

#[derive(Clone, Debug)]
pub struct EpochSummary {
    pub epoch: usize,
    pub iterations: usize,
    pub mean_loss: f32,
    /// Rate used by the last update of the epoch.
    pub final_learning_rate: LearningRate,
    pub elapsed: Duration,
}

#[derive(Clone, Copy, Debug)]
pub struct Evaluation {
    pub nll: f64,
    pub bits_per_dim: f64,
    pub images: usize,
}

/// Forward, loss, backward, global-norm clip and one optimizer update.
pub fn train_step<B, M, O>(
    model: M,
    optimizer: &mut O,
    batch: ImageBatch<B>,
    learning_rate: LearningRate,
    grad_clip_norm: f32,
) -> (M, StepOutcome)
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + PixelModel<B>,
    O: Optimizer<M, B>,
{
    let logits = model.forward(batch.inputs);
    let loss = pixel_cross_entropy(logits, batch.targets);
    let grads = GradientsParams::from_grads(loss.backward(), &model);
    let (grads, grad_norm) = clip_global_norm::<B, M>(&model, grads, grad_clip_norm);

    let loss = loss.into_scalar().elem::<f32>();
    let model = optimizer.step(learning_rate, model, grads);
    (
        model,
        StepOutcome {
            loss,
            grad_norm,
            learning_rate,
        },
    )
}

/// Runs `options.epochs` passes over `dataset`, reshuffling every epoch.
///
/// The rate decays before every update, so iteration `k` (from 0) uses
/// `learning_rate * lr_decay^(k + 1)`.
pub fn fit<B, M, O>(
    mut model: M,
    mut optimizer: O,
    dataset: &QuantizedImages,
    options: &TrainingOptions,
    device: &B::Device,
) -> Result<(M, Vec<EpochSummary>)>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + PixelModel<B>,
    O: Optimizer<M, B>,
{
    if dataset.is_empty() {
        return Err(anyhow!("training set is empty"));
    }

    // burn hands back its initial rate on the first step
    let initial_lr = options.learning_rate * options.lr_decay;
    let mut scheduler = ExponentialLrSchedulerConfig::new(initial_lr, options.lr_decay)
        .init()
        .map_err(|err| anyhow!("failed to initialize exponential lr scheduler: {err}"))?;
    let mut rng = StdRng::seed_from_u64(options.seed);
    let log_frequency = options.log_frequency.max(1);
    let mut summaries = Vec::with_capacity(options.epochs);

    for epoch in 0..options.epochs {
        let epoch_start = Instant::now();
        let batches = dataset.shuffled_batches(options.batch_size, &mut rng);
        let n_iter = batches.len();
        let mut loss_sum = 0.0f64;
        let mut last_lr = 0.0;

        for (iter, indices) in batches.iter().enumerate() {
            let start = Instant::now();
            let lr = scheduler.step();
            let batch = dataset.batch::<B>(indices, device);
            let (updated, outcome) =
                train_step(model, &mut optimizer, batch, lr, options.grad_clip_norm);
            model = updated;
            loss_sum += outcome.loss as f64;
            last_lr = outcome.learning_rate;

            if iter % log_frequency == 0 {
                info!(
                    "[train] epoch {epoch:3} iter {iter:4}/{n_iter:4} time {:.2}s loss {:.4} \
                     grad_norm {:.3} lr {lr:.3e}",
                    start.elapsed().as_secs_f64(),
                    outcome.loss,
                    outcome.grad_norm,
                );
            }
        }

        let elapsed = epoch_start.elapsed();
        let remaining = (options.epochs - epoch - 1) as f64;
        info!(
            "[train] epoch {epoch:3} time {:.2}s eta {:.2}s",
            elapsed.as_secs_f64(),
            elapsed.as_secs_f64() * remaining,
        );

        summaries.push(EpochSummary {
            epoch,
            iterations: n_iter,
            mean_loss: (loss_sum / n_iter.max(1) as f64) as f32,
            final_learning_rate: last_lr,
            elapsed,
        });
    }

    Ok((model, summaries))
}

pub fn evaluate<B, M>(
    model: &M,
    dataset: &QuantizedImages,
    batch_size: usize,
    device: &B::Device,
) -> Result<Evaluation>
where
    B: Backend,
    M: PixelModel<B>,
{
    if dataset.is_empty() {
        return Err(anyhow!("evaluation set is empty"));
    }

    let mut weighted = 0.0f64;
    for indices in dataset.sequential_batches(batch_size) {
        let batch = dataset.batch::<B>(&indices, device);
        let loss = pixel_cross_entropy(model.forward(batch.inputs), batch.targets);
        weighted += loss.into_scalar().elem::<f64>() * indices.len() as f64;
    }

    let nll = weighted / dataset.len() as f64;
    let evaluation = Evaluation {
        nll,
        bits_per_dim: nll / LN_2,
        images: dataset.len(),
    };
    info!(
        "[eval] nll {:.4} nats/dim, {:.4} bits/dim over {} images",
        evaluation.nll, evaluation.bits_per_dim, evaluation.images
    );
    Ok(evaluation)
}
