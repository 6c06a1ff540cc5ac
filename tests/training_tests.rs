use std::f64::consts::LN_2;

use burn::module::AutodiffModule;
use burn::optim::AdamConfig;
use burn::tensor::backend::Backend as BackendTrait;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use burn_pixelcnn::{
    ImageShape, PixelCnn, PixelCnnConfig, QuantizedImages, TrainingOptions, evaluate, fit,
};

type Backend = Autodiff<NdArray<f32>>;

fn options(epochs: usize) -> TrainingOptions {
    TrainingOptions {
        epochs,
        batch_size: 4,
        log_frequency: 1,
        learning_rate: 1e-2,
        lr_decay: 0.9995,
        grad_clip_norm: 1.0,
        seed: 17,
    }
}

fn model() -> PixelCnn<Backend> {
    <Backend as BackendTrait>::seed(5);
    let config = PixelCnnConfig {
        hidden: 4,
        residual_blocks: 1,
        stem_kernel: 3,
        head_hidden: 8,
        ..PixelCnnConfig::default()
    };
    PixelCnn::new(&config, &Default::default()).expect("pixel cnn")
}

fn blank_images(count: usize) -> QuantizedImages {
    let shape = ImageShape::new(6, 6, 1);
    QuantizedImages::from_intensities(&vec![0.0; count * shape.pixels()], shape, 4)
        .expect("blank images")
}

#[test]
fn fitting_blank_images_lowers_the_loss() {
    let device = Default::default();
    let images = blank_images(10);
    let optimizer = AdamConfig::new().init::<Backend, PixelCnn<Backend>>();

    let (_, summaries) = fit(model(), optimizer, &images, &options(6), &device).expect("fit");

    assert_eq!(summaries.len(), 6);
    // 10 images in batches of 4, the last one partial
    assert!(summaries.iter().all(|summary| summary.iterations == 3));
    let first = summaries[0].mean_loss;
    let last = summaries[5].mean_loss;
    assert!(last.is_finite());
    assert!(last < first, "loss went from {first} to {last}");
}

#[test]
fn learning_rate_decays_before_every_update() {
    let device = Default::default();
    let images = blank_images(10);
    let optimizer = AdamConfig::new().init::<Backend, PixelCnn<Backend>>();
    let mut opts = options(2);
    opts.lr_decay = 0.5;

    let (_, summaries) = fit(model(), optimizer, &images, &opts, &device).expect("fit");

    // 3 updates per epoch; update k uses lr * 0.5^(k + 1)
    let first_epoch = summaries[0].final_learning_rate;
    let second_epoch = summaries[1].final_learning_rate;
    assert!((first_epoch - 1e-2 * 0.5f64.powi(3)).abs() < 1e-12, "{first_epoch}");
    assert!((second_epoch - 1e-2 * 0.5f64.powi(6)).abs() < 1e-12, "{second_epoch}");
}

#[test]
fn evaluation_reports_bits_per_dim() {
    let device = Default::default();
    let images = blank_images(5);
    let model = model().valid();

    let evaluation = evaluate(&model, &images, 2, &device).expect("evaluate");
    assert_eq!(evaluation.images, 5);
    assert!(evaluation.nll > 0.0);
    assert!((evaluation.bits_per_dim - evaluation.nll / LN_2).abs() < 1e-9);
}

#[test]
fn empty_training_set_is_an_error() {
    let device = Default::default();
    let images = blank_images(0);
    let optimizer = AdamConfig::new().init::<Backend, PixelCnn<Backend>>();
    assert!(fit(model(), optimizer, &images, &options(1), &device).is_err());
}
