use burn::LearningRate;
use burn::optim::AdamConfig;
use burn::tensor::backend::Backend as BackendTrait;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use burn_pixelcnn::training::train_step;
use burn_pixelcnn::{
    GatedPixelCnn, GatedPixelCnnConfig, ImageShape, PixelCnn, PixelCnnConfig, QuantizedImages,
};
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};

type Backend = Autodiff<NdArray<f32>>;

fn digits(count: usize, levels: usize) -> QuantizedImages {
    let shape = ImageShape::new(28, 28, 1);
    let values: Vec<f32> = (0..count * shape.pixels())
        .map(|idx| ((idx * 31) % 97) as f32 / 96.0)
        .collect();
    QuantizedImages::from_intensities(&values, shape, levels).expect("synthetic digits")
}

fn training_step_bench(c: &mut Criterion) {
    <Backend as BackendTrait>::seed(24);
    let device = <Backend as BackendTrait>::Device::default();
    let lr: LearningRate = 1e-3;
    let indices: Vec<usize> = (0..4).collect();

    let pixel_config = PixelCnnConfig {
        hidden: 16,
        residual_blocks: 3,
        head_hidden: 32,
        ..PixelCnnConfig::default()
    };
    let pixel_model = PixelCnn::<Backend>::new(&pixel_config, &device).expect("pixel cnn");
    let pixel_images = digits(4, pixel_config.levels);

    c.bench_function("pixel_cnn_single_train_step", |b| {
        b.iter_batched(
            || {
                let model = pixel_model.clone();
                let optimizer = AdamConfig::new().init::<Backend, PixelCnn<Backend>>();
                let batch = pixel_images.batch::<Backend>(&indices, &device);
                (model, optimizer, batch)
            },
            |(model, mut optimizer, batch)| train_step(model, &mut optimizer, batch, lr, 1.0),
            BatchSize::SmallInput,
        );
    });

    let gated_config = GatedPixelCnnConfig {
        filters: 16,
        interior_blocks: 2,
        head_hidden: 32,
        levels: 16,
        ..GatedPixelCnnConfig::default()
    };
    let gated_model = GatedPixelCnn::<Backend>::new(&gated_config, &device).expect("gated");
    let gated_images = digits(4, gated_config.levels);

    c.bench_function("gated_autoencoder_single_train_step", |b| {
        b.iter_batched(
            || {
                let model = gated_model.clone();
                let optimizer = AdamConfig::new().init::<Backend, GatedPixelCnn<Backend>>();
                let batch = gated_images.batch::<Backend>(&indices, &device);
                (model, optimizer, batch)
            },
            |(model, mut optimizer, batch)| train_step(model, &mut optimizer, batch, lr, 1.0),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, training_step_bench);
criterion_main!(benches);
