use burn::tensor::backend::Backend as BackendTrait;
use burn_ndarray::NdArray;
use burn_pixelcnn::{
    Canvas, GatedPixelCnn, GatedPixelCnnConfig, ImageShape, PixelCnn, PixelCnnConfig,
    QuantizedImages, SamplingConfig, complete_occluded, sample_canvas, sample_fresh,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

type Backend = NdArray<f32>;

fn model(levels: usize) -> PixelCnn<Backend> {
    <Backend as BackendTrait>::seed(11);
    let config = PixelCnnConfig {
        levels,
        hidden: 4,
        residual_blocks: 1,
        stem_kernel: 3,
        head_hidden: 8,
        ..PixelCnnConfig::default()
    };
    PixelCnn::new(&config, &Default::default()).expect("pixel cnn")
}

fn digits(count: usize, shape: ImageShape) -> QuantizedImages {
    let values: Vec<f32> = (0..count * shape.pixels())
        .map(|idx| ((idx * 13) % 17) as f32 / 16.0)
        .collect();
    QuantizedImages::from_intensities(&values, shape, 4).expect("digits")
}

#[test]
fn same_seed_draws_identical_images() {
    let model = model(4);
    let device = Default::default();
    let shape = ImageShape::new(5, 5, 1);
    let config = SamplingConfig {
        num_images: 2,
        seed: 99,
        ..SamplingConfig::default()
    };

    let first = sample_fresh(&model, shape, &config, &device).expect("first");
    let second = sample_fresh(&model, shape, &config, &device).expect("second");
    assert_eq!(first.levels(), second.levels());
    assert_eq!(first.pixels(), second.pixels());
    assert!(first.levels().iter().all(|level| *level < 4));
    for (pixel, level) in first.pixels().iter().zip(first.levels()) {
        assert!((pixel - *level as f32 / 3.0).abs() < 1e-6);
    }
}

#[test]
fn occluded_completion_keeps_rows_above_start() {
    let model = model(4);
    let device = Default::default();
    let shape = ImageShape::new(6, 4, 1);
    let images = digits(3, shape);
    let config = SamplingConfig {
        num_images: 3,
        seed: 5,
        ..SamplingConfig::default()
    };

    let start_row = 4;
    let canvas = complete_occluded(&model, &images, start_row, &config, &device).expect("canvas");
    let kept = start_row * shape.width;
    for index in 0..3 {
        let sampled = &canvas.levels()[index * shape.pixels()..(index + 1) * shape.pixels()];
        assert_eq!(&sampled[..kept], &images.image_levels(index)[..kept]);
    }
}

#[test]
fn start_row_past_the_bottom_is_rejected() {
    let model = model(4);
    let shape = ImageShape::new(4, 4, 1);
    let mut rng = StdRng::seed_from_u64(0);
    let canvas = Canvas::noise(1, shape, 4, 0.01, &mut rng);
    let err = sample_canvas(&model, canvas, 5, 1.0, &mut rng, &Default::default()).unwrap_err();
    assert!(err.to_string().contains("start row"));
}

#[test]
fn start_row_at_the_bottom_leaves_canvas_untouched() {
    let model = model(4);
    let images = digits(2, ImageShape::new(4, 4, 1));
    let canvas = Canvas::occluded(&images, 2, 4).expect("canvas");
    let mut rng = StdRng::seed_from_u64(0);
    let out = sample_canvas(&model, canvas.clone(), 4, 1.0, &mut rng, &Default::default())
        .expect("sample");
    assert_eq!(out, canvas);
}

#[test]
fn level_mismatch_is_rejected() {
    let model = model(4);
    let mut rng = StdRng::seed_from_u64(0);
    let canvas = Canvas::noise(1, ImageShape::new(4, 4, 1), 8, 0.01, &mut rng);
    assert!(sample_canvas(&model, canvas, 0, 1.0, &mut rng, &Default::default()).is_err());
}

#[test]
fn empty_batch_is_rejected() {
    let model = model(4);
    let config = SamplingConfig {
        num_images: 0,
        ..SamplingConfig::default()
    };
    let result = sample_fresh(&model, ImageShape::new(4, 4, 1), &config, &Default::default());
    assert!(result.is_err());
}

#[test]
fn conditioned_gated_sampling_uses_frozen_code() {
    <Backend as BackendTrait>::seed(3);
    let device = Default::default();
    let shape = ImageShape::new(22, 22, 1);
    let config = GatedPixelCnnConfig {
        height: 22,
        width: 22,
        levels: 4,
        filters: 4,
        interior_blocks: 1,
        head_hidden: 8,
        code_dim: Some(2),
        ..GatedPixelCnnConfig::default()
    };
    let model = GatedPixelCnn::<Backend>::new(&config, &device).expect("gated");
    let images = digits(2, shape);
    let reference = images.batch::<Backend>(&[0, 1], &device).inputs;
    let conditioned = model.conditioned_on(reference);

    let sampling = SamplingConfig {
        num_images: 2,
        seed: 1,
        ..SamplingConfig::default()
    };
    let first = sample_fresh(&conditioned, shape, &sampling, &device).expect("first");
    let second = sample_fresh(&conditioned, shape, &sampling, &device).expect("second");
    assert_eq!(first.levels(), second.levels());
    assert_eq!(first.batch(), 2);
}

#[test]
fn conditioned_sampling_rejects_a_different_batch_size() {
    let device = Default::default();
    let shape = ImageShape::new(22, 22, 1);
    let config = GatedPixelCnnConfig {
        height: 22,
        width: 22,
        levels: 4,
        filters: 4,
        interior_blocks: 1,
        head_hidden: 8,
        code_dim: Some(2),
        ..GatedPixelCnnConfig::default()
    };
    let model = GatedPixelCnn::<Backend>::new(&config, &device).expect("gated");
    let images = digits(2, shape);
    let reference = images.batch::<Backend>(&[0, 1], &device).inputs;
    let conditioned = model.conditioned_on(reference);

    let sampling = SamplingConfig {
        num_images: 3,
        ..SamplingConfig::default()
    };
    let err = sample_fresh(&conditioned, shape, &sampling, &device).unwrap_err();
    assert!(err.to_string().contains("conditioned on 2 images"), "{err}");
}
