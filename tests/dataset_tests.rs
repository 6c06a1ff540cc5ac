use burn::tensor::backend::Backend as BackendTrait;
use burn_ndarray::NdArray;
use burn_pixelcnn::{ImageShape, QuantizedImages, dequantize};
use rand::SeedableRng;
use rand::rngs::StdRng;

#[test]
fn dataset_batches_match_expected_shape() {
    let shape = ImageShape::new(28, 28, 1);
    let count = 10;
    let intensities: Vec<f32> = (0..count * shape.pixels())
        .map(|idx| (idx % 256) as f32 / 255.0)
        .collect();
    let images = QuantizedImages::from_intensities(&intensities, shape, 4).expect("images");
    assert_eq!(images.len(), count);

    type Backend = NdArray<f32>;
    <Backend as BackendTrait>::seed(0);
    let device = <Backend as BackendTrait>::Device::default();

    let mut rng = StdRng::seed_from_u64(0);
    let batches = images.shuffled_batches(4, &mut rng);
    let last = batches.last().expect("at least one batch");
    assert_eq!(last.len(), 2);

    let batch = images.batch::<Backend>(&batches[0], &device);
    assert_eq!(batch.inputs.shape().dims(), [4, 28, 28, 1]);
    assert_eq!(batch.targets.shape().dims(), [4, 28, 28, 1]);

    let partial = images.batch::<Backend>(last, &device);
    assert_eq!(partial.inputs.shape().dims(), [2, 28, 28, 1]);
}

#[test]
fn batch_inputs_are_dequantized_targets() {
    type Backend = NdArray<f32>;
    let device = <Backend as BackendTrait>::Device::default();
    let shape = ImageShape::new(1, 4, 1);
    let images =
        QuantizedImages::from_intensities(&[0.0, 0.26, 0.74, 1.0], shape, 4).expect("images");

    let batch = images.batch::<Backend>(&[0], &device);
    let inputs = batch
        .inputs
        .into_data()
        .convert::<f32>()
        .into_vec::<f32>()
        .expect("inputs");
    let targets = batch
        .targets
        .into_data()
        .convert::<i64>()
        .into_vec::<i64>()
        .expect("targets");

    assert_eq!(targets, vec![0, 1, 2, 3]);
    for (input, target) in inputs.iter().zip(&targets) {
        assert!((input - dequantize(*target as u32, 4)).abs() < 1e-6);
    }
}
