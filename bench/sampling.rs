#![recursion_limit = "512"]

use burn::tensor::backend::Backend as BackendTrait;
use burn_ndarray::NdArray;
use burn_pixelcnn::{ImageShape, PixelCnn, PixelCnnConfig, SamplingConfig, sample_fresh};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

#[derive(Clone, Copy)]
struct SamplingCase {
    name: &'static str,
    batch: usize,
    side: usize,
}

const SAMPLING_CASES: &[SamplingCase] = &[
    SamplingCase {
        name: "b1_8x8",
        batch: 1,
        side: 8,
    },
    SamplingCase {
        name: "b8_8x8",
        batch: 8,
        side: 8,
    },
    SamplingCase {
        name: "b4_14x14",
        batch: 4,
        side: 14,
    },
];

fn sampling_bench(c: &mut Criterion) {
    type Backend = NdArray<f32>;
    <Backend as BackendTrait>::seed(42);
    let device = <Backend as BackendTrait>::Device::default();

    let model_config = PixelCnnConfig {
        hidden: 16,
        residual_blocks: 2,
        head_hidden: 32,
        ..PixelCnnConfig::default()
    };
    let model = PixelCnn::<Backend>::new(&model_config, &device).expect("pixel cnn");

    let mut group = c.benchmark_group("ancestral_sampling");
    group.sample_size(10);
    for case in SAMPLING_CASES {
        let shape = ImageShape::new(case.side, case.side, 1);
        let config = SamplingConfig {
            num_images: case.batch,
            ..SamplingConfig::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(case.name), case, |b, _| {
            b.iter(|| sample_fresh(&model, shape, &config, &device).expect("sample"));
        });
    }
    group.finish();
}

criterion_group!(benches, sampling_bench);
criterion_main!(benches);
