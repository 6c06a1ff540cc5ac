use burn::nn::loss::CrossEntropyLossConfig;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

/// Mean categorical cross-entropy of `[N, H, W, C, Q]` logits against
/// `[N, H, W, C]` level targets.
pub fn pixel_cross_entropy<B: Backend>(
    logits: Tensor<B, 5>,
    targets: Tensor<B, 4, Int>,
) -> Tensor<B, 1> {
    let [batch, height, width, channels, levels] = logits.dims();
    let rows = batch * height * width * channels;

    let logits_flat = logits.reshape([rows, levels]);
    let targets_flat = targets.reshape([rows]);

    let device = logits_flat.device();
    CrossEntropyLossConfig::new()
        .init::<B>(&device)
        .forward(logits_flat, targets_flat)
}
