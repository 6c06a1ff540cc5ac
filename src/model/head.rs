use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::tensor::Tensor;
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;

#[derive(Module, Debug)]
pub struct OutputHead<B: Backend> {
    hidden: Conv2d<B>,
    logits: Conv2d<B>,
    channels: usize,
    levels: usize,
}

impl<B: Backend> OutputHead<B> {
    pub fn new(
        in_channels: usize,
        hidden: usize,
        channels: usize,
        levels: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            hidden: Conv2dConfig::new([in_channels, hidden], [1, 1]).init(device),
            logits: Conv2dConfig::new([hidden, channels * levels], [1, 1]).init(device),
            channels,
            levels,
        }
    }

    /// `[N, F, H, W]` features to `[N, H, W, C, Q]` logits.
    ///
    /// The `Q * C` output channels are laid out levels-major, i.e. read as
    /// `[N, H, W, Q, C]` before moving the level axis last.
    pub fn forward(&self, features: Tensor<B, 4>) -> Tensor<B, 5> {
        let x = self.hidden.forward(relu(features));
        let x = self.logits.forward(relu(x));

        let [batch, _, height, width] = x.dims();
        x.permute([0, 2, 3, 1])
            .reshape([batch, height, width, self.levels, self.channels])
            .swap_dims(3, 4)
    }
}
