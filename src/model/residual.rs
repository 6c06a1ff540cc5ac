use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::tensor::Tensor;
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;

use super::error::ModelError;
use super::mask::MaskType;
use super::masked_conv::{MaskedConv2d, MaskedConv2dConfig};

#[derive(Clone, Debug)]
pub struct ResidualBlockConfig {
    pub channels: usize,
    pub hidden: usize,
    pub kernel_size: usize,
}

impl ResidualBlockConfig {
    /// Bottleneck of width `hidden` that expands back to `2 * hidden`.
    pub fn new(channels: usize, hidden: usize) -> Self {
        Self {
            channels,
            hidden,
            kernel_size: 3,
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ResidualBlock<B>, ModelError> {
        let expand = 2 * self.hidden;
        if self.channels != expand {
            return Err(ModelError::ResidualWidthMismatch {
                input: self.channels,
                expand,
            });
        }

        Ok(ResidualBlock {
            reduce: Conv2dConfig::new([self.channels, self.hidden], [1, 1]).init(device),
            masked: MaskedConv2dConfig::new(
                MaskType::B,
                [self.hidden, self.hidden],
                [self.kernel_size, self.kernel_size],
            )
            .init(device)?,
            expand: Conv2dConfig::new([self.hidden, expand], [1, 1]).init(device),
        })
    }
}

#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    reduce: Conv2d<B>,
    masked: MaskedConv2d<B>,
    expand: Conv2d<B>,
}

impl<B: Backend> ResidualBlock<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.reduce.forward(relu(input.clone()));
        let x = self.masked.forward(relu(x));
        let x = self.expand.forward(relu(x));
        x + input
    }
}
