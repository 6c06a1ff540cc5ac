use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::tensor::Tensor;
use burn::tensor::activation::{sigmoid, tanh};
use burn::tensor::backend::Backend;

use super::error::ModelError;
use super::mask::MaskType;
use super::masked_conv::{MaskedConv2d, MaskedConv2dConfig};

/// Vertical and horizontal feature maps threaded through the gated stack.
#[derive(Clone, Debug)]
pub struct GatedStreams<B: Backend> {
    pub vertical: Tensor<B, 4>,
    pub horizontal: Tensor<B, 4>,
}

impl<B: Backend> GatedStreams<B> {
    /// Both streams start from the same image.
    pub fn from_image(image: Tensor<B, 4>) -> Self {
        Self {
            vertical: image.clone(),
            horizontal: image,
        }
    }
}

/// `tanh(a) * sigmoid(b)` over the two channel halves of `x`.
pub fn gate<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    let mut halves = x.chunk(2, 1).into_iter();
    match (halves.next(), halves.next()) {
        (Some(tanh_half), Some(sigmoid_half)) => tanh(tanh_half) * sigmoid(sigmoid_half),
        _ => panic!("gated activation needs an even, non-zero channel count"),
    }
}

#[derive(Clone, Debug)]
pub struct GatedBlockConfig {
    pub in_channels: usize,
    pub filters: usize,
    pub kernel_size: usize,
    pub code_dim: Option<usize>,
}

impl GatedBlockConfig {
    pub fn new(in_channels: usize, filters: usize, kernel_size: usize) -> Self {
        Self {
            in_channels,
            filters,
            kernel_size,
            code_dim: None,
        }
    }

    pub fn with_code_dim(mut self, code_dim: Option<usize>) -> Self {
        self.code_dim = code_dim;
        self
    }

    pub fn init_initial<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<InitialGatedBlock<B>, ModelError> {
        Ok(InitialGatedBlock {
            unit: self.init_unit(MaskType::A, device)?,
        })
    }

    pub fn init_interior<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<InteriorGatedBlock<B>, ModelError> {
        if self.in_channels != self.filters {
            return Err(ModelError::ResidualWidthMismatch {
                input: self.in_channels,
                expand: self.filters,
            });
        }
        Ok(InteriorGatedBlock {
            unit: self.init_unit(MaskType::B, device)?,
        })
    }

    fn init_unit<B: Backend>(
        &self,
        horizontal_mask: MaskType,
        device: &B::Device,
    ) -> Result<GatedUnit<B>, ModelError> {
        let doubled = 2 * self.filters;
        let k = self.kernel_size;

        let vertical_conv =
            MaskedConv2dConfig::new(MaskType::Vertical, [self.in_channels, doubled], [k, k])
                .init(device)?;
        let horizontal_conv =
            MaskedConv2dConfig::new(horizontal_mask, [self.in_channels, doubled], [1, k])
                .init(device)?;
        let vertical_to_horizontal = Conv2dConfig::new([doubled, doubled], [1, 1]).init(device);
        let horizontal_output = Conv2dConfig::new([self.filters, self.filters], [1, 1]).init(device);
        let condition = self
            .code_dim
            .map(|code_dim| Conv2dConfig::new([code_dim, doubled], [1, 1]).init(device));

        Ok(GatedUnit {
            vertical_conv,
            horizontal_conv,
            vertical_to_horizontal,
            horizontal_output,
            condition,
        })
    }
}

#[derive(Module, Debug)]
struct GatedUnit<B: Backend> {
    vertical_conv: MaskedConv2d<B>,
    horizontal_conv: MaskedConv2d<B>,
    vertical_to_horizontal: Conv2d<B>,
    horizontal_output: Conv2d<B>,
    condition: Option<Conv2d<B>>,
}

impl<B: Backend> GatedUnit<B> {
    /// Returns the new vertical stream and the projected horizontal activation.
    fn forward(
        &self,
        streams: &GatedStreams<B>,
        code: Option<&Tensor<B, 4>>,
    ) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let vertical_pre = self.vertical_conv.forward(streams.vertical.clone());
        let horizontal_pre = self.horizontal_conv.forward(streams.horizontal.clone());
        let v_to_h = self.vertical_to_horizontal.forward(vertical_pre.clone());

        let (vertical_pre, horizontal_pre) = match (&self.condition, code) {
            (Some(projection), Some(code)) => {
                let bias = projection.forward(code.clone());
                (vertical_pre + bias.clone(), horizontal_pre + v_to_h + bias)
            }
            _ => (vertical_pre, horizontal_pre + v_to_h),
        };

        let vertical = gate(vertical_pre);
        let horizontal = self.horizontal_output.forward(gate(horizontal_pre));
        (vertical, horizontal)
    }
}

/// First block of the stack: type-A horizontal mask, no residual path.
#[derive(Module, Debug)]
pub struct InitialGatedBlock<B: Backend> {
    unit: GatedUnit<B>,
}

impl<B: Backend> InitialGatedBlock<B> {
    pub fn forward(&self, streams: GatedStreams<B>, code: Option<&Tensor<B, 4>>) -> GatedStreams<B> {
        let (vertical, horizontal) = self.unit.forward(&streams, code);
        GatedStreams {
            vertical,
            horizontal,
        }
    }
}

/// Every later block: type-B horizontal mask plus a residual on the horizontal stream.
#[derive(Module, Debug)]
pub struct InteriorGatedBlock<B: Backend> {
    unit: GatedUnit<B>,
}

impl<B: Backend> InteriorGatedBlock<B> {
    pub fn forward(&self, streams: GatedStreams<B>, code: Option<&Tensor<B, 4>>) -> GatedStreams<B> {
        let (vertical, activated) = self.unit.forward(&streams, code);
        GatedStreams {
            vertical,
            horizontal: streams.horizontal + activated,
        }
    }
}
