use burn::module::{Module, Param};
use burn::tensor::backend::Backend;
use burn::tensor::module::conv2d;
use burn::tensor::ops::ConvOptions;
use burn::tensor::{Distribution as TensorDistribution, Tensor};

use super::error::ModelError;
use super::mask::{MaskType, validate_kernel};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Padding {
    /// Zero padding of half the kernel on every side.
    Same,
    Valid,
}

#[derive(Clone, Debug)]
pub struct MaskedConv2dConfig {
    pub mask: MaskType,
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel: [usize; 2],
    pub stride: usize,
    pub padding: Padding,
}

impl MaskedConv2dConfig {
    pub fn new(mask: MaskType, channels: [usize; 2], kernel: [usize; 2]) -> Self {
        Self {
            mask,
            in_channels: channels[0],
            out_channels: channels[1],
            kernel,
            stride: 1,
            padding: Padding::Same,
        }
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride.max(1);
        self
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<MaskedConv2d<B>, ModelError> {
        let [kernel_height, kernel_width] = self.kernel;
        validate_kernel(kernel_height, kernel_width)?;

        let shape = [
            self.out_channels,
            self.in_channels,
            kernel_height,
            kernel_width,
        ];
        let receptive = kernel_height * kernel_width;
        let fan_in = (self.in_channels * receptive) as f64;
        let fan_out = (self.out_channels * receptive) as f64;
        let limit = (6.0 / (fan_in + fan_out)).sqrt();

        let weight = Tensor::<B, 4>::random(
            shape,
            TensorDistribution::Uniform(-limit, limit),
            device,
        );
        let bias = Tensor::<B, 1>::zeros([self.out_channels], device);
        let mask = self.mask.weight_mask::<B>(shape, device)?;

        let (pad_h, pad_w) = match self.padding {
            Padding::Same => (kernel_height / 2, kernel_width / 2),
            Padding::Valid => (0, 0),
        };

        Ok(MaskedConv2d {
            kind: self.mask,
            weight: Param::from_tensor(weight),
            bias: Param::from_tensor(bias),
            mask,
            stride: self.stride,
            pad_h,
            pad_w,
        })
    }
}

/// 2-D convolution whose kernel is multiplied by a fixed causal mask.
#[derive(Module, Debug)]
pub struct MaskedConv2d<B: Backend> {
    kind: MaskType,
    weight: Param<Tensor<B, 4>>,
    bias: Param<Tensor<B, 1>>,
    mask: Tensor<B, 4>,
    stride: usize,
    pad_h: usize,
    pad_w: usize,
}

impl<B: Backend> MaskedConv2d<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let weight = self.weight.val() * self.mask.clone();
        conv2d(
            input,
            weight,
            Some(self.bias.val()),
            ConvOptions::new(
                [self.stride, self.stride],
                [self.pad_h, self.pad_w],
                [1, 1],
                1,
            ),
        )
    }

    pub fn mask_type(&self) -> MaskType {
        self.kind
    }

    /// Kernel as seen by the convolution (mask applied).
    pub fn effective_weight(&self) -> Tensor<B, 4> {
        self.weight.val() * self.mask.clone()
    }
}
