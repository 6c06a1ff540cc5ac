use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Linear, LinearConfig};
use burn::tensor::Tensor;
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;

use super::error::ModelError;

/// (out channels, kernel) for each conv + pool stage.
const STAGES: [(usize, usize); 3] = [(100, 5), (150, 5), (200, 3)];

#[derive(Clone, Debug)]
pub struct ConditioningEncoderConfig {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub code_dim: usize,
}

impl ConditioningEncoderConfig {
    pub fn new(channels: usize, height: usize, width: usize, code_dim: usize) -> Self {
        Self {
            channels,
            height,
            width,
            code_dim,
        }
    }

    fn reduced_size(&self) -> Result<(usize, usize), ModelError> {
        let too_small = || ModelError::ImageTooSmall {
            height: self.height,
            width: self.width,
        };
        let (mut height, mut width) = (self.height, self.width);
        for (_, kernel) in STAGES {
            if height < kernel || width < kernel {
                return Err(too_small());
            }
            height = (height - kernel + 1).div_ceil(2);
            width = (width - kernel + 1).div_ceil(2);
        }
        Ok((height, width))
    }

    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<ConditioningEncoder<B>, ModelError> {
        let (height, width) = self.reduced_size()?;

        let mut convs = Vec::with_capacity(STAGES.len());
        let mut in_channels = self.channels;
        for (out_channels, kernel) in STAGES {
            convs.push(Conv2dConfig::new([in_channels, out_channels], [kernel, kernel]).init(device));
            in_channels = out_channels;
        }

        Ok(ConditioningEncoder {
            convs,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            projection: LinearConfig::new(in_channels * height * width, self.code_dim).init(device),
        })
    }
}

/// Unmasked conv/pool stack summarising a whole image into a fixed-length code.
#[derive(Module, Debug)]
pub struct ConditioningEncoder<B: Backend> {
    convs: Vec<Conv2d<B>>,
    pool: MaxPool2d,
    projection: Linear<B>,
}

impl<B: Backend> ConditioningEncoder<B> {
    pub fn encode(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for conv in &self.convs {
            x = self.pool.forward(pad_to_even(relu(conv.forward(x))));
        }
        self.projection.forward(x.flatten::<2>(1, 3))
    }
}

/// Repeat a `[batch, dim]` code over every pixel of a `height x width` map.
pub fn broadcast_code<B: Backend>(code: Tensor<B, 2>, height: usize, width: usize) -> Tensor<B, 4> {
    let [batch, dim] = code.dims();
    code.reshape([batch, dim, 1, 1])
        .repeat_dim(2, height)
        .repeat_dim(3, width)
}

/// Pads odd spatial sizes with a trailing zero row/column so that 2x2 pooling
/// rounds up. Inputs are post-ReLU, so zero never wins over a real value.
fn pad_to_even<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    let [batch, channels, height, width] = x.dims();
    let device = x.device();
    let mut x = x;
    if height % 2 == 1 {
        let row = Tensor::zeros([batch, channels, 1, width], &device);
        x = Tensor::cat(vec![x, row], 2);
    }
    if width % 2 == 1 {
        let height = x.dims()[2];
        let col = Tensor::zeros([batch, channels, height, 1], &device);
        x = Tensor::cat(vec![x, col], 3);
    }
    x
}
