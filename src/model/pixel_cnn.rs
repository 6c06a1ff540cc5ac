use burn::module::Module;
use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

use super::autoregressive::{PixelModel, to_channels_first};
use super::config::PixelCnnConfig;
use super::error::ModelError;
use super::head::OutputHead;
use super::mask::MaskType;
use super::masked_conv::{MaskedConv2d, MaskedConv2dConfig};
use super::residual::{ResidualBlock, ResidualBlockConfig};

#[derive(Module, Debug)]
pub struct PixelCnn<B: Backend> {
    stem: MaskedConv2d<B>,
    blocks: Vec<ResidualBlock<B>>,
    head: OutputHead<B>,
    channels: usize,
    levels: usize,
}

impl<B: Backend> PixelCnn<B> {
    pub fn new(config: &PixelCnnConfig, device: &B::Device) -> Result<Self, ModelError> {
        config.validate()?;
        let width = config.stream_width();
        let kernel = config.stem_kernel;

        let stem = MaskedConv2dConfig::new(MaskType::A, [config.channels, width], [kernel, kernel])
            .init(device)?;
        let blocks = (0..config.residual_blocks)
            .map(|_| ResidualBlockConfig::new(width, config.hidden).init(device))
            .collect::<Result<Vec<_>, _>>()?;
        let head = OutputHead::new(
            width,
            config.head_hidden,
            config.channels,
            config.levels,
            device,
        );

        Ok(Self {
            stem,
            blocks,
            head,
            channels: config.channels,
            levels: config.levels,
        })
    }
}

impl<B: Backend> PixelModel<B> for PixelCnn<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 5> {
        let mut x = self.stem.forward(to_channels_first(images));
        for block in &self.blocks {
            x = block.forward(x);
        }
        self.head.forward(x)
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn levels(&self) -> usize {
        self.levels
    }
}
