use burn::module::Module;
use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

use super::autoregressive::{PixelModel, to_channels_first};
use super::config::GatedPixelCnnConfig;
use super::encoder::{ConditioningEncoder, ConditioningEncoderConfig, broadcast_code};
use super::error::ModelError;
use super::gated::{GatedBlockConfig, GatedStreams, InitialGatedBlock, InteriorGatedBlock};
use super::head::OutputHead;

#[derive(Module, Debug)]
pub struct GatedPixelCnn<B: Backend> {
    encoder: Option<ConditioningEncoder<B>>,
    initial: InitialGatedBlock<B>,
    interior: Vec<InteriorGatedBlock<B>>,
    head: OutputHead<B>,
    channels: usize,
    levels: usize,
}

impl<B: Backend> GatedPixelCnn<B> {
    pub fn new(config: &GatedPixelCnnConfig, device: &B::Device) -> Result<Self, ModelError> {
        config.validate()?;

        let encoder = config
            .code_dim
            .map(|code_dim| {
                ConditioningEncoderConfig::new(config.channels, config.height, config.width, code_dim)
                    .init(device)
            })
            .transpose()?;

        let initial = GatedBlockConfig::new(config.channels, config.filters, config.initial_kernel)
            .with_code_dim(config.code_dim)
            .init_initial(device)?;
        let interior = (0..config.interior_blocks)
            .map(|_| {
                GatedBlockConfig::new(config.filters, config.filters, config.interior_kernel)
                    .with_code_dim(config.code_dim)
                    .init_interior(device)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let head = OutputHead::new(
            config.filters,
            config.head_hidden,
            config.channels,
            config.levels,
            device,
        );

        Ok(Self {
            encoder,
            initial,
            interior,
            head,
            channels: config.channels,
            levels: config.levels,
        })
    }

    pub fn is_conditioned(&self) -> bool {
        self.encoder.is_some()
    }

    /// Code for each image, `[N, code_dim]`; `None` for an unconditioned model.
    pub fn encode(&self, images: Tensor<B, 4>) -> Option<Tensor<B, 2>> {
        self.encoder
            .as_ref()
            .map(|encoder| encoder.encode(to_channels_first(images)))
    }

    pub fn forward_with_code(&self, images: Tensor<B, 4>, code: Option<Tensor<B, 2>>) -> Tensor<B, 5> {
        let images = to_channels_first(images);
        let [_, _, height, width] = images.dims();
        let code = code.map(|code| broadcast_code(code, height, width));

        let mut streams = self
            .initial
            .forward(GatedStreams::from_image(images), code.as_ref());
        for block in &self.interior {
            streams = block.forward(streams, code.as_ref());
        }
        self.head.forward(streams.horizontal)
    }

    /// Freezes the code of `reference` images so the model can be sampled
    /// pixel by pixel without the code tracking the canvas.
    pub fn conditioned_on(&self, reference: Tensor<B, 4>) -> ConditionedGatedPixelCnn<'_, B> {
        ConditionedGatedPixelCnn {
            code: self.encode(reference),
            model: self,
        }
    }
}

impl<B: Backend> PixelModel<B> for GatedPixelCnn<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 5> {
        let code = self.encode(images.clone());
        self.forward_with_code(images, code)
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn levels(&self) -> usize {
        self.levels
    }
}

/// A [`GatedPixelCnn`] paired with a fixed conditioning code.
pub struct ConditionedGatedPixelCnn<'a, B: Backend> {
    model: &'a GatedPixelCnn<B>,
    code: Option<Tensor<B, 2>>,
}

impl<B: Backend> ConditionedGatedPixelCnn<'_, B> {
    pub fn code(&self) -> Option<&Tensor<B, 2>> {
        self.code.as_ref()
    }
}

impl<B: Backend> PixelModel<B> for ConditionedGatedPixelCnn<'_, B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 5> {
        self.model.forward_with_code(images, self.code.clone())
    }

    fn channels(&self) -> usize {
        self.model.channels
    }

    fn levels(&self) -> usize {
        self.model.levels
    }

    fn fixed_batch(&self) -> Option<usize> {
        self.code.as_ref().map(|code| code.dims()[0])
    }
}
