use crate::quantize::validate_levels;

use super::error::ModelError;

/// Residual PixelCNN: type-A stem, stack of bottleneck blocks, output head.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelCnnConfig {
    pub channels: usize,
    pub levels: usize,
    pub hidden: usize,
    pub residual_blocks: usize,
    pub stem_kernel: usize,
    pub head_hidden: usize,
}

impl Default for PixelCnnConfig {
    fn default() -> Self {
        Self {
            channels: 1,
            levels: 4,
            hidden: 64,
            residual_blocks: 15,
            stem_kernel: 7,
            head_hidden: 128,
        }
    }
}

impl PixelCnnConfig {
    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        validate_levels(self.levels)
    }

    pub fn stream_width(&self) -> usize {
        2 * self.hidden
    }
}

/// Gated PixelCNN, optionally conditioned on a code computed from the image.
#[derive(Clone, Debug, PartialEq)]
pub struct GatedPixelCnnConfig {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub levels: usize,
    pub filters: usize,
    pub interior_blocks: usize,
    pub initial_kernel: usize,
    pub interior_kernel: usize,
    pub head_hidden: usize,
    /// Length of the conditioning code; `None` builds an unconditioned model.
    pub code_dim: Option<usize>,
}

impl Default for GatedPixelCnnConfig {
    fn default() -> Self {
        Self {
            channels: 1,
            height: 28,
            width: 28,
            levels: 256,
            filters: 64,
            interior_blocks: 7,
            initial_kernel: 7,
            interior_kernel: 3,
            head_hidden: 128,
            code_dim: Some(10),
        }
    }
}

impl GatedPixelCnnConfig {
    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        validate_levels(self.levels)
    }
}
