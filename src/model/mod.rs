mod autoregressive;
mod config;
mod encoder;
mod error;
mod gated;
mod gated_pixel_cnn;
mod head;
mod loss;
mod mask;
mod masked_conv;
mod pixel_cnn;
mod residual;

pub use autoregressive::PixelModel;
pub use config::{GatedPixelCnnConfig, PixelCnnConfig};
pub use encoder::{ConditioningEncoder, ConditioningEncoderConfig, broadcast_code};
pub use error::ModelError;
pub use gated::{
    GatedBlockConfig, GatedStreams, InitialGatedBlock, InteriorGatedBlock, gate,
};
pub use gated_pixel_cnn::{ConditionedGatedPixelCnn, GatedPixelCnn};
pub use head::OutputHead;
pub use loss::pixel_cross_entropy;
pub use mask::MaskType;
pub use masked_conv::{MaskedConv2d, MaskedConv2dConfig, Padding};
pub use pixel_cnn::PixelCnn;
pub use residual::{ResidualBlock, ResidualBlockConfig};
