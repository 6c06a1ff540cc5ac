#![recursion_limit = "512"]

pub mod config;
pub mod dataset;
pub mod model;
pub mod quantize;
pub mod render;
pub mod runtime;
pub mod sampling;
pub mod training;

pub use config::{
    DatasetConfig, GatedOverrides, ModelVariantConfig, OptimizerConfig, PixelCnnOverrides,
    SamplingSettings, TrainingConfig, TrainingHyperparameters, build_gated_config,
    build_pixel_cnn_config, load_training_config,
};
pub use dataset::{ImageBatch, ImageDataset, ImageShape, QuantizedImages, load_mnist};
pub use model::{
    ConditionedGatedPixelCnn, GatedPixelCnn, GatedPixelCnnConfig, MaskType, MaskedConv2d,
    MaskedConv2dConfig, ModelError, PixelCnn, PixelCnnConfig, PixelModel, pixel_cross_entropy,
};
pub use quantize::{dequantize, quantize};
pub use render::save_grid;
pub use sampling::{
    Canvas, SamplingConfig, complete_occluded, sample_canvas, sample_fresh, sample_images,
};
pub use training::{Evaluation, TrainingOptions, evaluate, fit, train_step};
