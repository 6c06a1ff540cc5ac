//! Pixel-by-pixel ancestral sampling over a batch of canvases.

use anyhow::{Result, anyhow};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData, activation};
use rand::distributions::{Distribution, WeightedIndex};
use rand::prelude::*;
use tracing::debug;

use crate::dataset::{ImageShape, QuantizedImages};
use crate::model::PixelModel;
use crate::quantize::dequantize;

#[derive(Clone, Debug, PartialEq)]
pub struct SamplingConfig {
    pub num_images: usize,
    pub noise_scale: f32,
    pub temperature: f32,
    /// Complete real images from this row down instead of drawing fresh ones.
    pub occlude_start_row: Option<usize>,
    pub seed: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            num_images: 100,
            noise_scale: 0.01,
            temperature: 1.0,
            occlude_start_row: None,
            seed: 42,
        }
    }
}

/// A batch of images being generated, `[N, H, W, C]` row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Canvas {
    pixels: Vec<f32>,
    levels: Vec<u32>,
    batch: usize,
    shape: ImageShape,
    num_levels: usize,
}

impl Canvas {
    pub fn noise(
        batch: usize,
        shape: ImageShape,
        num_levels: usize,
        scale: f32,
        rng: &mut impl Rng,
    ) -> Self {
        let total = batch * shape.pixels();
        let pixels = (0..total).map(|_| rng.r#gen::<f32>() * scale).collect();
        Self {
            pixels,
            levels: vec![0; total],
            batch,
            shape,
            num_levels,
        }
    }

    /// The first `batch` images of `images` with every row from
    /// `start_row` down set to zero.
    pub fn occluded(images: &QuantizedImages, batch: usize, start_row: usize) -> Result<Self> {
        if batch > images.len() {
            return Err(anyhow!(
                "requested {batch} occluded images but only {} are available",
                images.len()
            ));
        }
        let shape = images.shape();
        let num_levels = images.num_levels();
        let row_len = shape.width * shape.channels;
        let visible = start_row.min(shape.height) * row_len;

        let mut levels = Vec::with_capacity(batch * shape.pixels());
        for index in 0..batch {
            let image = images.image_levels(index);
            levels.extend_from_slice(&image[..visible]);
            levels.extend(std::iter::repeat_n(0, shape.pixels() - visible));
        }
        let pixels = levels
            .iter()
            .map(|&level| dequantize(level, num_levels))
            .collect();

        Ok(Self {
            pixels,
            levels,
            batch,
            shape,
            num_levels,
        })
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn shape(&self) -> ImageShape {
        self.shape
    }

    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    pub fn levels(&self) -> &[u32] {
        &self.levels
    }

    pub fn image_pixels(&self, index: usize) -> &[f32] {
        let per_image = self.shape.pixels();
        &self.pixels[index * per_image..(index + 1) * per_image]
    }

    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 4> {
        Tensor::from_data(
            TensorData::new(
                self.pixels.clone(),
                [
                    self.batch,
                    self.shape.height,
                    self.shape.width,
                    self.shape.channels,
                ],
            ),
            device,
        )
    }

    fn offset(&self, image: usize, row: usize, col: usize, channel: usize) -> usize {
        let ImageShape {
            height,
            width,
            channels,
        } = self.shape;
        ((image * height + row) * width + col) * channels + channel
    }

    fn write(&mut self, image: usize, row: usize, col: usize, channel: usize, level: u32) {
        let offset = self.offset(image, row, col, channel);
        self.levels[offset] = level;
        self.pixels[offset] = dequantize(level, self.num_levels);
    }
}

/// Fills `canvas` in raster order starting at `start_row`, one full forward
/// pass per pixel. Every image and channel at a position is drawn
/// independently from the predicted categorical distribution.
pub fn sample_canvas<B, M>(
    model: &M,
    mut canvas: Canvas,
    start_row: usize,
    temperature: f32,
    rng: &mut StdRng,
    device: &B::Device,
) -> Result<Canvas>
where
    B: Backend,
    M: PixelModel<B>,
{
    let ImageShape {
        height,
        width,
        channels,
    } = canvas.shape;
    if canvas.batch == 0 {
        return Err(anyhow!("canvas must contain at least one image"));
    }
    if start_row > height {
        return Err(anyhow!(
            "start row {start_row} lies outside a {height}-row canvas"
        ));
    }
    if model.channels() != channels || model.levels() != canvas.num_levels {
        return Err(anyhow!(
            "model predicts {} channels x {} levels but canvas holds {} x {}",
            model.channels(),
            model.levels(),
            channels,
            canvas.num_levels
        ));
    }
    if let Some(expected) = model.fixed_batch()
        && expected != canvas.batch
    {
        return Err(anyhow!(
            "model is conditioned on {expected} images but canvas holds {}",
            canvas.batch
        ));
    }
    if temperature <= 0.0 || !temperature.is_finite() {
        return Err(anyhow!("temperature must be positive, got {temperature}"));
    }

    let levels = canvas.num_levels;
    let batch = canvas.batch;

    for row in start_row..height {
        for col in 0..width {
            let logits = model
                .forward(canvas.to_tensor::<B>(device))
                .slice([0..batch, row..row + 1, col..col + 1, 0..channels, 0..levels])
                .reshape([batch * channels, levels])
                .div_scalar(temperature);
            let probs = activation::softmax(logits, 1)
                .into_data()
                .convert::<f32>()
                .into_vec::<f32>()
                .map_err(|err| anyhow!("{err:?}"))?;

            for (slot, distribution) in probs.chunks(levels).enumerate() {
                let level = sample_level(distribution, rng)?;
                canvas.write(slot / channels, row, col, slot % channels, level);
            }
        }
        debug!("[sample] finished row {row}/{height}");
    }

    Ok(canvas)
}

pub fn sample_fresh<B, M>(
    model: &M,
    shape: ImageShape,
    config: &SamplingConfig,
    device: &B::Device,
) -> Result<Canvas>
where
    B: Backend,
    M: PixelModel<B>,
{
    let mut rng = StdRng::seed_from_u64(config.seed);
    let canvas = Canvas::noise(
        config.num_images,
        shape,
        model.levels(),
        config.noise_scale,
        &mut rng,
    );
    sample_canvas(model, canvas, 0, config.temperature, &mut rng, device)
}

pub fn complete_occluded<B, M>(
    model: &M,
    images: &QuantizedImages,
    start_row: usize,
    config: &SamplingConfig,
    device: &B::Device,
) -> Result<Canvas>
where
    B: Backend,
    M: PixelModel<B>,
{
    let mut rng = StdRng::seed_from_u64(config.seed);
    let canvas = Canvas::occluded(images, config.num_images, start_row)?;
    sample_canvas(model, canvas, start_row, config.temperature, &mut rng, device)
}

/// Fresh or occlusion-completion sampling, as `config` selects. `images`
/// supplies the canvas shape and, when occluding, the visible rows.
pub fn sample_images<B, M>(
    model: &M,
    images: &QuantizedImages,
    config: &SamplingConfig,
    device: &B::Device,
) -> Result<Canvas>
where
    B: Backend,
    M: PixelModel<B>,
{
    match config.occlude_start_row {
        Some(start_row) => complete_occluded(model, images, start_row, config, device),
        None => sample_fresh(model, images.shape(), config, device),
    }
}

fn sample_level(distribution: &[f32], rng: &mut StdRng) -> Result<u32> {
    let sum: f32 = distribution.iter().sum();
    let level = if sum.is_finite() && sum > 0.0 {
        WeightedIndex::new(distribution)
            .map_err(|err| anyhow!(err.to_string()))?
            .sample(rng)
    } else {
        rng.gen_range(0..distribution.len())
    };
    Ok(level as u32)
}
