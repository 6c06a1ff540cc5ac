mod mnist;

pub use mnist::{MNIST_HEIGHT, MNIST_WIDTH, load_mnist};

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use rand::prelude::*;

use crate::model::ModelError;
use crate::quantize::{dequantize, quantize_all, validate_levels};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl ImageShape {
    pub fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    pub fn pixels(&self) -> usize {
        self.height * self.width * self.channels
    }
}

/// Images stored as quantization levels, `[N, H, W, C]` row-major.
#[derive(Clone, Debug)]
pub struct QuantizedImages {
    levels: Vec<u32>,
    len: usize,
    shape: ImageShape,
    num_levels: usize,
}

impl QuantizedImages {
    pub fn from_intensities(
        intensities: &[f32],
        shape: ImageShape,
        num_levels: usize,
    ) -> Result<Self, ModelError> {
        validate_levels(num_levels)?;
        let per_image = shape.pixels();
        if per_image == 0 || intensities.len() % per_image != 0 {
            return Err(ModelError::InvalidDataset(format!(
                "{} values do not divide into {}x{}x{} images",
                intensities.len(),
                shape.height,
                shape.width,
                shape.channels
            )));
        }

        Ok(Self {
            levels: quantize_all(intensities, num_levels),
            len: intensities.len() / per_image,
            shape,
            num_levels,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn shape(&self) -> ImageShape {
        self.shape
    }

    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    pub fn image_levels(&self, index: usize) -> &[u32] {
        let per_image = self.shape.pixels();
        &self.levels[index * per_image..(index + 1) * per_image]
    }

    /// Index groups covering the whole set once, in a fresh random order.
    /// The final group is shorter when `batch_size` does not divide the set.
    pub fn shuffled_batches(&self, batch_size: usize, rng: &mut impl Rng) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..self.len).collect();
        order.shuffle(rng);
        order
            .chunks(batch_size.max(1))
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    pub fn sequential_batches(&self, batch_size: usize) -> Vec<Vec<usize>> {
        (0..self.len)
            .collect::<Vec<_>>()
            .chunks(batch_size.max(1))
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    pub fn batch<B: Backend>(&self, indices: &[usize], device: &B::Device) -> ImageBatch<B> {
        let per_image = self.shape.pixels();
        let mut inputs = Vec::with_capacity(indices.len() * per_image);
        let mut targets = Vec::with_capacity(indices.len() * per_image);

        for &index in indices {
            for &level in self.image_levels(index) {
                inputs.push(dequantize(level, self.num_levels));
                targets.push(level as i64);
            }
        }

        let dims = [
            indices.len(),
            self.shape.height,
            self.shape.width,
            self.shape.channels,
        ];
        ImageBatch::new(
            Tensor::<B, 4>::from_data(TensorData::new(inputs, dims), device),
            Tensor::<B, 4, Int>::from_data(TensorData::new(targets, dims), device),
        )
    }
}

#[derive(Clone, Debug)]
pub struct ImageBatch<B: Backend> {
    pub inputs: Tensor<B, 4>,
    pub targets: Tensor<B, 4, Int>,
}

impl<B: Backend> ImageBatch<B> {
    pub fn new(inputs: Tensor<B, 4>, targets: Tensor<B, 4, Int>) -> Self {
        debug_assert_eq!(
            inputs.dims(),
            targets.dims(),
            "inputs and targets must describe the same pixels"
        );
        Self { inputs, targets }
    }
}

#[derive(Clone, Debug)]
pub struct ImageDataset {
    pub train: QuantizedImages,
    pub test: QuantizedImages,
}

impl ImageDataset {
    pub fn shape(&self) -> ImageShape {
        self.train.shape()
    }

    pub fn num_levels(&self) -> usize {
        self.train.num_levels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    fn ramp(count: usize, shape: ImageShape) -> Vec<f32> {
        let total = count * shape.pixels();
        (0..total).map(|idx| idx as f32 / total as f32).collect()
    }

    #[test]
    fn rejects_ragged_buffers() {
        let shape = ImageShape::new(2, 2, 1);
        let err = QuantizedImages::from_intensities(&[0.0; 7], shape, 4).unwrap_err();
        assert!(matches!(err, ModelError::InvalidDataset(_)));
    }

    #[test]
    fn shuffled_batches_cover_every_image_once() {
        let shape = ImageShape::new(2, 2, 1);
        let images = QuantizedImages::from_intensities(&ramp(10, shape), shape, 4).expect("images");
        let mut rng = StdRng::seed_from_u64(7);
        let batches = images.shuffled_batches(4, &mut rng);

        assert_eq!(
            batches.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![4, 4, 2]
        );
        let mut seen: Vec<usize> = batches.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn levels_round_trip_through_images() {
        let shape = ImageShape::new(1, 4, 1);
        let images =
            QuantizedImages::from_intensities(&[0.0, 0.3, 0.6, 1.0], shape, 4).expect("images");
        assert_eq!(images.image_levels(0), &[0, 1, 2, 3]);
    }
}
