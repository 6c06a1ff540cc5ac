use burn_dataset::Dataset;
use burn_dataset::vision::MnistDataset;
use tracing::info;

use crate::model::ModelError;

use super::{ImageDataset, ImageShape, QuantizedImages};

pub const MNIST_HEIGHT: usize = 28;
pub const MNIST_WIDTH: usize = 28;

/// Downloads (on first use) and quantizes both MNIST splits.
pub fn load_mnist(num_levels: usize) -> Result<ImageDataset, ModelError> {
    let shape = ImageShape::new(MNIST_HEIGHT, MNIST_WIDTH, 1);
    let train = quantize_split(&MnistDataset::train(), shape, num_levels)?;
    let test = quantize_split(&MnistDataset::test(), shape, num_levels)?;
    info!(
        "loaded MNIST: {} train / {} test images at {num_levels} levels",
        train.len(),
        test.len()
    );
    Ok(ImageDataset { train, test })
}

fn quantize_split(
    dataset: &MnistDataset,
    shape: ImageShape,
    num_levels: usize,
) -> Result<QuantizedImages, ModelError> {
    let mut intensities = Vec::with_capacity(dataset.len() * shape.pixels());
    for item in dataset.iter() {
        for row in item.image.iter() {
            intensities.extend(row.iter().map(|&pixel| pixel / 255.0));
        }
    }
    QuantizedImages::from_intensities(&intensities, shape, num_levels)
}
