use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result, bail};
use image::{ColorType, ImageEncoder, codecs::png::PngEncoder};

use crate::sampling::Canvas;

/// One pixel of padding between tiles, drawn black.
const GUTTER: usize = 1;

/// Writes every image of `canvas` into one PNG, `columns` tiles per row.
pub fn save_grid(canvas: &Canvas, columns: usize, path: &Path) -> Result<()> {
    let shape = canvas.shape();
    let color = match shape.channels {
        1 => ColorType::L8,
        3 => ColorType::Rgb8,
        other => bail!("cannot render images with {other} channels"),
    };
    if canvas.batch() == 0 {
        bail!("no images to render");
    }

    let columns = columns.clamp(1, canvas.batch());
    let rows = canvas.batch().div_ceil(columns);
    let grid_width = columns * shape.width + (columns - 1) * GUTTER;
    let grid_height = rows * shape.height + (rows - 1) * GUTTER;
    let stride = grid_width * shape.channels;

    let mut encoded = vec![0u8; grid_height * stride];
    for index in 0..canvas.batch() {
        let top = (index / columns) * (shape.height + GUTTER);
        let left = (index % columns) * (shape.width + GUTTER);
        let image = canvas.image_pixels(index);
        for (row, line) in image.chunks_exact(shape.width * shape.channels).enumerate() {
            let start = (top + row) * stride + left * shape.channels;
            for (dst, &value) in encoded[start..start + line.len()].iter_mut().zip(line) {
                *dst = (value.clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        }
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    PngEncoder::new(BufWriter::new(file))
        .write_image(
            &encoded,
            grid_width as u32,
            grid_height as u32,
            color.into(),
        )
        .context("failed to encode PNG grid")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ImageShape, QuantizedImages};
    use tempfile::tempdir;

    #[test]
    fn grid_has_expected_dimensions() {
        let shape = ImageShape::new(2, 3, 1);
        let values: Vec<f32> = (0..5 * 6).map(|idx| (idx % 2) as f32).collect();
        let images = QuantizedImages::from_intensities(&values, shape, 2).expect("images");
        let canvas = Canvas::occluded(&images, 5, 2).expect("canvas");

        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("grid.png");
        save_grid(&canvas, 2, &path).expect("save grid");

        let decoded = image::open(&path).expect("decode").to_luma8();
        // 2 columns x 3 rows of 3x2 tiles with 1px gutters
        assert_eq!(decoded.dimensions(), (7, 8));
        assert_eq!(decoded.get_pixel(1, 0).0, [255]);
        assert_eq!(decoded.get_pixel(3, 0).0, [0]);
    }

    #[test]
    fn unsupported_channel_counts_are_rejected() {
        let shape = ImageShape::new(1, 1, 2);
        let images = QuantizedImages::from_intensities(&[0.0, 1.0], shape, 2).expect("images");
        let canvas = Canvas::occluded(&images, 1, 1).expect("canvas");
        let dir = tempdir().expect("tempdir");
        assert!(save_grid(&canvas, 1, &dir.path().join("grid.png")).is_err());
    }
}
