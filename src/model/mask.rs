use std::fmt;
use std::str::FromStr;

use burn::module::{
    AutodiffModule, Content, Devices, Module, ModuleDisplay, ModuleDisplayDefault, ModuleMapper,
    ModuleVisitor,
};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{Tensor, TensorData};

use super::error::ModelError;

/// Causal pattern applied to a convolution kernel.
///
/// With `cy = kh / 2` and `cx = kw / 2`:
///
/// ```text
///            Vertical        A               B
///   row < cy  1 1 1 1 1      1 1 1 1 1      1 1 1 1 1
///   row = cy  0 0 0 0 0      1 1 0 0 0      1 1 1 0 0
///   row > cy  0 0 0 0 0      0 0 0 0 0      0 0 0 0 0
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaskType {
    /// Strictly-above context only; feeds the vertical stream.
    Vertical,
    /// Left of the centre on the centre row, centre excluded.
    A,
    /// Like `A` but the centre tap is kept.
    B,
}

impl MaskType {
    /// Whether the kernel tap at `(row, col)` survives the mask.
    pub fn keeps(self, row: usize, col: usize, kernel_height: usize, kernel_width: usize) -> bool {
        let centre_row = kernel_height / 2;
        let centre_col = kernel_width / 2;
        match self {
            MaskType::Vertical => row < centre_row,
            MaskType::A => row < centre_row || (row == centre_row && col < centre_col),
            MaskType::B => row < centre_row || (row == centre_row && col <= centre_col),
        }
    }

    /// Row-major `kernel_height * kernel_width` spatial mask.
    pub fn spatial_mask(
        self,
        kernel_height: usize,
        kernel_width: usize,
    ) -> Result<Vec<f32>, ModelError> {
        validate_kernel(kernel_height, kernel_width)?;
        let mut values = Vec::with_capacity(kernel_height * kernel_width);
        for row in 0..kernel_height {
            for col in 0..kernel_width {
                let keep = self.keeps(row, col, kernel_height, kernel_width);
                values.push(if keep { 1.0 } else { 0.0 });
            }
        }
        Ok(values)
    }

    /// Mask with the same `[out, in, kh, kw]` layout as a convolution weight.
    pub fn weight_mask<B: Backend>(
        self,
        shape: [usize; 4],
        device: &B::Device,
    ) -> Result<Tensor<B, 4>, ModelError> {
        let [out_channels, in_channels, kernel_height, kernel_width] = shape;
        let spatial = self.spatial_mask(kernel_height, kernel_width)?;
        let mask = Tensor::<B, 4>::from_data(
            TensorData::new(spatial, [1, 1, kernel_height, kernel_width]),
            device,
        );
        Ok(mask
            .repeat_dim(0, out_channels)
            .repeat_dim(1, in_channels))
    }
}

pub(crate) fn validate_kernel(kernel_height: usize, kernel_width: usize) -> Result<(), ModelError> {
    if kernel_height % 2 == 0 || kernel_width % 2 == 0 {
        return Err(ModelError::EvenKernel {
            height: kernel_height,
            width: kernel_width,
        });
    }
    Ok(())
}

impl FromStr for MaskType {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "V" | "v" | "vertical" => Ok(MaskType::Vertical),
            "A" | "a" => Ok(MaskType::A),
            "B" | "b" => Ok(MaskType::B),
            other => Err(ModelError::UnknownMaskType(other.to_string())),
        }
    }
}

impl fmt::Display for MaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            MaskType::Vertical => "V",
            MaskType::A => "A",
            MaskType::B => "B",
        };
        f.write_str(tag)
    }
}

impl<B: Backend> Module<B> for MaskType {
    type Record = ();

    fn collect_devices(&self, devices: Devices<B>) -> Devices<B> {
        devices
    }

    fn fork(self, _device: &B::Device) -> Self {
        self
    }

    fn to_device(self, _device: &B::Device) -> Self {
        self
    }

    fn visit<Visitor: ModuleVisitor<B>>(&self, _visitor: &mut Visitor) {}

    fn map<Mapper: ModuleMapper<B>>(self, _mapper: &mut Mapper) -> Self {
        self
    }

    fn load_record(self, _record: Self::Record) -> Self {
        self
    }

    fn into_record(self) -> Self::Record {}
}

impl<B: AutodiffBackend> AutodiffModule<B> for MaskType {
    type InnerModule = MaskType;

    fn valid(&self) -> Self::InnerModule {
        *self
    }
}

impl ModuleDisplayDefault for MaskType {
    fn content(&self, _content: Content) -> Option<Content> {
        None
    }
}

impl ModuleDisplay for MaskType {}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    fn grid(mask: MaskType, kh: usize, kw: usize) -> Vec<Vec<f32>> {
        mask.spatial_mask(kh, kw)
            .expect("odd kernel")
            .chunks(kw)
            .map(|row| row.to_vec())
            .collect()
    }

    #[test]
    fn vertical_mask_zeroes_centre_row_and_below() {
        for k in [1, 3, 5, 7] {
            let rows = grid(MaskType::Vertical, k, k);
            for (row, values) in rows.iter().enumerate() {
                let expected = if row < k / 2 { 1.0 } else { 0.0 };
                assert!(values.iter().all(|v| *v == expected), "k={k} row={row}");
            }
        }
    }

    #[test]
    fn type_a_hides_centre_and_future() {
        for (kh, kw) in [(1, 3), (3, 3), (5, 5), (7, 7), (3, 7)] {
            let rows = grid(MaskType::A, kh, kw);
            let (cy, cx) = (kh / 2, kw / 2);
            assert_eq!(rows[cy][cx], 0.0);
            for col in 0..kw {
                assert_eq!(rows[cy][col], if col < cx { 1.0 } else { 0.0 });
            }
            for row in rows.iter().skip(cy + 1) {
                assert!(row.iter().all(|v| *v == 0.0));
            }
            for row in rows.iter().take(cy) {
                assert!(row.iter().all(|v| *v == 1.0));
            }
        }
    }

    #[test]
    fn type_b_keeps_centre_only() {
        for (kh, kw) in [(1, 3), (3, 3), (7, 7)] {
            let a = MaskType::A.spatial_mask(kh, kw).expect("mask");
            let b = MaskType::B.spatial_mask(kh, kw).expect("mask");
            let centre = (kh / 2) * kw + kw / 2;
            assert_eq!(b[centre], 1.0);
            let differing: Vec<usize> = (0..a.len()).filter(|&idx| a[idx] != b[idx]).collect();
            assert_eq!(differing, vec![centre]);
        }
    }

    #[test]
    fn even_kernels_are_rejected() {
        assert_eq!(
            MaskType::B.spatial_mask(4, 3),
            Err(ModelError::EvenKernel {
                height: 4,
                width: 3
            })
        );
        assert!(MaskType::A.spatial_mask(3, 2).is_err());
    }

    #[test]
    fn parses_known_tags_only() {
        assert_eq!("V".parse::<MaskType>(), Ok(MaskType::Vertical));
        assert_eq!("A".parse::<MaskType>(), Ok(MaskType::A));
        assert_eq!("B".parse::<MaskType>(), Ok(MaskType::B));
        assert_eq!(
            "C".parse::<MaskType>(),
            Err(ModelError::UnknownMaskType("C".into()))
        );
    }

    #[test]
    fn weight_mask_matches_weight_layout() {
        let device = Default::default();
        let mask = MaskType::A
            .weight_mask::<NdArray<f32>>([4, 2, 3, 3], &device)
            .expect("mask");
        assert_eq!(mask.dims(), [4, 2, 3, 3]);
        let values = mask.into_data().convert::<f32>().into_vec::<f32>().expect("vec");
        // 3 above-row taps + 1 left tap survive per (out, in) pair.
        let kept: f32 = values.iter().sum();
        assert_eq!(kept, (4 * 2 * 4) as f32);
    }
}
