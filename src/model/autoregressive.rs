use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

/// A network whose logits at pixel `(i, j)` depend only on pixels strictly
/// before `(i, j)` in raster order.
pub trait PixelModel<B: Backend> {
    /// `[N, H, W, C]` intensities in `[0, 1]` to `[N, H, W, C, Q]` logits.
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 5>;

    fn channels(&self) -> usize;

    fn levels(&self) -> usize;

    /// Batch size the model is pinned to, if any.
    fn fixed_batch(&self) -> Option<usize> {
        None
    }
}

pub(crate) fn to_channels_first<B: Backend>(images: Tensor<B, 4>) -> Tensor<B, 4> {
    images.permute([0, 3, 1, 2])
}
