use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("kernel dimensions must be odd to have a centre (got {height}x{width})")]
    EvenKernel { height: usize, width: usize },
    #[error("unknown mask type `{0}` (expected one of V, A, B)")]
    UnknownMaskType(String),
    #[error("quantization needs at least two levels (got {0})")]
    InvalidLevels(usize),
    #[error("residual block expands to {expand} channels but receives {input}")]
    ResidualWidthMismatch { input: usize, expand: usize },
    #[error("{height}x{width} image is too small for the conditioning encoder")]
    ImageTooSmall { height: usize, width: usize },
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),
}
