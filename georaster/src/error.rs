use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeorasterError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("{0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("{0:?} carries no georeferencing tags")]
    NotGeoreferenced(PathBuf),

    #[error("unsupported color type {0}")]
    ColorType(String),

    #[error("band {band} out of range, raster has {bands}")]
    Band { band: usize, bands: usize },

    #[error("window {0:?} exceeds raster of {1}x{2}")]
    Window(crate::Window, usize, usize),

    #[error("expected {expected} samples, got {actual}")]
    SampleCount { expected: usize, actual: usize },
}
