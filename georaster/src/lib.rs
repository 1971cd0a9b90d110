//! Single and multi-band float GeoTIFF access.
//!
//! Only what a block-wise raster filter needs: georeferencing
//! (affine transform and CRS keys) parsed from the GeoTIFF tags,
//! windowed reads that decode just the overlapping strips or tiles,
//! whole-image reads, and strip-wise writes that carry the source's
//! georeferencing tags over verbatim.
//!
//! # References
//!
//! 1. [TIFF 6.0](https://www.itu.int/itudoc/itu-t/com16/tiff-fx/docs/tiff6.pdf)
//! 1. [OGC GeoTIFF 1.1](https://docs.ogc.org/is/19-008r4/19-008r4.html)

mod error;
mod geokeys;
mod reader;
mod transform;
mod window;
mod writer;

pub use crate::{
    error::GeorasterError,
    geokeys::{Crs, GeoTags},
    reader::{RasterMeta, RasterReader},
    transform::GeoTransform,
    window::{Blocks, Window},
    writer::{write_strips, Bands, BigTiff, RasterSpec},
};
pub use geo;
