//! Training labels from vector track geometries.
//!
//! Loads a GeoJSON track layer, reprojects it from its declared CRS
//! into EPSG:4326, indexes it by bounding box, and burns the
//! geometries overlapping a raster tile into a binary mask.

mod crs;
mod error;
mod footprint;
mod rasterize;
mod tracks;

pub use crate::{
    crs::{ToWgs84, VectorCrs},
    error::LabelsError,
    footprint::{buffer, QUADRANT_SEGMENTS},
    rasterize::{rasterize, BURN},
    tracks::Tracks,
};
