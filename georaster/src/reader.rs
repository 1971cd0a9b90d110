//! GeoTIFF decoding, either windowed or whole-image.

use crate::{Crs, GeoTags, GeoTransform, GeorasterError, Window};
use geo::geometry::Rect;
use log::debug;
use ndarray::{Array2, Array3};
use std::{
    collections::HashMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use tiff::{
    decoder::{Decoder, DecodingResult, Limits},
    ColorType,
};

/// Dimensions and georeferencing of an opened raster.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterMeta {
    /// Columns.
    pub width: usize,

    /// Rows.
    pub height: usize,

    /// Samples per pixel.
    pub bands: usize,

    /// Pixel to geo transform.
    pub transform: GeoTransform,

    /// Raw tags the transform and CRS were derived from.
    pub tags: GeoTags,
}

impl RasterMeta {
    pub fn crs(&self) -> Crs {
        self.tags.crs()
    }

    /// Geographic extent of the whole raster.
    pub fn bounds(&self) -> Rect {
        self.transform.bounds(self.width, self.height)
    }
}

/// Decoded chunk (strip or tile) samples.
struct Chunk {
    /// Pixels per chunk row.
    width: usize,
    samples: Vec<f32>,
}

pub struct RasterReader {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    meta: RasterMeta,

    /// Nominal (width, height) of a chunk.
    chunk_dims: (usize, usize),

    /// Chunks per chunk row.
    chunks_across: usize,

    /// Chunks decoded for recent windows.
    cache: HashMap<u32, Chunk>,
}

impl RasterReader {
    /// Opens the GeoTIFF at `path` and reads its georeferencing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GeorasterError> {
        let path = path.as_ref().to_owned();
        let file = BufReader::new(File::open(&path)?);
        let mut decoder = Decoder::new(file)?.with_limits(Limits::unlimited());
        let (width, height) = decoder.dimensions()?;
        let (width, height) = (width as usize, height as usize);
        let bands = samples_per_pixel(decoder.colortype()?)?;
        let tags = GeoTags::read(&mut decoder)?;
        let transform = tags
            .transform()
            .ok_or_else(|| GeorasterError::NotGeoreferenced(path.clone()))?;
        let chunk_dims = {
            let (w, h) = decoder.chunk_dimensions();
            (w as usize, h as usize)
        };
        let chunks_across = width.div_ceil(chunk_dims.0.max(1));
        debug!(
            "opened {path:?}: {width}x{height}x{bands}, {}x{} chunks, {}",
            chunk_dims.0,
            chunk_dims.1,
            tags.crs()
        );
        Ok(Self {
            path,
            decoder,
            meta: RasterMeta {
                width,
                height,
                bands,
                transform,
                tags,
            },
            chunk_dims,
            chunks_across,
            cache: HashMap::new(),
        })
    }

    pub fn meta(&self) -> &RasterMeta {
        &self.meta
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads `window` of zero-based `band` as f32, decoding only the
    /// chunks that overlap it.
    ///
    /// Cached chunks lying entirely above `window` are evicted, so
    /// memory stays bounded when windows are visited top to bottom.
    pub fn read_window(&mut self, band: usize, window: Window) -> Result<Array2<f32>, GeorasterError> {
        let RasterMeta {
            width,
            height,
            bands,
            ..
        } = self.meta;
        if band >= bands {
            return Err(GeorasterError::Band { band, bands });
        }
        if !window.fits(width, height) {
            return Err(GeorasterError::Window(window, width, height));
        }
        let (chunk_w, chunk_h) = self.chunk_dims;
        self.evict_above(window.row_off);

        let mut out = Array2::<f32>::zeros((window.height, window.width));
        if window.len() == 0 {
            return Ok(out);
        }
        for cy in window.row_off / chunk_h..=(window.row_end() - 1) / chunk_h {
            for cx in window.col_off / chunk_w..=(window.col_end() - 1) / chunk_w {
                #[allow(clippy::cast_possible_truncation)]
                let index = (cy * self.chunks_across + cx) as u32;
                let chunk = self.chunk(index)?;
                let (chunk_col0, chunk_row0) = (cx * chunk_w, cy * chunk_h);
                let chunk_rows = chunk.samples.len() / (chunk.width * bands);
                let rows = window.row_off.max(chunk_row0)
                    ..window.row_end().min(chunk_row0 + chunk_rows);
                let cols = window.col_off.max(chunk_col0)
                    ..window.col_end().min(chunk_col0 + chunk.width);
                for row in rows {
                    let chunk_row = row - chunk_row0;
                    for col in cols.clone() {
                        let chunk_col = col - chunk_col0;
                        let sample = (chunk_row * chunk.width + chunk_col) * bands + band;
                        out[[row - window.row_off, col - window.col_off]] = chunk.samples[sample];
                    }
                }
            }
        }
        Ok(out)
    }

    /// Decodes the entire image as `(bands, rows, cols)`.
    pub fn read_all(mut self) -> Result<Array3<f32>, GeorasterError> {
        let RasterMeta {
            width,
            height,
            bands,
            ..
        } = self.meta;
        let samples = to_f32(self.decoder.read_image()?);
        if samples.len() != width * height * bands {
            return Err(GeorasterError::SampleCount {
                expected: width * height * bands,
                actual: samples.len(),
            });
        }
        let interleaved = Array3::from_shape_vec((height, width, bands), samples)?;
        Ok(interleaved
            .permuted_axes([2, 0, 1])
            .as_standard_layout()
            .into_owned())
    }
}

/// Private API
impl RasterReader {
    fn chunk(&mut self, index: u32) -> Result<&Chunk, GeorasterError> {
        if !self.cache.contains_key(&index) {
            let (data_w, _) = self.decoder.chunk_data_dimensions(index);
            let samples = to_f32(self.decoder.read_chunk(index)?);
            let chunk = Chunk {
                width: data_w as usize,
                samples,
            };
            self.cache.insert(index, chunk);
        }
        Ok(&self.cache[&index])
    }

    fn evict_above(&mut self, row: usize) {
        let (across, chunk_h) = (self.chunks_across, self.chunk_dims.1);
        self.cache
            .retain(|index, _| (*index as usize / across + 1) * chunk_h > row);
    }
}

fn samples_per_pixel(colortype: ColorType) -> Result<usize, GeorasterError> {
    match colortype {
        ColorType::Gray(_) => Ok(1),
        ColorType::GrayA(_) => Ok(2),
        ColorType::RGB(_) => Ok(3),
        ColorType::RGBA(_) | ColorType::CMYK(_) => Ok(4),
        other => Err(GeorasterError::ColorType(format!("{other:?}"))),
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_f32(result: DecodingResult) -> Vec<f32> {
    match result {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|s| s as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|s| s as f32).collect(),
    }
}
