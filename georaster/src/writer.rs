//! Strip-wise GeoTIFF encoding.

use crate::{GeoTags, GeorasterError, Window};
use log::debug;
use std::{
    fs::File,
    io::{BufWriter, Seek, Write},
    path::Path,
};
use tiff::encoder::{
    colortype::{ColorType, Gray32Float, RGB32Float},
    TiffEncoder, TiffKind,
};

/// Largest pixel payload, in bytes, written as classic TIFF. Leaves
/// headroom below the 32-bit offset limit for the IFD and tags.
const CLASSIC_TIFF_MAX_BYTES: u64 = 4_000_000_000;

/// Band layouts the writer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bands {
    /// One f32 sample per pixel.
    One,
    /// Three interleaved f32 samples per pixel.
    Three,
}

impl Bands {
    pub fn count(self) -> usize {
        match self {
            Self::One => 1,
            Self::Three => 3,
        }
    }
}

/// Container selection, after GDAL's `BIGTIFF` creation option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BigTiff {
    /// BigTIFF only when the pixel payload would overflow classic
    /// TIFF offsets.
    #[default]
    IfNeeded,
    /// Always BigTIFF.
    Yes,
}

/// Describes the raster to be written.
#[derive(Debug, Clone)]
pub struct RasterSpec<'a> {
    pub width: usize,
    pub height: usize,
    pub bands: Bands,
    pub tags: &'a GeoTags,
    /// Rows handed to `produce` per call, and rows per TIFF strip.
    pub rows_per_strip: usize,
    pub bigtiff: BigTiff,
}

impl RasterSpec<'_> {
    /// Size of the f32 pixel payload in bytes.
    pub fn payload_bytes(&self) -> u64 {
        [
            self.width,
            self.height,
            self.bands.count(),
            std::mem::size_of::<f32>(),
        ]
        .into_iter()
        .map(|n| n as u64)
        .product()
    }

    /// Returns `true` if this raster is written as BigTIFF.
    pub fn is_bigtiff(&self) -> bool {
        match self.bigtiff {
            BigTiff::Yes => true,
            BigTiff::IfNeeded => self.payload_bytes() > CLASSIC_TIFF_MAX_BYTES,
        }
    }
}

/// Writes a float32 GeoTIFF at `path` strip by strip.
///
/// `produce` is called top to bottom with full-width windows of
/// `rows_per_strip` rows (the last one possibly shorter) and must
/// return pixel-interleaved samples for that window.
pub fn write_strips<P, F>(path: P, spec: &RasterSpec<'_>, produce: F) -> Result<(), GeorasterError>
where
    P: AsRef<Path>,
    F: FnMut(Window) -> Result<Vec<f32>, GeorasterError>,
{
    let path = path.as_ref();
    debug!(
        "writing {path:?}: {}x{}x{}{}",
        spec.width,
        spec.height,
        spec.bands.count(),
        if spec.is_bigtiff() { " (BigTIFF)" } else { "" }
    );
    let wtr = BufWriter::new(File::create(path)?);
    if spec.is_bigtiff() {
        encode_bands(&mut TiffEncoder::new_big(wtr)?, spec, produce)
    } else {
        encode_bands(&mut TiffEncoder::new(wtr)?, spec, produce)
    }
}

fn encode_bands<W, K, F>(
    encoder: &mut TiffEncoder<W, K>,
    spec: &RasterSpec<'_>,
    produce: F,
) -> Result<(), GeorasterError>
where
    W: Write + Seek,
    K: TiffKind,
    F: FnMut(Window) -> Result<Vec<f32>, GeorasterError>,
{
    match spec.bands {
        Bands::One => encode::<Gray32Float, _, _, _>(encoder, spec, produce),
        Bands::Three => encode::<RGB32Float, _, _, _>(encoder, spec, produce),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn encode<C, W, K, F>(
    encoder: &mut TiffEncoder<W, K>,
    spec: &RasterSpec<'_>,
    mut produce: F,
) -> Result<(), GeorasterError>
where
    C: ColorType<Inner = f32>,
    W: Write + Seek,
    K: TiffKind,
    F: FnMut(Window) -> Result<Vec<f32>, GeorasterError>,
{
    let rows_per_strip = spec.rows_per_strip.max(1);
    let mut image = encoder.new_image::<C>(spec.width as u32, spec.height as u32)?;
    spec.tags.write(image.encoder())?;
    image.rows_per_strip(rows_per_strip as u32)?;
    for row_off in (0..spec.height).step_by(rows_per_strip) {
        let window = Window::new(0, row_off, spec.width, rows_per_strip.min(spec.height - row_off));
        let samples = produce(window)?;
        let expected = window.len() * spec.bands.count();
        if samples.len() != expected {
            return Err(GeorasterError::SampleCount {
                expected,
                actual: samples.len(),
            });
        }
        image.write_strip(&samples)?;
    }
    image.finish()?;
    Ok(())
}
