//! GeoTIFF georeferencing tags.
//!
//! # References
//!
//! 1. [OGC GeoTIFF 1.1](https://docs.ogc.org/is/19-008r4/19-008r4.html)
//! 1. [GDAL GeoTIFF driver](https://gdal.org/drivers/raster/gtiff.html)

use crate::GeoTransform;
use std::io::{Read, Seek, Write};
use tiff::{
    decoder::{ifd::Value, Decoder},
    encoder::{DirectoryEncoder, TiffKind},
    tags::Tag,
    TiffResult,
};

const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const RASTER_PIXEL_IS_POINT: u16 = 2;
const USER_DEFINED: u16 = 32767;

/// Coordinate reference system as declared by a GeoTIFF key
/// directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// An EPSG registered system.
    Epsg(u16),
    /// A user-defined system described by individual keys.
    UserDefined,
    /// No CRS keys present.
    Unknown,
}

impl Crs {
    pub fn epsg(&self) -> Option<u16> {
        match self {
            Self::Epsg(code) => Some(*code),
            _ => None,
        }
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Epsg(code) => write!(f, "EPSG:{code}"),
            Self::UserDefined => f.write_str("user-defined"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// The raw georeferencing tags of a GeoTIFF.
///
/// Tags are kept verbatim so that they can be copied onto a derived
/// raster unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoTags {
    pub pixel_scale: Option<Vec<f64>>,
    pub tiepoints: Option<Vec<f64>>,
    pub transformation: Option<Vec<f64>>,
    pub key_directory: Option<Vec<u16>>,
    pub double_params: Option<Vec<f64>>,
    pub ascii_params: Option<String>,
    pub nodata: Option<String>,
}

impl GeoTags {
    /// Reads all georeferencing tags present in the current image.
    pub fn read<R: Read + Seek>(decoder: &mut Decoder<R>) -> TiffResult<Self> {
        Ok(Self {
            pixel_scale: find(decoder, Tag::ModelPixelScaleTag, Value::into_f64_vec)?,
            tiepoints: find(decoder, Tag::ModelTiepointTag, Value::into_f64_vec)?,
            transformation: find(decoder, Tag::ModelTransformationTag, Value::into_f64_vec)?,
            key_directory: find(decoder, Tag::GeoKeyDirectoryTag, Value::into_u16_vec)?,
            double_params: find(decoder, Tag::GeoDoubleParamsTag, Value::into_f64_vec)?,
            ascii_params: find(decoder, Tag::GeoAsciiParamsTag, Value::into_string)?,
            nodata: find(decoder, Tag::GdalNodata, Value::into_string)?,
        })
    }

    /// Writes every tag present in `self` to `dir`.
    pub fn write<W: Write + Seek, K: TiffKind>(
        &self,
        dir: &mut DirectoryEncoder<'_, W, K>,
    ) -> TiffResult<()> {
        if let Some(scale) = &self.pixel_scale {
            dir.write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
        }
        if let Some(tiepoints) = &self.tiepoints {
            dir.write_tag(Tag::ModelTiepointTag, &tiepoints[..])?;
        }
        if let Some(transformation) = &self.transformation {
            dir.write_tag(Tag::ModelTransformationTag, &transformation[..])?;
        }
        if let Some(keys) = &self.key_directory {
            dir.write_tag(Tag::GeoKeyDirectoryTag, &keys[..])?;
        }
        if let Some(params) = &self.double_params {
            dir.write_tag(Tag::GeoDoubleParamsTag, &params[..])?;
        }
        if let Some(params) = &self.ascii_params {
            dir.write_tag(Tag::GeoAsciiParamsTag, params.as_str())?;
        }
        if let Some(nodata) = &self.nodata {
            dir.write_tag(Tag::GdalNodata, nodata.as_str())?;
        }
        Ok(())
    }

    /// Tags for a north-up raster in the given EPSG system.
    pub fn north_up(xform: &GeoTransform, epsg: u16, geographic: bool) -> Self {
        let cs_key = if geographic {
            GEOGRAPHIC_TYPE_KEY
        } else {
            PROJECTED_CS_TYPE_KEY
        };
        let model_type = if geographic { 2 } else { 1 };
        Self {
            pixel_scale: Some(vec![xform.pixel_width(), xform.pixel_height(), 0.0]),
            tiepoints: Some(vec![0.0, 0.0, 0.0, xform.c, xform.f, 0.0]),
            key_directory: Some(vec![
                1, 1, 0, 3, //
                1024, 0, 1, model_type, //
                GT_RASTER_TYPE_KEY, 0, 1, 1, //
                cs_key, 0, 1, epsg,
            ]),
            ..Self::default()
        }
    }

    /// Returns the pixel to geo transform, if the tags define one.
    pub fn transform(&self) -> Option<GeoTransform> {
        let mut xform = if let Some(t) = self.transformation.as_deref().filter(|t| t.len() >= 8) {
            GeoTransform {
                a: t[0],
                b: t[1],
                c: t[3],
                d: t[4],
                e: t[5],
                f: t[7],
            }
        } else {
            let scale = self.pixel_scale.as_deref().filter(|s| s.len() >= 2)?;
            let tie = self.tiepoints.as_deref().filter(|t| t.len() >= 6)?;
            let (i, j, x, y) = (tie[0], tie[1], tie[3], tie[4]);
            GeoTransform {
                a: scale[0],
                b: 0.0,
                c: x - i * scale[0],
                d: 0.0,
                e: -scale[1],
                f: y + j * scale[1],
            }
        };
        if self.key(GT_RASTER_TYPE_KEY) == Some(RASTER_PIXEL_IS_POINT) {
            xform.c -= 0.5 * xform.a + 0.5 * xform.b;
            xform.f -= 0.5 * xform.d + 0.5 * xform.e;
        }
        Some(xform)
    }

    /// Returns the declared coordinate reference system.
    pub fn crs(&self) -> Crs {
        match self
            .key(PROJECTED_CS_TYPE_KEY)
            .or_else(|| self.key(GEOGRAPHIC_TYPE_KEY))
        {
            Some(USER_DEFINED) => Crs::UserDefined,
            Some(code) => Crs::Epsg(code),
            None => Crs::Unknown,
        }
    }

    /// Returns the inline SHORT value of geo key `id`.
    fn key(&self, id: u16) -> Option<u16> {
        let dir = self.key_directory.as_deref()?;
        let n_keys = usize::from(*dir.get(3)?);
        dir.get(4..)?
            .chunks_exact(4)
            .take(n_keys)
            .find(|entry| entry[0] == id && entry[1] == 0)
            .map(|entry| entry[3])
    }
}

fn find<R, T, F>(decoder: &mut Decoder<R>, tag: Tag, convert: F) -> TiffResult<Option<T>>
where
    R: Read + Seek,
    F: FnOnce(Value) -> TiffResult<T>,
{
    decoder.find_tag(tag)?.map(convert).transpose()
}

#[cfg(test)]
mod tests {
    use super::{Crs, GeoTags};
    use crate::GeoTransform;
    use approx::assert_relative_eq;
    use geo::geometry::Coord;

    #[test]
    fn test_tiepoint_transform() {
        let tags = GeoTags {
            pixel_scale: Some(vec![0.5, 0.25, 0.0]),
            tiepoints: Some(vec![0.0, 0.0, 0.0, 100.0, 200.0, 0.0]),
            ..GeoTags::default()
        };
        let xform = tags.transform().unwrap();
        assert_eq!(
            xform,
            GeoTransform::north_up(Coord { x: 100.0, y: 200.0 }, 0.5, 0.25)
        );
    }

    #[test]
    fn test_offset_tiepoint_transform() {
        let tags = GeoTags {
            pixel_scale: Some(vec![2.0, 2.0, 0.0]),
            tiepoints: Some(vec![10.0, 5.0, 0.0, 100.0, 200.0, 0.0]),
            ..GeoTags::default()
        };
        let xform = tags.transform().unwrap();
        assert_relative_eq!(xform.c, 80.0);
        assert_relative_eq!(xform.f, 210.0);
    }

    #[test]
    fn test_model_transformation_wins() {
        let tags = GeoTags {
            pixel_scale: Some(vec![1.0, 1.0, 0.0]),
            tiepoints: Some(vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            transformation: Some(vec![
                3.0, 0.0, 0.0, 7.0, //
                0.0, -3.0, 0.0, 9.0, //
                0.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ]),
            ..GeoTags::default()
        };
        let xform = tags.transform().unwrap();
        assert_eq!(xform.apply(1.0, 1.0), Coord { x: 10.0, y: 6.0 });
    }

    #[test]
    fn test_pixel_is_point_shifts_origin() {
        let xform = GeoTransform::north_up(Coord { x: 10.0, y: 50.0 }, 0.1, 0.1);
        let mut tags = GeoTags::north_up(&xform, 4326, true);
        // Flip GTRasterTypeGeoKey to PixelIsPoint.
        tags.key_directory.as_mut().unwrap()[11] = 2;
        let shifted = tags.transform().unwrap();
        assert_relative_eq!(shifted.c, 9.95, epsilon = 1e-12);
        assert_relative_eq!(shifted.f, 50.05, epsilon = 1e-12);
    }

    #[test]
    fn test_crs() {
        let xform = GeoTransform::north_up(Coord { x: 0.0, y: 0.0 }, 1.0, 1.0);
        assert_eq!(GeoTags::north_up(&xform, 4326, true).crs(), Crs::Epsg(4326));
        assert_eq!(GeoTags::north_up(&xform, 25833, false).crs(), Crs::Epsg(25833));
        assert_eq!(GeoTags::default().crs(), Crs::Unknown);
        assert_eq!(GeoTags::north_up(&xform, 32767, false).crs(), Crs::UserDefined);
        assert_eq!(Crs::Epsg(3857).to_string(), "EPSG:3857");
    }

    #[test]
    fn test_missing_tags_have_no_transform() {
        assert_eq!(GeoTags::default().transform(), None);
    }
}
