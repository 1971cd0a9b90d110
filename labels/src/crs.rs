//! Source CRS detection and reprojection to geographic WGS 84.

use crate::LabelsError;
use geo::{geometry::Coord, Geometry, MapCoords};
use proj4rs::{proj::Proj, transform::transform};
use std::fmt;

/// EPSG code of geographic WGS 84.
const WGS84: u16 = 4326;

/// EPSG code of WGS 84 / Pseudo-Mercator.
const WEB_MERCATOR: u16 = 3857;

/// Coordinate reference system a track layer arrives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorCrs {
    /// EPSG:4326 / OGC:CRS84, longitude-latitude degrees.
    Wgs84,
    /// Any other EPSG registered system.
    Epsg(u16),
}

impl VectorCrs {
    /// Parses a CRS name such as `EPSG:25833`,
    /// `urn:ogc:def:crs:EPSG::4326`, or `urn:ogc:def:crs:OGC:1.3:CRS84`.
    ///
    /// Legacy Web Mercator aliases (900913, 102100, 102113, 3785) map
    /// to EPSG:3857.
    pub fn parse(name: &str) -> Result<Self, LabelsError> {
        let unsupported = || LabelsError::UnsupportedCrs(name.to_owned());
        let upper = name.trim().to_ascii_uppercase();
        if upper.ends_with("CRS84") {
            return Ok(Self::Wgs84);
        }
        if !upper.contains("EPSG") {
            return Err(unsupported());
        }
        let code = upper
            .rsplit(':')
            .next()
            .and_then(|code| code.parse::<u32>().ok())
            .ok_or_else(unsupported)?;
        match code {
            4326 => Ok(Self::Wgs84),
            3785 | 900_913 | 102_100 | 102_113 => Ok(Self::Epsg(WEB_MERCATOR)),
            code => u16::try_from(code)
                .map(Self::Epsg)
                .map_err(|_| unsupported()),
        }
    }
}

impl fmt::Display for VectorCrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wgs84 => write!(f, "EPSG:{WGS84}"),
            Self::Epsg(code) => write!(f, "EPSG:{code}"),
        }
    }
}

/// Source and target projections of a non-trivial reprojection.
struct Projections {
    source: Proj,
    target: Proj,
    /// Source coordinates are degrees and go to proj4rs as radians.
    source_is_geographic: bool,
}

/// Reprojects geometries from one [`VectorCrs`] into EPSG:4326.
pub struct ToWgs84 {
    crs: VectorCrs,
    /// `None` when the source already is EPSG:4326.
    projections: Option<Projections>,
}

impl ToWgs84 {
    /// Resolves `crs` through the EPSG registry.
    ///
    /// Codes with no registry entry are [`LabelsError::UnsupportedCrs`].
    pub fn new(crs: VectorCrs) -> Result<Self, LabelsError> {
        let projections = match crs {
            VectorCrs::Wgs84 => None,
            VectorCrs::Epsg(code) => {
                let source_def = proj_definition(crs, code)?;
                let target_def = proj_definition(crs, WGS84)?;
                Some(Projections {
                    source: proj(crs, source_def)?,
                    target: proj(crs, target_def)?,
                    source_is_geographic: is_geographic(source_def),
                })
            }
        };
        Ok(Self { crs, projections })
    }

    /// Returns `geometry` expressed in EPSG:4326.
    pub fn apply(&self, geometry: Geometry) -> Result<Geometry, LabelsError> {
        match &self.projections {
            None => Ok(geometry),
            Some(projections) => geometry.try_map_coords(|coord| self.coord(projections, coord)),
        }
    }

    fn coord(&self, projections: &Projections, Coord { x, y }: Coord) -> Result<Coord, LabelsError> {
        let mut point = if projections.source_is_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        transform(&projections.source, &projections.target, &mut point).map_err(|e| {
            LabelsError::Reproject {
                crs: self.crs.to_string(),
                reason: format!("{e:?}"),
            }
        })?;
        Ok(Coord {
            x: point.0.to_degrees(),
            y: point.1.to_degrees(),
        })
    }
}

fn proj_definition(crs: VectorCrs, code: u16) -> Result<&'static str, LabelsError> {
    crs_definitions::from_code(code)
        .map(|def| def.proj4)
        .ok_or_else(|| LabelsError::UnsupportedCrs(crs.to_string()))
}

fn proj(crs: VectorCrs, definition: &str) -> Result<Proj, LabelsError> {
    Proj::from_proj_string(definition).map_err(|e| LabelsError::Reproject {
        crs: crs.to_string(),
        reason: format!("{e:?}"),
    })
}

fn is_geographic(definition: &str) -> bool {
    definition.contains("+proj=longlat") || definition.contains("+proj=latlong")
}
