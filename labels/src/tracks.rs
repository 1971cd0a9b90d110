//! Track geometry layer with a bounding-box R-tree.

use crate::{LabelsError, ToWgs84, VectorCrs};
use geo::{
    geometry::{Geometry, Polygon, Rect},
    BoundingRect, Intersects,
};
use geojson::GeoJson;
use log::{debug, info};
use rstar::{RTree, RTreeObject, AABB};
use serde_json::Value;
use std::{fs::File, io::BufReader, path::Path};

/// Bounding box of one geometry in [`Tracks`].
#[derive(Debug, Clone, Copy)]
struct TrackBounds {
    /// Index into the parent's geometries.
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for TrackBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// An immutable set of EPSG:4326 geometries.
pub struct Tracks {
    geometries: Vec<Geometry>,
    index: RTree<TrackBounds>,
}

impl Tracks {
    /// Builds the spatial index over `geometries`, which must already
    /// be in EPSG:4326.
    pub fn new(geometries: Vec<Geometry>) -> Self {
        let bounds = geometries
            .iter()
            .enumerate()
            .filter_map(|(index, geometry)| {
                geometry.bounding_rect().map(|rect| TrackBounds {
                    index,
                    envelope: envelope(rect),
                })
            })
            .collect();
        Self {
            geometries,
            index: RTree::bulk_load(bounds),
        }
    }

    /// Loads a GeoJSON layer and reprojects it to EPSG:4326.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LabelsError> {
        let path = path.as_ref();
        let geojson = GeoJson::from_reader(BufReader::new(File::open(path)?))?;
        let crs = declared_crs(&geojson).map_err(|e| match e {
            LabelsError::CrsMember(_) => LabelsError::CrsMember(path.to_owned()),
            e => e,
        })?;
        let tracks = Self::from_geojson(geojson, crs)?;
        info!(
            "loaded {} geometries from {path:?} ({crs})",
            tracks.len()
        );
        Ok(tracks)
    }

    /// Converts `geojson` from `crs` into a reprojected, indexed layer.
    ///
    /// Features without a geometry are dropped.
    pub fn from_geojson(geojson: GeoJson, crs: VectorCrs) -> Result<Self, LabelsError> {
        let raw: Vec<geojson::Geometry> = match geojson {
            GeoJson::FeatureCollection(fc) => {
                fc.features.into_iter().filter_map(|f| f.geometry).collect()
            }
            GeoJson::Feature(feature) => feature.geometry.into_iter().collect(),
            GeoJson::Geometry(geometry) => vec![geometry],
        };
        let n_raw = raw.len();
        let to_wgs84 = ToWgs84::new(crs)?;
        let geometries = raw
            .into_iter()
            .map(|geometry| to_wgs84.apply(Geometry::try_from(geometry)?))
            .collect::<Result<Vec<Geometry>, LabelsError>>()?;
        debug!("converted {n_raw} geometries from {crs}");
        Ok(Self::new(geometries))
    }

    /// Number of geometries in the layer.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn get(&self, index: usize) -> &Geometry {
        &self.geometries[index]
    }

    /// Returns the indices, in ascending order, of geometries whose
    /// bounding box intersects `rect`.
    pub fn candidates(&self, rect: Rect) -> Vec<usize> {
        let mut hits: Vec<usize> = self
            .index
            .locate_in_envelope_intersecting(&envelope(rect))
            .map(|bounds| bounds.index)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Returns the geometries among `candidates` that intersect
    /// `footprint`.
    pub fn intersecting<'a>(
        &'a self,
        candidates: &'a [usize],
        footprint: &'a Polygon,
    ) -> impl Iterator<Item = &'a Geometry> + 'a {
        candidates
            .iter()
            .map(|&index| &self.geometries[index])
            .filter(move |geometry| geometry.intersects(footprint))
    }
}

fn envelope(rect: Rect) -> AABB<[f64; 2]> {
    let (min, max) = (rect.min(), rect.max());
    AABB::from_corners([min.x, min.y], [max.x, max.y])
}

/// Reads the legacy GeoJSON `crs` member, defaulting to EPSG:4326.
fn declared_crs(geojson: &GeoJson) -> Result<VectorCrs, LabelsError> {
    let members = match geojson {
        GeoJson::FeatureCollection(fc) => fc.foreign_members.as_ref(),
        GeoJson::Feature(feature) => feature.foreign_members.as_ref(),
        GeoJson::Geometry(geometry) => geometry.foreign_members.as_ref(),
    };
    match members.and_then(|m| m.get("crs")) {
        None | Some(Value::Null) => Ok(VectorCrs::Wgs84),
        Some(crs) => {
            let name = crs
                .pointer("/properties/name")
                .and_then(Value::as_str)
                .ok_or_else(|| LabelsError::CrsMember(Default::default()))?;
            VectorCrs::parse(name)
        }
    }
}
