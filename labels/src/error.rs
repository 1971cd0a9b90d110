use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelsError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    GeoJson(#[from] geojson::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported vector CRS {0}")]
    UnsupportedCrs(String),

    #[error("cannot reproject from {crs}: {reason}")]
    Reproject { crs: String, reason: String },

    #[error("malformed crs member in {0}")]
    CrsMember(PathBuf),
}
