use clap::{Args, Parser};
use std::path::PathBuf;

/// Prepare canopy height rasters and track labels as CNN training
/// tiles.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub enum Cli {
    /// Derive normalized height and gradient magnitude bands from a
    /// single-band height raster.
    Enhance(Enhance),

    /// Cut an enhanced raster into image/label tile pairs.
    Tile(Tile),
}

#[derive(Debug, Clone, Args)]
pub struct Enhance {
    /// Regenerate the output raster even if it already exists.
    #[arg(short = 'O', long)]
    pub overwrite: bool,

    /// Side length, in pixels, of each independently normalized
    /// block.
    #[arg(short, long, default_value_t = 1024)]
    pub block_size: usize,

    /// Output 3-band float32 GeoTIFF.
    #[arg(
        short,
        long,
        default_value = "data/canopy_height_10m_brandenburg_enhanced.tif"
    )]
    pub out: PathBuf,

    /// Input single-band height GeoTIFF.
    #[arg(default_value = "data/canopy_height_10m_brandenburg.tif")]
    pub input: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct Tile {
    /// Remove tiles left in the output directories by a previous run.
    #[arg(short = 'O', long)]
    pub overwrite: bool,

    /// Tile side length in pixels.
    #[arg(short = 's', long, default_value_t = 256)]
    pub tile_size: usize,

    /// Distance, in raster CRS units, by which each tile footprint is
    /// grown before testing it against the tracks.
    #[arg(short, long, default_value_t = 2.5)]
    pub buffer: f64,

    /// Fraction of tile pixels that must be labelled for the tile to
    /// be kept.
    #[arg(short, long, default_value_t = 0.005)]
    pub min_coverage: f64,

    /// Track geometries as GeoJSON. A GeoPackage layer must be
    /// converted first, e.g. `ogr2ogr -f GeoJSON tracks.geojson
    /// osm_tracks_full_aoi.gpkg`.
    #[arg(short, long, default_value = "data/osm_tracks_full_aoi.geojson")]
    pub tracks: PathBuf,

    /// Output directory for image tiles.
    #[arg(long, default_value = "data/tiles_rgb_gch")]
    pub img_dir: PathBuf,

    /// Output directory for label tiles.
    #[arg(long, default_value = "data/tiles_labels_gch")]
    pub lbl_dir: PathBuf,

    /// Enhanced 3-band raster.
    #[arg(default_value = "data/canopy_height_10m_brandenburg_enhanced.tif")]
    pub raster: PathBuf,
}
