use crate::{options::Tile, progress};
use anyhow::{ensure, Result};
use geo::geometry::{Coord, Rect};
use georaster::{RasterMeta, RasterReader};
use labels::{Tracks, BURN};
use log::{debug, info, warn};
use ndarray::{s, Array2, Array3, ArrayView3};
use ndarray_npy::write_npy;
use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};

/// EPSG code of the CRS track geometries are reprojected to.
const LABEL_EPSG: u16 = 4326;

impl Tile {
    pub fn run(&self) -> Result<()> {
        ensure!(self.tile_size > 0, "tile size must be positive");
        ensure!(
            self.img_dir != self.lbl_dir,
            "image and label tiles need separate directories"
        );
        ensure!(
            self.tracks.extension().and_then(OsStr::to_str) != Some("gpkg"),
            "{:?} is a GeoPackage, convert it first: ogr2ogr -f GeoJSON tracks.geojson {:?}",
            self.tracks,
            self.tracks
        );
        self.prepare_dir(&self.img_dir)?;
        self.prepare_dir(&self.lbl_dir)?;

        let tracks = Tracks::load(&self.tracks)?;
        let rdr = RasterReader::open(&self.raster)?;
        let meta = rdr.meta().clone();
        ensure!(
            meta.transform.is_north_up(),
            "{:?} has a rotated geotransform",
            self.raster
        );
        ensure!(
            meta.bands == 3,
            "{:?} has {} bands, expected an enhanced 3-band raster",
            self.raster,
            meta.bands
        );
        if meta.crs().epsg() != Some(LABEL_EPSG) {
            warn!(
                "{:?} is in {}, labels are burned in EPSG:{LABEL_EPSG}",
                rdr.path(),
                meta.crs()
            );
        }
        info!(
            "tiling {:?}: {}x{} px into {}x{} tiles",
            self.raster, meta.width, meta.height, self.tile_size, self.tile_size
        );
        let data = rdr.read_all()?;

        let written = self.generate(&data, &meta, &tracks, |id, image, label| {
            let file_name = format!("tile_{id:05}.npy");
            write_npy(self.img_dir.join(&file_name), &image.to_owned())?;
            write_npy(self.lbl_dir.join(file_name), label)?;
            Ok(())
        })?;
        info!(
            "Done. {written} tiles saved to {:?} and {:?}",
            self.img_dir, self.lbl_dir
        );
        Ok(())
    }

    /// Walks the tile grid of `data` and calls `emit` with the id,
    /// image and label of every tile that passes the coverage filter.
    ///
    /// Returns the number of emitted tiles.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation
    )]
    fn generate<F>(
        &self,
        data: &Array3<f32>,
        meta: &RasterMeta,
        tracks: &Tracks,
        mut emit: F,
    ) -> Result<usize>
    where
        F: FnMut(usize, ArrayView3<'_, f32>, &Array2<u8>) -> Result<()>,
    {
        let ts = self.tile_size;
        let (_, rows, cols) = data.dim();
        let xform = meta.transform;
        let bounds = meta.bounds();
        let buffer_px = (self.buffer / xform.pixel_width()) as i64;
        debug!("buffer of {} CRS units is {buffer_px} px", self.buffer);
        let min_burned = (ts * ts) as f64 * self.min_coverage;

        let pb = progress::bar(format!("Tile {:?}", self.raster), (rows / ts) as u64);
        let mut id = 0;
        for row in (0..rows).step_by(ts) {
            if row + ts > rows {
                continue;
            }
            let row_box = Rect::new(
                Coord {
                    x: bounds.min().x,
                    y: xform.apply(0.0, row as f64).y,
                },
                Coord {
                    x: bounds.max().x,
                    y: xform.apply(0.0, (row + ts) as f64).y,
                },
            );
            let candidates = tracks.candidates(row_box);
            debug!("tile row at {row}: {} candidate tracks", candidates.len());
            if candidates.is_empty() {
                pb.inc(1);
                continue;
            }

            for col in (0..cols).step_by(ts) {
                if col + ts > cols {
                    continue;
                }
                let tile_bounds = xform.window_bounds(col, row, col + ts, row + ts);
                let footprint = labels::buffer(tile_bounds, self.buffer);
                let mut hits = tracks.intersecting(&candidates, &footprint).peekable();
                if hits.peek().is_none() {
                    continue;
                }

                let label = labels::rasterize(hits, tile_bounds, ts, ts);
                let burned = label.iter().filter(|&&v| v == BURN).count();
                if (burned as f64) < min_burned {
                    continue;
                }
                emit(id, data.slice(s![.., row..row + ts, col..col + ts]), &label)?;
                id += 1;
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        Ok(id)
    }

    /// Creates `dir` and clears tiles left by an earlier run, which is
    /// only allowed with `--overwrite`.
    fn prepare_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let mut stale: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if is_tile_file(&path) {
                stale.push(path);
            }
        }
        if stale.is_empty() {
            return Ok(());
        }
        ensure!(
            self.overwrite,
            "{dir:?} already holds {} tiles, pass --overwrite to replace them",
            stale.len()
        );
        info!("removing {} old tiles from {dir:?}", stale.len());
        for path in stale {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

fn is_tile_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |name| {
            name.starts_with("tile_") && name.ends_with(".npy")
        })
}

#[cfg(test)]
mod tests {
    use super::is_tile_file;
    use crate::options::Tile;
    use geo::{
        geometry::{Coord, Geometry, Point},
        line_string,
    };
    use georaster::{
        write_strips, Bands, BigTiff, GeoTags, GeoTransform, RasterMeta, RasterSpec, Window,
    };
    use labels::Tracks;
    use ndarray::{s, Array2, Array3};
    use ndarray_npy::read_npy;
    use std::path::{Path, PathBuf};

    fn tile_cfg(dir: &Path, tile_size: usize, buffer: f64, min_coverage: f64) -> Tile {
        Tile {
            overwrite: false,
            tile_size,
            buffer,
            min_coverage,
            tracks: dir.join("tracks.geojson"),
            img_dir: dir.join("img"),
            lbl_dir: dir.join("lbl"),
            raster: dir.join("enhanced.tif"),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn ramp(rows: usize, cols: usize) -> Array3<f32> {
        Array3::from_shape_fn((3, rows, cols), |(b, r, c)| {
            (b * 1000 + r * cols + c) as f32
        })
    }

    /// Runs the grid over a 10 x 9 raster with 1 unit pixels whose
    /// upper-left corner sits at (0, 100).
    fn generate_grid(tracks: Vec<Geometry>) -> (Array3<f32>, Vec<(usize, Array3<f32>, Array2<u8>)>, usize) {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tile_cfg(dir.path(), 4, 0.5, 0.1);
        let data = ramp(10, 9);
        let transform = GeoTransform::north_up(Coord { x: 0.0, y: 100.0 }, 1.0, 1.0);
        let meta = RasterMeta {
            width: 9,
            height: 10,
            bands: 3,
            transform,
            tags: GeoTags::default(),
        };
        let tracks = Tracks::new(tracks);
        let mut emitted = Vec::new();
        let count = cfg
            .generate(&data, &meta, &tracks, |id, image, label| {
                emitted.push((id, image.to_owned(), label.clone()));
                Ok(())
            })
            .unwrap();
        (data, emitted, count)
    }

    #[test]
    fn test_generate_filters_and_numbers_tiles() {
        let (data, emitted, count) = generate_grid(vec![
            // Pixel row 1 of tile (0, 0).
            Geometry::LineString(line_string![(x: 0.5, y: 98.5), (x: 3.5, y: 98.5)]),
            // Pixel column 2 of tile (0, 4).
            Geometry::LineString(line_string![(x: 6.5, y: 99.5), (x: 6.5, y: 97.0)]),
            // A single pixel of tile (4, 0), too sparse to keep.
            Geometry::Point(Point::new(1.5, 94.5)),
            // Only inside the dropped trailing row and column.
            Geometry::LineString(line_string![(x: 0.5, y: 90.5), (x: 8.5, y: 90.5)]),
            Geometry::LineString(line_string![(x: 8.7, y: 99.5), (x: 8.7, y: 96.5)]),
        ]);
        assert_eq!(count, 2);
        let ids: Vec<usize> = emitted.iter().map(|(id, _, _)| *id).collect();
        assert_eq!(ids, vec![0, 1]);

        let (_, image, label) = &emitted[0];
        assert_eq!(image.dim(), (3, 4, 4));
        assert_eq!(image, &data.slice(s![.., 0..4, 0..4]));
        assert_eq!(label.dim(), (4, 4));
        assert_eq!(label.row(1).to_vec(), vec![1, 1, 1, 1]);
        assert_eq!(label.sum(), 4);

        let (_, image, label) = &emitted[1];
        assert_eq!(image, &data.slice(s![.., 0..4, 4..8]));
        assert_eq!(label.column(2).to_vec(), vec![1, 1, 1, 1]);
        assert_eq!(label.sum(), 4);
    }

    #[test]
    fn test_skipped_tiles_do_not_consume_ids() {
        // Only tile (0, 4) is labelled; (0, 0) before it is skipped.
        let (data, emitted, count) = generate_grid(vec![Geometry::LineString(
            line_string![(x: 6.5, y: 99.5), (x: 6.5, y: 97.0)],
        )]);
        assert_eq!(count, 1);
        assert_eq!(emitted.len(), 1);
        let (id, image, label) = &emitted[0];
        assert_eq!(*id, 0);
        assert_eq!(image, &data.slice(s![.., 0..4, 4..8]));
        assert_eq!(label.column(2).to_vec(), vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_generate_without_tracks_emits_nothing() {
        let (_, emitted, count) = generate_grid(vec![]);
        assert_eq!(count, 0);
        assert!(emitted.is_empty());
    }

    #[test]
    fn test_buffer_reaches_neighbouring_tracks() {
        // Just left of tile (0, 4): only its buffered footprint
        // touches the track, which burns nothing there.
        let (_, emitted, count) = generate_grid(vec![Geometry::LineString(
            line_string![(x: 3.8, y: 99.5), (x: 3.8, y: 96.5)],
        )]);
        assert_eq!(count, 1);
        assert_eq!(emitted[0].2.column(3).to_vec(), vec![1, 1, 1, 1]);
    }

    /// Writes a georeferenced 3-band 8 x 8 raster of 0.001 degree
    /// pixels anchored at (13.0, 52.0).
    fn write_enhanced(path: &Path, data: &Array3<f32>) {
        let (_, height, width) = data.dim();
        let xform = GeoTransform::north_up(Coord { x: 13.0, y: 52.0 }, 0.001, 0.001);
        let tags = GeoTags::north_up(&xform, 4326, true);
        let spec = RasterSpec {
            width,
            height,
            bands: Bands::Three,
            tags: &tags,
            rows_per_strip: 3,
            bigtiff: BigTiff::IfNeeded,
        };
        write_strips(path, &spec, |w: Window| {
            let block = data.slice(s![.., w.row_off..w.row_end(), ..]);
            Ok(block.permuted_axes([1, 2, 0]).iter().copied().collect())
        })
        .unwrap();
    }

    const TRACK: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"highway": "track"},
             "geometry": {"type": "LineString",
                          "coordinates": [[13.0005, 51.9985], [13.0075, 51.9985]]}}
        ]
    }"#;

    fn tiles_in(dir: &Path) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        paths.sort();
        paths
    }

    #[test]
    fn test_run_writes_npy_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tile_cfg(dir.path(), 4, 0.0005, 0.005);
        let data = ramp(8, 8);
        write_enhanced(&cfg.raster, &data);
        std::fs::write(&cfg.tracks, TRACK).unwrap();

        cfg.run().unwrap();

        let images = tiles_in(&cfg.img_dir);
        let names: Vec<&str> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["tile_00000.npy", "tile_00001.npy"]);
        assert_eq!(tiles_in(&cfg.lbl_dir).len(), 2);

        let image: Array3<f32> = read_npy(cfg.img_dir.join("tile_00001.npy")).unwrap();
        assert_eq!(image, data.slice(s![.., 0..4, 4..8]));
        let label: Array2<u8> = read_npy(cfg.lbl_dir.join("tile_00001.npy")).unwrap();
        assert_eq!(label.dim(), (4, 4));
        assert_eq!(label.row(1).to_vec(), vec![1, 1, 1, 1]);
        assert_eq!(label.sum(), 4);
    }

    #[test]
    fn test_run_numbers_first_labelled_tile_zero() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tile_cfg(dir.path(), 4, 0.0005, 0.005);
        let data = ramp(8, 8);
        write_enhanced(&cfg.raster, &data);
        // Right half of the top tile row only, clear of the buffered
        // footprint of tile (0, 0).
        std::fs::write(&cfg.tracks, TRACK.replace("13.0005", "13.0055")).unwrap();

        cfg.run().unwrap();

        for out in [&cfg.img_dir, &cfg.lbl_dir] {
            assert_eq!(tiles_in(out), vec![out.join("tile_00000.npy")]);
        }
        let image: Array3<f32> = read_npy(cfg.img_dir.join("tile_00000.npy")).unwrap();
        assert_eq!(image, data.slice(s![.., 0..4, 4..8]));
        let label: Array2<u8> = read_npy(cfg.lbl_dir.join("tile_00000.npy")).unwrap();
        assert_eq!(label.row(1).to_vec(), vec![0, 1, 1, 1]);
    }

    #[test]
    fn test_rerun_requires_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = tile_cfg(dir.path(), 4, 0.0005, 0.005);
        write_enhanced(&cfg.raster, &ramp(8, 8));
        std::fs::write(&cfg.tracks, TRACK).unwrap();
        cfg.run().unwrap();
        std::fs::write(cfg.img_dir.join("tile_00007.npy"), b"stale").unwrap();

        assert!(cfg.run().is_err());

        cfg.overwrite = true;
        cfg.run().unwrap();
        assert_eq!(tiles_in(&cfg.img_dir).len(), 2);
        assert!(!cfg.img_dir.join("tile_00007.npy").exists());
    }

    #[test]
    fn test_shared_output_dir_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Tile {
            lbl_dir: dir.path().join("img"),
            ..tile_cfg(dir.path(), 4, 0.0, 0.005)
        };
        assert!(cfg.run().is_err());
    }

    #[test]
    fn test_geopackage_tracks_are_rejected_with_a_hint() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Tile {
            tracks: dir.path().join("osm_tracks_full_aoi.gpkg"),
            ..tile_cfg(dir.path(), 4, 0.0, 0.005)
        };
        let err = cfg.run().unwrap_err();
        assert!(err.to_string().contains("ogr2ogr"));
        assert!(!cfg.img_dir.exists());
    }

    #[test]
    fn test_tile_file_names() {
        assert!(is_tile_file(Path::new("out/tile_00012.npy")));
        assert!(!is_tile_file(Path::new("out/tile_00012.npz")));
        assert!(!is_tile_file(Path::new("out/readme.npy")));
    }
}
