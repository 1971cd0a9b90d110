use crate::{
    gradient::{self, ENHANCED_BANDS},
    options::Enhance,
    progress,
};
use anyhow::{ensure, Result};
use georaster::{
    write_strips, Bands, BigTiff, Blocks, GeorasterError, RasterReader, RasterSpec, Window,
};
use indicatif::ProgressBar;
use log::{debug, info};
use std::{ffi::OsStr, fs};

impl Enhance {
    pub fn run(&self) -> Result<()> {
        ensure!(self.block_size > 0, "block size must be positive");

        if self.out.exists() && !self.overwrite {
            info!("{:?} already exists, skipping", self.out);
            return Ok(());
        }

        let out_tmp_path = {
            let mut p = self.out.clone();
            p.set_extension("tmp");
            p
        };
        if let Some(parent) = self.out.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut rdr = RasterReader::open(&self.input)?;
        let meta = rdr.meta().clone();
        if meta.bands > 1 {
            debug!("{:?} has {} bands, using the first", self.input, meta.bands);
        }
        info!(
            "enhancing {:?}: {}x{} px, {}, blocks of {}",
            self.input,
            meta.width,
            meta.height,
            meta.crs(),
            self.block_size
        );

        let in_file_name = self
            .input
            .file_name()
            .and_then(OsStr::to_str)
            .expect("already opened, therefore path must be a file");
        let blocks = Blocks::new(meta.width, meta.height, self.block_size);
        let pb = progress::bar(format!("Enhance {in_file_name}"), blocks.rows() as u64);
        let spec = RasterSpec {
            width: meta.width,
            height: meta.height,
            bands: Bands::Three,
            tags: &meta.tags,
            rows_per_strip: self.block_size,
            bigtiff: BigTiff::IfNeeded,
        };
        write_strips(&out_tmp_path, &spec, |band| {
            self.enhance_band(&mut rdr, band, &pb)
        })?;
        pb.finish_and_clear();

        fs::rename(out_tmp_path, &self.out)?;
        info!("enhanced raster saved to {:?}", self.out);
        Ok(())
    }

    /// Enhances every block of one full-width band of block rows and
    /// returns the pixel-interleaved result.
    fn enhance_band(
        &self,
        rdr: &mut RasterReader,
        band: Window,
        progress_bar: &ProgressBar,
    ) -> Result<Vec<f32>, GeorasterError> {
        let mut samples = vec![0.0_f32; band.len() * ENHANCED_BANDS];
        for block in Blocks::new(band.width, band.height, self.block_size) {
            let block = Window {
                row_off: band.row_off + block.row_off,
                ..block
            };
            let heights = rdr.read_window(0, block)?;
            let stack = gradient::enhance(heights.view());
            for ((channel, row, col), value) in stack.indexed_iter() {
                let pixel = (block.row_off - band.row_off + row) * band.width + block.col_off + col;
                samples[pixel * ENHANCED_BANDS + channel] = *value;
            }
        }
        progress_bar.inc(1);
        Ok(samples)
    }
}
