/// A rectangular pixel region of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

impl Window {
    pub fn new(col_off: usize, row_off: usize, width: usize, height: usize) -> Self {
        Self {
            col_off,
            row_off,
            width,
            height,
        }
    }

    /// Number of pixels covered by this window.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// One past the last column.
    pub fn col_end(&self) -> usize {
        self.col_off + self.width
    }

    /// One past the last row.
    pub fn row_end(&self) -> usize {
        self.row_off + self.height
    }

    /// Returns `true` if `self` lies entirely within a raster of the
    /// given dimensions.
    pub fn fits(&self, width: usize, height: usize) -> bool {
        self.col_end() <= width && self.row_end() <= height
    }
}

/// Row-major iterator over non-overlapping `block_size` square
/// windows covering a `width` x `height` raster.
///
/// Edge blocks are truncated to the remaining extent.
pub struct Blocks {
    width: usize,
    height: usize,
    block_size: usize,
    col: usize,
    row: usize,
}

impl Blocks {
    pub fn new(width: usize, height: usize, block_size: usize) -> Self {
        assert!(block_size > 0, "block size must be positive");
        Self {
            width,
            height,
            block_size,
            col: 0,
            row: 0,
        }
    }

    /// Number of block rows this iterator will visit.
    pub fn rows(&self) -> usize {
        self.height.div_ceil(self.block_size)
    }
}

impl Iterator for Blocks {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.width == 0 || self.row >= self.height {
            return None;
        }
        let window = Window {
            col_off: self.col,
            row_off: self.row,
            width: self.block_size.min(self.width - self.col),
            height: self.block_size.min(self.height - self.row),
        };
        self.col += self.block_size;
        if self.col >= self.width {
            self.col = 0;
            self.row += self.block_size;
        }
        Some(window)
    }
}

#[cfg(test)]
mod tests {
    use super::{Blocks, Window};

    #[test]
    fn test_blocks_truncate_at_edges() {
        let blocks: Vec<Window> = Blocks::new(2500, 1100, 1024).collect();
        assert_eq!(blocks.len(), 6);
        assert_eq!(blocks[0], Window::new(0, 0, 1024, 1024));
        assert_eq!(blocks[2], Window::new(2048, 0, 452, 1024));
        assert_eq!(blocks[3], Window::new(0, 1024, 1024, 76));
        assert_eq!(blocks[5], Window::new(2048, 1024, 452, 76));
        let covered: usize = blocks.iter().map(Window::len).sum();
        assert_eq!(covered, 2500 * 1100);
    }

    #[test]
    fn test_blocks_smaller_than_block_size() {
        let blocks: Vec<Window> = Blocks::new(10, 7, 1024).collect();
        assert_eq!(blocks, vec![Window::new(0, 0, 10, 7)]);
    }

    #[test]
    fn test_empty_raster_has_no_blocks() {
        assert_eq!(Blocks::new(0, 10, 4).count(), 0);
        assert_eq!(Blocks::new(10, 0, 4).count(), 0);
    }

    #[test]
    fn test_window_fits() {
        assert!(Window::new(0, 0, 256, 256).fits(256, 256));
        assert!(!Window::new(256, 0, 256, 256).fits(500, 512));
    }
}
