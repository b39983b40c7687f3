/// Lock-free tile binning.
///
/// The screen is tiled into a fixed grid; shading tasks assign each
/// surviving triangle to every tile its clamped bounding box covers by
/// reserving a slot with `fetch_add` on the tile's counter. This is the
/// pipeline's only cross-thread write during the shading phase. The
/// rasterization phase reads the bins strictly after the draw call's
/// barrier, which is the synchronization the Relaxed orderings rely on.
use std::sync::atomic::{AtomicU32, Ordering};

/// Tile edge length in pixels.
pub const TILE_SIZE: usize = 64;
/// Per-tile triangle capacity. Overflow is a fatal contract violation.
pub const MAX_TRIS_PER_TILE: usize = 1024;

/// Screen-space tile grid with bounded per-tile triangle index lists.
pub struct TileBins {
    width: usize,
    height: usize,
    tiles_x: usize,
    tiles_y: usize,
    counts: Vec<AtomicU32>,
    slots: Vec<AtomicU32>,
}

impl TileBins {
    pub fn new(width: usize, height: usize) -> Self {
        assert!(width > 0 && height > 0, "tile grid needs a non-empty screen");
        let tiles_x = (width + TILE_SIZE - 1) / TILE_SIZE;
        let tiles_y = (height + TILE_SIZE - 1) / TILE_SIZE;
        let tile_count = tiles_x * tiles_y;

        Self {
            width,
            height,
            tiles_x,
            tiles_y,
            counts: (0..tile_count).map(|_| AtomicU32::new(0)).collect(),
            slots: (0..tile_count * MAX_TRIS_PER_TILE)
                .map(|_| AtomicU32::new(0))
                .collect(),
        }
    }

    pub fn tiles_x(&self) -> usize {
        self.tiles_x
    }

    pub fn tiles_y(&self) -> usize {
        self.tiles_y
    }

    pub fn tile_count(&self) -> usize {
        self.tiles_x * self.tiles_y
    }

    /// True if the grid was built for a different screen size.
    pub fn needs_rebuild(&self, width: usize, height: usize) -> bool {
        self.width != width || self.height != height
    }

    /// Reset all counters for a new draw call. Runs on the render thread
    /// between draws, never concurrently with binning.
    pub fn clear(&mut self) {
        for count in &mut self.counts {
            *count.get_mut() = 0;
        }
    }

    /// Bin one triangle into every tile covered by its pixel bounding box
    /// (inclusive, already clamped to the screen). `tri_index` is the
    /// triangle's global index in the draw call's triangle array.
    pub fn bin_triangle(&self, tri_index: u32, x0: usize, y0: usize, x1: usize, y1: usize) {
        debug_assert!(x1 < self.width && y1 < self.height);

        let tx0 = x0 / TILE_SIZE;
        let ty0 = y0 / TILE_SIZE;
        let tx1 = x1 / TILE_SIZE;
        let ty1 = y1 / TILE_SIZE;

        for ty in ty0..=ty1 {
            for tx in tx0..=tx1 {
                let tile = ty * self.tiles_x + tx;
                let slot = self.counts[tile].fetch_add(1, Ordering::Relaxed) as usize;
                assert!(
                    slot < MAX_TRIS_PER_TILE,
                    "tile ({tx}, {ty}) overflowed its capacity of {MAX_TRIS_PER_TILE} triangles"
                );
                self.slots[tile * MAX_TRIS_PER_TILE + slot].store(tri_index, Ordering::Relaxed);
            }
        }
    }

    /// Copy a tile's triangle list into `out` and sort it by triangle index,
    /// restoring submission order. Returns the entry count. Callers must be
    /// past the shading barrier.
    pub fn read_bin(&self, tile: usize, out: &mut [u32; MAX_TRIS_PER_TILE]) -> usize {
        let count = self.counts[tile].load(Ordering::Relaxed) as usize;
        debug_assert!(count <= MAX_TRIS_PER_TILE);

        let base = tile * MAX_TRIS_PER_TILE;
        for (i, slot) in out[..count].iter_mut().enumerate() {
            *slot = self.slots[base + i].load(Ordering::Relaxed);
        }
        out[..count].sort_unstable();
        count
    }

    /// Pixel rectangle of a tile, clamped to the screen. Returned as
    /// inclusive bounds (x0, y0, x1, y1).
    pub fn tile_rect(&self, tile: usize) -> (usize, usize, usize, usize) {
        let tx = tile % self.tiles_x;
        let ty = tile / self.tiles_x;
        let x0 = tx * TILE_SIZE;
        let y0 = ty * TILE_SIZE;
        let x1 = (x0 + TILE_SIZE).min(self.width) - 1;
        let y1 = (y0 + TILE_SIZE).min(self.height) - 1;
        (x0, y0, x1, y1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn grid_dimensions_round_up() {
        let bins = TileBins::new(800, 600);
        assert_eq!(bins.tiles_x(), 13);
        assert_eq!(bins.tiles_y(), 10);
        assert_eq!(bins.tile_count(), 130);
    }

    #[test]
    fn small_triangle_lands_in_one_tile() {
        let bins = TileBins::new(800, 600);
        bins.bin_triangle(7, 10, 10, 40, 40);

        let mut out = [0u32; MAX_TRIS_PER_TILE];
        assert_eq!(bins.read_bin(0, &mut out), 1);
        assert_eq!(out[0], 7);
        assert_eq!(bins.read_bin(1, &mut out), 0);
    }

    #[test]
    fn spanning_bbox_covers_every_overlapped_tile() {
        let bins = TileBins::new(800, 600);
        // 40..=100 crosses the 64px tile boundary on both axes.
        bins.bin_triangle(3, 40, 40, 100, 100);

        let mut out = [0u32; MAX_TRIS_PER_TILE];
        for tile in [0, 1, bins.tiles_x(), bins.tiles_x() + 1] {
            assert_eq!(bins.read_bin(tile, &mut out), 1, "tile {tile}");
            assert_eq!(out[0], 3);
        }
        assert_eq!(bins.read_bin(2, &mut out), 0);
    }

    #[test]
    fn read_bin_sorts_by_triangle_index() {
        let bins = TileBins::new(128, 128);
        for index in [5u32, 1, 9, 3] {
            bins.bin_triangle(index, 0, 0, 10, 10);
        }

        let mut out = [0u32; MAX_TRIS_PER_TILE];
        let count = bins.read_bin(0, &mut out);
        assert_eq!(&out[..count], &[1, 3, 5, 9]);
    }

    #[test]
    fn concurrent_binning_loses_nothing() {
        let bins = Arc::new(TileBins::new(256, 256));
        let threads: Vec<_> = (0..4)
            .map(|t| {
                let bins = Arc::clone(&bins);
                thread::spawn(move || {
                    for i in 0..100u32 {
                        bins.bin_triangle(t * 100 + i, 0, 0, 255, 255);
                    }
                })
            })
            .collect();
        for handle in threads {
            handle.join().unwrap();
        }

        let mut out = [0u32; MAX_TRIS_PER_TILE];
        for tile in 0..bins.tile_count() {
            let count = bins.read_bin(tile, &mut out);
            assert_eq!(count, 400, "tile {tile}");
            // Sorted output means the full index range survived intact.
            assert_eq!(out[0], 0);
            assert_eq!(out[399], 399);
        }
    }

    #[test]
    fn every_binned_triangle_appears_at_least_once() {
        let bins = TileBins::new(256, 192);
        let boxes = [
            (0usize, 0usize, 10usize, 10usize),
            (60, 60, 70, 70),
            (0, 100, 255, 130),
            (200, 0, 220, 40),
        ];
        for (i, &(x0, y0, x1, y1)) in boxes.iter().enumerate() {
            bins.bin_triangle(i as u32, x0, y0, x1, y1);
        }

        let mut out = [0u32; MAX_TRIS_PER_TILE];
        let mut total = 0;
        let mut seen = [false; 4];
        for tile in 0..bins.tile_count() {
            let count = bins.read_bin(tile, &mut out);
            total += count;
            for &index in &out[..count] {
                seen[index as usize] = true;
            }
        }

        assert!(total >= boxes.len(), "entries across tiles: {total}");
        assert!(seen.iter().all(|&s| s), "a triangle was never binned");
    }

    #[test]
    fn clear_resets_counts() {
        let mut bins = TileBins::new(128, 128);
        bins.bin_triangle(0, 0, 0, 5, 5);
        bins.clear();

        let mut out = [0u32; MAX_TRIS_PER_TILE];
        assert_eq!(bins.read_bin(0, &mut out), 0);
    }

    #[test]
    fn edge_tiles_are_clamped_to_screen() {
        let bins = TileBins::new(100, 100);
        assert_eq!(bins.tiles_x(), 2);
        let (x0, y0, x1, y1) = bins.tile_rect(3);
        assert_eq!((x0, y0, x1, y1), (64, 64, 99, 99));
    }
}
