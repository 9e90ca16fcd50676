// SPDX-License-Identifier: GPL-3.0-only

//! Contrast Limited Adaptive Histogram Equalization
//!
//! The image is divided into a grid of tiles. Each tile gets its own
//! equalization lookup table built from a clipped histogram, and every
//! output pixel is bilinearly interpolated between the tables of the four
//! nearest tile centers. Output matches OpenCV's 8-bit CLAHE for images
//! whose dimensions are divisible by the grid.
//!
//! The per-tile tables and the histogram scratch buffer are kept between
//! calls so repeated application does not reallocate.

use super::GrayPlane;
use tracing::debug;

const BINS: usize = 256;

/// CLAHE context
#[derive(Debug, Clone)]
pub struct Clahe {
    clip_limit: f32,
    grid: (u32, u32),
    luts: Vec<[u8; BINS]>,
    histogram: [u32; BINS],
    /// Dimensions the tables were last built for
    built_for: Option<(u32, u32)>,
}

impl Clahe {
    /// Create a context with a clip limit and a (columns, rows) tile grid
    ///
    /// The grid is clamped to at least one tile in each direction.
    pub fn new(clip_limit: f32, grid: (u32, u32)) -> Self {
        Self {
            clip_limit,
            grid: (grid.0.max(1), grid.1.max(1)),
            luts: Vec::new(),
            histogram: [0; BINS],
            built_for: None,
        }
    }

    /// Drop the cached tables
    pub fn reset(&mut self) {
        self.luts.clear();
        self.luts.shrink_to_fit();
        self.built_for = None;
    }

    /// Dimensions of the last processed plane
    pub fn last_size(&self) -> Option<(u32, u32)> {
        self.built_for
    }

    /// Equalize a plane in place
    ///
    /// Each output pixel only depends on its own input value and the tile
    /// tables, so the tables are built first and the plane is then rewritten.
    pub fn apply(&mut self, plane: &mut GrayPlane) {
        if plane.width == 0 || plane.height == 0 {
            return;
        }

        let tiles_x = self.grid.0.min(plane.width) as usize;
        let tiles_y = self.grid.1.min(plane.height) as usize;
        let tile_w = plane.width as f32 / tiles_x as f32;
        let tile_h = plane.height as f32 / tiles_y as f32;

        if self.built_for != Some((plane.width, plane.height)) {
            debug!(
                width = plane.width,
                height = plane.height,
                tiles_x,
                tiles_y,
                "Sizing CLAHE tables"
            );
            self.built_for = Some((plane.width, plane.height));
        }
        self.luts.resize(tiles_x * tiles_y, [0; BINS]);

        for ty in 0..tiles_y {
            let y0 = tile_bound(ty, tile_h);
            let y1 = tile_bound(ty + 1, tile_h).min(plane.height as usize);
            for tx in 0..tiles_x {
                let x0 = tile_bound(tx, tile_w);
                let x1 = tile_bound(tx + 1, tile_w).min(plane.width as usize);
                self.build_lut(plane, (x0, x1), (y0, y1), ty * tiles_x + tx);
            }
        }

        self.interpolate(plane, tiles_x, tiles_y, tile_w, tile_h);
    }

    fn build_lut(&mut self, plane: &GrayPlane, xs: (usize, usize), ys: (usize, usize), index: usize) {
        let width = plane.width as usize;
        let area = ((xs.1 - xs.0) * (ys.1 - ys.0)).max(1);

        self.histogram.fill(0);
        for y in ys.0..ys.1 {
            for &v in &plane.data[y * width + xs.0..y * width + xs.1] {
                self.histogram[v as usize] += 1;
            }
        }

        let limit = ((self.clip_limit * area as f32 / BINS as f32) as u32).max(1);
        let mut clipped = 0u32;
        for count in self.histogram.iter_mut() {
            if *count > limit {
                clipped += *count - limit;
                *count = limit;
            }
        }

        // Spread the excess evenly, then the remainder at a fixed step
        let batch = clipped / BINS as u32;
        let mut residual = clipped - batch * BINS as u32;
        for count in self.histogram.iter_mut() {
            *count += batch;
        }
        if residual > 0 {
            let step = (BINS / residual as usize).max(1);
            let mut i = 0;
            while i < BINS && residual > 0 {
                self.histogram[i] += 1;
                residual -= 1;
                i += step;
            }
        }

        let scale = (BINS - 1) as f32 / area as f32;
        let lut = &mut self.luts[index];
        let mut sum = 0u32;
        for (bin, count) in self.histogram.iter().enumerate() {
            sum += count;
            lut[bin] = (sum as f32 * scale).round().clamp(0.0, 255.0) as u8;
        }
    }

    fn interpolate(&self, plane: &mut GrayPlane, tiles_x: usize, tiles_y: usize, tile_w: f32, tile_h: f32) {
        let width = plane.width as usize;

        // Horizontal neighbours and weights are the same for every row
        let columns: Vec<(usize, usize, f32)> = (0..width)
            .map(|x| {
                let (a, b, w) = neighbours(x, tile_w, tiles_x);
                (a, b, w)
            })
            .collect();

        for y in 0..plane.height as usize {
            let (ty1, ty2, ya) = neighbours(y, tile_h, tiles_y);
            let row = &mut plane.data[y * width..(y + 1) * width];
            for (x, v) in row.iter_mut().enumerate() {
                let (tx1, tx2, xa) = columns[x];
                let bin = *v as usize;
                let top = self.luts[ty1 * tiles_x + tx1][bin] as f32 * (1.0 - xa)
                    + self.luts[ty1 * tiles_x + tx2][bin] as f32 * xa;
                let bottom = self.luts[ty2 * tiles_x + tx1][bin] as f32 * (1.0 - xa)
                    + self.luts[ty2 * tiles_x + tx2][bin] as f32 * xa;
                *v = (top * (1.0 - ya) + bottom * ya).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

#[inline]
fn tile_bound(index: usize, tile_size: f32) -> usize {
    (index as f32 * tile_size).round() as usize
}

/// Indices of the two tiles whose centers surround `pos`, and the weight of the second
#[inline]
fn neighbours(pos: usize, tile_size: f32, tiles: usize) -> (usize, usize, f32) {
    let f = pos as f32 / tile_size - 0.5;
    let first = f.floor();
    let weight = f - first;
    let first = first as isize;
    let lo = first.max(0) as usize;
    let hi = ((first + 1).max(0) as usize).min(tiles - 1);
    (lo.min(tiles - 1), hi, weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: u32, height: u32, lo: u8, hi: u8) -> GrayPlane {
        let span = (hi - lo) as u32;
        let data = (0..height)
            .flat_map(|_| (0..width).map(move |x| lo + (x * span / (width - 1)) as u8))
            .collect();
        GrayPlane {
            width,
            height,
            data,
        }
    }

    fn spread(plane: &GrayPlane) -> u8 {
        let min = plane.data.iter().min().copied().unwrap_or(0);
        let max = plane.data.iter().max().copied().unwrap_or(0);
        max - min
    }

    #[test]
    fn stretches_low_contrast_ramp() {
        let mut plane = ramp(64, 64, 100, 130);
        let before = spread(&plane);
        Clahe::new(2.0, (8, 8)).apply(&mut plane);
        assert!(spread(&plane) > before);
    }

    #[test]
    fn uniform_plane_stays_uniform() {
        let mut plane = GrayPlane::new(32, 32, 77);
        Clahe::new(2.0, (4, 4)).apply(&mut plane);
        let first = plane.data[0];
        assert!(plane.data.iter().all(|&v| v == first));
    }

    #[test]
    fn grid_larger_than_image_is_clamped() {
        let mut plane = ramp(3, 2, 0, 200);
        Clahe::new(2.0, (8, 8)).apply(&mut plane);
        assert_eq!(plane.data.len(), 6);
    }

    #[test]
    fn tables_are_reused_for_same_size() {
        let mut clahe = Clahe::new(2.0, (8, 8));
        let mut a = ramp(64, 48, 10, 200);
        clahe.apply(&mut a);
        assert_eq!(clahe.last_size(), Some((64, 48)));
        let mut b = ramp(64, 48, 10, 200);
        clahe.apply(&mut b);
        assert_eq!(a, b);
        clahe.reset();
        assert_eq!(clahe.last_size(), None);
    }

    #[test]
    fn neighbours_clamp_at_edges() {
        assert_eq!(neighbours(0, 10.0, 4).0, 0);
        assert_eq!(neighbours(0, 10.0, 4).1, 0);
        let (lo, hi, _) = neighbours(39, 10.0, 4);
        assert_eq!((lo, hi), (3, 3));
        let (lo, hi, w) = neighbours(10, 10.0, 4);
        assert_eq!((lo, hi), (0, 1));
        assert!((w - 0.5).abs() < 1e-6);
    }
}
