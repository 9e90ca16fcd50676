// SPDX-License-Identifier: GPL-3.0-only

//! Binary morphology and connected regions on masks

use super::GrayPlane;

/// Structuring element with its anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    width: u32,
    height: u32,
    anchor: (u32, u32),
    /// Row-major membership
    cells: Vec<bool>,
}

impl StructuringElement {
    /// Ellipse inscribed in a `width` × `height` box, anchored at its center
    ///
    /// Uses the same rasterization as OpenCV's `MORPH_ELLIPSE`, so a 2×2
    /// element is `[[0, 1], [1, 1]]` anchored at (1, 1).
    pub fn ellipse(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let r = (height / 2) as i64;
        let c = (width / 2) as i64;
        let inv_r2 = if r > 0 { 1.0 / (r * r) as f64 } else { 0.0 };

        let mut cells = vec![false; width as usize * height as usize];
        for i in 0..height as i64 {
            let dy = i - r;
            if dy.abs() > r {
                continue;
            }
            let dx = (c as f64 * (((r * r - dy * dy) as f64) * inv_r2).sqrt()).round() as i64;
            let j1 = (c - dx).max(0);
            let j2 = (c + dx + 1).min(width as i64);
            for j in j1..j2 {
                cells[(i * width as i64 + j) as usize] = true;
            }
        }

        Self {
            width,
            height,
            anchor: (width / 2, height / 2),
            cells,
        }
    }

    pub fn anchor(&self) -> (u32, u32) {
        self.anchor
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width
            && y < self.height
            && self.cells[y as usize * self.width as usize + x as usize]
    }

    /// Offsets of member cells relative to the anchor
    fn offsets(&self) -> Vec<(i64, i64)> {
        let mut out = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                if self.contains(x, y) {
                    out.push((
                        x as i64 - self.anchor.0 as i64,
                        y as i64 - self.anchor.1 as i64,
                    ));
                }
            }
        }
        out
    }
}

/// Minimum over the element; samples outside the plane are ignored
pub fn erode(plane: &GrayPlane, element: &StructuringElement) -> GrayPlane {
    extremum(plane, element, u8::MAX, u8::min)
}

/// Maximum over the element; samples outside the plane are ignored
pub fn dilate(plane: &GrayPlane, element: &StructuringElement) -> GrayPlane {
    extremum(plane, element, u8::MIN, u8::max)
}

/// Erosion followed by dilation, repeated `iterations` times per stage
pub fn open(plane: &GrayPlane, element: &StructuringElement, iterations: u32) -> GrayPlane {
    let mut out = plane.clone();
    for _ in 0..iterations {
        out = erode(&out, element);
    }
    for _ in 0..iterations {
        out = dilate(&out, element);
    }
    out
}

fn extremum(
    plane: &GrayPlane,
    element: &StructuringElement,
    identity: u8,
    pick: fn(u8, u8) -> u8,
) -> GrayPlane {
    let offsets = element.offsets();
    let width = plane.width as i64;
    let height = plane.height as i64;
    let mut out = GrayPlane::new(plane.width, plane.height, identity);

    for y in 0..height {
        for x in 0..width {
            let mut acc = identity;
            for &(dx, dy) in &offsets {
                let sx = x + dx;
                let sy = y + dy;
                if sx < 0 || sy < 0 || sx >= width || sy >= height {
                    continue;
                }
                acc = pick(acc, plane.data[(sy * width + sx) as usize]);
            }
            out.data[(y * width + x) as usize] = acc;
        }
    }
    out
}

/// Count 8-connected regions of non-zero pixels
pub fn count_regions(mask: &GrayPlane) -> usize {
    let width = mask.width as usize;
    let height = mask.height as usize;
    let mut seen = vec![false; width * height];
    let mut stack = Vec::new();
    let mut regions = 0;

    for start in 0..width * height {
        if seen[start] || mask.data[start] == 0 {
            continue;
        }
        regions += 1;
        seen[start] = true;
        stack.push(start);

        while let Some(idx) = stack.pop() {
            let x = (idx % width) as i64;
            let y = (idx / width) as i64;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let nx = x + dx;
                    let ny = y + dy;
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        continue;
                    }
                    let n = ny as usize * width + nx as usize;
                    if !seen[n] && mask.data[n] != 0 {
                        seen[n] = true;
                        stack.push(n);
                    }
                }
            }
        }
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(width: u32, height: u32) -> StructuringElement {
        StructuringElement {
            width,
            height,
            anchor: (width / 2, height / 2),
            cells: vec![true; width as usize * height as usize],
        }
    }

    fn plane(width: u32, rows: &[&[u8]]) -> GrayPlane {
        GrayPlane {
            width,
            height: rows.len() as u32,
            data: rows.iter().flat_map(|r| r.iter().copied()).collect(),
        }
    }

    #[test]
    fn small_ellipse_geometry() {
        let e = StructuringElement::ellipse(2, 2);
        assert_eq!(e.anchor(), (1, 1));
        assert!(!e.contains(0, 0));
        assert!(e.contains(1, 0));
        assert!(e.contains(0, 1));
        assert!(e.contains(1, 1));
    }

    #[test]
    fn ellipse_5x5_is_a_disc() {
        let e = StructuringElement::ellipse(5, 5);
        assert!(!e.contains(0, 0));
        assert!(e.contains(2, 0));
        assert!(e.contains(0, 2));
        assert!(e.contains(2, 2));
        assert!(!e.contains(4, 4));
    }

    #[test]
    fn wide_element_membership() {
        let element = StructuringElement::ellipse(70_000, 2);
        assert!(element.contains(69_999, 1));
        assert!(element.contains(35_000, 0));
        assert!(!element.contains(0, 0));
        assert!(!element.contains(70_000, 1));
        assert_eq!(element.anchor(), (35_000, 1));
    }

    #[test]
    fn opening_removes_isolated_pixel() {
        let mask = plane(5, &[
            &[0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0],
            &[0, 0, 255, 0, 0],
            &[0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0],
        ]);
        let opened = open(&mask, &StructuringElement::ellipse(2, 2), 1);
        assert_eq!(opened.count_nonzero(), 0);
    }

    fn square_blob() -> GrayPlane {
        let mut mask = GrayPlane::new(8, 8, 0);
        for y in 2..6 {
            for x in 2..6 {
                mask.set(x, y, 255);
            }
        }
        mask
    }

    #[test]
    fn opening_with_centered_rect_restores_blob() {
        let mask = square_blob();
        let opened = open(&mask, &rect(3, 3), 1);
        assert_eq!(opened, mask);
    }

    #[test]
    fn opening_with_even_ellipse_keeps_blob_connected() {
        // Even elements are anchored off-center, so the blob shifts by one
        // pixel toward the bottom right and loses a corner.
        let opened = open(&square_blob(), &StructuringElement::ellipse(2, 2), 1);
        assert_eq!(opened.count_nonzero(), 15);
        assert_eq!(count_regions(&opened), 1);
        assert_eq!(opened.get(2, 2), 0);
        assert_eq!(opened.get(6, 5), 255);
    }

    #[test]
    fn erode_ignores_outside_samples() {
        let full = GrayPlane::new(3, 3, 255);
        let eroded = erode(&full, &rect(3, 3));
        assert_eq!(eroded, full);
    }

    #[test]
    fn counts_eight_connected_regions() {
        let mask = plane(5, &[
            &[255, 0, 0, 0, 255],
            &[0, 255, 0, 0, 0],
            &[0, 0, 0, 0, 0],
            &[255, 255, 0, 0, 255],
        ]);
        // diagonal pair joins, so: top-left diagonal, top-right, bottom-left, bottom-right
        assert_eq!(count_regions(&mask), 4);
    }

    #[test]
    fn empty_mask_has_no_regions() {
        assert_eq!(count_regions(&GrayPlane::new(4, 4, 0)), 0);
    }
}
