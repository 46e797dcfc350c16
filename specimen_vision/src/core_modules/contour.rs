// THEORY:
// The contour stage finds connected specimen regions in the mask and keeps exactly
// one of them: the region whose outer boundary encloses the largest area.
//
// Key architectural principles:
// 1.  **Region Growing**: foreground pixels are grouped into 8-connected regions with
//     an iterative flood fill, so pixels touching only at a corner belong together.
//     The first pixel of each region in raster order is its top-left-most pixel and
//     seeds the boundary trace.
// 2.  **Crack Following**: the outer boundary is traced along pixel *edges* rather
//     than through pixel centers. Vertices live on the pixel-corner lattice, so a
//     W×H block of pixels yields a W×H rectangle and the enclosed area of a boundary
//     equals its filled pixel count. Only corners where the trace turns are kept.
//     Where two pixels meet diagonally the trace passes through the shared corner
//     twice, once on each side.
// 3.  **Outer Boundaries Only**: holes are never traced, and a region sitting inside
//     a hole of a larger region is dropped, as it is not an external boundary.
// 4.  **Single Candidate**: the largest region wins. Ties go to the region met first
//     in raster order. Secondary regions are discarded by policy.

use crate::core_modules::geometry::{GridPoint, Point2, polygon_contains, signed_area};

/// A closed region boundary on the pixel-corner lattice, traced clockwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<GridPoint>,
}

impl Contour {
    pub fn new(points: Vec<GridPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn to_points(&self) -> Vec<Point2> {
        self.points.iter().copied().map(Point2::from).collect()
    }

    /// Area enclosed by the boundary, holes included.
    pub fn area(&self) -> f64 {
        signed_area(&self.to_points()).abs()
    }
}

pub mod contour_selector {
    use super::*;
    use image::GrayImage;

    /// Step directions on the lattice in clockwise screen order: east, south, west, north.
    const DIRECTIONS: [(i32, i32); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];

    /// Finds the outer boundary of every external foreground region, in raster
    /// order of each region's top-left pixel.
    pub fn find_external_contours(mask: &GrayImage) -> Vec<Contour> {
        let (width, height) = mask.dimensions();
        let mut visited = vec![false; (width * height) as usize];
        let mut traced: Vec<(GridPoint, Contour)> = Vec::new();

        for y in 0..height {
            for x in 0..width {
                let index = (y * width + x) as usize;
                if visited[index] || !is_foreground(mask, x as i32, y as i32) {
                    continue;
                }
                flood_region(mask, &mut visited, x, y);
                let seed = GridPoint::new(x as i32, y as i32);
                traced.push((seed, trace_outer_boundary(mask, seed)));
            }
        }

        let outlines: Vec<Vec<Point2>> = traced.iter().map(|(_, c)| c.to_points()).collect();
        let areas: Vec<f64> = outlines.iter().map(|points| signed_area(points).abs()).collect();
        let mut contours = Vec::with_capacity(traced.len());
        for (i, (seed, contour)) in traced.iter().enumerate() {
            // Pixel centers sit on half-integers, never on a lattice edge.
            let center = Point2::new(seed.x as f64 + 0.5, seed.y as f64 + 0.5);
            let nested = outlines.iter().enumerate().any(|(j, outer)| {
                j != i && areas[j] > areas[i] && polygon_contains(outer, center)
            });
            if nested {
                tracing::trace!(?seed, "dropping region nested in a hole");
            } else {
                contours.push(contour.clone());
            }
        }
        contours
    }

    /// Returns the external contour enclosing the largest area, or `None` for an
    /// empty mask.
    pub fn select_largest(mask: &GrayImage) -> Option<Contour> {
        let contours = find_external_contours(mask);
        let count = contours.len();
        let mut best: Option<(f64, Contour)> = None;
        for contour in contours {
            let area = contour.area();
            // Strict comparison keeps the first region on ties.
            if best.as_ref().is_none_or(|(best_area, _)| area > *best_area) {
                best = Some((area, contour));
            }
        }
        if let Some((area, _)) = &best {
            tracing::debug!(candidates = count, area, "selected largest contour");
        }
        best.map(|(_, contour)| contour)
    }

    fn is_foreground(mask: &GrayImage, x: i32, y: i32) -> bool {
        x >= 0
            && y >= 0
            && (x as u32) < mask.width()
            && (y as u32) < mask.height()
            && mask.get_pixel(x as u32, y as u32).0[0] != 0
    }

    const NEIGHBOURS: [(i32, i32); 8] = [(0, 1), (0, -1), (1, 0), (-1, 0), (1, 1), (1, -1), (-1, 1), (-1, -1)];

    /// Marks every pixel 8-connected to `(x, y)` as visited.
    fn flood_region(mask: &GrayImage, visited: &mut [bool], x: u32, y: u32) {
        let width = mask.width();
        let mut queue = vec![(x, y)];
        visited[(y * width + x) as usize] = true;

        while let Some((cx, cy)) = queue.pop() {
            for (dx, dy) in &NEIGHBOURS {
                let nx = cx as i32 + dx;
                let ny = cy as i32 + dy;
                if is_foreground(mask, nx, ny) {
                    let index = (ny as u32 * width + nx as u32) as usize;
                    if !visited[index] {
                        visited[index] = true;
                        queue.push((nx as u32, ny as u32));
                    }
                }
            }
        }
    }

    /// The pixels diagonally ahead-left and ahead-right of lattice vertex `v` when
    /// heading in direction `dir`.
    fn pixels_ahead(v: GridPoint, dir: usize) -> ((i32, i32), (i32, i32)) {
        let (x, y) = (v.x, v.y);
        match dir {
            0 => ((x, y - 1), (x, y)),
            1 => ((x, y), (x - 1, y)),
            2 => ((x - 1, y), (x - 1, y - 1)),
            _ => ((x - 1, y - 1), (x, y - 1)),
        }
    }

    /// Follows pixel edges clockwise with the region on the right-hand side,
    /// starting at the top-left corner of `seed`, which must be the region's
    /// first pixel in raster order.
    fn trace_outer_boundary(mask: &GrayImage, seed: GridPoint) -> Contour {
        let max_steps = 4 * (mask.width() as usize + 1) * (mask.height() as usize + 1);
        let mut points = vec![seed];
        let mut vertex = seed;
        let mut dir = 0;

        for _ in 0..max_steps {
            vertex = GridPoint::new(vertex.x + DIRECTIONS[dir].0, vertex.y + DIRECTIONS[dir].1);
            if vertex == seed {
                break;
            }
            let (left, right) = pixels_ahead(vertex, dir);
            // Left first: a foreground pixel ahead-left is connected to the region,
            // even when it only touches diagonally.
            let next = if is_foreground(mask, left.0, left.1) {
                (dir + 3) % 4
            } else if !is_foreground(mask, right.0, right.1) {
                (dir + 1) % 4
            } else {
                dir
            };
            if next != dir {
                points.push(vertex);
                dir = next;
            }
        }
        Contour::new(points)
    }
}
