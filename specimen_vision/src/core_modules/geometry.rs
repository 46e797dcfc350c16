// Plain 2D value types shared by every stage of the measurement pipeline.

use std::ops::{Add, Mul, Sub};

/// A point or vector in continuous image coordinates (x right, y down), in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// z-component of the 3D cross product; positive when `other` lies
    /// counter-clockwise of `self` in a y-up frame.
    pub fn cross(self, other: Self) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// The vector turned by 90 degrees: `(-y, x)`.
    pub fn rotate_90(self) -> Self {
        Self::new(-self.y, self.x)
    }

    pub fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }

    pub fn distance(self, other: Self) -> f64 {
        (other - self).norm()
    }
}

impl Add for Point2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point2 {
    type Output = Self;
    fn mul(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k)
    }
}

/// A point on the integer pixel-corner lattice. Vertex `(x, y)` is the top-left
/// corner of pixel `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridPoint {
    pub x: i32,
    pub y: i32,
}

impl GridPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<GridPoint> for Point2 {
    fn from(p: GridPoint) -> Self {
        Point2::new(p.x as f64, p.y as f64)
    }
}

/// Signed shoelace area of a closed polygon. Positive for clockwise winding in
/// image coordinates (y down).
pub fn signed_area(points: &[Point2]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        twice += p.cross(q);
    }
    twice * 0.5
}

/// Even-odd ray casting test. Points exactly on an edge may land either way.
pub fn polygon_contains(polygon: &[Point2], point: Point2) -> bool {
    let mut inside = false;
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_90_is_orthogonal_and_preserves_length() {
        let v = Point2::new(3.0, 4.0);
        let r = v.rotate_90();
        assert_eq!(r, Point2::new(-4.0, 3.0));
        assert_eq!(v.dot(r), 0.0);
        assert_eq!(r.norm(), 5.0);
    }

    #[test]
    fn shoelace_area_of_lattice_rectangle() {
        let square = [
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 3.0),
            Point2::new(0.0, 3.0),
        ];
        assert_eq!(signed_area(&square), 12.0);
        let reversed: Vec<Point2> = square.iter().rev().copied().collect();
        assert_eq!(signed_area(&reversed), -12.0);
    }

    #[test]
    fn ray_casting_separates_inside_from_outside() {
        let ring = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ];
        assert!(polygon_contains(&ring, Point2::new(5.5, 5.5)));
        assert!(!polygon_contains(&ring, Point2::new(10.5, 5.5)));
        assert!(!polygon_contains(&ring, Point2::new(-0.5, 0.5)));
    }
}
