//! Points and integer boxes used throughout the overlap machinery.

use serde::{Deserialize, Serialize};

/// A 2-D point in pixel coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared distance from the origin.
    pub fn rsqr(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }
}

/// Axis-aligned integer box with inclusive edges:
/// `l..=r` horizontally, `b..=t` vertically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IBox {
    pub l: i64,
    pub b: i64,
    pub r: i64,
    pub t: i64,
}

impl IBox {
    pub fn width(&self) -> i64 {
        self.r - self.l + 1
    }

    pub fn height(&self) -> i64 {
        self.t - self.b + 1
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.l as f64 && p.x <= self.r as f64 && p.y >= self.b as f64 && p.y <= self.t as f64
    }
}

/// Bounding box of a point set with integer (floor/ceil) edges.
///
/// Returns the zero box for an empty set.
pub fn bbox_from_points(points: &[Point]) -> IBox {
    if points.is_empty() {
        return IBox::default();
    }

    let mut l = f64::INFINITY;
    let mut r = f64::NEG_INFINITY;
    let mut b = f64::INFINITY;
    let mut t = f64::NEG_INFINITY;

    for p in points {
        l = l.min(p.x);
        r = r.max(p.x);
        b = b.min(p.y);
        t = t.max(p.y);
    }

    IBox {
        l: l.floor() as i64,
        b: b.floor() as i64,
        r: r.ceil() as i64,
        t: t.ceil() as i64,
    }
}

/// Overlap boxes for two rectangles of sizes (w1,h1) and (w2,h2), where
/// image 1's origin sits at (dx,dy) in image 2's frame.
///
/// `ba` is the overlap in image 1's coordinates, `bb` in image 2's.
/// Either box may come out empty (negative width/height) when the shift
/// exceeds the image extent; callers test the dimensions.
pub fn boxes_from_shifts(
    w1: i64,
    h1: i64,
    w2: i64,
    h2: i64,
    dx: i64,
    dy: i64,
) -> (IBox, IBox) {
    // Intersection in image 2's frame.
    let l = dx.max(0);
    let b = dy.max(0);
    let r = (dx + w1 - 1).min(w2 - 1);
    let t = (dy + h1 - 1).min(h2 - 1);

    let bb = IBox { l, b, r, t };
    let ba = IBox {
        l: l - dx,
        b: b - dy,
        r: r - dx,
        t: t - dy,
    };

    (ba, bb)
}

/// All integer lattice points of a w×h grid, row-major from (0,0).
pub fn make_zero_based_points(w: usize, h: usize) -> Vec<Point> {
    let mut pts = Vec::with_capacity(w * h);

    for y in 0..h {
        for x in 0..w {
            pts.push(Point::new(x as f64, y as f64));
        }
    }

    pts
}
