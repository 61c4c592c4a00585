use serde::{Deserialize, Serialize};

/// A 2D point / vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// A 3×2 affine transform matrix: two basis axes plus a translation.
///
/// Maps `p` to `offset + p.x * axis_x + p.y * axis_y`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mat23 {
    pub axis_x: Vec2,
    pub axis_y: Vec2,
    pub offset: Vec2,
}

impl Mat23 {
    pub fn identity() -> Self {
        Self {
            axis_x: Vec2::new(1.0, 0.0),
            axis_y: Vec2::new(0.0, 1.0),
            offset: Vec2::zero(),
        }
    }

    pub fn translate(t: Vec2) -> Self {
        Self { offset: t, ..Self::identity() }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            axis_x: Vec2::new(sx, 0.0),
            axis_y: Vec2::new(0.0, sy),
            offset: Vec2::zero(),
        }
    }

    /// Counter-clockwise rotation by `angle` radians.
    pub fn rotate(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            axis_x: Vec2::new(c, s),
            axis_y: Vec2::new(-s, c),
            offset: Vec2::zero(),
        }
    }

    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        self.offset + self.axis_x * p.x + self.axis_y * p.y
    }

    /// Like [`Self::transform_point`] but ignoring the translation part.
    pub fn transform_vector(&self, v: Vec2) -> Vec2 {
        self.axis_x * v.x + self.axis_y * v.y
    }

    pub fn det(&self) -> f64 {
        self.axis_x.x * self.axis_y.y - self.axis_x.y * self.axis_y.x
    }

    /// Inverse transform, or `None` when the matrix is singular.
    pub fn invert(&self) -> Option<Mat23> {
        let det = self.det();
        if det.abs() < 1e-12 {
            return None;
        }
        let inv = 1.0 / det;
        let axis_x = Vec2::new(self.axis_y.y * inv, -self.axis_x.y * inv);
        let axis_y = Vec2::new(-self.axis_y.x * inv, self.axis_x.x * inv);
        let offset = Vec2::new(
            -(axis_x.x * self.offset.x + axis_y.x * self.offset.y),
            -(axis_x.y * self.offset.x + axis_y.y * self.offset.y),
        );
        Some(Mat23 { axis_x, axis_y, offset })
    }

    pub fn is_identity(&self) -> bool {
        let id = Mat23::identity();
        self.approx_eq(&id, 1e-12)
    }

    pub fn approx_eq(&self, other: &Mat23, eps: f64) -> bool {
        (self.axis_x.x - other.axis_x.x).abs() <= eps
            && (self.axis_x.y - other.axis_x.y).abs() <= eps
            && (self.axis_y.x - other.axis_y.x).abs() <= eps
            && (self.axis_y.y - other.axis_y.y).abs() <= eps
            && (self.offset.x - other.offset.x).abs() <= eps
            && (self.offset.y - other.offset.y).abs() <= eps
    }
}

impl Default for Mat23 {
    fn default() -> Self {
        Self::identity()
    }
}

/// Composition in application order: `(a * b).transform_point(p)` equals
/// `a.transform_point(b.transform_point(p))`, i.e. `b` is the inner transform.
impl std::ops::Mul for Mat23 {
    type Output = Mat23;
    fn mul(self, rhs: Mat23) -> Mat23 {
        Mat23 {
            axis_x: self.transform_vector(rhs.axis_x),
            axis_y: self.transform_vector(rhs.axis_y),
            offset: self.transform_point(rhs.offset),
        }
    }
}

/// An axis-aligned rectangle in logical (compositional) space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn is_valid(&self) -> bool {
        self.x1 > self.x0 && self.y1 > self.y0
    }
}

/// An axis-aligned rectangle in integer pixel space. Half-open: `x1`/`y1`
/// are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RectI {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl RectI {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }

    pub fn is_valid(&self) -> bool {
        self.x1 > self.x0 && self.y1 > self.y0
    }

    pub fn contains(&self, other: &RectI) -> bool {
        self.x0 <= other.x0 && self.y0 <= other.y0 && self.x1 >= other.x1 && self.y1 >= other.y1
    }

    pub fn intersect(&self, other: &RectI) -> RectI {
        RectI {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }

    /// Convert to a logical rect covering the same area.
    pub fn to_rect(&self) -> Rect {
        Rect::new(self.x0 as f64, self.y0 as f64, self.x1 as f64, self.y1 as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_maps_points() {
        let p = Vec2::new(3.5, -2.0);
        let q = Mat23::identity().transform_point(p);
        assert_eq!(p, q);
    }

    #[test]
    fn test_compose_application_order() {
        let t = Mat23::translate(Vec2::new(10.0, 0.0));
        let s = Mat23::scale(2.0, 2.0);
        // (t * s) applies the scale first.
        let p = (t * s).transform_point(Vec2::new(1.0, 1.0));
        assert!((p.x - 12.0).abs() < 1e-12);
        assert!((p.y - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_compose_associative() {
        let a = Mat23::rotate(0.3);
        let b = Mat23::scale(2.0, 0.5);
        let c = Mat23::translate(Vec2::new(-4.0, 7.0));
        let lhs = (a * b) * c;
        let rhs = a * (b * c);
        assert!(lhs.approx_eq(&rhs, 1e-9));
    }

    #[test]
    fn test_invert_round_trip() {
        let m = Mat23::translate(Vec2::new(5.0, -3.0)) * Mat23::rotate(1.1) * Mat23::scale(3.0, 0.25);
        let inv = m.invert().unwrap();
        assert!((m * inv).is_identity() || (m * inv).approx_eq(&Mat23::identity(), 1e-9));
        let p = Vec2::new(2.0, 9.0);
        let q = inv.transform_point(m.transform_point(p));
        assert!((p.x - q.x).abs() < 1e-9);
        assert!((p.y - q.y).abs() < 1e-9);
    }

    #[test]
    fn test_invert_singular() {
        assert!(Mat23::scale(0.0, 1.0).invert().is_none());
    }

    #[test]
    fn test_rect_contains_intersect() {
        let outer = RectI::new(0, 0, 64, 64);
        let inner = RectI::new(8, 8, 32, 32);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        let isect = outer.intersect(&RectI::new(32, 32, 96, 96));
        assert_eq!(isect, RectI::new(32, 32, 64, 64));
    }

    #[test]
    fn test_rect_validity() {
        assert!(!RectI::new(4, 4, 4, 8).is_valid());
        assert!(RectI::from_size(1, 1).is_valid());
    }
}
