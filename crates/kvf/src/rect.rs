//! Axis aligned rectangles in a y-up coordinate system

use std::ops::{Add, Div, Mul, Sub};

use nalgebra::{Scalar, Vector2};

use crate::foundation::math::Vec2;

/// Component types usable in a [`Rect`]
pub trait RectScalar:
    Scalar + Copy + PartialOrd + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self> + Div<Output = Self>
{
    /// Additive identity
    const ZERO: Self;
    /// Divisor used for halving
    const TWO: Self;
    /// Absolute value
    fn abs(self) -> Self;
}

impl RectScalar for f32 {
    const ZERO: Self = 0.0;
    const TWO: Self = 2.0;
    fn abs(self) -> Self {
        f32::abs(self)
    }
}

impl RectScalar for i32 {
    const ZERO: Self = 0;
    const TWO: Self = 2;
    fn abs(self) -> Self {
        i32::abs(self)
    }
}

/// Rectangle specified by its left-top and right-bottom corners.
///
/// `lt.y` is the top edge and `rb.y` the bottom edge, so `lt.y >= rb.y` for a well formed rect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect<T: RectScalar = f32> {
    /// Left-top (x: left, y: top)
    pub lt: Vector2<T>,
    /// Right-bottom (x: right, y: bottom)
    pub rb: Vector2<T>,
}

impl<T: RectScalar> Default for Rect<T> {
    fn default() -> Self {
        Self {
            lt: Vector2::new(T::ZERO, T::ZERO),
            rb: Vector2::new(T::ZERO, T::ZERO),
        }
    }
}

impl<T: RectScalar> Rect<T> {
    /// Construct from left-bottom and right-top corners
    pub fn from_lbrt(lb: Vector2<T>, rt: Vector2<T>) -> Self {
        Self {
            lt: Vector2::new(lb.x, rt.y),
            rb: Vector2::new(rt.x, lb.y),
        }
    }

    /// Construct from total size around `center`
    pub fn from_size(size: Vector2<T>, center: Vector2<T>) -> Self {
        if size.x == T::ZERO && size.y == T::ZERO {
            return Self { lt: center, rb: center };
        }
        let he = Vector2::new(size.x / T::TWO, size.y / T::TWO);
        Self {
            lt: Vector2::new(center.x - he.x, center.y + he.y),
            rb: Vector2::new(center.x + he.x, center.y - he.y),
        }
    }

    /// Left-top corner
    pub fn top_left(&self) -> Vector2<T> {
        self.lt
    }

    /// Right-top corner
    pub fn top_right(&self) -> Vector2<T> {
        Vector2::new(self.rb.x, self.lt.y)
    }

    /// Left-bottom corner
    pub fn bottom_left(&self) -> Vector2<T> {
        Vector2::new(self.lt.x, self.rb.y)
    }

    /// Right-bottom corner
    pub fn bottom_right(&self) -> Vector2<T> {
        self.rb
    }

    /// Midpoint
    pub fn center(&self) -> Vector2<T> {
        Vector2::new((self.lt.x + self.rb.x) / T::TWO, (self.lt.y + self.rb.y) / T::TWO)
    }

    /// Absolute width and height
    pub fn size(&self) -> Vector2<T> {
        Vector2::new((self.rb.x - self.lt.x).abs(), (self.lt.y - self.rb.y).abs())
    }

    /// Whether `point` lies inside or on the edges
    pub fn contains(&self, point: Vector2<T>) -> bool {
        self.lt.x <= point.x && point.x <= self.rb.x && self.rb.y <= point.y && point.y <= self.lt.y
    }

    /// Whether any corner of `other` lies inside this rect
    pub fn contains_rect(&self, other: &Self) -> bool {
        [other.top_left(), other.top_right(), other.bottom_left(), other.bottom_right()]
            .into_iter()
            .any(|corner| self.contains(corner))
    }

    /// Both corners multiplied by `scale`
    pub fn scaled(&self, scale: T) -> Self {
        Self {
            lt: Vector2::new(self.lt.x * scale, self.lt.y * scale),
            rb: Vector2::new(self.rb.x * scale, self.rb.y * scale),
        }
    }
}

impl From<Rect<i32>> for Rect<f32> {
    fn from(rect: Rect<i32>) -> Self {
        Self {
            lt: rect.lt.cast::<f32>(),
            rb: rect.rb.cast::<f32>(),
        }
    }
}

/// Whether either rect contains a corner of the other
pub fn is_intersecting<T: RectScalar>(a: &Rect<T>, b: &Rect<T>) -> bool {
    a.contains_rect(b) || b.contains_rect(a)
}

/// Rect in UV space (origin at top-left, +y down)
pub type UvRect = Rect<f32>;

/// The entire texture: (0, 0) to (1, 1)
pub fn uv_rect() -> UvRect {
    Rect {
        lt: Vec2::new(0.0, 0.0),
        rb: Vec2::new(1.0, 1.0),
    }
}

/// Whether both corners lie within `[0, 1]`
pub fn is_normalized(rect: &UvRect) -> bool {
    let is_norm = |f: f32| (0.0..=1.0).contains(&f);
    is_norm(rect.lt.x) && is_norm(rect.lt.y) && is_norm(rect.rb.x) && is_norm(rect.rb.y)
}

/// Convert a normalized point (origin at center, +y up) to UV space
pub fn to_uv_coords(n_xy: Vec2) -> Vec2 {
    Vec2::new(0.5 + n_xy.x, 0.5 - n_xy.y)
}

/// Convert a normalized rect (origin at center, +y up) to UV space
pub fn to_uv_rect(n_rect: &Rect<f32>) -> UvRect {
    Rect {
        lt: to_uv_coords(n_rect.top_left()),
        rb: to_uv_coords(n_rect.bottom_right()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_size_is_centered() {
        let rect = Rect::from_size(Vec2::new(4.0, 2.0), Vec2::new(1.0, 1.0));
        assert_eq!(rect.lt, Vec2::new(-1.0, 2.0));
        assert_eq!(rect.rb, Vec2::new(3.0, 0.0));
        assert_eq!(rect.center(), Vec2::new(1.0, 1.0));
        assert_eq!(rect.size(), Vec2::new(4.0, 2.0));
    }

    #[test]
    fn test_from_size_zero_collapses_to_center() {
        let rect = Rect::from_size(Vector2::new(0, 0), Vector2::new(3, 4));
        assert_eq!(rect.lt, rect.rb);
        assert_eq!(rect.lt, Vector2::new(3, 4));
    }

    #[test]
    fn test_from_lbrt() {
        let rect = Rect::from_lbrt(Vector2::new(0, 0), Vector2::new(10, 5));
        assert_eq!(rect.top_left(), Vector2::new(0, 5));
        assert_eq!(rect.bottom_right(), Vector2::new(10, 0));
    }

    #[test]
    fn test_contains_point_is_inclusive() {
        let rect = Rect::from_size(Vec2::new(2.0, 2.0), Vec2::zeros());
        assert!(rect.contains(Vec2::new(1.0, 1.0)));
        assert!(rect.contains(Vec2::zeros()));
        assert!(!rect.contains(Vec2::new(1.1, 0.0)));
        assert!(!rect.contains(Vec2::new(0.0, -1.5)));
    }

    #[test]
    fn test_intersection_uses_corners() {
        let a = Rect::from_size(Vec2::new(2.0, 2.0), Vec2::zeros());
        let b = Rect::from_size(Vec2::new(2.0, 2.0), Vec2::new(1.5, 1.5));
        let far = Rect::from_size(Vec2::new(1.0, 1.0), Vec2::new(10.0, 0.0));
        assert!(is_intersecting(&a, &b));
        assert!(!is_intersecting(&a, &far));

        let inner = Rect::from_size(Vec2::new(0.5, 0.5), Vec2::zeros());
        assert!(!inner.contains_rect(&a));
        assert!(is_intersecting(&inner, &a));
    }

    #[test]
    fn test_uv_conversion() {
        let uv = to_uv_coords(Vec2::new(0.5, 0.5));
        assert_relative_eq!(uv.x, 1.0);
        assert_relative_eq!(uv.y, 0.0);

        let n_rect = Rect::from_size(Vec2::new(1.0, 1.0), Vec2::zeros());
        assert_eq!(to_uv_rect(&n_rect), uv_rect());
        assert!(is_normalized(&uv_rect()));
        assert!(!is_normalized(&n_rect));
    }

    #[test]
    fn test_scaled_and_cast() {
        let rect: Rect<f32> = Rect::from_lbrt(Vector2::new(1, 2), Vector2::new(3, 4)).into();
        let scaled = rect.scaled(2.0);
        assert_eq!(scaled.lt, Vec2::new(2.0, 8.0));
        assert_eq!(scaled.rb, Vec2::new(6.0, 4.0));
    }
}
