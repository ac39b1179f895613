//! Math types and helpers

use nalgebra::{Vector2, Vector4};

/// 2D float vector
pub type Vec2 = Vector2<f32>;
/// 2D integer vector
pub type IVec2 = Vector2<i32>;
/// 4D float vector
pub type Vec4 = Vector4<f32>;

/// Types that have a meaningful "strictly greater than zero" test
pub trait IsPositive {
    /// Whether every component is greater than zero
    fn is_positive(&self) -> bool;
}

macro_rules! impl_is_positive {
    ($($t:ty),*) => {
        $(
            impl IsPositive for $t {
                fn is_positive(&self) -> bool {
                    *self > (0 as $t)
                }
            }

            impl IsPositive for Vector2<$t> {
                fn is_positive(&self) -> bool {
                    self.x.is_positive() && self.y.is_positive()
                }
            }
        )*
    };
}

impl_is_positive!(i32, u32, i64, u64, f32, f64);

/// Whether `value` (or every component of it) is greater than zero
pub fn is_positive<T: IsPositive>(value: T) -> bool {
    value.is_positive()
}

/// Which side of a size is kept when matching a reference aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeAspect {
    /// Keep the size as is
    #[default]
    None,
    /// Keep the height, derive the width
    FixHeight,
    /// Keep the width, derive the height
    FixWidth,
}

/// Resize `size` to match the aspect ratio of `reference`.
///
/// Returns zero if either input has a non-positive component.
pub fn aspect_resize(mut size: Vec2, reference: Vec2, aspect: ResizeAspect) -> Vec2 {
    if !is_positive(size) || !is_positive(reference) {
        return Vec2::zeros();
    }
    match aspect {
        ResizeAspect::None => {}
        ResizeAspect::FixHeight => size.x = size.y * reference.x / reference.y,
        ResizeAspect::FixWidth => size.y = size.x * reference.y / reference.x,
    }
    size
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_is_positive() {
        assert!(is_positive(1));
        assert!(!is_positive(0u32));
        assert!(!is_positive(-0.5f32));
        assert!(is_positive(IVec2::new(1, 2)));
        assert!(!is_positive(IVec2::new(1, 0)));
    }

    #[test]
    fn test_aspect_resize_fix_height() {
        let size = aspect_resize(Vec2::new(100.0, 50.0), Vec2::new(16.0, 9.0), ResizeAspect::FixHeight);
        assert_relative_eq!(size.y, 50.0);
        assert_relative_eq!(size.x, 50.0 * 16.0 / 9.0);
    }

    #[test]
    fn test_aspect_resize_fix_width() {
        let size = aspect_resize(Vec2::new(160.0, 1.0), Vec2::new(16.0, 9.0), ResizeAspect::FixWidth);
        assert_relative_eq!(size.x, 160.0);
        assert_relative_eq!(size.y, 90.0);
    }

    #[test]
    fn test_aspect_resize_rejects_non_positive() {
        let size = aspect_resize(Vec2::new(0.0, 10.0), Vec2::new(1.0, 1.0), ResizeAspect::None);
        assert_eq!(size, Vec2::zeros());
        let size = aspect_resize(Vec2::new(10.0, 10.0), Vec2::new(1.0, -1.0), ResizeAspect::FixWidth);
        assert_eq!(size, Vec2::zeros());
    }
}
