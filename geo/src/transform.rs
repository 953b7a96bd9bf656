use std::ops::Mul;

use crate::mat4::Mat4;
use crate::normal::Normal;
use crate::point::Point;
use crate::vec3::Vec3;

/// An affine transformation, carrying its own matrix alongside its
/// pre-computed inverse so that `Transformation::inverse` and normal
/// transport never have to re-invert on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformation {
    m: Mat4,
    inv: Mat4,
}

impl Transformation {
    /// Build a `Transformation` from a matrix and its already-known
    /// inverse. Callers are responsible for `inv` actually being the
    /// inverse of `m`; use `Transformation::from_mat4` when only `m` is
    /// known.
    pub fn new(m: Mat4, inv: Mat4) -> Self {
        Transformation { m, inv }
    }

    pub fn from_mat4(m: Mat4) -> Self {
        let inv = m.inverse();
        Transformation::new(m, inv)
    }

    pub fn identity() -> Self {
        Transformation::new(Mat4::identity(), Mat4::identity())
    }

    pub fn translation(v: Vec3) -> Self {
        Transformation::new(Mat4::translation(v), Mat4::translation(-v))
    }

    pub fn scaling(v: Vec3) -> Self {
        Transformation::new(
            Mat4::scaling(v),
            Mat4::scaling(Vec3::new(1.0 / v.x, 1.0 / v.y, 1.0 / v.z)),
        )
    }

    pub fn rotation_x(angle_rad: f64) -> Self {
        Transformation::new(Mat4::rotation_x(angle_rad), Mat4::rotation_x(-angle_rad))
    }

    pub fn rotation_y(angle_rad: f64) -> Self {
        Transformation::new(Mat4::rotation_y(angle_rad), Mat4::rotation_y(-angle_rad))
    }

    pub fn rotation_z(angle_rad: f64) -> Self {
        Transformation::new(Mat4::rotation_z(angle_rad), Mat4::rotation_z(-angle_rad))
    }

    /// The inverse transformation, built for free from the cached inverse
    /// matrix.
    pub fn inverse(&self) -> Transformation {
        Transformation::new(self.inv, self.m)
    }

    pub fn apply_point(&self, p: Point) -> Point {
        self.m.apply_point(p)
    }

    pub fn apply_vec(&self, v: Vec3) -> Vec3 {
        self.m.apply_vec(v)
    }

    /// Transform a `Normal` by the inverse-transpose of this
    /// transformation's matrix, as required to keep normals perpendicular
    /// to the surface under non-uniform scaling.
    pub fn apply_normal(&self, n: Normal) -> Normal {
        n.transform_by_inverse_transpose(&self.inv.transpose())
    }

    /// Whether this transformation preserves handedness (determinant of
    /// the linear part is positive). A negative determinant flips
    /// triangle winding and must be corrected for in normal shading.
    pub fn is_orientation_preserving(&self) -> bool {
        self.m.determinant() > 0.0
    }
}

impl Mul for Transformation {
    type Output = Transformation;

    /// Compose two transformations: `self * other` applies `other` first,
    /// then `self`.
    fn mul(self, other: Transformation) -> Transformation {
        Transformation::new(self.m.mul(&other.m), other.inv.mul(&self.inv))
    }
}

impl<'a> Mul<&'a Transformation> for &'a Transformation {
    type Output = Transformation;

    fn mul(self, other: &'a Transformation) -> Transformation {
        Transformation::new(self.m.mul(&other.m), other.inv.mul(&self.inv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_inverse() {
        let t = Transformation::translation(Vec3::new(1.0, 2.0, 3.0));
        let p = Point::new(5.0, 5.0, 5.0);

        let moved = t.apply_point(p);
        let back = t.inverse().apply_point(moved);

        assert!(back.close(&p, 1e-9));
    }

    #[test]
    fn test_composition_order() {
        let translate = Transformation::translation(Vec3::new(1.0, 0.0, 0.0));
        let scale = Transformation::scaling(Vec3::new(2.0, 2.0, 2.0));

        // translate * scale: scale first, then translate
        let combined = translate.clone() * scale.clone();
        let p = Point::new(1.0, 0.0, 0.0);

        assert_eq!(combined.apply_point(p), Point::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_scaling_preserves_normal_direction_on_uniform_scale() {
        let t = Transformation::scaling(Vec3::new(2.0, 2.0, 2.0));
        let n = Normal::new(0.0, 0.0, 1.0);

        let transformed = t.apply_normal(n);
        assert!((transformed.norm2() - 1.0).abs() < 1e-9);
    }
}
