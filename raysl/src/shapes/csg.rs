use geo::{Interval, Ray, Transformation};

use crate::error::ShapeAlgebraError;
use crate::hit::HitRecord;

use super::Shape;

/// The four Boolean combinators a CSG node can apply to its two
/// operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Unite,
    Intersect,
    Diff,
    Fuse,
}

/// A composite shape: two owned sub-shapes (arbitrarily deep) combined by
/// `rule`, wrapped by this node's own `Transformation`. Carries no
/// material of its own — hit records propagate the originating
/// sub-shape's material.
#[derive(Debug, Clone)]
pub struct Csg {
    pub rule: Rule,
    pub left: Shape,
    pub right: Shape,
    pub transformation: Transformation,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Side {
    Left,
    Right,
}

/// Collapse a left/right boundary crossing pair that coincide within
/// floating-point slop (e.g. two identical or tangent operands reporting
/// the same physical crossing from both sides) to a single entry, so a
/// shared boundary isn't double-counted as two separate crossings. Only
/// opposite-side neighbors are merged — two crossings from the *same*
/// operand are never this close without being genuinely distinct, and
/// merging them would risk folding a real even-length hit list down to an
/// odd one. An opposite-side coincidence that isn't a true shared boundary
/// can still do that; `combine` checks parity after this runs and reports
/// `ShapeAlgebraError::OddHitCount` rather than handing a broken list to
/// `ts_to_intervals`. `ts` must already be sorted ascending by `t`.
const DEDUP_EPS: f64 = 1e-9;

fn dedup_by_t(ts: &mut Vec<(f64, Side)>) {
    ts.dedup_by(|a, b| a.1 != b.1 && (a.0 - b.0).abs() < DEDUP_EPS);
}

impl Csg {
    /// Build a CSG node. Rejects non-closed operands (a bare `Plane`)
    /// since the interval algebra below requires an even-length hit list
    /// from both sides.
    pub fn new(rule: Rule, left: Shape, right: Shape, transformation: Transformation) -> Result<Self, ShapeAlgebraError> {
        if !left.is_closed() || !right.is_closed() {
            return Err(ShapeAlgebraError::NonClosedOperand);
        }
        Ok(Csg { rule, left, right, transformation })
    }

    fn local_ray(&self, ray: &Ray) -> Ray {
        ray.transform(&self.transformation.inverse())
    }

    fn combine(&self, local_ray: &Ray) -> Result<Vec<(f64, Side)>, ShapeAlgebraError> {
        let lts = self.left.all_ray_intersections(local_ray)?;
        let rts = self.right.all_ray_intersections(local_ray)?;

        let l_intervals = geo::interval::ts_to_intervals(&lts);
        let r_intervals = geo::interval::ts_to_intervals(&rts);

        let in_l = |t: f64| l_intervals.iter().any(|iv: &Interval| iv.contains(t));
        let in_r = |t: f64| r_intervals.iter().any(|iv: &Interval| iv.contains(t));

        let mut combined: Vec<(f64, Side)> = match self.rule {
            Rule::Unite => lts
                .iter()
                .map(|&t| (t, Side::Left))
                .chain(rts.iter().map(|&t| (t, Side::Right)))
                .collect(),
            Rule::Intersect => lts
                .iter()
                .filter(|&&t| in_r(t))
                .map(|&t| (t, Side::Left))
                .chain(rts.iter().filter(|&&t| in_l(t)).map(|&t| (t, Side::Right)))
                .collect(),
            Rule::Diff => lts
                .iter()
                .filter(|&&t| !in_r(t))
                .map(|&t| (t, Side::Left))
                .chain(rts.iter().filter(|&&t| in_l(t)).map(|&t| (t, Side::Right)))
                .collect(),
            Rule::Fuse => lts
                .iter()
                .filter(|&&t| !in_r(t))
                .map(|&t| (t, Side::Left))
                .chain(rts.iter().filter(|&&t| !in_l(t)).map(|&t| (t, Side::Right)))
                .collect(),
        };

        combined.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        dedup_by_t(&mut combined);

        if combined.len() % 2 != 0 {
            return Err(ShapeAlgebraError::OddHitCount(combined.len()));
        }

        Ok(combined)
    }

    pub fn all_ray_intersections(&self, ray: &Ray) -> Result<Vec<f64>, ShapeAlgebraError> {
        let local_ray = self.local_ray(ray);
        Ok(self.combine(&local_ray)?.into_iter().map(|(t, _)| t).collect())
    }

    pub fn ray_intersection(&self, ray: &Ray) -> Option<HitRecord> {
        let local_ray = self.local_ray(ray);
        let combined = self.combine(&local_ray).ok()?;

        let (t, side) = combined.into_iter().filter(|(t, _)| local_ray.is_within_domain(*t)).fold(
            None,
            |acc: Option<(f64, Side)>, cur| match acc {
                Some(best) if best.0 <= cur.0 => Some(best),
                _ => Some(cur),
            },
        )?;

        Some(self.build_hit(ray, &local_ray, t, side))
    }

    /// Build the `HitRecord` for this node at an already-known-valid `t`,
    /// re-deriving which operand produced it. Used when this CSG node is
    /// itself an operand of an outer CSG node.
    pub(crate) fn hit_at(&self, ray: &Ray, t: f64) -> HitRecord {
        let local_ray = self.local_ray(ray);
        let combined = self.combine(&local_ray).unwrap_or_default();
        let side = combined
            .into_iter()
            .find(|(ct, _)| (ct - t).abs() < DEDUP_EPS)
            .map(|(_, s)| s)
            .unwrap_or(Side::Left);

        self.build_hit(ray, &local_ray, t, side)
    }

    fn build_hit(&self, ray: &Ray, local_ray: &Ray, t: f64, side: Side) -> HitRecord {
        let operand = match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        };

        let mut hit = operand.hit_at(local_ray, t);
        hit.world_point = ray.point_at(t);
        hit.ray = ray.clone();
        hit.normal = self.transformation.apply_normal(hit.normal).facing(&ray.dir);
        hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Instance;
    use geo::{Point, Vec3};

    fn sphere_at(x: f64) -> Shape {
        Shape::Sphere(Instance::new(Transformation::translation(Vec3::new(x, 0.0, 0.0)), crate::material::Material::default()))
    }

    #[test]
    fn test_intersect_identical_spheres_equals_sphere() {
        let a = sphere_at(0.0);
        let b = sphere_at(0.0);
        let csg = Csg::new(Rule::Intersect, a, b, Transformation::identity()).unwrap();

        let ray = Ray::new(Point::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(csg.ray_intersection(&ray).map(|h| h.t), Some(4.0));
    }

    #[test]
    fn test_diff_identical_spheres_has_no_hit() {
        let a = sphere_at(0.0);
        let b = sphere_at(0.0);
        let csg = Csg::new(Rule::Diff, a, b, Transformation::identity()).unwrap();

        let ray = Ray::new(Point::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(csg.ray_intersection(&ray).is_none());
    }

    #[test]
    fn test_union_of_disjoint_spheres_hits_nearest() {
        let a = sphere_at(-5.0);
        let b = sphere_at(5.0);
        let csg = Csg::new(Rule::Unite, a, b, Transformation::identity()).unwrap();

        let ray = Ray::new(Point::new(-10.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(csg.ray_intersection(&ray).map(|h| h.t), Some(4.0));
    }

    #[test]
    fn test_unite_of_identical_spheres_dedups_coincident_crossings() {
        let a = sphere_at(0.0);
        let b = sphere_at(0.0);
        let csg = Csg::new(Rule::Unite, a, b, Transformation::identity()).unwrap();

        let ray = Ray::new(Point::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let all = csg.all_ray_intersections(&ray).unwrap();

        // Both operands cross the ray at the same two t's; without dedup
        // this would be 4 entries instead of the true 2 boundary crossings.
        assert_eq!(all.len(), 2);
        assert_eq!(csg.ray_intersection(&ray).map(|h| h.t), Some(4.0));
    }

    #[test]
    fn test_dedup_by_t_only_merges_opposite_sides() {
        let mut ts = vec![(4.0, Side::Left), (4.0 + 1e-12, Side::Right), (6.0, Side::Left)];
        dedup_by_t(&mut ts);
        assert_eq!(ts, vec![(4.0, Side::Left), (6.0, Side::Left)]);

        // Same-side entries this close would indicate a bug elsewhere (a
        // single shape's own hit list shouldn't have near-duplicate t's),
        // but dedup_by_t must not paper over it by merging them anyway —
        // doing so risks turning a correct even-length list odd.
        let mut same_side = vec![(4.0, Side::Left), (4.0 + 1e-12, Side::Left)];
        dedup_by_t(&mut same_side);
        assert_eq!(same_side.len(), 2);
    }

    #[test]
    fn test_fuse_of_identical_spheres_dedups_coincident_crossings() {
        let a = sphere_at(0.0);
        let b = sphere_at(0.0);
        let csg = Csg::new(Rule::Fuse, a, b, Transformation::identity()).unwrap();

        let ray = Ray::new(Point::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let all = csg.all_ray_intersections(&ray).unwrap();

        // Before this fix, Fuse never deduped at all, so identical operands
        // reported every boundary crossing twice (4 entries instead of 2).
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_plane_operand_is_rejected() {
        let plane = Shape::Plane(Instance::default());
        let sphere = sphere_at(0.0);

        assert_eq!(
            Csg::new(Rule::Unite, plane, sphere, Transformation::identity()).unwrap_err(),
            ShapeAlgebraError::NonClosedOperand
        );
    }
}
