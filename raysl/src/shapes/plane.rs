use geo::{Normal, Point, Ray, Vec2};

/// The `z = 0` plane. Non-closed: a ray crosses it at most once, so it is
/// excluded from CSG (see `Shape::all_ray_intersections`).
pub fn get_t(ray: &Ray) -> Option<f64> {
    if ray.dir.z.abs() < 1e-10 {
        return None;
    }

    let t = -ray.origin.z / ray.dir.z;
    ray.is_within_domain(t).then_some(t)
}

/// Single crossing `t`, kept for diagnostics/tests even though the plane
/// never participates in CSG combination.
pub fn get_all_ts(ray: &Ray) -> Vec<f64> {
    if ray.dir.z.abs() < 1e-10 {
        vec![]
    } else {
        vec![-ray.origin.z / ray.dir.z]
    }
}

pub fn get_normal(_point: Point, ray: &Ray) -> Normal {
    Normal::new(0.0, 0.0, 1.0).facing(&ray.dir)
}

pub fn get_uv(point: Point) -> Vec2 {
    Vec2::new(point.x.rem_euclid(1.0), point.y.rem_euclid(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_from_above() {
        let ray = Ray::new(Point::new(0.0, 0.0, 1.0), geo::Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(get_t(&ray), Some(1.0));
    }

    #[test]
    fn test_parallel_misses() {
        let ray = Ray::new(Point::new(0.0, 0.0, 1.0), geo::Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(get_t(&ray), None);
    }
}
