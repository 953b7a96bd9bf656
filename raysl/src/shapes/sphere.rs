use geo::{Normal, Point, Ray, Vec2};

/// Unit sphere centered at the origin, radius 1.
pub fn get_all_ts(ray: &Ray) -> Vec<f64> {
    let o = ray.origin.to_vec3();
    let a = ray.dir.norm2();
    let b = o.dot(&ray.dir);
    let c = o.norm2() - 1.0;

    let delta = b * b - a * c;
    if delta < 0.0 {
        return vec![];
    }

    let sqrt_delta = delta.sqrt();
    let t1 = (-b - sqrt_delta) / a;
    let t2 = (-b + sqrt_delta) / a;

    vec![t1, t2]
}

pub fn get_t(ray: &Ray) -> Option<f64> {
    get_all_ts(ray).into_iter().filter(|t| ray.is_within_domain(*t)).fold(None, |acc, t| {
        Some(acc.map_or(t, |best: f64| best.min(t)))
    })
}

pub fn get_normal(point: Point, ray: &Ray) -> Normal {
    Normal::from_vec3(point.to_vec3()).facing(&ray.dir)
}

/// Spherical `(u, v)` mapping: `u` is longitude in `[0, 1)`, `v` is
/// colatitude in `[0, 1]` with `v = 0` at the south pole.
pub fn get_uv(point: Point) -> Vec2 {
    let u = point.y.atan2(point.x) / (2.0 * std::f64::consts::PI);
    let u = if u < 0.0 { u + 1.0 } else { u };
    let v = point.z.clamp(-1.0, 1.0).acos() / std::f64::consts::PI;

    Vec2::new(u, v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_through_center() {
        let ray = Ray::new(Point::new(-5.0, 0.0, 0.0), geo::Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(get_t(&ray), Some(4.0));
    }

    #[test]
    fn test_miss() {
        let ray = Ray::new(Point::new(-5.0, 10.0, 0.0), geo::Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(get_t(&ray), None);
    }

    #[test]
    fn test_all_ts_even_on_hit() {
        let ray = Ray::new(Point::new(-5.0, 0.0, 0.0), geo::Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(get_all_ts(&ray).len(), 2);
    }
}
