use geo::{Normal, Point, Ray, Vec2};

const MIN: f64 = -1.0;
const MAX: f64 = 1.0;

/// Axis-aligned unit cube centered at the origin, extent `[-1, 1]` on
/// every axis (so an un-transformed cube has side length 2, matching the
/// un-transformed unit sphere's radius 1).
fn slabs(ray: &Ray) -> Option<(f64, f64)> {
    let mut tmin = f64::NEG_INFINITY;
    let mut tmax = f64::INFINITY;

    for (o, d, lo, hi) in [
        (ray.origin.x, ray.dir.x, MIN, MAX),
        (ray.origin.y, ray.dir.y, MIN, MAX),
        (ray.origin.z, ray.dir.z, MIN, MAX),
    ] {
        if d.abs() < 1e-12 {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }

        let mut t0 = (lo - o) / d;
        let mut t1 = (hi - o) / d;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }

        tmin = tmin.max(t0);
        tmax = tmax.min(t1);

        if tmin > tmax {
            return None;
        }
    }

    Some((tmin, tmax))
}

pub fn get_all_ts(ray: &Ray) -> Vec<f64> {
    slabs(ray).map_or_else(Vec::new, |(t0, t1)| vec![t0, t1])
}

pub fn get_t(ray: &Ray) -> Option<f64> {
    let (t0, t1) = slabs(ray)?;
    [t0, t1].into_iter().filter(|t| ray.is_within_domain(*t)).fold(None, |acc, t| Some(acc.map_or(t, |b: f64| b.min(t))))
}

pub fn get_normal(point: Point, ray: &Ray) -> Normal {
    const EPS: f64 = 1e-6;

    let n = if (point.x - MIN).abs() < EPS {
        Normal::new(-1.0, 0.0, 0.0)
    } else if (point.x - MAX).abs() < EPS {
        Normal::new(1.0, 0.0, 0.0)
    } else if (point.y - MIN).abs() < EPS {
        Normal::new(0.0, -1.0, 0.0)
    } else if (point.y - MAX).abs() < EPS {
        Normal::new(0.0, 1.0, 0.0)
    } else if (point.z - MIN).abs() < EPS {
        Normal::new(0.0, 0.0, -1.0)
    } else {
        Normal::new(0.0, 0.0, 1.0)
    };

    n.facing(&ray.dir)
}

/// Unfold each face into its own region of `[0, 1]^2`, keyed by which face
/// the point lies on.
pub fn get_uv(point: Point) -> Vec2 {
    const EPS: f64 = 1e-6;

    let u = (point.x + 1.0) / 2.0;
    let v = (point.y + 1.0) / 2.0;

    if (point.z - MAX).abs() < EPS {
        Vec2::new(u, v)
    } else if (point.z - MIN).abs() < EPS {
        Vec2::new(1.0 - u, v)
    } else {
        Vec2::new((point.y + 1.0) / 2.0, (point.z + 1.0) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_hit() {
        let ray = Ray::new(Point::new(-3.0, 0.0, 0.0), geo::Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(get_t(&ray), Some(2.0));
    }

    #[test]
    fn test_all_ts_even() {
        let ray = Ray::new(Point::new(-3.0, 0.0, 0.0), geo::Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(get_all_ts(&ray).len(), 2);
    }

    #[test]
    fn test_scaled_cube_matches_e4_scenario() {
        use geo::{Transformation, Vec3};

        let local_to_world = Transformation::scaling(Vec3::new(2.0, 2.0, 2.0));
        let world_ray = Ray::new(Point::new(-3.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let local_ray = world_ray.transform(&local_to_world.inverse());

        assert_eq!(get_t(&local_ray), Some(1.0));
    }
}
