use geo::{Normal, Point, Ray, Vec2};

/// Unit cylinder: radius 1 around the z axis, capped at `z = 0` and
/// `z = 1`.
fn lateral_ts(ray: &Ray) -> Vec<f64> {
    let ox = ray.origin.x;
    let oy = ray.origin.y;
    let dx = ray.dir.x;
    let dy = ray.dir.y;

    let a = dx * dx + dy * dy;
    if a < 1e-12 {
        return vec![];
    }

    let b = ox * dx + oy * dy;
    let c = ox * ox + oy * oy - 1.0;

    let delta = b * b - a * c;
    if delta < 0.0 {
        return vec![];
    }

    let sqrt_delta = delta.sqrt();
    [(-b - sqrt_delta) / a, (-b + sqrt_delta) / a]
        .into_iter()
        .filter(|&t| {
            let z = ray.origin.z + t * ray.dir.z;
            (0.0..=1.0).contains(&z)
        })
        .collect()
}

fn cap_ts(ray: &Ray) -> Vec<f64> {
    let mut ts = Vec::new();

    if ray.dir.z.abs() > 1e-12 {
        for cap_z in [0.0, 1.0] {
            let t = (cap_z - ray.origin.z) / ray.dir.z;
            let x = ray.origin.x + t * ray.dir.x;
            let y = ray.origin.y + t * ray.dir.y;
            if x * x + y * y <= 1.0 {
                ts.push(t);
            }
        }
    }

    ts
}

pub fn get_all_ts(ray: &Ray) -> Vec<f64> {
    let mut ts = lateral_ts(ray);
    ts.extend(cap_ts(ray));
    ts.sort_by(|a, b| a.partial_cmp(b).unwrap());
    ts
}

pub fn get_t(ray: &Ray) -> Option<f64> {
    get_all_ts(ray).into_iter().filter(|t| ray.is_within_domain(*t)).fold(None, |acc, t| {
        Some(acc.map_or(t, |b: f64| b.min(t)))
    })
}

pub fn get_normal(point: Point, ray: &Ray) -> Normal {
    const EPS: f64 = 1e-6;

    let n = if point.z < EPS {
        Normal::new(0.0, 0.0, -1.0)
    } else if point.z > 1.0 - EPS {
        Normal::new(0.0, 0.0, 1.0)
    } else {
        Normal::from_vec3(geo::Vec3::new(point.x, point.y, 0.0))
    };

    n.facing(&ray.dir)
}

pub fn get_uv(point: Point) -> Vec2 {
    const EPS: f64 = 1e-6;

    if point.z < EPS || point.z > 1.0 - EPS {
        Vec2::new((point.x + 1.0) / 2.0, (point.y + 1.0) / 2.0)
    } else {
        let u = point.y.atan2(point.x) / (2.0 * std::f64::consts::PI);
        let u = if u < 0.0 { u + 1.0 } else { u };
        Vec2::new(u, point.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Vec3;

    #[test]
    fn test_lateral_hit() {
        let ray = Ray::new(Point::new(-5.0, 0.0, 0.5), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(get_t(&ray), Some(4.0));
    }

    #[test]
    fn test_all_ts_even() {
        let ray = Ray::new(Point::new(-5.0, 0.0, 0.5), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(get_all_ts(&ray).len(), 2);
    }

    #[test]
    fn test_axial_hit_uses_caps() {
        let ray = Ray::new(Point::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(get_all_ts(&ray).len(), 2);
        assert_eq!(get_t(&ray), Some(5.0));
    }
}
