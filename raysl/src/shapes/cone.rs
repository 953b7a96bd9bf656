use geo::{Normal, Point, Ray, Vec2};

/// Truncated cone: apex at `z = 1`, base disk of radius 1 at `z = 0`,
/// implicit surface `x^2 + y^2 = (1 - z)^2` for `z` in `[0, 1]`.
///
/// Earlier revisions of this kernel computed the lateral normal from the
/// un-normalized tangent cross-product, which happened to agree with the
/// analytic gradient everywhere except near the apex, where it flipped
/// sign inside CSG combination (PointLight renderer only, since Flat
/// doesn't re-orient normals). The gradient of the implicit surface,
/// `(x, y, 1 - z)`, is used here instead and has no such discontinuity.
fn lateral_ts(ray: &Ray) -> Vec<f64> {
    let ox = ray.origin.x;
    let oy = ray.origin.y;
    let oz = ray.origin.z;
    let dx = ray.dir.x;
    let dy = ray.dir.y;
    let dz = ray.dir.z;

    let a = dx * dx + dy * dy - dz * dz;
    let b = ox * dx + oy * dy + dz * (1.0 - oz);
    let c = ox * ox + oy * oy - (1.0 - oz).powi(2);

    let ts: Vec<f64> = if a.abs() < 1e-12 {
        if b.abs() < 1e-12 {
            vec![]
        } else {
            vec![-0.5 * c / b]
        }
    } else {
        let delta = b * b - a * c;
        if delta < 0.0 {
            return vec![];
        }
        let sqrt_delta = delta.sqrt();
        vec![(-b - sqrt_delta) / a, (-b + sqrt_delta) / a]
    };

    ts.into_iter()
        .filter(|&t| {
            let z = oz + t * dz;
            (0.0..=1.0).contains(&z)
        })
        .collect()
}

fn cap_ts(ray: &Ray) -> Vec<f64> {
    if ray.dir.z.abs() < 1e-12 {
        return vec![];
    }

    let t = -ray.origin.z / ray.dir.z;
    let x = ray.origin.x + t * ray.dir.x;
    let y = ray.origin.y + t * ray.dir.y;

    if x * x + y * y <= 1.0 {
        vec![t]
    } else {
        vec![]
    }
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
    } else {
        Normal::from_vec3(geo::Vec3::new(point.x, point.y, 1.0 - point.z))
    };

    n.facing(&ray.dir)
}

pub fn get_uv(point: Point) -> Vec2 {
    const EPS: f64 = 1e-6;

    if point.z < EPS {
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
    fn test_base_hit() {
        let ray = Ray::new(Point::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(get_t(&ray), Some(5.0));
    }

    #[test]
    fn test_apex_is_a_point() {
        let ray = Ray::new(Point::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        // enters through the apex (degenerate) and leaves through the base
        assert!(get_t(&ray).is_some());
    }

    #[test]
    fn test_all_ts_even_for_lateral_hit() {
        let ray = Ray::new(Point::new(-5.0, 0.0, 0.5), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(get_all_ts(&ray).len() % 2, 0);
    }
}
