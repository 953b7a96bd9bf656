use geo::{Point, Ray, Transformation, Vec3};

/// Maps a `(u, v) ∈ [0, 1]²` screen coordinate to a world-space `Ray`. The
/// camera looks down `+x` in its own local frame before `transformation`
/// is applied; `v = 0` is the bottom of the screen, `u = 0` is the left.
#[derive(Debug, Clone, PartialEq)]
pub enum Camera {
    Orthogonal { aspect_ratio: f64, transformation: Transformation },
    Perspective { aspect_ratio: f64, transformation: Transformation, screen_distance: f64 },
}

impl Camera {
    pub fn orthogonal(aspect_ratio: f64, transformation: Transformation) -> Self {
        Camera::Orthogonal { aspect_ratio, transformation }
    }

    pub fn perspective(aspect_ratio: f64, transformation: Transformation, screen_distance: f64) -> Self {
        Camera::Perspective { aspect_ratio, transformation, screen_distance }
    }

    pub fn fire_ray(&self, u: f64, v: f64) -> Ray {
        match self {
            Camera::Orthogonal { aspect_ratio, transformation } => {
                let origin = Point::new(-1.0, (1.0 - 2.0 * u) * aspect_ratio, 2.0 * v - 1.0);
                let dir = Vec3::new(1.0, 0.0, 0.0);

                Ray::new(transformation.apply_point(origin), transformation.apply_vec(dir))
            }
            Camera::Perspective { aspect_ratio, transformation, screen_distance } => {
                let origin = Point::new(-screen_distance, 0.0, 0.0);
                let dir = Vec3::new(*screen_distance, (1.0 - 2.0 * u) * aspect_ratio, 2.0 * v - 1.0);

                Ray::new(transformation.apply_point(origin), transformation.apply_vec(dir))
            }
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Camera::orthogonal(1.0, Transformation::identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orthogonal_rays_are_parallel() {
        let cam = Camera::orthogonal(2.0, Transformation::identity());

        let r1 = cam.fire_ray(0.0, 0.0);
        let r2 = cam.fire_ray(1.0, 1.0);

        assert_eq!(r1.dir, r2.dir);
        assert_ne!(r1.origin, r2.origin);
    }

    #[test]
    fn test_perspective_rays_diverge_from_eye() {
        let cam = Camera::perspective(1.0, Transformation::identity(), 1.0);

        let r1 = cam.fire_ray(0.0, 0.0);
        let r2 = cam.fire_ray(1.0, 1.0);

        assert_eq!(r1.origin, r2.origin);
        assert_ne!(r1.dir, r2.dir);
    }

    #[test]
    fn test_center_of_screen_points_down_x() {
        let cam = Camera::perspective(1.0, Transformation::identity(), 1.0);
        let r = cam.fire_ray(0.5, 0.5);

        assert!(r.dir.y.abs() < 1e-9);
        assert!(r.dir.z.abs() < 1e-9);
    }
}
