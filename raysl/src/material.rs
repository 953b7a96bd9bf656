use rand::Rng;

use geo::{Color, HdrImage, Normal, Ray, Vec2, Vec3};

/// A surface-coloring function defined over `uv` coordinates, evaluated
/// at hit time to modulate a BRDF's reflectance.
#[derive(Debug, Clone, PartialEq)]
pub enum Pigment {
    Uniform(Color),
    Checkered { n: u32, color_on: Color, color_off: Color },
    Image(HdrImage),
}

impl Pigment {
    pub fn uniform_white() -> Self {
        Pigment::Uniform(Color::white())
    }

    pub fn get_color(&self, uv: Vec2) -> Color {
        match self {
            Pigment::Uniform(c) => *c,
            Pigment::Checkered { n, color_on, color_off } => {
                let u = (uv.u * f64::from(*n)).floor() as i64;
                let v = (uv.v * f64::from(*n)).floor() as i64;
                if (u + v) % 2 == 0 {
                    *color_on
                } else {
                    *color_off
                }
            }
            Pigment::Image(img) => {
                let mut x = (uv.u * f64::from(img.width())) as u32;
                let mut y = (uv.v * f64::from(img.height())) as u32;
                x = x.min(img.width().saturating_sub(1));
                y = y.min(img.height().saturating_sub(1));
                img.get(x, y)
            }
        }
    }
}

/// Default threshold (in radians) below which `Brdf::Specular` treats the
/// outgoing direction as coincident with the perfect mirror reflection.
pub const DEFAULT_SPECULAR_THRESHOLD_RAD: f64 = 0.001745;

/// How a surface scatters light. Each variant both evaluates the BRDF for
/// a fixed `(in, out)` direction pair and importance-samples a scattered
/// ray so path tracing converges quickly.
#[derive(Debug, Clone, PartialEq)]
pub enum Brdf {
    Diffuse(Pigment),
    Specular(Pigment, f64),
}

impl Brdf {
    pub fn pigment(&self) -> &Pigment {
        match self {
            Brdf::Diffuse(p) | Brdf::Specular(p, _) => p,
        }
    }

    /// Evaluate the BRDF value for the given geometry and surface
    /// coordinate.
    pub fn eval(&self, normal: Normal, in_dir: Vec3, out_dir: Vec3, uv: Vec2) -> Color {
        match self {
            Brdf::Diffuse(pigment) => pigment.get_color(uv) * (1.0 / std::f32::consts::PI),
            Brdf::Specular(pigment, threshold) => {
                let theta_in = normal.to_vec3().normalized().dot(&in_dir.normalized()).acos();
                let theta_out = normal.to_vec3().normalized().dot(&out_dir.normalized()).acos();
                if (theta_in - theta_out).abs() < *threshold {
                    pigment.get_color(uv)
                } else {
                    Color::black()
                }
            }
        }
    }

    /// Importance-sample a scattered ray given the incoming ray, the hit
    /// point/normal, and the per-thread RNG.
    pub fn scatter_ray(&self, incoming: &Ray, hit_point: geo::Point, normal: Normal, rng: &mut impl Rng, depth: u32) -> Ray {
        match self {
            Brdf::Diffuse(_) => {
                let n = normal.facing(&incoming.dir).to_vec3();
                let dir = n.random_cosine_hemisphere(rng);
                Ray::new(hit_point, dir).with_depth(depth)
            }
            Brdf::Specular(..) => {
                let n = normal.facing(&incoming.dir).to_vec3();
                let incoming_dir = incoming.dir.normalized();
                let reflected = incoming_dir - n * (2.0 * incoming_dir.dot(&n));
                Ray::new(hit_point, reflected).with_depth(depth)
            }
        }
    }
}

/// A shape's full appearance: how it scatters incoming light, and how
/// much it emits on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub brdf: Brdf,
    pub emitted_radiance: Pigment,
}

impl Material {
    pub fn new(brdf: Brdf, emitted_radiance: Pigment) -> Self {
        Material { brdf, emitted_radiance }
    }
}

impl Default for Material {
    fn default() -> Self {
        Material::new(Brdf::Diffuse(Pigment::uniform_white()), Pigment::Uniform(Color::black()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkered_alternates() {
        let p = Pigment::Checkered { n: 2, color_on: Color::white(), color_off: Color::black() };

        assert_eq!(p.get_color(Vec2::new(0.1, 0.1)), Color::white());
        assert_eq!(p.get_color(Vec2::new(0.6, 0.1)), Color::black());
        assert_eq!(p.get_color(Vec2::new(0.6, 0.6)), Color::white());
    }

    #[test]
    fn test_diffuse_eval_is_constant() {
        let brdf = Brdf::Diffuse(Pigment::Uniform(Color::new(1.0, 1.0, 1.0)));
        let n = Normal::new(0.0, 0.0, 1.0);

        let c1 = brdf.eval(n, Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 1.0, 1.0), Vec2::new(0.0, 0.0));
        let c2 = brdf.eval(n, Vec3::new(1.0, 0.0, 1.0), Vec3::new(-1.0, 0.0, 1.0), Vec2::new(0.0, 0.0));

        assert!(c1.is_close(&c2, 1e-6));
    }
}
