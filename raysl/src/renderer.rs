use geo::{Color, Pcg, Ray};

use crate::world::{Lights, World};

/// Ambient term added by `Renderer::PointLight` on top of direct
/// illumination, so fully shadowed surfaces are never pure black.
pub const DEFAULT_AMBIENT_COLOR: Color = Color { r: 1e-3, g: 1e-3, b: 1e-3 };

/// A `(Ray) -> Color` integrator, parameterized by the configuration each
/// variant accepts in the scene language. `call` takes the per-thread RNG
/// explicitly — the renderer never owns mutable state of its own, so the
/// same `Renderer` value can be shared read-only across tile workers.
#[derive(Debug, Clone, PartialEq)]
pub enum Renderer {
    OnOff { on_color: Color, off_color: Color },
    Flat { background_color: Color },
    PointLight { background_color: Color, ambient_color: Color },
    PathTracer { background_color: Color, rng: Pcg, n: u32, max_depth: u32, roulette_depth: u32 },
}

impl Renderer {
    pub fn on_off(on_color: Color, off_color: Color) -> Self {
        Renderer::OnOff { on_color, off_color }
    }

    pub fn flat(background_color: Color) -> Self {
        Renderer::Flat { background_color }
    }

    pub fn point_light(background_color: Color, ambient_color: Color) -> Self {
        Renderer::PointLight { background_color, ambient_color }
    }

    pub fn path_tracer(background_color: Color, rng: Pcg, n: u32, max_depth: u32, roulette_depth: u32) -> Self {
        Renderer::PathTracer { background_color, rng, n, max_depth, roulette_depth }
    }

    pub fn background_color(&self) -> Color {
        match self {
            Renderer::OnOff { off_color, .. } => *off_color,
            Renderer::Flat { background_color } => *background_color,
            Renderer::PointLight { background_color, .. } => *background_color,
            Renderer::PathTracer { background_color, .. } => *background_color,
        }
    }

    pub fn call(&self, ray: &Ray, world: &World, lights: &Lights, rng: &mut Pcg) -> Color {
        match self {
            Renderer::OnOff { on_color, off_color } => {
                if world.quick_ray_intersection(ray) {
                    *on_color
                } else {
                    *off_color
                }
            }
            Renderer::Flat { background_color } => match world.ray_intersection(ray) {
                None => *background_color,
                Some(hit) => {
                    let pigment_color = hit.material.brdf.pigment().get_color(hit.uv);
                    let emitted = hit.material.emitted_radiance.get_color(hit.uv);
                    pigment_color + emitted
                }
            },
            Renderer::PointLight { background_color, ambient_color } => match world.ray_intersection(ray) {
                None => *background_color,
                Some(hit) => {
                    let mut result = hit.material.emitted_radiance.get_color(hit.uv) + *ambient_color;

                    for light in lights.iter() {
                        let light_dir = (light.position - hit.world_point).normalized();
                        let distance = light.position.dist(&hit.world_point);

                        let mut shadow_ray = Ray::new(hit.world_point, light_dir);
                        shadow_ray.tmax = distance - shadow_ray.tmin;

                        if world.quick_ray_intersection(&shadow_ray) {
                            continue;
                        }

                        let distance_factor = if light.linear_radius > 0.0 {
                            1.0 / (1.0 + (distance / light.linear_radius).powi(2))
                        } else {
                            1.0
                        };

                        let cos_theta = hit.normal.dot(&light_dir).max(0.0) as f32;
                        let brdf_color = hit.material.brdf.eval(
                            hit.normal,
                            light_dir,
                            -hit.ray.dir,
                            hit.uv,
                        );

                        result += brdf_color * light.color * (cos_theta * distance_factor as f32);
                    }

                    result
                }
            },
            Renderer::PathTracer { background_color, n, max_depth, roulette_depth, .. } => {
                self.path_trace(ray, world, *n, *max_depth, *roulette_depth, *background_color, rng)
            }
        }
    }

    fn path_trace(
        &self,
        ray: &Ray,
        world: &World,
        n: u32,
        max_depth: u32,
        roulette_depth: u32,
        background_color: Color,
        rng: &mut Pcg,
    ) -> Color {
        if ray.depth >= max_depth {
            return Color::black();
        }

        let hit = match world.ray_intersection(ray) {
            None => return background_color,
            Some(hit) => hit,
        };

        let emitted = hit.material.emitted_radiance.get_color(hit.uv);

        let mut hit_color = hit.material.brdf.pigment().get_color(hit.uv);
        let channel_max = hit_color.r.max(hit_color.g).max(hit_color.b);

        if ray.depth >= roulette_depth {
            let survival_p = channel_max.clamp(0.0, 0.99);
            if rng.random_f64() as f32 > survival_p {
                return emitted;
            }
            hit_color *= 1.0 / survival_p;
        }

        let samples = if ray.depth == 0 { n } else { 1 };
        if samples == 0 {
            return emitted;
        }

        let mut accumulated = Color::black();
        for _ in 0..samples {
            let scattered = hit.material.brdf.scatter_ray(
                &hit.ray,
                hit.world_point,
                hit.normal,
                rng,
                ray.depth + 1,
            );
            let incoming = self.path_trace(&scattered, world, n, max_depth, roulette_depth, background_color, rng);
            accumulated += hit_color * incoming;
        }

        emitted + accumulated * (1.0 / samples as f32)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer::on_off(Color::white(), Color::black())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use crate::shapes::{Instance, Shape};
    use geo::{Point, Transformation, Vec3};

    fn world_with_one_sphere() -> World {
        let mut world = World::new();
        world.push(Shape::Sphere(Instance::new(Transformation::identity(), Material::default())));
        world
    }

    #[test]
    fn test_on_off_reports_hit_or_miss() {
        let renderer = Renderer::on_off(Color::white(), Color::black());
        let world = world_with_one_sphere();
        let lights = Lights::new();
        let mut rng = Pcg::default_seed();

        let hit_ray = Ray::new(Point::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let miss_ray = Ray::new(Point::new(-5.0, 10.0, 0.0), Vec3::new(1.0, 0.0, 0.0));

        assert_eq!(renderer.call(&hit_ray, &world, &lights, &mut rng), Color::white());
        assert_eq!(renderer.call(&miss_ray, &world, &lights, &mut rng), Color::black());
    }

    #[test]
    fn test_flat_returns_background_on_miss() {
        let renderer = Renderer::flat(Color::new(0.1, 0.2, 0.3));
        let world = World::new();
        let lights = Lights::new();
        let mut rng = Pcg::default_seed();

        let ray = Ray::new(Point::origin(), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(renderer.call(&ray, &world, &lights, &mut rng), Color::new(0.1, 0.2, 0.3));
    }

    #[test]
    fn test_path_tracer_terminates_at_max_depth() {
        let renderer = Renderer::path_tracer(Color::black(), Pcg::default_seed(), 1, 0, 3);
        let world = world_with_one_sphere();
        let lights = Lights::new();
        let mut rng = Pcg::default_seed();

        let ray = Ray::new(Point::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(renderer.call(&ray, &world, &lights, &mut rng), Color::black());
    }
}
