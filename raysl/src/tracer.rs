use rayon::prelude::*;

use geo::{Color, HdrImage, Pcg};

use crate::camera::Camera;
use crate::renderer::Renderer;
use crate::world::{Lights, World};

/// Tracer configuration from the scene language's `Tracer` constructor:
/// how finely each pixel is stratified, and the base RNG every tile
/// stream is derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct TracerSettings {
    pub samples_per_side: u32,
    pub rng: Pcg,
}

impl TracerSettings {
    pub fn new(samples_per_side: u32, rng: Pcg) -> Self {
        TracerSettings { samples_per_side, rng }
    }
}

impl Default for TracerSettings {
    fn default() -> Self {
        TracerSettings::new(1, Pcg::default_seed())
    }
}

/// Drives a `Renderer` over every pixel of an `HdrImage`, anti-aliasing
/// with a stratified sample grid and dispatching rows to a `rayon` thread
/// pool. Each row gets its own PCG stream, derived deterministically from
/// the tracer's base seed and the row index, so the image is bit-identical
/// regardless of how many threads render it.
pub struct ImageTracer<'a> {
    pub world: &'a World,
    pub lights: &'a Lights,
    pub camera: &'a Camera,
    pub renderer: &'a Renderer,
    pub settings: &'a TracerSettings,
}

impl<'a> ImageTracer<'a> {
    pub fn new(world: &'a World, lights: &'a Lights, camera: &'a Camera, renderer: &'a Renderer, settings: &'a TracerSettings) -> Self {
        ImageTracer { world, lights, camera, renderer, settings }
    }

    /// Render into `image`, overwriting every pixel. Rows are processed in
    /// parallel; each worker only ever writes the row(s) it was handed.
    pub fn render(&self, image: &mut HdrImage) {
        let width = image.width();
        let height = image.height();
        let samples = self.settings.samples_per_side.max(1);
        let base_rng = &self.settings.rng;

        log::info!("tracing {width}x{height} image, {}x{} samples/pixel", samples, samples);

        let rows: Vec<Vec<Color>> = (0..height)
            .into_par_iter()
            .map(|y| {
                let mut row_rng = base_rng.derive_stream(u64::from(y));
                let mut row = Vec::with_capacity(width as usize);
                for x in 0..width {
                    row.push(self.sample_pixel(x, y, width, height, samples, &mut row_rng));
                }
                log::debug!("row {y} done");
                row
            })
            .collect();

        for (y, row) in rows.into_iter().enumerate() {
            for (x, color) in row.into_iter().enumerate() {
                image.set(x as u32, y as u32, color);
            }
        }
    }

    fn sample_pixel(&self, x: u32, y: u32, width: u32, height: u32, samples: u32, rng: &mut Pcg) -> Color {
        let mut accumulated = Color::black();

        for i in 0..samples {
            for j in 0..samples {
                let u = (f64::from(x) + (f64::from(i) + rng.random_f64()) / f64::from(samples)) / f64::from(width);
                let v = 1.0 - (f64::from(y) + (f64::from(j) + rng.random_f64()) / f64::from(samples)) / f64::from(height);

                let ray = self.camera.fire_ray(u, v);
                accumulated += self.renderer.call(&ray, self.world, self.lights, rng);
            }
        }

        accumulated * (1.0_f32 / (samples * samples) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use crate::shapes::{Instance, Shape};
    use geo::Transformation;

    #[test]
    fn test_render_is_deterministic_across_runs() {
        let mut world = World::new();
        world.push(Shape::Sphere(Instance::new(Transformation::identity(), Material::default())));
        let lights = Lights::new();
        let camera = Camera::default();
        let renderer = Renderer::on_off(Color::white(), Color::black());
        let settings = TracerSettings::new(2, Pcg::default_seed());

        let mut img1 = HdrImage::new(4, 4);
        ImageTracer::new(&world, &lights, &camera, &renderer, &settings).render(&mut img1);

        let mut img2 = HdrImage::new(4, 4);
        ImageTracer::new(&world, &lights, &camera, &renderer, &settings).render(&mut img2);

        assert_eq!(img1, img2);
    }
}
