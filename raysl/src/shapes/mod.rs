pub mod cone;
pub mod csg;
pub mod cube;
pub mod cylinder;
pub mod plane;
pub mod sphere;

use std::sync::Arc;

use geo::{Ray, Transformation};

use crate::error::ShapeAlgebraError;
use crate::hit::HitRecord;
use crate::material::Material;

pub use csg::{Csg, Rule};

/// A simple shape instance: a unit-shape kernel wrapped by a
/// `Transformation` and a `Material`. Shared across `Arc` so a `Shape`
/// value is cheap to clone into `World`/`IdTable`.
#[derive(Debug, Clone)]
pub struct Instance {
    pub transformation: Transformation,
    pub material: Arc<Material>,
}

impl Instance {
    pub fn new(transformation: Transformation, material: Material) -> Self {
        Instance { transformation, material: Arc::new(material) }
    }
}

impl Default for Instance {
    fn default() -> Self {
        Instance::new(Transformation::identity(), Material::default())
    }
}

/// The full shape sum type: the five simple shapes plus arbitrarily deep
/// CSG composites.
#[derive(Debug, Clone)]
pub enum Shape {
    Sphere(Instance),
    Plane(Instance),
    Cube(Instance),
    Cylinder(Instance),
    Cone(Instance),
    Csg(Box<Csg>),
}

impl Shape {
    /// Whether this shape is closed (produces an even number of boundary
    /// crossings for every ray) and therefore usable as a CSG operand.
    pub fn is_closed(&self) -> bool {
        !matches!(self, Shape::Plane(_))
    }

    fn instance(&self) -> Option<&Instance> {
        match self {
            Shape::Sphere(i) | Shape::Cube(i) | Shape::Cylinder(i) | Shape::Cone(i) | Shape::Plane(i) => Some(i),
            Shape::Csg(_) => None,
        }
    }

    /// Nearest hit within the ray's `[tmin, tmax]` domain, or `None`.
    pub fn ray_intersection(&self, ray: &Ray) -> Option<HitRecord> {
        match self {
            Shape::Csg(csg) => csg.ray_intersection(ray),
            _ => {
                let instance = self.instance().expect("simple shape always has an instance");
                let local_ray = ray.transform(&instance.transformation.inverse());

                let t = match self {
                    Shape::Sphere(_) => sphere::get_t(&local_ray),
                    Shape::Plane(_) => plane::get_t(&local_ray),
                    Shape::Cube(_) => cube::get_t(&local_ray),
                    Shape::Cylinder(_) => cylinder::get_t(&local_ray),
                    Shape::Cone(_) => cone::get_t(&local_ray),
                    Shape::Csg(_) => unreachable!(),
                }?;

                Some(self.build_hit(ray, &local_ray, t, instance))
            }
        }
    }

    /// Whether any hit exists within the ray's domain. Named after the
    /// capability the original polymorphic shape surface exposed; the
    /// correct return value is "any hit exists" (not its negation).
    pub fn quick_ray_intersection(&self, ray: &Ray) -> bool {
        self.ray_intersection(ray).is_some()
    }

    /// All boundary crossings of `ray` against this shape, even those
    /// outside `ray`'s `[tmin, tmax]` domain. Used by the CSG interval
    /// algebra. Always even-length for closed shapes.
    pub fn all_ray_intersections(&self, ray: &Ray) -> Result<Vec<f64>, ShapeAlgebraError> {
        match self {
            Shape::Plane(_) => Err(ShapeAlgebraError::NonClosedOperand),
            Shape::Csg(csg) => csg.all_ray_intersections(ray),
            _ => {
                let instance = self.instance().expect("simple shape always has an instance");
                let local_ray = ray.transform(&instance.transformation.inverse());

                let ts = match self {
                    Shape::Sphere(_) => sphere::get_all_ts(&local_ray),
                    Shape::Cube(_) => cube::get_all_ts(&local_ray),
                    Shape::Cylinder(_) => cylinder::get_all_ts(&local_ray),
                    Shape::Cone(_) => cone::get_all_ts(&local_ray),
                    Shape::Plane(_) | Shape::Csg(_) => unreachable!(),
                };

                if ts.len() % 2 != 0 {
                    return Err(ShapeAlgebraError::OddHitCount(ts.len()));
                }
                Ok(ts)
            }
        }
    }

    /// Build the `HitRecord` for this shape at an already-known-valid `t`
    /// (bypassing `ray`'s `[tmin, tmax]` domain check). Used by CSG nodes,
    /// which pick `t` from their own interval algebra rather than from a
    /// sub-shape's own nearest-hit query.
    pub(crate) fn hit_at(&self, ray: &Ray, t: f64) -> HitRecord {
        match self {
            Shape::Csg(csg) => csg.hit_at(ray, t),
            _ => {
                let instance = self.instance().expect("simple shape always has an instance");
                let local_ray = ray.transform(&instance.transformation.inverse());
                self.build_hit(ray, &local_ray, t, instance)
            }
        }
    }

    fn build_hit(&self, world_ray: &Ray, local_ray: &Ray, t: f64, instance: &Instance) -> HitRecord {
        let local_point = local_ray.point_at(t);

        let (local_normal, uv) = match self {
            Shape::Sphere(_) => (sphere::get_normal(local_point, local_ray), sphere::get_uv(local_point)),
            Shape::Plane(_) => (plane::get_normal(local_point, local_ray), plane::get_uv(local_point)),
            Shape::Cube(_) => (cube::get_normal(local_point, local_ray), cube::get_uv(local_point)),
            Shape::Cylinder(_) => (cylinder::get_normal(local_point, local_ray), cylinder::get_uv(local_point)),
            Shape::Cone(_) => (cone::get_normal(local_point, local_ray), cone::get_uv(local_point)),
            Shape::Csg(_) => unreachable!(),
        };

        let world_normal = instance.transformation.apply_normal(local_normal).facing(&world_ray.dir);
        let world_point = world_ray.point_at(t);

        HitRecord::new(world_point, world_normal, uv, t, world_ray.clone(), Arc::clone(&instance.material))
    }
}
