use std::cmp::Ordering;
use std::sync::Arc;

use geo::{Normal, Point, Ray, Vec2};

use crate::material::Material;

/// The result of a successful ray/shape intersection: where it happened,
/// the surface normal facing against the incoming ray, the surface
/// coordinates, the parameter that produced it, the ray that caused it,
/// and the material of the shape that was hit.
#[derive(Debug, Clone)]
pub struct HitRecord {
    pub world_point: Point,
    pub normal: Normal,
    pub uv: Vec2,
    pub t: f64,
    pub ray: Ray,
    pub material: Arc<Material>,
}

impl HitRecord {
    pub fn new(world_point: Point, normal: Normal, uv: Vec2, t: f64, ray: Ray, material: Arc<Material>) -> Self {
        HitRecord { world_point, normal, uv, t, ray, material }
    }
}

impl PartialEq for HitRecord {
    fn eq(&self, other: &Self) -> bool {
        self.t == other.t
    }
}

impl PartialOrd for HitRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.t.partial_cmp(&other.t)
    }
}
