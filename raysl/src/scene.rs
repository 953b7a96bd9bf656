use std::collections::HashMap;

use geo::{Color, HdrImage, Pcg, Point, Transformation};

use crate::camera::Camera;
use crate::error::{SourceError, SourceLocation};
use crate::lexer::LiteralType;
use crate::material::{Brdf, Material, Pigment};
use crate::renderer::Renderer;
use crate::shapes::Shape;
use crate::tracer::TracerSettings;
use crate::world::{Lights, PointLight, World};

pub use crate::lexer::LiteralType as TypeTag;

/// Every value kind the IdTable/constructor grammar can produce, tagged by
/// `TypeTag` for lookups that already know the expected type.
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Point(Point),
    List(Vec<Value>),
    Color(Color),
    Transformation(Transformation),
    Material(Material),
    Brdf(Brdf),
    Pigment(Pigment),
    Shape(Shape),
    Light(PointLight),
    Image(HdrImage),
    Renderer(Renderer),
    Camera(Camera),
    Pcg(Pcg),
    Tracer(TracerSettings),
}

impl Value {
    /// The `TypeTag` this value should be filed under in the `IdTable`.
    /// Never called for `Value::Number`, which has no `LiteralType` of its
    /// own and is declared through `declare_number` instead.
    pub fn value_tag(&self) -> TypeTag {
        match self {
            Value::Number(_) => unreachable!("numbers are declared via declare_number, not declare"),
            Value::Point(_) => TypeTag::Point,
            Value::List(_) => TypeTag::List,
            Value::Color(_) => TypeTag::Color,
            Value::Transformation(_) => TypeTag::Transformation,
            Value::Material(_) => TypeTag::Material,
            Value::Brdf(_) => TypeTag::Brdf,
            Value::Pigment(_) => TypeTag::Pigment,
            Value::Shape(_) => TypeTag::Shape,
            Value::Light(_) => TypeTag::Light,
            Value::Image(_) => TypeTag::Image,
            Value::Renderer(_) => TypeTag::Renderer,
            Value::Camera(_) => TypeTag::Camera,
            Value::Pcg(_) => TypeTag::Pcg,
            Value::Tracer(_) => TypeTag::Tracer,
        }
    }

    /// Human-readable type name for `WrongValueType` diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Point(_) => TypeTag::Point.name(),
            Value::List(_) => TypeTag::List.name(),
            Value::Color(_) => TypeTag::Color.name(),
            Value::Transformation(_) => TypeTag::Transformation.name(),
            Value::Material(_) => TypeTag::Material.name(),
            Value::Brdf(_) => TypeTag::Brdf.name(),
            Value::Pigment(_) => TypeTag::Pigment.name(),
            Value::Shape(_) => TypeTag::Shape.name(),
            Value::Light(_) => TypeTag::Light.name(),
            Value::Image(_) => TypeTag::Image.name(),
            Value::Renderer(_) => TypeTag::Renderer.name(),
            Value::Camera(_) => TypeTag::Camera.name(),
            Value::Pcg(_) => TypeTag::Pcg.name(),
            Value::Tracer(_) => TypeTag::Tracer.name(),
        }
    }
}

/// A bucket of identifiers of one type, each mapping to its value and the
/// location of its declaring `SET`.
#[derive(Debug, Clone, Default)]
struct Bucket {
    entries: HashMap<String, (Value, SourceLocation)>,
}

/// Nested symbol table: `type_tag -> (name -> (value, decl_loc))`, plus a
/// dedicated numeric bucket since numbers have no `LiteralType` of their
/// own but still participate in identifier redefinition/shadowing and
/// math-expression lookups.
#[derive(Debug, Clone, Default)]
pub struct IdTable {
    numbers: HashMap<String, (f64, SourceLocation)>,
    buckets: HashMap<&'static str, Bucket>,
}

impl IdTable {
    pub fn new() -> Self {
        IdTable::default()
    }

    /// The type tag a name is currently registered under, if any — needed
    /// because the parser discovers identifiers before their declared
    /// type (`any_type_with` in the spec).
    pub fn any_type_with(&self, name: &str) -> Option<&'static str> {
        if self.numbers.contains_key(name) {
            return Some("Number");
        }
        self.buckets.iter().find(|(_, b)| b.entries.contains_key(name)).map(|(tag, _)| *tag)
    }

    fn check_redefinition(&self, name: &str, loc: &SourceLocation) -> Result<(), SourceError> {
        let existing_loc = self
            .numbers
            .get(name)
            .map(|(_, l)| l)
            .or_else(|| self.buckets.values().find_map(|b| b.entries.get(name).map(|(_, l)| l)));

        if let Some(existing_loc) = existing_loc {
            if !existing_loc.is_command_line() {
                return Err(SourceError::IdentifierRedefinition {
                    loc: loc.clone(),
                    name: name.to_string(),
                    previous: existing_loc.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn declare_number(&mut self, name: &str, value: f64, loc: SourceLocation) -> Result<(), SourceError> {
        self.check_redefinition(name, &loc)?;
        self.unset(name);
        self.numbers.insert(name.to_string(), (value, loc));
        Ok(())
    }

    pub fn declare(&mut self, tag: TypeTag, name: &str, value: Value, loc: SourceLocation) -> Result<(), SourceError> {
        self.check_redefinition(name, &loc)?;
        self.unset(name);
        self.buckets.entry(tag.name()).or_default().entries.insert(name.to_string(), (value, loc));
        Ok(())
    }

    pub fn unset(&mut self, name: &str) {
        self.numbers.remove(name);
        for bucket in self.buckets.values_mut() {
            bucket.entries.remove(name);
        }
    }

    pub fn lookup_number(&self, name: &str) -> Option<f64> {
        self.numbers.get(name).map(|(v, _)| *v)
    }

    pub fn lookup(&self, tag: TypeTag, name: &str) -> Option<&Value> {
        self.buckets.get(tag.name())?.entries.get(name).map(|(v, _)| v)
    }
}

/// Write-once Scene field: tracks the value plus the `SourceLocation` of
/// the `USING` that set it, so a second assignment can report
/// `SettingRedefinition` with the original site.
#[derive(Debug, Clone, Default)]
pub struct WriteOnce<T> {
    value: Option<(T, SourceLocation)>,
}

impl<T: Clone> WriteOnce<T> {
    pub fn set(&mut self, field: &str, value: T, loc: SourceLocation) -> Result<(), SourceError> {
        if let Some((_, previous)) = &self.value {
            return Err(SourceError::SettingRedefinition {
                loc,
                field: field.to_string(),
                previous: previous.clone(),
            });
        }
        self.value = Some((value, loc));
        Ok(())
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref().map(|(v, _)| v)
    }

    pub fn into_inner(self) -> Option<T> {
        self.value.map(|(v, _)| v)
    }
}

/// The fully assembled scene a parse produces: the symbol table (kept for
/// `DUMP`), the shape/light collections, and the write-once render
/// configuration fields.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub table: IdTable,
    pub world: World,
    pub lights: Lights,
    pub image: WriteOnce<HdrImage>,
    pub camera: WriteOnce<Camera>,
    pub renderer: WriteOnce<Renderer>,
    pub tracer: WriteOnce<TracerSettings>,
    pub time: f64,
}

impl Scene {
    pub fn new() -> Self {
        Scene::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: u32) -> SourceLocation {
        SourceLocation::new("test", line, 1)
    }

    #[test]
    fn test_command_line_declaration_is_shadowable() {
        let mut table = IdTable::new();
        table.declare_number("a", 1.0, SourceLocation::command_line()).unwrap();
        table.declare_number("a", 2.0, loc(1)).unwrap();

        assert_eq!(table.lookup_number("a"), Some(2.0));
    }

    #[test]
    fn test_script_redefinition_is_an_error() {
        let mut table = IdTable::new();
        table.declare_number("a", 1.0, loc(1)).unwrap();
        let err = table.declare_number("a", 2.0, loc(2)).unwrap_err();

        assert!(matches!(err, SourceError::IdentifierRedefinition { .. }));
    }

    #[test]
    fn test_unset_then_set_restores_fresh_binding() {
        let mut table = IdTable::new();
        table.declare_number("a", 1.0, loc(1)).unwrap();
        table.unset("a");
        table.declare_number("a", 2.0, loc(2)).unwrap();

        assert_eq!(table.lookup_number("a"), Some(2.0));
    }

    #[test]
    fn test_set_then_unset_is_a_noop_on_lookup() {
        let mut table = IdTable::new();
        table.declare_number("a", 1.0, loc(1)).unwrap();
        table.unset("a");

        assert_eq!(table.lookup_number("a"), None);
    }

    #[test]
    fn test_write_once_rejects_second_assignment() {
        let mut camera: WriteOnce<Camera> = WriteOnce::default();
        camera.set("camera", Camera::default(), loc(1)).unwrap();
        let err = camera.set("camera", Camera::default(), loc(2)).unwrap_err();

        assert!(matches!(err, SourceError::SettingRedefinition { .. }));
    }
}
