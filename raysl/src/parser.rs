use std::fs::File;
use std::io::{BufReader, Write};

use geo::{Color, HdrImage, Mat4, Pcg, Point, Transformation, Vec3};

use crate::camera::Camera;
use crate::error::{ShapeAlgebraError, SourceError, SourceLocation};
use crate::lexer::{Command, Lexer, LiteralType, TokenKind};
use crate::material::{Brdf, Material, Pigment, DEFAULT_SPECULAR_THRESHOLD_RAD};
use crate::mathexpr;
use crate::renderer::{Renderer, DEFAULT_AMBIENT_COLOR};
use crate::scene::{Scene, Value};
use crate::shapes::{Csg, Instance, Rule, Shape};
use crate::tracer::TracerSettings;
use crate::world::PointLight;

/// Tracks which positional slots of a keyword-argument constructor have
/// been filled, enforcing the contract from the spec's named-constructor
/// grammar: positional arguments fill slots in order, only before the
/// first keyword; a keyword naming an already-filled slot or naming
/// nothing at all is `InvalidKeyword`.
struct KeywordCursor {
    fields: &'static [&'static str],
    filled: Vec<bool>,
    next_positional: usize,
}

impl KeywordCursor {
    fn new(fields: &'static [&'static str]) -> Self {
        KeywordCursor { filled: vec![false; fields.len()], fields, next_positional: 0 }
    }

    fn positional(&mut self, loc: &SourceLocation, context: &str) -> Result<usize, SourceError> {
        while self.next_positional < self.filled.len() && self.filled[self.next_positional] {
            self.next_positional += 1;
        }
        if self.next_positional >= self.filled.len() {
            return Err(SourceError::InvalidKeyword {
                loc: loc.clone(),
                keyword: "<positional>".to_string(),
                context: context.to_string(),
            });
        }
        let idx = self.next_positional;
        self.filled[idx] = true;
        self.next_positional += 1;
        Ok(idx)
    }

    fn keyword(&mut self, name: &str, loc: &SourceLocation, context: &str) -> Result<usize, SourceError> {
        let idx = self
            .fields
            .iter()
            .position(|f| *f == name)
            .ok_or_else(|| SourceError::InvalidKeyword { loc: loc.clone(), keyword: name.to_string(), context: context.to_string() })?;

        if self.filled[idx] {
            return Err(SourceError::InvalidKeyword { loc: loc.clone(), keyword: name.to_string(), context: context.to_string() });
        }
        self.filled[idx] = true;
        Ok(idx)
    }
}

/// Recursive-descent parser over a `Lexer`'s token stream, with one token
/// of look-ahead (delegated to the lexer's own push-back). Mutates the
/// `Scene` it is given as commands are processed.
pub struct Parser<'a> {
    lexer: Lexer,
    scene: &'a mut Scene,
}

impl<'a> Parser<'a> {
    pub fn new(source: &str, source_name: &str, scene: &'a mut Scene) -> Self {
        Parser { lexer: Lexer::new(source, source_name), scene }
    }

    fn next_token(&mut self) -> Result<crate::lexer::Token, SourceError> {
        self.lexer.next_token()
    }

    fn peek_token(&mut self) -> Result<crate::lexer::Token, SourceError> {
        let tok = self.lexer.next_token()?;
        self.lexer.unread_token(tok.clone());
        Ok(tok)
    }

    fn expect_symbol(&mut self, expected: char) -> Result<SourceLocation, SourceError> {
        let tok = self.next_token()?;
        match tok.kind {
            TokenKind::Symbol(c) if c == expected => Ok(tok.loc),
            other => Err(SourceError::WrongTokenType {
                loc: tok.loc,
                expected: format!("symbol {expected:?}"),
                found: other.describe(),
            }),
        }
    }

    fn peek_is_symbol(&mut self, expected: char) -> Result<bool, SourceError> {
        let tok = self.peek_token()?;
        Ok(matches!(tok.kind, TokenKind::Symbol(c) if c == expected))
    }

    fn expect_keyword(&mut self) -> Result<(String, SourceLocation), SourceError> {
        let tok = self.next_token()?;
        match tok.kind {
            TokenKind::Keyword(k) => Ok((k, tok.loc)),
            other => Err(SourceError::WrongTokenType { loc: tok.loc, expected: "a .keyword".to_string(), found: other.describe() }),
        }
    }

    fn expect_identifier(&mut self) -> Result<(String, SourceLocation), SourceError> {
        let tok = self.next_token()?;
        match tok.kind {
            TokenKind::Identifier(n) => Ok((n, tok.loc)),
            other => Err(SourceError::WrongTokenType { loc: tok.loc, expected: "an identifier".to_string(), found: other.describe() }),
        }
    }

    fn expect_string(&mut self) -> Result<(String, SourceLocation), SourceError> {
        let tok = self.next_token()?;
        match tok.kind {
            TokenKind::Str(s) => Ok((s, tok.loc)),
            other => Err(SourceError::WrongTokenType { loc: tok.loc, expected: "a string".to_string(), found: other.describe() }),
        }
    }

    /// Attempt identifier substitution for `tag`: if the next token is an
    /// identifier registered under `tag`, consume it and return its value.
    fn try_identifier(&mut self, tag: LiteralType) -> Result<Option<Value>, SourceError> {
        let tok = self.peek_token()?;
        if let TokenKind::Identifier(name) = &tok.kind {
            if self.scene.table.any_type_with(name) == Some(tag.name()) {
                self.next_token()?;
                let value = self.scene.table.lookup(tag, name).cloned().expect("any_type_with confirmed presence");
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    // ------------------------------------------------------------------
    // Numbers / math expressions
    // ------------------------------------------------------------------

    fn parse_number_value(&mut self) -> Result<f64, SourceError> {
        let tok = self.next_token()?;
        match tok.kind {
            TokenKind::Number(n) => Ok(n),
            TokenKind::MathExpr(body) => mathexpr::eval(&body, &tok.loc, &self.scene.table)?.as_number(&tok.loc),
            TokenKind::Identifier(name) => self
                .scene
                .table
                .lookup_number(&name)
                .ok_or_else(|| SourceError::UndefinedIdentifier { loc: tok.loc.clone(), name }),
            other => Err(SourceError::WrongTokenType { loc: tok.loc, expected: "a number".to_string(), found: other.describe() }),
        }
    }

    // ------------------------------------------------------------------
    // Color
    // ------------------------------------------------------------------

    pub fn parse_color(&mut self) -> Result<Color, SourceError> {
        if let Some(v) = self.try_identifier(LiteralType::Color)? {
            return match v {
                Value::Color(c) => Ok(c),
                other => Err(self.wrong_value_type("Color", &other)),
            };
        }

        let tok = self.next_token()?;
        match tok.kind {
            TokenKind::Symbol('<') => {
                let r = self.parse_number_value()?;
                self.expect_symbol(',')?;
                let g = self.parse_number_value()?;
                self.expect_symbol(',')?;
                let b = self.parse_number_value()?;
                self.expect_symbol('>')?;
                Ok(Color::new(r as f32, g as f32, b as f32))
            }
            TokenKind::LiteralType(LiteralType::Color) => self.parse_color_named(),
            TokenKind::MathExpr(body) => mathexpr::eval(&body, &tok.loc, &self.scene.table)?.as_color(&tok.loc),
            other => Err(SourceError::WrongTokenType { loc: tok.loc, expected: "a Color".to_string(), found: other.describe() }),
        }
    }

    fn parse_color_named(&mut self) -> Result<Color, SourceError> {
        self.expect_symbol('(')?;
        let mut cursor = KeywordCursor::new(&["R", "G", "B"]);
        let mut vals = [0.0_f64; 3];

        while !self.peek_is_symbol(')')? {
            let tok = self.peek_token()?;
            let idx = match &tok.kind {
                TokenKind::Keyword(name) => {
                    let idx = cursor.keyword(name, &tok.loc, "Color")?;
                    self.next_token()?;
                    idx
                }
                _ => cursor.positional(&tok.loc, "Color")?,
            };
            vals[idx] = self.parse_number_value()?;
            if self.peek_is_symbol(',')? {
                self.next_token()?;
            } else {
                break;
            }
        }
        self.expect_symbol(')')?;
        Ok(Color::new(vals[0] as f32, vals[1] as f32, vals[2] as f32))
    }

    // ------------------------------------------------------------------
    // Point
    // ------------------------------------------------------------------

    pub fn parse_point(&mut self) -> Result<Point, SourceError> {
        if let Some(v) = self.try_identifier(LiteralType::Point)? {
            return match v {
                Value::Point(p) => Ok(p),
                other => Err(self.wrong_value_type("Point", &other)),
            };
        }

        let tok = self.next_token()?;
        match tok.kind {
            TokenKind::Symbol('{') => {
                let x = self.parse_number_value()?;
                self.expect_symbol(',')?;
                let y = self.parse_number_value()?;
                self.expect_symbol(',')?;
                let z = self.parse_number_value()?;
                self.expect_symbol('}')?;
                Ok(Point::new(x, y, z))
            }
            TokenKind::LiteralType(LiteralType::Point) => self.parse_point_named(),
            TokenKind::MathExpr(body) => mathexpr::eval(&body, &tok.loc, &self.scene.table)?.as_point(&tok.loc),
            other => Err(SourceError::WrongTokenType { loc: tok.loc, expected: "a Point".to_string(), found: other.describe() }),
        }
    }

    fn parse_point_named(&mut self) -> Result<Point, SourceError> {
        self.expect_symbol('(')?;
        let mut cursor = KeywordCursor::new(&["X", "Y", "Z"]);
        let mut vals = [0.0_f64; 3];

        while !self.peek_is_symbol(')')? {
            let tok = self.peek_token()?;
            let idx = match &tok.kind {
                TokenKind::Keyword(name) => {
                    let idx = cursor.keyword(name, &tok.loc, "Point")?;
                    self.next_token()?;
                    idx
                }
                _ => cursor.positional(&tok.loc, "Point")?,
            };
            vals[idx] = self.parse_number_value()?;
            if self.peek_is_symbol(',')? {
                self.next_token()?;
            } else {
                break;
            }
        }
        self.expect_symbol(')')?;
        Ok(Point::new(vals[0], vals[1], vals[2]))
    }

    // ------------------------------------------------------------------
    // List
    // ------------------------------------------------------------------

    pub fn parse_list(&mut self) -> Result<Vec<Value>, SourceError> {
        if let Some(v) = self.try_identifier(LiteralType::List)? {
            return match v {
                Value::List(items) => Ok(items),
                other => Err(self.wrong_value_type("List", &other)),
            };
        }

        let tok = self.next_token()?;
        match tok.kind {
            TokenKind::Symbol('[') => {
                let mut items = Vec::new();
                if !self.peek_is_symbol(']')? {
                    loop {
                        items.push(self.parse_constructor()?);
                        if self.peek_is_symbol(',')? {
                            self.next_token()?;
                        } else {
                            break;
                        }
                    }
                }
                self.expect_symbol(']')?;
                Ok(items)
            }
            other => Err(SourceError::WrongTokenType { loc: tok.loc, expected: "a List".to_string(), found: other.describe() }),
        }
    }

    fn parse_list_of_numbers(&mut self) -> Result<Vec<f64>, SourceError> {
        let loc = self.peek_token()?.loc;
        let items = self.parse_list()?;
        items
            .into_iter()
            .map(|v| match v {
                Value::Number(n) => Ok(n),
                other => Err(self.wrong_value_type("Number", &other)),
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| match e {
                SourceError::WrongValueType { name, expected, found, .. } => {
                    SourceError::WrongValueType { loc: loc.clone(), name, expected, found }
                }
                other => other,
            })
    }

    // ------------------------------------------------------------------
    // Transformation
    // ------------------------------------------------------------------

    pub fn parse_transformation(&mut self) -> Result<Transformation, SourceError> {
        let mut result = self.parse_transformation_atom()?;
        while self.peek_is_symbol('*')? {
            self.next_token()?;
            let next = self.parse_transformation_atom()?;
            result = result * next;
        }
        Ok(result)
    }

    fn parse_transformation_atom(&mut self) -> Result<Transformation, SourceError> {
        if let Some(v) = self.try_identifier(LiteralType::Transformation)? {
            return match v {
                Value::Transformation(t) => Ok(t),
                other => Err(self.wrong_value_type("Transformation", &other)),
            };
        }

        let tok = self.next_token()?;
        match tok.kind {
            TokenKind::Command(Command::Rotate) => self.parse_rotate(),
            TokenKind::Command(Command::Translate) => self.parse_translate(),
            TokenKind::Command(Command::Scale) => self.parse_scale(),
            TokenKind::LiteralType(LiteralType::Transformation) => self.parse_transformation_named(tok.loc),
            other => Err(SourceError::WrongTokenType { loc: tok.loc, expected: "a Transformation".to_string(), found: other.describe() }),
        }
    }

    fn parse_rotate(&mut self) -> Result<Transformation, SourceError> {
        self.expect_symbol('(')?;
        let mut result: Option<Transformation> = None;

        loop {
            let (axis, axis_loc) = self.expect_keyword()?;
            let angle_deg = self.parse_number_value()?;
            let term = match axis.as_str() {
                "X" => Transformation::rotation_x(angle_deg.to_radians()),
                "Y" => Transformation::rotation_y(angle_deg.to_radians()),
                "Z" => Transformation::rotation_z(angle_deg.to_radians()),
                _ => return Err(SourceError::InvalidKeyword { loc: axis_loc, keyword: axis, context: "ROTATE".to_string() }),
            };
            result = Some(match result {
                None => term,
                Some(prev) => prev * term,
            });

            if self.peek_is_symbol('*')? {
                self.next_token()?;
            } else {
                break;
            }
        }

        self.expect_symbol(')')?;
        Ok(result.unwrap_or_else(Transformation::identity))
    }

    fn parse_translate(&mut self) -> Result<Transformation, SourceError> {
        self.expect_symbol('(')?;
        let p = self.parse_point()?;
        self.expect_symbol(')')?;
        Ok(Transformation::translation(Vec3::new(p.x, p.y, p.z)))
    }

    fn parse_scale(&mut self) -> Result<Transformation, SourceError> {
        if self.peek_is_symbol('(')? {
            self.next_token()?;
            let mut cursor = KeywordCursor::new(&["X", "Y", "Z"]);
            let mut vals = [1.0_f64; 3];

            while !self.peek_is_symbol(')')? {
                let (name, loc) = self.expect_keyword()?;
                let idx = cursor.keyword(&name, &loc, "SCALE")?;
                vals[idx] = self.parse_number_value()?;
                if self.peek_is_symbol(',')? {
                    self.next_token()?;
                } else {
                    break;
                }
            }
            self.expect_symbol(')')?;
            Ok(Transformation::scaling(Vec3::new(vals[0], vals[1], vals[2])))
        } else {
            let k = self.parse_number_value()?;
            Ok(Transformation::scaling(Vec3::new(k, k, k)))
        }
    }

    fn parse_transformation_named(&mut self, loc: SourceLocation) -> Result<Transformation, SourceError> {
        self.expect_symbol('(')?;
        let values = self.parse_list_of_numbers()?;
        self.expect_symbol(')')?;

        if values.len() != 16 {
            return Err(SourceError::InvalidSize { loc, expected: 16, found: values.len() });
        }

        let mut data = [[0.0; 4]; 4];
        for r in 0..4 {
            for c in 0..4 {
                data[r][c] = values[r * 4 + c];
            }
        }
        Ok(Transformation::from_mat4(Mat4::new(data)))
    }

    // ------------------------------------------------------------------
    // Pigment / Brdf / Material
    // ------------------------------------------------------------------

    pub fn parse_pigment(&mut self) -> Result<Pigment, SourceError> {
        if let Some(v) = self.try_identifier(LiteralType::Pigment)? {
            return match v {
                Value::Pigment(p) => Ok(p),
                other => Err(self.wrong_value_type("Pigment", &other)),
            };
        }

        let tok = self.next_token()?;
        match tok.kind {
            TokenKind::LiteralType(LiteralType::Pigment) => {
                let (variant, variant_loc) = self.expect_keyword()?;
                self.expect_symbol('(')?;
                let pigment = match variant.as_str() {
                    "Uniform" => {
                        let mut cursor = KeywordCursor::new(&["color"]);
                        let mut color = Color::white();
                        while !self.peek_is_symbol(')')? {
                            let tok = self.peek_token()?;
                            match &tok.kind {
                                TokenKind::Keyword(name) => {
                                    cursor.keyword(name, &tok.loc, "Pigment.Uniform")?;
                                    self.next_token()?;
                                }
                                _ => {
                                    cursor.positional(&tok.loc, "Pigment.Uniform")?;
                                }
                            }
                            color = self.parse_color()?;
                            if self.peek_is_symbol(',')? {
                                self.next_token()?;
                            } else {
                                break;
                            }
                        }
                        Pigment::Uniform(color)
                    }
                    "Checkered" => {
                        let mut cursor = KeywordCursor::new(&["N", "color_on", "color_off"]);
                        let mut n = 2_u32;
                        let mut color_on = Color::white();
                        let mut color_off = Color::black();
                        while !self.peek_is_symbol(')')? {
                            let tok = self.peek_token()?;
                            let idx = match &tok.kind {
                                TokenKind::Keyword(name) => {
                                    let idx = cursor.keyword(name, &tok.loc, "Pigment.Checkered")?;
                                    self.next_token()?;
                                    idx
                                }
                                _ => cursor.positional(&tok.loc, "Pigment.Checkered")?,
                            };
                            match idx {
                                0 => n = self.parse_number_value()? as u32,
                                1 => color_on = self.parse_color()?,
                                _ => color_off = self.parse_color()?,
                            }
                            if self.peek_is_symbol(',')? {
                                self.next_token()?;
                            } else {
                                break;
                            }
                        }
                        Pigment::Checkered { n, color_on, color_off }
                    }
                    "Image" => {
                        let mut cursor = KeywordCursor::new(&["image"]);
                        let mut image = HdrImage::new(1, 1);
                        while !self.peek_is_symbol(')')? {
                            let tok = self.peek_token()?;
                            match &tok.kind {
                                TokenKind::Keyword(name) => {
                                    cursor.keyword(name, &tok.loc, "Pigment.Image")?;
                                    self.next_token()?;
                                }
                                _ => {
                                    cursor.positional(&tok.loc, "Pigment.Image")?;
                                }
                            }
                            image = self.parse_image()?;
                            if self.peek_is_symbol(',')? {
                                self.next_token()?;
                            } else {
                                break;
                            }
                        }
                        Pigment::Image(image)
                    }
                    other => return Err(SourceError::InvalidKeyword { loc: variant_loc, keyword: other.to_string(), context: "Pigment".to_string() }),
                };
                self.expect_symbol(')')?;
                Ok(pigment)
            }
            other => Err(SourceError::WrongTokenType { loc: tok.loc, expected: "a Pigment".to_string(), found: other.describe() }),
        }
    }

    pub fn parse_brdf(&mut self) -> Result<Brdf, SourceError> {
        if let Some(v) = self.try_identifier(LiteralType::Brdf)? {
            return match v {
                Value::Brdf(b) => Ok(b),
                other => Err(self.wrong_value_type("Brdf", &other)),
            };
        }

        let tok = self.next_token()?;
        match tok.kind {
            TokenKind::LiteralType(LiteralType::Brdf) => {
                let (variant, variant_loc) = self.expect_keyword()?;
                self.expect_symbol('(')?;
                let brdf = match variant.as_str() {
                    "Diffuse" => {
                        let mut cursor = KeywordCursor::new(&["pigment"]);
                        let mut pigment = Pigment::uniform_white();
                        while !self.peek_is_symbol(')')? {
                            let tok = self.peek_token()?;
                            match &tok.kind {
                                TokenKind::Keyword(name) => {
                                    cursor.keyword(name, &tok.loc, "Brdf.Diffuse")?;
                                    self.next_token()?;
                                }
                                _ => {
                                    cursor.positional(&tok.loc, "Brdf.Diffuse")?;
                                }
                            }
                            pigment = self.parse_pigment()?;
                            if self.peek_is_symbol(',')? {
                                self.next_token()?;
                            } else {
                                break;
                            }
                        }
                        Brdf::Diffuse(pigment)
                    }
                    "Specular" => {
                        let mut cursor = KeywordCursor::new(&["pigment", "threshold_angle_rad"]);
                        let mut pigment = Pigment::uniform_white();
                        let mut threshold = DEFAULT_SPECULAR_THRESHOLD_RAD;
                        while !self.peek_is_symbol(')')? {
                            let tok = self.peek_token()?;
                            let idx = match &tok.kind {
                                TokenKind::Keyword(name) => {
                                    let idx = cursor.keyword(name, &tok.loc, "Brdf.Specular")?;
                                    self.next_token()?;
                                    idx
                                }
                                _ => cursor.positional(&tok.loc, "Brdf.Specular")?,
                            };
                            if idx == 0 {
                                pigment = self.parse_pigment()?;
                            } else {
                                threshold = self.parse_number_value()?;
                            }
                            if self.peek_is_symbol(',')? {
                                self.next_token()?;
                            } else {
                                break;
                            }
                        }
                        Brdf::Specular(pigment, threshold)
                    }
                    other => return Err(SourceError::InvalidKeyword { loc: variant_loc, keyword: other.to_string(), context: "Brdf".to_string() }),
                };
                self.expect_symbol(')')?;
                Ok(brdf)
            }
            other => Err(SourceError::WrongTokenType { loc: tok.loc, expected: "a Brdf".to_string(), found: other.describe() }),
        }
    }

    pub fn parse_material(&mut self) -> Result<Material, SourceError> {
        if let Some(v) = self.try_identifier(LiteralType::Material)? {
            return match v {
                Value::Material(m) => Ok(m),
                other => Err(self.wrong_value_type("Material", &other)),
            };
        }

        let tok = self.next_token()?;
        match tok.kind {
            TokenKind::LiteralType(LiteralType::Material) => {
                self.expect_symbol('(')?;
                let mut cursor = KeywordCursor::new(&["brdf", "emitted_radiance"]);
                let mut brdf = Brdf::Diffuse(Pigment::uniform_white());
                let mut emitted = Pigment::Uniform(Color::black());
                while !self.peek_is_symbol(')')? {
                    let tok = self.peek_token()?;
                    let idx = match &tok.kind {
                        TokenKind::Keyword(name) => {
                            let idx = cursor.keyword(name, &tok.loc, "Material")?;
                            self.next_token()?;
                            idx
                        }
                        _ => cursor.positional(&tok.loc, "Material")?,
                    };
                    if idx == 0 {
                        brdf = self.parse_brdf()?;
                    } else {
                        emitted = self.parse_pigment()?;
                    }
                    if self.peek_is_symbol(',')? {
                        self.next_token()?;
                    } else {
                        break;
                    }
                }
                self.expect_symbol(')')?;
                Ok(Material::new(brdf, emitted))
            }
            other => Err(SourceError::WrongTokenType { loc: tok.loc, expected: "a Material".to_string(), found: other.describe() }),
        }
    }

    // ------------------------------------------------------------------
    // Shape / CSG
    // ------------------------------------------------------------------

    pub fn parse_shape(&mut self) -> Result<Shape, SourceError> {
        if let Some(v) = self.try_identifier(LiteralType::Shape)? {
            return match v {
                Value::Shape(s) => Ok(s),
                other => Err(self.wrong_value_type("Shape", &other)),
            };
        }

        let tok = self.peek_token()?;
        match tok.kind {
            TokenKind::Command(Command::Unite) | TokenKind::Command(Command::Intersect) | TokenKind::Command(Command::Diff) | TokenKind::Command(Command::Fuse) => {
                self.parse_csg()
            }
            TokenKind::LiteralType(LiteralType::Shape) => {
                self.next_token()?;
                let (variant, variant_loc) = self.expect_keyword()?;
                self.expect_symbol('(')?;
                let mut cursor = KeywordCursor::new(&["material", "transformation"]);
                let mut material = Material::default();
                let mut transformation = Transformation::identity();
                while !self.peek_is_symbol(')')? {
                    let tok = self.peek_token()?;
                    let idx = match &tok.kind {
                        TokenKind::Keyword(name) => {
                            let idx = cursor.keyword(name, &tok.loc, "Shape")?;
                            self.next_token()?;
                            idx
                        }
                        _ => cursor.positional(&tok.loc, "Shape")?,
                    };
                    if idx == 0 {
                        material = self.parse_material()?;
                    } else {
                        transformation = self.parse_transformation()?;
                    }
                    if self.peek_is_symbol(',')? {
                        self.next_token()?;
                    } else {
                        break;
                    }
                }
                self.expect_symbol(')')?;

                let instance = Instance::new(transformation, material);
                match variant.as_str() {
                    "Sphere" => Ok(Shape::Sphere(instance)),
                    "Plane" => Ok(Shape::Plane(instance)),
                    "Cube" => Ok(Shape::Cube(instance)),
                    "Cylinder" => Ok(Shape::Cylinder(instance)),
                    "Cone" => Ok(Shape::Cone(instance)),
                    other => Err(SourceError::InvalidKeyword { loc: variant_loc, keyword: other.to_string(), context: "Shape".to_string() }),
                }
            }
            other => Err(SourceError::WrongTokenType { loc: tok.loc, expected: "a Shape".to_string(), found: other.describe() }),
        }
    }

    /// Parse a list of shapes/identifiers inside `RULE(...)`, following
    /// the balanced-fold construction for `UNITE`/`INTERSECT`/`FUSE` and
    /// the fused-trailing-operands rule for `DIFF`.
    fn parse_csg(&mut self) -> Result<Shape, SourceError> {
        let tok = self.next_token()?;
        let loc = tok.loc;
        let rule = match tok.kind {
            TokenKind::Command(Command::Unite) => Rule::Unite,
            TokenKind::Command(Command::Intersect) => Rule::Intersect,
            TokenKind::Command(Command::Diff) => Rule::Diff,
            TokenKind::Command(Command::Fuse) => Rule::Fuse,
            other => return Err(SourceError::WrongTokenType { loc, expected: "UNITE/INTERSECT/DIFF/FUSE".to_string(), found: other.describe() }),
        };

        self.expect_symbol('(')?;
        let mut operands = vec![self.parse_shape()?];
        while self.peek_is_symbol(',')? {
            self.next_token()?;
            operands.push(self.parse_shape()?);
        }
        self.expect_symbol(')')?;

        if rule == Rule::Diff {
            let mut operands = operands;
            let first = operands.remove(0);
            if operands.is_empty() {
                return Ok(first);
            }
            let fused_rest = fold_balanced(operands, Rule::Fuse, &loc)?;
            return Ok(Shape::Csg(Box::new(
                Csg::new(Rule::Diff, first, fused_rest, Transformation::identity()).map_err(|e| csg_error(&loc, e))?,
            )));
        }

        fold_balanced(operands, rule, &loc)
    }

    // ------------------------------------------------------------------
    // Light
    // ------------------------------------------------------------------

    pub fn parse_light(&mut self) -> Result<PointLight, SourceError> {
        if let Some(v) = self.try_identifier(LiteralType::Light)? {
            return match v {
                Value::Light(l) => Ok(l),
                other => Err(self.wrong_value_type("Light", &other)),
            };
        }

        let tok = self.next_token()?;
        match tok.kind {
            TokenKind::LiteralType(LiteralType::Light) => {
                self.expect_symbol('(')?;
                let mut cursor = KeywordCursor::new(&["position", "color", "linear_radius"]);
                let mut position = Point::origin();
                let mut color = Color::white();
                let mut linear_radius = 0.0;
                while !self.peek_is_symbol(')')? {
                    let tok = self.peek_token()?;
                    let idx = match &tok.kind {
                        TokenKind::Keyword(name) => {
                            let idx = cursor.keyword(name, &tok.loc, "Light")?;
                            self.next_token()?;
                            idx
                        }
                        _ => cursor.positional(&tok.loc, "Light")?,
                    };
                    match idx {
                        0 => position = self.parse_point()?,
                        1 => color = self.parse_color()?,
                        _ => linear_radius = self.parse_number_value()?,
                    }
                    if self.peek_is_symbol(',')? {
                        self.next_token()?;
                    } else {
                        break;
                    }
                }
                self.expect_symbol(')')?;
                Ok(PointLight::new(position, color, linear_radius))
            }
            other => Err(SourceError::WrongTokenType { loc: tok.loc, expected: "a Light".to_string(), found: other.describe() }),
        }
    }

    // ------------------------------------------------------------------
    // Image / LOAD
    // ------------------------------------------------------------------

    pub fn parse_image(&mut self) -> Result<HdrImage, SourceError> {
        if let Some(v) = self.try_identifier(LiteralType::Image)? {
            return match v {
                Value::Image(i) => Ok(i),
                other => Err(self.wrong_value_type("Image", &other)),
            };
        }

        let tok = self.peek_token()?;
        match tok.kind {
            TokenKind::Command(Command::Load) => self.parse_load(),
            _ => Err(SourceError::WrongTokenType { loc: tok.loc, expected: "an Image".to_string(), found: self.peek_token()?.kind.describe() }),
        }
    }

    fn parse_load(&mut self) -> Result<HdrImage, SourceError> {
        self.next_token()?; // consume LOAD
        self.expect_symbol('(')?;
        let (path, loc) = self.expect_string()?;
        self.expect_symbol(')')?;

        let file = File::open(&path).map_err(|e| SourceError::InvalidFilePath { loc: loc.clone(), path: path.clone(), reason: e.to_string() })?;
        let mut reader = BufReader::new(file);
        geo::pfm::read_pfm(&mut reader).map_err(|e| SourceError::InvalidFilePath { loc, path, reason: e.to_string() })
    }

    // ------------------------------------------------------------------
    // Camera
    // ------------------------------------------------------------------

    pub fn parse_camera(&mut self) -> Result<Camera, SourceError> {
        if let Some(v) = self.try_identifier(LiteralType::Camera)? {
            return match v {
                Value::Camera(c) => Ok(c),
                other => Err(self.wrong_value_type("Camera", &other)),
            };
        }

        let tok = self.next_token()?;
        match tok.kind {
            TokenKind::LiteralType(LiteralType::Camera) => {
                let (variant, variant_loc) = self.expect_keyword()?;
                self.expect_symbol('(')?;
                let camera = match variant.as_str() {
                    "Orthogonal" => {
                        let mut cursor = KeywordCursor::new(&["aspect_ratio", "transformation"]);
                        let mut aspect_ratio = 1.0;
                        let mut transformation = Transformation::identity();
                        while !self.peek_is_symbol(')')? {
                            let tok = self.peek_token()?;
                            let idx = match &tok.kind {
                                TokenKind::Keyword(name) => {
                                    let idx = cursor.keyword(name, &tok.loc, "Camera.Orthogonal")?;
                                    self.next_token()?;
                                    idx
                                }
                                _ => cursor.positional(&tok.loc, "Camera.Orthogonal")?,
                            };
                            if idx == 0 {
                                aspect_ratio = self.parse_number_value()?;
                            } else {
                                transformation = self.parse_transformation()?;
                            }
                            if self.peek_is_symbol(',')? {
                                self.next_token()?;
                            } else {
                                break;
                            }
                        }
                        Camera::orthogonal(aspect_ratio, transformation)
                    }
                    "Perspective" => {
                        let mut cursor = KeywordCursor::new(&["aspect_ratio", "transformation", "screen_distance"]);
                        let mut aspect_ratio = 1.0;
                        let mut transformation = Transformation::identity();
                        let mut screen_distance = 1.0;
                        while !self.peek_is_symbol(')')? {
                            let tok = self.peek_token()?;
                            let idx = match &tok.kind {
                                TokenKind::Keyword(name) => {
                                    let idx = cursor.keyword(name, &tok.loc, "Camera.Perspective")?;
                                    self.next_token()?;
                                    idx
                                }
                                _ => cursor.positional(&tok.loc, "Camera.Perspective")?,
                            };
                            match idx {
                                0 => aspect_ratio = self.parse_number_value()?,
                                1 => transformation = self.parse_transformation()?,
                                _ => screen_distance = self.parse_number_value()?,
                            }
                            if self.peek_is_symbol(',')? {
                                self.next_token()?;
                            } else {
                                break;
                            }
                        }
                        Camera::perspective(aspect_ratio, transformation, screen_distance)
                    }
                    other => return Err(SourceError::InvalidKeyword { loc: variant_loc, keyword: other.to_string(), context: "Camera".to_string() }),
                };
                self.expect_symbol(')')?;
                Ok(camera)
            }
            other => Err(SourceError::WrongTokenType { loc: tok.loc, expected: "a Camera".to_string(), found: other.describe() }),
        }
    }

    // ------------------------------------------------------------------
    // Pcg
    // ------------------------------------------------------------------

    pub fn parse_pcg(&mut self) -> Result<Pcg, SourceError> {
        if let Some(v) = self.try_identifier(LiteralType::Pcg)? {
            return match v {
                Value::Pcg(p) => Ok(p),
                other => Err(self.wrong_value_type("Pcg", &other)),
            };
        }

        let tok = self.next_token()?;
        match tok.kind {
            TokenKind::LiteralType(LiteralType::Pcg) => {
                self.expect_symbol('(')?;
                let mut cursor = KeywordCursor::new(&["state", "inc"]);
                let mut state = 42_u64;
                let mut inc = 54_u64;
                while !self.peek_is_symbol(')')? {
                    let tok = self.peek_token()?;
                    let idx = match &tok.kind {
                        TokenKind::Keyword(name) => {
                            let idx = cursor.keyword(name, &tok.loc, "Pcg")?;
                            self.next_token()?;
                            idx
                        }
                        _ => cursor.positional(&tok.loc, "Pcg")?,
                    };
                    let n = self.parse_number_value()? as u64;
                    if idx == 0 {
                        state = n;
                    } else {
                        inc = n;
                    }
                    if self.peek_is_symbol(',')? {
                        self.next_token()?;
                    } else {
                        break;
                    }
                }
                self.expect_symbol(')')?;
                Ok(Pcg::new(state, inc))
            }
            other => Err(SourceError::WrongTokenType { loc: tok.loc, expected: "a Pcg".to_string(), found: other.describe() }),
        }
    }

    // ------------------------------------------------------------------
    // Renderer settings
    // ------------------------------------------------------------------

    pub fn parse_renderer(&mut self) -> Result<Renderer, SourceError> {
        if let Some(v) = self.try_identifier(LiteralType::Renderer)? {
            return match v {
                Value::Renderer(r) => Ok(r),
                other => Err(self.wrong_value_type("Renderer", &other)),
            };
        }

        let tok = self.next_token()?;
        match tok.kind {
            TokenKind::LiteralType(LiteralType::Renderer) => {
                let (variant, variant_loc) = self.expect_keyword()?;
                self.expect_symbol('(')?;
                let renderer = match variant.as_str() {
                    "OnOff" => {
                        let mut cursor = KeywordCursor::new(&["on_color", "off_color"]);
                        let mut on_color = Color::white();
                        let mut off_color = Color::black();
                        while !self.peek_is_symbol(')')? {
                            let tok = self.peek_token()?;
                            let idx = match &tok.kind {
                                TokenKind::Keyword(name) => {
                                    let idx = cursor.keyword(name, &tok.loc, "Renderer.OnOff")?;
                                    self.next_token()?;
                                    idx
                                }
                                _ => cursor.positional(&tok.loc, "Renderer.OnOff")?,
                            };
                            if idx == 0 {
                                on_color = self.parse_color()?;
                            } else {
                                off_color = self.parse_color()?;
                            }
                            if self.peek_is_symbol(',')? {
                                self.next_token()?;
                            } else {
                                break;
                            }
                        }
                        Renderer::on_off(on_color, off_color)
                    }
                    "Flat" => {
                        let mut cursor = KeywordCursor::new(&["background_color"]);
                        let mut background_color = Color::black();
                        while !self.peek_is_symbol(')')? {
                            let tok = self.peek_token()?;
                            match &tok.kind {
                                TokenKind::Keyword(name) => {
                                    cursor.keyword(name, &tok.loc, "Renderer.Flat")?;
                                    self.next_token()?;
                                }
                                _ => {
                                    cursor.positional(&tok.loc, "Renderer.Flat")?;
                                }
                            }
                            background_color = self.parse_color()?;
                            if self.peek_is_symbol(',')? {
                                self.next_token()?;
                            } else {
                                break;
                            }
                        }
                        Renderer::flat(background_color)
                    }
                    "PointLight" => {
                        let mut cursor = KeywordCursor::new(&["background_color", "ambient_color"]);
                        let mut background_color = Color::black();
                        let mut ambient_color = DEFAULT_AMBIENT_COLOR;
                        while !self.peek_is_symbol(')')? {
                            let tok = self.peek_token()?;
                            let idx = match &tok.kind {
                                TokenKind::Keyword(name) => {
                                    let idx = cursor.keyword(name, &tok.loc, "Renderer.PointLight")?;
                                    self.next_token()?;
                                    idx
                                }
                                _ => cursor.positional(&tok.loc, "Renderer.PointLight")?,
                            };
                            if idx == 0 {
                                background_color = self.parse_color()?;
                            } else {
                                ambient_color = self.parse_color()?;
                            }
                            if self.peek_is_symbol(',')? {
                                self.next_token()?;
                            } else {
                                break;
                            }
                        }
                        Renderer::point_light(background_color, ambient_color)
                    }
                    "PathTracer" => {
                        let mut cursor = KeywordCursor::new(&["background_color", "rng", "n", "max_depth", "roulette_depth"]);
                        let mut background_color = Color::black();
                        let mut rng = Pcg::default_seed();
                        let mut n = 10_u32;
                        let mut max_depth = 2_u32;
                        let mut roulette_depth = 3_u32;
                        while !self.peek_is_symbol(')')? {
                            let tok = self.peek_token()?;
                            let idx = match &tok.kind {
                                TokenKind::Keyword(name) => {
                                    let idx = cursor.keyword(name, &tok.loc, "Renderer.PathTracer")?;
                                    self.next_token()?;
                                    idx
                                }
                                _ => cursor.positional(&tok.loc, "Renderer.PathTracer")?,
                            };
                            match idx {
                                0 => background_color = self.parse_color()?,
                                1 => rng = self.parse_pcg()?,
                                2 => n = self.parse_number_value()? as u32,
                                3 => max_depth = self.parse_number_value()? as u32,
                                _ => roulette_depth = self.parse_number_value()? as u32,
                            }
                            if self.peek_is_symbol(',')? {
                                self.next_token()?;
                            } else {
                                break;
                            }
                        }
                        Renderer::path_tracer(background_color, rng, n, max_depth, roulette_depth)
                    }
                    other => return Err(SourceError::InvalidKeyword { loc: variant_loc, keyword: other.to_string(), context: "Renderer".to_string() }),
                };
                self.expect_symbol(')')?;
                Ok(renderer)
            }
            other => Err(SourceError::WrongTokenType { loc: tok.loc, expected: "a Renderer".to_string(), found: other.describe() }),
        }
    }

    // ------------------------------------------------------------------
    // Tracer settings
    // ------------------------------------------------------------------

    pub fn parse_tracer_settings(&mut self) -> Result<TracerSettings, SourceError> {
        if let Some(v) = self.try_identifier(LiteralType::Tracer)? {
            return match v {
                Value::Tracer(t) => Ok(t),
                other => Err(self.wrong_value_type("Tracer", &other)),
            };
        }

        let tok = self.next_token()?;
        match tok.kind {
            TokenKind::LiteralType(LiteralType::Tracer) => {
                self.expect_symbol('(')?;
                let mut cursor = KeywordCursor::new(&["samples_per_side", "rng"]);
                let mut samples_per_side = 1_u32;
                let mut rng = Pcg::default_seed();
                while !self.peek_is_symbol(')')? {
                    let tok = self.peek_token()?;
                    let idx = match &tok.kind {
                        TokenKind::Keyword(name) => {
                            let idx = cursor.keyword(name, &tok.loc, "Tracer")?;
                            self.next_token()?;
                            idx
                        }
                        _ => cursor.positional(&tok.loc, "Tracer")?,
                    };
                    if idx == 0 {
                        samples_per_side = self.parse_number_value()? as u32;
                    } else {
                        rng = self.parse_pcg()?;
                    }
                    if self.peek_is_symbol(',')? {
                        self.next_token()?;
                    } else {
                        break;
                    }
                }
                self.expect_symbol(')')?;
                Ok(TracerSettings::new(samples_per_side, rng))
            }
            other => Err(SourceError::WrongTokenType { loc: tok.loc, expected: "a Tracer".to_string(), found: other.describe() }),
        }
    }

    // ------------------------------------------------------------------
    // Generic untyped constructor (used by SET/SPAWN/the List element grammar)
    // ------------------------------------------------------------------

    fn parse_constructor(&mut self) -> Result<Value, SourceError> {
        let tok = self.peek_token()?;
        match &tok.kind {
            TokenKind::Identifier(_) => {
                Err(SourceError::WrongTokenType { loc: tok.loc, expected: "a constructor".to_string(), found: "an identifier".to_string() })
            }
            TokenKind::Command(Command::Time) => {
                self.next_token()?;
                Ok(Value::Number(self.scene.time))
            }
            TokenKind::Command(Command::Rotate) | TokenKind::Command(Command::Translate) | TokenKind::Command(Command::Scale) => {
                Ok(Value::Transformation(self.parse_transformation()?))
            }
            TokenKind::Command(Command::Load) => Ok(Value::Image(self.parse_load()?)),
            TokenKind::Command(Command::Unite) | TokenKind::Command(Command::Intersect) | TokenKind::Command(Command::Diff) | TokenKind::Command(Command::Fuse) => {
                Ok(Value::Shape(self.parse_shape()?))
            }
            TokenKind::LiteralType(lt) => {
                let lt = *lt;
                match lt {
                    LiteralType::Color => Ok(Value::Color(self.parse_color()?)),
                    LiteralType::Point => Ok(Value::Point(self.parse_point()?)),
                    LiteralType::List => Ok(Value::List(self.parse_list()?)),
                    LiteralType::Transformation => Ok(Value::Transformation(self.parse_transformation()?)),
                    LiteralType::Material => Ok(Value::Material(self.parse_material()?)),
                    LiteralType::Brdf => Ok(Value::Brdf(self.parse_brdf()?)),
                    LiteralType::Pigment => Ok(Value::Pigment(self.parse_pigment()?)),
                    LiteralType::Shape => Ok(Value::Shape(self.parse_shape()?)),
                    LiteralType::Light => Ok(Value::Light(self.parse_light()?)),
                    LiteralType::Image => Ok(Value::Image(self.parse_image()?)),
                    LiteralType::Renderer => Ok(Value::Renderer(self.parse_renderer()?)),
                    LiteralType::Camera => Ok(Value::Camera(self.parse_camera()?)),
                    LiteralType::Pcg => Ok(Value::Pcg(self.parse_pcg()?)),
                    LiteralType::Tracer => Ok(Value::Tracer(self.parse_tracer_settings()?)),
                }
            }
            TokenKind::Symbol('<') => Ok(Value::Color(self.parse_color()?)),
            TokenKind::Symbol('{') => Ok(Value::Point(self.parse_point()?)),
            TokenKind::Symbol('[') => Ok(Value::List(self.parse_list()?)),
            TokenKind::Number(_) | TokenKind::MathExpr(_) => Ok(Value::Number(self.parse_number_value()?)),
            TokenKind::Str(_) => {
                let (s, loc) = self.expect_string()?;
                Err(SourceError::WrongTokenType { loc, expected: "a constructor".to_string(), found: format!("string {s:?}") })
            }
            other => Err(SourceError::WrongTokenType { loc: tok.loc.clone(), expected: "a constructor".to_string(), found: other.describe() }),
        }
    }

    fn wrong_value_type(&self, expected: &str, found: &Value) -> SourceError {
        SourceError::WrongValueType {
            loc: SourceLocation::new("<identifier>", 0, 0),
            name: String::new(),
            expected: expected.to_string(),
            found: found.type_name().to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Top-level commands
    // ------------------------------------------------------------------

    /// Run every command in the source to completion, mutating `self.scene`.
    pub fn parse_scene(&mut self, sink: &mut dyn Write) -> Result<(), SourceError> {
        loop {
            let tok = self.next_token()?;
            match tok.kind {
                TokenKind::Stop => return Ok(()),
                TokenKind::Command(Command::Set) => self.parse_set()?,
                TokenKind::Command(Command::Unset) => self.parse_unset()?,
                TokenKind::Command(Command::Spawn) => self.parse_spawn()?,
                TokenKind::Command(Command::Using) => self.parse_using()?,
                TokenKind::Command(Command::Dump) => self.parse_dump(sink)?,
                other => return Err(SourceError::WrongTokenType { loc: tok.loc, expected: "a top-level command".to_string(), found: other.describe() }),
            }
        }
    }

    fn parse_set(&mut self) -> Result<(), SourceError> {
        loop {
            let tok = self.peek_token()?;
            let (name, loc) = match tok.kind {
                TokenKind::Identifier(_) => self.expect_identifier()?,
                _ => break,
            };

            let value = self.parse_constructor()?;
            match value {
                Value::Number(n) => self.scene.table.declare_number(&name, n, loc)?,
                other => {
                    let tag = other.value_tag();
                    self.scene.table.declare(tag, &name, other, loc)?;
                }
            }
        }
        Ok(())
    }

    fn parse_unset(&mut self) -> Result<(), SourceError> {
        loop {
            let tok = self.peek_token()?;
            match tok.kind {
                TokenKind::Identifier(name) => {
                    self.next_token()?;
                    self.scene.table.unset(&name);
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn parse_spawn(&mut self) -> Result<(), SourceError> {
        loop {
            let tok = self.peek_token()?;
            let is_spawnable = matches!(
                tok.kind,
                TokenKind::Identifier(_)
                    | TokenKind::LiteralType(LiteralType::Shape)
                    | TokenKind::LiteralType(LiteralType::Light)
                    | TokenKind::Command(Command::Unite)
                    | TokenKind::Command(Command::Intersect)
                    | TokenKind::Command(Command::Diff)
                    | TokenKind::Command(Command::Fuse)
            );
            if !is_spawnable {
                break;
            }

            if let TokenKind::Identifier(name) = &tok.kind {
                match self.scene.table.any_type_with(name) {
                    Some(t) if t == LiteralType::Shape.name() => {
                        self.scene.world.push(self.parse_shape()?);
                    }
                    Some(t) if t == LiteralType::Light.name() => {
                        self.scene.lights.push(self.parse_light()?);
                    }
                    _ => {
                        return Err(SourceError::UndefinedIdentifier { loc: tok.loc, name: name.clone() });
                    }
                }
                continue;
            }

            if matches!(tok.kind, TokenKind::LiteralType(LiteralType::Light)) {
                self.scene.lights.push(self.parse_light()?);
            } else {
                self.scene.world.push(self.parse_shape()?);
            }
        }
        Ok(())
    }

    fn parse_using(&mut self) -> Result<(), SourceError> {
        loop {
            let tok = self.peek_token()?;
            let is_usable = matches!(
                tok.kind,
                TokenKind::LiteralType(LiteralType::Camera)
                    | TokenKind::LiteralType(LiteralType::Image)
                    | TokenKind::LiteralType(LiteralType::Renderer)
                    | TokenKind::LiteralType(LiteralType::Tracer)
                    | TokenKind::Identifier(_)
                    | TokenKind::Command(Command::Load)
            );
            if !is_usable {
                break;
            }

            let loc = tok.loc.clone();
            let value = if let TokenKind::Identifier(name) = &tok.kind {
                match self.scene.table.any_type_with(name) {
                    Some(t) if t == LiteralType::Camera.name() => Value::Camera(self.parse_camera()?),
                    Some(t) if t == LiteralType::Image.name() => Value::Image(self.parse_image()?),
                    Some(t) if t == LiteralType::Renderer.name() => Value::Renderer(self.parse_renderer()?),
                    Some(t) if t == LiteralType::Tracer.name() => Value::Tracer(self.parse_tracer_settings()?),
                    _ => return Err(SourceError::UndefinedIdentifier { loc, name: name.clone() }),
                }
            } else {
                self.parse_constructor()?
            };

            match value {
                Value::Camera(c) => self.scene.camera.set("camera", c, loc)?,
                Value::Image(i) => self.scene.image.set("image", i, loc)?,
                Value::Renderer(r) => self.scene.renderer.set("renderer", r, loc)?,
                Value::Tracer(t) => self.scene.tracer.set("tracer", t, loc)?,
                other => {
                    return Err(SourceError::WrongValueType {
                        loc,
                        name: String::new(),
                        expected: "Camera, Image, Renderer, or Tracer".to_string(),
                        found: other.type_name().to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    fn parse_dump(&mut self, sink: &mut dyn Write) -> Result<(), SourceError> {
        let tok = self.next_token()?;
        match tok.kind {
            TokenKind::Keyword(what) => {
                let _ = writeln!(sink, "{}", self.dump_section(&what));
                Ok(())
            }
            TokenKind::Identifier(name) => {
                let _ = writeln!(sink, "{name} = {}", self.dump_identifier(&name));
                Ok(())
            }
            other => Err(SourceError::WrongTokenType { loc: tok.loc, expected: "a DUMP target".to_string(), found: other.describe() }),
        }
    }

    fn dump_section(&self, what: &str) -> String {
        match what {
            "world" => format!("world: {} shapes", self.scene.world.len()),
            "lights" => format!("lights: {} lights", self.scene.lights.iter().count()),
            "image" => format!("image: {:?}", self.scene.image.get().map(|i| (i.width(), i.height()))),
            "camera" => format!("camera: {:?}", self.scene.camera.get()),
            "renderer" => format!("renderer: {:?}", self.scene.renderer.get()),
            "tracer" => format!("tracer: {:?}", self.scene.tracer.get()),
            "variables" | "ALL" => format!("{:#?}", self.scene.table),
            other => format!("<unknown DUMP target {other}>"),
        }
    }

    fn dump_identifier(&self, name: &str) -> String {
        match self.scene.table.any_type_with(name) {
            Some(t) => format!("<{t}>"),
            None => self.scene.table.lookup_number(name).map(|n| n.to_string()).unwrap_or_else(|| "<undefined>".to_string()),
        }
    }
}

/// Balanced recursive-halving fold so `UNITE(s1, s2, s3, s4)` builds
/// `union(union(s1, s2), union(s3, s4))` rather than a degenerate
/// left-leaning chain.
fn fold_balanced(mut shapes: Vec<Shape>, rule: Rule, loc: &SourceLocation) -> Result<Shape, SourceError> {
    if shapes.len() == 1 {
        return Ok(shapes.remove(0));
    }
    let right = shapes.split_off(shapes.len() / 2);
    let left_shape = fold_balanced(shapes, rule, loc)?;
    let right_shape = fold_balanced(right, rule, loc)?;
    Ok(Shape::Csg(Box::new(
        Csg::new(rule, left_shape, right_shape, Transformation::identity()).map_err(|e| csg_error(loc, e))?,
    )))
}

fn csg_error(loc: &SourceLocation, e: ShapeAlgebraError) -> SourceError {
    SourceError::ShapeAlgebra { loc: loc.clone(), source: e }
}
