//! End-to-end golden scenarios driving the lexer/parser/world pipeline
//! through whole scene-description snippets, rather than unit-testing a
//! single module in isolation.

use std::io::sink;

use geo::{Point, Ray, Vec3};
use raysl::error::SourceError;
use raysl::parser::Parser;
use raysl::scene::Scene;

fn parse(source: &str) -> Result<Scene, SourceError> {
    let mut scene = Scene::new();
    {
        let mut parser = Parser::new(source, "<test>", &mut scene);
        parser.parse_scene(&mut sink())?;
    }
    Ok(scene)
}

#[test]
fn number_identifiers_feed_math_expressions() {
    let scene = parse("SET a 9 SET res $1 + 2a$").unwrap();

    assert_eq!(scene.table.lookup_number("a"), Some(9.0));
    assert_eq!(scene.table.lookup_number("res"), Some(19.0));
}

#[test]
fn undefined_identifier_in_math_expression_is_an_error() {
    let err = parse("SET a 9 SET res $1 + 2b$").unwrap_err();

    assert!(matches!(err, SourceError::UndefinedIdentifier { name, .. } if name == "b"));
}

#[test]
fn spawned_sphere_is_hit_at_the_expected_distance() {
    let scene = parse("SET s Shape.Sphere() SPAWN s").unwrap();

    assert_eq!(scene.world.len(), 1);
    let ray = Ray::new(Point::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
    let hit = scene.world.ray_intersection(&ray).expect("ray should hit the sphere");
    assert!((hit.t - 4.0).abs() < 1e-9);
}

#[test]
fn second_using_of_the_same_setting_is_a_redefinition_error() {
    let err = parse("USING Camera.Perspective() USING Camera.Orthogonal()").unwrap_err();

    assert!(matches!(err, SourceError::SettingRedefinition { field, .. } if field == "camera"));
}

// Two unit spheres translated to x=-0.5 and x=0.5: a ray fired along +x
// from {-5,0,0} crosses the near sphere's surface at t=3.5/5.5 and the far
// sphere's at t=4.5/6.5 (solving (-5+t-c)^2=1 for each center c). UNITE's
// nearest hit is therefore the near sphere's entry (3.5); INTERSECT only
// starts once the ray is inside both spheres at once, i.e. the far
// sphere's entry (4.5).

#[test]
fn unite_of_two_spheres_hits_the_nearer_one_and_keeps_all_four_crossings() {
    let source = "\
        SET a Shape.Sphere(.transformation TRANSLATE({$-0.5$, 0, 0}))
        SET b Shape.Sphere(.transformation TRANSLATE({0.5, 0, 0}))
        SET u UNITE(a, b)
        SPAWN u
    ";
    let scene = parse(source).unwrap();
    assert_eq!(scene.world.len(), 1);

    let ray = Ray::new(Point::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
    let shape = scene.world.iter().next().unwrap();

    let hit = shape.ray_intersection(&ray).expect("union should be hit");
    assert!((hit.t - 3.5).abs() < 1e-9);

    let all = shape.all_ray_intersections(&ray).unwrap();
    assert_eq!(all.len(), 4);
}

#[test]
fn intersect_of_two_overlapping_spheres_hits_the_shared_entry_point() {
    let source = "\
        SET a Shape.Sphere(.transformation TRANSLATE({$-0.5$, 0, 0}))
        SET b Shape.Sphere(.transformation TRANSLATE({0.5, 0, 0}))
        SET i INTERSECT(a, b)
        SPAWN i
    ";
    let scene = parse(source).unwrap();

    let ray = Ray::new(Point::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
    let shape = scene.world.iter().next().unwrap();

    let hit = shape.ray_intersection(&ray).expect("overlapping spheres should intersect");
    assert!((hit.t - 4.5).abs() < 1e-9);
}

#[test]
fn command_line_style_declaration_is_shadowed_by_a_script_level_set() {
    let mut scene = Scene::new();
    scene.table.declare_number("a", 1.0, raysl::error::SourceLocation::command_line()).unwrap();

    {
        let mut parser = Parser::new("SET a 9 SET res $1 + 2a$", "<test>", &mut scene);
        parser.parse_scene(&mut sink()).unwrap();
    }

    assert_eq!(scene.table.lookup_number("a"), Some(9.0));
    assert_eq!(scene.table.lookup_number("res"), Some(19.0));
}
