use std::path::PathBuf;

use dae_core::collada::{Component, NodeKind, Transform, TransformKind, Value};
use dae_core::{ColladaError, Document, GeneratorContext, GeneratorOptions, LoadOptions, Name, UpAxis};
use dae_math::Vec3;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn wrap(body: &str) -> String {
    format!(r#"<?xml version="1.0" encoding="utf-8"?><COLLADA version="1.4.1">{body}</COLLADA>"#)
}

fn load_quad() -> Document {
    Document::load(fixture("animated_quad.dae"), &LoadOptions::default()).unwrap()
}

#[test]
fn test_load_fixture_summary() {
    let doc = load_quad();
    let summary = doc.summary();

    assert_eq!(summary.up_axis, UpAxis::Y);
    assert_eq!(summary.authoring_tool.as_deref(), Some("hand written"));
    assert_eq!(summary.geometries, 1);
    assert_eq!(summary.polylists, 1);
    assert_eq!(summary.triangles, 2);
    assert_eq!(summary.materials, 1);
    assert_eq!(summary.cameras, 1);
    assert_eq!(summary.lights, 1);
    assert_eq!(summary.scenes, 1);
    assert_eq!(summary.nodes, 4);
    assert_eq!(summary.animations, 2);
    assert_eq!(summary.animated_cells, 2);
    assert!(doc.base_dir().is_some());
}

#[test]
fn test_max_duration_is_longest_animation() {
    let doc = load_quad();
    assert_eq!(doc.max_animation_duration, 5.0);
}

#[test]
fn test_animations_are_applied_on_load() {
    let doc = load_quad();
    let scene = &doc.scenes[doc.default_scene().unwrap()];
    let mover = scene.find_node_by_sid("mover").unwrap();
    let translate = scene.node(mover).transformations().next().unwrap();

    let Transform::Translate([x, y, _]) = translate else {
        panic!("expected translate, got {:?}", translate);
    };
    let move_x = doc.find_animation(&Name::new("move-x")).unwrap();
    assert_eq!(*x, Value::Animated { animation: move_x, default: 0.0 });
    assert_eq!(*y, Value::Float(1.0));

    let channel = &doc.animations[move_x].channel;
    let target = channel.target.unwrap();
    assert_eq!(target.node, mover);
    assert_eq!(target.component, Component::X);
    assert_eq!(translate.kind(), TransformKind::Translate);
}

#[test]
fn test_apply_animations_is_idempotent() {
    let mut doc = load_quad();
    let before = doc.summary().animated_cells;

    assert_eq!(doc.apply_animations(), 0);
    assert_eq!(doc.apply_animations(), 0);
    assert_eq!(doc.summary().animated_cells, before);
}

#[test]
fn test_missing_up_axis_is_y_up() {
    let doc = Document::parse_str(&wrap("<asset/>"), &LoadOptions::default()).unwrap();
    assert_eq!(doc.up_axis(), UpAxis::Y);

    let z_up = Document::parse_str(
        &wrap("<asset><up_axis>Z_UP</up_axis></asset>"),
        &LoadOptions::default(),
    )
    .unwrap();
    assert_eq!(z_up.up_axis(), UpAxis::Z);
    assert!(z_up.up_axis().to_y_up().transform_vector3(Vec3::Z).abs_diff_eq(Vec3::Y, 1e-6));
}

#[test]
fn test_lightwave_pivot_inverse_negated() {
    let body = r#"
      <asset><contributor><authoring_tool>LightWave Core 1.0</authoring_tool></contributor></asset>
      <library_visual_scenes><visual_scene id="s">
        <node id="pivoted" sid="pivoted">
          <translate sid="rotatePivot">1 2 3</translate>
          <rotate sid="rotateY">0 1 0 90</rotate>
          <translate sid="rotatePivotInverse">1 2 3</translate>
        </node>
      </visual_scene></library_visual_scenes>"#;
    let doc = Document::parse_str(&wrap(body), &LoadOptions::default()).unwrap();
    assert!(doc.asset.lightwave_core);

    let scene = &doc.scenes[doc.default_scene().unwrap()];
    let node = scene.find_node_by_sid("pivoted").unwrap();
    let last = scene.node(node).transformations().last().unwrap();
    assert_eq!(last.translation(), Some(Vec3::new(-1.0, -2.0, -3.0)));
}

#[test]
fn test_fake_root_wraps_top_level_nodes() {
    let doc = load_quad();
    let scene = &doc.scenes[doc.default_scene().unwrap()];
    assert_eq!(scene.root().kind, NodeKind::FakeRoot);
    assert_eq!(scene.root().children().count(), 3);
    assert_eq!(scene.depth_first().len(), 5);
}

#[test]
fn test_unreadable_file_fails() {
    let result = Document::load(fixture("does_not_exist.dae"), &LoadOptions::default());
    assert!(matches!(result, Err(ColladaError::Io(_))));
}

#[test]
fn test_blob_cache_round_trip() {
    let dir = std::env::temp_dir().join(format!("dae_core_it_cache_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let options = LoadOptions::default().with_cache(&dir);
    let generator = GeneratorOptions::default().with_textures(false);

    let cold = Document::load(fixture("animated_quad.dae"), &options).unwrap();
    let cold_ctx = GeneratorContext::for_document(&cold, generator.clone());
    let geometry = cold.find_geometry(&Name::new("quad")).unwrap();
    let cold_mesh = cold.geometry_mesh(geometry, &cold_ctx).unwrap();
    assert!(std::fs::read_dir(&dir).unwrap().next().is_some());

    let warm = Document::load(fixture("animated_quad.dae"), &options).unwrap();
    let warm_ctx = GeneratorContext::for_document(&warm, generator);
    let warm_mesh = warm.geometry_mesh(geometry, &warm_ctx).unwrap();

    assert_eq!(*cold_mesh, *warm_mesh);
    assert_eq!(cold.summary().triangles, warm.summary().triangles);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_mipmap_sampler_marks_its_image() {
    let body = r#"
      <library_images>
        <image id="wood-img"><init_from>wood.png</init_from></image>
        <image id="plain-img"><init_from>plain.png</init_from></image>
      </library_images>
      <library_effects><effect id="wood-fx"><profile_COMMON>
        <newparam sid="wood-surface"><surface type="2D"><init_from>wood-img</init_from></surface></newparam>
        <newparam sid="wood-sampler"><sampler2D>
          <source>wood-surface</source>
          <minfilter>LINEAR_MIPMAP_LINEAR</minfilter>
        </sampler2D></newparam>
        <technique sid="common"><lambert>
          <diffuse><texture texture="wood-sampler" texcoord="UVSET0"/></diffuse>
        </lambert></technique>
      </profile_COMMON></effect></library_effects>"#;
    let doc = Document::parse_str(&wrap(body), &LoadOptions::default()).unwrap();

    let wood = doc.find_image(&Name::new("wood-img")).unwrap();
    let plain = doc.find_image(&Name::new("plain-img")).unwrap();
    assert!(doc.image(wood).unwrap().requires_mipmaps);
    assert!(!doc.image(plain).unwrap().requires_mipmaps);
}
