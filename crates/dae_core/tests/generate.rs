use std::path::PathBuf;
use std::sync::Arc;

use approx::assert_relative_eq;
use dae_core::collada::{ShadingFactorItem, Shading};
use dae_core::generate::{MaterialProperty, StreamKind};
use dae_core::{Document, GeneratorContext, GeneratorOptions, LoadOptions, Name};
use dae_math::Vec3;

fn load_quad() -> Document {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/animated_quad.dae");
    Document::load(path, &LoadOptions::default()).unwrap()
}

fn no_textures(doc: &Document) -> GeneratorContext {
    GeneratorContext::for_document(doc, GeneratorOptions::default().with_textures(false))
}

#[test]
fn test_mesh_streams_and_material() {
    let doc = load_quad();
    let ctx = no_textures(&doc);
    let geometry = doc.find_geometry(&Name::new("quad")).unwrap();
    let mesh = doc.geometry_mesh(geometry, &ctx).unwrap();

    assert_eq!(mesh.layers.len(), 1);
    assert_eq!(mesh.triangle_count(), 2);
    assert_eq!(mesh.index_count(), 6);
    assert!(!mesh.has_generated_normals());

    let layer = &mesh.layers[0];
    let kinds: Vec<_> = layer.streams.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![StreamKind::Normal, StreamKind::Texcoord, StreamKind::Position]);

    let pass = &layer.passes[0];
    let positions = pass.stream(StreamKind::Position, 0).unwrap();
    assert_eq!(positions.indices, vec![0, 1, 2, 0, 2, 3]);
    assert_eq!((positions.range.min, positions.range.max), (0, 3));

    let material = &mesh.materials[pass.material];
    assert_eq!(material.name, "Wood");
    assert_eq!(material.shading, Shading::Lambert);
    match material.property(ShadingFactorItem::Diffuse) {
        MaterialProperty::Texture(binding) => {
            assert_eq!(binding.file_name, "wood.png");
            assert_eq!(binding.texcoord_set, 0);
        }
        other => panic!("expected a texture, got {:?}", other),
    }
}

#[test]
fn test_geometry_mesh_is_memoised() {
    let doc = load_quad();
    let ctx = no_textures(&doc);
    let geometry = doc.find_geometry(&Name::new("quad")).unwrap();
    assert!(!doc.geometries[geometry].is_generated());

    let first = doc.geometry_mesh(geometry, &ctx).unwrap();
    let second = doc.geometry_mesh(geometry, &ctx).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(doc.geometries[geometry].is_generated());
}

#[test]
fn test_triangle_meshes_keep_uvs() {
    let doc = load_quad();
    let ctx = no_textures(&doc);
    let geometry = doc.find_geometry(&Name::new("quad")).unwrap();
    let triangles = doc.geometry_mesh(geometry, &ctx).unwrap().to_triangle_meshes();

    assert_eq!(triangles.len(), 1);
    let tri = &triangles[0];
    assert_eq!(tri.vertex_count(), 4);
    assert_eq!(tri.triangle_count(), 2);
    assert!(tri.has_uvs());
    assert_eq!(tri.normals.as_ref().unwrap()[0], Vec3::Z);
}

#[test]
fn test_generated_scene_objects() {
    let doc = load_quad();
    let ctx = no_textures(&doc);
    let scene_id = doc.default_scene().unwrap();
    let scene = doc.generated_scene(scene_id, &ctx).unwrap();

    assert_eq!(scene.name, "Scene");
    assert_eq!(scene.nodes.len(), 5);
    assert_eq!(scene.meshes.len(), 1);
    assert_eq!(scene.cameras.len(), 1);
    assert_eq!(scene.lights.len(), 1);
    assert_eq!(scene.curves.len(), 2);
    assert_eq!(scene.duration, 5.0);
    assert!(scene.is_animated());
    assert!(scene.textures.is_empty());

    let camera = &scene.cameras[0];
    let eye = scene.world_matrix(camera.node, 0.0).transform_point3(Vec3::ZERO);
    assert!(eye.abs_diff_eq(Vec3::new(0.0, 0.0, 10.0), 1e-5));
}

#[test]
fn test_generated_scene_is_memoised() {
    let doc = load_quad();
    let ctx = no_textures(&doc);
    let scene_id = doc.default_scene().unwrap();
    assert!(!doc.scenes[scene_id].is_generated());

    let first = doc.generated_scene(scene_id, &ctx).unwrap();
    let second = doc.generated_scene(scene_id, &ctx).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(doc.scenes[scene_id].is_generated());

    // Instances share the geometry's memoised mesh.
    let geometry = first.meshes[0].geometry;
    let mesh = doc.geometry_mesh(geometry, &ctx).unwrap();
    assert!(Arc::ptr_eq(&first.meshes[0].mesh, &mesh));
}

#[test]
fn test_animated_world_matrix() {
    let doc = load_quad();
    let ctx = no_textures(&doc);
    let scene = doc.generated_scene(doc.default_scene().unwrap(), &ctx).unwrap();
    let quad = scene.meshes[0].node;

    // translate(x(t), 1, 0) * rotateZ(angle(t)); the translation is unaffected by the rotation.
    let origin = scene.world_matrix(quad, 1.0).transform_point3(Vec3::ZERO);
    assert_relative_eq!(origin.x, 5.0, epsilon = 1e-5);
    assert_relative_eq!(origin.y, 1.0, epsilon = 1e-5);

    let later = scene.world_matrix(quad, 2.0).transform_point3(Vec3::ZERO);
    assert_relative_eq!(later.x, 10.0, epsilon = 1e-5);

    let bounds = scene.world_bounds(0.0);
    assert!(bounds.min().abs_diff_eq(Vec3::new(0.0, 1.0, 0.0), 1e-5));
    assert!(bounds.max().abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), 1e-5));
}

#[test]
fn test_missing_texture_does_not_fail_scene() {
    let doc = load_quad();
    let ctx = GeneratorContext::for_document(&doc, GeneratorOptions::default());
    let scene = doc.generated_scene(doc.default_scene().unwrap(), &ctx).unwrap();

    assert_eq!(scene.meshes.len(), 1);
    assert!(scene.textures.is_empty());
}
