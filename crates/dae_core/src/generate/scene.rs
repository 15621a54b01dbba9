//! Renderer scene generated from a visual scene.
//!
//! Nodes mirror the visual scene's arena one to one, so a [`NodeId`] indexes
//! [`GeneratedScene::nodes`] directly. A node whose transformations are all
//! constant collapses to one matrix; a node with any animated cell keeps
//! its transformation list with each cell either a constant or a curve.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use dae_math::{Aabb, Mat4, Mat4Ext};

use super::curve::Curve;
use super::material::Material;
use super::mesh::Mesh;
use super::GeneratorContext;
use crate::collada::{
    AnimationId, Camera, CameraId, Document, GeometryId, ImageId, Light, LightId, NodeId,
    NodeItemPayload, NodeKind, SceneId, Transform, Transformation, UpAxis, Value,
};
use crate::error::{ColladaError, ColladaResult};
use crate::texture::{load_textures, Texture, TextureRequest};

/// One transformation cell.
#[derive(Clone, Debug)]
pub enum Scalar {
    Static(f32),
    Curve(Arc<Curve>),
}

impl Scalar {
    pub fn evaluate(&self, time: f32) -> f32 {
        match self {
            Scalar::Static(v) => *v,
            Scalar::Curve(curve) => curve.evaluate(time),
        }
    }

    pub fn is_animated(&self) -> bool {
        matches!(self, Scalar::Curve(_))
    }
}

#[derive(Clone, Debug)]
pub enum NodeTransform {
    Static(Mat4),

    /// Transformations in document order; the local matrix is their product.
    Dynamic(Vec<Transform<Scalar>>),
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub transform: NodeTransform,
}

impl SceneNode {
    pub fn is_animated(&self) -> bool {
        matches!(self.transform, NodeTransform::Dynamic(_))
    }

    pub fn local_matrix(&self, time: f32) -> Mat4 {
        match &self.transform {
            NodeTransform::Static(m) => *m,
            NodeTransform::Dynamic(transforms) => transforms
                .iter()
                .fold(Mat4::IDENTITY, |acc, t| acc * t.to_matrix_with(|s| s.evaluate(time))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CameraObject {
    pub name: String,
    pub node: NodeId,
    pub id: CameraId,
    pub camera: Camera,
}

#[derive(Clone, Debug)]
pub struct LightObject {
    pub name: String,
    pub node: NodeId,
    pub id: LightId,
    pub light: Light,
}

#[derive(Clone, Debug)]
pub struct MeshInstance {
    pub name: String,
    pub node: NodeId,
    pub geometry: GeometryId,

    /// Shared with the geometry's memoised mesh and with other instances.
    pub mesh: Arc<Mesh>,
}

#[derive(Debug)]
pub struct GeneratedScene {
    pub name: String,
    pub up_axis: UpAxis,
    pub nodes: Vec<SceneNode>,
    pub root: NodeId,
    pub cameras: Vec<CameraObject>,
    pub lights: Vec<LightObject>,
    pub meshes: Vec<MeshInstance>,

    /// Curves driving animated cells, one per animation.
    pub curves: Vec<Arc<Curve>>,

    /// Decoded images by document image.
    pub textures: BTreeMap<ImageId, Arc<Texture>>,

    /// Longest animation in the document.
    pub duration: f32,
}

impl GeneratedScene {
    pub fn node(&self, id: NodeId) -> &SceneNode {
        &self.nodes[id.0]
    }

    /// Product of local matrices from the root down to `node`.
    pub fn world_matrix(&self, node: NodeId, time: f32) -> Mat4 {
        let mut matrix = self.node(node).local_matrix(time);
        let mut parent = self.node(node).parent;
        while let Some(p) = parent {
            let n = self.node(p);
            matrix = n.local_matrix(time) * matrix;
            parent = n.parent;
        }
        matrix
    }

    /// World bounds of every mesh instance at `time`.
    pub fn world_bounds(&self, time: f32) -> Aabb {
        self.meshes
            .iter()
            .filter(|m| !m.mesh.bounds.is_empty())
            .map(|m| self.world_matrix(m.node, time).transform_aabb(&m.mesh.bounds))
            .fold(Aabb::empty(), |acc, b| Aabb::surrounding(&acc, &b))
    }

    pub fn is_animated(&self) -> bool {
        self.nodes.iter().any(SceneNode::is_animated)
    }

    /// Materials of every instanced mesh, in instance order.
    pub fn materials(&self) -> impl Iterator<Item = &Material> {
        self.meshes.iter().flat_map(|m| m.mesh.materials.iter())
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.mesh.triangle_count()).sum()
    }

    pub fn texture(&self, image: ImageId) -> Option<&Arc<Texture>> {
        self.textures.get(&image)
    }
}

/// Curves built so far, one per animation.
struct CurveTable<'d> {
    document: &'d Document,
    by_animation: HashMap<AnimationId, Option<Arc<Curve>>>,
    curves: Vec<Arc<Curve>>,
}

impl CurveTable<'_> {
    /// A curve for the cell, or its default when the animation cannot be
    /// turned into one.
    fn scalar(&mut self, value: &Value) -> Scalar {
        let (animation, default) = match *value {
            Value::Float(v) => return Scalar::Static(v),
            Value::Animated { animation, default } => (animation, default),
        };
        let document = self.document;
        let curves = &mut self.curves;
        let curve = self.by_animation.entry(animation).or_insert_with(|| {
            let result = document
                .animation(animation)
                .ok_or_else(|| ColladaError::UnresolvedReference {
                    category: "animation",
                    id: format!("#{}", animation.0),
                })
                .and_then(Curve::from_animation);
            match result {
                Ok(curve) => {
                    let curve = Arc::new(curve);
                    curves.push(Arc::clone(&curve));
                    Some(curve)
                }
                Err(e) => {
                    log::warn!("Animated cell keeps its default value: {}", e);
                    None
                }
            }
        });
        match curve {
            Some(c) => Scalar::Curve(Arc::clone(c)),
            None => Scalar::Static(default),
        }
    }

    fn node_transform<'t>(&mut self, transforms: impl Iterator<Item = &'t Transformation>) -> NodeTransform {
        let transforms: Vec<&Transformation> = transforms.collect();
        if transforms.iter().any(|t| t.is_animated()) {
            NodeTransform::Dynamic(transforms.iter().map(|t| t.map(|v| self.scalar(v))).collect())
        } else {
            NodeTransform::Static(
                transforms
                    .iter()
                    .fold(Mat4::IDENTITY, |acc, t| acc * t.static_matrix()),
            )
        }
    }
}

/// Build the renderer scene of a visual scene.
///
/// Mesh instances whose geometry fails to generate, and textures that fail
/// to load, are logged and left out.
pub fn generate_scene(
    ctx: &GeneratorContext,
    document: &Document,
    id: SceneId,
) -> ColladaResult<GeneratedScene> {
    let scene = document
        .scene(id)
        .ok_or_else(|| ColladaError::UnresolvedReference {
            category: "visual_scene",
            id: format!("#{}", id.0),
        })?;

    let mut table = CurveTable {
        document,
        by_animation: HashMap::new(),
        curves: Vec::new(),
    };
    let up_axis = document.up_axis();

    let mut nodes = Vec::with_capacity(scene.nodes.len());
    for node in &scene.nodes {
        let transform = if node.kind == NodeKind::FakeRoot {
            NodeTransform::Static(up_axis.to_y_up())
        } else {
            table.node_transform(node.transformations())
        };
        nodes.push(SceneNode {
            name: node.display_name().to_string(),
            parent: node.parent,
            children: node.children().collect(),
            transform,
        });
    }

    let mut cameras = Vec::new();
    let mut lights = Vec::new();
    let mut meshes = Vec::new();
    for node_id in scene.depth_first() {
        let node = scene.node(node_id);
        for item in &node.items {
            match &item.payload {
                NodeItemPayload::Camera(instance) => {
                    if let Some(camera) = document.camera(instance.camera) {
                        cameras.push(CameraObject {
                            name: instance_name(instance.name.as_deref(), node.display_name()),
                            node: node_id,
                            id: instance.camera,
                            camera: camera.clone(),
                        });
                    }
                }
                NodeItemPayload::Light(instance) => {
                    if let Some(light) = document.light(instance.light) {
                        lights.push(LightObject {
                            name: instance_name(instance.name.as_deref(), node.display_name()),
                            node: node_id,
                            id: instance.light,
                            light: light.clone(),
                        });
                    }
                }
                NodeItemPayload::Geometry(instance) => {
                    match document.geometry_mesh(instance.geometry, ctx) {
                        Ok(mesh) => meshes.push(MeshInstance {
                            name: instance_name(instance.name.as_deref(), node.display_name()),
                            node: node_id,
                            geometry: instance.geometry,
                            mesh,
                        }),
                        Err(e) => log::warn!(
                            "Skipping geometry instance on node '{}': {}",
                            node.display_name(),
                            e
                        ),
                    }
                }
                NodeItemPayload::SubNode(_) | NodeItemPayload::Transformation(_) => {}
            }
        }
    }

    let textures = if ctx.options.load_textures {
        collect_textures(ctx, &meshes)
    } else {
        BTreeMap::new()
    };

    let generated = GeneratedScene {
        name: scene.name.as_ref().unwrap_or(&scene.id).to_string(),
        up_axis,
        nodes,
        root: scene.fake_root,
        cameras,
        lights,
        meshes,
        curves: table.curves,
        textures,
        duration: document.max_animation_duration,
    };
    log::info!(
        "Generated scene '{}': {} nodes, {} meshes ({} triangles), {} cameras, {} lights, {} curves, {} textures",
        generated.name,
        generated.nodes.len(),
        generated.meshes.len(),
        generated.triangle_count(),
        generated.cameras.len(),
        generated.lights.len(),
        generated.curves.len(),
        generated.textures.len()
    );
    Ok(generated)
}

fn instance_name(instance: Option<&str>, node: &str) -> String {
    instance.unwrap_or(node).to_string()
}

fn collect_textures(ctx: &GeneratorContext, meshes: &[MeshInstance]) -> BTreeMap<ImageId, Arc<Texture>> {
    let mut requests: BTreeMap<ImageId, TextureRequest> = BTreeMap::new();
    for material in meshes.iter().flat_map(|m| m.mesh.materials.iter()) {
        for (_, binding) in material.textures() {
            let request = requests.entry(binding.image).or_insert_with(|| TextureRequest {
                image: binding.image,
                file_name: binding.file_name.clone(),
                mipmaps: false,
            });
            request.mipmaps |= binding.requires_mipmaps;
        }
    }
    if requests.is_empty() {
        return BTreeMap::new();
    }

    let requests: Vec<TextureRequest> = requests.into_values().collect();
    load_textures(
        &requests,
        ctx.base_dir(),
        ctx.options.generate_mipmaps,
        ctx.options.parallel_textures,
    )
    .into_iter()
    .filter_map(|(image, result)| match result {
        Ok(texture) => Some((image, texture)),
        Err(e) => {
            log::warn!("Texture for image #{} not loaded: {}", image.0, e);
            None
        }
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collada::Interpolation;
    use crate::generate::curve::Keyframe;
    use dae_math::Vec3;

    fn linear_curve(from: f32, to: f32) -> Arc<Curve> {
        let key = |time, value| Keyframe {
            time,
            value,
            interpolation: Interpolation::Linear,
            in_tangent: None,
            out_tangent: None,
        };
        Arc::new(Curve::new(vec![key(0.0, from), key(1.0, to)]))
    }

    #[test]
    fn test_dynamic_local_matrix_follows_curve() {
        let node = SceneNode {
            name: "mover".to_string(),
            parent: None,
            children: Vec::new(),
            transform: NodeTransform::Dynamic(vec![Transform::Translate([
                Scalar::Curve(linear_curve(0.0, 10.0)),
                Scalar::Static(1.0),
                Scalar::Static(0.0),
            ])]),
        };

        let m = node.local_matrix(0.5);
        assert_eq!(m.transform_point3(Vec3::ZERO), Vec3::new(5.0, 1.0, 0.0));
        assert!(node.is_animated());
    }

    #[test]
    fn test_world_matrix_composes_parents() {
        let translate =
            Transformation::Translate([Value::Float(2.0), Value::Float(0.0), Value::Float(0.0)]);
        let nodes = vec![
            SceneNode {
                name: "root".to_string(),
                parent: None,
                children: vec![NodeId(1)],
                transform: NodeTransform::Static(Mat4::from_scale(Vec3::splat(2.0))),
            },
            SceneNode {
                name: "child".to_string(),
                parent: Some(NodeId(0)),
                children: Vec::new(),
                transform: NodeTransform::Static(translate.static_matrix()),
            },
        ];
        let scene = GeneratedScene {
            name: "s".to_string(),
            up_axis: UpAxis::Y,
            nodes,
            root: NodeId(0),
            cameras: Vec::new(),
            lights: Vec::new(),
            meshes: Vec::new(),
            curves: Vec::new(),
            textures: BTreeMap::new(),
            duration: 0.0,
        };

        let p = scene.world_matrix(NodeId(1), 0.0).transform_point3(Vec3::ZERO);
        assert_eq!(p, Vec3::new(4.0, 0.0, 0.0));
        assert!(scene.world_bounds(0.0).is_empty());
        assert!(!scene.is_animated());
    }
}
