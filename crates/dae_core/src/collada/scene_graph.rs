//! `<visual_scene>` trees and channel-target resolution.
//!
//! Each scene owns its nodes in an arena. A synthetic fake root sits above
//! the scene's top-level nodes so traversal always starts from one node.

use std::collections::VecDeque;
use std::sync::Arc;

use dae_math::Vec3;
use once_cell::sync::OnceCell;
use roxmltree::Node;
use serde::Serialize;

use super::camera::Camera;
use super::geometry::{BindVertexInput, Geometry, MaterialInstance};
use super::id_map::{CameraId, GeometryId, IdMap, Identified, LightId, MaterialId, NodeId};
use super::light::Light;
use super::material::Material;
use super::value::{Component, TransformKind, Transformation};
use super::xml;
use crate::error::{ColladaError, ColladaResult};
use crate::generate::scene::GeneratedScene;
use crate::intern::Name;

const PIVOT_SID: &str = "rotatePivot";
const PIVOT_INVERSE_SID: &str = "rotatePivotInverse";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    Node,
    Joint,
    FakeRoot,
}

#[derive(Clone, Debug, Serialize)]
pub struct CameraInstance {
    pub camera: CameraId,
    pub name: Option<Name>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LightInstance {
    pub light: LightId,
    pub name: Option<Name>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GeometryInstance {
    pub geometry: GeometryId,
    pub name: Option<Name>,
    pub materials: Vec<MaterialInstance>,
}

#[derive(Clone, Debug, Serialize)]
pub enum NodeItemPayload {
    SubNode(NodeId),
    Camera(CameraInstance),
    Geometry(GeometryInstance),
    Light(LightInstance),
    Transformation(Transformation),
}

/// One child of a node, in document order.
#[derive(Clone, Debug, Serialize)]
pub struct NodeItem {
    pub sid: Option<Name>,
    pub payload: NodeItemPayload,
}

impl NodeItem {
    /// Instance name used as a fallback channel anchor.
    fn instance_name(&self) -> Option<&Name> {
        match &self.payload {
            NodeItemPayload::Camera(c) => c.name.as_ref(),
            NodeItemPayload::Geometry(g) => g.name.as_ref(),
            NodeItemPayload::Light(l) => l.name.as_ref(),
            NodeItemPayload::SubNode(_) | NodeItemPayload::Transformation(_) => None,
        }
    }

    pub fn transformation(&self) -> Option<&Transformation> {
        match &self.payload {
            NodeItemPayload::Transformation(t) => Some(t),
            _ => None,
        }
    }

    pub fn target_kind(&self) -> Option<TargetKind> {
        Some(match &self.payload {
            NodeItemPayload::SubNode(_) => return None,
            NodeItemPayload::Camera(_) => TargetKind::CameraInstance,
            NodeItemPayload::Geometry(_) => TargetKind::GeometryInstance,
            NodeItemPayload::Light(_) => TargetKind::LightInstance,
            NodeItemPayload::Transformation(t) => TargetKind::Transformation(t.kind()),
        })
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SceneGraphNode {
    pub id: Option<Name>,
    pub name: Option<Name>,
    pub sid: Option<Name>,
    pub kind: NodeKind,

    /// Non-owning back reference; `None` only for the fake root.
    pub parent: Option<NodeId>,
    pub items: Vec<NodeItem>,
}

impl SceneGraphNode {
    /// Child nodes in document order.
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.items.iter().filter_map(|item| match item.payload {
            NodeItemPayload::SubNode(id) => Some(id),
            _ => None,
        })
    }

    /// Transformations in document order.
    pub fn transformations(&self) -> impl Iterator<Item = &Transformation> {
        self.items.iter().filter_map(NodeItem::transformation)
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("<unnamed>")
    }
}

/// What a resolved channel points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TargetKind {
    Transformation(TransformKind),
    CameraInstance,
    GeometryInstance,
    LightInstance,
}

/// A channel target resolved to arena handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedTarget {
    pub scene: usize,
    pub node: NodeId,
    /// Index into the node's `items`.
    pub item: usize,
    pub kind: TargetKind,
    pub component: Component,
}

/// Split `object/property.component`.
pub fn split_target_path(path: &str) -> ColladaResult<(&str, &str, Component)> {
    let fail = |reason: &str| ColladaError::UnresolvedTarget {
        path: path.to_string(),
        reason: reason.to_string(),
    };
    let (object, rest) = path.split_once('/').ok_or_else(|| fail("missing '/'"))?;
    let (property, component) = rest
        .rsplit_once('.')
        .ok_or_else(|| fail("missing component suffix"))?;
    if object.is_empty() || property.is_empty() {
        return Err(fail("empty object or property sid"));
    }
    let component = component
        .parse()
        .map_err(|_| fail("unknown component"))?;
    Ok((object, property, component))
}

/// Entity libraries instance elements resolve against.
pub struct SceneLibraries<'a> {
    pub cameras: &'a IdMap<CameraId, Camera>,
    pub geometries: &'a IdMap<GeometryId, Geometry>,
    pub lights: &'a IdMap<LightId, Light>,
    pub materials: &'a IdMap<MaterialId, Material>,

    /// Apply the LightWave Core pivot-inverse fixup.
    pub lightwave_core: bool,
}

#[derive(Debug)]
pub struct Scene {
    pub id: Name,
    pub name: Option<Name>,
    pub nodes: Vec<SceneGraphNode>,
    pub fake_root: NodeId,

    generated: OnceCell<Arc<GeneratedScene>>,
}

impl Identified for Scene {
    fn id(&self) -> &Name {
        &self.id
    }

    fn name(&self) -> Option<&Name> {
        self.name.as_ref()
    }
}

impl Scene {
    /// Parse a `<visual_scene>`. Material bindings found on geometry
    /// instances are returned so the caller can record them on the
    /// geometries.
    pub fn parse(
        node: Node<'_, '_>,
        libs: &SceneLibraries<'_>,
    ) -> ColladaResult<(Self, Vec<(GeometryId, MaterialInstance)>)> {
        let id = xml::required_name_attr(&node, "id")?;
        let mut builder = SceneBuilder {
            libs,
            nodes: vec![SceneGraphNode {
                id: None,
                name: Some(Name::new("__fake_root")),
                sid: None,
                kind: NodeKind::FakeRoot,
                parent: None,
                items: Vec::new(),
            }],
            bindings: Vec::new(),
        };
        let root = NodeId(0);

        for child in xml::elements(node) {
            match xml::tag(&child) {
                "node" => {
                    let sid = xml::name_attr(&child, "sid");
                    let sub = builder.parse_node(child, root)?;
                    builder.nodes[0].items.push(NodeItem {
                        sid,
                        payload: NodeItemPayload::SubNode(sub),
                    });
                }
                "extra" | "asset" | "evaluate_scene" => {}
                other => {
                    return Err(ColladaError::UnsupportedElement {
                        parent: xml::describe(&node),
                        element: other.to_string(),
                    })
                }
            }
        }

        let scene = Self {
            id,
            name: xml::name_attr(&node, "name"),
            nodes: builder.nodes,
            fake_root: root,
            generated: OnceCell::new(),
        };
        log::debug!("Parsed visual scene '{}' ({} nodes)", scene.id, scene.nodes.len() - 1);
        Ok((scene, builder.bindings))
    }

    pub fn node(&self, id: NodeId) -> &SceneGraphNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SceneGraphNode {
        &mut self.nodes[id.0]
    }

    pub fn root(&self) -> &SceneGraphNode {
        self.node(self.fake_root)
    }

    /// Breadth-first search for the first node matching `pred`, using an
    /// explicit work list.
    fn find_node(&self, mut pred: impl FnMut(&SceneGraphNode) -> bool) -> Option<NodeId> {
        let mut work = VecDeque::from([self.fake_root]);
        while let Some(current) = work.pop_front() {
            for child in self.node(current).children() {
                if pred(self.node(child)) {
                    return Some(child);
                }
                work.push_back(child);
            }
        }
        None
    }

    /// Node whose sid is `sid`; falls back to matching the node id, which
    /// is what exporters without sids write into channel targets.
    pub fn find_node_by_sid(&self, sid: &str) -> Option<NodeId> {
        self.find_node(|n| n.sid.as_deref() == Some(sid))
            .or_else(|| self.find_node(|n| n.id.as_deref() == Some(sid)))
    }

    /// Slow path: linear search by node name.
    pub fn find_node_by_name(&self, name: &str) -> Option<NodeId> {
        self.find_node(|n| n.name.as_deref() == Some(name))
    }

    /// Direct item of `node` whose sid (or instance name) is `sid`.
    pub fn find_item(&self, node: NodeId, sid: &str) -> Option<usize> {
        let items = &self.node(node).items;
        items
            .iter()
            .position(|item| {
                !matches!(item.payload, NodeItemPayload::SubNode(_))
                    && item.sid.as_deref() == Some(sid)
            })
            .or_else(|| {
                items
                    .iter()
                    .position(|item| item.instance_name().is_some_and(|n| n.as_str() == sid))
            })
    }

    /// Resolve `object/property.component` against this scene.
    pub fn resolve_channel_target(&self, scene: usize, path: &str) -> ColladaResult<ResolvedTarget> {
        let (object, property, component) = split_target_path(path)?;
        let fail = |reason: String| ColladaError::UnresolvedTarget {
            path: path.to_string(),
            reason,
        };

        let node = self
            .find_node_by_sid(object)
            .ok_or_else(|| fail(format!("no node with sid '{object}'")))?;
        let item = self.find_item(node, property).ok_or_else(|| {
            fail(format!(
                "node '{}' has no item with sid '{property}'",
                self.node(node).display_name()
            ))
        })?;
        let kind = self.node(node).items[item]
            .target_kind()
            .ok_or_else(|| fail("target is a node".to_string()))?;

        Ok(ResolvedTarget {
            scene,
            node,
            item,
            kind,
            component,
        })
    }

    /// Transformation item addressed by a resolved target.
    pub fn transformation_mut(&mut self, node: NodeId, item: usize) -> Option<&mut Transformation> {
        match &mut self.nodes.get_mut(node.0)?.items.get_mut(item)?.payload {
            NodeItemPayload::Transformation(t) => Some(t),
            _ => None,
        }
    }

    /// Depth-first node order, parents before children.
    pub fn depth_first(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.fake_root];
        while let Some(id) = stack.pop() {
            order.push(id);
            let children: Vec<NodeId> = self.node(id).children().collect();
            stack.extend(children.into_iter().rev());
        }
        order
    }

    pub(crate) fn generated(&self) -> &OnceCell<Arc<GeneratedScene>> {
        &self.generated
    }

    pub fn is_generated(&self) -> bool {
        self.generated.get().is_some()
    }
}

struct SceneBuilder<'l, 'a> {
    libs: &'l SceneLibraries<'a>,
    nodes: Vec<SceneGraphNode>,
    bindings: Vec<(GeometryId, MaterialInstance)>,
}

fn instance_url(node: &Node<'_, '_>) -> ColladaResult<Name> {
    xml::url_target(xml::required_attr(node, "url")?)
}

impl SceneBuilder<'_, '_> {
    fn parse_node(&mut self, node: Node<'_, '_>, parent: NodeId) -> ColladaResult<NodeId> {
        let id = NodeId(self.nodes.len());
        let kind = match xml::attr(&node, "type") {
            Some("JOINT") => NodeKind::Joint,
            _ => NodeKind::Node,
        };
        self.nodes.push(SceneGraphNode {
            id: xml::name_attr(&node, "id"),
            name: xml::name_attr(&node, "name"),
            sid: xml::name_attr(&node, "sid"),
            kind,
            parent: Some(parent),
            items: Vec::new(),
        });

        let mut pivot: Option<Vec3> = None;
        for child in xml::elements(node) {
            let tag = xml::tag(&child);
            let sid = xml::name_attr(&child, "sid");

            let payload = if TransformKind::from_tag(tag).is_some() {
                let mut transform = Transformation::parse(child)?;
                if self.libs.lightwave_core && tag == "translate" {
                    match sid.as_deref() {
                        Some(PIVOT_SID) => pivot = transform.translation(),
                        Some(PIVOT_INVERSE_SID) => {
                            // The exporter writes the pivot itself here.
                            if let Some(p) = pivot {
                                transform = Transformation::Translate([
                                    (-p.x).into(),
                                    (-p.y).into(),
                                    (-p.z).into(),
                                ]);
                            } else {
                                transform.negate_translation();
                            }
                        }
                        _ => {}
                    }
                }
                NodeItemPayload::Transformation(transform)
            } else {
                match tag {
                    "node" => NodeItemPayload::SubNode(self.parse_node(child, id)?),
                    "instance_camera" => {
                        let url = instance_url(&child)?;
                        NodeItemPayload::Camera(CameraInstance {
                            camera: self.libs.cameras.resolve(&url)?,
                            name: xml::name_attr(&child, "name"),
                        })
                    }
                    "instance_light" => {
                        let url = instance_url(&child)?;
                        NodeItemPayload::Light(LightInstance {
                            light: self.libs.lights.resolve(&url)?,
                            name: xml::name_attr(&child, "name"),
                        })
                    }
                    "instance_geometry" => NodeItemPayload::Geometry(self.parse_geometry_instance(child)?),
                    "extra" => continue,
                    other => {
                        return Err(ColladaError::UnsupportedElement {
                            parent: xml::describe(&node),
                            element: other.to_string(),
                        })
                    }
                }
            };

            self.nodes[id.0].items.push(NodeItem { sid, payload });
        }

        Ok(id)
    }

    fn parse_geometry_instance(&mut self, node: Node<'_, '_>) -> ColladaResult<GeometryInstance> {
        let url = instance_url(&node)?;
        let geometry = self.libs.geometries.resolve(&url)?;

        let mut materials = Vec::new();
        let technique = xml::child(node, "bind_material").and_then(|b| xml::child(b, "technique_common"));
        if let Some(technique) = technique {
            for instance in xml::children(technique, "instance_material") {
                let symbol = xml::required_name_attr(&instance, "symbol")?;
                let target = xml::url_target(xml::required_attr(&instance, "target")?)?;
                let material = self.libs.materials.resolve(&target)?;

                let vertex_inputs = xml::children(instance, "bind_vertex_input")
                    .map(|b| {
                        Ok(BindVertexInput {
                            semantic: xml::required_name_attr(&b, "semantic")?,
                            input_semantic: xml::required_attr(&b, "input_semantic")?.parse()?,
                            input_set: xml::parse_attr_or(&b, "input_set", 0u32)?,
                        })
                    })
                    .collect::<ColladaResult<Vec<_>>>()?;

                let binding = MaterialInstance {
                    symbol,
                    material,
                    vertex_inputs,
                };
                self.bindings.push((geometry, binding.clone()));
                materials.push(binding);
            }
        }

        Ok(GeometryInstance {
            geometry,
            name: xml::name_attr(&node, "name"),
            materials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collada::value::{Transform, Value};

    const SCENE: &str = r##"<visual_scene id="scene" name="Scene">
      <node id="root-node" sid="root" name="Root">
        <translate sid="translate">1 2 3</translate>
        <node id="arm" sid="arm" name="Arm">
          <rotate sid="rotateZ">0 0 1 30</rotate>
          <node id="hand" name="Hand">
            <scale sid="scale">1 1 1</scale>
          </node>
        </node>
        <extra><technique profile="x"/></extra>
      </node>
      <node id="pivoted" sid="pivoted">
        <translate sid="rotatePivot">4 5 6</translate>
        <rotate sid="rotateY">0 1 0 0</rotate>
        <translate sid="rotatePivotInverse">4 5 6</translate>
      </node>
    </visual_scene>"##;

    fn parse_with(xml: &str, lightwave_core: bool) -> ColladaResult<Scene> {
        let cameras = IdMap::new();
        let geometries = IdMap::new();
        let lights = IdMap::new();
        let materials = IdMap::new();
        let libs = SceneLibraries {
            cameras: &cameras,
            geometries: &geometries,
            lights: &lights,
            materials: &materials,
            lightwave_core,
        };
        let doc = roxmltree::Document::parse(xml).unwrap();
        Scene::parse(doc.root_element(), &libs).map(|(scene, _)| scene)
    }

    #[test]
    fn test_fake_root_anchors_top_level_nodes() {
        let scene = parse_with(SCENE, false).unwrap();
        let root = scene.root();
        assert_eq!(root.kind, NodeKind::FakeRoot);
        assert_eq!(root.children().count(), 2);

        let arm = scene.find_node_by_sid("arm").unwrap();
        let parent = scene.node(arm).parent.unwrap();
        assert_eq!(scene.node(parent).sid.as_deref(), Some("root"));
    }

    #[test]
    fn test_resolve_channel_target() {
        let scene = parse_with(SCENE, false).unwrap();
        let target = scene.resolve_channel_target(0, "arm/rotateZ.ANGLE").unwrap();

        assert_eq!(target.node, scene.find_node_by_sid("arm").unwrap());
        assert_eq!(target.item, 0);
        assert_eq!(target.kind, TargetKind::Transformation(TransformKind::Rotate));
        assert_eq!(target.component, Component::Angle);

        // Deterministic across calls.
        assert_eq!(
            scene.resolve_channel_target(0, "arm/rotateZ.ANGLE").unwrap(),
            target
        );
    }

    #[test]
    fn test_resolve_falls_back_to_node_id() {
        let scene = parse_with(SCENE, false).unwrap();
        let target = scene.resolve_channel_target(0, "hand/scale.X").unwrap();
        assert_eq!(scene.node(target.node).name.as_deref(), Some("Hand"));
    }

    #[test]
    fn test_unresolvable_targets_fail() {
        let scene = parse_with(SCENE, false).unwrap();
        for path in ["nobody/rotateZ.ANGLE", "arm/missing.X", "arm/rotateZ.W", "arm", "arm/rotateZ"] {
            assert!(
                matches!(
                    scene.resolve_channel_target(0, path),
                    Err(ColladaError::UnresolvedTarget { .. })
                ),
                "{path} should not resolve"
            );
        }
    }

    #[test]
    fn test_lightwave_pivot_inverse_is_negated() {
        let scene = parse_with(SCENE, true).unwrap();
        let node = scene.find_node_by_sid("pivoted").unwrap();
        let translations: Vec<_> = scene
            .node(node)
            .transformations()
            .filter_map(Transformation::translation)
            .collect();
        assert_eq!(translations, vec![Vec3::new(4.0, 5.0, 6.0), Vec3::new(-4.0, -5.0, -6.0)]);
    }

    #[test]
    fn test_pivot_untouched_without_lightwave_flag() {
        let scene = parse_with(SCENE, false).unwrap();
        let node = scene.find_node_by_sid("pivoted").unwrap();
        let last = scene.node(node).transformations().last().unwrap();
        assert_eq!(
            *last,
            Transform::Translate([Value::Float(4.0), Value::Float(5.0), Value::Float(6.0)])
        );
    }

    #[test]
    fn test_unknown_node_element_fails() {
        let xml = r##"<visual_scene id="s"><node id="n"><instance_node url="#x"/></node></visual_scene>"##;
        assert!(matches!(
            parse_with(xml, false),
            Err(ColladaError::UnsupportedElement { .. })
        ));
    }

    #[test]
    fn test_unresolved_instance_fails() {
        let xml = r##"<visual_scene id="s"><node id="n"><instance_camera url="#cam"/></node></visual_scene>"##;
        assert!(matches!(
            parse_with(xml, false),
            Err(ColladaError::UnresolvedReference { category: "camera", .. })
        ));
    }

    #[test]
    fn test_depth_first_visits_parents_first() {
        let scene = parse_with(SCENE, false).unwrap();
        let order = scene.depth_first();
        assert_eq!(order.len(), scene.nodes.len());
        for id in &order[1..] {
            let parent = scene.node(*id).parent.unwrap();
            let p = order.iter().position(|x| x == &parent).unwrap();
            let c = order.iter().position(|x| x == id).unwrap();
            assert!(p < c);
        }
    }
}
