//! The parsed COLLADA document.
//!
//! Loading runs a fixed pipeline; every stage only reads what earlier
//! stages built:
//!
//! asset → images → effects → materials → cameras → geometries (fan-out) →
//! lights → visual scenes → animations → animation application
//!
//! Inside a library, an entity that fails to parse is logged and skipped.
//! Only an unreadable file or malformed XML fails the whole load.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use roxmltree::Node;
use serde::Serialize;

use super::animation::{self, Animation};
use super::asset::Asset;
use super::camera::Camera;
use super::effect::Effect;
use super::geometry::{self, Geometry};
use super::id_map::{
    AnimationId, CameraId, EffectId, GeometryId, IdMap, ImageId, LightId, MaterialId, SceneId,
};
use super::image::Image;
use super::light::Light;
use super::material::Material;
use super::scene_graph::{Scene, SceneLibraries, TargetKind};
use super::value::Patch;
use super::xml;
use crate::cache::{BlobCache, CacheMode};
use crate::error::{ColladaError, ColladaResult};
use crate::generate::mesh::{generate_mesh, Mesh};
use crate::generate::scene::{generate_scene, GeneratedScene};
use crate::generate::GeneratorContext;
use crate::intern::Name;
use crate::options::LoadOptions;

/// Entity counts and asset info, for reporting.
#[derive(Clone, Debug, Serialize)]
pub struct DocumentSummary {
    pub path: Option<PathBuf>,
    pub up_axis: super::asset::UpAxis,
    pub unit_meter: f32,
    pub authoring_tool: Option<String>,
    pub lightwave_core: bool,
    pub images: usize,
    pub effects: usize,
    pub materials: usize,
    pub cameras: usize,
    pub lights: usize,
    pub geometries: usize,
    pub polylists: usize,
    pub triangles: usize,
    pub scenes: usize,
    pub nodes: usize,
    pub animations: usize,
    pub animated_cells: usize,
    pub max_animation_duration: f32,
}

#[derive(Debug)]
pub struct Document {
    /// File the document was loaded from.
    pub path: Option<PathBuf>,
    pub asset: Asset,

    pub images: IdMap<ImageId, Image>,
    pub effects: IdMap<EffectId, Effect>,
    pub materials: IdMap<MaterialId, Material>,
    pub cameras: IdMap<CameraId, Camera>,
    pub geometries: IdMap<GeometryId, Geometry>,
    pub lights: IdMap<LightId, Light>,
    pub scenes: IdMap<SceneId, Scene>,
    pub animations: IdMap<AnimationId, Animation>,

    /// Scene named by `<scene><instance_visual_scene>`.
    pub active_scene: Option<SceneId>,

    /// Largest last-key time over all animations.
    pub max_animation_duration: f32,

    cache: BlobCache,
}

macro_rules! accessors {
    ($field:ident, $get:ident, $find:ident, $by_name:ident, $id:ty, $ty:ty) => {
        pub fn $get(&self, id: $id) -> Option<&$ty> {
            self.$field.get(id)
        }

        /// Handle for an interned id.
        pub fn $find(&self, id: &Name) -> Option<$id> {
            self.$field.find(id)
        }

        /// Slow path: linear scan by element name. Resolve once and keep the
        /// handle.
        pub fn $by_name(&self, name: &str) -> Option<$id> {
            self.$field.find_by_name(name)
        }
    };
}

/// Log and drop a failed entity.
fn keep<T>(category: &str, result: ColladaResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Skipping {}: {}", category, e);
            None
        }
    }
}

fn library_items<'a, 'input: 'a>(
    root: Node<'a, 'input>,
    library: &'a str,
    item: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    xml::children(root, library).flat_map(move |lib| xml::children(lib, item))
}

impl Document {
    /// Read and parse a `.dae` file.
    pub fn load(path: impl AsRef<Path>, options: &LoadOptions) -> ColladaResult<Self> {
        let path = path.as_ref();
        log::info!("Loading COLLADA document: {}", path.display());

        let text = fs::read_to_string(path)?;
        let mut document = Self::parse_str(&text, options)?;
        document.path = Some(path.to_path_buf());
        Ok(document)
    }

    /// Parse a document held in memory.
    pub fn parse_str(text: &str, options: &LoadOptions) -> ColladaResult<Self> {
        let xml = roxmltree::Document::parse_with_options(
            text,
            roxmltree::ParsingOptions {
                allow_dtd: true,
                ..Default::default()
            },
        )?;
        let root = xml.root_element();
        if xml::tag(&root) != "COLLADA" {
            return Err(ColladaError::InvalidValue {
                element: "document root".to_string(),
                value: xml::tag(&root).to_string(),
            });
        }

        let mut document = Self {
            path: None,
            asset: Asset::default(),
            images: IdMap::new(),
            effects: IdMap::new(),
            materials: IdMap::new(),
            cameras: IdMap::new(),
            geometries: IdMap::new(),
            lights: IdMap::new(),
            scenes: IdMap::new(),
            animations: IdMap::new(),
            active_scene: None,
            max_animation_duration: 0.0,
            cache: options.blob_cache(),
        };

        document.parse_asset(root)?;
        document.parse_images(root);
        document.parse_effects(root);
        document.parse_materials(root);
        document.parse_cameras(root);
        document.parse_geometries(root, options.parallel_geometry);
        document.parse_lights(root);
        document.parse_scenes(root);
        document.parse_animations(root);

        let patched = document.apply_animations();
        document.max_animation_duration = document
            .animations
            .iter()
            .map(Animation::duration)
            .fold(0.0, f32::max);

        log::info!(
            "Loaded {} geometries, {} scenes, {} animations ({} animated cells, max duration {:.3}s)",
            document.geometries.len(),
            document.scenes.len(),
            document.animations.len(),
            patched,
            document.max_animation_duration
        );
        Ok(document)
    }

    fn parse_asset(&mut self, root: Node<'_, '_>) -> ColladaResult<()> {
        if let Some(asset) = xml::child(root, "asset") {
            self.asset = Asset::parse(asset)?;
        }
        if self.asset.lightwave_core {
            log::info!("LightWave Core export detected; pivot fixup enabled");
        }
        Ok(())
    }

    fn parse_images(&mut self, root: Node<'_, '_>) {
        for node in library_items(root, "library_images", "image") {
            if let Some(image) = keep("image", Image::parse(node)) {
                keep("image", self.images.insert(image));
            }
        }
    }

    fn parse_effects(&mut self, root: Node<'_, '_>) {
        for node in library_items(root, "library_effects", "effect") {
            let images = &self.images;
            let Some(effect) = keep("effect", Effect::parse(node, |id| images.find(id))) else {
                continue;
            };
            for sampler in &effect.samplers {
                if sampler.min_filter.uses_mipmaps() {
                    self.images[sampler.image].requires_mipmaps = true;
                }
            }
            keep("effect", self.effects.insert(effect));
        }
    }

    fn parse_materials(&mut self, root: Node<'_, '_>) {
        for node in library_items(root, "library_materials", "material") {
            let effects = &self.effects;
            if let Some(material) = keep("material", Material::parse(node, |id| effects.find(id))) {
                keep("material", self.materials.insert(material));
            }
        }
    }

    fn parse_cameras(&mut self, root: Node<'_, '_>) {
        for node in library_items(root, "library_cameras", "camera") {
            if let Some(camera) = keep("camera", Camera::parse(node)) {
                keep("camera", self.cameras.insert(camera));
            }
        }
    }

    fn parse_geometries(&mut self, root: Node<'_, '_>, parallel: bool) {
        for library in xml::children(root, "library_geometries") {
            for result in geometry::parse_library(library, &self.cache, parallel) {
                if let Some(geometry) = keep("geometry", result) {
                    keep("geometry", self.geometries.insert(geometry));
                }
            }
        }
    }

    fn parse_lights(&mut self, root: Node<'_, '_>) {
        for node in library_items(root, "library_lights", "light") {
            if let Some(light) = keep("light", Light::parse(node)) {
                keep("light", self.lights.insert(light));
            }
        }
    }

    fn parse_scenes(&mut self, root: Node<'_, '_>) {
        let mut bindings = Vec::new();
        for node in library_items(root, "library_visual_scenes", "visual_scene") {
            let libs = SceneLibraries {
                cameras: &self.cameras,
                geometries: &self.geometries,
                lights: &self.lights,
                materials: &self.materials,
                lightwave_core: self.asset.lightwave_core,
            };
            if let Some((scene, scene_bindings)) = keep("visual scene", Scene::parse(node, &libs)) {
                if keep("visual scene", self.scenes.insert(scene)).is_some() {
                    bindings.extend(scene_bindings);
                }
            }
        }
        for (geometry, binding) in bindings {
            self.geometries[geometry].add_material_instance(binding);
        }

        let instance = xml::child(root, "scene").and_then(|s| xml::child(s, "instance_visual_scene"));
        self.active_scene = match instance {
            Some(node) => {
                let url = xml::required_attr(&node, "url").and_then(xml::url_target);
                keep("scene instance", url.and_then(|u| self.scenes.resolve(&u)))
            }
            None => None,
        };
    }

    fn parse_animations(&mut self, root: Node<'_, '_>) {
        for library in xml::children(root, "library_animations") {
            for result in animation::parse_library(library, &self.cache) {
                if let Some(animation) = keep("animation", result) {
                    keep("animation", self.animations.insert(animation));
                }
            }
        }
    }

    /// Resolve every channel and point its target cell at the animation.
    ///
    /// Returns how many cells changed. Running it again changes nothing:
    /// already animated cells keep their animation and original default.
    pub fn apply_animations(&mut self) -> usize {
        let mut patched = 0;
        for index in 0..self.animations.len() {
            let id = AnimationId(index);
            let target = match self.animations[id].channel.target {
                Some(target) => target,
                None => {
                    let path = &self.animations[id].channel.target_path;
                    let mut last_err = None;
                    let mut found = None;
                    for (s, scene) in self.scenes.iter().enumerate() {
                        match scene.resolve_channel_target(s, path) {
                            Ok(t) => {
                                found = Some(t);
                                break;
                            }
                            Err(e) => last_err = Some(e),
                        }
                    }
                    match found {
                        Some(t) => {
                            self.animations[id].channel.target = Some(t);
                            t
                        }
                        None => {
                            let err = last_err.unwrap_or_else(|| ColladaError::UnresolvedTarget {
                                path: path.clone(),
                                reason: "document has no visual scene".to_string(),
                            });
                            log::warn!("Skipping animation '{}': {}", self.animations[id].id, err);
                            continue;
                        }
                    }
                }
            };

            let unsupported = |what: &str| ColladaError::UnsupportedAnimationTarget {
                animation: self.animations[id].id.to_string(),
                target: what.to_string(),
            };
            let TargetKind::Transformation(kind) = target.kind else {
                log::warn!("{}", unsupported(&format!("{:?}", target.kind)));
                continue;
            };
            let unsupported_err = unsupported(&format!("{} component {:?}", kind, target.component));

            let scene = &mut self.scenes[SceneId(target.scene)];
            let cell = scene
                .transformation_mut(target.node, target.item)
                .and_then(|t| t.cell_mut(target.component));
            match cell.map(|c| c.animate(id)) {
                Some(Patch::Applied) => patched += 1,
                Some(Patch::Unchanged) => {}
                Some(Patch::Conflict(other)) => log::warn!(
                    "Animation '{}' targets a cell already driven by '{}'",
                    self.animations[id].id,
                    self.animations[other].id
                ),
                None => log::warn!("{}", unsupported_err),
            }
        }
        patched
    }

    accessors!(images, image, find_image, image_by_name, ImageId, Image);
    accessors!(effects, effect, find_effect, effect_by_name, EffectId, Effect);
    accessors!(materials, material, find_material, material_by_name, MaterialId, Material);
    accessors!(cameras, camera, find_camera, camera_by_name, CameraId, Camera);
    accessors!(lights, light, find_light, light_by_name, LightId, Light);
    accessors!(geometries, geometry, find_geometry, geometry_by_name, GeometryId, Geometry);
    accessors!(scenes, scene, find_scene, scene_by_name, SceneId, Scene);
    accessors!(animations, animation, find_animation, animation_by_name, AnimationId, Animation);

    pub fn up_axis(&self) -> super::asset::UpAxis {
        self.asset.up_axis
    }

    pub fn cache(&self) -> &BlobCache {
        &self.cache
    }

    pub fn cache_mode(&self) -> CacheMode {
        self.cache.mode()
    }

    /// Directory of the source file, for resolving relative image paths.
    pub fn base_dir(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }

    /// Scene to show by default: the instanced one, else the first.
    pub fn default_scene(&self) -> Option<SceneId> {
        self.active_scene
            .or_else(|| (!self.scenes.is_empty()).then_some(SceneId(0)))
    }

    /// Merged renderer mesh of a geometry, generated on first use.
    ///
    /// Concurrent first calls for the same geometry are serialised by a
    /// once-cell; only one of them generates.
    pub fn geometry_mesh(&self, id: GeometryId, ctx: &GeneratorContext) -> ColladaResult<Arc<Mesh>> {
        let geometry = self.geometries.get(id).ok_or_else(|| ColladaError::UnresolvedReference {
            category: "geometry",
            id: format!("#{}", id.0),
        })?;
        geometry
            .generated()
            .get_or_try_init(|| generate_mesh(ctx, self, id).map(Arc::new))
            .cloned()
    }

    /// Renderer scene of a visual scene, generated on first use.
    pub fn generated_scene(
        &self,
        id: SceneId,
        ctx: &GeneratorContext,
    ) -> ColladaResult<Arc<GeneratedScene>> {
        let scene = self.scenes.get(id).ok_or_else(|| ColladaError::UnresolvedReference {
            category: "visual_scene",
            id: format!("#{}", id.0),
        })?;
        scene
            .generated()
            .get_or_try_init(|| generate_scene(ctx, self, id).map(Arc::new))
            .cloned()
    }

    pub fn summary(&self) -> DocumentSummary {
        let polylists = self.geometries.iter().map(|g| g.mesh.polylists.len()).sum();
        let triangles = self
            .geometries
            .iter()
            .flat_map(|g| g.mesh.polylists.iter())
            .map(|p| p.face_count())
            .sum();
        let nodes = self.scenes.iter().map(|s| s.nodes.len() - 1).sum();
        let animated_cells = self
            .scenes
            .iter()
            .flat_map(|s| s.nodes.iter())
            .flat_map(|n| n.transformations())
            .flat_map(|t| t.cells())
            .filter(|c| c.is_animated())
            .count();

        DocumentSummary {
            path: self.path.clone(),
            up_axis: self.asset.up_axis,
            unit_meter: self.asset.unit_meter,
            authoring_tool: self.asset.authoring_tool.clone(),
            lightwave_core: self.asset.lightwave_core,
            images: self.images.len(),
            effects: self.effects.len(),
            materials: self.materials.len(),
            cameras: self.cameras.len(),
            lights: self.lights.len(),
            geometries: self.geometries.len(),
            polylists,
            triangles,
            scenes: self.scenes.len(),
            nodes,
            animations: self.animations.len(),
            animated_cells,
            max_animation_duration: self.max_animation_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
            <COLLADA xmlns="http://www.collada.org/2005/11/COLLADASchema" version="1.4.1">{body}</COLLADA>"#
        )
    }

    #[test]
    fn test_missing_up_axis_matches_y_up() {
        let a = Document::parse_str(&wrap("<asset/>"), &LoadOptions::default()).unwrap();
        let b = Document::parse_str(
            &wrap("<asset><up_axis>Y_UP</up_axis></asset>"),
            &LoadOptions::default(),
        )
        .unwrap();
        assert_eq!(a.up_axis(), b.up_axis());
        assert_eq!(a.up_axis().to_y_up(), b.up_axis().to_y_up());
    }

    #[test]
    fn test_non_collada_root_fails() {
        assert!(Document::parse_str("<scene/>", &LoadOptions::default()).is_err());
        assert!(matches!(
            Document::parse_str("<COLLADA>", &LoadOptions::default()),
            Err(ColladaError::Xml(_))
        ));
    }

    #[test]
    fn test_bad_camera_does_not_stop_later_cameras() {
        let body = r#"<library_cameras>
            <camera id="broken"><optics/></camera>
            <camera id="ok"><optics><technique_common><perspective><yfov>45</yfov></perspective></technique_common></optics></camera>
        </library_cameras>"#;
        let doc = Document::parse_str(&wrap(body), &LoadOptions::default()).unwrap();
        assert_eq!(doc.cameras.len(), 1);
        assert!(doc.find_camera(&Name::new("ok")).is_some());
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let body = r#"<library_lights>
            <light id="l" name="First"><technique_common><point/></technique_common></light>
            <light id="l" name="Second"><technique_common><point/></technique_common></light>
        </library_lights>"#;
        let doc = Document::parse_str(&wrap(body), &LoadOptions::default()).unwrap();
        assert_eq!(doc.lights.len(), 1);
        assert_eq!(doc.light_by_name("First"), Some(LightId(0)));
        assert_eq!(doc.light_by_name("Second"), None);
    }
}
