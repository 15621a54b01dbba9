//! Renderer-facing generation from a parsed [`Document`].
//!
//! - [`mesh`]: one merged, multi-stream mesh per geometry
//! - [`material`]: shading model and factors resolved from effects
//! - [`curve`]: evaluable keyframe curves from animations
//! - [`scene`]: node hierarchy with static or animated transforms, cameras,
//!   lights, mesh instances and textures
//!
//! Results are memoised on the document; see [`Document::geometry_mesh`] and
//! [`Document::generated_scene`].

pub mod curve;
pub mod material;
pub mod mesh;
pub mod scene;
pub mod triangles;

use std::path::{Path, PathBuf};

use crate::cache::BlobCache;
use crate::collada::Document;
use crate::options::GeneratorOptions;

pub use curve::{Curve, Keyframe};
pub use material::{Material, MaterialProperty, TextureBinding};
pub use mesh::{DataStream, LayerPass, Mesh, MeshLayer, PassStream, StreamKind};
pub use scene::{GeneratedScene, NodeTransform, Scalar, SceneNode};
pub use triangles::TriangleMesh;

/// Everything a generator needs besides the document itself.
#[derive(Clone, Debug, Default)]
pub struct GeneratorContext {
    pub options: GeneratorOptions,
    pub cache: BlobCache,
    pub base_dir: Option<PathBuf>,
}

impl GeneratorContext {
    /// Context with caching disabled and no base directory.
    pub fn new(options: GeneratorOptions) -> Self {
        Self {
            base_dir: options.base_dir.clone(),
            options,
            cache: BlobCache::disabled(),
        }
    }

    /// Context sharing the document's blob cache. Relative image paths
    /// resolve against the options' base directory, else the document's.
    pub fn for_document(document: &Document, options: GeneratorOptions) -> Self {
        let base_dir = options
            .base_dir
            .clone()
            .or_else(|| document.base_dir().map(Path::to_path_buf));
        Self {
            options,
            cache: document.cache().clone(),
            base_dir,
        }
    }

    pub fn with_cache(mut self, cache: BlobCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }
}
