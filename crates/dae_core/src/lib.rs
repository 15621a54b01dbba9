//! DAE Core - COLLADA document model and renderer-facing generation.
//!
//! This crate provides:
//!
//! - **Document model**: strict parsing of a COLLADA 1.4 subset into typed,
//!   arena-backed entities ([`collada`])
//! - **Animation resolution**: channel targets resolved to transformation
//!   cells and patched in place at load
//! - **Generation**: merged meshes, materials, curves and scenes with static
//!   or animated node transforms ([`generate`])
//! - **Blob cache**: optional on-disk cache of parsed arrays ([`cache`])
//!
//! # Example
//!
//! ```ignore
//! use dae_core::{Document, GeneratorContext, GeneratorOptions, LoadOptions};
//!
//! let document = Document::load("scene.dae", &LoadOptions::default())?;
//! let ctx = GeneratorContext::for_document(&document, GeneratorOptions::default());
//! if let Some(id) = document.default_scene() {
//!     let scene = document.generated_scene(id, &ctx)?;
//!     println!("{} meshes, {:.2}s of animation", scene.meshes.len(), scene.duration);
//! }
//! ```

pub mod cache;
pub mod collada;
pub mod error;
pub mod fanout;
pub mod generate;
pub mod intern;
pub mod options;
pub mod texture;

// Re-export commonly used types
pub use cache::{BlobCache, CacheMode};
pub use collada::{Document, DocumentSummary, GeometryId, SceneId, UpAxis};
pub use error::{ColladaError, ColladaResult};
pub use generate::{GeneratedScene, GeneratorContext, Mesh, TriangleMesh};
pub use intern::Name;
pub use options::{GeneratorOptions, LoadOptions};
pub use texture::{Texture, TextureError};
