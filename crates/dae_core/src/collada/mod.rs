//! COLLADA 1.4 document model.
//!
//! Parsing is strict: every `#id` reference must resolve inside the document
//! or the referencing entity is rejected. See [`document`] for the load
//! pipeline.

pub mod animation;
pub mod asset;
pub mod camera;
pub mod document;
pub mod effect;
pub mod geometry;
pub mod id_map;
pub mod image;
pub mod input;
pub mod light;
pub mod material;
pub mod scene_graph;
pub mod source;
pub mod value;
pub mod xml;

pub use animation::{Animation, Channel, Interpolation, Sampler};
pub use asset::{Asset, UpAxis};
pub use camera::{Camera, Projection};
pub use document::{Document, DocumentSummary};
pub use effect::{Effect, Shading, ShadingFactor, ShadingFactorItem, SHADING_FACTOR_ITEM_COUNT};
pub use geometry::{
    BindVertexInput, Geometry, GeometryMesh, IndexRange, MaterialInstance, Polylist,
};
pub use id_map::{
    AnimationId, CameraId, EffectId, EntityId, GeometryId, IdMap, Identified, ImageId, LightId,
    MaterialId, NodeId, SceneId, SourceId,
};
pub use image::{Image, Sampler2D, SamplerFilter, Surface};
pub use input::{Input, InputSet, Semantic, INPUT_TYPE_COUNT};
pub use light::{Light, LightKind};
pub use material::Material;
pub use scene_graph::{
    CameraInstance, GeometryInstance, LightInstance, NodeItem, NodeItemPayload, NodeKind,
    ResolvedTarget, Scene, SceneGraphNode, TargetKind,
};
pub use source::{FloatArray, NameArray, Source, SourceArray};
pub use value::{Component, Patch, Transform, TransformKind, Transformation, Value};
