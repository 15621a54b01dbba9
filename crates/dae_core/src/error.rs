//! Error types shared by the document model and the generators.

use thiserror::Error;

use crate::cache::CacheError;

/// Errors that can occur while loading a COLLADA document or generating
/// renderer objects from it.
#[derive(Error, Debug)]
pub enum ColladaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("<{parent}> is missing required element <{element}>")]
    MissingElement { parent: String, element: &'static str },

    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },

    #[error("Unresolved {category} reference '{id}'")]
    UnresolvedReference { category: &'static str, id: String },

    #[error("Duplicate {category} id '{id}'")]
    DuplicateId { category: &'static str, id: String },

    #[error("Invalid array '{id}': {reason}")]
    InvalidArray { id: String, reason: String },

    #[error("Invalid number format: {0}")]
    InvalidNumber(String),

    #[error("Invalid value '{value}' for <{element}>")]
    InvalidValue { element: String, value: String },

    #[error("Geometry '{geometry}' face {face} has {count} vertices, only triangles are supported")]
    NonTriangleFace {
        geometry: String,
        face: usize,
        count: u32,
    },

    #[error("Unsupported primitive <{primitive}> in geometry '{geometry}'")]
    UnsupportedPrimitive { geometry: String, primitive: String },

    #[error("Unsupported element <{element}> in <{parent}>")]
    UnsupportedElement { parent: String, element: String },

    #[error("Unresolved animation target '{path}': {reason}")]
    UnresolvedTarget { path: String, reason: String },

    #[error("Animation '{animation}' targets an unsupported {target}")]
    UnsupportedAnimationTarget { animation: String, target: String },

    #[error("Animation '{animation}' keyframe times are not ascending at key {key}")]
    UnsortedKeyframes { animation: String, key: usize },

    #[error("Texcoord '{texcoord}' of material '{material}' is not bound to any input set")]
    UnresolvedTexcoordBinding { material: String, texcoord: String },

    #[error("Geometry '{0}' has no POSITION input")]
    MissingPosition(String),

    #[error("Material symbol '{symbol}' of geometry '{geometry}' has no material instance")]
    MissingMaterialInstance { geometry: String, symbol: String },

    #[error("Index {index} out of range for source '{source_id}' with {count} elements")]
    IndexOutOfRange {
        source_id: String,
        index: u32,
        count: usize,
    },

    #[error("Blob cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Result type for document and generator operations.
pub type ColladaResult<T> = Result<T, ColladaError>;
