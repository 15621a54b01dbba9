//! Load and generation settings.
//!
//! Both structs deserialize from JSON with every field optional, so the
//! inspector can take a partial options file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cache::{BlobCache, CacheMode};

/// Settings for [`crate::Document::load`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    pub cache_mode: CacheMode,

    /// Directory for blob files when caching is enabled.
    pub cache_dir: PathBuf,

    /// Parse geometries on the rayon pool.
    pub parallel_geometry: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            cache_mode: CacheMode::Disabled,
            cache_dir: PathBuf::from(".dae_cache"),
            parallel_geometry: true,
        }
    }
}

impl LoadOptions {
    /// Enable the blob cache rooted at `dir`.
    pub fn with_cache(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_mode = CacheMode::ReadWrite;
        self.cache_dir = dir.into();
        self
    }

    pub fn with_parallel_geometry(mut self, parallel: bool) -> Self {
        self.parallel_geometry = parallel;
        self
    }

    pub fn blob_cache(&self) -> BlobCache {
        BlobCache::with_mode(self.cache_mode, &self.cache_dir)
    }
}

/// Settings for mesh and scene generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    /// Decode texture images while generating scenes.
    pub load_textures: bool,

    /// Build a mip chain for images whose sampler asks for one.
    pub generate_mipmaps: bool,

    /// Load textures on the rayon pool.
    pub parallel_textures: bool,

    /// Directory relative texture paths resolve against. Defaults to the
    /// document's directory.
    pub base_dir: Option<PathBuf>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            load_textures: true,
            generate_mipmaps: true,
            parallel_textures: true,
            base_dir: None,
        }
    }
}

impl GeneratorOptions {
    pub fn with_textures(mut self, load: bool) -> Self {
        self.load_textures = load;
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: LoadOptions =
            serde_json::from_str(r#"{ "cache_mode": "read_write" }"#).unwrap();
        assert_eq!(options.cache_mode, CacheMode::ReadWrite);
        assert!(options.parallel_geometry);
        assert!(options.blob_cache().is_enabled());

        let gen: GeneratorOptions = serde_json::from_str(r#"{ "load_textures": false }"#).unwrap();
        assert!(!gen.load_textures);
        assert!(gen.generate_mipmaps);
    }

    #[test]
    fn test_with_cache() {
        let options = LoadOptions::default().with_cache("/tmp/blobs");
        assert_eq!(options.cache_mode, CacheMode::ReadWrite);
        assert_eq!(options.blob_cache().dir(), std::path::Path::new("/tmp/blobs"));
        assert!(!LoadOptions::default().blob_cache().is_enabled());
    }
}
