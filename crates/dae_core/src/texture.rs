//! Texture loading for generated materials.
//!
//! Images referenced by effect samplers are decoded with the `image` crate
//! into linear float RGBA. Loading runs as a fan-out during scene
//! generation; each distinct file is decoded once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::collada::ImageId;
use crate::fanout::fan_out;

#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Failed to decode texture {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Texture {0} has no pixels")]
    Empty(PathBuf),
}

pub type TextureResult<T> = Result<T, TextureError>;

/// One level of a mip chain.
#[derive(Clone, Debug)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,

    /// Linear RGBA, row-major, top row first.
    pub pixels: Vec<[f32; 4]>,
}

impl MipLevel {
    fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        let idx = (y * self.width + x) as usize;
        self.pixels.get(idx).copied().unwrap_or([0.0, 0.0, 0.0, 1.0])
    }

    /// 2x2 box filter; odd edges clamp.
    fn downsample(&self) -> MipLevel {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let mut pixels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let x0 = (x * 2).min(self.width - 1);
                let y0 = (y * 2).min(self.height - 1);
                let x1 = (x0 + 1).min(self.width - 1);
                let y1 = (y0 + 1).min(self.height - 1);
                let taps = [
                    self.pixel(x0, y0),
                    self.pixel(x1, y0),
                    self.pixel(x0, y1),
                    self.pixel(x1, y1),
                ];
                let mut sum = [0.0f32; 4];
                for tap in taps {
                    for (s, c) in sum.iter_mut().zip(tap) {
                        *s += c;
                    }
                }
                pixels.push(sum.map(|c| c * 0.25));
            }
        }
        MipLevel {
            width,
            height,
            pixels,
        }
    }
}

/// A decoded texture; `levels[0]` is full resolution.
#[derive(Clone, Debug)]
pub struct Texture {
    pub levels: Vec<MipLevel>,

    /// Resolved file path.
    pub path: PathBuf,
}

impl Texture {
    pub fn new(width: u32, height: u32, pixels: Vec<[f32; 4]>, path: impl Into<PathBuf>) -> Self {
        Self {
            levels: vec![MipLevel {
                width,
                height,
                pixels,
            }],
            path: path.into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.levels[0].width
    }

    pub fn height(&self) -> u32 {
        self.levels[0].height
    }

    pub fn has_mipmaps(&self) -> bool {
        self.levels.len() > 1
    }

    /// Append levels down to 1x1. Does nothing if a chain already exists.
    pub fn generate_mipmaps(&mut self) {
        if self.has_mipmaps() {
            return;
        }
        while let Some(last) = self.levels.last() {
            if last.width == 1 && last.height == 1 {
                break;
            }
            let next = last.downsample();
            self.levels.push(next);
        }
    }

    /// Approximate memory use over all levels.
    pub fn size_bytes(&self) -> usize {
        self.levels
            .iter()
            .map(|l| l.pixels.len() * std::mem::size_of::<[f32; 4]>())
            .sum()
    }
}

/// An image to load for a generated scene.
#[derive(Clone, Debug)]
pub struct TextureRequest {
    pub image: ImageId,
    pub file_name: String,
    pub mipmaps: bool,
}

/// Resolve an image path against the document directory.
pub fn resolve_path(base_dir: Option<&Path>, file_name: &str) -> PathBuf {
    let path = Path::new(file_name);
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}

/// Load every requested image, one fan-out task per distinct file.
///
/// Results come back in request order. Images sharing a file share one
/// `Arc<Texture>`; a file is given a mip chain if any request asks for it.
pub fn load_textures(
    requests: &[TextureRequest],
    base_dir: Option<&Path>,
    generate_mipmaps: bool,
    parallel: bool,
) -> Vec<(ImageId, TextureResult<Arc<Texture>>)> {
    let mut files: Vec<(PathBuf, bool)> = Vec::new();
    let mut slot_of: HashMap<PathBuf, usize> = HashMap::new();
    let mut slots = Vec::with_capacity(requests.len());
    for request in requests {
        let path = resolve_path(base_dir, &request.file_name);
        let mipmaps = generate_mipmaps && request.mipmaps;
        let slot = *slot_of.entry(path.clone()).or_insert_with(|| {
            files.push((path, false));
            files.len() - 1
        });
        files[slot].1 |= mipmaps;
        slots.push(slot);
    }

    log::debug!(
        "Loading {} textures for {} images (parallel: {})",
        files.len(),
        requests.len(),
        parallel
    );
    let loaded: Vec<TextureResult<Arc<Texture>>> =
        fan_out("textures", files, parallel, |(path, mipmaps)| -> TextureResult<Arc<Texture>> {
            let mut texture = load_texture_file(&path)?;
            if mipmaps {
                texture.generate_mipmaps();
            }
            log::debug!(
                "Loaded texture: {} ({}x{}, {} levels, {:.1} KB)",
                path.display(),
                texture.width(),
                texture.height(),
                texture.levels.len(),
                texture.size_bytes() as f32 / 1024.0
            );
            Ok(Arc::new(texture))
        });

    requests
        .iter()
        .zip(slots)
        .map(|(request, slot)| {
            let result = match &loaded[slot] {
                Ok(texture) => Ok(Arc::clone(texture)),
                Err(e) => Err(shared_error(e)),
            };
            (request.image, result)
        })
        .collect()
}

/// Errors are not `Clone`; images sharing a failed file each get a copy
/// that keeps the message.
fn shared_error(error: &TextureError) -> TextureError {
    match error {
        TextureError::Empty(path) => TextureError::Empty(path.clone()),
        TextureError::Io(e) => TextureError::Io(std::io::Error::new(e.kind(), e.to_string())),
        TextureError::Decode { path, source } => TextureError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{}: {}", path.display(), source),
        )),
    }
}

/// Decode an image file into linear float RGBA.
pub fn load_texture_file(path: &Path) -> TextureResult<Texture> {
    let img = image::open(path).map_err(|source| match source {
        image::ImageError::IoError(e) => TextureError::Io(e),
        source => TextureError::Decode {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(TextureError::Empty(path.to_path_buf()));
    }

    let pixels: Vec<[f32; 4]> = rgba
        .pixels()
        .map(|p| {
            [
                srgb_to_linear(p[0]),
                srgb_to_linear(p[1]),
                srgb_to_linear(p[2]),
                p[3] as f32 / 255.0,
            ]
        })
        .collect();

    Ok(Texture::new(width, height, pixels, path))
}

fn srgb_to_linear(value: u8) -> f32 {
    let v = value as f32 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}
