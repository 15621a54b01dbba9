//! `<image>` entries and the effect-local surface/sampler wrappers.

use std::str::FromStr;

use roxmltree::Node;
use serde::Serialize;

use super::id_map::{Identified, ImageId};
use super::xml;
use crate::error::{ColladaError, ColladaResult};
use crate::intern::Name;

#[derive(Clone, Debug, Serialize)]
pub struct Image {
    pub id: Name,
    pub name: Option<Name>,

    /// Path as written in `<init_from>`, with any `file://` scheme removed
    /// and `%XX` escapes decoded.
    pub file_name: String,

    /// Set when some sampler reading this image uses a mipmap min filter.
    pub requires_mipmaps: bool,
}

impl Identified for Image {
    fn id(&self) -> &Name {
        &self.id
    }

    fn name(&self) -> Option<&Name> {
        self.name.as_ref()
    }
}

impl Image {
    pub fn parse(node: Node<'_, '_>) -> ColladaResult<Self> {
        let id = xml::required_name_attr(&node, "id")?;
        let init_from = xml::required_child(node, "init_from")?;

        // COLLADA 1.5 nests the path in <ref>.
        let raw = match xml::child(init_from, "ref") {
            Some(r) => xml::text(&r),
            None => xml::text(&init_from),
        };
        if raw.is_empty() {
            return Err(ColladaError::InvalidValue {
                element: xml::describe(&init_from),
                value: String::new(),
            });
        }

        Ok(Self {
            id,
            name: xml::name_attr(&node, "name"),
            file_name: uri_to_path(raw),
            requires_mipmaps: false,
        })
    }
}

/// Strip a `file:` scheme and decode percent escapes.
fn uri_to_path(uri: &str) -> String {
    let path = uri
        .strip_prefix("file:///")
        .map(|rest| {
            // Keep the leading slash for unix paths, drop it before a drive letter.
            if rest.as_bytes().get(1) == Some(&b':') {
                rest.to_string()
            } else {
                format!("/{rest}")
            }
        })
        .or_else(|| uri.strip_prefix("file://").map(str::to_string))
        .unwrap_or_else(|| uri.to_string());

    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = |b: u8| (b as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Texture filter of a `<sampler2D>`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum SamplerFilter {
    #[default]
    None,
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl SamplerFilter {
    pub fn uses_mipmaps(self) -> bool {
        matches!(
            self,
            SamplerFilter::NearestMipmapNearest
                | SamplerFilter::LinearMipmapNearest
                | SamplerFilter::NearestMipmapLinear
                | SamplerFilter::LinearMipmapLinear
        )
    }
}

impl FromStr for SamplerFilter {
    type Err = ColladaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "NONE" => Self::None,
            "NEAREST" => Self::Nearest,
            "LINEAR" => Self::Linear,
            "NEAREST_MIPMAP_NEAREST" => Self::NearestMipmapNearest,
            "LINEAR_MIPMAP_NEAREST" => Self::LinearMipmapNearest,
            "NEAREST_MIPMAP_LINEAR" => Self::NearestMipmapLinear,
            "LINEAR_MIPMAP_LINEAR" => Self::LinearMipmapLinear,
            _ => {
                return Err(ColladaError::InvalidValue {
                    element: "sampler filter".to_string(),
                    value: s.to_string(),
                })
            }
        })
    }
}

/// `<newparam><surface>`: names the image a sampler reads.
#[derive(Clone, Debug, Serialize)]
pub struct Surface {
    pub sid: Name,
    pub image: ImageId,
}

/// `<newparam><sampler2D>`.
#[derive(Clone, Debug, Serialize)]
pub struct Sampler2D {
    pub sid: Name,
    pub surface: Name,
    pub image: ImageId,
    pub min_filter: SamplerFilter,
    pub mag_filter: SamplerFilter,
}

fn filter(node: Node<'_, '_>, name: &str) -> ColladaResult<SamplerFilter> {
    match xml::child(node, name) {
        Some(f) => xml::text(&f).parse(),
        None => Ok(SamplerFilter::default()),
    }
}

impl Sampler2D {
    /// Parse a `<sampler2D>`. Its `<source>` names a surface sid; some
    /// exporters point it straight at an image id instead.
    pub fn parse<F>(
        sid: Name,
        node: Node<'_, '_>,
        surfaces: &[Surface],
        find_image: F,
    ) -> ColladaResult<Self>
    where
        F: Fn(&Name) -> Option<ImageId>,
    {
        let surface = Name::new(xml::text(&xml::required_child(node, "source")?));
        let image = surfaces
            .iter()
            .find(|s| s.sid == surface)
            .map(|s| s.image)
            .or_else(|| find_image(&surface))
            .ok_or_else(|| ColladaError::UnresolvedReference {
                category: "surface",
                id: surface.to_string(),
            })?;

        Ok(Self {
            sid,
            surface,
            image,
            min_filter: filter(node, "minfilter")?,
            mag_filter: filter(node, "magfilter")?,
        })
    }
}
