//! `<effect>` parsing (profile_COMMON only).

use dae_math::Vec4;
use roxmltree::Node;
use serde::Serialize;

use super::id_map::{Identified, ImageId};
use super::image::{Sampler2D, Surface};
use super::xml;
use crate::error::{ColladaError, ColladaResult};
use crate::intern::Name;

/// Declared shading model of a technique.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Shading {
    Constant,
    Lambert,
    Phong,
    Blinn,
    #[default]
    Unknown,
}

impl Shading {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "constant" => Some(Shading::Constant),
            "lambert" => Some(Shading::Lambert),
            "phong" => Some(Shading::Phong),
            "blinn" => Some(Shading::Blinn),
            _ => None,
        }
    }
}

/// Shading inputs an effect can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ShadingFactorItem {
    Ambient,
    Diffuse,
    /// Read from `<emission>`.
    Luminosity,
    Shininess,
    Specular,
    Transparency,
}

pub const SHADING_FACTOR_ITEM_COUNT: usize = 6;

impl ShadingFactorItem {
    pub const ALL: [ShadingFactorItem; SHADING_FACTOR_ITEM_COUNT] = [
        ShadingFactorItem::Ambient,
        ShadingFactorItem::Diffuse,
        ShadingFactorItem::Luminosity,
        ShadingFactorItem::Shininess,
        ShadingFactorItem::Specular,
        ShadingFactorItem::Transparency,
    ];

    fn tag(self) -> &'static str {
        match self {
            ShadingFactorItem::Ambient => "ambient",
            ShadingFactorItem::Diffuse => "diffuse",
            ShadingFactorItem::Luminosity => "emission",
            ShadingFactorItem::Shininess => "shininess",
            ShadingFactorItem::Specular => "specular",
            ShadingFactorItem::Transparency => "transparency",
        }
    }
}

/// Value of one shading input.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub enum ShadingFactor {
    #[default]
    None,
    Float(f32),
    Color(Vec4),
    Texture {
        /// Sid of the effect's `<sampler2D>` newparam.
        sampler: Name,
        /// Texcoord symbol, bound to an input set by `<bind_vertex_input>`.
        texcoord: Name,
    },
}

impl ShadingFactor {
    pub fn is_none(&self) -> bool {
        matches!(self, ShadingFactor::None)
    }

    fn parse(node: Node<'_, '_>) -> ColladaResult<Self> {
        if let Some(color) = xml::child(node, "color") {
            let c: [f32; 4] = match xml::parse_floats(xml::text(&color))?.as_slice() {
                [r, g, b] => [*r, *g, *b, 1.0],
                [r, g, b, a] => [*r, *g, *b, *a],
                _ => {
                    return Err(ColladaError::InvalidValue {
                        element: xml::describe(&color),
                        value: xml::text(&color).to_string(),
                    })
                }
            };
            return Ok(ShadingFactor::Color(Vec4::from_array(c)));
        }
        if let Some(float) = xml::child(node, "float") {
            return Ok(ShadingFactor::Float(xml::parse_f32(xml::text(&float))?));
        }
        if let Some(texture) = xml::child(node, "texture") {
            return Ok(ShadingFactor::Texture {
                sampler: xml::required_name_attr(&texture, "texture")?,
                texcoord: xml::name_attr(&texture, "texcoord").unwrap_or_default(),
            });
        }
        if xml::child(node, "param").is_some() {
            log::debug!("Ignoring <param> reference in {}", xml::describe(&node));
        }
        Ok(ShadingFactor::None)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Effect {
    pub id: Name,
    pub name: Option<Name>,
    pub declared_shading: Shading,
    pub factors: [ShadingFactor; SHADING_FACTOR_ITEM_COUNT],
    pub surfaces: Vec<Surface>,
    pub samplers: Vec<Sampler2D>,

    /// LightWave `<extra>` hint naming the UV map.
    pub uv_map_name: Option<Name>,
}

impl Identified for Effect {
    fn id(&self) -> &Name {
        &self.id
    }

    fn name(&self) -> Option<&Name> {
        self.name.as_ref()
    }
}

impl Effect {
    /// Parse an `<effect>`; `find_image` resolves surface `<init_from>` ids.
    pub fn parse<F>(node: Node<'_, '_>, find_image: F) -> ColladaResult<Self>
    where
        F: Fn(&Name) -> Option<ImageId>,
    {
        let id = xml::required_name_attr(&node, "id")?;
        let profile = xml::required_child(node, "profile_COMMON")?;

        let mut surfaces = Vec::new();
        let mut sampler_nodes = Vec::new();
        for param in xml::children(profile, "newparam") {
            let sid = xml::required_name_attr(&param, "sid")?;
            if let Some(surface) = xml::child(param, "surface") {
                let init = xml::required_child(surface, "init_from")?;
                let image_id = Name::new(xml::text(&init));
                let image = find_image(&image_id).ok_or_else(|| ColladaError::UnresolvedReference {
                    category: "image",
                    id: image_id.to_string(),
                })?;
                surfaces.push(Surface { sid, image });
            } else if let Some(sampler) = xml::child(param, "sampler2D") {
                sampler_nodes.push((sid, sampler));
            }
        }

        // Samplers may be declared before the surface they read.
        let samplers = sampler_nodes
            .into_iter()
            .map(|(sid, n)| Sampler2D::parse(sid, n, &surfaces, &find_image))
            .collect::<ColladaResult<Vec<_>>>()?;

        let technique = xml::required_child(profile, "technique")?;
        let mut declared_shading = Shading::Unknown;
        let mut factors: [ShadingFactor; SHADING_FACTOR_ITEM_COUNT] = Default::default();

        let model = xml::elements(technique).find_map(|n| Shading::from_tag(xml::tag(&n)).map(|s| (s, n)));
        if let Some((shading, model)) = model {
            declared_shading = shading;
            for (slot, item) in factors.iter_mut().zip(ShadingFactorItem::ALL) {
                if let Some(n) = xml::child(model, item.tag()) {
                    *slot = ShadingFactor::parse(n)?;
                }
            }
        } else {
            log::warn!("Effect '{}' has no supported shading model", id);
        }

        for factor in &factors {
            if let ShadingFactor::Texture { sampler, .. } = factor {
                if !samplers.iter().any(|s| &s.sid == sampler) {
                    return Err(ColladaError::UnresolvedReference {
                        category: "sampler2D",
                        id: sampler.to_string(),
                    });
                }
            }
        }

        let uv_map_name = xml::descendant(node, "uv_map_name")
            .map(|n| Name::new(xml::text(&n)))
            .filter(|n| !n.is_empty());

        Ok(Self {
            id,
            name: xml::name_attr(&node, "name"),
            declared_shading,
            factors,
            surfaces,
            samplers,
            uv_map_name,
        })
    }

    pub fn factor(&self, item: ShadingFactorItem) -> &ShadingFactor {
        &self.factors[item as usize]
    }

    /// Effective shading: Phong whenever both shininess and specular are
    /// present (LightWave exports declare lambert for everything), otherwise
    /// the declared model.
    pub fn shading(&self) -> Shading {
        if !self.factor(ShadingFactorItem::Shininess).is_none()
            && !self.factor(ShadingFactorItem::Specular).is_none()
        {
            Shading::Phong
        } else {
            self.declared_shading
        }
    }

    pub fn sampler(&self, sid: &Name) -> Option<&Sampler2D> {
        self.samplers.iter().find(|s| &s.sid == sid)
    }

    /// Image read by the sampler with the given sid.
    pub fn texture_image(&self, sampler: &Name) -> Option<ImageId> {
        self.sampler(sampler).map(|s| s.image)
    }

    /// Factor items fed by a texture, with their texcoord symbols.
    pub fn textured_items(&self) -> impl Iterator<Item = (ShadingFactorItem, &Name)> {
        ShadingFactorItem::ALL
            .into_iter()
            .zip(self.factors.iter())
            .filter_map(|(item, f)| match f {
                ShadingFactor::Texture { texcoord, .. } => Some((item, texcoord)),
                _ => None,
            })
    }
}
