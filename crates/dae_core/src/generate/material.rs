//! Renderer materials resolved from COLLADA effects.

use dae_math::Vec4;
use serde::Serialize;

use crate::collada::{
    Document, Effect, ImageId, MaterialId, Shading, ShadingFactor, ShadingFactorItem,
    SHADING_FACTOR_ITEM_COUNT,
};
use crate::error::{ColladaError, ColladaResult};
use crate::intern::Name;

/// Image and UV set a textured factor samples.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TextureBinding {
    pub image: ImageId,
    pub file_name: String,

    /// Texcoord input set of the polylist the material is applied to.
    pub texcoord_set: u32,
    pub requires_mipmaps: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub enum MaterialProperty {
    #[default]
    None,
    Scalar(f32),
    Color(Vec4),
    Texture(TextureBinding),
}

impl MaterialProperty {
    pub fn is_texture(&self) -> bool {
        matches!(self, MaterialProperty::Texture(_))
    }
}

/// A material as seen by one mesh layer.
///
/// Texture bindings depend on the layer's input sets, so two layers using
/// the same COLLADA material may carry different `Material` values.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Material {
    pub name: String,

    /// `None` for the default material of an unbound polylist.
    pub source: Option<MaterialId>,
    pub shading: Shading,
    pub properties: [MaterialProperty; SHADING_FACTOR_ITEM_COUNT],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            source: None,
            shading: Shading::Lambert,
            properties: [
                MaterialProperty::None,
                MaterialProperty::Color(Vec4::new(0.8, 0.8, 0.8, 1.0)),
                MaterialProperty::None,
                MaterialProperty::None,
                MaterialProperty::None,
                MaterialProperty::None,
            ],
        }
    }
}

impl Material {
    /// Build from a document material. `texcoord_set` maps each textured
    /// item to the input set it samples; it is only called for textured
    /// items.
    pub fn from_effect(
        document: &Document,
        material: MaterialId,
        mut texcoord_set: impl FnMut(ShadingFactorItem, &Name) -> ColladaResult<u32>,
    ) -> ColladaResult<Self> {
        let source = document
            .material(material)
            .ok_or_else(|| ColladaError::UnresolvedReference {
                category: "material",
                id: format!("#{}", material.0),
            })?;
        let effect: &Effect = document.effect(source.effect).ok_or_else(|| {
            ColladaError::UnresolvedReference {
                category: "effect",
                id: format!("#{}", source.effect.0),
            }
        })?;

        let mut properties: [MaterialProperty; SHADING_FACTOR_ITEM_COUNT] = Default::default();
        for item in ShadingFactorItem::ALL {
            properties[item as usize] = match effect.factor(item) {
                ShadingFactor::None => MaterialProperty::None,
                ShadingFactor::Float(f) => MaterialProperty::Scalar(*f),
                ShadingFactor::Color(c) => MaterialProperty::Color(*c),
                ShadingFactor::Texture { sampler, texcoord } => {
                    let image = effect.texture_image(sampler).ok_or_else(|| {
                        ColladaError::UnresolvedReference {
                            category: "sampler2D",
                            id: sampler.to_string(),
                        }
                    })?;
                    let info = document.image(image).ok_or_else(|| {
                        ColladaError::UnresolvedReference {
                            category: "image",
                            id: format!("#{}", image.0),
                        }
                    })?;
                    MaterialProperty::Texture(TextureBinding {
                        image,
                        file_name: info.file_name.clone(),
                        texcoord_set: texcoord_set(item, texcoord)?,
                        requires_mipmaps: info.requires_mipmaps,
                    })
                }
            };
        }

        Ok(Self {
            name: source
                .name
                .as_ref()
                .unwrap_or(&source.id)
                .to_string(),
            source: Some(material),
            shading: effect.shading(),
            properties,
        })
    }

    pub fn property(&self, item: ShadingFactorItem) -> &MaterialProperty {
        &self.properties[item as usize]
    }

    pub fn textures(&self) -> impl Iterator<Item = (ShadingFactorItem, &TextureBinding)> {
        ShadingFactorItem::ALL
            .into_iter()
            .zip(self.properties.iter())
            .filter_map(|(item, p)| match p {
                MaterialProperty::Texture(t) => Some((item, t)),
                _ => None,
            })
    }

    pub fn has_textures(&self) -> bool {
        self.properties.iter().any(MaterialProperty::is_texture)
    }
}
