//! `<material>`: a named indirection onto an effect.

use roxmltree::Node;
use serde::Serialize;

use super::id_map::{EffectId, Identified};
use super::xml;
use crate::error::{ColladaError, ColladaResult};
use crate::intern::Name;

#[derive(Clone, Debug, Serialize)]
pub struct Material {
    pub id: Name,
    pub name: Option<Name>,
    pub effect: EffectId,
}

impl Identified for Material {
    fn id(&self) -> &Name {
        &self.id
    }

    fn name(&self) -> Option<&Name> {
        self.name.as_ref()
    }
}

impl Material {
    pub fn parse<F>(node: Node<'_, '_>, find_effect: F) -> ColladaResult<Self>
    where
        F: Fn(&Name) -> Option<EffectId>,
    {
        let id = xml::required_name_attr(&node, "id")?;
        let instance = xml::required_child(node, "instance_effect")?;
        let url = xml::url_target(xml::required_attr(&instance, "url")?)?;
        let effect = find_effect(&url).ok_or_else(|| ColladaError::UnresolvedReference {
            category: "effect",
            id: url.to_string(),
        })?;

        Ok(Self {
            id,
            name: xml::name_attr(&node, "name"),
            effect,
        })
    }
}
