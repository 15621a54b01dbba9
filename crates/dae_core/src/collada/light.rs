//! `<light>` parameters.

use dae_math::Vec3;
use roxmltree::Node;
use serde::Serialize;

use super::id_map::Identified;
use super::xml;
use crate::error::{ColladaError, ColladaResult};
use crate::intern::Name;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LightKind {
    Ambient,
    Directional,
    Point,
    Spot,
}

impl LightKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ambient" => Some(LightKind::Ambient),
            "directional" => Some(LightKind::Directional),
            "point" => Some(LightKind::Point),
            "spot" => Some(LightKind::Spot),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Light {
    pub id: Name,
    pub name: Option<Name>,
    pub kind: LightKind,
    pub color: Vec3,
    pub constant_attenuation: f32,
    pub linear_attenuation: f32,
    pub quadratic_attenuation: f32,
    /// Degrees.
    pub falloff_angle: f32,
    pub falloff_exponent: f32,
    /// Range, from an exporter `<extra>` when present; 0 means unlimited.
    pub zfar: f32,
}

impl Identified for Light {
    fn id(&self) -> &Name {
        &self.id
    }

    fn name(&self) -> Option<&Name> {
        self.name.as_ref()
    }
}

impl Light {
    /// A light with the COLLADA default attenuation and falloff.
    pub fn new(id: Name, kind: LightKind) -> Self {
        Self {
            id,
            name: None,
            kind,
            color: Vec3::ONE,
            constant_attenuation: 1.0,
            linear_attenuation: 0.0,
            quadratic_attenuation: 0.0,
            falloff_angle: 180.0,
            falloff_exponent: 0.0,
            zfar: 0.0,
        }
    }

    pub fn parse(node: Node<'_, '_>) -> ColladaResult<Self> {
        let id = xml::required_name_attr(&node, "id")?;
        let common = xml::required_child(node, "technique_common")?;
        let (kind, params) = xml::elements(common)
            .find_map(|n| LightKind::from_tag(xml::tag(&n)).map(|k| (k, n)))
            .ok_or_else(|| ColladaError::MissingElement {
                parent: xml::describe(&common),
                element: "point",
            })?;

        let mut light = Light::new(id, kind);
        light.name = xml::name_attr(&node, "name");

        if let Some(color) = xml::child(params, "color") {
            light.color = Vec3::from_array(xml::parse_float_array::<3>(&color)?);
        }
        if let Some(v) = xml::child_f32(params, "constant_attenuation")? {
            light.constant_attenuation = v;
        }
        if let Some(v) = xml::child_f32(params, "linear_attenuation")? {
            light.linear_attenuation = v;
        }
        if let Some(v) = xml::child_f32(params, "quadratic_attenuation")? {
            light.quadratic_attenuation = v;
        }
        if let Some(v) = xml::child_f32(params, "falloff_angle")? {
            light.falloff_angle = v;
        }
        if let Some(v) = xml::child_f32(params, "falloff_exponent")? {
            light.falloff_exponent = v;
        }
        if let Some(zfar) = xml::descendant(node, "zfar") {
            light.zfar = xml::parse_f32(xml::text(&zfar))?;
        }

        Ok(light)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> ColladaResult<Light> {
        let doc = roxmltree::Document::parse(xml).unwrap();
        Light::parse(doc.root_element())
    }

    #[test]
    fn test_defaults_for_missing_parameters() {
        let light = parse(
            r#"<light id="sun"><technique_common><directional>
                <color>1 0.9 0.8</color>
            </directional></technique_common></light>"#,
        )
        .unwrap();
        assert_eq!(light.kind, LightKind::Directional);
        assert_eq!(light.color, Vec3::new(1.0, 0.9, 0.8));
        assert_eq!(light.constant_attenuation, 1.0);
        assert_eq!(light.linear_attenuation, 0.0);
        assert_eq!(light.quadratic_attenuation, 0.0);
        assert_eq!(light.falloff_angle, 180.0);
        assert_eq!(light.falloff_exponent, 0.0);
    }

    #[test]
    fn test_spot_parameters() {
        let light = parse(
            r#"<light id="spot" name="Key"><technique_common><spot>
                <color>1 1 1</color>
                <constant_attenuation>0.5</constant_attenuation>
                <falloff_angle>45</falloff_angle>
                <falloff_exponent>2</falloff_exponent>
            </spot></technique_common>
            <extra><technique profile="LightWave"><zfar>25</zfar></technique></extra>
            </light>"#,
        )
        .unwrap();
        assert_eq!(light.kind, LightKind::Spot);
        assert_eq!(light.constant_attenuation, 0.5);
        assert_eq!(light.falloff_angle, 45.0);
        assert_eq!(light.zfar, 25.0);
        assert_eq!(light.name, Some(Name::new("Key")));
    }

    #[test]
    fn test_unknown_kind_fails() {
        assert!(parse(r#"<light id="l"><technique_common><area/></technique_common></light>"#).is_err());
    }
}
