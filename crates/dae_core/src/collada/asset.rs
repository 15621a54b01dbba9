//! Document-wide `<asset>` information.

use std::str::FromStr;

use dae_math::{Mat4, Vec3};
use roxmltree::Node;
use serde::Serialize;

use super::xml;
use crate::error::{ColladaError, ColladaResult};

/// The document's up axis. Missing `<up_axis>` means `Y_UP`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum UpAxis {
    X,
    #[default]
    Y,
    Z,
}

impl FromStr for UpAxis {
    type Err = ColladaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "X_UP" => Ok(Self::X),
            "Y_UP" => Ok(Self::Y),
            "Z_UP" => Ok(Self::Z),
            _ => Err(ColladaError::InvalidValue {
                element: "up_axis".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl UpAxis {
    /// Rotation taking this axis convention to Y-up.
    pub fn to_y_up(self) -> Mat4 {
        match self {
            UpAxis::X => Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2),
            UpAxis::Y => Mat4::IDENTITY,
            UpAxis::Z => Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_2),
        }
    }

    /// Unit vector of the up direction in document space.
    pub fn up_vector(self) -> Vec3 {
        match self {
            UpAxis::X => Vec3::X,
            UpAxis::Y => Vec3::Y,
            UpAxis::Z => Vec3::Z,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Asset {
    pub up_axis: UpAxis,

    /// Size of one document unit in meters.
    pub unit_meter: f32,

    pub unit_name: Option<String>,

    pub authoring_tool: Option<String>,

    /// Set for files written by the LightWave Core exporter, which needs
    /// the pivot workaround in the scene parser.
    pub lightwave_core: bool,
}

impl Default for Asset {
    fn default() -> Self {
        Self {
            up_axis: UpAxis::Y,
            unit_meter: 1.0,
            unit_name: None,
            authoring_tool: None,
            lightwave_core: false,
        }
    }
}

impl Asset {
    pub fn parse(node: Node<'_, '_>) -> ColladaResult<Self> {
        let mut asset = Asset::default();

        if let Some(up) = xml::child(node, "up_axis") {
            asset.up_axis = xml::text(&up).parse()?;
        }

        if let Some(unit) = xml::child(node, "unit") {
            asset.unit_meter = xml::parse_attr_or(&unit, "meter", 1.0)?;
            asset.unit_name = xml::attr(&unit, "name").map(str::to_string);
        }

        asset.authoring_tool = xml::descendant(node, "authoring_tool")
            .map(|n| xml::text(&n).to_string())
            .filter(|s| !s.is_empty());
        asset.lightwave_core = asset
            .authoring_tool
            .as_deref()
            .is_some_and(is_lightwave_core_tool);

        Ok(asset)
    }
}

fn is_lightwave_core_tool(tool: &str) -> bool {
    let lower = tool.to_ascii_lowercase();
    lower.contains("lightwave") && lower.contains("core")
}
