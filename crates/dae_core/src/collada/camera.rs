//! `<camera>` optics.

use roxmltree::Node;
use serde::Serialize;

use super::id_map::Identified;
use super::xml;
use crate::error::{ColladaError, ColladaResult};
use crate::intern::Name;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Projection {
    Perspective,
    Orthographic,
}

/// Flat value bag from `<optics><technique_common>`.
///
/// Angles are in degrees. Any of `xfov`/`yfov`/`aspect_ratio` (or
/// `xmag`/`ymag`/`aspect_ratio`) may be missing; the accessors derive the
/// missing one when two are known.
#[derive(Clone, Debug, Serialize)]
pub struct Camera {
    pub id: Name,
    pub name: Option<Name>,
    pub projection: Projection,
    pub aspect_ratio: Option<f32>,
    pub xfov: Option<f32>,
    pub yfov: Option<f32>,
    pub xmag: Option<f32>,
    pub ymag: Option<f32>,
    pub znear: f32,
    pub zfar: f32,
}

impl Identified for Camera {
    fn id(&self) -> &Name {
        &self.id
    }

    fn name(&self) -> Option<&Name> {
        self.name.as_ref()
    }
}

fn half_tan(deg: f32) -> f32 {
    (deg.to_radians() * 0.5).tan()
}

fn from_half_tan(t: f32) -> f32 {
    (t.atan() * 2.0).to_degrees()
}

impl Camera {
    pub fn parse(node: Node<'_, '_>) -> ColladaResult<Self> {
        let id = xml::required_name_attr(&node, "id")?;
        let optics = xml::required_child(node, "optics")?;
        let common = xml::required_child(optics, "technique_common")?;

        let (projection, params) = if let Some(p) = xml::child(common, "perspective") {
            (Projection::Perspective, p)
        } else if let Some(o) = xml::child(common, "orthographic") {
            (Projection::Orthographic, o)
        } else {
            return Err(ColladaError::MissingElement {
                parent: xml::describe(&common),
                element: "perspective",
            });
        };

        let camera = Self {
            id,
            name: xml::name_attr(&node, "name"),
            projection,
            aspect_ratio: xml::child_f32(params, "aspect_ratio")?,
            xfov: xml::child_f32(params, "xfov")?,
            yfov: xml::child_f32(params, "yfov")?,
            xmag: xml::child_f32(params, "xmag")?,
            ymag: xml::child_f32(params, "ymag")?,
            znear: xml::child_f32(params, "znear")?.unwrap_or(0.1),
            zfar: xml::child_f32(params, "zfar")?.unwrap_or(1000.0),
        };

        if camera.projection == Projection::Perspective
            && camera.xfov.is_none()
            && camera.yfov.is_none()
        {
            log::warn!("Camera '{}' has no field of view", camera.id);
        }

        Ok(camera)
    }

    /// Width over height.
    pub fn aspect(&self) -> Option<f32> {
        if let Some(a) = self.aspect_ratio {
            return Some(a);
        }
        match self.projection {
            Projection::Perspective => Some(half_tan(self.xfov?) / half_tan(self.yfov?)),
            Projection::Orthographic => Some(self.xmag? / self.ymag?),
        }
    }

    /// Vertical field of view in degrees.
    pub fn fov_y(&self) -> Option<f32> {
        if self.projection != Projection::Perspective {
            return None;
        }
        self.yfov.or_else(|| {
            let aspect = self.aspect_ratio?;
            Some(from_half_tan(half_tan(self.xfov?) / aspect))
        })
    }

    /// Horizontal field of view in degrees.
    pub fn fov_x(&self) -> Option<f32> {
        if self.projection != Projection::Perspective {
            return None;
        }
        self.xfov.or_else(|| {
            let aspect = self.aspect_ratio?;
            Some(from_half_tan(half_tan(self.yfov?) * aspect))
        })
    }

    /// Half-extents of an orthographic view volume.
    pub fn ortho_extent(&self) -> Option<(f32, f32)> {
        if self.projection != Projection::Orthographic {
            return None;
        }
        match (self.xmag, self.ymag, self.aspect_ratio) {
            (Some(x), Some(y), _) => Some((x, y)),
            (Some(x), None, Some(a)) => Some((x, x / a)),
            (None, Some(y), Some(a)) => Some((y * a, y)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn parse(xml: &str) -> Camera {
        let doc = roxmltree::Document::parse(xml).unwrap();
        Camera::parse(doc.root_element()).unwrap()
    }

    #[test]
    fn test_perspective_derives_yfov() {
        let cam = parse(
            r#"<camera id="cam"><optics><technique_common><perspective>
                <xfov>90</xfov><aspect_ratio>1</aspect_ratio>
                <znear>0.5</znear><zfar>200</zfar>
            </perspective></technique_common></optics></camera>"#,
        );
        assert_eq!(cam.projection, Projection::Perspective);
        assert_relative_eq!(cam.fov_y().unwrap(), 90.0, epsilon = 1e-4);
        assert_relative_eq!(cam.znear, 0.5);
        assert!(cam.ortho_extent().is_none());
    }

    #[test]
    fn test_aspect_from_fovs() {
        let cam = parse(
            r#"<camera id="cam"><optics><technique_common><perspective>
                <xfov>90</xfov><yfov>90</yfov>
            </perspective></technique_common></optics></camera>"#,
        );
        assert_relative_eq!(cam.aspect().unwrap(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(cam.fov_x().unwrap(), 90.0);
    }

    #[test]
    fn test_orthographic_extent() {
        let cam = parse(
            r#"<camera id="top"><optics><technique_common><orthographic>
                <xmag>4</xmag><aspect_ratio>2</aspect_ratio>
            </orthographic></technique_common></optics></camera>"#,
        );
        assert_eq!(cam.projection, Projection::Orthographic);
        assert_eq!(cam.ortho_extent(), Some((4.0, 2.0)));
        assert!(cam.fov_y().is_none());
    }

    #[test]
    fn test_missing_projection_fails() {
        let doc = roxmltree::Document::parse(
            r#"<camera id="c"><optics><technique_common/></optics></camera>"#,
        )
        .unwrap();
        assert!(Camera::parse(doc.root_element()).is_err());
    }
}
