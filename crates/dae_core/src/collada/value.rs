//! Animatable scalar cells and node transformations.
//!
//! Every scalar slot of a transformation is a [`Value`]. Parsing produces
//! plain floats; the animation pass later turns targeted cells into
//! [`Value::Animated`] while keeping the parsed float as the default.

use std::fmt;
use std::str::FromStr;

use dae_math::{skew_matrix, Mat4, Mat4Ext, Vec3};
use roxmltree::Node;
use serde::Serialize;

use super::id_map::AnimationId;
use super::xml;
use crate::error::{ColladaError, ColladaResult};

/// One transformation slot: a static float or a reference to the animation
/// that drives it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum Value {
    Float(f32),
    Animated { animation: AnimationId, default: f32 },
}

/// Result of pointing a [`Value`] at an animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Patch {
    Applied,
    /// The cell already referenced this animation; nothing changed.
    Unchanged,
    /// The cell is driven by a different animation, which is kept.
    Conflict(AnimationId),
}

impl Value {
    /// The parsed static value, animated or not.
    pub fn default_value(&self) -> f32 {
        match *self {
            Value::Float(v) => v,
            Value::Animated { default, .. } => default,
        }
    }

    pub fn animation(&self) -> Option<AnimationId> {
        match *self {
            Value::Float(_) => None,
            Value::Animated { animation, .. } => Some(animation),
        }
    }

    pub fn is_animated(&self) -> bool {
        matches!(self, Value::Animated { .. })
    }

    /// Turn a float cell into an animated one exactly once.
    pub fn animate(&mut self, animation: AnimationId) -> Patch {
        match *self {
            Value::Float(default) => {
                *self = Value::Animated { animation, default };
                Patch::Applied
            }
            Value::Animated { animation: a, .. } if a == animation => Patch::Unchanged,
            Value::Animated { animation: a, .. } => Patch::Conflict(a),
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

/// Component suffix of a channel target (`.X`, `.ANGLE`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Component {
    X,
    Y,
    Z,
    Angle,
}

impl FromStr for Component {
    type Err = ColladaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "X" => Ok(Component::X),
            "Y" => Ok(Component::Y),
            "Z" => Ok(Component::Z),
            "ANGLE" => Ok(Component::Angle),
            _ => Err(ColladaError::InvalidValue {
                element: "channel target component".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl Component {
    fn axis(self) -> Option<usize> {
        match self {
            Component::X => Some(0),
            Component::Y => Some(1),
            Component::Z => Some(2),
            Component::Angle => None,
        }
    }
}

/// Which transformation element a [`Transform`] came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TransformKind {
    LookAt,
    Matrix,
    Rotate,
    Scale,
    Skew,
    Translate,
}

impl TransformKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "lookat" => Some(Self::LookAt),
            "matrix" => Some(Self::Matrix),
            "rotate" => Some(Self::Rotate),
            "scale" => Some(Self::Scale),
            "skew" => Some(Self::Skew),
            "translate" => Some(Self::Translate),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::LookAt => "lookat",
            Self::Matrix => "matrix",
            Self::Rotate => "rotate",
            Self::Scale => "scale",
            Self::Skew => "skew",
            Self::Translate => "translate",
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A node transformation over some scalar cell type `C`.
///
/// The document stores `Transform<Value>`; the scene generator maps it to
/// its own curve-aware scalar type.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Transform<C> {
    LookAt {
        eye: [C; 3],
        interest: [C; 3],
        up: [C; 3],
    },
    /// Row-major, as written in the document.
    Matrix([C; 16]),
    Rotate {
        axis: [C; 3],
        /// Degrees.
        angle: C,
    },
    Scale([C; 3]),
    Skew {
        /// Degrees.
        angle: C,
        rotation_axis: [C; 3],
        translation_axis: [C; 3],
    },
    Translate([C; 3]),
}

/// A transformation as stored in the scene graph.
pub type Transformation = Transform<Value>;

fn split<const N: usize>(values: &[f32]) -> [Value; N] {
    std::array::from_fn(|i| Value::Float(values[i]))
}

impl Transformation {
    /// Parse one transformation element. The caller checks the tag with
    /// [`TransformKind::from_tag`] first.
    pub fn parse(node: Node<'_, '_>) -> ColladaResult<Self> {
        let kind = TransformKind::from_tag(xml::tag(&node)).ok_or_else(|| {
            ColladaError::UnsupportedElement {
                parent: node
                    .parent_element()
                    .map(|p| xml::describe(&p))
                    .unwrap_or_default(),
                element: xml::tag(&node).to_string(),
            }
        })?;

        Ok(match kind {
            TransformKind::LookAt => {
                let v: [f32; 9] = xml::parse_float_array(&node)?;
                Transform::LookAt {
                    eye: split(&v[0..3]),
                    interest: split(&v[3..6]),
                    up: split(&v[6..9]),
                }
            }
            TransformKind::Matrix => {
                let v: [f32; 16] = xml::parse_float_array(&node)?;
                Transform::Matrix(split(&v))
            }
            TransformKind::Rotate => {
                let v: [f32; 4] = xml::parse_float_array(&node)?;
                Transform::Rotate {
                    axis: split(&v[0..3]),
                    angle: Value::Float(v[3]),
                }
            }
            TransformKind::Scale => Transform::Scale(split(&xml::parse_float_array::<3>(&node)?)),
            TransformKind::Skew => {
                let v: [f32; 7] = xml::parse_float_array(&node)?;
                Transform::Skew {
                    angle: Value::Float(v[0]),
                    rotation_axis: split(&v[1..4]),
                    translation_axis: split(&v[4..7]),
                }
            }
            TransformKind::Translate => {
                Transform::Translate(split(&xml::parse_float_array::<3>(&node)?))
            }
        })
    }

    /// Matrix built from the parsed (default) values.
    pub fn static_matrix(&self) -> Mat4 {
        self.to_matrix_with(|v| v.default_value())
    }

    pub fn is_animated(&self) -> bool {
        self.cells().any(Value::is_animated)
    }

    /// Negate a translation in place; used for the pivot-inverse fixup.
    pub fn negate_translation(&mut self) {
        if let Transform::Translate(cells) = self {
            for cell in cells {
                if let Value::Float(v) = cell {
                    *v = -*v;
                }
            }
        }
    }

    pub fn translation(&self) -> Option<Vec3> {
        match self {
            Transform::Translate(c) => Some(Vec3::new(
                c[0].default_value(),
                c[1].default_value(),
                c[2].default_value(),
            )),
            _ => None,
        }
    }
}

impl<C> Transform<C> {
    pub fn kind(&self) -> TransformKind {
        match self {
            Transform::LookAt { .. } => TransformKind::LookAt,
            Transform::Matrix(_) => TransformKind::Matrix,
            Transform::Rotate { .. } => TransformKind::Rotate,
            Transform::Scale(_) => TransformKind::Scale,
            Transform::Skew { .. } => TransformKind::Skew,
            Transform::Translate(_) => TransformKind::Translate,
        }
    }

    /// Every scalar cell, in document order.
    pub fn cells(&self) -> Box<dyn Iterator<Item = &C> + '_> {
        match self {
            Transform::LookAt { eye, interest, up } => {
                Box::new(eye.iter().chain(interest.iter()).chain(up.iter()))
            }
            Transform::Matrix(m) => Box::new(m.iter()),
            Transform::Rotate { axis, angle } => Box::new(axis.iter().chain(std::iter::once(angle))),
            Transform::Scale(s) => Box::new(s.iter()),
            Transform::Skew {
                angle,
                rotation_axis,
                translation_axis,
            } => Box::new(
                std::iter::once(angle)
                    .chain(rotation_axis.iter())
                    .chain(translation_axis.iter()),
            ),
            Transform::Translate(t) => Box::new(t.iter()),
        }
    }

    /// The cell a channel component addresses. Only rotate, translate and
    /// scale components are animatable.
    pub fn cell_mut(&mut self, component: Component) -> Option<&mut C> {
        match (self, component) {
            (Transform::Rotate { angle, .. }, Component::Angle) => Some(angle),
            (Transform::Rotate { axis, .. }, c) => c.axis().map(|i| &mut axis[i]),
            (Transform::Translate(t), c) => c.axis().map(|i| &mut t[i]),
            (Transform::Scale(s), c) => c.axis().map(|i| &mut s[i]),
            _ => None,
        }
    }

    /// Convert every cell, keeping the variant.
    pub fn map<D>(&self, mut f: impl FnMut(&C) -> D) -> Transform<D> {
        let mut arr3 = |a: &[C; 3]| -> [D; 3] { [f(&a[0]), f(&a[1]), f(&a[2])] };
        match self {
            Transform::LookAt { eye, interest, up } => Transform::LookAt {
                eye: arr3(eye),
                interest: arr3(interest),
                up: arr3(up),
            },
            Transform::Matrix(m) => Transform::Matrix(std::array::from_fn(|i| f(&m[i]))),
            Transform::Rotate { axis, angle } => {
                let axis = arr3(axis);
                Transform::Rotate {
                    axis,
                    angle: f(angle),
                }
            }
            Transform::Scale(s) => Transform::Scale(arr3(s)),
            Transform::Skew {
                angle,
                rotation_axis,
                translation_axis,
            } => {
                let rotation_axis = arr3(rotation_axis);
                let translation_axis = arr3(translation_axis);
                Transform::Skew {
                    angle: f(angle),
                    rotation_axis,
                    translation_axis,
                }
            }
            Transform::Translate(t) => Transform::Translate(arr3(t)),
        }
    }

    /// Build the 4x4 matrix, reading each cell through `eval`.
    pub fn to_matrix_with(&self, mut eval: impl FnMut(&C) -> f32) -> Mat4 {
        let mut vec3 = |a: &[C; 3]| Vec3::new(eval(&a[0]), eval(&a[1]), eval(&a[2]));
        match self {
            Transform::LookAt { eye, interest, up } => {
                let (eye, interest, up) = (vec3(eye), vec3(interest), vec3(up));
                Mat4::from_lookat(eye, interest, up)
            }
            Transform::Matrix(m) => {
                let mut values = [0.0f32; 16];
                for (dst, cell) in values.iter_mut().zip(m.iter()) {
                    *dst = eval(cell);
                }
                Mat4::from_row_major(&values)
            }
            Transform::Rotate { axis, angle } => {
                let axis = vec3(axis);
                let angle = eval(angle);
                match axis.try_normalize() {
                    Some(axis) => Mat4::from_axis_angle(axis, angle.to_radians()),
                    None => Mat4::IDENTITY,
                }
            }
            Transform::Scale(s) => Mat4::from_scale(vec3(s)),
            Transform::Skew {
                angle,
                rotation_axis,
                translation_axis,
            } => {
                let (r, t) = (vec3(rotation_axis), vec3(translation_axis));
                skew_matrix(eval(angle), r, t)
            }
            Transform::Translate(t) => Mat4::from_translation(vec3(t)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn parse(xml: &str) -> Transformation {
        let doc = roxmltree::Document::parse(xml).unwrap();
        Transformation::parse(doc.root_element()).unwrap()
    }

    #[test]
    fn test_animate_is_idempotent() {
        let mut cell = Value::Float(2.5);
        assert_eq!(cell.animate(AnimationId(3)), Patch::Applied);
        assert_eq!(cell.animate(AnimationId(3)), Patch::Unchanged);
        assert_eq!(
            cell,
            Value::Animated {
                animation: AnimationId(3),
                default: 2.5
            }
        );
        assert_eq!(cell.animate(AnimationId(4)), Patch::Conflict(AnimationId(3)));
        assert_eq!(cell.default_value(), 2.5);
    }

    #[test]
    fn test_component_parse_is_case_insensitive() {
        assert_eq!("angle".parse::<Component>().unwrap(), Component::Angle);
        assert_eq!("X".parse::<Component>().unwrap(), Component::X);
        assert!("W".parse::<Component>().is_err());
    }

    #[test]
    fn test_rotate_cells() {
        let mut rot = parse("<rotate>0 1 0 90</rotate>");
        assert_eq!(rot.kind(), TransformKind::Rotate);

        *rot.cell_mut(Component::Angle).unwrap() = Value::Float(45.0);
        *rot.cell_mut(Component::Z).unwrap() = Value::Float(7.0);
        match rot {
            Transform::Rotate { axis, angle } => {
                assert_eq!(angle, Value::Float(45.0));
                assert_eq!(axis[2], Value::Float(7.0));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_translate_has_no_angle() {
        let mut t = parse("<translate>1 2 3</translate>");
        assert!(t.cell_mut(Component::Angle).is_none());
        assert_eq!(*t.cell_mut(Component::Y).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn test_matrix_is_row_major() {
        let m = parse("<matrix>1 0 0 5  0 1 0 6  0 0 1 7  0 0 0 1</matrix>");
        let p = m.static_matrix().transform_point3(Vec3::ZERO);
        assert_relative_eq!(p.x, 5.0);
        assert_relative_eq!(p.y, 6.0);
        assert_relative_eq!(p.z, 7.0);
    }

    #[test]
    fn test_rotate_matrix_uses_degrees() {
        let m = parse("<rotate>0 0 1 90</rotate>").static_matrix();
        let v = m.transform_vector3(Vec3::X);
        assert_relative_eq!(v.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_wrong_value_count_fails() {
        let doc = roxmltree::Document::parse("<scale>1 2</scale>").unwrap();
        assert!(Transformation::parse(doc.root_element()).is_err());
    }

    #[test]
    fn test_map_keeps_variant_and_order() {
        let m = parse("<matrix>0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15</matrix>");
        let mapped = m.map(|v| v.default_value() as i32);
        match mapped {
            Transform::Matrix(cells) => assert_eq!(cells[7], 7),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_negate_translation() {
        let mut t = parse("<translate>1 -2 3</translate>");
        t.negate_translation();
        assert_eq!(t.translation(), Some(Vec3::new(-1.0, 2.0, -3.0)));
    }
}
