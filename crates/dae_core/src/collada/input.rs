//! `<input>` semantics and per-set offsets.

use std::collections::BTreeMap;
use std::str::FromStr;

use roxmltree::Node;

use super::id_map::SourceId;
use super::xml;
use crate::error::{ColladaError, ColladaResult};
use crate::intern::Name;

/// Number of [`Semantic`] variants; sizes per-semantic input tables.
pub const INPUT_TYPE_COUNT: usize = 12;

/// Role an `<input>` plays inside a polylist or animation sampler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum Semantic {
    Vertex,
    Position,
    Normal,
    Texcoord,
    Color,
    Texbinormal,
    Textangent,
    Input,
    Output,
    Interpolation,
    InTangent,
    OutTangent,
}

impl Semantic {
    pub const ALL: [Semantic; INPUT_TYPE_COUNT] = [
        Semantic::Vertex,
        Semantic::Position,
        Semantic::Normal,
        Semantic::Texcoord,
        Semantic::Color,
        Semantic::Texbinormal,
        Semantic::Textangent,
        Semantic::Input,
        Semantic::Output,
        Semantic::Interpolation,
        Semantic::InTangent,
        Semantic::OutTangent,
    ];

    /// Slot in a `[_; INPUT_TYPE_COUNT]` table.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Semantic::Vertex => "VERTEX",
            Semantic::Position => "POSITION",
            Semantic::Normal => "NORMAL",
            Semantic::Texcoord => "TEXCOORD",
            Semantic::Color => "COLOR",
            Semantic::Texbinormal => "TEXBINORMAL",
            Semantic::Textangent => "TEXTANGENT",
            Semantic::Input => "INPUT",
            Semantic::Output => "OUTPUT",
            Semantic::Interpolation => "INTERPOLATION",
            Semantic::InTangent => "IN_TANGENT",
            Semantic::OutTangent => "OUT_TANGENT",
        }
    }
}

impl FromStr for Semantic {
    type Err = ColladaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Semantic::ALL
            .into_iter()
            .find(|sem| sem.as_str() == s)
            .ok_or_else(|| ColladaError::InvalidValue {
                element: "input semantic".to_string(),
                value: s.to_string(),
            })
    }
}

/// One `(offset, source)` pair for a given set index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputSet {
    /// Position of this input inside a polylist's index tuple.
    pub offset: u32,
    pub source: SourceId,
}

/// All sets sharing one semantic, keyed by set number.
#[derive(Clone, Debug, PartialEq)]
pub struct Input {
    pub semantic: Semantic,
    pub sets: BTreeMap<u32, InputSet>,
}

impl Input {
    pub fn new(semantic: Semantic) -> Self {
        Self {
            semantic,
            sets: BTreeMap::new(),
        }
    }

    /// The lowest-numbered set.
    pub fn first_set(&self) -> Option<&InputSet> {
        self.sets.values().next()
    }
}

/// Raw attributes of one `<input>` element before its source is resolved.
#[derive(Clone, Debug)]
pub struct RawInput {
    pub semantic: Semantic,
    pub source: Name,
    pub offset: u32,
    pub set: u32,
}

impl RawInput {
    pub fn parse(node: Node<'_, '_>) -> ColladaResult<Self> {
        let semantic = xml::required_attr(&node, "semantic")?.parse()?;
        let source = xml::url_target(xml::required_attr(&node, "source")?)?;
        let offset = xml::parse_attr_or(&node, "offset", 0u32)?;
        let set = xml::parse_attr_or(&node, "set", 0u32)?;
        Ok(Self {
            semantic,
            source,
            offset,
            set,
        })
    }
}

/// Group parsed inputs into the per-semantic table, resolving each source
/// id with `resolve`.
pub fn collect_inputs<F>(
    raw: &[RawInput],
    mut resolve: F,
) -> ColladaResult<[Option<Input>; INPUT_TYPE_COUNT]>
where
    F: FnMut(&Name) -> ColladaResult<SourceId>,
{
    let mut table: [Option<Input>; INPUT_TYPE_COUNT] = Default::default();
    for input in raw {
        let source = resolve(&input.source)?;
        table[input.semantic.index()]
            .get_or_insert_with(|| Input::new(input.semantic))
            .sets
            .insert(
                input.set,
                InputSet {
                    offset: input.offset,
                    source,
                },
            );
    }
    Ok(table)
}
