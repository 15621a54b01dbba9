//! `<animation>` samplers and channels.
//!
//! Nested `<animation>` elements are flattened: every [`Animation`] owns one
//! channel, the sampler it reads, and the sources that sampler uses.

use std::collections::BTreeMap;
use std::str::FromStr;

use roxmltree::Node;
use serde::Serialize;

use super::id_map::{Identified, SourceId};
use super::input::{RawInput, Semantic};
use super::scene_graph::ResolvedTarget;
use super::source::{FloatArray, Source};
use super::xml;
use crate::cache::BlobCache;
use crate::error::{ColladaError, ColladaResult};
use crate::intern::Name;

/// Per-key interpolation from an INTERPOLATION name array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Interpolation {
    Step,
    #[default]
    Linear,
    Bezier,
    Hermite,
}

impl FromStr for Interpolation {
    type Err = ColladaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STEP" => Ok(Interpolation::Step),
            "LINEAR" => Ok(Interpolation::Linear),
            "BEZIER" => Ok(Interpolation::Bezier),
            "HERMITE" => Ok(Interpolation::Hermite),
            _ => Err(ColladaError::InvalidValue {
                element: "interpolation".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Sampler {
    pub id: Name,

    /// Semantic → index into the owning animation's `sources`.
    pub inputs: BTreeMap<Semantic, SourceId>,

    /// One entry per key; all LINEAR when the sampler has no INTERPOLATION
    /// input.
    pub interpolations: Vec<Interpolation>,
}

#[derive(Clone, Debug)]
pub struct Channel {
    pub sampler: Name,

    /// Raw `target` attribute, `object/property.component`.
    pub target_path: String,

    /// Filled in by the animation pass once the scene graph exists.
    pub target: Option<ResolvedTarget>,
}

#[derive(Clone, Debug)]
pub struct Animation {
    pub id: Name,
    pub name: Option<Name>,
    pub sources: Vec<Source>,
    pub sampler: Sampler,
    pub channel: Channel,
}

impl Identified for Animation {
    fn id(&self) -> &Name {
        &self.id
    }

    fn name(&self) -> Option<&Name> {
        self.name.as_ref()
    }
}

impl Animation {
    pub fn source(&self, semantic: Semantic) -> Option<&Source> {
        self.sampler.inputs.get(&semantic).map(|id| &self.sources[id.0])
    }

    fn float_source(&self, semantic: Semantic) -> ColladaResult<&FloatArray> {
        self.source(semantic)
            .ok_or_else(|| ColladaError::MissingElement {
                parent: format!("sampler#{}", self.sampler.id),
                element: semantic.as_str(),
            })?
            .require_floats()
    }

    /// Key times (INPUT).
    pub fn input_times(&self) -> ColladaResult<&[f32]> {
        Ok(&self.float_source(Semantic::Input)?.data)
    }

    /// Key values (OUTPUT).
    pub fn outputs(&self) -> ColladaResult<&FloatArray> {
        self.float_source(Semantic::Output)
    }

    pub fn in_tangents(&self) -> Option<&FloatArray> {
        self.source(Semantic::InTangent).and_then(Source::floats)
    }

    pub fn out_tangents(&self) -> Option<&FloatArray> {
        self.source(Semantic::OutTangent).and_then(Source::floats)
    }

    pub fn key_count(&self) -> usize {
        self.input_times().map(<[f32]>::len).unwrap_or(0)
    }

    pub fn interpolation(&self, key: usize) -> Interpolation {
        self.sampler
            .interpolations
            .get(key)
            .copied()
            .unwrap_or_default()
    }

    /// Time of the last key. Keys are validated ascending at load, so this
    /// is also the largest INPUT value.
    pub fn duration(&self) -> f32 {
        self.input_times()
            .ok()
            .and_then(|t| t.last().copied())
            .unwrap_or(0.0)
    }

    /// Fail with `UnsortedKeyframes` if key times ever decrease.
    pub fn validate_sorted(&self) -> ColladaResult<()> {
        let times = self.input_times()?;
        match times.windows(2).position(|w| w[1] < w[0]) {
            Some(i) => Err(ColladaError::UnsortedKeyframes {
                animation: self.id.to_string(),
                key: i + 1,
            }),
            None => Ok(()),
        }
    }

    /// Structural checks: INPUT/OUTPUT present, one output element and one
    /// interpolation per key.
    fn validate(&self) -> ColladaResult<()> {
        let keys = self.input_times()?.len();
        let outputs = self.outputs()?;
        if outputs.element_count() != keys {
            return Err(ColladaError::InvalidArray {
                id: outputs.id.to_string(),
                reason: format!("{} output values for {} keys", outputs.element_count(), keys),
            });
        }
        if self.sampler.interpolations.len() != keys {
            return Err(ColladaError::InvalidArray {
                id: format!("{}/interpolation", self.id),
                reason: format!(
                    "{} interpolations for {} keys",
                    self.sampler.interpolations.len(),
                    keys
                ),
            });
        }
        self.validate_sorted()
    }
}

/// Parse a `<library_animations>` into flat animations. Each failure is
/// reported separately so the caller can skip it.
pub fn parse_library(library: Node<'_, '_>, cache: &BlobCache) -> Vec<ColladaResult<Animation>> {
    let mut out = Vec::new();
    let mut counter = 0usize;
    for node in xml::children(library, "animation") {
        parse_animation(node, cache, &mut counter, &mut out);
    }
    out
}

fn parse_animation(
    node: Node<'_, '_>,
    cache: &BlobCache,
    counter: &mut usize,
    out: &mut Vec<ColladaResult<Animation>>,
) {
    let base = match xml::attr(&node, "id") {
        Some(id) => id.to_string(),
        None => {
            *counter += 1;
            format!("animation_{counter}")
        }
    };

    let channels: Vec<Node<'_, '_>> = xml::children(node, "channel").collect();
    if !channels.is_empty() {
        match parse_sources(node, cache, &base) {
            Ok(sources) => {
                for (k, channel) in channels.iter().enumerate() {
                    let id = if channels.len() == 1 {
                        Name::new(&base)
                    } else {
                        Name::new(&format!("{base}.{k}"))
                    };
                    out.push(build_animation(node, *channel, id, &sources));
                }
            }
            Err(e) => out.push(Err(e)),
        }
    }

    for child in xml::children(node, "animation") {
        parse_animation(child, cache, counter, out);
    }
}

fn parse_sources(node: Node<'_, '_>, cache: &BlobCache, parent: &str) -> ColladaResult<Vec<Source>> {
    xml::children(node, "source")
        .map(|s| Source::parse(s, cache, parent))
        .collect()
}

fn build_animation(
    node: Node<'_, '_>,
    channel: Node<'_, '_>,
    id: Name,
    all_sources: &[Source],
) -> ColladaResult<Animation> {
    let sampler_id = xml::url_target(xml::required_attr(&channel, "source")?)?;
    let target_path = xml::required_attr(&channel, "target")?.to_string();

    let sampler_node = xml::children(node, "sampler")
        .find(|s| xml::attr(s, "id") == Some(sampler_id.as_str()))
        .ok_or_else(|| ColladaError::UnresolvedReference {
            category: "sampler",
            id: sampler_id.to_string(),
        })?;

    // Keep only the sources this sampler reads.
    let mut sources = Vec::new();
    let mut inputs = BTreeMap::new();
    for input in xml::children(sampler_node, "input") {
        let raw = RawInput::parse(input)?;
        let source = all_sources
            .iter()
            .find(|s| s.id == raw.source)
            .ok_or_else(|| ColladaError::UnresolvedReference {
                category: "source",
                id: raw.source.to_string(),
            })?;
        inputs.insert(raw.semantic, SourceId(sources.len()));
        sources.push(source.clone());
    }

    let keys = inputs
        .get(&Semantic::Input)
        .and_then(|id| sources[id.0].floats())
        .map(|f| f.count)
        .unwrap_or(0);
    let interpolations = match inputs.get(&Semantic::Interpolation) {
        Some(id) => {
            let names = sources[id.0]
                .names()
                .ok_or_else(|| ColladaError::InvalidArray {
                    id: sources[id.0].id.to_string(),
                    reason: "INTERPOLATION must be a Name_array".to_string(),
                })?;
            names
                .names
                .iter()
                .map(|n| n.parse())
                .collect::<ColladaResult<Vec<_>>>()?
        }
        None => vec![Interpolation::Linear; keys],
    };

    let animation = Animation {
        id,
        name: xml::name_attr(&node, "name"),
        sources,
        sampler: Sampler {
            id: sampler_id.clone(),
            inputs,
            interpolations,
        },
        channel: Channel {
            sampler: sampler_id,
            target_path,
            target: None,
        },
    };
    animation.validate()?;
    Ok(animation)
}
