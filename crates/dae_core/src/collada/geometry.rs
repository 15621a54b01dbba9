//! `<geometry>`: sources, `<vertices>` aliasing and triangulated polylists.
//!
//! Geometry parsing dominates load time on large scenes, so the library is
//! parsed with one fan-out task per `<geometry>`. Each task only reads its own
//! XML subtree and the blob cache.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use roxmltree::Node;
use serde::Serialize;

use super::id_map::{Identified, MaterialId, SourceId};
use super::input::{collect_inputs, Input, InputSet, RawInput, Semantic, INPUT_TYPE_COUNT};
use super::source::{FloatArray, Source};
use super::xml;
use crate::cache::{BlobCache, BlobKey, BlobKind, BlobWriter};
use crate::error::{ColladaError, ColladaResult};
use crate::fanout::fan_out;
use crate::generate::mesh::Mesh;
use crate::intern::Name;

/// Primitive elements recognised but not supported.
const UNSUPPORTED_PRIMITIVES: [&str; 6] = [
    "lines",
    "linestrips",
    "polygons",
    "triangles",
    "trifans",
    "tristrips",
];

/// Inclusive index range referenced at one polylist offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct IndexRange {
    pub min: u32,
    pub max: u32,
}

/// A triangulated `<polylist>`.
#[derive(Clone, Debug)]
pub struct Polylist {
    /// One entry per semantic present, indexed by [`Semantic::index`].
    pub inputs: [Option<Input>; INPUT_TYPE_COUNT],
    pub material_symbol: Name,

    /// Indices per vertex tuple (max input offset + 1).
    pub n_inputs: usize,

    /// Sum of `vertex_counts`.
    pub n_vertices: usize,
    pub vertex_counts: Vec<u32>,

    /// Flattened index tuples; `n_vertices * n_inputs` long.
    pub polygon_indices: Vec<u32>,

    /// Per offset, the smallest and largest index referenced.
    pub index_ranges: Vec<IndexRange>,
    pub index_min: u32,
    pub index_max: u32,
}

impl Polylist {
    /// Parse a `<polylist>`. `resolve` maps input source ids (including
    /// the `<vertices>` alias) to mesh sources; `vertex_extras` are the
    /// non-POSITION inputs of `<vertices>`, which share the VERTEX offset.
    /// `ordinal` is the polylist's position within its geometry.
    fn parse<F>(
        node: Node<'_, '_>,
        geometry: &Name,
        ordinal: usize,
        resolve: F,
        vertex_extras: &[(Semantic, SourceId)],
        cache: &BlobCache,
    ) -> ColladaResult<Self>
    where
        F: FnMut(&Name) -> ColladaResult<SourceId>,
    {
        let count: usize = xml::parse_required_attr(&node, "count")?;
        let material_symbol = xml::name_attr(&node, "material").unwrap_or_default();

        let raw: Vec<RawInput> = xml::children(node, "input")
            .map(RawInput::parse)
            .collect::<ColladaResult<_>>()?;
        if raw.is_empty() {
            return Err(ColladaError::MissingElement {
                parent: xml::describe(&node),
                element: "input",
            });
        }
        let n_inputs = raw.iter().map(|i| i.offset as usize).max().unwrap_or(0) + 1;

        let mut inputs = collect_inputs(&raw, resolve)?;
        if let Some(vertex) = inputs[Semantic::Vertex.index()].clone() {
            for &(semantic, source) in vertex_extras {
                let slot = &mut inputs[semantic.index()];
                if slot.is_none() {
                    let mut input = Input::new(semantic);
                    for (&set, s) in &vertex.sets {
                        input.sets.insert(set, InputSet { offset: s.offset, source });
                    }
                    *slot = Some(input);
                }
            }
        }

        let (ordinal_str, count_str) = (ordinal.to_string(), count.to_string());
        let key = BlobKey::new(&[
            geometry.as_str(),
            ordinal_str.as_str(),
            count_str.as_str(),
            material_symbol.as_str(),
        ]);
        let (vertex_counts, polygon_indices) = match read_polylist_blob(cache, &key) {
            Some(cached) => {
                log::trace!("Blob hit for polylist {}", key.as_str());
                cached
            }
            None => {
                let vcount = xml::required_child(node, "vcount")?;
                let p = xml::required_child(node, "p")?;
                let parsed = (xml::parse_u32s(xml::text(&vcount))?, xml::parse_u32s(xml::text(&p))?);
                if cache.is_enabled() {
                    let mut blob = BlobWriter::new(BlobKind::Polylist);
                    blob.push_u32s(&parsed.0).push_u32s(&parsed.1);
                    cache.write_or_warn(&key, blob);
                }
                parsed
            }
        };

        if vertex_counts.len() != count {
            return Err(ColladaError::InvalidArray {
                id: format!("{geometry}/vcount"),
                reason: format!("declared {} faces but found {}", count, vertex_counts.len()),
            });
        }
        if let Some((face, &n)) = vertex_counts.iter().enumerate().find(|&(_, &n)| n != 3) {
            return Err(ColladaError::NonTriangleFace {
                geometry: geometry.to_string(),
                face,
                count: n,
            });
        }
        let n_vertices: usize = vertex_counts.iter().map(|&n| n as usize).sum();
        if polygon_indices.len() != n_vertices * n_inputs {
            return Err(ColladaError::InvalidArray {
                id: format!("{geometry}/p"),
                reason: format!(
                    "expected {} indices ({} vertices x {} inputs), found {}",
                    n_vertices * n_inputs,
                    n_vertices,
                    n_inputs,
                    polygon_indices.len()
                ),
            });
        }

        let ranges_key = BlobKey::new(&[key.as_str(), "ranges"]);
        let index_ranges = match read_ranges_blob(cache, &ranges_key, n_inputs) {
            Some(r) => r,
            None => {
                let ranges = compute_ranges(&polygon_indices, n_inputs);
                if cache.is_enabled() {
                    let mins: Vec<u32> = ranges.iter().map(|r| r.min).collect();
                    let maxs: Vec<u32> = ranges.iter().map(|r| r.max).collect();
                    let mut blob = BlobWriter::new(BlobKind::IndexRanges);
                    blob.push_u32s(&mins).push_u32s(&maxs);
                    cache.write_or_warn(&ranges_key, blob);
                }
                ranges
            }
        };
        let index_min = index_ranges.iter().map(|r| r.min).min().unwrap_or(0);
        let index_max = index_ranges.iter().map(|r| r.max).max().unwrap_or(0);

        Ok(Self {
            inputs,
            material_symbol,
            n_inputs,
            n_vertices,
            vertex_counts,
            polygon_indices,
            index_ranges,
            index_min,
            index_max,
        })
    }

    pub fn input(&self, semantic: Semantic) -> Option<&Input> {
        self.inputs[semantic.index()].as_ref()
    }

    pub fn face_count(&self) -> usize {
        self.vertex_counts.len()
    }

    /// Contiguous indices of the input at `offset`: `p[offset + n * n_inputs]`.
    pub fn extract_indices(&self, offset: u32) -> Vec<u32> {
        self.polygon_indices
            .iter()
            .skip(offset as usize)
            .step_by(self.n_inputs)
            .copied()
            .collect()
    }

    /// Range of indices used at `offset`.
    pub fn range(&self, offset: u32) -> Option<IndexRange> {
        self.index_ranges.get(offset as usize).copied()
    }
}

fn compute_ranges(indices: &[u32], n_inputs: usize) -> Vec<IndexRange> {
    let mut ranges = vec![
        IndexRange {
            min: u32::MAX,
            max: 0,
        };
        n_inputs
    ];
    for tuple in indices.chunks_exact(n_inputs) {
        for (range, &i) in ranges.iter_mut().zip(tuple) {
            range.min = range.min.min(i);
            range.max = range.max.max(i);
        }
    }
    for range in &mut ranges {
        if range.min > range.max {
            *range = IndexRange { min: 0, max: 0 };
        }
    }
    ranges
}

fn read_polylist_blob(cache: &BlobCache, key: &BlobKey) -> Option<(Vec<u32>, Vec<u32>)> {
    let mut reader = cache.read(key, BlobKind::Polylist)?;
    let vcount = reader.read_u32s().ok()?;
    let p = reader.read_u32s().ok()?;
    reader.is_at_end().then_some((vcount, p))
}

fn read_ranges_blob(cache: &BlobCache, key: &BlobKey, n_inputs: usize) -> Option<Vec<IndexRange>> {
    let mut reader = cache.read(key, BlobKind::IndexRanges)?;
    let mins = reader.read_u32s().ok()?;
    let maxs = reader.read_u32s().ok()?;
    if mins.len() != n_inputs || maxs.len() != n_inputs || !reader.is_at_end() {
        return None;
    }
    Some(
        mins.into_iter()
            .zip(maxs)
            .map(|(min, max)| IndexRange { min, max })
            .collect(),
    )
}

/// `<mesh>` payload of a geometry.
#[derive(Clone, Debug)]
pub struct GeometryMesh {
    pub sources: Vec<Source>,

    /// Source ids plus the `<vertices>` id, which aliases the POSITION source.
    pub sources_by_id: HashMap<Name, SourceId>,
    pub vertices_id: Name,

    /// Inputs declared inside `<vertices>`; always contains POSITION.
    pub vertex_inputs: Vec<(Semantic, SourceId)>,
    pub polylists: Vec<Polylist>,
}

impl GeometryMesh {
    fn parse(node: Node<'_, '_>, geometry: &Name, cache: &BlobCache) -> ColladaResult<Self> {
        let mut sources = Vec::new();
        let mut sources_by_id = HashMap::new();
        for source_node in xml::children(node, "source") {
            let source = Source::parse(source_node, cache, geometry)?;
            let id = SourceId(sources.len());
            if sources_by_id.insert(source.id.clone(), id).is_some() {
                return Err(ColladaError::DuplicateId {
                    category: "source",
                    id: source.id.to_string(),
                });
            }
            sources.push(source);
        }

        let lookup = |by_id: &HashMap<Name, SourceId>, name: &Name| {
            by_id
                .get(name)
                .copied()
                .ok_or_else(|| ColladaError::UnresolvedReference {
                    category: "source",
                    id: name.to_string(),
                })
        };

        let vertices = xml::required_child(node, "vertices")?;
        let vertices_id = xml::required_name_attr(&vertices, "id")?;
        let mut vertex_inputs = Vec::new();
        for input in xml::children(vertices, "input") {
            let raw = RawInput::parse(input)?;
            vertex_inputs.push((raw.semantic, lookup(&sources_by_id, &raw.source)?));
        }
        let position = vertex_inputs
            .iter()
            .find(|(s, _)| *s == Semantic::Position)
            .map(|&(_, id)| id)
            .ok_or_else(|| ColladaError::MissingPosition(geometry.to_string()))?;
        sources_by_id.insert(vertices_id.clone(), position);

        let extras: Vec<(Semantic, SourceId)> = vertex_inputs
            .iter()
            .copied()
            .filter(|(s, _)| *s != Semantic::Position)
            .collect();

        let mut polylists = Vec::new();
        for child in xml::elements(node) {
            match xml::tag(&child) {
                "source" | "vertices" | "extra" => {}
                "polylist" => polylists.push(Polylist::parse(
                    child,
                    geometry,
                    polylists.len(),
                    |name| lookup(&sources_by_id, name),
                    &extras,
                    cache,
                )?),
                t if UNSUPPORTED_PRIMITIVES.contains(&t) => {
                    return Err(ColladaError::UnsupportedPrimitive {
                        geometry: geometry.to_string(),
                        primitive: t.to_string(),
                    })
                }
                t => {
                    return Err(ColladaError::UnsupportedElement {
                        parent: xml::describe(&node),
                        element: t.to_string(),
                    })
                }
            }
        }

        Ok(Self {
            sources,
            sources_by_id,
            vertices_id,
            vertex_inputs,
            polylists,
        })
    }

    pub fn source(&self, id: SourceId) -> &Source {
        &self.sources[id.0]
    }

    pub fn find_source(&self, id: &Name) -> Option<SourceId> {
        self.sources_by_id.get(id).copied()
    }

    pub fn float_source(&self, id: SourceId) -> ColladaResult<&FloatArray> {
        self.sources
            .get(id.0)
            .ok_or_else(|| ColladaError::UnresolvedReference {
                category: "source",
                id: format!("#{}", id.0),
            })?
            .require_floats()
    }

    /// The POSITION source of `<vertices>`.
    pub fn position_source(&self) -> Option<SourceId> {
        self.vertex_inputs
            .iter()
            .find(|(s, _)| *s == Semantic::Position)
            .map(|&(_, id)| id)
    }
}

/// `<bind_vertex_input>`: binds an effect texcoord symbol to an input set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BindVertexInput {
    pub semantic: Name,
    pub input_semantic: Semantic,
    pub input_set: u32,
}

/// `<instance_material>` binding a polylist material symbol.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MaterialInstance {
    pub symbol: Name,
    pub material: MaterialId,
    pub vertex_inputs: Vec<BindVertexInput>,
}

impl MaterialInstance {
    /// Input set bound to an effect texcoord symbol.
    pub fn texcoord_set(&self, texcoord: &Name) -> Option<u32> {
        self.vertex_inputs
            .iter()
            .find(|b| &b.semantic == texcoord && b.input_semantic == Semantic::Texcoord)
            .map(|b| b.input_set)
    }
}

#[derive(Debug)]
pub struct Geometry {
    pub id: Name,
    pub name: Option<Name>,
    pub mesh: GeometryMesh,

    /// Bindings collected from every `<instance_geometry>` of this geometry;
    /// the first binding of a symbol wins.
    pub material_instances: Vec<MaterialInstance>,

    generated: OnceCell<Arc<Mesh>>,
}

impl Identified for Geometry {
    fn id(&self) -> &Name {
        &self.id
    }

    fn name(&self) -> Option<&Name> {
        self.name.as_ref()
    }
}

impl Geometry {
    pub fn parse(node: Node<'_, '_>, cache: &BlobCache) -> ColladaResult<Self> {
        let id = xml::required_name_attr(&node, "id")?;
        let mesh_node = match xml::child(node, "mesh") {
            Some(m) => m,
            None => {
                let primitive = xml::elements(node)
                    .map(|n| xml::tag(&n).to_string())
                    .find(|t| t != "asset" && t != "extra")
                    .unwrap_or_else(|| "mesh".to_string());
                return Err(ColladaError::UnsupportedPrimitive {
                    geometry: id.to_string(),
                    primitive,
                });
            }
        };

        let mesh = GeometryMesh::parse(mesh_node, &id, cache)?;
        log::debug!(
            "Parsed geometry '{}': {} sources, {} polylists",
            id,
            mesh.sources.len(),
            mesh.polylists.len()
        );

        Ok(Self {
            id,
            name: xml::name_attr(&node, "name"),
            mesh,
            material_instances: Vec::new(),
            generated: OnceCell::new(),
        })
    }

    /// Record an instance binding unless the symbol is already bound.
    pub fn add_material_instance(&mut self, instance: MaterialInstance) {
        if !self
            .material_instances
            .iter()
            .any(|m| m.symbol == instance.symbol)
        {
            self.material_instances.push(instance);
        }
    }

    pub fn material_instance(&self, symbol: &Name) -> Option<&MaterialInstance> {
        self.material_instances.iter().find(|m| &m.symbol == symbol)
    }

    pub(crate) fn generated(&self) -> &OnceCell<Arc<Mesh>> {
        &self.generated
    }

    pub fn is_generated(&self) -> bool {
        self.generated.get().is_some()
    }
}

/// Parse every `<geometry>` of a `<library_geometries>`, one fan-out task
/// each. Results come back in document order.
pub fn parse_library(
    library: Node<'_, '_>,
    cache: &BlobCache,
    parallel: bool,
) -> Vec<ColladaResult<Geometry>> {
    let nodes: Vec<Node<'_, '_>> = xml::children(library, "geometry").collect();
    log::debug!("Parsing {} geometries (parallel: {})", nodes.len(), parallel);
    fan_out("geometries", nodes, parallel, |node| Geometry::parse(node, cache))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::tests::temp_cache;

    pub(crate) const TWO_TRIANGLES: &str = r##"<geometry id="quad" name="Quad">
      <mesh>
        <source id="quad-pos">
          <float_array id="quad-pos-array" count="12">0 0 0 1 0 0 1 1 0 0 1 0</float_array>
          <technique_common><accessor source="#quad-pos-array" count="4" stride="3">
            <param name="X" type="float"/><param name="Y" type="float"/><param name="Z" type="float"/>
          </accessor></technique_common>
        </source>
        <source id="quad-nrm">
          <float_array id="quad-nrm-array" count="3">0 0 1</float_array>
          <technique_common><accessor source="#quad-nrm-array" count="1" stride="3">
            <param name="X" type="float"/><param name="Y" type="float"/><param name="Z" type="float"/>
          </accessor></technique_common>
        </source>
        <source id="quad-uv">
          <float_array id="quad-uv-array" count="8">0 0 1 0 1 1 0 1</float_array>
          <technique_common><accessor source="#quad-uv-array" count="4" stride="2">
            <param name="S" type="float"/><param name="T" type="float"/>
          </accessor></technique_common>
        </source>
        <vertices id="quad-vtx"><input semantic="POSITION" source="#quad-pos"/></vertices>
        <polylist count="2" material="mat0">
          <input semantic="VERTEX" source="#quad-vtx" offset="0"/>
          <input semantic="NORMAL" source="#quad-nrm" offset="1"/>
          <input semantic="TEXCOORD" source="#quad-uv" offset="2" set="0"/>
          <vcount>3 3</vcount>
          <p>0 0 0 1 0 1 2 0 2  0 0 0 2 0 2 3 0 3</p>
        </polylist>
      </mesh>
    </geometry>"##;

    fn parse(xml: &str, cache: &BlobCache) -> ColladaResult<Geometry> {
        let doc = roxmltree::Document::parse(xml).unwrap();
        Geometry::parse(doc.root_element(), cache)
    }

    #[test]
    fn test_polylist_counts() {
        let geometry = parse(TWO_TRIANGLES, &BlobCache::disabled()).unwrap();
        let polylist = &geometry.mesh.polylists[0];

        assert_eq!(polylist.n_inputs, 3);
        assert_eq!(polylist.face_count(), 2);
        assert_eq!(polylist.n_vertices, 6);
        assert_eq!(
            polylist.n_vertices,
            polylist.vertex_counts.iter().sum::<u32>() as usize
        );
        assert_eq!(polylist.polygon_indices.len(), 18);
        assert_eq!(polylist.material_symbol.as_str(), "mat0");
    }

    #[test]
    fn test_vertex_input_aliases_position() {
        let geometry = parse(TWO_TRIANGLES, &BlobCache::disabled()).unwrap();
        let mesh = &geometry.mesh;
        let vertex = mesh.polylists[0].input(Semantic::Vertex).unwrap();
        let source = vertex.first_set().unwrap().source;

        assert_eq!(Some(source), mesh.position_source());
        assert_eq!(mesh.find_source(&Name::new("quad-vtx")), Some(source));
        assert_eq!(mesh.source(source).id.as_str(), "quad-pos");
    }

    #[test]
    fn test_extract_indices_and_ranges() {
        let geometry = parse(TWO_TRIANGLES, &BlobCache::disabled()).unwrap();
        let polylist = &geometry.mesh.polylists[0];

        assert_eq!(polylist.extract_indices(0), vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(polylist.extract_indices(1), vec![0; 6]);
        assert_eq!(polylist.range(0), Some(IndexRange { min: 0, max: 3 }));
        assert_eq!(polylist.range(1), Some(IndexRange { min: 0, max: 0 }));
        assert_eq!((polylist.index_min, polylist.index_max), (0, 3));
    }

    #[test]
    fn test_non_triangle_face_fails() {
        let xml = TWO_TRIANGLES
            .replace("<vcount>3 3</vcount>", "<vcount>4 2</vcount>");
        let err = parse(&xml, &BlobCache::disabled()).unwrap_err();
        assert!(matches!(
            err,
            ColladaError::NonTriangleFace { face: 0, count: 4, .. }
        ));
    }

    #[test]
    fn test_short_index_list_fails() {
        let xml = TWO_TRIANGLES.replace("2 0 2 3 0 3</p>", "2 0 2 3 0</p>");
        assert!(matches!(
            parse(&xml, &BlobCache::disabled()),
            Err(ColladaError::InvalidArray { .. })
        ));
    }

    #[test]
    fn test_triangles_element_is_unsupported() {
        let xml = TWO_TRIANGLES
            .replace("<polylist count=\"2\" material=\"mat0\">", "<triangles count=\"2\">")
            .replace("</polylist>", "</triangles>");
        assert!(matches!(
            parse(&xml, &BlobCache::disabled()),
            Err(ColladaError::UnsupportedPrimitive { .. })
        ));
    }

    #[test]
    fn test_missing_position_fails() {
        let xml = TWO_TRIANGLES.replace(
            r##"<input semantic="POSITION" source="#quad-pos"/>"##,
            r##"<input semantic="NORMAL" source="#quad-nrm"/>"##,
        );
        assert!(matches!(
            parse(&xml, &BlobCache::disabled()),
            Err(ColladaError::MissingPosition(_))
        ));
    }

    #[test]
    fn test_polylist_cache_round_trip() {
        let cache = temp_cache("polylist_round_trip");
        let first = parse(TWO_TRIANGLES, &cache).unwrap();
        let second = parse(TWO_TRIANGLES, &cache).unwrap();

        let (a, b) = (&first.mesh.polylists[0], &second.mesh.polylists[0]);
        assert_eq!(a.polygon_indices, b.polygon_indices);
        assert_eq!(a.vertex_counts, b.vertex_counts);
        assert_eq!(a.index_ranges, b.index_ranges);
    }

    /// Two polylists with the same face count and symbol but different faces.
    fn two_polylists() -> String {
        let second = r##"</polylist>
        <polylist count="2" material="mat0">
          <input semantic="VERTEX" source="#quad-vtx" offset="0"/>
          <input semantic="NORMAL" source="#quad-nrm" offset="1"/>
          <input semantic="TEXCOORD" source="#quad-uv" offset="2" set="0"/>
          <vcount>3 3</vcount>
          <p>3 0 3 2 0 2 1 0 1  3 0 3 1 0 1 0 0 0</p>
        </polylist>"##;
        TWO_TRIANGLES.replacen("</polylist>", second, 1)
    }

    #[test]
    fn test_polylists_keep_document_order() {
        let geometry = parse(&two_polylists(), &BlobCache::disabled()).unwrap();
        let polylists = &geometry.mesh.polylists;

        assert_eq!(polylists.len(), 2);
        assert_eq!(polylists[0].extract_indices(0), vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(polylists[1].extract_indices(0), vec![3, 2, 1, 3, 1, 0]);
    }

    #[test]
    fn test_same_shaped_polylists_do_not_share_blobs() {
        let cache = temp_cache("same_shaped_polylists");
        let plain = parse(&two_polylists(), &BlobCache::disabled()).unwrap();
        let cold = parse(&two_polylists(), &cache).unwrap();
        let warm = parse(&two_polylists(), &cache).unwrap();

        for geometry in [&cold, &warm] {
            for (a, b) in plain.mesh.polylists.iter().zip(&geometry.mesh.polylists) {
                assert_eq!(a.polygon_indices, b.polygon_indices);
                assert_eq!(a.index_ranges, b.index_ranges);
            }
        }
    }

    #[test]
    fn test_unknown_input_semantic_fails() {
        let xml = TWO_TRIANGLES.replace(
            r##"<input semantic="NORMAL" source="#quad-nrm" offset="1"/>"##,
            r##"<input semantic="BINORMAL" source="#quad-nrm" offset="1"/>"##,
        );
        assert!(matches!(
            parse(&xml, &BlobCache::disabled()),
            Err(ColladaError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_first_material_binding_wins() {
        let mut geometry = parse(TWO_TRIANGLES, &BlobCache::disabled()).unwrap();
        let binding = |m| MaterialInstance {
            symbol: Name::new("mat0"),
            material: MaterialId(m),
            vertex_inputs: Vec::new(),
        };
        geometry.add_material_instance(binding(1));
        geometry.add_material_instance(binding(2));

        assert_eq!(geometry.material_instances.len(), 1);
        assert_eq!(
            geometry.material_instance(&Name::new("mat0")).unwrap().material,
            MaterialId(1)
        );
    }

    #[test]
    fn test_library_keeps_document_order() {
        let xml = format!(
            "<library_geometries>{}{}</library_geometries>",
            TWO_TRIANGLES,
            TWO_TRIANGLES.replace("id=\"quad\"", "id=\"quad2\"")
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let results = parse_library(doc.root_element(), &BlobCache::disabled(), true);

        let ids: Vec<String> = results
            .into_iter()
            .map(|r| r.unwrap().id.to_string())
            .collect();
        assert_eq!(ids, vec!["quad", "quad2"]);
    }
}
