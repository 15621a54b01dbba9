//! Merged renderer mesh generated from a COLLADA geometry.
//!
//! Every polylist becomes one [`MeshLayer`]. Within a layer each semantic
//! gets one [`DataStream`] holding the data of all its input sets back to
//! back; a [`PassStream`] carries the contiguous per-vertex indices of one
//! set plus the delta that moves them into the merged stream. Indices stay
//! per-stream here; [`Mesh::to_triangle_meshes`] produces single-indexed
//! vertex buffers.

use dae_math::{Aabb, Vec3};
use serde::Serialize;

use super::material::Material;
use super::GeneratorContext;
use crate::cache::{BlobCache, BlobKey, BlobKind, BlobWriter};
use crate::collada::{
    Document, Geometry, GeometryId, IndexRange, MaterialInstance, Polylist, Semantic,
};
use crate::error::{ColladaError, ColladaResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum StreamKind {
    Position,
    Normal,
    Texcoord,
}

/// Semantics in processing order, with the stream each one feeds.
const STREAM_ORDER: [(Semantic, StreamKind); 3] = [
    (Semantic::Normal, StreamKind::Normal),
    (Semantic::Texcoord, StreamKind::Texcoord),
    (Semantic::Vertex, StreamKind::Position),
];

/// Where one input set's data starts inside a merged stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StreamSet {
    pub set: u32,
    pub delta: u32,
    pub count: u32,
}

/// All sets of one semantic, concatenated.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DataStream {
    pub kind: StreamKind,
    pub n_components: usize,

    /// Packed elements, `n_components` floats each.
    pub data: Vec<f32>,
    pub sets: Vec<StreamSet>,
}

impl DataStream {
    fn new(kind: StreamKind) -> Self {
        Self {
            kind,
            n_components: 0,
            data: Vec::new(),
            sets: Vec::new(),
        }
    }

    pub fn element_count(&self) -> usize {
        if self.n_components == 0 {
            0
        } else {
            self.data.len() / self.n_components
        }
    }

    pub fn element(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.n_components)?;
        self.data.get(start..start + self.n_components)
    }

    /// Element as a point; missing components are zero.
    pub fn vec3(&self, index: usize) -> Vec3 {
        let e = self.element(index).unwrap_or(&[]);
        let at = |i: usize| e.get(i).copied().unwrap_or(0.0);
        Vec3::new(at(0), at(1), at(2))
    }

    pub fn set(&self, set: u32) -> Option<&StreamSet> {
        self.sets.iter().find(|s| s.set == set)
    }
}

/// Per-vertex indices of one input set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PassStream {
    pub kind: StreamKind,
    pub set: u32,

    /// Indices into the set's own source, one per polylist vertex.
    pub indices: Vec<u32>,

    /// Added to `indices` to address the merged [`DataStream`].
    pub delta: u32,

    /// Smallest and largest entry of `indices`.
    pub range: IndexRange,
}

impl PassStream {
    pub fn merged_index(&self, vertex: usize) -> Option<u32> {
        self.indices.get(vertex).map(|&i| i + self.delta)
    }
}

/// One draw call's worth of triangles.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LayerPass {
    /// Index into [`Mesh::materials`].
    pub material: usize,
    pub vertex_count: usize,
    pub streams: Vec<PassStream>,

    /// Position index range of the pass.
    pub index_range: IndexRange,
}

impl LayerPass {
    pub fn stream(&self, kind: StreamKind, set: u32) -> Option<&PassStream> {
        self.streams.iter().find(|s| s.kind == kind && s.set == set)
    }

    /// Lowest-numbered set of a kind.
    pub fn first_stream(&self, kind: StreamKind) -> Option<&PassStream> {
        self.streams
            .iter()
            .filter(|s| s.kind == kind)
            .min_by_key(|s| s.set)
    }

    pub fn triangle_count(&self) -> usize {
        self.vertex_count / 3
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MeshLayer {
    pub streams: Vec<DataStream>,
    pub passes: Vec<LayerPass>,

    /// Normals were generated rather than read from the document.
    pub generated_normals: bool,
}

impl MeshLayer {
    pub fn stream(&self, kind: StreamKind) -> Option<&DataStream> {
        self.streams.iter().find(|s| s.kind == kind)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Mesh {
    pub name: String,
    pub geometry: GeometryId,
    pub layers: Vec<MeshLayer>,
    pub materials: Vec<Material>,
    pub bounds: Aabb,
}

impl Mesh {
    pub fn passes(&self) -> impl Iterator<Item = &LayerPass> {
        self.layers.iter().flat_map(|l| l.passes.iter())
    }

    pub fn stream_count(&self) -> usize {
        self.layers.iter().map(|l| l.streams.len()).sum()
    }

    pub fn index_count(&self) -> usize {
        self.passes().map(|p| p.vertex_count).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.passes().map(LayerPass::triangle_count).sum()
    }

    pub fn has_generated_normals(&self) -> bool {
        self.layers.iter().any(|l| l.generated_normals)
    }
}

/// Build the merged mesh of one geometry.
///
/// Fails if a polylist lacks positions, indexes past its source, names a
/// material symbol nothing binds, or samples a texture through a texcoord
/// symbol that cannot be tied to an input set.
pub fn generate_mesh(
    ctx: &GeneratorContext,
    document: &Document,
    id: GeometryId,
) -> ColladaResult<Mesh> {
    let geometry = document
        .geometry(id)
        .ok_or_else(|| ColladaError::UnresolvedReference {
            category: "geometry",
            id: format!("#{}", id.0),
        })?;

    let mut materials: Vec<Material> = Vec::new();
    let mut layers = Vec::with_capacity(geometry.mesh.polylists.len());
    for polylist in &geometry.mesh.polylists {
        let material = resolve_material(document, geometry, polylist)?;
        let material = match materials.iter().position(|m| *m == material) {
            Some(index) => index,
            None => {
                materials.push(material);
                materials.len() - 1
            }
        };
        layers.push(build_layer(geometry, polylist, material)?);
    }

    let has_normals = layers.iter().any(|l| l.stream(StreamKind::Normal).is_some());
    if !has_normals && !layers.is_empty() {
        attach_generated_normals(&ctx.cache, geometry, &mut layers);
    }

    let bounds = Aabb::from_iter(layers.iter().filter_map(|l| l.stream(StreamKind::Position)).flat_map(
        |s| (0..s.element_count()).map(move |i| s.vec3(i)),
    ));

    let mesh = Mesh {
        name: geometry.name.as_ref().unwrap_or(&geometry.id).to_string(),
        geometry: id,
        layers,
        materials,
        bounds,
    };
    log::debug!(
        "Generated mesh '{}': {} layers, {} streams, {} triangles{}",
        mesh.name,
        mesh.layers.len(),
        mesh.stream_count(),
        mesh.triangle_count(),
        if mesh.has_generated_normals() { " (generated normals)" } else { "" }
    );
    Ok(mesh)
}

fn build_layer(geometry: &Geometry, polylist: &Polylist, material: usize) -> ColladaResult<MeshLayer> {
    let mesh = &geometry.mesh;
    let mut streams = Vec::new();
    let mut pass_streams = Vec::new();
    let mut index_range = IndexRange { min: 0, max: 0 };

    for (semantic, kind) in STREAM_ORDER {
        let Some(input) = polylist.input(semantic) else {
            if kind == StreamKind::Position {
                return Err(ColladaError::MissingPosition(geometry.id.to_string()));
            }
            continue;
        };

        let mut stream = DataStream::new(kind);
        for (&set, input_set) in &input.sets {
            let source = mesh.float_source(input_set.source)?;
            if stream.sets.is_empty() {
                stream.n_components = source.n_components;
            } else if stream.n_components != source.n_components {
                return Err(ColladaError::InvalidArray {
                    id: source.id.to_string(),
                    reason: format!(
                        "{} set {} has {} components, earlier sets have {}",
                        semantic.as_str(),
                        set,
                        source.n_components,
                        stream.n_components
                    ),
                });
            }

            let count = source.element_count();
            let range = polylist
                .range(input_set.offset)
                .unwrap_or(IndexRange { min: 0, max: 0 });
            if polylist.n_vertices > 0 && range.max as usize >= count {
                return Err(ColladaError::IndexOutOfRange {
                    source_id: source.id.to_string(),
                    index: range.max,
                    count,
                });
            }

            let delta = stream.element_count() as u32;
            stream.data.extend(source.packed());
            stream.sets.push(StreamSet {
                set,
                delta,
                count: count as u32,
            });
            if kind == StreamKind::Position && pass_streams.iter().all(|s: &PassStream| s.kind != kind) {
                index_range = range;
            }
            pass_streams.push(PassStream {
                kind,
                set,
                indices: polylist.extract_indices(input_set.offset),
                delta,
                range,
            });
        }
        streams.push(stream);
    }

    Ok(MeshLayer {
        streams,
        passes: vec![LayerPass {
            material,
            vertex_count: polylist.n_vertices,
            streams: pass_streams,
            index_range,
        }],
        generated_normals: false,
    })
}

/// Material of a polylist through the instance binding of its symbol. An
/// empty symbol gets the default material; an unbound one fails the mesh.
fn resolve_material(
    document: &Document,
    geometry: &Geometry,
    polylist: &Polylist,
) -> ColladaResult<Material> {
    let symbol = &polylist.material_symbol;
    if symbol.is_empty() {
        return Ok(Material::default());
    }

    let instance: &MaterialInstance =
        geometry
            .material_instance(symbol)
            .ok_or_else(|| ColladaError::MissingMaterialInstance {
                geometry: geometry.id.to_string(),
                symbol: symbol.to_string(),
            })?;

    let texcoord_sets = polylist.input(Semantic::Texcoord).map(|input| &input.sets);
    Material::from_effect(document, instance.material, |_, texcoord| {
        let unresolved = || ColladaError::UnresolvedTexcoordBinding {
            material: symbol.to_string(),
            texcoord: texcoord.to_string(),
        };
        let sets = texcoord_sets.ok_or_else(unresolved)?;
        match instance.texcoord_set(texcoord) {
            Some(set) if sets.contains_key(&set) => Ok(set),
            Some(_) => Err(unresolved()),
            None if sets.len() == 1 => sets.keys().next().copied().ok_or_else(unresolved),
            None => Err(unresolved()),
        }
    })
}

/// Area-weighted smooth normals over a layer's position stream, one per
/// position element.
fn smooth_normals(layer: &MeshLayer) -> Vec<f32> {
    let Some(positions) = layer.stream(StreamKind::Position) else {
        return Vec::new();
    };
    let count = positions.element_count();
    let mut normals = vec![Vec3::ZERO; count];

    for pass in &layer.passes {
        for stream in pass.streams.iter().filter(|s| s.kind == StreamKind::Position) {
            for face in stream.indices.chunks_exact(3) {
                let ids = [face[0], face[1], face[2]].map(|i| (i + stream.delta) as usize);
                if ids.iter().any(|&i| i >= count) {
                    continue;
                }
                let [p0, p1, p2] = ids.map(|i| positions.vec3(i));
                // Counter-clockwise faces are front-facing.
                let face_normal = (p1 - p0).cross(p2 - p0);
                for i in ids {
                    normals[i] += face_normal;
                }
            }
        }
    }

    normals
        .into_iter()
        .flat_map(|n| n.try_normalize().unwrap_or(Vec3::Y).to_array())
        .collect()
}

fn normals_key(geometry: &Geometry) -> BlobKey {
    BlobKey::new(&[geometry.id.as_str(), "normals"])
}

/// Cached normals, one array per layer. Any shape mismatch is a miss.
fn read_normals_blob(cache: &BlobCache, key: &BlobKey, expected: &[usize]) -> Option<Vec<Vec<f32>>> {
    let mut reader = cache.read(key, BlobKind::Normals)?;
    let layers = reader.read_u32().ok()? as usize;
    if layers != expected.len() {
        return None;
    }
    let mut normals = Vec::with_capacity(layers);
    for &len in expected {
        let data = reader.read_f32s().ok()?;
        if data.len() != len {
            return None;
        }
        normals.push(data);
    }
    reader.is_at_end().then_some(normals)
}

fn attach_generated_normals(cache: &BlobCache, geometry: &Geometry, layers: &mut [MeshLayer]) {
    let key = normals_key(geometry);
    let expected: Vec<usize> = layers
        .iter()
        .map(|l| l.stream(StreamKind::Position).map_or(0, |s| s.element_count() * 3))
        .collect();

    let normals = match read_normals_blob(cache, &key, &expected) {
        Some(cached) => {
            log::trace!("Blob hit for normals of '{}'", geometry.id);
            cached
        }
        None => {
            let computed: Vec<Vec<f32>> = layers.iter().map(smooth_normals).collect();
            if cache.is_enabled() {
                let mut blob = BlobWriter::new(BlobKind::Normals);
                blob.push_u32(computed.len() as u32);
                for data in &computed {
                    blob.push_f32s(data);
                }
                cache.write_or_warn(&key, blob);
            }
            computed
        }
    };

    for (layer, data) in layers.iter_mut().zip(normals) {
        let Some(positions) = layer.stream(StreamKind::Position) else {
            continue;
        };
        let stream = DataStream {
            kind: StreamKind::Normal,
            n_components: 3,
            data,
            sets: positions.sets.clone(),
        };
        layer.streams.insert(0, stream);

        for pass in &mut layer.passes {
            let derived: Vec<PassStream> = pass
                .streams
                .iter()
                .filter(|s| s.kind == StreamKind::Position)
                .map(|s| PassStream {
                    kind: StreamKind::Normal,
                    ..s.clone()
                })
                .collect();
            pass.streams.splice(0..0, derived);
        }
        layer.generated_normals = true;
    }
}
