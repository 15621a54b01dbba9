//! Single-indexed triangle meshes.
//!
//! The merged [`Mesh`] keeps one index list per stream. GPU vertex buffers
//! and ray tracers want one index per vertex instead, so each distinct
//! (position, normal, uv) tuple becomes one vertex here.

use std::collections::HashMap;

use dae_math::{Aabb, Vec2, Vec3};

use super::mesh::{LayerPass, Mesh, MeshLayer, PassStream, StreamKind};

/// A mesh with one shared index per vertex.
#[derive(Clone, Debug)]
pub struct TriangleMesh {
    pub positions: Vec<Vec3>,

    /// Per vertex; `None` until loaded or computed.
    pub normals: Option<Vec<Vec3>>,

    /// First texcoord set, per vertex.
    pub uvs: Option<Vec<Vec2>>,

    /// Every 3 indices form a triangle.
    pub indices: Vec<u32>,

    /// Index into the source mesh's materials.
    pub material: usize,
    pub bounds: Aabb,
}

impl TriangleMesh {
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>, normals: Option<Vec<Vec3>>) -> Self {
        let bounds = Aabb::from_iter(positions.iter().copied());
        Self {
            positions,
            normals,
            uvs: None,
            indices,
            material: 0,
            bounds,
        }
    }

    /// Replace the normals with smooth, area-weighted vertex normals.
    pub fn compute_normals(&mut self) {
        let vertex_count = self.positions.len();
        let mut normals = vec![Vec3::ZERO; vertex_count];

        for face in self.indices.chunks_exact(3) {
            let ids = [face[0] as usize, face[1] as usize, face[2] as usize];
            if ids.iter().any(|&i| i >= vertex_count) {
                continue;
            }
            let [p0, p1, p2] = ids.map(|i| self.positions[i]);
            let face_normal = (p1 - p0).cross(p2 - p0);
            for i in ids {
                normals[i] += face_normal;
            }
        }

        for normal in &mut normals {
            *normal = normal.try_normalize().unwrap_or(Vec3::Y);
        }
        self.normals = Some(normals);
    }

    /// Compute normals if missing or not one per vertex.
    pub fn ensure_normals(&mut self) {
        let count = self.normals.as_ref().map(Vec::len);
        if count != Some(self.positions.len()) {
            if let Some(n) = count {
                log::debug!(
                    "Normal count ({}) doesn't match vertex count ({}), computing smooth normals",
                    n,
                    self.positions.len()
                );
            }
            self.compute_normals();
        }
    }

    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    pub fn has_uvs(&self) -> bool {
        self.uvs.is_some()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Triangles as `[v0, v1, v2]` position triplets, skipping any with an
    /// out-of-range index.
    pub fn triangle_vertices(&self) -> Vec<[Vec3; 3]> {
        self.indices
            .chunks_exact(3)
            .filter_map(|face| {
                let get = |i: u32| self.positions.get(i as usize).copied();
                Some([get(face[0])?, get(face[1])?, get(face[2])?])
            })
            .collect()
    }
}

/// Sentinel for an absent stream in a vertex key.
const NONE: u32 = u32::MAX;

fn convert_pass(layer: &MeshLayer, pass: &LayerPass) -> TriangleMesh {
    let positions = layer.stream(StreamKind::Position);
    let normals = layer.stream(StreamKind::Normal);
    let texcoords = layer.stream(StreamKind::Texcoord);

    let position_indices = pass.first_stream(StreamKind::Position);
    let normal_indices = pass.first_stream(StreamKind::Normal);
    let uv_indices = pass.first_stream(StreamKind::Texcoord);

    let mut out = TriangleMesh::new(Vec::new(), Vec::with_capacity(pass.vertex_count), None);
    out.material = pass.material;
    let mut out_normals = normals.zip(normal_indices).map(|_| Vec::new());
    let mut out_uvs = texcoords.zip(uv_indices).map(|_| Vec::new());
    let mut vertex_of: HashMap<[u32; 3], u32> = HashMap::new();

    let index = |s: Option<&PassStream>, v: usize| {
        s.and_then(|s| s.merged_index(v)).unwrap_or(NONE)
    };
    for v in 0..pass.vertex_count {
        let key = [
            index(position_indices, v),
            index(normal_indices, v),
            index(uv_indices, v),
        ];
        let next = out.positions.len() as u32;
        let vertex = *vertex_of.entry(key).or_insert_with(|| {
            out.positions.push(positions.map_or(Vec3::ZERO, |s| s.vec3(key[0] as usize)));
            if let (Some(list), Some(s)) = (out_normals.as_mut(), normals) {
                list.push(s.vec3(key[1] as usize));
            }
            if let (Some(list), Some(s)) = (out_uvs.as_mut(), texcoords) {
                list.push(s.vec3(key[2] as usize).truncate());
            }
            next
        });
        out.indices.push(vertex);
    }

    out.normals = out_normals;
    out.uvs = out_uvs;
    out.bounds = Aabb::from_iter(out.positions.iter().copied());
    out.ensure_normals();
    out
}

impl Mesh {
    /// One single-indexed triangle mesh per layer pass, normals filled in.
    pub fn to_triangle_meshes(&self) -> Vec<TriangleMesh> {
        self.layers
            .iter()
            .flat_map(|layer| layer.passes.iter().map(move |pass| convert_pass(layer, pass)))
            .collect()
    }
}
