use std::{fs, path::Path};

use index_vec::{IndexSlice, IndexVec};
use indexmap::IndexMap;
use nalgebra::Unit;
use thiserror::Error;

use crate::geometry::{BarycentricCoordinates, FloatType, Triangle, WorldPoint, WorldVector};

use super::{
    GeometryError, TriangleIdx, VertexIdx,
    triangle_bvh::{BuildStats, BvhSettings, TriangleBvh},
};

/// Triangle mesh together with its acceleration structure.
///
/// The geometry is immutable once the mesh is created, so the hierarchy never goes stale.
#[derive(Clone, Debug)]
pub struct Mesh {
    vertices: IndexVec<VertexIdx, WorldPoint>,
    /// Per vertex shading normals, either for all vertices or none.
    /// Normalized, or zero where the input normal had no length.
    normals: Option<IndexVec<VertexIdx, WorldVector>>,
    triangles: IndexVec<TriangleIdx, Triangle<VertexIdx>>,
    bvh: TriangleBvh,
    build_stats: BuildStats,
}

impl Mesh {
    /// Creates a mesh with flat shading.
    pub fn new(
        vertices: Vec<WorldPoint>,
        triangles: Vec<Triangle<VertexIdx>>,
        settings: &BvhSettings,
    ) -> Result<Mesh, GeometryError> {
        Self::build(IndexVec::from_vec(vertices), None, IndexVec::from_vec(triangles), settings)
    }

    /// Creates a mesh with smooth shading, `normals` has one entry per vertex.
    pub fn with_normals(
        vertices: Vec<WorldPoint>,
        normals: Vec<WorldVector>,
        triangles: Vec<Triangle<VertexIdx>>,
        settings: &BvhSettings,
    ) -> Result<Mesh, GeometryError> {
        if normals.len() != vertices.len() {
            return Err(GeometryError::NormalCountMismatch {
                vertices: vertices.len(),
                normals: normals.len(),
            });
        }
        let normals = normals.into_iter().map(normalize_or_zero).collect();
        Self::build(
            IndexVec::from_vec(vertices),
            Some(normals),
            IndexVec::from_vec(triangles),
            settings,
        )
    }

    /// Loads all triangles from a Wavefront OBJ file.
    /// Vertex normals are used only if the file provides them for every face.
    pub fn with_obj(path: impl AsRef<Path>, settings: &BvhSettings) -> Result<Mesh, ObjOpenError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let parsed = wavefront_obj::obj::parse(content)?;

        let (vertices, normals, triangles) = load_obj(parsed);
        log::debug!(
            "Loaded {} triangles and {} vertices from {}",
            triangles.len(),
            vertices.len(),
            path.display()
        );

        Ok(Self::build(vertices, normals, triangles, settings)?)
    }

    fn build(
        vertices: IndexVec<VertexIdx, WorldPoint>,
        normals: Option<IndexVec<VertexIdx, WorldVector>>,
        triangles: IndexVec<TriangleIdx, Triangle<VertexIdx>>,
        settings: &BvhSettings,
    ) -> Result<Mesh, GeometryError> {
        if triangles.is_empty() {
            return Err(GeometryError::EmptyGeometry);
        }

        for (triangle, indices) in triangles.iter_enumerated() {
            if let Some(vertex) = indices.iter().find(|i| i.index() >= vertices.len()) {
                return Err(GeometryError::VertexIndexOutOfRange {
                    triangle: triangle.index(),
                    vertex: vertex.index(),
                    vertex_count: vertices.len(),
                });
            }
        }

        let positions: IndexVec<TriangleIdx, Triangle<WorldPoint>> = triangles
            .iter()
            .map(|t| t.map(|i| vertices[*i]))
            .collect();
        let (bvh, build_stats) = TriangleBvh::build(&positions, settings);

        log::debug!(
            "Built hierarchy over {} triangles: {} nodes, {} leaves, depth {}",
            triangles.len(),
            build_stats.node_count,
            build_stats.leaf_count,
            build_stats.max_depth
        );
        if build_stats.oversized_leaves > 0 {
            log::warn!(
                "{} leaves could not be split, the largest has {} triangles",
                build_stats.oversized_leaves,
                build_stats.largest_oversized_leaf
            );
        }

        Ok(Mesh {
            vertices,
            normals,
            triangles,
            bvh,
            build_stats,
        })
    }

    pub fn triangle(&self, index: TriangleIdx) -> Triangle<WorldPoint> {
        self.triangles[index].map(|i| self.vertices[*i])
    }

    pub fn triangles(&self) -> impl Iterator<Item = (TriangleIdx, Triangle<WorldPoint>)> + '_ {
        self.triangles
            .indices()
            .map(|index| (index, self.triangle(index)))
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn vertices(&self) -> &IndexSlice<VertexIdx, [WorldPoint]> {
        &self.vertices
    }

    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    pub fn bvh(&self) -> &TriangleBvh {
        &self.bvh
    }

    pub fn build_stats(&self) -> &BuildStats {
        &self.build_stats
    }

    /// Normal used for shading at the given point of a triangle.
    /// Interpolated from the vertex normals if the mesh has them, otherwise the face normal.
    /// Returns None only for a degenerate triangle without vertex normals.
    pub fn shading_normal(
        &self,
        index: TriangleIdx,
        uv: &BarycentricCoordinates<FloatType>,
    ) -> Option<Unit<WorldVector>> {
        let face_normal = || self.triangle(index).unit_normal();

        match &self.normals {
            Some(normals) => {
                let vertex_normals = self.triangles[index].map(|i| normals[*i]);
                // Opposing vertex normals can cancel out
                Unit::try_new(uv.interpolate_triangle(&vertex_normals), 0.0).or_else(face_normal)
            }
            None => face_normal(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ObjOpenError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse file: {0}")]
    ParseError(#[from] wavefront_obj::ParseError),

    #[error("Invalid geometry: {0}")]
    Geometry(#[from] GeometryError),
}

type ObjGeometry = (
    IndexVec<VertexIdx, WorldPoint>,
    Option<IndexVec<VertexIdx, WorldVector>>,
    IndexVec<TriangleIdx, Triangle<VertexIdx>>,
);

fn normalize_or_zero(v: WorldVector) -> WorldVector {
    v.try_normalize(0.0).unwrap_or_else(WorldVector::zeros)
}

fn load_obj(obj: wavefront_obj::obj::ObjSet) -> ObjGeometry {
    let mut triangles = IndexVec::new();
    // Keyed by object, position index and normal index; indices are local to each object
    let mut vertices: IndexMap<(usize, usize, Option<usize>), (WorldPoint, Option<WorldVector>)> =
        IndexMap::new();
    let mut skipped = 0usize;

    for (object_index, o) in obj.objects.iter().enumerate() {
        for geometry in &o.geometry {
            for shape in &geometry.shapes {
                let wavefront_obj::obj::Primitive::Triangle(a, b, c) = shape.primitive else {
                    skipped += 1;
                    continue;
                };

                let mut handle_vertex = |(v, _vt, vn): (usize, Option<usize>, Option<usize>)| {
                    let entry = vertices.entry((object_index, v, vn));
                    let index = entry.index();
                    entry.or_insert_with(|| {
                        let vertex = &o.vertices[v];
                        let normal = vn.map(|i| &o.normals[i]);
                        (
                            WorldPoint::new(vertex.x, vertex.y, vertex.z),
                            normal.map(|n| WorldVector::new(n.x, n.y, n.z)),
                        )
                    });
                    VertexIdx::from_usize(index)
                };

                let a = handle_vertex(a);
                let b = handle_vertex(b);
                let c = handle_vertex(c);

                triangles.push(Triangle::new(a, b, c));
            }
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} non-triangle primitives");
    }

    let (positions, normals): (Vec<_>, Vec<_>) = vertices.into_values().unzip();
    let positions = IndexVec::from_vec(positions);
    let normals = normals
        .into_iter()
        .map(|n| n.map(normalize_or_zero))
        .collect::<Option<IndexVec<VertexIdx, _>>>();

    (positions, normals, triangles)
}
