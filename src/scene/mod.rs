mod mesh;
pub mod triangle_bvh;

use index_vec::{IndexSlice, IndexVec};
use nalgebra::Unit;
use thiserror::Error;

use crate::geometry::{FloatType, HitRecord, Ray, WorldBox, WorldPoint, WorldVector};

pub use mesh::{Mesh, ObjOpenError};
pub use triangle_bvh::{BuildStats, BvhSettings, BvhStatistics, TraversalCounters, TraversalStack, TriangleBvh};

use triangle_bvh::NearestHit;

index_vec::define_index_type! {
    pub struct MeshIdx = u32;
}

index_vec::define_index_type! {
    pub struct TriangleIdx = u32;
}

index_vec::define_index_type! {
    pub struct VertexIdx = u32;
}

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("Mesh has no triangles")]
    EmptyGeometry,

    #[error("Scene has no meshes")]
    NoMeshes,

    #[error("Triangle {triangle} refers to vertex {vertex}, but there are only {vertex_count} vertices")]
    VertexIndexOutOfRange {
        triangle: usize,
        vertex: usize,
        vertex_count: usize,
    },

    #[error("Got {normals} vertex normals for {vertices} vertices")]
    NormalCountMismatch { vertices: usize, normals: usize },
}

/// Collection of meshes that rays are tested against.
#[derive(Clone, Debug)]
pub struct Scene {
    meshes: IndexVec<MeshIdx, Mesh>,
}

impl Scene {
    pub fn new(meshes: impl IntoIterator<Item = Mesh>) -> Result<Scene, GeometryError> {
        let meshes: IndexVec<MeshIdx, Mesh> = meshes.into_iter().collect();
        if meshes.is_empty() {
            return Err(GeometryError::NoMeshes);
        }

        log::info!(
            "Scene with {} meshes, {} triangles",
            meshes.len(),
            meshes.iter().map(Mesh::triangle_count).sum::<usize>()
        );

        Ok(Scene { meshes })
    }

    pub fn meshes(&self) -> &IndexSlice<MeshIdx, [Mesh]> {
        &self.meshes
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(Mesh::triangle_count).sum()
    }

    pub fn bounding_box(&self) -> WorldBox {
        self.meshes
            .iter()
            .fold(WorldBox::empty(), |acc, mesh| acc.merge(mesh.bvh().bounding_box()))
    }

    /// Finds the closest triangle hit by the ray starting at `origin` going in `direction`.
    /// Returns None if the direction is (nearly) zero.
    ///
    /// Allocates a fresh traversal stack, use [`Scene::intersect`] in loops.
    pub fn intersect_nearest(&self, origin: WorldPoint, direction: WorldVector) -> Option<HitRecord> {
        let ray = Ray::try_new(origin, direction)?;
        self.intersect(&ray, &mut TraversalStack::new())
    }

    /// Finds the closest triangle hit by the ray, using the hierarchy of each mesh.
    pub fn intersect(&self, ray: &Ray, stack: &mut TraversalStack) -> Option<HitRecord> {
        debug_assert!(stack.is_empty());

        for (index, mesh) in self.meshes.iter_enumerated() {
            mesh.bvh().push_root(index, ray, stack);
        }

        let mut best = None;
        while let Some(entry) = stack.pop() {
            let mesh = &self.meshes[entry.mesh()];
            mesh.bvh()
                .visit(entry, ray, |i| mesh.triangle(i), stack, &mut best);
        }

        best.map(|hit| self.hit_record(ray, &hit))
    }

    /// Finds the closest hit by testing every triangle of every mesh.
    /// Slow, meant as a reference to check the hierarchy against.
    pub fn intersect_exhaustive(&self, ray: &Ray) -> Option<HitRecord> {
        let mut best: Option<NearestHit> = None;

        for (mesh_index, mesh) in self.meshes.iter_enumerated() {
            for (triangle_index, triangle) in mesh.triangles() {
                let Some(hit) = triangle.intersect(ray) else {
                    continue;
                };
                NearestHit {
                    t: hit.t,
                    uv: hit.uv,
                    mesh: mesh_index,
                    triangle: triangle_index,
                }
                .offer_to(&mut best);
            }
        }

        best.map(|hit| self.hit_record(ray, &hit))
    }

    fn hit_record(&self, ray: &Ray, hit: &NearestHit) -> HitRecord {
        let normal = self.meshes[hit.mesh]
            .shading_normal(hit.triangle, &hit.uv)
            // Only degenerate triangles have no normal, and those are never hit
            .unwrap_or_else(|| Unit::new_unchecked(-ray.direction.into_inner()));

        HitRecord {
            t: hit.t,
            point: ray.point_at(hit.t),
            normal,
            uv: hit.uv,
            mesh: hit.mesh,
            triangle: hit.triangle,
        }
    }
}

#[cfg(test)]
pub(crate) fn same_hit(a: &Option<HitRecord>, b: &Option<HitRecord>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.mesh == b.mesh && a.triangle == b.triangle && a.t == b.t,
        _ => false,
    }
}
