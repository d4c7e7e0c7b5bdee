mod building;
mod printing;
mod ray_bvh_intersection;

use index_vec::IndexVec;

use crate::geometry::WorldBox;

use super::TriangleIdx;

pub use building::{BuildStats, BvhSettings};
pub use printing::BvhStatistics;
pub use ray_bvh_intersection::{TraversalCounters, TraversalStack};

pub(crate) use ray_bvh_intersection::NearestHit;

/// Binary bounding volume hierarchy over the triangles of a single mesh.
///
/// Nodes are stored in a flat arena, the root is always the first node.
/// The hierarchy only refers to triangles by their index in the owning mesh.
#[derive(Clone, Debug)]
pub struct TriangleBvh {
    nodes: IndexVec<NodeIdx, Node>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    /// Tight box around every vertex of every triangle in the subtree.
    pub bounds: WorldBox,
    pub kind: NodeKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Leaf { triangles: Vec<TriangleIdx> },
    Inner { children: [NodeIdx; 2] },
}

index_vec::define_index_type! {
    pub struct NodeIdx = u32;
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }
}

impl TriangleBvh {
    pub fn root(&self) -> NodeIdx {
        NodeIdx::from_raw(0)
    }

    pub fn node(&self, index: NodeIdx) -> &Node {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIdx, &Node)> {
        self.nodes.iter_enumerated()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn bounding_box(&self) -> &WorldBox {
        &self.nodes[self.root()].bounds
    }
}
