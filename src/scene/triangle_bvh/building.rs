use std::collections::VecDeque;

use index_vec::{IndexSlice, IndexVec};
use serde::Deserialize;

use crate::{
    geometry::{Triangle, WorldBox, WorldPoint},
    scene::TriangleIdx,
};

use super::{Node, NodeIdx, NodeKind, TriangleBvh};

/// Parameters of the hierarchy construction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BvhSettings {
    /// Nodes with at most this many triangles are not split any further.
    pub leaf_threshold: usize,
    /// How many other axes are tried when splitting along the longest one puts all
    /// triangles on one side.
    pub max_split_retries: u32,
}

impl Default for BvhSettings {
    fn default() -> Self {
        BvhSettings {
            leaf_threshold: 25,
            max_split_retries: 2,
        }
    }
}

/// Summary of a finished build.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub node_count: usize,
    pub leaf_count: usize,
    /// Depth of the deepest node, the root has depth 0.
    pub max_depth: usize,
    /// Number of leaves left above the threshold because no axis produced a usable split.
    pub oversized_leaves: usize,
    /// Triangle count of the largest such leaf, 0 if there is none.
    pub largest_oversized_leaf: usize,
}

/// Leaf under construction, grows its box as triangles are added.
#[derive(Debug)]
struct NodeBuilder {
    bounds: WorldBox,
    triangles: Vec<TriangleIdx>,
}

impl NodeBuilder {
    fn new() -> Self {
        NodeBuilder {
            bounds: WorldBox::empty(),
            triangles: Vec::new(),
        }
    }

    fn add(&mut self, index: TriangleIdx, triangle: &Triangle<WorldPoint>) {
        for p in triangle.iter() {
            self.bounds.include_point(p);
        }
        self.triangles.push(index);
    }

    fn len(&self) -> usize {
        self.triangles.len()
    }

    fn into_node(self) -> Node {
        Node {
            bounds: self.bounds,
            kind: NodeKind::Leaf {
                triangles: self.triangles,
            },
        }
    }
}

impl TriangleBvh {
    /// Builds the hierarchy over the triangles, triangles are referred to by their index
    /// in the slice.
    ///
    /// Panics if there are no triangles, an empty hierarchy has no valid bounding box.
    pub fn build(
        triangles: &IndexSlice<TriangleIdx, [Triangle<WorldPoint>]>,
        settings: &BvhSettings,
    ) -> (TriangleBvh, BuildStats) {
        assert!(!triangles.is_empty(), "Can't build a hierarchy over no triangles");

        let centroids: IndexVec<TriangleIdx, WorldPoint> =
            triangles.iter().map(Triangle::centroid).collect();

        let mut root = NodeBuilder::new();
        for (index, triangle) in triangles.iter_enumerated() {
            root.add(index, triangle);
        }

        let mut nodes: IndexVec<NodeIdx, Node> = IndexVec::new();
        let mut stats = BuildStats::default();

        let root = nodes.push(root.into_node());
        let mut queue = VecDeque::from([(root, 0usize)]);

        while let Some((index, depth)) = queue.pop_front() {
            let split = {
                let node = &nodes[index];
                let NodeKind::Leaf { triangles: members } = &node.kind else {
                    unreachable!("Only leaves are ever queued")
                };
                if members.len() <= settings.leaf_threshold {
                    continue;
                }
                split_node(&node.bounds, members, triangles, &centroids, settings)
                    .ok_or(members.len())
            };

            match split {
                Ok((left, right)) => {
                    let left_len = left.len();
                    let right_len = right.len();
                    let left = nodes.push(left.into_node());
                    let right = nodes.push(right.into_node());
                    nodes[index].kind = NodeKind::Inner {
                        children: [left, right],
                    };
                    stats.max_depth = stats.max_depth.max(depth + 1);

                    // Single triangle children can never be split further
                    if left_len > 1 {
                        queue.push_back((left, depth + 1));
                    }
                    if right_len > 1 {
                        queue.push_back((right, depth + 1));
                    }
                }
                Err(count) => {
                    log::debug!(
                        "No usable split for {count} triangles in {:?}, keeping an oversized leaf",
                        nodes[index].bounds
                    );
                    stats.oversized_leaves += 1;
                    stats.largest_oversized_leaf = stats.largest_oversized_leaf.max(count);
                }
            }
        }

        stats.node_count = nodes.len();
        stats.leaf_count = nodes.iter().filter(|node| node.is_leaf()).count();

        (TriangleBvh { nodes }, stats)
    }
}

/// Partitions the node's triangles by centroid around the middle of the box.
/// Starts with the longest axis and cycles x -> y -> z -> x when one side ends up empty.
/// Returns None if every attempt was degenerate.
fn split_node(
    bounds: &WorldBox,
    members: &[TriangleIdx],
    triangles: &IndexSlice<TriangleIdx, [Triangle<WorldPoint>]>,
    centroids: &IndexSlice<TriangleIdx, [WorldPoint]>,
    settings: &BvhSettings,
) -> Option<(NodeBuilder, NodeBuilder)> {
    let mut axis = bounds.longest_axis();

    for _attempt in 0..=settings.max_split_retries {
        let min = bounds.min[axis];
        let max = bounds.max[axis];

        let mut left = NodeBuilder::new();
        let mut right = NodeBuilder::new();

        for &index in members {
            let c = centroids[index][axis];
            if c - min < max - c {
                left.add(index, &triangles[index]);
            } else {
                right.add(index, &triangles[index]);
            }
        }

        if left.len() > 0 && right.len() > 0 {
            return Some((left, right));
        }

        axis = (axis + 1) % 3;
    }

    None
}
