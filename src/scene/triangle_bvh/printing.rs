use std::fmt::{self, Display, Write};

use crate::util::Stats;

use super::{NodeKind, TriangleBvh};

/// Shape of a built hierarchy.
#[derive(Clone, Debug, PartialEq)]
pub struct BvhStatistics {
    /// Depth of each leaf, the root has depth 0.
    pub leaf_depth: Stats,
    /// Number of triangles in each leaf.
    pub leaf_fill: Stats,
}

impl Display for BvhStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "leaf depth: {}; leaf fill: {}", self.leaf_depth, self.leaf_fill)
    }
}

impl TriangleBvh {
    pub fn statistics(&self) -> BvhStatistics {
        let mut leaf_depth = Stats::default();
        let mut leaf_fill = Stats::default();

        let mut stack = vec![(self.root(), 0)];
        while let Some((index, depth)) = stack.pop() {
            match &self.node(index).kind {
                NodeKind::Leaf { triangles } => {
                    leaf_depth.push(depth);
                    leaf_fill.push(triangles.len());
                }
                NodeKind::Inner { children } => {
                    stack.extend(children.iter().map(|child| (*child, depth + 1)));
                }
            }
        }

        BvhStatistics {
            leaf_depth,
            leaf_fill,
        }
    }

    /// Writes an indented outline of the tree, one node per line.
    pub fn write_tree(&self, out: &mut impl Write) -> fmt::Result {
        let mut stack = vec![(self.root(), 0)];
        while let Some((index, indent)) = stack.pop() {
            let node = self.node(index);
            let indent_str = "  ".repeat(indent);
            match &node.kind {
                NodeKind::Leaf { triangles } => writeln!(
                    out,
                    "{indent_str}- L{}: {:?}-{:?}, {} triangles",
                    index.raw(),
                    node.bounds.min,
                    node.bounds.max,
                    triangles.len()
                )?,
                NodeKind::Inner { children } => {
                    writeln!(
                        out,
                        "{indent_str}- I{}: {:?}-{:?}",
                        index.raw(),
                        node.bounds.min,
                        node.bounds.max
                    )?;
                    // Reversed so that the first child is written first
                    stack.extend(children.iter().rev().map(|child| (*child, indent + 1)));
                }
            }
        }
        Ok(())
    }
}
