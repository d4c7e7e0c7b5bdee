use crate::{
    geometry::{BarycentricCoordinates, FloatType, Ray, Triangle, WorldPoint},
    scene::{MeshIdx, TriangleIdx},
};

use super::{NodeIdx, NodeKind, TriangleBvh};

/// Scratch space for traversals, reused between rays to avoid allocating for each of them.
#[derive(Clone, Debug, Default)]
pub struct TraversalStack {
    stack: Vec<StackEntry>,
    counters: TraversalCounters,
}

/// Work done by traversals since the counters were last reset.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TraversalCounters {
    pub nodes_visited: usize,
    pub triangles_tested: usize,
}

/// Node waiting to be visited, with the distance where the ray enters its box.
#[derive(Copy, Clone, Debug)]
pub(crate) struct StackEntry {
    mesh: MeshIdx,
    node: NodeIdx,
    t: FloatType,
}

/// Best triangle hit found so far.
#[derive(Copy, Clone, Debug)]
pub(crate) struct NearestHit {
    pub t: FloatType,
    pub uv: BarycentricCoordinates<FloatType>,
    pub mesh: MeshIdx,
    pub triangle: TriangleIdx,
}

impl TraversalStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> TraversalCounters {
        self.counters
    }

    pub fn reset_counters(&mut self) {
        self.counters = TraversalCounters::default();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub(crate) fn pop(&mut self) -> Option<StackEntry> {
        self.stack.pop()
    }

    pub(crate) fn clear(&mut self) {
        self.stack.clear();
    }

    fn push(&mut self, mesh: MeshIdx, node: NodeIdx, t: FloatType) {
        self.stack.push(StackEntry { mesh, node, t });
    }
}

impl NearestHit {
    /// Orders hits by distance, equal distances go to the lower mesh and then triangle index.
    /// The result then doesn't depend on the order in which triangles are tested.
    pub(crate) fn is_before(&self, other: &NearestHit) -> bool {
        (self.t, self.mesh, self.triangle) < (other.t, other.mesh, other.triangle)
    }

    /// Replaces `best` if `self` comes before it.
    pub(crate) fn offer_to(self, best: &mut Option<NearestHit>) {
        if best.is_none_or(|best| self.is_before(&best)) {
            *best = Some(self);
        }
    }
}

impl StackEntry {
    pub fn mesh(&self) -> MeshIdx {
        self.mesh
    }
}

impl TriangleBvh {
    /// Queues the root node if the ray hits the bounding box of the whole hierarchy.
    pub(crate) fn push_root(&self, mesh: MeshIdx, ray: &Ray, stack: &mut TraversalStack) {
        if let Some(t) = self.bounding_box().intersect(ray) {
            stack.push(mesh, self.root(), t);
        }
    }

    /// Processes a node taken from the stack: an inner node queues the children whose boxes
    /// the ray hits, a leaf tests its triangles and updates the best hit.
    pub(crate) fn visit<F>(
        &self,
        entry: StackEntry,
        ray: &Ray,
        triangle: F,
        stack: &mut TraversalStack,
        best: &mut Option<NearestHit>,
    ) where
        F: Fn(TriangleIdx) -> Triangle<WorldPoint>,
    {
        let best_t = best.map_or(FloatType::INFINITY, |hit| hit.t);

        if entry.t > best_t {
            // If the node's minimum intersection distance is further away than the best
            // hit found so far, the node can't do any good any more and we can skip it.
            return;
        }

        stack.counters.nodes_visited += 1;

        match &self.nodes[entry.node].kind {
            NodeKind::Inner { children } => {
                let [a, b] = children.map(|child| {
                    self.nodes[child]
                        .bounds
                        .intersect(ray)
                        .filter(|t| *t <= best_t)
                        .map(|t| (child, t))
                });

                // Farther child goes in first, so that the nearer one is popped first
                // and has the chance to shrink the best distance early.
                let (first, second) = match (a, b) {
                    (Some(a), Some(b)) if b.1 > a.1 => (Some(b), Some(a)),
                    other => other,
                };

                for (child, t) in [first, second].into_iter().flatten() {
                    stack.push(entry.mesh, child, t);
                }
            }
            NodeKind::Leaf { triangles } => {
                for &index in triangles {
                    stack.counters.triangles_tested += 1;

                    let Some(hit) = triangle(index).intersect(ray) else {
                        continue;
                    };

                    NearestHit {
                        t: hit.t,
                        uv: hit.uv,
                        mesh: entry.mesh,
                        triangle: index,
                    }
                    .offer_to(best);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        geometry::{WorldVector, test::scattered_triangles},
        scene::triangle_bvh::BvhSettings,
    };
    use assert2::{assert, let_assert};
    use index_vec::IndexVec;
    use rand::{SeedableRng, rngs::SmallRng};

    /// Runs a single mesh traversal to completion.
    fn nearest(
        bvh: &TriangleBvh,
        triangles: &IndexVec<TriangleIdx, Triangle<WorldPoint>>,
        ray: &Ray,
        stack: &mut TraversalStack,
    ) -> Option<NearestHit> {
        let mesh = MeshIdx::from_raw(0);
        let mut best = None;
        bvh.push_root(mesh, ray, stack);
        while let Some(entry) = stack.pop() {
            bvh.visit(entry, ray, |i| triangles[i].clone(), stack, &mut best);
        }
        best
    }

    #[test]
    fn nearer_child_is_popped_first() {
        // Two well separated clusters along z, the ray comes from +z
        let mut rng = SmallRng::seed_from_u64(1);
        let mut all = scattered_triangles(30, 1.0, &mut rng);
        all.extend(
            scattered_triangles(30, 1.0, &mut rng)
                .into_iter()
                .map(|t| t.map(|p| p + WorldVector::new(0.0, 0.0, 10.0))),
        );
        let triangles: IndexVec<TriangleIdx, _> = IndexVec::from_vec(all);
        let (bvh, _) = TriangleBvh::build(&triangles, &BvhSettings::default());

        let ray = Ray::new(WorldPoint::new(0.5, 0.5, 100.0), WorldVector::new(0.0, 0.0, -1.0));
        let mut stack = TraversalStack::new();
        bvh.push_root(MeshIdx::from_raw(0), &ray, &mut stack);

        let_assert!(Some(root) = stack.pop());
        let mut best = None;
        bvh.visit(root, &ray, |i| triangles[i].clone(), &mut stack, &mut best);

        let_assert!(Some(near) = stack.pop());
        let_assert!(Some(far) = stack.pop());
        assert!(near.t < 95.0);
        assert!(far.t > 95.0);
        assert!(stack.is_empty());
    }

    #[test]
    fn miss_leaves_stack_empty() {
        let mut rng = SmallRng::seed_from_u64(2);
        let triangles: IndexVec<TriangleIdx, _> =
            IndexVec::from_vec(scattered_triangles(100, 1.0, &mut rng));
        let (bvh, _) = TriangleBvh::build(&triangles, &BvhSettings::default());

        let ray = Ray::new(WorldPoint::new(5.0, 5.0, 5.0), WorldVector::new(1.0, 0.0, 0.0));
        let mut stack = TraversalStack::new();
        assert!(nearest(&bvh, &triangles, &ray, &mut stack).is_none());
        assert!(stack.is_empty());
        assert!(stack.counters() == TraversalCounters::default());
    }

    #[test]
    fn matches_linear_scan() {
        let mut rng = SmallRng::seed_from_u64(3);
        let triangles: IndexVec<TriangleIdx, _> =
            IndexVec::from_vec(scattered_triangles(1000, 10.0, &mut rng));
        let (bvh, _) = TriangleBvh::build(&triangles, &BvhSettings::default());
        let mut stack = TraversalStack::new();

        for i in 0..50 {
            let target = triangles[TriangleIdx::from_usize(i * 7)].centroid();
            let origin = WorldPoint::new(-5.0, 4.0 + 0.1 * i as FloatType, 20.0);
            let ray = Ray::new(origin, target - origin);

            let expected = triangles
                .iter_enumerated()
                .filter_map(|(index, t)| t.intersect(&ray).map(|hit| (index, hit.t)))
                .min_by(|a, b| a.1.total_cmp(&b.1));

            let found = nearest(&bvh, &triangles, &ray, &mut stack).map(|hit| (hit.triangle, hit.t));
            assert!(found == expected);
        }
    }

    #[test]
    fn ties_go_to_lower_index() {
        let hit = |t, mesh, triangle| NearestHit {
            t,
            uv: BarycentricCoordinates { u: 0.0, v: 0.0 },
            mesh: MeshIdx::from_raw(mesh),
            triangle: TriangleIdx::from_raw(triangle),
        };

        assert!(hit(1.0, 5, 5).is_before(&hit(2.0, 0, 0)));
        assert!(hit(1.0, 0, 7).is_before(&hit(1.0, 1, 0)));
        assert!(hit(1.0, 1, 2).is_before(&hit(1.0, 1, 3)));
        assert!(!hit(1.0, 1, 3).is_before(&hit(1.0, 1, 3)));

        let mut best = None;
        hit(1.0, 1, 3).offer_to(&mut best);
        hit(1.0, 1, 2).offer_to(&mut best);
        hit(1.0, 2, 0).offer_to(&mut best);
        let_assert!(Some(best) = best);
        assert!(best.triangle == TriangleIdx::from_raw(2));
    }

    #[test]
    fn traversal_skips_most_triangles() {
        let mut rng = SmallRng::seed_from_u64(4);
        let triangles: IndexVec<TriangleIdx, _> =
            IndexVec::from_vec(scattered_triangles(10000, 10.0, &mut rng));
        let (bvh, _) = TriangleBvh::build(&triangles, &BvhSettings::default());

        let target = triangles[TriangleIdx::from_raw(0)].centroid();
        let origin = WorldPoint::new(5.0, 5.0, -10.0);
        let ray = Ray::new(origin, target - origin);

        let mut stack = TraversalStack::new();
        let_assert!(Some(_) = nearest(&bvh, &triangles, &ray, &mut stack));
        assert!(stack.counters().triangles_tested < triangles.len() / 4);
    }
}
