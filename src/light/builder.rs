// The SAOH light tree builder plus its task-pool-driven parallel recursion
// and bit_trail population. Grounded on the cost-scan/partition/flatten trio
// in examples/DennisVanEe-rust_prism/src/bvh.rs's `recursive_construct_tree`
// and `flatten_tree`, generalized from pure surface-area cost to SAOH and
// from a single-threaded `bumpalo::Bump` arena to owned, already-flattened
// `Vec<LightTreeNode>` subtrees that can cross a `crossbeam::thread::scope`
// boundary (a `Bump`-allocated `&'a TreeNode<'a>` can't be handed to a
// spawned thread without tying that thread's lifetime to the arena's, which
// a single-threaded build never has to deal with). Each recursive call
// therefore returns its own subtree already flattened, node 0 always its own
// root; the caller splices children in by extending the vector and shifting
// every `right_child_index` the child vector contains by the position it
// lands at. No id is ever handed out by a counter shared across worker
// threads.

use crossbeam::thread;
use partition::partition;

use crate::cone::OrientationConef;
use crate::error::{BuildError, BuildResult};
use crate::light::bucket::{LightTreeBucket, PrimitiveMeasure};
use crate::light::primitive::LightTreePrimitive;
use crate::math::bbox::BBox3f;
use crate::math::vector::Vec3f;
use crate::params::{LightTreeBuildParams, NUM_BUCKETS};
use crate::taskpool::TaskPool;

#[derive(Clone, Copy, Debug)]
pub enum LightTreeNodeKind {
    Leaf { first_prim_index: u32, num_prims: u32 },
    Interior { right_child_index: u32 },
}

/// One node of a built light tree. The union of
/// `first_prim_index`/`right_child_index` tagged by `num_prims`'s sign in
/// the source is a real enum here, following the same `Cone::Empty |
/// Cone::Valid` precedent `OrientationCone` already establishes in this
/// crate.
#[derive(Clone, Copy, Debug)]
pub struct LightTreeNode {
    pub bbox: BBox3f,
    pub bcone: OrientationConef,
    pub energy: f32,
    pub bit_trail: u32,
    pub kind: LightTreeNodeKind,
}

impl LightTreeNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, LightTreeNodeKind::Leaf { .. })
    }

    fn from_measure(measure: PrimitiveMeasure, bit_trail: u32, kind: LightTreeNodeKind) -> Self {
        LightTreeNode {
            bbox: measure.bbox,
            bcone: measure.bcone,
            energy: measure.energy,
            bit_trail,
            kind,
        }
    }
}

pub struct LightTree {
    nodes: Vec<LightTreeNode>,
}

impl LightTree {
    /// Builds a tree over `prims`, whose final `num_distant` elements are
    /// distant lights: collapsed into one right-child leaf rather than
    /// recursed into, since a distant light has no meaningful spatial
    /// position to bucket on. `params` is validated once, here, rather than
    /// on every recursive call.
    pub fn new(mut prims: Vec<LightTreePrimitive>, num_distant: usize, params: LightTreeBuildParams) -> BuildResult<Self> {
        params.validate()?;
        if num_distant > prims.len() {
            let err = BuildError::DegenerateInput(format!(
                "num_distant ({}) exceeds total primitive count ({})",
                num_distant,
                prims.len()
            ));
            log::error!("{}", err);
            return Err(err);
        }

        let num_local = prims.len() - num_distant;
        let (local, distant) = prims.split_at_mut(num_local);

        let nodes = if num_distant == 0 {
            build_range(local, 0, 0, 0, &params)?
        } else {
            // The local subtree's root is the synthetic root's left child, already
            // at depth 0, so its own children sit at global depth 1 and must set
            // bit 1 of the bit_trail, not bit 0 (which the root->distant-leaf split
            // already uses for the distant leaf below).
            let mut local_nodes = build_range(local, 0, 0, 1, &params)?;
            let local_measure = PrimitiveMeasure {
                bbox: local_nodes[0].bbox,
                bcone: local_nodes[0].bcone,
                energy: local_nodes[0].energy,
            };
            offset_interior_indices(&mut local_nodes, 1);

            let distant_measure = distant.iter().fold(PrimitiveMeasure::empty(), |m, p| m.union(p.measure));
            let right_child_index = 1 + local_nodes.len() as u32;
            let distant_leaf = LightTreeNode::from_measure(
                distant_measure,
                1,
                LightTreeNodeKind::Leaf {
                    first_prim_index: num_local as u32,
                    num_prims: num_distant as u32,
                },
            );

            let root_measure = local_measure.union(distant_measure);
            let mut nodes = Vec::with_capacity(2 + local_nodes.len());
            nodes.push(LightTreeNode::from_measure(
                root_measure,
                0,
                LightTreeNodeKind::Interior { right_child_index },
            ));
            nodes.extend(local_nodes);
            nodes.push(distant_leaf);
            nodes
        };

        Ok(LightTree { nodes })
    }

    pub fn get_nodes(&self) -> &[LightTreeNode] {
        &self.nodes
    }
}

fn offset_interior_indices(nodes: &mut [LightTreeNode], offset: u32) {
    for node in nodes.iter_mut() {
        if let LightTreeNodeKind::Interior { right_child_index } = &mut node.kind {
            *right_child_index += offset;
        }
    }
}

fn bucket_index(centroid: Vec3f, dim: usize, centroid_bound: BBox3f) -> usize {
    let ratio = centroid_bound.offset(centroid)[dim];
    if ratio >= 1.0 {
        NUM_BUCKETS - 1
    } else {
        ((NUM_BUCKETS as f32) * ratio) as usize
    }
}

/// Scans all three dimensions and returns the globally cheapest
/// `(dim, bucket, cost)`, skipping any dimension whose centroid extent is
/// degenerate. `None` means every dimension was degenerate — the primitives
/// share one centroid and there is nothing to bucket on.
fn scan_best_split(prims: &[LightTreePrimitive], centroid_bound: BBox3f) -> Option<(usize, usize, f32)> {
    let diag = centroid_bound.diagonal();
    let max_extent = diag.x.max(diag.y).max(diag.z);

    let mut best: Option<(usize, usize, f32)> = None;
    for dim in 0..3 {
        let extent = diag[dim];
        if extent <= 0.0 {
            continue;
        }
        let regularization = max_extent / extent;

        let mut buckets = [LightTreeBucket::empty(); NUM_BUCKETS];
        for p in prims.iter() {
            let idx = bucket_index(p.centroid, dim, centroid_bound);
            buckets[idx].count += 1;
            buckets[idx].measure = buckets[idx].measure.union(p.measure);
        }

        let mut right = [LightTreeBucket::empty(); NUM_BUCKETS - 1];
        let mut acc = LightTreeBucket::empty();
        for i in (0..NUM_BUCKETS - 1).rev() {
            acc = acc.union(buckets[i + 1]);
            right[i] = acc;
        }

        let mut left_acc = LightTreeBucket::empty();
        for i in 0..NUM_BUCKETS - 1 {
            left_acc = left_acc.union(buckets[i]);
            let cost = regularization * (left_acc.measure.cost() + right[i].measure.cost());
            if best.map_or(true, |(_, _, best_cost)| cost < best_cost) {
                best = Some((dim, i, cost));
            }
        }
    }
    best
}

/// Builds the flattened subtree for `prims`, a disjoint slice of the
/// caller's shared primitive buffer. `base` is this slice's offset into
/// that buffer (for a leaf's `first_prim_index`); `bit_trail`/`split_depth`
/// are this call's own position in the tree — `split_depth` is the value
/// this call uses when deriving its *children's* bit_trail, not its own.
fn build_range(
    prims: &mut [LightTreePrimitive],
    base: u32,
    bit_trail: u32,
    split_depth: u32,
    params: &LightTreeBuildParams,
) -> BuildResult<Vec<LightTreeNode>> {
    let whole_measure = prims.iter().fold(PrimitiveMeasure::empty(), |m, p| m.union(p.measure));

    if prims.len() <= 1 {
        return Ok(vec![LightTreeNode::from_measure(
            whole_measure,
            bit_trail,
            LightTreeNodeKind::Leaf {
                first_prim_index: base,
                num_prims: prims.len() as u32,
            },
        )]);
    }

    let centroid_bound = prims.iter().fold(BBox3f::new(), |b, p| b.combine_pnt(p.centroid));
    let total_cost = whole_measure.cost();

    let split = match scan_best_split(prims, centroid_bound) {
        None => {
            log::debug!(
                "light tree build: {} primitives share one centroid, emitting leaf without scanning",
                prims.len()
            );
            None
        }
        Some((dim, bucket, min_cost)) => {
            if min_cost >= total_cost && prims.len() <= params.max_lights_in_leaf {
                None
            } else {
                Some((dim, bucket))
            }
        }
    };

    let (dim, bucket) = match split {
        None => {
            return Ok(vec![LightTreeNode::from_measure(
                whole_measure,
                bit_trail,
                LightTreeNodeKind::Leaf {
                    first_prim_index: base,
                    num_prims: prims.len() as u32,
                },
            )]);
        }
        Some(s) => s,
    };

    let mut mid = partition(prims, |p| bucket_index(p.centroid, dim, centroid_bound) <= bucket);
    if mid == 0 || mid == prims.len() {
        mid = prims.len() / 2;
    }
    let (left_slice, right_slice) = prims.split_at_mut(mid);

    let left_base = base;
    let right_base = base + mid as u32;
    let right_bit_trail = bit_trail | (1u32 << split_depth);
    let next_depth = split_depth + 1;

    let (mut left_nodes, mut right_nodes) = if std::cmp::max(left_slice.len(), right_slice.len()) > params.min_prims_per_thread {
        log::debug!(
            "light tree build: enqueuing a {}-primitive range on the task pool ({} run inline)",
            std::cmp::max(left_slice.len(), right_slice.len()),
            std::cmp::min(left_slice.len(), right_slice.len())
        );
        let spawn_left = left_slice.len() >= right_slice.len();
        let result = thread::scope(|scope| {
            let pool = TaskPool::new(scope);
            if spawn_left {
                pool.fork_join(
                    || build_range(left_slice, left_base, bit_trail, next_depth, params),
                    || build_range(right_slice, right_base, right_bit_trail, next_depth, params),
                )
            } else {
                let (r, l) = pool.fork_join(
                    || build_range(right_slice, right_base, right_bit_trail, next_depth, params),
                    || build_range(left_slice, left_base, bit_trail, next_depth, params),
                )?;
                Ok((l, r))
            }
        });
        result.map_err(|_| BuildError::InvariantViolation("light tree build thread panicked".to_string()))??
    } else {
        (
            build_range(left_slice, left_base, bit_trail, next_depth, params)?,
            build_range(right_slice, right_base, right_bit_trail, next_depth, params)?,
        )
    };

    offset_interior_indices(&mut left_nodes, 1);
    let right_child_index = 1 + left_nodes.len() as u32;
    offset_interior_indices(&mut right_nodes, right_child_index);

    let mut nodes = Vec::with_capacity(1 + left_nodes.len() + right_nodes.len());
    nodes.push(LightTreeNode::from_measure(
        whole_measure,
        bit_trail,
        LightTreeNodeKind::Interior { right_child_index },
    ));
    nodes.extend(left_nodes);
    nodes.extend(right_nodes);
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::primitive::LampGeometry;

    fn point_light(id: u32, origin: Vec3f) -> LightTreePrimitive {
        LightTreePrimitive::from_lamp(
            id,
            LampGeometry::Point { origin, size: 0.1 },
            Vec3f { x: 1.0, y: 1.0, z: 1.0 },
            Vec3f { x: 1.0, y: 1.0, z: 1.0 },
        )
        .unwrap()
    }

    #[test]
    fn single_point_light_is_a_leaf() {
        let _ = env_logger::builder().is_test(true).try_init();
        let p = point_light(0, Vec3f::zero());
        let tree = LightTree::new(vec![p], 0, LightTreeBuildParams::default()).unwrap();
        let nodes = tree.get_nodes();
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].is_leaf());
        assert!((nodes[0].energy - 0.25 / std::f32::consts::PI).abs() < 1e-6);
        assert_eq!(nodes[0].bbox.pmin, Vec3f { x: -0.1, y: -0.1, z: -0.1 });
        assert_eq!(nodes[0].bbox.pmax, Vec3f { x: 0.1, y: 0.1, z: 0.1 });
    }

    #[test]
    fn two_far_apart_lights_split_with_bit_trails_zero_and_one() {
        let a = point_light(0, Vec3f { x: -10.0, y: 0.0, z: 0.0 });
        let b = point_light(1, Vec3f { x: 10.0, y: 0.0, z: 0.0 });
        let total_energy = a.measure.energy + b.measure.energy;

        let tree = LightTree::new(vec![a, b], 0, LightTreeBuildParams::default()).unwrap();
        let nodes = tree.get_nodes();
        assert_eq!(nodes.len(), 3);
        assert!(!nodes[0].is_leaf());
        assert!((nodes[0].energy - total_energy).abs() < 1e-6);

        let bit_trails: Vec<u32> = nodes[1..].iter().map(|n| n.bit_trail).collect();
        assert!(bit_trails.contains(&0));
        assert!(bit_trails.contains(&1));
        for n in &nodes[1..] {
            assert!(n.is_leaf());
        }
    }

    #[test]
    fn all_distant_scene_wraps_an_empty_local_leaf() {
        let distant: Vec<LightTreePrimitive> = (0..4)
            .map(|i| {
                LightTreePrimitive::from_lamp(
                    i,
                    LampGeometry::Distant {
                        dir: Vec3f { x: 0.0, y: 0.0, z: 1.0 },
                        angle: 0.01,
                    },
                    Vec3f { x: 1.0, y: 1.0, z: 1.0 },
                    Vec3f { x: 1.0, y: 1.0, z: 1.0 },
                )
                .unwrap()
            })
            .collect();

        let tree = LightTree::new(distant, 4, LightTreeBuildParams::default()).unwrap();
        let nodes = tree.get_nodes();
        assert_eq!(nodes.len(), 3);
        assert!(!nodes[0].is_leaf());
        let right_child_index = match nodes[0].kind {
            LightTreeNodeKind::Interior { right_child_index } => right_child_index,
            _ => unreachable!(),
        };
        assert!(nodes[right_child_index as usize].is_leaf());
        match nodes[right_child_index as usize].kind {
            LightTreeNodeKind::Leaf { num_prims, .. } => assert_eq!(num_prims, 4),
            _ => unreachable!(),
        }
        let left_child = &nodes[1];
        assert!(left_child.is_leaf());
        match left_child.kind {
            LightTreeNodeKind::Leaf { num_prims, .. } => assert_eq!(num_prims, 0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn should_split_is_deterministic() {
        let centroid_bound = BBox3f::from_pnt(Vec3f { x: -10.0, y: 0.0, z: 0.0 }).combine_pnt(Vec3f { x: 10.0, y: 0.0, z: 0.0 });
        let prims = vec![
            point_light(0, Vec3f { x: -10.0, y: 0.0, z: 0.0 }),
            point_light(1, Vec3f { x: 10.0, y: 0.0, z: 0.0 }),
        ];
        let first = scan_best_split(&prims, centroid_bound);
        let second = scan_best_split(&prims, centroid_bound);
        assert_eq!(first.map(|(d, b, _)| (d, b)), second.map(|(d, b, _)| (d, b)));
    }

    #[test]
    fn coincident_lights_skip_the_scan_and_emit_one_leaf() {
        let _ = env_logger::builder().is_test(true).try_init();
        let a = point_light(0, Vec3f { x: 5.0, y: 5.0, z: 5.0 });
        let b = point_light(1, Vec3f { x: 5.0, y: 5.0, z: 5.0 });
        let total_energy = a.measure.energy + b.measure.energy;

        let tree = LightTree::new(vec![a, b], 0, LightTreeBuildParams::default()).unwrap();
        let nodes = tree.get_nodes();
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].is_leaf());
        assert!((nodes[0].energy - total_energy).abs() < 1e-6);
    }

    #[test]
    fn energy_conserved_at_every_interior_node() {
        let lights: Vec<LightTreePrimitive> = (0..8)
            .map(|i| point_light(i, Vec3f { x: i as f32, y: 0.0, z: 0.0 }))
            .collect();
        let total: f32 = lights.iter().map(|p| p.measure.energy).sum();
        let tree = LightTree::new(lights, 0, LightTreeBuildParams::default()).unwrap();
        let nodes = tree.get_nodes();
        assert!((nodes[0].energy - total).abs() < 1e-4);
    }
}
