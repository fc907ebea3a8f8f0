// DiagSplit: recursive parametric-axis splitting that resolves every
// sub-patch's four edges to an agreed, final tessellation factor. Grounded
// on the recursive-build-then-collect pattern in
// examples/DennisVanEe-rust_prism/src/bvh.rs's `TreeNode` construction
// (build into an explicit output list rather than a mesh global), adapted
// to the parametric-splitting rules this module implements.

use log::debug;

use crate::error::{BuildError, BuildResult};
use crate::math::vector::Vec2f;
use crate::params::{DiagSplitParams, DSPLIT_MAX_DEPTH, DSPLIT_MAX_SEGMENTS};
use crate::patch::edge::{EdgeRef, SharedEdgeTable, T_NON_UNIFORM, T_UNSET, UNSET_VERT};
use crate::patch::eval::{CameraProjection, Patch, PatchEvaluator};
use crate::patch::subpatch::SubPatch;

/// A self-documenting stand-in for a bare `depth == -2` sentinel:
/// `NGON_SEED` carries the same numeric value so the control flow in
/// `split_u`/`split_v`/`split_quad` is unchanged, but the comparison reads
/// as `depth == SplitDepth::NGON_SEED` instead of a magic constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitDepth(i32);

impl SplitDepth {
    pub const NGON_SEED: SplitDepth = SplitDepth(-2);

    pub fn top_level() -> Self {
        SplitDepth(0)
    }

    pub fn next(self) -> Self {
        SplitDepth(self.0 + 1)
    }

    pub fn raw(self) -> i32 {
        self.0
    }

    fn depth_guard_active(self) -> bool {
        self.0 >= DSPLIT_MAX_DEPTH - 2
    }
}

/// Drives resolution and recursive splitting for one stream of patches,
/// holding the shared edge table every produced sub-patch references.
pub struct DiagSplitEngine<'a, E, C> {
    pub evaluator: &'a E,
    pub camera: Option<&'a C>,
    pub params: DiagSplitParams,
    pub edges: SharedEdgeTable,
}

impl<'a, E: PatchEvaluator, C: CameraProjection> DiagSplitEngine<'a, E, C> {
    pub fn new(evaluator: &'a E, camera: Option<&'a C>, params: DiagSplitParams, first_vert_id: u32) -> BuildResult<Self> {
        params.validate()?;
        Ok(DiagSplitEngine {
            evaluator,
            camera,
            params,
            edges: SharedEdgeTable::new(first_vert_id),
        })
    }

    fn sample_position(&self, patch: Patch, uv: Vec2f) -> crate::math::vector::Vec3f {
        self.evaluator.eval(patch, uv).position
    }

    /// `T(patch, uvA, uvB, depth, recursive)`: the edge-factor computation.
    pub fn compute_edge_factor(
        &self,
        patch: Patch,
        uv_a: Vec2f,
        uv_b: Vec2f,
        depth: SplitDepth,
        recursive: bool,
    ) -> BuildResult<i32> {
        self.compute_edge_factor_bounded(patch, uv_a, uv_b, depth, recursive, self.params.max_level)
    }

    fn compute_edge_factor_bounded(
        &self,
        patch: Patch,
        uv_a: Vec2f,
        uv_b: Vec2f,
        depth: SplitDepth,
        recursive: bool,
        bisections_remaining: u32,
    ) -> BuildResult<i32> {
        let steps = self.params.test_steps.max(2);
        let mut prev = self.sample_position(patch, uv_a);
        let mut l_sum = 0.0f32;
        let mut l_max = 0.0f32;
        for i in 1..steps {
            let t = i as f32 / (steps - 1) as f32;
            let uv = uv_a.lerp(uv_b, t);
            let cur = self.sample_position(patch, uv);
            let mut seg_len = (cur - prev).length();
            if !seg_len.is_finite() {
                log::warn!("compute_edge_factor: patch evaluator returned a non-finite sample, clamping T to 1");
                return Ok(1);
            }
            if let Some(camera) = self.camera {
                let raster_size = camera.world_to_raster_size(cur);
                if raster_size > 0.0 {
                    seg_len /= raster_size;
                }
            }
            l_sum += seg_len;
            if seg_len > l_max {
                l_max = seg_len;
            }
            prev = cur;
        }

        let t_min = (l_sum / self.params.dicing_rate).ceil().max(0.0) as i32;
        let t_max = (((steps - 1) as f32) * l_max / self.params.dicing_rate).ceil().max(1.0) as i32;
        let mut t = t_max.max(1);

        if (t_max - t_min) as f32 > self.params.split_threshold {
            if recursive && bisections_remaining > 0 {
                let mid = uv_a.lerp(uv_b, 0.5);
                let left = self.compute_edge_factor_bounded(patch, uv_a, mid, depth, true, bisections_remaining - 1)?;
                let right = self.compute_edge_factor_bounded(patch, mid, uv_b, depth, true, bisections_remaining - 1)?;
                let left = if left == T_NON_UNIFORM { 1 } else { left };
                let right = if right == T_NON_UNIFORM { 1 } else { right };
                t = left + right;
            } else {
                return self.apply_edge_factor_limits(t_max.max(1), uv_a, uv_b, patch, depth, true);
            }
        }

        self.apply_edge_factor_limits(t, uv_a, uv_b, patch, depth, false)
    }

    fn apply_edge_factor_limits(
        &self,
        mut t: i32,
        uv_a: Vec2f,
        uv_b: Vec2f,
        patch: Patch,
        depth: SplitDepth,
        non_uniform: bool,
    ) -> BuildResult<i32> {
        let mut max_t = 1i64 << self.params.max_level.min(30);
        if patch.from_ngon {
            max_t /= 2;
        }
        let dist = (uv_a - uv_b).length();
        let limit = ((max_t as f32) * dist).ceil().max(1.0) as i32;
        if !non_uniform {
            t = t.min(limit);
        }

        if depth.depth_guard_active() && (non_uniform || t > DSPLIT_MAX_SEGMENTS) {
            debug!(
                "diagsplit: depth guard clamped an edge factor from {} to {} at depth {}",
                if non_uniform { -1 } else { t },
                DSPLIT_MAX_SEGMENTS,
                depth.raw()
            );
            return Ok(DSPLIT_MAX_SEGMENTS);
        }

        if non_uniform {
            return Ok(T_NON_UNIFORM);
        }
        Ok(t.max(1))
    }

    /// Resolves any edge still unset, or NON_UNIFORM while its
    /// opposite edge has already settled on `T = 1`. Reads of the opposite
    /// edge's factor happen live, one edge at a time in u0, u1, v0, v1
    /// order, so a resolution earlier in this same pass is visible to a
    /// later one.
    fn resolve_edges(&self, sub: &SubPatch, depth: SplitDepth) -> BuildResult<()> {
        let slots = [
            (sub.edge_u0, sub.edge_u1, sub.uv00, sub.uv10),
            (sub.edge_u1, sub.edge_u0, sub.uv11, sub.uv01),
            (sub.edge_v0, sub.edge_v1, sub.uv01, sub.uv00),
            (sub.edge_v1, sub.edge_v0, sub.uv10, sub.uv11),
        ];
        for (edge, opposite, uv_a, uv_b) in slots.iter().copied() {
            self.maybe_resolve(sub.patch, edge, opposite, uv_a, uv_b, depth)?;
        }
        Ok(())
    }

    fn maybe_resolve(
        &self,
        patch: Patch,
        edge: EdgeRef,
        opposite: EdgeRef,
        uv_a: Vec2f,
        uv_b: Vec2f,
        depth: SplitDepth,
    ) -> BuildResult<()> {
        let cur = self.edges.get(edge).t;
        let opp_t = self.edges.get(opposite).t;
        let needs_resolve = cur == T_UNSET || (cur == T_NON_UNIFORM && opp_t == 1);
        if !needs_resolve {
            return Ok(());
        }
        let t = self.compute_edge_factor(patch, uv_a, uv_b, depth, true)?;
        self.edges.assign_edge_factor(edge, t)
    }

    /// Decides whether to split along u, v, both, or neither.
    fn decide_split(&self, sub: &SubPatch) -> (bool, bool) {
        let u0 = self.edges.get(sub.edge_u0).t;
        let u1 = self.edges.get(sub.edge_u1).t;
        let v0 = self.edges.get(sub.edge_v0).t;
        let v1 = self.edges.get(sub.edge_v1).t;

        let min_tu = u0.min(u1);
        let max_tu = u0.max(u1);
        let min_tv = v0.min(v1);
        let max_tv = v0.max(v1);

        let split_u = u0 == T_NON_UNIFORM
            || u1 == T_NON_UNIFORM
            || (min_tu >= 2
                && min_tv > DSPLIT_MAX_SEGMENTS
                && (max_tv as f32) / (min_tv as f32) > 1.5);
        let split_v = v0 == T_NON_UNIFORM
            || v1 == T_NON_UNIFORM
            || (min_tv >= 2
                && min_tu > DSPLIT_MAX_SEGMENTS
                && (max_tu as f32) / (min_tu as f32) > 1.5);

        (split_u, split_v)
    }

    /// Performs a split along u.
    fn split_u(&self, sub: &SubPatch, depth: SplitDepth) -> BuildResult<(SubPatch, SubPatch)> {
        let v00 = sub.edge_u0.local_start(&self.edges);
        let v10 = sub.edge_u0.local_end(&self.edges);
        let v11 = sub.edge_u1.local_start(&self.edges);
        let v01 = sub.edge_u1.local_end(&self.edges);

        let split0 = self.edges.split_edge(sub.edge_u0, v00, v10)?;
        let split1 = self.edges.split_edge(sub.edge_u1, v11, v01)?;
        let mid0 = split0.mid_vert;
        let mid1 = split1.mid_vert;

        let edge_u0_a = split0.first;
        let edge_u0_b = split0.second;
        let edge_u1_b = split1.first;
        let edge_u1_a = split1.second;

        let mid_uv0 = sub.uv00.lerp(sub.uv10, 0.5);
        let mid_uv1 = sub.uv01.lerp(sub.uv11, 0.5);

        let mut t = self.compute_edge_factor(sub.patch, mid_uv0, mid_uv1, depth, false)?;
        if depth == SplitDepth::NGON_SEED && t == 1 {
            t = 2;
        }

        let edge_new_a = self.edges.alloc_edge(mid0, mid1)?;
        let edge_new_b = self.edges.alloc_edge(mid1, mid0)?;
        self.edges.assign_edge_factor(edge_new_a, t)?;
        self.edges.assign_edge_factor(edge_new_b, t)?;

        let a = SubPatch {
            patch: sub.patch,
            uv00: sub.uv00,
            uv10: mid_uv0,
            uv11: mid_uv1,
            uv01: sub.uv01,
            edge_u0: edge_u0_a,
            edge_v1: edge_new_a,
            edge_u1: edge_u1_a,
            edge_v0: sub.edge_v0,
            inner_grid_vert_offset: UNSET_VERT,
        };
        let b = SubPatch {
            patch: sub.patch,
            uv00: mid_uv0,
            uv10: sub.uv10,
            uv11: sub.uv11,
            uv01: mid_uv1,
            edge_u0: edge_u0_b,
            edge_v1: sub.edge_v1,
            edge_u1: edge_u1_b,
            edge_v0: edge_new_b,
            inner_grid_vert_offset: UNSET_VERT,
        };
        Ok((a, b))
    }

    /// Splits along v: the mirror image of `split_u` with the
    /// two parametric axes swapped. `a` is the lower half (`v` in
    /// `[0, 0.5]`), `b` the upper half.
    fn split_v(&self, sub: &SubPatch, depth: SplitDepth) -> BuildResult<(SubPatch, SubPatch)> {
        let v00 = sub.edge_v0.local_end(&self.edges);
        let v01 = sub.edge_v0.local_start(&self.edges);
        let v10 = sub.edge_v1.local_start(&self.edges);
        let v11 = sub.edge_v1.local_end(&self.edges);

        let split0 = self.edges.split_edge(sub.edge_v0, v01, v00)?; // u=0, v=0.5
        let split1 = self.edges.split_edge(sub.edge_v1, v10, v11)?; // u=1, v=0.5
        let mid0 = split0.mid_vert;
        let mid1 = split1.mid_vert;

        let edge_v0_upper = split0.first;
        let edge_v0_lower = split0.second;
        let edge_v1_lower = split1.first;
        let edge_v1_upper = split1.second;

        let mid_uv0 = sub.uv01.lerp(sub.uv00, 0.5);
        let mid_uv1 = sub.uv10.lerp(sub.uv11, 0.5);

        let mut t = self.compute_edge_factor(sub.patch, mid_uv1, mid_uv0, depth, false)?;
        if depth == SplitDepth::NGON_SEED && t == 1 {
            t = 2;
        }

        let edge_new_a = self.edges.alloc_edge(mid1, mid0)?;
        let edge_new_b = self.edges.alloc_edge(mid0, mid1)?;
        self.edges.assign_edge_factor(edge_new_a, t)?;
        self.edges.assign_edge_factor(edge_new_b, t)?;

        let a = SubPatch {
            patch: sub.patch,
            uv00: sub.uv00,
            uv10: sub.uv10,
            uv11: mid_uv1,
            uv01: mid_uv0,
            edge_u0: sub.edge_u0,
            edge_v1: edge_v1_lower,
            edge_u1: edge_new_a,
            edge_v0: edge_v0_lower,
            inner_grid_vert_offset: UNSET_VERT,
        };
        let b = SubPatch {
            patch: sub.patch,
            uv00: mid_uv0,
            uv10: mid_uv1,
            uv11: sub.uv11,
            uv01: sub.uv01,
            edge_u0: edge_new_b,
            edge_v1: edge_v1_upper,
            edge_u1: sub.edge_u1,
            edge_v0: edge_v0_upper,
            inner_grid_vert_offset: UNSET_VERT,
        };
        Ok((a, b))
    }

    /// Recursive split driver: resolves edges, decides
    /// whether to split along u, v, both (alternating by recursion-depth
    /// parity), or neither, in which case the sub-patch is finalized.
    pub fn split(&self, sub: SubPatch, depth: SplitDepth, out: &mut Vec<SubPatch>) -> BuildResult<()> {
        self.resolve_edges(&sub, depth)?;
        let (split_along_u, split_along_v) = self.decide_split(&sub);

        let (do_u, do_v) = if split_along_u && split_along_v {
            if depth.raw() % 2 == 0 {
                (true, false)
            } else {
                (false, true)
            }
        } else {
            (split_along_u, split_along_v)
        };

        if do_u {
            let (a, b) = self.split_u(&sub, depth)?;
            self.split(a, depth.next(), out)?;
            self.split(b, depth.next(), out)?;
        } else if do_v {
            let (a, b) = self.split_v(&sub, depth)?;
            self.split(a, depth.next(), out)?;
            self.split(b, depth.next(), out)?;
        } else {
            out.push(sub);
        }
        Ok(())
    }

    /// A quad enters with all four corner edges freshly allocated
    /// and forced NON_UNIFORM, seeded at the `NgonSeed` depth. Corner vertex
    /// ids are supplied by the caller, not synthesized here: they are mesh
    /// vertices shared with whatever other quads border this one, and
    /// allocating fresh ids for them here would reintroduce the exact
    /// cross-face cracks the shared edge table exists to prevent.
    pub fn split_quad(&self, patch: Patch, corner_uvs: [Vec2f; 4], corner_verts: [u32; 4]) -> BuildResult<Vec<SubPatch>> {
        let (v00, v10, v11, v01) = (corner_verts[0], corner_verts[1], corner_verts[2], corner_verts[3]);
        let edge_u0 = self.edges.alloc_edge(v00, v10)?;
        let edge_v1 = self.edges.alloc_edge(v10, v11)?;
        let edge_u1 = self.edges.alloc_edge(v11, v01)?;
        let edge_v0 = self.edges.alloc_edge(v01, v00)?;
        for e in [edge_u0, edge_v1, edge_u1, edge_v0] {
            self.edges.force_non_uniform(e)?;
        }

        let sub = SubPatch {
            patch,
            uv00: corner_uvs[0],
            uv10: corner_uvs[1],
            uv11: corner_uvs[2],
            uv01: corner_uvs[3],
            edge_u0,
            edge_v1,
            edge_u1,
            edge_v0,
            inner_grid_vert_offset: UNSET_VERT,
        };
        let mut out = Vec::new();
        self.split(sub, SplitDepth::NGON_SEED, &mut out)?;
        Ok(out)
    }

    /// An n-gon of `n` corners splits into `n` quads fanning from a
    /// shared centre vertex. `corner_verts[i]`/`corner_uvs[i]` describe
    /// corner `i`, and `patches[i]` is that corner's own patch (each corner
    /// keeps its own patch rather than sharing one patch across the whole
    /// n-gon). All four edges of each corner quad are allocated UNSET and
    /// left for `resolve_edges` to settle normally, the same as any other
    /// freshly split interior edge — unlike `split_quad`, nothing here is
    /// forced NON_UNIFORM.
    pub fn split_ngon(&self, patches: &[Patch], corner_uvs: &[Vec2f], corner_verts: &[u32]) -> BuildResult<Vec<SubPatch>> {
        let n = corner_uvs.len();
        debug_assert_eq!(corner_verts.len(), n);
        debug_assert_eq!(patches.len(), n);
        if n < 3 {
            return Err(BuildError::DegenerateInput(format!(
                "split_ngon: a polygon needs at least 3 corners, got {}",
                n
            )));
        }

        let center_vert = self.edges.alloc_vert_range(1)?;
        let center_uv = ngon_center(corner_uvs);

        let mut mid_verts = Vec::with_capacity(n);
        let mut mid_uvs = Vec::with_capacity(n);
        for i in 0..n {
            let j = (i + 1) % n;
            mid_verts.push(self.edges.alloc_vert_range(1)?);
            mid_uvs.push(corner_uvs[i].lerp(corner_uvs[j], 0.5));
        }

        let mut out = Vec::new();
        for i in 0..n {
            let prev = (i + n - 1) % n;
            let edge_u0 = self.edges.alloc_edge(center_vert, mid_verts[prev])?;
            let edge_v1 = self.edges.alloc_edge(mid_verts[prev], corner_verts[i])?;
            let edge_u1 = self.edges.alloc_edge(corner_verts[i], mid_verts[i])?;
            let edge_v0 = self.edges.alloc_edge(mid_verts[i], center_vert)?;

            let sub = SubPatch {
                patch: patches[i],
                uv00: center_uv,
                uv10: mid_uvs[prev],
                uv11: corner_uvs[i],
                uv01: mid_uvs[i],
                edge_u0,
                edge_v1,
                edge_u1,
                edge_v0,
                inner_grid_vert_offset: UNSET_VERT,
            };
            self.split(sub, SplitDepth::top_level(), &mut out)?;
        }
        Ok(out)
    }
}

fn ngon_center(corners: &[Vec2f]) -> Vec2f {
    let n = corners.len() as f32;
    let sum = corners.iter().fold(Vec2f::zero(), |acc, c| acc + *c);
    sum.scale(1.0 / n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::vector::Vec3f;
    use crate::patch::eval::{PatchId, PatchSample};
    use crate::params::DiagSplitParams;

    struct FlatEvaluator {
        scale: f32,
    }

    impl PatchEvaluator for FlatEvaluator {
        fn eval(&self, _patch: Patch, uv: Vec2f) -> PatchSample {
            PatchSample {
                position: Vec3f {
                    x: uv.x * self.scale,
                    y: uv.y * self.scale,
                    z: 0.0,
                },
                normal: Vec3f { x: 0.0, y: 0.0, z: 1.0 },
            }
        }
    }

    struct NoCamera;

    impl CameraProjection for NoCamera {
        fn world_to_raster_size(&self, _point: Vec3f) -> f32 {
            1.0
        }
    }

    fn quad_patch() -> Patch {
        Patch {
            id: PatchId(0),
            from_ngon: false,
        }
    }

    #[test]
    fn ngon_seed_is_distinct_from_any_real_depth() {
        assert_ne!(SplitDepth::NGON_SEED.raw(), SplitDepth::top_level().raw());
        for _ in 0..DSPLIT_MAX_DEPTH {
            assert!(SplitDepth::NGON_SEED.raw() < SplitDepth::top_level().raw());
        }
    }

    #[test]
    fn larger_patch_gets_a_larger_edge_factor() {
        let small = FlatEvaluator { scale: 1.0 };
        let large = FlatEvaluator { scale: 100.0 };
        let engine_small = DiagSplitEngine::new(&small, None::<&NoCamera>, DiagSplitParams::default(), 0).unwrap();
        let engine_large = DiagSplitEngine::new(&large, None::<&NoCamera>, DiagSplitParams::default(), 0).unwrap();

        let t_small = engine_small
            .compute_edge_factor(quad_patch(), Vec2f { x: 0.0, y: 0.0 }, Vec2f { x: 1.0, y: 0.0 }, SplitDepth::top_level(), false)
            .unwrap();
        let t_large = engine_large
            .compute_edge_factor(quad_patch(), Vec2f { x: 0.0, y: 0.0 }, Vec2f { x: 1.0, y: 0.0 }, SplitDepth::top_level(), false)
            .unwrap();
        assert!(t_large > t_small);
    }

    #[test]
    fn split_quad_shares_edge_factors_with_its_neighbor() {
        let evaluator = FlatEvaluator { scale: 20.0 };
        let engine = DiagSplitEngine::new(&evaluator, None::<&NoCamera>, DiagSplitParams::default(), 4).unwrap();

        let left = engine
            .split_quad(
                quad_patch(),
                [
                    Vec2f { x: 0.0, y: 0.0 },
                    Vec2f { x: 1.0, y: 0.0 },
                    Vec2f { x: 1.0, y: 1.0 },
                    Vec2f { x: 0.0, y: 1.0 },
                ],
                [0, 1, 2, 3],
            )
            .unwrap();
        // A neighboring quad sharing the edge (1, 2) must resolve it to the
        // exact same T, since alloc_edge on the same pair returns the same
        // EdgeRef regardless of which quad asks first.
        let right = engine
            .split_quad(
                quad_patch(),
                [
                    Vec2f { x: 1.0, y: 0.0 },
                    Vec2f { x: 2.0, y: 0.0 },
                    Vec2f { x: 2.0, y: 1.0 },
                    Vec2f { x: 1.0, y: 1.0 },
                ],
                [1, 4, 5, 2],
            )
            .unwrap();
        assert!(!left.is_empty());
        assert!(!right.is_empty());

        let shared = engine.edges.alloc_edge(1, 2).unwrap();
        let shared_again = engine.edges.alloc_edge(2, 1).unwrap();
        assert_eq!(engine.edges.get(shared).t, engine.edges.get(shared_again).t);
        assert_ne!(engine.edges.get(shared).t, T_UNSET);
    }

    #[test]
    fn split_ngon_rejects_degenerate_polygon() {
        let evaluator = FlatEvaluator { scale: 1.0 };
        let engine = DiagSplitEngine::new(&evaluator, None::<&NoCamera>, DiagSplitParams::default(), 0).unwrap();
        let uvs = [Vec2f { x: 0.0, y: 0.0 }, Vec2f { x: 1.0, y: 0.0 }];
        let patches = [quad_patch(), quad_patch()];
        let result = engine.split_ngon(&patches, &uvs, &[0, 1]);
        assert!(matches!(result, Err(BuildError::DegenerateInput(_))));
    }
}
