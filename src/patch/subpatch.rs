use crate::math::util::max;
use crate::math::vector::Vec2f;
use crate::patch::edge::{EdgeRef, SharedEdgeTable};
use crate::patch::eval::Patch;

/// A parametric quad over a patch, with four edges named counter-clockwise
/// from the (0,0) corner: `edge_u0` runs uv00->uv10, `edge_v1` runs
/// uv10->uv11, `edge_u1` runs uv11->uv01, `edge_v0` runs uv01->uv00.
/// `inner_grid_vert_offset` is filled in lazily by EdgeDice, since the inner
/// grid is local to this sub-patch and never shared the way edges are.
#[derive(Clone, Copy, Debug)]
pub struct SubPatch {
    pub patch: Patch,
    pub uv00: Vec2f,
    pub uv10: Vec2f,
    pub uv11: Vec2f,
    pub uv01: Vec2f,
    pub edge_u0: EdgeRef,
    pub edge_v1: EdgeRef,
    pub edge_u1: EdgeRef,
    pub edge_v0: EdgeRef,
    pub inner_grid_vert_offset: u32,
}

impl SubPatch {
    /// Bilinear map from this sub-patch's local `[0,1]^2` to the owning
    /// patch's own UV space.
    pub fn map_uv(&self, local: Vec2f) -> Vec2f {
        let v0 = self.uv00.lerp(self.uv10, local.x);
        let v1 = self.uv01.lerp(self.uv11, local.x);
        v0.lerp(v1, local.y)
    }

    pub fn corner_start_u(&self, table: &SharedEdgeTable) -> u32 {
        self.edge_u0.local_start(table)
    }

    pub fn corner_end_u(&self, table: &SharedEdgeTable) -> u32 {
        self.edge_u0.local_end(table)
    }

    pub fn corner_start_v(&self, table: &SharedEdgeTable) -> u32 {
        self.edge_u1.local_start(table)
    }

    pub fn corner_end_v(&self, table: &SharedEdgeTable) -> u32 {
        self.edge_u1.local_end(table)
    }

    pub fn mu(&self, table: &SharedEdgeTable) -> i32 {
        max(max(table.get(self.edge_u0).t, table.get(self.edge_u1).t), 2)
    }

    pub fn mv(&self, table: &SharedEdgeTable) -> i32 {
        max(max(table.get(self.edge_v0).t, table.get(self.edge_v1).t), 2)
    }

    pub fn inner_verts(&self, table: &SharedEdgeTable) -> u32 {
        let mu = self.mu(table);
        let mv = self.mv(table);
        ((mu - 1) * (mv - 1)) as u32
    }

    /// `2(Mu−2)(Mv−2) + Σ edge.T + 2(Mu−2) + 2(Mv−2)`, the triangle count
    /// predicted purely from the four final `T`s — used as a sanity check
    /// against what EdgeDice actually emits, not as EdgeDice's own stitching
    /// bookkeeping (which builds its fans from explicit vertex polylines
    /// rather than this closed-form count).
    pub fn triangle_count_estimate(&self, table: &SharedEdgeTable) -> i32 {
        let mu = self.mu(table);
        let mv = self.mv(table);
        let t_sum = table.get(self.edge_u0).t
            + table.get(self.edge_v1).t
            + table.get(self.edge_u1).t
            + table.get(self.edge_v0).t;
        2 * (mu - 2) * (mv - 2) + t_sum + 2 * (mu - 2) + 2 * (mv - 2)
    }
}
