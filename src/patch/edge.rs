// Deduplicates `SubEdge`s by unordered vertex pair and hands out interior
// vertex ids, using an open-addressing-over-a-vector design: a hash set
// stores indices and callers resolve to records through the backing vector.
// Here a `std::collections::HashMap<u64, u32>` plays the open-addressing
// table's role, since it already gives us index (not pointer) stability
// without hand-rolling probing.

use std::collections::HashMap;
use std::convert::TryInto;
use std::sync::Mutex;

use crate::error::{BuildError, BuildResult};

pub const T_UNSET: i32 = 0;
pub const T_NON_UNIFORM: i32 = -1;
pub const UNSET_VERT: u32 = u32::MAX;

#[derive(Clone, Copy, Debug)]
pub struct SubEdge {
    pub start_vert_index: u32,
    pub end_vert_index: u32,
    pub t: i32,
    pub second_vert_index: u32,
    pub mid_vert_index: u32,
}

impl SubEdge {
    fn new(start: u32, end: u32) -> Self {
        SubEdge {
            start_vert_index: start,
            end_vert_index: end,
            t: T_UNSET,
            second_vert_index: UNSET_VERT,
            mid_vert_index: UNSET_VERT,
        }
    }
}

/// A caller-local handle to a `SubEdge`: the index into the table's storage
/// plus whether this caller's own `(v0, v1)` order runs opposite to the
/// edge's canonical `start < end` order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeRef {
    pub index: u32,
    pub reversed: bool,
}

impl EdgeRef {
    pub fn local_start(self, table: &SharedEdgeTable) -> u32 {
        let e = table.get(self);
        if self.reversed {
            e.end_vert_index
        } else {
            e.start_vert_index
        }
    }

    pub fn local_end(self, table: &SharedEdgeTable) -> u32 {
        let e = table.get(self);
        if self.reversed {
            e.start_vert_index
        } else {
            e.end_vert_index
        }
    }
}

/// The result of splitting an edge at its midpoint: the midpoint vertex and
/// the two half-edges `v_from..mid_vert` (`first`) and `mid_vert..v_to`
/// (`second`), already allocated in the table.
#[derive(Clone, Copy, Debug)]
pub struct EdgeSplit {
    pub mid_vert: u32,
    pub first: EdgeRef,
    pub second: EdgeRef,
}

fn pack_key(a: u32, b: u32) -> u64 {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    (u64::from(lo) << 32) | u64::from(hi)
}

struct Inner {
    edges: Vec<SubEdge>,
    index: HashMap<u64, u32>,
    next_vert_id: u32,
}

/// Holds every `SubEdge` created during one tessellation pass, plus the
/// counter that hands out vertex ids. Every SubEdge is allocated through
/// this table behind a single mutex; outside of allocation, readers go
/// through `get`, which takes the same lock briefly rather than exposing
/// lock-free raw access — simpler than a two-tier locking scheme, and not a
/// bottleneck since DiagSplit itself runs single-threaded.
pub struct SharedEdgeTable {
    inner: Mutex<Inner>,
}

impl SharedEdgeTable {
    pub fn new(first_vert_id: u32) -> Self {
        SharedEdgeTable {
            inner: Mutex::new(Inner {
                edges: Vec::new(),
                index: HashMap::new(),
                next_vert_id: first_vert_id,
            }),
        }
    }

    pub fn alloc_edge(&self, v0: u32, v1: u32) -> BuildResult<EdgeRef> {
        let mut inner = self.inner.lock().unwrap();
        Self::alloc_edge_locked(&mut inner, v0, v1)
    }

    fn alloc_edge_locked(inner: &mut Inner, v0: u32, v1: u32) -> BuildResult<EdgeRef> {
        let key = pack_key(v0, v1);
        if let Some(&idx) = inner.index.get(&key) {
            let reversed = inner.edges[idx as usize].start_vert_index != v0;
            return Ok(EdgeRef { index: idx, reversed });
        }
        let idx: u32 = inner
            .edges
            .len()
            .try_into()
            .map_err(|_| BuildError::Allocation("edge table exceeded u32::MAX entries".to_string()))?;
        let (start, end) = if v0 < v1 { (v0, v1) } else { (v1, v0) };
        inner.edges.push(SubEdge::new(start, end));
        inner.index.insert(key, idx);
        Ok(EdgeRef {
            index: idx,
            reversed: start != v0,
        })
    }

    pub fn get(&self, r: EdgeRef) -> SubEdge {
        self.inner.lock().unwrap().edges[r.index as usize]
    }

    /// Assigns `edge.T` the first time it is resolved, allocating its
    /// `T - 1` interior vertex ids in the same locked step — the id counter
    /// only ever advances while this mutex is held, which is what keeps
    /// vertex ids deterministic regardless of call order. Reassigning the
    /// same value is a no-op; reassigning a different value is an invariant
    /// violation.
    pub fn assign_edge_factor(&self, r: EdgeRef, t: i32) -> BuildResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let current = inner.edges[r.index as usize].t;
        match current {
            T_UNSET | T_NON_UNIFORM => {}
            existing if existing == t => return Ok(()),
            existing => {
                let msg = format!(
                    "assign_edge_factor: edge {} already resolved to T={}, attempted reassignment to {}",
                    r.index, existing, t
                );
                debug_assert!(false, "{}", msg);
                return Err(BuildError::InvariantViolation(msg));
            }
        }

        let second_vert_index = if t >= 1 {
            let first = inner.next_vert_id;
            let count = (t - 1) as u32;
            inner.next_vert_id = inner.next_vert_id.checked_add(count).ok_or_else(|| {
                BuildError::Allocation("interior vertex id range overflowed u32".to_string())
            })?;
            first
        } else {
            UNSET_VERT
        };

        let edge = &mut inner.edges[r.index as usize];
        edge.t = t;
        if t >= 1 {
            edge.second_vert_index = second_vert_index;
        }
        Ok(())
    }

    /// Marks a freshly allocated edge NON_UNIFORM, as `split_quad` does to
    /// all four of a quad's corner edges.
    pub fn force_non_uniform(&self, r: EdgeRef) -> BuildResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let edge = &mut inner.edges[r.index as usize];
        match edge.t {
            T_UNSET => {
                edge.t = T_NON_UNIFORM;
                Ok(())
            }
            T_NON_UNIFORM => Ok(()),
            other => {
                let msg = format!(
                    "force_non_uniform: edge {} already resolved to T={}",
                    r.index, other
                );
                debug_assert!(false, "{}", msg);
                Err(BuildError::InvariantViolation(msg))
            }
        }
    }

    /// Splits an edge at its midpoint, walked from `v_from` to `v_to` in the
    /// caller's own local direction, and allocates (or looks up) the two
    /// half-edges `v_from..mid` and `mid..v_to`.
    ///
    /// An edge that is still NON_UNIFORM or UNSET gets a brand-new midpoint
    /// vertex, and its two halves come back UNSET for the caller to resolve
    /// through the ordinary `resolve_edges` path. An edge already resolved to
    /// a final `T >= 2` instead reuses one of its own interior vertices as
    /// the midpoint (`second_vert_index - 1 + T / 2`) and the two halves come
    /// back already resolved to `T / 2` and `T - T / 2`, carved out of the
    /// edge's existing interior vertex range — nothing new is allocated, so a
    /// neighbour that kept the edge whole still agrees on every vertex id.
    pub fn split_edge(&self, r: EdgeRef, v_from: u32, v_to: u32) -> BuildResult<EdgeSplit> {
        let mut inner = self.inner.lock().unwrap();
        let edge = inner.edges[r.index as usize];

        if edge.mid_vert_index != UNSET_VERT {
            let mid_vert = edge.mid_vert_index;
            let first = Self::alloc_edge_locked(&mut inner, v_from, mid_vert)?;
            let second = Self::alloc_edge_locked(&mut inner, mid_vert, v_to)?;
            return Ok(EdgeSplit { mid_vert, first, second });
        }

        if edge.t >= 2 {
            let t = edge.t;
            let s = edge.second_vert_index;
            let mid = t / 2;
            let mid_vert = s + (mid - 1) as u32;
            inner.edges[r.index as usize].mid_vert_index = mid_vert;

            // x_first/x_second are the interior vertex id nearest `v_from` for
            // each half, in the half's own request direction; `None` means the
            // half has no interior vertex of its own (T == 1).
            let (t_first, x_first, t_second, x_second) = if !r.reversed {
                (mid, Some(s), t - mid, if t - mid >= 2 { Some(s + mid as u32) } else { None })
            } else {
                (
                    t - mid,
                    if t - mid >= 2 { Some(s + (t - 2) as u32) } else { None },
                    mid,
                    if mid >= 2 { Some(s + (mid - 2) as u32) } else { None },
                )
            };

            let first = Self::alloc_edge_locked(&mut inner, v_from, mid_vert)?;
            let second = Self::alloc_edge_locked(&mut inner, mid_vert, v_to)?;
            Self::store_resolved_half(&mut inner, first, t_first, x_first)?;
            Self::store_resolved_half(&mut inner, second, t_second, x_second)?;

            return Ok(EdgeSplit { mid_vert, first, second });
        }

        let id = inner.next_vert_id;
        inner.next_vert_id = inner
            .next_vert_id
            .checked_add(1)
            .ok_or_else(|| BuildError::Allocation("vertex id overflow while splitting an edge".to_string()))?;
        inner.edges[r.index as usize].mid_vert_index = id;

        let first = Self::alloc_edge_locked(&mut inner, v_from, id)?;
        let second = Self::alloc_edge_locked(&mut inner, id, v_to)?;
        Ok(EdgeSplit { mid_vert: id, first, second })
    }

    /// Stores a half-edge's known factor and, if it has one, the interior
    /// vertex id nearest the half's own request origin (`x`, in the half's
    /// own local direction) — translated into the half's canonical
    /// `second_vert_index` via its own `reversed` flag. A no-op if another
    /// caller already resolved this exact half-edge the same way.
    fn store_resolved_half(inner: &mut Inner, r: EdgeRef, t_half: i32, x: Option<u32>) -> BuildResult<()> {
        let current = inner.edges[r.index as usize].t;
        match current {
            T_UNSET | T_NON_UNIFORM => {}
            existing if existing == t_half => return Ok(()),
            existing => {
                let msg = format!(
                    "split_edge: half-edge {} already resolved to T={}, attempted reassignment to {}",
                    r.index, existing, t_half
                );
                debug_assert!(false, "{}", msg);
                return Err(BuildError::InvariantViolation(msg));
            }
        }

        let edge = &mut inner.edges[r.index as usize];
        edge.t = t_half;
        if let Some(x) = x {
            edge.second_vert_index = if r.reversed { x - (t_half as u32) + 2 } else { x };
        }
        Ok(())
    }

    /// Allocates a contiguous range of `n` fresh vertex ids not tied to any
    /// edge (quad corners, n-gon centre/midpoints).
    pub fn alloc_vert_range(&self, n: u32) -> BuildResult<u32> {
        let mut inner = self.inner.lock().unwrap();
        let first = inner.next_vert_id;
        inner.next_vert_id = inner
            .next_vert_id
            .checked_add(n)
            .ok_or_else(|| BuildError::Allocation("vertex id range overflowed u32".to_string()))?;
        Ok(first)
    }

    pub fn vert_count(&self) -> u32 {
        self.inner.lock().unwrap().next_vert_id
    }

    pub fn edge_count(&self) -> usize {
        self.inner.lock().unwrap().edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_edge_is_order_independent() {
        let table = SharedEdgeTable::new(0);
        let a = table.alloc_edge(5, 9).unwrap();
        let b = table.alloc_edge(9, 5).unwrap();
        assert_eq!(a.index, b.index);
        assert!(!a.reversed);
        assert!(b.reversed);
    }

    #[test]
    fn assign_edge_factor_allocates_interior_verts() {
        let table = SharedEdgeTable::new(100);
        let e = table.alloc_edge(1, 2).unwrap();
        table.assign_edge_factor(e, 4).unwrap();
        let edge = table.get(e);
        assert_eq!(edge.t, 4);
        assert_eq!(edge.second_vert_index, 100);
        assert_eq!(table.vert_count(), 103);
    }

    #[test]
    fn reassigning_same_value_is_ok() {
        let table = SharedEdgeTable::new(0);
        let e = table.alloc_edge(1, 2).unwrap();
        table.assign_edge_factor(e, 3).unwrap();
        assert!(table.assign_edge_factor(e, 3).is_ok());
    }

    #[test]
    fn reassigning_conflicting_value_is_invariant_violation() {
        let table = SharedEdgeTable::new(0);
        let e = table.alloc_edge(1, 2).unwrap();
        table.assign_edge_factor(e, 3).unwrap();
        assert!(matches!(
            table.assign_edge_factor(e, 5),
            Err(BuildError::InvariantViolation(_))
        ));
    }

    #[test]
    fn split_edge_is_idempotent() {
        let table = SharedEdgeTable::new(0);
        let e = table.alloc_edge(1, 2).unwrap();
        let split_a = table.split_edge(e, 1, 2).unwrap();
        let split_b = table.split_edge(e, 1, 2).unwrap();
        assert_eq!(split_a.mid_vert, split_b.mid_vert);
        assert_eq!(split_a.first, split_b.first);
        assert_eq!(split_a.second, split_b.second);
    }

    #[test]
    fn split_edge_on_unset_edge_allocates_fresh_midpoint_and_unset_halves() {
        let table = SharedEdgeTable::new(10);
        let e = table.alloc_edge(1, 2).unwrap();
        let split = table.split_edge(e, 1, 2).unwrap();
        assert_eq!(split.mid_vert, 10);
        assert_eq!(table.get(split.first).t, T_UNSET);
        assert_eq!(table.get(split.second).t, T_UNSET);
    }

    #[test]
    fn split_edge_on_finalized_edge_reuses_interior_vertex_range() {
        let table = SharedEdgeTable::new(100);
        let e = table.alloc_edge(10, 20).unwrap();
        table.assign_edge_factor(e, 4).unwrap();
        // interior vertices 100, 101, 102 at positions 1, 2, 3.

        let split = table.split_edge(e, 10, 20).unwrap();
        assert_eq!(split.mid_vert, 101);
        // no new vertices were allocated.
        assert_eq!(table.vert_count(), 103);

        let first = table.get(split.first);
        assert_eq!(first.t, 2);
        let second = table.get(split.second);
        assert_eq!(second.t, 2);

        // walking 10 -> 101 should pass through 100, and 101 -> 20 through 102.
        let first_interior = if split.first.reversed {
            first.second_vert_index + (first.t as u32 - 2)
        } else {
            first.second_vert_index
        };
        assert_eq!(first_interior, 100);
        let second_interior = if split.second.reversed {
            second.second_vert_index + (second.t as u32 - 2)
        } else {
            second.second_vert_index
        };
        assert_eq!(second_interior, 102);
    }

    #[test]
    fn split_edge_on_finalized_edge_agrees_regardless_of_caller_direction() {
        let table = SharedEdgeTable::new(100);
        let e = table.alloc_edge(10, 20).unwrap();
        table.assign_edge_factor(e, 4).unwrap();

        let forward = table.split_edge(e, 10, 20).unwrap();
        let e_reversed = table.alloc_edge(20, 10).unwrap();
        let backward = table.split_edge(e_reversed, 20, 10).unwrap();

        assert_eq!(forward.mid_vert, backward.mid_vert);
        // forward's (10 -> mid) half is the same edge as backward's (mid -> 10) half.
        assert_eq!(forward.first.index, backward.second.index);
        assert_eq!(forward.second.index, backward.first.index);
    }
}
