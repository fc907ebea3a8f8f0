// The external collaborator interfaces DiagSplit and EdgeDice sample
// through: a pure, thread-safe surface evaluator and an optional camera
// projection. Both are traits rather than concrete types so the core never
// depends on a renderer's scene graph.

use crate::math::vector::{Vec2f, Vec3f};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PatchId(pub u32);

#[derive(Clone, Copy, Debug)]
pub struct Patch {
    pub id: PatchId,
    /// Set for the quad sub-patches `split_ngon` seeds from an n-gon
    /// corner, so the edge-factor computation can halve the n-gon's
    /// max-segment limit.
    pub from_ngon: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct PatchSample {
    pub position: Vec3f,
    pub normal: Vec3f,
}

/// `eval(patch, u, v) -> (P, N, dPdu, dPdv)`, trimmed to what DiagSplit and
/// EdgeDice actually consume (position and normal); derivative vectors
/// belong to the shading side, out of scope for this core.
pub trait PatchEvaluator {
    fn eval(&self, patch: Patch, uv: Vec2f) -> PatchSample;
}

/// `world_to_raster_size(point) -> float`: the size of one raster pixel at
/// `point`, used so edge lengths are measured in pixels when a camera is
/// attached.
pub trait CameraProjection {
    fn world_to_raster_size(&self, point: Vec3f) -> f32;
}
