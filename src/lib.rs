// Top-level wiring for the two cores: the DiagSplit + EdgeDice patch
// tessellator and the SAOH light tree builder, sharing only the
// `math`/`error`/`params` layers beneath them. Module declarations live
// here, flat from a single entry point, since this crate is a library with
// no further public surface of its own.

pub mod cone;
pub mod error;
pub mod light;
pub mod math;
pub mod params;
pub mod patch;
pub mod taskpool;

use error::BuildResult;
use math::vector::Vec2f;
use params::DiagSplitParams;
use patch::{dice_subpatch, DiagSplitEngine, MeshSink, Patch, PatchEvaluator, SubPatch};

pub use cone::{OrientationCone, OrientationConef};
pub use error::BuildError;
pub use light::{LampGeometry, LampKind, LightTree, LightTreeNode, LightTreeNodeKind, LightTreePrimitive};
pub use params::LightTreeBuildParams;

/// One input face to `split_patches`: either a quad (the common case, four
/// corners sharing one evaluable patch) or an n-gon fanning from a centre
/// vertex, each corner potentially evaluated against its own patch. This
/// replaces a byte-strided, variable-size patch array — a C-ABI
/// accommodation with no idiomatic Rust equivalent — with a plain enum; the
/// two variants are exactly the two shapes `DiagSplitEngine::split_quad`/
/// `split_ngon` already accept.
pub enum Face {
    Quad {
        patch: Patch,
        corner_uvs: [Vec2f; 4],
        corner_verts: [u32; 4],
    },
    Ngon {
        patches: Vec<Patch>,
        corner_uvs: Vec<Vec2f>,
        corner_verts: Vec<u32>,
    },
}

/// Runs DiagSplit followed by EdgeDice over `faces`, writing the resulting
/// mesh into `sink`. `first_vert_id` is the first vertex id the shared edge
/// table may hand out, letting a caller reserve a contiguous id range ahead
/// of this call for vertices it already owns (e.g. the faces' own corners).
pub fn split_patches<E, C>(
    faces: &[Face],
    evaluator: &E,
    camera: Option<&C>,
    params: DiagSplitParams,
    first_vert_id: u32,
    sink: &mut impl MeshSink,
) -> BuildResult<()>
where
    E: PatchEvaluator,
    C: patch::CameraProjection,
{
    let engine = DiagSplitEngine::new(evaluator, camera, params, first_vert_id)?;

    let mut subs: Vec<SubPatch> = Vec::new();
    for face in faces {
        match face {
            Face::Quad {
                patch,
                corner_uvs,
                corner_verts,
            } => {
                let mut out = engine.split_quad(*patch, *corner_uvs, *corner_verts)?;
                subs.append(&mut out);
            }
            Face::Ngon {
                patches,
                corner_uvs,
                corner_verts,
            } => {
                let mut out = engine.split_ngon(patches, corner_uvs, corner_verts)?;
                subs.append(&mut out);
            }
        }
    }

    let triangle_estimate: u32 = subs.iter().map(|s| s.triangle_count_estimate(&engine.edges) as u32).sum();
    sink.resize_mesh(engine.edges.vert_count(), triangle_estimate);

    for mut sub in subs {
        dice_subpatch(&engine.edges, evaluator, &mut sub, sink)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use math::vector::Vec3f;
    use patch::PatchSample;

    struct FlatEvaluator;

    impl PatchEvaluator for FlatEvaluator {
        fn eval(&self, _patch: Patch, uv: Vec2f) -> PatchSample {
            PatchSample {
                position: Vec3f { x: uv.x, y: uv.y, z: 0.0 },
                normal: Vec3f { x: 0.0, y: 0.0, z: 1.0 },
            }
        }
    }

    struct NoCamera;

    impl patch::CameraProjection for NoCamera {
        fn world_to_raster_size(&self, _point: Vec3f) -> f32 {
            1.0
        }
    }

    struct RecordingSink {
        vertex_count: u32,
        triangle_count: u32,
        positions: Vec<Vec3f>,
        triangles: Vec<(u32, u32, u32)>,
    }

    impl MeshSink for RecordingSink {
        fn resize_mesh(&mut self, vertex_count: u32, triangle_count: u32) {
            self.vertex_count = vertex_count;
            self.triangle_count = triangle_count;
            self.positions.resize(vertex_count as usize, Vec3f::zero());
        }

        fn reserve_mesh(&mut self, _additional_vertices: u32, _additional_triangles: u32) {}

        fn add_triangle(&mut self, v0: u32, v1: u32, v2: u32) {
            self.triangles.push((v0, v1, v2));
        }

        fn set_vertex(&mut self, index: u32, position: Vec3f, _normal: Vec3f, _ptex_uv: Vec2f, _ptex_face_id: u32) {
            if (index as usize) >= self.positions.len() {
                self.positions.resize(index as usize + 1, Vec3f::zero());
            }
            self.positions[index as usize] = position;
        }
    }

    #[test]
    fn unit_quad_dices_into_two_triangles() {
        let evaluator = FlatEvaluator;
        let faces = vec![Face::Quad {
            patch: Patch {
                id: patch::PatchId(0),
                from_ngon: false,
            },
            corner_uvs: [
                Vec2f { x: 0.0, y: 0.0 },
                Vec2f { x: 1.0, y: 0.0 },
                Vec2f { x: 1.0, y: 1.0 },
                Vec2f { x: 0.0, y: 1.0 },
            ],
            corner_verts: [0, 1, 2, 3],
        }];

        let mut sink = RecordingSink {
            vertex_count: 0,
            triangle_count: 0,
            positions: Vec::new(),
            triangles: Vec::new(),
        };

        split_patches(
            &faces,
            &evaluator,
            None::<&NoCamera>,
            DiagSplitParams::default(),
            4,
            &mut sink,
        )
        .unwrap();

        assert_eq!(sink.triangles.len(), 2);
    }

    #[test]
    fn pentagon_ngon_splits_into_five_quads_with_agreeing_shared_edges() {
        let evaluator = FlatEvaluator;
        let n = 5;
        let radius = 10.0;
        let corner_uvs: Vec<Vec2f> = (0..n)
            .map(|i| {
                let a = std::f32::consts::TAU * i as f32 / n as f32;
                Vec2f { x: radius * a.cos(), y: radius * a.sin() }
            })
            .collect();
        let corner_verts: Vec<u32> = (0..n as u32).collect();
        let patches: Vec<Patch> = (0..n)
            .map(|i| Patch { id: patch::PatchId(i as u32), from_ngon: true })
            .collect();

        let faces = vec![Face::Ngon { patches, corner_uvs, corner_verts }];

        let mut sink = RecordingSink {
            vertex_count: 0,
            triangle_count: 0,
            positions: Vec::new(),
            triangles: Vec::new(),
        };

        split_patches(
            &faces,
            &evaluator,
            None::<&NoCamera>,
            DiagSplitParams::default(),
            n as u32,
            &mut sink,
        )
        .unwrap();

        assert!(!sink.triangles.is_empty());
        // Every corner's own mesh vertex participates in at least one
        // emitted triangle; the n-gon doesn't drop a corner.
        for v in 0..n as u32 {
            assert!(sink.triangles.iter().any(|&(a, b, c)| a == v || b == v || c == v));
        }
    }
}
