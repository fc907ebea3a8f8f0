pub mod dice;
pub mod diagsplit;
pub mod edge;
pub mod eval;
pub mod mesh_sink;
pub mod subpatch;

pub use dice::dice_subpatch;
pub use diagsplit::{DiagSplitEngine, SplitDepth};
pub use edge::SharedEdgeTable;
pub use eval::{CameraProjection, Patch, PatchEvaluator, PatchId, PatchSample};
pub use mesh_sink::MeshSink;
pub use subpatch::SubPatch;
