pub mod bucket;
pub mod builder;
pub mod plot;
pub mod primitive;

pub use builder::{LightTree, LightTreeNode, LightTreeNodeKind};
pub use plot::plot_to_writer;
pub use primitive::{LampGeometry, LampKind, LightTreePrimitive};
