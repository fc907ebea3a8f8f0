// The mesh-owned-by-the-caller interface: EdgeDice pushes vertices and
// triangles through this trait instead of touching any global mesh state,
// keeping the sink an explicit dependency rather than shared global state.

use crate::math::vector::{Vec2f, Vec3f};

pub trait MeshSink {
    /// Grows backing storage to hold exactly `vertex_count`/`triangle_count`
    /// entries, called once up front by `split_patches`.
    fn resize_mesh(&mut self, vertex_count: u32, triangle_count: u32);

    /// Reserves additional capacity without changing the logical size, for
    /// sinks that stream triangles from multiple patches into one buffer.
    fn reserve_mesh(&mut self, additional_vertices: u32, additional_triangles: u32);

    fn add_triangle(&mut self, v0: u32, v1: u32, v2: u32);

    fn set_vertex(&mut self, index: u32, position: Vec3f, normal: Vec3f, ptex_uv: Vec2f, ptex_face_id: u32);
}
