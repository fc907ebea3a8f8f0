// One emitter's spatial/directional/energy measure. Grounded on Cycles'
// `LightTreePrimitive`/lamp-type switch; the surrounding shape (plain data
// struct, constructors that can fail into `None` for degenerate input,
// `#[cfg(test)]` unit tests beside the type) follows the rest of this
// crate's components.

use std::f32::consts::{FRAC_PI_2, PI};

use crate::cone::{OrientationCone, OrientationConef};
use crate::light::bucket::PrimitiveMeasure;
use crate::math::bbox::BBox3f;
use crate::math::vector::Vec3f;

/// The five lamp kinds; `prim_id` for a lamp is `!(kind as i32)`, so every
/// lamp prim_id is negative and every triangle prim_id (a plain mesh index)
/// stays non-negative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LampKind {
    Area,
    Point,
    Spot,
    Background,
    Distant,
}

impl LampKind {
    fn code(self) -> i32 {
        match self {
            LampKind::Area => 0,
            LampKind::Point => 1,
            LampKind::Spot => 2,
            LampKind::Background => 3,
            LampKind::Distant => 4,
        }
    }

    pub fn prim_id(self) -> i32 {
        !self.code()
    }
}

/// Per-lamp-type geometry inputs to `LightTreePrimitive::from_lamp`.
/// Each variant carries exactly the fields its type's bbox/cone formula
/// needs; fields that don't apply to a type (e.g. a spot's cone axes for a
/// point light) simply aren't representable, rather than being `Option`
/// fields shared across all five.
pub enum LampGeometry {
    Area {
        origin: Vec3f,
        axis: Vec3f,
        corners: [Vec3f; 4],
        spread: f32,
    },
    Point {
        origin: Vec3f,
        size: f32,
    },
    Spot {
        origin: Vec3f,
        dir: Vec3f,
        axis_u: Vec3f,
        axis_v: Vec3f,
        spot_angle: f32,
        size: f32,
    },
    Background {
        average_radiance: f32,
    },
    Distant {
        dir: Vec3f,
        angle: f32,
    },
}

#[derive(Clone, Copy, Debug)]
pub struct LightTreePrimitive {
    pub object_id: u32,
    pub prim_id: i32,
    pub centroid: Vec3f,
    pub measure: PrimitiveMeasure,
}

fn mean_abs(a: Vec3f, b: Vec3f) -> f32 {
    let p = a * b;
    ((p.x + p.y + p.z) / 3.0).abs()
}

fn mean(v: Vec3f) -> f32 {
    (v.x + v.y + v.z) / 3.0
}

impl LightTreePrimitive {
    /// A triangle emitter: `object_id`/`prim_id` identify the mesh
    /// triangle this measure was built from; `prim_id` is expected to be
    /// non-negative, distinguishing it from a lamp's `!(kind)` encoding.
    /// Returns `None` for the degenerate case (zero energy, no spatial
    /// extent) — never for a merely zero-area triangle, which still has a
    /// non-empty (degenerate) bbox and is kept.
    pub fn triangle(
        object_id: u32,
        prim_id: u32,
        v0: Vec3f,
        v1: Vec3f,
        v2: Vec3f,
        emission_estimate: Vec3f,
        double_sided: bool,
        back_only_emission: bool,
        negative_scale: bool,
    ) -> Option<Self> {
        let normal = (v1 - v0).cross(v2 - v0);
        let area = normal.length() * 0.5;
        let energy = area * mean(emission_estimate).abs();
        let centroid = (v0 + v1 + v2).scale(1.0 / 3.0);

        let flip = back_only_emission ^ negative_scale;
        let axis = if normal.length2() > 0.0 {
            let n = normal.normalize();
            if flip {
                -n
            } else {
                n
            }
        } else {
            Vec3f::zero()
        };
        let theta_o = if double_sided { FRAC_PI_2 } else { 0.0 };
        let theta_e = FRAC_PI_2;

        let bbox = BBox3f::from_pnt(v0).combine_pnt(v1).combine_pnt(v2);
        let measure = PrimitiveMeasure {
            bbox,
            bcone: OrientationCone::new(axis, theta_o, theta_e),
            energy,
        };
        if measure.is_degenerate() {
            log::debug!(
                "light primitive: dropping degenerate triangle (object {}, prim {})",
                object_id,
                prim_id
            );
            return None;
        }

        Some(LightTreePrimitive {
            object_id,
            prim_id: prim_id as i32,
            centroid,
            measure,
        })
    }

    /// A lamp emitter. `strength` and `emission_estimate` feed the
    /// general `|mean(strength * emission_estimate)|` energy rule; each
    /// variant then applies its own additional scale (or, for `Background`,
    /// replaces the rule entirely with `pi * average_radiance`, since a
    /// background has no mesh-side emission estimate to average against).
    pub fn from_lamp(object_id: u32, geometry: LampGeometry, strength: Vec3f, emission_estimate: Vec3f) -> Option<Self> {
        let base_energy = mean_abs(strength, emission_estimate);

        let (kind, centroid, axis, theta_o, theta_e, bbox, energy) = match geometry {
            LampGeometry::Area { origin, axis, corners, spread } => {
                let bbox = corners.iter().fold(BBox3f::new(), |b, &c| b.combine_pnt(c));
                (LampKind::Area, origin, axis, 0.0, spread * 0.5, bbox, base_energy * 0.25)
            }
            LampGeometry::Point { origin, size } => {
                let half = Vec3f { x: size, y: size, z: size };
                let bbox = BBox3f::from_pnts(origin - half, origin + half);
                (
                    LampKind::Point,
                    origin,
                    Vec3f { x: 0.0, y: 0.0, z: 1.0 },
                    PI,
                    FRAC_PI_2,
                    bbox,
                    base_energy / (4.0 * PI),
                )
            }
            LampGeometry::Spot {
                origin,
                dir,
                axis_u,
                axis_v,
                spot_angle,
                size,
            } => {
                let dir_len = dir.length();
                let spread = axis_u.length().max(axis_v.length());
                let theta_e = if dir_len > 0.0 {
                    ((spot_angle * 0.5).tan() * spread / dir_len).atan()
                } else {
                    0.0
                };
                let half = Vec3f { x: size, y: size, z: size };
                let bbox = BBox3f::from_pnts(origin - half, origin + half);
                let axis = if dir_len > 0.0 { dir.scale(1.0 / dir_len) } else { Vec3f { x: 0.0, y: 0.0, z: 1.0 } };
                (LampKind::Spot, origin, axis, 0.0, theta_e, bbox, base_energy / (4.0 * PI))
            }
            LampGeometry::Background { average_radiance } => (
                LampKind::Background,
                Vec3f::zero(),
                Vec3f { x: 0.0, y: 0.0, z: 1.0 },
                PI,
                0.0,
                BBox3f::new(),
                PI * average_radiance,
            ),
            LampGeometry::Distant { dir, angle } => {
                let dir_len = dir.length();
                let axis = if dir_len > 0.0 { dir.scale(1.0 / dir_len) } else { dir };
                (LampKind::Distant, Vec3f::zero(), axis, 0.0, angle * 0.5, BBox3f::new(), base_energy)
            }
        };

        let measure = PrimitiveMeasure {
            bbox,
            bcone: OrientationCone::new(axis, theta_o, theta_e),
            energy: energy.abs(),
        };
        if measure.is_degenerate() {
            log::debug!("light primitive: dropping degenerate lamp (object {}, kind {:?})", object_id, kind);
            return None;
        }

        Some(LightTreePrimitive {
            object_id,
            prim_id: kind.prim_id(),
            centroid,
            measure,
        })
    }
}
