// Orientation bounds for a set of emitters: an axis plus two half-angles,
// used by the light tree's SAOH cost metric to keep tightly-directed
// emitters from being grouped with ones pointing the other way.
//
// Grounded on `OrientationBounds`/`merge`/`calculate_measure` in Cycles'
// light_tree.h/.cpp. The `FLT_MIN` sentinel smuggled into a float there is
// replaced with a tagged enum: `Cone::Empty` is a real variant rather than a
// magic `theta_o == theta_e == -inf` value, so `is_empty` and `merge` become
// a match instead of a float comparison.

use crate::math::numbers::Float;
use crate::math::vector::Vec3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OrientationCone<T: Float> {
    Empty,
    Valid {
        axis: Vec3<T>,
        theta_o: T,
        theta_e: T,
    },
}

pub type OrientationConef = OrientationCone<f32>;

impl<T: Float> OrientationCone<T> {
    pub fn new(axis: Vec3<T>, theta_o: T, theta_e: T) -> Self {
        OrientationCone::Valid {
            axis,
            theta_o,
            theta_e,
        }
    }

    pub fn is_empty(self) -> bool {
        matches!(self, OrientationCone::Empty)
    }

    // Solid-angle proxy used by the SAOH cost metric; empty cones
    // contribute nothing to a bucket's cost.
    pub fn measure(self) -> T {
        let (theta_o, theta_e) = match self {
            OrientationCone::Empty => return T::zero(),
            OrientationCone::Valid { theta_o, theta_e, .. } => (theta_o, theta_e),
        };

        let theta_w = if theta_o + theta_e < T::PI {
            theta_o + theta_e
        } else {
            T::PI
        };
        let cos_theta_o = theta_o.cos();
        let sin_theta_o = theta_o.sin();

        T::two() * T::PI * (T::one() - cos_theta_o)
            + T::PI_OVER_2
                * (T::two() * theta_w * sin_theta_o - (theta_o - T::two() * theta_w).cos()
                    - T::two() * theta_o * sin_theta_o
                    + cos_theta_o)
    }

    // Merges two cones into one that conservatively contains both: every
    // (normal, emission-direction) pair admissible under either input is
    // admissible under the result.
    pub fn merge(self, other: Self) -> Self {
        let (a, b) = match (self, other) {
            (OrientationCone::Empty, _) => return other,
            (_, OrientationCone::Empty) => return self,
            (a, b) => (a, b),
        };

        // Rebind so `a` always carries the larger theta_o.
        let (a_axis, a_theta_o, a_theta_e) = a.unpack();
        let (b_axis, b_theta_o, b_theta_e) = b.unpack();
        let (a_axis, a_theta_o, b_axis, b_theta_o) = if b_theta_o > a_theta_o {
            (b_axis, b_theta_o, a_axis, a_theta_o)
        } else {
            (a_axis, a_theta_o, b_axis, b_theta_o)
        };

        let theta_e = if a_theta_e > b_theta_e { a_theta_e } else { b_theta_e };

        let cos_axes = clamp(a_axis.dot(b_axis), -T::one(), T::one());
        let theta_d = cos_axes.acos();

        let bound = if theta_d + b_theta_o < T::PI {
            theta_d + b_theta_o
        } else {
            T::PI
        };
        if a_theta_o >= bound {
            return OrientationCone::new(a_axis, a_theta_o, theta_e);
        }

        let theta_o = (theta_d + a_theta_o + b_theta_o) * T::half();
        if theta_o >= T::PI {
            return OrientationCone::new(a_axis, T::PI, theta_e);
        }

        let theta_r = theta_o - a_theta_o;
        let rot_axis = a_axis.cross(b_axis);
        let new_axis = if rot_axis.length2() > T::zero() {
            rotate_around_axis(a_axis, rot_axis.normalize(), theta_r).normalize()
        } else {
            a_axis
        };

        OrientationCone::new(new_axis, theta_o, theta_e)
    }

    fn unpack(self) -> (Vec3<T>, T, T) {
        match self {
            OrientationCone::Empty => (Vec3::zero(), T::zero(), T::zero()),
            OrientationCone::Valid {
                axis,
                theta_o,
                theta_e,
            } => (axis, theta_o, theta_e),
        }
    }
}

fn clamp<T: PartialOrd>(v: T, lo: T, hi: T) -> T {
    if v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    }
}

// Rodrigues' rotation formula: rotates `v` around the unit `axis` by `theta`.
fn rotate_around_axis<T: Float>(v: Vec3<T>, axis: Vec3<T>, theta: T) -> Vec3<T> {
    let cos_t = theta.cos();
    let sin_t = theta.sin();
    v.scale(cos_t) + axis.cross(v).scale(sin_t) + axis.scale(axis.dot(v) * (T::one() - cos_t))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(x: f32, y: f32, z: f32) -> Vec3<f32> {
        Vec3 { x, y, z }.normalize()
    }

    #[test]
    fn merge_with_empty_is_identity() {
        let a = OrientationConef::new(axis(0.0, 0.0, 1.0), 0.3, 0.1);
        let merged = a.merge(OrientationConef::Empty);
        assert_eq!(merged, a);
        let merged = OrientationConef::Empty.merge(a);
        assert_eq!(merged, a);
    }

    #[test]
    fn merge_is_commutative_in_angles() {
        let a = OrientationConef::new(axis(1.0, 0.0, 0.0), 0.2, 0.3);
        let b = OrientationConef::new(axis(0.0, 1.0, 0.0), 0.5, 0.1);

        let (_, ab_o, ab_e) = a.merge(b).unpack();
        let (_, ba_o, ba_e) = b.merge(a).unpack();

        assert!((ab_o - ba_o).abs() < 1e-5);
        assert!((ab_e - ba_e).abs() < 1e-5);
    }

    #[test]
    fn merge_of_identical_cones_is_unchanged() {
        let a = OrientationConef::new(axis(0.0, 0.0, 1.0), 0.4, 0.2);
        let merged = a.merge(a);
        let (axis_m, theta_o, theta_e) = merged.unpack();
        assert!((theta_o - 0.4).abs() < 1e-5);
        assert!((theta_e - 0.2).abs() < 1e-5);
        assert!((axis_m.dot(axis(0.0, 0.0, 1.0)) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn empty_measure_is_zero() {
        assert_eq!(OrientationConef::Empty.measure(), 0.0);
    }

    #[test]
    fn point_light_measure_matches_full_sphere_bound() {
        // theta_o = PI, theta_e = PI/2, as produced for a point light.
        let cone = OrientationConef::new(axis(0.0, 0.0, 1.0), std::f32::consts::PI, std::f32::consts::FRAC_PI_2);
        let m = cone.measure();
        assert!(m > 0.0);
    }
}
