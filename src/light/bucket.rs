// The incremental measure accumulator the cost scan folds primitives into.
// Grounded on the `Bucket`/cost-scan half of
// examples/DennisVanEe-rust_prism/src/bvh.rs's `recursive_construct_tree`
// (`BUCKET_COUNT = 12` there is the same constant as `NUM_BUCKETS` here),
// generalized from a pure surface-area cost to an
// energy * cone-measure * surface-area product.

use crate::cone::OrientationConef;
use crate::math::bbox::BBox3f;

/// `{bbox, bcone, energy}` for one primitive, one bucket, or a union of
/// either (`LightTreePrimitive::measure` generalized to any subset).
#[derive(Clone, Copy, Debug)]
pub struct PrimitiveMeasure {
    pub bbox: BBox3f,
    pub bcone: OrientationConef,
    pub energy: f32,
}

impl PrimitiveMeasure {
    pub fn empty() -> Self {
        PrimitiveMeasure {
            bbox: BBox3f::new(),
            bcone: OrientationConef::Empty,
            energy: 0.0,
        }
    }

    pub fn union(self, other: Self) -> Self {
        PrimitiveMeasure {
            bbox: self.bbox.combine_bnd(other.bbox),
            bcone: self.bcone.merge(other.bcone),
            energy: self.energy + other.energy,
        }
    }

    /// `energy * bcone.measure() * bbox.area()`; an empty bbox contributes
    /// nothing regardless of energy (a degenerate bucket should never look
    /// attractive to split toward).
    pub fn cost(self) -> f32 {
        if self.bbox.is_empty() {
            return 0.0;
        }
        self.energy * self.bcone.measure() * self.bbox.surface_area()
    }

    /// Whether this measure would be dropped as a degenerate primitive:
    /// exactly zero energy with no spatial extent at all.
    pub fn is_degenerate(self) -> bool {
        self.energy == 0.0 && self.bbox.is_empty()
    }
}

/// One SAOH cost-scan bucket: how many primitives landed in it, and their
/// combined measure.
#[derive(Clone, Copy, Debug)]
pub struct LightTreeBucket {
    pub count: u32,
    pub measure: PrimitiveMeasure,
}

impl LightTreeBucket {
    pub fn empty() -> Self {
        LightTreeBucket {
            count: 0,
            measure: PrimitiveMeasure::empty(),
        }
    }

    pub fn union(self, other: Self) -> Self {
        LightTreeBucket {
            count: self.count + other.count,
            measure: self.measure.union(other.measure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::vector::Vec3f;

    #[test]
    fn empty_measure_has_zero_cost() {
        assert_eq!(PrimitiveMeasure::empty().cost(), 0.0);
        assert!(PrimitiveMeasure::empty().is_degenerate());
    }

    #[test]
    fn union_sums_energy_and_grows_bbox() {
        let a = PrimitiveMeasure {
            bbox: BBox3f::from_pnt(Vec3f { x: 0.0, y: 0.0, z: 0.0 }),
            bcone: OrientationConef::new(Vec3f { x: 0.0, y: 0.0, z: 1.0 }, 0.1, 0.1),
            energy: 1.0,
        };
        let b = PrimitiveMeasure {
            bbox: BBox3f::from_pnt(Vec3f { x: 2.0, y: 0.0, z: 0.0 }),
            bcone: OrientationConef::new(Vec3f { x: 0.0, y: 0.0, z: 1.0 }, 0.1, 0.1),
            energy: 3.0,
        };
        let u = a.union(b);
        assert_eq!(u.energy, 4.0);
        assert_eq!(u.bbox.pmax.x, 2.0);
        assert!(!u.is_degenerate());
    }
}
