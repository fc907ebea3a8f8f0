// Build-time tunables for the two cores, grouped into small `Copy` structs
// rather than threaded through every recursive call as loose arguments.
// Each is validated once, at construction, instead of re-checked on every
// recursion.

use crate::error::{BuildError, BuildResult};

/// Number of parametric samples taken along an edge when estimating its
/// world-space (or raster-space) length in `T()`.
pub const DEFAULT_TEST_STEPS: u32 = 5;

/// `DSPLIT_MAX_DEPTH`: recursion below `DSPLIT_MAX_DEPTH - 2` is
/// depth-guarded.
pub const DSPLIT_MAX_DEPTH: i32 = 32;

/// `DSPLIT_MAX_SEGMENTS`: the per-edge segment count the depth guard
/// clamps to once the recursion runs too deep.
pub const DSPLIT_MAX_SEGMENTS: i32 = 8;

/// Number of cost buckets scanned per dimension in the light tree build.
pub const NUM_BUCKETS: usize = 12;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiagSplitParams {
    /// Target edge length: pixels when a camera is attached, world units
    /// otherwise.
    pub dicing_rate: f32,
    /// `T_max - T_min` above which an edge is declared non-uniform.
    pub split_threshold: f32,
    /// `max_t = 1 << max_level` bounds how many segments a single edge may
    /// ever carry, scaled by the edge's own parametric length.
    pub max_level: u32,
    /// Number of samples taken along an edge when measuring its length.
    pub test_steps: u32,
}

impl Default for DiagSplitParams {
    fn default() -> Self {
        DiagSplitParams {
            dicing_rate: 1.0,
            split_threshold: 1.0,
            max_level: 10,
            test_steps: DEFAULT_TEST_STEPS,
        }
    }
}

impl DiagSplitParams {
    pub fn validate(&self) -> BuildResult<()> {
        if !(self.dicing_rate > 0.0) {
            return Err(BuildError::DegenerateInput(format!(
                "dicing_rate must be positive, got {}",
                self.dicing_rate
            )));
        }
        if !(self.split_threshold >= 0.0) {
            return Err(BuildError::DegenerateInput(format!(
                "split_threshold must be non-negative, got {}",
                self.split_threshold
            )));
        }
        if self.test_steps < 2 {
            return Err(BuildError::DegenerateInput(format!(
                "test_steps must be at least 2, got {}",
                self.test_steps
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightTreeBuildParams {
    /// A node with this many primitives or fewer is always eligible to
    /// become a leaf once the SAOH scan says splitting isn't worth it.
    pub max_lights_in_leaf: usize,
    /// A partition half below this size recurses on the calling thread
    /// instead of being handed to the task pool.
    pub min_prims_per_thread: usize,
}

impl Default for LightTreeBuildParams {
    fn default() -> Self {
        LightTreeBuildParams {
            max_lights_in_leaf: 4,
            min_prims_per_thread: 4096,
        }
    }
}

impl LightTreeBuildParams {
    pub fn validate(&self) -> BuildResult<()> {
        if self.max_lights_in_leaf == 0 {
            return Err(BuildError::DegenerateInput(
                "max_lights_in_leaf must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_validate() {
        assert!(DiagSplitParams::default().validate().is_ok());
        assert!(LightTreeBuildParams::default().validate().is_ok());
    }

    #[test]
    fn zero_dicing_rate_is_degenerate() {
        let p = DiagSplitParams {
            dicing_rate: 0.0,
            ..DiagSplitParams::default()
        };
        assert!(matches!(p.validate(), Err(BuildError::DegenerateInput(_))));
    }

    #[test]
    fn zero_max_lights_in_leaf_is_degenerate() {
        let p = LightTreeBuildParams {
            max_lights_in_leaf: 0,
            ..LightTreeBuildParams::default()
        };
        assert!(matches!(p.validate(), Err(BuildError::DegenerateInput(_))));
    }
}
