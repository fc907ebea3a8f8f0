// Typed failure surface for the two public entry points, `split_patches`
// and `LightTree::new`, and for everything they call internally. Every
// fallible path in this crate already has a natural `BuildError` variant,
// so there's no separate internal "fail with a message" convention here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("allocation failure: {0}")]
    Allocation(String),

    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type BuildResult<T> = Result<T, BuildError>;
