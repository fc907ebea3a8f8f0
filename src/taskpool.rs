// A minimal fork/join primitive for the light tree builder, built on
// `crossbeam`'s scoped-thread API — a "rayon-style scope" standing in for a
// persistent N-1-thread pool.
//
// Every recursive light tree build step needs both of its children's
// results before it can return (the cost/measure fold over a primitive
// range only completes once the subtree under it exists), so push-then-wait
// collapses at each call site into one fork (spawn the left half) plus one
// join (run the right half inline, then block on the spawned handle) rather
// than a general work queue. `fork_join` below is that fused push/wait
// pair; exceptions are fatal to the pool (a panic on either side propagates
// as a `BuildError::InvariantViolation`, never silently drops the subtree).

use crossbeam::thread::Scope;

use crate::error::{BuildError, BuildResult};

pub struct TaskPool<'scope, 'env> {
    scope: &'scope Scope<'env>,
}

impl<'scope, 'env> TaskPool<'scope, 'env> {
    pub fn new(scope: &'scope Scope<'env>) -> Self {
        TaskPool { scope }
    }

    /// Runs `a` on a freshly spawned thread while `b` runs inline, then
    /// blocks for `a`'s result: one pushed task, awaited before this call
    /// returns, at the granularity each recursive build step actually needs.
    pub fn fork_join<FA, FB, RA, RB>(&self, a: FA, b: FB) -> BuildResult<(RA, RB)>
    where
        FA: FnOnce() -> BuildResult<RA> + Send + 'env,
        RA: Send + 'env,
        FB: FnOnce() -> BuildResult<RB>,
    {
        let handle = self.scope.spawn(move |_| a());
        let b_result = b();
        let a_result = handle
            .join()
            .map_err(|_| BuildError::InvariantViolation("light tree build task panicked".to_string()))?;
        Ok((a_result?, b_result?))
    }
}
