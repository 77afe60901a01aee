//! MAP inference over a compiled term store.

use std::time::Instant;

use conic_core::{SolveInfo, SolveStatus};

use crate::error::ReasonerResult;
use crate::model::AtomStore;
use crate::term_store::TermStore;

/// Solves the term store's program and writes the result back to the atoms.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConicReasoner;

impl ConicReasoner {
    pub fn new() -> Self {
        Self
    }

    /// Solve and copy the optimum into the random-variable atoms.
    ///
    /// Whatever point the solver returned is written back; a status other
    /// than optimal is only logged.
    pub fn optimize(&self, store: &mut TermStore, atoms: &mut AtomStore) -> ReasonerResult<SolveInfo> {
        let start = Instant::now();
        let info = store.solve()?;

        if info.status != SolveStatus::Optimal {
            log::warn!("Solver {} finished with status {}", store.solver_name(), info.status);
        }
        store.update_atoms(atoms)?;

        if store.settings().verbose {
            log::info!(
                "Optimized {} terms: status={}, objective={:.6e}, time={:.1}ms",
                store.size(),
                info.status,
                info.obj_val,
                start.elapsed().as_secs_f64() * 1000.0
            );
        }
        Ok(info)
    }
}
