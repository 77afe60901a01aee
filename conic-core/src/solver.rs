//! Solver boundary.
//!
//! The numerical method lives outside this crate. A [`ConicSolver`] reports
//! which cone types it accepts and, when asked to solve, writes the solution
//! into the program's variable values before returning.

use std::fmt;
use std::time::Instant;

use crate::cones::ConeTypeSet;
use crate::error::{ProgramError, ProgramResult};
use crate::program::ConicProgram;
use crate::standard_form::StandardForm;

/// Solution status reported by a solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Optimal solution found
    Optimal,

    /// Meets reduced accuracy thresholds
    AlmostOptimal,

    /// Primal problem is infeasible
    PrimalInfeasible,

    /// Dual problem is infeasible (primal unbounded)
    DualInfeasible,

    /// Maximum iterations reached
    MaxIters,

    /// Time limit reached
    TimeLimit,

    /// Numerical error encountered
    NumericalError,
}

impl SolveStatus {
    /// Returns true if the variable values are a usable solution.
    pub fn has_solution(&self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::AlmostOptimal)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "Optimal"),
            SolveStatus::AlmostOptimal => write!(f, "AlmostOptimal"),
            SolveStatus::PrimalInfeasible => write!(f, "Primal Infeasible"),
            SolveStatus::DualInfeasible => write!(f, "Dual Infeasible"),
            SolveStatus::MaxIters => write!(f, "MaxIters"),
            SolveStatus::TimeLimit => write!(f, "Time Limit"),
            SolveStatus::NumericalError => write!(f, "Numerical Error"),
        }
    }
}

/// Summary of one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveInfo {
    /// Solution status
    pub status: SolveStatus,

    /// Objective value at the returned point
    pub obj_val: f64,

    /// Total solve time (milliseconds)
    pub solve_time_ms: u64,
}

/// Solver attached to a conic program.
pub trait ConicSolver {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Cone types this solver accepts.
    fn supported_cones(&self) -> ConeTypeSet;

    /// True if every type in `types` is accepted.
    fn supports_cone_types(&self, types: ConeTypeSet) -> bool {
        self.supported_cones().contains_all(types)
    }

    /// Minimize the program. Blocks until done; on return the solution is
    /// available through [`ConicProgram::value`].
    fn solve(&mut self, program: &mut ConicProgram) -> ProgramResult<SolveInfo>;
}

/// Solver that hands the canonical standard form to an external routine.
///
/// The routine receives the assembled [`StandardForm`] and returns a status
/// and a primal vector with one entry per column.
pub struct StandardFormSolver<F> {
    name: String,
    cones: ConeTypeSet,
    backend: F,
}

impl<F> StandardFormSolver<F>
where
    F: FnMut(&StandardForm) -> ProgramResult<(SolveStatus, Vec<f64>)>,
{
    /// Wrap a backend routine. Rotated cones are exported as rotated plain
    /// second-order cones, so every cone type is accepted by default.
    pub fn new(name: impl Into<String>, backend: F) -> Self {
        Self {
            name: name.into(),
            cones: ConeTypeSet::all(),
            backend,
        }
    }

    /// Restrict the advertised cone types.
    pub fn with_cones(mut self, cones: ConeTypeSet) -> Self {
        self.cones = cones;
        self
    }
}

impl<F> ConicSolver for StandardFormSolver<F>
where
    F: FnMut(&StandardForm) -> ProgramResult<(SolveStatus, Vec<f64>)>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_cones(&self) -> ConeTypeSet {
        self.cones
    }

    fn solve(&mut self, program: &mut ConicProgram) -> ProgramResult<SolveInfo> {
        let start = Instant::now();

        let form = program.to_standard_form()?;
        form.validate()?;

        let (status, x) = (self.backend)(&form)
            .map_err(|e| ProgramError::SolverFailed(format!("{}: {}", self.name, e)))?;
        program.load_solution(&form, &x)?;

        Ok(SolveInfo {
            status,
            obj_val: form.objective(&x),
            solve_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cones::ConeType;
    use crate::program::ConstraintSense;

    #[test]
    fn test_standard_form_solver_round_trip() {
        let mut program = ConicProgram::new();
        let x = program.create_nonnegative_variable();
        program.set_objective_coefficient(x, 3.0).unwrap();
        let con = program.create_constraint_with(ConstraintSense::GreaterEqual);
        program.set_variable(con, x, 1.0).unwrap();
        program.set_rhs(con, 0.5).unwrap();

        let mut solver = StandardFormSolver::new("fixed", |form: &StandardForm| {
            assert_eq!(form.num_vars(), 1);
            Ok((SolveStatus::Optimal, vec![0.5]))
        });

        let info = solver.solve(&mut program).unwrap();
        assert_eq!(info.status, SolveStatus::Optimal);
        assert!((info.obj_val - 1.5).abs() < 1e-12);
        assert!((program.value(x).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_capabilities() {
        let solver = StandardFormSolver::new("soc-only", |_: &StandardForm| {
            Ok((SolveStatus::Optimal, Vec::new()))
        })
        .with_cones(ConeTypeSet::linear_and_soc());

        assert!(solver.supports_cone_types(ConeTypeSet::only(ConeType::SecondOrderCone)));
        assert!(!solver.supports_cone_types(ConeTypeSet::only(ConeType::RotatedSecondOrderCone)));
    }

    #[test]
    fn test_backend_failure_is_reported() {
        let mut program = ConicProgram::new();
        program.create_nonnegative_variable();

        let mut solver = StandardFormSolver::new("broken", |_: &StandardForm| {
            Err(ProgramError::SolverFailed("factorization failed".to_string()))
        });
        assert!(matches!(
            solver.solve(&mut program),
            Err(ProgramError::SolverFailed(_))
        ));
    }
}
