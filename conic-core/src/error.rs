//! Error types for the conic program model.

use thiserror::Error;

use crate::cones::ConeType;

/// Errors raised by [`ConicProgram`](crate::ConicProgram) edits and solvers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProgramError {
    /// A handle refers to a cone, variable or constraint that was deleted.
    #[error("Stale {kind} handle: slot {index}, generation {generation}")]
    StaleHandle {
        /// Kind of object the handle points at.
        kind: &'static str,
        /// Arena slot.
        index: usize,
        /// Generation stored in the handle.
        generation: u32,
    },

    /// Requested cone size is not valid for the cone type.
    #[error("{cone_type} cannot have {size} variables (minimum {min})")]
    InvalidConeSize {
        /// Requested cone type.
        cone_type: ConeType,
        /// Requested number of variables.
        size: usize,
        /// Smallest admissible size.
        min: usize,
    },

    /// A cone was deleted while one of its variables is still constrained.
    #[error("Variable {variable} of the deleted cone still appears in {constraints} constraint(s)")]
    VariableInUse {
        /// Arena slot of the variable.
        variable: usize,
        /// Number of live constraints referencing it.
        constraints: usize,
    },

    /// Exported problem data is inconsistent.
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// The attached solver failed.
    #[error("Solver failed: {0}")]
    SolverFailed(String),
}

/// Result type for program operations.
pub type ProgramResult<T> = Result<T, ProgramError>;
