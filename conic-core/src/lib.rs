//! Conic program model.
//!
//! This crate provides the mutable problem representation that the reasoner
//! compiles rules into:
//!
//! - **Cones**: nonnegative orthant, second-order and rotated second-order
//!   cones, each owning a fixed, ordered group of variables
//! - **Variables**: objective coefficient and (solved) value per variable
//! - **Linear constraints**: `Σ aⱼ xⱼ (= | ≤ | ≥) b`, editable in place
//!
//! Objects are created and deleted individually through generational handles,
//! which is what makes incremental maintenance of a large program cheap.
//! Solvers plug in through [`ConicSolver`]; the canonical standard form
//!
//! ```text
//! minimize    qᵀx
//! subject to  A x + s = b,  s ∈ K
//! ```
//!
//! is available through [`ConicProgram::to_standard_form`].
//!
//! # Example
//!
//! ```
//! use conic_core::{ConicProgram, ConstraintSense};
//!
//! // min x  s.t.  x >= 0.25,  x >= 0
//! let mut program = ConicProgram::new();
//! let x = program.create_nonnegative_variable();
//! program.set_objective_coefficient(x, 1.0)?;
//!
//! let con = program.create_constraint_with(ConstraintSense::GreaterEqual);
//! program.set_variable(con, x, 1.0)?;
//! program.set_rhs(con, 0.25)?;
//!
//! let form = program.to_standard_form()?;
//! assert_eq!(form.num_vars(), 1);
//! # Ok::<(), conic_core::ProgramError>(())
//! ```

#![warn(clippy::all)]

pub mod cones;
pub mod error;
pub mod program;
pub mod solver;
pub mod sparse;
pub mod standard_form;

pub use cones::{ConeType, ConeTypeSet};
pub use error::{ProgramError, ProgramResult};
pub use program::{ConeId, ConicProgram, ConstraintId, ConstraintSense, VarId};
pub use solver::{ConicSolver, SolveInfo, SolveStatus, StandardFormSolver};
pub use standard_form::{ConeSpec, StandardForm};
