//! Incremental compilation of hinge-loss rules into a conic program.
//!
//! Weighted rules `w · max(l₁, …, lₖ)` and their squared variants become
//! epigraph variables, piece constraints and (for squares) second-order
//! cones; hard rules become linear constraints. The [`TermStore`] keeps one
//! proxy per rule so that weight changes, rule changes and removals touch
//! only the affected program objects, never the whole program.
//!
//! # Example
//!
//! ```
//! use conic_core::{ConeTypeSet, SolveStatus, StandardForm, StandardFormSolver};
//! use conic_reasoner::{
//!     AtomStore, ConicReasoner, ConicTermGenerator, FunctionTerm, GroundRule,
//!     GroundRuleStore, LinearSum, TermStore, TermStoreSettings,
//! };
//!
//! let mut atoms = AtomStore::new();
//! let a = atoms.add_random("A", 0.3);
//!
//! // 2 · max(1 - A, 0)²
//! let mut rules = GroundRuleStore::new();
//! rules.add(GroundRule::weighted(
//!     2.0,
//!     FunctionTerm::squared_hinge(LinearSum::constant(1.0).with_atom(-1.0, a)),
//! ));
//!
//! let solver = StandardFormSolver::new("fixed", |form: &StandardForm| {
//!     Ok((SolveStatus::Optimal, vec![1.0; form.num_vars()]))
//! })
//! .with_cones(ConeTypeSet::linear_and_soc());
//! let mut store = TermStore::with_solver(solver, TermStoreSettings::default());
//!
//! let count = ConicTermGenerator::new().generate_terms(&rules, &mut store, &atoms)?;
//! assert_eq!(count, 1);
//!
//! ConicReasoner::new().optimize(&mut store, &mut atoms)?;
//! assert_eq!(atoms.value(a)?, 1.0);
//! # Ok::<(), conic_reasoner::ReasonerError>(())
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod generator;
pub mod model;
pub mod proxy;
pub mod reasoner;
pub mod settings;
pub mod term_store;

pub use error::{ReasonerError, ReasonerResult};
pub use generator::ConicTermGenerator;
pub use model::{
    Atom, AtomId, AtomKind, AtomStore, Comparator, ConstraintTerm, FunctionTerm, GroundRule,
    GroundRuleStore, LinearSum, RuleId,
};
pub use proxy::{ConstraintProxy, FeatureStructure, FunctionProxy, Proxy, VariableProxy};
pub use reasoner::ConicReasoner;
pub use settings::TermStoreSettings;
pub use term_store::TermStore;
