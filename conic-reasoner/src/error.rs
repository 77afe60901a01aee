//! Error types for the reasoner.

use conic_core::ProgramError;
use thiserror::Error;

use crate::model::{AtomId, RuleId};

/// Errors raised while compiling rules into the conic program.
///
/// All of these are contract violations: nothing is retried internally and
/// the enclosing operation is abandoned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReasonerError {
    /// The proxy stored for a rule is not the variant the operation needs.
    #[error("Rule {rule}: expected a {expected} proxy, found a {found} proxy")]
    ProxyMismatch {
        rule: RuleId,
        expected: &'static str,
        found: &'static str,
    },

    /// The rule handed in is of a different kind than the proxy stored for it.
    #[error("Rule {rule}: a {rule_kind} rule does not match the stored {proxy_kind} proxy")]
    RuleKindMismatch {
        rule: RuleId,
        rule_kind: &'static str,
        proxy_kind: &'static str,
    },

    /// The proxy was built against a different term store's program.
    #[error("Rule {rule}: proxy belongs to program {found}, not {expected}")]
    ForeignProxy { rule: RuleId, expected: u64, found: u64 },

    /// A decision variable was requested for an observed atom.
    #[error("Atom {0} is observed and has no decision variable")]
    ObservedAtom(AtomId),

    /// Structural build requested on a proxy that is already built.
    #[error("Function proxy for rule {0} has already been initialized")]
    AlreadyInitialized(RuleId),

    /// The potential contains a node that has no conic reformulation.
    #[error("Unsupported function term: {0}")]
    UnsupportedTerm(String),

    /// The rule was never added to the term store.
    #[error("Rule not found: {0}")]
    RuleNotFound(RuleId),

    /// The atom id does not exist in the atom store.
    #[error("Unknown atom: {0}")]
    UnknownAtom(AtomId),

    /// The rule already has a proxy in the term store.
    #[error("Rule {0} has already been added")]
    DuplicateRule(RuleId),

    /// Weights must be finite and nonnegative.
    #[error("Rule {rule}: invalid weight {weight}")]
    InvalidWeight { rule: RuleId, weight: f64 },

    /// Error from the conic program or the attached solver.
    #[error(transparent)]
    Program(#[from] ProgramError),
}

/// Result type for reasoner operations.
pub type ReasonerResult<T> = Result<T, ReasonerError>;
