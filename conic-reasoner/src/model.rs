//! Ground rules and atoms.
//!
//! These types are the boundary with the grounding layer: atoms carry a
//! truth value in [0, 1] and are either observed (constants) or random
//! variables (decision variables of the program); ground rules are either
//! weighted hinge-loss potentials or hard linear constraints over atoms.

use std::fmt;

use conic_core::ConstraintSense;

use crate::error::{ReasonerError, ReasonerResult};

/// Identity of an atom in an [`AtomStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomId(pub usize);

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

/// Identity of a rule in a [`GroundRuleStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub usize);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomKind {
    /// Fixed value; folds into constants.
    Observed,
    /// Free value; backed by a decision variable.
    RandomVariable,
}

/// A ground logical proposition with a continuous truth value.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    name: String,
    value: f64,
    kind: AtomKind,
}

impl Atom {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn kind(&self) -> AtomKind {
        self.kind
    }

    pub fn is_observed(&self) -> bool {
        self.kind == AtomKind::Observed
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Owner of all atoms referenced by a rule set.
#[derive(Debug, Clone, Default)]
pub struct AtomStore {
    atoms: Vec<Atom>,
}

impl AtomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observed atom with a fixed value.
    pub fn add_observed(&mut self, name: impl Into<String>, value: f64) -> AtomId {
        self.push(name.into(), value, AtomKind::Observed)
    }

    /// Add a random-variable atom with an initial value.
    pub fn add_random(&mut self, name: impl Into<String>, value: f64) -> AtomId {
        self.push(name.into(), value, AtomKind::RandomVariable)
    }

    fn push(&mut self, name: String, value: f64, kind: AtomKind) -> AtomId {
        self.atoms.push(Atom { name, value, kind });
        AtomId(self.atoms.len() - 1)
    }

    pub fn get(&self, id: AtomId) -> ReasonerResult<&Atom> {
        self.atoms.get(id.0).ok_or(ReasonerError::UnknownAtom(id))
    }

    pub fn get_mut(&mut self, id: AtomId) -> ReasonerResult<&mut Atom> {
        self.atoms.get_mut(id.0).ok_or(ReasonerError::UnknownAtom(id))
    }

    pub fn value(&self, id: AtomId) -> ReasonerResult<f64> {
        Ok(self.get(id)?.value)
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.atoms.iter().enumerate().map(|(i, a)| (AtomId(i), a))
    }
}

/// Linear combination `Σ coefᵢ·atomᵢ + constant`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinearSum {
    summands: Vec<(f64, AtomId)>,
    constant: f64,
}

impl LinearSum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum with no atoms.
    pub fn constant(value: f64) -> Self {
        Self {
            summands: Vec::new(),
            constant: value,
        }
    }

    /// Builder form of [`LinearSum::add_atom`].
    pub fn with_atom(mut self, coefficient: f64, atom: AtomId) -> Self {
        self.add_atom(coefficient, atom);
        self
    }

    /// Builder form of [`LinearSum::add_constant`].
    pub fn plus(mut self, value: f64) -> Self {
        self.add_constant(value);
        self
    }

    pub fn add_atom(&mut self, coefficient: f64, atom: AtomId) {
        self.summands.push((coefficient, atom));
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    pub fn summands(&self) -> &[(f64, AtomId)] {
        &self.summands
    }

    pub fn constant_term(&self) -> f64 {
        self.constant
    }

    /// True if every atom in the sum is observed.
    pub fn is_constant(&self, atoms: &AtomStore) -> ReasonerResult<bool> {
        for &(_, atom) in &self.summands {
            if !atoms.get(atom)?.is_observed() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Value at the atoms' current values.
    pub fn evaluate(&self, atoms: &AtomStore) -> ReasonerResult<f64> {
        let mut total = self.constant;
        for &(coefficient, atom) in &self.summands {
            total += coefficient * atoms.value(atom)?;
        }
        Ok(total)
    }
}

/// Potential function of a weighted rule.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionTerm {
    Linear(LinearSum),
    /// Pointwise maximum of the pieces.
    Max(Vec<FunctionTerm>),
    /// Square of the inner term.
    Squared(Box<FunctionTerm>),
}

impl FunctionTerm {
    /// `max(sum, 0)`
    pub fn hinge(sum: LinearSum) -> Self {
        FunctionTerm::Max(vec![
            FunctionTerm::Linear(sum),
            FunctionTerm::Linear(LinearSum::constant(0.0)),
        ])
    }

    /// `max(sum, 0)²`
    pub fn squared_hinge(sum: LinearSum) -> Self {
        FunctionTerm::hinge(sum).squared()
    }

    pub fn squared(self) -> Self {
        FunctionTerm::Squared(Box::new(self))
    }

    /// Value at the atoms' current values.
    pub fn evaluate(&self, atoms: &AtomStore) -> ReasonerResult<f64> {
        match self {
            FunctionTerm::Linear(sum) => sum.evaluate(atoms),
            FunctionTerm::Max(pieces) => {
                let mut best = f64::NEG_INFINITY;
                for piece in pieces {
                    best = best.max(piece.evaluate(atoms)?);
                }
                Ok(best)
            }
            FunctionTerm::Squared(inner) => {
                let value = inner.evaluate(atoms)?;
                Ok(value * value)
            }
        }
    }
}

impl fmt::Display for FunctionTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionTerm::Linear(sum) => {
                write!(f, "{}", sum.constant)?;
                for (coefficient, atom) in &sum.summands {
                    write!(f, " + {}*{}", coefficient, atom)?;
                }
                Ok(())
            }
            FunctionTerm::Max(pieces) => {
                write!(f, "max(")?;
                for (i, piece) in pieces.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", piece)?;
                }
                write!(f, ")")
            }
            FunctionTerm::Squared(inner) => write!(f, "({})^2", inner),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    SmallerThan,
    LargerThan,
    Equality,
}

impl From<Comparator> for ConstraintSense {
    fn from(comparator: Comparator) -> Self {
        match comparator {
            Comparator::SmallerThan => ConstraintSense::LessEqual,
            Comparator::LargerThan => ConstraintSense::GreaterEqual,
            Comparator::Equality => ConstraintSense::Equal,
        }
    }
}

/// Hard linear constraint `function (comparator) value`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintTerm {
    pub function: LinearSum,
    pub comparator: Comparator,
    pub value: f64,
}

impl ConstraintTerm {
    pub fn new(function: LinearSum, comparator: Comparator, value: f64) -> Self {
        Self {
            function,
            comparator,
            value,
        }
    }
}

/// A grounded rule.
#[derive(Debug, Clone, PartialEq)]
pub enum GroundRule {
    /// Contributes `weight · potential` to the objective.
    Weighted { weight: f64, potential: FunctionTerm },
    /// Must hold exactly.
    Hard { constraint: ConstraintTerm },
}

impl GroundRule {
    pub fn weighted(weight: f64, potential: FunctionTerm) -> Self {
        GroundRule::Weighted { weight, potential }
    }

    pub fn hard(constraint: ConstraintTerm) -> Self {
        GroundRule::Hard { constraint }
    }

    /// "weighted" or "hard".
    pub fn kind(&self) -> &'static str {
        match self {
            GroundRule::Weighted { .. } => "weighted",
            GroundRule::Hard { .. } => "hard",
        }
    }

    pub fn is_weighted(&self) -> bool {
        matches!(self, GroundRule::Weighted { .. })
    }

    /// Weight of a weighted rule; `None` for hard rules.
    pub fn weight(&self) -> Option<f64> {
        match self {
            GroundRule::Weighted { weight, .. } => Some(*weight),
            GroundRule::Hard { .. } => None,
        }
    }

    /// Change the weight. Returns false (and does nothing) for hard rules.
    pub fn set_weight(&mut self, new_weight: f64) -> bool {
        match self {
            GroundRule::Weighted { weight, .. } => {
                *weight = new_weight;
                true
            }
            GroundRule::Hard { .. } => false,
        }
    }

    pub fn potential(&self) -> Option<&FunctionTerm> {
        match self {
            GroundRule::Weighted { potential, .. } => Some(potential),
            GroundRule::Hard { .. } => None,
        }
    }

    pub fn potential_mut(&mut self) -> Option<&mut FunctionTerm> {
        match self {
            GroundRule::Weighted { potential, .. } => Some(potential),
            GroundRule::Hard { .. } => None,
        }
    }

    pub fn constraint_definition(&self) -> Option<&ConstraintTerm> {
        match self {
            GroundRule::Weighted { .. } => None,
            GroundRule::Hard { constraint } => Some(constraint),
        }
    }
}

/// Owner of the ground rules handed to the term generator.
#[derive(Debug, Clone, Default)]
pub struct GroundRuleStore {
    rules: Vec<GroundRule>,
}

impl GroundRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rule: GroundRule) -> RuleId {
        self.rules.push(rule);
        RuleId(self.rules.len() - 1)
    }

    pub fn get(&self, id: RuleId) -> ReasonerResult<&GroundRule> {
        self.rules.get(id.0).ok_or(ReasonerError::RuleNotFound(id))
    }

    pub fn get_mut(&mut self, id: RuleId) -> ReasonerResult<&mut GroundRule> {
        self.rules.get_mut(id.0).ok_or(ReasonerError::RuleNotFound(id))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RuleId, &GroundRule)> {
        self.rules.iter().enumerate().map(|(i, r)| (RuleId(i), r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_sum_evaluation() {
        let mut atoms = AtomStore::new();
        let a = atoms.add_random("A", 0.3);
        let b = atoms.add_observed("B", 0.5);

        let sum = LinearSum::constant(1.0).with_atom(-1.0, a).with_atom(2.0, b);
        assert!((sum.evaluate(&atoms).unwrap() - 1.7).abs() < 1e-12);
        assert!(!sum.is_constant(&atoms).unwrap());
        assert!(LinearSum::constant(1.0).with_atom(1.0, b).is_constant(&atoms).unwrap());

        let missing = LinearSum::new().with_atom(1.0, AtomId(9));
        assert_eq!(missing.evaluate(&atoms), Err(ReasonerError::UnknownAtom(AtomId(9))));
    }

    #[test]
    fn test_potential_evaluation() {
        let mut atoms = AtomStore::new();
        let a = atoms.add_random("A", 0.3);

        let hinge = FunctionTerm::hinge(LinearSum::constant(1.0).with_atom(-1.0, a));
        assert!((hinge.evaluate(&atoms).unwrap() - 0.7).abs() < 1e-12);

        let squared = FunctionTerm::squared_hinge(LinearSum::constant(1.0).with_atom(-1.0, a));
        assert!((squared.evaluate(&atoms).unwrap() - 0.49).abs() < 1e-12);

        let negative = FunctionTerm::hinge(LinearSum::constant(-1.0).with_atom(1.0, a));
        assert_eq!(negative.evaluate(&atoms).unwrap(), 0.0);
    }

    #[test]
    fn test_rule_accessors() {
        let mut rule = GroundRule::weighted(2.0, FunctionTerm::Linear(LinearSum::constant(1.0)));
        assert!(rule.is_weighted());
        assert_eq!(rule.weight(), Some(2.0));
        assert!(rule.set_weight(0.5));
        assert_eq!(rule.weight(), Some(0.5));
        assert!(rule.constraint_definition().is_none());

        let mut hard = GroundRule::hard(ConstraintTerm::new(
            LinearSum::new(),
            Comparator::SmallerThan,
            1.0,
        ));
        assert!(!hard.set_weight(1.0));
        assert_eq!(hard.weight(), None);
        assert!(hard.potential().is_none());
    }
}
