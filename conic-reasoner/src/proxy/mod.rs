//! Proxies: the owned slices of the conic program behind atoms and rules.
//!
//! Every program object the term store creates belongs to exactly one proxy,
//! and removing the proxy deletes exactly those objects. Variable proxies are
//! shared between rules through the store's atom map; function and
//! constraint proxies are owned by a single rule each.

mod constraint;
mod function;
mod variable;

pub use constraint::ConstraintProxy;
pub use function::{FeatureStructure, FunctionProxy};
pub use variable::VariableProxy;

use conic_core::{ConeType, ConeTypeSet, ConicProgram, ProgramResult, VarId};
use indexmap::IndexMap;

use crate::error::{ReasonerError, ReasonerResult};
use crate::model::{AtomId, AtomStore};

/// Proxy owned by one rule in the term store.
#[derive(Debug)]
pub enum Proxy {
    /// Weighted rule: feature structure plus hinge pieces.
    Function(FunctionProxy),
    /// Hard rule: one linear constraint.
    Constraint(ConstraintProxy),
}

impl Proxy {
    pub fn kind(&self) -> &'static str {
        match self {
            Proxy::Function(_) => "function",
            Proxy::Constraint(_) => "constraint",
        }
    }

    /// Id of the program this proxy's objects live in.
    pub fn program_id(&self) -> u64 {
        match self {
            Proxy::Function(proxy) => proxy.program_id(),
            Proxy::Constraint(proxy) => proxy.program_id(),
        }
    }

    pub fn as_function(&self) -> Option<&FunctionProxy> {
        match self {
            Proxy::Function(proxy) => Some(proxy),
            Proxy::Constraint(_) => None,
        }
    }

    pub fn as_constraint(&self) -> Option<&ConstraintProxy> {
        match self {
            Proxy::Constraint(proxy) => Some(proxy),
            Proxy::Function(_) => None,
        }
    }

    /// Delete everything this proxy created.
    pub(crate) fn remove(&mut self, program: &mut ConicProgram) -> ProgramResult<()> {
        match self {
            Proxy::Function(proxy) => proxy.remove(program),
            Proxy::Constraint(proxy) => proxy.remove(program),
        }
    }
}

/// Mutable view of the term store handed to proxies while they build.
pub(crate) struct ProxyContext<'a> {
    pub(crate) program: &'a mut ConicProgram,
    pub(crate) variables: &'a mut IndexMap<AtomId, VariableProxy>,
    pub(crate) cone_types: ConeTypeSet,
    pub(crate) atoms: &'a AtomStore,
}

impl<'a> ProxyContext<'a> {
    pub(crate) fn new(
        program: &'a mut ConicProgram,
        variables: &'a mut IndexMap<AtomId, VariableProxy>,
        cone_types: ConeTypeSet,
        atoms: &'a AtomStore,
    ) -> Self {
        Self {
            program,
            variables,
            cone_types,
            atoms,
        }
    }

    pub(crate) fn rotated_cones(&self) -> bool {
        self.cone_types.contains(ConeType::RotatedSecondOrderCone)
    }

    /// Decision variable of a random-variable atom, created on first use.
    pub(crate) fn variable_for(&mut self, atom: AtomId) -> ReasonerResult<VarId> {
        if let Some(proxy) = self.variables.get(&atom) {
            return Ok(proxy.variable());
        }

        let entry = self.atoms.get(atom)?;
        if entry.is_observed() {
            return Err(ReasonerError::ObservedAtom(atom));
        }

        let proxy = VariableProxy::new(self.program, atom, entry.value())?;
        let variable = proxy.variable();
        self.variables.insert(atom, proxy);
        log::trace!("Created variable proxy for atom {}", atom);
        Ok(variable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Comparator, ConstraintTerm, LinearSum};
    use conic_core::ConstraintSense;

    #[test]
    fn test_variable_for_is_shared() {
        let mut atoms = AtomStore::new();
        let a = atoms.add_random("A", 0.5);
        let mut program = ConicProgram::new();
        let mut variables = IndexMap::new();
        let mut ctx = ProxyContext::new(&mut program, &mut variables, ConeTypeSet::all(), &atoms);

        let first = ctx.variable_for(a).unwrap();
        let second = ctx.variable_for(a).unwrap();
        assert_eq!(first, second);
        assert_eq!(ctx.variables.len(), 1);
        assert_eq!(ctx.program.num_cones(), 1);
    }

    #[test]
    fn test_variable_for_observed_atom() {
        let mut atoms = AtomStore::new();
        let obs = atoms.add_observed("Obs", 1.0);
        let mut program = ConicProgram::new();
        let mut variables = IndexMap::new();
        let mut ctx = ProxyContext::new(&mut program, &mut variables, ConeTypeSet::all(), &atoms);

        assert_eq!(ctx.variable_for(obs), Err(ReasonerError::ObservedAtom(obs)));
        assert_eq!(ctx.program.num_variables(), 0);
    }

    #[test]
    fn test_constraint_folds_observed_and_repeats() {
        let mut atoms = AtomStore::new();
        let a = atoms.add_random("A", 0.0);
        let obs = atoms.add_observed("Obs", 0.5);
        let mut program = ConicProgram::new();
        let mut variables = IndexMap::new();
        let mut ctx = ProxyContext::new(&mut program, &mut variables, ConeTypeSet::all(), &atoms);

        // A + A + 2*Obs + 0.5 <= 3  =>  2A <= 1.5
        let sum = LinearSum::new()
            .with_atom(1.0, a)
            .with_atom(1.0, a)
            .with_atom(2.0, obs)
            .plus(0.5);
        let definition = ConstraintTerm::new(sum, Comparator::SmallerThan, 3.0);
        let proxy = ConstraintProxy::new(&mut ctx, &definition).unwrap();

        let var = ctx.variables[&a].variable();
        let con = proxy.constraint();
        assert_eq!(ctx.program.constraint_variables(con).unwrap(), &[(var, 2.0)]);
        assert!((ctx.program.rhs(con).unwrap() - 1.5).abs() < 1e-12);
        assert_eq!(ctx.program.sense(con).unwrap(), ConstraintSense::LessEqual);

        proxy.remove(ctx.program).unwrap();
        assert!(!ctx.program.has_constraint(con));
        // A second removal is a no-op.
        proxy.remove(ctx.program).unwrap();
    }
}
