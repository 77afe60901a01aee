//! Linear constraints compiled from rule definitions.

use conic_core::{ConicProgram, ConstraintId, ConstraintSense, ProgramResult, VarId};

use super::ProxyContext;
use crate::error::ReasonerResult;
use crate::model::{ConstraintTerm, LinearSum};

/// One linear constraint owned by a hard rule or by a function piece.
#[derive(Debug)]
pub struct ConstraintProxy {
    program: u64,
    constraint: ConstraintId,
}

impl ConstraintProxy {
    /// Compile a hard rule's constraint.
    pub(crate) fn new(ctx: &mut ProxyContext<'_>, definition: &ConstraintTerm) -> ReasonerResult<Self> {
        Self::build(
            ctx,
            &definition.function,
            &[],
            definition.comparator.into(),
            definition.value,
        )
    }

    /// Compile `sum + Σ extra (sense) value`.
    ///
    /// Observed atoms and the sum's constant are folded into the right-hand
    /// side. Repeated random atoms accumulate into a single coefficient.
    pub(crate) fn build(
        ctx: &mut ProxyContext<'_>,
        sum: &LinearSum,
        extra: &[(VarId, f64)],
        sense: ConstraintSense,
        value: f64,
    ) -> ReasonerResult<Self> {
        let mut rhs = value - sum.constant_term();
        let mut terms = Vec::with_capacity(sum.summands().len() + extra.len());
        for &(coefficient, atom) in sum.summands() {
            let entry = ctx.atoms.get(atom)?;
            if entry.is_observed() {
                rhs -= coefficient * entry.value();
            } else {
                terms.push((ctx.variable_for(atom)?, coefficient));
            }
        }
        terms.extend_from_slice(extra);

        let constraint = ctx.program.create_constraint_with(sense);
        for (var, coefficient) in terms {
            ctx.program.add_variable(constraint, var, coefficient)?;
        }
        ctx.program.set_rhs(constraint, rhs)?;

        Ok(Self {
            program: ctx.program.id(),
            constraint,
        })
    }

    pub fn constraint(&self) -> ConstraintId {
        self.constraint
    }

    /// Id of the program the constraint lives in.
    pub fn program_id(&self) -> u64 {
        self.program
    }

    /// Delete the constraint. A constraint already dropped by a variable
    /// removal is left alone.
    pub(crate) fn remove(&self, program: &mut ConicProgram) -> ProgramResult<()> {
        if program.has_constraint(self.constraint) {
            program.delete_constraint(self.constraint)?;
        }
        Ok(())
    }
}
