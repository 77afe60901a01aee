//! Decision variable of one random-variable atom.

use conic_core::{ConicProgram, ConstraintId, ConstraintSense, ProgramResult, VarId};

use crate::model::AtomId;

/// One nonnegative singleton variable plus the bound `x <= 1`, giving the
/// atom its [0, 1] box.
#[derive(Debug)]
pub struct VariableProxy {
    atom: AtomId,
    variable: VarId,
    upper_bound: ConstraintId,
}

impl VariableProxy {
    /// Create the variable, warm-started at the atom's current value.
    pub(crate) fn new(program: &mut ConicProgram, atom: AtomId, initial: f64) -> ProgramResult<Self> {
        let variable = program.create_nonnegative_variable();
        program.set_value(variable, initial.clamp(0.0, 1.0))?;

        let upper_bound = program.create_constraint_with(ConstraintSense::LessEqual);
        program.set_variable(upper_bound, variable, 1.0)?;
        program.set_rhs(upper_bound, 1.0)?;

        Ok(Self {
            atom,
            variable,
            upper_bound,
        })
    }

    pub fn atom(&self) -> AtomId {
        self.atom
    }

    pub fn variable(&self) -> VarId {
        self.variable
    }

    pub fn upper_bound(&self) -> ConstraintId {
        self.upper_bound
    }

    /// Remove the variable from the program.
    ///
    /// Constraints that mention only this variable are deleted. Every other
    /// constraint keeps its meaning with the variable fixed at its current
    /// value: the coefficient is zeroed and `coef * value` is moved to the
    /// right-hand side.
    pub(crate) fn remove(&self, program: &mut ConicProgram) -> ProgramResult<()> {
        program.delete_constraint(self.upper_bound)?;

        let value = program.value(self.variable)?;
        let constraints = program.variable_constraints(self.variable)?.to_vec();
        for con in constraints {
            if program.constraint_variables(con)?.len() == 1 {
                program.delete_constraint(con)?;
            } else {
                let coefficient = program.coefficient(con, self.variable)?;
                program.set_variable(con, self.variable, 0.0)?;
                let rhs = program.rhs(con)?;
                program.set_rhs(con, rhs - coefficient * value)?;
            }
        }

        let cone = program.cone_of(self.variable)?;
        program.delete_cone(cone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_box() {
        let mut program = ConicProgram::new();
        let proxy = VariableProxy::new(&mut program, AtomId(0), 0.3).unwrap();

        assert_eq!(program.num_cones(), 1);
        assert_eq!(program.num_variables(), 1);
        assert_eq!(program.num_constraints(), 1);
        assert_eq!(
            program.sense(proxy.upper_bound()).unwrap(),
            ConstraintSense::LessEqual
        );
        assert_eq!(program.rhs(proxy.upper_bound()).unwrap(), 1.0);
        assert!((program.value(proxy.variable()).unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_remove_folds_shared_constraints() {
        let mut program = ConicProgram::new();
        let a = VariableProxy::new(&mut program, AtomId(0), 0.0).unwrap();
        let b = VariableProxy::new(&mut program, AtomId(1), 0.0).unwrap();

        // a + 2b <= 1.5 survives with a fixed at 0.4: 2b <= 1.1
        let shared = program.create_constraint_with(ConstraintSense::LessEqual);
        program.set_variable(shared, a.variable(), 1.0).unwrap();
        program.set_variable(shared, b.variable(), 2.0).unwrap();
        program.set_rhs(shared, 1.5).unwrap();

        // a >= 0.2 mentions only a and goes away
        let alone = program.create_constraint_with(ConstraintSense::GreaterEqual);
        program.set_variable(alone, a.variable(), 1.0).unwrap();
        program.set_rhs(alone, 0.2).unwrap();

        program.set_value(a.variable(), 0.4).unwrap();
        a.remove(&mut program).unwrap();

        assert!(!program.has_variable(a.variable()));
        assert!(!program.has_constraint(a.upper_bound()));
        assert!(!program.has_constraint(alone));
        assert_eq!(
            program.constraint_variables(shared).unwrap(),
            &[(b.variable(), 2.0)]
        );
        assert!((program.rhs(shared).unwrap() - 1.1).abs() < 1e-12);

        // Only b's cone and bound plus the folded constraint remain.
        assert_eq!(program.num_cones(), 1);
        assert_eq!(program.num_constraints(), 2);
    }
}
