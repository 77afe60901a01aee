//! Export of a [`ConicProgram`] to canonical standard form.
//!
//! Interior-point backends work with
//!
//! ```text
//! minimize    qᵀx
//! subject to  A x + s = b
//!             s ∈ K
//! ```
//!
//! where K is a Cartesian product of cones. Each linear constraint of the
//! program becomes one row (equalities in the Zero block, inequalities in the
//! NonNeg block), and each cone contributes rows `−x + s = 0` so that the
//! slack block equals the cone's variables. Rotated second-order cones are
//! mapped onto plain second-order cones through the orthogonal rotation
//! `(x, y, z) ↦ ((x+y)/√2, (x−y)/√2, z)`.

use std::collections::HashMap;
use std::f64::consts::FRAC_1_SQRT_2;

use crate::cones::ConeType;
use crate::error::{ProgramError, ProgramResult};
use crate::program::{ConicProgram, ConstraintSense, VarId};
use crate::sparse::{self, SparseCsc};

/// Cone block of the standard form.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum ConeSpec {
    /// Zero cone: {0}^dim (equality rows).
    Zero { dim: usize },

    /// Nonnegative orthant: ℝ₊^dim
    NonNeg { dim: usize },

    /// Second-order cone {(t, x) : t ≥ ‖x‖₂}, dim ≥ 2.
    Soc { dim: usize },
}

impl ConeSpec {
    pub fn dim(&self) -> usize {
        match self {
            ConeSpec::Zero { dim } | ConeSpec::NonNeg { dim } | ConeSpec::Soc { dim } => *dim,
        }
    }

    pub fn validate(&self) -> ProgramResult<()> {
        match self {
            ConeSpec::Zero { dim: 0 } => Err(ProgramError::InvalidProblem(
                "Zero cone must have positive dimension".to_string(),
            )),
            ConeSpec::NonNeg { dim: 0 } => Err(ProgramError::InvalidProblem(
                "NonNeg cone must have positive dimension".to_string(),
            )),
            ConeSpec::Soc { dim } if *dim < 2 => Err(ProgramError::InvalidProblem(format!(
                "SOC cone must have dimension >= 2, got {}",
                dim
            ))),
            _ => Ok(()),
        }
    }

    /// Distance of a slack block from the cone.
    fn residual(&self, s: &[f64]) -> f64 {
        match self {
            ConeSpec::Zero { .. } => s.iter().map(|v| v.abs()).fold(0.0, f64::max),
            ConeSpec::NonNeg { .. } => ConeType::NonNegativeOrthant.violation(s),
            ConeSpec::Soc { .. } => ConeType::SecondOrderCone.violation(s),
        }
    }
}

/// Program in canonical form, plus the column → variable mapping needed to
/// load a solution back.
#[derive(Debug, Clone)]
#[allow(non_snake_case)] // A is standard mathematical notation
pub struct StandardForm {
    /// Linear cost vector q (length n)
    pub q: Vec<f64>,

    /// Constraint matrix A (m × n, CSC format)
    pub A: SparseCsc,

    /// Constraint right-hand side b (length m)
    pub b: Vec<f64>,

    /// Cone blocks partitioning the m rows
    pub cones: Vec<ConeSpec>,

    /// Program variable behind each column of A
    pub columns: Vec<VarId>,
}

impl StandardForm {
    /// Number of primal variables (n)
    pub fn num_vars(&self) -> usize {
        self.q.len()
    }

    /// Number of rows (m)
    pub fn num_constraints(&self) -> usize {
        self.b.len()
    }

    /// Validate dimensions and cone partitioning.
    pub fn validate(&self) -> ProgramResult<()> {
        let n = self.num_vars();
        let m = self.num_constraints();

        if self.columns.len() != n {
            return Err(ProgramError::InvalidProblem(format!(
                "{} column variables, expected {}",
                self.columns.len(),
                n
            )));
        }

        if self.A.rows() != m || self.A.cols() != n {
            return Err(ProgramError::InvalidProblem(format!(
                "A has shape {}×{}, expected {}×{}",
                self.A.rows(),
                self.A.cols(),
                m,
                n
            )));
        }

        let cone_total_dim: usize = self.cones.iter().map(ConeSpec::dim).sum();
        if cone_total_dim != m {
            return Err(ProgramError::InvalidProblem(format!(
                "Cone dimensions sum to {}, expected {}",
                cone_total_dim, m
            )));
        }

        for cone in &self.cones {
            cone.validate()?;
        }

        Ok(())
    }

    /// Largest violation of `b − A x ∈ K` for a candidate point `x`.
    pub fn max_residual(&self, x: &[f64]) -> ProgramResult<f64> {
        if x.len() != self.num_vars() {
            return Err(ProgramError::InvalidProblem(format!(
                "x has length {}, expected {}",
                x.len(),
                self.num_vars()
            )));
        }

        let mut s = self.b.clone();
        sparse::spmv(&self.A, x, &mut s, -1.0, 1.0);

        let mut offset = 0;
        let mut worst: f64 = 0.0;
        for cone in &self.cones {
            let dim = cone.dim();
            worst = worst.max(cone.residual(&s[offset..offset + dim]));
            offset += dim;
        }
        Ok(worst)
    }

    /// Objective value qᵀx.
    pub fn objective(&self, x: &[f64]) -> f64 {
        self.q.iter().zip(x).map(|(q, x)| q * x).sum()
    }
}

impl ConicProgram {
    /// Assemble the canonical standard form of the current program.
    pub fn to_standard_form(&self) -> ProgramResult<StandardForm> {
        let columns: Vec<VarId> = self.variables().collect();
        let column_of: HashMap<VarId, usize> =
            columns.iter().enumerate().map(|(j, &v)| (v, j)).collect();

        let mut q = Vec::with_capacity(columns.len());
        for &var in &columns {
            q.push(self.objective_coefficient(var)?);
        }

        let mut triplets: Vec<(usize, usize, f64)> = Vec::new();
        let mut b: Vec<f64> = Vec::new();
        let mut cones = Vec::new();

        // Zero block: equalities
        let mut zero_dim = 0;
        for con in self.constraints() {
            if self.sense(con)? != ConstraintSense::Equal {
                continue;
            }
            let row = b.len();
            for &(var, coef) in self.constraint_variables(con)? {
                triplets.push((row, column_of[&var], coef));
            }
            b.push(self.rhs(con)?);
            zero_dim += 1;
        }
        if zero_dim > 0 {
            cones.push(ConeSpec::Zero { dim: zero_dim });
        }

        // NonNeg block: a·x ≤ b as a·x + s = b; a·x ≥ b as −a·x + s = −b
        let mut nonneg_dim = 0;
        for con in self.constraints() {
            let sign = match self.sense(con)? {
                ConstraintSense::Equal => continue,
                ConstraintSense::LessEqual => 1.0,
                ConstraintSense::GreaterEqual => -1.0,
            };
            let row = b.len();
            for &(var, coef) in self.constraint_variables(con)? {
                triplets.push((row, column_of[&var], sign * coef));
            }
            b.push(sign * self.rhs(con)?);
            nonneg_dim += 1;
        }
        for cone in self.cones() {
            if self.cone_type(cone)? != ConeType::NonNegativeOrthant {
                continue;
            }
            for var in self.cone_variables(cone)? {
                triplets.push((b.len(), column_of[var], -1.0));
                b.push(0.0);
                nonneg_dim += 1;
            }
        }
        if nonneg_dim > 0 {
            cones.push(ConeSpec::NonNeg { dim: nonneg_dim });
        }

        // One SOC block per (rotated) second-order cone
        for cone in self.cones() {
            let vars = self.cone_variables(cone)?;
            let row = b.len();
            match self.cone_type(cone)? {
                ConeType::NonNegativeOrthant => continue,
                ConeType::SecondOrderCone => {
                    for (k, var) in vars.iter().enumerate() {
                        triplets.push((row + k, column_of[var], -1.0));
                    }
                }
                ConeType::RotatedSecondOrderCone => {
                    let (x, y) = (column_of[&vars[0]], column_of[&vars[1]]);
                    triplets.push((row, x, -FRAC_1_SQRT_2));
                    triplets.push((row, y, -FRAC_1_SQRT_2));
                    triplets.push((row + 1, x, -FRAC_1_SQRT_2));
                    triplets.push((row + 1, y, FRAC_1_SQRT_2));
                    for (k, var) in vars.iter().enumerate().skip(2) {
                        triplets.push((row + k, column_of[var], -1.0));
                    }
                }
            }
            b.extend(std::iter::repeat(0.0).take(vars.len()));
            cones.push(ConeSpec::Soc { dim: vars.len() });
        }

        let form = StandardForm {
            q,
            A: sparse::from_triplets(b.len(), columns.len(), triplets),
            b,
            cones,
            columns,
        };
        log::debug!(
            "Standard form: {} columns, {} rows, {} cone blocks",
            form.num_vars(),
            form.num_constraints(),
            form.cones.len()
        );
        Ok(form)
    }

    /// Write a standard-form solution vector back into the program variables.
    pub fn load_solution(&mut self, form: &StandardForm, x: &[f64]) -> ProgramResult<()> {
        if x.len() != form.columns.len() {
            return Err(ProgramError::InvalidProblem(format!(
                "Solution has length {}, expected {}",
                x.len(),
                form.columns.len()
            )));
        }
        for (&var, &value) in form.columns.iter().zip(x) {
            self.set_value(var, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cone_spec_validation() {
        assert!(ConeSpec::Zero { dim: 1 }.validate().is_ok());
        assert!(ConeSpec::Soc { dim: 2 }.validate().is_ok());
        assert!(ConeSpec::Zero { dim: 0 }.validate().is_err());
        assert!(ConeSpec::NonNeg { dim: 0 }.validate().is_err());
        assert!(ConeSpec::Soc { dim: 1 }.validate().is_err());
    }

    #[test]
    fn test_export_linear_program() {
        // min x + 2y  s.t.  x + y == 1,  x <= 0.75,  x, y >= 0
        let mut program = ConicProgram::new();
        let x = program.create_nonnegative_variable();
        let y = program.create_nonnegative_variable();
        program.set_objective_coefficient(x, 1.0).unwrap();
        program.set_objective_coefficient(y, 2.0).unwrap();

        let eq = program.create_constraint();
        program.set_variable(eq, x, 1.0).unwrap();
        program.set_variable(eq, y, 1.0).unwrap();
        program.set_rhs(eq, 1.0).unwrap();

        let ub = program.create_constraint_with(ConstraintSense::LessEqual);
        program.set_variable(ub, x, 1.0).unwrap();
        program.set_rhs(ub, 0.75).unwrap();

        let form = program.to_standard_form().unwrap();
        form.validate().unwrap();

        assert_eq!(form.num_vars(), 2);
        assert_eq!(form.num_constraints(), 4); // 1 equality + 1 bound + 2 orthant rows
        assert_eq!(
            form.cones,
            vec![ConeSpec::Zero { dim: 1 }, ConeSpec::NonNeg { dim: 3 }]
        );
        assert_eq!(form.q, vec![1.0, 2.0]);

        // (0.75, 0.25) is feasible, (1.0, 0.0) breaks the bound
        assert!(form.max_residual(&[0.75, 0.25]).unwrap() < 1e-12);
        assert!((form.max_residual(&[1.0, 0.0]).unwrap() - 0.25).abs() < 1e-12);
        assert!((form.objective(&[0.75, 0.25]) - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_export_greater_equal() {
        let mut program = ConicProgram::new();
        let x = program.create_nonnegative_variable();
        let con = program.create_constraint_with(ConstraintSense::GreaterEqual);
        program.set_variable(con, x, 2.0).unwrap();
        program.set_rhs(con, 1.0).unwrap();

        let form = program.to_standard_form().unwrap();
        assert!(form.max_residual(&[0.5]).unwrap() < 1e-12);
        assert!((form.max_residual(&[0.25]).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_export_rotated_cone_matches_membership() {
        let mut program = ConicProgram::new();
        let rsoc = program
            .create_cone(ConeType::RotatedSecondOrderCone, 3)
            .unwrap();
        let form = program.to_standard_form().unwrap();
        form.validate().unwrap();
        assert_eq!(form.cones, vec![ConeSpec::Soc { dim: 3 }]);

        let vars = program.cone_variables(rsoc).unwrap().to_vec();
        let position = |v: VarId| form.columns.iter().position(|&c| c == v).unwrap();

        for point in [[0.49, 0.5, 0.7], [0.40, 0.5, 0.7], [2.0, 1.0, 1.9]] {
            let mut x = vec![0.0; 3];
            for (k, &v) in vars.iter().enumerate() {
                x[position(v)] = point[k];
            }
            let inside = ConeType::RotatedSecondOrderCone.contains(&point, 1e-9);
            assert_eq!(form.max_residual(&x).unwrap() <= 1e-9, inside);
        }
    }

    #[test]
    fn test_load_solution() {
        let mut program = ConicProgram::new();
        let soc = program.create_cone(ConeType::SecondOrderCone, 3).unwrap();
        let form = program.to_standard_form().unwrap();

        program.load_solution(&form, &[5.0, 3.0, 4.0]).unwrap();
        let values: Vec<f64> = program
            .cone_variables(soc)
            .unwrap()
            .iter()
            .map(|&v| program.value(v).unwrap())
            .collect();
        assert_eq!(values, vec![5.0, 3.0, 4.0]);
        assert!(program.is_feasible(1e-12));

        assert!(program.load_solution(&form, &[1.0]).is_err());
    }
}
