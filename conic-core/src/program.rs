//! Mutable conic program.
//!
//! A [`ConicProgram`] owns three arenas: cones, the variables they contain,
//! and linear constraints over those variables. Objects are addressed through
//! small `Copy` handles carrying a generation counter, so a handle kept past
//! the deletion of its object is detected instead of silently aliasing a
//! newer object that reused the slot.
//!
//! The program represents
//!
//! ```text
//! minimize    Σ cⱼ xⱼ
//! subject to  Σ aᵢⱼ xⱼ  (= | ≤ | ≥)  bᵢ      for each linear constraint i
//!             (xⱼ)ⱼ∈K  ∈ K                   for each cone K
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cones::ConeType;
use crate::error::{ProgramError, ProgramResult};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            index: usize,
            generation: u32,
        }

        impl $name {
            const KIND: &'static str = $kind;

            /// Arena slot of this handle.
            pub fn index(self) -> usize {
                self.index
            }

            fn stale(self) -> ProgramError {
                ProgramError::StaleHandle {
                    kind: Self::KIND,
                    index: self.index,
                    generation: self.generation,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}.{}", Self::KIND, self.index, self.generation)
            }
        }
    };
}

handle!(
    /// Handle to a cone.
    ConeId,
    "cone"
);
handle!(
    /// Handle to a scalar decision variable.
    VarId,
    "variable"
);
handle!(
    /// Handle to a linear constraint.
    ConstraintId,
    "constraint"
);

/// Relation between a constraint's left-hand side and its right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConstraintSense {
    /// `Σ aⱼ xⱼ == b`
    #[default]
    Equal,
    /// `Σ aⱼ xⱼ <= b`
    LessEqual,
    /// `Σ aⱼ xⱼ >= b`
    GreaterEqual,
}

impl ConstraintSense {
    /// Amount by which `lhs (sense) rhs` is violated (0 when satisfied).
    pub fn violation(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            ConstraintSense::Equal => (lhs - rhs).abs(),
            ConstraintSense::LessEqual => (lhs - rhs).max(0.0),
            ConstraintSense::GreaterEqual => (rhs - lhs).max(0.0),
        }
    }
}

impl fmt::Display for ConstraintSense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintSense::Equal => write!(f, "=="),
            ConstraintSense::LessEqual => write!(f, "<="),
            ConstraintSense::GreaterEqual => write!(f, ">="),
        }
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot arena with generation counters and slot reuse.
#[derive(Debug, Clone)]
struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    live: usize,
}

impl<T> Arena<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    fn insert(&mut self, value: T) -> (usize, u32) {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.value = Some(value);
            return (index, slot.generation);
        }
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        (self.slots.len() - 1, 0)
    }

    fn get(&self, index: usize, generation: u32) -> Option<&T> {
        self.slots
            .get(index)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_ref())
    }

    fn get_mut(&mut self, index: usize, generation: u32) -> Option<&mut T> {
        self.slots
            .get_mut(index)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_mut())
    }

    fn remove(&mut self, index: usize, generation: u32) -> Option<T> {
        let slot = self.slots.get_mut(index)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.live -= 1;
        Some(value)
    }

    fn iter(&self) -> impl Iterator<Item = (usize, u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.value.as_ref().map(|v| (i, slot.generation, v)))
    }

    fn len(&self) -> usize {
        self.live
    }

    fn clear(&mut self) {
        // Bump every generation so outstanding handles go stale.
        self.free.clear();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            slot.value = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(i);
        }
        self.live = 0;
    }
}

#[derive(Debug, Clone)]
struct ConeEntry {
    cone_type: ConeType,
    variables: Vec<VarId>,
}

#[derive(Debug, Clone)]
struct VariableEntry {
    cone: ConeId,
    objective: f64,
    value: f64,
    constraints: Vec<ConstraintId>,
}

#[derive(Debug, Clone)]
struct ConstraintEntry {
    sense: ConstraintSense,
    coefficients: Vec<(VarId, f64)>,
    rhs: f64,
}

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(0);

/// Mutable conic program: cones, variables and linear constraints.
///
/// Each program gets a process-unique [`id`](ConicProgram::id) so that
/// callers holding handles can tell which program they came from. A clone
/// keeps the id, since the original's handles stay valid in it.
#[derive(Debug, Clone)]
pub struct ConicProgram {
    id: u64,
    cones: Arena<ConeEntry>,
    variables: Arena<VariableEntry>,
    constraints: Arena<ConstraintEntry>,
}

impl Default for ConicProgram {
    fn default() -> Self {
        Self::new()
    }
}

impl ConicProgram {
    /// Create an empty program.
    pub fn new() -> Self {
        Self {
            id: NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed),
            cones: Arena::new(),
            variables: Arena::new(),
            constraints: Arena::new(),
        }
    }

    /// Identity of this program, unique within the process.
    pub fn id(&self) -> u64 {
        self.id
    }

    // ========================================================================
    // Cones and variables
    // ========================================================================

    /// Create a cone of `size` fresh variables.
    ///
    /// The variables start with value 0 and objective coefficient 0.
    pub fn create_cone(&mut self, cone_type: ConeType, size: usize) -> ProgramResult<ConeId> {
        if size < cone_type.min_size() {
            return Err(ProgramError::InvalidConeSize {
                cone_type,
                size,
                min: cone_type.min_size(),
            });
        }

        let (index, generation) = self.cones.insert(ConeEntry {
            cone_type,
            variables: Vec::with_capacity(size),
        });
        let cone = ConeId { index, generation };

        let mut variables = Vec::with_capacity(size);
        for _ in 0..size {
            let (index, generation) = self.variables.insert(VariableEntry {
                cone,
                objective: 0.0,
                value: 0.0,
                constraints: Vec::new(),
            });
            variables.push(VarId { index, generation });
        }

        if let Some(entry) = self.cones.get_mut(index, generation) {
            entry.variables = variables;
        }
        Ok(cone)
    }

    /// Create a nonnegative orthant singleton and return its variable.
    pub fn create_nonnegative_variable(&mut self) -> VarId {
        let (index, generation) = self.cones.insert(ConeEntry {
            cone_type: ConeType::NonNegativeOrthant,
            variables: Vec::with_capacity(1),
        });
        let cone = ConeId { index, generation };
        let (var_index, var_generation) = self.variables.insert(VariableEntry {
            cone,
            objective: 0.0,
            value: 0.0,
            constraints: Vec::new(),
        });
        let var = VarId {
            index: var_index,
            generation: var_generation,
        };
        if let Some(entry) = self.cones.get_mut(index, generation) {
            entry.variables.push(var);
        }
        var
    }

    /// Ordered variables of a cone (apex first, see [`crate::cones`]).
    pub fn cone_variables(&self, cone: ConeId) -> ProgramResult<&[VarId]> {
        Ok(&self.cone(cone)?.variables)
    }

    pub fn cone_type(&self, cone: ConeId) -> ProgramResult<ConeType> {
        Ok(self.cone(cone)?.cone_type)
    }

    /// Cone that owns a variable.
    pub fn cone_of(&self, var: VarId) -> ProgramResult<ConeId> {
        Ok(self.variable(var)?.cone)
    }

    /// Delete a cone together with all of its variables.
    ///
    /// Fails with [`ProgramError::VariableInUse`] if any of the variables still
    /// has a coefficient in a live constraint; nothing is deleted in that case.
    pub fn delete_cone(&mut self, cone: ConeId) -> ProgramResult<()> {
        let entry = self.cone(cone)?;
        for &var in &entry.variables {
            let constraints = self.variable(var)?.constraints.len();
            if constraints > 0 {
                return Err(ProgramError::VariableInUse {
                    variable: var.index,
                    constraints,
                });
            }
        }

        let entry = self
            .cones
            .remove(cone.index, cone.generation)
            .ok_or_else(|| cone.stale())?;
        for var in entry.variables {
            self.variables.remove(var.index, var.generation);
        }
        Ok(())
    }

    pub fn has_cone(&self, cone: ConeId) -> bool {
        self.cones.get(cone.index, cone.generation).is_some()
    }

    pub fn has_variable(&self, var: VarId) -> bool {
        self.variables.get(var.index, var.generation).is_some()
    }

    pub fn objective_coefficient(&self, var: VarId) -> ProgramResult<f64> {
        Ok(self.variable(var)?.objective)
    }

    pub fn set_objective_coefficient(&mut self, var: VarId, coefficient: f64) -> ProgramResult<()> {
        self.variable_mut(var)?.objective = coefficient;
        Ok(())
    }

    /// Current (solved or warm-start) value of a variable.
    pub fn value(&self, var: VarId) -> ProgramResult<f64> {
        Ok(self.variable(var)?.value)
    }

    pub fn set_value(&mut self, var: VarId, value: f64) -> ProgramResult<()> {
        self.variable_mut(var)?.value = value;
        Ok(())
    }

    /// Constraints in which a variable has a nonzero coefficient.
    pub fn variable_constraints(&self, var: VarId) -> ProgramResult<&[ConstraintId]> {
        Ok(&self.variable(var)?.constraints)
    }

    // ========================================================================
    // Linear constraints
    // ========================================================================

    /// Create an empty equality constraint `0 == 0`.
    pub fn create_constraint(&mut self) -> ConstraintId {
        self.create_constraint_with(ConstraintSense::Equal)
    }

    /// Create an empty constraint with the given sense.
    pub fn create_constraint_with(&mut self, sense: ConstraintSense) -> ConstraintId {
        let (index, generation) = self.constraints.insert(ConstraintEntry {
            sense,
            coefficients: Vec::new(),
            rhs: 0.0,
        });
        ConstraintId { index, generation }
    }

    pub fn has_constraint(&self, con: ConstraintId) -> bool {
        self.constraints.get(con.index, con.generation).is_some()
    }

    /// Replace the coefficient of `var` in `con`. A zero coefficient removes
    /// the variable from the constraint.
    pub fn set_variable(&mut self, con: ConstraintId, var: VarId, coefficient: f64) -> ProgramResult<()> {
        self.variable(var)?;
        let entry = self
            .constraints
            .get_mut(con.index, con.generation)
            .ok_or_else(|| con.stale())?;

        let position = entry.coefficients.iter().position(|&(v, _)| v == var);
        match (position, coefficient == 0.0) {
            (Some(i), true) => {
                entry.coefficients.remove(i);
                self.unlink(var, con);
            }
            (Some(i), false) => entry.coefficients[i].1 = coefficient,
            (None, true) => {}
            (None, false) => {
                entry.coefficients.push((var, coefficient));
                if let Some(v) = self.variables.get_mut(var.index, var.generation) {
                    v.constraints.push(con);
                }
            }
        }
        Ok(())
    }

    /// Add `coefficient` to the current coefficient of `var` in `con`.
    pub fn add_variable(&mut self, con: ConstraintId, var: VarId, coefficient: f64) -> ProgramResult<()> {
        let current = self.coefficient(con, var)?;
        self.set_variable(con, var, current + coefficient)
    }

    /// Coefficient of `var` in `con` (0 when absent).
    pub fn coefficient(&self, con: ConstraintId, var: VarId) -> ProgramResult<f64> {
        Ok(self
            .constraint(con)?
            .coefficients
            .iter()
            .find(|&&(v, _)| v == var)
            .map_or(0.0, |&(_, c)| c))
    }

    /// Variables with nonzero coefficients, in insertion order.
    pub fn constraint_variables(&self, con: ConstraintId) -> ProgramResult<&[(VarId, f64)]> {
        Ok(&self.constraint(con)?.coefficients)
    }

    pub fn rhs(&self, con: ConstraintId) -> ProgramResult<f64> {
        Ok(self.constraint(con)?.rhs)
    }

    pub fn set_rhs(&mut self, con: ConstraintId, rhs: f64) -> ProgramResult<()> {
        self.constraint_mut(con)?.rhs = rhs;
        Ok(())
    }

    pub fn sense(&self, con: ConstraintId) -> ProgramResult<ConstraintSense> {
        Ok(self.constraint(con)?.sense)
    }

    pub fn set_sense(&mut self, con: ConstraintId, sense: ConstraintSense) -> ProgramResult<()> {
        self.constraint_mut(con)?.sense = sense;
        Ok(())
    }

    /// Delete a constraint. Its variables are untouched.
    pub fn delete_constraint(&mut self, con: ConstraintId) -> ProgramResult<()> {
        let entry = self
            .constraints
            .remove(con.index, con.generation)
            .ok_or_else(|| con.stale())?;
        for (var, _) in entry.coefficients {
            self.unlink(var, con);
        }
        Ok(())
    }

    // ========================================================================
    // Bulk access
    // ========================================================================

    pub fn num_cones(&self) -> usize {
        self.cones.len()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Number of live cones of one type.
    pub fn num_cones_of(&self, cone_type: ConeType) -> usize {
        self.cones
            .iter()
            .filter(|(_, _, entry)| entry.cone_type == cone_type)
            .count()
    }

    /// Live cones in slot order.
    pub fn cones(&self) -> impl Iterator<Item = ConeId> + '_ {
        self.cones
            .iter()
            .map(|(index, generation, _)| ConeId { index, generation })
    }

    /// Live variables in slot order.
    pub fn variables(&self) -> impl Iterator<Item = VarId> + '_ {
        self.variables
            .iter()
            .map(|(index, generation, _)| VarId { index, generation })
    }

    /// Live constraints in slot order.
    pub fn constraints(&self) -> impl Iterator<Item = ConstraintId> + '_ {
        self.constraints
            .iter()
            .map(|(index, generation, _)| ConstraintId { index, generation })
    }

    /// Remove everything. All outstanding handles become stale.
    pub fn clear(&mut self) {
        self.cones.clear();
        self.variables.clear();
        self.constraints.clear();
    }

    // ========================================================================
    // Evaluation at the current variable values
    // ========================================================================

    /// Objective value `Σ cⱼ xⱼ` at the current values.
    pub fn objective_value(&self) -> f64 {
        self.variables
            .iter()
            .map(|(_, _, v)| v.objective * v.value)
            .sum()
    }

    /// Left-hand side of a constraint at the current values.
    pub fn lhs(&self, con: ConstraintId) -> ProgramResult<f64> {
        let mut lhs = 0.0;
        for &(var, coef) in &self.constraint(con)?.coefficients {
            lhs += coef * self.value(var)?;
        }
        Ok(lhs)
    }

    /// Largest constraint or cone violation at the current values.
    pub fn max_violation(&self) -> f64 {
        let constraint_violation = self
            .constraints
            .iter()
            .map(|(_, _, entry)| {
                let lhs: f64 = entry
                    .coefficients
                    .iter()
                    .map(|&(var, coef)| coef * self.value(var).unwrap_or(f64::NAN))
                    .sum();
                entry.sense.violation(lhs, entry.rhs)
            })
            .fold(0.0, f64::max);

        let cone_violation = self
            .cones
            .iter()
            .map(|(_, _, entry)| {
                let values: Vec<f64> = entry
                    .variables
                    .iter()
                    .map(|&var| self.value(var).unwrap_or(f64::NAN))
                    .collect();
                entry.cone_type.violation(&values)
            })
            .fold(0.0, f64::max);

        constraint_violation.max(cone_violation)
    }

    /// True if every constraint and cone holds within `tol`.
    pub fn is_feasible(&self, tol: f64) -> bool {
        self.max_violation() <= tol
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn cone(&self, cone: ConeId) -> ProgramResult<&ConeEntry> {
        self.cones
            .get(cone.index, cone.generation)
            .ok_or_else(|| cone.stale())
    }

    fn variable(&self, var: VarId) -> ProgramResult<&VariableEntry> {
        self.variables
            .get(var.index, var.generation)
            .ok_or_else(|| var.stale())
    }

    fn variable_mut(&mut self, var: VarId) -> ProgramResult<&mut VariableEntry> {
        self.variables
            .get_mut(var.index, var.generation)
            .ok_or_else(|| var.stale())
    }

    fn constraint(&self, con: ConstraintId) -> ProgramResult<&ConstraintEntry> {
        self.constraints
            .get(con.index, con.generation)
            .ok_or_else(|| con.stale())
    }

    fn constraint_mut(&mut self, con: ConstraintId) -> ProgramResult<&mut ConstraintEntry> {
        self.constraints
            .get_mut(con.index, con.generation)
            .ok_or_else(|| con.stale())
    }

    fn unlink(&mut self, var: VarId, con: ConstraintId) {
        if let Some(v) = self.variables.get_mut(var.index, var.generation) {
            v.constraints.retain(|&c| c != con);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_delete_cone() {
        let mut program = ConicProgram::new();
        let soc = program.create_cone(ConeType::SecondOrderCone, 3).unwrap();

        assert_eq!(program.num_cones(), 1);
        assert_eq!(program.num_variables(), 3);
        assert_eq!(program.cone_type(soc).unwrap(), ConeType::SecondOrderCone);

        let vars = program.cone_variables(soc).unwrap().to_vec();
        for &v in &vars {
            assert_eq!(program.cone_of(v).unwrap(), soc);
        }

        program.delete_cone(soc).unwrap();
        assert_eq!(program.num_cones(), 0);
        assert_eq!(program.num_variables(), 0);
        for v in vars {
            assert!(!program.has_variable(v));
        }
    }

    #[test]
    fn test_invalid_cone_size() {
        let mut program = ConicProgram::new();
        let err = program
            .create_cone(ConeType::RotatedSecondOrderCone, 2)
            .unwrap_err();
        assert!(matches!(err, ProgramError::InvalidConeSize { size: 2, min: 3, .. }));
        assert_eq!(program.num_cones(), 0);
    }

    #[test]
    fn test_stale_handle_after_slot_reuse() {
        let mut program = ConicProgram::new();
        let x = program.create_nonnegative_variable();
        let cone = program.cone_of(x).unwrap();
        program.delete_cone(cone).unwrap();

        // New variable reuses the slot with a newer generation.
        let y = program.create_nonnegative_variable();
        assert_eq!(x.index(), y.index());
        assert_ne!(x, y);

        assert!(matches!(
            program.value(x),
            Err(ProgramError::StaleHandle { kind: "variable", .. })
        ));
        assert!(program.value(y).is_ok());
    }

    #[test]
    fn test_set_variable_zero_removes_entry() {
        let mut program = ConicProgram::new();
        let x = program.create_nonnegative_variable();
        let y = program.create_nonnegative_variable();
        let con = program.create_constraint();

        program.set_variable(con, x, 1.0).unwrap();
        program.set_variable(con, y, 2.0).unwrap();
        assert_eq!(program.variable_constraints(x).unwrap(), &[con]);

        program.set_variable(con, x, 0.0).unwrap();
        assert_eq!(program.constraint_variables(con).unwrap(), &[(y, 2.0)]);
        assert!(program.variable_constraints(x).unwrap().is_empty());
    }

    #[test]
    fn test_add_variable_accumulates() {
        let mut program = ConicProgram::new();
        let x = program.create_nonnegative_variable();
        let con = program.create_constraint_with(ConstraintSense::LessEqual);

        program.add_variable(con, x, 1.5).unwrap();
        program.add_variable(con, x, -0.5).unwrap();
        assert!((program.coefficient(con, x).unwrap() - 1.0).abs() < 1e-12);

        program.add_variable(con, x, -1.0).unwrap();
        assert!(program.constraint_variables(con).unwrap().is_empty());
    }

    #[test]
    fn test_delete_cone_in_use() {
        let mut program = ConicProgram::new();
        let x = program.create_nonnegative_variable();
        let con = program.create_constraint();
        program.set_variable(con, x, 1.0).unwrap();

        let cone = program.cone_of(x).unwrap();
        assert!(matches!(
            program.delete_cone(cone),
            Err(ProgramError::VariableInUse { constraints: 1, .. })
        ));
        assert!(program.has_variable(x));

        program.delete_constraint(con).unwrap();
        program.delete_cone(cone).unwrap();
        assert_eq!(program.num_variables(), 0);
    }

    #[test]
    fn test_feasibility() {
        let mut program = ConicProgram::new();
        let x = program.create_nonnegative_variable();
        let con = program.create_constraint_with(ConstraintSense::LessEqual);
        program.set_variable(con, x, 1.0).unwrap();
        program.set_rhs(con, 1.0).unwrap();
        program.set_objective_coefficient(x, 2.0).unwrap();

        program.set_value(x, 0.75).unwrap();
        assert!(program.is_feasible(1e-12));
        assert!((program.objective_value() - 1.5).abs() < 1e-12);

        program.set_value(x, 1.25).unwrap();
        assert!((program.max_violation() - 0.25).abs() < 1e-12);

        program.set_value(x, -0.5).unwrap();
        assert!((program.max_violation() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let mut program = ConicProgram::new();
        let x = program.create_nonnegative_variable();
        let con = program.create_constraint();
        program.clear();

        assert_eq!(program.num_cones(), 0);
        assert_eq!(program.num_constraints(), 0);
        assert!(!program.has_variable(x));
        assert!(!program.has_constraint(con));
    }

    #[test]
    fn test_program_ids_are_distinct() {
        let first = ConicProgram::new();
        let second = ConicProgram::new();
        assert_ne!(first.id(), second.id());
        assert_eq!(first.clone().id(), first.id());
    }
}
