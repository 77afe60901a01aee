//! Weighted rules: epigraph feature variables and hinge pieces.
//!
//! A potential `w * max(l₁, …, lₖ)` is minimized through a feature variable
//! `f >= 0` with objective coefficient `w` and one piece constraint
//! `lᵢ - f <= 0` per non-trivial piece. For a squared potential the weight
//! moves to a second variable `s` bounded by `s >= f²`:
//!
//! ```text
//! rotated:   (s, y, f) ∈ RSOC(3), y = 1/2           2·s·y >= f²
//! emulated:  (t, u, v) ∈ SOC(3),  u = f,
//!            v = 1/2 - s/2,  t = 1/2 + s/2          t² - v² = s
//! ```
//!
//! The emulated form is used when the solver lacks rotated cones.

use conic_core::{
    ConeId, ConeType, ConicProgram, ConstraintId, ConstraintSense, ProgramResult, VarId,
};

use super::{ConstraintProxy, ProxyContext};
use crate::error::{ReasonerError, ReasonerResult};
use crate::model::{AtomStore, FunctionTerm, RuleId};

/// Program objects that make up a feature variable.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureStructure {
    /// Plain hinge: the feature variable carries the weight.
    Linear { feature: VarId },
    /// Squared hinge on a rotated cone `(squared, pinned, feature)`.
    Rotated {
        cone: ConeId,
        squared: VarId,
        pinned: VarId,
        feature: VarId,
        pin: ConstraintId,
    },
    /// Squared hinge on a plain second-order cone `(outer, inner_feature,
    /// inner_squared)` tied to standalone `feature` and `squared` variables.
    Emulated {
        feature: VarId,
        squared: VarId,
        cone: ConeId,
        outer: VarId,
        inner_feature: VarId,
        inner_squared: VarId,
        links: [ConstraintId; 3],
    },
}

impl FeatureStructure {
    fn build(program: &mut ConicProgram, squared: bool, rotated: bool) -> ProgramResult<Self> {
        if !squared {
            let feature = program.create_nonnegative_variable();
            return Ok(FeatureStructure::Linear { feature });
        }

        if rotated {
            let cone = program.create_cone(ConeType::RotatedSecondOrderCone, 3)?;
            let vars = program.cone_variables(cone)?;
            let (squared, pinned, feature) = (vars[0], vars[1], vars[2]);
            let pin = program.create_constraint();
            program.set_variable(pin, pinned, 1.0)?;
            program.set_rhs(pin, 0.5)?;
            return Ok(FeatureStructure::Rotated {
                cone,
                squared,
                pinned,
                feature,
                pin,
            });
        }

        let feature = program.create_nonnegative_variable();
        let squared = program.create_nonnegative_variable();
        let cone = program.create_cone(ConeType::SecondOrderCone, 3)?;
        let vars = program.cone_variables(cone)?;
        let (outer, inner_feature, inner_squared) = (vars[0], vars[1], vars[2]);

        let links = [
            Self::link(program, &[(feature, 1.0), (inner_feature, -1.0)], 0.0)?,
            Self::link(program, &[(inner_squared, 1.0), (squared, 0.5)], 0.5)?,
            Self::link(program, &[(outer, 1.0), (squared, -0.5)], 0.5)?,
        ];

        Ok(FeatureStructure::Emulated {
            feature,
            squared,
            cone,
            outer,
            inner_feature,
            inner_squared,
            links,
        })
    }

    fn link(program: &mut ConicProgram, terms: &[(VarId, f64)], rhs: f64) -> ProgramResult<ConstraintId> {
        let con = program.create_constraint_with(ConstraintSense::Equal);
        for &(var, coefficient) in terms {
            program.set_variable(con, var, coefficient)?;
        }
        program.set_rhs(con, rhs)?;
        Ok(con)
    }

    /// Variable that the pieces bound from below.
    pub fn feature(&self) -> VarId {
        match *self {
            FeatureStructure::Linear { feature }
            | FeatureStructure::Rotated { feature, .. }
            | FeatureStructure::Emulated { feature, .. } => feature,
        }
    }

    /// Variable that carries the rule weight in the objective.
    pub fn weighted(&self) -> VarId {
        match *self {
            FeatureStructure::Linear { feature } => feature,
            FeatureStructure::Rotated { squared, .. } | FeatureStructure::Emulated { squared, .. } => {
                squared
            }
        }
    }

    pub fn is_squared(&self) -> bool {
        !matches!(self, FeatureStructure::Linear { .. })
    }

    /// Delete constraints first so that the cones are free to go.
    fn remove(&self, program: &mut ConicProgram) -> ProgramResult<()> {
        match self {
            FeatureStructure::Linear { feature } => {
                let cone = program.cone_of(*feature)?;
                program.delete_cone(cone)
            }
            FeatureStructure::Rotated { cone, pin, .. } => {
                program.delete_constraint(*pin)?;
                program.delete_cone(*cone)
            }
            FeatureStructure::Emulated {
                feature,
                squared,
                cone,
                links,
                ..
            } => {
                for &link in links {
                    program.delete_constraint(link)?;
                }
                program.delete_cone(*cone)?;
                let feature_cone = program.cone_of(*feature)?;
                program.delete_cone(feature_cone)?;
                let squared_cone = program.cone_of(*squared)?;
                program.delete_cone(squared_cone)
            }
        }
    }
}

/// Compiled form of one weighted rule.
///
/// The proxy is either empty (weight zero) or holds one feature structure and
/// its pieces. Weight changes rewrite a single objective coefficient; shape
/// changes tear the structure down and rebuild it.
#[derive(Debug)]
pub struct FunctionProxy {
    program: u64,
    rule: RuleId,
    weight: f64,
    structure: Option<FeatureStructure>,
    pieces: Vec<ConstraintProxy>,
    definition: Option<FunctionTerm>,
}

impl FunctionProxy {
    pub(crate) fn new(
        ctx: &mut ProxyContext<'_>,
        rule: RuleId,
        weight: f64,
        potential: &FunctionTerm,
    ) -> ReasonerResult<Self> {
        let mut proxy = Self {
            program: ctx.program.id(),
            rule,
            weight: 0.0,
            structure: None,
            pieces: Vec::new(),
            definition: None,
        };
        proxy.update_rule(ctx, weight, potential)?;
        Ok(proxy)
    }

    pub fn rule(&self) -> RuleId {
        self.rule
    }

    /// Id of the program the proxy compiles into.
    pub fn program_id(&self) -> u64 {
        self.program
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn is_initialized(&self) -> bool {
        self.structure.is_some()
    }

    pub fn is_squared(&self) -> bool {
        self.structure.as_ref().is_some_and(FeatureStructure::is_squared)
    }

    pub fn structure(&self) -> Option<&FeatureStructure> {
        self.structure.as_ref()
    }

    pub fn feature_variable(&self) -> Option<VarId> {
        self.structure.as_ref().map(FeatureStructure::feature)
    }

    pub fn weighted_variable(&self) -> Option<VarId> {
        self.structure.as_ref().map(FeatureStructure::weighted)
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    pub fn pieces(&self) -> impl Iterator<Item = ConstraintId> + '_ {
        self.pieces.iter().map(ConstraintProxy::constraint)
    }

    /// Potential the current pieces were compiled from.
    pub fn definition(&self) -> Option<&FunctionTerm> {
        self.definition.as_ref()
    }

    /// Recompile the rule: rebuild the feature structure if the squared
    /// shape changed, regenerate every piece and set the weight.
    ///
    /// A zero weight removes everything the proxy owns.
    pub(crate) fn update_rule(
        &mut self,
        ctx: &mut ProxyContext<'_>,
        weight: f64,
        potential: &FunctionTerm,
    ) -> ReasonerResult<()> {
        self.check_weight(weight)?;
        if weight == 0.0 {
            self.remove(ctx.program)?;
            return Ok(());
        }

        let (squared, inner) = match potential {
            FunctionTerm::Squared(inner) => (true, inner.as_ref()),
            other => (false, other),
        };
        check_term(inner, ctx.atoms)?;

        if self.is_initialized() && self.is_squared() != squared {
            log::debug!("Rule {}: squared shape changed, rebuilding", self.rule);
            self.remove(ctx.program)?;
        }

        if self.is_initialized() {
            self.remove_pieces(ctx.program)?;
        } else {
            self.initialize(ctx, squared)?;
        }

        if let Some(feature) = self.feature_variable() {
            self.add_function_term(ctx, feature, inner)?;
        }
        self.definition = Some(potential.clone());
        self.set_weight(ctx.program, weight)?;

        log::debug!(
            "Rule {}: compiled {} piece(s), weight {}",
            self.rule,
            self.pieces.len(),
            weight
        );
        Ok(())
    }

    /// Change only the weight.
    ///
    /// On an initialized proxy this rewrites one objective coefficient and
    /// leaves the structure alone. Moving to zero removes everything; moving
    /// away from zero rebuilds from `potential`.
    pub(crate) fn update_weight(
        &mut self,
        ctx: &mut ProxyContext<'_>,
        weight: f64,
        potential: &FunctionTerm,
    ) -> ReasonerResult<()> {
        self.check_weight(weight)?;
        if weight == 0.0 {
            self.remove(ctx.program)?;
            return Ok(());
        }

        if self.is_initialized() {
            self.set_weight(ctx.program, weight)?;
            Ok(())
        } else {
            self.update_rule(ctx, weight, potential)
        }
    }

    /// Like [`FunctionProxy::update_rule`], but skips recompilation when the
    /// potential is unchanged since the last build.
    pub(crate) fn refresh(
        &mut self,
        ctx: &mut ProxyContext<'_>,
        weight: f64,
        potential: &FunctionTerm,
    ) -> ReasonerResult<()> {
        if weight != 0.0 && self.is_initialized() && self.definition.as_ref() == Some(potential) {
            self.update_weight(ctx, weight, potential)
        } else {
            self.update_rule(ctx, weight, potential)
        }
    }

    /// Build the feature structure.
    pub(crate) fn initialize(&mut self, ctx: &mut ProxyContext<'_>, squared: bool) -> ReasonerResult<()> {
        if self.is_initialized() {
            return Err(ReasonerError::AlreadyInitialized(self.rule));
        }

        let structure = FeatureStructure::build(ctx.program, squared, ctx.rotated_cones())?;
        log::trace!("Rule {}: built feature structure {:?}", self.rule, structure);
        self.structure = Some(structure);
        Ok(())
    }

    /// Emit one piece constraint per linear leaf of `term`.
    fn add_function_term(
        &mut self,
        ctx: &mut ProxyContext<'_>,
        feature: VarId,
        term: &FunctionTerm,
    ) -> ReasonerResult<()> {
        match term {
            FunctionTerm::Max(pieces) => {
                for piece in pieces {
                    self.add_function_term(ctx, feature, piece)?;
                }
                Ok(())
            }
            FunctionTerm::Linear(sum) => {
                // max(..., 0) is already implied by f >= 0
                if sum.is_constant(ctx.atoms)? && sum.evaluate(ctx.atoms)? == 0.0 {
                    return Ok(());
                }
                let piece =
                    ConstraintProxy::build(ctx, sum, &[(feature, -1.0)], ConstraintSense::LessEqual, 0.0)?;
                self.pieces.push(piece);
                Ok(())
            }
            FunctionTerm::Squared(_) => Err(ReasonerError::UnsupportedTerm(format!(
                "nested square in {}",
                term
            ))),
        }
    }

    fn set_weight(&mut self, program: &mut ConicProgram, weight: f64) -> ProgramResult<()> {
        if let Some(structure) = &self.structure {
            program.set_objective_coefficient(structure.weighted(), weight)?;
            if weight != self.weight {
                log::trace!("Rule {}: weight {} -> {}", self.rule, self.weight, weight);
            }
        }
        self.weight = weight;
        Ok(())
    }

    fn check_weight(&self, weight: f64) -> ReasonerResult<()> {
        if weight.is_finite() && weight >= 0.0 {
            Ok(())
        } else {
            Err(ReasonerError::InvalidWeight {
                rule: self.rule,
                weight,
            })
        }
    }

    fn remove_pieces(&mut self, program: &mut ConicProgram) -> ProgramResult<()> {
        for piece in self.pieces.drain(..) {
            piece.remove(program)?;
        }
        Ok(())
    }

    /// Delete the pieces, then the feature structure.
    pub(crate) fn remove(&mut self, program: &mut ConicProgram) -> ProgramResult<()> {
        self.remove_pieces(program)?;
        if let Some(structure) = self.structure.take() {
            structure.remove(program)?;
            log::debug!("Rule {}: removed feature structure", self.rule);
        }
        self.weight = 0.0;
        self.definition = None;
        Ok(())
    }
}

/// Reject potentials that have no conic form before anything is built.
fn check_term(term: &FunctionTerm, atoms: &AtomStore) -> ReasonerResult<()> {
    match term {
        FunctionTerm::Linear(sum) => {
            for &(_, atom) in sum.summands() {
                atoms.get(atom)?;
            }
            Ok(())
        }
        FunctionTerm::Max(pieces) => pieces.iter().try_for_each(|piece| check_term(piece, atoms)),
        FunctionTerm::Squared(_) => Err(ReasonerError::UnsupportedTerm(format!(
            "nested square in {}",
            term
        ))),
    }
}
