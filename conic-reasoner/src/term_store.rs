//! Term store: owns the conic program and the proxies compiled into it.

use conic_core::{ConeTypeSet, ConicProgram, ConicSolver, SolveInfo};
use indexmap::IndexMap;

use crate::error::{ReasonerError, ReasonerResult};
use crate::model::{AtomId, AtomStore, GroundRule, RuleId};
use crate::proxy::{ConstraintProxy, FunctionProxy, Proxy, ProxyContext, VariableProxy};
use crate::settings::TermStoreSettings;

/// Incremental compiler from ground rules to a conic program.
///
/// Each rule owns at most one [`Proxy`]; each random-variable atom owns at
/// most one [`VariableProxy`], created the first time a rule mentions it and
/// shared by every rule afterwards. Terms are kept in insertion order and are
/// addressable by position.
pub struct TermStore {
    program: ConicProgram,
    solver: Box<dyn ConicSolver>,
    cone_types: ConeTypeSet,
    terms: IndexMap<RuleId, Proxy>,
    variables: IndexMap<AtomId, VariableProxy>,
    settings: TermStoreSettings,
}

impl TermStore {
    pub fn new(solver: Box<dyn ConicSolver>, settings: TermStoreSettings) -> Self {
        let cone_types = settings
            .cone_types
            .unwrap_or_else(|| solver.supported_cones());

        log::debug!(
            "Term store for solver {} with cones {}",
            solver.name(),
            cone_types
        );

        Self {
            program: ConicProgram::new(),
            solver,
            cone_types,
            terms: IndexMap::with_capacity(settings.capacity),
            variables: IndexMap::with_capacity(settings.capacity),
            settings,
        }
    }

    pub fn with_solver<S: ConicSolver + 'static>(solver: S, settings: TermStoreSettings) -> Self {
        Self::new(Box::new(solver), settings)
    }

    pub fn program(&self) -> &ConicProgram {
        &self.program
    }

    /// Cone types the compiler emits.
    pub fn capabilities(&self) -> ConeTypeSet {
        self.cone_types
    }

    pub fn solver_name(&self) -> &str {
        self.solver.name()
    }

    pub fn settings(&self) -> &TermStoreSettings {
        &self.settings
    }

    // ========================================================================
    // Variables
    // ========================================================================

    /// Variable proxy of a random-variable atom, created on first request.
    pub fn get_var_proxy(&mut self, atom: AtomId, atoms: &AtomStore) -> ReasonerResult<&VariableProxy> {
        let mut ctx = ProxyContext::new(&mut self.program, &mut self.variables, self.cone_types, atoms);
        ctx.variable_for(atom)?;
        self.variables
            .get(&atom)
            .ok_or(ReasonerError::UnknownAtom(atom))
    }

    /// Variable proxy of an atom if one has been created.
    pub fn var_proxy(&self, atom: AtomId) -> Option<&VariableProxy> {
        self.variables.get(&atom)
    }

    pub fn num_var_proxies(&self) -> usize {
        self.variables.len()
    }

    pub fn var_proxies(&self) -> impl Iterator<Item = &VariableProxy> {
        self.variables.values()
    }

    /// Drop an atom's decision variable, fixing it at its current value in
    /// every constraint that still mentions it.
    ///
    /// Returns `false` if the atom had no variable. A later rule mentioning
    /// the atom creates a fresh one.
    pub fn release_atom(&mut self, atom: AtomId) -> ReasonerResult<bool> {
        let Some(proxy) = self.variables.shift_remove(&atom) else {
            return Ok(false);
        };
        proxy.remove(&mut self.program)?;
        log::debug!("Released variable proxy for atom {}", atom);
        Ok(true)
    }

    /// Copy solved values back into the atoms, clamped to [0, 1].
    pub fn update_atoms(&self, atoms: &mut AtomStore) -> ReasonerResult<()> {
        for (&atom, proxy) in &self.variables {
            let value = self.program.value(proxy.variable())?;
            atoms.get_mut(atom)?.set_value(value.clamp(0.0, 1.0));
        }
        Ok(())
    }

    // ========================================================================
    // Terms
    // ========================================================================

    /// Compile a rule into a new proxy without registering it.
    ///
    /// The proxy's program objects exist immediately; hand it to
    /// [`TermStore::add`] so that they are tracked.
    pub fn build_term(&mut self, rule_id: RuleId, rule: &GroundRule, atoms: &AtomStore) -> ReasonerResult<Proxy> {
        let mut ctx = ProxyContext::new(&mut self.program, &mut self.variables, self.cone_types, atoms);
        match rule {
            GroundRule::Weighted { weight, potential } => {
                FunctionProxy::new(&mut ctx, rule_id, *weight, potential).map(Proxy::Function)
            }
            GroundRule::Hard { constraint } => {
                ConstraintProxy::new(&mut ctx, constraint).map(Proxy::Constraint)
            }
        }
    }

    /// Register a proxy for a rule and return its position.
    ///
    /// A proxy built by another store is rejected untouched. A second proxy
    /// for the same rule is rejected and its program objects are deleted.
    pub fn add(&mut self, rule_id: RuleId, mut proxy: Proxy) -> ReasonerResult<usize> {
        if proxy.program_id() != self.program.id() {
            return Err(ReasonerError::ForeignProxy {
                rule: rule_id,
                expected: self.program.id(),
                found: proxy.program_id(),
            });
        }
        if self.terms.contains_key(&rule_id) {
            proxy.remove(&mut self.program)?;
            return Err(ReasonerError::DuplicateRule(rule_id));
        }

        let (index, _) = self.terms.insert_full(rule_id, proxy);
        log::trace!("Added {} proxy for rule {} at {}", self.terms[index].kind(), rule_id, index);
        Ok(index)
    }

    /// Compile and register a rule.
    pub fn add_rule(&mut self, rule_id: RuleId, rule: &GroundRule, atoms: &AtomStore) -> ReasonerResult<usize> {
        if self.terms.contains_key(&rule_id) {
            return Err(ReasonerError::DuplicateRule(rule_id));
        }
        let proxy = self.build_term(rule_id, rule, atoms)?;
        self.add(rule_id, proxy)
    }

    /// Push a changed weight into the rule's proxy.
    ///
    /// Only the objective coefficient changes unless the weight moves to or
    /// from zero.
    pub fn update_weight(&mut self, rule_id: RuleId, rule: &GroundRule, atoms: &AtomStore) -> ReasonerResult<()> {
        let proxy = function_proxy_mut(&mut self.terms, rule_id)?;
        let GroundRule::Weighted { weight, potential } = rule else {
            return Err(ReasonerError::RuleKindMismatch {
                rule: rule_id,
                rule_kind: rule.kind(),
                proxy_kind: "function",
            });
        };
        let mut ctx = ProxyContext::new(&mut self.program, &mut self.variables, self.cone_types, atoms);
        proxy.update_weight(&mut ctx, *weight, potential)
    }

    /// Bring the rule's proxy in line with a possibly changed rule.
    ///
    /// Weighted rules whose potential is unchanged only get their weight
    /// rewritten; anything else is recompiled. Hard rules are rebuilt.
    pub fn update_rule(&mut self, rule_id: RuleId, rule: &GroundRule, atoms: &AtomStore) -> ReasonerResult<()> {
        let proxy = self
            .terms
            .get_mut(&rule_id)
            .ok_or(ReasonerError::RuleNotFound(rule_id))?;
        let mut ctx = ProxyContext::new(&mut self.program, &mut self.variables, self.cone_types, atoms);

        match (proxy, rule) {
            (Proxy::Function(function), GroundRule::Weighted { weight, potential }) => {
                function.refresh(&mut ctx, *weight, potential)
            }
            (Proxy::Constraint(existing), GroundRule::Hard { constraint }) => {
                let replacement = ConstraintProxy::new(&mut ctx, constraint)?;
                existing.remove(ctx.program)?;
                *existing = replacement;
                Ok(())
            }
            (proxy, rule) => Err(ReasonerError::RuleKindMismatch {
                rule: rule_id,
                rule_kind: rule.kind(),
                proxy_kind: proxy.kind(),
            }),
        }
    }

    /// Remove a rule's proxy and every program object it owns.
    ///
    /// Variable proxies stay; they belong to the atoms.
    pub fn remove(&mut self, rule_id: RuleId) -> ReasonerResult<()> {
        let mut proxy = self
            .terms
            .shift_remove(&rule_id)
            .ok_or(ReasonerError::RuleNotFound(rule_id))?;
        proxy.remove(&mut self.program)?;
        log::trace!("Removed {} proxy for rule {}", proxy.kind(), rule_id);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&Proxy> {
        self.terms.get_index(index).map(|(_, proxy)| proxy)
    }

    pub fn get_rule(&self, rule_id: RuleId) -> Option<&Proxy> {
        self.terms.get(&rule_id)
    }

    /// Positions of the terms compiled from a rule.
    pub fn get_term_indices(&self, rule_id: RuleId) -> ReasonerResult<Vec<usize>> {
        self.terms
            .get_index_of(&rule_id)
            .map(|index| vec![index])
            .ok_or(ReasonerError::RuleNotFound(rule_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (RuleId, &Proxy)> {
        self.terms.iter().map(|(&rule, proxy)| (rule, proxy))
    }

    /// Number of terms.
    pub fn size(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn ensure_capacity(&mut self, capacity: usize) {
        self.terms.reserve(capacity.saturating_sub(self.terms.len()));
    }

    /// Drop every term and variable proxy.
    pub fn clear(&mut self) {
        self.terms.clear();
        self.variables.clear();
        self.program.clear();
    }

    /// Release the store and its program.
    pub fn close(mut self) {
        log::debug!(
            "Closing term store: {} terms, {} variable proxies",
            self.terms.len(),
            self.variables.len()
        );
        self.clear();
    }

    // ========================================================================
    // Solving
    // ========================================================================

    /// Solve the current program in place.
    pub fn solve(&mut self) -> ReasonerResult<SolveInfo> {
        if self.settings.verbose {
            log::info!(
                "Solving with {}: {} cones, {} variables, {} constraints",
                self.solver.name(),
                self.program.num_cones(),
                self.program.num_variables(),
                self.program.num_constraints()
            );
        }
        Ok(self.solver.solve(&mut self.program)?)
    }
}

fn function_proxy_mut(terms: &mut IndexMap<RuleId, Proxy>, rule_id: RuleId) -> ReasonerResult<&mut FunctionProxy> {
    match terms.get_mut(&rule_id) {
        Some(Proxy::Function(proxy)) => Ok(proxy),
        Some(other) => Err(ReasonerError::ProxyMismatch {
            rule: rule_id,
            expected: "function",
            found: other.kind(),
        }),
        None => Err(ReasonerError::RuleNotFound(rule_id)),
    }
}

impl std::fmt::Debug for TermStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermStore")
            .field("solver", &self.solver.name())
            .field("cone_types", &self.cone_types)
            .field("terms", &self.terms.len())
            .field("variables", &self.variables.len())
            .finish()
    }
}
