//! Bulk compilation of a rule store into a term store.

use crate::error::ReasonerResult;
use crate::model::{AtomStore, GroundRuleStore};
use crate::term_store::TermStore;

/// Feeds ground rules to a [`TermStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ConicTermGenerator;

impl ConicTermGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Compile every rule and return the number of terms added.
    pub fn generate_terms(
        &self,
        rules: &GroundRuleStore,
        store: &mut TermStore,
        atoms: &AtomStore,
    ) -> ReasonerResult<usize> {
        store.ensure_capacity(store.size() + rules.len());

        let mut count = 0;
        for (rule_id, rule) in rules.iter() {
            store.add_rule(rule_id, rule, atoms)?;
            count += 1;
        }

        log::debug!("Generated {} terms", count);
        Ok(count)
    }

    /// Push the current weight of every weighted rule into the store.
    ///
    /// Returns the number of rules updated.
    pub fn update_weights(
        &self,
        rules: &GroundRuleStore,
        store: &mut TermStore,
        atoms: &AtomStore,
    ) -> ReasonerResult<usize> {
        let mut count = 0;
        for (rule_id, rule) in rules.iter().filter(|(_, rule)| rule.is_weighted()) {
            store.update_weight(rule_id, rule, atoms)?;
            count += 1;
        }
        Ok(count)
    }
}
