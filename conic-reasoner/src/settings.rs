//! Configuration for the term store and reasoner.

use conic_core::{ConeType, ConeTypeSet};

/// Term store settings.
#[derive(Debug, Clone)]
pub struct TermStoreSettings {
    /// Cone types the compiler may emit. `None` asks the attached solver.
    ///
    /// Restricting this set never changes the optimum, only the encoding:
    /// without rotated cones, squared potentials are emulated with plain
    /// second-order cones.
    pub cone_types: Option<ConeTypeSet>,

    /// Number of terms to reserve room for up front.
    pub capacity: usize,

    /// Log per-solve progress at info level.
    pub verbose: bool,
}

impl Default for TermStoreSettings {
    fn default() -> Self {
        // CONIC_ROTATED_CONES=0 forces the plain second-order encoding
        let cone_types = std::env::var("CONIC_ROTATED_CONES")
            .ok()
            .filter(|s| s == "0" || s.eq_ignore_ascii_case("false"))
            .map(|_| ConeTypeSet::all().without(ConeType::RotatedSecondOrderCone));

        let capacity = std::env::var("CONIC_TERM_CAPACITY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);

        Self {
            cone_types,
            capacity,
            verbose: false,
        }
    }
}

impl TermStoreSettings {
    /// Create settings with verbose output enabled.
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            ..Self::default()
        }
    }

    /// Override the cone types reported by the solver.
    pub fn with_cone_types(mut self, cone_types: ConeTypeSet) -> Self {
        self.cone_types = Some(cone_types);
        self
    }

    /// Reserve room for `capacity` terms.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}
