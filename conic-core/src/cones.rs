//! Cone types, capability sets and membership tests.
//!
//! Every cone orders its variables apex first, matching the canonical
//! standard form used by [`StandardForm`](crate::StandardForm):
//!
//! ```text
//! NonNegativeOrthant        (x₁, …, xₙ)        xᵢ ≥ 0
//! SecondOrderCone           (t, x₁, …, xₙ₋₁)    t ≥ ‖x‖₂
//! RotatedSecondOrderCone    (x, y, z₁, …)       2·x·y ≥ ‖z‖², x, y ≥ 0
//! ```

use std::fmt;

/// Kind of cone a group of variables is constrained to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConeType {
    /// Nonnegative orthant ℝ₊ⁿ.
    NonNegativeOrthant,
    /// Second-order (Lorentz) cone.
    SecondOrderCone,
    /// Rotated second-order cone.
    RotatedSecondOrderCone,
}

impl ConeType {
    /// All cone types, in a stable order.
    pub const ALL: [ConeType; 3] = [
        ConeType::NonNegativeOrthant,
        ConeType::SecondOrderCone,
        ConeType::RotatedSecondOrderCone,
    ];

    /// Smallest number of variables a cone of this type may hold.
    pub fn min_size(self) -> usize {
        match self {
            ConeType::NonNegativeOrthant => 1,
            ConeType::SecondOrderCone => 2,
            ConeType::RotatedSecondOrderCone => 3,
        }
    }

    fn bit(self) -> u8 {
        match self {
            ConeType::NonNegativeOrthant => 1,
            ConeType::SecondOrderCone => 1 << 1,
            ConeType::RotatedSecondOrderCone => 1 << 2,
        }
    }

    /// Check whether `values` (one entry per cone variable) lies in the cone
    /// up to an absolute tolerance.
    pub fn contains(self, values: &[f64], tol: f64) -> bool {
        self.violation(values) <= tol
    }

    /// Amount by which `values` misses the cone (0 when inside).
    ///
    /// Fewer than [`ConeType::min_size`] values never lie in the cone.
    pub fn violation(self, values: &[f64]) -> f64 {
        if values.len() < self.min_size() || values.iter().any(|v| v.is_nan()) {
            return f64::INFINITY;
        }

        match self {
            ConeType::NonNegativeOrthant => values
                .iter()
                .map(|&v| (-v).max(0.0))
                .fold(0.0, f64::max),
            ConeType::SecondOrderCone => {
                let t = values[0];
                let x_norm = values[1..].iter().map(|&x| x * x).sum::<f64>().sqrt();
                (x_norm - t).max(0.0)
            }
            ConeType::RotatedSecondOrderCone => {
                let (x, y) = (values[0], values[1]);
                // Equivalent SOC: (x+y)/√2 ≥ ‖((x−y)/√2, z)‖
                let t = (x + y) * std::f64::consts::FRAC_1_SQRT_2;
                let u = (x - y) * std::f64::consts::FRAC_1_SQRT_2;
                let tail = u * u + values[2..].iter().map(|&z| z * z).sum::<f64>();
                (-x).max(0.0).max((-y).max(0.0)).max(tail.sqrt() - t)
            }
        }
    }
}

impl fmt::Display for ConeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConeType::NonNegativeOrthant => write!(f, "NonNegativeOrthant"),
            ConeType::SecondOrderCone => write!(f, "SecondOrderCone"),
            ConeType::RotatedSecondOrderCone => write!(f, "RotatedSecondOrderCone"),
        }
    }
}

/// Set of cone types, used to describe what a solver accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConeTypeSet(u8);

impl ConeTypeSet {
    /// Empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every cone type.
    pub const fn all() -> Self {
        Self(0b111)
    }

    /// Nonnegative orthant and plain second-order cones.
    pub const fn linear_and_soc() -> Self {
        Self(0b011)
    }

    /// Set holding a single cone type.
    pub fn only(cone_type: ConeType) -> Self {
        Self(cone_type.bit())
    }

    /// Add a cone type.
    pub fn with(self, cone_type: ConeType) -> Self {
        Self(self.0 | cone_type.bit())
    }

    /// Remove a cone type.
    pub fn without(self, cone_type: ConeType) -> Self {
        Self(self.0 & !cone_type.bit())
    }

    pub fn contains(self, cone_type: ConeType) -> bool {
        self.0 & cone_type.bit() != 0
    }

    /// True if every type in `other` is also in `self`.
    pub fn contains_all(self, other: ConeTypeSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate the member types in [`ConeType::ALL`] order.
    pub fn iter(self) -> impl Iterator<Item = ConeType> {
        ConeType::ALL.into_iter().filter(move |&t| self.contains(t))
    }
}

impl FromIterator<ConeType> for ConeTypeSet {
    fn from_iter<I: IntoIterator<Item = ConeType>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl fmt::Display for ConeTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|t| t.to_string()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cone_type_set() {
        let set = ConeTypeSet::linear_and_soc();
        assert!(set.contains(ConeType::NonNegativeOrthant));
        assert!(set.contains(ConeType::SecondOrderCone));
        assert!(!set.contains(ConeType::RotatedSecondOrderCone));

        let rsoc = ConeTypeSet::only(ConeType::RotatedSecondOrderCone);
        assert!(!set.contains_all(rsoc));
        assert!(ConeTypeSet::all().contains_all(rsoc));
        assert!(ConeTypeSet::all().contains_all(ConeTypeSet::empty()));

        let collected: ConeTypeSet = ConeType::ALL.into_iter().collect();
        assert_eq!(collected, ConeTypeSet::all());
        assert_eq!(
            ConeTypeSet::all().without(ConeType::RotatedSecondOrderCone),
            set
        );
    }

    #[test]
    fn test_nonneg_membership() {
        assert!(ConeType::NonNegativeOrthant.contains(&[0.0, 1.0, 2.5], 1e-12));
        assert!(!ConeType::NonNegativeOrthant.contains(&[0.0, -0.1], 1e-12));
        assert!((ConeType::NonNegativeOrthant.violation(&[-0.25, -0.5]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_soc_membership() {
        // (5, 3, 4): boundary point
        assert!(ConeType::SecondOrderCone.contains(&[5.0, 3.0, 4.0], 1e-9));
        assert!(!ConeType::SecondOrderCone.contains(&[4.9, 3.0, 4.0], 1e-9));
        assert!(!ConeType::SecondOrderCone.contains(&[f64::NAN, 0.0], 1e-9));
    }

    #[test]
    fn test_short_values_are_outside() {
        assert_eq!(ConeType::SecondOrderCone.violation(&[]), f64::INFINITY);
        assert!(!ConeType::SecondOrderCone.contains(&[1.0], 1e-9));
        assert_eq!(ConeType::RotatedSecondOrderCone.violation(&[1.0]), f64::INFINITY);
        assert!(!ConeType::RotatedSecondOrderCone.contains(&[1.0, 1.0], 1e-9));
        assert!(!ConeType::NonNegativeOrthant.contains(&[], 1e-9));
    }

    #[test]
    fn test_rsoc_membership() {
        // 2·x·y ≥ z²: x = 0.49, y = 0.5 → 0.49 ≥ 0.7² holds with equality
        assert!(ConeType::RotatedSecondOrderCone.contains(&[0.49, 0.5, 0.7], 1e-9));
        assert!(!ConeType::RotatedSecondOrderCone.contains(&[0.40, 0.5, 0.7], 1e-9));
        assert!(!ConeType::RotatedSecondOrderCone.contains(&[-1.0, -1.0, 0.0], 1e-9));
    }
}
