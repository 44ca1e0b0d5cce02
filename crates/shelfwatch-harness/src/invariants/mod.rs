//! Structural invariants of the library model.
//!
//! The rule checker guards what the SUT may do; these invariants guard the
//! model itself. They are run on every committed model: a violation means
//! the oracle is broken, not the SUT.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! registry.check_all(&model)?;
//! ```

mod checks;

use shelfwatch_core::LibrarySystem;

pub use checks::{
    HolderConsistency, ReservationConsistency, ShelfIndexConsistency, TraceMatchesLocation,
};

/// Invariant check result.
pub type InvariantResult = Result<(), InvariantViolation>;

/// Invariant violation with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for InvariantViolation {}

/// A property that must hold for every committed model.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against `model`.
    fn check(&self, model: &LibrarySystem) -> InvariantResult;
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with every model invariant.
    ///
    /// Includes:
    /// - [`TraceMatchesLocation`]: traces chain and end where the copy is
    /// - [`HolderConsistency`]: loans and holders agree
    /// - [`ReservationConsistency`]: both sides of a reservation agree
    /// - [`ShelfIndexConsistency`]: the shelf index matches copy locations
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(TraceMatchesLocation);
        registry.add(HolderConsistency);
        registry.add(ReservationConsistency);
        registry.add(ShelfIndexConsistency);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against `model`.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(&self, model: &LibrarySystem) -> Result<(), Vec<InvariantViolation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(model).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use shelfwatch_proto::Inventory;

    use super::*;

    #[test]
    fn standard_registry_has_invariants() {
        let registry = InvariantRegistry::standard();
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn fresh_library_passes_invariants() {
        let inventory = Inventory::new(vec![
            ("A-0001".parse().unwrap(), 2),
            ("C-0420".parse().unwrap(), 3),
        ])
        .unwrap();
        let model = LibrarySystem::from_inventory(&inventory).unwrap();
        assert!(InvariantRegistry::standard().check_all(&model).is_ok());
        assert!(InvariantRegistry::standard().check_all(&LibrarySystem::new()).is_ok());
    }
}
