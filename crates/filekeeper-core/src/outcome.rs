//! Best-effort operation outcome.
//!
//! Cleanup-style operations (bundle rotation, remote pruning) deliberately
//! downgrade per-item failures to warnings and keep going. Callers still need
//! to distinguish "everything worked" from "some items were skipped", so these
//! operations return a tri-state outcome carrying the per-item errors instead
//! of a bare boolean.

/// Outcome of a best-effort batch operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestEffort {
    /// Every item was handled.
    Complete,
    /// Some items were handled; the rest failed and were skipped.
    Partial { errors: Vec<String> },
    /// The batch could not be attempted at all (e.g. the listing failed).
    Failed { error: String },
}

impl BestEffort {
    /// Build an outcome from a list of per-item errors collected during a batch.
    pub fn from_errors(errors: Vec<String>) -> Self {
        if errors.is_empty() {
            BestEffort::Complete
        } else {
            BestEffort::Partial { errors }
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, BestEffort::Complete)
    }

    /// The per-item (or batch-level) errors, empty when complete.
    pub fn errors(&self) -> &[String] {
        match self {
            BestEffort::Complete => &[],
            BestEffort::Partial { errors } => errors,
            BestEffort::Failed { error } => std::slice::from_ref(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_errors_maps_empty_to_complete() {
        assert!(BestEffort::from_errors(vec![]).is_complete());

        let partial = BestEffort::from_errors(vec!["a".into(), "b".into()]);
        assert!(!partial.is_complete());
        assert_eq!(partial.errors().len(), 2);
    }
}
