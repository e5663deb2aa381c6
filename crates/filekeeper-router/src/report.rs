use serde::Serialize;

/// Outcome of one routing pass over the drop zone.
///
/// A warning means a file was left in place for a human to look at; an error
/// means a move was attempted and did not complete cleanly.
#[derive(Debug, Default, Serialize)]
pub struct RoutingReport {
    /// Files moved to a destination folder.
    pub routed: usize,
    /// Files removed because identical content already existed at the
    /// destination.
    pub duplicates: usize,
    /// Hidden and system files ignored entirely.
    pub skipped: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// Names of files whose move failed; they remain in the drop zone.
    pub failed_files: Vec<String>,
}

impl RoutingReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.failed_files.is_empty()
    }

    pub fn total_processed(&self) -> usize {
        self.routed + self.duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_report_is_clean() {
        let report = RoutingReport::default();
        assert!(report.is_clean());
        assert_eq!(report.total_processed(), 0);
    }

    #[test]
    fn failed_files_make_report_dirty() {
        let report = RoutingReport {
            routed: 3,
            failed_files: vec!["broken.pdf".to_string()],
            ..Default::default()
        };
        assert!(!report.is_clean());
        assert_eq!(report.total_processed(), 3);
    }
}
