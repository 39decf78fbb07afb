//! Validation context shared by all entities.

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailureType {
    /// Shown only at high verbosity.
    Info,
    /// Surfaced but non-blocking.
    Warning,
    /// Blocks plan and apply.
    Error,
}

impl std::fmt::Display for FailureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureType::Info => write!(f, "info"),
            FailureType::Warning => write!(f, "warning"),
            FailureType::Error => write!(f, "error"),
        }
    }
}

/// Collects validation failures while walking an expected organization.
#[derive(Debug, Default)]
pub struct ValidationContext {
    failures: Vec<(FailureType, String)>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_failure(&mut self, failure_type: FailureType, message: impl Into<String>) {
        self.failures.push((failure_type, message.into()));
    }

    pub fn failures(&self) -> &[(FailureType, String)] {
        &self.failures
    }

    pub fn count(&self, failure_type: FailureType) -> usize {
        self.failures
            .iter()
            .filter(|(kind, _)| *kind == failure_type)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.count(FailureType::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(FailureType::Warning)
    }

    pub fn info_count(&self) -> usize {
        self.count(FailureType::Info)
    }
}
