//! Per-frame classification results.

use serde::{Deserialize, Serialize};

/// Status label used for synthetic results when a detector fails.
pub const ERROR_STATUS: &str = "error";

/// The instantaneous output of one detector for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Stable identifier of the detector that produced this result.
    #[serde(rename = "module")]
    pub module_id: String,
    /// Discrete status label. Which labels count as alerting is configured
    /// per module, never decided here.
    pub status: String,
    /// Module-defined confidence. Not normalised: some detectors report raw
    /// percentages.
    pub confidence: f32,
    /// Human-readable explanation.
    pub details: String,
}

impl ClassificationResult {
    /// Creates a classification result.
    #[must_use]
    pub fn new(
        module_id: impl Into<String>,
        status: impl Into<String>,
        confidence: f32,
        details: impl Into<String>,
    ) -> Self {
        Self {
            module_id: module_id.into(),
            status: status.into(),
            confidence,
            details: details.into(),
        }
    }

    /// Creates the synthetic result recorded when a detector fails.
    #[must_use]
    pub fn error(module_id: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::new(module_id, ERROR_STATUS, 0.0, cause)
    }

    /// Returns true if this is a synthetic error result.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == ERROR_STATUS
    }

    /// Checks the result against the contract for the given module.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violation found.
    pub fn validate(&self, expected_module: &str) -> Result<(), String> {
        if self.module_id != expected_module {
            return Err(format!(
                "malformed result: module id '{}' does not match '{expected_module}'",
                self.module_id
            ));
        }
        if self.status.trim().is_empty() {
            return Err("malformed result: empty status".to_string());
        }
        if !self.confidence.is_finite() {
            return Err(format!(
                "malformed result: non-finite confidence {}",
                self.confidence
            ));
        }
        Ok(())
    }
}
