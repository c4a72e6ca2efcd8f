use std::fmt;

use serde::{Deserialize, Serialize};

/// Wire-level status codes carried in a `testStepResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
    Undefined,
    Pending,
    Unknown,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Passed => "PASSED",
            StepStatus::Failed => "FAILED",
            StepStatus::Skipped => "SKIPPED",
            StepStatus::Undefined => "UNDEFINED",
            StepStatus::Pending => "PENDING",
            StepStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a runner-reported step status onto the wire vocabulary.
///
/// Total: anything outside the known runner statuses becomes
/// [`StepStatus::Unknown`]. Matching is exact, as runners report lower-case
/// names.
pub fn map_status(status: &str) -> StepStatus {
    match status {
        "passed" => StepStatus::Passed,
        "failed" => StepStatus::Failed,
        "skipped" => StepStatus::Skipped,
        "undefined" => StepStatus::Undefined,
        "untested" => StepStatus::Pending,
        _ => StepStatus::Unknown,
    }
}
