use serde::{Deserialize, Serialize};

use crate::status::StepStatus;

/// One self-describing message, tagged by its single top-level key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Envelope {
    TestStepFinished(TestStepFinished),
    TestRunFinished(TestRunFinished),
}

impl Envelope {
    /// Build a `testStepFinished` envelope.
    pub fn step_finished(
        test_step_id: impl Into<String>,
        status: StepStatus,
        duration_nanos: u64,
    ) -> Self {
        Envelope::TestStepFinished(TestStepFinished {
            test_step_id: test_step_id.into(),
            test_step_result: TestStepResult {
                status,
                duration: duration_nanos,
            },
        })
    }

    /// Build a `testRunFinished` envelope with a zeroed timestamp.
    pub fn run_finished(success: bool) -> Self {
        Envelope::TestRunFinished(TestRunFinished {
            success,
            timestamp: Timestamp::default(),
        })
    }

    /// Top-level key used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::TestStepFinished(_) => "testStepFinished",
            Envelope::TestRunFinished(_) => "testRunFinished",
        }
    }

    pub fn is_run_finished(&self) -> bool {
        matches!(self, Envelope::TestRunFinished(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStepFinished {
    pub test_step_id: String,
    pub test_step_result: TestStepResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStepResult {
    pub status: StepStatus,
    /// Elapsed time in nanoseconds.
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRunFinished {
    pub success: bool,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}
