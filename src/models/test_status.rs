use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a test session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    InProgress,
    Paused,
    Completed,
    Passed,
    Failed,
    Abandoned,
}

impl TestStatus {
    pub const ALL: [TestStatus; 6] = [
        TestStatus::InProgress,
        TestStatus::Paused,
        TestStatus::Completed,
        TestStatus::Passed,
        TestStatus::Failed,
        TestStatus::Abandoned,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::InProgress => "in_progress",
            TestStatus::Paused => "paused",
            TestStatus::Completed => "completed",
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Abandoned => "abandoned",
        }
    }

    /// The session can still be advanced or abandoned.
    pub fn is_active(self) -> bool {
        matches!(self, TestStatus::InProgress | TestStatus::Paused)
    }

    /// The session ended with a defined score.
    pub fn has_result(self) -> bool {
        matches!(
            self,
            TestStatus::Completed | TestStatus::Passed | TestStatus::Failed
        )
    }

    /// Terminal; no further mutation is allowed.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            TestStatus::Completed | TestStatus::Passed | TestStatus::Failed | TestStatus::Abandoned
        )
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TestStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown test status '{}'", s))
    }
}
