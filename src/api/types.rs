use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Status of a job or of a single check within it.
///
/// The service reports success as either `completed` or `complete`.
/// Anything it reports that this client does not know about is kept
/// verbatim and treated as still in progress.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Other(String),
}

impl JobStatus {
    /// `completed` and `failed` are final, polling must stop there.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for JobStatus {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "completed" | "complete" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for JobStatus {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_owned())
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Other(raw) => raw,
            known => known.as_str().to_owned(),
        }
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The fixed set of remote endpoints, relative to the configured base URL.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Endpoint {
    StartKybAgentJob,
    StartKycAgentJob,
    RunCheck,
    GetJobById,
    GetJobsByCaseId,
}

impl Endpoint {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::StartKybAgentJob => "startKYBAgentJob",
            Self::StartKycAgentJob => "startKYCAgentJob",
            Self::RunCheck => "runCheck",
            Self::GetJobById => "getJobById",
            Self::GetJobsByCaseId => "getJobsByCaseId",
        }
    }

    #[must_use]
    pub fn method(self) -> reqwest::Method {
        match self {
            Self::StartKybAgentJob | Self::StartKycAgentJob | Self::RunCheck => {
                reqwest::Method::POST
            }
            Self::GetJobById | Self::GetJobsByCaseId => reqwest::Method::GET,
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.path())
    }
}
