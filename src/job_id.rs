use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identifier the verification service assigns to a submitted job.
///
/// The value is opaque to this client; the only requirement is that it
/// can travel as a query parameter unchanged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobIdError {
    #[error("Job id cannot be empty")]
    Empty,
    #[error("{0:?} is not a valid job id, it must not contain whitespace")]
    Whitespace(String),
}

impl JobId {
    /// # Errors
    ///
    /// Will fail if `raw` is empty or contains whitespace.
    pub fn new(raw: &str) -> Result<Self, JobIdError> {
        if raw.is_empty() {
            Err(JobIdError::Empty)
        } else if raw.chars().any(char::is_whitespace) {
            Err(JobIdError::Whitespace(raw.to_string()))
        } else {
            Ok(Self(raw.into()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl std::str::FromStr for JobId {
    type Err = JobIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
