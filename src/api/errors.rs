use thiserror::Error;
use url::Url;

use crate::{errors::RequestFailure, job_id::JobId};

use super::types::JobStatus;

/// A job input or client setting rejected before any request is sent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("[E110] Agent key cannot be empty\n\nSuggestions:\n  • Set PARCHA_AGENT_KEY or pass --agent-key\n  • Use the key shown for the agent in the Parcha dashboard")]
    EmptyAgentKey,

    #[error("[E111] {field} must be a JSON object, got {found}\n\nSuggestions:\n  • Wrap the fields in an object, e.g. {{\"business_name\": \"Acme\"}}")]
    SchemaNotObject { field: &'static str, found: &'static str },

    #[error("[E112] Check id cannot be empty\n\nSuggestions:\n  • Use a fully qualified id such as kyb.ein_document_verification")]
    EmptyCheckId,

    #[error("[E113] A check needs exactly one of kyb_schema or kyc_schema")]
    CheckSchema,

    #[error("[E114] Polling needs at least one attempt")]
    ZeroAttempts,
}

impl ValidationError {
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyAgentKey => "E110",
            Self::SchemaNotObject { .. } => "E111",
            Self::EmptyCheckId => "E112",
            Self::CheckSchema => "E113",
            Self::ZeroAttempts => "E114",
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("[E104] Invalid base URL: {0}\n\nSuggestions:\n  • Provide a valid HTTP or HTTPS URL\n  • Example: https://api.parcha.ai\n  • Ensure the URL includes the protocol (http:// or https://)")]
    CannotBeBase(Url),

    #[error("[E105] Invalid URL format: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("[E100] Could not reach the verification service: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("[E115] Could not prepare the HTTP request: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error(transparent)]
    Failure(#[from] RequestFailure),

    #[error("[E106] Unexpected response from {url}: {msg}")]
    InvalidResponse { url: Url, msg: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("[E107] Job {job_id} did not finish in time, last status: {last_status}\n\nSuggestions:\n  • The job keeps running remotely, check it later with `parcha status --job {job_id}`\n  • Increase --max-attempts or --base-delay-ms")]
    PollTimeout { job_id: JobId, last_status: JobStatus },

    #[error("[E108] Job {job_id} failed on the verification service")]
    RemoteJobFailed { job_id: JobId },

    #[error("[E109] Polling job {job_id} was cancelled")]
    Cancelled { job_id: JobId },

    #[error("Polling job {job_id} failed: {source}")]
    Polling {
        job_id: JobId,
        #[source]
        source: Box<ApiClientError>,
    },
}

impl From<reqwest::Error> for ApiClientError {
    /// Builder errors happen before anything is sent, everything else
    /// means no usable response came back.
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::HttpClient(err)
        } else {
            Self::Transport(err)
        }
    }
}

impl ApiClientError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "E100",
            Self::HttpClient(_) => "E115",
            Self::Failure(f) => f.error_code(),
            Self::CannotBeBase(_) => "E104",
            Self::UrlParse(_) => "E105",
            Self::InvalidResponse { .. } => "E106",
            Self::PollTimeout { .. } => "E107",
            Self::RemoteJobFailed { .. } => "E108",
            Self::Cancelled { .. } => "E109",
            Self::Validation(v) => v.error_code(),
            Self::Polling { source, .. } => source.error_code(),
        }
    }

    /// True when no HTTP response was obtained at all.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Polling { source, .. } => source.is_transport(),
            _ => false,
        }
    }

    /// The job this error relates to, if it happened while tracking one.
    pub const fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::PollTimeout { job_id, .. }
            | Self::RemoteJobFailed { job_id }
            | Self::Cancelled { job_id }
            | Self::Polling { job_id, .. } => Some(job_id),
            _ => None,
        }
    }

    pub(crate) fn while_polling(self, job_id: &JobId) -> Self {
        match self {
            already @ Self::Polling { .. } => already,
            other => Self::Polling {
                job_id: job_id.clone(),
                source: Box::new(other),
            },
        }
    }
}
