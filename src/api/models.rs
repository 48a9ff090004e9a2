use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{errors::ValidationError, types::Endpoint, types::JobStatus};
use crate::job_id::JobId;

/// Open key-value verification schema, shaped by the agent configuration
/// on the service side.
pub type Schema = Map<String, Value>;

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn schema_object(field: &'static str, value: Value) -> Result<Schema, ValidationError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ValidationError::SchemaNotObject {
            field,
            found: json_kind(&other),
        }),
    }
}

fn check_agent_key(agent_key: &str) -> Result<(), ValidationError> {
    if agent_key.trim().is_empty() {
        Err(ValidationError::EmptyAgentKey)
    } else {
        Ok(())
    }
}

const fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KybJobInput {
    pub agent_key: String,
    pub kyb_schema: Schema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default = "default_true")]
    pub run_in_parallel: bool,
}

impl KybJobInput {
    /// # Errors
    ///
    /// Fails if `agent_key` is blank or `kyb_schema` is not a JSON object.
    pub fn new(agent_key: impl Into<String>, kyb_schema: Value) -> Result<Self, ValidationError> {
        let agent_key = agent_key.into();
        check_agent_key(&agent_key)?;
        Ok(Self {
            agent_key,
            kyb_schema: schema_object("kyb_schema", kyb_schema)?,
            webhook_url: None,
            run_in_parallel: true,
        })
    }

    #[must_use]
    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    #[must_use]
    pub const fn run_in_parallel(mut self, run_in_parallel: bool) -> Self {
        self.run_in_parallel = run_in_parallel;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KycJobInput {
    pub agent_key: String,
    pub kyc_schema: Schema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default = "default_true")]
    pub run_in_parallel: bool,
}

impl KycJobInput {
    /// # Errors
    ///
    /// Fails if `agent_key` is blank or `kyc_schema` is not a JSON object.
    pub fn new(agent_key: impl Into<String>, kyc_schema: Value) -> Result<Self, ValidationError> {
        let agent_key = agent_key.into();
        check_agent_key(&agent_key)?;
        Ok(Self {
            agent_key,
            kyc_schema: schema_object("kyc_schema", kyc_schema)?,
            webhook_url: None,
            run_in_parallel: true,
        })
    }

    #[must_use]
    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    #[must_use]
    pub const fn run_in_parallel(mut self, run_in_parallel: bool) -> Self {
        self.run_in_parallel = run_in_parallel;
        self
    }
}

/// A single check run against either a business or an individual.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckJobInput {
    pub agent_key: String,
    pub check_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_args: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kyb_schema: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kyc_schema: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default = "default_true")]
    pub run_in_parallel: bool,
}

impl CheckJobInput {
    /// # Errors
    ///
    /// Fails on a blank agent key or check id, or a non-object schema.
    pub fn kyb(
        agent_key: impl Into<String>,
        check_id: impl Into<String>,
        kyb_schema: Value,
    ) -> Result<Self, ValidationError> {
        let mut input = Self::bare(agent_key.into(), check_id.into())?;
        input.kyb_schema = Some(schema_object("kyb_schema", kyb_schema)?);
        Ok(input)
    }

    /// # Errors
    ///
    /// Fails on a blank agent key or check id, or a non-object schema.
    pub fn kyc(
        agent_key: impl Into<String>,
        check_id: impl Into<String>,
        kyc_schema: Value,
    ) -> Result<Self, ValidationError> {
        let mut input = Self::bare(agent_key.into(), check_id.into())?;
        input.kyc_schema = Some(schema_object("kyc_schema", kyc_schema)?);
        Ok(input)
    }

    fn bare(agent_key: String, check_id: String) -> Result<Self, ValidationError> {
        check_agent_key(&agent_key)?;
        if check_id.trim().is_empty() {
            return Err(ValidationError::EmptyCheckId);
        }
        Ok(Self {
            agent_key,
            check_id,
            check_args: None,
            kyb_schema: None,
            kyc_schema: None,
            webhook_url: None,
            run_in_parallel: true,
        })
    }

    /// # Errors
    ///
    /// Fails if `check_args` is not a JSON object.
    pub fn with_check_args(mut self, check_args: Value) -> Result<Self, ValidationError> {
        self.check_args = Some(schema_object("check_args", check_args)?);
        Ok(self)
    }

    #[must_use]
    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }
}

/// Anything that can be submitted as a job.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobInput {
    Kyb(KybJobInput),
    Kyc(KycJobInput),
    Check(CheckJobInput),
}

impl JobInput {
    #[must_use]
    pub const fn endpoint(&self) -> Endpoint {
        match self {
            Self::Kyb(_) => Endpoint::StartKybAgentJob,
            Self::Kyc(_) => Endpoint::StartKycAgentJob,
            Self::Check(_) => Endpoint::RunCheck,
        }
    }

    #[must_use]
    pub fn webhook_url(&self) -> Option<&str> {
        match self {
            Self::Kyb(input) => input.webhook_url.as_deref(),
            Self::Kyc(input) => input.webhook_url.as_deref(),
            Self::Check(input) => input.webhook_url.as_deref(),
        }
    }

    #[must_use]
    pub fn agent_key(&self) -> &str {
        match self {
            Self::Kyb(input) => &input.agent_key,
            Self::Kyc(input) => &input.agent_key,
            Self::Check(input) => &input.agent_key,
        }
    }

    /// Re-checks the invariants the constructors enforce, for inputs built
    /// through public fields or deserialized from elsewhere.
    ///
    /// # Errors
    ///
    /// Fails on a blank agent key, a blank check id, or a check without
    /// exactly one schema.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_agent_key(self.agent_key())?;
        if let Self::Check(check) = self {
            if check.check_id.trim().is_empty() {
                return Err(ValidationError::EmptyCheckId);
            }
            if check.kyb_schema.is_some() == check.kyc_schema.is_some() {
                return Err(ValidationError::CheckSchema);
            }
        }
        Ok(())
    }
}

impl From<KybJobInput> for JobInput {
    fn from(input: KybJobInput) -> Self {
        Self::Kyb(input)
    }
}

impl From<KycJobInput> for JobInput {
    fn from(input: KycJobInput) -> Self {
        Self::Kyc(input)
    }
}

impl From<CheckJobInput> for JobInput {
    fn from(input: CheckJobInput) -> Self {
        Self::Check(input)
    }
}

/// Raw answer to a job submission, passed through unmodified.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct JobDispatch {
    pub job_id: JobId,
    pub status: String,
}

/// Optional parts of a job to include when fetching it by id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JobQuery {
    pub include_check_result_ids: bool,
    pub include_check_results: bool,
    pub include_status_messages: bool,
}

impl JobQuery {
    /// Check results and status messages, what polling asks for.
    #[must_use]
    pub const fn detailed() -> Self {
        Self {
            include_check_result_ids: false,
            include_check_results: true,
            include_status_messages: true,
        }
    }

    pub(crate) fn params(&self, job_id: &JobId) -> Vec<(&'static str, String)> {
        vec![
            ("job_id", job_id.to_string()),
            (
                "include_check_result_ids",
                self.include_check_result_ids.to_string(),
            ),
            (
                "include_check_results",
                self.include_check_results.to_string(),
            ),
            (
                "include_status_messages",
                self.include_status_messages.to_string(),
            ),
        ]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaseQuery {
    pub include_check_results: bool,
    pub include_status_messages: bool,
}

impl CaseQuery {
    pub(crate) fn params(&self, case_id: &str, agent_key: &str) -> Vec<(&'static str, String)> {
        vec![
            ("case_id", case_id.to_owned()),
            ("agent_key", agent_key.to_owned()),
            (
                "include_check_results",
                self.include_check_results.to_string(),
            ),
            (
                "include_status_messages",
                self.include_status_messages.to_string(),
            ),
        ]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct StatusMessage {
    #[serde(default)]
    pub content: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StatusMessage {
    /// Human readable progress line, `content.status`.
    pub fn status_text(&self) -> Option<&str> {
        self.content.get("status").and_then(Value::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CheckResult {
    #[serde(alias = "command_id")]
    pub check_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub status_messages: Vec<StatusMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CheckResult {
    pub fn latest_status_message(&self) -> Option<&StatusMessage> {
        self.status_messages.last()
    }
}

/// Snapshot of a job as returned by one fetch. Each poll yields a fresh one.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Job {
    #[serde(alias = "id")]
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_results: Option<Vec<CheckResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_result_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_messages: Option<Vec<StatusMessage>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Job {
    /// A job known only by id, used when delivery is left to a webhook.
    #[must_use]
    pub fn pending(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            check_results: None,
            check_result_ids: None,
            status_messages: None,
            extra: Map::new(),
        }
    }

    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn check_results(&self) -> &[CheckResult] {
        self.check_results.as_deref().unwrap_or_default()
    }

    pub fn status_messages(&self) -> &[StatusMessage] {
        self.status_messages.as_deref().unwrap_or_default()
    }

    pub fn recommendation(&self) -> Option<&str> {
        self.extra.get("recommendation").and_then(Value::as_str)
    }
}
