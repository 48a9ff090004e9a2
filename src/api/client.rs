use std::fmt;

use reqwest::{
    blocking::{self, Client},
    header::{HeaderMap, HeaderValue, USER_AGENT},
};
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use crate::{config::ClientConfig, job_id::JobId};

use super::errors::ApiClientError;
use super::models::{CaseQuery, CheckJobInput, Job, JobDispatch, JobInput, JobQuery};
use super::transport;
use super::types::Endpoint;

/// Blocking client for the verification API.
///
/// Holds only immutable configuration and a connection pool, so one
/// instance can be shared by any number of threads.
#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    token: String,
    client: Client,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.base.as_str())
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// # Errors
    ///
    /// Fails if the configured base `Url` cannot be a base, we rely on
    /// that invariant in other methods, or if the HTTP client cannot be
    /// built.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiClientError> {
        let base = transport::check_base(config.base_url.clone())?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(transport::USER_AGENT));

        let mut builder = blocking::Client::builder().default_headers(headers);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            base,
            token: config.token.clone(),
            client: builder.build().map_err(ApiClientError::HttpClient)?,
        })
    }

    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    /// Performs one request and decodes the JSON answer. No retries.
    ///
    /// # Errors
    ///
    /// `Transport` when no response was obtained, `Failure` on a non-2xx
    /// status, `InvalidResponse` when the body does not decode as `T`.
    pub fn call<T, B>(
        &self,
        endpoint: Endpoint,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T, ApiClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = transport::endpoint_url(&self.base, endpoint)?;
        let method = endpoint.method();
        log::debug!("{method} {url}");

        let mut request = self
            .client
            .request(method, url.clone())
            .bearer_auth(&self.token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send()?;
        let status = response.status();
        let text = response.text()?;

        transport::decode(&url, status, &text)
    }

    /// Starts a KYB, KYC or check job. Each call creates a new job.
    ///
    /// # Errors
    ///
    /// `Validation` before any request if the input is malformed,
    /// otherwise whatever the request fails with.
    pub fn submit_job(&self, input: &JobInput) -> Result<JobDispatch, ApiClientError> {
        input.validate()?;
        let dispatch: JobDispatch = self.call(input.endpoint(), &[], Some(input))?;
        log::info!(
            "Submitted {} job {} ({})",
            input.endpoint(),
            dispatch.job_id,
            dispatch.status
        );
        Ok(dispatch)
    }

    /// # Errors
    ///
    /// Will return `Err` on network error or a non-2xx answer.
    pub fn fetch_job(&self, job_id: &JobId, query: &JobQuery) -> Result<Job, ApiClientError> {
        self.call::<_, ()>(Endpoint::GetJobById, &query.params(job_id), None)
    }

    /// Jobs attached to a case, in whatever order the service returns them.
    ///
    /// # Errors
    ///
    /// Will return `Err` on network error or a non-2xx answer.
    pub fn fetch_jobs_by_case(
        &self,
        case_id: &str,
        agent_key: &str,
        query: &CaseQuery,
    ) -> Result<Vec<Job>, ApiClientError> {
        self.call::<_, ()>(
            Endpoint::GetJobsByCaseId,
            &query.params(case_id, agent_key),
            None,
        )
    }

    /// Runs a single check synchronously on the service side.
    ///
    /// # Errors
    ///
    /// `Validation` before any request if the input is malformed,
    /// otherwise whatever the request fails with.
    pub fn run_check(&self, input: &CheckJobInput) -> Result<Job, ApiClientError> {
        let input = JobInput::Check(input.clone());
        input.validate()?;
        self.call(Endpoint::RunCheck, &[], Some(&input))
    }
}
