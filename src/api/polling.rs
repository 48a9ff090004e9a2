//! Drives a submitted job to a definite answer.
//!
//! Each attempt fetches the job with its check results and status
//! messages. A `completed` or `failed` status ends polling at once;
//! anything else waits `base_delay * 2^attempt` and tries again, up to
//! `max_attempts` fetches. The wait also follows the last attempt, so a
//! timeout is reported after `base_delay * (2^max_attempts - 1)`.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};

use crate::{
    config::{PollPolicy, TransportRetry},
    job_id::JobId,
};

use super::{
    async_client::AsyncApiClient,
    cancel::CancelToken,
    client::ApiClient,
    errors::ApiClientError,
    models::{Job, JobDispatch, JobInput, JobQuery},
    types::JobStatus,
};

/// Status reported for a job whose result will arrive through a webhook.
pub const DELEGATED_STATUS: &str = "pending";

/// Anything a job can be fetched from by id.
pub trait JobSource {
    /// # Errors
    ///
    /// Whatever the underlying transport fails with.
    fn fetch_job(&self, job_id: &JobId, query: &JobQuery) -> Result<Job, ApiClientError>;
}

/// Anything a job can be submitted to.
pub trait SubmitJob {
    /// # Errors
    ///
    /// Whatever the underlying transport fails with.
    fn submit_job(&self, input: &JobInput) -> Result<JobDispatch, ApiClientError>;
}

#[async_trait]
pub trait AsyncJobSource: Sync {
    async fn fetch_job(&self, job_id: &JobId, query: &JobQuery) -> Result<Job, ApiClientError>;
}

#[async_trait]
pub trait AsyncSubmitJob: Sync {
    async fn submit_job(&self, input: &JobInput) -> Result<JobDispatch, ApiClientError>;
}

impl JobSource for ApiClient {
    fn fetch_job(&self, job_id: &JobId, query: &JobQuery) -> Result<Job, ApiClientError> {
        Self::fetch_job(self, job_id, query)
    }
}

impl SubmitJob for ApiClient {
    fn submit_job(&self, input: &JobInput) -> Result<JobDispatch, ApiClientError> {
        Self::submit_job(self, input)
    }
}

#[async_trait]
impl AsyncJobSource for AsyncApiClient {
    async fn fetch_job(&self, job_id: &JobId, query: &JobQuery) -> Result<Job, ApiClientError> {
        Self::fetch_job(self, job_id, query).await
    }
}

#[async_trait]
impl AsyncSubmitJob for AsyncApiClient {
    async fn submit_job(&self, input: &JobInput) -> Result<JobDispatch, ApiClientError> {
        Self::submit_job(self, input).await
    }
}

/// How a polling run ended. Transport and HTTP errors are reported
/// through `Err` instead.
#[derive(Clone, Debug, PartialEq)]
pub enum PollOutcome {
    Completed(Job),
    Failed(Job),
    TimedOut { job_id: JobId, last_status: JobStatus },
    /// A webhook was given at submission, the service reports there.
    Delegated { job_id: JobId, status: String },
    Cancelled { job_id: JobId },
}

impl PollOutcome {
    pub const fn job_id(&self) -> &JobId {
        match self {
            Self::Completed(job) | Self::Failed(job) => &job.job_id,
            Self::TimedOut { job_id, .. }
            | Self::Delegated { job_id, .. }
            | Self::Cancelled { job_id } => job_id,
        }
    }

    /// Flattens the outcome for callers that only care about a finished
    /// job. A delegated job comes back as a pending [`Job`].
    ///
    /// # Errors
    ///
    /// `RemoteJobFailed`, `PollTimeout` or `Cancelled` for the matching
    /// outcomes.
    pub fn into_result(self) -> Result<Job, ApiClientError> {
        match self {
            Self::Completed(job) => Ok(job),
            Self::Failed(job) => Err(ApiClientError::RemoteJobFailed { job_id: job.job_id }),
            Self::TimedOut {
                job_id,
                last_status,
            } => Err(ApiClientError::PollTimeout {
                job_id,
                last_status,
            }),
            Self::Delegated { job_id, .. } => Ok(Job::pending(job_id)),
            Self::Cancelled { job_id } => Err(ApiClientError::Cancelled { job_id }),
        }
    }
}

/// What the driver saw on a non-terminal attempt, handed to the notify
/// callback right before it waits.
#[derive(Clone, Copy, Debug)]
pub struct PollAttempt<'a> {
    pub job_id: &'a JobId,
    pub attempt: u32,
    /// `None` when the attempt failed at the transport level and was
    /// retried under [`TransportRetry::Backoff`].
    pub job: Option<&'a Job>,
    pub next_delay: Duration,
}

type Notify = Box<dyn Fn(&PollAttempt<'_>) + Send + Sync>;

pub struct Poller {
    policy: PollPolicy,
    cancel: Option<CancelToken>,
    notify: Option<Notify>,
}

impl fmt::Debug for Poller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("policy", &self.policy)
            .field("cancel", &self.cancel)
            .field("notify", &self.notify.is_some())
            .finish()
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(PollPolicy::default())
    }
}

enum Step {
    Done(PollOutcome),
    Waiting(Option<Job>),
}

impl Poller {
    #[must_use]
    pub const fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            cancel: None,
            notify: None,
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn notify(mut self, notify: impl Fn(&PollAttempt<'_>) + Send + Sync + 'static) -> Self {
        self.notify = Some(Box::new(notify));
        self
    }

    pub const fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Delays between attempts: `base_delay`, then doubling, no jitter.
    pub fn schedule(&self) -> ExponentialBackoff {
        ExponentialBuilder::default()
            .with_min_delay(self.policy.base_delay)
            .with_factor(2.0)
            .with_max_delay(self.policy.worst_case_wait().max(self.policy.base_delay))
            .with_max_times(self.policy.max_attempts as usize)
            .build()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    fn cancelled(job_id: &JobId) -> PollOutcome {
        log::info!("Polling job {job_id} cancelled");
        PollOutcome::Cancelled {
            job_id: job_id.clone(),
        }
    }

    fn step(
        &self,
        job_id: &JobId,
        attempt: u32,
        fetched: Result<Job, ApiClientError>,
        last_status: &mut JobStatus,
    ) -> Result<Step, ApiClientError> {
        match fetched {
            Ok(job) => {
                log::debug!("Job {job_id} attempt {attempt}: {}", job.status);
                match job.status {
                    JobStatus::Completed => {
                        log::info!("Job {job_id} completed");
                        Ok(Step::Done(PollOutcome::Completed(job)))
                    }
                    JobStatus::Failed => {
                        log::info!("Job {job_id} failed");
                        Ok(Step::Done(PollOutcome::Failed(job)))
                    }
                    _ => {
                        last_status.clone_from(&job.status);
                        Ok(Step::Waiting(Some(job)))
                    }
                }
            }
            Err(err)
                if err.is_transport() && self.policy.transport_retry == TransportRetry::Backoff =>
            {
                log::warn!(
                    "Polling job {job_id} attempt {attempt} got no response, retrying: {err}"
                );
                Ok(Step::Waiting(None))
            }
            Err(err) => Err(err.while_polling(job_id)),
        }
    }

    fn report(&self, job_id: &JobId, attempt: u32, job: Option<&Job>, next_delay: Duration) {
        if let Some(notify) = &self.notify {
            notify(&PollAttempt {
                job_id,
                attempt,
                job,
                next_delay,
            });
        }
    }

    fn timed_out(&self, job_id: &JobId, last_status: JobStatus) -> PollOutcome {
        log::warn!(
            "Job {job_id} still {last_status} after {} attempts",
            self.policy.max_attempts
        );
        PollOutcome::TimedOut {
            job_id: job_id.clone(),
            last_status,
        }
    }

    /// Polls `job_id` on the current thread until it is terminal, the
    /// attempts run out or the cancel token fires.
    ///
    /// A fetch already in flight cannot be interrupted here; if the token
    /// fires meanwhile its answer is dropped and `Cancelled` returned.
    ///
    /// # Errors
    ///
    /// The first transport or HTTP error, wrapped with the job id, unless
    /// [`TransportRetry::Backoff`] absorbs it.
    pub fn poll<S: JobSource + ?Sized>(
        &self,
        source: &S,
        job_id: &JobId,
    ) -> Result<PollOutcome, ApiClientError> {
        self.policy.validate()?;
        let query = JobQuery::detailed();
        let mut delays = self.schedule();
        let mut last_status = JobStatus::Pending;

        for attempt in 0..self.policy.max_attempts {
            if self.is_cancelled() {
                return Ok(Self::cancelled(job_id));
            }

            let fetched = source.fetch_job(job_id, &query);
            if self.is_cancelled() {
                return Ok(Self::cancelled(job_id));
            }

            let job = match self.step(job_id, attempt, fetched, &mut last_status)? {
                Step::Done(outcome) => return Ok(outcome),
                Step::Waiting(job) => job,
            };

            let delay = delays.next().unwrap_or(self.policy.base_delay);
            self.report(job_id, attempt, job.as_ref(), delay);

            let cancelled = match &self.cancel {
                Some(cancel) => cancel.wait_timeout(delay),
                None => {
                    std::thread::sleep(delay);
                    false
                }
            };
            if cancelled {
                return Ok(Self::cancelled(job_id));
            }
        }

        Ok(self.timed_out(job_id, last_status))
    }

    /// Async counterpart of [`Poller::poll`]. Cancellation also aborts a
    /// fetch in flight.
    ///
    /// # Errors
    ///
    /// The first transport or HTTP error, wrapped with the job id, unless
    /// [`TransportRetry::Backoff`] absorbs it.
    pub async fn poll_async<S: AsyncJobSource + ?Sized>(
        &self,
        source: &S,
        job_id: &JobId,
    ) -> Result<PollOutcome, ApiClientError> {
        self.policy.validate()?;
        let query = JobQuery::detailed();
        let mut delays = self.schedule();
        let mut last_status = JobStatus::Pending;

        for attempt in 0..self.policy.max_attempts {
            if self.is_cancelled() {
                return Ok(Self::cancelled(job_id));
            }

            let fetched = match &self.cancel {
                Some(cancel) => tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Ok(Self::cancelled(job_id)),
                    fetched = source.fetch_job(job_id, &query) => fetched,
                },
                None => source.fetch_job(job_id, &query).await,
            };

            let job = match self.step(job_id, attempt, fetched, &mut last_status)? {
                Step::Done(outcome) => return Ok(outcome),
                Step::Waiting(job) => job,
            };

            let delay = delays.next().unwrap_or(self.policy.base_delay);
            self.report(job_id, attempt, job.as_ref(), delay);

            match &self.cancel {
                Some(cancel) => tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Ok(Self::cancelled(job_id)),
                    () = tokio::time::sleep(delay) => {},
                },
                None => tokio::time::sleep(delay).await,
            }
        }

        Ok(self.timed_out(job_id, last_status))
    }
}

fn delegated(dispatch: JobDispatch, webhook_url: &str) -> PollOutcome {
    log::info!(
        "Job {} reports to {webhook_url}, not polling",
        dispatch.job_id
    );
    PollOutcome::Delegated {
        job_id: dispatch.job_id,
        status: DELEGATED_STATUS.to_owned(),
    }
}

/// Submits `input` and polls the new job, unless the input names a
/// webhook, in which case nothing is polled.
///
/// # Errors
///
/// Submission errors as is, polling errors wrapped with the job id.
pub fn submit_and_poll<C>(
    client: &C,
    input: &JobInput,
    poller: &Poller,
) -> Result<PollOutcome, ApiClientError>
where
    C: SubmitJob + JobSource + ?Sized,
{
    let dispatch = client.submit_job(input)?;
    if let Some(webhook_url) = input.webhook_url() {
        return Ok(delegated(dispatch, webhook_url));
    }
    poller.poll(client, &dispatch.job_id)
}

/// Async counterpart of [`submit_and_poll`].
///
/// # Errors
///
/// Submission errors as is, polling errors wrapped with the job id.
pub async fn submit_and_poll_async<C>(
    client: &C,
    input: &JobInput,
    poller: &Poller,
) -> Result<PollOutcome, ApiClientError>
where
    C: AsyncSubmitJob + AsyncJobSource + ?Sized,
{
    let dispatch = client.submit_job(input).await?;
    if let Some(webhook_url) = input.webhook_url() {
        return Ok(delegated(dispatch, webhook_url));
    }
    poller.poll_async(client, &dispatch.job_id).await
}
