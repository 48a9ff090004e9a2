// Re-export the API module components
pub use self::{
    async_client::AsyncApiClient,
    cancel::CancelToken,
    client::ApiClient,
    errors::{ApiClientError, ValidationError},
    models::{
        CaseQuery, CheckJobInput, CheckResult, Job, JobDispatch, JobInput, JobQuery, KybJobInput,
        KycJobInput, Schema, StatusMessage,
    },
    polling::{
        submit_and_poll, submit_and_poll_async, AsyncJobSource, AsyncSubmitJob, JobSource,
        PollAttempt, PollOutcome, Poller, SubmitJob, DELEGATED_STATUS,
    },
    types::{Endpoint, JobStatus},
};

// Module declarations
mod async_client;
mod cancel;
mod client;
mod errors;
mod models;
mod polling;
mod transport;
mod types;
