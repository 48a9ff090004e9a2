//! # Parcha
//!
//! A Rust client for the Parcha business (KYB) and identity (KYC)
//! verification API.
//!
//! ## Features
//!
//! - **Job submission**: start KYB and KYC agent jobs or run a single check
//! - **Job lookup**: fetch a job by id, or every job attached to a case
//! - **Polling**: wait for a job with exponential backoff, a hard attempt
//!   cap and cancellation, or hand delivery to a webhook instead
//! - **Blocking and async**: every operation exists in both forms
//! - **Error Handling**: typed errors with codes and actionable suggestions
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use parcha::{
//!     api::{submit_and_poll, ApiClient, JobInput, KybJobInput, Poller},
//!     config::ClientConfig,
//! };
//! use serde_json::json;
//! use url::Url;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new(
//!     Url::parse("https://api.parcha.ai")?,
//!     "my-api-token",
//!     "parcha-v0",
//! );
//! let client = ApiClient::new(&config)?;
//!
//! let input = KybJobInput::new(
//!     config.agent_key.clone(),
//!     json!({"business_name": "Parcha Labs Inc", "country": "US"}),
//! )?;
//!
//! let job = submit_and_poll(&client, &JobInput::from(input), &Poller::new(config.poll))?
//!     .into_result()?;
//! println!("{} finished as {}", job.job_id, job.status);
//! # Ok(())
//! # }
//! ```

/// API clients, job models and the polling driver
pub mod api;

/// Client configuration and polling policy
pub mod config;

/// HTTP failure reporting
pub mod errors;

/// Type-safe job identifiers
pub mod job_id;
