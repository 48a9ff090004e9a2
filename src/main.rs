mod args;
mod progress;

use crate::args::{Args, CaseArgs, Commands, FlashCheckArgs, SchemaArgs, StatusArgs};
use crate::progress::ApiProgress;

use clap::Parser;
use parcha::{
    api::{
        submit_and_poll, submit_and_poll_async, ApiClient, ApiClientError, AsyncApiClient,
        CancelToken, CaseQuery, Job, JobInput, JobQuery, JobStatus, KybJobInput, KycJobInput,
        PollAttempt, PollOutcome, Poller, StatusMessage, ValidationError,
    },
    config::ClientConfig,
    job_id::JobId,
};
use serde_json::{Map, Value};
use std::{
    fs, io,
    path::{Path, PathBuf},
    process::ExitCode,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Api(#[from] ApiClientError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Couldn't read schema file {path}: {source}")]
    SchemaRead { path: PathBuf, source: io::Error },

    #[error("Schema file {path} is not valid JSON: {source}")]
    SchemaParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Couldn't start the async runtime: {0}")]
    Runtime(#[source] io::Error),
}

#[derive(Clone, Copy)]
enum Kind {
    Kyb,
    Kyc,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::debug!("{err:?}");
            let message = err.to_string();
            eprintln!("Error: {}", message.lines().next().unwrap_or_default());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let Args {
        connection,
        command,
    } = args;
    let config = connection.client_config()?;

    match command {
        Commands::FlashCheck(args) => {
            report(flash_check(&config, &args)?, Some("\nFlash Check Results:"))?;
        }
        Commands::Kyb(args) => report(agent_job(&config, &args, Kind::Kyb)?, None)?,
        Commands::Kyc(args) => report(agent_job(&config, &args, Kind::Kyc)?, None)?,
        Commands::Status(args) => print_job(&status(&config, &args)?),
        Commands::Case(args) => {
            let jobs = case(&config, &args)?;
            if jobs.is_empty() {
                println!("No jobs found for case {}", args.case_id);
            }
            for job in &jobs {
                print_job(job);
                println!();
            }
        }
    }
    Ok(())
}

fn flash_check_schema(args: &FlashCheckArgs) -> Value {
    let mut schema = Map::new();
    schema.insert("business_name".into(), args.business_name.clone().into());
    schema.insert("country".into(), args.country.clone().into());
    if let Some(website) = &args.website {
        schema.insert("website".into(), website.clone().into());
    }
    if let Some(registration_number) = &args.registration_number {
        schema.insert(
            "registration_number".into(),
            registration_number.clone().into(),
        );
    }
    Value::Object(schema)
}

fn spinner_notify(
    progress: &ApiProgress,
    verbose: bool,
) -> impl Fn(&PollAttempt<'_>) + Send + Sync {
    let progress = progress.clone();
    move |attempt: &PollAttempt<'_>| {
        let Some(job) = attempt.job else {
            progress.set_message(&format!(
                "No response for job {}, retrying in {:?}",
                attempt.job_id, attempt.next_delay
            ));
            return;
        };

        progress.set_message(&format!(
            "Job {} is {}, checking again in {:?}",
            job.job_id, job.status, attempt.next_delay
        ));

        if verbose {
            for check in job.check_results() {
                let latest = check
                    .latest_status_message()
                    .and_then(StatusMessage::status_text)
                    .unwrap_or("...");
                progress.println(&format!(
                    "Check ID: {}\nStatus: {}\nLast Status Message: {latest}",
                    check.check_id, check.status
                ));
            }
        }
    }
}

fn flash_check(config: &ClientConfig, args: &FlashCheckArgs) -> Result<PollOutcome, CliError> {
    let mut input = KybJobInput::new(config.agent_key.clone(), flash_check_schema(args))?
        .run_in_parallel(true);
    if let Some(webhook_url) = &args.webhook_url {
        input = input.with_webhook(webhook_url.clone());
    }
    let input = JobInput::from(input);

    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    let client = AsyncApiClient::new(config)?;

    log::info!(
        "Starting flash check for {} ({})",
        args.business_name,
        args.country
    );

    let progress = ApiProgress::new_polling();
    let cancel = CancelToken::new();
    let poller = Poller::new(config.poll.clone())
        .with_cancel(cancel.clone())
        .notify(spinner_notify(&progress, false));

    let outcome = runtime.block_on(async {
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupt.cancel();
            }
        });
        submit_and_poll_async(&client, &input, &poller).await
    });
    progress.finish_and_clear();

    if let Err(err) = &outcome {
        log::error!("Flash check for {} failed: {err}", args.business_name);
    }
    Ok(outcome?)
}

fn read_schema(path: &Path) -> Result<Value, CliError> {
    let raw = fs::read_to_string(path).map_err(|source| CliError::SchemaRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CliError::SchemaParse {
        path: path.to_path_buf(),
        source,
    })
}

fn agent_job(
    config: &ClientConfig,
    args: &SchemaArgs,
    kind: Kind,
) -> Result<PollOutcome, CliError> {
    let schema = read_schema(&args.schema)?;
    let input = match kind {
        Kind::Kyb => {
            let mut input = KybJobInput::new(config.agent_key.clone(), schema)?
                .run_in_parallel(!args.sequential);
            if let Some(webhook_url) = &args.webhook_url {
                input = input.with_webhook(webhook_url.clone());
            }
            JobInput::from(input)
        }
        Kind::Kyc => {
            let mut input = KycJobInput::new(config.agent_key.clone(), schema)?
                .run_in_parallel(!args.sequential);
            if let Some(webhook_url) = &args.webhook_url {
                input = input.with_webhook(webhook_url.clone());
            }
            JobInput::from(input)
        }
    };

    let client = ApiClient::new(config)?;
    let progress = ApiProgress::new_submit();
    let poller = Poller::new(config.poll.clone()).notify(spinner_notify(&progress, true));

    let outcome = submit_and_poll(&client, &input, &poller);
    progress.finish_and_clear();
    Ok(outcome?)
}

fn status(config: &ClientConfig, args: &StatusArgs) -> Result<Job, CliError> {
    let client = ApiClient::new(config)?;
    let query = JobQuery {
        include_check_result_ids: args.check_result_ids,
        include_check_results: args.check_results,
        include_status_messages: args.status_messages,
    };
    Ok(client.fetch_job(&args.job, &query)?)
}

fn case(config: &ClientConfig, args: &CaseArgs) -> Result<Vec<Job>, CliError> {
    let client = ApiClient::new(config)?;
    let query = CaseQuery {
        include_check_results: args.check_results,
        include_status_messages: args.status_messages,
    };
    Ok(client.fetch_jobs_by_case(&args.case_id, &config.agent_key, &query)?)
}

/// What a polling run left to show the user.
#[derive(Debug)]
enum Finished {
    Delegated { job_id: JobId, status: String },
    Job(Job),
}

/// Outcomes without a result to show become errors here, before anything
/// reaches stdout.
fn resolve(outcome: PollOutcome) -> Result<Finished, CliError> {
    match outcome {
        PollOutcome::Delegated { job_id, status } => Ok(Finished::Delegated { job_id, status }),
        PollOutcome::Completed(job) | PollOutcome::Failed(job) => Ok(Finished::Job(job)),
        PollOutcome::TimedOut {
            job_id,
            last_status,
        } => Err(CliError::from(ApiClientError::PollTimeout {
            job_id,
            last_status,
        })),
        PollOutcome::Cancelled { job_id } => {
            Err(CliError::from(ApiClientError::Cancelled { job_id }))
        }
    }
}

fn report(outcome: PollOutcome, header: Option<&str>) -> Result<(), CliError> {
    let finished = resolve(outcome)?;
    if let Some(header) = header {
        println!("{header}");
    }

    match finished {
        Finished::Delegated { job_id, status } => {
            println!("Job ID: {job_id}");
            println!("Status: {status}");
            println!("Results will be delivered to the webhook");
            Ok(())
        }
        Finished::Job(job) => {
            print_job(&job);
            if job.status == JobStatus::Failed {
                let failed = ApiClientError::RemoteJobFailed { job_id: job.job_id };
                return Err(CliError::from(failed));
            }
            Ok(())
        }
    }
}

fn print_job(job: &Job) {
    println!("Job ID: {}", job.job_id);
    println!("Status: {}", job.status);
    if let Some(recommendation) = job.recommendation() {
        println!("Recommendation: {recommendation}");
    }

    if let Some(ids) = &job.check_result_ids {
        println!("Check result ids: {}", ids.join(", "));
    }

    let checks = job.check_results();
    if !checks.is_empty() {
        println!("\nCheck Results:");
        for check in checks {
            match check.passed {
                Some(passed) => println!(
                    "- {}: {} ({})",
                    check.check_id,
                    check.status,
                    if passed { "passed" } else { "not passed" }
                ),
                None => println!("- {}: {}", check.check_id, check.status),
            }
        }
    }

    if let Some(latest) = job.status_messages().last().and_then(StatusMessage::status_text) {
        println!("\nLatest status: {latest}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_id() -> JobId {
        JobId::new("3f0c2b4e-7d4a-4a57-9a61-1d8e0c4b2f11").unwrap()
    }

    #[test]
    fn test_unfinished_outcomes_resolve_to_errors() {
        let timed_out = resolve(PollOutcome::TimedOut {
            job_id: job_id(),
            last_status: JobStatus::Running,
        });
        assert!(matches!(
            timed_out,
            Err(CliError::Api(ApiClientError::PollTimeout { .. }))
        ));

        let cancelled = resolve(PollOutcome::Cancelled { job_id: job_id() });
        assert!(matches!(
            cancelled,
            Err(CliError::Api(ApiClientError::Cancelled { .. }))
        ));
    }

    #[test]
    fn test_finished_outcomes_resolve_to_something_printable() {
        let mut failed = Job::pending(job_id());
        failed.status = JobStatus::Failed;
        assert!(matches!(
            resolve(PollOutcome::Failed(failed)),
            Ok(Finished::Job(job)) if job.status == JobStatus::Failed
        ));

        assert!(matches!(
            resolve(PollOutcome::Delegated {
                job_id: job_id(),
                status: "pending".to_string(),
            }),
            Ok(Finished::Delegated { status, .. }) if status == "pending"
        ));
    }

    #[test]
    fn test_timed_out_report_fails_with_timeout_code() {
        let outcome = PollOutcome::TimedOut {
            job_id: job_id(),
            last_status: JobStatus::Pending,
        };
        let err = report(outcome, Some("\nFlash Check Results:")).unwrap_err();
        assert!(err.to_string().starts_with("[E107]"));
    }
}
