use std::{path::PathBuf, time::Duration};

use parcha::{
    config::{ClientConfig, PollPolicy, TransportRetry, DEFAULT_BASE_URL},
    job_id::JobId,
};
use url::Url;

fn country_code_value_parser(raw: &str) -> Result<String, String> {
    if raw.len() != 2 || !raw.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!(
            "{raw} is not a two-letter country code (ISO 3166-1 alpha-2), e.g. US or GB"
        ));
    }
    Ok(raw.to_ascii_uppercase())
}

fn non_blank_value_parser(raw: &str) -> Result<String, String> {
    if raw.trim().is_empty() {
        return Err("Value cannot be empty".to_string());
    }
    Ok(raw.to_string())
}

fn webhook_value_parser(raw: &str) -> Result<String, String> {
    let url = Url::parse(raw).map_err(|e| format!("Invalid webhook URL: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(raw.to_string()),
        scheme => Err(format!("Webhook URL must use http or https, got {scheme}")),
    }
}

#[derive(clap::Parser)]
#[command(name = "parcha")]
#[command(author = "Parcha")]
#[command(version)]
#[command(about = "Run business and identity verifications with the Parcha API")]
#[command(long_about = "
A command-line tool for the Parcha verification API.

Submits KYB (business) and KYC (individual) verification jobs, waits for
them with exponential backoff and prints the results. Credentials are read
from the environment unless given as flags.

Examples:
  # Quick business check
  PARCHA_API_TOKEN=... PARCHA_AGENT_KEY=... parcha flash-check \"Parcha Labs Inc\" US https://parcha.ai

  # Full KYB job from a schema file, results delivered to a webhook
  parcha kyb --schema business.json --webhook-url https://example.com/hook

  # Look up a job
  parcha status --job 3f0c2b4e-7d4a-4a57-9a61-1d8e0c4b2f11 --check-results
")]
pub struct Args {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Args)]
pub struct ConnectionArgs {
    /// API base URL
    #[arg(
        long,
        global = true,
        env = "PARCHA_API_URL",
        value_parser = Url::parse,
        default_value = DEFAULT_BASE_URL,
        value_hint = clap::ValueHint::Url
    )]
    pub url: Url,

    /// API token, sent as a bearer credential
    #[arg(long, global = true, env = "PARCHA_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Agent key jobs are submitted to
    #[arg(long, global = true, env = "PARCHA_AGENT_KEY")]
    pub agent_key: Option<String>,

    /// Maximum number of status checks before giving up
    #[arg(
        long,
        global = true,
        default_value_t = 5,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_attempts: u32,

    /// Delay before the second status check, doubled after every check
    #[arg(long, global = true, default_value_t = 1000, value_name = "MS")]
    pub base_delay_ms: u64,

    /// Keep polling through network failures instead of stopping at the first one
    #[arg(long, global = true, default_value_t = false)]
    pub retry_transport: bool,

    /// Per-request timeout
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout_secs: Option<u64>,
}

impl ConnectionArgs {
    /// # Errors
    ///
    /// Fails when the token or agent key is missing.
    pub fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let token = self
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("PARCHA_API_TOKEN is required (or pass --token)"))?;
        let agent_key = self
            .agent_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("PARCHA_AGENT_KEY is required (or pass --agent-key)")
            })?;

        let transport_retry = if self.retry_transport {
            TransportRetry::Backoff
        } else {
            TransportRetry::Propagate
        };
        let poll = PollPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))?
            .with_transport_retry(transport_retry);

        let mut config =
            ClientConfig::new(self.url.clone(), token, agent_key).with_poll_policy(poll);
        if let Some(secs) = self.timeout_secs {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Quick business verification from a name and a country
    ///
    /// Starts a KYB job with checks running in parallel and waits for the
    /// result, unless --webhook-url is given.
    FlashCheck(FlashCheckArgs),

    /// Start a KYB agent job from a JSON schema file and follow its checks
    Kyb(SchemaArgs),

    /// Start a KYC agent job from a JSON schema file and follow its checks
    Kyc(SchemaArgs),

    /// Fetch a job once by id
    Status(StatusArgs),

    /// List the jobs attached to a case
    Case(CaseArgs),
}

#[derive(clap::Args)]
pub struct FlashCheckArgs {
    /// Name of the business to verify
    #[arg(value_parser = non_blank_value_parser)]
    pub business_name: String,

    /// Two-letter country code (ISO 3166-1 alpha-2)
    #[arg(value_parser = country_code_value_parser)]
    pub country: String,

    /// Business website
    pub website: Option<String>,

    /// Business registration number
    pub registration_number: Option<String>,

    /// Deliver the result to this URL instead of waiting for it
    #[arg(long, value_parser = webhook_value_parser)]
    pub webhook_url: Option<String>,
}

#[derive(clap::Args)]
pub struct SchemaArgs {
    /// JSON file holding the verification schema (a JSON object)
    #[arg(long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub schema: PathBuf,

    /// Deliver the result to this URL instead of waiting for it
    #[arg(long, value_parser = webhook_value_parser)]
    pub webhook_url: Option<String>,

    /// Run checks one after another instead of in parallel
    #[arg(long, default_value_t = false)]
    pub sequential: bool,
}

#[derive(clap::Args)]
pub struct StatusArgs {
    /// Job id returned at submission
    #[arg(long, value_name = "JOB_ID", value_parser = JobId::new)]
    pub job: JobId,

    /// Include check results
    #[arg(long, default_value_t = false)]
    pub check_results: bool,

    /// Include status messages
    #[arg(long, default_value_t = false)]
    pub status_messages: bool,

    /// Include check result ids
    #[arg(long, default_value_t = false)]
    pub check_result_ids: bool,
}

#[derive(clap::Args)]
pub struct CaseArgs {
    /// Case identifier
    #[arg(long, value_parser = non_blank_value_parser)]
    pub case_id: String,

    /// Include check results
    #[arg(long, default_value_t = false)]
    pub check_results: bool,

    /// Include status messages
    #[arg(long, default_value_t = false)]
    pub status_messages: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_code_parser() {
        assert_eq!(country_code_value_parser("us"), Ok("US".to_string()));
        assert!(country_code_value_parser("USA").is_err());
        assert!(country_code_value_parser("1A").is_err());
    }

    #[test]
    fn test_webhook_parser() {
        assert!(webhook_value_parser("https://example.com/hook").is_ok());
        assert!(webhook_value_parser("ftp://example.com").is_err());
        assert!(webhook_value_parser("not a url").is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
