#![allow(clippy::unwrap_used)]

use parcha::{
    api::{
        submit_and_poll_async, ApiClient, ApiClientError, AsyncApiClient, CaseQuery,
        CheckJobInput, JobInput, JobQuery, JobStatus, KybJobInput, KycJobInput, PollOutcome,
        Poller, ValidationError,
    },
    config::{ClientConfig, PollPolicy},
    errors::HttpErrorKind,
    job_id::JobId,
};
use serde_json::json;
use std::time::Duration;
use url::Url;
use wiremock::{
    matchers::{body_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const JOB: &str = "3f0c2b4e-7d4a-4a57-9a61-1d8e0c4b2f11";

fn config(base: &str) -> ClientConfig {
    ClientConfig::new(Url::parse(base).unwrap(), "test-token", "parcha-v0")
        .with_request_timeout(Duration::from_secs(5))
}

fn job_id() -> JobId {
    JobId::new(JOB).unwrap()
}

#[tokio::test]
async fn test_submit_kyb_job() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/startKYBAgentJob"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({
            "agent_key": "parcha-v0",
            "kyb_schema": {"business_name": "Parcha Labs Inc", "country": "US"},
            "run_in_parallel": true,
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"job_id": JOB, "status": "started"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = AsyncApiClient::new(&config(&server.uri())).unwrap();
    let input = KybJobInput::new(
        "parcha-v0",
        json!({"business_name": "Parcha Labs Inc", "country": "US"}),
    )
    .unwrap();

    let dispatch = client.submit_job(&JobInput::from(input)).await.unwrap();
    assert_eq!(dispatch.job_id, job_id());
    // passed through as the service sent it
    assert_eq!(dispatch.status, "started");
}

#[tokio::test]
async fn test_submit_kyc_job_with_webhook() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/startKYCAgentJob"))
        .and(body_json(json!({
            "agent_key": "kyc-agent",
            "kyc_schema": {"first_name": "John", "last_name": "Doe"},
            "webhook_url": "https://example.com/hook",
            "run_in_parallel": false,
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"job_id": JOB, "status": "pending"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = AsyncApiClient::new(&config(&server.uri())).unwrap();
    let input = KycJobInput::new("kyc-agent", json!({"first_name": "John", "last_name": "Doe"}))
        .unwrap()
        .with_webhook("https://example.com/hook")
        .run_in_parallel(false);

    let dispatch = client.submit_job(&JobInput::from(input)).await.unwrap();
    assert_eq!(dispatch.status, "pending");
}

#[tokio::test]
async fn test_fetch_job_sends_lowercase_flags() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/getJobById"))
        .and(header("authorization", "Bearer test-token"))
        .and(query_param("job_id", JOB))
        .and(query_param("include_check_result_ids", "true"))
        .and(query_param("include_check_results", "false"))
        .and(query_param("include_status_messages", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": JOB,
            "status": "running",
            "check_result_ids": ["cr-1", "cr-2"],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AsyncApiClient::new(&config(&server.uri())).unwrap();
    let query = JobQuery {
        include_check_result_ids: true,
        ..JobQuery::default()
    };

    let job = client.fetch_job(&job_id(), &query).await.unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(
        job.check_result_ids,
        Some(vec!["cr-1".to_string(), "cr-2".to_string()])
    );
}

#[tokio::test]
async fn test_base_path_prefix_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/getJobById"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"job_id": JOB, "status": "pending"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = AsyncApiClient::new(&config(&format!("{}/v1/", server.uri()))).unwrap();
    let job = client
        .fetch_job(&job_id(), &JobQuery::default())
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Pending);
}

#[tokio::test]
async fn test_fetch_jobs_by_case() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/getJobsByCaseId"))
        .and(query_param("case_id", "case-42"))
        .and(query_param("agent_key", "parcha-v0"))
        .and(query_param("include_check_results", "true"))
        .and(query_param("include_status_messages", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"job_id": "job-1", "status": "completed"},
            {"job_id": "job-2", "status": "failed"},
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = AsyncApiClient::new(&config(&server.uri())).unwrap();
    let query = CaseQuery {
        include_check_results: true,
        include_status_messages: false,
    };

    let jobs = client
        .fetch_jobs_by_case("case-42", "parcha-v0", &query)
        .await
        .unwrap();
    let statuses: Vec<_> = jobs.iter().map(|job| job.status.clone()).collect();
    assert_eq!(statuses, vec![JobStatus::Completed, JobStatus::Failed]);
}

#[tokio::test]
async fn test_run_check_posts_check_input() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/runCheck"))
        .and(body_json(json!({
            "agent_key": "parcha-v0",
            "check_id": "kyb.web_presence_check",
            "kyb_schema": {"business_name": "Parcha Labs Inc"},
            "run_in_parallel": true,
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"job_id": JOB, "status": "running"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = AsyncApiClient::new(&config(&server.uri())).unwrap();
    let input = CheckJobInput::kyb(
        "parcha-v0",
        "kyb.web_presence_check",
        json!({"business_name": "Parcha Labs Inc"}),
    )
    .unwrap();

    let job = client.run_check(&input).await.unwrap();
    assert_eq!(job.job_id, job_id());
}

#[tokio::test]
async fn test_client_error_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/getJobById"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_string(r#"{"detail":"Job not found","request_id":"r-77"}"#),
        )
        .mount(&server)
        .await;

    let client = AsyncApiClient::new(&config(&server.uri())).unwrap();
    let err = client
        .fetch_job(&job_id(), &JobQuery::default())
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "E102");
    assert!(!err.is_transport());
    match err {
        ApiClientError::Failure(failure) => {
            assert_eq!(failure.status, 404);
            assert_eq!(failure.kind(), HttpErrorKind::Client);
            assert_eq!(failure.msg, "Job not found");
            // the raw body survives next to the extracted reason
            assert_eq!(failure.body, r#"{"detail":"Job not found","request_id":"r-77"}"#);
        }
        other => panic!("Expected Failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/startKYBAgentJob"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let client = AsyncApiClient::new(&config(&server.uri())).unwrap();
    let input = KybJobInput::new("parcha-v0", json!({"business_name": "Acme"})).unwrap();
    let err = client.submit_job(&JobInput::from(input)).await.unwrap_err();

    assert_eq!(err.error_code(), "E103");
    match err {
        ApiClientError::Failure(failure) => {
            assert_eq!(failure.kind(), HttpErrorKind::Server);
            assert_eq!(failure.msg, "upstream unavailable");
        }
        other => panic!("Expected Failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/getJobById"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = AsyncApiClient::new(&config(&server.uri())).unwrap();
    let err = client
        .fetch_job(&job_id(), &JobQuery::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiClientError::InvalidResponse { .. }));
    assert_eq!(err.error_code(), "E106");
}

#[tokio::test]
async fn test_unreachable_service_is_a_transport_error() {
    // Nothing listens on port 1
    let client = AsyncApiClient::new(&config("http://127.0.0.1:1")).unwrap();
    let err = client
        .fetch_job(&job_id(), &JobQuery::default())
        .await
        .unwrap_err();

    assert!(err.is_transport());
    assert_eq!(err.error_code(), "E100");
}

#[tokio::test]
async fn test_invalid_input_never_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = AsyncApiClient::new(&config(&server.uri())).unwrap();

    let mut blank_key = KybJobInput::new("parcha-v0", json!({})).unwrap();
    blank_key.agent_key = "   ".to_string();
    let err = client
        .submit_job(&JobInput::from(blank_key))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiClientError::Validation(ValidationError::EmptyAgentKey)
    ));

    let mut both_schemas = CheckJobInput::kyb("parcha-v0", "kyb.web_presence_check", json!({}))
        .unwrap();
    both_schemas.kyc_schema = Some(serde_json::Map::new());
    let err = client.run_check(&both_schemas).await.unwrap_err();
    assert_eq!(err.error_code(), "E113");
}

#[tokio::test]
async fn test_submit_and_poll_against_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/startKYBAgentJob"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"job_id": JOB, "status": "started"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/getJobById"))
        .and(query_param("job_id", JOB))
        .and(query_param("include_check_results", "true"))
        .and(query_param("include_status_messages", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": JOB,
            "status": "completed",
            "recommendation": "Approve",
            "check_results": [{
                "check_id": "kyb.web_presence_check",
                "status": "completed",
                "passed": true,
            }],
            "status_messages": [{"content": {"status": "All checks finished"}}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = config(&server.uri());
    let client = AsyncApiClient::new(&config).unwrap();
    let input = KybJobInput::new("parcha-v0", json!({"business_name": "Parcha Labs Inc"})).unwrap();
    let poller = Poller::new(PollPolicy::new(3, Duration::from_millis(10)).unwrap());

    let outcome = submit_and_poll_async(&client, &JobInput::from(input), &poller)
        .await
        .unwrap();

    let PollOutcome::Completed(job) = outcome else {
        panic!("Expected a completed job, got {outcome:?}");
    };
    assert_eq!(job.recommendation(), Some("Approve"));
    assert_eq!(job.check_results()[0].passed, Some(true));
    assert_eq!(job.status_messages().len(), 1);
}

#[test]
fn test_base_url_must_be_a_base() {
    let config = ClientConfig::new(
        Url::parse("mailto:ops@parcha.ai").unwrap(),
        "test-token",
        "parcha-v0",
    );
    let err = ApiClient::new(&config).unwrap_err();
    assert!(matches!(err, ApiClientError::CannotBeBase(_)));
    assert_eq!(err.error_code(), "E104");
}

#[test]
fn test_clients_debug_without_token() {
    let config = ClientConfig::new(
        Url::parse("https://api.parcha.ai").unwrap(),
        "super-secret-token",
        "parcha-v0",
    );

    let blocking = format!("{:?}", ApiClient::new(&config).unwrap());
    let non_blocking = format!("{:?}", AsyncApiClient::new(&config).unwrap());

    for rendered in [blocking, non_blocking] {
        assert!(rendered.contains("https://api.parcha.ai/"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("super-secret-token"));
    }
}

// The blocking client runs its own runtime, so it is built, used and
// dropped on a blocking thread while the mock server keeps the test's.
#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_client_fetch_and_case() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/getJobById"))
        .and(header("authorization", "Bearer test-token"))
        .and(query_param("job_id", JOB))
        .and(query_param("include_status_messages", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": JOB,
            "status": "running",
            "status_messages": [{"content": {"status": "Checking registries"}}],
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/getJobsByCaseId"))
        .and(query_param("case_id", "case-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let config = config(&server.uri());
    tokio::task::spawn_blocking(move || {
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.base_url(), &config.base_url);

        let query = JobQuery {
            include_status_messages: true,
            ..JobQuery::default()
        };
        let job = client.fetch_job(&job_id(), &query).unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(
            job.status_messages()[0].status_text(),
            Some("Checking registries")
        );

        let jobs = client
            .fetch_jobs_by_case("case-42", &config.agent_key, &CaseQuery::default())
            .unwrap();
        assert!(jobs.is_empty());
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_client_reports_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/startKYCAgentJob"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"message": "agent crashed"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = config(&server.uri());
    let err = tokio::task::spawn_blocking(move || {
        let client = ApiClient::new(&config).unwrap();
        let input = KycJobInput::new("parcha-v0", json!({"first_name": "John"})).unwrap();
        client.submit_job(&JobInput::from(input)).unwrap_err()
    })
    .await
    .unwrap();

    assert_eq!(err.error_code(), "E103");
    let message = err.to_string();
    let first = message.lines().next().unwrap();
    assert!(first.contains("500"));
    assert!(first.ends_with(": agent crashed"));
    assert!(message.contains(r#"Server response: {"message":"agent crashed"}"#));
}
