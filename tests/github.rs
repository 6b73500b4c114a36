//! Pipeline poll client against a mocked GitHub API.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mender::domain::models::config::GithubConfig;
use mender::domain::ports::PipelineObserver;
use mender::infrastructure::ActionsClient;

fn config(server: &MockServer, poll_timeout_secs: u64) -> GithubConfig {
    GithubConfig {
        token: Some("test-token".to_string()),
        api_base: server.uri(),
        poll_interval_secs: 1,
        poll_timeout_secs,
    }
}

fn runs_body(status: &str, conclusion: Option<&str>) -> serde_json::Value {
    json!({
        "workflow_runs": [{
            "name": "CI",
            "status": status,
            "conclusion": conclusion,
        }]
    })
}

#[tokio::test]
async fn completed_successful_run_passes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widget/actions/runs"))
        .and(query_param("branch", "ACME_CASEY_AI_Fix"))
        .respond_with(ResponseTemplate::new(200).set_body_json(runs_body("completed", Some("success"))))
        .mount(&server)
        .await;

    let client = ActionsClient::new(&config(&server, 30)).unwrap();
    let verdict = client
        .poll("https://github.com/acme/widget", "ACME_CASEY_AI_Fix")
        .await;

    assert!(verdict.passed);
    assert_eq!(verdict.conclusion.as_deref(), Some("success"));
    assert_eq!(verdict.workflow_name.as_deref(), Some("CI"));
}

#[tokio::test]
async fn in_progress_run_is_polled_until_it_completes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widget/actions/runs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(runs_body("in_progress", None)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widget/actions/runs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(runs_body("completed", Some("failure"))))
        .mount(&server)
        .await;

    let client = ActionsClient::new(&config(&server, 30)).unwrap();
    let verdict = client
        .poll("https://github.com/acme/widget", "ACME_CASEY_AI_Fix")
        .await;

    assert!(!verdict.passed);
    assert_eq!(verdict.conclusion.as_deref(), Some("failure"));
    assert!(!verdict.timed_out);
}

#[tokio::test]
async fn exhausted_budget_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widget/actions/runs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "workflow_runs": [] })))
        .mount(&server)
        .await;

    let client = ActionsClient::new(&config(&server, 2)).unwrap();
    let verdict = client
        .poll("https://github.com/acme/widget", "ACME_CASEY_AI_Fix")
        .await;

    assert!(!verdict.passed);
    assert!(verdict.timed_out);
}

#[tokio::test]
async fn transient_api_errors_keep_polling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widget/actions/runs"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widget/actions/runs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(runs_body("completed", Some("success"))))
        .mount(&server)
        .await;

    let client = ActionsClient::new(&config(&server, 30)).unwrap();
    let verdict = client
        .poll("https://github.com/acme/widget", "ACME_CASEY_AI_Fix")
        .await;

    assert!(verdict.passed);
}
