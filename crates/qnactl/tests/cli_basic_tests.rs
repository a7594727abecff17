use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENV_VARS: &[&str] = &[
    "QNACTL_PROFILE",
    "QNACTL_CONFIG_FILE",
    "QNA_MAKER_ENDPOINT",
    "QNA_MAKER_SUBSCRIPTION_KEY",
    "QNA_MAKER_RUNTIME_ENDPOINT",
    "QNA_MAKER_ENDPOINT_KEY",
    "QNA_MAKER_KB_ID",
    "RUST_LOG",
];

/// Helper to create a test command
fn qnactl() -> Command {
    Command::cargo_bin("qnactl").unwrap()
}

/// Command isolated from the caller's environment and config file
fn isolated(dir: &TempDir) -> Command {
    let mut cmd = qnactl();
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.arg("--config-file")
        .arg(dir.path().join("config.toml"));
    cmd
}

/// Isolated command pointed at a mock authoring endpoint
fn against(dir: &TempDir, server: &MockServer) -> Command {
    let mut cmd = isolated(dir);
    cmd.env("QNA_MAKER_ENDPOINT", server.uri())
        .env("QNA_MAKER_SUBSCRIPTION_KEY", "test-key");
    cmd
}

#[test]
fn test_help_flag() {
    qnactl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("QnA Maker knowledge base management CLI"))
        .stdout(predicate::str::contains("EXAMPLES:"));
}

#[test]
fn test_help_short_flag() {
    qnactl()
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn test_version_flag() {
    qnactl()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("qnactl"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_args_shows_help() {
    qnactl()
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_invalid_subcommand() {
    qnactl()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_profile_help() {
    qnactl()
        .arg("profile")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Profile management"));
}

#[test]
fn test_kb_help_lists_subcommands() {
    qnactl()
        .args(["kb", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("publish"))
        .stdout(predicate::str::contains("query"));
}

#[test]
fn test_max_attempts_must_be_positive() {
    qnactl()
        .args(["operation", "wait", "op-1", "--max-attempts", "0"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_profile_max_attempts_must_be_positive() {
    let dir = TempDir::new().unwrap();
    isolated(&dir)
        .args(["profile", "set", "work", "--poll-max-attempts", "0"])
        .assert()
        .failure()
        .code(2);
    assert!(!dir.path().join("config.toml").exists());
}

#[test]
fn test_missing_settings_name_env_vars() {
    let dir = TempDir::new().unwrap();
    isolated(&dir)
        .args(["kb", "list"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("QNA_MAKER_ENDPOINT"))
        .stderr(predicate::str::contains("QNA_MAKER_SUBSCRIPTION_KEY"));
}

#[test]
fn test_profile_list_empty_json() {
    let dir = TempDir::new().unwrap();
    isolated(&dir)
        .args(["profile", "list", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_profile_set_show_remove() {
    let dir = TempDir::new().unwrap();

    isolated(&dir)
        .args([
            "profile",
            "set",
            "work",
            "--endpoint",
            "https://westus.api.cognitive.microsoft.com",
            "--subscription-key",
            "0123456789abcdef",
            "--poll-interval",
            "10",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Profile 'work' created"));

    let saved = std::fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert!(saved.contains("default_profile = \"work\""));

    isolated(&dir)
        .args(["profile", "show", "work", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("****cdef"))
        .stdout(predicate::str::contains("0123456789abcdef").not())
        .stdout(predicate::str::contains("\"default_retry_interval_secs\": 10"));

    isolated(&dir)
        .args(["profile", "remove", "work"])
        .assert()
        .success();

    isolated(&dir)
        .args(["profile", "show", "work"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Profile 'work' not found"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_kb_list_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/qnamaker/v4.0/knowledgebases"))
        .and(header("Ocp-Apim-Subscription-Key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "knowledgebases": [
                { "id": "kb-1", "name": "QnA Maker FAQ" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    against(&dir, &server)
        .args(["kb", "list", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\": \"kb-1\""))
        .stdout(predicate::str::contains("QnA Maker FAQ"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_kb_create_no_wait_prints_handle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/qnamaker/v4.0/knowledgebases/create"))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("Location", "/operations/op-1")
                .set_body_json(json!({
                    "operationState": "NotStarted",
                    "operationId": "op-1"
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    against(&dir, &server)
        .args(["kb", "create", "--no-wait"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "To wait for completion, run: qnactl operation wait op-1",
        ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_operation_wait_succeeded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/qnamaker/v4.0/operations/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "operationState": "Succeeded",
            "operationId": "op-1",
            "resourceLocation": "/knowledgebases/kb-42"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    against(&dir, &server)
        .args(["operation", "wait", "op-1", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Succeeded"))
        .stdout(predicate::str::contains("/knowledgebases/kb-42"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_operation_wait_failed_reports_detail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/qnamaker/v4.0/operations/op-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "operationState": "Failed",
            "operationId": "op-2",
            "errorResponse": {
                "error": {
                    "code": "BadArgument",
                    "message": "Invalid knowledge base definition",
                    "details": [
                        { "message": "qnaList[0].answer is required" }
                    ]
                }
            }
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    against(&dir, &server)
        .args(["operation", "wait", "/operations/op-2"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Operation failed"))
        .stderr(predicate::str::contains("qnaList[0].answer is required"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_operation_wait_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/qnamaker/v4.0/operations/op-3"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Retry-After", "0")
                .set_body_json(json!({ "operationState": "Running" })),
        )
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    against(&dir, &server)
        .args(["operation", "wait", "op-3", "--max-attempts", "2"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("2 status checks"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_operation_wait_accepts_huge_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/qnamaker/v4.0/operations/op-4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "operationState": "Succeeded",
            "resourceLocation": "/knowledgebases/kb-7"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    against(&dir, &server)
        .args([
            "operation",
            "wait",
            "op-4",
            "--wait-timeout",
            "18446744073709551615",
            "-o",
            "json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("/knowledgebases/kb-7"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_operation_get_refuses_foreign_location() {
    let server = MockServer::start().await;
    let other = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "operationState": "Succeeded"
        })))
        .expect(0)
        .mount(&other)
        .await;

    let dir = TempDir::new().unwrap();
    against(&dir, &server)
        .args([
            "operation",
            "get",
            &format!("{}/qnamaker/v4.0/operations/op-5", other.uri()),
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not on the configured endpoint"));
}
