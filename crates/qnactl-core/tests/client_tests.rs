//! Integration tests for the knowledge base clients using a mock server

use std::time::Duration;

use pretty_assertions::assert_eq;
use qnactl_core::client::SUBSCRIPTION_KEY_HEADER;
use qnactl_core::{
    ApiKey, CoreError, CreateKbDto, OperationHandle, OperationState, QnaMakerClient, QueryDto,
    RuntimeClient,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SUBSCRIPTION_KEY: &str = "test-subscription-key";

fn client(server: &MockServer) -> QnaMakerClient {
    QnaMakerClient::builder()
        .endpoint(server.uri())
        .subscription_key(ApiKey::new(SUBSCRIPTION_KEY))
        .build()
        .unwrap()
}

fn create_dto() -> CreateKbDto {
    serde_json::from_value(json!({
        "name": "QnA Maker FAQ",
        "qnaList": [{
            "id": 0,
            "answer": "You can change the default message if you use the QnAMakerDialog.",
            "source": "Custom Editorial",
            "questions": ["How can I change the default message from QnA Maker?"],
            "metadata": []
        }],
        "urls": [],
        "files": []
    }))
    .unwrap()
}

// ============================================================================
// Submission
// ============================================================================

#[tokio::test]
async fn test_create_returns_location_handle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/qnamaker/v4.0/knowledgebases/create"))
        .and(header(SUBSCRIPTION_KEY_HEADER, SUBSCRIPTION_KEY))
        .and(body_json(serde_json::to_value(create_dto()).unwrap()))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("Location", "/operations/op-123")
                .set_body_json(json!({ "operationState": "NotStarted", "operationId": "op-123" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let submission = client(&server)
        .create_knowledge_base(&create_dto())
        .await
        .unwrap();

    assert_eq!(submission.handle.as_str(), "/operations/op-123");
    assert_eq!(
        submission.operation.map(|op| op.operation_state),
        Some(OperationState::NotStarted)
    );
}

#[tokio::test]
async fn test_missing_location_falls_back_to_operation_id() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/qnamaker/v4.0/knowledgebases/kb-1"))
        .respond_with(
            ResponseTemplate::new(202)
                .set_body_json(json!({ "operationState": "NotStarted", "operationId": "op-9" })),
        )
        .mount(&server)
        .await;

    let submission = client(&server)
        .update_knowledge_base("kb-1", &Default::default())
        .await
        .unwrap();

    assert_eq!(submission.handle.as_str(), "/operations/op-9");
}

#[tokio::test]
async fn test_missing_location_and_operation_id_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/qnamaker/v4.0/knowledgebases/create"))
        .respond_with(ResponseTemplate::new(202).set_body_string("{\"accepted\":true}"))
        .mount(&server)
        .await;

    let err = client(&server)
        .create_knowledge_base(&create_dto())
        .await
        .unwrap_err();

    match err {
        CoreError::Protocol { message, body } => {
            assert!(message.contains("Location"));
            assert_eq!(body.as_deref(), Some("{\"accepted\":true}"));
        }
        other => panic!("expected protocol error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_service_error_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/qnamaker/v4.0/knowledgebases/create"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": "BadArgument",
                "message": "Invalid input",
                "details": [{ "code": "BadArgument", "message": "qnaList[0].answer is empty" }]
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .create_knowledge_base(&create_dto())
        .await
        .unwrap_err();

    assert!(!err.is_not_found());
    match err {
        CoreError::Service { status, error } => {
            assert_eq!(status, 400);
            assert_eq!(
                error.messages(),
                vec!["Invalid input", "qnaList[0].answer is empty"]
            );
        }
        other => panic!("expected service error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unauthorized_without_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/qnamaker/v4.0/knowledgebases"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client(&server).list_knowledge_bases().await.unwrap_err();

    assert!(err.is_unauthorized());
    assert!(err.to_string().contains("Unauthorized"));
}

// ============================================================================
// Operation status
// ============================================================================

#[tokio::test]
async fn test_operation_status_uses_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/qnamaker/v4.0/operations/op-1"))
        .and(header(SUBSCRIPTION_KEY_HEADER, SUBSCRIPTION_KEY))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Retry-After", "5")
                .set_body_json(json!({ "operationState": "Running", "operationId": "op-1" })),
        )
        .mount(&server)
        .await;

    let result = client(&server)
        .get_operation(&OperationHandle::new("/operations/op-1"))
        .await
        .unwrap();

    assert_eq!(result.state(), &OperationState::Running);
    assert_eq!(result.wait_interval, Duration::from_secs(5));
    assert!(result.raw_body.contains("op-1"));
}

#[tokio::test]
async fn test_operation_status_defaults_without_usable_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/qnamaker/v4.0/operations/op-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "operationState": "Running" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/qnamaker/v4.0/operations/op-2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Retry-After", "Wed, 21 Oct 2015 07:28:00 GMT")
                .set_body_json(json!({ "operationState": "Running" })),
        )
        .mount(&server)
        .await;

    let client = client(&server);
    for id in ["op-1", "op-2"] {
        let result = client
            .get_operation(&OperationHandle::from_operation_id(id))
            .await
            .unwrap();
        assert_eq!(result.wait_interval, Duration::from_secs(30), "{}", id);
    }
}

#[tokio::test]
async fn test_absolute_operation_location() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/elsewhere/operations/op-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "operationState": "Succeeded" })),
        )
        .mount(&server)
        .await;

    let handle = OperationHandle::new(format!("{}/elsewhere/operations/op-1", server.uri()));
    let status = client(&server).operation_status(&handle).await.unwrap();

    assert_eq!(status.operation.operation_state, OperationState::Succeeded);
    assert_eq!(status.retry_after, None);
}

#[tokio::test]
async fn test_operation_location_on_another_host_gets_no_key() {
    let server = MockServer::start().await;
    let other = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "operationState": "Succeeded" })),
        )
        .expect(0)
        .mount(&other)
        .await;

    let handle = OperationHandle::new(format!("{}/qnamaker/v4.0/operations/op-1", other.uri()));
    let err = client(&server).operation_status(&handle).await.unwrap_err();

    assert!(matches!(err, CoreError::Protocol { .. }));
    assert!(err.to_string().contains(&other.uri()));
}

#[tokio::test]
async fn test_malformed_status_body_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/qnamaker/v4.0/operations/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client(&server)
        .get_operation(&OperationHandle::from_operation_id("op-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Protocol { body: Some(ref b), .. } if b == "<html>oops</html>"));
}

// ============================================================================
// Knowledge base management
// ============================================================================

#[tokio::test]
async fn test_list_and_get_knowledge_bases() {
    let server = MockServer::start().await;
    let kb = json!({
        "id": "kb-1",
        "name": "QnA Maker FAQ",
        "hostName": "https://my-qna.azurewebsites.net",
        "lastPublishedTimestamp": "2019-03-19T08:20:00Z"
    });
    Mock::given(method("GET"))
        .and(path("/qnamaker/v4.0/knowledgebases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "knowledgebases": [kb] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/qnamaker/v4.0/knowledgebases/kb-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(kb.clone()))
        .mount(&server)
        .await;

    let client = client(&server);
    let list = client.list_knowledge_bases().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, "kb-1");

    let fetched = client.get_knowledge_base("kb-1").await.unwrap();
    assert_eq!(fetched, list[0]);
}

#[tokio::test]
async fn test_publish_and_delete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/qnamaker/v4.0/knowledgebases/kb-1"))
        .and(header(SUBSCRIPTION_KEY_HEADER, SUBSCRIPTION_KEY))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/qnamaker/v4.0/knowledgebases/kb-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.publish_knowledge_base("kb-1").await.unwrap();
    client.delete_knowledge_base("kb-1").await.unwrap();
}

#[tokio::test]
async fn test_get_missing_knowledge_base() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/qnamaker/v4.0/knowledgebases/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": "KbNotFound", "message": "Knowledgebase not found." }
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .get_knowledge_base("missing")
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(
        err.error_detail().and_then(|d| d.code.as_deref()),
        Some("KbNotFound")
    );
}

#[tokio::test]
async fn test_endpoint_keys() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/qnamaker/v4.0/endpointkeys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "primaryEndpointKey": "primary",
            "secondaryEndpointKey": "secondary",
            "installedVersion": "4.0.5",
            "lastStableVersion": "4.0.6"
        })))
        .mount(&server)
        .await;

    let keys = client(&server).endpoint_keys().await.unwrap();
    assert_eq!(keys.primary_endpoint_key.as_deref(), Some("primary"));
    assert_eq!(keys.installed_version.as_deref(), Some("4.0.5"));
}

// ============================================================================
// Runtime
// ============================================================================

#[tokio::test]
async fn test_generate_answer_uses_endpoint_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/qnamaker/knowledgebases/kb-1/generateAnswer"))
        .and(header("Authorization", "EndpointKey runtime-key"))
        .and(body_json(json!({ "question": "How do I change the default message?", "top": 1 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answers": [{
                "answer": "You can change the default message if you use the QnAMakerDialog.",
                "score": 87.5,
                "id": 0,
                "questions": ["How can I change the default message from QnA Maker?"]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let runtime = RuntimeClient::new(&server.uri(), ApiKey::new("runtime-key")).unwrap();
    let response = runtime
        .generate_answer(
            "kb-1",
            &QueryDto::new("How do I change the default message?").top(1),
        )
        .await
        .unwrap();

    assert_eq!(response.answers.len(), 1);
    assert_eq!(response.answers[0].score, 87.5);
}

#[tokio::test]
async fn test_transport_error() {
    // Nothing listens on the discard port
    let client = QnaMakerClient::builder()
        .endpoint("http://127.0.0.1:9")
        .subscription_key(ApiKey::new(SUBSCRIPTION_KEY))
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let err = client.list_knowledge_bases().await.unwrap_err();
    assert!(err.is_transport());
}
