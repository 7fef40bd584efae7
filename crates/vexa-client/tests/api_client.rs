//! HTTP-level behaviour of the client against a mock backend.

use std::sync::Arc;

use serde_json::json;
use vexa_client::{
    AccessGrant, AccessLevel, ApiClient, AuthGuard, ClientError, DatasetType, FileAction,
    MemorySessionStore, ModelUpdate, ResourceId, ResourceStatus, Session, SessionState,
    SessionStore, UserProfile, ValidationStatus,
};
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn kamil() -> UserProfile {
    UserProfile {
        id: Some(1),
        username: "kamil".into(),
        email: None,
        is_active: Some(true),
    }
}

fn signed_out(server: &MockServer) -> (ApiClient, Arc<MemorySessionStore>) {
    let store = Arc::new(MemorySessionStore::new());
    let guard = Arc::new(AuthGuard::new(store.clone()));
    let client = ApiClient::with_url(&server.uri(), guard).unwrap();
    (client, store)
}

fn signed_in(server: &MockServer, token: &str) -> (ApiClient, Arc<MemorySessionStore>) {
    let store = Arc::new(MemorySessionStore::with_session(Session::new(token, kamil())));
    let guard = Arc::new(AuthGuard::new(store.clone()));
    assert!(guard.restore());
    let client = ApiClient::with_url(&server.uri(), guard).unwrap();
    (client, store)
}

#[tokio::test]
async fn test_login_persists_session_and_authorizes_later_calls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"username": "kamil", "password": "123456"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "T",
            "token_type": "bearer",
            "user": {"username": "kamil"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/queries"))
        .and(header("Authorization", "Bearer T"))
        .and(query_param("skip", "0"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "queries": [{"id": 4, "query_text": "hi", "response_text": "hello", "context": null,
                         "timestamp": "2024-05-01T10:00:00"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = signed_out(&server);
    let user = client.login("kamil", "123456").await.unwrap();
    assert_eq!(user.username, "kamil");

    match client.guard().state() {
        SessionState::Authenticated(session) => assert_eq!(session.token, "T"),
        other => panic!("expected authenticated, got {:?}", other),
    }
    assert_eq!(store.load().unwrap().map(|s| s.token), Some("T".to_string()));

    let history = client.queries(0, 20).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].response_text.as_deref(), Some("hello"));
}

#[tokio::test]
async fn test_wrong_password_is_a_request_error_not_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"detail": "Incorrect username or password"})),
        )
        .mount(&server)
        .await;

    let (client, store) = signed_out(&server);
    let err = client.login("kamil", "nope").await.unwrap_err();

    match err {
        ClientError::Request { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Incorrect username or password");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(client.guard().state(), SessionState::Uninitialized);
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn test_failed_relogin_keeps_current_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"detail": "Incorrect username or password"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/queries"))
        .and(header("Authorization", "Bearer OLD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"queries": []})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = signed_in(&server, "OLD");
    assert!(client.login("someone-else", "nope").await.is_err());

    assert!(client.guard().is_authenticated());
    assert_eq!(client.guard().token().as_deref(), Some("OLD"));
    assert_eq!(store.load().unwrap().map(|s| s.token), Some("OLD".to_string()));
    assert!(client.queries(0, 20).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unauthorized_signs_out_and_blocks_further_calls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fine-tuned-models"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Could not validate credentials"})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = signed_in(&server, "T");
    let mut session_rx = client.guard().subscribe();

    let err = client.fine_tuned_models(None).await.unwrap_err();
    assert!(err.is_auth_expired());

    assert!(session_rx.has_changed().unwrap());
    assert_eq!(*session_rx.borrow_and_update(), SessionState::Uninitialized);
    assert!(store.load().unwrap().is_none());
    assert!(client.guard().user().is_none());

    // no request leaves the process until a new login
    let err = client.fine_tuned_models(None).await.unwrap_err();
    assert!(matches!(err, ClientError::NotAuthenticated));
}

#[tokio::test]
async fn test_forbidden_also_expires_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fine-tuned-models/3/stop-training"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"detail": "Not authenticated"})))
        .mount(&server)
        .await;

    let (client, _store) = signed_in(&server, "T");
    let err = client.stop_training(&ResourceId::from(3)).await.unwrap_err();
    assert!(err.is_auth_expired());
    assert!(!client.guard().is_authenticated());
}

#[tokio::test]
async fn test_register_leaves_session_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .and(body_json(json!({"username": "ola", "password": "secret", "email": "ola@example.com"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 2, "username": "ola", "email": "ola@example.com",
            "is_active": true, "created_at": "2024-05-01T10:00:00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = signed_out(&server);
    let user = client
        .register("ola", "secret", Some("ola@example.com"))
        .await
        .unwrap();
    assert_eq!(user.id, Some(2));
    assert_eq!(client.guard().state(), SessionState::Uninitialized);
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn test_validation_never_reaches_the_network() {
    let server = MockServer::start().await;
    let (client, _store) = signed_in(&server, "T");

    assert!(matches!(
        client.ask("   ", None, None).await,
        Err(ClientError::Validation(_))
    ));
    assert!(matches!(
        client.login("", "pw").await,
        Err(ClientError::Validation(_))
    ));
    assert!(matches!(
        client.register("ola", "pw", Some("not-an-email")).await,
        Err(ClientError::Validation(_))
    ));

    let received = server.received_requests().await.unwrap();
    assert!(received.is_empty());
    // a rejected login form does not disturb the live session
    assert!(client.guard().is_authenticated());
}

#[tokio::test]
async fn test_server_error_keeps_session() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/queries/9"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Query not found"})))
        .mount(&server)
        .await;

    let (client, _store) = signed_in(&server, "T");
    let err = client.delete_query(9).await.unwrap_err();
    assert!(err.is_request_error());
    assert_eq!(err.status(), Some(404));
    assert!(client.guard().is_authenticated());
}

#[tokio::test]
async fn test_training_status_and_logs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fine-tuned-models/5/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model_id": 5, "status": "training", "progress": 40,
            "created_at": "2024-05-01T10:00:00", "completed_at": null, "model_size": null
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fine-tuned-models/5/logs"))
        .and(query_param("limit", "10"))
        .and(query_param("log_level", "warning"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "log_level": "WARNING", "message": "Training stopped by user", "step": null}
        ])))
        .mount(&server)
        .await;

    let (client, _store) = signed_in(&server, "T");
    let id = ResourceId::from(5);

    let status = client.training_status(&id).await.unwrap();
    assert_eq!(status.status, ResourceStatus::Running);
    assert_eq!(status.progress, 40);

    let logs = client.training_logs(&id, 10, Some("warning")).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].log_level, "WARNING");
}

#[tokio::test]
async fn test_generate_csv_returns_raw_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/files/generate-csv"))
        .and(body_json(json!({"description": "sales data", "filename": "sales.csv"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/csv")
                .set_body_string("Month,Sales\nJanuary,15000\n"),
        )
        .mount(&server)
        .await;

    let (client, _store) = signed_in(&server, "T");
    let action = FileAction {
        action: FileAction::GENERATE_CSV.to_string(),
        filename: Some("sales.csv".into()),
        description: Some("sales data".into()),
    };
    let file = client.generate_csv(&action).await.unwrap();
    assert_eq!(file.filename, "sales.csv");
    assert!(String::from_utf8(file.bytes).unwrap().starts_with("Month,Sales"));
}

#[tokio::test]
async fn test_undecodable_body_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
        .mount(&server)
        .await;

    let (client, _store) = signed_out(&server);
    let err = client.health().await.unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)));
}

#[tokio::test]
async fn test_dataset_upload_list_and_validate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fine-tuned-models/5/datasets"))
        .and(header("Authorization", "Bearer T"))
        .and(query_param("dataset_type", "csv"))
        .and(query_param("description", "shop manuals"))
        .and(body_string_contains("filename=\"manuals.csv\""))
        .and(body_string_contains("question,answer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 11, "model_id": 5, "filename": "manuals.csv", "file_size": 24,
            "dataset_type": "csv", "validation_status": "valid", "row_count": 1,
            "validation_errors": null, "uploaded_by": 1
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fine-tuned-models/5/datasets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 11, "model_id": 5, "filename": "manuals.csv", "dataset_type": "csv",
             "validation_status": "valid", "row_count": 1},
            {"id": 12, "model_id": 5, "filename": "notes.txt", "dataset_type": "txt",
             "validation_status": "invalid", "validation_errors": {"errors": ["empty file"]}}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/datasets/12/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "is_valid": false, "errors": ["Text file is empty"], "warnings": [],
            "row_count": 0, "column_info": {}
        })))
        .mount(&server)
        .await;

    let (client, _store) = signed_in(&server, "T");
    let id = ResourceId::from(5);

    let dataset = client
        .upload_dataset(
            &id,
            "manuals.csv",
            b"question,answer\nq,a\n".to_vec(),
            DatasetType::Csv,
            Some("shop manuals"),
        )
        .await
        .unwrap();
    assert_eq!(dataset.id, ResourceId::from(11));
    assert_eq!(dataset.validation_status, ValidationStatus::Valid);

    let datasets = client.datasets(&id).await.unwrap();
    assert_eq!(datasets.len(), 2);
    assert_eq!(datasets[1].validation_status, ValidationStatus::Invalid);

    let report = client.validate_dataset(&datasets[1].id).await.unwrap();
    assert!(!report.is_valid);
    assert_eq!(report.errors, vec!["Text file is empty".to_string()]);
}

#[tokio::test]
async fn test_empty_dataset_is_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (client, _store) = signed_in(&server, "T");
    let id = ResourceId::from(5);
    let err = client
        .upload_dataset(&id, "empty.jsonl", Vec::new(), DatasetType::Jsonl, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    let err = client
        .update_fine_tuned_model(&id, &ModelUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
}

#[tokio::test]
async fn test_update_share_and_statistics() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/fine-tuned-models/5"))
        .and(body_json(json!({"description": "Car repair expert"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 5, "name": "mechanic-bot", "description": "Car repair expert",
            "training_status": "completed", "training_progress": 100
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/fine-tuned-models/5/access"))
        .and(body_json(json!({"user_id": 2, "access_level": "read"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1, "user_id": 2, "model_id": 5, "access_level": "read"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fine-tuned-models/5/access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"user_id": 1, "username": "kamil", "access_level": "admin",
             "access_type": "owner", "granted_at": "2024-05-01T10:00:00", "is_active": true},
            {"user_id": 2, "username": "ola", "access_level": "read",
             "access_type": "granted", "expires_at": null, "is_active": true}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/fine-tuned-models/5/access/2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"message": "Access revoked successfully"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fine-tuned-models/5/statistics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model_id": 5, "model_name": "mechanic-bot", "training_status": "completed",
            "model_size_bytes": 10485760, "created_at": "2024-05-01T10:00:00",
            "completed_at": "2024-05-01T11:00:00", "total_queries": 42,
            "specialization": "mechanic", "base_model": "microsoft/DialoGPT-medium"
        })))
        .mount(&server)
        .await;

    let (client, _store) = signed_in(&server, "T");
    let id = ResourceId::from(5);

    let update = ModelUpdate {
        description: Some("Car repair expert".into()),
        ..Default::default()
    };
    let model = client.update_fine_tuned_model(&id, &update).await.unwrap();
    assert_eq!(model.description.as_deref(), Some("Car repair expert"));

    let grant = AccessGrant {
        user_id: 2,
        access_level: AccessLevel::Read,
        expires_at: None,
    };
    client.grant_access(&id, &grant).await.unwrap();

    let access = client.access_list(&id).await.unwrap();
    assert_eq!(access.len(), 2);
    assert_eq!(access[1].username.as_deref(), Some("ola"));

    let ack = client.revoke_access(&id, 2).await.unwrap();
    assert_eq!(ack.message.as_deref(), Some("Access revoked successfully"));

    let stats = client.model_statistics(&id).await.unwrap();
    assert_eq!(stats.status, ResourceStatus::Completed);
    assert_eq!(stats.total_queries, 42);
}
