use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chrono::{Duration, Utc};
use google_services::{
    AuthorizationFlow, Credentials, GoogleServices, ServiceEndpoints, ServiceError,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{any, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct NoInteraction;

#[async_trait::async_trait]
impl AuthorizationFlow for NoInteraction {
    async fn authorize(&self, _scopes: &[&str]) -> Result<Credentials, ServiceError> {
        Err(ServiceError::Credential("interactive authorization is not available".into()))
    }
}

fn services(server: &MockServer) -> GoogleServices {
    GoogleServices::new(
        ServiceEndpoints {
            calendar_base: format!("{}/calendar/v3", server.uri()),
            gmail_base: format!("{}/gmail/v1", server.uri()),
        },
        Arc::new(NoInteraction),
    )
}

fn token_file(dir: &TempDir) -> PathBuf {
    let credentials = Credentials {
        token: Some("ya29.valid".into()),
        refresh_token: Some("1//refresh".into()),
        token_uri: "https://oauth2.googleapis.com/token".into(),
        client_id: "id".into(),
        client_secret: "secret".into(),
        scopes: vec![],
        expiry: Some(Utc::now() + Duration::hours(1)),
    };
    let path = dir.path().join("token.json");
    std::fs::write(&path, credentials.to_json().unwrap()).unwrap();
    path
}

fn message(body: Option<&str>, parts: &[&str]) -> serde_json::Value {
    let mut payload = json!({
        "parts": parts
            .iter()
            .map(|text| json!({ "body": { "data": URL_SAFE.encode(text) } }))
            .collect::<Vec<_>>()
    });
    if let Some(text) = body {
        payload["body"] = json!({ "data": URL_SAFE.encode(text) });
    }
    json!({ "id": "ignored", "payload": payload })
}

async fn mount_message(server: &MockServer, id: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/gmail/v1/users/me/messages/{id}")))
        .and(query_param("format", "full"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn extracts_first_capture_in_message_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .and(query_param("q", "from:noreply@bank.test"))
        .and(query_param("maxResults", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{ "id": "m1", "threadId": "t1" }, { "id": "m2", "threadId": "t2" }],
            "resultSizeEstimate": 2
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_message(&server, "m1", message(Some("Hello, no code here"), &[])).await;
    mount_message(
        &server,
        "m2",
        message(None, &["<p>ignored</p>", "Your code is 482913."]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let found = services(&server)
        .extract_string_from_inbox(&token_file(&dir), "noreply@bank.test", r"code is (\d{6})")
        .await
        .unwrap();

    assert_eq!(found.as_deref(), Some("482913"));
}

#[tokio::test]
async fn extraction_yields_none_on_api_failure_or_no_match() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .and(query_param("q", "from:broken@test"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .and(query_param("q", "from:quiet@test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "resultSizeEstimate": 0 })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let token = token_file(&dir);
    let services = services(&server);

    assert_eq!(
        services
            .extract_string_from_inbox(&token, "broken@test", r"(\d+)")
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        services
            .extract_string_from_inbox(&token, "quiet@test", r"(\d+)")
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn empty_inputs_make_no_requests() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let token = token_file(&dir);
    let services = services(&server);

    services
        .send_email(&token, "Subject", "me@test", "", "content")
        .await
        .unwrap();
    services
        .send_email(&token, "Subject", "me@test", "you@test", "")
        .await
        .unwrap();
    assert_eq!(
        services
            .extract_string_from_inbox(&token, "", r"(\d+)")
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        services
            .extract_string_from_inbox(Path::new(""), "me@test", r"(\d+)")
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn sends_encoded_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gmail/v1/users/me/messages/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "sent-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    services(&server)
        .send_email(&token_file(&dir), "Weekly", "me@test", "you@test", "All good")
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let raw = URL_SAFE.decode(body["raw"].as_str().unwrap()).unwrap();
    let text = String::from_utf8(raw).unwrap();
    assert!(text.starts_with("Subject: Weekly\r\nFrom: me@test\r\nTo: you@test\r\n"), "{text}");
    assert!(text.ends_with("\r\n\r\nAll good\r\n"), "{text}");
}

#[tokio::test]
async fn send_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gmail/v1/users/me/messages/send"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "Insufficient Permission" }
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let err = services(&server)
        .send_email(&token_file(&dir), "s", "me@test", "you@test", "x")
        .await
        .unwrap_err();
    assert!(err.is_remote());
    assert!(err.to_string().contains("Insufficient Permission"));
}

#[tokio::test]
async fn existing_calendar_id_skips_creation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/calendar/v3/calendars"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "new" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/calendar/v3/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "evt",
            "summary": "Dentist",
            "start": { "dateTime": "2024-06-01T10:00:00Z" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let token = token_file(&dir);
    let services = services(&server);

    let (calendar, id) = services
        .create_or_get_calendar(&token, Some("primary"), "ignored", "UTC")
        .await
        .unwrap();
    assert_eq!(id, "primary");
    let event = services
        .insert_event(&calendar, &id, &json!({ "summary": "Dentist" }))
        .await
        .unwrap();
    assert_eq!(event["id"], "evt");

    let (_, created) = services
        .create_or_get_calendar(&token, Some(""), "Shifts", "UTC")
        .await
        .unwrap();
    assert_eq!(created, "new");
}

#[tokio::test]
async fn missing_token_without_flow_is_a_credential_fault() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let err = services(&server)
        .send_email(&dir.path().join("absent.json"), "s", "a@test", "b@test", "c")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Credential(_)));
    assert!(!err.is_remote());
}
