use clinic_client::ErrorKind;
use clinic_client::auth::TokenStore;
use clinic_client::list::PageFetcher;
use clinic_client::models::Patients;
use clinic_client::query::ListQuery;
use serde_json::{Value, json};
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "test_utils/mod.rs"]
mod test_utils;

#[tokio::test]
async fn sends_bearer_token_and_correlation_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/patients"))
        .and(header("authorization", "Bearer access-1"))
        .and(header("content-type", "application/json"))
        .and(header_exists("x-request-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let (http, _) = test_utils::signed_in_client(&server.uri(), "access-1");
    let _: Value = http.get("/v1/patients", &[]).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let request_id = requests[0]
        .headers
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(request_id.starts_with("corr-"));
}

#[tokio::test]
async fn no_authorization_header_without_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;

    let (http, store) = test_utils::anonymous_client(&server.uri());
    assert!(!store.is_authenticated());
    let _: Value = http.get("/v1/patients", &[]).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn problem_body_becomes_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/patients"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "DUPLICATE_MRN",
            "message": "MRN already registered",
            "trace_id": "corr-deadbeef"
        })))
        .mount(&server)
        .await;

    let (http, _) = test_utils::signed_in_client(&server.uri(), "access-1");
    let err = http
        .post::<_, Value>("/v1/patients", &[], &json!({"mrn": "MRN-000001"}))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Http);
    assert_eq!(err.status(), Some(409));
    assert!(err.user_message().contains("409"));
    assert!(err.user_message().contains("MRN already registered"));
}

#[tokio::test]
async fn plain_text_error_falls_back_to_body_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/appointments"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let (http, _) = test_utils::anonymous_client(&server.uri());
    let err = http.get::<Value>("/v1/appointments", &[]).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "request failed with status 502: upstream unavailable"
    );
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };

    let (http, _) = test_utils::anonymous_client(&uri);
    let err = http.get::<Value>("/v1/patients", &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn success_envelope_is_unwrapped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/patients/p-1"))
        .and(query_param("doctor_id", "dr-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": test_utils::patient("p-1", "Sarah")
        })))
        .mount(&server)
        .await;

    let (http, _) = test_utils::anonymous_client(&server.uri());
    let service = clinic_client::services::PatientService::new(http, Some("dr-7".to_string()));
    let patient = service.get("p-1").await.unwrap();
    assert_eq!(patient.first_name, "Sarah");
}

#[tokio::test]
async fn bare_data_envelope_yields_the_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/patients/p-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": test_utils::patient("p-1", "Sarah")
        })))
        .mount(&server)
        .await;

    let (http, _) = test_utils::anonymous_client(&server.uri());
    let patient = clinic_client::services::PatientService::new(http, None)
        .get("p-1")
        .await
        .unwrap();
    assert_eq!(patient.id, "p-1");
    assert_eq!(patient.first_name, "Sarah");
}

#[tokio::test]
async fn bare_data_envelope_of_rows_yields_a_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [test_utils::patient("p-1", "Ana"), test_utils::patient("p-2", "Ben")]
        })))
        .mount(&server)
        .await;

    let (http, _) = test_utils::anonymous_client(&server.uri());
    let service = clinic_client::services::PatientService::new(http, None).list();
    let page = service
        .fetch_page(&ListQuery::<Patients>::new())
        .await
        .unwrap();
    let ids: Vec<&str> = page.items.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["p-1", "p-2"]);
    assert!(!page.has_more());
}

#[tokio::test]
async fn empty_success_body_decodes_to_unit() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/patients/p-1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let (http, _) = test_utils::anonymous_client(&server.uri());
    http.delete::<()>("/v1/patients/p-1", &[]).await.unwrap();
}
