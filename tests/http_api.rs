//! Router-level tests through the public crate API, including cases loaded
//! from a fixtures file and the WhatsApp webhook sharing the session store.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use stetholink::api::{build_router, ApiContext};
use stetholink::bot::{BotHandler, WhatsAppBridge};
use stetholink::config::WhatsAppConfig;
use stetholink::simulation::{CaseCatalog, InMemorySessionStore, SessionStore};

const FIXTURES: &str = r#"[
    {
        "caseType": "caseA",
        "title": "Case A",
        "summary": "A short test case",
        "initialPrompt": "I feel unwell.",
        "expectedDiagnosis": "Diagnosis X",
        "acceptedAliases": ["dx x"],
        "scoreIncrement": 5,
        "rules": [
            {"key": "pain", "pattern": "pain|hurt", "response": "My side hurts."}
        ],
        "fallbackResponse": "I'm not sure."
    }
]"#;

fn catalog_from_file() -> CaseCatalog {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cases.json");
    std::fs::write(&path, FIXTURES).unwrap();
    CaseCatalog::load(&path).unwrap()
}

fn app(store: Arc<dyn SessionStore>) -> Router {
    build_router(ApiContext::new(store), None, None)
}

async fn call(app: Router, method: &str, uri: &str, body: Option<String>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_file_fixture_scoring_and_conclusion() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(Arc::new(catalog_from_file())));

    let (status, json) = call(
        app(store.clone()),
        "POST",
        "/start",
        Some(r#"{"subjectId":"s1","caseType":"caseA"}"#.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["initialPrompt"], "I feel unwell.");
    let id = json["sessionId"].as_str().unwrap().to_string();

    let (_, json) = call(
        app(store.clone()),
        "POST",
        "/interact",
        Some(format!(r#"{{"sessionId":"{id}","text":"Where does it hurt?"}}"#)),
    )
    .await;
    assert_eq!(json["response"], "My side hurts.");
    assert_eq!(json["score"], 5);

    let (_, json) = call(
        app(store.clone()),
        "POST",
        "/interact",
        Some(format!(r#"{{"sessionId":"{id}","text":"Any cough?"}}"#)),
    )
    .await;
    assert_eq!(json["response"], "I'm not sure.");
    assert_eq!(json["score"], 10);

    let (status, json) = call(
        app(store.clone()),
        "POST",
        "/conclude",
        Some(format!(r#"{{"sessionId":"{id}","submission":"diagnosis x"}}"#)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["correctness"], true);
    assert_eq!(json["finalScore"], 10);
    assert_eq!(json["transcriptLength"], 4);
    assert_eq!(json["expectedDiagnosis"], "Diagnosis X");

    let (status, json) = call(app(store.clone()), "GET", &format!("/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "concluded");
    assert_eq!(json["summary"]["finalScore"], 10);
}

#[tokio::test]
async fn test_builtin_case_is_unknown_with_file_catalog() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(Arc::new(catalog_from_file())));
    let (status, json) = call(
        app(store),
        "POST",
        "/start",
        Some(r#"{"subjectId":"s1","caseType":"dengue"}"#.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_whatsapp_session_visible_over_rest() {
    let store: Arc<dyn SessionStore> =
        Arc::new(InMemorySessionStore::new(Arc::new(CaseCatalog::builtin())));
    let handler = Arc::new(BotHandler::new(store.clone()));
    let config = WhatsAppConfig {
        verify_token: "verify-me".to_string(),
        access_token: None,
        phone_number_id: None,
        api_base: "http://localhost".to_string(),
    };
    let bridge = Arc::new(WhatsAppBridge::new(&config, handler));
    let router = build_router(ApiContext::new(store.clone()), Some(bridge), None);

    let payload = r#"{"object":"whatsapp_business_account","entry":[{"changes":[{"field":"messages","value":{"messages":[{"from":"9477000111","type":"text","text":{"body":"/case chest_pain"}}]}}]}]}"#;
    let (status, json) = call(router.clone(), "POST", "/webhook/whatsapp", Some(payload.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["processed"], 1);

    let (status, json) = call(router, "GET", "/active/wa:9477000111", None).await;
    assert_eq!(status, StatusCode::OK);
    let active = json.as_array().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["caseType"], "chest_pain");
}
