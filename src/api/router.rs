//! HTTP router.
//!
//! Session routes sit at the root (`/start`, `/interact`, ...). The WhatsApp
//! webhook is merged in when configured, and a static asset directory, if
//! any, serves everything else.

use std::path::Path;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::api::sessions;
use crate::api::ApiContext;
use crate::bot::whatsapp::{self, WhatsAppBridge};

pub fn build_router(
    ctx: ApiContext,
    whatsapp: Option<Arc<WhatsAppBridge>>,
    static_dir: Option<&Path>,
) -> Router {
    // NOTE: Path params use `:param` syntax (axum 0.7).
    let mut router = Router::new()
        .route("/health", get(sessions::health))
        .route("/cases", get(sessions::cases))
        .route("/start", post(sessions::start))
        .route("/interact", post(sessions::interact))
        .route("/conclude", post(sessions::conclude))
        .route("/active/:subject_id", get(sessions::active))
        .route("/sessions/:id", get(sessions::detail))
        .with_state(ctx);

    if let Some(bridge) = whatsapp {
        router = router.merge(whatsapp::routes(bridge));
    }

    // The front end may be hosted on another origin
    router = router.layer(CorsLayer::permissive());

    match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::simulation::{CaseCatalog, InMemorySessionStore, SessionStore};

    fn test_ctx() -> ApiContext {
        let store: Arc<dyn SessionStore> =
            Arc::new(InMemorySessionStore::new(Arc::new(CaseCatalog::builtin())));
        ApiContext::new(store)
    }

    fn make_request(method: &str, uri: &str, body: Option<&str>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(ctx: &ApiContext, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let app = build_router(ctx.clone(), None, None);
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    async fn start_session(ctx: &ApiContext, subject: &str, case_type: &str) -> String {
        let body = format!(r#"{{"subjectId":"{subject}","caseType":"{case_type}"}}"#);
        let (status, json) = send(ctx, make_request("POST", "/start", Some(&body))).await;
        assert_eq!(status, StatusCode::OK);
        json["sessionId"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_session_count() {
        let ctx = test_ctx();
        start_session(&ctx, "student_1", "dengue").await;

        let (status, json) = send(&ctx, make_request("GET", "/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["sessions"], 1);
    }

    #[tokio::test]
    async fn cases_lists_catalogue_without_answers() {
        let ctx = test_ctx();
        let (status, json) = send(&ctx, make_request("GET", "/cases", None)).await;
        assert_eq!(status, StatusCode::OK);

        let cases = json.as_array().unwrap();
        assert!(cases.iter().any(|c| c["caseType"] == "dengue"));
        assert!(cases.iter().all(|c| c.get("expectedDiagnosis").is_none()));
    }

    #[tokio::test]
    async fn start_returns_prompt_and_fixture() {
        let ctx = test_ctx();
        let body = r#"{"subjectId":"student_1","caseType":"chest_pain"}"#;
        let (status, json) = send(&ctx, make_request("POST", "/start", Some(body))).await;

        assert_eq!(status, StatusCode::OK);
        assert!(!json["sessionId"].as_str().unwrap().is_empty());
        assert!(json["initialPrompt"].as_str().unwrap().contains("chest"));
        assert_eq!(json["summaryFixture"]["caseType"], "chest_pain");
        assert_eq!(json["summaryFixture"]["title"], "Crushing chest pain");
    }

    #[tokio::test]
    async fn start_missing_field_is_validation_error() {
        let ctx = test_ctx();
        let (status, json) = send(&ctx, make_request("POST", "/start", Some(r#"{"caseType":"dengue"}"#))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(json["error"]["message"], "subjectId is required");
    }

    #[tokio::test]
    async fn start_unknown_case_is_validation_error() {
        let ctx = test_ctx();
        let body = r#"{"subjectId":"student_1","caseType":"gout"}"#;
        let (status, json) = send(&ctx, make_request("POST", "/start", Some(body))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn malformed_json_is_validation_error() {
        let ctx = test_ctx();
        let (status, json) = send(&ctx, make_request("POST", "/start", Some("{not json"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn missing_content_type_is_validation_error() {
        let ctx = test_ctx();
        let req = Request::builder()
            .method("POST")
            .uri("/interact")
            .body(Body::from(r#"{"sessionId":"x","text":"hi"}"#))
            .unwrap();
        let (status, json) = send(&ctx, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn interact_returns_response_and_score() {
        let ctx = test_ctx();
        let id = start_session(&ctx, "student_1", "dengue").await;

        let body = format!(r#"{{"sessionId":"{id}","text":"Have you noticed any rash?"}}"#);
        let (status, json) = send(&ctx, make_request("POST", "/interact", Some(&body))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["response"].as_str().unwrap().contains("red spots"));
        assert_eq!(json["score"], 2);
    }

    #[tokio::test]
    async fn interact_unknown_session_is_404() {
        let ctx = test_ctx();
        let body = r#"{"sessionId":"unknown-id","text":"hello"}"#;
        let (status, json) = send(&ctx, make_request("POST", "/interact", Some(body))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn interact_blank_text_is_validation_error() {
        let ctx = test_ctx();
        let id = start_session(&ctx, "student_1", "dengue").await;
        let body = format!(r#"{{"sessionId":"{id}","text":"   "}}"#);
        let (status, _) = send(&ctx, make_request("POST", "/interact", Some(&body))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn conclude_then_interact_is_conflict() {
        let ctx = test_ctx();
        let id = start_session(&ctx, "student_1", "leptospirosis").await;

        let body = format!(r#"{{"sessionId":"{id}","submission":"Leptospirosis"}}"#);
        let (status, json) = send(&ctx, make_request("POST", "/conclude", Some(&body))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["correctness"], true);
        assert_eq!(json["sessionId"], id.as_str());
        assert_eq!(json["transcriptLength"], 0);

        let (status, json) = send(&ctx, make_request("POST", "/conclude", Some(&body))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "INVALID_STATE");

        let body = format!(r#"{{"sessionId":"{id}","text":"hello"}}"#);
        let (status, _) = send(&ctx, make_request("POST", "/interact", Some(&body))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn active_lists_only_open_sessions() {
        let ctx = test_ctx();
        let open = start_session(&ctx, "student_1", "dengue").await;
        let closed = start_session(&ctx, "student_1", "chest_pain").await;
        start_session(&ctx, "student_2", "dengue").await;

        let body = format!(r#"{{"sessionId":"{closed}","submission":"angina"}}"#);
        send(&ctx, make_request("POST", "/conclude", Some(&body))).await;

        let (status, json) = send(&ctx, make_request("GET", "/active/student_1", None)).await;
        assert_eq!(status, StatusCode::OK);
        let list = json.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["sessionId"], open.as_str());
        assert_eq!(list[0]["status"], "active");
    }

    #[tokio::test]
    async fn session_detail_includes_transcript() {
        let ctx = test_ctx();
        let id = start_session(&ctx, "student_1", "dengue").await;
        let body = format!(r#"{{"sessionId":"{id}","text":"What brings you here?"}}"#);
        send(&ctx, make_request("POST", "/interact", Some(&body))).await;

        let (status, json) = send(&ctx, make_request("GET", &format!("/sessions/{id}"), None)).await;
        assert_eq!(status, StatusCode::OK);
        let transcript = json["transcript"].as_array().unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0]["actor"], "requester");
        assert_eq!(transcript[1]["actor"], "respondent");
        assert_eq!(json["askedPrompts"][0], "complaint");

        let (status, _) = send(&ctx, make_request("GET", "/sessions/unknown-id", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn static_dir_serves_front_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>StethoLink</h1>").unwrap();

        let app = build_router(test_ctx(), None, Some(dir.path()));
        let response = app.oneshot(make_request("GET", "/index.html", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"<h1>StethoLink</h1>");
    }

    #[tokio::test]
    async fn unknown_route_is_404_without_static_dir() {
        let ctx = test_ctx();
        let (status, _) = send(&ctx, make_request("GET", "/nope", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
