//! Simulation session endpoints.
//!
//! - `POST /start` - open a session for a case
//! - `POST /interact` - ask the simulated patient a question
//! - `POST /conclude` - submit a diagnosis and close the session
//! - `GET /active/:subject_id` - a student's open sessions
//! - `GET /sessions/:id` - full session record
//! - `GET /cases` - case catalogue

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::error::{require, ApiError};
use crate::api::ApiContext;
use crate::simulation::{CaseInfo, Session, SessionSummary, SummaryRecord};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    #[serde(default)]
    pub subject_id: String,
    #[serde(default)]
    pub case_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub session_id: String,
    pub initial_prompt: String,
    pub summary_fixture: CaseInfo,
}

/// `POST /start`
pub async fn start(
    State(ctx): State<ApiContext>,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> Result<Json<StartResponse>, ApiError> {
    let Json(req) = payload?;
    require("subjectId", &req.subject_id)?;
    require("caseType", &req.case_type)?;

    let session = ctx.store.create(req.subject_id.trim(), &req.case_type)?;
    let case = ctx
        .store
        .catalog()
        .get(&session.case_type)
        .ok_or_else(|| ApiError::Validation(format!("Unknown caseType '{}'", req.case_type)))?;

    Ok(Json(StartResponse {
        session_id: session.id,
        initial_prompt: case.fixture().initial_prompt.clone(),
        summary_fixture: case.info(),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InteractResponse {
    pub response: String,
    pub score: u32,
}

/// Longest question accepted from a client.
const MAX_TEXT_LENGTH: usize = 2000;

/// `POST /interact`
pub async fn interact(
    State(ctx): State<ApiContext>,
    payload: Result<Json<InteractRequest>, JsonRejection>,
) -> Result<Json<InteractResponse>, ApiError> {
    let Json(req) = payload?;
    require("sessionId", &req.session_id)?;
    require("text", &req.text)?;
    if req.text.chars().count() > MAX_TEXT_LENGTH {
        return Err(ApiError::Validation(format!("text too long (max {MAX_TEXT_LENGTH} chars)")));
    }

    let exchange = ctx.store.interact(req.session_id.trim(), req.text.trim())?;
    Ok(Json(InteractResponse {
        response: exchange.response,
        score: exchange.score,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcludeRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub submission: String,
}

/// `POST /conclude`
pub async fn conclude(
    State(ctx): State<ApiContext>,
    payload: Result<Json<ConcludeRequest>, JsonRejection>,
) -> Result<Json<SummaryRecord>, ApiError> {
    let Json(req) = payload?;
    require("sessionId", &req.session_id)?;
    require("submission", &req.submission)?;

    let record = ctx.store.conclude(req.session_id.trim(), &req.submission)?;
    info!(
        "📋 {} submitted \"{}\" for {} → {}",
        record.session_id,
        record.submission,
        record.case_type,
        if record.correctness { "correct" } else { "incorrect" }
    );
    Ok(Json(record))
}

/// `GET /active/:subject_id`
pub async fn active(
    State(ctx): State<ApiContext>,
    Path(subject_id): Path<String>,
) -> Json<Vec<SessionSummary>> {
    Json(ctx.store.list_active(&subject_id))
}

/// `GET /sessions/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(ctx.store.get(&id)?))
}

/// `GET /cases`
pub async fn cases(State(ctx): State<ApiContext>) -> Json<Vec<CaseInfo>> {
    Json(ctx.store.catalog().list())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub sessions: usize,
}

/// `GET /health`
pub async fn health(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        sessions: ctx.store.session_count(),
    })
}
