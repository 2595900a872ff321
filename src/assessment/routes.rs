//! REST endpoints for the interview flow.
//!
//! The transport is a thin layer: every handler validates its inputs,
//! calls into the [`TurnController`], and maps domain errors onto HTTP
//! status classes. All state lives in the session store.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::error::AssessmentError;

use super::controller::{NextStep, TurnController};

/// Shared state for the assessment routes.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<TurnController>,
}

/// Domain error wrapper carrying the HTTP mapping.
struct ApiError(AssessmentError);

impl From<AssessmentError> for ApiError {
    fn from(err: AssessmentError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AssessmentError::Validation(_)
            | AssessmentError::NoOpenTurn(_)
            | AssessmentError::NoAssessment(_) => StatusCode::BAD_REQUEST,
            AssessmentError::NotFound(_) => StatusCode::NOT_FOUND,
            AssessmentError::OracleUnavailable(_) => StatusCode::BAD_GATEWAY,
            AssessmentError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = json!({"error": self.0.to_string()});
        if matches!(self.0, AssessmentError::NoOpenTurn(_)) {
            body["hint"] = json!("request next-step to get a new question");
        }

        tracing::warn!(status = %status, error = %self.0, "Request failed");
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    user_id: Option<String>,
}

impl UserQuery {
    fn user_id(self) -> Result<String, ApiError> {
        match self.user_id {
            Some(user_id) if !user_id.trim().is_empty() => Ok(user_id),
            _ => Err(AssessmentError::Validation("Missing user_id".to_string()).into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    user_id: Option<String>,
    user_response: Option<String>,
}

/// GET /next-step?user_id=X
///
/// Returns either the next question or, once five answers are recorded,
/// the final profile and classification.
async fn next_step(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = query.user_id()?;
    match state.controller.next_step(&user_id).await? {
        NextStep::Question { question } => Ok(Json(json!({"next_question": question}))),
        NextStep::Final {
            profile,
            classification,
            conversation_history,
        } => {
            let mut body = json!({
                "profile": profile,
                "conversation_history": conversation_history,
                "is_final": true,
            });
            if let Some(classification) = classification {
                body["classification"] = serde_json::to_value(classification)
                    .unwrap_or_default();
            }
            Ok(Json(body))
        }
    }
}

/// POST /submit-response
async fn submit_response(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = request
        .user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError(AssessmentError::Validation("Missing user_id".to_string())))?;
    let user_response = request
        .user_response
        .ok_or_else(|| ApiError(AssessmentError::Validation("Missing user_response".to_string())))?;

    let completed = state
        .controller
        .submit_response(&user_id, &user_response)
        .await?;
    Ok(Json(json!({
        "message": "Response submitted successfully",
        "completed_questions": completed,
    })))
}

/// GET /conversation-history?user_id=X
async fn conversation_history(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = query.user_id()?;
    let session = state.controller.history(&user_id).await?;
    Ok(Json(json!({
        "user_id": session.user_id,
        "conversation_history": session.turns,
        "created_at": session.created_at,
        "profile": session.profile,
        "classification": session.classification,
        "profile_assessed_at": session.profile_assessed_at,
    })))
}

/// GET /profile?user_id=X
async fn profile(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = query.user_id()?;
    let view = state.controller.profile(&user_id).await?;
    Ok(Json(serde_json::to_value(view).unwrap_or_default()))
}

/// GET /persist?user_id=X
async fn persist(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = query.user_id()?;
    state.controller.persist(&user_id).await?;
    Ok(Json(json!({
        "message": "Cognitive profile and classification saved",
    })))
}

/// GET /clear-history?user_id=X
async fn clear_history(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = query.user_id()?;
    state.controller.clear(&user_id).await?;
    Ok(Json(json!({
        "message": "Conversation history cleared successfully",
    })))
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "active_sessions": state.controller.active_sessions().await,
    }))
}

/// Build the assessment REST routes.
pub fn assessment_routes(state: AppState) -> Router {
    Router::new()
        .route("/next-step", get(next_step))
        .route("/submit-response", post(submit_response))
        .route("/conversation-history", get(conversation_history))
        .route("/profile", get(profile))
        .route("/persist", get(persist))
        .route("/clear-history", get(clear_history))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
