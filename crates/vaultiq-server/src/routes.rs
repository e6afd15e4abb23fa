//! HTTP routes, grounded on the `create_router`/handler split in
//! `chat_server_rust`'s `presentation/http/routes.rs`.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tower_http::trace::TraceLayer;
use vaultiq_core::model::{DeviceMetadata, RevocationIntent, Session};
use vaultiq_core::Error as CoreError;

use crate::error::ApiError;
use crate::request::AxumRequestHandle;
use crate::state::AppState;

/// Upper bound on a single backend call (store or cache). A breach converts
/// to `CoreError::BackendTransient`, surfaced to callers as 504.
const BACKEND_DEADLINE: Duration = Duration::from_secs(5);

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id", delete(delete_session))
        .route("/users/:id/sessions", get(get_sessions_by_user))
        .route("/revocations", post(create_revocation))
        .route("/validate", post(validate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    user_id: String,
    #[serde(default)]
    device_metadata: Option<DeviceMetadata>,
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    session_id: String,
    user_id: String,
    device_fingerprint: String,
    is_revoked: bool,
}

impl From<Session> for SessionResponse {
    fn from(s: Session) -> Self {
        Self {
            session_id: s.session_id,
            user_id: s.user_id,
            device_fingerprint: s.device_fingerprint,
            is_revoked: s.is_revoked,
        }
    }
}

async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let request = AxumRequestHandle::new(headers);
    let fingerprint = state
        .capabilities
        .fingerprints
        .generate(&request)
        .ok_or_else(|| ApiError::BadRequest("unable to compute device fingerprint".into()))?;

    let session = timeout(
        BACKEND_DEADLINE,
        state
            .capabilities
            .sessions
            .create_session(&body.user_id, &fingerprint, body.device_metadata),
    )
    .await
    .map_err(CoreError::from)??;

    Ok((StatusCode::CREATED, Json(session.into())))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = timeout(BACKEND_DEADLINE, state.capabilities.sessions.get_session(&session_id))
        .await
        .map_err(CoreError::from)??
        .ok_or(ApiError::NotFound)?;
    Ok(Json(session.into()))
}

async fn get_sessions_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<SessionResponse>>, ApiError> {
    let sessions = timeout(
        BACKEND_DEADLINE,
        state.capabilities.sessions.get_sessions_by_user(&user_id),
    )
    .await
    .map_err(CoreError::from)??;
    Ok(Json(sessions.into_iter().map(Into::into).collect()))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    timeout(BACKEND_DEADLINE, state.capabilities.sessions.delete_session(&session_id))
        .await
        .map_err(CoreError::from)??;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
enum RevocationIntentBody {
    One {
        session_id: String,
        #[serde(default)]
        note: Option<String>,
    },
    All {
        user_id: String,
        #[serde(default)]
        note: Option<String>,
    },
    AllExcept {
        user_id: String,
        #[serde(default)]
        excluded: Vec<String>,
        #[serde(default)]
        note: Option<String>,
    },
}

impl From<RevocationIntentBody> for RevocationIntent {
    fn from(body: RevocationIntentBody) -> Self {
        match body {
            RevocationIntentBody::One { session_id, note } => {
                RevocationIntent::One { session_id, note }
            }
            RevocationIntentBody::All { user_id, note } => RevocationIntent::All { user_id, note },
            RevocationIntentBody::AllExcept {
                user_id,
                excluded,
                note,
            } => RevocationIntent::AllExcept {
                user_id,
                excluded,
                note,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct RevocationResponse {
    revoked_session_ids: Vec<String>,
}

async fn create_revocation(
    State(state): State<AppState>,
    Json(body): Json<RevocationIntentBody>,
) -> Result<Json<RevocationResponse>, ApiError> {
    let revoked = timeout(BACKEND_DEADLINE, state.capabilities.revocations.revoke(body.into()))
        .await
        .map_err(CoreError::from)??;
    Ok(Json(RevocationResponse {
        revoked_session_ids: revoked,
    }))
}

#[derive(Debug, Serialize)]
struct ValidateResponse {
    valid: bool,
}

async fn validate(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ValidateResponse>, ApiError> {
    let request = AxumRequestHandle::new(headers);
    let valid = timeout(
        BACKEND_DEADLINE,
        state.capabilities.validator.validate_for_request(&request),
    )
    .await
    .map_err(CoreError::from)??;
    Ok(Json(ValidateResponse { valid }))
}
