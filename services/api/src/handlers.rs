//! Axum Handlers for the REST API
//!
//! Every route works on the caller's chat session, identified by the
//! `x-user-id` header. It uses `utoipa` doc comments to generate OpenAPI
//! documentation.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Json, Response},
};
use omniverse_core::{ChatSession, ModuleId, SessionError, conversation::Attachment, store::StoreError};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info};

use crate::{
    models::{
        AttachmentView, ErrorResponse, MemoryTogglePayload, ModuleInfo, ProfileView, SettingsBody,
        SubmitMessagePayload, SubmitMessageResponse, SwitchModulePayload, TranscriptResponse,
        UpdateProfilePayload, turn_views,
    },
    state::{AcquireError, AppState},
};

pub enum ApiError {
    BadRequest(String),
    Conflict(String),
    ServiceUnavailable(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(ErrorResponse { message })).into_response()
            }
            ApiError::ServiceUnavailable(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

impl ApiError {
    /// Client mistakes become 400; store failures become 500 so the client can retry.
    pub fn from_session(err: SessionError) -> Self {
        match err {
            SessionError::Store(_) => Self::InternalServerError(err.into()),
            SessionError::EmptyInput
            | SessionError::NotSignedIn
            | SessionError::LongTermMemoryDisabled
            | SessionError::InvalidDisplayName => Self::BadRequest(err.to_string()),
        }
    }
}

fn user_id(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("x-user-id header is required".to_string()))
}

/// Takes the caller's session, refusing while another request holds it.
async fn acquire_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<OwnedMutexGuard<ChatSession>, ApiError> {
    let user_id = user_id(headers)?;
    let mut session = state
        .sessions
        .try_acquire(user_id, &state.services)
        .await
        .map_err(|err| match err {
            AcquireError::Busy => ApiError::Conflict(err.to_string()),
            AcquireError::Full => ApiError::ServiceUnavailable(err.to_string()),
        })?;
    session
        .ensure_started()
        .await
        .map_err(ApiError::from_session)?;
    Ok(session)
}

fn transcript(session: &ChatSession, message: Option<String>) -> TranscriptResponse {
    TranscriptResponse {
        module: session.module().to_string(),
        long_term_memory: session.settings().long_term_memory,
        message,
        turns: turn_views(session.transcript()),
    }
}

/// List the modules and whether each is enabled for the caller.
#[utoipa::path(
    get,
    path = "/modules",
    responses(
        (status = 200, description = "Module table", body = [ModuleInfo]),
        (status = 409, description = "Another request is in progress", body = ErrorResponse),
        (status = 503, description = "Too many active sessions", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn list_modules(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ModuleInfo>>, ApiError> {
    let session = acquire_session(&state, &headers).await?;
    let modules = ModuleId::ALL
        .into_iter()
        .map(|id| ModuleInfo::new(id, session.settings(), session.module()))
        .collect();
    Ok(Json(modules))
}

/// Submit a message to the active module.
#[utoipa::path(
    post,
    path = "/chat/messages",
    request_body = SubmitMessagePayload,
    responses(
        (status = 200, description = "The assistant's response", body = SubmitMessageResponse),
        (status = 400, description = "Empty message without attachment", body = ErrorResponse),
        (status = 409, description = "Another request is in progress", body = ErrorResponse),
        (status = 503, description = "Too many active sessions", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn submit_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SubmitMessagePayload>,
) -> Result<Json<SubmitMessageResponse>, ApiError> {
    let mut session = acquire_session(&state, &headers).await?;
    let result = session
        .submit(&payload.message)
        .await
        .map_err(ApiError::from_session)?;
    Ok(Json(SubmitMessageResponse::from(&result)))
}

/// Switch the active module. The conversation starts over with a greeting.
#[utoipa::path(
    post,
    path = "/chat/module",
    request_body = SwitchModulePayload,
    responses(
        (status = 200, description = "Module switched", body = TranscriptResponse),
        (status = 409, description = "Another request is in progress", body = ErrorResponse),
        (status = 503, description = "Too many active sessions", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn switch_module(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SwitchModulePayload>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let mut session = acquire_session(&state, &headers).await?;
    let greeting = session
        .switch_module(&payload.module)
        .await
        .map_err(ApiError::from_session)?;
    Ok(Json(transcript(&session, Some(greeting))))
}

/// Get the current transcript.
#[utoipa::path(
    get,
    path = "/chat/history",
    responses(
        (status = 200, description = "Current transcript", body = TranscriptResponse),
        (status = 409, description = "Another request is in progress", body = ErrorResponse),
        (status = 503, description = "Too many active sessions", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let session = acquire_session(&state, &headers).await?;
    Ok(Json(transcript(&session, None)))
}

/// Reload past conversations of the active module from long-term memory.
#[utoipa::path(
    post,
    path = "/chat/history/reload",
    responses(
        (status = 200, description = "Past conversations loaded", body = TranscriptResponse),
        (status = 400, description = "Long-term memory is disabled", body = ErrorResponse),
        (status = 409, description = "Another request is in progress", body = ErrorResponse),
        (status = 503, description = "Too many active sessions", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn reload_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let mut session = acquire_session(&state, &headers).await?;
    let notice = session
        .view_past_chats()
        .await
        .map_err(ApiError::from_session)?;
    Ok(Json(transcript(&session, Some(notice))))
}

/// Erase the persisted conversation of the active module.
#[utoipa::path(
    delete,
    path = "/chat/memory",
    responses(
        (status = 200, description = "Module memory erased", body = TranscriptResponse),
        (status = 409, description = "Another request is in progress", body = ErrorResponse),
        (status = 503, description = "Too many active sessions", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn delete_memory(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let mut session = acquire_session(&state, &headers).await?;
    let notice = session
        .delete_module_memory()
        .await
        .map_err(ApiError::from_session)?;
    Ok(Json(transcript(&session, Some(notice))))
}

/// Get the caller's settings.
#[utoipa::path(
    get,
    path = "/settings",
    responses(
        (status = 200, description = "Current settings", body = SettingsBody),
        (status = 409, description = "Another request is in progress", body = ErrorResponse),
        (status = 503, description = "Too many active sessions", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SettingsBody>, ApiError> {
    let session = acquire_session(&state, &headers).await?;
    Ok(Json(SettingsBody::from(session.settings())))
}

/// Replace the caller's settings. `longTermMemory` is ignored here; use `/settings/memory`.
#[utoipa::path(
    put,
    path = "/settings",
    request_body = SettingsBody,
    responses(
        (status = 200, description = "Settings updated", body = SettingsBody),
        (status = 409, description = "Another request is in progress", body = ErrorResponse),
        (status = 503, description = "Too many active sessions", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SettingsBody>,
) -> Result<Json<SettingsBody>, ApiError> {
    let mut session = acquire_session(&state, &headers).await?;
    session.update_settings(payload.into());
    info!(user_id = %session.user_id(), "Settings updated");
    Ok(Json(SettingsBody::from(session.settings())))
}

/// Switch long-term memory on or off. Either way the conversation starts over.
#[utoipa::path(
    put,
    path = "/settings/memory",
    request_body = MemoryTogglePayload,
    responses(
        (status = 200, description = "Memory policy switched", body = TranscriptResponse),
        (status = 409, description = "Another request is in progress", body = ErrorResponse),
        (status = 503, description = "Too many active sessions", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn set_memory(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<MemoryTogglePayload>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let mut session = acquire_session(&state, &headers).await?;
    let notice = session
        .set_long_term_memory(payload.enabled)
        .await
        .map_err(ApiError::from_session)?;
    Ok(Json(transcript(&session, Some(notice))))
}

/// Upload a file and attach it to the next message.
///
/// The raw request body is the file; its name travels in `x-file-name`.
#[utoipa::path(
    post,
    path = "/uploads",
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "File stored and attached", body = AttachmentView),
        (status = 400, description = "Missing file name or empty body", body = ErrorResponse),
        (status = 409, description = "Another request is in progress", body = ErrorResponse),
        (status = 503, description = "Too many active sessions", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user"),
        ("x-file-name" = String, Header, description = "Original file name")
    )
)]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let file_name = headers
        .get("x-file-name")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::BadRequest("x-file-name header is required".to_string()))?
        .to_string();
    let mime_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    if body.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }

    let mut session = acquire_session(&state, &headers).await?;
    let url = state
        .uploader
        .upload(&file_name, &mime_type, body.to_vec())
        .await?;
    let attachment = Attachment::file(url, file_name, mime_type);
    let view = AttachmentView::from(&attachment);
    session.attach_file(attachment);

    Ok((StatusCode::CREATED, Json(view)))
}

/// Get the caller's profile.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "User profile", body = ProfileView),
        (status = 409, description = "Another request is in progress", body = ErrorResponse),
        (status = 503, description = "Too many active sessions", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ProfileView>, ApiError> {
    let mut session = acquire_session(&state, &headers).await?;
    let profile = session.profile().await.map_err(ApiError::from_session)?;
    Ok(Json(profile.into()))
}

/// Update the caller's display name and/or avatar.
#[utoipa::path(
    put,
    path = "/profile",
    request_body = UpdateProfilePayload,
    responses(
        (status = 200, description = "Profile updated", body = ProfileView),
        (status = 400, description = "Nothing to update or empty display name", body = ErrorResponse),
        (status = 409, description = "Another request is in progress", body = ErrorResponse),
        (status = 503, description = "Too many active sessions", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<Json<ProfileView>, ApiError> {
    if payload.custom_display_name.is_none() && payload.avatar_url.is_none() {
        return Err(ApiError::BadRequest(
            "customDisplayName or avatarUrl is required".to_string(),
        ));
    }

    let mut session = acquire_session(&state, &headers).await?;
    if let Some(name) = &payload.custom_display_name {
        session
            .update_display_name(name)
            .await
            .map_err(ApiError::from_session)?;
    }
    if let Some(url) = &payload.avatar_url {
        session.set_avatar(url).await.map_err(ApiError::from_session)?;
    }
    let profile = session.profile().await.map_err(ApiError::from_session)?;
    Ok(Json(profile.into()))
}

/// Delete every conversation and profile record of the caller and drop their session.
#[utoipa::path(
    delete,
    path = "/data",
    responses(
        (status = 204, description = "All user data deleted"),
        (status = 409, description = "Another request is in progress", body = ErrorResponse),
        (status = 503, description = "Too many active sessions", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn clear_data(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let mut session = acquire_session(&state, &headers).await?;
    session
        .clear_all_data()
        .await
        .map_err(ApiError::from_session)?;
    state.sessions.remove(session.user_id()).await;
    info!(user_id = %session.user_id(), "Session dropped after data deletion");
    Ok(StatusCode::NO_CONTENT)
}
