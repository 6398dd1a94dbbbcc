//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, the media file server, and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        AttachmentView, ErrorResponse, MemoryTogglePayload, ModuleInfo, OutcomeView, ProfileView,
        SettingsBody, SubmitMessagePayload, SubmitMessageResponse, SwitchModulePayload,
        TranscriptResponse, TurnView, UpdateProfilePayload,
    },
    state::AppState,
};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Largest accepted upload body.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_modules,
        handlers::submit_message,
        handlers::switch_module,
        handlers::get_history,
        handlers::reload_history,
        handlers::delete_memory,
        handlers::get_settings,
        handlers::update_settings,
        handlers::set_memory,
        handlers::upload_file,
        handlers::get_profile,
        handlers::update_profile,
        handlers::clear_data,
    ),
    components(
        schemas(
            ModuleInfo, TurnView, AttachmentView, OutcomeView, SubmitMessagePayload,
            SubmitMessageResponse, SwitchModulePayload, TranscriptResponse, SettingsBody,
            MemoryTogglePayload, ProfileView, UpdateProfilePayload, ErrorResponse
        )
    ),
    tags(
        (name = "OmniVerse API", description = "Module-routed chat with short- and long-term memory")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let media = ServeDir::new(&app_state.config.upload_dir);
    let media_path = app_state.config.public_media_path.clone();

    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/modules", get(handlers::list_modules))
        .route("/chat/messages", post(handlers::submit_message))
        .route("/chat/module", post(handlers::switch_module))
        .route("/chat/history", get(handlers::get_history))
        .route("/chat/history/reload", post(handlers::reload_history))
        .route("/chat/memory", delete(handlers::delete_memory))
        .route(
            "/settings",
            get(handlers::get_settings).put(handlers::update_settings),
        )
        .route("/settings/memory", put(handlers::set_memory))
        .route(
            "/uploads",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .route("/data", delete(handlers::clear_data))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Create the final router that merges the stateful routes
    // with the stateless routes (Swagger UI and stored media).
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest_service(&media_path, media)
        .merge(api_router)
}
