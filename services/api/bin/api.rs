//! Main Entrypoint for the OmniVerse API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the database connection pool and running migrations.
//! 3. Initializing shared services (chat, image and speech clients).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use omniverse_api::{
    config::{Config, Provider},
    db::Db,
    router::create_router,
    state::{AppState, SessionRegistry},
    upload::LocalDiskUploader,
};
use omniverse_core::{
    Dispatcher, SessionServices,
    llm_client::{LLMClient, OpenAICompatibleClient},
    media::{
        FileUploader, ImageGenerator, OpenAIImageGenerator, OpenAISpeechSynthesizer,
        SpeechSynthesizer, UnavailableMedia,
    },
    store::ConversationStore,
};
use sqlx::PgPool;
use std::{collections::HashMap, fs, net::SocketAddr, sync::Arc, time::Duration};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1/";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = ?e, "Failed to listen for Ctrl+C");
        return;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// A helper function to load prompts from a directory.
fn load_prompts(prompts_path: &std::path::Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    let entries = std::fs::read_dir(prompts_path)
        .with_context(|| format!("Failed to read prompts directory {}", prompts_path.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Database ---
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let db = Db::new(pool);
    db.run_migrations().await?;
    let store: Arc<dyn ConversationStore> = Arc::new(db);
    info!("Database connection established and migrations are up-to-date.");

    // --- 4. Initialize Shared Services ---
    let prompts = load_prompts(&config.prompts_path)?;
    let system_prompt = prompts
        .get("system_prompt")
        .context("system_prompt.md not found in prompts directory")?
        .clone();

    let chat_config = match &config.provider {
        Provider::OpenAI => {
            info!("Using OpenAI provider.");
            let api_key = config
                .openai_api_key
                .as_ref()
                .context("OPENAI_API_KEY is required for the openai provider")?;
            OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(OPENAI_API_BASE)
        }
        Provider::Gemini => {
            info!("Using Gemini provider.");
            let api_key = config
                .gemini_api_key
                .as_ref()
                .context("GEMINI_API_KEY is required for the gemini provider")?;
            OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(GEMINI_API_BASE)
        }
    };
    let llm_client: Arc<dyn LLMClient> = Arc::new(OpenAICompatibleClient::new(
        chat_config,
        config.chat_model.clone(),
    ));

    let uploader: Arc<dyn FileUploader> = Arc::new(LocalDiskUploader::new(
        config.upload_dir.clone(),
        config.public_media_path.clone(),
    ));

    // Images and speech always go to OpenAI, whichever provider handles chat.
    let (images, speech): (Arc<dyn ImageGenerator>, Arc<dyn SpeechSynthesizer>) =
        match &config.openai_api_key {
            Some(api_key) => {
                let media_config = OpenAIConfig::new()
                    .with_api_key(api_key)
                    .with_api_base(OPENAI_API_BASE);
                (
                    Arc::new(OpenAIImageGenerator::new(
                        media_config.clone(),
                        config.image_model.clone(),
                    )),
                    Arc::new(OpenAISpeechSynthesizer::new(
                        media_config,
                        config.speech_model.clone(),
                        uploader.clone(),
                    )),
                )
            }
            None => {
                warn!("OPENAI_API_KEY is not set. Image generation and speech are unavailable.");
                (Arc::new(UnavailableMedia), Arc::new(UnavailableMedia))
            }
        };

    let services = SessionServices {
        dispatcher: Arc::new(Dispatcher::new(llm_client, images, system_prompt)),
        speech,
        store,
    };

    let app_state = Arc::new(AppState {
        services,
        uploader,
        sessions: Arc::new(SessionRegistry::new(config.max_sessions)),
        config: Arc::new(config.clone()),
    });

    // Idle sessions only hold short-term memory; persisted turns survive eviction.
    let sessions = app_state.sessions.clone();
    let idle_timeout = config.session_idle_timeout;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_idle(idle_timeout).await;
            if evicted > 0 {
                let remaining = sessions.len().await;
                debug!(evicted, remaining, "Evicted idle sessions");
            }
        }
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        bind_address = %config.bind_address,
        media = %config.public_media_path,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
