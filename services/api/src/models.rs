//! API Models
//!
//! Request and response bodies of the REST API, documented with `utoipa`.
//! Core types are converted into these views at the HTTP boundary.

use chrono::{DateTime, Utc};
use omniverse_core::{
    ModuleId, ResponseOutcome, Settings, SubmitResult,
    conversation::{Attachment, ConversationTurn},
    settings::{ModuleToggles, ResponseTone},
    store::UserProfile,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

/// One row of the module table with the caller's effective enabled flag.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInfo {
    #[schema(example = "image-lab")]
    pub id: String,
    #[schema(example = "Image Lab")]
    pub label: String,
    pub gated: bool,
    pub enabled: bool,
    pub active: bool,
}

impl ModuleInfo {
    pub fn new(id: ModuleId, settings: &Settings, active: ModuleId) -> Self {
        let spec = id.spec();
        Self {
            id: id.as_str().to_string(),
            label: spec.label.to_string(),
            gated: spec.gated,
            enabled: settings.is_module_enabled(id),
            active: id == active,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentView {
    pub url: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

impl From<&Attachment> for AttachmentView {
    fn from(attachment: &Attachment) -> Self {
        Self {
            url: attachment.url.clone(),
            file_name: attachment.file_name.clone(),
            mime_type: attachment.mime_type.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TurnView {
    #[schema(example = "assistant")]
    pub role: String,
    pub content: Option<String>,
    #[serde(rename = "type")]
    #[schema(example = "text")]
    pub kind: String,
    pub attachment: Option<AttachmentView>,
    pub timestamp: DateTime<Utc>,
}

impl From<&ConversationTurn> for TurnView {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
            kind: turn.kind.as_str().to_string(),
            attachment: turn.attachment.as_ref().map(AttachmentView::from),
            timestamp: turn.timestamp,
        }
    }
}

pub fn turn_views(turns: &[ConversationTurn]) -> Vec<TurnView> {
    turns.iter().map(TurnView::from).collect()
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeView {
    pub display_text: String,
    pub speech_text: String,
    pub image_url: Option<String>,
    pub image_caption: Option<String>,
    /// A failed follow-up action, e.g. an album cover that could not be drawn.
    pub notice: Option<String>,
}

impl From<&ResponseOutcome> for OutcomeView {
    fn from(outcome: &ResponseOutcome) -> Self {
        Self {
            display_text: outcome.display_text.clone(),
            speech_text: outcome.speech_text.clone(),
            image_url: outcome.image_url.clone(),
            image_caption: outcome.image_caption.clone(),
            notice: outcome.notice.clone(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMessagePayload {
    #[serde(default)]
    #[schema(example = "Paint me a lighthouse at dusk")]
    pub message: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMessageResponse {
    pub outcome: OutcomeView,
    /// The turns this submission appended, user turn first.
    pub turns: Vec<TurnView>,
    pub speech_url: Option<String>,
}

impl From<&SubmitResult> for SubmitMessageResponse {
    fn from(result: &SubmitResult) -> Self {
        Self {
            outcome: OutcomeView::from(&result.outcome),
            turns: turn_views(&result.turns),
            speech_url: result.speech_url.clone(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwitchModulePayload {
    #[schema(example = "music-studio")]
    pub module: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResponse {
    #[schema(example = "chat")]
    pub module: String,
    pub long_term_memory: bool,
    /// A greeting or notice produced by the operation, if any.
    pub message: Option<String>,
    pub turns: Vec<TurnView>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SettingsBody {
    #[schema(example = "Friendly")]
    pub persona: String,
    #[schema(example = "en-male")]
    pub voice: String,
    #[schema(value_type = String, example = "default")]
    pub response_tone: ResponseTone,
    pub long_term_memory: bool,
    pub custom_instructions: String,
    pub enable_voice_responses: bool,
    #[schema(value_type = Object)]
    pub modules: ModuleToggles,
}

impl From<&Settings> for SettingsBody {
    fn from(settings: &Settings) -> Self {
        Self {
            persona: settings.persona.clone(),
            voice: settings.voice.clone(),
            response_tone: settings.response_tone,
            long_term_memory: settings.long_term_memory,
            custom_instructions: settings.custom_instructions.clone(),
            enable_voice_responses: settings.enable_voice_responses,
            modules: settings.modules.clone(),
        }
    }
}

impl From<SettingsBody> for Settings {
    fn from(body: SettingsBody) -> Self {
        Self {
            persona: body.persona,
            voice: body.voice,
            response_tone: body.response_tone,
            long_term_memory: body.long_term_memory,
            custom_instructions: body.custom_instructions,
            enable_voice_responses: body.enable_voice_responses,
            modules: body.modules,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct MemoryTogglePayload {
    pub enabled: bool,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub user_id: String,
    pub custom_display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<UserProfile> for ProfileView {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            user_id: profile.user_id,
            custom_display_name: profile.custom_display_name,
            avatar_url: profile.avatar_url,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfilePayload {
    #[schema(example = "Ada")]
    pub custom_display_name: Option<String>,
    pub avatar_url: Option<String>,
}
