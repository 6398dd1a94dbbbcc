use crate::router::RoutedResponse;
use serde::{Deserialize, Serialize};

/// Shown when a dispatch failed in a way no strategy handled.
pub const INTERNAL_ERROR_MESSAGE: &str = "Sorry, I encountered an internal error. Please try again.";

/// The result of one dispatched request, ready to render, persist and speak.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseOutcome {
    pub display_text: String,
    pub speech_text: String,
    pub image_url: Option<String>,
    pub image_caption: Option<String>,
    /// Image prompts left for the caller to execute after rendering the text.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_image_prompts: Vec<String>,
    /// A follow-up message reporting a side effect that failed after the text was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl ResponseOutcome {
    /// An outcome whose display and speech text are the same sentence.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            speech_text: text.clone(),
            display_text: text,
            ..Self::default()
        }
    }

    pub fn internal_error() -> Self {
        Self::text(INTERNAL_ERROR_MESSAGE)
    }

    pub fn has_image(&self) -> bool {
        self.image_url.is_some()
    }
}

impl From<RoutedResponse> for ResponseOutcome {
    fn from(routed: RoutedResponse) -> Self {
        Self {
            display_text: routed.display_text,
            speech_text: routed.speech_text,
            image_url: None,
            image_caption: None,
            pending_image_prompts: routed.pending_image_prompts,
            notice: None,
        }
    }
}
