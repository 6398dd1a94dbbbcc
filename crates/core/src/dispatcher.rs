//! Module Dispatcher
//!
//! Maps a module, the user's input, the running context and the user's
//! settings to a [`ResponseOutcome`]. Each module's row in the module table
//! names the [`Strategy`] that executes it. Collaborator failures never cross
//! this boundary: every path ends in a well-formed outcome.

use crate::directive::{Directive, DirectiveKind, first_of_kind, remove_span};
use crate::llm_client::{ChatMessage, LLMClient};
use crate::media::{AspectRatio, ImageGenerator};
use crate::module::{ModuleId, ModuleSpec, Strategy};
use crate::outcome::ResponseOutcome;
use crate::prompt::{build_messages, compose_system_prompt};
use crate::router::route_response;
use crate::settings::Settings;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const IMAGE_LAB_APOLOGY: &str =
    "I apologize, I encountered an error while trying to generate the image. Please try a different prompt.";

pub const ALBUM_COVER_FAILURE: &str =
    "I apologize, I encountered an error while trying to generate the album cover.";

pub struct Dispatcher {
    llm: Arc<dyn LLMClient>,
    images: Arc<dyn ImageGenerator>,
    base_prompt: String,
}

impl Dispatcher {
    pub fn new(llm: Arc<dyn LLMClient>, images: Arc<dyn ImageGenerator>, base_prompt: String) -> Self {
        Self {
            llm,
            images,
            base_prompt,
        }
    }

    pub fn llm(&self) -> &Arc<dyn LLMClient> {
        &self.llm
    }

    pub fn images(&self) -> &Arc<dyn ImageGenerator> {
        &self.images
    }

    /// Resolves a module identifier, falling back to chat for unknown values.
    pub fn resolve_module(module: &str) -> ModuleId {
        module.parse().unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to the chat module");
            ModuleId::Chat
        })
    }

    /// Dispatches a request addressed to a module by its string identifier.
    pub async fn dispatch(
        &self,
        module: &str,
        input: &str,
        context: &[ChatMessage],
        settings: &Settings,
    ) -> ResponseOutcome {
        self.dispatch_module(Self::resolve_module(module), input, context, settings)
            .await
    }

    pub async fn dispatch_module(
        &self,
        module: ModuleId,
        input: &str,
        context: &[ChatMessage],
        settings: &Settings,
    ) -> ResponseOutcome {
        let spec = module.spec();
        if spec.gated && !settings.is_module_enabled(module) {
            debug!(%module, "Module disabled, skipping collaborators");
            return ResponseOutcome {
                display_text: spec.disabled_message(),
                ..ResponseOutcome::default()
            };
        }

        let result = match spec.strategy {
            Strategy::GenericText => self.generic_text(spec, input, context, settings).await,
            Strategy::SingleImage => Ok(self.single_image(input).await),
            Strategy::TextWithCover => self.text_with_cover(spec, input, context, settings).await,
            Strategy::Passthrough => Ok(Self::passthrough(input)),
        };

        result.unwrap_or_else(|e| {
            error!(%module, error = ?e, "Dispatch failed");
            ResponseOutcome::internal_error()
        })
    }

    async fn complete(
        &self,
        spec: &ModuleSpec,
        input: &str,
        context: &[ChatMessage],
        settings: &Settings,
    ) -> Result<String> {
        let system_prompt = compose_system_prompt(&self.base_prompt, spec, settings);
        let messages = build_messages(system_prompt, context, input);
        self.llm.complete(messages).await
    }

    async fn generic_text(
        &self,
        spec: &ModuleSpec,
        input: &str,
        context: &[ChatMessage],
        settings: &Settings,
    ) -> Result<ResponseOutcome> {
        let raw = self.complete(spec, input, context, settings).await?;
        Ok(route_response(&raw, settings.image_generation_enabled()).into())
    }

    async fn single_image(&self, input: &str) -> ResponseOutcome {
        match self.images.generate(input, None).await {
            Ok(url) => {
                let confirmation = format!("Here is the image I created for you based on \"{input}\".");
                ResponseOutcome {
                    display_text: confirmation.clone(),
                    speech_text: confirmation.clone(),
                    image_url: Some(url),
                    image_caption: Some(confirmation),
                    ..ResponseOutcome::default()
                }
            }
            Err(e) => {
                error!(error = ?e, "Image generation failed");
                ResponseOutcome::text(IMAGE_LAB_APOLOGY)
            }
        }
    }

    async fn text_with_cover(
        &self,
        spec: &ModuleSpec,
        input: &str,
        context: &[ChatMessage],
        settings: &Settings,
    ) -> Result<ResponseOutcome> {
        let raw = self.complete(spec, input, context, settings).await?;

        let Some(matched) = first_of_kind(&raw, DirectiveKind::ImageGen) else {
            return Ok(ResponseOutcome::text(raw.trim()));
        };
        let Directive::ImageGen { prompt } = matched.directive else {
            return Ok(ResponseOutcome::text(raw.trim()));
        };

        let mut outcome = ResponseOutcome::text(remove_span(&raw, &matched.span));
        match self.images.generate(&prompt, Some(AspectRatio::Square)).await {
            Ok(url) => {
                outcome.image_url = Some(url);
                outcome.image_caption = Some(format!("Album Cover: \"{prompt}\""));
            }
            Err(e) => {
                warn!(error = ?e, "Album cover generation failed, keeping the description");
                outcome.notice = Some(ALBUM_COVER_FAILURE.to_string());
            }
        }
        Ok(outcome)
    }

    fn passthrough(input: &str) -> ResponseOutcome {
        ResponseOutcome {
            display_text: format!("I have spoken \"{input}\". What else would you like me to voice?"),
            speech_text: input.to_string(),
            ..ResponseOutcome::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{ChatRole, MockLLMClient};
    use crate::media::MockImageGenerator;
    use crate::outcome::INTERNAL_ERROR_MESSAGE;
    use crate::router::IMAGE_DISABLED_PLACEHOLDER;
    use anyhow::anyhow;
    use mockall::predicate::eq;

    fn dispatcher(llm: MockLLMClient, images: MockImageGenerator) -> Dispatcher {
        Dispatcher::new(Arc::new(llm), Arc::new(images), "BASE".to_string())
    }

    fn disabled(id: ModuleId) -> Settings {
        let mut settings = Settings::default();
        settings.modules.set(id, false);
        settings
    }

    #[tokio::test]
    async fn test_generic_text_routes_completion() {
        let mut llm = MockLLMClient::new();
        llm.expect_complete()
            .withf(|messages| {
                messages.len() == 3
                    && messages[0].role == ChatRole::System
                    && messages[0].content.contains("**CURRENTLY ACTIVE MODULE: CHAT**")
                    && messages[1] == ChatMessage::assistant("earlier")
                    && messages[2] == ChatMessage::user("hello")
            })
            .times(1)
            .returning(|_| {
                Ok("Sure! [ACTION:SPEAK]Hello there[/ACTION] Done. [ACTION:IMAGE_GEN]a fox[/ACTION]".to_string())
            });
        let images = MockImageGenerator::new();

        let outcome = dispatcher(llm, images)
            .dispatch_module(
                ModuleId::Chat,
                "hello",
                &[ChatMessage::assistant("earlier")],
                &Settings::default(),
            )
            .await;

        assert_eq!(outcome.display_text, "Sure! Done.");
        assert_eq!(outcome.speech_text, "Hello there");
        assert_eq!(outcome.pending_image_prompts, vec!["a fox"]);
        assert!(outcome.image_url.is_none());
    }

    #[tokio::test]
    async fn test_generic_text_uses_placeholder_when_image_lab_disabled() {
        let mut llm = MockLLMClient::new();
        llm.expect_complete()
            .returning(|_| Ok("Look: [ACTION:IMAGE_GEN]a fox[/ACTION]".to_string()));

        let outcome = dispatcher(llm, MockImageGenerator::new())
            .dispatch_module(ModuleId::Tools, "x", &[], &disabled(ModuleId::ImageLab))
            .await;

        assert_eq!(outcome.display_text, format!("Look: {IMAGE_DISABLED_PLACEHOLDER}"));
        assert!(outcome.pending_image_prompts.is_empty());
    }

    #[tokio::test]
    async fn test_completion_failure_degrades_to_internal_error() {
        let mut llm = MockLLMClient::new();
        llm.expect_complete().returning(|_| Err(anyhow!("quota exceeded")));

        let outcome = dispatcher(llm, MockImageGenerator::new())
            .dispatch_module(ModuleId::AiStudio, "x", &[], &Settings::default())
            .await;

        assert_eq!(outcome.display_text, INTERNAL_ERROR_MESSAGE);
        assert_eq!(outcome.speech_text, INTERNAL_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_disabled_module_calls_no_collaborator() {
        let mut llm = MockLLMClient::new();
        llm.expect_complete().never();
        let mut images = MockImageGenerator::new();
        images.expect_generate().never();
        let dispatcher = dispatcher(llm, images);

        for id in [
            ModuleId::ImageLab,
            ModuleId::MusicStudio,
            ModuleId::VoiceBot,
            ModuleId::RoleplaySimulator,
            ModuleId::Documents,
            ModuleId::AutoAgents,
            ModuleId::CodeLab,
        ] {
            let outcome = dispatcher.dispatch_module(id, "input", &[], &disabled(id)).await;
            assert_eq!(outcome.display_text, id.spec().disabled_message());
            assert!(outcome.image_url.is_none());
            assert!(outcome.speech_text.is_empty());
        }
    }

    #[tokio::test]
    async fn test_image_lab_generates_from_raw_input() {
        let mut images = MockImageGenerator::new();
        images
            .expect_generate()
            .with(eq("a castle"), eq(None))
            .times(1)
            .returning(|_, _| Ok("https://img/castle.png".to_string()));
        let mut llm = MockLLMClient::new();
        llm.expect_complete().never();

        let outcome = dispatcher(llm, images)
            .dispatch_module(ModuleId::ImageLab, "a castle", &[], &Settings::default())
            .await;

        let confirmation = "Here is the image I created for you based on \"a castle\".";
        assert_eq!(outcome.display_text, confirmation);
        assert_eq!(outcome.speech_text, confirmation);
        assert_eq!(outcome.image_caption.as_deref(), Some(confirmation));
        assert_eq!(outcome.image_url.as_deref(), Some("https://img/castle.png"));
    }

    #[tokio::test]
    async fn test_image_lab_failure_apologises() {
        let mut images = MockImageGenerator::new();
        images
            .expect_generate()
            .returning(|_, _| Err(anyhow!("service down")));

        let outcome = dispatcher(MockLLMClient::new(), images)
            .dispatch_module(ModuleId::ImageLab, "a castle", &[], &Settings::default())
            .await;

        assert_eq!(outcome.display_text, IMAGE_LAB_APOLOGY);
        assert!(outcome.image_url.is_none());
    }

    #[tokio::test]
    async fn test_image_lab_does_not_route_directives() {
        let mut images = MockImageGenerator::new();
        images
            .expect_generate()
            .with(eq("[ACTION:SPEAK]hi[/ACTION]"), eq(None))
            .returning(|_, _| Ok("u".to_string()));

        let outcome = dispatcher(MockLLMClient::new(), images)
            .dispatch_module(ModuleId::ImageLab, "[ACTION:SPEAK]hi[/ACTION]", &[], &Settings::default())
            .await;
        assert_eq!(outcome.image_url.as_deref(), Some("u"));
    }

    #[tokio::test]
    async fn test_music_studio_extracts_one_cover() {
        let mut llm = MockLLMClient::new();
        llm.expect_complete()
            .withf(|messages| messages[0].content.contains("album cover"))
            .returning(|_| {
                Ok("A calm lo-fi track. [ACTION:IMAGE_GEN]rainy window[/ACTION] It fits. [ACTION:IMAGE_GEN]second[/ACTION]".to_string())
            });
        let mut images = MockImageGenerator::new();
        images
            .expect_generate()
            .with(eq("rainy window"), eq(Some(AspectRatio::Square)))
            .times(1)
            .returning(|_, _| Ok("https://img/cover.png".to_string()));

        let outcome = dispatcher(llm, images)
            .dispatch_module(ModuleId::MusicStudio, "lofi", &[], &Settings::default())
            .await;

        assert_eq!(
            outcome.display_text,
            "A calm lo-fi track. It fits. [ACTION:IMAGE_GEN]second[/ACTION]"
        );
        assert_eq!(outcome.speech_text, outcome.display_text);
        assert_eq!(outcome.image_url.as_deref(), Some("https://img/cover.png"));
        assert_eq!(outcome.image_caption.as_deref(), Some("Album Cover: \"rainy window\""));
        assert!(outcome.pending_image_prompts.is_empty());
    }

    #[tokio::test]
    async fn test_music_studio_keeps_text_when_cover_fails() {
        let mut llm = MockLLMClient::new();
        llm.expect_complete()
            .returning(|_| Ok("Jazz. [ACTION:IMAGE_GEN]sax[/ACTION]".to_string()));
        let mut images = MockImageGenerator::new();
        images
            .expect_generate()
            .returning(|_, _| Err(anyhow!("boom")));

        let outcome = dispatcher(llm, images)
            .dispatch_module(ModuleId::MusicStudio, "jazz", &[], &Settings::default())
            .await;

        assert_eq!(outcome.display_text, "Jazz.");
        assert!(outcome.image_url.is_none());
        assert!(outcome.image_caption.is_none());
        assert_eq!(outcome.notice.as_deref(), Some(ALBUM_COVER_FAILURE));
    }

    #[tokio::test]
    async fn test_music_studio_without_directive_returns_text() {
        let mut llm = MockLLMClient::new();
        llm.expect_complete().returning(|_| Ok("  Just words.  ".to_string()));
        let mut images = MockImageGenerator::new();
        images.expect_generate().never();

        let outcome = dispatcher(llm, images)
            .dispatch_module(ModuleId::MusicStudio, "x", &[], &Settings::default())
            .await;
        assert_eq!(outcome.display_text, "Just words.");
    }

    #[tokio::test]
    async fn test_voice_bot_passthrough() {
        let mut llm = MockLLMClient::new();
        llm.expect_complete().never();

        let outcome = dispatcher(llm, MockImageGenerator::new())
            .dispatch_module(ModuleId::VoiceBot, "Good morning", &[], &Settings::default())
            .await;

        assert_eq!(outcome.speech_text, "Good morning");
        assert_eq!(
            outcome.display_text,
            "I have spoken \"Good morning\". What else would you like me to voice?"
        );
    }

    #[tokio::test]
    async fn test_unknown_module_falls_back_to_chat() {
        let mut llm = MockLLMClient::new();
        llm.expect_complete()
            .withf(|messages| messages[0].content.contains("**CURRENTLY ACTIVE MODULE: CHAT**"))
            .times(1)
            .returning(|_| Ok("hi".to_string()));

        let outcome = dispatcher(llm, MockImageGenerator::new())
            .dispatch("holodeck", "hello", &[], &Settings::default())
            .await;
        assert_eq!(outcome.display_text, "hi");
        assert_eq!(Dispatcher::resolve_module("code-lab"), ModuleId::CodeLab);
    }
}
