//! Chat Session
//!
//! The caller of the dispatcher: owns one user's active module, settings,
//! conversation memory and visible transcript. Every operation takes
//! `&mut self`, so a session serialises its own submissions; callers sharing a
//! session across tasks put it behind an async mutex.

use crate::conversation::{Attachment, ConversationMemory, ConversationTurn, MemoryPolicy};
use crate::dispatcher::Dispatcher;
use crate::greeting::generate_greeting;
use crate::media::SpeechSynthesizer;
use crate::module::ModuleId;
use crate::outcome::ResponseOutcome;
use crate::prompt::format_attachment_prompt;
use crate::settings::Settings;
use crate::store::{ConversationStore, StoreError, TurnRecord, UserProfile};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const SUGGESTED_IMAGE_FAILURE: &str =
    "I encountered an error trying to generate the AI-suggested image.";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Message is empty and no file is attached")]
    EmptyInput,
    #[error("A signed-in user is required for this operation")]
    NotSignedIn,
    #[error("Long-term memory is disabled")]
    LongTermMemoryDisabled,
    #[error("Display name cannot be empty")]
    InvalidDisplayName,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The collaborators a session calls.
#[derive(Clone)]
pub struct SessionServices {
    pub dispatcher: Arc<Dispatcher>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub store: Arc<dyn ConversationStore>,
}

/// Everything one submission produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResult {
    pub outcome: ResponseOutcome,
    /// The turns appended to the transcript, user turn first.
    pub turns: Vec<ConversationTurn>,
    pub speech_url: Option<String>,
}

pub struct ChatSession {
    user_id: String,
    module: ModuleId,
    settings: Settings,
    memory: ConversationMemory,
    transcript: Vec<ConversationTurn>,
    attachment: Option<Attachment>,
    profile: Option<UserProfile>,
    started: bool,
    services: SessionServices,
}

impl ChatSession {
    pub fn new(user_id: impl Into<String>, services: SessionServices) -> Self {
        Self::with_settings(user_id, services, Settings::default())
    }

    pub fn with_settings(user_id: impl Into<String>, services: SessionServices, settings: Settings) -> Self {
        let policy = MemoryPolicy::from_long_term_flag(settings.long_term_memory);
        Self {
            user_id: user_id.into(),
            module: ModuleId::Chat,
            settings,
            memory: ConversationMemory::new(policy),
            transcript: Vec::new(),
            attachment: None,
            profile: None,
            started: false,
            services,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn module(&self) -> ModuleId {
        self.module
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn transcript(&self) -> &[ConversationTurn] {
        &self.transcript
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    fn require_user(&self) -> Result<&str, SessionError> {
        if self.user_id.trim().is_empty() {
            Err(SessionError::NotSignedIn)
        } else {
            Ok(&self.user_id)
        }
    }

    fn persists(&self) -> bool {
        self.memory.policy() == MemoryPolicy::LongTerm && !self.user_id.trim().is_empty()
    }

    /// Loads the profile and enters the chat module with a greeting.
    pub async fn start(&mut self) -> Result<String, SessionError> {
        if self.require_user().is_ok() {
            match self.services.store.load_profile(&self.user_id).await {
                Ok(profile) => self.profile = profile,
                Err(e) => error!(user_id = %self.user_id, error = ?e, "Failed to load user profile"),
            }
        }
        self.started = true;
        self.switch_to(ModuleId::Chat).await
    }

    pub async fn ensure_started(&mut self) -> Result<(), SessionError> {
        if !self.started {
            self.start().await?;
        }
        Ok(())
    }

    /// Submits one user message to the active module.
    pub async fn submit(&mut self, input: &str) -> Result<SubmitResult, SessionError> {
        let text = input.trim();
        if text.is_empty() && self.attachment.is_none() {
            return Err(SessionError::EmptyInput);
        }

        let attachment = self.attachment.take();
        let (model_input, user_turn) = match attachment {
            Some(attachment) => (
                format_attachment_prompt(text, &attachment),
                ConversationTurn::user_file(Some(text.to_string()), attachment),
            ),
            None => (text.to_string(), ConversationTurn::user_text(text)),
        };

        // Context is read before the new turn is recorded.
        let context = self.memory.context();
        let mut turns = vec![user_turn.clone()];
        self.record(user_turn).await?;

        let outcome = self
            .services
            .dispatcher
            .dispatch_module(self.module, &model_input, &context, &self.settings)
            .await;

        if !outcome.display_text.is_empty() {
            let turn = ConversationTurn::assistant_text(outcome.display_text.clone());
            turns.push(turn.clone());
            self.record(turn).await?;
        }
        if let Some(url) = &outcome.image_url {
            let turn = ConversationTurn::assistant_image(url.clone(), outcome.image_caption.clone());
            turns.push(turn.clone());
            self.record(turn).await?;
        }
        if let Some(notice) = &outcome.notice {
            let turn = ConversationTurn::assistant_text(notice.clone());
            turns.push(turn.clone());
            self.record(turn).await?;
        }

        for prompt in &outcome.pending_image_prompts {
            let turn = self.generate_suggested_image(prompt).await;
            turns.push(turn.clone());
            self.record(turn).await?;
        }

        let speech_url = self.speak(&outcome.speech_text).await;

        Ok(SubmitResult {
            outcome,
            turns,
            speech_url,
        })
    }

    async fn generate_suggested_image(&self, prompt: &str) -> ConversationTurn {
        match self.services.dispatcher.images().generate(prompt, None).await {
            Ok(url) => ConversationTurn::assistant_image(url, Some(format!("AI Generated: \"{prompt}\""))),
            Err(e) => {
                error!(error = ?e, %prompt, "AI-suggested image generation failed");
                ConversationTurn::assistant_text(SUGGESTED_IMAGE_FAILURE)
            }
        }
    }

    async fn speak(&self, text: &str) -> Option<String> {
        if !self.settings.speaks() || text.trim().is_empty() {
            return None;
        }
        match self.services.speech.synthesize(text, &self.settings.voice).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = ?e, "Speech synthesis failed, skipping audio");
                None
            }
        }
    }

    /// Appends a turn to the transcript and memory, persisting it in long-term mode.
    async fn record(&mut self, turn: ConversationTurn) -> Result<(), SessionError> {
        if self.persists() {
            let record = TurnRecord::from_turn(&self.user_id, self.module, &turn);
            if let Err(e) = self.services.store.create_turn(record).await {
                error!(user_id = %self.user_id, module = %self.module, error = ?e, "Failed to persist turn");
                return Err(e.into());
            }
        }
        self.transcript.push(turn.clone());
        self.memory.push(turn);
        Ok(())
    }

    /// Shows a notice in the transcript. Notices are neither remembered nor persisted.
    fn notice(&mut self, text: String) -> String {
        self.transcript.push(ConversationTurn::assistant_text(text.clone()));
        text
    }

    /// Switches to a module by identifier; unknown values select chat.
    pub async fn switch_module(&mut self, module: &str) -> Result<String, SessionError> {
        self.switch_to(Dispatcher::resolve_module(module)).await
    }

    /// Enters a module on a clean slate and returns its greeting.
    pub async fn switch_to(&mut self, module: ModuleId) -> Result<String, SessionError> {
        info!(user_id = %self.user_id, %module, "Switching module");
        self.transcript.clear();
        self.memory.clear();
        self.module = module;
        self.started = true;

        if self.persists() {
            self.reload().await?;
        }

        let greeting =
            generate_greeting(self.services.dispatcher.llm().as_ref(), module, &self.settings).await;
        let turn = ConversationTurn::assistant_text(greeting.clone());
        self.transcript.push(turn.clone());
        if self.memory.policy() == MemoryPolicy::ShortTerm {
            self.memory.push(turn);
        }
        Ok(greeting)
    }

    /// Replaces memory with the persisted turns of the active module, oldest first.
    async fn reload(&mut self) -> Result<usize, SessionError> {
        let user_id = self.require_user()?.to_string();
        let mut records = self
            .services
            .store
            .list_turns(&user_id, self.module)
            .await
            .inspect_err(|e| error!(%user_id, module = %self.module, error = ?e, "Failed to load past turns"))?;
        records.reverse();

        let turns: Vec<ConversationTurn> = records
            .into_iter()
            .filter_map(|record| match record.into_turn() {
                Ok(turn) => Some(turn),
                Err(e) => {
                    warn!(error = %e, "Skipping persisted turn");
                    None
                }
            })
            .collect();

        let count = turns.len();
        self.transcript.extend(turns.iter().cloned());
        self.memory.replace(turns);
        info!(%user_id, module = %self.module, count, "Loaded past turns");
        Ok(count)
    }

    /// Switches the memory policy. Both directions start from an empty conversation.
    pub async fn set_long_term_memory(&mut self, enabled: bool) -> Result<String, SessionError> {
        if enabled {
            self.require_user()?;
        }
        self.settings.long_term_memory = enabled;
        self.memory.set_policy(MemoryPolicy::from_long_term_flag(enabled));
        self.transcript.clear();

        if enabled {
            let notice = self.notice(format!(
                "Long-term memory enabled. Loading past conversations for the '{}' section.",
                self.module
            ));
            self.reload().await?;
            Ok(notice)
        } else {
            Ok(self.notice(
                "Long-term memory has been disabled for this session. Your chat history will not be saved or loaded."
                    .to_string(),
            ))
        }
    }

    pub async fn view_past_chats(&mut self) -> Result<String, SessionError> {
        if !self.settings.long_term_memory {
            return Err(SessionError::LongTermMemoryDisabled);
        }
        self.require_user()?;
        self.transcript.clear();
        let notice = self.notice(format!(
            "Here are your past conversations loaded from memory for the '{}' section.",
            self.module
        ));
        self.reload().await?;
        Ok(notice)
    }

    /// Erases the persisted turns of the active module.
    pub async fn delete_module_memory(&mut self) -> Result<String, SessionError> {
        let user_id = self.require_user()?.to_string();
        let deleted = self
            .services
            .store
            .delete_module_turns(&user_id, self.module)
            .await?;
        info!(%user_id, module = %self.module, deleted, "Deleted module memory");

        self.memory.clear();
        self.transcript.clear();
        Ok(self.notice(format!(
            "Your long-term memory for the '{}' section has been completely erased. A fresh start!",
            self.module
        )))
    }

    /// Deletes every turn and profile of the user and resets settings.
    pub async fn clear_all_data(&mut self) -> Result<(), SessionError> {
        let user_id = self.require_user()?.to_string();
        let store = &self.services.store;
        let turns = store.delete_user_turns(&user_id).await?;
        let profiles = store.delete_profiles(&user_id).await?;
        info!(%user_id, turns, profiles, "Cleared all user data");

        self.settings = Settings::default();
        self.memory.set_policy(MemoryPolicy::ShortTerm);
        self.transcript.clear();
        self.attachment = None;
        self.profile = None;
        Ok(())
    }

    /// Attaches a file to the next submission, replacing any previous one.
    pub fn attach_file(&mut self, attachment: Attachment) {
        self.attachment = Some(attachment);
    }

    /// Replaces the settings. The memory flag only changes through
    /// [`ChatSession::set_long_term_memory`].
    pub fn update_settings(&mut self, mut settings: Settings) {
        settings.long_term_memory = self.settings.long_term_memory;
        self.settings = settings;
    }

    pub async fn profile(&mut self) -> Result<UserProfile, SessionError> {
        let user_id = self.require_user()?.to_string();
        if self.profile.is_none() {
            self.profile = self.services.store.load_profile(&user_id).await?;
        }
        Ok(self
            .profile
            .clone()
            .unwrap_or_else(|| UserProfile::new(&user_id)))
    }

    pub async fn update_display_name(&mut self, name: &str) -> Result<UserProfile, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::InvalidDisplayName);
        }
        let mut profile = self.profile().await?;
        profile.custom_display_name = Some(name.to_string());
        self.save_profile(profile).await
    }

    pub async fn set_avatar(&mut self, url: &str) -> Result<UserProfile, SessionError> {
        let mut profile = self.profile().await?;
        profile.avatar_url = Some(url.to_string());
        self.save_profile(profile).await
    }

    async fn save_profile(&mut self, profile: UserProfile) -> Result<UserProfile, SessionError> {
        let saved = self.services.store.save_profile(profile).await?;
        self.profile = Some(saved.clone());
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{SHORT_TERM_CAPACITY, TurnKind, TurnRole};
    use crate::dispatcher::ALBUM_COVER_FAILURE;
    use crate::llm_client::{ChatRole, MockLLMClient};
    use crate::media::{MockImageGenerator, MockSpeechSynthesizer};
    use crate::store::{InMemoryStore, MockConversationStore};
    use anyhow::anyhow;
    use chrono::{Duration, Utc};

    const GREETING: &str = "Hi there!";

    /// An LLM that greets on single-message requests and echoes otherwise.
    fn echo_llm() -> MockLLMClient {
        let mut llm = MockLLMClient::new();
        llm.expect_complete().returning(|messages| {
            if messages.len() == 1 {
                Ok(GREETING.to_string())
            } else {
                let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
                Ok(format!("echo: {last}"))
            }
        });
        llm
    }

    fn quiet_speech() -> MockSpeechSynthesizer {
        let mut speech = MockSpeechSynthesizer::new();
        speech
            .expect_synthesize()
            .returning(|_, _| Ok("/media/speech.mp3".to_string()));
        speech
    }

    fn services(
        llm: MockLLMClient,
        images: MockImageGenerator,
        speech: MockSpeechSynthesizer,
        store: Arc<dyn ConversationStore>,
    ) -> SessionServices {
        SessionServices {
            dispatcher: Arc::new(Dispatcher::new(Arc::new(llm), Arc::new(images), "BASE".to_string())),
            speech: Arc::new(speech),
            store,
        }
    }

    fn session_with_store(store: Arc<dyn ConversationStore>) -> ChatSession {
        ChatSession::new(
            "user-1",
            services(echo_llm(), MockImageGenerator::new(), quiet_speech(), store),
        )
    }

    #[tokio::test]
    async fn test_start_greets_in_chat_module() {
        let mut session = session_with_store(Arc::new(InMemoryStore::new()));
        let greeting = session.start().await.unwrap();

        assert_eq!(greeting, GREETING);
        assert_eq!(session.module(), ModuleId::Chat);
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.memory().len(), 1);
        assert!(session.is_started());
    }

    #[tokio::test]
    async fn test_submit_records_turns_and_speaks() {
        let mut session = session_with_store(Arc::new(InMemoryStore::new()));
        session.start().await.unwrap();

        let result = session.submit("  hello  ").await.unwrap();

        assert_eq!(result.outcome.display_text, "echo: hello");
        assert_eq!(result.turns.len(), 2);
        assert_eq!(result.turns[0].role, TurnRole::User);
        assert_eq!(result.turns[0].content.as_deref(), Some("hello"));
        assert_eq!(result.speech_url.as_deref(), Some("/media/speech.mp3"));
        assert_eq!(session.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_submission_is_rejected() {
        let mut session = session_with_store(Arc::new(InMemoryStore::new()));
        assert!(matches!(session.submit("   ").await, Err(SessionError::EmptyInput)));
    }

    #[tokio::test]
    async fn test_context_is_read_before_user_turn() {
        let mut llm = MockLLMClient::new();
        llm.expect_complete()
            .withf(|messages| messages.len() == 1)
            .returning(|_| Ok(GREETING.to_string()));
        llm.expect_complete()
            .withf(|messages| {
                // system, greeting, new user input
                messages.len() == 3
                    && messages[1] == crate::llm_client::ChatMessage::assistant(GREETING)
                    && messages[2].role == ChatRole::User
                    && messages[2].content == "question"
            })
            .times(1)
            .returning(|_| Ok("answer".to_string()));

        let mut session = ChatSession::new(
            "user-1",
            services(llm, MockImageGenerator::new(), quiet_speech(), Arc::new(InMemoryStore::new())),
        );
        session.start().await.unwrap();
        let result = session.submit("question").await.unwrap();
        assert_eq!(result.outcome.display_text, "answer");
    }

    #[tokio::test]
    async fn test_short_term_memory_is_bounded() {
        let mut session = session_with_store(Arc::new(InMemoryStore::new()));
        session.start().await.unwrap();
        for i in 0..12 {
            session.submit(&format!("message {i}")).await.unwrap();
            assert!(session.memory().len() <= SHORT_TERM_CAPACITY);
        }
        assert_eq!(session.memory().len(), SHORT_TERM_CAPACITY);
    }

    #[tokio::test]
    async fn test_attachment_is_formatted_and_cleared() {
        let mut llm = MockLLMClient::new();
        llm.expect_complete()
            .withf(|messages| messages.len() == 1)
            .returning(|_| Ok(GREETING.to_string()));
        llm.expect_complete()
            .withf(|messages| {
                messages.last().is_some_and(|m| {
                    m.content
                        == "Summarise\n\n[USER_ATTACHED_FILE]Filename: a.pdf, Type: application/pdf, URL: /media/a.pdf[/USER_ATTACHED_FILE]"
                })
            })
            .times(1)
            .returning(|_| Ok("Done.".to_string()));

        let mut session = ChatSession::new(
            "user-1",
            services(llm, MockImageGenerator::new(), quiet_speech(), Arc::new(InMemoryStore::new())),
        );
        session.start().await.unwrap();
        session.attach_file(Attachment::file("/media/a.pdf", "a.pdf", "application/pdf"));

        let result = session.submit("Summarise").await.unwrap();
        assert_eq!(result.turns[0].kind, TurnKind::File);
        assert!(session.attachment().is_none());
        // The file turn itself never reaches model context.
        assert!(
            session
                .memory()
                .context()
                .iter()
                .all(|m| !m.content.contains("USER_ATTACHED_FILE"))
        );
    }

    #[tokio::test]
    async fn test_attachment_alone_is_a_valid_submission() {
        let mut session = session_with_store(Arc::new(InMemoryStore::new()));
        session.start().await.unwrap();
        session.attach_file(Attachment::file("/media/b.png", "b.png", "image/png"));
        let result = session.submit("").await.unwrap();
        assert_eq!(result.turns[0].kind, TurnKind::File);
        assert!(result.turns[0].content.is_none());
    }

    #[tokio::test]
    async fn test_pending_images_fail_independently() {
        let mut llm = MockLLMClient::new();
        llm.expect_complete()
            .withf(|messages| messages.len() == 1)
            .returning(|_| Ok(GREETING.to_string()));
        llm.expect_complete().withf(|messages| messages.len() > 1).returning(|_| {
            Ok("Two pictures. [ACTION:IMAGE_GEN]bad[/ACTION] [ACTION:IMAGE_GEN]good[/ACTION]".to_string())
        });
        let mut images = MockImageGenerator::new();
        images.expect_generate().returning(|prompt, _| {
            if prompt == "bad" {
                Err(anyhow!("rejected"))
            } else {
                Ok(format!("https://img/{prompt}.png"))
            }
        });

        let mut session = ChatSession::new(
            "user-1",
            services(llm, images, quiet_speech(), Arc::new(InMemoryStore::new())),
        );
        session.start().await.unwrap();
        let result = session.submit("draw").await.unwrap();

        assert_eq!(result.turns.len(), 4);
        assert_eq!(result.turns[1].content.as_deref(), Some("Two pictures."));
        assert_eq!(result.turns[2].content.as_deref(), Some(SUGGESTED_IMAGE_FAILURE));
        assert_eq!(result.turns[3].kind, TurnKind::Image);
        assert_eq!(result.turns[3].content.as_deref(), Some("AI Generated: \"good\""));
    }

    #[tokio::test]
    async fn test_album_cover_failure_adds_notice_turn() {
        let mut llm = MockLLMClient::new();
        llm.expect_complete()
            .withf(|messages| messages.len() == 1)
            .returning(|_| Ok(GREETING.to_string()));
        llm.expect_complete()
            .withf(|messages| messages.len() > 1)
            .returning(|_| Ok("Smooth jazz. [ACTION:IMAGE_GEN]saxophone at dusk[/ACTION]".to_string()));
        let mut images = MockImageGenerator::new();
        images
            .expect_generate()
            .returning(|_, _| Err(anyhow!("quota exceeded")));

        let mut session = ChatSession::new(
            "user-1",
            services(llm, images, quiet_speech(), Arc::new(InMemoryStore::new())),
        );
        session.switch_to(ModuleId::MusicStudio).await.unwrap();
        let result = session.submit("jazz").await.unwrap();

        assert_eq!(result.turns.len(), 3);
        assert_eq!(result.turns[1].content.as_deref(), Some("Smooth jazz."));
        assert_eq!(result.turns[2].content.as_deref(), Some(ALBUM_COVER_FAILURE));
        assert_eq!(
            session.transcript().last().and_then(|t| t.content.as_deref()),
            Some(ALBUM_COVER_FAILURE)
        );
    }

    #[tokio::test]
    async fn test_speech_failure_is_skipped() {
        let mut speech = MockSpeechSynthesizer::new();
        speech
            .expect_synthesize()
            .returning(|_, _| Err(anyhow!("tts down")));
        let mut session = ChatSession::new(
            "user-1",
            services(echo_llm(), MockImageGenerator::new(), speech, Arc::new(InMemoryStore::new())),
        );
        session.start().await.unwrap();
        let result = session.submit("hi").await.unwrap();
        assert!(result.speech_url.is_none());
        assert_eq!(result.outcome.display_text, "echo: hi");
    }

    #[tokio::test]
    async fn test_no_speech_when_voice_disabled() {
        let mut speech = MockSpeechSynthesizer::new();
        speech.expect_synthesize().never();
        let mut session = ChatSession::new(
            "user-1",
            services(echo_llm(), MockImageGenerator::new(), speech, Arc::new(InMemoryStore::new())),
        );
        let mut settings = Settings::default();
        settings.voice = "none".to_string();
        session.update_settings(settings);
        session.start().await.unwrap();
        assert!(session.submit("hi").await.unwrap().speech_url.is_none());
    }

    #[tokio::test]
    async fn test_switch_module_clears_and_greets() {
        let mut session = session_with_store(Arc::new(InMemoryStore::new()));
        session.start().await.unwrap();
        session.submit("hello").await.unwrap();

        let greeting = session.switch_module("code-lab").await.unwrap();
        assert_eq!(greeting, GREETING);
        assert_eq!(session.module(), ModuleId::CodeLab);
        assert_eq!(session.transcript().len(), 1);

        session.switch_module("not-a-module").await.unwrap();
        assert_eq!(session.module(), ModuleId::Chat);
    }

    #[tokio::test]
    async fn test_long_term_memory_persists_and_reloads_chronologically() {
        let store = Arc::new(InMemoryStore::new());
        let start = Utc::now() - Duration::minutes(10);
        for (i, text) in ["first", "second", "third"].iter().enumerate() {
            let turn = ConversationTurn::user_text(*text).with_timestamp(start + Duration::seconds(i as i64));
            store
                .create_turn(TurnRecord::from_turn("user-1", ModuleId::Chat, &turn))
                .await
                .unwrap();
        }

        let mut session = session_with_store(store.clone());
        session.start().await.unwrap();
        let notice = session.set_long_term_memory(true).await.unwrap();
        assert_eq!(
            notice,
            "Long-term memory enabled. Loading past conversations for the 'chat' section."
        );

        let contents: Vec<_> = session
            .transcript()
            .iter()
            .skip(1)
            .map(|t| t.content.clone().unwrap())
            .collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(session.memory().policy(), MemoryPolicy::LongTerm);
        assert_eq!(session.memory().len(), 3);

        session.submit("fourth").await.unwrap();
        let persisted = store.list_turns("user-1", ModuleId::Chat).await.unwrap();
        assert_eq!(persisted.len(), 5);
        assert_eq!(persisted[0].content.as_deref(), Some("echo: fourth"));
    }

    #[tokio::test]
    async fn test_short_term_turns_are_not_persisted() {
        let store = Arc::new(InMemoryStore::new());
        let mut session = session_with_store(store.clone());
        session.start().await.unwrap();
        session.submit("hello").await.unwrap();
        assert!(store.list_turns("user-1", ModuleId::Chat).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabling_long_term_memory_clears_without_merge() {
        let mut session = session_with_store(Arc::new(InMemoryStore::new()));
        session.start().await.unwrap();
        session.set_long_term_memory(true).await.unwrap();
        session.submit("remembered").await.unwrap();

        let notice = session.set_long_term_memory(false).await.unwrap();
        assert!(notice.starts_with("Long-term memory has been disabled"));
        assert!(session.memory().is_empty());
        assert_eq!(session.transcript().len(), 1);
        assert!(!session.settings().long_term_memory);
    }

    #[tokio::test]
    async fn test_view_past_chats_requires_long_term_memory() {
        let mut session = session_with_store(Arc::new(InMemoryStore::new()));
        session.start().await.unwrap();
        assert!(matches!(
            session.view_past_chats().await,
            Err(SessionError::LongTermMemoryDisabled)
        ));

        session.set_long_term_memory(true).await.unwrap();
        session.submit("saved").await.unwrap();
        let notice = session.view_past_chats().await.unwrap();
        assert_eq!(
            notice,
            "Here are your past conversations loaded from memory for the 'chat' section."
        );
        assert_eq!(session.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_module_memory() {
        let store = Arc::new(InMemoryStore::new());
        let mut session = session_with_store(store.clone());
        session.start().await.unwrap();
        session.set_long_term_memory(true).await.unwrap();
        session.submit("forget me").await.unwrap();

        let notice = session.delete_module_memory().await.unwrap();
        assert_eq!(
            notice,
            "Your long-term memory for the 'chat' section has been completely erased. A fresh start!"
        );
        assert!(store.list_turns("user-1", ModuleId::Chat).await.unwrap().is_empty());
        assert!(session.memory().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let mut store = MockConversationStore::new();
        store.expect_load_profile().returning(|_| Ok(None));
        store.expect_list_turns().returning(|_, _| Ok(Vec::new()));
        store
            .expect_create_turn()
            .returning(|_| Err(StoreError::Backend("connection reset".to_string())));

        let mut session = session_with_store(Arc::new(store));
        session.start().await.unwrap();
        session.set_long_term_memory(true).await.unwrap();
        assert!(matches!(
            session.submit("hello").await,
            Err(SessionError::Store(StoreError::Backend(_)))
        ));
    }

    #[tokio::test]
    async fn test_invalid_persisted_records_are_skipped() {
        let store = Arc::new(InMemoryStore::new());
        let mut broken = TurnRecord::from_turn("user-1", ModuleId::Chat, &ConversationTurn::user_text("x"));
        broken.content = None;
        store.create_turn(broken).await.unwrap();
        store
            .create_turn(TurnRecord::from_turn(
                "user-1",
                ModuleId::Chat,
                &ConversationTurn::user_text("ok"),
            ))
            .await
            .unwrap();

        let mut session = session_with_store(store);
        session.start().await.unwrap();
        session.set_long_term_memory(true).await.unwrap();
        assert_eq!(session.memory().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_all_data_resets_everything() {
        let store = Arc::new(InMemoryStore::new());
        let mut session = session_with_store(store.clone());
        session.start().await.unwrap();
        session.update_display_name("Ada").await.unwrap();
        session.set_long_term_memory(true).await.unwrap();
        session.submit("hello").await.unwrap();

        session.clear_all_data().await.unwrap();

        assert_eq!(session.settings(), &Settings::default());
        assert_eq!(session.memory().policy(), MemoryPolicy::ShortTerm);
        assert!(store.list_turns("user-1", ModuleId::Chat).await.unwrap().is_empty());
        assert!(store.load_profile("user-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_profile_updates() {
        let mut session = session_with_store(Arc::new(InMemoryStore::new()));
        assert!(matches!(
            session.update_display_name("  ").await,
            Err(SessionError::InvalidDisplayName)
        ));
        let first = session.update_display_name("Ada").await.unwrap();
        let second = session.set_avatar("/media/ada.png").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.custom_display_name.as_deref(), Some("Ada"));
        assert_eq!(second.avatar_url.as_deref(), Some("/media/ada.png"));
    }

    #[tokio::test]
    async fn test_anonymous_user_cannot_enable_long_term_memory() {
        let mut session = ChatSession::new(
            "",
            services(echo_llm(), MockImageGenerator::new(), quiet_speech(), Arc::new(InMemoryStore::new())),
        );
        assert!(matches!(
            session.set_long_term_memory(true).await,
            Err(SessionError::NotSignedIn)
        ));
        assert!(matches!(session.profile().await, Err(SessionError::NotSignedIn)));
    }

    #[tokio::test]
    async fn test_update_settings_keeps_memory_flag() {
        let mut session = session_with_store(Arc::new(InMemoryStore::new()));
        let mut settings = Settings::default();
        settings.long_term_memory = true;
        settings.persona = "Pirate".to_string();
        session.update_settings(settings);
        assert!(!session.settings().long_term_memory);
        assert_eq!(session.settings().persona, "Pirate");
    }
}
