//! Per-user settings consulted on every dispatch.

use crate::module::ModuleId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The persona that leaves the system prompt unchanged.
pub const DEFAULT_PERSONA: &str = "Friendly";
/// Voice value that turns speech synthesis off.
pub const NO_VOICE: &str = "none";

/// Requested tone of the assistant's replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseTone {
    #[default]
    Default,
    EmojiFriendly,
    EmojiFree,
    Serious,
    Funny,
    Warm,
    Poetic,
}

impl fmt::Display for ResponseTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseTone::Default => "default",
            ResponseTone::EmojiFriendly => "emoji-friendly",
            ResponseTone::EmojiFree => "emoji-free",
            ResponseTone::Serious => "serious",
            ResponseTone::Funny => "funny",
            ResponseTone::Warm => "warm",
            ResponseTone::Poetic => "poetic",
        };
        f.write_str(name)
    }
}

/// Enabled flags for the modules that can be switched off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModuleToggles {
    pub image_lab: bool,
    pub music_studio: bool,
    pub voice_bot: bool,
    pub roleplay_simulator: bool,
    pub documents: bool,
    pub auto_agents: bool,
    pub code_lab: bool,
}

impl Default for ModuleToggles {
    fn default() -> Self {
        Self {
            image_lab: true,
            music_studio: true,
            voice_bot: true,
            roleplay_simulator: true,
            documents: true,
            auto_agents: true,
            code_lab: true,
        }
    }
}

impl ModuleToggles {
    /// The flag gating `id`, or `None` for always-enabled modules.
    pub fn flag(&self, id: ModuleId) -> Option<bool> {
        match id {
            ModuleId::ImageLab => Some(self.image_lab),
            ModuleId::MusicStudio => Some(self.music_studio),
            ModuleId::VoiceBot => Some(self.voice_bot),
            ModuleId::RoleplaySimulator => Some(self.roleplay_simulator),
            ModuleId::Documents => Some(self.documents),
            ModuleId::AutoAgents => Some(self.auto_agents),
            ModuleId::CodeLab => Some(self.code_lab),
            ModuleId::Home | ModuleId::Chat | ModuleId::AiStudio | ModuleId::Tools => None,
        }
    }

    /// Sets the flag gating `id`. Returns `false` if the module is not gateable.
    pub fn set(&mut self, id: ModuleId, enabled: bool) -> bool {
        let slot = match id {
            ModuleId::ImageLab => &mut self.image_lab,
            ModuleId::MusicStudio => &mut self.music_studio,
            ModuleId::VoiceBot => &mut self.voice_bot,
            ModuleId::RoleplaySimulator => &mut self.roleplay_simulator,
            ModuleId::Documents => &mut self.documents,
            ModuleId::AutoAgents => &mut self.auto_agents,
            ModuleId::CodeLab => &mut self.code_lab,
            ModuleId::Home | ModuleId::Chat | ModuleId::AiStudio | ModuleId::Tools => {
                return false;
            }
        };
        *slot = enabled;
        true
    }
}

/// User-owned configuration. Passed explicitly into every dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub persona: String,
    pub voice: String,
    pub response_tone: ResponseTone,
    pub long_term_memory: bool,
    pub custom_instructions: String,
    pub enable_voice_responses: bool,
    pub modules: ModuleToggles,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
            voice: "en-male".to_string(),
            response_tone: ResponseTone::Default,
            long_term_memory: false,
            custom_instructions: String::new(),
            enable_voice_responses: true,
            modules: ModuleToggles::default(),
        }
    }
}

impl Settings {
    pub fn is_module_enabled(&self, id: ModuleId) -> bool {
        self.modules.flag(id).unwrap_or(true)
    }

    /// Image capability used by the response router.
    pub fn image_generation_enabled(&self) -> bool {
        self.modules.image_lab
    }

    /// Whether speech text should be synthesised for the user.
    pub fn speaks(&self) -> bool {
        self.enable_voice_responses && !self.voice.is_empty() && self.voice != NO_VOICE
    }
}
