//! Module Table
//!
//! A module is a named capability context (chat, image lab, ...) that selects
//! prompt behavior and, through its [`Strategy`], how a request is executed.
//! The table is static; only the enabled flags, owned by user settings, vary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of module identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleId {
    Home,
    Chat,
    AiStudio,
    ImageLab,
    MusicStudio,
    VoiceBot,
    RoleplaySimulator,
    Documents,
    AutoAgents,
    CodeLab,
    Tools,
}

impl ModuleId {
    pub const ALL: [ModuleId; 11] = [
        ModuleId::Home,
        ModuleId::Chat,
        ModuleId::AiStudio,
        ModuleId::ImageLab,
        ModuleId::MusicStudio,
        ModuleId::VoiceBot,
        ModuleId::RoleplaySimulator,
        ModuleId::Documents,
        ModuleId::AutoAgents,
        ModuleId::CodeLab,
        ModuleId::Tools,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleId::Home => "home",
            ModuleId::Chat => "chat",
            ModuleId::AiStudio => "ai-studio",
            ModuleId::ImageLab => "image-lab",
            ModuleId::MusicStudio => "music-studio",
            ModuleId::VoiceBot => "voice-bot",
            ModuleId::RoleplaySimulator => "roleplay-simulator",
            ModuleId::Documents => "documents",
            ModuleId::AutoAgents => "auto-agents",
            ModuleId::CodeLab => "code-lab",
            ModuleId::Tools => "tools",
        }
    }

    /// Looks up this module's row in the static table.
    pub fn spec(&self) -> &'static ModuleSpec {
        // MODULES is declared in the same order as ModuleId::ALL.
        &MODULES[*self as usize]
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a module.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown module: '{0}'")]
pub struct UnknownModule(pub String);

impl FromStr for ModuleId {
    type Err = UnknownModule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModuleId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownModule(s.to_string()))
    }
}

/// How the dispatcher executes a request for a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One text completion, then the response router.
    GenericText,
    /// One image generated straight from the user input.
    SingleImage,
    /// One text completion carrying exactly one album-cover directive.
    TextWithCover,
    /// No model call; the input is spoken back verbatim.
    Passthrough,
}

/// One row of the module table.
#[derive(Debug)]
pub struct ModuleSpec {
    pub id: ModuleId,
    pub label: &'static str,
    /// Whether the module can be switched off in settings.
    pub gated: bool,
    pub strategy: Strategy,
    /// Module-specific instruction appended to the system prompt.
    pub instruction: Option<&'static str>,
    /// System prompt used to produce the module greeting.
    pub greeting_prompt: &'static str,
    /// Greeting shown when the greeting completion fails.
    pub greeting_fallback: &'static str,
    /// Greeting shown instead of a model call when the module is disabled.
    pub disabled_greeting: &'static str,
}

impl ModuleSpec {
    /// The fixed reply for a request made to a disabled module.
    pub fn disabled_message(&self) -> String {
        format!(
            "The {} module is currently disabled in your settings. Please enable it to use this feature.",
            self.label
        )
    }

    /// The active-module header appended to the base system prompt.
    pub fn prompt_header(&self) -> String {
        format!(
            "**CURRENTLY ACTIVE MODULE: {}**",
            self.id.as_str().to_uppercase().replacen('-', " ", 1)
        )
    }
}

pub const MUSIC_STUDIO_INSTRUCTION: &str = "Based on the user's input, vividly describe a piece of music (genre, mood, instruments, duration, lyrical themes if applicable). Then, provide a prompt for a suitable album cover image using the exact format: [ACTION:IMAGE_GEN]A descriptive prompt for the album cover[/ACTION] and explain why this cover fits the music. Ensure your music description is rich and creative.";

pub static MODULES: [ModuleSpec; 11] = [
    ModuleSpec {
        id: ModuleId::Home,
        label: "Home",
        gated: false,
        strategy: Strategy::GenericText,
        instruction: Some(
            "As OmniVerseAI Home, provide a general helpful response, maybe offering tips or a summary of OmniVerseAI's capabilities.",
        ),
        greeting_prompt: "As OmniVerseAI Home, provide a very concise and welcoming message, offering to assist with creative or problem-solving tasks.",
        greeting_fallback: "Welcome to OmniVerseAI Home! Ready to help.",
        disabled_greeting: "",
    },
    ModuleSpec {
        id: ModuleId::Chat,
        label: "Chat",
        gated: false,
        strategy: Strategy::GenericText,
        instruction: None,
        greeting_prompt: "As OmniVerseAI's Ask Anything module, provide a very concise welcoming message, inviting the user to ask any question or start a general conversation.",
        greeting_fallback: "Welcome to Ask Anything! How can I assist?",
        disabled_greeting: "",
    },
    ModuleSpec {
        id: ModuleId::AiStudio,
        label: "AI Studio",
        gated: false,
        strategy: Strategy::GenericText,
        instruction: Some(
            "As OmniVerseAI's AI Studio, focus on solving complex problems, performing advanced AI tasks, or deep analysis based on the user's request.",
        ),
        greeting_prompt: "As OmniVerseAI's AI Studio, provide a very concise welcoming message, inviting the user to propose complex problems, research, or intricate AI tasks.",
        greeting_fallback: "Welcome to AI Studio! Let's solve advanced challenges.",
        disabled_greeting: "",
    },
    ModuleSpec {
        id: ModuleId::ImageLab,
        label: "Image Lab",
        gated: true,
        strategy: Strategy::SingleImage,
        instruction: None,
        greeting_prompt: "As OmniVerseAI's Image Lab, provide a very concise welcoming message, inviting the user to describe any image they wish to generate.",
        greeting_fallback: "Welcome to Image Lab! Describe any image you imagine.",
        disabled_greeting: "Image Lab is currently disabled. Please enable it in settings.",
    },
    ModuleSpec {
        id: ModuleId::MusicStudio,
        label: "Music Studio",
        gated: true,
        strategy: Strategy::TextWithCover,
        instruction: Some(MUSIC_STUDIO_INSTRUCTION),
        greeting_prompt: "As OmniVerseAI's Music Studio, provide a very concise welcoming message, inviting the user to describe music or soundscapes. Explain you can create a description of the music and an album cover.",
        greeting_fallback: "Welcome to Music Studio! Describe your dream music.",
        disabled_greeting: "Music Studio is currently disabled. Please enable it in settings.",
    },
    ModuleSpec {
        id: ModuleId::VoiceBot,
        label: "Voice Bot",
        gated: true,
        strategy: Strategy::Passthrough,
        instruction: None,
        greeting_prompt: "As OmniVerseAI's Voice Bot, provide a very concise welcoming message, inviting the user to provide text for speech generation.",
        greeting_fallback: "Welcome to Voice Bot! What text should I speak?",
        disabled_greeting: "Voice Bot is currently disabled. Please enable it in settings.",
    },
    ModuleSpec {
        id: ModuleId::RoleplaySimulator,
        label: "Roleplay Simulator",
        gated: true,
        strategy: Strategy::GenericText,
        instruction: Some(
            "As OmniVerseAI's Roleplay Simulator, you are to fully embody the character or scenario the user requests. Maintain the persona throughout the conversation. Respond in character only, and make sure your response feels like a natural continuation of the roleplay.",
        ),
        greeting_prompt: "As OmniVerseAI's Roleplay Simulator, provide a very concise welcoming message, inviting the user to choose a character or scenario for you to embody.",
        greeting_fallback: "Welcome to Roleplay! Who should I be?",
        disabled_greeting: "Roleplay Simulator is currently disabled. Please enable it in settings.",
    },
    ModuleSpec {
        id: ModuleId::Documents,
        label: "Documents",
        gated: true,
        strategy: Strategy::GenericText,
        instruction: Some(
            "As OmniVerseAI's Documents module, your primary function is to help with document-related tasks such as summarizing, translating, writing, or editing. Guide them on what information to provide (e.g., paste text, describe document).",
        ),
        greeting_prompt: "As OmniVerseAI's Documents module, provide a very concise welcoming message, inviting the user to bring any document-related task: summarization, translation, writing, or editing.",
        greeting_fallback: "Welcome to Documents! How can I help with your documents?",
        disabled_greeting: "Documents module is currently disabled. Please enable it in settings.",
    },
    ModuleSpec {
        id: ModuleId::AutoAgents,
        label: "Auto Agents",
        gated: true,
        strategy: Strategy::GenericText,
        instruction: Some(
            "As OmniVerseAI's Auto Agents module, focus on helping the user define, break down, and conceptually execute complex tasks as an autonomous agent. Describe the steps an agent would take to fulfill the request, emphasizing planning and execution phases.",
        ),
        greeting_prompt: "As OmniVerseAI's Auto Agents module, provide a very concise welcoming message, inviting the user to describe complex tasks for automation or breakdown.",
        greeting_fallback: "Welcome to Auto Agents! What task should I automate?",
        disabled_greeting: "Auto Agents module is currently disabled. Please enable it in settings.",
    },
    ModuleSpec {
        id: ModuleId::CodeLab,
        label: "Code Lab",
        gated: true,
        strategy: Strategy::GenericText,
        instruction: Some(
            "As OmniVerseAI's Code Lab, provide coding assistance. This includes writing, debugging, explaining, or optimizing code snippets in any programming language. Present code clearly formatted with markdown code blocks (```language\ncode\n```).",
        ),
        greeting_prompt: "As OmniVerseAI's Code Lab, provide a very concise welcoming message, inviting the user to bring any programming challenge.",
        greeting_fallback: "Welcome to Code Lab! What code challenge today?",
        disabled_greeting: "Code Lab is currently disabled. Please enable it in settings.",
    },
    ModuleSpec {
        id: ModuleId::Tools,
        label: "Tools",
        gated: false,
        strategy: Strategy::GenericText,
        instruction: Some(
            "As OmniVerseAI's Tools module, you offer various utility AI functions, from meme makers to video editors. Invite the user to ask about or specify which tool they need.",
        ),
        greeting_prompt: "As OmniVerseAI's Tools module, provide a very concise welcoming message, indicating you offer various utility AI functions.",
        greeting_fallback: "Welcome to Tools! What utility do you need?",
        disabled_greeting: "",
    },
];
