//! System prompt composition and request message assembly.

use crate::conversation::Attachment;
use crate::llm_client::ChatMessage;
use crate::module::ModuleSpec;
use crate::settings::{DEFAULT_PERSONA, ResponseTone, Settings};

/// Builds the system prompt for a module from the base persona prompt.
///
/// Sections are separated by blank lines: the base prompt, the active-module
/// header, the module instruction, then the persona, custom instruction and
/// tone suffixes when the settings ask for them.
pub fn compose_system_prompt(base: &str, spec: &ModuleSpec, settings: &Settings) -> String {
    let mut sections: Vec<String> = Vec::new();
    let base = base.trim();
    if !base.is_empty() {
        sections.push(base.to_string());
    }
    sections.push(spec.prompt_header());
    if let Some(instruction) = spec.instruction {
        sections.push(instruction.to_string());
    }

    let persona = settings.persona.trim();
    if !persona.is_empty() && persona != DEFAULT_PERSONA {
        sections.push(format!(
            "Your current persona is: {persona}. Adapt your responses to this persona."
        ));
    }

    let custom = settings.custom_instructions.trim();
    if !custom.is_empty() {
        sections.push(format!("User's custom instructions: {custom}"));
    }

    if settings.response_tone != ResponseTone::Default {
        sections.push(format!(
            "Ensure your response tone is: {}.",
            settings.response_tone
        ));
    }

    sections.join("\n\n")
}

/// System prompt, prior context, then the new user input, in that order.
pub fn build_messages(system_prompt: String, context: &[ChatMessage], input: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(context.len() + 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(context.iter().cloned());
    messages.push(ChatMessage::user(input));
    messages
}

/// Embeds an attached file's metadata into the prompt sent to the model.
pub fn format_attachment_prompt(text: &str, attachment: &Attachment) -> String {
    let block = format!(
        "[USER_ATTACHED_FILE]Filename: {}, Type: {}, URL: {}[/USER_ATTACHED_FILE]",
        attachment.file_name.as_deref().unwrap_or_default(),
        attachment.mime_type.as_deref().unwrap_or_default(),
        attachment.url
    );
    if text.is_empty() {
        block
    } else {
        format!("{text}\n\n{block}")
    }
}
