//! Action-Tag Response Router
//!
//! Separates human-displayable content from the directives a model embedded in
//! its free-text answer. The router is pure: it never calls a collaborator.
//! Image prompts it collects are handed back to the caller, which executes
//! them after the text has been rendered.

use crate::directive::{Directive, DirectiveKind, TextSplicer, scan_kind};

/// Written in place of an image directive when image generation is disabled.
pub const IMAGE_DISABLED_PLACEHOLDER: &str = "[Image generation module disabled]";

/// The router's output for one generated response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutedResponse {
    /// Text with every recognised directive removed or replaced, trimmed.
    pub display_text: String,
    /// Concatenated speech payloads, or the display text when there were none.
    pub speech_text: String,
    /// Image prompts in order of appearance, empty when images are disabled.
    pub pending_image_prompts: Vec<String>,
}

/// Routes raw generated text into display text, speech text and image prompts.
///
/// `SPEAK` directives are handled first: each is removed and its payload
/// joined (single space) into the speech text. `IMAGE_GEN` directives are then
/// scanned in what remains. Each is removed and its prompt queued when
/// `image_generation_enabled`, or replaced by [`IMAGE_DISABLED_PLACEHOLDER`]
/// otherwise. Malformed directives are left as literal text.
///
/// Removing a directive can join its neighbours into a new one, so both
/// passes repeat until the text stops changing. Routing the resulting display
/// text again is a no-op.
pub fn route_response(raw: &str, image_generation_enabled: bool) -> RoutedResponse {
    let mut text = raw.to_string();
    let mut speech_parts: Vec<String> = Vec::new();
    let mut pending_image_prompts = Vec::new();

    loop {
        let mut changed = false;

        if let Some(next) = splice(&text, DirectiveKind::Speak, |directive| {
            if let Directive::Speak { text } = directive {
                speech_parts.push(text);
            }
            None
        }) {
            text = next;
            changed = true;
        }

        if let Some(next) = splice(&text, DirectiveKind::ImageGen, |directive| {
            if !image_generation_enabled {
                return Some(IMAGE_DISABLED_PLACEHOLDER);
            }
            if let Directive::ImageGen { prompt } = directive {
                pending_image_prompts.push(prompt);
            }
            None
        }) {
            text = next;
            changed = true;
        }

        if !changed {
            break;
        }
    }

    let display_text = text.trim().to_string();
    let mut speech_text = speech_parts.join(" ");
    if speech_text.is_empty() && !display_text.is_empty() {
        speech_text = display_text.clone();
    }

    RoutedResponse {
        display_text,
        speech_text,
        pending_image_prompts,
    }
}

/// Rewrites every directive of `kind` in `text`. `handle` returns the
/// replacement for a directive, or `None` to drop it. Returns `None` when
/// `text` holds no such directive.
fn splice(
    text: &str,
    kind: DirectiveKind,
    mut handle: impl FnMut(Directive) -> Option<&'static str>,
) -> Option<String> {
    let matches = scan_kind(text, kind);
    if matches.is_empty() {
        return None;
    }

    let mut splicer = TextSplicer::new();
    let mut cursor = 0;
    for matched in matches {
        splicer.keep(&text[cursor..matched.span.start]);
        match handle(matched.directive) {
            Some(replacement) => splicer.insert(replacement),
            None => splicer.drop_span(),
        }
        cursor = matched.span.end;
    }
    splicer.keep(&text[cursor..]);
    Some(splicer.finish())
}
