//! Action Directive Grammar
//!
//! Generated text may carry side-effect instructions in the form
//! `[ACTION:<KIND>]<payload>[/ACTION]`. This module tokenizes such text into
//! structured matches so callers can strip, replace, or act on them without
//! chaining ad-hoc string replacements.
//!
//! The grammar is non-nesting and is scanned one kind at a time: a payload
//! runs up to the first closing delimiter after its opening tag. An opening
//! tag without a closing delimiter, or with an unknown kind, stays literal.

use std::ops::Range;

/// Prefix shared by every opening tag.
pub const OPEN_PREFIX: &str = "[ACTION:";
/// The closing delimiter shared by every directive kind.
pub const CLOSE_TAG: &str = "[/ACTION]";

/// The directive kinds understood by the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    ImageGen,
    Speak,
}

impl DirectiveKind {
    /// The tag name as it appears between `[ACTION:` and `]`.
    pub fn tag(&self) -> &'static str {
        match self {
            DirectiveKind::ImageGen => "IMAGE_GEN",
            DirectiveKind::Speak => "SPEAK",
        }
    }

    /// The full opening tag, e.g. `[ACTION:SPEAK]`.
    pub fn opening(&self) -> String {
        format!("{}{}]", OPEN_PREFIX, self.tag())
    }
}

/// A parsed instruction embedded in generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Generate an image from the given prompt.
    ImageGen { prompt: String },
    /// Speak the given text aloud.
    Speak { text: String },
}

impl Directive {
    fn new(kind: DirectiveKind, payload: &str) -> Self {
        match kind {
            DirectiveKind::ImageGen => Directive::ImageGen {
                prompt: payload.to_string(),
            },
            DirectiveKind::Speak => Directive::Speak {
                text: payload.to_string(),
            },
        }
    }
}

/// A directive together with the byte range it occupies in the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveMatch {
    pub directive: Directive,
    pub span: Range<usize>,
}

/// Scans `text` left to right for directives of one kind.
///
/// Openings of any other kind are ordinary text to this scan. Matches never
/// overlap, and a payload ends at the first closing delimiter after its
/// opening tag.
pub fn scan_kind(text: &str, kind: DirectiveKind) -> Vec<DirectiveMatch> {
    let opening = kind.opening();
    let mut matches = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find(&opening) {
        let start = cursor + offset;
        let payload_start = start + opening.len();
        let Some(payload_len) = text[payload_start..].find(CLOSE_TAG) else {
            break;
        };
        let payload_end = payload_start + payload_len;
        let end = payload_end + CLOSE_TAG.len();

        matches.push(DirectiveMatch {
            directive: Directive::new(kind, &text[payload_start..payload_end]),
            span: start..end,
        });
        cursor = end;
    }

    matches
}

/// Returns the first well-formed directive of the given kind, if any.
pub fn first_of_kind(text: &str, kind: DirectiveKind) -> Option<DirectiveMatch> {
    scan_kind(text, kind).into_iter().next()
}

/// Builds display text out of the literal pieces around removed directives.
///
/// When a span is dropped, horizontal whitespace at the start of the next
/// kept piece is collapsed into the whitespace already written, so
/// `"a [..] b"` becomes `"a b"` rather than `"a  b"`.
#[derive(Debug, Default)]
pub(crate) struct TextSplicer {
    out: String,
    at_seam: bool,
}

impl TextSplicer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn keep(&mut self, piece: &str) {
        if self.at_seam && self.out.ends_with(char::is_whitespace) {
            self.out.push_str(piece.trim_start_matches([' ', '\t']));
        } else {
            self.out.push_str(piece);
        }
        self.at_seam = false;
    }

    pub(crate) fn drop_span(&mut self) {
        self.at_seam = true;
    }

    pub(crate) fn insert(&mut self, replacement: &str) {
        self.out.push_str(replacement);
        self.at_seam = false;
    }

    pub(crate) fn finish(self) -> String {
        self.out.trim().to_string()
    }
}

/// Removes a single matched span from `text`, joining the surrounding pieces.
pub fn remove_span(text: &str, span: &Range<usize>) -> String {
    let mut splicer = TextSplicer::new();
    splicer.keep(&text[..span.start]);
    splicer.drop_span();
    splicer.keep(&text[span.end..]);
    splicer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speak(text: &str) -> Directive {
        Directive::Speak {
            text: text.to_string(),
        }
    }

    fn image(prompt: &str) -> Directive {
        Directive::ImageGen {
            prompt: prompt.to_string(),
        }
    }

    #[test]
    fn test_scan_plain_text_has_no_matches() {
        assert!(scan_kind("Just a normal answer.", DirectiveKind::Speak).is_empty());
        assert!(scan_kind("", DirectiveKind::ImageGen).is_empty());
    }

    #[test]
    fn test_scan_single_speak_directive() {
        let text = "Sure! [ACTION:SPEAK]Hello there[/ACTION] Done.";
        let matches = scan_kind(text, DirectiveKind::Speak);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].directive, speak("Hello there"));
        assert_eq!(&text[matches[0].span.clone()], "[ACTION:SPEAK]Hello there[/ACTION]");
    }

    #[test]
    fn test_scan_only_returns_requested_kind_in_order() {
        let text = "[ACTION:IMAGE_GEN]fox[/ACTION] mid [ACTION:SPEAK]hi[/ACTION][ACTION:IMAGE_GEN]owl[/ACTION]";
        let images: Vec<_> = scan_kind(text, DirectiveKind::ImageGen)
            .into_iter()
            .map(|m| m.directive)
            .collect();
        assert_eq!(images, vec![image("fox"), image("owl")]);

        let spoken = scan_kind(text, DirectiveKind::Speak);
        assert_eq!(spoken.len(), 1);
        assert_eq!(spoken[0].directive, speak("hi"));
    }

    #[test]
    fn test_scan_payload_may_span_lines_and_brackets() {
        let text = "[ACTION:IMAGE_GEN]a [red] fox\nin snow[/ACTION]";
        let matches = scan_kind(text, DirectiveKind::ImageGen);
        assert_eq!(matches[0].directive, image("a [red] fox\nin snow"));
    }

    #[test]
    fn test_scan_unterminated_directive_is_literal() {
        assert!(scan_kind("Look: [ACTION:IMAGE_GEN]a cat with no end", DirectiveKind::ImageGen).is_empty());
    }

    #[test]
    fn test_unterminated_opening_of_other_kind_does_not_hide_speech() {
        let text = "[ACTION:IMAGE_GEN]x [ACTION:SPEAK]y[/ACTION]";
        let matches = scan_kind(text, DirectiveKind::Speak);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].directive, speak("y"));
        assert_eq!(&text[matches[0].span.clone()], "[ACTION:SPEAK]y[/ACTION]");
    }

    #[test]
    fn test_scan_unknown_kind_is_ignored() {
        let text = "[ACTION:DANCE]jig[/ACTION] then [ACTION:SPEAK]ok[/ACTION]";
        let matches = scan_kind(text, DirectiveKind::Speak);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].directive, speak("ok"));
    }

    #[test]
    fn test_scan_handles_multibyte_text() {
        let text = "Ça va 🎵 [ACTION:SPEAK]héllo 🌍[/ACTION] fin";
        let matches = scan_kind(text, DirectiveKind::Speak);
        assert_eq!(matches[0].directive, speak("héllo 🌍"));
    }

    #[test]
    fn test_first_of_kind_returns_first_match_only() {
        let text = "[ACTION:SPEAK]x[/ACTION][ACTION:IMAGE_GEN]one[/ACTION][ACTION:IMAGE_GEN]two[/ACTION]";
        let first = first_of_kind(text, DirectiveKind::ImageGen).unwrap();
        assert_eq!(first.directive, image("one"));
        assert!(first_of_kind("nothing here", DirectiveKind::ImageGen).is_none());
    }

    #[test]
    fn test_remove_span_collapses_seam_whitespace() {
        let text = "Before [ACTION:IMAGE_GEN]x[/ACTION] after";
        let m = first_of_kind(text, DirectiveKind::ImageGen).unwrap();
        assert_eq!(remove_span(text, &m.span), "Before after");
    }

    #[test]
    fn test_remove_span_keeps_newlines() {
        let text = "Line one\n[ACTION:IMAGE_GEN]x[/ACTION]\nLine two";
        let m = first_of_kind(text, DirectiveKind::ImageGen).unwrap();
        assert_eq!(remove_span(text, &m.span), "Line one\n\nLine two");
    }
}
