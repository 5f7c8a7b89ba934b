//! Inbound messages and the text processing done before intent resolution.

use regex::Regex;
use std::sync::OnceLock;

/// A message as delivered by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub author: String,
    pub author_is_bot: bool,
    /// Sent directly to the bot rather than in a shared channel.
    pub direct: bool,
    /// The bot is among the message's mentions.
    pub mentions_bot: bool,
    pub content: String,
}

impl InboundMessage {
    /// A direct message from a human, the common case for local transports.
    pub fn direct(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            author_is_bot: false,
            direct: true,
            mentions_bot: false,
            content: content.into(),
        }
    }

    /// Whether the bot should act on this message at all.
    ///
    /// Other bots are always ignored; humans must either write directly or
    /// mention the bot.
    pub fn is_addressed(&self) -> bool {
        !self.author_is_bot && (self.direct || self.mentions_bot)
    }
}

/// The two things extracted from a message: what to do and what to do it on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub command_text: String,
    pub payload: Option<String>,
}

impl ParsedRequest {
    pub fn parse(content: &str) -> Self {
        // Trimmed, so the newline left where a code block was stripped does
        // not add a point of edit distance to every request.
        Self {
            command_text: strip_code(&strip_mentions(content)).trim().to_string(),
            payload: extract_code(content),
        }
    }
}

fn mention_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<@!?[0-9]+>").expect("mention pattern is valid"))
}

fn fence_span_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```.*```").expect("fence span pattern is valid"))
}

fn code_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)```[a-z]*\n(.*?)\n```").expect("code block pattern is valid")
    })
}

/// Remove every `<@id>` / `<@!id>` mention token.
pub fn strip_mentions(text: &str) -> String {
    mention_pattern().replace_all(text, "").into_owned()
}

/// Whether `text` contains a mention token for `user_id`.
pub fn mentions(text: &str, user_id: &str) -> bool {
    mention_pattern().find_iter(text).any(|token| {
        let id = token
            .as_str()
            .trim_start_matches("<@")
            .trim_start_matches('!')
            .trim_end_matches('>');
        id == user_id
    })
}

/// Remove fenced code from the command text.
///
/// Greedy on purpose: with several blocks, everything from the first fence
/// to the last one goes, including any prose between the blocks.
pub fn strip_code(text: &str) -> String {
    fence_span_pattern().replace(text, "").into_owned()
}

/// Inner content of the first fenced block, if there is one.
///
/// The opening fence may carry a lowercase language tag and must end its
/// line; the closing fence must start its own line.
pub fn extract_code(text: &str) -> Option<String> {
    code_block_pattern()
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|inner| inner.as_str().to_string())
}
