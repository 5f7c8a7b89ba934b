//! Outbound seam to the transport layer.

use anyhow::Result;

/// One thing to send back in response to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// Posted to the conversation.
    Text(String),
    /// Addressed to the message author.
    Reply(String),
    /// A named file instead of inline text.
    Attachment { name: String, bytes: Vec<u8> },
    /// Addressed to the author: a headline plus a fenced, already-escaped diagnostic.
    Error { message: String, diagnostic: String },
}

/// Delivers reports. Implemented by whatever transport hosts the bot.
pub trait Reporter: Send + Sync {
    fn report(&self, report: Report) -> Result<()>;

    /// Side channel for failures that are the system's fault, not the user's.
    fn alert_operator(&self, text: &str) -> Result<()>;
}
