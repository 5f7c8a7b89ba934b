//! Turning toolchain output into reports that are safe to display.

use crate::report::Report;

/// Replaces every triple backtick in displayed text so it cannot close the
/// surrounding block early.
pub const ESCAPED_FENCE: &str = "<escaped triple backtick>";

/// Shown instead of an empty block.
pub const NO_OUTPUT: &str = "No output.";

const FENCE: &str = "```";

pub fn escape_backticks(text: &str) -> String {
    text.replace(FENCE, ESCAPED_FENCE)
}

/// `text` escaped and wrapped in a preformatted block.
pub fn code_block(text: &str) -> String {
    format!("{}\n{}\n{}", FENCE, escape_backticks(text), FENCE)
}

/// Report toolchain output by size: nothing, inline, or as an attachment.
///
/// Output of `attach_threshold` bytes or more becomes an attachment named
/// `attachment_name`.
pub fn output_report(output: &str, attachment_name: &str, attach_threshold: usize) -> Report {
    if output.len() >= attach_threshold {
        Report::Attachment {
            name: attachment_name.to_string(),
            bytes: output.as_bytes().to_vec(),
        }
    } else if output.is_empty() {
        Report::Text(NO_OUTPUT.to_string())
    } else {
        Report::Text(code_block(output))
    }
}

pub fn error_report(message: &str, diagnostic: &str) -> Report {
    Report::Error {
        message: message.to_string(),
        diagnostic: escape_backticks(diagnostic),
    }
}

/// Plain-text form of an error report: `<message>:` and the fenced diagnostic.
pub fn error_text(message: &str, escaped_diagnostic: &str) -> String {
    format!("{}:\n{}\n{}\n{}", message, FENCE, escaped_diagnostic, FENCE)
}
