//! Sublime: a conversational front-end for the asm2bf toolchain.
//!
//! Free-text messages are matched against a small command catalog, and the
//! code block they carry is compiled and/or run in the sandbox.

pub mod config;
pub mod console;
pub mod message;
pub mod orchestrator;
pub mod render;
pub mod report;

pub use config::{BotConfig, ConfigError, ToolchainSection};
pub use message::{InboundMessage, ParsedRequest};
pub use orchestrator::{Dispatch, Orchestrator};
pub use report::{Report, Reporter};
