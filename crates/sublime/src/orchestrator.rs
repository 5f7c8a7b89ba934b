//! Request Orchestrator: message in, reports out.
//!
//! Resolves what the author asked for, checks that a code block came with
//! it, runs the matching pipeline operation, and reports the outcome. Every
//! collaborator is injected; nothing here is process-global.

use crate::config::BotConfig;
use crate::message::{InboundMessage, ParsedRequest};
use crate::render;
use crate::report::{Report, Reporter};
use anyhow::Result;
use sublime_intent::{Action, Catalog, Command};
use sublime_sandbox::{Outcome, OutcomeKind, Pipeline, Stage};
use tracing::{error, info, warn};

pub const NOT_UNDERSTOOD: &str = "sorry, I don't understand.";
pub const MISSING_CODE: &str = "no code block found in your message.";
pub const INTERNAL_ERROR: &str = "internal error.";
pub const BUILD_FAILED: &str = "Build failed";
pub const INTERPRETER_CRASHED: &str = "Interpreter crashed";

/// Attachment name for compiled brainfuck.
pub const BUILD_ATTACHMENT: &str = "code.b";
/// Attachment name for program output.
pub const RUN_ATTACHMENT: &str = "output.txt";

const COMMUNITY_URL: &str = "https://discord.gg/m4Wcenn";

/// What happened to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Not addressed to the bot, or written by a bot.
    Ignored,
    /// No command cleared the threshold.
    NotUnderstood,
    /// The command needs code and the message had none.
    MissingPayload { command: String },
    /// The tutorial was sent.
    Tutorial,
    /// A pipeline operation ran and its outcome was reported.
    Completed { command: String, outcome: OutcomeKind },
}

pub struct Orchestrator<P> {
    catalog: Catalog,
    config: BotConfig,
    pipeline: P,
}

impl<P: Pipeline> Orchestrator<P> {
    pub fn new(catalog: Catalog, config: BotConfig, pipeline: P) -> Self {
        Self {
            catalog,
            config,
            pipeline,
        }
    }

    /// Handle one inbound message, reporting through `reporter`.
    ///
    /// Errors are transport failures only; user mistakes and toolchain
    /// failures are reported and returned as a [`Dispatch`].
    pub fn handle(&self, message: &InboundMessage, reporter: &dyn Reporter) -> Result<Dispatch> {
        if !message.is_addressed() {
            return Ok(Dispatch::Ignored);
        }

        let request = ParsedRequest::parse(&message.content);
        let Some(found) = self
            .catalog
            .resolve(&request.command_text, self.config.command_threshold)
        else {
            info!("can't understand the command.");
            reporter.report(Report::Reply(NOT_UNDERSTOOD.to_string()))?;
            return Ok(Dispatch::NotUnderstood);
        };

        let command = found.command;
        info!(
            "Processing the message as '{}'-alike (distance {}).",
            command.display_name(),
            found.distance
        );

        match command.action() {
            Action::Help => {
                reporter.report(Report::Text(self.tutorial()))?;
                Ok(Dispatch::Tutorial)
            }
            Action::Build => self.run_with_payload(message, command, request.payload, reporter, |code| {
                self.pipeline.compile(code)
            }),
            Action::Run => self.run_with_payload(message, command, request.payload, reporter, |code| {
                self.pipeline.execute(code)
            }),
            Action::BuildAndRun => {
                self.run_with_payload(message, command, request.payload, reporter, |code| {
                    self.pipeline.compile_and_execute(code)
                })
            }
        }
    }

    fn run_with_payload<F>(
        &self,
        message: &InboundMessage,
        command: &Command,
        payload: Option<String>,
        reporter: &dyn Reporter,
        operation: F,
    ) -> Result<Dispatch>
    where
        F: FnOnce(&str) -> Outcome,
    {
        let Some(code) = payload else {
            warn!("no code block in {}'s message.", message.author);
            reporter.report(Report::Reply(MISSING_CODE.to_string()))?;
            return Ok(Dispatch::MissingPayload {
                command: command.id().to_string(),
            });
        };

        let outcome = operation(&code);
        let kind = outcome.kind();
        self.report_outcome(command, outcome, reporter)?;

        Ok(Dispatch::Completed {
            command: command.id().to_string(),
            outcome: kind,
        })
    }

    fn report_outcome(&self, command: &Command, outcome: Outcome, reporter: &dyn Reporter) -> Result<()> {
        match outcome {
            Outcome::Success { stdout } => {
                let name = match command.action() {
                    Action::Build => BUILD_ATTACHMENT,
                    _ => RUN_ATTACHMENT,
                };
                reporter.report(render::output_report(
                    &stdout,
                    name,
                    self.config.message_attach_threshold,
                ))
            }
            Outcome::ToolFailure { stage, diagnostic } => {
                let headline = match stage {
                    Stage::Compile => BUILD_FAILED,
                    Stage::Execute => INTERPRETER_CRASHED,
                };
                reporter.report(render::error_report(headline, &diagnostic))
            }
            Outcome::InternalFailure { cause } => {
                error!("Internal failure while running '{}': {}", command.display_name(), cause);
                reporter.report(Report::Reply(INTERNAL_ERROR.to_string()))?;
                reporter.alert_operator(&format!(
                    "internal error while executing a command: {}",
                    cause
                ))
            }
        }
    }

    fn tutorial(&self) -> String {
        format!(
            "**{}**\n\
             {} has a basic, built-in NLP. You can issue commands in plain english. \
             For example, try pinging me and saying `build brainfuck`, providing some asm2bf code.\n\
             {}",
            self.config.bot_name, self.config.bot_name, COMMUNITY_URL
        )
    }
}
