//! Local transport: prints reports to stdout and saves attachments to disk.

use crate::render;
use crate::report::{Report, Reporter};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::error;

/// Reporter for one message handled from the command line.
///
/// Attachments are written to `attach_dir` as `<label>-<name>` so that
/// concurrently handled messages never overwrite each other's files.
pub struct ConsoleReporter<W> {
    label: String,
    author: String,
    attach_dir: PathBuf,
    out: Arc<Mutex<W>>,
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(
        label: impl Into<String>,
        author: impl Into<String>,
        attach_dir: impl Into<PathBuf>,
        out: Arc<Mutex<W>>,
    ) -> Self {
        Self {
            label: label.into(),
            author: author.into(),
            attach_dir: attach_dir.into(),
            out,
        }
    }

    fn emit(&self, text: &str) -> Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("console writer lock poisoned"))?;
        writeln!(out, "[{}] {}", self.label, text).context("Failed to write report")?;
        out.flush().context("Failed to flush report")
    }
}

impl<W: Write + Send> Reporter for ConsoleReporter<W> {
    fn report(&self, report: Report) -> Result<()> {
        match report {
            Report::Text(text) => self.emit(&text),
            Report::Reply(text) => self.emit(&format!("@{}, {}", self.author, text)),
            Report::Error {
                message,
                diagnostic,
            } => self.emit(&format!(
                "@{}, {}",
                self.author,
                render::error_text(&message, &diagnostic)
            )),
            Report::Attachment { name, bytes } => {
                let path = self.attach_dir.join(format!("{}-{}", self.label, name));
                std::fs::write(&path, &bytes)
                    .with_context(|| format!("Failed to write attachment {}", path.display()))?;
                self.emit(&format!(
                    "[attachment {} ({} bytes) saved to {}]",
                    name,
                    bytes.len(),
                    path.display()
                ))
            }
        }
    }

    fn alert_operator(&self, text: &str) -> Result<()> {
        error!(target: "sublime::operator", "[{}] {}", self.label, text);
        Ok(())
    }
}
