//! Intent resolution for Sublime.
//!
//! Maps free text onto a fixed catalog of commands by Levenshtein distance
//! against each command's aliases.

pub mod catalog;
pub mod resolver;

pub use catalog::{Action, Catalog, CatalogError, Command};
pub use resolver::{command_score, levenshtein_distance, resolve, IntentMatch};
