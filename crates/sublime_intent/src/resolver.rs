//! Alias matching by edit distance.

use crate::catalog::{Catalog, Command};

/// A command that cleared the threshold, with its best alias distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentMatch<'a> {
    pub command: &'a Command,
    pub distance: usize,
}

/// Levenshtein distance over Unicode scalar values.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, a_ch) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, b_ch) in b_chars.iter().enumerate() {
            let cost = usize::from(a_ch != b_ch);
            curr[j + 1] = (curr[j] + 1).min(prev[j + 1] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Score of a single command: the distance of its closest alias.
pub fn command_score(command: &Command, text: &str) -> Option<usize> {
    command
        .aliases()
        .iter()
        .map(|alias| levenshtein_distance(alias, text))
        .min()
}

/// Find the command whose closest alias is nearest to `text`.
///
/// Equal scores go to the command listed first. A best score above
/// `threshold` means nothing was recognised.
pub fn resolve<'a>(catalog: &'a Catalog, text: &str, threshold: usize) -> Option<IntentMatch<'a>> {
    let mut best: Option<IntentMatch<'a>> = None;

    for command in catalog.commands() {
        let Some(distance) = command_score(command, text) else {
            continue;
        };
        // Strict comparison keeps the earliest command on ties.
        if best.map_or(true, |current| distance < current.distance) {
            best = Some(IntentMatch { command, distance });
        }
    }

    best.filter(|found| found.distance <= threshold)
}

impl Catalog {
    pub fn resolve(&self, text: &str, threshold: usize) -> Option<IntentMatch<'_>> {
        resolve(self, text, threshold)
    }
}
