//! fork::renamer
//!
//! Whole-word identifier replacement over strings and documents.

use std::borrow::Cow;

use regex::{NoExpand, Regex};

use crate::core::document::Document;
use crate::core::types::SolutionName;

use super::ForkError;

/// Replaces whole-word occurrences of a solution identifier.
///
/// Matching uses `\b<identifier>\b` (boundaries only on word-character
/// edges), so `acme` matches in `acme:entity`
/// and `x-acme-y` but not in `acmeplus`.
#[derive(Debug, Clone)]
pub struct Renamer {
    old: SolutionName,
    new: SolutionName,
    pattern: Regex,
}

impl Renamer {
    /// Build a renamer from the current name and the new identifier.
    ///
    /// The new name keeps the pseudo-isolation suffix of `old`.
    ///
    /// # Errors
    ///
    /// `ForkError::InvalidSolutionName` if `new_identifier` is empty,
    /// malformed or carries its own suffix.
    pub fn new(old: &SolutionName, new_identifier: &str) -> Result<Self, ForkError> {
        let new = old
            .with_identifier(new_identifier)
            .map_err(|e| ForkError::InvalidSolutionName {
                name: new_identifier.to_string(),
                reason: e.to_string(),
            })?;
        let pattern = Regex::new(&word_pattern(old.identifier())).map_err(
            |e| ForkError::InvalidSolutionName {
                name: old.as_str().to_string(),
                reason: e.to_string(),
            },
        )?;
        Ok(Self {
            old: old.clone(),
            new,
            pattern,
        })
    }

    pub fn old_name(&self) -> &SolutionName {
        &self.old
    }

    pub fn new_name(&self) -> &SolutionName {
        &self.new
    }

    /// True if `text` contains the old identifier as a whole word.
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Replace every whole-word occurrence in `text`, returning the result
    /// and the number of replacements.
    pub fn rename_str<'t>(&self, text: &'t str) -> (Cow<'t, str>, usize) {
        let count = self.pattern.find_iter(text).count();
        if count == 0 {
            return (Cow::Borrowed(text), 0);
        }
        (
            self.pattern
                .replace_all(text, NoExpand(self.new.identifier())),
            count,
        )
    }

    /// Rewrite string scalars in `doc`. Mapping keys are never touched.
    pub fn rename_document(&self, doc: &mut Document) -> usize {
        match doc {
            Document::String(s) => {
                let (renamed, count) = self.rename_str(s);
                if count > 0 {
                    *s = renamed.into_owned();
                }
                count
            }
            Document::Mapping(map) => map.values_mut().map(|v| self.rename_document(v)).sum(),
            Document::Sequence(items) => items.iter_mut().map(|v| self.rename_document(v)).sum(),
            Document::Null | Document::Bool(_) | Document::Number(_) => 0,
        }
    }

    /// New file name for a namespace file named `<old identifier>.<ext>`.
    pub fn rename_namespace_file(&self, file_name: &str) -> Option<String> {
        let ext = file_name
            .strip_prefix(self.old.identifier())?
            .strip_prefix('.')?;
        if ext.is_empty() {
            return None;
        }
        Some(format!("{}.{}", self.new.identifier(), ext))
    }
}

/// `\b` only holds next to a word character, so a boundary is required
/// only on the edges of `identifier` that are word characters.
fn word_pattern(identifier: &str) -> String {
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let start = if is_word(identifier.chars().next()) { r"\b" } else { "" };
    let end = if is_word(identifier.chars().last()) { r"\b" } else { "" };
    format!("{start}{}{end}", regex::escape(identifier))
}
