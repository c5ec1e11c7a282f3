//! Quote domain model.
//!
//! # Responsibility
//! - Define the committed `Quote` record and the `NewQuote` draft.
//! - Validate drafts before they reach persistence.
//!
//! # Invariants
//! - `id` is stable and never reused for another quote.
//! - `date_created` is assigned once at insertion and never mutated.
//! - Text fields are plain strings; storage NULLs are normalized to `""`
//!   when rows are read, never later.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a quote, used for equality and list diffing.
pub type QuoteId = Uuid;

/// A committed quotation record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    /// Quotation body.
    pub text: String,
    /// Source title (book, speech, ...).
    pub title: String,
    /// Attribution.
    pub author: String,
    /// Unix epoch milliseconds. Default sort key, newest first.
    pub date_created: i64,
}

impl Quote {
    /// Builds a quote with a caller-provided identity and timestamp.
    ///
    /// Used by import/restore paths where identity already exists.
    pub fn with_id(
        id: QuoteId,
        text: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        date_created: i64,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            title: title.into(),
            author: author.into(),
            date_created,
        }
    }
}

/// Draft emitted by the add flow, before identity and timestamp exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuote {
    pub text: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
}

impl NewQuote {
    pub fn new(
        text: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            text: Some(text.into()),
            title: Some(title.into()),
            author: Some(author.into()),
        }
    }

    /// Validates draft invariants before persistence.
    ///
    /// # Errors
    /// - `QuoteValidationError::Empty` when every field is missing or blank.
    pub fn validate(&self) -> Result<(), QuoteValidationError> {
        let has_content = [&self.text, &self.title, &self.author]
            .into_iter()
            .flatten()
            .any(|value| !value.trim().is_empty());

        if !has_content {
            return Err(QuoteValidationError::Empty);
        }

        Ok(())
    }
}

/// Validation errors for quote drafts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteValidationError {
    /// `text`, `title` and `author` are all missing or blank.
    Empty,
}

impl Display for QuoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "quote must have text, title or author"),
        }
    }
}

impl Error for QuoteValidationError {}
