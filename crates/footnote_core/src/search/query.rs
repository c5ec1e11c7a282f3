//! Query shapes for the quote collection.
//!
//! # Responsibility
//! - Route user filter text to the browse or filtered query shape.
//! - Own the OR-across-fields predicate used by filtered queries.
//!
//! # Invariants
//! - An empty filter is "no search active" and maps to `QuoteQuery::All`,
//!   never to an empty-substring match.
//! - Both shapes share one ordering: `date_created DESC`, then insertion
//!   sequence descending.
//! - No pagination. The collection is personal-scale and every query
//!   materializes the full matching set.

use crate::model::quote::Quote;
use crate::search::fold::fold_text;

/// Active search text with its folded comparison form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    raw: String,
    folded: String,
}

impl SearchFilter {
    /// Builds a filter, or `None` when the text folds to nothing.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let folded = fold_text(&raw);
        if folded.is_empty() {
            return None;
        }
        Some(Self { raw, folded })
    }

    /// Filter text as typed by the user.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Folded filter text bound into the SQL predicate.
    pub fn folded(&self) -> &str {
        &self.folded
    }

    /// Evaluates the filtered-query predicate in process.
    ///
    /// Mirrors the SQL predicate: a quote matches when any of `text`,
    /// `title` or `author` contains the folded filter.
    pub fn matches(&self, quote: &Quote) -> bool {
        [&quote.text, &quote.title, &quote.author]
            .into_iter()
            .any(|field| fold_text(field).contains(&self.folded))
    }
}

/// Query shape executed against the quote store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum QuoteQuery {
    /// Every live quote, newest first.
    #[default]
    All,
    /// Quotes where at least one text field contains the filter.
    Matching(SearchFilter),
}

impl QuoteQuery {
    /// Routes filter text to a query shape.
    pub fn from_filter(filter: &str) -> Self {
        match SearchFilter::new(filter) {
            Some(filter) => Self::Matching(filter),
            None => Self::All,
        }
    }

    /// Returns whether a search filter is active.
    pub fn is_filtered(&self) -> bool {
        matches!(self, Self::Matching(_))
    }

    /// Short label for log lines.
    pub(crate) fn shape(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Matching(_) => "matching",
        }
    }
}
