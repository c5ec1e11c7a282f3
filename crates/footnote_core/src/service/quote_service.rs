//! Quote query engine and mutation use-cases.
//!
//! # Responsibility
//! - Expose `list_all`/`search` over the current committed store state.
//! - Resolve delete positions against the caller's held result sequence.
//! - Publish change events after successful commits.
//!
//! # Invariants
//! - Queries are never cached; every call reads the store.
//! - Writes are serialized by the repository lock.
//! - `publish` runs after the repository lock is released, so handlers may
//!   query or mutate re-entrantly.
//! - A failed mutation publishes nothing and leaves the store unchanged.
//! - A delete batch with any invalid or stale index deletes nothing.

use crate::model::quote::{NewQuote, Quote, QuoteId, QuoteValidationError};
use crate::notify::notifier::{Change, ChangeNotifier};
use crate::repo::quote_repo::{QuoteRepository, RepoError, SqliteQuoteRepository};
use crate::search::query::QuoteQuery;
use log::{debug, error, info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

pub type QuoteServiceResult<T> = Result<T, QuoteServiceError>;

/// Quote service backed by the SQLite repository.
pub type SqliteQuoteService = QuoteService<SqliteQuoteRepository>;

/// Why a delete position could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFault {
    /// Position is past the end of the held sequence.
    OutOfRange { held_len: usize },
    /// Position resolved to a quote the store no longer contains.
    Stale(QuoteId),
}

/// Service error surfaced to view and UI callers.
#[derive(Debug)]
pub enum QuoteServiceError {
    /// Store could not be opened or read. No partial results exist.
    StorageUnavailable(RepoError),
    /// Insert/delete commit failed and was rolled back.
    TransactionFailed(RepoError),
    /// Delete referenced a position that is not valid for the held results.
    InvalidIndex { index: usize, fault: IndexFault },
    /// Draft rejected before reaching the store.
    Validation(QuoteValidationError),
}

impl Display for QuoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StorageUnavailable(err) => write!(f, "quote store unavailable: {err}"),
            Self::TransactionFailed(err) => write!(f, "quote transaction failed: {err}"),
            Self::InvalidIndex {
                index,
                fault: IndexFault::OutOfRange { held_len },
            } => write!(
                f,
                "invalid index {index}: held results contain {held_len} quotes"
            ),
            Self::InvalidIndex {
                index,
                fault: IndexFault::Stale(id),
            } => write!(f, "invalid index {index}: quote {id} no longer exists"),
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QuoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageUnavailable(err) | Self::TransactionFailed(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::InvalidIndex { .. } => None,
        }
    }
}

fn write_error(err: RepoError) -> QuoteServiceError {
    match err {
        RepoError::Validation(err) => QuoteServiceError::Validation(err),
        other => QuoteServiceError::TransactionFailed(other),
    }
}

/// Query engine plus mutation entry points over one record store.
///
/// Share it as `Arc<QuoteService<_>>`; views hold weak references.
pub struct QuoteService<R: QuoteRepository> {
    repo: Mutex<R>,
    notifier: ChangeNotifier,
}

impl<R: QuoteRepository> QuoteService<R> {
    pub fn new(repo: R, notifier: ChangeNotifier) -> Self {
        Self {
            repo: Mutex::new(repo),
            notifier,
        }
    }

    /// Notifier receiving one event per committed mutation.
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Every quote, newest first.
    pub fn list_all(&self) -> QuoteServiceResult<Vec<Quote>> {
        self.query(&QuoteQuery::All)
    }

    /// Quotes whose text, title or author contains `filter`, ignoring case
    /// and diacritics. An empty filter returns the same as [`Self::list_all`].
    pub fn search(&self, filter: &str) -> QuoteServiceResult<Vec<Quote>> {
        self.query(&QuoteQuery::from_filter(filter))
    }

    /// Executes a query shape against the current committed state.
    pub fn query(&self, query: &QuoteQuery) -> QuoteServiceResult<Vec<Quote>> {
        let started_at = Instant::now();
        let result = self.lock_repo().list_quotes(query);

        match result {
            Ok(quotes) => {
                debug!(
                    "event=quote_query module=service status=ok shape={} count={} duration_ms={}",
                    query.shape(),
                    quotes.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(quotes)
            }
            Err(err) => {
                error!(
                    "event=quote_query module=service status=error shape={} duration_ms={} error_code=storage_unavailable error={}",
                    query.shape(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(QuoteServiceError::StorageUnavailable(err))
            }
        }
    }

    pub fn get(&self, id: QuoteId) -> QuoteServiceResult<Option<Quote>> {
        self.lock_repo()
            .get_quote(id)
            .map_err(QuoteServiceError::StorageUnavailable)
    }

    pub fn count(&self) -> QuoteServiceResult<u64> {
        self.lock_repo()
            .count_quotes()
            .map_err(QuoteServiceError::StorageUnavailable)
    }

    /// Commits a draft from the add flow and notifies subscribers.
    pub fn add_quote(&self, draft: &NewQuote) -> QuoteServiceResult<Quote> {
        draft.validate().map_err(QuoteServiceError::Validation)?;

        let result = self.lock_repo().insert_quote(draft);
        let quote = result.map_err(|err| {
            error!(
                "event=quote_insert module=service status=error error_code=transaction_failed error={err}"
            );
            write_error(err)
        })?;

        info!(
            "event=quote_insert module=service status=ok quote_id={}",
            quote.id
        );
        self.notifier.publish(Change::Inserted(quote.id));
        Ok(quote)
    }

    /// Re-inserts a quote keeping its identity and creation time.
    pub fn restore_quote(&self, quote: &Quote) -> QuoteServiceResult<()> {
        let result = self.lock_repo().restore_quote(quote);
        result.map_err(|err| {
            error!(
                "event=quote_insert module=service status=error mode=restore quote_id={} error={err}",
                quote.id
            );
            write_error(err)
        })?;

        info!(
            "event=quote_insert module=service status=ok mode=restore quote_id={}",
            quote.id
        );
        self.notifier.publish(Change::Inserted(quote.id));
        Ok(())
    }

    /// Deletes the quotes at `indices` of the sequence the caller holds.
    ///
    /// Positions resolve against `within`, not a re-fetched list. All
    /// deletions commit in one transaction and one change event is
    /// published for the batch. Duplicate indices count once.
    ///
    /// # Errors
    /// - `InvalidIndex` with `OutOfRange` for a position past `within`.
    /// - `InvalidIndex` with `Stale` when a resolved quote was already
    ///   deleted elsewhere. The whole batch is rejected.
    /// - `TransactionFailed` when the commit fails; nothing is deleted.
    pub fn delete_at<I>(&self, indices: I, within: &[Quote]) -> QuoteServiceResult<usize>
    where
        I: IntoIterator<Item = usize>,
    {
        let positions = indices.into_iter().collect::<BTreeSet<_>>();
        let mut targets = Vec::with_capacity(positions.len());
        for index in positions {
            let quote = within.get(index).ok_or_else(|| {
                warn!(
                    "event=quote_delete module=service status=error error_code=invalid_index index={index} held_len={}",
                    within.len()
                );
                QuoteServiceError::InvalidIndex {
                    index,
                    fault: IndexFault::OutOfRange {
                        held_len: within.len(),
                    },
                }
            })?;
            targets.push((index, quote.id));
        }

        let ids = targets.iter().map(|(_, id)| *id).collect::<Vec<_>>();
        match self.commit_delete(&ids) {
            Err(QuoteServiceError::TransactionFailed(RepoError::NotFound(missing))) => {
                let index = targets
                    .iter()
                    .find(|(_, id)| *id == missing)
                    .map_or(0, |(index, _)| *index);
                Err(QuoteServiceError::InvalidIndex {
                    index,
                    fault: IndexFault::Stale(missing),
                })
            }
            other => other,
        }
    }

    /// Deletes quotes by id in one transaction.
    ///
    /// Missing ids fail the whole batch with `TransactionFailed(NotFound)`.
    pub fn delete_quotes(&self, ids: &[QuoteId]) -> QuoteServiceResult<usize> {
        self.commit_delete(ids)
    }

    fn commit_delete(&self, ids: &[QuoteId]) -> QuoteServiceResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let started_at = Instant::now();
        let result = self.lock_repo().delete_quotes(ids);
        let deleted = result.map_err(|err| {
            error!(
                "event=quote_delete module=service status=error requested={} duration_ms={} error_code=transaction_failed error={err}",
                ids.len(),
                started_at.elapsed().as_millis()
            );
            QuoteServiceError::TransactionFailed(err)
        })?;

        info!(
            "event=quote_delete module=service status=ok deleted={deleted} duration_ms={}",
            started_at.elapsed().as_millis()
        );

        let mut seen = BTreeSet::new();
        let unique = ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect::<Vec<_>>();
        self.notifier.publish(Change::Deleted(unique));
        Ok(deleted)
    }

    fn lock_repo(&self) -> MutexGuard<'_, R> {
        // Repository transactions roll back on unwind, so the store behind a
        // poisoned lock is still consistent.
        self.repo.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
