//! Auto-refreshing quote list view.
//!
//! # Responsibility
//! - Subscribe to change events at construction, unsubscribe on drop.
//! - Replace held results on filter change and on every change event.
//! - Route delete-by-position intents against the held results.
//!
//! # Invariants
//! - Subscription happens before the initial fetch, so no commit that
//!   lands while the view is being built is missed.
//! - The view lock is never held while calling a mutation, because the
//!   resulting publish re-enters this view's handler.
//! - The change handler holds only weak references.
//! - Each replacement of the held results bumps `revision`.

use crate::model::quote::Quote;
use crate::notify::notifier::{Subscription, SubscriptionId};
use crate::repo::quote_repo::QuoteRepository;
use crate::search::query::QuoteQuery;
use crate::service::quote_service::{QuoteService, QuoteServiceResult};
use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Renderable state of a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    /// The query succeeded and matched nothing.
    Empty,
    /// Matching quotes, newest first.
    Populated(Vec<Quote>),
    /// The last refresh failed; no partial results are kept.
    Unavailable(String),
}

impl ViewState {
    fn from_results(quotes: Vec<Quote>) -> Self {
        if quotes.is_empty() {
            Self::Empty
        } else {
            Self::Populated(quotes)
        }
    }

    /// Held quotes; empty for `Empty` and `Unavailable`.
    pub fn quotes(&self) -> &[Quote] {
        match self {
            Self::Populated(quotes) => quotes.as_slice(),
            Self::Empty | Self::Unavailable(_) => &[],
        }
    }
}

struct ViewInner {
    filter: String,
    state: ViewState,
    revision: u64,
}

impl ViewInner {
    fn replace(&mut self, state: ViewState) {
        self.state = state;
        self.revision += 1;
    }
}

/// One live query over the quote store.
///
/// Any number of views can be open on the same service; each keeps its own
/// filter and results.
pub struct QuoteView<R: QuoteRepository + 'static> {
    service: Arc<QuoteService<R>>,
    inner: Arc<Mutex<ViewInner>>,
    subscription: Subscription,
}

impl<R: QuoteRepository + 'static> QuoteView<R> {
    /// Opens a view with an initial filter (empty for browse mode).
    ///
    /// # Errors
    /// - `StorageUnavailable` when the initial fetch fails. The view is not
    ///   created in that case.
    pub fn open(
        service: Arc<QuoteService<R>>,
        filter: impl Into<String>,
    ) -> QuoteServiceResult<Self> {
        let inner = Arc::new(Mutex::new(ViewInner {
            filter: filter.into(),
            state: ViewState::Empty,
            revision: 0,
        }));

        let weak_service: Weak<QuoteService<R>> = Arc::downgrade(&service);
        let weak_inner = Arc::downgrade(&inner);
        let subscription = service.notifier().subscribe(move |event| {
            let (Some(service), Some(inner)) = (weak_service.upgrade(), weak_inner.upgrade())
            else {
                return;
            };
            debug!(
                "event=view_refresh module=view status=start trigger=change sequence={}",
                event.sequence
            );
            let mut guard = lock_inner(&inner);
            if let Err(err) = refresh_locked(&service, &mut guard) {
                warn!(
                    "event=view_refresh module=view status=error trigger=change sequence={} error={err}",
                    event.sequence
                );
            }
        });

        {
            let mut guard = lock_inner(&inner);
            let query = QuoteQuery::from_filter(&guard.filter);
            let quotes = service.query(&query)?;
            guard.replace(ViewState::from_results(quotes));
        }

        Ok(Self {
            service,
            inner,
            subscription,
        })
    }

    /// Replaces the filter and re-runs the matching query shape.
    ///
    /// On error the view moves to `Unavailable` and the error is returned.
    pub fn set_filter(&self, filter: impl Into<String>) -> QuoteServiceResult<()> {
        let mut guard = lock_inner(&self.inner);
        guard.filter = filter.into();
        refresh_locked(&self.service, &mut guard)
    }

    /// Re-runs the active query shape.
    pub fn refresh(&self) -> QuoteServiceResult<()> {
        let mut guard = lock_inner(&self.inner);
        refresh_locked(&self.service, &mut guard)
    }

    /// Deletes quotes at positions of the currently held results.
    pub fn delete_at<I>(&self, indices: I) -> QuoteServiceResult<usize>
    where
        I: IntoIterator<Item = usize>,
    {
        let held = self.quotes();
        self.service.delete_at(indices, &held)
    }

    pub fn filter(&self) -> String {
        lock_inner(&self.inner).filter.clone()
    }

    pub fn state(&self) -> ViewState {
        lock_inner(&self.inner).state.clone()
    }

    /// Snapshot of the held results.
    pub fn quotes(&self) -> Vec<Quote> {
        lock_inner(&self.inner).state.quotes().to_vec()
    }

    pub fn is_empty(&self) -> bool {
        matches!(lock_inner(&self.inner).state, ViewState::Empty)
    }

    /// Counter bumped on every replacement of the held results.
    pub fn revision(&self) -> u64 {
        lock_inner(&self.inner).revision
    }

    /// Whether a search filter is active (otherwise browse mode).
    pub fn is_searching(&self) -> bool {
        QuoteQuery::from_filter(&lock_inner(&self.inner).filter).is_filtered()
    }

    /// Notifier registration backing this view's auto-refresh.
    pub fn subscription_id(&self) -> SubscriptionId {
        self.subscription.id()
    }
}

fn refresh_locked<R: QuoteRepository>(
    service: &QuoteService<R>,
    inner: &mut ViewInner,
) -> QuoteServiceResult<()> {
    let query = QuoteQuery::from_filter(&inner.filter);
    match service.query(&query) {
        Ok(quotes) => {
            inner.replace(ViewState::from_results(quotes));
            debug!(
                "event=view_refresh module=view status=ok shape={} revision={}",
                query.shape(),
                inner.revision
            );
            Ok(())
        }
        Err(err) => {
            inner.replace(ViewState::Unavailable(err.to_string()));
            Err(err)
        }
    }
}

fn lock_inner(inner: &Mutex<ViewInner>) -> MutexGuard<'_, ViewInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}
