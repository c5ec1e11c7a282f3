//! Core domain logic for Footnote, a personal quotation collection.
//!
//! The crate owns the record store, the browse/search query engine, the
//! change notifier and the live view state. UI layers consume query results
//! and send add/delete intents back in.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod search;
pub mod service;
pub mod view;

pub use config::{bootstrap, CoreConfig, CoreError, CoreResult, StoreLocation};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::quote::{NewQuote, Quote, QuoteId, QuoteValidationError};
pub use notify::notifier::{Change, ChangeEvent, ChangeNotifier, Subscription, SubscriptionId};
pub use repo::quote_repo::{QuoteRepository, RepoError, RepoResult, SqliteQuoteRepository};
pub use search::fold::fold_text;
pub use search::query::{QuoteQuery, SearchFilter};
pub use service::quote_service::{
    IndexFault, QuoteService, QuoteServiceError, QuoteServiceResult, SqliteQuoteService,
};
pub use view::quote_view::{QuoteView, ViewState};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
