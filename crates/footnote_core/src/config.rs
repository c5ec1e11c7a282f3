//! Core configuration and explicit startup.
//!
//! # Responsibility
//! - Describe where the quote store lives and how logging is set up.
//! - Build the shared service with its one change notifier.
//!
//! # Invariants
//! - `bootstrap` creates exactly one `ChangeNotifier` per service; callers
//!   reuse the returned `Arc` rather than bootstrapping twice.
//! - Teardown is dropping the last `Arc` to the service.

use crate::db::{open_db, open_db_in_memory, DbError};
use crate::logging::{default_log_level, init_logging, LoggingError};
use crate::notify::notifier::ChangeNotifier;
use crate::repo::quote_repo::{RepoError, SqliteQuoteRepository};
use crate::service::quote_service::{QuoteService, SqliteQuoteService};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

pub type CoreResult<T> = Result<T, CoreError>;

/// Startup failure.
#[derive(Debug)]
pub enum CoreError {
    Logging(LoggingError),
    Db(DbError),
    Repo(RepoError),
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Logging(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Logging(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<LoggingError> for CoreError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<DbError> for CoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for CoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Location of the quote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    /// Session-only store, discarded on drop.
    Memory,
}

/// Startup configuration for the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub store: StoreLocation,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling logs; `None` leaves logging off.
    pub log_dir: Option<PathBuf>,
}

impl CoreConfig {
    /// File-backed store with build-mode default level and logging off.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            store: StoreLocation::File(db_path.into()),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            store: StoreLocation::Memory,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(log_dir.into());
        self
    }
}

/// Initializes logging (when configured), opens the store and returns the
/// shared service.
pub fn bootstrap(config: &CoreConfig) -> CoreResult<Arc<SqliteQuoteService>> {
    if let Some(log_dir) = config.log_dir.as_deref() {
        init_logging(&config.log_level, log_dir)?;
    }

    let conn = match &config.store {
        StoreLocation::File(path) => open_db(path)?,
        StoreLocation::Memory => open_db_in_memory()?,
    };
    let repo = SqliteQuoteRepository::try_new(conn)?;
    Ok(Arc::new(QuoteService::new(repo, ChangeNotifier::new())))
}

#[cfg(test)]
mod tests {
    use super::{bootstrap, CoreConfig, StoreLocation};
    use crate::logging::default_log_level;
    use crate::model::quote::NewQuote;

    #[test]
    fn new_config_uses_file_store_and_default_level() {
        let config = CoreConfig::new("/tmp/quotes.sqlite3");
        assert!(matches!(config.store, StoreLocation::File(_)));
        assert_eq!(config.log_level, default_log_level());
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn bootstrap_file_store_persists_across_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoreConfig::new(dir.path().join("footnote.sqlite3"));

        let service = bootstrap(&config).unwrap();
        service
            .add_quote(&NewQuote::new("Be here now.", "", "Ram Dass"))
            .unwrap();
        drop(service);

        let reopened = bootstrap(&config).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }

    #[test]
    fn bootstrap_in_memory_starts_empty() {
        let service = bootstrap(&CoreConfig::in_memory()).unwrap();
        assert!(service.list_all().unwrap().is_empty());
    }
}
