//! Quote repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Insert, restore, fetch, list and batch-delete quotes.
//! - Evaluate browse and filtered query shapes inside SQLite.
//!
//! # Invariants
//! - Write paths validate drafts before SQL mutations.
//! - `date_created` assigned by `insert_quote` never goes backwards.
//! - `delete_quotes` removes every requested id or none of them.
//! - Read paths normalize NULL text fields to `""` exactly here.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::quote::{NewQuote, Quote, QuoteId, QuoteValidationError};
use crate::search::fold::register_fold_function;
use crate::search::query::QuoteQuery;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, TransactionBehavior};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const QUOTE_SELECT_SQL: &str = "SELECT
    uuid,
    text,
    title,
    author,
    date_created
FROM quotes";

const QUOTE_MATCH_SQL: &str = " WHERE instr(quote_fold(text), ?1) > 0
    OR instr(quote_fold(title), ?1) > 0
    OR instr(quote_fold(author), ?1) > 0";

const QUOTE_ORDER_SQL: &str = " ORDER BY date_created DESC, seq DESC";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for quote persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(QuoteValidationError),
    Db(DbError),
    NotFound(QuoteId),
    DuplicateId(QuoteId),
    InvalidData(String),
    MissingRequiredTable(&'static str),
    SchemaNotMigrated { db_version: u32, expected: u32 },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "quote not found: {id}"),
            Self::DuplicateId(id) => write!(f, "quote already exists: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted quote data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::SchemaNotMigrated {
                db_version,
                expected,
            } => write!(
                f,
                "quote store schema version {db_version} has not been migrated to {expected}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<QuoteValidationError> for RepoError {
    fn from(value: QuoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Record store contract for quotes.
pub trait QuoteRepository: Send {
    /// Persists a draft, assigning identity and creation time.
    fn insert_quote(&mut self, draft: &NewQuote) -> RepoResult<Quote>;
    /// Persists a quote with caller-provided identity and creation time.
    fn restore_quote(&mut self, quote: &Quote) -> RepoResult<()>;
    fn get_quote(&self, id: QuoteId) -> RepoResult<Option<Quote>>;
    /// Executes a query shape, newest first.
    fn list_quotes(&self, query: &QuoteQuery) -> RepoResult<Vec<Quote>>;
    fn count_quotes(&self) -> RepoResult<u64>;
    /// Deletes all ids in one transaction. Returns the number removed.
    fn delete_quotes(&mut self, ids: &[QuoteId]) -> RepoResult<usize>;
}

/// SQLite-backed quote repository owning its connection.
pub struct SqliteQuoteRepository {
    conn: Connection,
}

impl SqliteQuoteRepository {
    /// Constructs a repository from a migrated connection.
    ///
    /// # Errors
    /// - `RepoError::Db(UnsupportedSchemaVersion)` when the schema is newer
    ///   than this binary supports.
    /// - `RepoError::SchemaNotMigrated` when migrations were not applied.
    /// - `RepoError::MissingRequiredTable` when `quotes` is absent.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        ensure_connection_ready(&conn)?;
        Ok(Self { conn })
    }

    /// Borrows the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl QuoteRepository for SqliteQuoteRepository {
    fn insert_quote(&mut self, draft: &NewQuote) -> RepoResult<Quote> {
        draft.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let newest: Option<i64> =
            tx.query_row("SELECT MAX(date_created) FROM quotes;", [], |row| row.get(0))?;
        let now = now_epoch_ms();
        let date_created = newest.map_or(now, |newest| newest.max(now));
        let id = Uuid::new_v4();

        tx.execute(
            "INSERT INTO quotes (uuid, text, title, author, date_created)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                id.to_string(),
                draft.text.as_deref(),
                draft.title.as_deref(),
                draft.author.as_deref(),
                date_created,
            ],
        )?;
        tx.commit()?;

        Ok(Quote {
            id,
            text: draft.text.clone().unwrap_or_default(),
            title: draft.title.clone().unwrap_or_default(),
            author: draft.author.clone().unwrap_or_default(),
            date_created,
        })
    }

    fn restore_quote(&mut self, quote: &Quote) -> RepoResult<()> {
        let id_text = quote.id.to_string();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM quotes WHERE uuid = ?1);",
            [id_text.as_str()],
            |row| row.get(0),
        )?;
        if exists == 1 {
            return Err(RepoError::DuplicateId(quote.id));
        }

        tx.execute(
            "INSERT INTO quotes (uuid, text, title, author, date_created)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                id_text,
                quote.text.as_str(),
                quote.title.as_str(),
                quote.author.as_str(),
                quote.date_created,
            ],
        )?;
        tx.commit()?;

        Ok(())
    }

    fn get_quote(&self, id: QuoteId) -> RepoResult<Option<Quote>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{QUOTE_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_quote_row(row)?));
        }

        Ok(None)
    }

    fn list_quotes(&self, query: &QuoteQuery) -> RepoResult<Vec<Quote>> {
        let mut sql = String::from(QUOTE_SELECT_SQL);
        let mut bind_values: Vec<Value> = Vec::new();

        if let QuoteQuery::Matching(filter) = query {
            sql.push_str(QUOTE_MATCH_SQL);
            bind_values.push(Value::Text(filter.folded().to_string()));
        }
        sql.push_str(QUOTE_ORDER_SQL);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut quotes = Vec::new();
        while let Some(row) = rows.next()? {
            quotes.push(parse_quote_row(row)?);
        }

        Ok(quotes)
    }

    fn count_quotes(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM quotes;", [], |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative quote count `{count}`")))
    }

    fn delete_quotes(&mut self, ids: &[QuoteId]) -> RepoResult<usize> {
        let mut seen = BTreeSet::new();
        let unique = ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect::<Vec<_>>();
        if unique.is_empty() {
            return Ok(0);
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        for id in &unique {
            let changed = tx.execute("DELETE FROM quotes WHERE uuid = ?1;", [id.to_string()])?;
            if changed == 0 {
                // Dropping `tx` rolls back the rows already deleted.
                return Err(RepoError::NotFound(*id));
            }
        }
        tx.commit()?;

        Ok(unique.len())
    }
}

fn parse_quote_row(row: &Row<'_>) -> RepoResult<Quote> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in quotes.uuid"))
    })?;

    Ok(Quote {
        id,
        text: row.get::<_, Option<String>>("text")?.unwrap_or_default(),
        title: row.get::<_, Option<String>>("title")?.unwrap_or_default(),
        author: row.get::<_, Option<String>>("author")?.unwrap_or_default(),
        date_created: row.get("date_created")?,
    })
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let db_version = current_user_version(conn)?;
    let latest_supported = latest_version();
    if db_version > latest_supported {
        return Err(RepoError::Db(DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        }));
    }
    if db_version < latest_supported {
        return Err(RepoError::SchemaNotMigrated {
            db_version,
            expected: latest_supported,
        });
    }

    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = 'quotes'
        );",
        [],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(RepoError::MissingRequiredTable("quotes"));
    }

    register_fold_function(conn)?;
    Ok(())
}
