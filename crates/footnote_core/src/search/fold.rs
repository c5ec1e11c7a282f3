//! Case and diacritic folding.
//!
//! # Invariants
//! - `fold_text` is the only comparison basis for search matching.
//! - The SQL function `quote_fold` evaluates exactly `fold_text`, with
//!   NULL mapped to the empty string.

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use caseless::default_case_fold_str;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Name of the SQL scalar function installed by [`register_fold_function`].
pub const FOLD_FUNCTION_NAME: &str = "quote_fold";

/// Folds text for case- and diacritic-insensitive comparison.
///
/// The value is decomposed (NFD), stripped of combining marks, then given
/// full Unicode case folding, so `"Café"` and `"CAFE"` both fold to
/// `"cafe"`, `"Straße"` folds to `"strasse"` and final sigma matches `σ`.
pub fn fold_text(value: &str) -> String {
    let stripped = strip_marks(value);
    // Folding can emit precomposed or marked characters (`İ` -> `i̇`).
    strip_marks(&default_case_fold_str(&stripped))
}

fn strip_marks(value: &str) -> String {
    value.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Registers `quote_fold(x)` on the connection.
///
/// Registration is per-connection and replaces any previous definition.
pub fn register_fold_function(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        FOLD_FUNCTION_NAME,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value = ctx.get::<Option<String>>(0)?;
            Ok(value.as_deref().map(fold_text).unwrap_or_default())
        },
    )
}
