//! Domain model for the quote collection.
//!
//! # Invariants
//! - Every quote is identified by a stable `QuoteId`.
//! - Deletion is a hard delete; there are no tombstones.

pub mod quote;
