//! Core use-case services.
//!
//! # Responsibility
//! - Run browse/search queries against the record store.
//! - Execute mutations and publish exactly one change event per commit.
//! - Keep view and UI layers decoupled from storage details.

pub mod quote_service;
