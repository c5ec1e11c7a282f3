//! Live view state for presentation collaborators.
//!
//! # Responsibility
//! - Hold one filter and its most recent result sequence.
//! - Re-run the active query shape whenever a change event arrives.

pub mod quote_view;
