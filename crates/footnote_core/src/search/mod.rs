//! Quote search entry points.
//!
//! # Responsibility
//! - Define the two query shapes (browse and filtered).
//! - Provide case/diacritic folding shared by Rust and SQL predicates.

pub mod fold;
pub mod query;
