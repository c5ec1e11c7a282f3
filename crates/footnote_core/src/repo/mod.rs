//! Repository layer: the record store boundary.
//!
//! # Responsibility
//! - Define the persistence contract the query engine and mutations use.
//! - Keep SQLite details out of service and view orchestration.
//!
//! # Invariants
//! - Multi-row writes are transactional: all rows commit or none do.
//! - Repository APIs return semantic errors (`NotFound`, `DuplicateId`) in
//!   addition to DB transport errors.

pub mod quote_repo;
