//! Change notification for committed quote mutations.
//!
//! # Responsibility
//! - Broadcast one event per committed insert or delete batch.
//! - Decouple mutation producers from the views that must re-query.
//!
//! # Invariants
//! - Events are published only after the store commit returned.
//! - No notifier lock is held while handlers run.

pub mod notifier;
