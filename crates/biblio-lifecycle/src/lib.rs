//! Borrow lifecycle: the only state machine in the system.
//!
//! `AVAILABLE -> REQUESTED -> CHECKED_OUT -> AVAILABLE`, with denial reverting a REQUESTED
//! book to AVAILABLE once no pending request remains. Each operation reads its records,
//! plans a [`biblio_types::ChangeSet`] in [`transition`], and commits it atomically.

mod catalog;
mod clock;
mod manager;
mod reports;
pub mod transition;
mod views;

pub use biblio_types::LifecycleError;
pub use clock::{Clock, FixedClock, SystemClock};
pub use manager::{LibraryManager, Resolution, DEFAULT_DUE_DAYS};
