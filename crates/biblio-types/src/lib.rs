//! Core types and traits for the Biblio library service.
//!
//! Records mirror the relational schema (books, borrow requests, checkouts, audit log, users).
//! Status fields are only ever changed through a [`ChangeSet`] planned by the lifecycle manager.

mod dto;
mod entity;
mod lifecycle;
mod traits;

pub use dto::*;
pub use entity::*;
pub use lifecycle::*;
pub use traits::*;
