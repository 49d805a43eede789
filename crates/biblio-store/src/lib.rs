//! LibraryStore implementations: in-memory (default) and SQLite (feature `sqlite`).

mod memory;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(test)]
mod fixtures;

pub use biblio_types::{ChangeSet, LibraryStore, StoreError, Write};
pub use memory::InMemoryLibraryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLibraryStore;
