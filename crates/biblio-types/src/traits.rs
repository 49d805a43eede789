//! Store trait, atomic change sets, and error types.

use crate::{
    AuditEntry, AuditListOptions, Book, BookPage, BookQuery, BookStatus, BorrowRequest, Checkout,
    CheckoutFilter, RequestFilter, User,
};
use async_trait::async_trait;

/// One versioned write inside a [`ChangeSet`].
///
/// `Update*` and `Delete*` carry the version the caller read; the store rejects the whole
/// change set with [`StoreError::Conflict`] when the stored version differs, and stores the
/// record with `version + 1` otherwise. `Insert*` fails with a conflict if the id exists.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    InsertBook(Book),
    UpdateBook(Book),
    DeleteBook { id: String, version: u64 },
    InsertRequest(BorrowRequest),
    UpdateRequest(BorrowRequest),
    InsertCheckout(Checkout),
    UpdateCheckout(Checkout),
    UpdateUser(User),
}

/// A compound state change and its audit entry, committed all-or-nothing.
///
/// Exactly one audit entry per change set; there is no way to commit a transition without one.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet {
    pub writes: Vec<Write>,
    pub audit: AuditEntry,
}

impl ChangeSet {
    pub fn new(audit: AuditEntry) -> Self {
        Self {
            writes: Vec::new(),
            audit,
        }
    }

    pub fn with(mut self, write: Write) -> Self {
        self.writes.push(write);
        self
    }
}

/// Persistence collaborator: reads plus one atomic commit.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    async fn get_book(&self, id: &str) -> Result<Option<Book>, StoreError>;

    /// Filtered, paginated catalog, newest first.
    async fn list_books(&self, query: &BookQuery) -> Result<BookPage, StoreError>;

    /// Count of all books, or of books in one status.
    async fn count_books(&self, status: Option<BookStatus>) -> Result<u64, StoreError>;

    async fn get_request(&self, id: &str) -> Result<Option<BorrowRequest>, StoreError>;

    /// Matching requests, most recently requested first.
    async fn list_requests(&self, filter: &RequestFilter)
        -> Result<Vec<BorrowRequest>, StoreError>;

    async fn get_checkout(&self, id: &str) -> Result<Option<Checkout>, StoreError>;

    /// Matching checkouts, most recently checked out first.
    async fn list_checkouts(&self, filter: &CheckoutFilter) -> Result<Vec<Checkout>, StoreError>;

    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// All users, newest first.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Provision a user from the identity layer. Fails with a conflict if the id or email exists.
    async fn insert_user(&self, user: User) -> Result<(), StoreError>;

    /// Audit entries, newest first.
    async fn list_audit(&self, opts: &AuditListOptions) -> Result<Vec<AuditEntry>, StoreError>;

    /// Apply every write and append the audit entry atomically, or change nothing.
    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Concurrent modification or uniqueness violation detected at commit time.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store error: {0}")]
    Other(String),
}

/// Errors surfaced by lifecycle and catalog operations. None are fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("you already have a pending request for this book")]
    DuplicateRequest,
    #[error("you already have this book checked out")]
    AlreadyCheckedOut,
    #[error("request is already resolved")]
    AlreadyResolved,
    #[error("book already returned")]
    AlreadyReturned,
    #[error("{0} not found")]
    NotFound(String),
    /// Retry the whole operation, not just the read.
    #[error("conflicting concurrent update, retry: {0}")]
    Conflict(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("store: {0}")]
    Store(StoreError),
}

impl From<StoreError> for LifecycleError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(msg) => LifecycleError::Conflict(msg),
            StoreError::NotFound(what) => LifecycleError::NotFound(what),
            other => LifecycleError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflict_maps_to_lifecycle_conflict() {
        let e: LifecycleError = StoreError::Conflict("book b1 version 3".into()).into();
        assert!(matches!(e, LifecycleError::Conflict(_)));
        let e: LifecycleError = StoreError::Other("disk full".into()).into();
        assert!(matches!(e, LifecycleError::Store(_)));
    }
}
