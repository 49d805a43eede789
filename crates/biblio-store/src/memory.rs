//! In-memory LibraryStore. All tables sit behind one lock so a commit is trivially atomic.

use biblio_types::{
    AuditEntry, AuditListOptions, Book, BookPage, BookQuery, BookStatus, BorrowRequest, ChangeSet,
    Checkout, CheckoutFilter, LibraryStore, RequestFilter, StoreError, User, Write,
    DEFAULT_AUDIT_LIMIT,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    books: HashMap<String, Book>,
    requests: HashMap<String, BorrowRequest>,
    checkouts: HashMap<String, Checkout>,
    users: HashMap<String, User>,
    /// Append order; listed in reverse.
    audit: Vec<AuditEntry>,
}

fn stale(kind: &str, id: &str, version: u64) -> StoreError {
    StoreError::Conflict(format!("{kind} {id} changed since version {version}"))
}

fn check_version(kind: &str, id: &str, expected: u64, current: Option<u64>) -> Result<(), StoreError> {
    match current {
        Some(v) if v == expected => Ok(()),
        _ => Err(stale(kind, id, expected)),
    }
}

impl Tables {
    /// Every update/delete must target the version that was read; inserts must be new.
    fn check_versions(&self, writes: &[Write]) -> Result<(), StoreError> {
        for write in writes {
            match write {
                Write::InsertBook(b) if self.books.contains_key(&b.id) => {
                    return Err(StoreError::Conflict(format!("book {} already exists", b.id)));
                }
                Write::UpdateBook(b) => {
                    check_version("book", &b.id, b.version, self.books.get(&b.id).map(|x| x.version))?
                }
                Write::DeleteBook { id, version } => {
                    check_version("book", id, *version, self.books.get(id).map(|x| x.version))?
                }
                Write::InsertRequest(r) if self.requests.contains_key(&r.id) => {
                    return Err(StoreError::Conflict(format!("request {} already exists", r.id)));
                }
                Write::UpdateRequest(r) => check_version(
                    "request",
                    &r.id,
                    r.version,
                    self.requests.get(&r.id).map(|x| x.version),
                )?,
                Write::InsertCheckout(c) if self.checkouts.contains_key(&c.id) => {
                    return Err(StoreError::Conflict(format!("checkout {} already exists", c.id)));
                }
                Write::UpdateCheckout(c) => check_version(
                    "checkout",
                    &c.id,
                    c.version,
                    self.checkouts.get(&c.id).map(|x| x.version),
                )?,
                Write::UpdateUser(u) => {
                    check_version("user", &u.id, u.version, self.users.get(&u.id).map(|x| x.version))?
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// One pending request per (book, user); one open checkout per book.
    fn check_unique(&self, writes: &[Write]) -> Result<(), StoreError> {
        let mut touched_requests = HashSet::new();
        let mut pending: Vec<(&str, &str)> = Vec::new();
        let mut touched_checkouts = HashSet::new();
        let mut open: Vec<&str> = Vec::new();
        for write in writes {
            match write {
                Write::InsertRequest(r) | Write::UpdateRequest(r) => {
                    touched_requests.insert(r.id.as_str());
                    if r.is_pending() {
                        pending.push((r.book_id.as_str(), r.user_id.as_str()));
                    }
                }
                Write::InsertCheckout(c) | Write::UpdateCheckout(c) => {
                    touched_checkouts.insert(c.id.as_str());
                    if c.is_open() {
                        open.push(c.book_id.as_str());
                    }
                }
                _ => {}
            }
        }

        for (i, (book_id, user_id)) in pending.iter().enumerate() {
            let clash = pending[..i].contains(&(*book_id, *user_id))
                || self.requests.values().any(|r| {
                    !touched_requests.contains(r.id.as_str())
                        && r.is_pending()
                        && r.book_id == *book_id
                        && r.user_id == *user_id
                });
            if clash {
                return Err(StoreError::Conflict(format!(
                    "user {user_id} already has a pending request for book {book_id}"
                )));
            }
        }
        for (i, book_id) in open.iter().enumerate() {
            let clash = open[..i].contains(book_id)
                || self.checkouts.values().any(|c| {
                    !touched_checkouts.contains(c.id.as_str()) && c.is_open() && c.book_id == *book_id
                });
            if clash {
                return Err(StoreError::Conflict(format!(
                    "book {book_id} already has an open checkout"
                )));
            }
        }
        Ok(())
    }

    fn apply(&mut self, write: Write) {
        match write {
            Write::InsertBook(b) => {
                self.books.insert(b.id.clone(), b);
            }
            Write::UpdateBook(mut b) => {
                b.version += 1;
                self.books.insert(b.id.clone(), b);
            }
            Write::DeleteBook { id, .. } => {
                self.books.remove(&id);
                self.requests.retain(|_, r| r.book_id != id);
                self.checkouts.retain(|_, c| c.book_id != id);
            }
            Write::InsertRequest(r) => {
                self.requests.insert(r.id.clone(), r);
            }
            Write::UpdateRequest(mut r) => {
                r.version += 1;
                self.requests.insert(r.id.clone(), r);
            }
            Write::InsertCheckout(c) => {
                self.checkouts.insert(c.id.clone(), c);
            }
            Write::UpdateCheckout(mut c) => {
                c.version += 1;
                self.checkouts.insert(c.id.clone(), c);
            }
            Write::UpdateUser(mut u) => {
                u.version += 1;
                self.users.insert(u.id.clone(), u);
            }
        }
    }
}

/// In-memory implementation of LibraryStore (process lifetime only).
#[derive(Clone, Default)]
pub struct InMemoryLibraryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryLibraryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LibraryStore for InMemoryLibraryStore {
    async fn get_book(&self, id: &str) -> Result<Option<Book>, StoreError> {
        Ok(self.tables.read().await.books.get(id).cloned())
    }

    async fn list_books(&self, query: &BookQuery) -> Result<BookPage, StoreError> {
        let guard = self.tables.read().await;
        let matching = guard
            .books
            .values()
            .filter(|b| query.matches(b))
            .cloned()
            .collect();
        Ok(BookPage::paginate(matching, query))
    }

    async fn count_books(&self, status: Option<BookStatus>) -> Result<u64, StoreError> {
        let guard = self.tables.read().await;
        let n = guard
            .books
            .values()
            .filter(|b| status.map_or(true, |s| b.status == s))
            .count();
        Ok(n as u64)
    }

    async fn get_request(&self, id: &str) -> Result<Option<BorrowRequest>, StoreError> {
        Ok(self.tables.read().await.requests.get(id).cloned())
    }

    async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<BorrowRequest>, StoreError> {
        let guard = self.tables.read().await;
        let mut out: Vec<BorrowRequest> = guard
            .requests
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.requested_at.cmp(&a.requested_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn get_checkout(&self, id: &str) -> Result<Option<Checkout>, StoreError> {
        Ok(self.tables.read().await.checkouts.get(id).cloned())
    }

    async fn list_checkouts(&self, filter: &CheckoutFilter) -> Result<Vec<Checkout>, StoreError> {
        let guard = self.tables.read().await;
        let mut out: Vec<Checkout> = guard
            .checkouts
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.checked_out_at
                .cmp(&a.checked_out_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(out)
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let guard = self.tables.read().await;
        let mut out: Vec<User> = guard.users.values().cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn insert_user(&self, user: User) -> Result<(), StoreError> {
        let mut guard = self.tables.write().await;
        if guard.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {} already exists", user.id)));
        }
        if guard.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "email {} already registered",
                user.email
            )));
        }
        guard.users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn list_audit(&self, opts: &AuditListOptions) -> Result<Vec<AuditEntry>, StoreError> {
        let guard = self.tables.read().await;
        let offset = opts.offset.unwrap_or(0) as usize;
        let limit = opts.limit.unwrap_or(DEFAULT_AUDIT_LIMIT) as usize;
        Ok(guard
            .audit
            .iter()
            .rev()
            .filter(|e| opts.matches(e))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError> {
        let mut guard = self.tables.write().await;
        guard.check_versions(&changes.writes)?;
        guard.check_unique(&changes.writes)?;
        for write in changes.writes {
            guard.apply(write);
        }
        guard.audit.push(changes.audit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn stale_update_is_rejected_without_side_effects() {
        fixtures::stale_update_is_rejected(&InMemoryLibraryStore::new()).await;
    }

    #[tokio::test]
    async fn second_open_checkout_conflicts() {
        fixtures::second_open_checkout_conflicts(&InMemoryLibraryStore::new()).await;
    }

    #[tokio::test]
    async fn duplicate_pending_request_conflicts() {
        fixtures::duplicate_pending_request_conflicts(&InMemoryLibraryStore::new()).await;
    }

    #[tokio::test]
    async fn delete_book_cascades_history_but_keeps_audit() {
        fixtures::delete_book_cascades(&InMemoryLibraryStore::new()).await;
    }

    #[tokio::test]
    async fn lists_are_filtered_and_ordered() {
        fixtures::lists_are_filtered_and_ordered(&InMemoryLibraryStore::new()).await;
    }

    #[tokio::test]
    async fn users_are_unique_by_id_and_email() {
        fixtures::users_are_unique(&InMemoryLibraryStore::new()).await;
    }
}
