//! Loan listings joined with the book and user records they reference.

use crate::manager::LibraryManager;
use biblio_types::{
    BookSummary, BorrowRequest, BorrowRequestView, Checkout, CheckoutView, LibraryStore,
    LifecycleError, StoreError, UserRef,
};
use std::collections::HashMap;

/// Per-listing cache so each book and user is read once.
struct Joins<'a> {
    store: &'a dyn LibraryStore,
    books: HashMap<String, Option<BookSummary>>,
    users: HashMap<String, Option<UserRef>>,
}

impl<'a> Joins<'a> {
    fn new(store: &'a dyn LibraryStore) -> Self {
        Self {
            store,
            books: HashMap::new(),
            users: HashMap::new(),
        }
    }

    async fn book(&mut self, id: &str) -> Result<Option<BookSummary>, StoreError> {
        if let Some(hit) = self.books.get(id) {
            return Ok(hit.clone());
        }
        let summary = self.store.get_book(id).await?.as_ref().map(BookSummary::from);
        self.books.insert(id.to_string(), summary.clone());
        Ok(summary)
    }

    async fn user(&mut self, id: &str) -> Result<Option<UserRef>, StoreError> {
        if let Some(hit) = self.users.get(id) {
            return Ok(hit.clone());
        }
        let user = self.store.get_user(id).await?.as_ref().map(UserRef::from);
        self.users.insert(id.to_string(), user.clone());
        Ok(user)
    }
}

impl LibraryManager {
    pub(crate) async fn request_views(
        &self,
        requests: Vec<BorrowRequest>,
    ) -> Result<Vec<BorrowRequestView>, LifecycleError> {
        let mut joins = Joins::new(self.store.as_ref());
        let mut views = Vec::with_capacity(requests.len());
        for request in requests {
            let book = joins.book(&request.book_id).await?;
            let user = joins.user(&request.user_id).await?;
            let resolved_by = match request.resolved_by_id.as_deref() {
                Some(id) => joins.user(id).await?,
                None => None,
            };
            views.push(BorrowRequestView {
                request,
                book,
                user,
                resolved_by,
            });
        }
        Ok(views)
    }

    pub(crate) async fn checkout_views(
        &self,
        checkouts: Vec<Checkout>,
    ) -> Result<Vec<CheckoutView>, LifecycleError> {
        let now = self.now();
        let mut joins = Joins::new(self.store.as_ref());
        let mut views = Vec::with_capacity(checkouts.len());
        for checkout in checkouts {
            let book = joins.book(&checkout.book_id).await?;
            let user = joins.user(&checkout.user_id).await?;
            views.push(CheckoutView {
                days_until_due: checkout.is_open().then(|| checkout.days_until_due(now)),
                checkout,
                book,
                user,
            });
        }
        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::{Clock, FixedClock};
    use crate::manager::LibraryManager;
    use biblio_store::InMemoryLibraryStore;
    use biblio_types::{Actor, BookInput, ResolveAction, Role, User};
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    async fn with_users(m: &LibraryManager, ids: &[&str]) {
        for id in ids {
            m.store()
                .insert_user(User {
                    id: id.to_string(),
                    name: Some(format!("Reader {id}")),
                    email: format!("{id}@example.org"),
                    role: Role::Member,
                    created_at: m.now(),
                    version: 0,
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn listings_carry_book_and_people() {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()));
        let m = LibraryManager::new(Arc::new(InMemoryLibraryStore::new()))
            .with_clock(clock.clone() as Arc<dyn Clock>);
        with_users(&m, &["u1", "librarian"]).await;
        let staff = Actor::new("librarian", Role::Librarian);
        let book = m
            .create_book(
                BookInput {
                    title: "Kindred".into(),
                    author: "Octavia E. Butler".into(),
                    cover_url: Some("https://covers.example.org/kindred.jpg".into()),
                    ..Default::default()
                },
                &staff,
            )
            .await
            .unwrap();
        let req = m
            .submit_request(&book.id, &Actor::new("u1", Role::Member))
            .await
            .unwrap();

        let pending = m.list_requests(&staff, None).await.unwrap();
        assert_eq!(pending[0].request.id, req.id);
        let summary = pending[0].book.as_ref().unwrap();
        assert_eq!(summary.title, "Kindred");
        assert_eq!(summary.cover_url.as_deref(), Some("https://covers.example.org/kindred.jpg"));
        assert_eq!(pending[0].user.as_ref().unwrap().email, "u1@example.org");
        assert!(pending[0].resolved_by.is_none());

        m.resolve_request(&req.id, ResolveAction::Approve, Some(2), &staff)
            .await
            .unwrap();
        let resolved = m.list_requests(&staff, None).await.unwrap();
        let resolver = resolved[0].resolved_by.as_ref().unwrap();
        assert_eq!(resolver.id, "librarian");
        assert_eq!(resolver.name.as_deref(), Some("Reader librarian"));

        clock.advance(Duration::days(5));
        let loans = m.list_checkouts(&staff, true, None).await.unwrap();
        assert_eq!(loans[0].book.as_ref().unwrap().author, "Octavia E. Butler");
        assert_eq!(loans[0].user.as_ref().unwrap().id, "u1");
        assert_eq!(loans[0].days_until_due, Some(-3));
    }

    #[tokio::test]
    async fn unknown_users_join_as_none() {
        let m = LibraryManager::new(Arc::new(InMemoryLibraryStore::new()));
        let staff = Actor::new("librarian", Role::Librarian);
        let book = m
            .create_book(
                BookInput {
                    title: "Dawn".into(),
                    author: "Octavia E. Butler".into(),
                    ..Default::default()
                },
                &staff,
            )
            .await
            .unwrap();
        m.submit_request(&book.id, &Actor::new("ghost", Role::Member))
            .await
            .unwrap();
        let views = m.list_requests(&staff, None).await.unwrap();
        assert!(views[0].user.is_none());
        assert_eq!(views[0].book.as_ref().unwrap().id, book.id);
    }
}
