//! Shared record builders and backend checks run against every LibraryStore implementation.

use biblio_types::{
    AuditAction, AuditEntry, AuditListOptions, Book, BookQuery, BookStatus, BorrowRequest,
    ChangeSet, Checkout, CheckoutFilter, LibraryStore, RequestFilter, RequestStatus, Role,
    StoreError, User, Write,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn book(id: &str, title: &str) -> Book {
    Book {
        id: id.to_string(),
        title: title.to_string(),
        author: "Ursula K. Le Guin".to_string(),
        genre: Some("Fantasy".to_string()),
        tags: vec!["classic".to_string()],
        description: None,
        isbn: None,
        cover_url: None,
        difficulty: None,
        status: BookStatus::Available,
        created_at: at(0),
        updated_at: at(0),
        version: 0,
    }
}

pub fn request(id: &str, book_id: &str, user_id: &str, secs: i64) -> BorrowRequest {
    BorrowRequest {
        id: id.to_string(),
        book_id: book_id.to_string(),
        user_id: user_id.to_string(),
        status: RequestStatus::Pending,
        requested_at: at(secs),
        resolved_at: None,
        resolved_by_id: None,
        due_date: None,
        version: 0,
    }
}

pub fn checkout(id: &str, book_id: &str, user_id: &str, secs: i64) -> Checkout {
    Checkout {
        id: id.to_string(),
        book_id: book_id.to_string(),
        user_id: user_id.to_string(),
        borrow_request_id: None,
        checked_out_at: at(secs),
        due_date: at(secs) + Duration::days(14),
        returned_at: None,
        version: 0,
    }
}

pub fn user(id: &str, role: Role) -> User {
    User {
        id: id.to_string(),
        name: Some(id.to_string()),
        email: format!("{id}@example.org"),
        role,
        created_at: at(0),
        version: 0,
    }
}

pub fn audit(action: AuditAction, book_id: Option<&str>) -> AuditEntry {
    AuditEntry::new("staff", book_id.map(String::from), action, "test", at(1))
}

async fn audit_len(store: &dyn LibraryStore) -> usize {
    store
        .list_audit(&AuditListOptions {
            limit: Some(1000),
            ..Default::default()
        })
        .await
        .unwrap()
        .len()
}

async fn seed_book(store: &dyn LibraryStore, id: &str) -> Book {
    let b = book(id, "A Wizard of Earthsea");
    store
        .commit(ChangeSet::new(audit(AuditAction::BookCreated, Some(id))).with(Write::InsertBook(b.clone())))
        .await
        .unwrap();
    b
}

pub async fn stale_update_is_rejected(store: &dyn LibraryStore) {
    let b = seed_book(store, "b1").await;

    let mut fresh = b.clone();
    fresh.status = BookStatus::Requested;
    store
        .commit(ChangeSet::new(audit(AuditAction::BorrowRequested, Some("b1"))).with(Write::UpdateBook(fresh)))
        .await
        .unwrap();
    let stored = store.get_book("b1").await.unwrap().unwrap();
    assert_eq!(stored.version, 1);
    assert_eq!(stored.status, BookStatus::Requested);

    // Planned against version 0, and carries an insert that must be rolled back too.
    let mut stale = b.clone();
    stale.status = BookStatus::CheckedOut;
    let err = store
        .commit(
            ChangeSet::new(audit(AuditAction::BorrowApproved, Some("b1")))
                .with(Write::InsertCheckout(checkout("c1", "b1", "u1", 2)))
                .with(Write::UpdateBook(stale)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    assert_eq!(store.get_book("b1").await.unwrap().unwrap().status, BookStatus::Requested);
    assert!(store.get_checkout("c1").await.unwrap().is_none());
    assert_eq!(audit_len(store).await, 2);
}

pub async fn second_open_checkout_conflicts(store: &dyn LibraryStore) {
    seed_book(store, "b1").await;
    store
        .commit(
            ChangeSet::new(audit(AuditAction::BorrowApproved, Some("b1")))
                .with(Write::InsertCheckout(checkout("c1", "b1", "u1", 1))),
        )
        .await
        .unwrap();
    let err = store
        .commit(
            ChangeSet::new(audit(AuditAction::BorrowApproved, Some("b1")))
                .with(Write::InsertCheckout(checkout("c2", "b1", "u2", 2))),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    // Closing the first one frees the slot.
    let mut closed = store.get_checkout("c1").await.unwrap().unwrap();
    closed.returned_at = Some(at(3));
    store
        .commit(
            ChangeSet::new(audit(AuditAction::Returned, Some("b1")))
                .with(Write::UpdateCheckout(closed)),
        )
        .await
        .unwrap();
    store
        .commit(
            ChangeSet::new(audit(AuditAction::BorrowApproved, Some("b1")))
                .with(Write::InsertCheckout(checkout("c2", "b1", "u2", 4))),
        )
        .await
        .unwrap();
    let open = store
        .list_checkouts(&CheckoutFilter::open_for_book("b1"))
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, "c2");
}

pub async fn duplicate_pending_request_conflicts(store: &dyn LibraryStore) {
    seed_book(store, "b1").await;
    store
        .commit(
            ChangeSet::new(audit(AuditAction::BorrowRequested, Some("b1")))
                .with(Write::InsertRequest(request("r1", "b1", "u1", 1))),
        )
        .await
        .unwrap();
    let err = store
        .commit(
            ChangeSet::new(audit(AuditAction::BorrowRequested, Some("b1")))
                .with(Write::InsertRequest(request("r2", "b1", "u1", 2))),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    // Another user may hold a pending request for the same book.
    store
        .commit(
            ChangeSet::new(audit(AuditAction::BorrowRequested, Some("b1")))
                .with(Write::InsertRequest(request("r3", "b1", "u2", 3))),
        )
        .await
        .unwrap();
    let pending = store
        .list_requests(&RequestFilter::pending_for_book("b1"))
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);
}

pub async fn delete_book_cascades(store: &dyn LibraryStore) {
    seed_book(store, "b1").await;
    seed_book(store, "b2").await;
    let mut done = checkout("c1", "b1", "u1", 1);
    done.returned_at = Some(at(2));
    store
        .commit(
            ChangeSet::new(audit(AuditAction::Returned, Some("b1")))
                .with(Write::InsertRequest(request("r1", "b1", "u1", 1)))
                .with(Write::InsertCheckout(done))
                .with(Write::InsertRequest(request("r2", "b2", "u1", 1))),
        )
        .await
        .unwrap();

    let err = store
        .commit(
            ChangeSet::new(audit(AuditAction::BookDeleted, Some("b1")))
                .with(Write::DeleteBook {
                    id: "b1".to_string(),
                    version: 7,
                }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    store
        .commit(
            ChangeSet::new(audit(AuditAction::BookDeleted, Some("b1")))
                .with(Write::DeleteBook {
                    id: "b1".to_string(),
                    version: 0,
                }),
        )
        .await
        .unwrap();
    assert!(store.get_book("b1").await.unwrap().is_none());
    assert!(store.get_request("r1").await.unwrap().is_none());
    assert!(store.get_checkout("c1").await.unwrap().is_none());
    assert!(store.get_request("r2").await.unwrap().is_some());

    let trail = store
        .list_audit(&AuditListOptions {
            book_id: Some("b1".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(trail.len(), 3);
    assert_eq!(trail[0].action, AuditAction::BookDeleted);
}

pub async fn lists_are_filtered_and_ordered(store: &dyn LibraryStore) {
    for (id, title, secs) in [("b1", "Dune", 1), ("b2", "Dune Messiah", 2), ("b3", "Emma", 3)] {
        let mut b = book(id, title);
        b.created_at = at(secs);
        b.updated_at = at(secs);
        store
            .commit(
                ChangeSet::new(audit(AuditAction::BookCreated, Some(id)))
                    .with(Write::InsertBook(b)),
            )
            .await
            .unwrap();
    }
    let page = store
        .list_books(&BookQuery {
            search: Some("dune".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.books[0].id, "b2");
    assert_eq!(store.count_books(None).await.unwrap(), 3);
    assert_eq!(store.count_books(Some(BookStatus::CheckedOut)).await.unwrap(), 0);

    store
        .commit(
            ChangeSet::new(audit(AuditAction::BorrowApproved, Some("b1")))
                .with(Write::InsertCheckout(checkout("c-old", "b1", "u1", 10)))
                .with(Write::InsertCheckout(checkout("c-new", "b2", "u1", 20)))
                .with(Write::InsertCheckout(checkout("c-other", "b3", "u2", 30))),
        )
        .await
        .unwrap();
    let mine = store
        .list_checkouts(&CheckoutFilter {
            user_id: Some("u1".to_string()),
            active_only: true,
            ..Default::default()
        })
        .await
        .unwrap();
    let ids: Vec<_> = mine.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["c-new", "c-old"]);

    let due_early = store
        .list_checkouts(&CheckoutFilter {
            active_only: true,
            due_before: Some(at(25) + Duration::days(14)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(due_early.len(), 2);

    let recent = store
        .list_audit(&AuditListOptions {
            limit: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].action, AuditAction::BorrowApproved);
    assert_eq!(recent[1].book_id.as_deref(), Some("b3"));
}

pub async fn users_are_unique(store: &dyn LibraryStore) {
    store.insert_user(user("alice", Role::Member)).await.unwrap();
    let err = store.insert_user(user("alice", Role::Admin)).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    let mut same_email = user("alice2", Role::Member);
    same_email.email = "alice@example.org".to_string();
    let err = store.insert_user(same_email).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    let mut promoted = store.get_user("alice").await.unwrap().unwrap();
    promoted.role = Role::Librarian;
    store
        .commit(ChangeSet::new(audit(AuditAction::RoleChanged, None)).with(Write::UpdateUser(promoted)))
        .await
        .unwrap();
    let stored = store.get_user("alice").await.unwrap().unwrap();
    assert_eq!(stored.role, Role::Librarian);
    assert_eq!(stored.version, 1);
    assert_eq!(store.list_users().await.unwrap().len(), 1);
}
