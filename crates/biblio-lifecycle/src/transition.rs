//! Pure transition planning. Given the records an operation read, either reject it or
//! produce the [`ChangeSet`] to commit and the record as it will look once committed.
//!
//! Every plan rewrites the book row so the store's version check serializes all
//! operations on one book, including denials that leave its status unchanged.

use biblio_types::{
    Actor, AuditAction, AuditEntry, Book, BookStatus, BorrowRequest, ChangeSet, Checkout,
    LifecycleError, RequestStatus, Write,
};
use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// A planned change and the resulting record(s).
#[derive(Debug, Clone)]
pub struct Planned<T> {
    pub changes: ChangeSet,
    pub record: T,
}

/// The version a record will carry after its update commits.
fn bumped<T: Clone>(record: &T, version: impl FnOnce(&mut T) -> &mut u64) -> T {
    let mut next = record.clone();
    *version(&mut next) += 1;
    next
}

fn touch_book(book: &Book, status: BookStatus, now: DateTime<Utc>) -> Book {
    Book {
        status,
        updated_at: now,
        ..book.clone()
    }
}

/// `AVAILABLE -> REQUESTED`. Checks run in order: availability, duplicate, already held.
pub fn plan_submit(
    book: &Book,
    actor: &Actor,
    has_pending_request: bool,
    has_open_checkout: bool,
    now: DateTime<Utc>,
) -> Result<Planned<BorrowRequest>, LifecycleError> {
    if book.status != BookStatus::Available {
        return Err(LifecycleError::InvalidState(format!(
            "book {} is {}, not available for borrowing",
            book.id, book.status
        )));
    }
    if has_pending_request {
        return Err(LifecycleError::DuplicateRequest);
    }
    if has_open_checkout {
        return Err(LifecycleError::AlreadyCheckedOut);
    }

    let request = BorrowRequest {
        id: uuid::Uuid::new_v4().to_string(),
        book_id: book.id.clone(),
        user_id: actor.id.clone(),
        status: RequestStatus::Pending,
        requested_at: now,
        resolved_at: None,
        resolved_by_id: None,
        due_date: None,
        version: 0,
    };
    let audit = AuditEntry::new(
        actor.id.clone(),
        Some(book.id.clone()),
        AuditAction::BorrowRequested,
        format!("Requested to borrow: {}", book.title),
        now,
    );
    let changes = ChangeSet::new(audit)
        .with(Write::InsertRequest(request.clone()))
        .with(Write::UpdateBook(touch_book(book, BookStatus::Requested, now)));
    Ok(Planned {
        changes,
        record: request,
    })
}

fn ensure_pending(request: &BorrowRequest) -> Result<(), LifecycleError> {
    if request.status.is_terminal() {
        return Err(LifecycleError::AlreadyResolved);
    }
    Ok(())
}

/// `REQUESTED -> CHECKED_OUT`; creates the checkout with `due = now + due_days`.
pub fn plan_approve(
    request: &BorrowRequest,
    book: &Book,
    due_days: u32,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<Planned<(BorrowRequest, Checkout)>, LifecycleError> {
    ensure_pending(request)?;
    if due_days == 0 {
        return Err(LifecycleError::InvalidInput(
            "due_days must be at least 1".to_string(),
        ));
    }
    // A lingering pending request can outlive its book's availability.
    if book.status == BookStatus::CheckedOut {
        return Err(LifecycleError::InvalidState(format!(
            "book {} is already checked out",
            book.id
        )));
    }
    let due_date = now
        .checked_add_signed(Duration::days(i64::from(due_days)))
        .ok_or_else(|| LifecycleError::InvalidInput(format!("due_days {due_days} is out of range")))?;

    let approved = BorrowRequest {
        status: RequestStatus::Approved,
        resolved_at: Some(now),
        resolved_by_id: Some(actor.id.clone()),
        due_date: Some(due_date),
        ..request.clone()
    };
    let checkout = Checkout {
        id: uuid::Uuid::new_v4().to_string(),
        book_id: request.book_id.clone(),
        user_id: request.user_id.clone(),
        borrow_request_id: Some(request.id.clone()),
        checked_out_at: now,
        due_date,
        returned_at: None,
        version: 0,
    };
    let audit = AuditEntry::new(
        actor.id.clone(),
        Some(book.id.clone()),
        AuditAction::BorrowApproved,
        format!(
            "Approved borrow for: {}. Due: {}",
            book.title,
            due_date.to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
        now,
    );
    let changes = ChangeSet::new(audit)
        .with(Write::UpdateRequest(approved.clone()))
        .with(Write::InsertCheckout(checkout.clone()))
        .with(Write::UpdateBook(touch_book(book, BookStatus::CheckedOut, now)));
    Ok(Planned {
        changes,
        record: (bumped(&approved, |r| &mut r.version), checkout),
    })
}

/// Denies a pending request. A REQUESTED book reverts to AVAILABLE only when
/// `other_pending == 0`; any other status is left alone. Never approves anyone else.
pub fn plan_deny(
    request: &BorrowRequest,
    book: &Book,
    other_pending: usize,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<Planned<BorrowRequest>, LifecycleError> {
    ensure_pending(request)?;
    let denied = BorrowRequest {
        status: RequestStatus::Denied,
        resolved_at: Some(now),
        resolved_by_id: Some(actor.id.clone()),
        ..request.clone()
    };
    let status = match book.status {
        BookStatus::Requested if other_pending == 0 => BookStatus::Available,
        current => current,
    };
    let audit = AuditEntry::new(
        actor.id.clone(),
        Some(book.id.clone()),
        AuditAction::BorrowDenied,
        format!("Denied borrow for: {}", book.title),
        now,
    );
    let changes = ChangeSet::new(audit)
        .with(Write::UpdateRequest(denied.clone()))
        .with(Write::UpdateBook(touch_book(book, status, now)));
    Ok(Planned {
        changes,
        record: bumped(&denied, |r| &mut r.version),
    })
}

/// Closes an open checkout; the book becomes AVAILABLE unconditionally.
pub fn plan_return(
    checkout: &Checkout,
    book: &Book,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<Planned<Checkout>, LifecycleError> {
    if !checkout.is_open() {
        return Err(LifecycleError::AlreadyReturned);
    }
    let closed = Checkout {
        returned_at: Some(now),
        ..checkout.clone()
    };
    let audit = AuditEntry::new(
        actor.id.clone(),
        Some(book.id.clone()),
        AuditAction::Returned,
        format!("Returned: {}", book.title),
        now,
    );
    let changes = ChangeSet::new(audit)
        .with(Write::UpdateCheckout(closed.clone()))
        .with(Write::UpdateBook(touch_book(book, BookStatus::Available, now)));
    Ok(Planned {
        changes,
        record: bumped(&closed, |c| &mut c.version),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use biblio_types::Role;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn book(status: BookStatus) -> Book {
        Book {
            id: "b1".into(),
            title: "Kindred".into(),
            author: "Octavia E. Butler".into(),
            genre: None,
            tags: vec![],
            description: None,
            isbn: None,
            cover_url: None,
            difficulty: None,
            status,
            created_at: now(),
            updated_at: now(),
            version: 4,
        }
    }

    fn pending() -> BorrowRequest {
        BorrowRequest {
            id: "r1".into(),
            book_id: "b1".into(),
            user_id: "member".into(),
            status: RequestStatus::Pending,
            requested_at: now(),
            resolved_at: None,
            resolved_by_id: None,
            due_date: None,
            version: 0,
        }
    }

    fn staff() -> Actor {
        Actor::new("librarian", Role::Librarian)
    }

    fn book_write(changes: &ChangeSet) -> &Book {
        changes
            .writes
            .iter()
            .find_map(|w| match w {
                Write::UpdateBook(b) => Some(b),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn submit_checks_run_in_order() {
        let member = Actor::new("member", Role::Member);
        let err = plan_submit(&book(BookStatus::Requested), &member, true, true, now()).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidState(_)));
        let err = plan_submit(&book(BookStatus::Available), &member, true, true, now()).unwrap_err();
        assert!(matches!(err, LifecycleError::DuplicateRequest));
        let err = plan_submit(&book(BookStatus::Available), &member, false, true, now()).unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyCheckedOut));
    }

    #[test]
    fn submit_plans_request_and_soft_lock() {
        let member = Actor::new("member", Role::Member);
        let planned = plan_submit(&book(BookStatus::Available), &member, false, false, now()).unwrap();
        assert_eq!(planned.record.status, RequestStatus::Pending);
        assert_eq!(planned.changes.audit.action, AuditAction::BorrowRequested);
        assert_eq!(planned.changes.audit.detail, "Requested to borrow: Kindred");
        let b = book_write(&planned.changes);
        assert_eq!(b.status, BookStatus::Requested);
        assert_eq!(b.version, 4, "write carries the version that was read");
    }

    #[test]
    fn approve_sets_matching_due_dates() {
        let planned = plan_approve(&pending(), &book(BookStatus::Requested), 7, &staff(), now()).unwrap();
        let (req, checkout) = &planned.record;
        let due = now() + Duration::days(7);
        assert_eq!(req.status, RequestStatus::Approved);
        assert_eq!(req.due_date, Some(due));
        assert_eq!(req.resolved_by_id.as_deref(), Some("librarian"));
        assert_eq!(req.version, 1);
        assert_eq!(checkout.due_date, due);
        assert_eq!(checkout.borrow_request_id.as_deref(), Some("r1"));
        assert_eq!(checkout.user_id, "member");
        assert_eq!(book_write(&planned.changes).status, BookStatus::CheckedOut);
        assert_eq!(
            planned.changes.audit.detail,
            "Approved borrow for: Kindred. Due: 2026-03-08T09:00:00Z"
        );
    }

    #[test]
    fn approve_rejects_bad_input_and_occupied_books() {
        let err = plan_approve(&pending(), &book(BookStatus::Requested), 0, &staff(), now()).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidInput(_)));
        let err = plan_approve(&pending(), &book(BookStatus::CheckedOut), 14, &staff(), now()).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidState(_)));
        let mut done = pending();
        done.status = RequestStatus::Denied;
        let err = plan_approve(&done, &book(BookStatus::Requested), 14, &staff(), now()).unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyResolved));
    }

    #[test]
    fn deny_reverts_only_when_last_pending() {
        let last = plan_deny(&pending(), &book(BookStatus::Requested), 0, &staff(), now()).unwrap();
        assert_eq!(book_write(&last.changes).status, BookStatus::Available);
        assert_eq!(last.record.status, RequestStatus::Denied);
        assert_eq!(last.record.due_date, None);

        let more = plan_deny(&pending(), &book(BookStatus::Requested), 2, &staff(), now()).unwrap();
        assert_eq!(book_write(&more.changes).status, BookStatus::Requested);

        let lingering = plan_deny(&pending(), &book(BookStatus::CheckedOut), 0, &staff(), now()).unwrap();
        assert_eq!(book_write(&lingering.changes).status, BookStatus::CheckedOut);
    }

    #[test]
    fn return_closes_once() {
        let open = Checkout {
            id: "c1".into(),
            book_id: "b1".into(),
            user_id: "member".into(),
            borrow_request_id: Some("r1".into()),
            checked_out_at: now(),
            due_date: now() + Duration::days(14),
            returned_at: None,
            version: 0,
        };
        let later = now() + Duration::days(3);
        let planned = plan_return(&open, &book(BookStatus::CheckedOut), &staff(), later).unwrap();
        assert_eq!(planned.record.returned_at, Some(later));
        assert_eq!(book_write(&planned.changes).status, BookStatus::Available);
        assert_eq!(planned.changes.audit.action, AuditAction::Returned);

        let err = plan_return(&planned.record, &book(BookStatus::Available), &staff(), later).unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyReturned));
    }
}
