//! LibraryManager: the borrow lifecycle operations over a [`LibraryStore`].

use crate::clock::{Clock, SystemClock};
use crate::transition::{plan_approve, plan_deny, plan_return, plan_submit};
use biblio_enrich::LayeredEnricher;
use biblio_types::{
    Actor, AuditEntry, AuditListOptions, Book, BorrowRequest, BorrowRequestView, ChangeSet,
    Checkout, CheckoutFilter, CheckoutView, LibraryStore, LifecycleError, RequestFilter,
    RequestStatus, ResolveAction, StoreError, DEFAULT_AUDIT_LIMIT,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Loan period used when a resolution does not name one.
pub const DEFAULT_DUE_DAYS: u32 = 14;

/// Outcome of resolving a borrow request. `checkout` is set only for approvals.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub request: BorrowRequest,
    pub checkout: Option<Checkout>,
}

pub struct LibraryManager {
    pub(crate) store: Arc<dyn LibraryStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) enricher: LayeredEnricher,
    default_due_days: u32,
}

impl LibraryManager {
    /// System clock, heuristic-only enrichment, 14-day loans.
    pub fn new(store: Arc<dyn LibraryStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            enricher: LayeredEnricher::new(),
            default_due_days: DEFAULT_DUE_DAYS,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_enricher(mut self, enricher: LayeredEnricher) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn with_default_due_days(mut self, days: u32) -> Self {
        self.default_due_days = days;
        self
    }

    pub fn store(&self) -> &Arc<dyn LibraryStore> {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) async fn load_book(&self, id: &str) -> Result<Book, LifecycleError> {
        self.store
            .get_book(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("book {id}")))
    }

    /// Commits a planned change set; conflicts are logged and surfaced for the caller to retry.
    pub(crate) async fn commit(&self, changes: ChangeSet) -> Result<(), LifecycleError> {
        let action = changes.audit.action;
        let actor_id = changes.audit.actor_id.clone();
        let book_id = changes.audit.book_id.clone().unwrap_or_default();
        match self.store.commit(changes).await {
            Ok(()) => Ok(()),
            Err(StoreError::Conflict(msg)) => {
                tracing::warn!(action = action.as_str(), %book_id, %actor_id, reason = %msg, "commit conflict");
                Err(LifecycleError::Conflict(msg))
            }
            Err(e) => {
                tracing::error!(action = action.as_str(), %book_id, error = %e, "commit failed");
                Err(e.into())
            }
        }
    }

    /// AVAILABLE -> REQUESTED for `book_id` on behalf of `actor`.
    pub async fn submit_request(
        &self,
        book_id: &str,
        actor: &Actor,
    ) -> Result<BorrowRequest, LifecycleError> {
        let book = self.load_book(book_id).await?;
        let mine = RequestFilter {
            user_id: Some(actor.id.clone()),
            book_id: Some(book.id.clone()),
            status: Some(RequestStatus::Pending),
        };
        let has_pending = !self.store.list_requests(&mine).await?.is_empty();
        let held = CheckoutFilter {
            user_id: Some(actor.id.clone()),
            ..CheckoutFilter::open_for_book(&book.id)
        };
        let has_open = !self.store.list_checkouts(&held).await?.is_empty();

        let planned = plan_submit(&book, actor, has_pending, has_open, self.now())?;
        self.commit(planned.changes).await?;
        tracing::info!(
            book_id = %book.id,
            request_id = %planned.record.id,
            actor_id = %actor.id,
            "borrow requested"
        );
        Ok(planned.record)
    }

    /// Approve or deny a pending request. `due_days` applies to approvals only.
    pub async fn resolve_request(
        &self,
        request_id: &str,
        action: ResolveAction,
        due_days: Option<u32>,
        actor: &Actor,
    ) -> Result<Resolution, LifecycleError> {
        let request = self
            .store
            .get_request(request_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("borrow request {request_id}")))?;
        if request.status.is_terminal() {
            return Err(LifecycleError::AlreadyResolved);
        }
        let book = self.load_book(&request.book_id).await?;
        let now = self.now();

        match action {
            ResolveAction::Approve => {
                let days = due_days.unwrap_or(self.default_due_days);
                let planned = plan_approve(&request, &book, days, actor, now)?;
                self.commit(planned.changes).await?;
                let (request, checkout) = planned.record;
                tracing::info!(
                    book_id = %book.id,
                    request_id = %request.id,
                    checkout_id = %checkout.id,
                    actor_id = %actor.id,
                    due_days = days,
                    "borrow approved"
                );
                Ok(Resolution {
                    request,
                    checkout: Some(checkout),
                })
            }
            ResolveAction::Deny => {
                let other_pending = self
                    .store
                    .list_requests(&RequestFilter::pending_for_book(&book.id))
                    .await?
                    .iter()
                    .filter(|r| r.id != request.id)
                    .count();
                let planned = plan_deny(&request, &book, other_pending, actor, now)?;
                self.commit(planned.changes).await?;
                tracing::info!(
                    book_id = %book.id,
                    request_id = %request.id,
                    actor_id = %actor.id,
                    other_pending,
                    "borrow denied"
                );
                Ok(Resolution {
                    request: planned.record,
                    checkout: None,
                })
            }
        }
    }

    /// Close an open checkout; the book becomes AVAILABLE.
    pub async fn return_book(
        &self,
        checkout_id: &str,
        actor: &Actor,
    ) -> Result<Checkout, LifecycleError> {
        let checkout = self
            .store
            .get_checkout(checkout_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("checkout {checkout_id}")))?;
        if !checkout.is_open() {
            return Err(LifecycleError::AlreadyReturned);
        }
        let book = self.load_book(&checkout.book_id).await?;
        let planned = plan_return(&checkout, &book, actor, self.now())?;
        self.commit(planned.changes).await?;
        tracing::info!(
            book_id = %book.id,
            checkout_id = %checkout.id,
            actor_id = %actor.id,
            "book returned"
        );
        Ok(planned.record)
    }

    /// Requests visible to `actor`: members see only their own.
    pub async fn list_requests(
        &self,
        actor: &Actor,
        status: Option<RequestStatus>,
    ) -> Result<Vec<BorrowRequestView>, LifecycleError> {
        let filter = RequestFilter {
            user_id: (!actor.is_staff()).then(|| actor.id.clone()),
            status,
            ..Default::default()
        };
        let requests = self.store.list_requests(&filter).await?;
        self.request_views(requests).await
    }

    /// Checkouts visible to `actor`. Staff may narrow to one user; members always see their own.
    pub async fn list_checkouts(
        &self,
        actor: &Actor,
        active_only: bool,
        user_id: Option<String>,
    ) -> Result<Vec<CheckoutView>, LifecycleError> {
        let user_id = if actor.is_staff() {
            user_id
        } else {
            Some(actor.id.clone())
        };
        let filter = CheckoutFilter {
            user_id,
            active_only,
            ..Default::default()
        };
        let checkouts = self.store.list_checkouts(&filter).await?;
        self.checkout_views(checkouts).await
    }

    /// Newest audit entries first.
    pub async fn list_audit(&self, limit: Option<u32>) -> Result<Vec<AuditEntry>, LifecycleError> {
        let opts = AuditListOptions {
            limit: Some(limit.filter(|l| *l > 0).unwrap_or(DEFAULT_AUDIT_LIMIT)),
            ..Default::default()
        };
        Ok(self.store.list_audit(&opts).await?)
    }
}
