//! Read-only dashboards over loans and users.

use crate::manager::LibraryManager;
use biblio_types::{
    BookStatus, CheckoutFilter, LifecycleError, OverdueSummary, RequestFilter, RequestStatus,
    UserSummary,
};
use std::collections::HashMap;

impl LibraryManager {
    /// Open checkouts past due (earliest due first) and catalog counters.
    pub async fn overdue_summary(&self) -> Result<OverdueSummary, LifecycleError> {
        let open = CheckoutFilter {
            active_only: true,
            ..Default::default()
        };
        let total_checked_out = self.store.list_checkouts(&open).await?.len();
        let past_due = CheckoutFilter {
            due_before: Some(self.now()),
            ..open
        };
        let mut overdue = self.store.list_checkouts(&past_due).await?;
        overdue.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));
        let overdue_checkouts = self.checkout_views(overdue).await?;

        let pending_requests = self
            .store
            .list_requests(&RequestFilter {
                status: Some(RequestStatus::Pending),
                ..Default::default()
            })
            .await?
            .len();

        Ok(OverdueSummary {
            overdue_count: overdue_checkouts.len(),
            overdue_checkouts,
            total_checked_out,
            pending_requests,
            total_books: self.store.count_books(None).await?,
            available_books: self.store.count_books(Some(BookStatus::Available)).await?,
        })
    }

    /// Every user with how many checkouts and borrow requests they have ever made.
    pub async fn user_summaries(&self) -> Result<Vec<UserSummary>, LifecycleError> {
        let users = self.store.list_users().await?;
        let mut checkouts: HashMap<String, usize> = HashMap::new();
        for c in self.store.list_checkouts(&CheckoutFilter::default()).await? {
            *checkouts.entry(c.user_id).or_default() += 1;
        }
        let mut requests: HashMap<String, usize> = HashMap::new();
        for r in self.store.list_requests(&RequestFilter::default()).await? {
            *requests.entry(r.user_id).or_default() += 1;
        }
        Ok(users
            .into_iter()
            .map(|user| UserSummary {
                checkout_count: checkouts.get(&user.id).copied().unwrap_or(0),
                borrow_request_count: requests.get(&user.id).copied().unwrap_or(0),
                user,
            })
            .collect())
    }
}
