//! Stored records: Book, BorrowRequest, Checkout, User, plus list filters over them.
//!
//! Every mutable record carries a `version`. A store bumps it on each committed write and
//! rejects writes planned against an older version (see [`crate::ChangeSet`]).

use crate::{BookStatus, ParseTagError, RequestStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Catalog item with availability status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    pub status: BookStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

/// A member's request to borrow a book, pending staff resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowRequest {
    pub id: String,
    pub book_id: String,
    pub user_id: String,
    pub status: RequestStatus,
    pub requested_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved_by_id: Option<String>,
    /// Set only on approval.
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: u64,
}

impl BorrowRequest {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

/// An active (`returned_at == None`) or closed loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkout {
    pub id: String,
    pub book_id: String,
    pub user_id: String,
    #[serde(default)]
    pub borrow_request_id: Option<String>,
    pub checked_out_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub returned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: u64,
}

impl Checkout {
    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && self.due_date < now
    }

    /// Whole days left until the due date, rounded up; negative once overdue.
    pub fn days_until_due(&self, now: DateTime<Utc>) -> i64 {
        let secs = (self.due_date - now).num_seconds();
        let day = 86_400;
        if secs > 0 {
            (secs + day - 1) / day
        } else {
            secs / day
        }
    }
}

/// Authorization role. Only used for gating, never by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    Member,
    Librarian,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Member => "MEMBER",
            Role::Librarian => "LIBRARIAN",
            Role::Admin => "ADMIN",
        }
    }

    /// Librarians and admins.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Librarian | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Role::Member, Role::Librarian, Role::Admin]
            .into_iter()
            .find(|r| s.eq_ignore_ascii_case(r.as_str()))
            .ok_or_else(|| ParseTagError {
                kind: "role",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self::new(user.id.clone(), user.role)
    }
}

pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Catalog search. `search` matches title, author, or isbn case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct BookQuery {
    pub search: Option<String>,
    pub genre: Option<String>,
    pub status: Option<BookStatus>,
    pub tag: Option<String>,
    /// 1-based.
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl BookQuery {
    pub fn page(&self) -> u32 {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_PAGE_LIMIT)
    }

    pub fn offset(&self) -> usize {
        (self.page() as usize - 1) * self.limit() as usize
    }

    pub fn matches(&self, book: &Book) -> bool {
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = book.title.to_lowercase().contains(&needle)
                || book.author.to_lowercase().contains(&needle)
                || book
                    .isbn
                    .as_deref()
                    .is_some_and(|i| i.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if let Some(genre) = self.genre.as_deref().filter(|g| !g.is_empty()) {
            if !book
                .genre
                .as_deref()
                .is_some_and(|g| g.eq_ignore_ascii_case(genre))
            {
                return false;
            }
        }
        if let Some(status) = self.status {
            if book.status != status {
                return false;
            }
        }
        if let Some(tag) = self.tag.as_deref().filter(|t| !t.is_empty()) {
            if !book.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        true
    }
}

/// One page of catalog results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookPage {
    pub books: Vec<Book>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}

impl BookPage {
    /// Sorts newest first and slices out the requested page.
    pub fn paginate(mut matching: Vec<Book>, query: &BookQuery) -> Self {
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        let total = matching.len() as u64;
        let limit = query.limit();
        let books = matching
            .into_iter()
            .skip(query.offset())
            .take(limit as usize)
            .collect();
        Self {
            books,
            total,
            page: query.page(),
            total_pages: total.div_ceil(u64::from(limit)) as u32,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub user_id: Option<String>,
    pub book_id: Option<String>,
    pub status: Option<RequestStatus>,
}

impl RequestFilter {
    pub fn pending_for_book(book_id: &str) -> Self {
        Self {
            book_id: Some(book_id.to_string()),
            status: Some(RequestStatus::Pending),
            ..Default::default()
        }
    }

    pub fn matches(&self, req: &BorrowRequest) -> bool {
        self.user_id.as_ref().map_or(true, |u| &req.user_id == u)
            && self.book_id.as_ref().map_or(true, |b| &req.book_id == b)
            && self.status.map_or(true, |s| req.status == s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CheckoutFilter {
    pub user_id: Option<String>,
    pub book_id: Option<String>,
    pub active_only: bool,
    /// Only checkouts due strictly before this instant.
    pub due_before: Option<DateTime<Utc>>,
}

impl CheckoutFilter {
    pub fn open_for_book(book_id: &str) -> Self {
        Self {
            book_id: Some(book_id.to_string()),
            active_only: true,
            ..Default::default()
        }
    }

    pub fn matches(&self, checkout: &Checkout) -> bool {
        self.user_id.as_ref().map_or(true, |u| &checkout.user_id == u)
            && self.book_id.as_ref().map_or(true, |b| &checkout.book_id == b)
            && (!self.active_only || checkout.is_open())
            && self.due_before.map_or(true, |t| checkout.due_date < t)
    }
}
