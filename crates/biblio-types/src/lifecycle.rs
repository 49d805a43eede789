//! Lifecycle and governance types: statuses, resolve actions, AuditEntry (append-only trail).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Availability of a book. Exactly one at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookStatus {
    #[default]
    Available,
    Requested,
    CheckedOut,
}

impl BookStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookStatus::Available => "AVAILABLE",
            BookStatus::Requested => "REQUESTED",
            BookStatus::CheckedOut => "CHECKED_OUT",
        }
    }
}

/// State of a borrow request. APPROVED and DENIED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Denied,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Denied => "DENIED",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// Staff decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveAction {
    Approve,
    Deny,
}

/// Kind of auditable action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    BorrowRequested,
    BorrowApproved,
    BorrowDenied,
    Returned,
    BookCreated,
    BookUpdated,
    BookDeleted,
    AiEnriched,
    RoleChanged,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::BorrowRequested => "BORROW_REQUESTED",
            AuditAction::BorrowApproved => "BORROW_APPROVED",
            AuditAction::BorrowDenied => "BORROW_DENIED",
            AuditAction::Returned => "RETURNED",
            AuditAction::BookCreated => "BOOK_CREATED",
            AuditAction::BookUpdated => "BOOK_UPDATED",
            AuditAction::BookDeleted => "BOOK_DELETED",
            AuditAction::AiEnriched => "AI_ENRICHED",
            AuditAction::RoleChanged => "ROLE_CHANGED",
        }
    }
}

/// Error returned when a stored or queried tag does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseTagError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! tag_impls {
    ($ty:ident, $kind:literal, [$($variant:ident),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseTagError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($ty::$variant.as_str()) {
                        return Ok($ty::$variant);
                    }
                )+
                Err(ParseTagError {
                    kind: $kind,
                    value: s.to_string(),
                })
            }
        }
    };
}

tag_impls!(BookStatus, "book status", [Available, Requested, CheckedOut]);
tag_impls!(RequestStatus, "request status", [Pending, Approved, Denied]);
tag_impls!(
    AuditAction,
    "audit action",
    [
        BorrowRequested,
        BorrowApproved,
        BorrowDenied,
        Returned,
        BookCreated,
        BookUpdated,
        BookDeleted,
        AiEnriched,
        RoleChanged,
    ]
);

/// One audit entry. Written in the same commit as the change it describes; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub actor_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_id: Option<String>,
    pub action: AuditAction,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor_id: impl Into<String>,
        book_id: Option<String>,
        action: AuditAction,
        detail: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            actor_id: actor_id.into(),
            book_id,
            action,
            detail: detail.into(),
            created_at,
        }
    }
}

/// Options for listing audit entries (filter + pagination). Results are newest first.
#[derive(Debug, Clone, Default)]
pub struct AuditListOptions {
    pub actor_id: Option<String>,
    pub book_id: Option<String>,
    pub action: Option<AuditAction>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub const DEFAULT_AUDIT_LIMIT: u32 = 50;

impl AuditListOptions {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(ref actor) = self.actor_id {
            if &entry.actor_id != actor {
                return false;
            }
        }
        if let Some(ref book) = self.book_id {
            if entry.book_id.as_ref() != Some(book) {
                return false;
            }
        }
        if let Some(action) = self.action {
            if entry.action != action {
                return false;
            }
        }
        true
    }
}
