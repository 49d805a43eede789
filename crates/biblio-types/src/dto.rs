//! Request and response DTOs for the Biblio HTTP API.

use crate::{Book, BookStatus, BorrowRequest, Checkout, ResolveAction, Role, User};
use serde::{Deserialize, Serialize};

/// Base response envelope. `code` mirrors the HTTP status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseResponse<T> {
    #[serde(default = "default_code")]
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

fn default_code() -> i32 {
    200
}

impl<T> BaseResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 200,
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            code: 201,
            message: "Created".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// Descriptive book fields accepted by create and update. Status is never client-settable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

impl BookInput {
    /// Trims title/author and turns blank optional fields into `None`.
    pub fn normalized(self) -> Self {
        fn blank_to_none(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        Self {
            title: self.title.trim().to_string(),
            author: self.author.trim().to_string(),
            genre: blank_to_none(self.genre),
            tags: self.tags,
            description: blank_to_none(self.description),
            isbn: blank_to_none(self.isbn),
            cover_url: blank_to_none(self.cover_url),
            difficulty: blank_to_none(self.difficulty),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBorrowRequest {
    pub book_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveBorrowRequest {
    pub action: ResolveAction,
    #[serde(default)]
    pub due_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

/// Catalog fields shown next to a loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSummary {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    pub status: BookStatus,
}

impl From<&Book> for BookSummary {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            cover_url: book.cover_url.clone(),
            status: book.status,
        }
    }
}

/// Public identity of a borrower or resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
}

impl From<&User> for UserRef {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Borrow request joined with its book, requester and resolver.
///
/// The joined fields are `None` when the referenced record no longer exists, e.g. a user
/// removed by the identity layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowRequestView {
    #[serde(flatten)]
    pub request: BorrowRequest,
    #[serde(default)]
    pub book: Option<BookSummary>,
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default)]
    pub resolved_by: Option<UserRef>,
}

/// Checkout joined with its book and borrower.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutView {
    #[serde(flatten)]
    pub checkout: Checkout,
    #[serde(default)]
    pub book: Option<BookSummary>,
    #[serde(default)]
    pub user: Option<UserRef>,
    /// Open checkouts only; negative once overdue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_until_due: Option<i64>,
}

/// Book with loan context, returned to authenticated callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookDetails {
    #[serde(flatten)]
    pub book: Book,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkouts: Option<Vec<CheckoutView>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borrow_requests: Option<Vec<BorrowRequestView>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverdueSummary {
    pub overdue_checkouts: Vec<CheckoutView>,
    pub overdue_count: usize,
    pub total_checked_out: usize,
    pub pending_requests: usize,
    pub total_books: u64,
    pub available_books: u64,
}

/// User listing row with activity counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(flatten)]
    pub user: User,
    pub checkout_count: usize,
    pub borrow_request_count: usize,
}

/// Descriptive metadata produced by an enrichment source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    #[serde(default)]
    pub synopsis: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub difficulty: String,
}

/// Which layer produced an [`Enrichment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnrichmentSource {
    LocalDb,
    Llm,
    Heuristic,
}

impl EnrichmentSource {
    pub fn as_str(self) -> &'static str {
        match self {
            EnrichmentSource::LocalDb => "local-db",
            EnrichmentSource::Llm => "llm",
            EnrichmentSource::Heuristic => "heuristic",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichResponseData {
    pub book: Book,
    pub enrichment: Enrichment,
    pub source: EnrichmentSource,
}
