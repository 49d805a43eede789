//! SQLite-backed LibraryStore (persistence across restarts).
//!
//! Each commit runs in one SQLite transaction. Updates are guarded with
//! `WHERE id = ? AND version = ?`; zero affected rows or a unique-index violation
//! aborts the transaction with [`StoreError::Conflict`].

use biblio_types::{
    AuditEntry, AuditListOptions, Book, BookPage, BookQuery, BookStatus, BorrowRequest, ChangeSet,
    Checkout, CheckoutFilter, LibraryStore, RequestFilter, StoreError, User, Write,
    DEFAULT_AUDIT_LIMIT,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::str::FromStr;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT,
    email TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL,
    created_at TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS books (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    author TEXT NOT NULL,
    genre TEXT,
    tags TEXT NOT NULL,
    description TEXT,
    isbn TEXT,
    cover_url TEXT,
    difficulty TEXT,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS borrow_requests (
    id TEXT PRIMARY KEY,
    book_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    status TEXT NOT NULL,
    requested_at TEXT NOT NULL,
    resolved_at TEXT,
    resolved_by_id TEXT,
    due_date TEXT,
    version INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS checkouts (
    id TEXT PRIMARY KEY,
    book_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    borrow_request_id TEXT,
    checked_out_at TEXT NOT NULL,
    due_date TEXT NOT NULL,
    returned_at TEXT,
    version INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS audit_log (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    actor_id TEXT NOT NULL,
    book_id TEXT,
    action TEXT NOT NULL,
    detail TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_requests_book ON borrow_requests(book_id);
CREATE INDEX IF NOT EXISTS idx_requests_user ON borrow_requests(user_id);
CREATE INDEX IF NOT EXISTS idx_checkouts_book ON checkouts(book_id);
CREATE INDEX IF NOT EXISTS idx_checkouts_user ON checkouts(user_id);
CREATE UNIQUE INDEX IF NOT EXISTS uq_checkouts_open
    ON checkouts(book_id) WHERE returned_at IS NULL;
CREATE UNIQUE INDEX IF NOT EXISTS uq_requests_pending
    ON borrow_requests(book_id, user_id) WHERE status = 'PENDING';
"#;

const BOOK_COLUMNS: &str = "id, title, author, genre, tags, description, isbn, cover_url, difficulty, status, created_at, updated_at, version";
const REQUEST_COLUMNS: &str = "id, book_id, user_id, status, requested_at, resolved_at, resolved_by_id, due_date, version";
const CHECKOUT_COLUMNS: &str = "id, book_id, user_id, borrow_request_id, checked_out_at, due_date, returned_at, version";
const USER_COLUMNS: &str = "id, name, email, role, created_at, version";

/// Fixed-width UTC timestamps so lexical order matches time order.
fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn opt_ts(t: &Option<DateTime<Utc>>) -> Option<String> {
    t.as_ref().map(ts)
}

fn conversion_err(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| conversion_err(idx, e))
    })
    .transpose()
}

fn get_tag<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let s: String = row.get(idx)?;
    s.parse().map_err(|e| conversion_err(idx, e))
}

fn get_version(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    row.get::<_, i64>(idx).map(|v| v as u64)
}

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    let tags_json: String = row.get(4)?;
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        genre: row.get(3)?,
        tags: serde_json::from_str(&tags_json).map_err(|e| conversion_err(4, e))?,
        description: row.get(5)?,
        isbn: row.get(6)?,
        cover_url: row.get(7)?,
        difficulty: row.get(8)?,
        status: get_tag(row, 9)?,
        created_at: get_ts(row, 10)?,
        updated_at: get_ts(row, 11)?,
        version: get_version(row, 12)?,
    })
}

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<BorrowRequest> {
    Ok(BorrowRequest {
        id: row.get(0)?,
        book_id: row.get(1)?,
        user_id: row.get(2)?,
        status: get_tag(row, 3)?,
        requested_at: get_ts(row, 4)?,
        resolved_at: get_opt_ts(row, 5)?,
        resolved_by_id: row.get(6)?,
        due_date: get_opt_ts(row, 7)?,
        version: get_version(row, 8)?,
    })
}

fn checkout_from_row(row: &Row<'_>) -> rusqlite::Result<Checkout> {
    Ok(Checkout {
        id: row.get(0)?,
        book_id: row.get(1)?,
        user_id: row.get(2)?,
        borrow_request_id: row.get(3)?,
        checked_out_at: get_ts(row, 4)?,
        due_date: get_ts(row, 5)?,
        returned_at: get_opt_ts(row, 6)?,
        version: get_version(row, 7)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: get_tag(row, 3)?,
        created_at: get_ts(row, 4)?,
        version: get_version(row, 5)?,
    })
}

fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.get(0)?,
        actor_id: row.get(1)?,
        book_id: row.get(2)?,
        action: get_tag(row, 3)?,
        detail: row.get(4)?,
        created_at: get_ts(row, 5)?,
    })
}

/// Unique-index violations mean a concurrent writer got there first.
fn map_sql_err(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::SqliteFailure(ref f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(e.to_string())
        }
        other => StoreError::Other(other.to_string()),
    }
}

fn expect_one(affected: usize, kind: &str, id: &str, version: u64) -> Result<(), StoreError> {
    if affected == 1 {
        Ok(())
    } else {
        Err(StoreError::Conflict(format!(
            "{kind} {id} changed since version {version}"
        )))
    }
}

fn tags_json(tags: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(tags).map_err(|e| StoreError::Other(e.to_string()))
}

fn apply_write(tx: &Transaction<'_>, write: &Write) -> Result<(), StoreError> {
    match write {
        Write::InsertBook(b) => {
            tx.execute(
                &format!("INSERT INTO books ({BOOK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"),
                params![
                    b.id,
                    b.title,
                    b.author,
                    b.genre,
                    tags_json(&b.tags)?,
                    b.description,
                    b.isbn,
                    b.cover_url,
                    b.difficulty,
                    b.status.as_str(),
                    ts(&b.created_at),
                    ts(&b.updated_at),
                    b.version as i64,
                ],
            )
            .map_err(map_sql_err)?;
        }
        Write::UpdateBook(b) => {
            let n = tx
                .execute(
                    "UPDATE books SET title = ?3, author = ?4, genre = ?5, tags = ?6, description = ?7, \
                     isbn = ?8, cover_url = ?9, difficulty = ?10, status = ?11, updated_at = ?12, \
                     version = version + 1 WHERE id = ?1 AND version = ?2",
                    params![
                        b.id,
                        b.version as i64,
                        b.title,
                        b.author,
                        b.genre,
                        tags_json(&b.tags)?,
                        b.description,
                        b.isbn,
                        b.cover_url,
                        b.difficulty,
                        b.status.as_str(),
                        ts(&b.updated_at),
                    ],
                )
                .map_err(map_sql_err)?;
            expect_one(n, "book", &b.id, b.version)?;
        }
        Write::DeleteBook { id, version } => {
            let n = tx
                .execute(
                    "DELETE FROM books WHERE id = ?1 AND version = ?2",
                    params![id, *version as i64],
                )
                .map_err(map_sql_err)?;
            expect_one(n, "book", id, *version)?;
            tx.execute("DELETE FROM borrow_requests WHERE book_id = ?1", [id])
                .map_err(map_sql_err)?;
            tx.execute("DELETE FROM checkouts WHERE book_id = ?1", [id])
                .map_err(map_sql_err)?;
        }
        Write::InsertRequest(r) => {
            tx.execute(
                &format!("INSERT INTO borrow_requests ({REQUEST_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
                params![
                    r.id,
                    r.book_id,
                    r.user_id,
                    r.status.as_str(),
                    ts(&r.requested_at),
                    opt_ts(&r.resolved_at),
                    r.resolved_by_id,
                    opt_ts(&r.due_date),
                    r.version as i64,
                ],
            )
            .map_err(map_sql_err)?;
        }
        Write::UpdateRequest(r) => {
            let n = tx
                .execute(
                    "UPDATE borrow_requests SET status = ?3, resolved_at = ?4, resolved_by_id = ?5, \
                     due_date = ?6, version = version + 1 WHERE id = ?1 AND version = ?2",
                    params![
                        r.id,
                        r.version as i64,
                        r.status.as_str(),
                        opt_ts(&r.resolved_at),
                        r.resolved_by_id,
                        opt_ts(&r.due_date),
                    ],
                )
                .map_err(map_sql_err)?;
            expect_one(n, "request", &r.id, r.version)?;
        }
        Write::InsertCheckout(c) => {
            tx.execute(
                &format!("INSERT INTO checkouts ({CHECKOUT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    c.id,
                    c.book_id,
                    c.user_id,
                    c.borrow_request_id,
                    ts(&c.checked_out_at),
                    ts(&c.due_date),
                    opt_ts(&c.returned_at),
                    c.version as i64,
                ],
            )
            .map_err(map_sql_err)?;
        }
        Write::UpdateCheckout(c) => {
            let n = tx
                .execute(
                    "UPDATE checkouts SET due_date = ?3, returned_at = ?4, version = version + 1 \
                     WHERE id = ?1 AND version = ?2",
                    params![c.id, c.version as i64, ts(&c.due_date), opt_ts(&c.returned_at)],
                )
                .map_err(map_sql_err)?;
            expect_one(n, "checkout", &c.id, c.version)?;
        }
        Write::UpdateUser(u) => {
            let n = tx
                .execute(
                    "UPDATE users SET name = ?3, email = ?4, role = ?5, version = version + 1 \
                     WHERE id = ?1 AND version = ?2",
                    params![u.id, u.version as i64, u.name, u.email, u.role.as_str()],
                )
                .map_err(map_sql_err)?;
            expect_one(n, "user", &u.id, u.version)?;
        }
    }
    Ok(())
}

/// SQLite-backed library store.
pub struct SqliteLibraryStore {
    conn: std::sync::Mutex<Connection>,
}

impl SqliteLibraryStore {
    /// Open (or create) the database at the given path and apply the schema.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Other(e.to_string()))?;
        Self::with_connection(conn)
    }

    /// Private in-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Other(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::Other(e.to_string()))?;
        Ok(Self {
            conn: std::sync::Mutex::new(conn),
        })
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Other(format!("failed to acquire lock: {}", e)))?;
        f(&conn).map_err(map_sql_err)
    }
}

#[async_trait]
impl LibraryStore for SqliteLibraryStore {
    async fn get_book(&self, id: &str) -> Result<Option<Book>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
                [id],
                book_from_row,
            )
            .optional()
        })
    }

    async fn list_books(&self, query: &BookQuery) -> Result<BookPage, StoreError> {
        let status = query.status.map(BookStatus::as_str);
        let books = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BOOK_COLUMNS} FROM books WHERE (?1 IS NULL OR status = ?1)"
            ))?;
            let rows = stmt.query_map([status], book_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })?;
        // Search, genre, and tag matching share the in-memory semantics.
        let matching = books.into_iter().filter(|b| query.matches(b)).collect();
        Ok(BookPage::paginate(matching, query))
    }

    async fn count_books(&self, status: Option<BookStatus>) -> Result<u64, StoreError> {
        let status = status.map(BookStatus::as_str);
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM books WHERE (?1 IS NULL OR status = ?1)",
                [status],
                |row| row.get::<_, i64>(0),
            )
        })
        .map(|n| n as u64)
    }

    async fn get_request(&self, id: &str) -> Result<Option<BorrowRequest>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {REQUEST_COLUMNS} FROM borrow_requests WHERE id = ?1"),
                [id],
                request_from_row,
            )
            .optional()
        })
    }

    async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<BorrowRequest>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REQUEST_COLUMNS} FROM borrow_requests \
                 WHERE (?1 IS NULL OR user_id = ?1) AND (?2 IS NULL OR book_id = ?2) \
                 AND (?3 IS NULL OR status = ?3) ORDER BY requested_at DESC, id"
            ))?;
            let rows = stmt.query_map(
                params![filter.user_id, filter.book_id, filter.status.map(|s| s.as_str())],
                request_from_row,
            )?;
            rows.collect()
        })
    }

    async fn get_checkout(&self, id: &str) -> Result<Option<Checkout>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {CHECKOUT_COLUMNS} FROM checkouts WHERE id = ?1"),
                [id],
                checkout_from_row,
            )
            .optional()
        })
    }

    async fn list_checkouts(&self, filter: &CheckoutFilter) -> Result<Vec<Checkout>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHECKOUT_COLUMNS} FROM checkouts \
                 WHERE (?1 IS NULL OR user_id = ?1) AND (?2 IS NULL OR book_id = ?2) \
                 AND (?3 = 0 OR returned_at IS NULL) AND (?4 IS NULL OR due_date < ?4) \
                 ORDER BY checked_out_at DESC, id"
            ))?;
            let rows = stmt.query_map(
                params![
                    filter.user_id,
                    filter.book_id,
                    filter.active_only,
                    opt_ts(&filter.due_before),
                ],
                checkout_from_row,
            )?;
            rows.collect()
        })
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [id],
                user_from_row,
            )
            .optional()
        })
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id"
            ))?;
            let rows = stmt.query_map([], user_from_row)?;
            rows.collect()
        })
    }

    async fn insert_user(&self, user: User) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![
                    user.id,
                    user.name,
                    user.email,
                    user.role.as_str(),
                    ts(&user.created_at),
                    user.version as i64,
                ],
            )
        })
        .map(|_| ())
    }

    async fn list_audit(&self, opts: &AuditListOptions) -> Result<Vec<AuditEntry>, StoreError> {
        let limit = opts.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
        let offset = opts.offset.unwrap_or(0);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, actor_id, book_id, action, detail, created_at FROM audit_log \
                 WHERE (?1 IS NULL OR actor_id = ?1) AND (?2 IS NULL OR book_id = ?2) \
                 AND (?3 IS NULL OR action = ?3) ORDER BY seq DESC LIMIT ?4 OFFSET ?5",
            )?;
            let rows = stmt.query_map(
                params![
                    opts.actor_id,
                    opts.book_id,
                    opts.action.map(|a| a.as_str()),
                    i64::from(limit),
                    i64::from(offset),
                ],
                audit_from_row,
            )?;
            rows.collect()
        })
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Other(format!("failed to acquire lock: {}", e)))?;
        let tx = conn.transaction().map_err(map_sql_err)?;
        for write in &changes.writes {
            // Dropping `tx` on error rolls back everything written so far.
            apply_write(&tx, write)?;
        }
        let a = &changes.audit;
        tx.execute(
            "INSERT INTO audit_log (id, actor_id, book_id, action, detail, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![a.id, a.actor_id, a.book_id, a.action.as_str(), a.detail, ts(&a.created_at)],
        )
        .map_err(map_sql_err)?;
        tx.commit().map_err(map_sql_err)?;
        tracing::debug!(writes = changes.writes.len(), action = %a.action, "sqlite commit");
        Ok(())
    }
}
