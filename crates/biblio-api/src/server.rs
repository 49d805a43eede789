//! Axum server and routes.

use crate::auth::AuthUser;
use crate::error::ApiError;
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use biblio_lifecycle::LibraryManager;
use biblio_types::{
    AuditEntry, BaseResponse, Book, BookDetails, BookInput, BookPage, BookQuery, BookStatus,
    BorrowRequest, BorrowRequestView, ChangeRoleRequest, Checkout, CheckoutView,
    CreateBorrowRequest, EnrichResponseData, OverdueSummary, RequestStatus, ResolveBorrowRequest,
    User, UserSummary,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub struct AppState {
    pub library: LibraryManager,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/books", get(handle_list_books).post(handle_create_book))
        .route(
            "/books/:id",
            get(handle_get_book)
                .put(handle_update_book)
                .delete(handle_delete_book),
        )
        .route("/books/:id/enrich", post(handle_enrich_book))
        .route("/requests", get(handle_list_requests).post(handle_create_request))
        .route("/requests/:id", put(handle_resolve_request))
        .route("/checkouts", get(handle_list_checkouts))
        .route("/checkouts/:id/return", post(handle_return_checkout))
        .route("/dashboard/overdue", get(handle_overdue))
        .route("/audit", get(handle_audit_list))
        .route("/users", get(handle_list_users))
        .route("/users/:id/role", put(handle_change_role))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type ApiResult<T> = Result<(StatusCode, Json<BaseResponse<T>>), ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(BaseResponse::ok(data))))
}

fn created<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(BaseResponse::created(data))))
}

/// Case-insensitive enum query parameter; blank means "no filter".
fn parse_param<T: std::str::FromStr>(raw: Option<String>) -> Result<Option<T>, ApiError>
where
    T::Err: std::fmt::Display,
{
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().parse::<T>())
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

async fn handle_health() -> &'static str {
    "ok"
}

#[derive(Debug, Default, Deserialize)]
pub struct BooksQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

async fn handle_list_books(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    query: Result<Query<BooksQuery>, QueryRejection>,
) -> ApiResult<BookPage> {
    let Query(q) = query?;
    let query = BookQuery {
        search: q.search,
        genre: q.genre,
        status: parse_param::<BookStatus>(q.status)?,
        tag: q.tag,
        page: q.page,
        limit: q.limit,
    };
    ok(state.library.store().list_books(&query).await?)
}

async fn handle_create_book(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    body: Result<Json<BookInput>, JsonRejection>,
) -> ApiResult<Book> {
    user.require_staff()?;
    let Json(input) = body?;
    created(state.library.create_book(input, &user.0).await?)
}

async fn handle_get_book(
    State(state): State<Arc<AppState>>,
    user: Option<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<BookDetails> {
    let viewer = user.as_ref().map(|u| &u.0);
    ok(state.library.book_details(&id, viewer).await?)
}

async fn handle_update_book(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    body: Result<Json<BookInput>, JsonRejection>,
) -> ApiResult<Book> {
    user.require_staff()?;
    let Json(input) = body?;
    ok(state.library.update_book(&id, input, &user.0).await?)
}

async fn handle_delete_book(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    user.require_admin()?;
    state.library.delete_book(&id, &user.0).await?;
    ok(serde_json::json!({ "id": id }))
}

async fn handle_enrich_book(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<EnrichResponseData> {
    user.require_staff()?;
    ok(state.library.enrich_book(&id, &user.0).await?)
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestsQuery {
    #[serde(default)]
    pub status: Option<String>,
}

async fn handle_list_requests(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    query: Result<Query<RequestsQuery>, QueryRejection>,
) -> ApiResult<Vec<BorrowRequestView>> {
    let Query(q) = query?;
    let status = parse_param::<RequestStatus>(q.status)?;
    ok(state.library.list_requests(&user.0, status).await?)
}

async fn handle_create_request(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    body: Result<Json<CreateBorrowRequest>, JsonRejection>,
) -> ApiResult<BorrowRequest> {
    let Json(req) = body?;
    created(state.library.submit_request(&req.book_id, &user.0).await?)
}

/// Resolved request, plus the checkout it created when approved.
#[derive(Debug, Serialize)]
pub struct ResolutionData {
    pub request: BorrowRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout: Option<Checkout>,
}

async fn handle_resolve_request(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    body: Result<Json<ResolveBorrowRequest>, JsonRejection>,
) -> ApiResult<ResolutionData> {
    user.require_staff()?;
    let Json(req) = body?;
    let resolution = state
        .library
        .resolve_request(&id, req.action, req.due_days, &user.0)
        .await?;
    ok(ResolutionData {
        request: resolution.request,
        checkout: resolution.checkout,
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutsQuery {
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub user_id: Option<String>,
}

async fn handle_list_checkouts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    query: Result<Query<CheckoutsQuery>, QueryRejection>,
) -> ApiResult<Vec<CheckoutView>> {
    let Query(q) = query?;
    let user_id = q.user_id.filter(|u| !u.is_empty());
    ok(state
        .library
        .list_checkouts(&user.0, q.active.unwrap_or(false), user_id)
        .await?)
}

async fn handle_return_checkout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Checkout> {
    user.require_staff()?;
    ok(state.library.return_book(&id, &user.0).await?)
}

async fn handle_overdue(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<OverdueSummary> {
    user.require_staff()?;
    ok(state.library.overdue_summary().await?)
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

async fn handle_audit_list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> ApiResult<Vec<AuditEntry>> {
    user.require_staff()?;
    let Query(q) = query?;
    ok(state.library.list_audit(q.limit).await?)
}

async fn handle_list_users(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Vec<UserSummary>> {
    user.require_admin()?;
    ok(state.library.user_summaries().await?)
}

async fn handle_change_role(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    body: Result<Json<ChangeRoleRequest>, JsonRejection>,
) -> ApiResult<User> {
    user.require_admin()?;
    let Json(req) = body?;
    ok(state.library.change_role(&id, req.role, &user.0).await?)
}
