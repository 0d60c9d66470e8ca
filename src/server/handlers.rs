//! HTTP request handlers.

use crate::access::{ContentRestrictions, SearchContext, ensure_access};
use crate::auth::AccessUpdate;
use crate::config::SearchConfig;
use crate::db::User;
use crate::error::{AppError, Result};
use crate::library::{BookDto, Page, PageRequest, SeriesDto};
use crate::opds::{self, ACQUISITION_MIME, FeedBuilder};
use crate::search::wire;
use crate::search::{BookSearch, SearchRequest, SeriesSearch};
use crate::server::AppState;
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Build a response, returning 500 on error (which shouldn't happen).
fn build_response(status: StatusCode, content_type: &str, body: impl Into<Body>) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .body(body.into())
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("Internal error"))
                .unwrap_or_default()
        })
}

/// Paging query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    /// Page index.
    pub page: Option<usize>,
    /// Page size.
    pub size: Option<usize>,
}

impl PageParams {
    fn resolve(&self, config: &SearchConfig) -> PageRequest {
        PageRequest::new(
            self.page.unwrap_or(0),
            self.size.unwrap_or(config.default_page_size),
        )
        .clamped(config.max_page_size)
    }
}

/// Parse a JSON request body. An empty body is `null`.
fn parse_body(body: &Bytes) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidRequest(format!("Invalid JSON body: {}", e)))
}

// ============================================================================
// SEARCH API
// ============================================================================

/// Search books visible to the caller.
pub async fn books_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
    body: Bytes,
) -> Result<Json<Page<BookDto>>> {
    let principal = resolve_principal(&state, &headers).await?;
    let request = wire::parse_book_search(&parse_body(&body)?)?;
    Ok(Json(search_books(&state, &principal, &request, &params)?))
}

/// Search series visible to the caller.
pub async fn series_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
    body: Bytes,
) -> Result<Json<Page<SeriesDto>>> {
    let principal = resolve_principal(&state, &headers).await?;
    let request = wire::parse_series_search(&parse_body(&body)?)?;
    Ok(Json(search_series(&state, &principal, &request, &params)?))
}

fn search_books(
    state: &AppState,
    principal: &Principal,
    request: &BookSearch,
    params: &PageParams,
) -> Result<Page<BookDto>> {
    let reads = state.read_states(principal.user.as_ref())?;
    Ok(state.catalog().search_books(
        &principal.context,
        request,
        &reads,
        &state.eval_context(),
        params.resolve(&state.config.search),
    ))
}

fn search_series(
    state: &AppState,
    principal: &Principal,
    request: &SeriesSearch,
    params: &PageParams,
) -> Result<Page<SeriesDto>> {
    let reads = state.read_states(principal.user.as_ref())?;
    Ok(state.catalog().search_series(
        &principal.context,
        request,
        &reads,
        &state.eval_context(),
        params.resolve(&state.config.search),
    ))
}

/// Get a single book. Unknown ids are 404 regardless of restrictions.
pub async fn book_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookDto>> {
    let principal = resolve_principal(&state, &headers).await?;
    let reads = state.read_states(principal.user.as_ref())?;
    let catalog = state.catalog();

    let view = catalog
        .book_view(&id, &reads)
        .ok_or_else(|| AppError::NotFound(format!("Book {}", id)))?;
    ensure_access(&principal.context, &view, &id)?;

    Ok(Json(BookDto::from(view)))
}

/// Get a single series. Unknown ids are 404 regardless of restrictions.
pub async fn series_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SeriesDto>> {
    let principal = resolve_principal(&state, &headers).await?;
    let reads = state.read_states(principal.user.as_ref())?;
    let catalog = state.catalog();

    let view = catalog
        .series_view(&id, &reads)
        .ok_or_else(|| AppError::NotFound(format!("Series {}", id)))?;
    ensure_access(&principal.context, &view, &id)?;

    Ok(Json(SeriesDto::from(view)))
}

// ============================================================================
// USERS & ADMINISTRATION
// ============================================================================

/// Current user with the restrictions derived from its settings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    /// The user.
    pub user: User,
    /// Effective restrictions.
    pub restrictions: ContentRestrictions,
    /// Authorized libraries; absent means all.
    pub authorized_library_ids: Option<BTreeSet<String>>,
}

/// Get the current user.
pub async fn users_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>> {
    let user = get_authenticated_user(&state, &headers).await?;
    let context = crate::auth::context_for(&user);

    Ok(Json(MeResponse {
        restrictions: context.restrictions().clone(),
        authorized_library_ids: context.authorized_library_ids().cloned(),
        user,
    }))
}

/// Update a user's library sharing and content restrictions (admin).
pub async fn users_update_access(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<User>> {
    require_admin(&state, &headers).await?;
    let update: AccessUpdate = serde_json::from_value(parse_body(&body)?)
        .map_err(|e| AppError::InvalidRequest(format!("Invalid access update: {}", e)))?;
    Ok(Json(state.auth.update_access(&id, update)?))
}

/// Catalog reload response.
#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    /// Series in the new snapshot.
    pub series: usize,
    /// Books in the new snapshot.
    pub books: usize,
}

/// Reload the catalog snapshot from the database (admin).
pub async fn catalog_reload(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ReloadResponse>> {
    require_admin(&state, &headers).await?;
    let catalog = state.reload_catalog()?;

    Ok(Json(ReloadResponse {
        series: catalog.series_count(),
        books: catalog.book_count(),
    }))
}

// ============================================================================
// OPDS
// ============================================================================

/// OPDS search query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct OpdsParams {
    /// Full-text terms.
    pub q: Option<String>,
    /// Condition JSON.
    pub condition: Option<String>,
    /// Page index.
    pub page: Option<usize>,
}

impl OpdsParams {
    fn condition(&self) -> Result<Option<Value>> {
        self.condition
            .as_deref()
            .map(|c| {
                serde_json::from_str(c)
                    .map_err(|e| AppError::InvalidRequest(format!("Invalid condition JSON: {}", e)))
            })
            .transpose()
    }

    fn page(&self) -> PageParams {
        PageParams {
            page: self.page,
            size: None,
        }
    }

    fn query_string(&self, page: usize) -> String {
        let mut query = format!("page={}", page);
        if let Some(q) = &self.q {
            query.push_str(&format!("&q={}", urlencoding::encode(q)));
        }
        if let Some(c) = &self.condition {
            query.push_str(&format!("&condition={}", urlencoding::encode(c)));
        }
        query
    }
}

/// OPDS book search feed.
pub async fn opds_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<OpdsParams>,
) -> Result<Response> {
    let principal = resolve_principal(&state, &headers).await?;
    let request = SearchRequest {
        condition: params
            .condition()?
            .map(|c| wire::parse_book_condition(&c))
            .transpose()?,
        full_text_search: params.q.clone(),
    };
    let page = search_books(&state, &principal, &request, &params.page())?;

    let base_url = state.base_url();
    let mut feed = FeedBuilder::new(
        format!("urn:uuid:search:{}", params.q.as_deref().unwrap_or_default()),
        format!("Search: {}", params.q.as_deref().unwrap_or_default()),
    )
    .author("shelfgate")
    .self_link(format!(
        "{}/opds/v1.2/search?{}",
        base_url,
        params.query_string(page.number)
    ))
    .search_link(format!("{}/opds/v1.2/opensearch.xml", base_url))
    .pagination(&page, |n| {
        format!("{}/opds/v1.2/search?{}", base_url, params.query_string(n))
    });

    for book in &page.content {
        feed = feed.book_entry(book, &base_url);
    }

    Ok(build_response(StatusCode::OK, ACQUISITION_MIME, feed.build()))
}

/// OPDS series feed.
pub async fn opds_series(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<OpdsParams>,
) -> Result<Response> {
    let principal = resolve_principal(&state, &headers).await?;
    let request = SearchRequest {
        condition: params
            .condition()?
            .map(|c| wire::parse_series_condition(&c))
            .transpose()?,
        full_text_search: params.q.clone(),
    };
    let page = search_series(&state, &principal, &request, &params.page())?;

    let base_url = state.base_url();
    let mut feed = FeedBuilder::new("urn:uuid:series", &state.config.server.title)
        .author("shelfgate")
        .self_link(format!(
            "{}/opds/v1.2/series?{}",
            base_url,
            params.query_string(page.number)
        ))
        .search_link(format!("{}/opds/v1.2/opensearch.xml", base_url))
        .pagination(&page, |n| {
            format!("{}/opds/v1.2/series?{}", base_url, params.query_string(n))
        });

    for series in &page.content {
        feed = feed.series_entry(series, &base_url);
    }

    Ok(build_response(StatusCode::OK, opds::NAVIGATION_MIME, feed.build()))
}

/// OpenSearch description.
pub async fn opensearch(State(state): State<AppState>) -> impl IntoResponse {
    let xml = opds::generate_opensearch(&state.config.server.title, &state.base_url());
    build_response(StatusCode::OK, "application/opensearchdescription+xml", xml)
}

// ============================================================================
// HELPERS
// ============================================================================

/// Who is calling and what they may see.
struct Principal {
    user: Option<User>,
    context: SearchContext,
}

fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
}

async fn get_authenticated_user(state: &AppState, headers: &HeaderMap) -> Result<User> {
    let token = extract_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    state
        .auth
        .authenticate(&token)?
        .ok_or_else(|| AppError::Unauthorized("Invalid API key".to_string()))
}

/// Resolve the caller. A presented key must be valid; no key at all means
/// the anonymous user when enabled.
async fn resolve_principal(state: &AppState, headers: &HeaderMap) -> Result<Principal> {
    let user = match extract_token(headers) {
        Some(_) => Some(get_authenticated_user(state, headers).await?),
        None => None,
    };
    let context = state.auth.context_for_request(user.as_ref())?;
    Ok(Principal { user, context })
}

async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<User> {
    let user = get_authenticated_user(state, headers).await?;
    if !state.auth.is_admin(&user) {
        tracing::info!(user = %user.username, "Admin route refused");
        return Err(AppError::AccessDenied);
    }
    Ok(user)
}
