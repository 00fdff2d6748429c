use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tracing::{info, instrument};

use crate::auth::extractors::Session;
use crate::auth::policy::{require_admin, require_owner_or_admin};
use crate::error::{parse_id, ApiError};
use crate::response::{created, ok, Envelope, PageMeta, Paginated};
use crate::state::AppState;

use super::dto::{CreateIssueRequest, IssueDetails, IssueListQuery, UpdateIssueRequest};
use super::repo::{self, Issue, IssueFilter, IssueStatus, SortOrder};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/issues", get(list_issues))
        .route("/issues/:id", get(get_issue))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/issues", post(create_issue))
        .route("/issues/:id", put(update_issue).delete(delete_issue))
}

/// Empty query-string values behave as absent filters.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[instrument(skip(state, session))]
pub async fn list_issues(
    State(state): State<AppState>,
    session: Session,
    Query(q): Query<IssueListQuery>,
) -> Result<Json<Envelope<Paginated<IssueDetails>>>, ApiError> {
    let page = q.page.unwrap_or(1).max(1);
    let limit = q.limit.unwrap_or(state.config.page_limit).max(1);

    let status = match non_empty(q.status) {
        Some(raw) => Some(
            raw.parse::<IssueStatus>()
                .map_err(|_| ApiError::InvalidInput("Invalid status".into()))?,
        ),
        None => None,
    };

    // Non-admins only ever see their own issues; the scope is part of the
    // query itself, not a post-hoc filter.
    let filter = IssueFilter {
        status,
        area: non_empty(q.area),
        kind: non_empty(q.kind),
        search: non_empty(q.search),
        created_by: (!session.is_admin()).then_some(session.user_id),
    };
    let sort = SortOrder::from_param(q.sort.as_deref());

    let total = repo::count(&state.db, &filter).await?;
    let rows = repo::list(&state.db, &filter, limit, (page - 1) * limit, sort).await?;

    Ok(ok(Paginated {
        items: rows.into_iter().map(IssueDetails::from).collect(),
        meta: PageMeta::new(total, page, limit),
    }))
}

#[instrument(skip(state, session))]
pub async fn get_issue(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Envelope<IssueDetails>>, ApiError> {
    let issue_id = parse_id(&id)?;
    let row = repo::get_with_creator(&state.db, issue_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Issue not found".into()))?;

    require_owner_or_admin(&session, row.created_by)?;

    Ok(ok(row.into()))
}

#[instrument(skip(state, session, payload))]
pub async fn create_issue(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<CreateIssueRequest>,
) -> Result<(StatusCode, Json<Envelope<Issue>>), ApiError> {
    let new = payload.validate()?;
    let issue = repo::create(&state.db, new, session.user_id).await?;

    info!(issue_id = %issue.id, by = %session.user_id, "issue created");
    Ok(created(issue))
}

#[instrument(skip(state, session, payload))]
pub async fn update_issue(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Json(payload): Json<UpdateIssueRequest>,
) -> Result<Json<Envelope<Issue>>, ApiError> {
    let issue_id = parse_id(&id)?;
    let existing = repo::get_with_creator(&state.db, issue_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Issue not found".into()))?;

    let patch = payload.validate()?;

    if patch.status.is_some() && !session.is_admin() {
        return Err(ApiError::Forbidden("Admin required to change status".into()));
    }
    require_owner_or_admin(&session, existing.created_by)?;

    let issue = repo::update(&state.db, issue_id, patch).await?;

    info!(issue_id = %issue.id, by = %session.user_id, "issue updated");
    Ok(ok(issue))
}

#[instrument(skip(state, session))]
pub async fn delete_issue(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let issue_id = parse_id(&id)?;
    repo::get_with_creator(&state.db, issue_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Issue not found".into()))?;

    require_admin(&session)?;

    repo::delete(&state.db, issue_id).await?;

    info!(%issue_id, by = %session.user_id, "issue deleted");
    Ok(ok(json!({ "message": "Deleted" })))
}
