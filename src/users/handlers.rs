use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::extractors::Session;
use crate::auth::policy::require_admin;
use crate::error::{parse_id, ApiError};
use crate::response::{ok, ok_empty, Envelope, PageMeta, Paginated};
use crate::state::AppState;

use super::dto::{UserListItem, UserListQuery};
use super::repo::User;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", delete(delete_user))
}

#[instrument(skip(state, session))]
pub async fn list_users(
    State(state): State<AppState>,
    session: Session,
    Query(q): Query<UserListQuery>,
) -> Result<Json<Envelope<Paginated<UserListItem>>>, ApiError> {
    require_admin(&session)?;

    let page = q.page.unwrap_or(1).max(1);
    let limit = q.limit.unwrap_or(state.config.page_limit).max(1);

    let total = User::count_all(&state.db).await?;
    let users = User::list(&state.db, limit, (page - 1) * limit).await?;

    let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
    let counts: HashMap<Uuid, i64> = User::issue_counts(&state.db, &ids)
        .await?
        .into_iter()
        .collect();

    let items = users
        .into_iter()
        .map(|u| {
            let count = counts.get(&u.id).copied().unwrap_or(0);
            UserListItem::from_user(u, count)
        })
        .collect();

    Ok(ok(Paginated {
        items,
        meta: PageMeta::new(total, page, limit),
    }))
}

#[instrument(skip(state, session))]
pub async fn delete_user(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    require_admin(&session)?;

    let user_id = parse_id(&id)?;
    User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    User::delete_cascade(&state.db, user_id).await?;

    info!(%user_id, by = %session.user_id, "user deleted with issues");
    Ok(ok_empty())
}
