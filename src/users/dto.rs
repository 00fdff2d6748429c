use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{Role, User};

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// User row as returned by GET /users, with the aggregated issue count.
#[derive(Debug, Serialize)]
pub struct UserListItem {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub role: Role,
    pub created_at: OffsetDateTime,
    #[serde(rename = "issuesCount")]
    pub issues_count: i64,
}

impl UserListItem {
    pub fn from_user(user: User, issues_count: i64) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
            issues_count,
        }
    }
}
