use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "issue_status", rename_all = "PascalCase")]
pub enum IssueStatus {
    Pending,
    InProgress,
    Completed,
}

impl FromStr for IssueStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(IssueStatus::Pending),
            "InProgress" => Ok(IssueStatus::InProgress),
            "Completed" => Ok(IssueStatus::Completed),
            _ => Err(()),
        }
    }
}

/// Issue record as stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Issue {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub area: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub status: IssueStatus,
    pub created_by: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Issue joined with its creator's public fields.
#[derive(Debug, Clone, FromRow)]
pub struct IssueWithCreator {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub area: String,
    pub address: Option<String>,
    pub image: Option<String>,
    pub status: IssueStatus,
    pub created_by: Uuid,
    pub creator_name: Option<String>,
    pub creator_email: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Validated fields for a new issue.
#[derive(Debug)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub kind: String,
    pub area: String,
    pub address: Option<String>,
    pub image: Option<String>,
}

/// Whitelisted mutable fields; only present ones are written.
#[derive(Debug, Default)]
pub struct IssuePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub area: Option<String>,
    pub address: Option<String>,
    pub image: Option<String>,
    pub status: Option<IssueStatus>,
}

impl IssuePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.kind.is_none()
            && self.area.is_none()
            && self.address.is_none()
            && self.image.is_none()
            && self.status.is_none()
    }
}

/// Composable list filter. `created_by` is injected by the handler for
/// non-admin callers and cannot be supplied from the outside.
#[derive(Debug, Default)]
pub struct IssueFilter {
    pub status: Option<IssueStatus>,
    pub area: Option<String>,
    pub kind: Option<String>,
    pub search: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

impl SortOrder {
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("oldest") => SortOrder::Oldest,
            _ => SortOrder::Newest,
        }
    }
}

const ISSUE_WITH_CREATOR_SELECT: &str = r#"
SELECT i.id, i.title, i.description, i.type, i.area, i.address, i.image,
       i.status, i.created_by, u.name AS creator_name, u.email AS creator_email,
       i.created_at, i.updated_at
FROM issues i
JOIN users u ON u.id = i.created_by
WHERE 1=1"#;

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &IssueFilter) {
    if let Some(status) = filter.status {
        qb.push(" AND i.status = ").push_bind(status);
    }
    if let Some(area) = &filter.area {
        qb.push(" AND i.area = ").push_bind(area.clone());
    }
    if let Some(kind) = &filter.kind {
        qb.push(" AND i.type = ").push_bind(kind.clone());
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search);
        qb.push(" AND (i.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR i.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(creator) = filter.created_by {
        qb.push(" AND i.created_by = ").push_bind(creator);
    }
}

pub async fn count(db: &PgPool, filter: &IssueFilter) -> anyhow::Result<i64> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM issues i WHERE 1=1");
    push_filters(&mut qb, filter);
    let total: i64 = qb.build_query_scalar().fetch_one(db).await?;
    Ok(total)
}

pub async fn list(
    db: &PgPool,
    filter: &IssueFilter,
    limit: i64,
    offset: i64,
    sort: SortOrder,
) -> anyhow::Result<Vec<IssueWithCreator>> {
    let mut qb = QueryBuilder::new(ISSUE_WITH_CREATOR_SELECT);
    push_filters(&mut qb, filter);
    qb.push(match sort {
        SortOrder::Newest => " ORDER BY i.created_at DESC",
        SortOrder::Oldest => " ORDER BY i.created_at ASC",
    });
    qb.push(" LIMIT ").push_bind(limit);
    qb.push(" OFFSET ").push_bind(offset);

    let rows = qb
        .build_query_as::<IssueWithCreator>()
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn get_with_creator(db: &PgPool, id: Uuid) -> anyhow::Result<Option<IssueWithCreator>> {
    let mut qb = QueryBuilder::new(ISSUE_WITH_CREATOR_SELECT);
    qb.push(" AND i.id = ").push_bind(id);
    let row = qb
        .build_query_as::<IssueWithCreator>()
        .fetch_optional(db)
        .await?;
    Ok(row)
}

/// Insert a new issue. Status always starts at Pending regardless of anything
/// the caller sent.
pub async fn create(db: &PgPool, new: NewIssue, creator_id: Uuid) -> anyhow::Result<Issue> {
    let issue = sqlx::query_as::<_, Issue>(
        r#"
        INSERT INTO issues (title, description, type, area, address, image, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, title, description, type, area, address, image, status,
                  created_by, created_at, updated_at
        "#,
    )
    .bind(new.title)
    .bind(new.description)
    .bind(new.kind)
    .bind(new.area)
    .bind(new.address)
    .bind(new.image)
    .bind(creator_id)
    .fetch_one(db)
    .await?;
    Ok(issue)
}

/// Apply a partial update, field by field. Absent fields are untouched.
pub async fn update(db: &PgPool, id: Uuid, patch: IssuePatch) -> anyhow::Result<Issue> {
    let mut qb = QueryBuilder::new("UPDATE issues SET updated_at = now()");
    if let Some(title) = patch.title {
        qb.push(", title = ").push_bind(title);
    }
    if let Some(description) = patch.description {
        qb.push(", description = ").push_bind(description);
    }
    if let Some(kind) = patch.kind {
        qb.push(", type = ").push_bind(kind);
    }
    if let Some(area) = patch.area {
        qb.push(", area = ").push_bind(area);
    }
    if let Some(address) = patch.address {
        qb.push(", address = ").push_bind(address);
    }
    if let Some(image) = patch.image {
        qb.push(", image = ").push_bind(image);
    }
    if let Some(status) = patch.status {
        qb.push(", status = ").push_bind(status);
    }
    qb.push(" WHERE id = ").push_bind(id);
    qb.push(
        " RETURNING id, title, description, type, area, address, image, status, \
         created_by, created_at, updated_at",
    );

    let issue = qb.build_query_as::<Issue>().fetch_one(db).await?;
    Ok(issue)
}

pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM issues WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_exact_enum_values_only() {
        assert_eq!(IssueStatus::from_str("Pending"), Ok(IssueStatus::Pending));
        assert_eq!(
            IssueStatus::from_str("InProgress"),
            Ok(IssueStatus::InProgress)
        );
        assert_eq!(
            IssueStatus::from_str("Completed"),
            Ok(IssueStatus::Completed)
        );
        assert!(IssueStatus::from_str("pending").is_err());
        assert!(IssueStatus::from_str("Done").is_err());
        assert!(IssueStatus::from_str("").is_err());
    }

    #[test]
    fn sort_order_defaults_to_newest() {
        assert_eq!(SortOrder::from_param(None), SortOrder::Newest);
        assert_eq!(SortOrder::from_param(Some("oldest")), SortOrder::Oldest);
        assert_eq!(SortOrder::from_param(Some("anything")), SortOrder::Newest);
    }

    #[test]
    fn empty_filter_adds_no_clauses() {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM issues i WHERE 1=1");
        push_filters(&mut qb, &IssueFilter::default());
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM issues i WHERE 1=1");
    }

    #[test]
    fn full_filter_composes_all_clauses() {
        let filter = IssueFilter {
            status: Some(IssueStatus::Pending),
            area: Some("North".into()),
            kind: Some("Streetlight".into()),
            search: Some("light".into()),
            created_by: Some(Uuid::new_v4()),
        };
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM issues i WHERE 1=1");
        push_filters(&mut qb, &filter);
        let sql = qb.sql();
        assert!(sql.contains("i.status = "));
        assert!(sql.contains("i.area = "));
        assert!(sql.contains("i.type = "));
        assert!(sql.contains("i.title ILIKE "));
        assert!(sql.contains("i.description ILIKE "));
        assert!(sql.contains("i.created_by = "));
    }

    #[test]
    fn creator_scope_is_anded_alongside_other_filters() {
        // A caller-supplied filter must never replace the ownership clause.
        let filter = IssueFilter {
            search: Some("leak".into()),
            created_by: Some(Uuid::new_v4()),
            ..Default::default()
        };
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM issues i WHERE 1=1");
        push_filters(&mut qb, &filter);
        let sql = qb.sql();
        assert!(sql.contains(" AND i.created_by = "));
        assert!(sql.contains(" AND (i.title ILIKE "));
    }

    #[test]
    fn patch_knows_when_it_is_empty() {
        assert!(IssuePatch::default().is_empty());
        let patch = IssuePatch {
            status: Some(IssueStatus::Completed),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
