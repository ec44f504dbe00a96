use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Announcement {
    pub id: u64,
    #[schema(example = "Office closed for maintenance")]
    pub title: String,
    pub body: String,
    pub created_by: u64,
    pub author_name: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: NaiveDateTime,
}

pub const ANNOUNCEMENT_COLUMNS: &str =
    "n.id, n.title, n.body, n.created_by, u.name AS author_name, n.created_at, n.updated_at";
