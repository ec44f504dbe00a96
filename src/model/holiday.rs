use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Holiday {
    pub id: u64,
    #[schema(value_type = String, format = "date", example = "2026-08-15")]
    pub date: NaiveDate,
    #[schema(example = "Independence Day")]
    pub name: String,
    /// Non-applicable holidays are listed but do not mark the calendar
    pub applicable: bool,
}
