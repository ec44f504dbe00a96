use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use utoipa::ToSchema;

use super::role::Role;

/// Employee record as exposed over the API; the password hash never leaves
/// the login path (see `models::UserSql`).
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct User {
    #[schema(example = 7)]
    pub id: u64,
    #[schema(example = "EMP-2026-0007")]
    pub employee_id: String,
    #[schema(example = "Asha Rao")]
    pub name: String,
    #[schema(example = "asha.rao@company.com")]
    pub email: String,
    #[sqlx(rename = "role_id", try_from = "u8")]
    pub role: Role,
    pub designation: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    #[schema(value_type = Option<String>, format = "date", example = "2026-01-05")]
    pub joining_date: Option<NaiveDate>,
    pub is_active: bool,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_login_at: Option<NaiveDateTime>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

/// Column list matching `User`, shared by every query that loads one
pub const USER_COLUMNS: &str = "id, employee_id, name, email, role_id, designation, department, \
     phone, joining_date, is_active, last_login_at, created_at";
