use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::attendance::AttendanceStatus;

/// Leave and work-from-home requests share one table and one lifecycle
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RequestKind {
    Leave,
    Wfh,
}

impl RequestKind {
    /// Status written on each working day once a request is approved
    pub fn attendance_status(self) -> AttendanceStatus {
        match self {
            RequestKind::Leave => AttendanceStatus::Leave,
            RequestKind::Wfh => AttendanceStatus::Wfh,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RequestKind::Leave => "Leave request",
            RequestKind::Wfh => "WFH request",
        }
    }
}

impl TryFrom<String> for RequestKind {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl TryFrom<String> for RequestStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Casual,
    Sick,
    Earned,
    Unpaid,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HistoryAction {
    Created,
    Approved,
    Rejected,
}

impl TryFrom<String> for HistoryAction {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct TimeOffRequest {
    pub id: u64,
    pub user_id: u64,
    pub employee_name: String,
    pub employee_code: String,
    #[sqlx(try_from = "String")]
    pub kind: RequestKind,
    #[schema(example = "sick")]
    pub leave_type: Option<String>,
    #[schema(value_type = String, format = "date", example = "2026-04-06")]
    pub from_date: NaiveDate,
    #[schema(value_type = String, format = "date", example = "2026-04-07")]
    pub to_date: NaiveDate,
    pub reason: String,
    #[sqlx(try_from = "String")]
    pub status: RequestStatus,
    pub reviewed_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub reviewed_at: Option<NaiveDateTime>,
    pub review_remark: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

pub const REQUEST_COLUMNS: &str = "r.id, r.user_id, u.name AS employee_name, \
     u.employee_id AS employee_code, r.kind, r.leave_type, r.from_date, r.to_date, r.reason, \
     r.status, r.reviewed_by, r.reviewed_at, r.review_remark, r.created_at";

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct RequestHistory {
    pub id: u64,
    pub request_id: u64,
    #[sqlx(try_from = "String")]
    pub action: HistoryAction,
    pub actor_id: u64,
    pub actor_name: String,
    pub remark: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}
