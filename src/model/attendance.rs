use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Status stored on an attendance row. Holidays and weekly offs are never
/// stored; they are overlaid when a calendar is built.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Leave,
    Wfh,
}

impl TryFrom<String> for AttendanceStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    pub id: u64,
    pub user_id: u64,
    #[schema(value_type = String, format = "date", example = "2026-03-02")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, example = "2026-03-02T09:31:00")]
    pub in_time: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, example = "2026-03-02T18:02:00")]
    pub out_time: Option<NaiveDateTime>,
    #[schema(example = 8.52)]
    pub worked_hours: Option<f64>,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    pub check_in_latitude: Option<f64>,
    pub check_in_longitude: Option<f64>,
    pub check_in_address: Option<String>,
    pub check_out_latitude: Option<f64>,
    pub check_out_longitude: Option<f64>,
    pub note: Option<String>,
}

impl Attendance {
    pub fn is_checked_in(&self) -> bool {
        self.in_time.is_some() && self.out_time.is_none()
    }
}

/// Attendance row joined with the owning employee, used by list views
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceWithEmployee {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub record: Attendance,
    pub employee_name: String,
    pub employee_code: String,
}

pub const ATTENDANCE_COLUMNS: &str = "a.id, a.user_id, a.date, a.in_time, a.out_time, \
     a.worked_hours, a.status, a.check_in_latitude, a.check_in_longitude, a.check_in_address, \
     a.check_out_latitude, a.check_out_longitude, a.note";
