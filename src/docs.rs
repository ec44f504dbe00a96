use crate::api::announcements::{AnnouncementListResponse, CreateAnnouncement, UpdateAnnouncement};
use crate::api::attendance::{
    AttendanceListResponse, CheckInReq, CheckOutReq, CreateAttendance, MonthlySummaryResponse,
    UpdateAttendance,
};
use crate::api::dashboard::{AdminDashboard, EmployeeDashboard, MonthlyReport};
use crate::api::holidays::{CreateHoliday, UpdateHoliday};
use crate::api::requests::{CreateTimeOff, RequestListResponse, ReviewReq};
use crate::api::users::{ChangePassword, CreateUser, UserListResponse};
use crate::calendar::{AttendanceSummary, CalendarDay, DayStatus, MonthBucket};
use crate::model::announcement::Announcement;
use crate::model::attendance::{Attendance, AttendanceStatus, AttendanceWithEmployee};
use crate::model::holiday::Holiday;
use crate::model::role::Role;
use crate::model::time_off::{
    HistoryAction, LeaveType, RequestHistory, RequestKind, RequestStatus, TimeOffRequest,
};
use crate::model::user::User;
use crate::models::{LoginReqDto, RefreshReqDto, TokenPair};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance & Leave API",
        version = "1.0.0",
        description = r#"
## Attendance and Leave Management

Backend for a company attendance portal.

### 🔹 Key Features
- **Attendance**
  - Daily check-in and check-out with optional location
  - Calendar view with holidays, weekly offs and absences filled in
  - Monthly summaries and admin corrections
- **Leave & WFH**
  - Apply, withdraw, approve or reject with a full audit trail
  - Approved requests are written onto the attendance calendar
- **Holidays & Announcements**
  - Company holiday list and notice board
- **Dashboards**
  - Company overview for admins, personal overview for employees

### 🔐 Security
Endpoints under `/api` need a **JWT Bearer** access token or the
`access_token` cookie set by `/auth/login`. Admin-only operations answer
403 for employees.

### 🔔 Realtime
`GET /ws?token=<access token>` streams `attendanceUpdated`,
`holidayUpdated` and `announcement*` events so clients can refetch.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::users::create_user,
        crate::api::users::list_users,
        crate::api::users::me,
        crate::api::users::change_password,
        crate::api::users::check_email,
        crate::api::users::get_user,
        crate::api::users::update_user,
        crate::api::users::deactivate_user,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::today,
        crate::api::attendance::list_attendance,
        crate::api::attendance::attendance_calendar,
        crate::api::attendance::monthly_summary,
        crate::api::attendance::create_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::delete_attendance,

        crate::api::leave::create_leave,
        crate::api::leave::list_leave,
        crate::api::leave::get_leave,
        crate::api::leave::leave_history,
        crate::api::leave::approve_leave,
        crate::api::leave::reject_leave,
        crate::api::leave::withdraw_leave,

        crate::api::wfh::create_wfh,
        crate::api::wfh::list_wfh,
        crate::api::wfh::get_wfh,
        crate::api::wfh::wfh_history,
        crate::api::wfh::approve_wfh,
        crate::api::wfh::reject_wfh,
        crate::api::wfh::withdraw_wfh,

        crate::api::holidays::list_holidays,
        crate::api::holidays::create_holiday,
        crate::api::holidays::update_holiday,
        crate::api::holidays::delete_holiday,

        crate::api::announcements::list_announcements,
        crate::api::announcements::create_announcement,
        crate::api::announcements::update_announcement,
        crate::api::announcements::delete_announcement,

        crate::api::dashboard::admin_dashboard,
        crate::api::dashboard::employee_dashboard,
        crate::api::dashboard::monthly_report
    ),
    components(
        schemas(
            LoginReqDto,
            RefreshReqDto,
            TokenPair,
            Role,
            User,
            CreateUser,
            ChangePassword,
            UserListResponse,
            AttendanceStatus,
            Attendance,
            AttendanceWithEmployee,
            AttendanceListResponse,
            CheckInReq,
            CheckOutReq,
            CreateAttendance,
            UpdateAttendance,
            DayStatus,
            CalendarDay,
            AttendanceSummary,
            MonthlySummaryResponse,
            MonthBucket,
            RequestKind,
            RequestStatus,
            LeaveType,
            HistoryAction,
            TimeOffRequest,
            RequestHistory,
            CreateTimeOff,
            ReviewReq,
            RequestListResponse,
            Holiday,
            CreateHoliday,
            UpdateHoliday,
            Announcement,
            CreateAnnouncement,
            UpdateAnnouncement,
            AnnouncementListResponse,
            AdminDashboard,
            EmployeeDashboard,
            MonthlyReport
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token refresh and logout"),
        (name = "Users", description = "Employee accounts"),
        (name = "Attendance", description = "Check-in, check-out, calendars and corrections"),
        (name = "Leave", description = "Leave requests"),
        (name = "WFH", description = "Work-from-home requests"),
        (name = "Holidays", description = "Company holidays"),
        (name = "Announcements", description = "Notice board"),
        (name = "Dashboard", description = "Aggregated views"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_module() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        for path in [
            "/auth/login",
            "/api/users/{user_id}",
            "/api/attendances/calendar",
            "/api/leaves/{id}/approve",
            "/api/wfh/{id}/reject",
            "/api/holidays",
            "/api/announcements/{id}",
            "/api/dashboard/monthly",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }

        let schemes = &doc.components.as_ref().unwrap().security_schemes;
        assert!(schemes.contains_key("bearer_auth"));
    }
}
