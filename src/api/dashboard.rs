use crate::{
    api::{
        announcements::latest_announcements,
        attendance::{fetch_day, load_calendar},
        requests::count_pending,
    },
    auth::auth::AuthUser,
    calendar::{self, AttendanceSummary, MonthBucket},
    config::Config,
    error::{ApiError, ApiResult},
    model::{
        announcement::Announcement,
        attendance::{Attendance, AttendanceStatus},
        holiday::Holiday,
        time_off::RequestKind,
    },
    utils::holiday_cache,
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

const UPCOMING_HOLIDAYS: usize = 5;
const LATEST_ANNOUNCEMENTS: u32 = 3;

#[derive(Serialize, ToSchema)]
pub struct AdminDashboard {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub total_employees: i64,
    pub present: i64,
    pub wfh: i64,
    pub on_leave: i64,
    pub absent: i64,
    /// Active employees with no check-in today who are not on leave
    pub yet_to_check_in: i64,
    pub pending_leave: i64,
    pub pending_wfh: i64,
    pub is_holiday: bool,
    pub holiday_name: Option<String>,
    pub is_week_off: bool,
    pub upcoming_holidays: Vec<Holiday>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeDashboard {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub today: Option<Attendance>,
    #[schema(example = "2026-03")]
    pub month: String,
    pub month_summary: AttendanceSummary,
    pub pending_requests: i64,
    pub upcoming_holidays: Vec<Holiday>,
    pub announcements: Vec<Announcement>,
}

#[derive(Deserialize, IntoParams)]
pub struct MonthlyQuery {
    /// Defaults to the current year
    #[param(example = 2026)]
    pub year: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct MonthlyReport {
    pub year: i32,
    pub months: Vec<MonthBucket>,
}

/// Next applicable holidays starting today
async fn upcoming_holidays(pool: &MySqlPool, today: NaiveDate) -> ApiResult<Vec<Holiday>> {
    let holidays = holiday_cache::holidays_between(pool, today, today + Duration::days(365)).await?;
    Ok(holidays
        .into_iter()
        .filter(|h| h.applicable)
        .take(UPCOMING_HOLIDAYS)
        .collect())
}

/// Parses stored statuses, skipping rows written by something else
fn parse_status_rows(rows: Vec<(NaiveDate, String)>) -> Vec<(NaiveDate, AttendanceStatus)> {
    rows.into_iter()
        .filter_map(|(date, raw)| match AttendanceStatus::try_from(raw) {
            Ok(status) => Some((date, status)),
            Err(e) => {
                warn!(%date, error = %e, "Skipping attendance row with unknown status");
                None
            }
        })
        .collect()
}

/// Company overview for today
#[utoipa::path(
    get,
    path = "/api/dashboard/admin",
    responses(
        (status = 200, description = "Today's company-wide numbers", body = AdminDashboard),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn admin_dashboard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let pool = pool.get_ref();
    let today = config.today();

    let total_employees: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active = TRUE")
            .fetch_one(pool)
            .await?;

    let (present, wfh, on_leave, absent): (i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(CASE WHEN a.status = 'present' THEN 1 END),
            COUNT(CASE WHEN a.status = 'wfh' THEN 1 END),
            COUNT(CASE WHEN a.status = 'leave' THEN 1 END),
            COUNT(CASE WHEN a.status = 'absent' THEN 1 END)
        FROM attendance a
        JOIN users u ON u.id = a.user_id
        WHERE a.date = ? AND u.is_active = TRUE
        "#,
    )
    .bind(today)
    .fetch_one(pool)
    .await?;

    let yet_to_check_in: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM users u
        LEFT JOIN attendance a ON a.user_id = u.id AND a.date = ?
        WHERE u.is_active = TRUE
          AND (a.id IS NULL OR (a.in_time IS NULL AND a.status <> 'leave'))
        "#,
    )
    .bind(today)
    .fetch_one(pool)
    .await?;

    let pending_leave = count_pending(pool, Some(RequestKind::Leave), None).await?;
    let pending_wfh = count_pending(pool, Some(RequestKind::Wfh), None).await?;

    let holiday_name = holiday_cache::holidays_for_year(pool, today.year())
        .await?
        .iter()
        .find(|h| h.applicable && h.date == today)
        .map(|h| h.name.clone());

    Ok(HttpResponse::Ok().json(AdminDashboard {
        date: today,
        total_employees,
        present,
        wfh,
        on_leave,
        absent,
        yet_to_check_in,
        pending_leave,
        pending_wfh,
        is_holiday: holiday_name.is_some(),
        holiday_name,
        is_week_off: calendar::is_week_off(today),
        upcoming_holidays: upcoming_holidays(pool, today).await?,
    }))
}

/// The caller's own overview
#[utoipa::path(
    get,
    path = "/api/dashboard/employee",
    responses((status = 200, description = "Own numbers for today and this month", body = EmployeeDashboard)),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn employee_dashboard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let pool = pool.get_ref();
    let today = config.today();

    let (month_start, month_end) = calendar::month_bounds(today.year(), today.month())
        .ok_or_else(|| ApiError::Internal("invalid current month".into()))?;
    let days = load_calendar(pool, config.get_ref(), auth.user_id, month_start, month_end).await?;

    Ok(HttpResponse::Ok().json(EmployeeDashboard {
        date: today,
        today: fetch_day(pool, auth.user_id, today).await?,
        month: format!("{:04}-{:02}", today.year(), today.month()),
        month_summary: calendar::summarize(&days),
        pending_requests: count_pending(pool, None, Some(auth.user_id)).await?,
        upcoming_holidays: upcoming_holidays(pool, today).await?,
        announcements: latest_announcements(pool, LATEST_ANNOUNCEMENTS, 0).await?,
    }))
}

/// Company-wide status counts per month
#[utoipa::path(
    get,
    path = "/api/dashboard/monthly",
    params(MonthlyQuery),
    responses(
        (status = 200, description = "Twelve month buckets", body = MonthlyReport),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn monthly_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<MonthlyQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let year = query.year.unwrap_or_else(|| config.today().year());

    let (from, to) = match (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) {
        (Some(from), Some(to)) => (from, to),
        _ => return Err(ApiError::BadRequest("year out of range".into())),
    };

    let rows: Vec<(NaiveDate, String)> =
        sqlx::query_as("SELECT date, status FROM attendance WHERE date BETWEEN ? AND ?")
            .bind(from)
            .bind(to)
            .fetch_all(pool.get_ref())
            .await?;

    Ok(HttpResponse::Ok().json(MonthlyReport {
        year,
        months: calendar::bucket_by_month(year, &parse_status_rows(rows)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn unknown_statuses_are_skipped() {
        let rows = vec![
            (d("2026-01-05"), "present".to_string()),
            (d("2026-01-06"), "holiday".to_string()),
            (d("2026-02-02"), "wfh".to_string()),
        ];

        let parsed = parse_status_rows(rows);
        assert_eq!(
            parsed,
            vec![
                (d("2026-01-05"), AttendanceStatus::Present),
                (d("2026-02-02"), AttendanceStatus::Wfh),
            ]
        );

        let buckets = calendar::bucket_by_month(2026, &parsed);
        assert_eq!(buckets[0].present, 1);
        assert_eq!(buckets[1].wfh, 1);
    }
}
