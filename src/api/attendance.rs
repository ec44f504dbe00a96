use crate::{
    auth::auth::AuthUser,
    calendar::{self, AttendanceSummary, CalendarDay},
    config::Config,
    error::{ApiError, ApiResult, conflict_on_duplicate, ensure_transitioned},
    model::attendance::{ATTENDANCE_COLUMNS, Attendance, AttendanceStatus, AttendanceWithEmployee},
    utils::{
        db_utils::{Filter, SqlValue, bind_query_as, bind_scalar},
        holiday_cache,
        pagination::paginate,
    },
    ws::{Event, EventHub},
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct CheckInReq {
    #[validate(range(min = -90.0, max = 90.0))]
    #[schema(example = 12.9716)]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    #[schema(example = 77.5946)]
    pub longitude: Option<f64>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct CheckOutReq {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

#[derive(Deserialize, IntoParams)]
pub struct AttendanceQuery {
    /// Admins may filter by any employee; employees only see themselves
    pub user_id: Option<u64>,
    #[param(value_type = Option<String>, example = "2026-03-01")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, example = "2026-03-01")]
    pub to: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<AttendanceWithEmployee>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Deserialize, IntoParams)]
pub struct CalendarQuery {
    pub user_id: Option<u64>,
    /// Defaults to the first day of the current month
    #[param(value_type = Option<String>, example = "2026-03-01")]
    pub from: Option<NaiveDate>,
    /// Defaults to the last day of the current month
    #[param(value_type = Option<String>, example = "2026-03-01")]
    pub to: Option<NaiveDate>,
}

#[derive(Deserialize, IntoParams)]
pub struct SummaryQuery {
    pub user_id: Option<u64>,
    /// `YYYY-MM`, defaults to the current month
    #[param(example = "2026-03")]
    pub month: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct MonthlySummaryResponse {
    pub user_id: u64,
    #[schema(example = "2026-03")]
    pub month: String,
    #[serde(flatten)]
    pub summary: AttendanceSummary,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct CreateAttendance {
    pub user_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[schema(value_type = Option<String>, example = "2026-03-02T09:30:00")]
    pub in_time: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, example = "2026-03-02T18:00:00")]
    pub out_time: Option<NaiveDateTime>,
    #[validate(length(max = 255))]
    pub note: Option<String>,
}

/// Omitted fields keep their stored value
#[derive(Deserialize, Validate, ToSchema)]
pub struct UpdateAttendance {
    pub status: Option<AttendanceStatus>,
    #[schema(value_type = Option<String>)]
    pub in_time: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>)]
    pub out_time: Option<NaiveDateTime>,
    #[validate(length(max = 255))]
    pub note: Option<String>,
}

/// Worked hours for a pair of stamps; `None` while the day is still open
fn checked_hours(
    in_time: Option<NaiveDateTime>,
    out_time: Option<NaiveDateTime>,
) -> ApiResult<Option<f64>> {
    match (in_time, out_time) {
        (None, Some(_)) => Err(ApiError::BadRequest("out_time requires in_time".into())),
        (Some(i), Some(o)) if o < i => {
            Err(ApiError::BadRequest("out_time must not be before in_time".into()))
        }
        (Some(i), Some(o)) => Ok(Some(calendar::worked_hours(i, o))),
        _ => Ok(None),
    }
}

pub async fn fetch_day(
    pool: &MySqlPool,
    user_id: u64,
    date: NaiveDate,
) -> Result<Option<Attendance>, sqlx::Error> {
    sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance a WHERE a.user_id = ? AND a.date = ?"
    ))
    .bind(user_id)
    .bind(date)
    .fetch_optional(pool)
    .await
}

async fn fetch_by_id(pool: &MySqlPool, id: u64) -> Result<Option<Attendance>, sqlx::Error> {
    sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance a WHERE a.id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

async fn joining_date(pool: &MySqlPool, user_id: u64) -> ApiResult<Option<NaiveDate>> {
    let row: Option<Option<NaiveDate>> =
        sqlx::query_scalar("SELECT joining_date FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    row.ok_or_else(|| ApiError::NotFound("User not found".into()))
}

/// Reconciled per-day view of one employee between `from` and `to`
pub async fn load_calendar(
    pool: &MySqlPool,
    config: &Config,
    user_id: u64,
    from: NaiveDate,
    to: NaiveDate,
) -> ApiResult<Vec<CalendarDay>> {
    calendar::validate_range(from, to)?;
    let joined_on = joining_date(pool, user_id).await?;

    let records = sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance a \
         WHERE a.user_id = ? AND a.date BETWEEN ? AND ? ORDER BY a.date"
    ))
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    let holidays = holiday_cache::holidays_between(pool, from, to).await?;

    debug!(user_id, %from, %to, records = records.len(), "Reconciling calendar");
    Ok(calendar::reconcile(
        from,
        to,
        &records,
        &holidays,
        config.today(),
        joined_on,
    ))
}

fn current_month(config: &Config) -> ApiResult<(NaiveDate, NaiveDate)> {
    let today = config.today();
    calendar::month_bounds(today.year(), today.month())
        .ok_or_else(|| ApiError::Internal("invalid current month".into()))
}

/// Empty body means "no location"; anything else must be well-formed JSON
fn optional_body<T: DeserializeOwned + Default>(body: &[u8]) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))
}

/// What a check-in does with today's row, if any
#[derive(Debug, PartialEq)]
enum CheckIn {
    Insert,
    Stamp { id: u64, status: AttendanceStatus },
}

fn plan_check_in(existing: Option<&Attendance>) -> ApiResult<CheckIn> {
    match existing {
        None => Ok(CheckIn::Insert),
        Some(row) if row.in_time.is_some() => {
            Err(ApiError::Conflict("Already checked in today".into()))
        }
        Some(row) if row.status == AttendanceStatus::Leave => {
            Err(ApiError::BadRequest("You are on approved leave today".into()))
        }
        // wfh days keep their label, anything else becomes a present day
        Some(row) => Ok(CheckIn::Stamp {
            id: row.id,
            status: match row.status {
                AttendanceStatus::Wfh => AttendanceStatus::Wfh,
                _ => AttendanceStatus::Present,
            },
        }),
    }
}

/// Check in for today
#[utoipa::path(
    post,
    path = "/api/attendances/check-in",
    request_body(content = CheckInReq, description = "Optional location"),
    responses(
        (status = 200, description = "Checked in", body = Attendance),
        (status = 400, description = "On approved leave today"),
        (status = 409, description = "Already checked in today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    hub: web::Data<EventHub>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    let location: CheckInReq = optional_body(&body)?;
    location.validate()?;

    let today = config.today();
    let now = config.now_local();

    let existing = fetch_day(pool.get_ref(), auth.user_id, today).await?;
    match plan_check_in(existing.as_ref())? {
        CheckIn::Insert => {
            let result = sqlx::query(
                r#"
                INSERT INTO attendance
                    (user_id, date, in_time, status, check_in_latitude, check_in_longitude, check_in_address)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(auth.user_id)
            .bind(today)
            .bind(now)
            .bind(AttendanceStatus::Present.as_ref())
            .bind(location.latitude)
            .bind(location.longitude)
            .bind(&location.address)
            .execute(pool.get_ref())
            .await;

            // a concurrent check-in for the same day lost the race
            conflict_on_duplicate(result, "Already checked in today")?;
        }
        CheckIn::Stamp { id, status } => {
            let result = sqlx::query(
                r#"
                UPDATE attendance
                SET in_time = ?, status = ?, check_in_latitude = ?, check_in_longitude = ?, check_in_address = ?
                WHERE id = ? AND in_time IS NULL
                "#,
            )
            .bind(now)
            .bind(status.as_ref())
            .bind(location.latitude)
            .bind(location.longitude)
            .bind(&location.address)
            .bind(id)
            .execute(pool.get_ref())
            .await?;

            ensure_transitioned(result.rows_affected(), "Already checked in today")?;
        }
    }

    info!(user_id = auth.user_id, %today, "Checked in");
    hub.publish(Event::attendance_on(auth.user_id, today));

    let record = fetch_day(pool.get_ref(), auth.user_id, today)
        .await?
        .ok_or_else(|| ApiError::Internal("attendance row missing after check-in".into()))?;
    Ok(HttpResponse::Ok().json(record))
}

/// Check out for today
#[utoipa::path(
    put,
    path = "/api/attendances/check-out",
    request_body(content = CheckOutReq, description = "Optional location"),
    responses(
        (status = 200, description = "Checked out", body = Attendance),
        (status = 400, description = "No active check-in found for today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    hub: web::Data<EventHub>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    let location: CheckOutReq = optional_body(&body)?;
    location.validate()?;

    let today = config.today();
    let now = config.now_local();

    let row = fetch_day(pool.get_ref(), auth.user_id, today)
        .await?
        .filter(Attendance::is_checked_in)
        .ok_or_else(|| ApiError::BadRequest("No active check-in found for today".into()))?;

    let hours = checked_hours(row.in_time, Some(now))?;

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET out_time = ?, worked_hours = ?, check_out_latitude = ?, check_out_longitude = ?
        WHERE id = ? AND out_time IS NULL
        "#,
    )
    .bind(now)
    .bind(hours)
    .bind(location.latitude)
    .bind(location.longitude)
    .bind(row.id)
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::BadRequest("No active check-in found for today".into()));
    }

    info!(user_id = auth.user_id, %today, worked_hours = ?hours, "Checked out");
    hub.publish(Event::attendance_on(auth.user_id, today));

    let record = fetch_by_id(pool.get_ref(), row.id)
        .await?
        .ok_or_else(|| ApiError::Internal("attendance row missing after check-out".into()))?;
    Ok(HttpResponse::Ok().json(record))
}

/// Caller's attendance row for today, or null
#[utoipa::path(
    get,
    path = "/api/attendances/today",
    responses((status = 200, description = "Today's row, or null before check-in", body = Attendance)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn today(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let record = fetch_day(pool.get_ref(), auth.user_id, config.today()).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Paginated attendance rows with employee name and id
#[utoipa::path(
    get,
    path = "/api/attendances",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Attendance list", body = AttendanceListResponse),
        (status = 403, description = "Employees may only list their own rows")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> ApiResult<HttpResponse> {
    let page = paginate(query.page, query.per_page);

    let user_id = if auth.is_admin() {
        query.user_id
    } else {
        Some(auth.target_user(query.user_id)?)
    };

    let mut filter = Filter::new();
    if let Some(user_id) = user_id {
        filter.push("a.user_id = ?", [SqlValue::U64(user_id)]);
    }
    if let Some(from) = query.from {
        filter.push("a.date >= ?", [SqlValue::Date(from)]);
    }
    if let Some(to) = query.to {
        filter.push("a.date <= ?", [SqlValue::Date(to)]);
    }
    if let Some(status) = query.status {
        filter.push("a.status = ?", [SqlValue::String(status.to_string())]);
    }

    let where_sql = filter.where_sql();

    let count_sql = format!("SELECT COUNT(*) FROM attendance a{}", where_sql);
    let total = bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql), filter.values())
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT {ATTENDANCE_COLUMNS}, u.name AS employee_name, u.employee_id AS employee_code \
         FROM attendance a JOIN users u ON u.id = a.user_id{} \
         ORDER BY a.date DESC, a.id DESC LIMIT ? OFFSET ?",
        where_sql
    );
    let data = bind_query_as(
        sqlx::query_as::<_, AttendanceWithEmployee>(&data_sql),
        filter.values(),
    )
    .bind(page.per_page)
    .bind(page.offset)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

/// Day-by-day calendar with holidays, weekly offs and absences filled in
#[utoipa::path(
    get,
    path = "/api/attendances/calendar",
    params(CalendarQuery),
    responses(
        (status = 200, description = "One entry per day", body = Vec<CalendarDay>),
        (status = 400, description = "Invalid range"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_calendar(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<CalendarQuery>,
) -> ApiResult<HttpResponse> {
    let user_id = auth.target_user(query.user_id)?;
    let (month_start, month_end) = current_month(config.get_ref())?;
    let from = query.from.unwrap_or(month_start);
    let to = query.to.unwrap_or(month_end);

    let days = load_calendar(pool.get_ref(), config.get_ref(), user_id, from, to).await?;
    Ok(HttpResponse::Ok().json(days))
}

/// Month totals derived from the reconciled calendar
#[utoipa::path(
    get,
    path = "/api/attendances/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Monthly summary", body = MonthlySummaryResponse),
        (status = 400, description = "Invalid month")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn monthly_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<SummaryQuery>,
) -> ApiResult<HttpResponse> {
    let user_id = auth.target_user(query.user_id)?;

    let (year, month) = match query.month.as_deref() {
        Some(raw) => calendar::parse_month(raw)
            .ok_or_else(|| ApiError::BadRequest("month must be YYYY-MM".into()))?,
        None => {
            let today = config.today();
            (today.year(), today.month())
        }
    };
    let (from, to) = calendar::month_bounds(year, month)
        .ok_or_else(|| ApiError::BadRequest("month out of range".into()))?;

    let days = load_calendar(pool.get_ref(), config.get_ref(), user_id, from, to).await?;

    Ok(HttpResponse::Ok().json(MonthlySummaryResponse {
        user_id,
        month: format!("{year:04}-{month:02}"),
        summary: calendar::summarize(&days),
    }))
}

/// Admin: record attendance for any employee and date
#[utoipa::path(
    post,
    path = "/api/attendances",
    request_body = CreateAttendance,
    responses(
        (status = 201, description = "Attendance created", body = Attendance),
        (status = 404, description = "User not found"),
        (status = 409, description = "A record already exists for that day")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn create_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<EventHub>,
    payload: web::Json<CreateAttendance>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    payload.validate()?;

    let hours = checked_hours(payload.in_time, payload.out_time)?;

    // surfaces a missing employee as 404 instead of a foreign key error
    joining_date(pool.get_ref(), payload.user_id).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO attendance (user_id, date, in_time, out_time, worked_hours, status, note)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.user_id)
    .bind(payload.date)
    .bind(payload.in_time)
    .bind(payload.out_time)
    .bind(hours)
    .bind(payload.status.as_ref())
    .bind(&payload.note)
    .execute(pool.get_ref())
    .await;

    let id = conflict_on_duplicate(result, "Attendance already recorded for that day")?
        .last_insert_id();

    info!(id, user_id = payload.user_id, date = %payload.date, by = auth.user_id, "Attendance created");
    hub.publish(Event::attendance_on(payload.user_id, payload.date));

    let record = fetch_by_id(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::Internal("attendance row missing after insert".into()))?;
    Ok(HttpResponse::Created().json(record))
}

/// Admin: correct status, stamps or note; worked hours are recomputed
#[utoipa::path(
    put,
    path = "/api/attendances/{id}",
    params(("id" = u64, Path, description = "Attendance id")),
    request_body = UpdateAttendance,
    responses(
        (status = 200, description = "Attendance updated", body = Attendance),
        (status = 400, description = "Inconsistent stamps"),
        (status = 404, description = "Attendance not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn update_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<EventHub>,
    path: web::Path<u64>,
    payload: web::Json<UpdateAttendance>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    payload.validate()?;
    let id = path.into_inner();

    let current = fetch_by_id(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Attendance not found".into()))?;

    let status = payload.status.unwrap_or(current.status);
    let in_time = payload.in_time.or(current.in_time);
    let out_time = payload.out_time.or(current.out_time);
    let note = payload.note.clone().or(current.note);
    let hours = checked_hours(in_time, out_time)?;

    sqlx::query(
        r#"
        UPDATE attendance
        SET status = ?, in_time = ?, out_time = ?, worked_hours = ?, note = ?
        WHERE id = ?
        "#,
    )
    .bind(status.as_ref())
    .bind(in_time)
    .bind(out_time)
    .bind(hours)
    .bind(&note)
    .bind(id)
    .execute(pool.get_ref())
    .await?;

    info!(id, by = auth.user_id, "Attendance updated");
    hub.publish(Event::attendance_on(current.user_id, current.date));

    let record = fetch_by_id(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Attendance not found".into()))?;
    Ok(HttpResponse::Ok().json(record))
}

/// Admin: delete an attendance row
#[utoipa::path(
    delete,
    path = "/api/attendances/{id}",
    params(("id" = u64, Path, description = "Attendance id")),
    responses(
        (status = 200, description = "Attendance deleted", body = Object, example = json!({ "message": "Attendance deleted" })),
        (status = 404, description = "Attendance not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn delete_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<EventHub>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let current = fetch_by_id(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Attendance not found".into()))?;

    sqlx::query("DELETE FROM attendance WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    info!(id, by = auth.user_id, "Attendance deleted");
    hub.publish(Event::attendance_on(current.user_id, current.date));

    Ok(HttpResponse::Ok().json(json!({ "message": "Attendance deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    #[test]
    fn hours_need_both_stamps() {
        assert_eq!(checked_hours(None, None).unwrap(), None);
        assert_eq!(checked_hours(Some(t("2026-03-02T09:00:00")), None).unwrap(), None);
        assert_eq!(
            checked_hours(Some(t("2026-03-02T09:00:00")), Some(t("2026-03-02T17:30:00"))).unwrap(),
            Some(8.5)
        );
    }

    #[test]
    fn rejects_out_before_in_or_without_in() {
        assert!(matches!(
            checked_hours(None, Some(t("2026-03-02T17:00:00"))),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            checked_hours(Some(t("2026-03-02T17:00:00")), Some(t("2026-03-02T09:00:00"))),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn location_is_range_checked() {
        let ok = CheckInReq {
            latitude: Some(12.97),
            longitude: Some(77.59),
            address: None,
        };
        assert!(ok.validate().is_ok());

        let bad = CheckInReq {
            latitude: Some(120.0),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    fn row(status: AttendanceStatus, in_time: Option<&str>) -> Attendance {
        Attendance {
            id: 9,
            user_id: 7,
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            in_time: in_time.map(t),
            out_time: None,
            worked_hours: None,
            status,
            check_in_latitude: None,
            check_in_longitude: None,
            check_in_address: None,
            check_out_latitude: None,
            check_out_longitude: None,
            note: None,
        }
    }

    #[test]
    fn one_check_in_per_day() {
        assert_eq!(plan_check_in(None).unwrap(), CheckIn::Insert);

        let checked_in = row(AttendanceStatus::Present, Some("2026-03-02T09:05:00"));
        assert!(matches!(
            plan_check_in(Some(&checked_in)),
            Err(ApiError::Conflict(_))
        ));

        let wfh_done = row(AttendanceStatus::Wfh, Some("2026-03-02T09:05:00"));
        assert!(matches!(plan_check_in(Some(&wfh_done)), Err(ApiError::Conflict(_))));
    }

    #[test]
    fn check_in_on_materialized_rows() {
        let leave = row(AttendanceStatus::Leave, None);
        assert!(matches!(plan_check_in(Some(&leave)), Err(ApiError::BadRequest(_))));

        let wfh = row(AttendanceStatus::Wfh, None);
        assert_eq!(
            plan_check_in(Some(&wfh)).unwrap(),
            CheckIn::Stamp { id: 9, status: AttendanceStatus::Wfh }
        );

        let absent = row(AttendanceStatus::Absent, None);
        assert_eq!(
            plan_check_in(Some(&absent)).unwrap(),
            CheckIn::Stamp { id: 9, status: AttendanceStatus::Present }
        );
    }

    #[test]
    fn empty_body_means_no_location() {
        let req: CheckInReq = optional_body(b"").unwrap();
        assert!(req.latitude.is_none() && req.address.is_none());

        let req: CheckOutReq = optional_body(b"  \n").unwrap();
        assert!(req.longitude.is_none());

        let req: CheckInReq = optional_body(br#"{"latitude": 12.97}"#).unwrap();
        assert_eq!(req.latitude, Some(12.97));
    }

    #[test]
    fn malformed_body_is_rejected() {
        assert!(matches!(
            optional_body::<CheckInReq>(br#"{"latitude": "abc"}"#),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            optional_body::<CheckOutReq>(b"{not json"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn status_filter_parses_lowercase() {
        let query: AttendanceQuery =
            serde_json::from_value(json!({ "status": "wfh", "user_id": 3 })).unwrap();
        assert_eq!(query.status, Some(AttendanceStatus::Wfh));
        assert_eq!(query.user_id, Some(3));
    }
}
