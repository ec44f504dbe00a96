//! Leave and work-from-home requests.
//!
//! Both kinds live in `time_off_requests` and follow the same lifecycle:
//! `pending` moves to `approved` or `rejected` exactly once. Approval writes
//! one attendance row per working day so calendars pick the request up
//! without joining against requests.

use crate::{
    auth::auth::AuthUser,
    calendar,
    config::Config,
    error::{ApiError, ApiResult, ensure_transitioned},
    model::time_off::{
        HistoryAction, LeaveType, REQUEST_COLUMNS, RequestHistory, RequestKind, RequestStatus,
        TimeOffRequest,
    },
    utils::{
        db_utils::{Filter, SqlValue, bind_query_as, bind_scalar},
        holiday_cache,
        pagination::paginate,
    },
    ws::{Event, EventHub},
};
use actix_web::HttpResponse;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTimeOff {
    /// Required for leave, ignored for WFH
    pub leave_type: Option<LeaveType>,
    #[schema(value_type = String, format = "date", example = "2026-04-06")]
    pub from_date: NaiveDate,
    #[schema(value_type = String, format = "date", example = "2026-04-07")]
    pub to_date: NaiveDate,
    #[validate(length(min = 1, max = 1000, message = "reason is required"))]
    #[schema(example = "Family function")]
    pub reason: String,
}

#[derive(Deserialize, IntoParams)]
pub struct RequestQuery {
    /// Admin only; employees always see their own requests
    pub user_id: Option<u64>,
    pub status: Option<RequestStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct RequestListResponse {
    pub data: Vec<TimeOffRequest>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct ReviewReq {
    #[validate(length(max = 500))]
    #[schema(example = "Enjoy your break")]
    pub remark: Option<String>,
}

/// Checks the payload for `kind` and returns the leave type to store
fn validate_create(kind: RequestKind, payload: &CreateTimeOff) -> ApiResult<Option<LeaveType>> {
    payload.validate()?;
    calendar::validate_range(payload.from_date, payload.to_date)?;

    if payload.reason.trim().is_empty() {
        return Err(ApiError::BadRequest("reason is required".into()));
    }

    match kind {
        RequestKind::Leave => payload
            .leave_type
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest("leave_type is required".into())),
        RequestKind::Wfh => Ok(None),
    }
}

/// Upsert applied to each working day when a request is approved. Leave
/// never overwrites a day the employee actually checked in on.
fn materialize_sql(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::Leave => {
            "INSERT INTO attendance (user_id, date, status) VALUES (?, ?, ?) \
             ON DUPLICATE KEY UPDATE status = IF(in_time IS NULL, VALUES(status), status)"
        }
        RequestKind::Wfh => {
            "INSERT INTO attendance (user_id, date, status) VALUES (?, ?, ?) \
             ON DUPLICATE KEY UPDATE status = VALUES(status)"
        }
    }
}

fn not_found(kind: RequestKind) -> ApiError {
    ApiError::NotFound(format!("{} not found", kind.label()))
}

async fn record_history(
    tx: &mut Transaction<'_, MySql>,
    request_id: u64,
    action: HistoryAction,
    actor_id: u64,
    remark: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO request_history (request_id, action, actor_id, remark) VALUES (?, ?, ?, ?)",
    )
    .bind(request_id)
    .bind(action.as_ref())
    .bind(actor_id)
    .bind(remark)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn fetch_request(
    pool: &MySqlPool,
    kind: RequestKind,
    id: u64,
) -> Result<Option<TimeOffRequest>, sqlx::Error> {
    sqlx::query_as::<_, TimeOffRequest>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM time_off_requests r JOIN users u ON u.id = r.user_id \
         WHERE r.id = ? AND r.kind = ?"
    ))
    .bind(id)
    .bind(kind.as_ref())
    .fetch_optional(pool)
    .await
}

/// Pending requests of `kind`, optionally for one user
pub async fn count_pending(
    pool: &MySqlPool,
    kind: Option<RequestKind>,
    user_id: Option<u64>,
) -> Result<i64, sqlx::Error> {
    let mut filter = Filter::new();
    filter.push("status = ?", [SqlValue::String(RequestStatus::Pending.to_string())]);
    if let Some(kind) = kind {
        filter.push("kind = ?", [SqlValue::String(kind.to_string())]);
    }
    if let Some(user_id) = user_id {
        filter.push("user_id = ?", [SqlValue::U64(user_id)]);
    }

    let sql = format!("SELECT COUNT(*) FROM time_off_requests{}", filter.where_sql());
    bind_scalar(sqlx::query_scalar::<_, i64>(&sql), filter.values())
        .fetch_one(pool)
        .await
}

pub async fn create(
    kind: RequestKind,
    auth: AuthUser,
    pool: &MySqlPool,
    payload: CreateTimeOff,
) -> ApiResult<HttpResponse> {
    let leave_type = validate_create(kind, &payload)?;

    let mut tx = pool.begin().await?;

    // serializes submissions per employee so two overlapping requests cannot both pass
    sqlx::query("SELECT id FROM users WHERE id = ? FOR UPDATE")
        .bind(auth.user_id)
        .fetch_optional(&mut *tx)
        .await?;

    // a day can carry at most one live request, whatever its kind
    let overlapping: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM time_off_requests
        WHERE user_id = ?
          AND status IN ('pending', 'approved')
          AND from_date <= ?
          AND to_date >= ?
        FOR UPDATE
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.to_date)
    .bind(payload.from_date)
    .fetch_one(&mut *tx)
    .await?;

    if overlapping > 0 {
        return Err(ApiError::Conflict(
            "An overlapping leave or WFH request already exists".into(),
        ));
    }

    let id = sqlx::query(
        r#"
        INSERT INTO time_off_requests (user_id, kind, leave_type, from_date, to_date, reason)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(kind.as_ref())
    .bind(leave_type.map(|t| t.to_string()))
    .bind(payload.from_date)
    .bind(payload.to_date)
    .bind(payload.reason.trim())
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    record_history(&mut tx, id, HistoryAction::Created, auth.user_id, None).await?;
    tx.commit().await?;

    info!(id, user_id = auth.user_id, kind = %kind, "Request submitted");

    let request = fetch_request(pool, kind, id)
        .await?
        .ok_or_else(|| not_found(kind))?;
    Ok(HttpResponse::Created().json(request))
}

pub async fn list(
    kind: RequestKind,
    auth: AuthUser,
    pool: &MySqlPool,
    query: RequestQuery,
) -> ApiResult<HttpResponse> {
    let page = paginate(query.page, query.per_page);

    let user_id = if auth.is_admin() {
        query.user_id
    } else {
        Some(auth.target_user(query.user_id)?)
    };

    let mut filter = Filter::new();
    filter.push("r.kind = ?", [SqlValue::String(kind.to_string())]);
    if let Some(user_id) = user_id {
        filter.push("r.user_id = ?", [SqlValue::U64(user_id)]);
    }
    if let Some(status) = query.status {
        filter.push("r.status = ?", [SqlValue::String(status.to_string())]);
    }

    let where_sql = filter.where_sql();

    let count_sql = format!("SELECT COUNT(*) FROM time_off_requests r{}", where_sql);
    let total = bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql), filter.values())
        .fetch_one(pool)
        .await?;

    let data_sql = format!(
        "SELECT {REQUEST_COLUMNS} FROM time_off_requests r JOIN users u ON u.id = r.user_id{} \
         ORDER BY r.created_at DESC, r.id DESC LIMIT ? OFFSET ?",
        where_sql
    );
    let data = bind_query_as(sqlx::query_as::<_, TimeOffRequest>(&data_sql), filter.values())
        .bind(page.per_page)
        .bind(page.offset)
        .fetch_all(pool)
        .await?;

    Ok(HttpResponse::Ok().json(RequestListResponse {
        data,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

pub async fn get(
    kind: RequestKind,
    auth: AuthUser,
    pool: &MySqlPool,
    id: u64,
) -> ApiResult<HttpResponse> {
    let request = fetch_request(pool, kind, id)
        .await?
        .ok_or_else(|| not_found(kind))?;
    auth.require_self_or_admin(request.user_id)?;

    Ok(HttpResponse::Ok().json(request))
}

pub async fn history(
    kind: RequestKind,
    auth: AuthUser,
    pool: &MySqlPool,
    id: u64,
) -> ApiResult<HttpResponse> {
    let request = fetch_request(pool, kind, id)
        .await?
        .ok_or_else(|| not_found(kind))?;
    auth.require_self_or_admin(request.user_id)?;

    let entries = sqlx::query_as::<_, RequestHistory>(
        r#"
        SELECT h.id, h.request_id, h.action, h.actor_id, u.name AS actor_name, h.remark, h.created_at
        FROM request_history h
        JOIN users u ON u.id = h.actor_id
        WHERE h.request_id = ?
        ORDER BY h.id
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(HttpResponse::Ok().json(entries))
}

/// Moves a pending request to `decision` and, on approval, writes the
/// attendance rows, all inside one transaction.
#[allow(clippy::too_many_arguments)]
pub async fn review(
    kind: RequestKind,
    decision: RequestStatus,
    auth: AuthUser,
    pool: &MySqlPool,
    config: &Config,
    hub: &EventHub,
    id: u64,
    review: ReviewReq,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    review.validate()?;

    let action = match decision {
        RequestStatus::Approved => HistoryAction::Approved,
        RequestStatus::Rejected => HistoryAction::Rejected,
        RequestStatus::Pending => {
            return Err(ApiError::BadRequest("A request cannot be moved back to pending".into()));
        }
    };
    let remark = review
        .remark
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());

    // request dates never change after submission, so holidays can be
    // resolved before any row lock is held
    let holidays = match decision {
        RequestStatus::Approved => {
            let request = fetch_request(pool, kind, id)
                .await?
                .ok_or_else(|| not_found(kind))?;
            holiday_cache::holidays_between(pool, request.from_date, request.to_date).await?
        }
        _ => Vec::new(),
    };

    let mut tx = pool.begin().await?;

    let (user_id, from, to): (u64, NaiveDate, NaiveDate) = sqlx::query_as(
        "SELECT user_id, from_date, to_date FROM time_off_requests WHERE id = ? AND kind = ? FOR UPDATE",
    )
    .bind(id)
    .bind(kind.as_ref())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| not_found(kind))?;

    let updated = sqlx::query(
        r#"
        UPDATE time_off_requests
        SET status = ?, reviewed_by = ?, reviewed_at = ?, review_remark = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(decision.as_ref())
    .bind(auth.user_id)
    .bind(config.now_local())
    .bind(remark)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if let Err(e) = ensure_transitioned(
        updated.rows_affected(),
        &format!("{} already processed", kind.label()),
    ) {
        warn!(id, kind = %kind, "Review of an already processed request");
        return Err(e);
    }

    record_history(&mut tx, id, action, auth.user_id, remark).await?;

    let mut days_marked = 0usize;
    if decision == RequestStatus::Approved {
        let status = kind.attendance_status();

        for date in calendar::working_days(from, to, &holidays) {
            sqlx::query(materialize_sql(kind))
                .bind(user_id)
                .bind(date)
                .bind(status.as_ref())
                .execute(&mut *tx)
                .await?;
            days_marked += 1;
        }
    }

    tx.commit().await?;

    info!(
        id,
        kind = %kind,
        decision = %decision,
        by = auth.user_id,
        days_marked,
        "Request reviewed"
    );

    if decision == RequestStatus::Approved {
        hub.publish(Event::AttendanceUpdated { user_id, from, to });
    }

    let request = fetch_request(pool, kind, id)
        .await?
        .ok_or_else(|| not_found(kind))?;
    Ok(HttpResponse::Ok().json(request))
}

/// Owner withdraws a request that nobody reviewed yet
pub async fn withdraw(
    kind: RequestKind,
    auth: AuthUser,
    pool: &MySqlPool,
    id: u64,
) -> ApiResult<HttpResponse> {
    let request = fetch_request(pool, kind, id)
        .await?
        .ok_or_else(|| not_found(kind))?;

    if request.user_id != auth.user_id {
        return Err(ApiError::Forbidden("Only the requester can withdraw a request".into()));
    }

    let deleted = sqlx::query(
        "DELETE FROM time_off_requests WHERE id = ? AND user_id = ? AND status = 'pending'",
    )
    .bind(id)
    .bind(auth.user_id)
    .execute(pool)
    .await?;

    if deleted.rows_affected() == 0 {
        return Err(ApiError::Conflict(format!("{} already processed", kind.label())));
    }

    info!(id, user_id = auth.user_id, kind = %kind, "Request withdrawn");
    Ok(HttpResponse::Ok().json(json!({ "message": format!("{} withdrawn", kind.label()) })))
}
