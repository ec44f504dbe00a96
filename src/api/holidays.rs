use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::{ApiError, ApiResult, is_unique_violation},
    model::holiday::Holiday,
    utils::holiday_cache,
    ws::{Event, EventHub},
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Deserialize, IntoParams)]
pub struct HolidayQuery {
    /// Defaults to the current year
    #[param(example = 2026)]
    pub year: Option<i32>,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct CreateHoliday {
    #[schema(value_type = String, format = "date", example = "2026-08-15")]
    pub date: NaiveDate,
    #[validate(length(min = 1, max = 128, message = "name is required"))]
    #[schema(example = "Independence Day")]
    pub name: String,
    /// Defaults to true
    pub applicable: Option<bool>,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct UpdateHoliday {
    #[schema(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 128))]
    pub name: Option<String>,
    pub applicable: Option<bool>,
}

async fn fetch_holiday(pool: &MySqlPool, id: u64) -> Result<Option<Holiday>, sqlx::Error> {
    sqlx::query_as::<_, Holiday>("SELECT id, date, name, applicable FROM holidays WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Drops cached years and tells connected clients to refetch
async fn holidays_changed(hub: &EventHub, years: &[i32]) {
    for year in years {
        holiday_cache::invalidate(*year).await;
        hub.publish(Event::HolidayUpdated { year: *year });
    }
}

fn duplicate_date(e: sqlx::Error) -> ApiError {
    if is_unique_violation(&e) {
        ApiError::Conflict("A holiday already exists on that date".into())
    } else {
        e.into()
    }
}

/// Holidays of a year
#[utoipa::path(
    get,
    path = "/api/holidays",
    params(HolidayQuery),
    responses((status = 200, description = "Holidays ordered by date", body = Vec<Holiday>)),
    security(("bearer_auth" = [])),
    tag = "Holidays"
)]
pub async fn list_holidays(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<HolidayQuery>,
) -> ApiResult<HttpResponse> {
    let year = query.year.unwrap_or_else(|| config.today().year());
    let holidays = holiday_cache::holidays_for_year(pool.get_ref(), year).await?;
    Ok(HttpResponse::Ok().json(holidays.as_ref()))
}

/// Create a holiday
#[utoipa::path(
    post,
    path = "/api/holidays",
    request_body = CreateHoliday,
    responses(
        (status = 201, description = "Holiday created", body = Holiday),
        (status = 403, description = "Admin only"),
        (status = 409, description = "A holiday already exists on that date")
    ),
    security(("bearer_auth" = [])),
    tag = "Holidays"
)]
pub async fn create_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<EventHub>,
    payload: web::Json<CreateHoliday>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    payload.validate()?;

    let id = sqlx::query("INSERT INTO holidays (date, name, applicable) VALUES (?, ?, ?)")
        .bind(payload.date)
        .bind(payload.name.trim())
        .bind(payload.applicable.unwrap_or(true))
        .execute(pool.get_ref())
        .await
        .map_err(duplicate_date)?
        .last_insert_id();

    info!(id, date = %payload.date, by = auth.user_id, "Holiday created");
    holidays_changed(&hub, &[payload.date.year()]).await;

    let holiday = fetch_holiday(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::Internal("holiday missing after insert".into()))?;
    Ok(HttpResponse::Created().json(holiday))
}

/// Update a holiday
#[utoipa::path(
    put,
    path = "/api/holidays/{id}",
    params(("id" = u64, Path, description = "Holiday id")),
    request_body = UpdateHoliday,
    responses(
        (status = 200, description = "Holiday updated", body = Holiday),
        (status = 404, description = "Holiday not found"),
        (status = 409, description = "A holiday already exists on that date")
    ),
    security(("bearer_auth" = [])),
    tag = "Holidays"
)]
pub async fn update_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<EventHub>,
    path: web::Path<u64>,
    payload: web::Json<UpdateHoliday>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    payload.validate()?;
    let id = path.into_inner();

    let current = fetch_holiday(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Holiday not found".into()))?;

    let date = payload.date.unwrap_or(current.date);
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .unwrap_or(&current.name)
        .to_string();
    let applicable = payload.applicable.unwrap_or(current.applicable);

    sqlx::query("UPDATE holidays SET date = ?, name = ?, applicable = ? WHERE id = ?")
        .bind(date)
        .bind(&name)
        .bind(applicable)
        .bind(id)
        .execute(pool.get_ref())
        .await
        .map_err(duplicate_date)?;

    info!(id, %date, by = auth.user_id, "Holiday updated");

    let mut years = vec![current.date.year()];
    if date.year() != current.date.year() {
        years.push(date.year());
    }
    holidays_changed(&hub, &years).await;

    Ok(HttpResponse::Ok().json(Holiday {
        id,
        date,
        name,
        applicable,
    }))
}

/// Delete a holiday
#[utoipa::path(
    delete,
    path = "/api/holidays/{id}",
    params(("id" = u64, Path, description = "Holiday id")),
    responses(
        (status = 200, description = "Holiday deleted", body = Object, example = json!({ "message": "Holiday deleted" })),
        (status = 404, description = "Holiday not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Holidays"
)]
pub async fn delete_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<EventHub>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let current = fetch_holiday(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Holiday not found".into()))?;

    sqlx::query("DELETE FROM holidays WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    info!(id, date = %current.date, by = auth.user_id, "Holiday deleted");
    holidays_changed(&hub, &[current.date.year()]).await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Holiday deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_must_not_be_empty() {
        let holiday: CreateHoliday =
            serde_json::from_value(json!({ "date": "2026-08-15", "name": "" })).unwrap();
        assert!(holiday.validate().is_err());

        let holiday: CreateHoliday =
            serde_json::from_value(json!({ "date": "2026-08-15", "name": "Independence Day" }))
                .unwrap();
        assert!(holiday.validate().is_ok());
        assert_eq!(holiday.applicable, None);
    }

    #[test]
    fn non_unique_errors_pass_through() {
        assert!(matches!(
            duplicate_date(sqlx::Error::RowNotFound),
            ApiError::Database(_)
        ));
    }

    #[actix_web::test]
    async fn changes_reach_subscribers() {
        let hub = EventHub::default();
        let mut rx = hub.subscribe();

        holidays_changed(&hub, &[2026]).await;

        let message = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&message).unwrap();
        assert_eq!(value["event"], "holidayUpdated");
        assert_eq!(value["payload"]["year"], 2026);
    }
}
