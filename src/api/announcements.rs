use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::announcement::{ANNOUNCEMENT_COLUMNS, Announcement},
    utils::pagination::paginate,
    ws::{Event, EventHub},
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Deserialize, IntoParams)]
pub struct AnnouncementQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct AnnouncementListResponse {
    pub data: Vec<Announcement>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct CreateAnnouncement {
    #[validate(length(min = 1, max = 200, message = "title is required"))]
    #[schema(example = "Office closed for maintenance")]
    pub title: String,
    #[validate(length(min = 1, message = "body is required"))]
    #[schema(example = "The office stays closed on Saturday for electrical work.")]
    pub body: String,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct UpdateAnnouncement {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub body: Option<String>,
}

pub async fn fetch_announcement(
    pool: &MySqlPool,
    id: u64,
) -> Result<Option<Announcement>, sqlx::Error> {
    sqlx::query_as::<_, Announcement>(&format!(
        "SELECT {ANNOUNCEMENT_COLUMNS} FROM announcements n JOIN users u ON u.id = n.created_by \
         WHERE n.id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Newest first
pub async fn latest_announcements(
    pool: &MySqlPool,
    limit: u32,
    offset: u64,
) -> Result<Vec<Announcement>, sqlx::Error> {
    sqlx::query_as::<_, Announcement>(&format!(
        "SELECT {ANNOUNCEMENT_COLUMNS} FROM announcements n JOIN users u ON u.id = n.created_by \
         ORDER BY n.created_at DESC, n.id DESC LIMIT ? OFFSET ?"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Paginated announcements, newest first
#[utoipa::path(
    get,
    path = "/api/announcements",
    params(AnnouncementQuery),
    responses((status = 200, description = "Announcements", body = AnnouncementListResponse)),
    security(("bearer_auth" = [])),
    tag = "Announcements"
)]
pub async fn list_announcements(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AnnouncementQuery>,
) -> ApiResult<HttpResponse> {
    let page = paginate(query.page, query.per_page);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM announcements")
        .fetch_one(pool.get_ref())
        .await?;
    let data = latest_announcements(pool.get_ref(), page.per_page, page.offset).await?;

    Ok(HttpResponse::Ok().json(AnnouncementListResponse {
        data,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

/// Publish an announcement
#[utoipa::path(
    post,
    path = "/api/announcements",
    request_body = CreateAnnouncement,
    responses(
        (status = 201, description = "Announcement created", body = Announcement),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Announcements"
)]
pub async fn create_announcement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<EventHub>,
    payload: web::Json<CreateAnnouncement>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    payload.validate()?;

    let id = sqlx::query("INSERT INTO announcements (title, body, created_by) VALUES (?, ?, ?)")
        .bind(payload.title.trim())
        .bind(&payload.body)
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await?
        .last_insert_id();

    info!(id, by = auth.user_id, "Announcement created");
    hub.publish(Event::AnnouncementCreated { id });

    let announcement = fetch_announcement(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::Internal("announcement missing after insert".into()))?;
    Ok(HttpResponse::Created().json(announcement))
}

/// Edit an announcement
#[utoipa::path(
    put,
    path = "/api/announcements/{id}",
    params(("id" = u64, Path, description = "Announcement id")),
    request_body = UpdateAnnouncement,
    responses(
        (status = 200, description = "Announcement updated", body = Announcement),
        (status = 404, description = "Announcement not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Announcements"
)]
pub async fn update_announcement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<EventHub>,
    path: web::Path<u64>,
    payload: web::Json<UpdateAnnouncement>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    payload.validate()?;
    let id = path.into_inner();

    let current = fetch_announcement(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Announcement not found".into()))?;

    let title = payload.title.as_deref().map(str::trim).unwrap_or(&current.title);
    let body = payload.body.as_deref().unwrap_or(&current.body);

    sqlx::query("UPDATE announcements SET title = ?, body = ? WHERE id = ?")
        .bind(title)
        .bind(body)
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    info!(id, by = auth.user_id, "Announcement updated");
    hub.publish(Event::AnnouncementUpdated { id });

    let announcement = fetch_announcement(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Announcement not found".into()))?;
    Ok(HttpResponse::Ok().json(announcement))
}

/// Remove an announcement
#[utoipa::path(
    delete,
    path = "/api/announcements/{id}",
    params(("id" = u64, Path, description = "Announcement id")),
    responses(
        (status = 200, description = "Announcement deleted", body = Object, example = json!({ "message": "Announcement deleted" })),
        (status = 404, description = "Announcement not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Announcements"
)]
pub async fn delete_announcement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<EventHub>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let deleted = sqlx::query("DELETE FROM announcements WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(ApiError::NotFound("Announcement not found".into()));
    }

    info!(id, by = auth.user_id, "Announcement deleted");
    hub.publish(Event::AnnouncementDeleted { id });

    Ok(HttpResponse::Ok().json(json!({ "message": "Announcement deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_and_body_are_required() {
        let empty = CreateAnnouncement {
            title: String::new(),
            body: String::new(),
        };
        let errors = empty.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("body"));
    }

    #[test]
    fn partial_update_validates_present_fields_only() {
        let update = UpdateAnnouncement {
            title: None,
            body: Some("Updated body".into()),
        };
        assert!(update.validate().is_ok());

        let update = UpdateAnnouncement {
            title: Some(String::new()),
            body: None,
        };
        assert!(update.validate().is_err());
    }
}
