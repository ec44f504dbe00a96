use crate::{
    api::requests::{self, CreateTimeOff, RequestQuery, ReviewReq},
    auth::auth::AuthUser,
    config::Config,
    error::ApiResult,
    model::time_off::{RequestKind, RequestStatus},
    ws::EventHub,
};
use actix_web::{HttpResponse, web};
use sqlx::MySqlPool;

const KIND: RequestKind = RequestKind::Leave;

/// Submit a leave request for the caller
#[utoipa::path(
    post,
    path = "/api/leaves",
    request_body = CreateTimeOff,
    responses(
        (status = 201, description = "Request submitted", body = crate::model::time_off::TimeOffRequest),
        (status = 400, description = "Invalid dates or missing fields"),
        (status = 409, description = "Overlaps an existing pending or approved request")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateTimeOff>,
) -> ApiResult<HttpResponse> {
    requests::create(KIND, auth, pool.get_ref(), payload.into_inner()).await
}

/// List leave requests; employees only see their own
#[utoipa::path(
    get,
    path = "/api/leaves",
    params(RequestQuery),
    responses((status = 200, description = "Paginated requests", body = crate::api::requests::RequestListResponse)),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn list_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<RequestQuery>,
) -> ApiResult<HttpResponse> {
    requests::list(KIND, auth, pool.get_ref(), query.into_inner()).await
}

/// Get one leave request (owner or admin)
#[utoipa::path(
    get,
    path = "/api/leaves/{id}",
    params(("id" = u64, Path, description = "Request id")),
    responses(
        (status = 200, description = "Request found", body = crate::model::time_off::TimeOffRequest),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    requests::get(KIND, auth, pool.get_ref(), path.into_inner()).await
}

/// Audit trail of a leave request
#[utoipa::path(
    get,
    path = "/api/leaves/{id}/history",
    params(("id" = u64, Path, description = "Request id")),
    responses(
        (status = 200, description = "History entries, oldest first", body = Vec<crate::model::time_off::RequestHistory>),
        (status = 404, description = "Request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    requests::history(KIND, auth, pool.get_ref(), path.into_inner()).await
}

/// Approve a pending leave request
#[utoipa::path(
    put,
    path = "/api/leaves/{id}/approve",
    params(("id" = u64, Path, description = "Request id")),
    request_body(content = ReviewReq, description = "Optional remark"),
    responses(
        (status = 200, description = "Request approved", body = crate::model::time_off::TimeOffRequest),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already processed")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    hub: web::Data<EventHub>,
    path: web::Path<u64>,
    payload: Option<web::Json<ReviewReq>>,
) -> ApiResult<HttpResponse> {
    requests::review(
        KIND,
        RequestStatus::Approved,
        auth,
        pool.get_ref(),
        config.get_ref(),
        hub.get_ref(),
        path.into_inner(),
        payload.map(web::Json::into_inner).unwrap_or_default(),
    )
    .await
}

/// Reject a pending leave request
#[utoipa::path(
    put,
    path = "/api/leaves/{id}/reject",
    params(("id" = u64, Path, description = "Request id")),
    request_body(content = ReviewReq, description = "Optional remark"),
    responses(
        (status = 200, description = "Request rejected", body = crate::model::time_off::TimeOffRequest),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already processed")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    hub: web::Data<EventHub>,
    path: web::Path<u64>,
    payload: Option<web::Json<ReviewReq>>,
) -> ApiResult<HttpResponse> {
    requests::review(
        KIND,
        RequestStatus::Rejected,
        auth,
        pool.get_ref(),
        config.get_ref(),
        hub.get_ref(),
        path.into_inner(),
        payload.map(web::Json::into_inner).unwrap_or_default(),
    )
    .await
}

/// Withdraw an own request that is still pending
#[utoipa::path(
    delete,
    path = "/api/leaves/{id}",
    params(("id" = u64, Path, description = "Request id")),
    responses(
        (status = 200, description = "Request withdrawn"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already processed")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn withdraw_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    requests::withdraw(KIND, auth, pool.get_ref(), path.into_inner()).await
}
