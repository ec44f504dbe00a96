use crate::{
    auth::{
        auth::AuthUser,
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{ApiError, ApiResult, is_unique_violation},
    model::{
        role::Role,
        user::{USER_COLUMNS, User},
    },
    utils::{
        db_utils::{Filter, SqlValue, bind_query_as, bind_scalar, build_update_sql, execute_update},
        email_filter,
        employee_id::next_employee_id,
        pagination::paginate,
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidateEmail};

/// Columns an admin may change through `PUT /users/{id}`
const UPDATABLE_FIELDS: &[&str] = &[
    "name",
    "email",
    "phone",
    "designation",
    "department",
    "joining_date",
    "role_id",
    "is_active",
];

#[derive(Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(length(min = 1, max = 128, message = "name is required"))]
    #[schema(example = "Asha Rao")]
    pub name: String,
    #[validate(email(message = "email is invalid"))]
    #[schema(example = "asha.rao@company.com", format = "email")]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    /// Defaults to employee
    pub role: Option<Role>,
    pub designation: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    /// Also decides which yearly sequence the employee id is drawn from
    #[schema(example = "2026-01-05", format = "date", value_type = Option<String>)]
    pub joining_date: Option<NaiveDate>,
}

#[derive(Deserialize, IntoParams)]
pub struct UserQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Matches name, email or employee id
    pub search: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub department: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UserListResponse {
    pub data: Vec<User>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct ChangePassword {
    pub current_password: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Deserialize, IntoParams)]
pub struct EmailQuery {
    pub email: String,
}

pub async fn fetch_user(pool: &MySqlPool, user_id: u64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// true  => email AVAILABLE
/// false => email TAKEN
pub async fn is_email_available(email: &str, pool: &MySqlPool) -> Result<bool, sqlx::Error> {
    let email = email_filter::normalize(email);

    // Cuckoo filter: fast negative
    if !email_filter::might_exist(&email) {
        return Ok(true);
    }

    // Database fallback
    let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(&email)
        .fetch_one(pool)
        .await?;

    Ok(taken == 0)
}

/// Inserts a user with a freshly allocated employee id. Shared by the admin
/// endpoint and the startup admin bootstrap.
pub async fn create_user_record(
    pool: &MySqlPool,
    config: &Config,
    new: &CreateUser,
) -> ApiResult<User> {
    let email = email_filter::normalize(&new.email);

    if !is_email_available(&email, pool).await? {
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hashed = hash_password(&new.password)?;
    let role = new.role.unwrap_or(Role::Employee);
    let year = new
        .joining_date
        .map(|d| d.year())
        .unwrap_or_else(|| config.today().year());

    let mut tx = pool.begin().await?;
    let employee_id = next_employee_id(&mut *tx, &config.employee_id_prefix, year).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO users
            (employee_id, name, email, password, role_id, designation, department, phone, joining_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&employee_id)
    .bind(new.name.trim())
    .bind(&email)
    .bind(&hashed)
    .bind(role.id())
    .bind(&new.designation)
    .bind(&new.department)
    .bind(&new.phone)
    .bind(new.joining_date)
    .execute(&mut *tx)
    .await;

    let user_id = match result {
        Ok(res) => res.last_insert_id(),
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::Conflict("Email already registered".into()));
        }
        Err(e) => return Err(e.into()),
    };

    tx.commit().await?;
    email_filter::insert(&email);

    info!(user_id, employee_id = %employee_id, role = %role, "User created");

    fetch_user(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::Internal("created user vanished".into()))
}

async fn revoke_refresh_tokens(pool: &MySqlPool, user_id: u64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = ? AND revoked = FALSE")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Create employee
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Email already registered")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn create_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateUser>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    payload.validate()?;

    let user = create_user_record(pool.get_ref(), config.get_ref(), &payload).await?;
    Ok(HttpResponse::Created().json(user))
}

/// Paginated employee list
#[utoipa::path(
    get,
    path = "/api/users",
    params(UserQuery),
    responses(
        (status = 200, description = "Paginated user list", body = UserListResponse),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<UserQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let page = paginate(query.page, query.per_page);

    // ---------- build WHERE clause dynamically ----------
    let mut filter = Filter::new();

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let like = format!("%{}%", search);
        filter.push(
            "(name LIKE ? OR email LIKE ? OR employee_id LIKE ?)",
            [
                SqlValue::String(like.clone()),
                SqlValue::String(like.clone()),
                SqlValue::String(like),
            ],
        );
    }
    if let Some(role) = query.role {
        filter.push("role_id = ?", [SqlValue::U64(role.id() as u64)]);
    }
    if let Some(active) = query.is_active {
        filter.push("is_active = ?", [SqlValue::Bool(active)]);
    }
    if let Some(department) = &query.department {
        filter.push("department = ?", [SqlValue::String(department.clone())]);
    }

    let where_sql = filter.where_sql();

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) FROM users{}", where_sql);
    debug!(sql = %count_sql, "Counting users");
    let total = bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql), filter.values())
        .fetch_one(pool.get_ref())
        .await?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT {USER_COLUMNS} FROM users{} ORDER BY id DESC LIMIT ? OFFSET ?",
        where_sql
    );
    let users = bind_query_as(sqlx::query_as::<_, User>(&data_sql), filter.values())
        .bind(page.per_page)
        .bind(page.offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(UserListResponse {
        data: users,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

/// Current user's profile
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses((status = 200, description = "Own profile", body = User)),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn me(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    let user = fetch_user(pool.get_ref(), auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(HttpResponse::Ok().json(user))
}

/// Change own password; every refresh token of the user is revoked
#[utoipa::path(
    put,
    path = "/api/users/me/password",
    request_body = ChangePassword,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Current password is wrong or new one too short")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn change_password(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ChangePassword>,
) -> ApiResult<HttpResponse> {
    payload.validate()?;

    let stored: Option<String> = sqlx::query_scalar("SELECT password FROM users WHERE id = ?")
        .bind(auth.user_id)
        .fetch_optional(pool.get_ref())
        .await?;
    let stored = stored.ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    if !verify_password(&payload.current_password, &stored)? {
        return Err(ApiError::BadRequest("Current password is incorrect".into()));
    }

    let hashed = hash_password(&payload.new_password)?;
    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(hashed)
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await?;
    revoke_refresh_tokens(pool.get_ref(), auth.user_id).await?;

    info!(user_id = auth.user_id, "Password changed");
    Ok(HttpResponse::Ok().json(json!({ "message": "Password changed" })))
}

/// Whether an email can still be used for a new account
#[utoipa::path(
    get,
    path = "/api/users/check-email",
    params(EmailQuery),
    responses((status = 200, description = "Availability", body = Object, example = json!({ "available": true }))),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn check_email(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmailQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let available = is_email_available(&query.email, pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "available": available })))
}

/// Get user by id (self or admin)
#[utoipa::path(
    get,
    path = "/api/users/{user_id}",
    params(("user_id" = u64, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = User),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let user_id = path.into_inner();
    auth.require_self_or_admin(user_id)?;

    let user = fetch_user(pool.get_ref(), user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(HttpResponse::Ok().json(user))
}

/// Normalizes and checks a partial update body, returning the new email if any
fn check_update_body(caller: u64, user_id: u64, body: &mut Value) -> ApiResult<Option<String>> {
    let new_email = match body.get_mut("email") {
        Some(Value::String(email)) => {
            *email = email_filter::normalize(email);
            if !email.validate_email() {
                return Err(ApiError::BadRequest("email is invalid".into()));
            }
            Some(email.clone())
        }
        Some(_) => return Err(ApiError::BadRequest("email must be a string".into())),
        None => None,
    };

    match body.get("name") {
        Some(Value::String(name)) if !name.trim().is_empty() && name.chars().count() <= 128 => {}
        Some(_) => return Err(ApiError::BadRequest("name is required".into())),
        None => {}
    }

    if let Some(role_id) = body.get("role_id") {
        let valid = role_id
            .as_u64()
            .and_then(|id| u8::try_from(id).ok())
            .and_then(Role::from_id)
            .is_some();
        if !valid {
            return Err(ApiError::BadRequest("role_id must be 1 (admin) or 2 (employee)".into()));
        }
    }

    if user_id == caller && body.get("is_active") == Some(&Value::Bool(false)) {
        return Err(ApiError::BadRequest("You cannot deactivate your own account".into()));
    }

    Ok(new_email)
}

/// Partial update of an employee record
#[utoipa::path(
    put,
    path = "/api/users/{user_id}",
    params(("user_id" = u64, Path, description = "User id")),
    request_body(content = Object, description = "Any of: name, email, phone, designation, department, joining_date, role_id, is_active"),
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 400, description = "Unknown field or invalid value"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email already registered")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let user_id = path.into_inner();
    let mut body = body.into_inner();

    let new_email = check_update_body(auth.user_id, user_id, &mut body)?;

    let previous = fetch_user(pool.get_ref(), user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let update = build_update_sql("users", &body, UPDATABLE_FIELDS, "id", user_id)?;

    match execute_update(pool.get_ref(), update).await {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::Conflict("Email already registered".into()));
        }
        Err(e) => return Err(e.into()),
    }

    if let Some(email) = new_email.filter(|e| *e != previous.email) {
        email_filter::remove(&previous.email);
        email_filter::insert(&email);
    }
    if body.get("is_active") == Some(&Value::Bool(false)) {
        revoke_refresh_tokens(pool.get_ref(), user_id).await?;
    }

    let user = fetch_user(pool.get_ref(), user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(HttpResponse::Ok().json(user))
}

/// Deactivate an employee; records are kept for reporting
#[utoipa::path(
    delete,
    path = "/api/users/{user_id}",
    params(("user_id" = u64, Path, description = "User id")),
    responses(
        (status = 200, description = "User deactivated", body = Object, example = json!({ "message": "User deactivated" })),
        (status = 400, description = "Cannot deactivate yourself"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn deactivate_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let user_id = path.into_inner();

    if user_id == auth.user_id {
        return Err(ApiError::BadRequest("You cannot deactivate your own account".into()));
    }

    let result = sqlx::query("UPDATE users SET is_active = FALSE WHERE id = ?")
        .bind(user_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        // MySQL reports 0 rows for an already-inactive user too
        if fetch_user(pool.get_ref(), user_id).await?.is_none() {
            return Err(ApiError::NotFound("User not found".into()));
        }
    }

    revoke_refresh_tokens(pool.get_ref(), user_id).await?;
    info!(user_id, by = auth.user_id, "User deactivated");

    Ok(HttpResponse::Ok().json(json!({ "message": "User deactivated" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_email_is_normalized_and_validated() {
        let mut body = json!({ "email": "  Asha.Rao@Company.com " });
        let email = check_update_body(1, 2, &mut body).unwrap();
        assert_eq!(email.as_deref(), Some("asha.rao@company.com"));
        assert_eq!(body["email"], "asha.rao@company.com");

        for bad in ["not an email@", "plainaddress", "@company.com"] {
            let mut body = json!({ "email": bad });
            assert!(
                matches!(check_update_body(1, 2, &mut body), Err(ApiError::BadRequest(_))),
                "{bad}"
            );
        }

        let mut body = json!({ "email": 42 });
        assert!(check_update_body(1, 2, &mut body).is_err());
    }

    #[test]
    fn update_name_must_not_be_blank() {
        let mut body = json!({ "name": "  " });
        assert!(matches!(
            check_update_body(1, 2, &mut body),
            Err(ApiError::BadRequest(_))
        ));

        let mut body = json!({ "name": "Asha Rao", "designation": "Lead" });
        assert_eq!(check_update_body(1, 2, &mut body).unwrap(), None);
    }

    #[test]
    fn admins_cannot_deactivate_themselves() {
        let mut body = json!({ "is_active": false });
        assert!(check_update_body(1, 1, &mut body).is_err());
        assert!(check_update_body(1, 2, &mut body).is_ok());
    }
}
