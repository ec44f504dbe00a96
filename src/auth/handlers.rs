use crate::{
    auth::{
        auth::{ACCESS_COOKIE, REFRESH_COOKIE, bearer_token},
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        password::verify_password,
    },
    config::Config,
    error::{ApiError, ApiResult},
    models::{LoginReqDto, RefreshReqDto, TokenPair, TokenType, UserSql},
    utils::email_filter,
};
use actix_web::{
    HttpRequest, HttpResponse,
    cookie::{Cookie, SameSite, time::Duration},
    web,
};
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument, warn};
use validator::Validate;

const USER_SQL_COLUMNS: &str = "id, employee_id, email, password, role_id, is_active";

fn token_cookie(name: &'static str, value: String, ttl: usize, secure: bool) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(ttl as i64))
        .finish()
}

fn expired_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build(name, "").path("/").finish();
    cookie.make_removal();
    cookie
}

/// Issues an access/refresh pair and stores the refresh `jti`
async fn issue_tokens(
    subject: &TokenSubject,
    pool: &MySqlPool,
    config: &Config,
) -> ApiResult<TokenPair> {
    let access_token =
        generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)?;
    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl)?;

    debug!(
        user_id = subject.user_id,
        jti = %refresh_claims.jti,
        "Storing refresh token"
    );

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

fn token_response(tokens: TokenPair, config: &Config) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(token_cookie(
            ACCESS_COOKIE,
            tokens.access_token.clone(),
            config.access_token_ttl,
            config.cookie_secure,
        ))
        .cookie(token_cookie(
            REFRESH_COOKIE,
            tokens.refresh_token.clone(),
            config.refresh_token_ttl,
            config.cookie_secure,
        ))
        .json(tokens)
}

fn subject_of(user: &UserSql) -> TokenSubject {
    TokenSubject {
        user_id: user.id,
        email: user.email.clone(),
        role: user.role_id,
        employee_id: user.employee_id.clone(),
    }
}

/// Login with email or employee id
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair, also set as httpOnly cookies", body = TokenPair),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account deactivated")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(email = ?user.email, employee_id = ?user.employee_id)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    info!("Login request received");

    // 1️⃣ Basic validation
    user.validate()?;

    let (column, key) = match (user.email.as_deref(), user.employee_id.as_deref()) {
        (Some(email), _) if !email.trim().is_empty() => ("email", email_filter::normalize(email)),
        (_, Some(code)) if !code.trim().is_empty() => ("employee_id", code.trim().to_string()),
        _ => {
            info!("Validation failed: no email or employee id");
            return Err(ApiError::BadRequest("Email or employee id required".into()));
        }
    };

    // 2️⃣ Fetch user
    debug!(column, "Fetching user from database");
    let sql = format!("SELECT {USER_SQL_COLUMNS} FROM users WHERE {column} = ?");
    let db_user = match sqlx::query_as::<_, UserSql>(&sql)
        .bind(&key)
        .fetch_optional(pool.get_ref())
        .await?
    {
        Some(user) => user,
        None => {
            info!("Invalid credentials: user not found");
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }
    };

    // 3️⃣ Verify password
    if !verify_password(&user.password, &db_user.password)? {
        info!(user_id = db_user.id, "Invalid credentials: password mismatch");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    if !db_user.is_active {
        info!(user_id = db_user.id, "Login refused: account deactivated");
        return Err(ApiError::Forbidden("Account is deactivated".into()));
    }

    // 4️⃣ Issue and store tokens
    let tokens = issue_tokens(&subject_of(&db_user), pool.get_ref(), config.get_ref()).await?;

    // 5️⃣ Update last_login_at (non-fatal)
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");
    Ok(token_response(tokens, config.get_ref()))
}

/// Cookie first, then bearer header, then JSON body
fn presented_refresh_token(req: &HttpRequest, body: Option<&RefreshReqDto>) -> Option<String> {
    req.cookie(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(req))
        .or_else(|| body.and_then(|b| b.refresh_token.clone()))
        .filter(|t| !t.is_empty())
}

/// Rotate the refresh token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body(content = RefreshReqDto, description = "Optional when the refresh cookie or bearer header is present"),
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPair),
        (status = 401, description = "Missing, invalid, revoked or expired refresh token")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_refresh", skip_all)]
pub async fn refresh_token(
    req: HttpRequest,
    body: Option<web::Json<RefreshReqDto>>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let token = presented_refresh_token(&req, body.as_deref())
        .ok_or_else(|| ApiError::Unauthorized("Missing refresh token".into()))?;

    let claims = verify_token(&token, &config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;

    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::Unauthorized("Refresh token required".into()));
    }

    // 🔥 revoke old refresh token; only one concurrent caller can win
    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = TRUE
        WHERE jti = ? AND revoked = FALSE AND expires_at > NOW()
        "#,
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await?;

    if revoked.rows_affected() == 0 {
        warn!(user_id = claims.user_id, jti = %claims.jti, "Refresh token reuse or unknown jti");
        return Err(ApiError::Unauthorized("Refresh token revoked".into()));
    }

    // re-read the account so role changes and deactivation take effect
    let db_user = sqlx::query_as::<_, UserSql>(&format!(
        "SELECT {USER_SQL_COLUMNS} FROM users WHERE id = ?"
    ))
    .bind(claims.user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .filter(|u| u.is_active)
    .ok_or_else(|| ApiError::Unauthorized("Account unavailable".into()))?;

    let tokens = issue_tokens(&subject_of(&db_user), pool.get_ref(), config.get_ref()).await?;

    debug!(user_id = db_user.id, "Refresh token rotated");
    Ok(token_response(tokens, config.get_ref()))
}

/// Revoke the refresh token and clear auth cookies
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out, even when no token was presented")),
    tag = "Auth"
)]
#[instrument(name = "auth_logout", skip_all)]
pub async fn logout(
    req: HttpRequest,
    body: Option<web::Json<RefreshReqDto>>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let claims = presented_refresh_token(&req, body.as_deref())
        .and_then(|token| verify_token(&token, &config.jwt_secret).ok())
        .filter(|claims| claims.token_type == TokenType::Refresh);

    if let Some(claims) = claims {
        // revoke (idempotent)
        if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
            .bind(&claims.jti)
            .execute(pool.get_ref())
            .await
        {
            error!(error = %e, "Failed to revoke refresh token");
        }
    }

    HttpResponse::NoContent()
        .cookie(expired_cookie(ACCESS_COOKIE))
        .cookie(expired_cookie(REFRESH_COOKIE))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test as actix_test};
    use sqlx::mysql::MySqlPoolOptions;

    fn lazy_pool(config: &Config) -> MySqlPool {
        MySqlPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap()
    }

    #[test]
    fn auth_cookies_are_http_only() {
        let cookie = token_cookie(ACCESS_COOKIE, "abc".into(), 900, true);
        assert_eq!(cookie.name(), "access_token");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(900)));
    }

    #[test]
    fn removal_cookie_is_empty_and_expired() {
        let cookie = expired_cookie(REFRESH_COOKIE);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }

    #[actix_web::test]
    async fn refresh_token_is_read_from_cookie_before_body() {
        let req = actix_test::TestRequest::default()
            .cookie(Cookie::new(REFRESH_COOKIE, "from-cookie"))
            .to_http_request();
        let body = RefreshReqDto {
            refresh_token: Some("from-body".into()),
        };
        assert_eq!(
            presented_refresh_token(&req, Some(&body)).as_deref(),
            Some("from-cookie")
        );

        let req = actix_test::TestRequest::default().to_http_request();
        assert_eq!(
            presented_refresh_token(&req, Some(&body)).as_deref(),
            Some("from-body")
        );
        assert_eq!(presented_refresh_token(&req, None), None);
    }

    #[actix_web::test]
    async fn refresh_without_token_is_unauthorized() {
        let config = Config::for_tests();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(lazy_pool(&config)))
                .app_data(web::Data::new(config))
                .route("/auth/refresh", web::post().to(refresh_token)),
        )
        .await;

        let req = actix_test::TestRequest::post().uri("/auth/refresh").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn refresh_rejects_access_tokens() {
        let config = Config::for_tests();
        let subject = TokenSubject {
            user_id: 1,
            email: "a@b.c".into(),
            role: 2,
            employee_id: "EMP-2026-0001".into(),
        };
        let access = generate_access_token(&subject, &config.jwt_secret, 60).unwrap();

        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(lazy_pool(&config)))
                .app_data(web::Data::new(config))
                .route("/auth/refresh", web::post().to(refresh_token)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/auth/refresh")
            .insert_header(("Authorization", format!("Bearer {access}")))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn logout_without_token_still_clears_cookies() {
        let config = Config::for_tests();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(lazy_pool(&config)))
                .app_data(web::Data::new(config))
                .route("/auth/logout", web::post().to(logout)),
        )
        .await;

        let req = actix_test::TestRequest::post().uri("/auth/logout").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let cleared: Vec<_> = resp.response().cookies().map(|c| c.name().to_string()).collect();
        assert!(cleared.contains(&ACCESS_COOKIE.to_string()));
        assert!(cleared.contains(&REFRESH_COOKIE.to_string()));
    }
}
