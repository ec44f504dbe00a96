use crate::{
    api::{announcements, attendance, dashboard, holidays, leave, users, wfh},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    ws::session::ws_connect,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{HttpResponse, middleware::from_fn, web};
use serde_json::json;
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    cfg.route("/health", web::get().to(health));

    // Socket authenticates itself (query token, cookie or bearer)
    cfg.route("/ws", web::get().to(ws_connect));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/users")
                    // literal segments before /{id}
                    .service(web::resource("/me").route(web::get().to(users::me)))
                    .service(
                        web::resource("/me/password").route(web::put().to(users::change_password)),
                    )
                    .service(web::resource("/check-email").route(web::get().to(users::check_email)))
                    .service(
                        web::resource("")
                            .route(web::get().to(users::list_users))
                            .route(web::post().to(users::create_user)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(users::get_user))
                            .route(web::put().to(users::update_user))
                            .route(web::delete().to(users::deactivate_user)),
                    ),
            )
            .service(
                web::scope("/attendances")
                    .service(web::resource("/check-in").route(web::post().to(attendance::check_in)))
                    .service(
                        web::resource("/check-out").route(web::put().to(attendance::check_out)),
                    )
                    .service(web::resource("/today").route(web::get().to(attendance::today)))
                    .service(
                        web::resource("/calendar")
                            .route(web::get().to(attendance::attendance_calendar)),
                    )
                    .service(
                        web::resource("/summary").route(web::get().to(attendance::monthly_summary)),
                    )
                    .service(
                        web::resource("")
                            .route(web::get().to(attendance::list_attendance))
                            .route(web::post().to(attendance::create_attendance)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(attendance::update_attendance))
                            .route(web::delete().to(attendance::delete_attendance)),
                    ),
            )
            .service(
                web::scope("/leaves")
                    .service(
                        web::resource("")
                            .route(web::get().to(leave::list_leave))
                            .route(web::post().to(leave::create_leave)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(leave::get_leave))
                            .route(web::delete().to(leave::withdraw_leave)),
                    )
                    .service(web::resource("/{id}/history").route(web::get().to(leave::leave_history)))
                    .service(web::resource("/{id}/approve").route(web::put().to(leave::approve_leave)))
                    .service(web::resource("/{id}/reject").route(web::put().to(leave::reject_leave))),
            )
            .service(
                web::scope("/wfh")
                    .service(
                        web::resource("")
                            .route(web::get().to(wfh::list_wfh))
                            .route(web::post().to(wfh::create_wfh)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(wfh::get_wfh))
                            .route(web::delete().to(wfh::withdraw_wfh)),
                    )
                    .service(web::resource("/{id}/history").route(web::get().to(wfh::wfh_history)))
                    .service(web::resource("/{id}/approve").route(web::put().to(wfh::approve_wfh)))
                    .service(web::resource("/{id}/reject").route(web::put().to(wfh::reject_wfh))),
            )
            .service(
                web::scope("/holidays")
                    .service(
                        web::resource("")
                            .route(web::get().to(holidays::list_holidays))
                            .route(web::post().to(holidays::create_holiday)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(holidays::update_holiday))
                            .route(web::delete().to(holidays::delete_holiday)),
                    ),
            )
            .service(
                web::scope("/announcements")
                    .service(
                        web::resource("")
                            .route(web::get().to(announcements::list_announcements))
                            .route(web::post().to(announcements::create_announcement)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(announcements::update_announcement))
                            .route(web::delete().to(announcements::delete_announcement)),
                    ),
            )
            .service(
                web::scope("/dashboard")
                    .service(web::resource("/admin").route(web::get().to(dashboard::admin_dashboard)))
                    .service(
                        web::resource("/employee").route(web::get().to(dashboard::employee_dashboard)),
                    )
                    .service(
                        web::resource("/monthly").route(web::get().to(dashboard::monthly_report)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)  + httpOnly cookie
//  └─ refresh_token (7 days) + httpOnly cookie

// API REQUEST
//  └─ Authorization: Bearer access_token, or the access_token cookie

// ACCESS EXPIRED
//  └─ POST /auth/refresh with the refresh cookie, header or body
//       └─ old refresh token revoked, rotated pair returned

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{TokenSubject, generate_access_token};
    use crate::ws::EventHub;
    use actix_web::{App, http::Method, http::StatusCode, test as actix_test, web::Data};
    use serde_json::Value;
    use sqlx::mysql::MySqlPoolOptions;
    use std::net::SocketAddr;

    const PEER: &str = "127.0.0.1:40001";

    fn bearer(config: &Config, user_id: u64, role: u8) -> String {
        let token = generate_access_token(
            &TokenSubject {
                user_id,
                email: format!("user{user_id}@company.com"),
                role,
                employee_id: format!("EMP-2026-{user_id:04}"),
            },
            &config.jwt_secret,
            60,
        )
        .unwrap();
        format!("Bearer {token}")
    }

    // the pool never connects: every request below is answered before a query runs
    macro_rules! app {
        ($config:expr) => {{
            let pool = MySqlPoolOptions::new()
                .connect_lazy(&$config.database_url)
                .unwrap();
            let cfg = $config.clone();
            actix_test::init_service(
                App::new()
                    .app_data(Data::new(pool))
                    .app_data(Data::new($config.clone()))
                    .app_data(Data::new(EventHub::default()))
                    .configure(move |c| configure(c, cfg.clone())),
            )
            .await
        }};
    }

    fn call(method: Method, uri: &str, auth: &str, body: Option<Value>) -> actix_test::TestRequest {
        let peer: SocketAddr = PEER.parse().unwrap();
        let req = actix_test::TestRequest::default()
            .method(method)
            .uri(uri)
            .peer_addr(peer)
            .insert_header(("Authorization", auth.to_string()));
        match body {
            Some(body) => req.set_json(body),
            None => req,
        }
    }

    #[test]
    fn limiter_handles_zero_and_large_rates() {
        let _ = build_limiter(0);
        let _ = build_limiter(120_000);
    }

    #[actix_web::test]
    async fn health_and_guarded_scope() {
        let config = Config::for_tests();
        let pool = MySqlPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let cfg = config.clone();
        let app = actix_test::init_service(
            App::new()
                .app_data(Data::new(pool))
                .app_data(Data::new(config))
                .app_data(Data::new(EventHub::default()))
                .configure(move |c| configure(c, cfg.clone())),
        )
        .await;

        // governor keys on the peer address
        let peer = "127.0.0.1:40000".parse().unwrap();

        let req = actix_test::TestRequest::get().uri("/health").peer_addr(peer).to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = actix_test::TestRequest::get()
            .uri("/api/users/me")
            .peer_addr(peer)
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = actix_test::TestRequest::get().uri("/ws").peer_addr(peer).to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn employees_are_forbidden_from_admin_endpoints() {
        let config = Config::for_tests();
        let app = app!(config);
        let employee = bearer(&config, 2, 2);

        let cases = [
            (Method::POST, "/api/users", Some(json!({
                "name": "Ravi Kumar",
                "email": "ravi.kumar@company.com",
                "password": "longenough"
            }))),
            (Method::PUT, "/api/users/3", Some(json!({ "designation": "Lead" }))),
            (Method::DELETE, "/api/users/3", None),
            (Method::GET, "/api/users/check-email?email=a@company.com", None),
            (Method::PUT, "/api/leaves/1/approve", Some(json!({}))),
            (Method::PUT, "/api/leaves/1/reject", Some(json!({ "remark": "no" }))),
            (Method::PUT, "/api/wfh/1/approve", None),
            (Method::DELETE, "/api/attendances/1", None),
            (Method::POST, "/api/holidays", Some(json!({ "date": "2026-08-15", "name": "Independence Day" }))),
            (Method::DELETE, "/api/announcements/1", None),
            (Method::GET, "/api/dashboard/admin", None),
            (Method::GET, "/api/dashboard/monthly?year=2026", None),
        ];

        for (method, uri, body) in cases {
            let req = call(method.clone(), uri, &employee, body).to_request();
            let resp = actix_test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{method} {uri}");
        }
    }

    #[actix_web::test]
    async fn employees_cannot_read_other_profiles() {
        let config = Config::for_tests();
        let app = app!(config);

        let req = call(Method::GET, "/api/users/9", &bearer(&config, 2, 2), None).to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn user_update_rejects_what_creation_rejects() {
        let config = Config::for_tests();
        let app = app!(config);
        let admin = bearer(&config, 1, 1);

        let req = call(
            Method::POST,
            "/api/users",
            &admin,
            Some(json!({ "name": "X", "email": "not an email@", "password": "longenough" })),
        )
        .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        for body in [
            json!({ "email": "not an email@" }),
            json!({ "email": "plainaddress" }),
            json!({ "name": "" }),
            json!({ "name": "   " }),
            json!({ "role_id": 7 }),
        ] {
            let req = call(Method::PUT, "/api/users/2", &admin, Some(body.clone())).to_request();
            let resp = actix_test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
        }
    }

    #[actix_web::test]
    async fn malformed_check_in_body_is_a_bad_request() {
        let config = Config::for_tests();
        let app = app!(config);

        let req = call(
            Method::POST,
            "/api/attendances/check-in",
            &bearer(&config, 2, 2),
            Some(json!({ "latitude": "abc" })),
        )
        .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
