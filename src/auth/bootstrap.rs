use crate::{
    api::users::{CreateUser, create_user_record},
    config::Config,
    model::role::Role,
};
use anyhow::{Context, Result};
use sqlx::MySqlPool;
use tracing::{info, warn};

/// Creates the first admin from `ADMIN_EMAIL`/`ADMIN_PASSWORD` when the
/// database has no admin yet. Does nothing once any admin exists.
pub async fn ensure_admin(pool: &MySqlPool, config: &Config) -> Result<()> {
    let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role_id = ?")
        .bind(Role::Admin.id())
        .fetch_one(pool)
        .await
        .context("counting admins")?;

    if admins > 0 {
        return Ok(());
    }

    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        warn!("No admin account exists and ADMIN_EMAIL/ADMIN_PASSWORD are not set");
        return Ok(());
    };

    let admin = create_user_record(
        pool,
        config,
        &CreateUser {
            name: config.admin_name.clone(),
            email: email.clone(),
            password: password.clone(),
            role: Some(Role::Admin),
            designation: Some("Administrator".into()),
            department: None,
            phone: None,
            joining_date: Some(config.today()),
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!("creating bootstrap admin: {e}"))?;

    info!(user_id = admin.id, employee_id = %admin.employee_id, "Bootstrap admin created");
    Ok(())
}
