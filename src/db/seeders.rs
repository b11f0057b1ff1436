//! Database seeding: built-in roles and the initial admin account.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::auth::hash_password;

/// Roles the application depends on. Created at startup if missing.
pub const BUILTIN_ROLES: &[(&str, &str)] = &[
    ("Admin", "Full access to all administration pages"),
    ("event_manager", "Manage events and related tasks"),
    ("applications_manager", "Review and process student applications"),
    ("parent", "Parent access: tasks and event signups"),
];

/// Ensure the built-in roles exist and that the configured admin account
/// is present with the Admin role. Runs once at startup.
pub async fn seed_roles_and_admin(
    pool: &SqlitePool,
    admin_email: &str,
    admin_password: &str,
) -> Result<()> {
    for (name, description) in BUILTIN_ROLES {
        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM roles WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await?;
        if existing.is_none() {
            sqlx::query("INSERT INTO roles (id, name, description) VALUES (?, ?, ?)")
                .bind(uuid::Uuid::new_v4().to_string())
                .bind(name)
                .bind(description)
                .execute(pool)
                .await?;
            info!("Created role '{}'", name);
        }
    }

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(admin_email)
        .fetch_optional(pool)
        .await?;

    let user_id = match existing {
        Some((id,)) => id,
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            let password_hash = hash_password(admin_password)
                .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {}", e))?;
            let now = chrono::Utc::now().to_rfc3339();
            sqlx::query(
                "INSERT INTO users (id, email, password_hash, first_name, last_name, active, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, 1, ?, ?)",
            )
            .bind(&id)
            .bind(admin_email)
            .bind(&password_hash)
            .bind("Admin")
            .bind("")
            .bind(&now)
            .bind(&now)
            .execute(pool)
            .await?;
            info!("Created admin account {}", admin_email);
            id
        }
    };

    // Grant Admin; INSERT OR IGNORE keeps this idempotent across restarts
    sqlx::query(
        "INSERT OR IGNORE INTO user_roles (user_id, role_id) \
         SELECT ?, id FROM roles WHERE name = 'Admin'",
    )
    .bind(&user_id)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_in_memory;

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let pool = init_in_memory().await.unwrap();
        seed_roles_and_admin(&pool, "admin@example.se", "hunter2hunter2").await.unwrap();
        seed_roles_and_admin(&pool, "admin@example.se", "hunter2hunter2").await.unwrap();

        let (role_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM roles")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(role_count, BUILTIN_ROLES.len() as i64);

        let (admin_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(admin_count, 1);

        let (grants,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_roles")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(grants, 1);
    }
}
