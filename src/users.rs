//! User records.
//!
//! Users are created on first successful external authentication and looked
//! up by email afterwards. Only display fields change on later logins.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Identity, User};

const OAUTH_PROVIDER: &str = "google";

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let created_at: i64 = row.try_get("created_at")?;
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        picture: row.try_get("picture")?,
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_default(),
    })
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT id, email, name, picture, created_at FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_user).transpose()
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT id, email, name, picture, created_at FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_user).transpose()
}

/// Return the user for `identity.email`, creating it on first login.
pub async fn find_or_create(pool: &SqlitePool, identity: &Identity) -> Result<User> {
    if identity.email.trim().is_empty() {
        return Err(Error::Auth("identity provider returned no email".to_string()));
    }

    sqlx::query(
        r#"
        INSERT INTO users (id, email, name, picture, oauth_provider, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(email) DO UPDATE SET
            name = excluded.name,
            picture = excluded.picture
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&identity.email)
    .bind(&identity.name)
    .bind(&identity.picture)
    .bind(OAUTH_PROVIDER)
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?;

    find_by_email(pool, &identity.email)
        .await?
        .ok_or_else(|| Error::Auth(format!("user vanished after upsert: {}", identity.email)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use tempfile::TempDir;

    async fn test_pool(tmp: &TempDir) -> SqlitePool {
        let options = SqliteConnectOptions::new()
            .filename(tmp.path().join("users.sqlite"))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        crate::migrate::apply(&pool).await.unwrap();
        pool
    }

    fn identity(email: &str, name: &str) -> Identity {
        Identity {
            email: email.to_string(),
            name: name.to_string(),
            picture: String::new(),
        }
    }

    #[tokio::test]
    async fn test_relogin_keeps_id_and_refreshes_name() {
        let tmp = TempDir::new().unwrap();
        let pool = test_pool(&tmp).await;

        let first = find_or_create(&pool, &identity("ann@example.com", "Ann")).await.unwrap();
        let again = find_or_create(&pool, &identity("ann@example.com", "Ann B."))
            .await
            .unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(again.name, "Ann B.");

        let fetched = get(&pool, &first.id).await.unwrap().unwrap();
        assert_eq!(fetched.email, "ann@example.com");
        assert_eq!(fetched.name, "Ann B.");
        assert!(get(&pool, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blank_email_rejected() {
        let tmp = TempDir::new().unwrap();
        let pool = test_pool(&tmp).await;

        let err = find_or_create(&pool, &identity("  ", "Nobody")).await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert!(find_by_email(&pool, "  ").await.unwrap().is_none());
    }
}
