// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote user profile cache queries.

use marionette_core::MarionetteError;
use marionette_core::types::RemoteUserRecord;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

/// Fetch the cached record for an encoded user id.
pub async fn get_remote_user(
    db: &Database,
    id: &str,
) -> Result<Option<RemoteUserRecord>, MarionetteError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT name, avatar_url FROM remote_users WHERE id = ?1",
                params![id],
                |row| {
                    Ok(RemoteUserRecord {
                        name: row.get(0)?,
                        avatar_url: row.get(1)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a record unless one already exists for `id`.
///
/// Returns `true` when a new row was written.
pub async fn insert_remote_user(
    db: &Database,
    id: &str,
    record: &RemoteUserRecord,
) -> Result<bool, MarionetteError> {
    let id = id.to_string();
    let record = record.clone();
    let now = chrono::Utc::now().to_rfc3339();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO remote_users (id, name, avatar_url, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, record.name, record.avatar_url, now],
            )?;
            Ok(inserted > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Number of cached users.
pub async fn count_remote_users(db: &Database) -> Result<i64, MarionetteError> {
    db.connection()
        .call(|conn| conn.query_row("SELECT COUNT(*) FROM remote_users", [], |row| row.get(0)))
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> RemoteUserRecord {
        RemoteUserRecord {
            name: Some(name.to_string()),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn missing_user_is_none() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(get_remote_user(&db, "626f62").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_write_wins() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(insert_remote_user(&db, "626f62", &record("Bob")).await.unwrap());
        assert!(!insert_remote_user(&db, "626f62", &record("Robert")).await.unwrap());

        let stored = get_remote_user(&db, "626f62").await.unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("Bob"));
        assert_eq!(count_remote_users(&db).await.unwrap(), 1);
    }
}
