//! # tc-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite `posts` table
//! and the `tc-core` domain models.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::migrate::{Migrate, MigrateError, Migrator};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tc_core::error::{AppError, Result};
use tc_core::models::{Post, PostSummary, TIME_FORMAT};
use tc_core::traits::ArchiveStore;

/// Versioned schema. `0002` adds `author_id` to tables created by `0001`.
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const AUTHOR_ID_MIGRATION: i64 = 2;

pub struct SqliteArchiveStore {
    pool: SqlitePool,
}

fn storage(e: sqlx::Error) -> AppError {
    AppError::Internal(format!("sqlite: {}", e))
}

fn migration(e: MigrateError) -> AppError {
    AppError::Internal(format!("migration failed: {}", e))
}

/// Archives written by the earlier deployment already have `author_id` but
/// no migration history. `0002` is recorded as applied for them so its
/// `ALTER TABLE` does not run twice; `0001` only uses `IF NOT EXISTS`.
async fn adopt_unversioned_schema(pool: &SqlitePool) -> Result<()> {
    let has_author_id: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('posts') WHERE name = 'author_id'",
    )
    .fetch_one(pool)
    .await
    .map_err(storage)?;
    if has_author_id == 0 {
        return Ok(());
    }

    let mut conn = pool.acquire().await.map_err(storage)?;
    conn.ensure_migrations_table().await.map_err(migration)?;
    let applied = conn.list_applied_migrations().await.map_err(migration)?;
    if applied.iter().any(|m| m.version == AUTHOR_ID_MIGRATION) {
        return Ok(());
    }

    for m in MIGRATOR.iter().filter(|m| m.version == AUTHOR_ID_MIGRATION) {
        sqlx::query(
            "INSERT INTO _sqlx_migrations (version, description, success, checksum, execution_time) \
             VALUES (?, ?, TRUE, ?, 0)",
        )
        .bind(m.version)
        .bind(&*m.description)
        .bind(&*m.checksum)
        .execute(&mut *conn)
        .await
        .map_err(storage)?;
        log::info!("existing archive already has author_id, marked migration {} as applied", m.version);
    }
    Ok(())
}

// Helpers for the TEXT columns
fn time_to_text(time: &NaiveDateTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn text_to_time(id: i64, text: Option<String>) -> NaiveDateTime {
    let text = text.unwrap_or_default();
    text.parse().unwrap_or_else(|_| {
        log::warn!("post {} has unreadable time {:?}", id, text);
        NaiveDateTime::default()
    })
}

/// Accepts both a plain array of URLs and the keyed
/// `[{"image1": url}, ...]` shape written by the earlier deployment.
fn text_to_images(text: Option<String>) -> Vec<String> {
    let Some(text) = text else {
        return Vec::new();
    };
    let value: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            serde_json::Value::String(url) => Some(url.clone()),
            serde_json::Value::Object(map) => {
                map.values().next().and_then(|v| v.as_str()).map(str::to_string)
            }
            _ => None,
        })
        .collect()
}

fn flag(row: &SqliteRow, column: &str) -> Result<bool> {
    Ok(row.try_get::<Option<i64>, _>(column).map_err(storage)?.unwrap_or(0) != 0)
}

fn text(row: &SqliteRow, column: &str) -> Result<Option<String>> {
    row.try_get::<Option<String>, _>(column).map_err(storage)
}

fn post_from_row(row: &SqliteRow) -> Result<Post> {
    let id: i64 = row.try_get("id").map_err(storage)?;
    Ok(Post {
        id,
        title: text(row, "title")?.unwrap_or_default(),
        author: text(row, "author")?.unwrap_or_default(),
        author_id: text(row, "author_id")?,
        time: text_to_time(id, text(row, "time")?),
        contents: text(row, "contents")?.unwrap_or_default(),
        images: text_to_images(text(row, "images")?),
        is_deleted: flag(row, "isdeleted")?,
        is_blinded: flag(row, "isblinded")?,
    })
}

fn summary_from_row(row: &SqliteRow) -> Result<PostSummary> {
    let id: i64 = row.try_get("id").map_err(storage)?;
    Ok(PostSummary {
        id,
        title: text(row, "title")?.unwrap_or_default(),
        author: text(row, "author")?.unwrap_or_default(),
        author_id: text(row, "author_id")?,
        time: text_to_time(id, text(row, "time")?),
    })
}

impl SqliteArchiveStore {
    /// Opens (creating if needed) the database at `url` and applies pending
    /// migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(storage)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(storage)?;

        Self::from_pool(pool).await
    }

    /// A private in-memory archive. All queries share one connection, since
    /// every SQLite memory connection is a separate database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(storage)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(storage)?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        adopt_unversioned_schema(&pool).await?;
        MIGRATOR.run(&pool).await.map_err(migration)?;
        log::debug!("archive schema is up to date");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Waits for in-flight queries and closes every connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ArchiveStore for SqliteArchiveStore {
    async fn exists(&self, id: i64) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        Ok(count > 0)
    }

    /// Single statement, so readers see either the old or the new row.
    ///
    /// # Developer Note
    /// A plain `INSERT OR REPLACE` would rewrite `isdeleted` back to 0 for a
    /// row that was already flagged. The conflict branch only ever raises it.
    async fn upsert(&self, post: &Post) -> Result<()> {
        let images = serde_json::to_string(&post.images)
            .map_err(|e| AppError::Internal(format!("encoding images of post {}: {}", post.id, e)))?;

        sqlx::query(
            "INSERT INTO posts (id, title, author, author_id, time, contents, images, isdeleted, isblinded)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 author = excluded.author,
                 author_id = excluded.author_id,
                 time = excluded.time,
                 contents = excluded.contents,
                 images = excluded.images,
                 isdeleted = MAX(COALESCE(posts.isdeleted, 0), excluded.isdeleted)",
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.author)
        .bind(&post.author_id)
        .bind(time_to_text(&post.time))
        .bind(&post.contents)
        .bind(images)
        .bind(post.is_deleted as i64)
        .bind(post.is_blinded as i64)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn mark_deleted(&self, id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE posts SET isdeleted = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        if result.rows_affected() == 0 {
            log::debug!("mark_deleted: post {} is not archived", id);
        }
        Ok(())
    }

    async fn count_total(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .map_err(storage)
    }

    async fn count_deleted(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE isdeleted = 1")
            .fetch_one(&self.pool)
            .await
            .map_err(storage)
    }

    async fn recent_ids(&self, limit: u32) -> Result<Vec<i64>> {
        sqlx::query_scalar("SELECT id FROM posts ORDER BY id DESC LIMIT ?")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(storage)
    }

    async fn page_deleted(&self, page: u32, page_size: u32) -> Result<Vec<PostSummary>> {
        if page == 0 || page_size == 0 {
            return Ok(Vec::new());
        }
        let offset = i64::from(page - 1) * i64::from(page_size);

        let rows = sqlx::query(
            "SELECT id, title, author, author_id, time FROM posts
             WHERE isdeleted = 1
             ORDER BY time DESC
             LIMIT ? OFFSET ?",
        )
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(summary_from_row).collect()
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let row = sqlx::query("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        row.as_ref().map(post_from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, NaiveDate};

    fn base_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn post(id: i64, minutes: i64) -> Post {
        Post {
            id,
            title: format!("title {}", id),
            author: "ㅇㅇ".to_string(),
            author_id: Some(format!("user{}", id)),
            time: base_time() + ChronoDuration::minutes(minutes),
            contents: "contents".to_string(),
            images: vec![
                "https://images.dcinside.com/viewimage.php?no=1".to_string(),
                "https://images.dcinside.com/viewimage.php?no=2".to_string(),
            ],
            is_deleted: false,
            is_blinded: false,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get_round_trip() {
        let store = SqliteArchiveStore::in_memory().await.unwrap();
        let original = post(101, 0);

        assert!(!store.exists(101).await.unwrap());
        store.upsert(&original).await.unwrap();
        assert!(store.exists(101).await.unwrap());

        let fetched = store.get_by_id(101).await.unwrap().expect("post should exist");
        assert_eq!(fetched, original);
        assert!(store.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_content_but_keeps_single_row() {
        let store = SqliteArchiveStore::in_memory().await.unwrap();
        store.upsert(&post(7, 0)).await.unwrap();

        let mut edited = post(7, 0);
        edited.title = "edited".to_string();
        store.upsert(&edited).await.unwrap();

        assert_eq!(store.count_total().await.unwrap(), 1);
        assert_eq!(store.get_by_id(7).await.unwrap().unwrap().title, "edited");
    }

    #[tokio::test]
    async fn test_deleted_flag_is_monotonic() {
        let store = SqliteArchiveStore::in_memory().await.unwrap();
        store.upsert(&post(1, 0)).await.unwrap();
        store.mark_deleted(1).await.unwrap();

        // Re-archiving the same id must not resurrect it.
        store.upsert(&post(1, 0)).await.unwrap();
        store.mark_deleted(1).await.unwrap();

        assert!(store.get_by_id(1).await.unwrap().unwrap().is_deleted);
        assert_eq!(store.count_deleted().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_deleted_on_absent_row_is_noop() {
        let store = SqliteArchiveStore::in_memory().await.unwrap();
        store.mark_deleted(42).await.unwrap();
        assert!(!store.exists(42).await.unwrap());
        assert_eq!(store.count_total().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_page_deleted_windows_newest_first() {
        let store = SqliteArchiveStore::in_memory().await.unwrap();
        for id in 1..=25 {
            store.upsert(&post(id, id)).await.unwrap();
            store.mark_deleted(id).await.unwrap();
        }
        // Live posts never show up in the listing.
        store.upsert(&post(100, 1000)).await.unwrap();

        let first = store.page_deleted(1, 20).await.unwrap();
        assert_eq!(first.len(), 20);
        assert_eq!(first[0].id, 25);

        let second = store.page_deleted(2, 20).await.unwrap();
        let ids: Vec<i64> = second.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);

        assert!(store.page_deleted(3, 20).await.unwrap().is_empty());
        assert!(store.page_deleted(0, 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_counts_and_recent_ids() {
        let store = SqliteArchiveStore::in_memory().await.unwrap();
        for id in [3, 11, 7, 15, 1] {
            store.upsert(&post(id, 0)).await.unwrap();
        }
        store.mark_deleted(7).await.unwrap();

        assert_eq!(store.count_total().await.unwrap(), 5);
        assert_eq!(store.count_deleted().await.unwrap(), 1);
        assert_eq!(store.recent_ids(3).await.unwrap(), vec![15, 11, 7]);
    }

    #[tokio::test]
    async fn test_reads_rows_written_by_the_legacy_schema() {
        let store = SqliteArchiveStore::in_memory().await.unwrap();
        sqlx::query("INSERT INTO posts (id, title, author, time, contents, images) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(5_i64)
            .bind("old")
            .bind("ㅇㅇ")
            .bind("2023-12-31T23:59:59")
            .bind("legacy body")
            .bind(r#"[{"image1": "https://images.dcinside.com/a.jpg"}, {"image2": "https://images.dcinside.com/b.jpg"}]"#)
            .execute(store.pool())
            .await
            .unwrap();

        let legacy = store.get_by_id(5).await.unwrap().unwrap();
        assert_eq!(legacy.author_id, None);
        assert!(!legacy.is_deleted);
        assert!(!legacy.is_blinded);
        assert_eq!(
            legacy.images,
            vec![
                "https://images.dcinside.com/a.jpg".to_string(),
                "https://images.dcinside.com/b.jpg".to_string()
            ]
        );
        assert_eq!(legacy.time.format(TIME_FORMAT).to_string(), "2023-12-31T23:59:59");
    }

    /// A scratch directory for one file-backed test; WAL adds side files.
    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("tc-db-sqlite-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn file_url(dir: &std::path::Path) -> String {
        format!("sqlite:{}?mode=rwc", dir.join("trash.db").display())
    }

    /// Writes a database the way the earlier deployment did: no migration
    /// history, `author_id` added by hand when `with_author_id` is set.
    async fn write_unversioned_archive(url: &str, with_author_id: bool) {
        let options = SqliteConnectOptions::from_str(url).unwrap().create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS posts (id INTEGER PRIMARY KEY, title TEXT, author TEXT, \
             time TEXT, contents TEXT, images TEXT, isdeleted INTEGER DEFAULT 0, isblinded INTEGER DEFAULT 0)",
        )
        .execute(&pool)
        .await
        .unwrap();
        if with_author_id {
            sqlx::query("ALTER TABLE posts ADD COLUMN author_id TEXT DEFAULT NULL")
                .execute(&pool)
                .await
                .unwrap();
            sqlx::query(
                "INSERT INTO posts (id, title, author, time, contents, images, isdeleted, author_id) \
                 VALUES (9, 'kept', 'ㅇㅇ', '2024-01-02T03:04:05', 'body', '[]', 1, 'writer')",
            )
            .execute(&pool)
            .await
            .unwrap();
        } else {
            sqlx::query(
                "INSERT INTO posts (id, title, author, time, contents, images) \
                 VALUES (9, 'kept', 'ㅇㅇ', '2024-01-02T03:04:05', 'body', '[]')",
            )
            .execute(&pool)
            .await
            .unwrap();
        }
        pool.close().await;
    }

    #[tokio::test]
    async fn test_opens_unversioned_archive_that_already_has_author_id() {
        let dir = scratch_dir("adopt");
        let url = file_url(&dir);
        write_unversioned_archive(&url, true).await;

        let store = SqliteArchiveStore::connect(&url).await.unwrap();
        let kept = store.get_by_id(9).await.unwrap().unwrap();
        assert_eq!(kept.author_id.as_deref(), Some("writer"));
        assert!(kept.is_deleted);

        store.upsert(&post(10, 0)).await.unwrap();
        assert_eq!(store.count_total().await.unwrap(), 2);
        store.close().await;

        // The second open finds a complete history.
        let reopened = SqliteArchiveStore::connect(&url).await.unwrap();
        assert_eq!(reopened.count_deleted().await.unwrap(), 1);
        reopened.close().await;

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_unversioned_archive_without_author_id_gains_the_column() {
        let dir = scratch_dir("upgrade");
        let url = file_url(&dir);
        write_unversioned_archive(&url, false).await;

        let store = SqliteArchiveStore::connect(&url).await.unwrap();
        assert_eq!(store.get_by_id(9).await.unwrap().unwrap().author_id, None);

        store.upsert(&post(10, 0)).await.unwrap();
        assert_eq!(
            store.get_by_id(10).await.unwrap().unwrap().author_id.as_deref(),
            Some("user10")
        );
        store.close().await;

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_file_pool_handles_concurrent_writers() {
        let dir = scratch_dir("concurrent");
        let store = std::sync::Arc::new(SqliteArchiveStore::connect(&file_url(&dir)).await.unwrap());

        let mut writes = Vec::new();
        for id in 1..=40_i64 {
            let store = store.clone();
            writes.push(tokio::spawn(async move { store.upsert(&post(id, id)).await }));
        }
        for handle in writes {
            handle.await.unwrap().unwrap();
        }

        let mut writes = Vec::new();
        for id in 1..=40_i64 {
            let store = store.clone();
            writes.push(tokio::spawn(async move {
                if id % 2 == 0 {
                    store.mark_deleted(id).await
                } else {
                    store.upsert(&post(id + 100, id)).await
                }
            }));
        }
        for handle in writes {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.count_total().await.unwrap(), 60);
        assert_eq!(store.count_deleted().await.unwrap(), 20);
        assert!(store.get_by_id(40).await.unwrap().unwrap().is_deleted);
        assert!(!store.get_by_id(139).await.unwrap().unwrap().is_deleted);
        store.close().await;

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_unparseable_images_decode_to_empty() {
        assert!(text_to_images(None).is_empty());
        assert!(text_to_images(Some("not json".to_string())).is_empty());
        assert!(text_to_images(Some("{}".to_string())).is_empty());
    }
}
