use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs versioned migrations for the draft cache schema.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: answer drafts.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS answer_drafts (
                    subject TEXT NOT NULL CHECK (subject IN ('math', 'korean', 'english')),
                    worksheet_id INTEGER NOT NULL CHECK (worksheet_id >= 0),
                    saved_at TEXT NOT NULL,
                    PRIMARY KEY (subject, worksheet_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS answer_draft_entries (
                    subject TEXT NOT NULL,
                    worksheet_id INTEGER NOT NULL,
                    problem_id INTEGER NOT NULL CHECK (problem_id >= 0),
                    value TEXT NOT NULL,
                    PRIMARY KEY (subject, worksheet_id, problem_id),
                    FOREIGN KEY (subject, worksheet_id)
                        REFERENCES answer_drafts(subject, worksheet_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
