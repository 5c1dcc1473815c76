use chrono::{DateTime, Utc};
use sqlx::Row;
use worksheet_core::model::WorksheetRef;

use super::SqliteRepository;
use super::mapping::{id_i64, problem_id_from_i64, ser, worksheet_from_row, worksheet_key};
use crate::repository::{AnswerDraft, AnswerDraftRepository, StorageError};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl AnswerDraftRepository for SqliteRepository {
    async fn save_draft(&self, draft: &AnswerDraft) -> Result<(), StorageError> {
        let (subject, worksheet_id) = worksheet_key(draft.worksheet)?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        // Entries cascade with the header row.
        sqlx::query("DELETE FROM answer_drafts WHERE subject = ?1 AND worksheet_id = ?2")
            .bind(subject)
            .bind(worksheet_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO answer_drafts (subject, worksheet_id, saved_at)
                VALUES (?1, ?2, ?3)
            ",
        )
        .bind(subject)
        .bind(worksheet_id)
        .bind(draft.saved_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        for (problem_id, value) in &draft.entries {
            sqlx::query(
                r"
                    INSERT INTO answer_draft_entries (subject, worksheet_id, problem_id, value)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(subject, worksheet_id, problem_id) DO UPDATE SET value = excluded.value
                ",
            )
            .bind(subject)
            .bind(worksheet_id)
            .bind(id_i64("problem_id", problem_id.value())?)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn load_draft(
        &self,
        worksheet: WorksheetRef,
    ) -> Result<Option<AnswerDraft>, StorageError> {
        let (subject, worksheet_id) = worksheet_key(worksheet)?;

        let Some(header) = sqlx::query(
            r"
                SELECT subject, worksheet_id, saved_at
                FROM answer_drafts
                WHERE subject = ?1 AND worksheet_id = ?2
            ",
        )
        .bind(subject)
        .bind(worksheet_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        else {
            return Ok(None);
        };

        let stored = worksheet_from_row(
            &header.try_get::<String, _>("subject").map_err(ser)?,
            header.try_get::<i64, _>("worksheet_id").map_err(ser)?,
        )?;
        let saved_at: DateTime<Utc> = header.try_get("saved_at").map_err(ser)?;

        let rows = sqlx::query(
            r"
                SELECT problem_id, value
                FROM answer_draft_entries
                WHERE subject = ?1 AND worksheet_id = ?2
                ORDER BY problem_id ASC
            ",
        )
        .bind(subject)
        .bind(worksheet_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let entries = rows
            .iter()
            .map(|row| {
                let id = problem_id_from_i64(row.try_get::<i64, _>("problem_id").map_err(ser)?)?;
                let value: String = row.try_get("value").map_err(ser)?;
                Ok((id, value))
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        Ok(Some(AnswerDraft {
            worksheet: stored,
            entries,
            saved_at,
        }))
    }

    async fn clear_draft(&self, worksheet: WorksheetRef) -> Result<(), StorageError> {
        let (subject, worksheet_id) = worksheet_key(worksheet)?;
        sqlx::query("DELETE FROM answer_drafts WHERE subject = ?1 AND worksheet_id = ?2")
            .bind(subject)
            .bind(worksheet_id)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
