//! Repository for the `labels` table.

use hearing_core::translation::TranslationSet;
use hearing_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::label::{HearingLabelRow, LabelRow};

const COLUMNS: &str = "id, label";

pub struct LabelRepo;

impl LabelRepo {
    /// Insert a new label, returning the created row.
    pub async fn create(pool: &PgPool, label: &TranslationSet) -> Result<LabelRow, sqlx::Error> {
        let query = format!("INSERT INTO labels (label) VALUES ($1) RETURNING {COLUMNS}");
        sqlx::query_as::<_, LabelRow>(&query)
            .bind(Json(label))
            .fetch_one(pool)
            .await
    }

    /// Labels with the given ids. Unknown ids are skipped.
    pub async fn find_by_ids(pool: &PgPool, ids: &[DbId]) -> Result<Vec<LabelRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM labels WHERE id = ANY($1) ORDER BY id");
        sqlx::query_as::<_, LabelRow>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// Labels attached to any of `hearing_ids`, in attachment order.
    pub async fn list_for_hearings(
        pool: &PgPool,
        hearing_ids: &[String],
    ) -> Result<Vec<HearingLabelRow>, sqlx::Error> {
        sqlx::query_as::<_, HearingLabelRow>(
            "SELECT hl.hearing_id, l.id, l.label
             FROM hearing_labels hl
             JOIN labels l ON l.id = hl.label_id
             WHERE hl.hearing_id = ANY($1)
             ORDER BY hl.hearing_id, hl.position",
        )
        .bind(hearing_ids)
        .fetch_all(pool)
        .await
    }

    /// Replace a hearing's label attachments inside an open transaction.
    pub async fn set_for_hearing_inner(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        hearing_id: &str,
        label_ids: &[DbId],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM hearing_labels WHERE hearing_id = $1")
            .bind(hearing_id)
            .execute(&mut **tx)
            .await?;

        for (position, label_id) in label_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO hearing_labels (hearing_id, label_id, position) VALUES ($1, $2, $3)",
            )
            .bind(hearing_id)
            .bind(label_id)
            .bind(position as i32)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}
