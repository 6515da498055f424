//! Label rows.

use hearing_core::hearing::Label;
use hearing_core::translation::TranslationSet;
use hearing_core::types::DbId;
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `labels` table.
#[derive(Debug, Clone, FromRow)]
pub struct LabelRow {
    pub id: DbId,
    pub label: Json<TranslationSet>,
}

impl From<LabelRow> for Label {
    fn from(row: LabelRow) -> Self {
        Label {
            id: row.id,
            label: row.label.0,
        }
    }
}

/// A label row joined through `hearing_labels`.
#[derive(Debug, Clone, FromRow)]
pub struct HearingLabelRow {
    pub hearing_id: String,
    pub id: DbId,
    pub label: Json<TranslationSet>,
}

impl From<HearingLabelRow> for Label {
    fn from(row: HearingLabelRow) -> Self {
        Label {
            id: row.id,
            label: row.label.0,
        }
    }
}
