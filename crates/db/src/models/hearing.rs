//! Hearing rows.

use anyhow::Context;
use hearing_core::hearing::Hearing;
use hearing_core::section::Commenting;
use hearing_core::translation::TranslationSet;
use hearing_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `hearings` table.
#[derive(Debug, Clone, FromRow)]
pub struct HearingRow {
    pub id: String,
    pub slug: String,
    pub title: Json<TranslationSet>,
    #[sqlx(rename = "abstract")]
    pub abstract_: Json<TranslationSet>,
    pub borough: Json<TranslationSet>,
    pub published: bool,
    pub open_at: Option<Timestamp>,
    pub close_at: Option<Timestamp>,
    pub force_closed: bool,
    pub commenting: String,
    pub servicemap_url: String,
    pub geojson: Option<serde_json::Value>,
    pub organization_id: Option<DbId>,
    pub n_comments: i32,
    pub preview_code: String,
    pub revision: i64,
    pub created_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl HearingRow {
    /// Convert to the domain type. Labels and sections are attached by the
    /// caller.
    pub fn into_domain(self) -> anyhow::Result<Hearing> {
        let commenting = Commenting::parse(&self.commenting).with_context(|| {
            format!("hearing {} has unknown commenting {:?}", self.id, self.commenting)
        })?;
        Ok(Hearing {
            id: self.id,
            slug: self.slug,
            title: self.title.0,
            abstract_: self.abstract_.0,
            borough: self.borough.0,
            published: self.published,
            open_at: self.open_at,
            close_at: self.close_at,
            force_closed: self.force_closed,
            commenting,
            servicemap_url: self.servicemap_url,
            geojson: self.geojson,
            organization: self.organization_id,
            labels: Vec::new(),
            sections: Vec::new(),
            n_comments: self.n_comments,
            preview_code: self.preview_code,
            created_at: self.created_at,
            deleted: self.deleted_at.is_some(),
            revision: self.revision,
        })
    }
}
