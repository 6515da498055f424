//! Section and section image rows.

use anyhow::Context;
use hearing_core::section::{Commenting, Section, SectionImage, SectionType};
use hearing_core::translation::TranslationSet;
use hearing_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `sections` table.
#[derive(Debug, Clone, FromRow)]
pub struct SectionRow {
    pub id: String,
    pub hearing_id: String,
    #[sqlx(rename = "type")]
    pub section_type: String,
    pub ordering: i32,
    pub title: Json<TranslationSet>,
    #[sqlx(rename = "abstract")]
    pub abstract_: Json<TranslationSet>,
    pub content: Json<TranslationSet>,
    pub commenting: String,
    pub published: bool,
    pub n_comments: i32,
    pub plugin_identifier: String,
    pub plugin_data: String,
    pub plugin_fullscreen: bool,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl SectionRow {
    /// Convert to the domain type. Images are attached by the caller.
    pub fn into_domain(self) -> anyhow::Result<Section> {
        let section_type = SectionType::parse(&self.section_type)
            .with_context(|| format!("section {} has unknown type {:?}", self.id, self.section_type))?;
        let commenting = Commenting::parse(&self.commenting).with_context(|| {
            format!("section {} has unknown commenting {:?}", self.id, self.commenting)
        })?;
        Ok(Section {
            id: self.id,
            section_type,
            ordering: self.ordering,
            title: self.title.0,
            abstract_: self.abstract_.0,
            content: self.content.0,
            commenting,
            published: self.published,
            images: Vec::new(),
            n_comments: self.n_comments,
            plugin_identifier: self.plugin_identifier,
            plugin_data: self.plugin_data,
            plugin_fullscreen: self.plugin_fullscreen,
            created_at: self.created_at,
            created_by: self.created_by,
            deleted: self.deleted_at.is_some(),
        })
    }
}

/// A row from the `section_images` table.
#[derive(Debug, Clone, FromRow)]
pub struct SectionImageRow {
    pub id: String,
    pub section_id: String,
    pub title: Json<TranslationSet>,
    pub caption: Json<TranslationSet>,
    pub ordering: i32,
    pub url: String,
    pub width: i32,
    pub height: i32,
    pub deleted_at: Option<Timestamp>,
}

impl From<SectionImageRow> for SectionImage {
    fn from(row: SectionImageRow) -> Self {
        SectionImage {
            id: row.id,
            title: row.title.0,
            caption: row.caption.0,
            ordering: row.ordering,
            url: row.url,
            width: row.width,
            height: row.height,
            deleted: row.deleted_at.is_some(),
        }
    }
}
