//! Response shapes for hearings and sections.
//!
//! Views wrap the domain aggregates and add the derived fields clients rely
//! on (closure state, effective abstract, section type display names).

use serde::Serialize;

use hearing_core::hearing::{Hearing, Label};
use hearing_core::section::{Commenting, Section};
use hearing_core::translation::TranslationSet;
use hearing_core::types::{DbId, Timestamp};
use hearing_core::visibility::Actor;

/// A section with its type display names.
#[derive(Debug, Serialize)]
pub struct SectionView {
    #[serde(flatten)]
    pub section: Section,
    pub type_name_singular: &'static str,
    pub type_name_plural: &'static str,
}

impl From<Section> for SectionView {
    fn from(section: Section) -> Self {
        let section_type = section.section_type;
        Self {
            section,
            type_name_singular: section_type.name_singular(),
            type_name_plural: section_type.name_plural(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HearingView {
    pub id: String,
    pub slug: String,
    pub title: TranslationSet,
    /// Falls back to the main section's abstract when the hearing has none.
    #[serde(rename = "abstract")]
    pub abstract_: TranslationSet,
    pub borough: TranslationSet,
    pub published: bool,
    pub open_at: Option<Timestamp>,
    pub close_at: Option<Timestamp>,
    pub force_closed: bool,
    pub closed: bool,
    pub commenting: Commenting,
    pub servicemap_url: String,
    pub geojson: Option<serde_json::Value>,
    pub organization: Option<DbId>,
    pub labels: Vec<Label>,
    pub sections: Vec<SectionView>,
    pub n_comments: i32,
    pub default_to_fullscreen: bool,
    pub created_at: Timestamp,
    /// Only shown to users who may edit the hearing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_code: Option<String>,
}

impl HearingView {
    pub fn new(hearing: Hearing, viewer: Option<&Actor>, now: Timestamp) -> Self {
        let closed = hearing.is_closed(now);
        let abstract_ = hearing.effective_abstract().clone();
        let default_to_fullscreen = hearing.default_to_fullscreen();
        let preview_code = viewer
            .filter(|actor| actor.can_edit(&hearing))
            .map(|_| hearing.preview_code.clone());

        Self {
            id: hearing.id,
            slug: hearing.slug,
            title: hearing.title,
            abstract_,
            borough: hearing.borough,
            published: hearing.published,
            open_at: hearing.open_at,
            close_at: hearing.close_at,
            force_closed: hearing.force_closed,
            closed,
            commenting: hearing.commenting,
            servicemap_url: hearing.servicemap_url,
            geojson: hearing.geojson,
            organization: hearing.organization,
            labels: hearing.labels,
            sections: hearing
                .sections
                .into_iter()
                .filter(|s| !s.deleted)
                .map(SectionView::from)
                .collect(),
            n_comments: hearing.n_comments,
            default_to_fullscreen,
            created_at: hearing.created_at,
            preview_code,
        }
    }
}
