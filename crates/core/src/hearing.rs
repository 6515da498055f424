//! The hearing aggregate and its request payloads.

use serde::{Deserialize, Deserializer, Serialize};

use crate::ids;
use crate::section::{Commenting, Section, SectionInput, SectionType};
use crate::translation::{TranslationField, TranslationSet};
use crate::types::{DbId, HearingId, Timestamp};

/// A shared, translated label. Hearings reference labels, never own them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: DbId,
    pub label: TranslationSet,
}

/// One public consultation: the aggregate root owning its sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hearing {
    pub id: HearingId,
    pub slug: String,
    pub title: TranslationSet,
    #[serde(rename = "abstract")]
    pub abstract_: TranslationSet,
    pub borough: TranslationSet,
    pub published: bool,
    pub open_at: Option<Timestamp>,
    pub close_at: Option<Timestamp>,
    pub force_closed: bool,
    pub commenting: Commenting,
    pub servicemap_url: String,
    pub geojson: Option<serde_json::Value>,
    pub organization: Option<DbId>,
    pub labels: Vec<Label>,
    pub sections: Vec<Section>,
    pub n_comments: i32,
    #[serde(skip_serializing, default)]
    pub preview_code: String,
    pub created_at: Timestamp,
    #[serde(skip_serializing, default)]
    pub deleted: bool,
    /// Bumped by the repository on every successful save.
    #[serde(skip_serializing, default)]
    pub revision: i64,
}

impl Hearing {
    /// Sections not soft-deleted, in display order.
    pub fn live_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| !s.deleted)
    }

    pub fn main_section(&self) -> Option<&Section> {
        self.live_sections()
            .find(|s| s.section_type == SectionType::Main)
    }

    /// Closed when forced, not yet open, or past its closing time.
    pub fn is_closed(&self, now: Timestamp) -> bool {
        if self.force_closed {
            return true;
        }
        if self.open_at.is_some_and(|open_at| now < open_at) {
            return true;
        }
        self.close_at.is_some_and(|close_at| now > close_at)
    }

    /// The main section's abstract when it has text, else the hearing's own.
    pub fn effective_abstract(&self) -> &TranslationSet {
        match self.main_section() {
            Some(main) if !main.abstract_.is_empty() => &main.abstract_,
            _ => &self.abstract_,
        }
    }

    pub fn default_to_fullscreen(&self) -> bool {
        self.main_section().is_some_and(|s| s.plugin_fullscreen)
    }

    /// Sum of live section comment counts.
    pub fn recount_comments(&mut self) {
        self.n_comments = self.live_sections().map(|s| s.n_comments).sum();
    }

    /// Mark the hearing, its sections and their images as deleted.
    pub fn soft_delete(&mut self) {
        self.deleted = true;
        for section in &mut self.sections {
            section.soft_delete();
        }
    }
}

/* --------------------------------------------------------------------------
   Payloads
   -------------------------------------------------------------------------- */

/// Reference to an existing label. Extra keys (e.g. the label text echoed
/// back from a read) are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LabelRef {
    pub id: DbId,
}

fn default_true() -> bool {
    true
}

/// Full hearing payload, used for create and whole-hearing update.
///
/// Read-only keys a client may echo back (`n_comments`, `created_at`,
/// `closed`, `organization`, …) are accepted and ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct HearingInput {
    /// Client-supplied id; only honoured on create.
    pub id: Option<HearingId>,
    /// Explicit slug; otherwise derived from the title on create.
    pub slug: Option<String>,
    #[serde(default)]
    pub title: TranslationField,
    #[serde(default, rename = "abstract")]
    pub abstract_: TranslationField,
    #[serde(default)]
    pub borough: TranslationField,
    #[serde(default = "default_true")]
    pub published: bool,
    pub open_at: Option<Timestamp>,
    pub close_at: Option<Timestamp>,
    #[serde(default)]
    pub force_closed: bool,
    #[serde(default)]
    pub commenting: Commenting,
    #[serde(default)]
    pub servicemap_url: String,
    pub geojson: Option<serde_json::Value>,
    #[serde(default)]
    pub labels: Vec<LabelRef>,
    #[serde(default)]
    pub sections: Vec<SectionInput>,
}

/// Distinguish an absent key from an explicit `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Report that a key was present, whatever its value.
fn key_present<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    serde::de::IgnoredAny::deserialize(deserializer).map(|_| true)
}

/// Partial hearing payload. Only keys present in the body are applied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HearingPatch {
    pub slug: Option<String>,
    pub title: Option<TranslationField>,
    #[serde(rename = "abstract")]
    pub abstract_: Option<TranslationField>,
    pub borough: Option<TranslationField>,
    pub published: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub open_at: Option<Option<Timestamp>>,
    #[serde(default, deserialize_with = "present")]
    pub close_at: Option<Option<Timestamp>>,
    pub force_closed: Option<bool>,
    pub commenting: Option<Commenting>,
    pub servicemap_url: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub geojson: Option<Option<serde_json::Value>>,
    pub labels: Option<Vec<LabelRef>>,
    /// Any `sections` key at all makes the patch invalid.
    #[serde(default, rename = "sections", deserialize_with = "key_present")]
    pub sections_present: bool,
}

/// Values replacing cloned fields when copying a hearing.
///
/// These are trusted, server-side values; no translation validation runs.
#[derive(Debug, Clone, Default)]
pub struct HearingOverrides {
    pub title: Option<TranslationSet>,
    pub abstract_: Option<TranslationSet>,
    pub borough: Option<TranslationSet>,
    pub published: Option<bool>,
    pub open_at: Option<Option<Timestamp>>,
    pub close_at: Option<Option<Timestamp>>,
    pub force_closed: Option<bool>,
    pub commenting: Option<Commenting>,
    pub servicemap_url: Option<String>,
    pub geojson: Option<Option<serde_json::Value>>,
    pub organization: Option<Option<DbId>>,
}

/* --------------------------------------------------------------------------
   Copy
   -------------------------------------------------------------------------- */

/// Deep-clone a hearing's structure for [`crate::composer::HearingComposer::copy`].
///
/// Labels are shared by reference. Closure-info and soft-deleted sections are
/// left out; every retained section and image gets a fresh id and comment
/// counts start from zero. The slug is left empty for the caller to
/// allocate.
pub fn clone_structure(source: &Hearing, overrides: HearingOverrides, now: Timestamp) -> Hearing {
    let sections = source
        .live_sections()
        .filter(|s| s.section_type != SectionType::ClosureInfo)
        .map(|s| Section {
            id: ids::generate_id(),
            n_comments: 0,
            created_at: now,
            deleted: false,
            images: s
                .live_images()
                .map(|image| crate::section::SectionImage {
                    id: ids::generate_id(),
                    deleted: false,
                    ..image.clone()
                })
                .collect(),
            ..s.clone()
        })
        .collect();

    let mut hearing = Hearing {
        id: ids::generate_id(),
        slug: String::new(),
        title: source.title.clone(),
        abstract_: source.abstract_.clone(),
        borough: source.borough.clone(),
        published: source.published,
        open_at: source.open_at,
        close_at: source.close_at,
        force_closed: source.force_closed,
        commenting: source.commenting,
        servicemap_url: source.servicemap_url.clone(),
        geojson: source.geojson.clone(),
        organization: source.organization,
        labels: source.labels.clone(),
        sections,
        n_comments: 0,
        preview_code: ids::generate_preview_code(),
        created_at: now,
        deleted: false,
        revision: 0,
    };

    let HearingOverrides {
        title,
        abstract_,
        borough,
        published,
        open_at,
        close_at,
        force_closed,
        commenting,
        servicemap_url,
        geojson,
        organization,
    } = overrides;

    if let Some(v) = title {
        hearing.title = v;
    }
    if let Some(v) = abstract_ {
        hearing.abstract_ = v;
    }
    if let Some(v) = borough {
        hearing.borough = v;
    }
    if let Some(v) = published {
        hearing.published = v;
    }
    if let Some(v) = open_at {
        hearing.open_at = v;
    }
    if let Some(v) = close_at {
        hearing.close_at = v;
    }
    if let Some(v) = force_closed {
        hearing.force_closed = v;
    }
    if let Some(v) = commenting {
        hearing.commenting = v;
    }
    if let Some(v) = servicemap_url {
        hearing.servicemap_url = v;
    }
    if let Some(v) = geojson {
        hearing.geojson = v;
    }
    if let Some(v) = organization {
        hearing.organization = v;
    }

    hearing
}

/* --------------------------------------------------------------------------
   Listing
   -------------------------------------------------------------------------- */

/// Filters for listing hearings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HearingQuery {
    /// Case-insensitive substring match against any title translation.
    pub title: Option<String>,
    /// `true` keeps open hearings, `false` keeps closed ones.
    pub open: Option<bool>,
    pub published: Option<bool>,
    /// Hearings opening strictly after this instant.
    pub open_at_gt: Option<Timestamp>,
    /// Hearings opening at or before this instant.
    pub open_at_lte: Option<Timestamp>,
    /// Only the single hearing closing soonest after this instant.
    pub next_closing: Option<Timestamp>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl HearingQuery {
    pub fn matches(&self, hearing: &Hearing, now: Timestamp) -> bool {
        if let Some(needle) = &self.title {
            let needle = needle.to_lowercase();
            let hit = hearing
                .title
                .languages()
                .any(|lang| hearing.title.get(lang).to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if let Some(open) = self.open {
            if hearing.is_closed(now) == open {
                return false;
            }
        }
        if let Some(published) = self.published {
            if hearing.published != published {
                return false;
            }
        }
        if let Some(after) = self.open_at_gt {
            if !hearing.open_at.is_some_and(|open_at| open_at > after) {
                return false;
            }
        }
        if let Some(until) = self.open_at_lte {
            if !hearing.open_at.is_some_and(|open_at| open_at <= until) {
                return false;
            }
        }
        if let Some(after) = self.next_closing {
            if !hearing.close_at.is_some_and(|close_at| close_at > after) {
                return false;
            }
        }
        true
    }

    /// Apply filters, ordering and pagination to live hearings.
    ///
    /// Input order is irrelevant; output is newest first, or soonest
    /// closing first when `next_closing` is set.
    pub fn apply(&self, mut hearings: Vec<Hearing>, now: Timestamp) -> Vec<Hearing> {
        hearings.retain(|h| !h.deleted && self.matches(h, now));

        if self.next_closing.is_some() {
            hearings.sort_by_key(|h| h.close_at);
            hearings.truncate(1);
            return hearings;
        }

        hearings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let offset = self.offset.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);
        hearings.into_iter().skip(offset).take(limit).collect()
    }
}
