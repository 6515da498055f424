//! Hearing sections, their images, and section-set invariants.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::translation::{TranslationField, TranslationSet};
use crate::types::{DbId, ImageId, SectionId, Timestamp};
use crate::validation::ValidationErrors;

/* --------------------------------------------------------------------------
   Messages
   -------------------------------------------------------------------------- */

pub const MSG_EXACTLY_ONE_MAIN: &str = "A hearing must have exactly one main section";
pub const MSG_AT_MOST_ONE_CLOSURE: &str =
    "A hearing cannot have more than one closure info sections";
pub const MSG_SECTIONS_IMMUTABLE_VIA_PATCH: &str =
    "Sections cannot be updated by PATCHing the Hearing";

/* --------------------------------------------------------------------------
   Enums
   -------------------------------------------------------------------------- */

/// Section type tag. `Main` and `ClosureInfo` carry cardinality rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionType {
    Main,
    ClosureInfo,
    Part,
    Scenario,
}

impl SectionType {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionType::Main => "main",
            SectionType::ClosureInfo => "closure-info",
            SectionType::Part => "part",
            SectionType::Scenario => "scenario",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "main" => Some(SectionType::Main),
            "closure-info" => Some(SectionType::ClosureInfo),
            "part" => Some(SectionType::Part),
            "scenario" => Some(SectionType::Scenario),
            _ => None,
        }
    }

    /// Display name shown to citizens (Finnish, singular).
    pub fn name_singular(self) -> &'static str {
        match self {
            SectionType::Main => "pääosio",
            SectionType::ClosureInfo => "sulkeutumistiedote",
            SectionType::Part => "osa-alue",
            SectionType::Scenario => "vaihtoehto",
        }
    }

    /// Display name shown to citizens (Finnish, plural).
    pub fn name_plural(self) -> &'static str {
        match self {
            SectionType::Main => "pääosiot",
            SectionType::ClosureInfo => "sulkeutumistiedotteet",
            SectionType::Part => "osa-alueet",
            SectionType::Scenario => "vaihtoehdot",
        }
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who may comment on a hearing or section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commenting {
    #[default]
    None,
    Open,
    Registered,
}

impl Commenting {
    pub fn as_str(self) -> &'static str {
        match self {
            Commenting::None => "none",
            Commenting::Open => "open",
            Commenting::Registered => "registered",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Commenting::None),
            "open" => Some(Commenting::Open),
            "registered" => Some(Commenting::Registered),
            _ => None,
        }
    }
}

/* --------------------------------------------------------------------------
   Entities
   -------------------------------------------------------------------------- */

/// An image attached to a section. Bytes live in external storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionImage {
    pub id: ImageId,
    pub title: TranslationSet,
    pub caption: TranslationSet,
    pub ordering: i32,
    pub url: String,
    pub width: i32,
    pub height: i32,
    #[serde(skip_serializing, default)]
    pub deleted: bool,
}

/// A titled content block within a hearing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    #[serde(rename = "type")]
    pub section_type: SectionType,
    pub ordering: i32,
    pub title: TranslationSet,
    #[serde(rename = "abstract")]
    pub abstract_: TranslationSet,
    pub content: TranslationSet,
    pub commenting: Commenting,
    pub published: bool,
    pub images: Vec<SectionImage>,
    pub n_comments: i32,
    pub plugin_identifier: String,
    pub plugin_data: String,
    pub plugin_fullscreen: bool,
    pub created_at: Timestamp,
    pub created_by: Option<DbId>,
    #[serde(skip_serializing, default)]
    pub deleted: bool,
}

impl Section {
    /// Images not soft-deleted, in display order.
    pub fn live_images(&self) -> impl Iterator<Item = &SectionImage> {
        self.images.iter().filter(|image| !image.deleted)
    }

    /// Mark the section and all of its images as deleted.
    pub fn soft_delete(&mut self) {
        self.deleted = true;
        for image in &mut self.images {
            image.deleted = true;
        }
    }
}

/* --------------------------------------------------------------------------
   Inputs
   -------------------------------------------------------------------------- */

/// Image metadata as submitted in a hearing payload.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SectionImageInput {
    pub id: Option<ImageId>,
    #[serde(default)]
    pub title: TranslationField,
    #[serde(default)]
    pub caption: TranslationField,
    #[validate(length(min = 1, max = 2048, message = "Image URL must be 1-2048 characters"))]
    #[serde(default)]
    pub url: String,
    #[validate(range(min = 1, message = "Image width must be positive"))]
    #[serde(default = "default_dimension")]
    pub width: i32,
    #[validate(range(min = 1, message = "Image height must be positive"))]
    #[serde(default = "default_dimension")]
    pub height: i32,
}

fn default_dimension() -> i32 {
    1
}

fn default_true() -> bool {
    true
}

/// A section as submitted in a create or full-update payload.
#[derive(Debug, Clone, Deserialize)]
pub struct SectionInput {
    pub id: Option<SectionId>,
    #[serde(rename = "type")]
    pub section_type: SectionType,
    /// Falls back to the hearing's commenting mode when omitted.
    pub commenting: Option<Commenting>,
    #[serde(default = "default_true")]
    pub published: bool,
    #[serde(default)]
    pub title: TranslationField,
    #[serde(default, rename = "abstract")]
    pub abstract_: TranslationField,
    #[serde(default)]
    pub content: TranslationField,
    #[serde(default)]
    pub images: Vec<SectionImageInput>,
    #[serde(default)]
    pub plugin_identifier: String,
    #[serde(default)]
    pub plugin_data: String,
    #[serde(default)]
    pub plugin_fullscreen: bool,
}

/* --------------------------------------------------------------------------
   Section-set validation
   -------------------------------------------------------------------------- */

/// Check section-type cardinality for a proposed section list.
///
/// Exactly one `Main` and at most one `ClosureInfo`. Both violations are
/// reported when both occur.
pub fn validate_section_set<I>(types: I) -> Result<(), ValidationErrors>
where
    I: IntoIterator<Item = SectionType>,
{
    let mut mains = 0usize;
    let mut closures = 0usize;
    for section_type in types {
        match section_type {
            SectionType::Main => mains += 1,
            SectionType::ClosureInfo => closures += 1,
            _ => {}
        }
    }

    let mut errors = ValidationErrors::new();
    if mains != 1 {
        errors.add("sections", MSG_EXACTLY_ONE_MAIN);
    }
    if closures > 1 {
        errors.add("sections", MSG_AT_MOST_ONE_CLOSURE);
    }
    errors.into_result()
}

/// Check that every submitted section id belongs to the target hearing.
pub fn validate_section_ownership<'a, I>(
    submitted: I,
    owned: &HashSet<&str>,
) -> Result<(), ValidationErrors>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut errors = ValidationErrors::new();
    for id in submitted {
        if !owned.contains(id) {
            errors.add(
                "sections",
                format!("The Hearing does not have a section with ID {id}"),
            );
        }
    }
    errors.into_result()
}
