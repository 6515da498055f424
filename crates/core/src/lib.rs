//! Hearing validation-and-composition engine.
//!
//! Pure domain logic for the open-hearing platform: translated text values,
//! slug allocation, section-set invariants and the [`composer::HearingComposer`]
//! that creates, updates, patches and copies hearing aggregates. Storage is
//! reached only through the [`repository::HearingRepository`] trait.

pub mod composer;
pub mod error;
pub mod hearing;
pub mod ids;
pub mod memory;
pub mod repository;
pub mod section;
pub mod slug;
pub mod translation;
pub mod types;
pub mod validation;
pub mod visibility;
