//! Who may see which hearings.
//!
//! Two independent concerns live here: whether soft-deleted rows are read at
//! all ([`Visibility`]) and whether a given caller may see a live hearing
//! ([`can_read`]).

use crate::hearing::Hearing;
use crate::types::{DbId, Timestamp};

/// Read mode for repository loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Soft-deleted rows are invisible.
    Live,
    /// Soft-deleted rows are returned, flagged as deleted.
    IncludeDeleted,
}

impl Visibility {
    /// Superusers may address soft-deleted hearings; everyone else may not.
    pub fn for_actor(actor: Option<&Actor>) -> Self {
        match actor {
            Some(a) if a.is_superuser => Visibility::IncludeDeleted,
            _ => Visibility::Live,
        }
    }
}

/// The authenticated caller of a mutating operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: DbId,
    pub organization: Option<DbId>,
    pub is_superuser: bool,
}

impl Actor {
    /// Superuser, or member of the organization owning `hearing`.
    pub fn can_edit(&self, hearing: &Hearing) -> bool {
        self.is_superuser
            || (self.organization.is_some() && self.organization == hearing.organization)
    }
}

/// Whether `hearing` is visible without special rights.
pub fn is_public(hearing: &Hearing, now: Timestamp) -> bool {
    hearing.published && !hearing.open_at.is_some_and(|open_at| open_at > now)
}

/// Whether `actor` (or an anonymous caller holding `preview`) may read
/// `hearing`.
///
/// Unpublished hearings and hearings opening in the future are only shown
/// to editors of the owning organization, superusers, and holders of the
/// hearing's preview code.
pub fn can_read(
    hearing: &Hearing,
    actor: Option<&Actor>,
    preview: Option<&str>,
    now: Timestamp,
) -> bool {
    if hearing.deleted {
        return actor.is_some_and(|a| a.is_superuser);
    }
    if is_public(hearing, now) {
        return true;
    }
    if actor.is_some_and(|a| a.can_edit(hearing)) {
        return true;
    }
    matches!(preview, Some(code) if !code.is_empty() && code == hearing.preview_code)
}

/// Drop unpublished sections unless the reader can edit the hearing.
pub fn redact_for_reader(hearing: &mut Hearing, actor: Option<&Actor>) {
    if actor.is_some_and(|a| a.can_edit(hearing)) {
        return;
    }
    hearing.sections.retain(|s| s.published);
}
