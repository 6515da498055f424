//! Storage contract for hearing aggregates.
//!
//! The composer never talks to a database directly. `hearing-db` provides
//! the PostgreSQL implementation and [`crate::memory`] an in-process one.

use async_trait::async_trait;

use crate::hearing::{Hearing, Label};
use crate::types::{DbId, HearingId};
use crate::visibility::Visibility;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The stored revision moved on since the aggregate was loaded.
    #[error("stale revision for hearing {0}")]
    StaleRevision(HearingId),

    /// The unique slug index rejected the write.
    #[error("slug already taken: {0}")]
    SlugTaken(String),

    /// A new hearing reused an id that already exists.
    #[error("hearing id already taken: {0}")]
    IdTaken(HearingId),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait HearingRepository: Send + Sync {
    /// Load one aggregate by id with all of its sections and images.
    ///
    /// With [`Visibility::Live`] a soft-deleted hearing reads as absent, and
    /// soft-deleted sections/images are left out. With
    /// [`Visibility::IncludeDeleted`] everything is returned, flagged.
    async fn load(
        &self,
        id: &str,
        visibility: Visibility,
    ) -> Result<Option<Hearing>, RepositoryError>;

    /// Load one aggregate by slug, same visibility rules as [`Self::load`].
    async fn load_by_slug(
        &self,
        slug: &str,
        visibility: Visibility,
    ) -> Result<Option<Hearing>, RepositoryError>;

    /// Whether any hearing other than `exclude`, soft-deleted ones included,
    /// holds `slug`.
    async fn slug_exists(&self, slug: &str, exclude: Option<&str>)
        -> Result<bool, RepositoryError>;

    /// Labels for the given ids. Unknown ids are simply absent from the result.
    async fn labels(&self, ids: &[DbId]) -> Result<Vec<Label>, RepositoryError>;

    /// Persist the whole aggregate atomically.
    ///
    /// `revision == 0` inserts a new hearing. Otherwise the stored revision
    /// must equal `hearing.revision` or [`RepositoryError::StaleRevision`]
    /// is returned. Soft-deleted sections and images in the aggregate are
    /// persisted as deleted. Returns the aggregate with its new revision.
    async fn save(&self, hearing: &Hearing) -> Result<Hearing, RepositoryError>;

    /// Every live hearing.
    async fn list_live(&self) -> Result<Vec<Hearing>, RepositoryError>;

    /// Connectivity check for health checks.
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
