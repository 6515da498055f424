//! PostgreSQL implementation of [`HearingRepository`].

use std::collections::HashMap;

use async_trait::async_trait;
use hearing_core::hearing::{Hearing, Label};
use hearing_core::section::{Section, SectionImage};
use hearing_core::repository::{HearingRepository, RepositoryError};
use hearing_core::types::DbId;
use hearing_core::visibility::Visibility;
use sqlx::PgPool;

use crate::models::hearing::HearingRow;
use crate::repositories::{HearingRepo, LabelRepo};

/// Unique constraint backing slug reservation.
const SLUG_CONSTRAINT: &str = "uq_hearings_slug";
const HEARING_PKEY: &str = "hearings_pkey";

#[derive(Clone)]
pub struct PgHearingRepository {
    pool: PgPool,
}

impl PgHearingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attach labels, sections and images to hearing rows.
    async fn assemble(
        &self,
        rows: Vec<HearingRow>,
        include_deleted: bool,
    ) -> Result<Vec<Hearing>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();

        let label_rows = LabelRepo::list_for_hearings(&self.pool, &ids)
            .await
            .map_err(backend)?;
        let section_rows = HearingRepo::sections_for(&self.pool, &ids, include_deleted)
            .await
            .map_err(backend)?;
        let image_rows = HearingRepo::images_for(&self.pool, &ids, include_deleted)
            .await
            .map_err(backend)?;

        let mut labels: HashMap<String, Vec<Label>> = HashMap::new();
        for row in label_rows {
            labels.entry(row.hearing_id.clone()).or_default().push(row.into());
        }

        let mut images: HashMap<String, Vec<SectionImage>> = HashMap::new();
        for row in image_rows {
            images.entry(row.section_id.clone()).or_default().push(row.into());
        }

        let mut sections: HashMap<String, Vec<Section>> = HashMap::new();
        for row in section_rows {
            let hearing_id = row.hearing_id.clone();
            let mut section = row.into_domain()?;
            section.images = images.remove(&section.id).unwrap_or_default();
            sections.entry(hearing_id).or_default().push(section);
        }

        rows.into_iter()
            .map(|row| -> Result<Hearing, RepositoryError> {
                let mut hearing = row.into_domain()?;
                hearing.labels = labels.remove(&hearing.id).unwrap_or_default();
                hearing.sections = sections.remove(&hearing.id).unwrap_or_default();
                Ok(hearing)
            })
            .collect()
    }

    async fn assemble_one(
        &self,
        row: Option<HearingRow>,
        include_deleted: bool,
    ) -> Result<Option<Hearing>, RepositoryError> {
        match row {
            Some(row) => Ok(self.assemble(vec![row], include_deleted).await?.pop()),
            None => Ok(None),
        }
    }
}

fn backend(err: sqlx::Error) -> RepositoryError {
    RepositoryError::Backend(err.into())
}

/// Map unique violations on the slug and primary key to domain errors.
fn classify_write_error(err: sqlx::Error, hearing: &Hearing) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            match db_err.constraint() {
                Some(SLUG_CONSTRAINT) => return RepositoryError::SlugTaken(hearing.slug.clone()),
                Some(HEARING_PKEY) => return RepositoryError::IdTaken(hearing.id.clone()),
                _ => {}
            }
        }
    }
    backend(err)
}

#[async_trait]
impl HearingRepository for PgHearingRepository {
    async fn load(
        &self,
        id: &str,
        visibility: Visibility,
    ) -> Result<Option<Hearing>, RepositoryError> {
        let include_deleted = visibility == Visibility::IncludeDeleted;
        let row = HearingRepo::find_by_id(&self.pool, id, include_deleted)
            .await
            .map_err(backend)?;
        self.assemble_one(row, include_deleted).await
    }

    async fn load_by_slug(
        &self,
        slug: &str,
        visibility: Visibility,
    ) -> Result<Option<Hearing>, RepositoryError> {
        let include_deleted = visibility == Visibility::IncludeDeleted;
        let row = HearingRepo::find_by_slug(&self.pool, slug, include_deleted)
            .await
            .map_err(backend)?;
        self.assemble_one(row, include_deleted).await
    }

    async fn slug_exists(
        &self,
        slug: &str,
        exclude: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        HearingRepo::slug_exists(&self.pool, slug, exclude)
            .await
            .map_err(backend)
    }

    async fn labels(&self, ids: &[DbId]) -> Result<Vec<Label>, RepositoryError> {
        let rows = LabelRepo::find_by_ids(&self.pool, ids)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(Label::from).collect())
    }

    async fn save(&self, hearing: &Hearing) -> Result<Hearing, RepositoryError> {
        let mut saved = hearing.clone();
        saved.recount_comments();

        let mut tx = self.pool.begin().await.map_err(backend)?;

        if saved.revision == 0 {
            HearingRepo::insert_inner(&mut tx, &saved)
                .await
                .map_err(|e| classify_write_error(e, &saved))?;
            saved.revision = 1;
        } else {
            let revision = HearingRepo::update_inner(&mut tx, &saved)
                .await
                .map_err(|e| classify_write_error(e, &saved))?;
            match revision {
                Some(revision) => saved.revision = revision,
                None => return Err(RepositoryError::StaleRevision(saved.id.clone())),
            }
        }

        let label_ids: Vec<DbId> = saved.labels.iter().map(|l| l.id).collect();
        LabelRepo::set_for_hearing_inner(&mut tx, &saved.id, &label_ids)
            .await
            .map_err(backend)?;

        for section in &saved.sections {
            let written = HearingRepo::upsert_section_inner(&mut tx, &saved.id, section)
                .await
                .map_err(backend)?;
            if !written {
                return Err(anyhow::anyhow!(
                    "section {} belongs to another hearing",
                    section.id
                )
                .into());
            }
            for image in &section.images {
                let written = HearingRepo::upsert_image_inner(&mut tx, &section.id, image)
                    .await
                    .map_err(backend)?;
                if !written {
                    return Err(anyhow::anyhow!(
                        "image {} belongs to another section",
                        image.id
                    )
                    .into());
                }
            }
        }

        tx.commit().await.map_err(backend)?;
        tracing::debug!(
            hearing_id = %saved.id,
            revision = saved.revision,
            sections = saved.sections.len(),
            "Hearing aggregate saved"
        );
        Ok(saved)
    }

    async fn list_live(&self) -> Result<Vec<Hearing>, RepositoryError> {
        let rows = HearingRepo::list_live(&self.pool).await.map_err(backend)?;
        self.assemble(rows, false).await
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        crate::health_check(&self.pool).await.map_err(backend)
    }
}
