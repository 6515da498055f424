//! Repository for the `hearings`, `sections` and `section_images` tables.
//!
//! Reads come in two modes: the default excludes soft-deleted rows, the
//! `include_deleted` variants return them flagged. Writes run inside a
//! caller-owned transaction so a whole aggregate is persisted atomically.

use hearing_core::hearing::Hearing;
use hearing_core::section::{Section, SectionImage};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::hearing::HearingRow;
use crate::models::section::{SectionImageRow, SectionRow};

const COLUMNS: &str = "id, slug, title, abstract, borough, published, open_at, close_at, \
     force_closed, commenting, servicemap_url, geojson, organization_id, n_comments, \
     preview_code, revision, created_at, deleted_at";

const SECTION_COLUMNS: &str = "s.id, s.hearing_id, s.type, s.ordering, s.title, s.abstract, \
     s.content, s.commenting, s.published, s.n_comments, s.plugin_identifier, s.plugin_data, \
     s.plugin_fullscreen, s.created_by, s.created_at, s.deleted_at";

const IMAGE_COLUMNS: &str = "i.id, i.section_id, i.title, i.caption, i.ordering, i.url, \
     i.width, i.height, i.deleted_at";

pub struct HearingRepo;

impl HearingRepo {
    /* --------------------------------------------------------------------------
       Reads
       -------------------------------------------------------------------------- */

    /// Find a hearing by id. Excludes soft-deleted rows unless `include_deleted`.
    pub async fn find_by_id(
        pool: &PgPool,
        id: &str,
        include_deleted: bool,
    ) -> Result<Option<HearingRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM hearings WHERE id = $1 AND ($2 OR deleted_at IS NULL)"
        );
        sqlx::query_as::<_, HearingRow>(&query)
            .bind(id)
            .bind(include_deleted)
            .fetch_optional(pool)
            .await
    }

    /// Find a hearing by slug. Excludes soft-deleted rows unless `include_deleted`.
    pub async fn find_by_slug(
        pool: &PgPool,
        slug: &str,
        include_deleted: bool,
    ) -> Result<Option<HearingRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM hearings WHERE slug = $1 AND ($2 OR deleted_at IS NULL)"
        );
        sqlx::query_as::<_, HearingRow>(&query)
            .bind(slug)
            .bind(include_deleted)
            .fetch_optional(pool)
            .await
    }

    /// All live hearings, newest first.
    pub async fn list_live(pool: &PgPool) -> Result<Vec<HearingRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM hearings WHERE deleted_at IS NULL ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, HearingRow>(&query).fetch_all(pool).await
    }

    /// Whether a hearing other than `exclude` holds `slug`, soft-deleted
    /// hearings included.
    pub async fn slug_exists(
        pool: &PgPool,
        slug: &str,
        exclude: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                 SELECT 1 FROM hearings
                 WHERE slug = $1 AND ($2::TEXT IS NULL OR id <> $2)
             )",
        )
        .bind(slug)
        .bind(exclude)
        .fetch_one(pool)
        .await
    }

    /// Sections of the given hearings in display order.
    pub async fn sections_for(
        pool: &PgPool,
        hearing_ids: &[String],
        include_deleted: bool,
    ) -> Result<Vec<SectionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {SECTION_COLUMNS} FROM sections s
             WHERE s.hearing_id = ANY($1) AND ($2 OR s.deleted_at IS NULL)
             ORDER BY s.hearing_id, s.ordering, s.created_at"
        );
        sqlx::query_as::<_, SectionRow>(&query)
            .bind(hearing_ids)
            .bind(include_deleted)
            .fetch_all(pool)
            .await
    }

    /// Images of every section of the given hearings, in display order.
    pub async fn images_for(
        pool: &PgPool,
        hearing_ids: &[String],
        include_deleted: bool,
    ) -> Result<Vec<SectionImageRow>, sqlx::Error> {
        let query = format!(
            "SELECT {IMAGE_COLUMNS} FROM section_images i
             JOIN sections s ON s.id = i.section_id
             WHERE s.hearing_id = ANY($1) AND ($2 OR i.deleted_at IS NULL)
             ORDER BY i.section_id, i.ordering"
        );
        sqlx::query_as::<_, SectionImageRow>(&query)
            .bind(hearing_ids)
            .bind(include_deleted)
            .fetch_all(pool)
            .await
    }

    /* --------------------------------------------------------------------------
       Writes (transaction-scoped)
       -------------------------------------------------------------------------- */

    /// Insert a new hearing row with revision 1.
    pub async fn insert_inner(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        hearing: &Hearing,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO hearings
                 (id, slug, title, abstract, borough, published, open_at, close_at,
                  force_closed, commenting, servicemap_url, geojson, organization_id,
                  n_comments, preview_code, created_at, deleted_at, revision)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                     CASE WHEN $17 THEN NOW() ELSE NULL END, 1)",
        )
        .bind(&hearing.id)
        .bind(&hearing.slug)
        .bind(Json(&hearing.title))
        .bind(Json(&hearing.abstract_))
        .bind(Json(&hearing.borough))
        .bind(hearing.published)
        .bind(hearing.open_at)
        .bind(hearing.close_at)
        .bind(hearing.force_closed)
        .bind(hearing.commenting.as_str())
        .bind(&hearing.servicemap_url)
        .bind(&hearing.geojson)
        .bind(hearing.organization)
        .bind(hearing.n_comments)
        .bind(&hearing.preview_code)
        .bind(hearing.created_at)
        .bind(hearing.deleted)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Update a hearing row if its stored revision equals `hearing.revision`.
    ///
    /// Returns the new revision, or `None` when the revision check failed.
    pub async fn update_inner(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        hearing: &Hearing,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE hearings SET
                 slug = $2,
                 title = $3,
                 abstract = $4,
                 borough = $5,
                 published = $6,
                 open_at = $7,
                 close_at = $8,
                 force_closed = $9,
                 commenting = $10,
                 servicemap_url = $11,
                 geojson = $12,
                 organization_id = $13,
                 n_comments = $14,
                 preview_code = $15,
                 deleted_at = CASE WHEN $16 THEN COALESCE(deleted_at, NOW()) ELSE NULL END,
                 revision = revision + 1,
                 updated_at = NOW()
             WHERE id = $1 AND revision = $17
             RETURNING revision",
        )
        .bind(&hearing.id)
        .bind(&hearing.slug)
        .bind(Json(&hearing.title))
        .bind(Json(&hearing.abstract_))
        .bind(Json(&hearing.borough))
        .bind(hearing.published)
        .bind(hearing.open_at)
        .bind(hearing.close_at)
        .bind(hearing.force_closed)
        .bind(hearing.commenting.as_str())
        .bind(&hearing.servicemap_url)
        .bind(&hearing.geojson)
        .bind(hearing.organization)
        .bind(hearing.n_comments)
        .bind(&hearing.preview_code)
        .bind(hearing.deleted)
        .bind(hearing.revision)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Insert or update one section of `hearing_id`.
    ///
    /// Returns `false` when the id exists under a different hearing.
    /// `n_comments` and `created_*` are only written on insert.
    pub async fn upsert_section_inner(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        hearing_id: &str,
        section: &Section,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO sections
                 (id, hearing_id, type, ordering, title, abstract, content, commenting,
                  published, n_comments, plugin_identifier, plugin_data, plugin_fullscreen,
                  created_by, created_at, deleted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                     CASE WHEN $16 THEN NOW() ELSE NULL END)
             ON CONFLICT (id) DO UPDATE SET
                 type = EXCLUDED.type,
                 ordering = EXCLUDED.ordering,
                 title = EXCLUDED.title,
                 abstract = EXCLUDED.abstract,
                 content = EXCLUDED.content,
                 commenting = EXCLUDED.commenting,
                 published = EXCLUDED.published,
                 plugin_identifier = EXCLUDED.plugin_identifier,
                 plugin_data = EXCLUDED.plugin_data,
                 plugin_fullscreen = EXCLUDED.plugin_fullscreen,
                 deleted_at = CASE WHEN $16 THEN COALESCE(sections.deleted_at, NOW()) ELSE NULL END,
                 updated_at = NOW()
             WHERE sections.hearing_id = EXCLUDED.hearing_id",
        )
        .bind(&section.id)
        .bind(hearing_id)
        .bind(section.section_type.as_str())
        .bind(section.ordering)
        .bind(Json(&section.title))
        .bind(Json(&section.abstract_))
        .bind(Json(&section.content))
        .bind(section.commenting.as_str())
        .bind(section.published)
        .bind(section.n_comments)
        .bind(&section.plugin_identifier)
        .bind(&section.plugin_data)
        .bind(section.plugin_fullscreen)
        .bind(section.created_by)
        .bind(section.created_at)
        .bind(section.deleted)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Insert or update one image of `section_id`.
    ///
    /// Returns `false` when the id exists under a different section.
    pub async fn upsert_image_inner(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        section_id: &str,
        image: &SectionImage,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO section_images
                 (id, section_id, title, caption, ordering, url, width, height, deleted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, CASE WHEN $9 THEN NOW() ELSE NULL END)
             ON CONFLICT (id) DO UPDATE SET
                 title = EXCLUDED.title,
                 caption = EXCLUDED.caption,
                 ordering = EXCLUDED.ordering,
                 url = EXCLUDED.url,
                 width = EXCLUDED.width,
                 height = EXCLUDED.height,
                 deleted_at = CASE WHEN $9 THEN COALESCE(section_images.deleted_at, NOW()) ELSE NULL END,
                 updated_at = NOW()
             WHERE section_images.section_id = EXCLUDED.section_id",
        )
        .bind(&image.id)
        .bind(section_id)
        .bind(Json(&image.title))
        .bind(Json(&image.caption))
        .bind(image.ordering)
        .bind(&image.url)
        .bind(image.width)
        .bind(image.height)
        .bind(image.deleted)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
