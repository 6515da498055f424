//! Hearing aggregate composition: create, full update, partial update, copy,
//! read, list and soft delete.
//!
//! Every write validates the whole payload first and reports all problems in
//! one [`ValidationErrors`] map. Nothing is persisted unless validation
//! passes, and each aggregate is persisted with a single repository `save`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::error::CoreError;
use crate::hearing::{
    clone_structure, Hearing, HearingInput, HearingOverrides, HearingPatch, HearingQuery, Label,
    LabelRef,
};
use crate::ids;
use crate::repository::{HearingRepository, RepositoryError};
use crate::section::{
    validate_section_ownership, validate_section_set, Commenting, Section, SectionImage,
    SectionImageInput, SectionInput, MSG_SECTIONS_IMMUTABLE_VIA_PATCH,
};
use crate::slug;
use crate::translation::{SupportedLanguages, TranslationField, TranslationSet};
use crate::types::{DbId, Timestamp};
use crate::validation::{collect_validator_errors, ValidationErrors};
use crate::visibility::{can_read, redact_for_reader, Actor, Visibility};

/// Attempts at saving a freshly allocated slug before giving up with a
/// conflict.
pub const MAX_SLUG_ATTEMPTS: usize = 3;

pub const MSG_OTHER_ORGANIZATION: &str = "User cannot update hearings from different organizations.";

fn no_organization(verb: &str) -> CoreError {
    CoreError::Forbidden(format!("User without organization cannot {verb} hearings."))
}

fn hearing_not_found(id: &str) -> CoreError {
    CoreError::NotFound {
        entity: "Hearing",
        id: id.to_string(),
    }
}

/// Validate a translated field, recording failures under `key`.
///
/// Returns an empty set on failure so composition can continue and collect
/// the remaining errors.
fn translate(
    languages: &SupportedLanguages,
    field: TranslationField,
    key: &str,
    errors: &mut ValidationErrors,
) -> TranslationSet {
    match field.into_set(languages) {
        Ok(set) => set,
        Err(err) => {
            errors.extend(key, err.messages());
            TranslationSet::new()
        }
    }
}

pub struct HearingComposer {
    repo: Arc<dyn HearingRepository>,
    languages: SupportedLanguages,
}

impl HearingComposer {
    pub fn new(repo: Arc<dyn HearingRepository>, languages: SupportedLanguages) -> Self {
        Self { repo, languages }
    }

    pub fn languages(&self) -> &SupportedLanguages {
        &self.languages
    }

    pub async fn ping(&self) -> Result<(), CoreError> {
        Ok(self.repo.ping().await?)
    }

    /* ----------------------------------------------------------------------
       Writes
       ---------------------------------------------------------------------- */

    /// Create a hearing owned by the actor's organization.
    ///
    /// Section and image ids in the payload are ignored; a hearing id is
    /// honoured when supplied.
    pub async fn create(&self, mut input: HearingInput, actor: &Actor) -> Result<Hearing, CoreError> {
        let organization = actor.organization.ok_or_else(|| no_organization("POST"))?;
        let now = Utc::now();

        for section in &mut input.sections {
            section.id = None;
            for image in &mut section.images {
                image.id = None;
            }
        }
        let id = input
            .id
            .take()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(ids::generate_id);
        let requested_slug = input.slug.take();

        let mut hearing = Hearing {
            id,
            slug: String::new(),
            title: TranslationSet::new(),
            abstract_: TranslationSet::new(),
            borough: TranslationSet::new(),
            published: true,
            open_at: None,
            close_at: None,
            force_closed: false,
            commenting: Commenting::None,
            servicemap_url: String::new(),
            geojson: None,
            organization: Some(organization),
            labels: Vec::new(),
            sections: Vec::new(),
            n_comments: 0,
            preview_code: ids::generate_preview_code(),
            created_at: now,
            deleted: false,
            revision: 0,
        };
        self.apply_input(&mut hearing, input, actor, now).await?;

        let base = match requested_slug.filter(|s| !s.trim().is_empty()) {
            Some(requested) => slug::slugify(&requested),
            None => self.slug_base(&hearing.title),
        };
        hearing.slug = self.allocate_slug(&base, None).await?;

        let saved = self.save_allocating(&mut hearing, Some(&base)).await?;
        tracing::info!(
            hearing_id = %saved.id,
            slug = %saved.slug,
            sections = saved.sections.len(),
            organization_id = organization,
            "Hearing created"
        );
        Ok(saved)
    }

    /// Replace a hearing's content with `input`.
    ///
    /// Sections matching an owned id are updated in place, sections without
    /// an id are created, owned sections missing from `input` are
    /// soft-deleted together with their images. The same rules apply to
    /// each section's images. `created_at` and the slug are kept unless a
    /// different slug is requested explicitly.
    pub async fn update(
        &self,
        id: &str,
        mut input: HearingInput,
        actor: &Actor,
    ) -> Result<Hearing, CoreError> {
        let mut hearing = self.load_for_write(id, actor, "PUT").await?;
        let requested_slug = input.slug.take();

        self.apply_input(&mut hearing, input, actor, Utc::now()).await?;
        let base = self.overwrite_slug(&mut hearing, requested_slug).await?;

        let saved = self.save_allocating(&mut hearing, base.as_deref()).await?;
        tracing::info!(
            hearing_id = %saved.id,
            revision = saved.revision,
            sections = saved.live_sections().count(),
            "Hearing updated"
        );
        Ok(saved)
    }

    /// Apply only the fields present in `patch`.
    ///
    /// Translated fields merge per language. Any `sections` key fails the
    /// whole patch.
    pub async fn patch(
        &self,
        id: &str,
        patch: HearingPatch,
        actor: &Actor,
    ) -> Result<Hearing, CoreError> {
        let mut hearing = self.load_for_write(id, actor, "PATCH").await?;

        let mut errors = ValidationErrors::new();
        if patch.sections_present {
            errors.add("sections", MSG_SECTIONS_IMMUTABLE_VIA_PATCH);
            return Err(errors.into());
        }

        let HearingPatch {
            slug,
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
            labels,
            sections_present: _,
        } = patch;

        if let Some(field) = title {
            let set = translate(&self.languages, field, "title", &mut errors);
            hearing.title.merge(set);
        }
        if let Some(field) = abstract_ {
            let set = translate(&self.languages, field, "abstract", &mut errors);
            hearing.abstract_.merge(set);
        }
        if let Some(field) = borough {
            let set = translate(&self.languages, field, "borough", &mut errors);
            hearing.borough.merge(set);
        }
        if let Some(refs) = labels {
            hearing.labels = self.resolve_labels(&refs, &mut errors).await?;
        }
        errors.into_result()?;

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

        let base = self.overwrite_slug(&mut hearing, slug).await?;
        let saved = self.save_allocating(&mut hearing, base.as_deref()).await?;
        tracing::info!(hearing_id = %saved.id, revision = saved.revision, "Hearing patched");
        Ok(saved)
    }

    /// Duplicate `source` as a new hearing.
    ///
    /// Closure-info sections are not copied, labels are shared, and the new
    /// slug is derived from the (possibly overridden) title.
    pub async fn copy(
        &self,
        source: &Hearing,
        overrides: HearingOverrides,
    ) -> Result<Hearing, CoreError> {
        let mut hearing = clone_structure(source, overrides, Utc::now());
        let base = self.slug_base(&hearing.title);
        hearing.slug = self.allocate_slug(&base, None).await?;

        let saved = self.save_allocating(&mut hearing, Some(&base)).await?;
        tracing::info!(
            source_id = %source.id,
            hearing_id = %saved.id,
            slug = %saved.slug,
            sections = saved.sections.len(),
            "Hearing copied"
        );
        Ok(saved)
    }

    /// Load a hearing the actor may edit and copy it.
    pub async fn copy_by_id(
        &self,
        id: &str,
        overrides: HearingOverrides,
        actor: &Actor,
    ) -> Result<Hearing, CoreError> {
        let source = self.load_for_write(id, actor, "POST").await?;
        self.copy(&source, overrides).await
    }

    /// Soft-delete a hearing with its sections and images. Its slug stays
    /// reserved.
    pub async fn delete(&self, id: &str, actor: &Actor) -> Result<(), CoreError> {
        let mut hearing = self.load_for_write(id, actor, "DELETE").await?;
        if hearing.deleted {
            return Ok(());
        }
        hearing.soft_delete();
        self.repo.save(&hearing).await?;
        tracing::info!(hearing_id = %hearing.id, slug = %hearing.slug, "Hearing soft-deleted");
        Ok(())
    }

    /* ----------------------------------------------------------------------
       Reads
       ---------------------------------------------------------------------- */

    /// Read one hearing by id, falling back to slug.
    ///
    /// Hearings the caller may not see read as not found.
    pub async fn get(
        &self,
        id_or_slug: &str,
        actor: Option<&Actor>,
        preview: Option<&str>,
    ) -> Result<Hearing, CoreError> {
        let visibility = Visibility::for_actor(actor);
        let found = match self.repo.load(id_or_slug, visibility).await? {
            Some(hearing) => Some(hearing),
            None => self.repo.load_by_slug(id_or_slug, visibility).await?,
        };

        let now = Utc::now();
        let mut hearing = found
            .filter(|h| can_read(h, actor, preview, now))
            .ok_or_else(|| hearing_not_found(id_or_slug))?;

        hearing.sections.retain(|s| !s.deleted);
        for section in &mut hearing.sections {
            section.images.retain(|i| !i.deleted);
        }
        redact_for_reader(&mut hearing, actor);
        Ok(hearing)
    }

    /// Live hearings visible to `actor`, filtered and paginated by `query`.
    pub async fn list(
        &self,
        query: &HearingQuery,
        actor: Option<&Actor>,
    ) -> Result<Vec<Hearing>, CoreError> {
        let now = Utc::now();
        let visible: Vec<Hearing> = self
            .repo
            .list_live()
            .await?
            .into_iter()
            .filter(|h| can_read(h, actor, None, now))
            .collect();

        let mut page = query.apply(visible, now);
        for hearing in &mut page {
            redact_for_reader(hearing, actor);
        }
        Ok(page)
    }

    /* ----------------------------------------------------------------------
       Internals
       ---------------------------------------------------------------------- */

    /// Load a hearing for a write, enforcing organization rules.
    async fn load_for_write(&self, id: &str, actor: &Actor, verb: &str) -> Result<Hearing, CoreError> {
        if !actor.is_superuser && actor.organization.is_none() {
            return Err(no_organization(verb));
        }
        let hearing = self
            .repo
            .load(id, Visibility::for_actor(Some(actor)))
            .await?
            .ok_or_else(|| hearing_not_found(id))?;
        if !actor.can_edit(&hearing) {
            return Err(CoreError::Forbidden(MSG_OTHER_ORGANIZATION.to_string()));
        }
        Ok(hearing)
    }

    /// Validate a full payload and write it into `hearing`.
    ///
    /// `hearing` is left untouched when validation fails.
    async fn apply_input(
        &self,
        hearing: &mut Hearing,
        input: HearingInput,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        let HearingInput {
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
            labels,
            sections,
            ..
        } = input;

        let mut errors = ValidationErrors::new();
        let title = translate(&self.languages, title, "title", &mut errors);
        let abstract_ = translate(&self.languages, abstract_, "abstract", &mut errors);
        let borough = translate(&self.languages, borough, "borough", &mut errors);

        if let Err(e) = validate_section_set(sections.iter().map(|s| s.section_type)) {
            errors.merge(e);
        }
        {
            let owned: HashSet<&str> = hearing.live_sections().map(|s| s.id.as_str()).collect();
            let submitted = sections.iter().filter_map(|s| s.id.as_deref());
            if let Err(e) = validate_section_ownership(submitted, &owned) {
                errors.merge(e);
            }
        }

        let labels = self.resolve_labels(&labels, &mut errors).await?;
        let sections = build_sections(
            &self.languages,
            &hearing.sections,
            sections,
            commenting,
            actor.user_id,
            now,
            &mut errors,
        );
        errors.into_result()?;

        hearing.title = title;
        hearing.abstract_ = abstract_;
        hearing.borough = borough;
        hearing.published = published;
        hearing.open_at = open_at;
        hearing.close_at = close_at;
        hearing.force_closed = force_closed;
        hearing.commenting = commenting;
        hearing.servicemap_url = servicemap_url;
        hearing.geojson = geojson;
        hearing.labels = labels;
        hearing.sections = sections;
        hearing.recount_comments();
        Ok(())
    }

    /// Look up referenced labels, reporting unknown ids on `labels`.
    async fn resolve_labels(
        &self,
        refs: &[LabelRef],
        errors: &mut ValidationErrors,
    ) -> Result<Vec<Label>, CoreError> {
        let mut ids: Vec<DbId> = Vec::with_capacity(refs.len());
        for r in refs {
            if !ids.contains(&r.id) {
                ids.push(r.id);
            }
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found = self.repo.labels(&ids).await?;
        let mut labels = Vec::with_capacity(ids.len());
        for id in ids {
            match found.iter().find(|l| l.id == id) {
                Some(label) => labels.push(label.clone()),
                None => errors.add(
                    "labels",
                    format!("Invalid pk \"{id}\" - object does not exist."),
                ),
            }
        }
        Ok(labels)
    }

    /// Slug base for a title: its default-language text, or any text.
    fn slug_base(&self, title: &TranslationSet) -> String {
        let text = match self.languages.default_language() {
            Some(lang) => title.best(lang),
            None => title.best(""),
        };
        slug::slugify(text)
    }

    async fn allocate_slug(&self, base: &str, exclude: Option<&str>) -> Result<String, CoreError> {
        let repo = &self.repo;
        let slug = slug::allocate_async(base, |candidate| async move {
            repo.slug_exists(&candidate, exclude).await
        })
        .await?;
        Ok(slug)
    }

    /// Apply an explicitly requested slug. Returns the base to retry with
    /// when the slug changed.
    async fn overwrite_slug(
        &self,
        hearing: &mut Hearing,
        requested: Option<String>,
    ) -> Result<Option<String>, CoreError> {
        let Some(requested) = requested.filter(|s| !s.trim().is_empty()) else {
            return Ok(None);
        };
        let base = slug::slugify(&requested);
        if base == hearing.slug {
            return Ok(None);
        }
        let id = hearing.id.clone();
        hearing.slug = self.allocate_slug(&base, Some(&id)).await?;
        Ok(Some(base))
    }

    /// Save, re-allocating the slug from `base` when a concurrent writer took
    /// it first.
    async fn save_allocating(
        &self,
        hearing: &mut Hearing,
        base: Option<&str>,
    ) -> Result<Hearing, CoreError> {
        let mut attempt = 1;
        loop {
            match self.repo.save(hearing).await {
                Ok(saved) => return Ok(saved),
                Err(RepositoryError::SlugTaken(slug)) if attempt < MAX_SLUG_ATTEMPTS => {
                    let Some(base) = base else {
                        return Err(RepositoryError::SlugTaken(slug).into());
                    };
                    tracing::warn!(
                        hearing_id = %hearing.id,
                        slug = %slug,
                        attempt,
                        "Slug taken concurrently, reallocating"
                    );
                    let id = hearing.id.clone();
                    hearing.slug = self.allocate_slug(base, Some(&id)).await?;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Build the new section list from a payload against the current sections.
fn build_sections(
    languages: &SupportedLanguages,
    existing: &[Section],
    inputs: Vec<SectionInput>,
    hearing_commenting: Commenting,
    created_by: DbId,
    now: Timestamp,
    errors: &mut ValidationErrors,
) -> Vec<Section> {
    let mut out: Vec<Section> = Vec::with_capacity(inputs.len());
    let mut kept: HashSet<String> = HashSet::new();

    for (i, input) in inputs.into_iter().enumerate() {
        let prefix = format!("sections[{i}]");
        let current = match input.id.as_deref() {
            Some(id) => match existing.iter().find(|s| !s.deleted && s.id == id) {
                Some(section) => Some(section),
                // Reported by the ownership check.
                None => continue,
            },
            None => None,
        };
        if let Some(section) = current {
            if !kept.insert(section.id.clone()) {
                errors.add(
                    "sections",
                    format!("Section ID {} appears more than once", section.id),
                );
                continue;
            }
        }

        let SectionInput {
            section_type,
            commenting,
            published,
            title,
            abstract_,
            content,
            images,
            plugin_identifier,
            plugin_data,
            plugin_fullscreen,
            ..
        } = input;

        let title = translate(languages, title, &format!("{prefix}.title"), errors);
        let abstract_ = translate(languages, abstract_, &format!("{prefix}.abstract"), errors);
        let content = translate(languages, content, &format!("{prefix}.content"), errors);
        let current_images = current.map(|s| s.images.as_slice()).unwrap_or(&[]);
        let images = build_images(languages, current_images, images, &prefix, errors);

        let (id, n_comments, created_at, created_by) = match current {
            Some(s) => (s.id.clone(), s.n_comments, s.created_at, s.created_by),
            None => (ids::generate_id(), 0, now, Some(created_by)),
        };

        out.push(Section {
            id,
            section_type,
            ordering: i as i32,
            title,
            abstract_,
            content,
            commenting: commenting.unwrap_or(hearing_commenting),
            published,
            images,
            n_comments,
            plugin_identifier,
            plugin_data,
            plugin_fullscreen,
            created_at,
            created_by,
            deleted: false,
        });
    }

    for old in existing.iter().filter(|s| !s.deleted && !kept.contains(&s.id)) {
        let mut gone = old.clone();
        gone.soft_delete();
        out.push(gone);
    }
    out
}

/// Build a section's image list; same in-place/create/soft-delete rules as
/// sections.
fn build_images(
    languages: &SupportedLanguages,
    existing: &[SectionImage],
    inputs: Vec<SectionImageInput>,
    section_prefix: &str,
    errors: &mut ValidationErrors,
) -> Vec<SectionImage> {
    let mut out: Vec<SectionImage> = Vec::with_capacity(inputs.len());
    let mut kept: HashSet<String> = HashSet::new();

    for (j, input) in inputs.into_iter().enumerate() {
        let prefix = format!("{section_prefix}.images[{j}]");
        if let Err(e) = input.validate() {
            collect_validator_errors(errors, &prefix, &e);
        }

        let id = match input.id.as_deref() {
            Some(id) => match existing.iter().find(|img| !img.deleted && img.id == id) {
                Some(img) if kept.insert(img.id.clone()) => img.id.clone(),
                _ => {
                    errors.add(
                        format!("{section_prefix}.images"),
                        format!("The Section does not have an image with ID {id}"),
                    );
                    continue;
                }
            },
            None => ids::generate_id(),
        };

        let SectionImageInput {
            title,
            caption,
            url,
            width,
            height,
            ..
        } = input;
        out.push(SectionImage {
            id,
            title: translate(languages, title, &format!("{prefix}.title"), errors),
            caption: translate(languages, caption, &format!("{prefix}.caption"), errors),
            ordering: j as i32,
            url,
            width,
            height,
            deleted: false,
        });
    }

    for old in existing.iter().filter(|img| !img.deleted && !kept.contains(&img.id)) {
        let mut gone = old.clone();
        gone.deleted = true;
        out.push(gone);
    }
    out
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Duration;
    use serde_json::{json, Value};

    use super::*;
    use crate::memory::InMemoryHearingRepository;
    use crate::section::{SectionType, MSG_AT_MOST_ONE_CLOSURE, MSG_EXACTLY_ONE_MAIN};

    async fn setup() -> (Arc<InMemoryHearingRepository>, HearingComposer) {
        let repo = Arc::new(InMemoryHearingRepository::new());
        repo.insert_label(1, TranslationSet::single("en", "Label one"))
            .await;
        repo.insert_label(2, TranslationSet::single("en", "Label two"))
            .await;
        let composer = HearingComposer::new(repo.clone(), SupportedLanguages::default());
        (repo, composer)
    }

    fn staff() -> Actor {
        Actor {
            user_id: 1,
            organization: Some(10),
            is_superuser: false,
        }
    }

    fn outsider() -> Actor {
        Actor {
            user_id: 2,
            organization: Some(20),
            is_superuser: false,
        }
    }

    fn no_org() -> Actor {
        Actor {
            user_id: 3,
            organization: None,
            is_superuser: false,
        }
    }

    fn admin() -> Actor {
        Actor {
            user_id: 4,
            organization: None,
            is_superuser: true,
        }
    }

    fn valid_json() -> Value {
        json!({
            "title": {
                "en": "Test purpose created hearing title 1",
                "fi": "Testitarkoitukseen luotu kuulemisen otsikko 1",
                "sv": "Testhörande titel 1"
            },
            "abstract": {"en": "Hearing abstract"},
            "borough": {"en": "Punavuori", "fi": "Punavuori"},
            "published": true,
            "open_at": "2016-09-29T11:39:12Z",
            "close_at": "2016-09-29T11:39:12Z",
            "force_closed": false,
            "commenting": "open",
            "servicemap_url": "http://servicemap.hel.fi",
            "geojson": {"type": "Point", "coordinates": [24.9, 60.1]},
            "labels": [{"id": 1}, {"id": 2}],
            "sections": [
                {
                    "type": "main",
                    "title": {"en": "Main section"},
                    "abstract": {"en": "Main abstract"},
                    "content": {"en": "Main content"},
                    "images": [
                        {
                            "url": "https://example.com/1.jpg",
                            "width": 640,
                            "height": 480,
                            "caption": {"en": "First"}
                        },
                        {
                            "url": "https://example.com/2.jpg",
                            "width": 640,
                            "height": 480,
                            "caption": {"en": "Second"}
                        }
                    ]
                },
                {
                    "type": "closure-info",
                    "title": {"en": "Closure info"},
                    "content": {"en": "Thanks"}
                },
                {
                    "type": "part",
                    "title": {"en": "Part one"},
                    "commenting": "registered"
                }
            ]
        })
    }

    fn input(value: Value) -> HearingInput {
        serde_json::from_value(value).unwrap()
    }

    /// A hearing as a client would PUT it back after reading it.
    fn echo(hearing: &Hearing) -> Value {
        serde_json::to_value(hearing).unwrap()
    }

    fn live_ids(hearing: &Hearing) -> Vec<String> {
        hearing.live_sections().map(|s| s.id.clone()).collect()
    }

    /* ---- create ---- */

    #[tokio::test]
    async fn create_round_trips_scalar_fields() {
        let (_repo, composer) = setup().await;
        let created = composer.create(input(valid_json()), &staff()).await.unwrap();
        let read = composer.get(&created.id, None, None).await.unwrap();

        assert_eq!(read.id.len(), ids::ID_LENGTH);
        assert_eq!(read.slug, "test-purpose-created-hearing-title-1");
        assert_eq!(read.title.get("fi"), "Testitarkoitukseen luotu kuulemisen otsikko 1");
        assert_eq!(read.borough.get("en"), "Punavuori");
        assert_eq!(read.servicemap_url, "http://servicemap.hel.fi");
        assert_eq!(read.commenting, Commenting::Open);
        assert!(read.published);
        assert!(!read.force_closed);
        assert_eq!(read.geojson, Some(json!({"type": "Point", "coordinates": [24.9, 60.1]})));
        assert_eq!(read.organization, Some(10));
        assert_eq!(read.labels.iter().map(|l| l.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(read.sections.len(), 3);
        assert_eq!(read.sections[0].images.len(), 2);
        assert_eq!(read.sections[0].images[1].caption.get("en"), "Second");
        assert!((Utc::now() - read.created_at) < Duration::seconds(5));
        assert_eq!(read.n_comments, 0);
    }

    #[tokio::test]
    async fn sections_inherit_commenting_unless_overridden() {
        let (_repo, composer) = setup().await;
        let created = composer.create(input(valid_json()), &staff()).await.unwrap();
        assert_eq!(created.sections[0].commenting, Commenting::Open);
        assert_eq!(created.sections[2].commenting, Commenting::Registered);
    }

    #[tokio::test]
    async fn create_honours_client_id_and_rejects_reuse() {
        let (_repo, composer) = setup().await;
        let mut body = valid_json();
        body["id"] = json!("my-hearing-id");
        let created = composer.create(input(body.clone()), &staff()).await.unwrap();
        assert_eq!(created.id, "my-hearing-id");

        let err = composer.create(input(body), &staff()).await.unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));
    }

    #[tokio::test]
    async fn create_without_organization_is_forbidden() {
        let (_repo, composer) = setup().await;
        let err = composer.create(input(valid_json()), &no_org()).await.unwrap_err();
        assert_matches!(err, CoreError::Forbidden(msg) if msg == "User without organization cannot POST hearings.");
    }

    #[tokio::test]
    async fn create_collects_every_validation_error() {
        let (repo, composer) = setup().await;
        let mut body = valid_json();
        body["title"] = json!("Plain title");
        body["borough"] = json!({"fr": "Quartier"});
        body["labels"] = json!([{"id": 1}, {"id": 99}]);
        body["sections"][1]["type"] = json!("main");
        body["sections"][0]["content"] = json!({"de": "Inhalt"});
        body["sections"][0]["images"][1]["url"] = json!("");

        let err = composer.create(input(body), &staff()).await.unwrap_err();
        let errors = assert_matches!(err, CoreError::Validation(e) => e);

        assert!(errors.contains("title", "Not a valid translation format. Expecting {\"lang_code\": Plain title}"));
        assert!(errors.contains("borough", "fr is not a supported languages (['en', 'fi', 'sv'])"));
        assert!(errors.contains("labels", "Invalid pk \"99\""));
        assert!(errors.contains("sections", MSG_EXACTLY_ONE_MAIN));
        assert!(errors.contains("sections[0].content", "de is not a supported languages"));
        assert!(!errors.get("sections[0].images[1].url").is_empty());
        assert!(repo.list_live().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_rejects_two_closure_sections() {
        let (_repo, composer) = setup().await;
        let mut body = valid_json();
        body["sections"][2]["type"] = json!("closure-info");
        let err = composer.create(input(body), &staff()).await.unwrap_err();
        assert_matches!(err, CoreError::Validation(e) if e.contains("sections", MSG_AT_MOST_ONE_CLOSURE));
    }

    #[tokio::test]
    async fn explicit_slug_is_used_and_resolved() {
        let (_repo, composer) = setup().await;
        let mut body = valid_json();
        body["slug"] = json!("my-slug");
        let first = composer.create(input(body.clone()), &staff()).await.unwrap();
        let second = composer.create(input(body), &staff()).await.unwrap();
        assert_eq!(first.slug, "my-slug");
        assert_eq!(second.slug, "my-slug-2");
    }

    /* ---- slugs ---- */

    #[tokio::test]
    async fn soft_deleted_hearing_keeps_slug_reserved() {
        let (_repo, composer) = setup().await;
        let first = composer.create(input(valid_json()), &staff()).await.unwrap();
        composer.delete(&first.id, &staff()).await.unwrap();

        let second = composer.create(input(valid_json()), &staff()).await.unwrap();
        assert_eq!(first.slug, "test-purpose-created-hearing-title-1");
        assert_eq!(second.slug, "test-purpose-created-hearing-title-1-2");
    }

    #[tokio::test]
    async fn setting_slug_skips_deleted_holders() {
        let (_repo, composer) = setup().await;
        let mut body = valid_json();
        body["slug"] = json!("slug");
        let _holder = composer.create(input(body.clone()), &staff()).await.unwrap();
        let deleted = composer.create(input(body.clone()), &staff()).await.unwrap();
        assert_eq!(deleted.slug, "slug-2");
        composer.delete(&deleted.id, &staff()).await.unwrap();

        let mut other_body = valid_json();
        other_body["title"] = json!({"en": "Something else"});
        let other = composer.create(input(other_body), &staff()).await.unwrap();
        let patched = composer
            .patch(
                &other.id,
                serde_json::from_value(json!({"slug": "slug"})).unwrap(),
                &staff(),
            )
            .await
            .unwrap();
        assert_eq!(patched.slug, "slug-3");
    }

    #[tokio::test]
    async fn title_change_does_not_rederive_slug() {
        let (_repo, composer) = setup().await;
        let created = composer.create(input(valid_json()), &staff()).await.unwrap();
        let mut body = echo(&created);
        body["title"] = json!({"en": "A completely different title"});
        let updated = composer.update(&created.id, input(body), &staff()).await.unwrap();
        assert_eq!(updated.slug, created.slug);
    }

    #[tokio::test]
    async fn slug_race_is_retried() {
        let (repo, composer) = setup().await;
        repo.simulate_slug_race("test-purpose-created-hearing-title-1")
            .await;
        let created = composer.create(input(valid_json()), &staff()).await.unwrap();
        assert_eq!(created.slug, "test-purpose-created-hearing-title-1-2");
    }

    /* ---- update ---- */

    #[tokio::test]
    async fn update_keeps_ids_and_created_at() {
        let (_repo, composer) = setup().await;
        let created = composer.create(input(valid_json()), &staff()).await.unwrap();

        let mut body = echo(&created);
        body["sections"][0]["title"] = json!({"en": "Renamed main"});
        let updated = composer.update(&created.id, input(body), &staff()).await.unwrap();

        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(live_ids(&updated), live_ids(&created));
        assert_eq!(updated.sections[0].title.get("en"), "Renamed main");
        assert_eq!(updated.sections[0].created_at, created.sections[0].created_at);
        assert_eq!(updated.revision, created.revision + 1);
    }

    #[tokio::test]
    async fn update_with_fewer_languages_drops_the_rest() {
        let (_repo, composer) = setup().await;
        let created = composer.create(input(valid_json()), &staff()).await.unwrap();
        let mut body = echo(&created);
        body["title"].as_object_mut().unwrap().remove("sv");
        let updated = composer.update(&created.id, input(body), &staff()).await.unwrap();
        assert!(!updated.title.languages().any(|l| l == "sv"));
        assert_eq!(updated.title.get("en"), created.title.get("en"));
        assert_eq!(updated.title.get("fi"), created.title.get("fi"));
    }

    #[tokio::test]
    async fn omitted_section_is_soft_deleted_with_images() {
        let (repo, composer) = setup().await;
        let created = composer.create(input(valid_json()), &staff()).await.unwrap();
        let main_id = created.sections[0].id.clone();
        let part_id = created.sections[2].id.clone();

        // Drop the main section and promote the part to main.
        let mut body = echo(&created);
        let sections = body["sections"].as_array_mut().unwrap();
        sections.remove(0);
        sections[1]["type"] = json!("main");
        let updated = composer.update(&created.id, input(body), &staff()).await.unwrap();

        assert!(!live_ids(&updated).contains(&main_id));
        let read = composer.get(&created.id, None, None).await.unwrap();
        assert!(read.sections.iter().all(|s| s.id != main_id));
        assert!(read.sections.iter().any(|s| s.id == part_id));

        let stored = repo
            .load(&created.id, Visibility::IncludeDeleted)
            .await
            .unwrap()
            .unwrap();
        let gone = stored.sections.iter().find(|s| s.id == main_id).unwrap();
        assert!(gone.deleted);
        assert_eq!(gone.images.len(), 2);
        assert!(gone.images.iter().all(|i| i.deleted));
    }

    #[tokio::test]
    async fn update_rejects_foreign_section() {
        let (_repo, composer) = setup().await;
        let other = composer.create(input(valid_json()), &staff()).await.unwrap();
        let created = composer.create(input(valid_json()), &staff()).await.unwrap();
        let foreign_id = other.sections[0].id.clone();

        let mut body = echo(&created);
        body["sections"][0]["id"] = json!(foreign_id);
        let err = composer.update(&created.id, input(body), &staff()).await.unwrap_err();
        let errors = assert_matches!(err, CoreError::Validation(e) => e);
        assert!(errors.contains(
            "sections",
            &format!("The Hearing does not have a section with ID {foreign_id}")
        ));
    }

    #[tokio::test]
    async fn update_images_in_place_create_and_delete() {
        let (repo, composer) = setup().await;
        let created = composer.create(input(valid_json()), &staff()).await.unwrap();
        let first = created.sections[0].images[0].id.clone();
        let second = created.sections[0].images[1].id.clone();

        let mut body = echo(&created);
        let images = body["sections"][0]["images"].as_array_mut().unwrap();
        images.remove(1);
        images[0]["caption"] = json!({"en": "Edited"});
        images.push(json!({"url": "https://example.com/3.jpg", "width": 1, "height": 1}));
        let updated = composer.update(&created.id, input(body), &staff()).await.unwrap();

        let live: Vec<_> = updated.sections[0].live_images().collect();
        assert_eq!(live.len(), 2);
        assert_eq!(live[0].id, first);
        assert_eq!(live[0].caption.get("en"), "Edited");
        assert_ne!(live[1].id, second);

        let stored = repo.stored(&created.id).await.unwrap();
        let removed = stored.sections[0].images.iter().find(|i| i.id == second).unwrap();
        assert!(removed.deleted);
    }

    #[tokio::test]
    async fn update_rejects_foreign_image() {
        let (_repo, composer) = setup().await;
        let created = composer.create(input(valid_json()), &staff()).await.unwrap();
        let mut body = echo(&created);
        body["sections"][0]["images"][0]["id"] = json!("not-an-owned-image");
        let err = composer.update(&created.id, input(body), &staff()).await.unwrap_err();
        assert_matches!(err, CoreError::Validation(e) if e.contains(
            "sections[0].images",
            "The Section does not have an image with ID not-an-owned-image"
        ));
    }

    #[tokio::test]
    async fn update_authorization() {
        let (_repo, composer) = setup().await;
        let created = composer.create(input(valid_json()), &staff()).await.unwrap();

        let err = composer
            .update(&created.id, input(echo(&created)), &no_org())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Forbidden(msg) if msg == "User without organization cannot PUT hearings.");

        let err = composer
            .update(&created.id, input(echo(&created)), &outsider())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Forbidden(msg) if msg == MSG_OTHER_ORGANIZATION);

        let err = composer
            .update("missing", input(echo(&created)), &staff())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::NotFound { .. });
    }

    #[tokio::test]
    async fn deleted_hearing_is_not_found_except_for_superusers() {
        let (_repo, composer) = setup().await;
        let created = composer.create(input(valid_json()), &staff()).await.unwrap();
        composer.delete(&created.id, &staff()).await.unwrap();

        let err = composer
            .update(&created.id, input(echo(&created)), &staff())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::NotFound { .. });
        assert_matches!(
            composer.get(&created.id, None, None).await,
            Err(CoreError::NotFound { .. })
        );

        let read = composer.get(&created.id, Some(&admin()), None).await.unwrap();
        assert!(read.deleted);
    }

    #[tokio::test]
    async fn stale_revision_is_a_conflict() {
        let (repo, composer) = setup().await;
        let created = composer.create(input(valid_json()), &staff()).await.unwrap();
        composer
            .patch(
                &created.id,
                serde_json::from_value(json!({"published": false})).unwrap(),
                &staff(),
            )
            .await
            .unwrap();

        // `created` still carries the old revision.
        let err = repo.save(&created).await.unwrap_err();
        assert_matches!(err, RepositoryError::StaleRevision(_));
        assert_matches!(CoreError::from(err), CoreError::Conflict(_));
    }

    #[tokio::test]
    async fn repository_failure_propagates() {
        let (repo, composer) = setup().await;
        repo.fail_writes(true);
        let err = composer.create(input(valid_json()), &staff()).await.unwrap_err();
        assert_matches!(err, CoreError::Repository(_));
    }

    /* ---- patch ---- */

    #[tokio::test]
    async fn patch_merges_translations_per_language() {
        let (_repo, composer) = setup().await;
        let created = composer.create(input(valid_json()), &staff()).await.unwrap();
        let patched = composer
            .patch(
                &created.id,
                serde_json::from_value(json!({"title": {"fi": "Uusi otsikko"}})).unwrap(),
                &staff(),
            )
            .await
            .unwrap();
        assert_eq!(patched.title.get("fi"), "Uusi otsikko");
        assert_eq!(patched.title.get("en"), created.title.get("en"));
        assert_eq!(patched.title.get("sv"), created.title.get("sv"));
        assert_eq!(live_ids(&patched), live_ids(&created));
    }

    #[tokio::test]
    async fn patch_with_sections_always_fails() {
        let (_repo, composer) = setup().await;
        let created = composer.create(input(valid_json()), &staff()).await.unwrap();
        for sections in [json!([]), json!(null), echo(&created)["sections"].clone()] {
            let patch = serde_json::from_value(json!({
                "published": false,
                "sections": sections,
            }))
            .unwrap();
            let err = composer.patch(&created.id, patch, &staff()).await.unwrap_err();
            assert_matches!(err, CoreError::Validation(e) if e.contains("sections", MSG_SECTIONS_IMMUTABLE_VIA_PATCH));
        }
        let read = composer.get(&created.id, None, None).await.unwrap();
        assert!(read.published);
    }

    #[tokio::test]
    async fn patch_clears_nullable_fields() {
        let (_repo, composer) = setup().await;
        let created = composer.create(input(valid_json()), &staff()).await.unwrap();
        let patched = composer
            .patch(
                &created.id,
                serde_json::from_value(json!({"close_at": null, "labels": [{"id": 2}]})).unwrap(),
                &staff(),
            )
            .await
            .unwrap();
        assert_eq!(patched.close_at, None);
        assert_eq!(patched.open_at, created.open_at);
        assert_eq!(patched.labels.len(), 1);
        assert_eq!(patched.labels[0].id, 2);
    }

    #[tokio::test]
    async fn patch_without_organization_is_forbidden() {
        let (_repo, composer) = setup().await;
        let created = composer.create(input(valid_json()), &staff()).await.unwrap();
        let err = composer
            .patch(&created.id, HearingPatch::default(), &no_org())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Forbidden(msg) if msg == "User without organization cannot PATCH hearings.");
    }

    /* ---- copy ---- */

    #[tokio::test]
    async fn copy_without_overrides() {
        let (_repo, composer) = setup().await;
        let source = composer.create(input(valid_json()), &staff()).await.unwrap();
        let copy = composer.copy(&source, HearingOverrides::default()).await.unwrap();

        assert_ne!(copy.id, source.id);
        assert_eq!(copy.slug, format!("{}-2", source.slug));
        assert_eq!(copy.labels, source.labels);
        assert_eq!(copy.open_at, source.open_at);
        assert_eq!(copy.close_at, source.close_at);
        assert_eq!(copy.borough, source.borough);
        assert_eq!(copy.servicemap_url, source.servicemap_url);
        assert_eq!(copy.geojson, source.geojson);
        assert_eq!(copy.n_comments, 0);

        let types: Vec<SectionType> = copy.sections.iter().map(|s| s.section_type).collect();
        assert_eq!(types, vec![SectionType::Main, SectionType::Part]);
        assert!(copy.sections.iter().all(|s| s.n_comments == 0));
        let source_ids: Vec<&str> = source.sections.iter().map(|s| s.id.as_str()).collect();
        assert!(copy.sections.iter().all(|s| !source_ids.contains(&s.id.as_str())));
        assert_eq!(copy.sections[0].images.len(), 2);
        assert_ne!(copy.sections[0].images[0].id, source.sections[0].images[0].id);
        assert_eq!(copy.sections[0].images[0].url, source.sections[0].images[0].url);
    }

    #[tokio::test]
    async fn copy_with_title_override_derives_new_slug() {
        let (_repo, composer) = setup().await;
        let source = composer.create(input(valid_json()), &staff()).await.unwrap();
        let overrides = HearingOverrides {
            title: Some(TranslationSet::single("en", "X")),
            ..Default::default()
        };
        let copy = composer.copy(&source, overrides).await.unwrap();
        assert_eq!(copy.title.get("en"), "X");
        assert_eq!(copy.slug, "x");
    }

    #[tokio::test]
    async fn copy_by_id_checks_organization() {
        let (_repo, composer) = setup().await;
        let source = composer.create(input(valid_json()), &staff()).await.unwrap();
        let err = composer
            .copy_by_id(&source.id, HearingOverrides::default(), &outsider())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Forbidden(_));
    }

    /* ---- reads ---- */

    #[tokio::test]
    async fn get_by_slug() {
        let (_repo, composer) = setup().await;
        let created = composer.create(input(valid_json()), &staff()).await.unwrap();
        let read = composer.get(&created.slug, None, None).await.unwrap();
        assert_eq!(read.id, created.id);
    }

    #[tokio::test]
    async fn unpublished_hearing_needs_preview_code() {
        let (_repo, composer) = setup().await;
        let mut body = valid_json();
        body["published"] = json!(false);
        let created = composer.create(input(body), &staff()).await.unwrap();

        assert_matches!(
            composer.get(&created.id, None, None).await,
            Err(CoreError::NotFound { .. })
        );
        assert!(composer
            .get(&created.id, None, Some(created.preview_code.as_str()))
            .await
            .is_ok());
        assert!(composer.get(&created.id, Some(&staff()), None).await.is_ok());
        assert!(composer
            .list(&HearingQuery::default(), None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn unpublished_sections_hidden_from_public() {
        let (_repo, composer) = setup().await;
        let mut body = valid_json();
        body["sections"][2]["published"] = json!(false);
        let created = composer.create(input(body), &staff()).await.unwrap();

        let public = composer.get(&created.id, None, None).await.unwrap();
        assert_eq!(public.sections.len(), 2);
        let own = composer.get(&created.id, Some(&staff()), None).await.unwrap();
        assert_eq!(own.sections.len(), 3);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_skips_deleted() {
        let (_repo, composer) = setup().await;
        let first = composer.create(input(valid_json()), &staff()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = composer.create(input(valid_json()), &staff()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let third = composer.create(input(valid_json()), &staff()).await.unwrap();
        composer.delete(&second.id, &staff()).await.unwrap();

        let listed = composer.list(&HearingQuery::default(), None).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec![third.id.as_str(), first.id.as_str()]);
    }

    #[tokio::test]
    async fn delete_requires_matching_organization() {
        let (_repo, composer) = setup().await;
        let created = composer.create(input(valid_json()), &staff()).await.unwrap();
        let err = composer.delete(&created.id, &outsider()).await.unwrap_err();
        assert_matches!(err, CoreError::Forbidden(_));
        let err = composer.delete(&created.id, &no_org()).await.unwrap_err();
        assert_matches!(err, CoreError::Forbidden(msg) if msg == "User without organization cannot DELETE hearings.");
    }
}
