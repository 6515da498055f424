//! Handlers for the `/hearings` resource.
//!
//! Reads are open to anonymous callers, subject to visibility rules. Writes
//! require a bearer token.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use hearing_core::error::CoreError;
use hearing_core::hearing::{HearingInput, HearingOverrides, HearingPatch, HearingQuery};
use hearing_core::section::Commenting;
use hearing_core::translation::{SupportedLanguages, TranslationField, TranslationSet};
use hearing_core::types::Timestamp;
use hearing_core::validation::ValidationErrors;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AuthUser, MaybeAuthUser};
use crate::middleware::json::{decode, AppJson};
use crate::response::DataResponse;
use crate::state::AppState;
use crate::views::{HearingView, SectionView};

/// Query parameters accepted by the detail endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PreviewParams {
    pub preview: Option<String>,
}

/// Body of a copy request. Every key is optional and replaces the copied
/// value.
#[derive(Debug, Default, Deserialize)]
pub struct CopyRequest {
    pub title: Option<TranslationField>,
    #[serde(rename = "abstract")]
    pub abstract_: Option<TranslationField>,
    pub borough: Option<TranslationField>,
    pub published: Option<bool>,
    pub open_at: Option<Timestamp>,
    pub close_at: Option<Timestamp>,
    pub force_closed: Option<bool>,
    pub commenting: Option<Commenting>,
    pub servicemap_url: Option<String>,
}

impl CopyRequest {
    /// Validate translated overrides against `languages`.
    pub fn into_overrides(
        self,
        languages: &SupportedLanguages,
    ) -> Result<HearingOverrides, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut translated = |field: Option<TranslationField>, key: &str| -> Option<TranslationSet> {
            match field?.into_set(languages) {
                Ok(set) => Some(set),
                Err(err) => {
                    errors.extend(key, err.messages());
                    None
                }
            }
        };

        let title = translated(self.title, "title");
        let abstract_ = translated(self.abstract_, "abstract");
        let borough = translated(self.borough, "borough");
        errors.into_result()?;

        Ok(HearingOverrides {
            title,
            abstract_,
            borough,
            published: self.published,
            open_at: self.open_at.map(Some),
            close_at: self.close_at.map(Some),
            force_closed: self.force_closed,
            commenting: self.commenting,
            servicemap_url: self.servicemap_url,
            ..Default::default()
        })
    }
}

/// GET /api/v1/hearings
pub async fn list(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    Query(query): Query<HearingQuery>,
) -> AppResult<Json<DataResponse<Vec<HearingView>>>> {
    let actor = auth.actor();
    let hearings = state.composer.list(&query, actor.as_ref()).await?;

    let now = Utc::now();
    let data = hearings
        .into_iter()
        .map(|h| HearingView::new(h, actor.as_ref(), now))
        .collect();
    Ok(Json(DataResponse { data }))
}

/// POST /api/v1/hearings
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(input): AppJson<HearingInput>,
) -> AppResult<(StatusCode, Json<DataResponse<HearingView>>)> {
    let actor = auth.actor();
    let hearing = state.composer.create(input, &actor).await?;
    let data = HearingView::new(hearing, Some(&actor), Utc::now());
    Ok((StatusCode::CREATED, Json(DataResponse { data })))
}

/// GET /api/v1/hearings/{id_or_slug}
pub async fn get_by_id(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    Path(id_or_slug): Path<String>,
    Query(params): Query<PreviewParams>,
) -> AppResult<Json<DataResponse<HearingView>>> {
    let actor = auth.actor();
    let hearing = state
        .composer
        .get(&id_or_slug, actor.as_ref(), params.preview.as_deref())
        .await?;
    let data = HearingView::new(hearing, actor.as_ref(), Utc::now());
    Ok(Json(DataResponse { data }))
}

/// PUT /api/v1/hearings/{id}
///
/// Replaces the hearing and its section list. Sections missing from the
/// payload are soft-deleted.
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    AppJson(input): AppJson<HearingInput>,
) -> AppResult<Json<DataResponse<HearingView>>> {
    let actor = auth.actor();
    let hearing = state.composer.update(&id, input, &actor).await?;
    let data = HearingView::new(hearing, Some(&actor), Utc::now());
    Ok(Json(DataResponse { data }))
}

/// PATCH /api/v1/hearings/{id}
///
/// A body carrying a `sections` key is refused whatever else it holds, so
/// it is not decoded any further.
pub async fn patch(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    AppJson(body): AppJson<Value>,
) -> AppResult<Json<DataResponse<HearingView>>> {
    let actor = auth.actor();
    let patch = if body.get("sections").is_some() {
        HearingPatch {
            sections_present: true,
            ..Default::default()
        }
    } else {
        decode::<HearingPatch>(body).map_err(CoreError::from)?
    };
    let hearing = state.composer.patch(&id, patch, &actor).await?;
    let data = HearingView::new(hearing, Some(&actor), Utc::now());
    Ok(Json(DataResponse { data }))
}

/// DELETE /api/v1/hearings/{id}
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.composer.delete(&id, &auth.actor()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/hearings/{id}/copy
///
/// An empty object copies every source value unchanged.
pub async fn copy(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    AppJson(request): AppJson<CopyRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<HearingView>>)> {
    let actor = auth.actor();
    let overrides = request
        .into_overrides(state.composer.languages())
        .map_err(CoreError::from)?;

    let hearing = state.composer.copy_by_id(&id, overrides, &actor).await?;
    let data = HearingView::new(hearing, Some(&actor), Utc::now());
    Ok((StatusCode::CREATED, Json(DataResponse { data })))
}

/// GET /api/v1/hearings/{id_or_slug}/sections
pub async fn list_sections(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    Path(id_or_slug): Path<String>,
    Query(params): Query<PreviewParams>,
) -> AppResult<Json<DataResponse<Vec<SectionView>>>> {
    let actor = auth.actor();
    let hearing = state
        .composer
        .get(&id_or_slug, actor.as_ref(), params.preview.as_deref())
        .await?;

    let data = hearing.sections.into_iter().map(SectionView::from).collect();
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/hearings/{id_or_slug}/sections/{section_id}
pub async fn get_section(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    Path((id_or_slug, section_id)): Path<(String, String)>,
    Query(params): Query<PreviewParams>,
) -> AppResult<Json<DataResponse<SectionView>>> {
    let actor = auth.actor();
    let hearing = state
        .composer
        .get(&id_or_slug, actor.as_ref(), params.preview.as_deref())
        .await?;

    let section = hearing
        .sections
        .into_iter()
        .find(|s| s.id == section_id)
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Section",
            id: section_id,
        }))?;
    Ok(Json(DataResponse {
        data: SectionView::from(section),
    }))
}
