//! In-process [`HearingRepository`] used by tests and local tooling.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::hearing::{Hearing, Label};
use crate::repository::{HearingRepository, RepositoryError};
use crate::section::Section;
use crate::translation::TranslationSet;
use crate::types::DbId;
use crate::visibility::Visibility;

#[derive(Default)]
struct Store {
    hearings: HashMap<String, Hearing>,
    labels: BTreeMap<DbId, Label>,
    /// Slugs a concurrent writer will claim on the next conflicting save.
    racing_slugs: HashSet<String>,
    /// Slugs claimed by that simulated writer.
    phantom_slugs: HashSet<String>,
}

/// Mutex-guarded map of aggregates with the same revision and slug rules as
/// the PostgreSQL repository.
#[derive(Default)]
pub struct InMemoryHearingRepository {
    store: Mutex<Store>,
    fail_writes: AtomicBool,
}

impl InMemoryHearingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_label(&self, id: DbId, label: TranslationSet) -> Label {
        let label = Label { id, label };
        self.store.lock().await.labels.insert(id, label.clone());
        label
    }

    /// Make every subsequent `save` fail with a backend error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Pretend another writer grabs `slug` between our lookup and our insert.
    pub async fn simulate_slug_race(&self, slug: impl Into<String>) {
        self.store.lock().await.racing_slugs.insert(slug.into());
    }

    /// Raw stored aggregate, soft-deleted parts included.
    pub async fn stored(&self, id: &str) -> Option<Hearing> {
        self.store.lock().await.hearings.get(id).cloned()
    }
}

fn live_view(hearing: &Hearing) -> Hearing {
    let mut view = hearing.clone();
    view.sections.retain(|s| !s.deleted);
    for section in &mut view.sections {
        section.images.retain(|i| !i.deleted);
    }
    view
}

fn read(hearing: &Hearing, visibility: Visibility) -> Option<Hearing> {
    match visibility {
        Visibility::IncludeDeleted => Some(hearing.clone()),
        Visibility::Live if hearing.deleted => None,
        Visibility::Live => Some(live_view(hearing)),
    }
}

/// Keep previously stored rows the incoming aggregate no longer mentions.
fn carry_over_sections(incoming: &mut Vec<Section>, stored: &[Section]) {
    for old in stored {
        match incoming.iter_mut().find(|s| s.id == old.id) {
            Some(new) => {
                for old_image in &old.images {
                    if !new.images.iter().any(|i| i.id == old_image.id) {
                        let mut kept = old_image.clone();
                        kept.deleted = true;
                        new.images.push(kept);
                    }
                }
            }
            None => {
                let mut kept = old.clone();
                kept.soft_delete();
                incoming.push(kept);
            }
        }
    }
}

#[async_trait]
impl HearingRepository for InMemoryHearingRepository {
    async fn load(
        &self,
        id: &str,
        visibility: Visibility,
    ) -> Result<Option<Hearing>, RepositoryError> {
        let store = self.store.lock().await;
        Ok(store.hearings.get(id).and_then(|h| read(h, visibility)))
    }

    async fn load_by_slug(
        &self,
        slug: &str,
        visibility: Visibility,
    ) -> Result<Option<Hearing>, RepositoryError> {
        let store = self.store.lock().await;
        Ok(store
            .hearings
            .values()
            .find(|h| h.slug == slug)
            .and_then(|h| read(h, visibility)))
    }

    async fn slug_exists(
        &self,
        slug: &str,
        exclude: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let store = self.store.lock().await;
        let taken = store
            .hearings
            .values()
            .any(|h| h.slug == slug && Some(h.id.as_str()) != exclude);
        Ok(taken || store.phantom_slugs.contains(slug))
    }

    async fn labels(&self, ids: &[DbId]) -> Result<Vec<Label>, RepositoryError> {
        let store = self.store.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| store.labels.get(id).cloned())
            .collect())
    }

    async fn save(&self, hearing: &Hearing) -> Result<Hearing, RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("injected write failure").into());
        }

        let mut store = self.store.lock().await;

        if store.racing_slugs.remove(&hearing.slug) {
            store.phantom_slugs.insert(hearing.slug.clone());
            return Err(RepositoryError::SlugTaken(hearing.slug.clone()));
        }
        let slug_clash = store.phantom_slugs.contains(&hearing.slug)
            || store
                .hearings
                .values()
                .any(|h| h.slug == hearing.slug && h.id != hearing.id);
        if slug_clash {
            return Err(RepositoryError::SlugTaken(hearing.slug.clone()));
        }

        let mut saved = hearing.clone();
        match store.hearings.get(&hearing.id) {
            None if hearing.revision == 0 => {}
            None => return Err(RepositoryError::StaleRevision(hearing.id.clone())),
            Some(_) if hearing.revision == 0 => {
                return Err(RepositoryError::IdTaken(hearing.id.clone()))
            }
            Some(existing) if existing.revision != hearing.revision => {
                return Err(RepositoryError::StaleRevision(hearing.id.clone()))
            }
            Some(existing) => carry_over_sections(&mut saved.sections, &existing.sections),
        }

        saved.revision = hearing.revision + 1;
        saved.recount_comments();
        store.hearings.insert(saved.id.clone(), saved.clone());
        Ok(saved)
    }

    async fn list_live(&self) -> Result<Vec<Hearing>, RepositoryError> {
        let store = self.store.lock().await;
        Ok(store
            .hearings
            .values()
            .filter(|h| !h.deleted)
            .map(live_view)
            .collect())
    }
}
