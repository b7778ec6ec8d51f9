//! The engine between the gateway, the cache and whatever renders the
//! checklists.
//!
//! The canonical tree lives in `ViewState` behind a std `Mutex` that is never
//! held across an `.await`. Every mutation builds a new tree and swaps the
//! `Arc`, so a reader holding a snapshot never sees a half-applied change.
//! Each project selection bumps a generation counter; network results that
//! come back under an older generation are discarded.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::aggregate::{OverallStats, SectionSummary, aggregate_by_name, overall_stats};
use super::notice::{Notice, NoticeBoard, NoticeKind};
use super::task_ops::{toggle_completion, toggle_expanded};
use crate::api::{ApiError, ChecklistApi, ErrorKind};
use crate::io::cache::{CacheStatus, ChecklistCache};
use crate::io::session::{Session, load_session, save_session};
use crate::io::snapshot::write_snapshot;
use crate::io::store::KvStore;
use crate::model::{AppConfig, Checklist, EntityId, Photo, Project};
use crate::parse::{ChecklistLinks, normalize_with};
use crate::util::clock::{Clock, iso_timestamp};

/// Error type for engine operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("{0}")]
    Validation(String),
    #[error(
        "Failed to fetch checklists: The requested endpoint was not found (404). This could indicate \
         that the checklists feature is not available in your account or the API structure has changed."
    )]
    NotFound,
    #[error(
        "Authentication error: Your API token may be invalid or you don't have permission to access \
         checklists for this project."
    )]
    Auth,
    #[error("{0}")]
    Api(String),
    #[error("the selected project changed before the request finished")]
    Superseded,
    #[error("No photos found for this project")]
    NoPhotos,
}

impl SyncError {
    fn from_fetch(err: ApiError) -> Self {
        match err.kind() {
            ErrorKind::NotFound => SyncError::NotFound,
            ErrorKind::Auth => SyncError::Auth,
            _ => SyncError::Api(format!("Failed to fetch checklists: {err}")),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Validation(_) => ErrorKind::Validation,
            SyncError::NotFound | SyncError::NoPhotos => ErrorKind::NotFound,
            SyncError::Auth => ErrorKind::Auth,
            SyncError::Api(_) | SyncError::Superseded => ErrorKind::Api,
        }
    }
}

fn mutation_message(err: &ApiError) -> String {
    match err.kind() {
        ErrorKind::NotFound => {
            "Failed to update task: The task endpoint was not found (404). The API structure may have changed."
                .to_string()
        }
        ErrorKind::Auth => {
            "Authentication error: Your API token may be invalid or you don't have permission to update tasks."
                .to_string()
        }
        _ => format!("Failed to update task status: {err}"),
    }
}

/// How a toggle settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The server accepted the change
    Confirmed,
    /// The server rejected it; the tree was reloaded from the server
    Resynced,
    /// The server rejected it and the reload failed too
    ResyncFailed(SyncError),
}

/// Tunables taken from the config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub photo_limit: usize,
    pub mutation_notice: Duration,
    pub info_notice: Duration,
    pub links: ChecklistLinks,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        EngineSettings {
            photo_limit: config.photos.per_task_limit,
            mutation_notice: Duration::from_secs(config.notices.mutation_secs),
            info_notice: Duration::from_secs(config.notices.info_secs),
            links: ChecklistLinks::new(&config.api.web_url),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Debug, Clone)]
struct PendingMutation {
    seq: u64,
    checklist_id: EntityId,
    previous: Option<String>,
}

#[derive(Debug, Default)]
struct ViewState {
    session: Session,
    generation: u64,
    checklists: Arc<Vec<Checklist>>,
    cache_status: CacheStatus,
    last_updated: Option<DateTime<Utc>>,
    error: Option<SyncError>,
    loading: bool,
    pending: HashMap<EntityId, PendingMutation>,
    next_seq: u64,
    notices: NoticeBoard,
    task_photos: HashMap<EntityId, Vec<Photo>>,
    photos_loading: HashSet<EntityId>,
}

impl ViewState {
    fn project_id(&self) -> Result<EntityId, SyncError> {
        self.session
            .project
            .as_ref()
            .filter(|p| !p.id.is_empty())
            .map(|p| p.id.clone())
            .ok_or_else(|| SyncError::Validation("Please select a project first.".into()))
    }

    /// Project id and token for a network call, or why there are none
    fn target(&self) -> Result<(EntityId, String), SyncError> {
        let project_id = self.project_id()?;
        let token = self
            .session
            .token()
            .ok_or_else(|| SyncError::Validation("No API token. Run `punch login <token>` first.".into()))?;
        Ok((project_id, token.to_string()))
    }

    /// Replace the tree, carrying UI expansion over from the one it replaces
    fn install(&mut self, mut checklists: Vec<Checklist>) -> Arc<Vec<Checklist>> {
        for checklist in &mut checklists {
            let Some(old) = self.checklists.iter().find(|c| c.id == checklist.id) else {
                continue;
            };
            checklist.expanded = old.expanded;
            for section in &mut checklist.sections {
                section.expanded = old
                    .sections
                    .iter()
                    .any(|s| s.expanded && s.id.is_some() && s.id == section.id);
            }
        }
        self.checklists = Arc::new(checklists);
        self.checklists.clone()
    }
}

/// Fetch, cache, mutate and aggregate checklists for the selected project
pub struct Reconciler<A> {
    api: A,
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    cache: ChecklistCache,
    settings: EngineSettings,
    state: Mutex<ViewState>,
}

impl<A: ChecklistApi> Reconciler<A> {
    /// Build an engine over `store`, restoring the persisted session.
    pub fn new(api: A, store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: &AppConfig) -> Self {
        let session = load_session(store.as_ref());
        let cache = ChecklistCache::new(store.clone(), clock.clone(), config.cache.ttl());
        Reconciler {
            api,
            store,
            clock,
            cache,
            settings: EngineSettings::from_config(config),
            state: Mutex::new(ViewState {
                session,
                ..ViewState::default()
            }),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    pub fn session(&self) -> Session {
        self.lock().session.clone()
    }

    /// Use `token` for this run without persisting it
    pub fn set_token(&self, token: impl Into<String>) {
        self.lock().session.token = Some(token.into());
    }

    /// Switch projects: drop every piece of view state tied to the old one and
    /// persist the selection. In-flight results for the old project are
    /// discarded when they arrive.
    pub fn select_project(&self, project: Project) {
        {
            let mut state = self.lock();
            let session = std::mem::take(&mut state.session);
            *state = ViewState {
                generation: state.generation + 1,
                next_seq: state.next_seq,
                session: Session {
                    project: Some(project.clone()),
                    ..session
                },
                ..ViewState::default()
            };
            info!(project = %project.id, generation = state.generation, "project selected");
        }
        let mut stored = load_session(self.store.as_ref());
        stored.project = Some(project);
        if let Err(e) = save_session(self.store.as_ref(), &stored) {
            warn!(error = %e, "could not persist project selection");
        }
    }

    // -----------------------------------------------------------------------
    // Refresh
    // -----------------------------------------------------------------------

    /// Load checklists for the selected project.
    ///
    /// Unless `force_fresh`, an unexpired cache entry is used without touching
    /// the network. A failed fetch is recorded as the view error and leaves the
    /// previously loaded checklists in place.
    pub async fn refresh(&self, force_fresh: bool) -> Result<Arc<Vec<Checklist>>, SyncError> {
        let (project_id, token, generation) = {
            let mut state = self.lock();
            match state.target() {
                Ok((project_id, token)) => (project_id, token, state.generation),
                Err(err) => {
                    state.error = Some(err.clone());
                    return Err(err);
                }
            }
        };

        if !force_fresh && let Some(entry) = self.cache.read(&project_id) {
            if entry.is_usable() {
                let checklists = normalize_with(&entry.payload, &project_id, &self.settings.links);
                let mut state = self.lock();
                state.cache_status = CacheStatus::Cached;
                state.last_updated = entry.written_at;
                state.error = None;
                debug!(project = %project_id, count = checklists.len(), "serving checklists from cache");
                return Ok(state.install(checklists));
            }
            self.lock().cache_status = CacheStatus::Expired;
        }

        self.lock().loading = true;
        let result = self.api.fetch_checklists(&project_id, &token).await;
        let fetched = result.map(|payload| {
            self.cache.write(&project_id, &payload);
            normalize_with(&payload, &project_id, &self.settings.links)
        });

        let mut state = self.lock();
        if state.generation != generation {
            debug!(project = %project_id, "discarding checklists for a previous project");
            return Err(SyncError::Superseded);
        }
        state.loading = false;
        match fetched {
            Ok(checklists) => {
                info!(project = %project_id, count = checklists.len(), "checklists fetched");
                state.cache_status = CacheStatus::Fresh;
                state.last_updated = Some(self.clock.now());
                state.error = None;
                Ok(state.install(checklists))
            }
            Err(e) => {
                warn!(project = %project_id, error = %e, "checklist fetch failed");
                let err = SyncError::from_fetch(e);
                state.error = Some(err.clone());
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Optimistically flip a task to `!currently_completed`, then confirm it
    /// with the server. A rejected update posts a notice and reloads the
    /// tree from the server. Only validation problems and a project switch
    /// while the update was in flight are returned as errors.
    ///
    /// A confirmed update drops the project's cache entry, since the cached
    /// payload still holds the old completion state.
    pub async fn toggle_task(
        &self,
        checklist_id: &EntityId,
        task_id: &EntityId,
        currently_completed: bool,
    ) -> Result<ToggleOutcome, SyncError> {
        let stamp = iso_timestamp(self.clock.now());
        let (project_id, token, generation, seq, next, snapshot) = {
            let mut state = self.lock();
            let (project_id, token) = state.target()?;
            let mut tree = (*state.checklists).clone();
            let transition = toggle_completion(&mut tree, checklist_id, task_id, currently_completed, &stamp)
                .map_err(|e| SyncError::Validation(e.to_string()))?;
            let seq = state.next_seq;
            state.next_seq += 1;
            state.pending.insert(
                task_id.clone(),
                PendingMutation {
                    seq,
                    checklist_id: checklist_id.clone(),
                    previous: transition.previous,
                },
            );
            state.checklists = Arc::new(tree);
            (project_id, token, state.generation, seq, transition.next, state.checklists.clone())
        };
        write_snapshot(self.store.as_ref(), &project_id, &snapshot);

        let result = self
            .api
            .update_task_completion(task_id, &token, next.as_deref())
            .await;

        if result.is_ok() {
            self.cache.invalidate(&project_id);
        }

        {
            let mut state = self.lock();
            if state.generation != generation {
                debug!(task = %task_id, project = %project_id, ok = result.is_ok(), "task update settled after a project switch");
                return match result {
                    Ok(()) => Ok(ToggleOutcome::Confirmed),
                    Err(_) => Err(SyncError::Superseded),
                };
            }
            let pending = state.pending.get(task_id).filter(|p| p.seq == seq).cloned();
            if let Some(pending) = pending {
                state.pending.remove(task_id);
                debug!(
                    task = %task_id,
                    checklist = %pending.checklist_id,
                    previous = ?pending.previous,
                    ok = result.is_ok(),
                    "task update settled"
                );
            }
            match &result {
                Ok(()) => {
                    state.last_updated = Some(self.clock.now());
                    return Ok(ToggleOutcome::Confirmed);
                }
                Err(e) => {
                    warn!(task = %task_id, error = %e, "task update failed, resyncing");
                    let lifetime = self.settings.mutation_notice;
                    state
                        .notices
                        .post(NoticeKind::Mutation, mutation_message(e), self.clock.now(), lifetime);
                }
            }
        }

        Ok(match self.refresh(true).await {
            Ok(_) => ToggleOutcome::Resynced,
            Err(err) => ToggleOutcome::ResyncFailed(err),
        })
    }

    pub fn toggle_checklist_expanded(&self, checklist_id: &EntityId) -> bool {
        self.update_tree(|tree| toggle_expanded(tree, checklist_id, None))
    }

    pub fn toggle_section_expanded(&self, checklist_id: &EntityId, section_id: &EntityId) -> bool {
        self.update_tree(|tree| toggle_expanded(tree, checklist_id, Some(section_id)))
    }

    fn update_tree(&self, f: impl FnOnce(&mut Vec<Checklist>) -> bool) -> bool {
        let mut state = self.lock();
        let mut tree = (*state.checklists).clone();
        let changed = f(&mut tree);
        if changed {
            state.checklists = Arc::new(tree);
        }
        changed
    }

    // -----------------------------------------------------------------------
    // Photos
    // -----------------------------------------------------------------------

    /// Load the photo strip for one task. A no-op when it is already loaded
    /// or loading. Failures are logged only.
    pub async fn fetch_task_photos(&self, task_id: &EntityId) {
        let (project_id, token, generation) = {
            let mut state = self.lock();
            if state.task_photos.contains_key(task_id) || state.photos_loading.contains(task_id) {
                return;
            }
            let Ok((project_id, token)) = state.target() else {
                return;
            };
            state.photos_loading.insert(task_id.clone());
            (project_id, token, state.generation)
        };

        let result = self.api.fetch_project_photos(&project_id, &token).await;

        let mut state = self.lock();
        if state.generation != generation {
            return;
        }
        state.photos_loading.remove(task_id);
        match result {
            Ok(mut photos) => {
                photos.truncate(self.settings.photo_limit);
                state.task_photos.insert(task_id.clone(), photos);
            }
            Err(e) => warn!(task = %task_id, error = %e, "could not load task photos"),
        }
    }

    /// Fetch photos for every task that has or needs them, among sectionless
    /// tasks and tasks in expanded sections, concurrently.
    pub async fn prefetch_task_photos(&self) {
        let checklists = self.checklists();
        let ids: Vec<EntityId> = checklists
            .iter()
            .flat_map(|c| {
                c.sectionless_tasks
                    .iter()
                    .chain(c.sections.iter().filter(|s| s.expanded).flat_map(|s| s.tasks.iter()))
            })
            .filter(|t| t.wants_photos())
            .map(|t| t.id.clone())
            .collect();
        debug!(tasks = ids.len(), "prefetching task photos");
        join_all(ids.iter().map(|id| self.fetch_task_photos(id))).await;
    }

    /// Every photo of the selected project
    pub async fn project_photos(&self) -> Result<Vec<Photo>, SyncError> {
        let (project_id, token) = self.lock().target()?;
        match self.api.fetch_project_photos(&project_id, &token).await {
            Ok(photos) if photos.is_empty() => Err(SyncError::NoPhotos),
            Ok(photos) => Ok(photos),
            Err(e) => {
                let err = SyncError::Api(format!("Error loading photos: {e}"));
                let lifetime = self.settings.mutation_notice;
                self.lock()
                    .notices
                    .post(NoticeKind::Error, err.to_string(), self.clock.now(), lifetime);
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Cache
    // -----------------------------------------------------------------------

    /// Drop the selected project's cache entry so the next refresh goes to
    /// the network.
    pub fn clear_cache(&self) -> Result<(), SyncError> {
        let project_id = self.lock().project_id()?;
        self.cache.invalidate(&project_id);
        let mut state = self.lock();
        state.cache_status = CacheStatus::Fresh;
        let lifetime = self.settings.info_notice;
        state.notices.post(
            NoticeKind::Info,
            "Cache cleared successfully. Click refresh to load fresh data.",
            self.clock.now(),
            lifetime,
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn checklists(&self) -> Arc<Vec<Checklist>> {
        self.lock().checklists.clone()
    }

    pub fn cache_status(&self) -> CacheStatus {
        self.lock().cache_status
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.lock().last_updated
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn is_updating(&self, task_id: &EntityId) -> bool {
        self.lock().pending.contains_key(task_id)
    }

    /// Tasks with an unsettled update, sorted
    pub fn updating(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.lock().pending.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn error(&self) -> Option<SyncError> {
        self.lock().error.clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.lock().notices.active(self.clock.now())
    }

    pub fn dismiss_notices(&self) {
        self.lock().notices.clear();
    }

    pub fn task_photos(&self, task_id: &EntityId) -> Option<Vec<Photo>> {
        self.lock().task_photos.get(task_id).cloned()
    }

    pub fn overall_stats(&self) -> OverallStats {
        overall_stats(&self.checklists())
    }

    pub fn summaries(&self) -> Vec<SectionSummary> {
        aggregate_by_name(&self.checklists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Gateway;
    use crate::api::fake::{FakeApi, ScriptedTransport};
    use crate::io::snapshot::read_snapshot;
    use crate::io::store::MemoryStore;
    use crate::util::clock::ManualClock;
    use chrono::TimeZone;
    use serde_json::{Value, json};

    fn payload() -> Value {
        json!({"data": [{
            "id": 1,
            "project_id": "5",
            "name": "Punch List",
            "tasks": [
                {"id": 10, "name": "Paint", "completed_at": null, "photo_required": true},
                {"id": 11, "name": "Clean", "completed_at": "2024-01-01"}
            ],
            "sections": [
                {"id": 100, "name": "Kitchen", "tasks": [{"id": 20, "name": "Tile", "photos": [{"url": "https://img/a.jpg"}]}]}
            ]
        }]})
    }

    struct Harness {
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        engine: Reconciler<FakeApi>,
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn harness_with(session: Session) -> Harness {
        let store = Arc::new(MemoryStore::new());
        save_session(store.as_ref(), &session).unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let engine = Reconciler::new(FakeApi::new(payload()), store.clone(), clock.clone(), &AppConfig::default());
        Harness { store, clock, engine }
    }

    fn harness() -> Harness {
        harness_with(Session::new("tok").with_project(Project::new("5", "Oak Duplex")))
    }

    fn task_done(engine: &Reconciler<FakeApi>, task: &str) -> bool {
        engine.checklists()[0].find_task(&task.into()).unwrap().completed()
    }

    #[tokio::test]
    async fn refresh_requires_a_project() {
        let h = harness_with(Session::new("tok"));
        let err = h.engine.refresh(false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(h.engine.error(), Some(err));
        assert_eq!(h.engine.api().fetch_count(), 0);
    }

    #[tokio::test]
    async fn refresh_requires_a_token() {
        let h = harness_with(Session::default().with_project(Project::new("5", "Oak")));
        assert!(matches!(h.engine.refresh(false).await, Err(SyncError::Validation(_))));
        assert_eq!(h.engine.api().fetch_count(), 0);
    }

    #[tokio::test]
    async fn empty_project_id_is_rejected() {
        let h = harness_with(Session::new("tok").with_project(Project::new("", "Nameless")));
        assert!(matches!(h.engine.refresh(true).await, Err(SyncError::Validation(_))));
        assert_eq!(h.engine.api().fetch_count(), 0);
    }

    #[tokio::test]
    async fn fresh_fetch_writes_through_to_cache() {
        let h = harness();
        let checklists = h.engine.refresh(false).await.unwrap();
        assert_eq!(checklists.len(), 1);
        assert_eq!(checklists[0].completion_percentage, 33);
        assert_eq!(h.engine.cache_status(), CacheStatus::Fresh);
        assert_eq!(h.engine.last_updated(), Some(t0()));
        assert!(!h.engine.is_loading());
        assert!(h.store.keys().contains(&"checklists-5".to_string()));
    }

    #[tokio::test]
    async fn refresh_through_the_todos_fallback() {
        let store = Arc::new(MemoryStore::new());
        save_session(store.as_ref(), &Session::new("tok").with_project(Project::new("5", "Oak Duplex"))).unwrap();
        let transport = ScriptedTransport::new()
            .respond(reqwest::Method::GET, "/checklists", 404, "")
            .respond(reqwest::Method::GET, "/todos", 200, &payload().to_string());
        let engine = Reconciler::new(
            Gateway::new(transport),
            store.clone(),
            Arc::new(ManualClock::new(t0())),
            &AppConfig::default(),
        );

        let checklists = engine.refresh(false).await.unwrap();
        assert_eq!(checklists.len(), 1);
        assert_eq!(checklists[0].name, "Punch List");
        assert_eq!(engine.cache_status(), CacheStatus::Fresh);
        assert_eq!(engine.error(), None);
        assert!(store.keys().contains(&"checklists-5".to_string()));

        let paths: Vec<String> = engine.api().transport().calls().into_iter().map(|c| c.path).collect();
        assert_eq!(paths, vec!["/checklists", "/todos"]);
    }

    #[tokio::test]
    async fn cache_served_within_ttl_then_refetched_after() {
        let h = harness();
        h.engine.refresh(false).await.unwrap();

        h.clock.advance(chrono::Duration::minutes(4));
        h.engine.refresh(false).await.unwrap();
        assert_eq!(h.engine.cache_status(), CacheStatus::Cached);
        assert_eq!(h.engine.api().fetch_count(), 1);
        assert_eq!(h.engine.last_updated(), Some(t0()));

        h.clock.advance(chrono::Duration::minutes(2));
        h.engine.refresh(false).await.unwrap();
        assert_eq!(h.engine.api().fetch_count(), 2);
        assert_eq!(h.engine.cache_status(), CacheStatus::Fresh);
        assert_eq!(h.engine.last_updated(), Some(t0() + chrono::Duration::minutes(6)));
    }

    #[tokio::test]
    async fn expired_entry_that_fails_to_refresh_reports_expired() {
        let h = harness();
        h.engine.refresh(false).await.unwrap();
        h.clock.advance(chrono::Duration::minutes(10));
        h.engine.api().fail_fetch(500, "");
        assert!(h.engine.refresh(false).await.is_err());
        assert_eq!(h.engine.cache_status(), CacheStatus::Expired);
    }

    #[tokio::test]
    async fn forced_refresh_skips_the_cache() {
        let h = harness();
        h.engine.refresh(false).await.unwrap();
        h.engine.refresh(true).await.unwrap();
        assert_eq!(h.engine.api().fetch_count(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_loaded_checklists() {
        let h = harness();
        h.engine.refresh(true).await.unwrap();

        h.engine.api().fail_fetch(500, r#"{"message": "maintenance"}"#);
        let err = h.engine.refresh(true).await.unwrap_err();
        assert_eq!(err, SyncError::Api("Failed to fetch checklists: maintenance".into()));
        assert_eq!(h.engine.checklists().len(), 1);
        assert_eq!(h.engine.error(), Some(err));

        // a later success clears the error
        h.engine.api().set_checklists(payload());
        h.engine.refresh(true).await.unwrap();
        assert_eq!(h.engine.error(), None);
    }

    #[tokio::test]
    async fn fetch_errors_are_classified_by_status() {
        let h = harness();
        h.engine.api().fail_fetch(404, "");
        assert_eq!(h.engine.refresh(true).await.unwrap_err(), SyncError::NotFound);
        h.engine.api().fail_fetch(403, "forbidden");
        assert_eq!(h.engine.refresh(true).await.unwrap_err(), SyncError::Auth);
    }

    #[tokio::test]
    async fn broken_storage_still_fetches() {
        let h = harness();
        h.store.break_storage();
        assert_eq!(h.engine.refresh(false).await.unwrap().len(), 1);
        assert_eq!(h.engine.cache_status(), CacheStatus::Fresh);
    }

    #[tokio::test]
    async fn confirmed_toggle() {
        let h = harness();
        h.engine.refresh(true).await.unwrap();

        let outcome = h.engine.toggle_task(&"1".into(), &"10".into(), false).await.unwrap();
        assert_eq!(outcome, ToggleOutcome::Confirmed);
        assert!(task_done(&h.engine, "10"));
        assert_eq!(h.engine.checklists()[0].completion_percentage, 67);
        assert_eq!(
            h.engine.api().updates(),
            vec![(EntityId::from("10"), Some("2024-05-01T12:00:00.000Z".to_string()))]
        );
        assert!(h.engine.updating().is_empty());

        let snapshot = read_snapshot(h.store.as_ref(), &"5".into()).unwrap();
        assert!(snapshot[0].find_task(&"10".into()).unwrap().completed());
    }

    #[tokio::test]
    async fn confirmed_toggle_is_seen_by_the_next_run() {
        let h = harness();
        h.engine.refresh(false).await.unwrap();
        let outcome = h.engine.toggle_task(&"1".into(), &"10".into(), false).await.unwrap();
        assert_eq!(outcome, ToggleOutcome::Confirmed);
        assert!(!h.store.keys().contains(&"checklists-5".to_string()));

        // the server now reports the task done
        let mut updated = payload();
        updated["data"][0]["tasks"][0]["completed_at"] = json!("2024-05-01T12:00:00.000Z");
        h.clock.advance(chrono::Duration::minutes(1));

        let next = Reconciler::new(
            FakeApi::new(updated),
            h.store.clone(),
            h.clock.clone(),
            &AppConfig::default(),
        );
        next.refresh(false).await.unwrap();
        assert_eq!(next.cache_status(), CacheStatus::Fresh);
        assert_eq!(next.api().fetch_count(), 1);
        assert!(task_done(&next, "10"));
    }

    #[tokio::test]
    async fn rejected_toggle_keeps_the_cache_entry() {
        let h = harness();
        h.engine.refresh(false).await.unwrap();
        h.engine.api().fail_updates(500, "boom");
        h.engine.toggle_task(&"1".into(), &"10".into(), false).await.unwrap();
        assert!(h.store.keys().contains(&"checklists-5".to_string()));
    }

    #[tokio::test]
    async fn rejection_after_a_project_switch_leaves_the_new_project_alone() {
        let h = harness();
        h.engine.refresh(true).await.unwrap();
        h.engine.api().fail_updates(401, "Unauthorized");
        let gate = h.engine.api().gate_updates();

        let (cl, task): (EntityId, EntityId) = ("1".into(), "10".into());
        let (result, ()) = tokio::join!(h.engine.toggle_task(&cl, &task, false), async {
            h.engine.select_project(Project::new("7", "Maple"));
            gate.notify_one();
        });
        assert_eq!(result.unwrap_err(), SyncError::Superseded);
        assert!(h.engine.notices().is_empty());
        assert_eq!(h.engine.api().fetch_count(), 1);
        assert!(h.engine.checklists().is_empty());
        assert_eq!(h.engine.last_updated(), None);
    }

    #[tokio::test]
    async fn confirmation_after_a_project_switch_leaves_the_new_project_alone() {
        let h = harness();
        h.engine.refresh(false).await.unwrap();
        let gate = h.engine.api().gate_updates();

        let (cl, task): (EntityId, EntityId) = ("1".into(), "10".into());
        let (result, ()) = tokio::join!(h.engine.toggle_task(&cl, &task, false), async {
            h.engine.select_project(Project::new("7", "Maple"));
            gate.notify_one();
        });
        assert_eq!(result.unwrap(), ToggleOutcome::Confirmed);
        assert_eq!(h.engine.last_updated(), None);
        assert!(h.engine.updating().is_empty());
        // the old project's cache still reflects the server before the change
        assert!(!h.store.keys().contains(&"checklists-5".to_string()));
    }

    #[tokio::test]
    async fn uncompleting_sends_null() {
        let h = harness();
        h.engine.refresh(true).await.unwrap();
        h.engine.toggle_task(&"1".into(), &"11".into(), true).await.unwrap();
        assert_eq!(h.engine.api().updates(), vec![(EntityId::from("11"), None)]);
        assert!(!task_done(&h.engine, "11"));
    }

    #[tokio::test]
    async fn rejected_toggle_rolls_back_by_resync() {
        let h = harness();
        h.engine.refresh(true).await.unwrap();
        h.engine.api().fail_updates(401, "Unauthorized");

        let outcome = h.engine.toggle_task(&"1".into(), &"10".into(), false).await.unwrap();
        assert_eq!(outcome, ToggleOutcome::Resynced);
        assert!(!task_done(&h.engine, "10"));
        assert_eq!(h.engine.checklists()[0].completion_percentage, 33);
        assert_eq!(h.engine.api().fetch_count(), 2);
        assert!(h.engine.updating().is_empty());

        let notices = h.engine.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::Mutation);
        assert!(notices[0].message.starts_with("Authentication error"));

        h.clock.advance(chrono::Duration::seconds(5));
        assert!(h.engine.notices().is_empty());
    }

    #[tokio::test]
    async fn rejected_toggle_with_failed_resync_keeps_optimistic_tree() {
        let h = harness();
        h.engine.refresh(true).await.unwrap();
        h.engine.api().fail_updates(500, "boom");
        h.engine.api().fail_fetch(500, "still down");

        let outcome = h.engine.toggle_task(&"1".into(), &"10".into(), false).await.unwrap();
        assert_eq!(
            outcome,
            ToggleOutcome::ResyncFailed(SyncError::Api("Failed to fetch checklists: still down".into()))
        );
        assert!(task_done(&h.engine, "10"));
        assert!(h.engine.error().is_some());
        assert_eq!(h.engine.notices()[0].message, "Failed to update task status: boom");
        h.engine.dismiss_notices();
        assert!(h.engine.notices().is_empty());
    }

    #[tokio::test]
    async fn toggle_of_unknown_task_never_hits_the_network() {
        let h = harness();
        h.engine.refresh(true).await.unwrap();
        let err = h.engine.toggle_task(&"1".into(), &"999".into(), false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(h.engine.api().updates().is_empty());
    }

    #[tokio::test]
    async fn task_is_updating_until_the_server_answers() {
        let h = harness();
        h.engine.refresh(true).await.unwrap();
        let gate = h.engine.api().gate_updates();

        let (cl, task): (EntityId, EntityId) = ("1".into(), "10".into());
        let (outcome, ()) = tokio::join!(h.engine.toggle_task(&cl, &task, false), async {
            assert_eq!(h.engine.updating(), vec![EntityId::from("10")]);
            assert!(h.engine.is_updating(&"10".into()));
            // optimistic state is visible before confirmation
            assert!(task_done(&h.engine, "10"));
            gate.notify_one();
        });
        assert_eq!(outcome.unwrap(), ToggleOutcome::Confirmed);
        assert!(!h.engine.is_updating(&"10".into()));
    }

    #[tokio::test]
    async fn concurrent_toggles_on_different_tasks() {
        let h = harness();
        h.engine.refresh(true).await.unwrap();
        let (cl, t10, t20): (EntityId, EntityId, EntityId) = ("1".into(), "10".into(), "20".into());
        let (a, b) = tokio::join!(
            h.engine.toggle_task(&cl, &t10, false),
            h.engine.toggle_task(&cl, &t20, false),
        );
        assert_eq!(a.unwrap(), ToggleOutcome::Confirmed);
        assert_eq!(b.unwrap(), ToggleOutcome::Confirmed);
        assert!(task_done(&h.engine, "10"));
        assert!(task_done(&h.engine, "20"));
        assert_eq!(h.engine.checklists()[0].completion_percentage, 100);
    }

    #[tokio::test]
    async fn fetch_for_previous_project_is_discarded() {
        let h = harness();
        let gate = h.engine.api().gate_fetches();

        let (result, ()) = tokio::join!(h.engine.refresh(true), async {
            h.engine.select_project(Project::new("7", "Maple"));
            gate.notify_one();
        });
        assert_eq!(result.unwrap_err(), SyncError::Superseded);
        assert!(h.engine.checklists().is_empty());
        assert_eq!(h.engine.session().project.unwrap().id, EntityId::from("7"));
        assert_eq!(load_session(h.store.as_ref()).project.unwrap().id, EntityId::from("7"));
    }

    #[tokio::test]
    async fn selecting_a_project_resets_view_state() {
        let h = harness();
        h.engine.refresh(true).await.unwrap();
        h.engine.api().fail_fetch(500, "");
        let _ = h.engine.refresh(true).await;

        h.engine.select_project(Project::new("7", "Maple"));
        assert!(h.engine.checklists().is_empty());
        assert!(h.engine.error().is_none());
        assert_eq!(h.engine.last_updated(), None);
        assert_eq!(h.engine.session().token(), Some("tok"));
    }

    #[tokio::test]
    async fn expansion_survives_a_refresh() {
        let h = harness();
        h.engine.refresh(true).await.unwrap();
        assert!(h.engine.toggle_checklist_expanded(&"1".into()));
        assert!(h.engine.toggle_section_expanded(&"1".into(), &"100".into()));
        h.engine.refresh(true).await.unwrap();
        let checklists = h.engine.checklists();
        assert!(checklists[0].expanded);
        assert!(checklists[0].sections[0].expanded);
    }

    #[tokio::test]
    async fn task_photos_are_capped_and_fetched_once() {
        let h = harness();
        h.engine.refresh(true).await.unwrap();
        let photos: Vec<Photo> = (0..15).map(|i| Photo::from_url(format!("https://img/{i}.jpg"))).collect();
        h.engine.api().set_photos(photos);

        h.engine.fetch_task_photos(&"10".into()).await;
        h.engine.fetch_task_photos(&"10".into()).await;
        assert_eq!(h.engine.api().photo_fetch_count(), 1);
        assert_eq!(h.engine.task_photos(&"10".into()).unwrap().len(), 10);
    }

    #[tokio::test]
    async fn failed_task_photos_are_logged_only() {
        let h = harness();
        h.engine.refresh(true).await.unwrap();
        h.engine.api().fail_photos(500);
        h.engine.fetch_task_photos(&"10".into()).await;
        assert!(h.engine.task_photos(&"10".into()).is_none());
        assert!(h.engine.notices().is_empty());
        assert!(h.engine.error().is_none());
    }

    #[tokio::test]
    async fn prefetch_covers_sectionless_and_expanded_sections() {
        let h = harness();
        h.engine.refresh(true).await.unwrap();
        h.engine.api().set_photos(vec![Photo::from_url("https://img/1.jpg")]);

        // task 10 requires photos; task 20 sits in a collapsed section
        h.engine.prefetch_task_photos().await;
        assert!(h.engine.task_photos(&"10".into()).is_some());
        assert!(h.engine.task_photos(&"11".into()).is_none());
        assert!(h.engine.task_photos(&"20".into()).is_none());

        h.engine.toggle_section_expanded(&"1".into(), &"100".into());
        h.engine.prefetch_task_photos().await;
        assert!(h.engine.task_photos(&"20".into()).is_some());
        assert_eq!(h.engine.api().photo_fetch_count(), 2);
    }

    #[tokio::test]
    async fn project_photos_empty_is_an_error() {
        let h = harness();
        assert_eq!(h.engine.project_photos().await.unwrap_err(), SyncError::NoPhotos);
        h.engine.api().set_photos(vec![Photo::from_url("https://img/1.jpg")]);
        assert_eq!(h.engine.project_photos().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_cache_forces_network_next_time() {
        let h = harness();
        h.engine.refresh(false).await.unwrap();
        h.engine.clear_cache().unwrap();
        assert_eq!(h.engine.cache_status(), CacheStatus::Fresh);
        assert_eq!(h.engine.notices()[0].kind, NoticeKind::Info);

        h.engine.refresh(false).await.unwrap();
        assert_eq!(h.engine.api().fetch_count(), 2);

        h.clock.advance(chrono::Duration::seconds(3));
        assert!(h.engine.notices().is_empty());
    }

    #[test]
    fn clearing_the_cache_needs_a_project_but_no_token() {
        let h = harness_with(Session::default().with_project(Project::new("5", "Oak")));
        h.engine.clear_cache().unwrap();

        let h = harness_with(Session::new("tok"));
        assert!(matches!(h.engine.clear_cache(), Err(SyncError::Validation(_))));
        assert!(h.engine.notices().is_empty());
    }

    #[tokio::test]
    async fn aggregates_follow_the_tree() {
        let h = harness();
        h.engine.refresh(true).await.unwrap();
        let stats = h.engine.overall_stats();
        assert_eq!((stats.completed_tasks, stats.total_tasks), (1, 3));
        let names: Vec<String> = h.engine.summaries().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Kitchen", "General Items"]);
    }
}
