use std::{
    collections::HashMap,
    sync::Arc,
    time::Instant,
};

use futures::future::join_all;
use shared::domain::{PageSize, RecordId, Resource};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};

use crate::{
    api::{MutationBody, ResourceApi},
    cache::{PageResult, QueryCache},
    clock::{Clock, Debounced, SystemClock},
    config::ControllerConfig,
    error::{FetchError, MutationError},
    key::{CachePrefix, FetchKey, FetchMode, FetchRequest},
    query::QueryState,
};

pub const LOAD_FAILED_NOTICE: &str = "could not load data, please retry";

/// What a table should render for the active key.
#[derive(Debug)]
pub enum ListView<T> {
    Loading,
    Ready(Arc<PageResult<T>>),
    /// The last authoritative fetch failed; render the empty state.
    Failed(FetchError),
}

impl<T> Clone for ListView<T> {
    fn clone(&self) -> Self {
        match self {
            ListView::Loading => ListView::Loading,
            ListView::Ready(result) => ListView::Ready(Arc::clone(result)),
            ListView::Failed(error) => ListView::Failed(error.clone()),
        }
    }
}

impl<T> ListView<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, ListView::Loading)
    }

    pub fn result(&self) -> Option<&Arc<PageResult<T>>> {
        match self {
            ListView::Ready(result) => Some(result),
            _ => None,
        }
    }

    pub fn items(&self) -> &[T] {
        self.result()
            .map(|result| result.items.as_slice())
            .unwrap_or_default()
    }

    pub fn total_pages(&self) -> u32 {
        self.result().map_or(0, |result| result.total_pages)
    }

    pub fn total_count(&self) -> u64 {
        self.result().map_or(0, |result| result.total_count)
    }
}

#[derive(Debug, Clone)]
pub enum ListEvent {
    /// User-facing notice; emitted once per failure streak.
    LoadFailed { resource: Resource, message: String },
    /// The active key's page arrived. Background pages are cached silently.
    Loaded { key: FetchKey },
    Invalidated { resource: Resource, entries: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Purpose {
    Visible,
    Prefetch,
}

struct InFlight {
    token: u64,
    epoch: u64,
    purpose: Purpose,
}

struct ControllerState {
    query: QueryState,
    keyword: Debounced<String>,
    next_token: u64,
    in_flight: HashMap<FetchKey, InFlight>,
    failed: HashMap<FetchKey, FetchError>,
    total_pages: HashMap<FetchMode, u32>,
    failure_streak: bool,
}

impl ControllerState {
    fn settle_keyword(&mut self, now: Instant) {
        if self.keyword.settle(now) {
            self.query.reset_page();
        }
    }

    fn active_key(&self, resource: Resource) -> FetchKey {
        FetchKey::derive(resource, &self.query, self.keyword.settled())
    }

    fn issue(&mut self, key: FetchKey, purpose: Purpose, epoch: u64) -> u64 {
        self.next_token += 1;
        let token = self.next_token;
        self.in_flight.insert(
            key,
            InFlight {
                token,
                epoch,
                purpose,
            },
        );
        token
    }

    /// A new user action lifts the no-retry hold on failed keys.
    fn note_user_action(&mut self) {
        self.failed.clear();
    }
}

/// The active key or one of the pages read ahead of it.
fn is_wanted(key: &FetchKey, active: &FetchKey, prefetch_depth: u32) -> bool {
    if key == active {
        return true;
    }
    key.page > active.page
        && key.page - active.page <= prefetch_depth
        && key.with_page(active.page) == *active
}

/// Paginated, sortable, searchable view over one backend resource.
///
/// Reads go through the shared `QueryCache`; at most one request per key is
/// in flight, and a response is applied only while its token is current, the
/// resource has not been invalidated since it was issued, and its key is still
/// wanted.
pub struct ListQueryController<T> {
    api: Arc<dyn ResourceApi<T>>,
    cache: Arc<dyn QueryCache<T>>,
    clock: Arc<dyn Clock>,
    config: ControllerConfig,
    inner: Mutex<ControllerState>,
    revision: watch::Sender<u64>,
    events: broadcast::Sender<ListEvent>,
}

impl<T: Send + Sync + 'static> ListQueryController<T> {
    pub fn new(
        api: Arc<dyn ResourceApi<T>>,
        cache: Arc<dyn QueryCache<T>>,
        clock: Arc<dyn Clock>,
        config: ControllerConfig,
        sort_field: impl Into<String>,
    ) -> Arc<Self> {
        let (revision, _) = watch::channel(0);
        let (events, _) = broadcast::channel(256);
        let state = ControllerState {
            query: QueryState::new(sort_field, config.default_page_size),
            keyword: Debounced::new(String::new(), config.quiet_period),
            next_token: 0,
            in_flight: HashMap::new(),
            failed: HashMap::new(),
            total_pages: HashMap::new(),
            failure_streak: false,
        };
        Arc::new(Self {
            api,
            cache,
            clock,
            config,
            inner: Mutex::new(state),
            revision,
            events,
        })
    }

    pub fn with_defaults(
        api: Arc<dyn ResourceApi<T>>,
        cache: Arc<dyn QueryCache<T>>,
        sort_field: impl Into<String>,
    ) -> Arc<Self> {
        Self::new(
            api,
            cache,
            Arc::new(SystemClock),
            ControllerConfig::default(),
            sort_field,
        )
    }

    pub fn resource(&self) -> Resource {
        self.api.resource()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ListEvent> {
        self.events.subscribe()
    }

    pub async fn query_state(&self) -> QueryState {
        self.inner.lock().await.query.clone()
    }

    pub async fn active_key(&self) -> FetchKey {
        let mut guard = self.inner.lock().await;
        guard.settle_keyword(self.clock.now());
        guard.active_key(self.resource())
    }

    pub async fn mode(&self) -> FetchMode {
        self.active_key().await.mode
    }

    pub async fn set_sort(&self, field: &str) {
        let mut guard = self.inner.lock().await;
        guard.query.set_sort(field);
        guard.note_user_action();
        debug!(
            resource = %self.resource(),
            sort_field = field,
            ascending = guard.query.ascending(),
            "list: sort changed"
        );
    }

    /// Navigates within `1..=total_pages` of the active mode's last result.
    /// Out-of-range pages are ignored.
    pub async fn set_page(&self, page: u32) -> bool {
        let mut guard = self.inner.lock().await;
        guard.settle_keyword(self.clock.now());
        let mode = FetchMode::for_keyword(guard.keyword.settled());
        let total_pages = guard.total_pages.get(&mode).copied().unwrap_or_default();
        if !guard.query.try_set_page(page, total_pages) {
            debug!(
                resource = %self.resource(),
                page,
                total_pages,
                "list: ignoring out-of-range page"
            );
            return false;
        }
        guard.note_user_action();
        true
    }

    pub async fn set_page_size(&self, size: PageSize) {
        let mut guard = self.inner.lock().await;
        if guard.query.set_page_size(size) {
            guard.note_user_action();
        }
    }

    /// Stores the keyword at once; the fetch key follows it only after the
    /// quiet period.
    pub async fn set_keyword(&self, text: &str) {
        let now = self.clock.now();
        let mut guard = self.inner.lock().await;
        if guard.query.set_keyword(text) {
            guard.keyword.input(text.to_string(), now);
            guard.note_user_action();
        }
    }

    /// Suspends until typed input has been quiet for the configured period.
    pub async fn wait_for_quiet(&self) {
        loop {
            let remaining = self.inner.lock().await.keyword.remaining(self.clock.now());
            match remaining {
                Some(left) if !left.is_zero() => self.clock.sleep(left).await,
                _ => return,
            }
        }
    }

    /// Marks every cached page of this resource stale, in both families.
    pub async fn refresh(&self) -> usize {
        let resource = self.resource();
        let entries = self.cache.invalidate(&CachePrefix::resource(resource));
        {
            let mut guard = self.inner.lock().await;
            guard.in_flight.clear();
            guard.note_user_action();
        }
        info!(resource = %resource, entries, "list: cache invalidated");
        let _ = self
            .events
            .send(ListEvent::Invalidated { resource, entries });
        self.bump_revision();
        entries
    }

    /// Returns the active key's page, or `Loading` after making sure exactly
    /// one request for it is in flight.
    pub async fn current_result(self: &Arc<Self>) -> ListView<T> {
        let resource = self.resource();
        let (key, token) = {
            let mut guard = self.inner.lock().await;
            guard.settle_keyword(self.clock.now());
            let key = guard.active_key(resource);

            if let Some(result) = self.cache.get(&key).and_then(|entry| entry.fresh()) {
                guard.total_pages.insert(key.mode, result.total_pages);
                guard.failure_streak = false;
                return ListView::Ready(result);
            }
            if let Some(error) = guard.failed.get(&key) {
                return ListView::Failed(error.clone());
            }
            if let Some(in_flight) = guard.in_flight.get_mut(&key) {
                in_flight.purpose = Purpose::Visible;
                return ListView::Loading;
            }

            let epoch = self.cache.epoch(resource);
            let token = guard.issue(key.clone(), Purpose::Visible, epoch);
            (key, token)
        };

        debug!(key = %key, "list: fetching");
        self.spawn_fetch(key, token);
        ListView::Loading
    }

    /// Waits until the active key has settled into a result or a failure.
    pub async fn load(self: &Arc<Self>) -> ListView<T> {
        let mut revisions = self.revision.subscribe();
        loop {
            let _ = revisions.borrow_and_update();
            let view = self.current_result().await;
            if !view.is_loading() || revisions.changed().await.is_err() {
                return view;
            }
        }
    }

    pub async fn fetch_record(&self, id: &RecordId) -> Result<T, FetchError> {
        self.api.get(id).await
    }

    pub async fn create(&self, body: MutationBody) -> Result<T, MutationError> {
        let record = self.api.create(body).await.map_err(|err| {
            warn!(resource = %self.resource(), "list: create rejected: {err}");
            err
        })?;
        self.refresh().await;
        Ok(record)
    }

    pub async fn update(&self, id: &RecordId, body: MutationBody) -> Result<T, MutationError> {
        let record = self.api.update(id, body).await.map_err(|err| {
            warn!(resource = %self.resource(), id = %id, "list: update rejected: {err}");
            err
        })?;
        self.refresh().await;
        Ok(record)
    }

    pub async fn delete(&self, id: &RecordId) -> Result<(), MutationError> {
        self.api.delete(id).await.map_err(|err| {
            warn!(resource = %self.resource(), id = %id, "list: delete rejected: {err}");
            err
        })?;
        self.refresh().await;
        Ok(())
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    fn spawn_fetch(self: &Arc<Self>, key: FetchKey, token: u64) {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = controller.fetch_with_retry(&key).await;
            controller.complete(key, token, outcome).await;
        });
    }

    fn spawn_prefetch(self: &Arc<Self>, batch: Vec<(FetchKey, u64)>) {
        if batch.is_empty() {
            return;
        }
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let fetches = batch.into_iter().map(|(key, token)| {
                let controller = Arc::clone(&controller);
                async move {
                    let outcome = controller.fetch_with_retry(&key).await;
                    controller.complete(key, token, outcome).await;
                }
            });
            join_all(fetches).await;
        });
    }

    async fn fetch_with_retry(&self, key: &FetchKey) -> Result<PageResult<T>, FetchError> {
        match self.fetch_once(key).await {
            Err(err) if self.config.retry_transient && err.is_transient() => {
                debug!(key = %key, "list: retrying after transient failure: {err}");
                self.fetch_once(key).await
            }
            outcome => outcome,
        }
    }

    async fn fetch_once(&self, key: &FetchKey) -> Result<PageResult<T>, FetchError> {
        let envelope = match key.request() {
            FetchRequest::List(params) => self.api.list(&params).await?,
            FetchRequest::Search(params) => self.api.search(&params).await?,
        };
        Ok(envelope.into())
    }

    async fn complete(
        self: &Arc<Self>,
        key: FetchKey,
        token: u64,
        outcome: Result<PageResult<T>, FetchError>,
    ) {
        let resource = self.resource();
        let loaded = {
            let mut guard = self.inner.lock().await;
            match guard.in_flight.get(&key) {
                Some(in_flight) if in_flight.token == token => {}
                _ => {
                    debug!(key = %key, "list: discarding superseded response");
                    return;
                }
            }
            let Some(in_flight) = guard.in_flight.remove(&key) else {
                return;
            };

            let active = guard.active_key(resource);
            if !is_wanted(&key, &active, self.config.prefetch_depth) {
                debug!(key = %key, "list: discarding response for a key no longer shown");
                drop(guard);
                self.bump_revision();
                return;
            }
            if in_flight.epoch != self.cache.epoch(resource) {
                debug!(key = %key, "list: discarding response issued before invalidation");
                drop(guard);
                self.bump_revision();
                return;
            }

            let authoritative = in_flight.purpose == Purpose::Visible && key == active;
            match outcome {
                Ok(result) => {
                    let result = Arc::new(result);
                    if !self
                        .cache
                        .set_if_epoch(key.clone(), Arc::clone(&result), in_flight.epoch)
                    {
                        debug!(key = %key, "list: discarding response issued before invalidation");
                        drop(guard);
                        self.bump_revision();
                        return;
                    }
                    guard.failed.remove(&key);
                    if authoritative {
                        guard.total_pages.insert(key.mode, result.total_pages);
                        guard.failure_streak = false;
                        let epoch = in_flight.epoch;
                        let last = key
                            .page
                            .saturating_add(self.config.prefetch_depth)
                            .min(result.total_pages);
                        let mut batch = Vec::new();
                        for page in key.page.saturating_add(1)..=last {
                            let neighbor = key.with_page(page);
                            let cached = self
                                .cache
                                .get(&neighbor)
                                .and_then(|entry| entry.fresh())
                                .is_some();
                            if cached || guard.in_flight.contains_key(&neighbor) {
                                continue;
                            }
                            let token = guard.issue(neighbor.clone(), Purpose::Prefetch, epoch);
                            batch.push((neighbor, token));
                        }
                        Some(batch)
                    } else {
                        None
                    }
                }
                Err(error) if authoritative => {
                    warn!(key = %key, "list: load failed: {error}");
                    guard.failed.insert(key.clone(), error);
                    if !guard.failure_streak {
                        guard.failure_streak = true;
                        let _ = self.events.send(ListEvent::LoadFailed {
                            resource,
                            message: LOAD_FAILED_NOTICE.to_string(),
                        });
                    }
                    None
                }
                Err(error) => {
                    debug!(key = %key, "list: prefetch failed: {error}");
                    None
                }
            }
        };

        self.bump_revision();
        if let Some(prefetch) = loaded {
            let _ = self.events.send(ListEvent::Loaded { key });
            self.spawn_prefetch(prefetch);
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
