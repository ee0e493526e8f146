// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Asset manager: request intake, per-asset state machine and job dispatch
//!
//! Every thread may call [`AssetManager::load`], [`unload`](AssetManager::unload)
//! and [`reload`](AssetManager::reload); none of them block. Work happens when
//! role threads pump [`AssetManager::process_custom_thread`] and the control
//! thread pumps [`AssetManager::process_control_thread`]. Only the control
//! thread publishes payloads, edits dependency edges and removes records.
//!
//! Lock order: asset table, scheme registry, dispatcher overflow, queue.

use ahash::AHashMap;
use crossbeam::utils::CachePadded;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;
use slotmap::SlotMap;
use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::config::AssetManagerConfig;
use crate::error::{AssetError, Result};
use crate::handle::AssetHandle;
use crate::id::{AssetId, RoleId};
use crate::job::{Dispatcher, Finalized, Job, JobKey, Notification};
use crate::provider::{ByteProvider, RawAsset};
use crate::scheme::{Dependencies, Payload, SchemeDescriptor, SchemeRegistry};
use crate::state::AssetState;

/// Ids handed out by [`AssetManager::generate_unique_id`]
const UNIQUE_ID_FIRST: u32 = 1 << 28;
const UNIQUE_ID_LAST: u32 = 1 << 30;

/// One tracked asset
struct AssetRecord {
    scheme: Option<u32>,
    state: AssetState,
    references: u32,
    dependencies: Dependencies,
    payload: Option<Payload>,
    generation: u32,
    pending: Option<JobKey>,
    error: Option<AssetError>,
    fabricated: bool,
    custom: Option<Arc<CustomSource>>,
    label: Option<String>,
}

/// Loader and bytes of an asset that bypasses the provider
struct CustomSource {
    descriptor: Arc<SchemeDescriptor>,
    worker: Option<RoleId>,
    raw: RawAsset,
}

impl AssetRecord {
    fn requested() -> Self {
        Self {
            scheme: None,
            state: AssetState::Requested,
            references: 1,
            dependencies: Dependencies::new(),
            payload: None,
            generation: 0,
            pending: None,
            error: None,
            fabricated: false,
            custom: None,
            label: None,
        }
    }
}

/// Authoritative id -> record map plus the outstanding job tickets
#[derive(Default)]
struct AssetTable {
    records: AHashMap<AssetId, AssetRecord>,
    jobs: SlotMap<JobKey, AssetId>,
}

struct ManagerInner {
    config: AssetManagerConfig,
    schemes: RwLock<SchemeRegistry>,
    provider: Arc<dyn ByteProvider>,
    table: RwLock<AssetTable>,
    roles: Vec<CachePadded<Dispatcher<Job>>>,
    control: Dispatcher<Notification>,
    next_unique_id: Mutex<u32>,
}

/// Concurrent, reference-counted asset manager.
///
/// Cloning is cheap and every clone drives the same set of assets, so a
/// clone can be moved into each worker thread.
#[derive(Clone)]
pub struct AssetManager {
    inner: Arc<ManagerInner>,
}

impl AssetManager {
    /// Create a manager with a validated configuration
    pub fn new(config: AssetManagerConfig, provider: Arc<dyn ByteProvider>) -> Result<Self> {
        config.validate()?;
        let roles = config
            .role_ids()
            .map(|_| CachePadded::new(Dispatcher::new(config.queue_capacity)))
            .collect();
        Ok(Self {
            inner: Arc::new(ManagerInner {
                schemes: RwLock::new(SchemeRegistry::new(config.schemes_max_count, config.roles)),
                provider,
                table: RwLock::new(AssetTable::default()),
                roles,
                control: Dispatcher::new(config.queue_capacity),
                next_unique_id: Mutex::new(UNIQUE_ID_FIRST),
                config,
            }),
        })
    }

    /// Manager with the default configuration
    pub fn with_provider<P: ByteProvider + 'static>(provider: P) -> Self {
        let provider: Arc<dyn ByteProvider> = Arc::new(provider);
        match Self::new(AssetManagerConfig::default(), provider) {
            Ok(manager) => manager,
            Err(e) => unreachable!("default configuration is valid: {e}"),
        }
    }

    pub fn config(&self) -> &AssetManagerConfig {
        &self.inner.config
    }

    /// Register the loader for scheme `index`. Re-registration is rejected.
    pub fn define_scheme(&self, index: u32, descriptor: SchemeDescriptor) -> Result<()> {
        debug!(scheme = index, payload = descriptor.payload_type_name(), "defining scheme");
        self.inner.schemes.write().define(index, descriptor)
    }

    /// Take a reference to `id`, requesting it if it is not tracked yet
    pub fn load(&self, id: AssetId) {
        let mut table = self.inner.table.write();
        self.inner.acquire(&mut table, id);
    }

    /// Like [`load`](Self::load), releasing the reference when the handle drops
    pub fn load_handle(&self, id: AssetId) -> AssetHandle {
        self.load(id);
        AssetHandle::new(self.clone(), id)
    }

    /// Drop one reference. Unloading an untracked or unreferenced id is a no-op.
    pub fn unload(&self, id: AssetId) {
        let mut table = self.inner.table.write();
        self.inner.release(&mut table, id);
    }

    /// Fetch `id` again; with `recursive`, its current dependencies too.
    ///
    /// The published payload stays visible until the new generation is
    /// ready. Each id is reloaded at most once per call, so dependency
    /// cycles terminate. An untracked id is loaded instead.
    pub fn reload(&self, id: AssetId, recursive: bool) {
        let mut table = self.inner.table.write();
        if !recursive {
            self.inner.reload(&mut table, id);
            return;
        }
        let mut visited = FxHashSet::default();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if visited.insert(next) {
                stack.extend(self.inner.reload(&mut table, next));
            }
        }
    }

    /// Publish a caller-built payload as a ready asset with one reference
    pub fn fabricate<T: Any + Send + Sync>(&self, scheme: u32, id: AssetId, value: T) -> Result<()> {
        let descriptor = self.inner.schemes.read().require(scheme)?;
        if !descriptor.is::<T>() {
            return Err(AssetError::TypeMismatch {
                asset: id,
                expected: descriptor.payload_type_name(),
            });
        }
        let mut table = self.inner.table.write();
        if table.records.contains_key(&id) {
            return Err(AssetError::AssetAlreadyExists(id));
        }
        let mut record = AssetRecord::requested();
        record.scheme = Some(scheme);
        record.state = AssetState::Ready;
        record.payload = Some(Arc::new(value));
        record.fabricated = true;
        table.records.insert(id, record);
        debug!(asset = %id, scheme, "fabricated");
        Ok(())
    }

    /// Load `id` from `raw` through its own `descriptor`, skipping the provider.
    ///
    /// The asset still belongs to `scheme`: it finalizes on that scheme's
    /// role and `descriptor` has to produce the scheme's payload type. Like a
    /// fabricated asset it starts with one reference and ignores reloads.
    pub fn load_custom(
        &self,
        scheme: u32,
        id: AssetId,
        descriptor: SchemeDescriptor,
        raw: RawAsset,
    ) -> Result<()> {
        let registered = self.inner.schemes.read().require(scheme)?;
        if descriptor.payload_type() != registered.payload_type() {
            return Err(AssetError::TypeMismatch {
                asset: id,
                expected: registered.payload_type_name(),
            });
        }
        let mut table = self.inner.table.write();
        if table.records.contains_key(&id) {
            return Err(AssetError::AssetAlreadyExists(id));
        }
        let mut record = AssetRecord::requested();
        record.scheme = Some(scheme);
        record.fabricated = true;
        record.label = raw.label.clone();
        record.custom = Some(Arc::new(CustomSource {
            descriptor: Arc::new(descriptor),
            worker: registered.worker_role(),
            raw: RawAsset { scheme, ..raw },
        }));
        table.records.insert(id, record);
        debug!(asset = %id, scheme, "custom load requested");
        self.inner.dispatch_fetch(&mut table, id);
        Ok(())
    }

    /// An id from the reserved range that is not tracked right now
    pub fn generate_unique_id(&self) -> AssetId {
        let table = self.inner.table.read();
        let mut next = self.inner.next_unique_id.lock();
        loop {
            let candidate = *next;
            *next = if candidate >= UNIQUE_ID_LAST {
                UNIQUE_ID_FIRST
            } else {
                candidate + 1
            };
            if let Some(id) = AssetId::new(candidate) {
                if !table.records.contains_key(&id) {
                    return id;
                }
            }
        }
    }

    /// Current state, `None` if the id is not tracked
    pub fn state(&self, id: AssetId) -> Option<AssetState> {
        self.inner.table.read().records.get(&id).map(|r| r.state)
    }

    /// Whether a payload is published; the gate to use before [`get`](Self::get)
    pub fn ready(&self, id: AssetId) -> bool {
        self.state(id) == Some(AssetState::Ready)
    }

    /// A ready asset with a newer generation in flight
    pub fn is_reloading(&self, id: AssetId) -> bool {
        self.inner
            .table
            .read()
            .records
            .get(&id)
            .is_some_and(|r| r.state == AssetState::Ready && r.pending.is_some())
    }

    /// Scheme index, known once the first fetch reported it
    pub fn scheme(&self, id: AssetId) -> Option<u32> {
        self.inner.table.read().records.get(&id).and_then(|r| r.scheme)
    }

    /// Published payload of `id` as `T`.
    ///
    /// Empty unless the asset is ready. Asking for the wrong type is a caller
    /// bug: it asserts in debug builds and yields `None` in release builds.
    pub fn get<T: Any + Send + Sync>(&self, id: AssetId) -> Option<Arc<T>> {
        match self.try_get::<T>(id) {
            Ok(value) => value,
            Err(error) => {
                debug_assert!(false, "{error}");
                None
            }
        }
    }

    /// Like [`get`](Self::get) but reports a type mismatch as an error
    pub fn try_get<T: Any + Send + Sync>(&self, id: AssetId) -> Result<Option<Arc<T>>> {
        let payload = {
            let table = self.inner.table.read();
            match table.records.get(&id) {
                Some(record) if record.state == AssetState::Ready => record.payload.clone(),
                _ => None,
            }
        };
        match payload.map(Payload::downcast::<T>) {
            None => Ok(None),
            Some(Ok(value)) => Ok(Some(value)),
            Some(Err(_)) => Err(AssetError::TypeMismatch {
                asset: id,
                expected: type_name::<T>(),
            }),
        }
    }

    /// Published payload of `id`, only if it belongs to `scheme`.
    ///
    /// Unlike [`get`](Self::get) a payload of another type is not a caller
    /// bug here and simply yields `None`.
    pub fn get_by_scheme<T: Any + Send + Sync>(&self, scheme: u32, id: AssetId) -> Option<Arc<T>> {
        let payload = {
            let table = self.inner.table.read();
            let record = table.records.get(&id)?;
            if record.scheme != Some(scheme) || record.state != AssetState::Ready {
                return None;
            }
            record.payload.clone()?
        };
        payload.downcast::<T>().ok()
    }

    /// Dependencies recorded by the last ready generation
    pub fn dependencies(&self, id: AssetId) -> Vec<AssetId> {
        self.inner
            .table
            .read()
            .records
            .get(&id)
            .map(|r| r.dependencies.to_vec())
            .unwrap_or_default()
    }

    /// Why a failed asset failed
    pub fn error(&self, id: AssetId) -> Option<AssetError> {
        self.inner.table.read().records.get(&id).and_then(|r| r.error.clone())
    }

    pub fn generation(&self, id: AssetId) -> Option<u32> {
        self.inner.table.read().records.get(&id).map(|r| r.generation)
    }

    /// Explicit loads plus dependents holding `id`
    pub fn references(&self, id: AssetId) -> u32 {
        self.inner
            .table
            .read()
            .records
            .get(&id)
            .map_or(0, |r| r.references)
    }

    /// Label reported by the provider, if any
    pub fn label(&self, id: AssetId) -> Option<String> {
        self.inner.table.read().records.get(&id).and_then(|r| r.label.clone())
    }

    /// Number of tracked assets
    pub fn count_total(&self) -> usize {
        self.inner.table.read().records.len()
    }

    /// Number of tracked assets not in `Ready` or `Failed`
    pub fn count_processing(&self) -> usize {
        self.inner
            .table
            .read()
            .records
            .values()
            .filter(|r| r.state.is_processing())
            .count()
    }

    /// Any job or notification still in flight
    pub fn processing(&self) -> bool {
        !self.inner.table.read().jobs.is_empty()
            || self.inner.control.pending() > 0
            || self.inner.roles.iter().any(|role| role.pending() > 0)
    }

    /// Nothing tracked and nothing in flight
    pub fn is_empty(&self) -> bool {
        self.count_total() == 0 && !self.processing()
    }

    /// Block until [`is_empty`](Self::is_empty) holds or `timeout` passes.
    ///
    /// Pumps nothing itself: other threads keep the role and control queues
    /// moving. Returns whether the manager emptied in time.
    pub fn wait_till_empty(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_empty() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::yield_now();
        }
    }

    /// Apply one completion on the calling (control) thread.
    ///
    /// Returns whether more completions are queued.
    pub fn process_control_thread(&self) -> bool {
        match self.inner.control.try_next() {
            Ok(Some(notification)) => {
                self.inner.apply(notification);
                self.inner.control.pending() > 0
            }
            Ok(None) | Err(_) => false,
        }
    }

    /// Run one job assigned to `role` on the calling thread.
    ///
    /// Returns whether more jobs remain for that role.
    pub fn process_custom_thread(&self, role: RoleId) -> bool {
        let Some(dispatcher) = self.inner.roles.get(role.index()) else {
            return false;
        };
        match dispatcher.try_next() {
            Ok(Some(job)) => {
                self.inner.run(role, job);
                dispatcher.pending() > 0
            }
            Ok(None) | Err(_) => false,
        }
    }

    /// Blocking variant of [`process_custom_thread`](Self::process_custom_thread).
    ///
    /// Waits up to `timeout` for a job; `Ok(false)` when none arrived and
    /// `Err(Terminated)` once the manager shut down.
    pub fn wait_custom_thread(&self, role: RoleId, timeout: Duration) -> Result<bool> {
        let dispatcher = self
            .inner
            .roles
            .get(role.index())
            .ok_or(AssetError::UnknownRole(role))?;
        match dispatcher.next_timeout(timeout)? {
            Some(job) => {
                self.inner.run(role, job);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Pump `role` and the control queue until both are empty.
    ///
    /// Meant for the thread owning `role` when it shuts down, so payloads
    /// bound to it are released there. Jobs queued before a `terminate`
    /// still run.
    pub fn unload_custom_thread(&self, role: RoleId) {
        let Some(dispatcher) = self.inner.roles.get(role.index()) else {
            return;
        };
        loop {
            let mut progressed = false;
            while let Some(job) = dispatcher.drain_next() {
                self.inner.run(role, job);
                progressed = true;
            }
            while let Some(notification) = self.inner.control.drain_next() {
                self.inner.apply(notification);
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
    }

    /// Shut every queue down and wake all waiting threads. Idempotent.
    pub fn terminate(&self) {
        debug!("terminating asset queues");
        for role in &self.inner.roles {
            role.terminate();
        }
        self.inner.control.terminate();
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.control.is_terminated()
    }
}

impl fmt::Debug for AssetManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetManager")
            .field("roles", &self.inner.config.roles)
            .field("total", &self.count_total())
            .field("processing", &self.count_processing())
            .finish()
    }
}

impl ManagerInner {
    fn role(&self, role: RoleId) -> &Dispatcher<Job> {
        &self.roles[role.index()]
    }

    /// Queue `job` on `role`; the job comes back once the queues terminated
    fn send(&self, role: RoleId, job: Job) -> std::result::Result<(), Job> {
        let sent = self.role(role).dispatch(job);
        if sent.is_err() {
            debug!(%role, "queues terminated, job rejected");
        }
        sent
    }

    /// Hand a completion to the control thread.
    ///
    /// After termination nobody pumps the control queue any more, so the
    /// completion is applied right here. Never call with the table locked.
    fn notify(&self, notification: Notification) {
        if let Err(notification) = self.control.dispatch(notification) {
            debug!(asset = %notification.id(), "queues terminated, applying completion inline");
            self.apply(notification);
        }
    }

    fn worker_role_of(&self, scheme: Option<u32>) -> Option<RoleId> {
        let scheme = scheme?;
        self.schemes.read().get(scheme)?.worker_role()
    }

    /// Drop payloads on their scheme's role thread, or here if it has none
    fn release_payloads(&self, scheme: Option<u32>, payloads: Vec<Payload>) {
        if payloads.is_empty() {
            return;
        }
        if let Some(role) = self.worker_role_of(scheme) {
            // Rejected payloads drop with the returned job
            let _rejected = self.send(
                role,
                Job::Release {
                    payloads,
                    disposal: None,
                },
            );
        }
    }

    fn acquire(&self, table: &mut AssetTable, id: AssetId) {
        if let Some(record) = table.records.get_mut(&id) {
            record.references += 1;
            return;
        }
        table.records.insert(id, AssetRecord::requested());
        self.dispatch_fetch(table, id);
    }

    fn release(&self, table: &mut AssetTable, id: AssetId) {
        let Some(record) = table.records.get_mut(&id) else {
            return;
        };
        if record.references == 0 {
            return;
        }
        record.references -= 1;
        if record.references == 0 && record.pending.is_none() {
            self.begin_disposal(table, id);
        }
    }

    /// Bump the generation and return the dependencies to visit next
    fn reload(&self, table: &mut AssetTable, id: AssetId) -> Dependencies {
        let Some(record) = table.records.get_mut(&id) else {
            self.acquire(table, id);
            return Dependencies::new();
        };
        if record.fabricated || record.references == 0 {
            return Dependencies::new();
        }
        record.generation = record.generation.wrapping_add(1);
        if record.state == AssetState::Failed {
            record.state = AssetState::Requested;
            record.error = None;
        }
        let dependencies = record.dependencies.clone();
        debug!(asset = %id, generation = record.generation, "reload requested");
        if record.pending.is_none() {
            self.dispatch_fetch(table, id);
        }
        dependencies
    }

    fn dispatch_fetch(&self, table: &mut AssetTable, id: AssetId) {
        let ticket = table.jobs.insert(id);
        let Some(record) = table.records.get_mut(&id) else {
            table.jobs.remove(ticket);
            return;
        };
        record.pending = Some(ticket);
        let generation = record.generation;
        debug!(asset = %id, generation, "dispatching fetch");
        let job = Job::Fetch {
            id,
            generation,
            ticket,
        };
        if self.send(self.config.fetch_role, job).is_err() {
            self.abandon_fetch(table, id, ticket);
        }
    }

    /// Settle an asset whose fetch can no longer run
    fn abandon_fetch(&self, table: &mut AssetTable, id: AssetId, ticket: JobKey) {
        table.jobs.remove(ticket);
        let Some(record) = table.records.get_mut(&id) else {
            return;
        };
        record.pending = None;
        record.state = AssetState::Failed;
        record.error = Some(AssetError::Terminated);
        let previous = record.payload.take();
        let scheme = record.scheme;
        self.release_payloads(scheme, previous.into_iter().collect());
    }

    fn begin_disposal(&self, table: &mut AssetTable, id: AssetId) {
        let ticket = table.jobs.insert(id);
        let Some(record) = table.records.get_mut(&id) else {
            table.jobs.remove(ticket);
            return;
        };
        record.state = AssetState::Disposing;
        record.pending = Some(ticket);
        let payload = record.payload.take();
        let scheme = record.scheme;
        debug!(asset = %id, "disposing");
        let dispatched = match self.worker_role_of(scheme) {
            Some(role) => self
                .send(
                    role,
                    Job::Release {
                        payloads: payload.into_iter().collect(),
                        disposal: Some((id, ticket)),
                    },
                )
                .is_ok(),
            None => {
                drop(payload);
                self.control
                    .dispatch(Notification::Disposed { id, ticket })
                    .is_ok()
            }
        };
        if !dispatched {
            self.complete_disposal(table, id, ticket);
        }
    }

    fn run(&self, role: RoleId, job: Job) {
        match job {
            Job::Fetch {
                id,
                generation,
                ticket,
            } => self.run_fetch(role, id, generation, ticket),
            Job::Finalize {
                id,
                generation,
                ticket,
                descriptor,
                raw,
                previous,
            } => {
                #[cfg(feature = "profiling")]
                let _span = info_span!("asset_finalize", asset = id.get(), %role).entered();

                let scheme = raw.scheme;
                let result = finalize(&descriptor, id, raw, previous.as_ref());
                self.notify(Notification::Loaded {
                    id,
                    generation,
                    ticket,
                    scheme: Some(scheme),
                    result,
                });
            }
            Job::Release { payloads, disposal } => {
                drop(payloads);
                if let Some((id, ticket)) = disposal {
                    self.notify(Notification::Disposed { id, ticket });
                }
            }
        }
    }

    fn run_fetch(&self, role: RoleId, id: AssetId, generation: u32, ticket: JobKey) {
        #[cfg(feature = "profiling")]
        let _span = info_span!("asset_fetch", asset = id.get(), generation).entered();

        let (previous, custom) = {
            let mut table = self.table.write();
            match table.records.get_mut(&id) {
                Some(record) if record.generation == generation => {
                    if record.state == AssetState::Requested {
                        record.state = AssetState::Fetching;
                    }
                    (record.payload.clone(), record.custom.clone())
                }
                _ => (None, None),
            }
        };

        let fetched = match custom {
            Some(custom) => Ok((
                Arc::clone(&custom.descriptor),
                custom.worker,
                custom.raw.clone(),
            )),
            None => self.provider.fetch(id).and_then(|raw| {
                let descriptor = self.schemes.read().require(raw.scheme)?;
                let worker = descriptor.worker_role();
                Ok((descriptor, worker, raw))
            }),
        };
        let fetched = fetched.and_then(|(descriptor, worker, raw)| {
            if !raw.compressed {
                return Ok((descriptor, worker, raw));
            }
            let data = descriptor.decompress(&raw.data)?;
            Ok((
                descriptor,
                worker,
                RawAsset {
                    data,
                    compressed: false,
                    ..raw
                },
            ))
        });
        let (descriptor, worker, raw) = match fetched {
            Ok(fetched) => fetched,
            Err(error) => {
                self.notify(Notification::Loaded {
                    id,
                    generation,
                    ticket,
                    scheme: None,
                    result: Err(error),
                });
                return;
            }
        };

        let scheme = raw.scheme;
        if let Some(target) = worker.filter(|target| *target != role) {
            {
                let mut table = self.table.write();
                if let Some(record) = table.records.get_mut(&id) {
                    if record.generation == generation && record.state == AssetState::Fetching {
                        record.state = AssetState::Finalizing;
                    }
                }
            }
            debug!(asset = %id, role = %target, "handing finalize to role");
            let job = Job::Finalize {
                id,
                generation,
                ticket,
                descriptor,
                raw,
                previous,
            };
            if self.send(target, job).is_err() {
                self.notify(Notification::Loaded {
                    id,
                    generation,
                    ticket,
                    scheme: Some(scheme),
                    result: Err(AssetError::Terminated),
                });
            }
            return;
        }

        let result = finalize(&descriptor, id, raw, previous.as_ref());
        self.notify(Notification::Loaded {
            id,
            generation,
            ticket,
            scheme: Some(scheme),
            result,
        });
    }

    fn apply(&self, notification: Notification) {
        match notification {
            Notification::Loaded {
                id,
                generation,
                ticket,
                scheme,
                result,
            } => self.apply_loaded(id, generation, ticket, scheme, result),
            Notification::Disposed { id, ticket } => self.apply_disposed(id, ticket),
        }
    }

    fn apply_loaded(
        &self,
        id: AssetId,
        generation: u32,
        ticket: JobKey,
        scheme: Option<u32>,
        result: Result<Finalized>,
    ) {
        let mut guard = self.table.write();
        let table = &mut *guard;
        let record = match table.records.get_mut(&id) {
            Some(record) if record.pending == Some(ticket) => record,
            _ => {
                warn!(asset = %id, "completion for an untracked job");
                if let Ok(finalized) = result {
                    self.release_payloads(scheme, vec![finalized.payload]);
                }
                return;
            }
        };
        table.jobs.remove(ticket);
        record.pending = None;

        if record.references == 0 {
            if let Ok(finalized) = result {
                self.release_payloads(scheme, vec![finalized.payload]);
            }
            self.begin_disposal(table, id);
            return;
        }

        if record.generation != generation {
            debug!(asset = %id, generation, current = record.generation, "discarding superseded result");
            if let Ok(finalized) = result {
                self.release_payloads(scheme, vec![finalized.payload]);
            }
            self.dispatch_fetch(table, id);
            return;
        }

        let known = record.scheme;
        let result = result.and_then(|finalized| match (known, scheme) {
            (Some(from), Some(to)) if from != to => {
                self.release_payloads(scheme, vec![finalized.payload]);
                Err(AssetError::SchemeChanged { asset: id, from, to })
            }
            _ => Ok(finalized),
        });

        match result {
            Ok(Finalized {
                payload,
                dependencies,
                label,
            }) => {
                if record.scheme.is_none() {
                    record.scheme = scheme;
                }
                let previous = record.payload.replace(payload);
                let stale = std::mem::replace(&mut record.dependencies, dependencies.clone());
                record.state = AssetState::Ready;
                record.error = None;
                if label.is_some() {
                    record.label = label;
                }
                let scheme = record.scheme;
                debug!(asset = %id, generation, dependencies = dependencies.len(), "ready");

                self.release_payloads(scheme, previous.into_iter().collect());
                for dependency in dependencies {
                    self.acquire(table, dependency);
                }
                for dependency in stale {
                    self.release(table, dependency);
                }
            }
            Err(error) => {
                warn!(asset = %id, generation, %error, "asset failed to load");
                if record.scheme.is_none() {
                    record.scheme = scheme;
                }
                let previous = record.payload.take();
                record.state = AssetState::Failed;
                record.error = Some(error);
                let scheme = record.scheme;
                self.release_payloads(scheme, previous.into_iter().collect());
            }
        }
    }

    fn apply_disposed(&self, id: AssetId, ticket: JobKey) {
        let mut table = self.table.write();
        self.complete_disposal(&mut table, id, ticket);
    }

    /// Remove a disposed asset, or fetch it again if it was loaded meanwhile
    fn complete_disposal(&self, table: &mut AssetTable, id: AssetId, ticket: JobKey) {
        let Some(record) = table.records.get_mut(&id) else {
            warn!(asset = %id, "disposal of an untracked asset");
            return;
        };
        if record.pending != Some(ticket) {
            warn!(asset = %id, "disposal for an untracked job");
            return;
        }
        table.jobs.remove(ticket);
        record.pending = None;

        if record.references > 0 {
            debug!(asset = %id, "loaded again while disposing");
            record.state = AssetState::Requested;
            self.dispatch_fetch(table, id);
            return;
        }

        if let Some(record) = table.records.remove(&id) {
            debug!(asset = %id, "removed");
            for dependency in record.dependencies {
                self.release(table, dependency);
            }
        }
    }
}

/// Run the scheme callback over fetched bytes
fn finalize(
    descriptor: &SchemeDescriptor,
    id: AssetId,
    raw: RawAsset,
    previous: Option<&Payload>,
) -> Result<Finalized> {
    let mut dependencies = Dependencies::new();
    for dependency in raw.dependencies {
        if dependency != id && !dependencies.contains(&dependency) {
            dependencies.push(dependency);
        }
    }
    let payload = descriptor.load(
        id,
        &raw.data,
        previous,
        raw.label.as_deref(),
        &mut dependencies,
    )?;
    Ok(Finalized {
        payload,
        dependencies,
        label: raw.label,
    })
}
