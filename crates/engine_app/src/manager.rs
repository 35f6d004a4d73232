//! The public systems manager.
//!
//! [`SystemsManager`] owns the world, the registered systems and their
//! pipelines. All mutable state sits behind one mutex held for the length of
//! a tick, so a pipeline never ticks concurrently with itself, another
//! pipeline, or a control call such as [`SystemsManager::stream_out`].
//! Pause flags live outside that mutex and can be flipped from any thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use engine_component::{Entity, IdGenerators};
use engine_message::{EntityRecord, EntitySink, EntityStream};
use engine_system::{DirectSystem, IndirectSystem, InputEvent, LogSink, TracingSink};
use parking_lot::{Condvar, Mutex};

use crate::config::{Dispatch, ManagerConfig, PipelineConfig};
use crate::error::{ManagerError, TickError};
use crate::pipeline::{PipelineControl, PipelineState, PipelineStats};
use crate::registry::{SystemBody, SystemHandle};
use crate::tick::{ManagerCore, panic_message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Unstarted,
    Started,
    Stopped,
}

#[derive(Debug, Default)]
struct Clock {
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
}

struct Shared {
    core: Mutex<ManagerCore>,
    /// Never held while acquiring `core`.
    state: Mutex<ManagerState>,
    controls: DashMap<String, Arc<PipelineControl>>,
    wake: Condvar,
    woken: Mutex<bool>,
    clock: Mutex<Clock>,
    failure: Mutex<Option<String>>,
    config: ManagerConfig,
    ids: Arc<IdGenerators>,
    sink: Arc<dyn LogSink>,
}

impl Shared {
    fn state(&self) -> ManagerState {
        *self.state.lock()
    }

    fn notify(&self) {
        *self.woken.lock() = true;
        self.wake.notify_all();
    }

    /// Blocks until `deadline`, or until notified when there is none.
    fn sleep_until(&self, deadline: Option<Instant>) {
        let mut woken = self.woken.lock();
        if !*woken {
            match deadline {
                Some(at) => {
                    self.wake.wait_until(&mut woken, at);
                }
                None => self.wake.wait(&mut woken),
            }
        }
        *woken = false;
    }

    fn mark_stopped(&self) -> ManagerState {
        let previous = std::mem::replace(&mut *self.state.lock(), ManagerState::Stopped);
        let mut clock = self.clock.lock();
        if clock.started_at.is_some() && clock.stopped_at.is_none() {
            clock.stopped_at = Some(Instant::now());
        }
        previous
    }

    /// Stops the manager after a failed tick.
    fn fail(&self, pipeline: &str, err: &TickError) {
        log_to!(self.sink, Error, "tick failed, stopping manager pipeline={pipeline} error={err}");
        *self.failure.lock() = Some(err.to_string());
        self.mark_stopped();
        self.notify();
    }
}

/// Schedules and runs systems over an entity world.
///
/// ```no_run
/// use std::time::Duration;
///
/// use engine_app::{ManagerConfig, PipelineConfig, SystemsManager};
///
/// # fn main() -> Result<(), engine_app::ManagerError> {
/// let manager = SystemsManager::new(ManagerConfig::default())?;
/// manager.add_pipeline(PipelineConfig::interval("sim", Duration::from_millis(16)))?;
/// manager.start()?;
/// std::thread::sleep(Duration::from_millis(100));
/// manager.stop()?;
/// # Ok(())
/// # }
/// ```
pub struct SystemsManager {
    shared: Arc<Shared>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl SystemsManager {
    /// A manager with fresh id generators, logging through `tracing`.
    pub fn new(config: ManagerConfig) -> Result<Self, ManagerError> {
        Self::with_context(config, Arc::new(IdGenerators::new()), Arc::new(TracingSink))
    }

    /// A manager sharing `ids` with other components and logging to `sink`.
    pub fn with_context(
        config: ManagerConfig,
        ids: Arc<IdGenerators>,
        sink: Arc<dyn LogSink>,
    ) -> Result<Self, ManagerError> {
        let core = ManagerCore::new(&config, Arc::clone(&ids), Arc::clone(&sink))?;
        log_to!(
            sink,
            Info,
            "systems manager created execution={:?} workers={} dispatch={:?}",
            config.execution,
            config.worker_count(),
            config.dispatch
        );
        Ok(Self {
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                state: Mutex::new(ManagerState::Unstarted),
                controls: DashMap::new(),
                wake: Condvar::new(),
                woken: Mutex::new(false),
                clock: Mutex::new(Clock::default()),
                failure: Mutex::new(None),
                config,
                ids,
                sink,
            }),
            dispatcher: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    #[must_use]
    pub fn ids(&self) -> &Arc<IdGenerators> {
        &self.shared.ids
    }

    #[must_use]
    pub fn state(&self) -> ManagerState {
        self.shared.state()
    }

    /// The error that stopped the manager, if a tick failed.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.shared.failure.lock().clone()
    }

    fn require_not_stopped(&self, operation: &'static str) -> Result<(), ManagerError> {
        match self.state() {
            ManagerState::Stopped => Err(ManagerError::InvalidState { operation, state: ManagerState::Stopped }),
            _ => Ok(()),
        }
    }

    fn require_started(&self, operation: &'static str) -> Result<(), ManagerError> {
        match self.state() {
            ManagerState::Started => Ok(()),
            state => Err(ManagerError::InvalidState { operation, state }),
        }
    }

    pub fn add_pipeline(&self, config: PipelineConfig) -> Result<(), ManagerError> {
        let mut core = self.shared.core.lock();
        self.require_not_stopped("add_pipeline")?;
        let name = config.name.clone();
        let index = core.add_pipeline(config)?;
        self.shared.controls.insert(name, Arc::clone(&core.pipelines[index].control));
        drop(core);
        self.shared.notify();
        Ok(())
    }

    pub fn register_direct(
        &self,
        pipeline: &str,
        system: impl DirectSystem + 'static,
    ) -> Result<SystemHandle, ManagerError> {
        self.register(pipeline, SystemBody::Direct(Box::new(system)))
    }

    pub fn register_indirect(
        &self,
        pipeline: &str,
        system: impl IndirectSystem + 'static,
    ) -> Result<SystemHandle, ManagerError> {
        self.register(pipeline, SystemBody::Indirect(Box::new(system)))
    }

    fn register(&self, pipeline: &str, body: SystemBody) -> Result<SystemHandle, ManagerError> {
        let mut core = self.shared.core.lock();
        self.require_not_stopped("register")?;
        let started = self.state() == ManagerState::Started;
        let handle = core.register(pipeline, body, started)?;
        drop(core);
        self.shared.notify();
        Ok(handle)
    }

    #[must_use]
    pub fn system_handle(&self, name: &str) -> Option<SystemHandle> {
        self.shared.core.lock().registry.handle_of(name)
    }

    #[must_use]
    pub fn system_count(&self) -> usize {
        self.shared.core.lock().registry.len()
    }

    pub fn unregister(&self, handle: SystemHandle) -> Result<(), ManagerError> {
        let mut core = self.shared.core.lock();
        self.require_not_stopped("unregister")?;
        core.unregister(handle)
    }

    /// Queues every entity of `stream` to be added on the next tick.
    ///
    /// Id generators are advanced past the loaded ids and labels are
    /// restored. Every indirect system receives the matching entities as
    /// `RegisterEntity` on the next delivery.
    pub fn load(&self, stream: &mut dyn EntityStream) -> Result<usize, ManagerError> {
        let mut core = self.shared.core.lock();
        self.require_not_stopped("load")?;
        core.load(stream)
    }

    /// Creates every registered system and, with threaded dispatch, starts
    /// ticking.
    pub fn start(&self) -> Result<(), ManagerError> {
        let mut core = self.shared.core.lock();
        {
            let mut state = self.shared.state.lock();
            if *state != ManagerState::Unstarted {
                return Err(ManagerError::InvalidState { operation: "start", state: *state });
            }
            *state = ManagerState::Started;
        }
        self.shared.clock.lock().started_at = Some(Instant::now());
        core.create_all();
        drop(core);

        if self.shared.config.dispatch == Dispatch::Threaded {
            let shared = Arc::clone(&self.shared);
            let handle = std::thread::Builder::new()
                .name("engine-dispatch".to_string())
                .spawn(move || dispatch_loop(&shared));
            match handle {
                Ok(handle) => *self.dispatcher.lock() = Some(handle),
                Err(err) => {
                    self.shared.mark_stopped();
                    self.shared.core.lock().shutdown();
                    return Err(err.into());
                }
            }
        }
        log_to!(self.shared.sink, Info, "systems manager started");
        Ok(())
    }

    /// Stops ticking, waits for an in-flight tick, destroys every system and
    /// applies what they emitted. Calling it again is a no-op.
    pub fn stop(&self) -> Result<(), ManagerError> {
        let previous = self.shared.mark_stopped();
        self.shared.notify();
        if let Some(handle) = self.dispatcher.lock().take()
            && handle.join().is_err()
        {
            log_to!(self.shared.sink, Error, "dispatch thread panicked");
        }
        self.shared.core.lock().shutdown();
        if previous != ManagerState::Stopped {
            log_to!(self.shared.sink, Info, "systems manager stopped elapsed_ms={}", self.elapsed().as_millis());
        }
        Ok(())
    }

    fn control(&self, pipeline: &str) -> Result<Arc<PipelineControl>, ManagerError> {
        self.shared
            .controls
            .get(pipeline)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ManagerError::UnknownPipeline(pipeline.to_string()))
    }

    /// Pauses a pipeline. With `wait`, returns only once any tick in flight
    /// has finished.
    pub fn pause(&self, pipeline: &str, wait: bool) -> Result<(), ManagerError> {
        self.require_started("pause")?;
        let control = self.control(pipeline)?;
        if !control.set_paused(true) {
            log_to!(self.shared.sink, Info, "pipeline paused pipeline={pipeline}");
        }
        if wait {
            drop(self.shared.core.lock());
        }
        Ok(())
    }

    pub fn resume(&self, pipeline: &str) -> Result<(), ManagerError> {
        self.require_started("resume")?;
        let control = self.control(pipeline)?;
        if control.set_paused(false) {
            let mut core = self.shared.core.lock();
            if let Some(index) = core.pipeline_index(pipeline) {
                core.pipelines[index].reset_deadline();
            }
            drop(core);
            log_to!(self.shared.sink, Info, "pipeline resumed pipeline={pipeline}");
        }
        self.shared.notify();
        Ok(())
    }

    pub fn pause_all(&self, wait: bool) -> Result<(), ManagerError> {
        self.require_started("pause_all")?;
        for entry in &self.shared.controls {
            entry.value().set_paused(true);
        }
        log_to!(self.shared.sink, Info, "all pipelines paused");
        if wait {
            drop(self.shared.core.lock());
        }
        Ok(())
    }

    pub fn resume_all(&self) -> Result<(), ManagerError> {
        self.require_started("resume_all")?;
        let names: Vec<String> = self.shared.controls.iter().map(|entry| entry.key().clone()).collect();
        for name in names {
            self.resume(&name)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn pipeline_state(&self, pipeline: &str) -> Option<PipelineState> {
        self.shared.controls.get(pipeline).map(|entry| entry.value().state())
    }

    /// Ticks one pipeline on the calling thread. Meant for manual dispatch.
    pub fn tick_pipeline(&self, pipeline: &str) -> Result<(), ManagerError> {
        let mut core = self.shared.core.lock();
        self.require_started("tick_pipeline")?;
        let index = core
            .pipeline_index(pipeline)
            .ok_or_else(|| ManagerError::UnknownPipeline(pipeline.to_string()))?;
        if core.pipelines[index].control.is_paused() {
            return Err(ManagerError::PipelinePaused(pipeline.to_string()));
        }
        if let Err(err) = guarded_tick(&mut core, index) {
            drop(core);
            self.shared.fail(pipeline, &err);
            return Err(err.into());
        }
        Ok(())
    }

    /// Offers an input event to systems in registration order. Returns
    /// `true` once one handles it.
    pub fn send_input(&self, event: &InputEvent) -> bool {
        self.shared.core.lock().route_input(event)
    }

    #[must_use]
    pub fn stats(&self, pipeline: &str) -> Option<PipelineStats> {
        let core = self.shared.core.lock();
        core.pipeline_index(pipeline).map(|index| core.pipelines[index].stats)
    }

    /// Time spent started: zero before `start`, frozen at `stop`.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        let clock = self.shared.clock.lock();
        match (clock.started_at, clock.stopped_at) {
            (Some(started), Some(stopped)) => stopped.duration_since(started),
            (Some(started), None) => started.elapsed(),
            (None, _) => Duration::ZERO,
        }
    }

    /// Writes every entity to `sink`.
    ///
    /// Allowed before start, after stop, or while every pipeline is paused.
    pub fn stream_out(&self, sink: &mut dyn EntitySink) -> Result<usize, ManagerError> {
        if self.state() == ManagerState::Started
            && self.shared.controls.iter().any(|entry| !entry.value().is_paused())
        {
            return Err(ManagerError::NotPaused);
        }
        self.shared.core.lock().stream_out(sink)
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.shared.core.lock().world.entity_count()
    }

    /// Snapshot of one entity.
    #[must_use]
    pub fn entity(&self, entity: Entity) -> Option<EntityRecord> {
        let core = self.shared.core.lock();
        let state = core.world.entity_state(entity)?;
        Some(EntityRecord {
            entity,
            label: self.shared.ids.entities.label(entity),
            components: state.components,
        })
    }
}

impl Drop for SystemsManager {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl std::fmt::Debug for SystemsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemsManager")
            .field("state", &self.state())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

/// Ticks every running pipeline when due until the manager stops.
fn dispatch_loop(shared: &Shared) {
    log_to!(shared.sink, Debug, "dispatch thread started");
    while shared.state() == ManagerState::Started {
        let mut busy = false;
        let mut next_wake: Option<Instant> = None;
        {
            let mut core = shared.core.lock();
            for index in 0..core.pipelines.len() {
                if shared.state() != ManagerState::Started {
                    break;
                }
                if core.pipelines[index].control.is_paused() {
                    continue;
                }
                if !core.pipelines[index].is_due(Instant::now()) {
                    next_wake = earliest(next_wake, core.pipelines[index].next_deadline());
                    continue;
                }
                if let Err(err) = guarded_tick(&mut core, index) {
                    let name = core.pipelines[index].name.clone();
                    drop(core);
                    shared.fail(&name, &err);
                    return;
                }
                match core.pipelines[index].next_deadline() {
                    Some(deadline) => next_wake = earliest(next_wake, Some(deadline)),
                    None => busy = true,
                }
            }
        }
        if busy {
            std::thread::yield_now();
        } else {
            shared.sleep_until(next_wake);
        }
    }
    log_to!(shared.sink, Debug, "dispatch thread exiting");
}

/// Ticks pipeline `index`, turning a panic that escaped the systems into
/// an error.
fn guarded_tick(core: &mut ManagerCore, index: usize) -> Result<(), TickError> {
    panic::catch_unwind(AssertUnwindSafe(|| core.tick(index)))
        .unwrap_or_else(|payload| Err(TickError::Panicked(panic_message(payload.as_ref()))))
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
