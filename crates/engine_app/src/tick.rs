//! The manager's single-threaded core and the tick lifecycle.
//!
//! One tick of a pipeline:
//!
//! 1. Recompute stages if the pipeline's membership changed.
//! 2. For each stage: gather columns, run the stage's systems (in parallel on
//!    the worker pool when configured), write mutated columns back.
//! 3. Merge pending lifecycle messages and every system's output, in
//!    registration order.
//! 4. Apply the merged messages to the world.
//! 5. Filter them for every indirect system and queue the result.
//! 6. Flush the queues of the ticking pipeline's indirect systems.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use engine_component::{ArchetypeReflector, Entity, IdGenerators};
use engine_message::{
    EntityRecord, EntitySink, EntityState, EntityStream, Message, MessageKind, TickMessages,
};
use engine_system::{
    ArchetypeChunk, DirectContext, DirectSystem, IndirectSystem, InputEvent, InputResponse, LogSink,
    SystemEnv,
};
use rayon::prelude::*;

use crate::config::{ExecutionMode, ManagerConfig, PipelineConfig};
use crate::error::{ManagerError, RegistrationError, TickError, WorldError};
use crate::pipeline::Pipeline;
use crate::registry::{SystemBody, SystemHandle, SystemRegistry};
use crate::world::{ApplySummary, World};

/// A system lent out for one stage.
enum Job {
    Direct {
        handle: SystemHandle,
        system: Box<dyn DirectSystem>,
        ctx: DirectContext,
    },
    Indirect {
        handle: SystemHandle,
        system: Box<dyn IndirectSystem>,
        env: SystemEnv,
    },
}

struct JobOutput {
    handle: SystemHandle,
    body: SystemBody,
    messages: TickMessages,
    chunks: Vec<ArchetypeChunk>,
}

/// A system that panicked while running.
struct JobPanic {
    handle: SystemHandle,
    message: String,
}

impl Job {
    fn handle(&self) -> SystemHandle {
        match self {
            Job::Direct { handle, .. } | Job::Indirect { handle, .. } => *handle,
        }
    }

    /// Runs the system. A panic loses the system's body and is reported
    /// instead of unwinding into the worker pool.
    fn run(self) -> Result<JobOutput, JobPanic> {
        let handle = self.handle();
        panic::catch_unwind(AssertUnwindSafe(|| self.run_body()))
            .map_err(|payload| JobPanic { handle, message: panic_message(payload.as_ref()) })
    }

    fn run_body(self) -> JobOutput {
        match self {
            Job::Direct { handle, mut system, mut ctx } => {
                system.run(&mut ctx);
                let (env, chunks) = ctx.into_parts();
                JobOutput { handle, body: SystemBody::Direct(system), messages: env.finish(), chunks }
            }
            Job::Indirect { handle, mut system, mut env } => {
                system.run(&mut env);
                JobOutput {
                    handle,
                    body: SystemBody::Indirect(system),
                    messages: env.finish(),
                    chunks: Vec::new(),
                }
            }
        }
    }
}

pub(crate) struct ManagerCore {
    pub world: World,
    pub reflector: ArchetypeReflector,
    pub registry: SystemRegistry,
    pub pipelines: Vec<Pipeline>,
    /// Lifecycle and `on_messages` output waiting for the next tick.
    pub pending: TickMessages,
    pub ids: Arc<IdGenerators>,
    sink: Arc<dyn LogSink>,
    /// `None` runs stages on the calling thread.
    pool: Option<rayon::ThreadPool>,
    shut_down: bool,
}

impl ManagerCore {
    pub fn new(config: &ManagerConfig, ids: Arc<IdGenerators>, sink: Arc<dyn LogSink>) -> Result<Self, ManagerError> {
        let pool = match config.execution {
            ExecutionMode::Sequential => None,
            ExecutionMode::Parallel => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.worker_count())
                    .thread_name(|i| format!("engine-worker-{i}"))
                    .build()?,
            ),
        };
        Ok(Self {
            world: World::new(),
            reflector: ArchetypeReflector::new(),
            registry: SystemRegistry::new(),
            pipelines: Vec::new(),
            pending: TickMessages::new(),
            ids,
            sink,
            pool,
            shut_down: false,
        })
    }

    pub fn pipeline_index(&self, name: &str) -> Option<usize> {
        self.pipelines.iter().position(|pipeline| pipeline.name == name)
    }

    pub fn add_pipeline(&mut self, config: PipelineConfig) -> Result<usize, RegistrationError> {
        if self.pipeline_index(&config.name).is_some() {
            return Err(RegistrationError::DuplicatePipeline(config.name));
        }
        log_to!(
            self.sink,
            Info,
            "pipeline added pipeline={} period_ms={:?}",
            config.name,
            config.period.map(|p| p.as_secs_f64() * 1000.0)
        );
        self.pipelines.push(Pipeline::new(config));
        Ok(self.pipelines.len() - 1)
    }

    /// Registers a system; when the manager is running it is created right
    /// away.
    pub fn register(&mut self, pipeline: &str, body: SystemBody, started: bool) -> Result<SystemHandle, ManagerError> {
        let index = self
            .pipeline_index(pipeline)
            .ok_or_else(|| RegistrationError::UnknownPipeline(pipeline.to_string()))?;
        let handle = self.registry.register(index, pipeline, body)?;

        let Some(entry) = self.registry.get(handle) else {
            return Err(ManagerError::UnknownSystem(handle));
        };
        self.reflector
            .start_tracking_matching_archetypes(handle.query_id(), entry.descriptor.requirements().clone());
        self.pipelines[index].add_system(handle);
        log_to!(
            self.sink,
            Info,
            "system registered system={} handle={} pipeline={}",
            entry.descriptor.name(),
            handle,
            pipeline
        );

        if started {
            self.create(handle);
        }
        Ok(handle)
    }

    fn create(&mut self, handle: SystemHandle) {
        let Self { registry, pending, ids, .. } = self;
        let Some(entry) = registry.get_mut(handle) else {
            return;
        };
        if entry.created {
            return;
        }
        if let Some(body) = entry.body.as_mut() {
            let mut env = SystemEnv::new(0, 0.0, Arc::clone(ids));
            body.on_create(&mut env);
            pending.merge(env.finish());
            entry.created = true;
        }
    }

    /// Runs `on_create` for every system not yet created, in registration
    /// order.
    pub fn create_all(&mut self) {
        for handle in self.registry.handles() {
            self.create(handle);
        }
    }

    /// Removes a system. An indirect system first drains its queue, then is
    /// told to forget every entity it knows, then is destroyed.
    pub fn unregister(&mut self, handle: SystemHandle) -> Result<(), ManagerError> {
        let mut entry = self.registry.unregister(handle).ok_or(ManagerError::UnknownSystem(handle))?;
        self.pipelines[entry.pipeline].remove_system(handle);
        self.reflector.stop_tracking(handle.query_id());

        let tick_id = self.pipelines[entry.pipeline].tick_id;
        if let (Some(SystemBody::Indirect(system)), Some(delivery)) = (entry.body.as_mut(), entry.delivery.as_mut()) {
            let mut batches: Vec<TickMessages> = delivery.inbox.drain(..).collect();
            batches.push(delivery.forget_all());
            for batch in batches.into_iter().filter(|batch| !batch.is_empty()) {
                let mut env = SystemEnv::new(tick_id, 0.0, Arc::clone(&self.ids));
                system.on_messages(&batch, &mut env);
                self.pending.merge(env.finish());
            }
        }
        if entry.created
            && let Some(body) = entry.body.as_mut()
        {
            let mut env = SystemEnv::new(tick_id, 0.0, Arc::clone(&self.ids));
            body.on_destroy(&mut env);
            self.pending.merge(env.finish());
        }

        log_to!(self.sink, Info, "system unregistered system={} handle={}", entry.descriptor.name(), handle);
        Ok(())
    }

    /// Destroys every system and applies what they emitted. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        for entry in self.registry.iter_mut() {
            if !entry.created {
                continue;
            }
            if let Some(body) = entry.body.as_mut() {
                let mut env = SystemEnv::new(0, 0.0, Arc::clone(&self.ids));
                body.on_destroy(&mut env);
                self.pending.merge(env.finish());
            }
            entry.created = false;
        }
        let pending = std::mem::take(&mut self.pending);
        if let Err(err) = self.apply(&pending) {
            log_to!(self.sink, Error, "failed to apply shutdown messages error={err}");
        }
        log_to!(self.sink, Info, "systems destroyed entities={}", self.world.entity_count());
    }

    /// Applies `messages` to the world and drops the labels of the entities
    /// it removed.
    fn apply(&mut self, messages: &TickMessages) -> Result<ApplySummary, WorldError> {
        let applied = self.world.apply(messages, &mut self.reflector);
        for removal in messages.entity_removed() {
            if !self.world.contains(removal.entity) {
                self.ids.entities.forget(removal.entity);
            }
        }
        applied
    }

    /// Ticks pipeline `index` once.
    pub fn tick(&mut self, index: usize) -> Result<(), TickError> {
        let started = Instant::now();
        let (tick_id, dt) = self.pipelines[index].begin_tick(started);

        if self.pipelines[index].refresh_stages(&self.registry) {
            log_to!(
                self.sink,
                Info,
                "recomputed execution stages pipeline={} stage_count={} system_count={}",
                self.pipelines[index].name,
                self.pipelines[index].stages().len(),
                self.pipelines[index].systems.len()
            );
        }
        let stages = self.pipelines[index].stages().to_vec();

        let mut outputs: Vec<(SystemHandle, TickMessages)> = Vec::new();
        for (stage_idx, stage) in stages.iter().enumerate() {
            let jobs = self.prepare_jobs(stage, tick_id, dt)?;
            log_to!(
                self.sink,
                Trace,
                "executing stage pipeline={} tick_id={} stage={} systems={}",
                self.pipelines[index].name,
                tick_id,
                stage_idx,
                jobs.len()
            );
            let mut panicked = None;
            for result in self.execute(jobs) {
                let output = match result {
                    Ok(output) => output,
                    Err(panic) => {
                        if panicked.is_none() {
                            panicked = Some(panic);
                        }
                        continue;
                    }
                };
                for chunk in output.chunks {
                    self.world.scatter(chunk);
                }
                if let Some(entry) = self.registry.get_mut(output.handle) {
                    entry.body = Some(output.body);
                }
                outputs.push((output.handle, output.messages));
            }
            if let Some(JobPanic { handle, message }) = panicked {
                let system = self
                    .registry
                    .get(handle)
                    .map_or_else(|| handle.to_string(), |entry| entry.descriptor.name().to_string());
                return Err(TickError::SystemPanicked { system, message });
            }
        }

        outputs.sort_by_key(|(handle, _)| *handle);
        let mut merged = std::mem::take(&mut self.pending);
        for (_, messages) in outputs {
            merged.merge(messages);
        }

        let summary = self.apply(&merged)?;
        self.deliver(&merged);
        self.flush_inboxes(index, tick_id, dt);

        let elapsed = started.elapsed();
        let pipeline = &mut self.pipelines[index];
        let overran = pipeline.finish_tick(started, elapsed);
        log_to!(
            self.sink,
            Debug,
            "tick complete pipeline={} tick_id={} messages={} spawned={} despawned={} elapsed_us={}",
            pipeline.name,
            tick_id,
            merged.len(),
            summary.spawned,
            summary.despawned,
            elapsed.as_micros()
        );
        if overran && let Some(period) = pipeline.period {
            log_to!(
                self.sink,
                Warn,
                "tick exceeded time budget pipeline={} tick_id={} elapsed_ms={} budget_ms={}",
                pipeline.name,
                tick_id,
                elapsed.as_millis(),
                period.as_millis()
            );
        }
        Ok(())
    }

    fn prepare_jobs(&mut self, stage: &[SystemHandle], tick_id: u64, dt: f64) -> Result<Vec<Job>, TickError> {
        let Self { registry, world, reflector, ids, .. } = self;
        let lost = stage.iter().filter_map(|&handle| registry.get(handle)).find(|entry| entry.body.is_none());
        if let Some(entry) = lost {
            return Err(TickError::MissingSystemBody(entry.descriptor.name().to_string()));
        }
        let mut jobs = Vec::with_capacity(stage.len());
        for &handle in stage {
            let Some(entry) = registry.get_mut(handle) else {
                continue;
            };
            let env = SystemEnv::new(tick_id, dt, Arc::clone(ids));
            match entry.body.take() {
                Some(SystemBody::Direct(system)) => {
                    let spec = entry.descriptor.requirements();
                    let chunks: Vec<ArchetypeChunk> = reflector
                        .find_matching_archetypes(handle.query_id())
                        .map(|archetypes| {
                            archetypes
                                .iter()
                                .filter_map(|&archetype| world.gather(archetype, spec))
                                .collect()
                        })
                        .unwrap_or_default();
                    jobs.push(Job::Direct { handle, system, ctx: DirectContext::new(env, chunks) });
                }
                Some(SystemBody::Indirect(system)) => jobs.push(Job::Indirect { handle, system, env }),
                // Checked above.
                None => {}
            }
        }
        Ok(jobs)
    }

    fn execute(&self, jobs: Vec<Job>) -> Vec<Result<JobOutput, JobPanic>> {
        match &self.pool {
            Some(pool) if jobs.len() > 1 => pool.install(|| jobs.into_par_iter().map(Job::run).collect()),
            _ => jobs.into_iter().map(Job::run).collect(),
        }
    }

    /// Queues each indirect system's view of `merged`.
    fn deliver(&mut self, merged: &TickMessages) {
        let Self { registry, world, reflector, .. } = self;
        for entry in registry.iter_mut() {
            let Some(delivery) = entry.delivery.as_mut() else {
                continue;
            };
            let batch = delivery.filter(
                merged,
                entry.descriptor.requirements(),
                entry.handle.query_id(),
                world,
                reflector,
            );
            if !batch.is_empty() {
                delivery.inbox.push_back(batch);
            }
        }
    }

    /// Hands queued batches to the indirect systems of pipeline `index`.
    fn flush_inboxes(&mut self, index: usize, tick_id: u64, dt: f64) {
        let Self { registry, pipelines, pending, ids, .. } = self;
        for &handle in &pipelines[index].systems {
            let Some(entry) = registry.get_mut(handle) else {
                continue;
            };
            let (Some(SystemBody::Indirect(system)), Some(delivery)) = (entry.body.as_mut(), entry.delivery.as_mut())
            else {
                continue;
            };
            while let Some(batch) = delivery.inbox.pop_front() {
                let mut env = SystemEnv::new(tick_id, dt, Arc::clone(ids));
                system.on_messages(&batch, &mut env);
                pending.merge(env.finish());
            }
        }
    }

    /// Offers `event` to systems in registration order until one handles it.
    pub fn route_input(&mut self, event: &InputEvent) -> bool {
        for entry in self.registry.iter_mut() {
            let Some(handler) = entry.body.as_mut().and_then(SystemBody::input_handler) else {
                continue;
            };
            if handler.handle_input(event) == InputResponse::Handled {
                log_to!(self.sink, Trace, "input handled system={}", entry.descriptor.name());
                return true;
            }
        }
        false
    }

    /// Queues every record of `stream` as an `EntityAdded` for the next
    /// tick and marks indirect systems for catch-up. Returns the number of
    /// entities read.
    pub fn load(&mut self, stream: &mut dyn EntityStream) -> Result<usize, ManagerError> {
        let hint = stream.hint_total();
        let mut seen: HashSet<Entity> =
            self.pending.entity_added().iter().map(|state| state.entity).collect();
        let mut loaded = TickMessages::new();
        if let Some(total) = hint {
            loaded.reserve(MessageKind::EntityAdded, total);
        }

        while let Some(record) = stream.next_record()? {
            let EntityRecord { entity, label, components } = record;
            if self.world.contains(entity) || !seen.insert(entity) {
                return Err(ManagerError::DuplicateEntity(entity));
            }
            self.ids.entities.observe(entity);
            for id in components.iter().filter_map(|c| c.component_id) {
                self.ids.components.observe(id);
            }
            if let Some(label) = label {
                self.ids.entities.set_label(entity, label);
            }
            loaded.push(Message::EntityAdded(EntityState::new(entity, components)));
        }

        let count = loaded.len();
        self.pending.merge(loaded);
        for entry in self.registry.iter_mut() {
            if let Some(delivery) = entry.delivery.as_mut() {
                delivery.needs_catch_up = true;
            }
        }
        log_to!(self.sink, Info, "entities loaded count={count} hint={hint:?}");
        Ok(count)
    }

    /// Writes every entity to `sink`. Returns the number written.
    pub fn stream_out(&self, sink: &mut dyn EntitySink) -> Result<usize, ManagerError> {
        sink.hint_total(self.world.entity_count())?;
        let mut written = 0;
        for record in self.world.records(&self.ids.entities) {
            sink.add_entity(record)?;
            written += 1;
        }
        log_to!(self.sink, Debug, "entities streamed out count={written}");
        Ok(written)
    }
}

/// The text of a panic payload, when it carries one.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use engine_component::{Component, RequirementSpec};
    use engine_message::{EntityRemoval, VecEntityStream};
    use engine_system::{DirectContext, FnDirectSystem, MemorySink, SystemDescriptor};
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    struct Counter(u32);

    impl Component for Counter {
        fn type_name() -> &'static str {
            "Counter"
        }
    }

    fn core(config: &ManagerConfig) -> (ManagerCore, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let core = ManagerCore::new(config, Arc::new(IdGenerators::new()), sink.clone()).unwrap();
        (core, sink)
    }

    fn incrementer(name: &str) -> SystemBody {
        let spec = RequirementSpec::new().write(Counter::component_type_id());
        SystemBody::Direct(Box::new(FnDirectSystem::new(SystemDescriptor::new(name, spec), |ctx: &mut DirectContext| {
            for chunk in ctx.chunks_mut() {
                for counter in chunk.write::<Counter>() {
                    counter.0 += 1;
                }
            }
        })))
    }

    #[test]
    fn test_tick_advances_counter() {
        let (mut core, sink) = core(&ManagerConfig::sequential());
        let index = core.add_pipeline(PipelineConfig::uninterval("sim")).unwrap();
        core.register("sim", incrementer("inc"), true).unwrap();

        let mut stream = VecEntityStream::from(vec![EntityRecord::new(Entity(7)).with_component(Counter(0))]);
        assert_eq!(core.load(&mut stream).unwrap(), 1);

        core.tick(index).unwrap();
        core.tick(index).unwrap();
        core.tick(index).unwrap();

        // The entity appears after the first tick and is incremented by the
        // two that follow.
        let state = core.world.entity_state(Entity(7)).unwrap();
        assert_eq!(state.get::<Counter>(), Some(&Counter(2)));
        assert_eq!(core.pipelines[index].tick_id, 3);
        assert_eq!(core.pipelines[index].stats.executed_ticks, 3);
        assert!(sink.contains(engine_system::LogLevel::Info, "recomputed execution stages"));
    }

    #[test]
    fn test_parallel_stage_matches_sequential() {
        for config in [ManagerConfig::sequential(), ManagerConfig::new().with_worker_threads(4)] {
            let (mut core, _) = core(&config);
            let index = core.add_pipeline(PipelineConfig::uninterval("sim")).unwrap();
            core.register("sim", incrementer("a"), true).unwrap();
            core.register("sim", incrementer("b"), true).unwrap();

            let records: Vec<EntityRecord> =
                (1..=8).map(|i| EntityRecord::new(Entity(i)).with_component(Counter(0))).collect();
            core.load(&mut VecEntityStream::from(records)).unwrap();
            core.tick(index).unwrap();
            core.tick(index).unwrap();

            for i in 1..=8 {
                let state = core.world.entity_state(Entity(i)).unwrap();
                assert_eq!(state.get::<Counter>(), Some(&Counter(2)));
            }
        }
    }

    #[test]
    fn test_panicking_system_is_reported_not_skipped() {
        let (mut core, _) = core(&ManagerConfig::new().with_worker_threads(2));
        let index = core.add_pipeline(PipelineConfig::uninterval("sim")).unwrap();
        let reads = || RequirementSpec::new().read(Counter::component_type_id());
        let faulty = FnDirectSystem::new(SystemDescriptor::new("faulty", reads()), |ctx: &mut DirectContext| {
            if !ctx.chunks().is_empty() {
                panic!("bad column");
            }
        });
        let reader = FnDirectSystem::new(SystemDescriptor::new("reader", reads()), |_ctx: &mut DirectContext| {});
        core.register("sim", SystemBody::Direct(Box::new(faulty)), true).unwrap();
        core.register("sim", SystemBody::Direct(Box::new(reader)), true).unwrap();
        core.load(&mut VecEntityStream::from(vec![EntityRecord::new(Entity(1)).with_component(Counter(0))]))
            .unwrap();
        core.tick(index).unwrap();
        assert_eq!(core.pipelines[index].stages().len(), 1);

        let err = core.tick(index).unwrap_err();
        assert!(matches!(
            &err,
            TickError::SystemPanicked { system, message } if system == "faulty" && message == "bad column"
        ));
        // The other system of the stage got its body back.
        let reader = core.registry.handle_of("reader").unwrap();
        assert!(core.registry.get(reader).is_some_and(|entry| entry.body.is_some()));

        assert!(matches!(core.tick(index), Err(TickError::MissingSystemBody(name)) if name == "faulty"));
    }

    #[test]
    fn test_panic_message_reads_payloads() {
        let literal = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(literal.as_ref()), "static");
        let formatted = panic::catch_unwind(|| panic!("tick {}", 3)).unwrap_err();
        assert_eq!(panic_message(formatted.as_ref()), "tick 3");
        let opaque = panic::catch_unwind(|| panic::panic_any(7u8)).unwrap_err();
        assert_eq!(panic_message(opaque.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_removed_entity_label_is_forgotten() {
        let (mut core, _) = core(&ManagerConfig::sequential());
        let index = core.add_pipeline(PipelineConfig::uninterval("sim")).unwrap();
        let records = vec![EntityRecord::new(Entity(5)).with_label("doomed").with_component(Counter(0))];
        core.load(&mut VecEntityStream::from(records)).unwrap();
        core.tick(index).unwrap();
        assert_eq!(core.ids.entities.label(Entity(5)).as_deref(), Some("doomed"));

        core.pending.push(Message::EntityRemoved(EntityRemoval { entity: Entity(5), archetype: None }));
        core.tick(index).unwrap();
        assert!(!core.world.contains(Entity(5)));
        assert!(core.ids.entities.label(Entity(5)).is_none());
    }

    #[test]
    fn test_load_rejects_duplicates() {
        let (mut core, _) = core(&ManagerConfig::sequential());
        let records = vec![EntityRecord::new(Entity(1)), EntityRecord::new(Entity(1))];
        let err = core.load(&mut VecEntityStream::from(records)).unwrap_err();
        assert!(matches!(err, ManagerError::DuplicateEntity(Entity(1))));
    }

    #[test]
    fn test_load_observes_ids_and_labels() {
        let (mut core, _) = core(&ManagerConfig::sequential());
        let records = vec![EntityRecord::new(Entity(40)).with_label("boss")];
        core.load(&mut VecEntityStream::from(records)).unwrap();
        assert_eq!(core.ids.entities.last_generated(), Entity(40));
        assert_eq!(core.ids.entities.label(Entity(40)).as_deref(), Some("boss"));
        assert_ne!(core.ids.entities.generate(), Entity(40));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (mut core, sink) = core(&ManagerConfig::sequential());
        core.add_pipeline(PipelineConfig::uninterval("sim")).unwrap();
        core.register("sim", incrementer("inc"), true).unwrap();
        core.shutdown();
        core.shutdown();
        let destroyed = sink
            .lines()
            .iter()
            .filter(|(_, line)| line.starts_with("systems destroyed"))
            .count();
        assert_eq!(destroyed, 1);
    }

    #[test]
    fn test_duplicate_pipeline_rejected() {
        let (mut core, _) = core(&ManagerConfig::sequential());
        core.add_pipeline(PipelineConfig::uninterval("sim")).unwrap();
        assert!(matches!(
            core.add_pipeline(PipelineConfig::uninterval("sim")),
            Err(RegistrationError::DuplicatePipeline(_))
        ));
    }
}
