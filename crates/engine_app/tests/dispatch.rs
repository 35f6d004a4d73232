mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{Armor, Counter};
use engine_app::engine_component::{Component, Entity, IdGenerators, RequirementSpec};
use engine_app::engine_message::{EntityRecord, VecEntityStream};
use engine_app::engine_system::{DirectContext, FnDirectSystem, LogLevel, MemorySink, SystemDescriptor};
use engine_app::{ManagerConfig, ManagerError, ManagerState, PipelineConfig, PipelineState, SystemsManager};

const RUN_FOR: Duration = Duration::from_millis(400);
const PERIOD: Duration = Duration::from_millis(20);

fn threaded() -> SystemsManager {
    SystemsManager::with_context(
        ManagerConfig::default().with_worker_threads(2),
        Arc::new(IdGenerators::new()),
        Arc::new(MemorySink::default()),
    )
    .unwrap()
}

fn incrementer() -> FnDirectSystem<impl FnMut(&mut DirectContext) + Send> {
    FnDirectSystem::new(
        SystemDescriptor::new("increment", RequirementSpec::new().write(Counter::component_type_id())),
        |ctx: &mut DirectContext| {
            for chunk in ctx.chunks_mut() {
                for counter in chunk.write::<Counter>() {
                    counter.0 += 1;
                }
            }
        },
    )
}

fn counter_of(record: &EntityRecord) -> u64 {
    record.get::<Counter>().map_or(0, |c| c.0)
}

#[test]
fn test_interval_and_uninterval_tick_rates() {
    let manager = threaded();
    manager.add_pipeline(PipelineConfig::interval("fixed", PERIOD)).unwrap();
    manager.add_pipeline(PipelineConfig::uninterval("free")).unwrap();
    manager.start().unwrap();
    std::thread::sleep(RUN_FOR);
    manager.stop().unwrap();

    let expected = (manager.elapsed().as_secs_f64() / PERIOD.as_secs_f64()).floor() as u64;
    let fixed = manager.stats("fixed").unwrap().executed_ticks;
    let free = manager.stats("free").unwrap().executed_ticks;

    // Ticks land on whole periods from the first, so wake-up latency does
    // not add up over the run.
    assert!(fixed <= expected + 1, "fixed ticked {fixed} times, expected about {expected}");
    assert!(fixed + 1 >= expected, "fixed ticked {fixed} times, expected about {expected}");
    assert!(free > expected + 1, "free ticked {free} times, fixed bound is {expected}");
}

#[test]
fn test_pause_stream_out_resume() {
    let manager = threaded();
    manager.add_pipeline(PipelineConfig::uninterval("sim")).unwrap();
    manager.register_direct("sim", incrementer()).unwrap();

    let records: Vec<EntityRecord> = (1..=5)
        .map(|e| EntityRecord::new(Entity(e)).with_label(format!("entity-{e}")).with_component(Counter(0)))
        .collect();
    manager.load(&mut VecEntityStream::from(records)).unwrap();
    manager.start().unwrap();
    std::thread::sleep(Duration::from_millis(50));

    let mut refused = VecEntityStream::new();
    assert!(matches!(manager.stream_out(&mut refused), Err(ManagerError::NotPaused)));

    manager.pause_all(true).unwrap();
    assert_eq!(manager.pipeline_state("sim"), Some(PipelineState::Paused));
    let ticks = manager.stats("sim").unwrap().executed_ticks;

    let mut first = VecEntityStream::new();
    assert_eq!(manager.stream_out(&mut first).unwrap(), 5);
    let mut entities: Vec<Entity> = first.iter().map(|r| r.entity).collect();
    entities.sort();
    assert_eq!(entities, (1..=5).map(Entity).collect::<Vec<_>>(), "each entity exactly once");

    for record in first.iter() {
        let live = manager.entity(record.entity).unwrap();
        assert_eq!(counter_of(record), counter_of(&live), "latest value streamed");
        assert!(counter_of(record) > 0);
        assert_eq!(record.label.as_deref(), Some(format!("entity-{}", record.entity.0).as_str()));
    }
    // Every entity was loaded together, so all have seen the same ticks.
    let value = counter_of(first.iter().next().unwrap());
    assert!(first.iter().all(|r| counter_of(r) == value));
    assert_eq!(value, ticks - 1, "the loading tick did not increment");

    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(manager.stats("sim").unwrap().executed_ticks, ticks, "paused pipelines do not tick");
    let mut second = VecEntityStream::new();
    manager.stream_out(&mut second).unwrap();
    assert!(second.iter().zip(first.iter()).all(|(a, b)| counter_of(a) == counter_of(b)));

    manager.resume_all().unwrap();
    std::thread::sleep(Duration::from_millis(50));
    manager.pause_all(true).unwrap();
    let mut third = VecEntityStream::new();
    manager.stream_out(&mut third).unwrap();
    assert_eq!(third.len(), 5);
    assert!(third.iter().all(|r| counter_of(r) > value), "ticking resumed");

    manager.stop().unwrap();
    assert_eq!(manager.state(), ManagerState::Stopped);
    assert!(manager.last_error().is_none());
}

#[test]
fn test_stop_joins_dispatcher() {
    let manager = threaded();
    manager.add_pipeline(PipelineConfig::uninterval("sim")).unwrap();
    manager.start().unwrap();
    std::thread::sleep(Duration::from_millis(10));
    manager.stop().unwrap();
    let ticks = manager.stats("sim").unwrap().executed_ticks;
    std::thread::sleep(Duration::from_millis(10));
    assert_eq!(manager.stats("sim").unwrap().executed_ticks, ticks);
    assert!(matches!(manager.resume("sim"), Err(ManagerError::InvalidState { .. })));
}

#[test]
fn test_system_panic_stops_dispatcher() {
    let sink = Arc::new(MemorySink::default());
    let manager =
        SystemsManager::with_context(ManagerConfig::sequential(), Arc::new(IdGenerators::new()), sink.clone()).unwrap();
    manager.add_pipeline(PipelineConfig::uninterval("sim")).unwrap();
    let misread = FnDirectSystem::new(
        SystemDescriptor::new("misread", RequirementSpec::new().read(Counter::component_type_id())),
        |ctx: &mut DirectContext| {
            for chunk in ctx.chunks() {
                let _ = chunk.read::<Armor>();
            }
        },
    );
    manager.register_direct("sim", misread).unwrap();
    manager.load(&mut VecEntityStream::from(vec![EntityRecord::new(Entity(1)).with_component(Counter(0))])).unwrap();
    manager.start().unwrap();

    let give_up = Instant::now() + Duration::from_secs(5);
    while manager.state() == ManagerState::Started && Instant::now() < give_up {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(manager.state(), ManagerState::Stopped);
    assert!(manager.last_error().is_some_and(|msg| msg.contains("misread")));
    assert!(sink.contains(LogLevel::Error, "tick failed"));
    manager.stop().unwrap();
}
