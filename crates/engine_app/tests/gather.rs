mod common;

use std::sync::Arc;

use common::{Armor, Counter, Frozen, Item, manual};
use engine_app::engine_component::{Component, ComponentId, Entity, GroupId, RequirementSpec};
use engine_app::engine_message::{EntityRecord, VecEntityStream};
use engine_app::engine_system::{DirectContext, FnDirectSystem, SystemDescriptor};
use engine_app::{PipelineConfig, SystemsManager};
use parking_lot::Mutex;

/// Owned copy of one gathered chunk.
#[derive(Debug, Default)]
struct Snapshot {
    entities: Vec<Entity>,
    counters: Option<Vec<Counter>>,
    armor: Option<Vec<Armor>>,
    items: Option<Vec<Item>>,
    strides: Option<Vec<usize>>,
    item_ids: Option<Vec<ComponentId>>,
}

/// Registers a direct system that keeps a snapshot of the chunks it was
/// given on its latest tick.
fn capture(manager: &SystemsManager, name: &str, spec: RequirementSpec) -> Arc<Mutex<Vec<Snapshot>>> {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();
    let system = FnDirectSystem::new(SystemDescriptor::new(name, spec), move |ctx: &mut DirectContext| {
        let mut sink = sink.lock();
        sink.clear();
        for chunk in ctx.chunks() {
            sink.push(Snapshot {
                entities: chunk.entities().to_vec(),
                counters: chunk.try_read::<Counter>().map(<[Counter]>::to_vec),
                armor: chunk.try_read::<Armor>().map(<[Armor]>::to_vec),
                items: chunk.try_read::<Item>().map(<[Item]>::to_vec),
                strides: chunk.strides::<Item>().map(<[usize]>::to_vec),
                item_ids: chunk.component_ids::<Item>().map(<[ComponentId]>::to_vec),
            });
        }
    });
    manager.register_direct("sim", system).unwrap();
    captured
}

fn load(manager: &SystemsManager, records: Vec<EntityRecord>) {
    manager.load(&mut VecEntityStream::from(records)).unwrap();
}

#[test]
fn test_non_unique_gather_is_flat_with_strides() {
    const ENTITIES: u64 = 4;
    const PER_ENTITY: u64 = 3;

    let (manager, _) = manual();
    manager.add_pipeline(PipelineConfig::uninterval("sim")).unwrap();
    let captured = capture(&manager, "inventory", RequirementSpec::new().read(Item::component_type_id()));

    let records = (1..=ENTITIES)
        .map(|e| {
            (0..PER_ENTITY).fold(EntityRecord::new(Entity(e)), |record, i| {
                let n = e * 10 + i;
                record.with_instance(Item(n as u32), ComponentId(n))
            })
        })
        .collect();
    load(&manager, records);
    manager.start().unwrap();
    manager.tick_pipeline("sim").unwrap();
    manager.tick_pipeline("sim").unwrap();

    let captured = captured.lock();
    assert_eq!(captured.len(), 1, "one archetype");
    let chunk = &captured[0];
    let items = chunk.items.as_ref().unwrap();
    let ids = chunk.item_ids.as_ref().unwrap();
    assert_eq!(chunk.entities.len(), ENTITIES as usize);
    assert_eq!(items.len(), (ENTITIES * PER_ENTITY) as usize);
    assert_eq!(ids.len(), items.len());
    assert_eq!(chunk.strides.as_deref(), Some(&[PER_ENTITY as usize; ENTITIES as usize][..]));

    // Instances of one entity are contiguous, in entity order.
    for (row, entity) in chunk.entities.iter().enumerate() {
        let span = row * PER_ENTITY as usize..(row + 1) * PER_ENTITY as usize;
        for (item, id) in items[span.clone()].iter().zip(&ids[span]) {
            assert_eq!(u64::from(item.0), id.0);
            assert_eq!(u64::from(item.0) / 10, entity.0);
        }
    }
}

#[test]
fn test_instance_counts_do_not_split_archetypes() {
    let (manager, _) = manual();
    manager.add_pipeline(PipelineConfig::uninterval("sim")).unwrap();
    let captured = capture(&manager, "inventory", RequirementSpec::new().read(Item::component_type_id()));

    load(
        &manager,
        vec![
            EntityRecord::new(Entity(1)).with_instance(Item(1), ComponentId(1)),
            EntityRecord::new(Entity(2))
                .with_instance(Item(2), ComponentId(2))
                .with_instance(Item(3), ComponentId(3))
                .with_instance(Item(4), ComponentId(4)),
        ],
    );
    manager.start().unwrap();
    manager.tick_pipeline("sim").unwrap();
    manager.tick_pipeline("sim").unwrap();

    let captured = captured.lock();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].strides, Some(vec![1, 3]));
    assert_eq!(captured[0].items, Some(vec![Item(1), Item(2), Item(3), Item(4)]));
}

#[test]
fn test_instance_writes_are_scattered_back() {
    let (manager, _) = manual();
    manager.add_pipeline(PipelineConfig::uninterval("sim")).unwrap();
    let doubler = FnDirectSystem::new(
        SystemDescriptor::new("doubler", RequirementSpec::new().write(Item::component_type_id())),
        |ctx: &mut DirectContext| {
            for chunk in ctx.chunks_mut() {
                for item in chunk.write::<Item>() {
                    item.0 *= 2;
                }
            }
        },
    );
    manager.register_direct("sim", doubler).unwrap();
    load(
        &manager,
        vec![
            EntityRecord::new(Entity(1))
                .with_instance(Item(1), ComponentId(1))
                .with_instance(Item(5), ComponentId(2)),
        ],
    );
    manager.start().unwrap();
    manager.tick_pipeline("sim").unwrap();
    manager.tick_pipeline("sim").unwrap();

    let record = manager.entity(Entity(1)).unwrap();
    let items: Vec<(u32, Option<ComponentId>)> = record
        .components
        .iter()
        .filter_map(|c| c.value.downcast_ref::<Item>().map(|item| (item.0, c.component_id)))
        .collect();
    assert_eq!(items, vec![(2, Some(ComponentId(1))), (10, Some(ComponentId(2)))]);
}

#[test]
fn test_optional_subtractive_and_any_of() {
    let (manager, _) = manual();
    manager.add_pipeline(PipelineConfig::uninterval("sim")).unwrap();
    let optional = capture(
        &manager,
        "optional",
        RequirementSpec::new()
            .read(Counter::component_type_id())
            .optional(Armor::component_type_id())
            .without(Frozen::component_type_id()),
    );
    let any = capture(
        &manager,
        "any",
        RequirementSpec::new()
            .any_of(GroupId(0), Armor::component_type_id())
            .any_of(GroupId(0), Frozen::component_type_id()),
    );

    load(
        &manager,
        vec![
            EntityRecord::new(Entity(1)).with_component(Counter(1)),
            EntityRecord::new(Entity(2)).with_component(Counter(2)).with_component(Armor(9)),
            EntityRecord::new(Entity(3)).with_component(Counter(3)).with_component(Frozen),
        ],
    );
    manager.start().unwrap();
    manager.tick_pipeline("sim").unwrap();
    manager.tick_pipeline("sim").unwrap();

    let optional = optional.lock();
    let mut seen: Vec<Entity> = optional.iter().flat_map(|c| c.entities.iter().copied()).collect();
    seen.sort();
    assert_eq!(seen, vec![Entity(1), Entity(2)]);
    for chunk in optional.iter() {
        assert_eq!(chunk.counters.as_ref().map(Vec::len), Some(1));
        if chunk.entities == vec![Entity(2)] {
            assert_eq!(chunk.armor, Some(vec![Armor(9)]));
        } else {
            assert!(chunk.armor.is_none());
        }
    }

    let any = any.lock();
    let mut seen: Vec<Entity> = any.iter().flat_map(|c| c.entities.iter().copied()).collect();
    seen.sort();
    assert_eq!(seen, vec![Entity(2), Entity(3)]);
}
