//! Per-system message filtering for indirect systems.
//!
//! Each indirect system remembers which entities it currently knows. After a
//! tick is applied, [`Delivery::filter`] cuts the merged messages down to
//! what that system may see and queues them until its pipeline next ticks.

use std::collections::{HashSet, VecDeque};

use engine_component::{ArchetypeReflector, Entity, QueryId, RequirementSpec};
use engine_message::{EntityRemoval, Message, TickMessages};

use crate::world::World;

#[derive(Debug, Default)]
pub(crate) struct Delivery {
    /// Entities this system has been told about and not yet told to forget.
    pub known: HashSet<Entity>,
    /// Filtered batches waiting for the system's pipeline to tick.
    pub inbox: VecDeque<TickMessages>,
    /// Set after a load: every matching entity is registered on the next
    /// delivery.
    pub needs_catch_up: bool,
}

impl Delivery {
    /// Builds this system's view of one applied tick.
    ///
    /// `world` must already reflect `merged`.
    pub fn filter(
        &mut self,
        merged: &TickMessages,
        spec: &RequirementSpec,
        query: QueryId,
        world: &World,
        reflector: &ArchetypeReflector,
    ) -> TickMessages {
        let mut out = TickMessages::new();

        for state in merged.entity_added() {
            if reflector.query_matches(query, state.archetype) && self.known.insert(state.entity) {
                out.push(Message::EntityAdded(state.clone()));
            }
        }

        for update in merged.component_added() {
            if self.known.contains(&update.entity) && spec.accesses(update.type_id()) {
                out.push(Message::ComponentAdded(update.clone()));
            }
        }

        for update in merged.component_changed() {
            if self.known.contains(&update.entity) && spec.accesses(update.type_id()) {
                out.push(Message::ComponentChanged(update.clone()));
            }
        }

        for removal in merged.component_removed() {
            if self.known.contains(&removal.entity) && spec.accesses(removal.type_id) {
                out.push(Message::ComponentRemoved(*removal));
            }
        }

        for removal in merged.entity_removed() {
            if self.known.remove(&removal.entity) {
                out.push(Message::EntityRemoved(*removal));
            }
        }

        if std::mem::take(&mut self.needs_catch_up)
            && let Ok(archetypes) = reflector.find_matching_archetypes(query)
        {
            for entity in world.entities_in(archetypes) {
                if !self.known.contains(&entity)
                    && let Some(state) = world.entity_state(entity)
                {
                    self.known.insert(entity);
                    out.push(Message::RegisterEntity(state));
                }
            }
        }

        // Entities that gained or lost components may have entered or left
        // the match set.
        for entity in merged.reshaped_entities() {
            let current = world.archetype_of(entity);
            let matches = current.is_some_and(|archetype| reflector.query_matches(query, archetype));
            let known = self.known.contains(&entity);
            if matches && !known {
                if let Some(state) = world.entity_state(entity) {
                    self.known.insert(entity);
                    out.push(Message::RegisterEntity(state));
                }
            } else if !matches && known {
                self.known.remove(&entity);
                out.push(Message::UnregisterEntity(EntityRemoval { entity, archetype: current }));
            }
        }

        out
    }

    /// Messages telling the system to forget everything it knows, in entity
    /// order.
    pub fn forget_all(&mut self) -> TickMessages {
        let mut known: Vec<Entity> = self.known.drain().collect();
        known.sort_unstable();
        let mut out = TickMessages::new();
        for entity in known {
            out.push(Message::UnregisterEntity(EntityRemoval { entity, archetype: None }));
        }
        out
    }
}
