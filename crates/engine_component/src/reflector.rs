//! The archetype reflector.
//!
//! Keeps the library of every archetype observed so far (fingerprint to
//! member types) and a set of persistent queries. Each query's match set is
//! updated incrementally whenever a new archetype enters the library, so
//! asking for matches is a lookup rather than a scan.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::archetype::{Archetype, canonical_types};
use crate::component::ComponentTypeId;
use crate::error::ReflectError;
use crate::requirement::RequirementSpec;

/// Identifies a persistent query, usually one per registered system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(pub u64);

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Query({})", self.0)
    }
}

#[derive(Debug)]
struct TrackedQuery {
    spec: RequirementSpec,
    matches: BTreeSet<Archetype>,
}

#[derive(Debug, Default)]
pub struct ArchetypeReflector {
    library: HashMap<Archetype, Arc<[ComponentTypeId]>>,
    order: Vec<Archetype>,
    queries: HashMap<QueryId, TrackedQuery>,
}

impl ArchetypeReflector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the member types of `archetype`.
    ///
    /// Returns `true` if the archetype was new. Registering the same
    /// archetype with the same types again is a no-op.
    pub fn add_to_library<I>(&mut self, archetype: Archetype, member_types: I) -> Result<bool, ReflectError>
    where
        I: IntoIterator<Item = ComponentTypeId>,
    {
        let types = canonical_types(member_types);

        if let Some(registered) = self.library.get(&archetype) {
            if **registered != *types {
                return Err(ReflectError::ArchetypeMismatch {
                    archetype,
                    registered: registered.to_vec(),
                    requested: types,
                });
            }
            return Ok(false);
        }

        if Archetype::from_canonical(&types) != archetype {
            return Err(ReflectError::FingerprintMismatch { archetype, types });
        }

        for query in self.queries.values_mut() {
            if query.spec.matches(&types) {
                query.matches.insert(archetype);
            }
        }
        self.library.insert(archetype, types.into());
        self.order.push(archetype);
        Ok(true)
    }

    /// The sorted member types of `archetype`.
    pub fn reflect(&self, archetype: Archetype) -> Result<&[ComponentTypeId], ReflectError> {
        self.library
            .get(&archetype)
            .map(|types| &**types)
            .ok_or(ReflectError::UnknownArchetype(archetype))
    }

    #[must_use]
    pub fn contains(&self, archetype: Archetype) -> bool {
        self.library.contains_key(&archetype)
    }

    /// All known archetypes in the order they were first observed.
    pub fn archetypes(&self) -> impl Iterator<Item = Archetype> + '_ {
        self.order.iter().copied()
    }

    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.order.len()
    }

    /// Starts tracking a persistent query. Tracking an id again replaces its
    /// spec.
    pub fn start_tracking_matching_archetypes(&mut self, id: QueryId, spec: RequirementSpec) {
        let matches = self
            .order
            .iter()
            .filter(|a| self.library.get(a).is_some_and(|types| spec.matches(types)))
            .copied()
            .collect();
        self.queries.insert(id, TrackedQuery { spec, matches });
    }

    /// Drops a persistent query. Returns `false` if it was not tracked.
    pub fn stop_tracking(&mut self, id: QueryId) -> bool {
        self.queries.remove(&id).is_some()
    }

    /// Every registered archetype matching the query.
    pub fn find_matching_archetypes(&self, id: QueryId) -> Result<&BTreeSet<Archetype>, ReflectError> {
        self.queries
            .get(&id)
            .map(|q| &q.matches)
            .ok_or(ReflectError::UnknownQuery(id))
    }

    /// Returns `true` if `archetype` is known and satisfies the query.
    #[must_use]
    pub fn query_matches(&self, id: QueryId, archetype: Archetype) -> bool {
        self.queries.get(&id).is_some_and(|q| q.matches.contains(&archetype))
    }

    /// Stateless check of `spec` against a type list.
    #[must_use]
    pub fn matches(spec: &RequirementSpec, types: &[ComponentTypeId]) -> bool {
        spec.matches(types)
    }
}
