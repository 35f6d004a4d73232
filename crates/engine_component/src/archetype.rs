//! Archetype fingerprints.
//!
//! An archetype is a unique combination of component types. Entities sharing
//! the same set of types share an [`Archetype`], no matter in which order the
//! types were attached or how many non-unique instances each one carries.
//! [`ArchetypeFull`] additionally keeps the exact instance ids.

use serde::{Deserialize, Serialize};

use crate::component::ComponentTypeId;
use crate::entity::ComponentId;

/// Canonical fingerprint of a set of component types.
///
/// Computed with FNV-1a 64 over the little-endian bytes of the sorted,
/// deduplicated type ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Archetype(pub u64);

impl Archetype {
    /// The archetype of an entity without components.
    pub const EMPTY: Archetype = Archetype(ComponentTypeId::FNV_OFFSET_BASIS);

    /// Fingerprint of an arbitrary (unsorted, possibly repeating) type list.
    #[must_use]
    pub fn from_types<I>(types: I) -> Self
    where
        I: IntoIterator<Item = ComponentTypeId>,
    {
        Self::from_canonical(&canonical_types(types))
    }

    /// Fingerprint of a list already in canonical form.
    #[must_use]
    pub fn from_canonical(types: &[ComponentTypeId]) -> Self {
        debug_assert!(types.windows(2).all(|w| w[0] < w[1]), "type list is not canonical");
        Self(fnv1a_words(ComponentTypeId::FNV_OFFSET_BASIS, types.iter().map(|t| t.0)))
    }
}

impl std::fmt::Display for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Archetype({:#018x})", self.0)
    }
}

/// Sorts and deduplicates a type list.
#[must_use]
pub fn canonical_types<I>(types: I) -> Vec<ComponentTypeId>
where
    I: IntoIterator<Item = ComponentTypeId>,
{
    let mut types: Vec<ComponentTypeId> = types.into_iter().collect();
    types.sort_unstable();
    types.dedup();
    types
}

fn fnv1a_words(mut hash: u64, words: impl Iterator<Item = u64>) -> u64 {
    for word in words {
        for byte in word.to_le_bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(ComponentTypeId::FNV_PRIME);
        }
    }
    hash
}

/// Instance-aware archetype: every component instance with its id.
///
/// Two entities compare equal only when they carry exactly the same
/// instances. Folds to a plain [`Archetype`] with [`ArchetypeFull::archetype`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchetypeFull {
    archetype: Archetype,
    instances: Vec<(ComponentTypeId, Option<ComponentId>)>,
}

impl ArchetypeFull {
    #[must_use]
    pub fn from_instances<I>(instances: I) -> Self
    where
        I: IntoIterator<Item = (ComponentTypeId, Option<ComponentId>)>,
    {
        let mut instances: Vec<_> = instances.into_iter().collect();
        instances.sort_unstable();
        instances.dedup();
        let archetype = Archetype::from_types(instances.iter().map(|(t, _)| *t));
        Self { archetype, instances }
    }

    /// The plain archetype, forgetting instance ids and counts.
    #[must_use]
    pub fn archetype(&self) -> Archetype {
        self.archetype
    }

    #[must_use]
    pub fn instances(&self) -> &[(ComponentTypeId, Option<ComponentId>)] {
        &self.instances
    }

    /// Number of instances of `type_id`.
    #[must_use]
    pub fn instance_count(&self, type_id: ComponentTypeId) -> usize {
        self.instances.iter().filter(|(t, _)| *t == type_id).count()
    }

    /// A 64-bit fingerprint over every instance.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let words = self
            .instances
            .iter()
            .flat_map(|(t, id)| [t.0, id.map_or(0, |id| id.0)]);
        fnv1a_words(ComponentTypeId::FNV_OFFSET_BASIS, words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POSITION: ComponentTypeId = ComponentTypeId::from_name("Position");
    const VELOCITY: ComponentTypeId = ComponentTypeId::from_name("Velocity");
    const ITEM: ComponentTypeId = ComponentTypeId::from_name("Item");

    #[test]
    fn test_archetype_is_order_independent() {
        let a = Archetype::from_types([POSITION, VELOCITY, ITEM]);
        let b = Archetype::from_types([ITEM, POSITION, VELOCITY]);
        let c = Archetype::from_types([VELOCITY, ITEM, POSITION]);
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_archetype_ignores_duplicates() {
        let a = Archetype::from_types([POSITION, ITEM, ITEM, ITEM]);
        let b = Archetype::from_types([ITEM, POSITION]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_archetype_differs_for_different_sets() {
        let a = Archetype::from_types([POSITION, VELOCITY]);
        let b = Archetype::from_types([POSITION]);
        let c = Archetype::from_types([POSITION, ITEM]);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_empty_archetype() {
        assert_eq!(Archetype::from_types([]), Archetype::EMPTY);
    }

    #[test]
    fn test_full_archetype_distinguishes_instance_counts() {
        let two = ArchetypeFull::from_instances([
            (POSITION, None),
            (ITEM, Some(ComponentId(1))),
            (ITEM, Some(ComponentId(2))),
        ]);
        let three = ArchetypeFull::from_instances([
            (ITEM, Some(ComponentId(3))),
            (POSITION, None),
            (ITEM, Some(ComponentId(1))),
            (ITEM, Some(ComponentId(2))),
        ]);
        assert_ne!(two, three);
        assert_ne!(two.fingerprint(), three.fingerprint());
        assert_eq!(two.archetype(), three.archetype());
        assert_eq!(three.instance_count(ITEM), 3);
    }

    #[test]
    fn test_full_archetype_is_order_independent() {
        let a = ArchetypeFull::from_instances([(ITEM, Some(ComponentId(2))), (ITEM, Some(ComponentId(1)))]);
        let b = ArchetypeFull::from_instances([(ITEM, Some(ComponentId(1))), (ITEM, Some(ComponentId(2)))]);
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
