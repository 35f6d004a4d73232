//! Requirement specs: what a system needs from an entity.
//!
//! A [`RequirementSpec`] declares, per component type, whether it must be
//! present, may be present, must be absent, or belongs to an any-of group,
//! together with the access mode. The manager uses specs to:
//!
//! 1. Select matching archetypes (see [`ArchetypeReflector`](crate::ArchetypeReflector)).
//! 2. Detect conflicts between systems for stage scheduling.
//! 3. Decide which component columns are gathered for direct systems.
//!
//! Specs are immutable once a system is registered.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::component::ComponentTypeId;
use crate::error::RequirementError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Access {
    Read,
    Write,
}

/// Identifies one any-of group inside a spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequirementKind {
    /// The type must be present.
    Required,
    /// The type may be present.
    Optional,
    /// The type must be absent.
    Subtractive,
    /// At least one member of the group must be present.
    AnyOf(GroupId),
}

/// One entry of a [`RequirementSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    pub type_id: ComponentTypeId,
    pub kind: RequirementKind,
    pub access: Access,
    /// Whether the component data is gathered for the system, or only its
    /// presence matters.
    pub payload: bool,
}

impl Requirement {
    #[must_use]
    pub const fn new(type_id: ComponentTypeId, kind: RequirementKind, access: Access, payload: bool) -> Self {
        Self { type_id, kind, access, payload }
    }
}

/// Declarative data requirements of a system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementSpec {
    entries: Vec<Requirement>,
    structural: Vec<ComponentTypeId>,
}

impl RequirementSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a raw requirement. Entries with the same type and kind fold into
    /// one, keeping the stronger access.
    #[must_use]
    pub fn require(mut self, requirement: Requirement) -> Self {
        let existing = self
            .entries
            .iter_mut()
            .find(|e| e.type_id == requirement.type_id && e.kind == requirement.kind);
        match existing {
            Some(entry) => {
                if requirement.access == Access::Write {
                    entry.access = Access::Write;
                }
                entry.payload |= requirement.payload;
            }
            None => self.entries.push(requirement),
        }
        self
    }

    /// Required, read-only, gathered.
    #[must_use]
    pub fn read(self, type_id: ComponentTypeId) -> Self {
        self.require(Requirement::new(type_id, RequirementKind::Required, Access::Read, true))
    }

    /// Required, mutable, gathered.
    #[must_use]
    pub fn write(self, type_id: ComponentTypeId) -> Self {
        self.require(Requirement::new(type_id, RequirementKind::Required, Access::Write, true))
    }

    /// Required, presence only.
    #[must_use]
    pub fn with(self, type_id: ComponentTypeId) -> Self {
        self.require(Requirement::new(type_id, RequirementKind::Required, Access::Read, false))
    }

    /// Optional, read-only, gathered where present.
    #[must_use]
    pub fn optional(self, type_id: ComponentTypeId) -> Self {
        self.require(Requirement::new(type_id, RequirementKind::Optional, Access::Read, true))
    }

    #[must_use]
    pub fn optional_write(self, type_id: ComponentTypeId) -> Self {
        self.require(Requirement::new(type_id, RequirementKind::Optional, Access::Write, true))
    }

    /// The type must be absent.
    #[must_use]
    pub fn without(self, type_id: ComponentTypeId) -> Self {
        self.require(Requirement::new(type_id, RequirementKind::Subtractive, Access::Read, false))
    }

    /// Member of any-of group `group`, read-only, gathered where present.
    #[must_use]
    pub fn any_of(self, group: GroupId, type_id: ComponentTypeId) -> Self {
        self.require(Requirement::new(type_id, RequirementKind::AnyOf(group), Access::Read, true))
    }

    #[must_use]
    pub fn any_of_write(self, group: GroupId, type_id: ComponentTypeId) -> Self {
        self.require(Requirement::new(type_id, RequirementKind::AnyOf(group), Access::Write, true))
    }

    /// Declares that the system may structurally add `type_id` to entities.
    #[must_use]
    pub fn adds(mut self, type_id: ComponentTypeId) -> Self {
        if !self.structural.contains(&type_id) {
            self.structural.push(type_id);
        }
        self
    }

    /// Declares that the system may structurally remove `type_id`.
    #[must_use]
    pub fn removes(self, type_id: ComponentTypeId) -> Self {
        self.adds(type_id)
    }

    #[must_use]
    pub fn entries(&self) -> &[Requirement] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.structural.is_empty()
    }

    pub fn required_types(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.of_kind(|k| k == RequirementKind::Required)
    }

    pub fn optional_types(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.of_kind(|k| k == RequirementKind::Optional)
    }

    pub fn subtractive_types(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.of_kind(|k| k == RequirementKind::Subtractive)
    }

    /// Any-of groups with their members.
    #[must_use]
    pub fn any_groups(&self) -> BTreeMap<GroupId, Vec<ComponentTypeId>> {
        let mut groups: BTreeMap<GroupId, Vec<ComponentTypeId>> = BTreeMap::new();
        for entry in &self.entries {
            if let RequirementKind::AnyOf(group) = entry.kind {
                groups.entry(group).or_default().push(entry.type_id);
            }
        }
        groups
    }

    /// Entries whose data is gathered for the system.
    pub fn payload_entries(&self) -> impl Iterator<Item = &Requirement> + '_ {
        self.entries
            .iter()
            .filter(|e| e.payload && e.kind != RequirementKind::Subtractive)
    }

    /// Types whose data or presence the system observes (everything except
    /// subtractive entries).
    pub fn accessed_types(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.of_kind(|k| k != RequirementKind::Subtractive)
    }

    /// Types the system mutates in place.
    pub fn written_types(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.entries
            .iter()
            .filter(|e| e.access == Access::Write && e.kind != RequirementKind::Subtractive)
            .map(|e| e.type_id)
    }

    /// Types the system may add or remove.
    #[must_use]
    pub fn structural_types(&self) -> &[ComponentTypeId] {
        &self.structural
    }

    /// Returns `true` if the requirements mention `type_id` in any way, subtractive
    /// entries included.
    #[must_use]
    pub fn depends_on(&self, type_id: ComponentTypeId) -> bool {
        self.entries.iter().any(|e| e.type_id == type_id)
    }

    #[must_use]
    pub fn accesses(&self, type_id: ComponentTypeId) -> bool {
        self.accessed_types().any(|t| t == type_id)
    }

    /// Checks that the requirements are not self-contradictory.
    pub fn validate(&self) -> Result<(), RequirementError> {
        for entry in &self.entries {
            let subtractive = entry.kind == RequirementKind::Subtractive;
            if subtractive && (entry.payload || entry.access == Access::Write) {
                return Err(RequirementError::SubtractivePayload(entry.type_id));
            }
        }

        for (i, a) in self.entries.iter().enumerate() {
            for b in &self.entries[i + 1..] {
                if a.type_id != b.type_id {
                    continue;
                }
                let t = a.type_id;
                match (a.kind, b.kind) {
                    (RequirementKind::Required, RequirementKind::Subtractive)
                    | (RequirementKind::Subtractive, RequirementKind::Required) => {
                        return Err(RequirementError::RequiredAndSubtractive(t));
                    }
                    (RequirementKind::Optional, RequirementKind::Subtractive)
                    | (RequirementKind::Subtractive, RequirementKind::Optional) => {
                        return Err(RequirementError::OptionalAndSubtractive(t));
                    }
                    (RequirementKind::AnyOf(_), RequirementKind::Subtractive)
                    | (RequirementKind::Subtractive, RequirementKind::AnyOf(_)) => {
                        return Err(RequirementError::AnyOfAndSubtractive(t));
                    }
                    (RequirementKind::Required, RequirementKind::Optional)
                    | (RequirementKind::Optional, RequirementKind::Required) => {
                        return Err(RequirementError::RequiredAndOptional(t));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Returns `true` if an archetype with the given member types satisfies
    /// this spec. Duplicate types in `types` count once.
    #[must_use]
    pub fn matches(&self, types: &[ComponentTypeId]) -> bool {
        if !self.required_types().all(|t| types.contains(&t)) {
            return false;
        }
        if self.subtractive_types().any(|t| types.contains(&t)) {
            return false;
        }
        self.any_groups()
            .values()
            .all(|members| members.iter().any(|t| types.contains(t)))
    }

    /// Checks whether this spec conflicts with another.
    ///
    /// Two specs conflict when one writes a type the other accesses, or when
    /// one may structurally add or remove a type the other depends on:
    ///
    /// ```text
    /// A.writes ∩ B.accessed ≠ ∅  OR  B.writes ∩ A.accessed ≠ ∅  OR
    /// A.structural ∩ B.depends ≠ ∅  OR  B.structural ∩ A.depends ≠ ∅
    /// ```
    #[must_use]
    pub fn conflicts_with(&self, other: &RequirementSpec) -> bool {
        if self.written_types().any(|w| other.accesses(w)) {
            return true;
        }
        if other.written_types().any(|w| self.accesses(w)) {
            return true;
        }
        self.structural.iter().any(|t| other.depends_on(*t))
            || other.structural.iter().any(|t| self.depends_on(*t))
    }

    fn of_kind(
        &self,
        pred: impl Fn(RequirementKind) -> bool + 'static,
    ) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.entries.iter().filter(move |e| pred(e.kind)).map(|e| e.type_id)
    }
}
