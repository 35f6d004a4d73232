//! System registry: tracks registered systems, their pipelines and their
//! per-system delivery state.
//!
//! Systems are keyed by [`SystemHandle`]. Handles are issued in registration
//! order and never reused, so iterating the registry visits systems in the
//! order they were registered.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use engine_component::QueryId;
use engine_system::{DirectSystem, IndirectSystem, InputHandler, SystemDescriptor, SystemEnv};

use crate::delivery::Delivery;
use crate::error::RegistrationError;

/// Identifies one registered system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemHandle(pub u64);

impl SystemHandle {
    /// The reflector query tracking this system's match set.
    #[must_use]
    pub fn query_id(self) -> QueryId {
        QueryId(self.0)
    }
}

impl fmt::Display for SystemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "System#{}", self.0)
    }
}

pub(crate) enum SystemBody {
    Direct(Box<dyn DirectSystem>),
    Indirect(Box<dyn IndirectSystem>),
}

impl SystemBody {
    pub(crate) fn descriptor(&self) -> SystemDescriptor {
        match self {
            Self::Direct(system) => system.descriptor(),
            Self::Indirect(system) => system.descriptor(),
        }
    }

    pub(crate) fn on_create(&mut self, env: &mut SystemEnv) {
        match self {
            Self::Direct(system) => system.on_create(env),
            Self::Indirect(system) => system.on_create(env),
        }
    }

    pub(crate) fn on_destroy(&mut self, env: &mut SystemEnv) {
        match self {
            Self::Direct(system) => system.on_destroy(env),
            Self::Indirect(system) => system.on_destroy(env),
        }
    }

    pub(crate) fn input_handler(&mut self) -> Option<&mut dyn InputHandler> {
        match self {
            Self::Direct(system) => system.input_handler(),
            Self::Indirect(system) => system.input_handler(),
        }
    }

    fn flavour(&self) -> &'static str {
        match self {
            Self::Direct(_) => "direct",
            Self::Indirect(_) => "indirect",
        }
    }
}

/// One registered system.
pub(crate) struct SystemEntry {
    pub handle: SystemHandle,
    /// Index into the manager's pipeline list.
    pub pipeline: usize,
    pub descriptor: SystemDescriptor,
    /// `None` while the body is lent out to a running job.
    pub body: Option<SystemBody>,
    /// Set once `on_create` has run.
    pub created: bool,
    /// Present for indirect systems only.
    pub delivery: Option<Delivery>,
}

impl fmt::Debug for SystemEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemEntry")
            .field("handle", &self.handle)
            .field("name", &self.descriptor.name())
            .field("pipeline", &self.pipeline)
            .field("flavour", &self.body.as_ref().map(SystemBody::flavour))
            .field("created", &self.created)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub(crate) struct SystemRegistry {
    entries: BTreeMap<SystemHandle, SystemEntry>,
    names: HashMap<String, SystemHandle>,
    last_handle: u64,
}

impl SystemRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `body` into pipeline `pipeline` (named `pipeline_name` in
    /// errors).
    ///
    /// The descriptor is validated, its name must be unique, and every
    /// system it must run after has to be registered in the same pipeline
    /// already.
    pub fn register(
        &mut self,
        pipeline: usize,
        pipeline_name: &str,
        body: SystemBody,
    ) -> Result<SystemHandle, RegistrationError> {
        let descriptor = body.descriptor();
        descriptor
            .validate()
            .map_err(|source| RegistrationError::InvalidRequirements {
                name: descriptor.name().to_string(),
                source,
            })?;

        if self.names.contains_key(descriptor.name()) {
            return Err(RegistrationError::DuplicateName(descriptor.name().to_string()));
        }

        for target in descriptor.ordering() {
            let same_pipeline = self
                .names
                .get(target)
                .and_then(|handle| self.entries.get(handle))
                .is_some_and(|entry| entry.pipeline == pipeline);
            if !same_pipeline {
                return Err(RegistrationError::UnknownOrderingTarget {
                    system: descriptor.name().to_string(),
                    target: target.clone(),
                    pipeline: pipeline_name.to_string(),
                });
            }
        }

        self.last_handle += 1;
        let handle = SystemHandle(self.last_handle);
        // A late indirect system learns about existing entities on the next
        // delivery.
        let delivery = matches!(body, SystemBody::Indirect(_))
            .then(|| Delivery { needs_catch_up: true, ..Delivery::default() });
        self.names.insert(descriptor.name().to_string(), handle);
        self.entries.insert(
            handle,
            SystemEntry { handle, pipeline, descriptor, body: Some(body), created: false, delivery },
        );
        Ok(handle)
    }

    /// Removes a system, returning its entry.
    pub fn unregister(&mut self, handle: SystemHandle) -> Option<SystemEntry> {
        let entry = self.entries.remove(&handle)?;
        self.names.remove(entry.descriptor.name());
        Some(entry)
    }

    #[must_use]
    pub fn get(&self, handle: SystemHandle) -> Option<&SystemEntry> {
        self.entries.get(&handle)
    }

    pub fn get_mut(&mut self, handle: SystemHandle) -> Option<&mut SystemEntry> {
        self.entries.get_mut(&handle)
    }

    #[must_use]
    pub fn handle_of(&self, name: &str) -> Option<SystemHandle> {
        self.names.get(name).copied()
    }

    /// Systems in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &SystemEntry> {
        self.entries.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SystemEntry> {
        self.entries.values_mut()
    }

    pub fn handles(&self) -> Vec<SystemHandle> {
        self.entries.keys().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use engine_component::{ComponentTypeId, RequirementError, RequirementSpec};
    use engine_message::TickMessages;
    use engine_system::{DirectContext, FnDirectSystem};

    use super::*;

    struct Listener(SystemDescriptor);

    impl IndirectSystem for Listener {
        fn descriptor(&self) -> SystemDescriptor {
            self.0.clone()
        }

        fn on_messages(&mut self, _messages: &TickMessages, _env: &mut SystemEnv) {}
    }

    fn direct(descriptor: SystemDescriptor) -> SystemBody {
        SystemBody::Direct(Box::new(FnDirectSystem::new(descriptor, |_ctx: &mut DirectContext| {})))
    }

    fn named(name: &str) -> SystemDescriptor {
        SystemDescriptor::new(name, RequirementSpec::new().read(ComponentTypeId(1)))
    }

    #[test]
    fn test_register_new_system() {
        let mut registry = SystemRegistry::new();
        let handle = registry.register(0, "sim", direct(named("physics"))).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.handle_of("physics"), Some(handle));
        let entry = registry.get(handle).unwrap();
        assert!(!entry.created);
        assert!(entry.delivery.is_none());
    }

    #[test]
    fn test_indirect_systems_get_delivery_state() {
        let mut registry = SystemRegistry::new();
        let handle = registry
            .register(0, "sim", SystemBody::Indirect(Box::new(Listener(named("census")))))
            .unwrap();
        let delivery = registry.get(handle).unwrap().delivery.as_ref().unwrap();
        assert!(delivery.needs_catch_up);
    }

    #[test]
    fn test_handles_follow_registration_order() {
        let mut registry = SystemRegistry::new();
        let a = registry.register(0, "sim", direct(named("a"))).unwrap();
        let b = registry.register(1, "ui", direct(named("b"))).unwrap();
        assert!(a < b);
        let names: Vec<&str> = registry.iter().map(|e| e.descriptor.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = SystemRegistry::new();
        registry.register(0, "sim", direct(named("physics"))).unwrap();
        let err = registry.register(1, "ui", direct(named("physics"))).unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateName(name) if name == "physics"));
    }

    #[test]
    fn test_contradictory_requirements_rejected() {
        let mut registry = SystemRegistry::new();
        let spec = RequirementSpec::new().read(ComponentTypeId(1)).without(ComponentTypeId(1));
        let err = registry.register(0, "sim", direct(SystemDescriptor::new("bad", spec))).unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::InvalidRequirements { source: RequirementError::RequiredAndSubtractive(_), .. }
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ordering_target_must_share_pipeline() {
        let mut registry = SystemRegistry::new();
        registry.register(0, "sim", direct(named("physics"))).unwrap();

        let err = registry
            .register(1, "ui", direct(named("render").after("physics")))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::UnknownOrderingTarget { ref pipeline, .. } if pipeline == "ui"));

        let err = registry
            .register(0, "sim", direct(named("late").after("missing")))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::UnknownOrderingTarget { .. }));

        registry.register(0, "sim", direct(named("collide").after("physics"))).unwrap();
    }

    #[test]
    fn test_unregister_frees_name() {
        let mut registry = SystemRegistry::new();
        let handle = registry.register(0, "sim", direct(named("physics"))).unwrap();
        let entry = registry.unregister(handle).unwrap();
        assert_eq!(entry.descriptor.name(), "physics");
        assert!(registry.unregister(handle).is_none());

        let again = registry.register(0, "sim", direct(named("physics"))).unwrap();
        assert_ne!(again, handle);
    }
}
