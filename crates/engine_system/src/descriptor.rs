//! System descriptors.

use engine_component::{RequirementError, RequirementSpec};

/// Registration-time description of a system.
///
/// Built once, validated when the system is registered, and never changed
/// afterwards.
#[derive(Debug, Clone)]
pub struct SystemDescriptor {
    name: String,
    requirements: RequirementSpec,
    after: Vec<String>,
}

impl SystemDescriptor {
    /// Create a new descriptor with the given name and requirements.
    #[must_use]
    pub fn new(name: impl Into<String>, requirements: RequirementSpec) -> Self {
        Self {
            name: name.into(),
            requirements,
            after: Vec::new(),
        }
    }

    /// Orders this system after `system` in the same pipeline. The two never
    /// share a stage.
    #[must_use]
    pub fn after(mut self, system: impl Into<String>) -> Self {
        let system = system.into();
        if !self.after.contains(&system) {
            self.after.push(system);
        }
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn requirements(&self) -> &RequirementSpec {
        &self.requirements
    }

    /// Systems this one must run after.
    #[must_use]
    pub fn ordering(&self) -> &[String] {
        &self.after
    }

    /// Returns `true` if either descriptor orders itself after the other.
    #[must_use]
    pub fn is_ordered_with(&self, other: &SystemDescriptor) -> bool {
        self.after.iter().any(|n| *n == other.name) || other.after.iter().any(|n| *n == self.name)
    }

    pub fn validate(&self) -> Result<(), RequirementError> {
        self.requirements.validate()
    }
}
