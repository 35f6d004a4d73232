//! Core [`Component`] trait, type-erased values and the component registry.
//!
//! Every piece of data attached to an entity implements [`Component`]. Inside
//! the runtime, component data travels as [`ComponentValue`]: a cheaply
//! clonable, shared, type-erased payload that remembers its
//! [`ComponentTypeId`] so typed access can be checked.
//!
//! ## Type Identity
//!
//! [`ComponentTypeId`] is derived from the component's **string name** using
//! the FNV-1a 64-bit hash algorithm. This is deterministic and
//! language-neutral, so encoded entity streams stay readable across builds.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A unique identifier for a component type, derived from its string name
/// using the FNV-1a 64-bit hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    /// FNV-1a 64-bit offset basis.
    pub(crate) const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    pub(crate) const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the [`ComponentTypeId`] from a component's string name.
    ///
    /// # Algorithm (FNV-1a 64-bit)
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325          (offset basis)
    /// for each byte in name.as_bytes():
    ///     hash = hash XOR byte
    ///     hash = hash * 0x00000100000001b3  (prime)
    /// return hash
    /// ```
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Compute the [`ComponentTypeId`] for a Rust component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::from_name(T::type_name())
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentType({:#018x})", self.0)
    }
}

/// The shape of a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    /// At most one instance per entity.
    Unique,
    /// Zero-size marker, at most one per entity.
    Tag,
    /// Any number of instances per entity, each with its own
    /// [`ComponentId`](crate::ComponentId).
    NonUnique,
}

impl ComponentKind {
    /// Returns `true` for [`ComponentKind::NonUnique`].
    #[must_use]
    pub const fn is_non_unique(self) -> bool {
        matches!(self, Self::NonUnique)
    }
}

/// Metadata about a component type, used for type-erased storage and codecs.
///
/// All behaviour is captured as plain function pointers so a meta can be
/// cloned freely and shared between threads.
#[derive(Clone)]
pub struct ComponentMeta {
    /// The unique type identifier.
    pub type_id: ComponentTypeId,
    /// The human-readable name of the component (e.g. `"Transform3D"`).
    pub name: &'static str,
    /// Shape of the component.
    pub kind: ComponentKind,
    /// Serialise a single value to MessagePack bytes.
    pub encode_fn: fn(&ComponentValue) -> Result<Vec<u8>, rmp_serde::encode::Error>,
    /// Deserialise a single value from MessagePack bytes.
    pub decode_fn: fn(&[u8]) -> Result<ComponentValue, rmp_serde::decode::Error>,
    /// Pack a slice of values into a boxed `Vec<T>`.
    pub gather_fn: fn(&[ComponentValue]) -> Box<dyn Any + Send>,
    /// Unpack a boxed `Vec<T>` produced by `gather_fn` back into values.
    pub scatter_fn: fn(Box<dyn Any + Send>) -> Vec<ComponentValue>,
}

impl fmt::Debug for ComponentMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentMeta")
            .field("type_id", &self.type_id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// The core component trait.
///
/// Components must be clonable (values are copied into packed arrays for
/// direct systems), serialisable (entity streams) and `Send + Sync` (systems
/// run on a worker pool).
///
/// # Examples
///
/// ```rust
/// use serde::{Serialize, Deserialize};
/// use engine_component::Component;
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     fn type_name() -> &'static str { "Health" }
/// }
/// ```
pub trait Component: Clone + Send + Sync + 'static + Serialize + DeserializeOwned {
    /// A human-readable name for this component type.
    fn type_name() -> &'static str;

    /// The shape of this component. Defaults to [`ComponentKind::Unique`].
    fn kind() -> ComponentKind {
        ComponentKind::Unique
    }

    /// Returns the [`ComponentTypeId`] for this component.
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }

    /// Returns the [`ComponentMeta`] descriptor for this component type.
    fn meta() -> ComponentMeta {
        ComponentMeta {
            type_id: Self::component_type_id(),
            name: Self::type_name(),
            kind: Self::kind(),
            encode_fn: |value: &ComponentValue| rmp_serde::to_vec_named(value.get::<Self>()),
            decode_fn: |bytes: &[u8]| {
                let value: Self = rmp_serde::from_slice(bytes)?;
                Ok(ComponentValue::new(value))
            },
            gather_fn: |values: &[ComponentValue]| -> Box<dyn Any + Send> {
                let packed: Vec<Self> = values.iter().map(|v| v.get::<Self>().clone()).collect();
                Box::new(packed)
            },
            scatter_fn: |data: Box<dyn Any + Send>| match data.downcast::<Vec<Self>>() {
                Ok(values) => {
                    let values: Vec<Self> = *values;
                    values.into_iter().map(ComponentValue::new).collect()
                }
                Err(_) => panic!("scatter of `{}` received a foreign column", Self::type_name()),
            },
        }
    }
}

/// A type-erased, shared component payload.
///
/// Cloning a value clones a reference, not the component.
#[derive(Clone)]
pub struct ComponentValue {
    type_id: ComponentTypeId,
    name: &'static str,
    kind: ComponentKind,
    meta_fn: fn() -> ComponentMeta,
    data: Arc<dyn Any + Send + Sync>,
}

impl ComponentValue {
    /// Wraps a typed component.
    pub fn new<T: Component>(value: T) -> Self {
        debug_assert!(
            T::kind() != ComponentKind::Tag || std::mem::size_of::<T>() == 0,
            "tag component `{}` must be zero-sized",
            T::type_name()
        );
        Self {
            type_id: T::component_type_id(),
            name: T::type_name(),
            kind: T::kind(),
            meta_fn: T::meta,
            data: Arc::new(value),
        }
    }

    #[must_use]
    pub fn component_type(&self) -> ComponentTypeId {
        self.type_id
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// The full metadata of the wrapped type.
    #[must_use]
    pub fn meta(&self) -> ComponentMeta {
        (self.meta_fn)()
    }

    /// Returns `true` if the wrapped value is a `T`.
    #[must_use]
    pub fn is<T: Component>(&self) -> bool {
        self.type_id == T::component_type_id() && self.data.is::<T>()
    }

    /// Typed access, `None` when the value holds another type.
    #[must_use]
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        if self.type_id != T::component_type_id() {
            return None;
        }
        (*self.data).downcast_ref::<T>()
    }

    /// Typed access.
    ///
    /// # Panics
    ///
    /// Panics if the value is not a `T`. Decoding a component as the wrong
    /// type is a programming error.
    #[must_use]
    pub fn get<T: Component>(&self) -> &T {
        match self.downcast_ref::<T>() {
            Some(value) => value,
            None => panic!(
                "component value of type `{}` accessed as `{}`",
                self.name,
                T::type_name()
            ),
        }
    }

    /// MessagePack encoding of the wrapped value.
    pub fn encode(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        (self.meta().encode_fn)(self)
    }
}

impl fmt::Debug for ComponentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentValue")
            .field("type", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// An explicit table of component metadata, keyed by type id.
///
/// Needed wherever components arrive as bytes and must be decoded without a
/// static type at hand, such as encoded entity streams.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    metas: HashMap<ComponentTypeId, ComponentMeta>,
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T`, returning its type id. Registering twice is a no-op.
    pub fn register<T: Component>(&mut self) -> ComponentTypeId {
        self.register_meta(T::meta())
    }

    /// Registers a meta directly.
    ///
    /// # Panics
    ///
    /// Panics if a different component name already hashed to the same id.
    pub fn register_meta(&mut self, meta: ComponentMeta) -> ComponentTypeId {
        let type_id = meta.type_id;
        if let Some(existing) = self.metas.get(&type_id) {
            assert_eq!(
                existing.name, meta.name,
                "component type id collision between `{}` and `{}`",
                existing.name, meta.name
            );
            return type_id;
        }
        self.metas.insert(type_id, meta);
        type_id
    }

    #[must_use]
    pub fn get(&self, type_id: ComponentTypeId) -> Option<&ComponentMeta> {
        self.metas.get(&type_id)
    }

    #[must_use]
    pub fn kind_of(&self, type_id: ComponentTypeId) -> Option<ComponentKind> {
        self.metas.get(&type_id).map(|m| m.kind)
    }

    #[must_use]
    pub fn contains(&self, type_id: ComponentTypeId) -> bool {
        self.metas.contains_key(&type_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.metas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }
}
