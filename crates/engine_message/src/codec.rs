//! MessagePack codec helpers and the encoded entity stream.
//!
//! [`encode`] / [`decode`] are thin wrappers around `rmp-serde`. The encoded
//! entity stream frames every record as a little-endian `u32` length followed
//! by a MessagePack body; components inside a record are encoded through
//! their [`ComponentMeta`](engine_component::ComponentMeta) and decoded with
//! a [`ComponentRegistry`].

use std::io::{self, Read, Write};

use engine_component::{ComponentId, ComponentRegistry, ComponentTypeId, Entity};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::entity_stream::{EntityRecord, EntitySink, EntityStream};
use crate::error::MessageError;
use crate::messages::ComponentEntry;

/// Default upper bound on a single frame body.
pub const DEFAULT_MAX_FRAME: usize = 64 * 1024 * 1024;

/// Encode a value to MessagePack bytes.
///
/// # Errors
///
/// Returns [`MessageError::Encode`] if serialisation fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, MessageError> {
    rmp_serde::to_vec(value).map_err(MessageError::Encode)
}

/// Decode a value from MessagePack bytes.
///
/// # Errors
///
/// Returns [`MessageError::Decode`] if deserialisation fails.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, MessageError> {
    rmp_serde::from_slice(bytes).map_err(MessageError::Decode)
}

#[derive(Debug, Serialize, Deserialize)]
enum Frame {
    Hint { total: u64 },
    Entity(WireRecord),
}

#[derive(Debug, Serialize, Deserialize)]
struct WireRecord {
    entity: Entity,
    label: Option<String>,
    components: Vec<WireComponent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireComponent {
    type_id: ComponentTypeId,
    component_id: Option<ComponentId>,
    data: Vec<u8>,
}

/// Writes entity records to any [`Write`] as length-prefixed frames.
#[derive(Debug)]
pub struct EncodedEntityWriter<W: Write> {
    inner: W,
    written: usize,
}

impl<W: Write> EncodedEntityWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Number of entity records written so far.
    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn flush(&mut self) -> Result<(), MessageError> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), MessageError> {
        let body = encode(frame)?;
        let len = u32::try_from(body.len()).map_err(|_| MessageError::FrameTooLarge(body.len()))?;
        self.inner.write_all(&len.to_le_bytes())?;
        self.inner.write_all(&body)?;
        Ok(())
    }
}

impl<W: Write> EntitySink for EncodedEntityWriter<W> {
    fn hint_total(&mut self, total: usize) -> Result<(), MessageError> {
        self.write_frame(&Frame::Hint { total: total as u64 })
    }

    fn add_entity(&mut self, record: EntityRecord) -> Result<(), MessageError> {
        let components = record
            .components
            .iter()
            .map(|c| {
                Ok(WireComponent {
                    type_id: c.type_id(),
                    component_id: c.component_id,
                    data: c.value.encode()?,
                })
            })
            .collect::<Result<Vec<_>, MessageError>>()?;

        self.write_frame(&Frame::Entity(WireRecord {
            entity: record.entity,
            label: record.label,
            components,
        }))?;
        self.written += 1;
        Ok(())
    }
}

/// Reads entity records written by [`EncodedEntityWriter`].
#[derive(Debug)]
pub struct EncodedEntityReader<'r, R: Read> {
    inner: R,
    registry: &'r ComponentRegistry,
    hint: Option<usize>,
    peeked: Option<EntityRecord>,
    max_frame: usize,
}

impl<'r, R: Read> EncodedEntityReader<'r, R> {
    /// Opens a stream, reading ahead one frame so an announced total is
    /// available from [`EntityStream::hint_total`] right away.
    pub fn new(inner: R, registry: &'r ComponentRegistry) -> Result<Self, MessageError> {
        Self::with_max_frame(inner, registry, DEFAULT_MAX_FRAME)
    }

    pub fn with_max_frame(inner: R, registry: &'r ComponentRegistry, max_frame: usize) -> Result<Self, MessageError> {
        let mut reader = Self { inner, registry, hint: None, peeked: None, max_frame };
        reader.peeked = reader.read_record()?;
        Ok(reader)
    }

    fn read_record(&mut self) -> Result<Option<EntityRecord>, MessageError> {
        loop {
            match self.read_frame()? {
                None => return Ok(None),
                Some(Frame::Hint { total }) => {
                    trace!(total, "entity stream announced its size");
                    self.hint = usize::try_from(total).ok();
                }
                Some(Frame::Entity(wire)) => return self.decode_record(wire).map(Some),
            }
        }
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, MessageError> {
        let mut header = [0u8; 4];
        let mut filled = 0;
        while filled < header.len() {
            match self.inner.read(&mut header[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        let len = u32::from_le_bytes(header) as usize;
        if len > self.max_frame {
            return Err(MessageError::FrameTooLarge(len));
        }
        let mut body = vec![0u8; len];
        self.inner.read_exact(&mut body)?;
        decode(&body).map(Some)
    }

    fn decode_record(&self, wire: WireRecord) -> Result<EntityRecord, MessageError> {
        let mut components = Vec::with_capacity(wire.components.len());
        for component in wire.components {
            let meta = self
                .registry
                .get(component.type_id)
                .ok_or(MessageError::UnknownComponentType(component.type_id))?;
            if meta.kind.is_non_unique() != component.component_id.is_some() {
                return Err(MessageError::ShapeMismatch(component.type_id));
            }
            let value = (meta.decode_fn)(&component.data)?;
            components.push(ComponentEntry { value, component_id: component.component_id });
        }
        Ok(EntityRecord { entity: wire.entity, label: wire.label, components })
    }
}

impl<R: Read> EntityStream for EncodedEntityReader<'_, R> {
    fn next_record(&mut self) -> Result<Option<EntityRecord>, MessageError> {
        if let Some(record) = self.peeked.take() {
            return Ok(Some(record));
        }
        self.read_record()
    }

    fn hint_total(&self) -> Option<usize> {
        self.hint
    }
}
