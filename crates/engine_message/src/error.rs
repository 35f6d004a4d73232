//! Message-layer error types.

use engine_component::ComponentTypeId;

/// Errors that can occur while encoding or decoding entity streams.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// Failed to encode a value to MessagePack.
    #[error("failed to encode: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Failed to decode a value from MessagePack.
    #[error("failed to decode: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// Reading or writing the underlying stream failed.
    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An encoded component has no entry in the component registry.
    #[error("no registered component for {0}")]
    UnknownComponentType(ComponentTypeId),

    /// An encoded component's instance id does not fit its kind.
    #[error("component {0} has the wrong shape for its kind")]
    ShapeMismatch(ComponentTypeId),

    /// A frame header announced more bytes than the reader accepts.
    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),
}
