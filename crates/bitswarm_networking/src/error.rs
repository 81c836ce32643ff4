//! # Networking Errors
//!
//! Schema construction faults, value/schema mismatches, and session faults.
//!
//! Session faults raised while handling a received frame never leave the
//! frame: they are logged and the frame is dropped.

use bitswarm_core::CodecError;
use thiserror::Error;

/// Errors raised while building plans or converting values against a schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// An annotation was applied to a field kind that cannot carry it.
    #[error("Field '{field}': {reason}")]
    UnsupportedAnnotation {
        /// Field name.
        field: String,
        /// What was wrong.
        reason: &'static str,
    },

    /// A bounded-range annotation is empty or exceeds the field's natural width.
    #[error("Field '{field}': invalid range [{min}, {max}]")]
    InvalidRange {
        /// Field name.
        field: String,
        /// Declared lower bound.
        min: i64,
        /// Declared upper bound.
        max: i64,
    },

    /// An enumeration was declared without variants.
    #[error("Enum '{name}' has no variants")]
    EmptyEnum {
        /// Enum name.
        name: &'static str,
    },

    /// Array elements may not be arrays or files.
    #[error("Field '{field}': unsupported array element kind")]
    UnsupportedArrayElement {
        /// Field name.
        field: String,
    },

    /// A vector field declared an unsupported lane count.
    #[error("Field '{field}': vectors hold 2 to 4 lanes, not {lanes}")]
    InvalidVectorLanes {
        /// Field name.
        field: String,
        /// Declared lanes.
        lanes: u8,
    },

    /// The same message type was registered twice.
    #[error("Message type '{name}' registered twice")]
    DuplicateType {
        /// Message name.
        name: &'static str,
    },

    /// A message type was used without being registered.
    #[error("Message type '{name}' is not registered")]
    UnknownType {
        /// Message name.
        name: &'static str,
    },

    /// A value does not match the kind its field declares.
    #[error("Field '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Field name or position.
        field: String,
        /// Expected kind.
        expected: &'static str,
        /// Kind actually present.
        found: &'static str,
    },

    /// A record is shorter than its schema.
    #[error("Field '{field}' is missing from the record")]
    MissingField {
        /// Field name or position.
        field: String,
    },

    /// An enum ordinal names no variant.
    #[error("Enum '{name}' has no variant with ordinal {ordinal}")]
    UnknownEnumOrdinal {
        /// Enum name.
        name: &'static str,
        /// Offending ordinal.
        ordinal: i64,
    },

    /// Array dimensions disagree with the element count or rank.
    #[error("Field '{field}': array shape {dims:?} does not hold {items} items")]
    ArrayShape {
        /// Field name.
        field: String,
        /// Declared dimensions.
        dims: Vec<usize>,
        /// Element count present.
        items: usize,
    },

    /// A value falls outside its ranged or peer-identity bounds.
    #[error("Field '{field}': value {value} outside [{min}, {max}]")]
    ValueOutOfRange {
        /// Field name.
        field: String,
        /// Offending value.
        value: i64,
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
    },
}

/// Session-level errors.
#[derive(Error, Debug)]
pub enum NetError {
    /// Bit-level decode failure.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Schema or value mismatch.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A tag resolved to no registered type.
    #[error("Unknown message tag {tag} in {space} space")]
    UnknownTag {
        /// Tag read from the wire.
        tag: u64,
        /// Tag space name.
        space: &'static str,
    },

    /// A peer ID that is not connected.
    #[error("Unknown peer {0}")]
    UnknownPeer(u16),

    /// The session has not finished joining.
    #[error("Not connected")]
    NotConnected,

    /// A message type was sent from the side its visibility forbids.
    #[error("Message '{name}' cannot be sent from this side")]
    DirectionViolation {
        /// Message name.
        name: &'static str,
    },

    /// A frame broke the session protocol.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// Transport backend failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid or unreadable configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Content-addressed file sync failure.
    #[error("File sync error: {0}")]
    FileSync(String),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for session operations.
pub type NetResult<T> = Result<T, NetError>;
