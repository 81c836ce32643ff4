//! # Message Schemas
//!
//! Static descriptions of message layouts: an ordered field list, each field
//! with a closed [`FieldKind`] and optional annotations.
//!
//! ## Design
//!
//! - Declared once per type in code, never discovered at runtime
//! - Nested records and arrays are recursive kinds, not runtime type tests
//! - Enum ordinal bounds are computed once when the [`EnumDef`] is built

use std::sync::Arc;

use crate::error::SchemaError;

/// Which side is allowed to send a type or field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Sent by both server and clients.
    #[default]
    Both,
    /// Only the server may send it.
    ServerOnly,
    /// Only clients may send it.
    ClientOnly,
}

/// Direction a plan encodes for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// Frames written by the server.
    ServerOrigin,
    /// Frames written by a client.
    ClientOrigin,
    /// Every field, regardless of visibility.
    Unrestricted,
}

impl Visibility {
    /// Returns true if frames from `side` carry this type or field.
    #[inline]
    #[must_use]
    pub const fn allows(self, side: Side) -> bool {
        !matches!(
            (self, side),
            (Self::ServerOnly, Side::ClientOrigin) | (Self::ClientOnly, Side::ServerOrigin)
        )
    }
}

/// An enumeration encoded by ordinal.
///
/// The wire width covers the full ordinal span `[min, max]`, gaps included.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumDef {
    name: &'static str,
    variants: Vec<(&'static str, i64)>,
    min: i64,
    max: i64,
}

impl EnumDef {
    /// Declares an enumeration from `(variant, ordinal)` pairs.
    ///
    /// # Errors
    ///
    /// [`SchemaError::EmptyEnum`] if `variants` is empty.
    pub fn new(name: &'static str, variants: &[(&'static str, i64)]) -> Result<Self, SchemaError> {
        let min = variants.iter().map(|&(_, o)| o).min();
        let max = variants.iter().map(|&(_, o)| o).max();
        let (Some(min), Some(max)) = (min, max) else {
            return Err(SchemaError::EmptyEnum { name });
        };
        Ok(Self {
            name,
            variants: variants.to_vec(),
            min,
            max,
        })
    }

    /// Enum name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Smallest ordinal.
    #[inline]
    #[must_use]
    pub const fn min(&self) -> i64 {
        self.min
    }

    /// Largest ordinal.
    #[inline]
    #[must_use]
    pub const fn max(&self) -> i64 {
        self.max
    }

    /// Declared variants.
    #[inline]
    #[must_use]
    pub fn variants(&self) -> &[(&'static str, i64)] {
        &self.variants
    }

    /// Returns true if some variant has this ordinal.
    #[must_use]
    pub fn contains(&self, ordinal: i64) -> bool {
        self.variants.iter().any(|&(_, o)| o == ordinal)
    }

    /// Variant name for an ordinal.
    #[must_use]
    pub fn variant_name(&self, ordinal: i64) -> Option<&'static str> {
        self.variants.iter().find(|&&(_, o)| o == ordinal).map(|&(n, _)| n)
    }
}

/// Semantic kind of a field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    /// One bit.
    Bool,
    /// Unsigned 8-bit.
    U8,
    /// Signed 8-bit.
    I8,
    /// Unsigned 16-bit.
    U16,
    /// Signed 16-bit.
    I16,
    /// Unsigned 32-bit.
    U32,
    /// Signed 32-bit.
    I32,
    /// Unsigned 64-bit.
    U64,
    /// Signed 64-bit.
    I64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// Tuple of 2 to 4 `f32` lanes.
    Vector(u8),
    /// Length-prefixed byte block.
    Bytes,
    /// Length-prefixed UTF-8 string.
    String,
    /// Nested record, spliced inline.
    Record(Arc<Schema>),
    /// Array of `rank` dimensions, row-major.
    Array {
        /// Number of dimensions (at least 1).
        rank: u8,
        /// Element kind; never an array or file.
        element: Box<FieldKind>,
    },
    /// Enumeration encoded as a ranged ordinal.
    Enum(Arc<EnumDef>),
    /// File content, synced by content hash.
    File,
}

impl FieldKind {
    /// Shorthand for a nested record.
    #[must_use]
    pub fn record(schema: Schema) -> Self {
        Self::Record(Arc::new(schema))
    }

    /// Shorthand for an array.
    #[must_use]
    pub fn array(rank: u8, element: Self) -> Self {
        Self::Array {
            rank,
            element: Box::new(element),
        }
    }

    /// Shorthand for an enumeration.
    #[must_use]
    pub fn enumeration(def: EnumDef) -> Self {
        Self::Enum(Arc::new(def))
    }

    /// Natural `[min, max]` of integer kinds.
    #[must_use]
    pub const fn integer_bounds(&self) -> Option<(i64, i64)> {
        match self {
            Self::U8 => Some((0, u8::MAX as i64)),
            Self::I8 => Some((i8::MIN as i64, i8::MAX as i64)),
            Self::U16 => Some((0, u16::MAX as i64)),
            Self::I16 => Some((i16::MIN as i64, i16::MAX as i64)),
            Self::U32 => Some((0, u32::MAX as i64)),
            Self::I32 => Some((i32::MIN as i64, i32::MAX as i64)),
            Self::U64 => Some((0, i64::MAX)),
            Self::I64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    /// Human-readable kind name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Vector(_) => "vector",
            Self::Bytes => "bytes",
            Self::String => "string",
            Self::Record(_) => "record",
            Self::Array { .. } => "array",
            Self::Enum(_) => "enum",
            Self::File => "file",
        }
    }

    /// Returns true if this kind, or anything nested in it, is a file.
    #[must_use]
    pub fn has_files(&self) -> bool {
        match self {
            Self::File => true,
            Self::Record(schema) => schema.has_files(),
            Self::Array { element, .. } => element.has_files(),
            _ => false,
        }
    }
}

/// One field of a schema.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    /// Field name.
    pub name: &'static str,
    /// Semantic kind.
    pub kind: FieldKind,
    /// Encoded as a ranged integer over the session's peer-ID domain.
    pub peer_id: bool,
    /// Explicit bounds replacing the natural width.
    pub range: Option<(i64, i64)>,
    /// Which side may send this field.
    pub visibility: Visibility,
}

impl FieldDef {
    /// Declares a field with no annotations.
    #[must_use]
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            peer_id: false,
            range: None,
            visibility: Visibility::Both,
        }
    }

    /// Marks the field as a peer identity.
    #[must_use]
    pub fn peer_id(mut self) -> Self {
        self.peer_id = true;
        self
    }

    /// Bounds the field to `[min, max]`.
    #[must_use]
    pub fn ranged(mut self, min: i64, max: i64) -> Self {
        self.range = Some((min, max));
        self
    }

    /// Only the server sends this field.
    #[must_use]
    pub fn server_only(mut self) -> Self {
        self.visibility = Visibility::ServerOnly;
        self
    }

    /// Only clients send this field.
    #[must_use]
    pub fn client_only(mut self) -> Self {
        self.visibility = Visibility::ClientOnly;
        self
    }
}

/// Ordered field list of a message or nested record.
#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
    name: &'static str,
    fields: Vec<FieldDef>,
}

impl Schema {
    /// Starts an empty schema.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
        }
    }

    /// Appends a field; declaration order is wire order.
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Schema name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Fields in wire order.
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Number of fields.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the schema has no fields.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of a field by name.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Returns true if any field, at any depth, is a file.
    #[must_use]
    pub fn has_files(&self) -> bool {
        self.fields.iter().any(|f| f.kind.has_files())
    }
}

/// Everything the registry needs to know about one message type.
#[derive(Clone, Debug)]
pub struct MessageDescriptor {
    /// Field layout.
    pub schema: Arc<Schema>,
    /// Which side may send the type.
    pub visibility: Visibility,
    /// The server must not rebroadcast it.
    pub no_relay: bool,
    /// Part of the join snapshot rather than ongoing traffic.
    pub initial_state: bool,
}

impl MessageDescriptor {
    /// Describes an ordinary, relayable, two-way message.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: Arc::new(schema),
            visibility: Visibility::Both,
            no_relay: false,
            initial_state: false,
        }
    }

    /// Message name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.schema.name()
    }

    /// Only the server sends this type.
    #[must_use]
    pub fn server_only(mut self) -> Self {
        self.visibility = Visibility::ServerOnly;
        self
    }

    /// Only clients send this type.
    #[must_use]
    pub fn client_only(mut self) -> Self {
        self.visibility = Visibility::ClientOnly;
        self
    }

    /// Processed by the server but never rebroadcast.
    #[must_use]
    pub fn no_relay(mut self) -> Self {
        self.no_relay = true;
        self
    }

    /// Streamed to joining peers as part of the initial state.
    #[must_use]
    pub fn initial_state(mut self) -> Self {
        self.initial_state = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_span_cached() {
        let def = EnumDef::new("Team", &[("Red", 2), ("Blue", 9), ("Green", 5)]).unwrap();
        assert_eq!(def.min(), 2);
        assert_eq!(def.max(), 9);
        assert!(def.contains(5));
        assert!(!def.contains(3));
        assert_eq!(def.variant_name(9), Some("Blue"));
    }

    #[test]
    fn test_empty_enum_rejected() {
        assert_eq!(EnumDef::new("Nothing", &[]), Err(SchemaError::EmptyEnum { name: "Nothing" }));
    }

    #[test]
    fn test_visibility_allows() {
        assert!(Visibility::Both.allows(Side::ClientOrigin));
        assert!(!Visibility::ServerOnly.allows(Side::ClientOrigin));
        assert!(Visibility::ServerOnly.allows(Side::ServerOrigin));
        assert!(!Visibility::ClientOnly.allows(Side::ServerOrigin));
        assert!(Visibility::ClientOnly.allows(Side::Unrestricted));
    }

    #[test]
    fn test_has_files_is_recursive() {
        let inner = Schema::new("Asset").field(FieldDef::new("data", FieldKind::File));
        let outer = Schema::new("Level")
            .field(FieldDef::new("id", FieldKind::U16))
            .field(FieldDef::new("asset", FieldKind::record(inner)));
        assert!(outer.has_files());
        assert_eq!(outer.index_of("asset"), Some(1));
    }
}
