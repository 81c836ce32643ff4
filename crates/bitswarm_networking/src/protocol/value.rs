//! # Message Values
//!
//! Dynamic values mirroring [`FieldKind`]. Typed messages convert to and
//! from a positional [`Record`] whose slots follow the schema's field order.

use crate::error::SchemaError;

use super::schema::{FieldKind, Schema};

/// File content carried by a file-bearing field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetFile {
    /// Logical name; the sync cache is keyed by it.
    pub name: String,
    /// Raw content.
    pub bytes: Vec<u8>,
}

impl NetFile {
    /// Creates a file value.
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// A fixed-shape array, elements in row-major order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArrayValue {
    /// Length of each dimension.
    pub dims: Vec<usize>,
    /// Elements, last dimension varying fastest.
    pub items: Vec<Value>,
}

impl ArrayValue {
    /// One-dimensional array.
    #[must_use]
    pub fn from_items(items: Vec<Value>) -> Self {
        Self {
            dims: vec![items.len()],
            items,
        }
    }

    /// Two-dimensional array from equally long rows.
    ///
    /// # Errors
    ///
    /// [`SchemaError::ArrayShape`] if the rows differ in length.
    pub fn from_rows(rows: Vec<Vec<Value>>) -> Result<Self, SchemaError> {
        let cols = rows.first().map_or(0, Vec::len);
        let dims = vec![rows.len(), cols];
        if rows.iter().any(|r| r.len() != cols) {
            let items = rows.iter().map(Vec::len).sum();
            return Err(SchemaError::ArrayShape {
                field: "rows".to_string(),
                dims,
                items,
            });
        }
        Ok(Self {
            dims,
            items: rows.into_iter().flatten().collect(),
        })
    }

    /// Element count implied by the dimensions.
    #[must_use]
    pub fn shape_len(&self) -> usize {
        self.dims.iter().product()
    }

    /// Element at a multi-dimensional index.
    #[must_use]
    pub fn get(&self, index: &[usize]) -> Option<&Value> {
        if index.len() != self.dims.len() {
            return None;
        }
        let mut flat = 0;
        for (&i, &dim) in index.iter().zip(&self.dims) {
            if i >= dim {
                return None;
            }
            flat = flat * dim + i;
        }
        self.items.get(flat)
    }
}

/// Positional field values of one message or nested record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    /// Wraps values listed in schema order.
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// A record holding each field's default value.
    #[must_use]
    pub fn default_for(schema: &Schema) -> Self {
        Self {
            values: schema.fields().iter().map(|f| Value::default_for(&f.kind)).collect(),
        }
    }

    /// Number of slots.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the record has no slots.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Slots in schema order.
    #[inline]
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consumes the record.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Slot at `index`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Follows a path of slot indices through nested records.
    #[must_use]
    pub fn get_path(&self, path: &[usize]) -> Option<&Value> {
        let (&last, parents) = path.split_last()?;
        let mut record = self;
        for &index in parents {
            match record.values.get(index)? {
                Value::Record(inner) => record = inner,
                _ => return None,
            }
        }
        record.values.get(last)
    }

    /// Mutable [`Record::get_path`].
    pub fn get_path_mut(&mut self, path: &[usize]) -> Option<&mut Value> {
        let (&last, parents) = path.split_last()?;
        let mut record = self;
        for &index in parents {
            match record.values.get_mut(index)? {
                Value::Record(inner) => record = inner,
                _ => return None,
            }
        }
        record.values.get_mut(last)
    }

    /// Typed slot read for `from_record` implementations.
    ///
    /// # Errors
    ///
    /// [`SchemaError::MissingField`] or [`SchemaError::TypeMismatch`].
    pub fn read<T: FromValue>(&self, index: usize) -> Result<T, SchemaError> {
        let value = self.values.get(index).ok_or_else(|| SchemaError::MissingField {
            field: format!("#{index}"),
        })?;
        T::from_value(value).ok_or_else(|| SchemaError::TypeMismatch {
            field: format!("#{index}"),
            expected: T::KIND,
            found: value.kind_name(),
        })
    }

    /// Reads an enum ordinal slot.
    ///
    /// # Errors
    ///
    /// As [`Record::read`].
    pub fn read_enum(&self, index: usize) -> Result<i64, SchemaError> {
        match self.values.get(index) {
            Some(Value::Enum(ordinal)) => Ok(*ordinal),
            Some(other) => Err(SchemaError::TypeMismatch {
                field: format!("#{index}"),
                expected: "enum",
                found: other.kind_name(),
            }),
            None => Err(SchemaError::MissingField {
                field: format!("#{index}"),
            }),
        }
    }
}

/// A single field value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Boolean.
    Bool(bool),
    /// Unsigned 8-bit.
    U8(u8),
    /// Signed 8-bit.
    I8(i8),
    /// Unsigned 16-bit.
    U16(u16),
    /// Signed 16-bit.
    I16(i16),
    /// Unsigned 32-bit.
    U32(u32),
    /// Signed 32-bit.
    I32(i32),
    /// Unsigned 64-bit.
    U64(u64),
    /// Signed 64-bit.
    I64(i64),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
    /// `f32` lanes of a vector field.
    Vector(Vec<f32>),
    /// Byte block.
    Bytes(Vec<u8>),
    /// UTF-8 string.
    String(String),
    /// Nested record.
    Record(Record),
    /// Array.
    Array(ArrayValue),
    /// Enum ordinal.
    Enum(i64),
    /// File.
    File(NetFile),
}

impl Value {
    /// Default value of a field kind.
    #[must_use]
    pub fn default_for(kind: &FieldKind) -> Self {
        match kind {
            FieldKind::Bool => Self::Bool(false),
            FieldKind::U8 => Self::U8(0),
            FieldKind::I8 => Self::I8(0),
            FieldKind::U16 => Self::U16(0),
            FieldKind::I16 => Self::I16(0),
            FieldKind::U32 => Self::U32(0),
            FieldKind::I32 => Self::I32(0),
            FieldKind::U64 => Self::U64(0),
            FieldKind::I64 => Self::I64(0),
            FieldKind::F32 => Self::F32(0.0),
            FieldKind::F64 => Self::F64(0.0),
            FieldKind::Vector(lanes) => Self::Vector(vec![0.0; usize::from(*lanes)]),
            FieldKind::Bytes => Self::Bytes(Vec::new()),
            FieldKind::String => Self::String(String::new()),
            FieldKind::Record(schema) => Self::Record(Record::default_for(schema)),
            FieldKind::Array { rank, .. } => Self::Array(ArrayValue {
                dims: vec![0; usize::from(*rank)],
                items: Vec::new(),
            }),
            FieldKind::Enum(def) => Self::Enum(def.min()),
            FieldKind::File => Self::File(NetFile::default()),
        }
    }

    /// Kind name, for error messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::U8(_) => "u8",
            Self::I8(_) => "i8",
            Self::U16(_) => "u16",
            Self::I16(_) => "i16",
            Self::U32(_) => "u32",
            Self::I32(_) => "i32",
            Self::U64(_) => "u64",
            Self::I64(_) => "i64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Vector(_) => "vector",
            Self::Bytes(_) => "bytes",
            Self::String(_) => "string",
            Self::Record(_) => "record",
            Self::Array(_) => "array",
            Self::Enum(_) => "enum",
            Self::File(_) => "file",
        }
    }

    /// Integer payload widened to `i64`; `None` for non-integers and
    /// `u64` values above `i64::MAX`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::U8(v) => Some(i64::from(v)),
            Self::I8(v) => Some(i64::from(v)),
            Self::U16(v) => Some(i64::from(v)),
            Self::I16(v) => Some(i64::from(v)),
            Self::U32(v) => Some(i64::from(v)),
            Self::I32(v) => Some(i64::from(v)),
            Self::U64(v) => i64::try_from(v).ok(),
            Self::I64(v) => Some(v),
            _ => None,
        }
    }

    /// Builds an integer value of `kind` from `v`, if it fits.
    #[must_use]
    pub fn integer(kind: &FieldKind, v: i64) -> Option<Self> {
        Some(match kind {
            FieldKind::U8 => Self::U8(u8::try_from(v).ok()?),
            FieldKind::I8 => Self::I8(i8::try_from(v).ok()?),
            FieldKind::U16 => Self::U16(u16::try_from(v).ok()?),
            FieldKind::I16 => Self::I16(i16::try_from(v).ok()?),
            FieldKind::U32 => Self::U32(u32::try_from(v).ok()?),
            FieldKind::I32 => Self::I32(i32::try_from(v).ok()?),
            FieldKind::U64 => Self::U64(u64::try_from(v).ok()?),
            FieldKind::I64 => Self::I64(v),
            _ => return None,
        })
    }
}

/// Types extractable from a [`Value`].
pub trait FromValue: Sized {
    /// Kind name used in mismatch errors.
    const KIND: &'static str;

    /// Extracts the payload if the value has the matching kind.
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_value_conversions {
    ($($ty:ty => $variant:ident, $kind:literal;)*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }

            impl FromValue for $ty {
                const KIND: &'static str = $kind;

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_value_conversions! {
    bool => Bool, "bool";
    u8 => U8, "u8";
    i8 => I8, "i8";
    u16 => U16, "u16";
    i16 => I16, "i16";
    u32 => U32, "u32";
    i32 => I32, "i32";
    u64 => U64, "u64";
    i64 => I64, "i64";
    f32 => F32, "f32";
    f64 => F64, "f64";
    Vec<f32> => Vector, "vector";
    Vec<u8> => Bytes, "bytes";
    String => String, "string";
    Record => Record, "record";
    ArrayValue => Array, "array";
    NetFile => File, "file";
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::schema::FieldDef;

    #[test]
    fn test_default_record_mirrors_schema() {
        let inner = Schema::new("Pos").field(FieldDef::new("v", FieldKind::Vector(3)));
        let schema = Schema::new("Spawn")
            .field(FieldDef::new("name", FieldKind::String))
            .field(FieldDef::new("pos", FieldKind::record(inner)))
            .field(FieldDef::new("grid", FieldKind::array(2, FieldKind::U8)));

        let record = Record::default_for(&schema);
        assert_eq!(record.len(), 3);
        assert_eq!(record.get_path(&[1, 0]), Some(&Value::Vector(vec![0.0; 3])));
        assert_eq!(
            record.get(2),
            Some(&Value::Array(ArrayValue { dims: vec![0, 0], items: vec![] }))
        );
    }

    #[test]
    fn test_get_path_mut_sets_nested() {
        let mut record = Record::new(vec![Value::Record(Record::new(vec![Value::U8(1)]))]);
        *record.get_path_mut(&[0, 0]).unwrap() = Value::U8(9);
        assert_eq!(record.get_path(&[0, 0]), Some(&Value::U8(9)));
        assert!(record.get_path(&[0, 0, 0]).is_none());
    }

    #[test]
    fn test_array_row_major_index() {
        let array = ArrayValue::from_rows(vec![
            vec![Value::U8(1), Value::U8(2), Value::U8(3)],
            vec![Value::U8(4), Value::U8(5), Value::U8(6)],
        ])
        .unwrap();
        assert_eq!(array.dims, vec![2, 3]);
        assert_eq!(array.get(&[1, 0]), Some(&Value::U8(4)));
        assert_eq!(array.get(&[0, 2]), Some(&Value::U8(3)));
        assert_eq!(array.get(&[2, 0]), None);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let ragged = ArrayValue::from_rows(vec![vec![Value::U8(1)], vec![]]);
        assert!(matches!(ragged, Err(SchemaError::ArrayShape { .. })));
    }

    #[test]
    fn test_typed_read() {
        let record = Record::new(vec![Value::from(7u16), Value::from("hi"), Value::Enum(3)]);
        assert_eq!(record.read::<u16>(0), Ok(7));
        assert_eq!(record.read::<String>(1), Ok("hi".to_string()));
        assert_eq!(record.read_enum(2), Ok(3));
        assert!(matches!(record.read::<u8>(0), Err(SchemaError::TypeMismatch { .. })));
        assert!(matches!(record.read::<u8>(5), Err(SchemaError::MissingField { .. })));
    }

    #[test]
    fn test_integer_conversion_bounds() {
        assert_eq!(Value::integer(&FieldKind::U8, 255), Some(Value::U8(255)));
        assert_eq!(Value::integer(&FieldKind::U8, 256), None);
        assert_eq!(Value::integer(&FieldKind::I16, -5), Some(Value::I16(-5)));
        assert_eq!(Value::U64(u64::MAX).as_i64(), None);
    }
}
