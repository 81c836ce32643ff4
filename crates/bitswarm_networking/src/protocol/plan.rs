//! # Codec Plans
//!
//! A [`Plan`] is the flattened encode/decode program for one schema on one
//! side of the session. It is built once at registration and then driven
//! for every frame.
//!
//! ## Design
//!
//! ```text
//! Schema "Spawn"                       Plan (ServerOrigin)
//! ┌──────────────────────────┐         ┌──────────────────────────────┐
//! │ owner   u16 @peer_id     │ ──────► │ [0]   owner     PeerId       │
//! │ pos     Record(Pos)      │ ──┐     │ [1,0] pos.x     F32          │
//! │   ├ x   f32              │   └───► │ [1,1] pos.y     F32          │
//! │   └ y   f32              │         │ [2]   team      Enum(0..=7)  │
//! │ team    Enum             │ ──────► │                              │
//! │ secret  u32 @client_only │   ✗     │ (omitted on this side)       │
//! └──────────────────────────┘         └──────────────────────────────┘
//! ```
//!
//! - Nested records are spliced inline; each step addresses its slot by path
//! - Encode and decode walk the same step list, so they pair 1:1
//! - Decode fills a default record, so omitted fields keep their defaults
//! - Arrays write each dimension as 32 bits, then elements row-major

use std::sync::Arc;

use bitswarm_core::{ranged_bits, BitReader, BitWriter, CodecError};

use crate::error::{NetResult, SchemaError};

use super::schema::{EnumDef, FieldDef, FieldKind, Schema, Side};
use super::value::{ArrayValue, NetFile, Record, Value};

/// Bits used for each array dimension.
pub const ARRAY_DIM_BITS: u32 = 32;

/// Element cap for arrays whose elements occupy no bits.
pub const MAX_EMPTY_ELEMENTS: usize = 1 << 16;

/// How file-bearing fields cross the wire.
///
/// Ordinary traffic writes files inline; the initial-state stream swaps in
/// the offer and resolution strategies from [`crate::files`].
pub trait FileCodec {
    /// Writes the wire form of `file` for field `field`.
    ///
    /// # Errors
    ///
    /// Strategy-specific sync failures.
    fn write_file(&mut self, field: &str, file: &NetFile, writer: &mut BitWriter) -> NetResult<()>;

    /// Reads the wire form of field `field`.
    ///
    /// # Errors
    ///
    /// Truncated frames and strategy-specific sync failures.
    fn read_file(&mut self, field: &str, reader: &mut BitReader<'_>) -> NetResult<NetFile>;
}

/// Per-frame inputs a plan needs besides the record.
pub struct CodecContext<'a> {
    /// Upper bound of the session's peer-ID domain.
    pub max_peer_index: u8,
    /// File strategy for this frame.
    pub files: &'a mut dyn FileCodec,
}

impl<'a> CodecContext<'a> {
    /// Creates a context.
    pub fn new(max_peer_index: u8, files: &'a mut dyn FileCodec) -> Self {
        Self { max_peer_index, files }
    }
}

/// Scalar encoding of one value.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    /// Natural-width primitive (bools, integers, floats).
    Native(FieldKind),
    /// `f32` lanes, 32 bits each.
    Vector(u8),
    /// Varint length then raw bytes.
    Bytes,
    /// Varint length then UTF-8 bytes.
    String,
    /// Integer over explicit bounds.
    Ranged {
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
        /// Integer kind of the value.
        kind: FieldKind,
    },
    /// Integer over `[0, max_peer_index]`.
    PeerId {
        /// Integer kind of the value.
        kind: FieldKind,
    },
    /// Ordinal over the enum's full span.
    Enum(Arc<EnumDef>),
}

/// Element encoding of an array step.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayElement {
    /// Scalar elements.
    Scalar(Scalar),
    /// Record elements, each driven by a sub-plan.
    Record(Arc<Plan>),
}

/// What a step does with its slot.
#[derive(Clone, Debug, PartialEq)]
pub enum StepCodec {
    /// One scalar.
    Scalar(Scalar),
    /// Dimensions then elements.
    Array {
        /// Number of dimensions.
        rank: u8,
        /// Element encoding.
        element: ArrayElement,
    },
    /// Delegated to the context's [`FileCodec`].
    File,
}

/// One encode/decode operation.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    /// Slot indices from the root record.
    pub path: Vec<usize>,
    /// Dotted field name, for errors and file keys.
    pub name: String,
    /// Encoding.
    pub codec: StepCodec,
}

/// Flattened codec program for one schema on one side.
#[derive(Clone, Debug, PartialEq)]
pub struct Plan {
    schema: Arc<Schema>,
    side: Side,
    steps: Vec<Step>,
}

impl Plan {
    /// Builds the plan for `schema` as sent from `side`.
    ///
    /// # Errors
    ///
    /// Any [`SchemaError`] describing an invalid annotation or field kind.
    pub fn build(schema: &Arc<Schema>, side: Side) -> Result<Self, SchemaError> {
        let mut steps = Vec::new();
        collect_steps(schema, side, &mut Vec::new(), "", &mut steps)?;
        Ok(Self {
            schema: Arc::clone(schema),
            side,
            steps,
        })
    }

    /// Only the file steps of `plan`, in order.
    #[must_use]
    pub fn file_plan(plan: &Self) -> Self {
        Self {
            schema: Arc::clone(&plan.schema),
            side: plan.side,
            steps: plan
                .steps
                .iter()
                .filter(|s| s.codec == StepCodec::File)
                .cloned()
                .collect(),
        }
    }

    /// Schema the plan was built from.
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Side the plan encodes for.
    #[inline]
    #[must_use]
    pub const fn side(&self) -> Side {
        self.side
    }

    /// Steps in wire order.
    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of file steps.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.steps.iter().filter(|s| s.codec == StepCodec::File).count()
    }

    /// Fewest bits one encoded record can occupy.
    #[must_use]
    pub fn min_bits(&self, max_peer_index: u8) -> usize {
        self.steps
            .iter()
            .map(|step| match &step.codec {
                StepCodec::Scalar(scalar) => scalar_min_bits(scalar, max_peer_index),
                StepCodec::Array { rank, .. } => usize::from(*rank) * ARRAY_DIM_BITS as usize,
                // at least one length byte
                StepCodec::File => 8,
            })
            .sum()
    }

    /// Writes every step's slot of `record`.
    ///
    /// # Errors
    ///
    /// [`SchemaError`] when the record does not match the schema, or a file
    /// strategy failure.
    pub fn encode(&self, record: &Record, writer: &mut BitWriter, ctx: &mut CodecContext<'_>) -> NetResult<()> {
        for step in &self.steps {
            let value = record.get_path(&step.path).ok_or_else(|| SchemaError::MissingField {
                field: step.name.clone(),
            })?;
            match &step.codec {
                StepCodec::Scalar(scalar) => encode_scalar(scalar, &step.name, value, writer, ctx.max_peer_index)?,
                StepCodec::Array { rank, element } => {
                    let Value::Array(array) = value else {
                        return Err(mismatch(&step.name, "array", value).into());
                    };
                    encode_array(&step.name, *rank, element, array, writer, ctx)?;
                }
                StepCodec::File => {
                    let Value::File(file) = value else {
                        return Err(mismatch(&step.name, "file", value).into());
                    };
                    ctx.files.write_file(&step.name, file, writer)?;
                }
            }
        }
        Ok(())
    }

    /// Reads a fresh record.
    ///
    /// # Errors
    ///
    /// [`CodecError`] on truncated or out-of-range data, [`SchemaError`] on
    /// unknown enum ordinals or impossible array shapes.
    pub fn decode(&self, reader: &mut BitReader<'_>, ctx: &mut CodecContext<'_>) -> NetResult<Record> {
        let mut record = Record::default_for(&self.schema);
        for step in &self.steps {
            let value = match &step.codec {
                StepCodec::Scalar(scalar) => decode_scalar(scalar, &step.name, reader, ctx.max_peer_index)?,
                StepCodec::Array { rank, element } => {
                    Value::Array(decode_array(&step.name, *rank, element, reader, ctx)?)
                }
                StepCodec::File => Value::File(ctx.files.read_file(&step.name, reader)?),
            };
            let slot = record.get_path_mut(&step.path).ok_or_else(|| SchemaError::MissingField {
                field: step.name.clone(),
            })?;
            *slot = value;
        }
        Ok(record)
    }
}

fn collect_steps(
    schema: &Schema,
    side: Side,
    path: &mut Vec<usize>,
    prefix: &str,
    steps: &mut Vec<Step>,
) -> Result<(), SchemaError> {
    for (index, field) in schema.fields().iter().enumerate() {
        if !field.visibility.allows(side) {
            continue;
        }
        let name = if prefix.is_empty() {
            field.name.to_string()
        } else {
            format!("{prefix}.{}", field.name)
        };
        path.push(index);
        match &field.kind {
            FieldKind::Record(inner) => {
                reject_annotations(field, &name)?;
                collect_steps(inner, side, path, &name, steps)?;
            }
            FieldKind::Array { rank, element } => {
                if *rank == 0 {
                    return Err(SchemaError::UnsupportedAnnotation {
                        field: name,
                        reason: "arrays need at least one dimension",
                    });
                }
                let element = match element.as_ref() {
                    FieldKind::Array { .. } | FieldKind::File => {
                        return Err(SchemaError::UnsupportedArrayElement { field: name });
                    }
                    FieldKind::Record(inner) if inner.has_files() => {
                        return Err(SchemaError::UnsupportedArrayElement { field: name });
                    }
                    FieldKind::Record(inner) => {
                        reject_annotations(field, &name)?;
                        ArrayElement::Record(Arc::new(Plan::build(inner, side)?))
                    }
                    kind => ArrayElement::Scalar(scalar_for(field, kind, &name)?),
                };
                steps.push(Step {
                    path: path.clone(),
                    name,
                    codec: StepCodec::Array { rank: *rank, element },
                });
            }
            FieldKind::File => {
                reject_annotations(field, &name)?;
                steps.push(Step {
                    path: path.clone(),
                    name,
                    codec: StepCodec::File,
                });
            }
            kind => {
                let scalar = scalar_for(field, kind, &name)?;
                steps.push(Step {
                    path: path.clone(),
                    name,
                    codec: StepCodec::Scalar(scalar),
                });
            }
        }
        path.pop();
    }
    Ok(())
}

fn reject_annotations(field: &FieldDef, name: &str) -> Result<(), SchemaError> {
    if field.peer_id || field.range.is_some() {
        return Err(SchemaError::UnsupportedAnnotation {
            field: name.to_string(),
            reason: "peer_id and range apply to integer fields only",
        });
    }
    Ok(())
}

fn scalar_for(field: &FieldDef, kind: &FieldKind, name: &str) -> Result<Scalar, SchemaError> {
    let bounds = kind.integer_bounds();
    if bounds.is_none() {
        reject_annotations(field, name)?;
    }
    if field.peer_id && field.range.is_some() {
        return Err(SchemaError::UnsupportedAnnotation {
            field: name.to_string(),
            reason: "peer_id and range cannot be combined",
        });
    }

    Ok(match kind {
        FieldKind::Vector(lanes) => {
            if !(2..=4).contains(lanes) {
                return Err(SchemaError::InvalidVectorLanes {
                    field: name.to_string(),
                    lanes: *lanes,
                });
            }
            Scalar::Vector(*lanes)
        }
        FieldKind::Bytes => Scalar::Bytes,
        FieldKind::String => Scalar::String,
        FieldKind::Enum(def) => Scalar::Enum(Arc::clone(def)),
        _ if field.peer_id => Scalar::PeerId { kind: kind.clone() },
        _ => match (field.range, bounds) {
            (Some((min, max)), Some((lo, hi))) => {
                if min > max || min < lo || max > hi {
                    return Err(SchemaError::InvalidRange {
                        field: name.to_string(),
                        min,
                        max,
                    });
                }
                Scalar::Ranged {
                    min,
                    max,
                    kind: kind.clone(),
                }
            }
            _ => Scalar::Native(kind.clone()),
        },
    })
}

fn scalar_min_bits(scalar: &Scalar, max_peer_index: u8) -> usize {
    let bits = match scalar {
        Scalar::Native(kind) => match kind {
            FieldKind::Bool => 1,
            FieldKind::U8 | FieldKind::I8 => 8,
            FieldKind::U16 | FieldKind::I16 => 16,
            FieldKind::U64 | FieldKind::I64 | FieldKind::F64 => 64,
            _ => 32,
        },
        Scalar::Vector(lanes) => 32 * u32::from(*lanes),
        Scalar::Bytes | Scalar::String => 8,
        Scalar::Ranged { min, max, .. } => ranged_bits(*min, *max),
        Scalar::PeerId { .. } => ranged_bits(0, i64::from(max_peer_index)),
        Scalar::Enum(def) => ranged_bits(def.min(), def.max()),
    };
    bits as usize
}

fn mismatch(field: &str, expected: &'static str, found: &Value) -> SchemaError {
    SchemaError::TypeMismatch {
        field: field.to_string(),
        expected,
        found: found.kind_name(),
    }
}

fn checked_integer(field: &str, value: &Value, min: i64, max: i64) -> Result<i64, SchemaError> {
    let v = value.as_i64().ok_or_else(|| mismatch(field, "integer", value))?;
    if v < min || v > max {
        return Err(SchemaError::ValueOutOfRange {
            field: field.to_string(),
            value: v,
            min,
            max,
        });
    }
    Ok(v)
}

fn encode_scalar(
    scalar: &Scalar,
    field: &str,
    value: &Value,
    writer: &mut BitWriter,
    max_peer_index: u8,
) -> Result<(), SchemaError> {
    match (scalar, value) {
        (Scalar::Native(kind), _) => match (kind, value) {
            (FieldKind::Bool, Value::Bool(v)) => writer.write_bool(*v),
            (FieldKind::U8, Value::U8(v)) => writer.write_u8(*v),
            (FieldKind::I8, Value::I8(v)) => writer.write_i8(*v),
            (FieldKind::U16, Value::U16(v)) => writer.write_u16(*v),
            (FieldKind::I16, Value::I16(v)) => writer.write_i16(*v),
            (FieldKind::U32, Value::U32(v)) => writer.write_u32(*v),
            (FieldKind::I32, Value::I32(v)) => writer.write_i32(*v),
            (FieldKind::U64, Value::U64(v)) => writer.write_u64(*v),
            (FieldKind::I64, Value::I64(v)) => writer.write_i64(*v),
            (FieldKind::F32, Value::F32(v)) => writer.write_f32(*v),
            (FieldKind::F64, Value::F64(v)) => writer.write_f64(*v),
            _ => return Err(mismatch(field, kind.name(), value)),
        },
        (Scalar::Vector(lanes), Value::Vector(v)) => {
            if v.len() != usize::from(*lanes) {
                return Err(SchemaError::ArrayShape {
                    field: field.to_string(),
                    dims: vec![usize::from(*lanes)],
                    items: v.len(),
                });
            }
            for lane in v {
                writer.write_f32(*lane);
            }
        }
        (Scalar::Bytes, Value::Bytes(v)) => writer.write_byte_block(v),
        (Scalar::String, Value::String(v)) => writer.write_string(v),
        (Scalar::Ranged { min, max, .. }, _) => {
            let v = checked_integer(field, value, *min, *max)?;
            writer.write_ranged(*min, *max, v);
        }
        (Scalar::PeerId { .. }, _) => {
            let max = i64::from(max_peer_index);
            let v = checked_integer(field, value, 0, max)?;
            writer.write_ranged(0, max, v);
        }
        (Scalar::Enum(def), Value::Enum(ordinal)) => {
            if !def.contains(*ordinal) {
                return Err(SchemaError::UnknownEnumOrdinal {
                    name: def.name(),
                    ordinal: *ordinal,
                });
            }
            writer.write_ranged(def.min(), def.max(), *ordinal);
        }
        (Scalar::Vector(_), _) => return Err(mismatch(field, "vector", value)),
        (Scalar::Bytes, _) => return Err(mismatch(field, "bytes", value)),
        (Scalar::String, _) => return Err(mismatch(field, "string", value)),
        (Scalar::Enum(_), _) => return Err(mismatch(field, "enum", value)),
    }
    Ok(())
}

fn decode_scalar(scalar: &Scalar, field: &str, reader: &mut BitReader<'_>, max_peer_index: u8) -> NetResult<Value> {
    Ok(match scalar {
        Scalar::Native(kind) => match kind {
            FieldKind::Bool => Value::Bool(reader.try_read_bool()?),
            FieldKind::U8 => Value::U8(reader.try_read_u8()?),
            FieldKind::I8 => Value::I8(reader.try_read_i8()?),
            FieldKind::U16 => Value::U16(reader.try_read_u16()?),
            FieldKind::I16 => Value::I16(reader.try_read_i16()?),
            FieldKind::U32 => Value::U32(reader.try_read_u32()?),
            FieldKind::I32 => Value::I32(reader.try_read_i32()?),
            FieldKind::U64 => Value::U64(reader.try_read_u64()?),
            FieldKind::I64 => Value::I64(reader.try_read_i64()?),
            FieldKind::F32 => Value::F32(reader.try_read_f32()?),
            FieldKind::F64 => Value::F64(reader.try_read_f64()?),
            other => return Err(mismatch(field, "scalar", &Value::default_for(other)).into()),
        },
        Scalar::Vector(lanes) => {
            let mut v = Vec::with_capacity(usize::from(*lanes));
            for _ in 0..*lanes {
                v.push(reader.try_read_f32()?);
            }
            Value::Vector(v)
        }
        Scalar::Bytes => Value::Bytes(reader.try_read_byte_block()?),
        Scalar::String => Value::String(reader.try_read_string()?),
        Scalar::Ranged { min, max, kind } => {
            let v = reader.try_read_ranged(*min, *max)?;
            integer_value(field, kind, v)?
        }
        Scalar::PeerId { kind } => {
            let v = reader.try_read_ranged(0, i64::from(max_peer_index))?;
            integer_value(field, kind, v)?
        }
        Scalar::Enum(def) => {
            let ordinal = reader.try_read_ranged(def.min(), def.max())?;
            if !def.contains(ordinal) {
                return Err(SchemaError::UnknownEnumOrdinal {
                    name: def.name(),
                    ordinal,
                }
                .into());
            }
            Value::Enum(ordinal)
        }
    })
}

fn integer_value(field: &str, kind: &FieldKind, v: i64) -> Result<Value, SchemaError> {
    Value::integer(kind, v).ok_or_else(|| {
        let (min, max) = kind.integer_bounds().unwrap_or((0, 0));
        SchemaError::ValueOutOfRange {
            field: field.to_string(),
            value: v,
            min,
            max,
        }
    })
}

fn encode_array(
    field: &str,
    rank: u8,
    element: &ArrayElement,
    array: &ArrayValue,
    writer: &mut BitWriter,
    ctx: &mut CodecContext<'_>,
) -> NetResult<()> {
    let shape_ok = array.dims.len() == usize::from(rank)
        && array.dims.iter().all(|&d| u32::try_from(d).is_ok())
        && array.shape_len() == array.items.len();
    if !shape_ok {
        return Err(SchemaError::ArrayShape {
            field: field.to_string(),
            dims: array.dims.clone(),
            items: array.items.len(),
        }
        .into());
    }

    for &dim in &array.dims {
        writer.write_bits(dim as u64, ARRAY_DIM_BITS);
    }
    for item in &array.items {
        match element {
            ArrayElement::Scalar(scalar) => encode_scalar(scalar, field, item, writer, ctx.max_peer_index)?,
            ArrayElement::Record(plan) => {
                let Value::Record(record) = item else {
                    return Err(mismatch(field, "record", item).into());
                };
                plan.encode(record, writer, ctx)?;
            }
        }
    }
    Ok(())
}

fn decode_array(
    field: &str,
    rank: u8,
    element: &ArrayElement,
    reader: &mut BitReader<'_>,
    ctx: &mut CodecContext<'_>,
) -> NetResult<ArrayValue> {
    let mut dims = Vec::with_capacity(usize::from(rank));
    for _ in 0..rank {
        dims.push(reader.try_read_bits(ARRAY_DIM_BITS)? as usize);
    }

    let count = dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d));
    let min_bits = match element {
        ArrayElement::Scalar(scalar) => scalar_min_bits(scalar, ctx.max_peer_index),
        ArrayElement::Record(plan) => plan.min_bits(ctx.max_peer_index),
    };
    let count = match count {
        Some(count) if min_bits == 0 && count <= MAX_EMPTY_ELEMENTS => count,
        Some(count) if min_bits > 0 => {
            let needed = count.saturating_mul(min_bits);
            if needed > reader.remaining_bits() {
                return Err(CodecError::ReadPastEnd {
                    requested: needed,
                    remaining: reader.remaining_bits(),
                }
                .into());
            }
            count
        }
        _ => {
            return Err(SchemaError::ArrayShape {
                field: field.to_string(),
                dims,
                items: 0,
            }
            .into());
        }
    };

    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        let item = match element {
            ArrayElement::Scalar(scalar) => decode_scalar(scalar, field, reader, ctx.max_peer_index)?,
            ArrayElement::Record(plan) => Value::Record(plan.decode(reader, ctx)?),
        };
        items.push(item);
    }
    Ok(ArrayValue { dims, items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::InlineFiles;
    use crate::protocol::schema::FieldDef;

    fn roundtrip(plan: &Plan, record: &Record, max_peer_index: u8) -> (Record, usize) {
        let mut files = InlineFiles;
        let mut writer = BitWriter::framed();
        plan.encode(record, &mut writer, &mut CodecContext::new(max_peer_index, &mut files))
            .unwrap();
        let bits = writer.bit_len();
        let frame = writer.to_frame();
        let mut reader = BitReader::from_frame(&frame).unwrap();
        let decoded = plan
            .decode(&mut reader, &mut CodecContext::new(max_peer_index, &mut files))
            .unwrap();
        assert!(reader.is_at_end());
        (decoded, bits)
    }

    fn composite_schema() -> Arc<Schema> {
        let pos = Schema::new("Pos")
            .field(FieldDef::new("x", FieldKind::F32))
            .field(FieldDef::new("y", FieldKind::F32));
        Arc::new(
            Schema::new("Spawn")
                .field(FieldDef::new("id", FieldKind::U16))
                .field(FieldDef::new("pos", FieldKind::record(pos)))
                .field(FieldDef::new("grid", FieldKind::array(2, FieldKind::I8))),
        )
    }

    #[test]
    fn test_nested_record_is_flattened() {
        let plan = Plan::build(&composite_schema(), Side::Unrestricted).unwrap();
        let paths: Vec<_> = plan.steps().iter().map(|s| s.path.clone()).collect();
        assert_eq!(paths, vec![vec![0], vec![1, 0], vec![1, 1], vec![2]]);
        assert_eq!(plan.steps()[1].name, "pos.x");
    }

    #[test]
    fn test_composite_roundtrip_row_major() {
        let plan = Plan::build(&composite_schema(), Side::Unrestricted).unwrap();
        let grid = ArrayValue::from_rows(vec![
            vec![Value::I8(1), Value::I8(2), Value::I8(3)],
            vec![Value::I8(-4), Value::I8(-5), Value::I8(-6)],
        ])
        .unwrap();
        let record = Record::new(vec![
            Value::U16(300),
            Value::Record(Record::new(vec![Value::F32(1.5), Value::F32(-2.25)])),
            Value::Array(grid),
        ]);

        let (decoded, bits) = roundtrip(&plan, &record, 3);
        assert_eq!(decoded, record);
        assert_eq!(bits, 16 + 64 + 64 + 6 * 8);
    }

    #[test]
    fn test_ranged_and_peer_id_widths() {
        let schema = Arc::new(
            Schema::new("Hit")
                .field(FieldDef::new("shooter", FieldKind::U16).peer_id())
                .field(FieldDef::new("damage", FieldKind::I32).ranged(-10, 100)),
        );
        let plan = Plan::build(&schema, Side::Unrestricted).unwrap();
        let record = Record::new(vec![Value::U16(3), Value::I32(-7)]);

        let (decoded, bits) = roundtrip(&plan, &record, 3);
        assert_eq!(decoded, record);
        assert_eq!(bits, 2 + 7);

        let (_, wider) = roundtrip(&plan, &record, 15);
        assert_eq!(wider, 4 + 7);
    }

    #[test]
    fn test_enum_uses_ordinal_span() {
        let team = EnumDef::new("Team", &[("Red", 0), ("Blue", 7)]).unwrap();
        let schema = Arc::new(Schema::new("Join").field(FieldDef::new("team", FieldKind::enumeration(team))));
        let plan = Plan::build(&schema, Side::Unrestricted).unwrap();

        let (decoded, bits) = roundtrip(&plan, &Record::new(vec![Value::Enum(7)]), 0);
        assert_eq!(decoded.read_enum(0), Ok(7));
        assert_eq!(bits, 3);

        let mut files = InlineFiles;
        let mut writer = BitWriter::new();
        let err = plan
            .encode(&Record::new(vec![Value::Enum(4)]), &mut writer, &mut CodecContext::new(0, &mut files))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::NetError::Schema(SchemaError::UnknownEnumOrdinal { ordinal: 4, .. })
        ));
    }

    #[test]
    fn test_direction_restricted_fields_omitted() {
        let schema = Arc::new(
            Schema::new("Chat")
                .field(FieldDef::new("text", FieldKind::String))
                .field(FieldDef::new("server_stamp", FieldKind::U32).server_only()),
        );
        let server = Plan::build(&schema, Side::ServerOrigin).unwrap();
        let client = Plan::build(&schema, Side::ClientOrigin).unwrap();
        assert_eq!(server.steps().len(), 2);
        assert_eq!(client.steps().len(), 1);

        let record = Record::new(vec![Value::from("hi"), Value::U32(99)]);
        let (decoded, _) = roundtrip(&client, &record, 0);
        assert_eq!(decoded.get(1), Some(&Value::U32(0)));
    }

    #[test]
    fn test_invalid_annotations_rejected() {
        let on_string = Arc::new(Schema::new("A").field(FieldDef::new("s", FieldKind::String).peer_id()));
        assert!(matches!(
            Plan::build(&on_string, Side::Unrestricted),
            Err(SchemaError::UnsupportedAnnotation { .. })
        ));

        let too_wide = Arc::new(Schema::new("B").field(FieldDef::new("n", FieldKind::U8).ranged(0, 300)));
        assert!(matches!(
            Plan::build(&too_wide, Side::Unrestricted),
            Err(SchemaError::InvalidRange { .. })
        ));

        let nested = Arc::new(Schema::new("C").field(FieldDef::new(
            "n",
            FieldKind::array(1, FieldKind::array(1, FieldKind::U8)),
        )));
        assert!(matches!(
            Plan::build(&nested, Side::Unrestricted),
            Err(SchemaError::UnsupportedArrayElement { .. })
        ));

        let lanes = Arc::new(Schema::new("D").field(FieldDef::new("v", FieldKind::Vector(5))));
        assert!(matches!(
            Plan::build(&lanes, Side::Unrestricted),
            Err(SchemaError::InvalidVectorLanes { lanes: 5, .. })
        ));
    }

    #[test]
    fn test_array_of_records() {
        let item = Schema::new("Item")
            .field(FieldDef::new("kind", FieldKind::U8).ranged(0, 3))
            .field(FieldDef::new("qty", FieldKind::U16));
        let schema = Arc::new(Schema::new("Bag").field(FieldDef::new("items", FieldKind::array(1, FieldKind::record(item)))));
        let plan = Plan::build(&schema, Side::Unrestricted).unwrap();

        let items = ArrayValue::from_items(vec![
            Value::Record(Record::new(vec![Value::U8(2), Value::U16(10)])),
            Value::Record(Record::new(vec![Value::U8(3), Value::U16(1)])),
        ]);
        let record = Record::new(vec![Value::Array(items)]);
        let (decoded, bits) = roundtrip(&plan, &record, 0);
        assert_eq!(decoded, record);
        assert_eq!(bits, 32 + 2 * (2 + 16));
    }

    #[test]
    fn test_huge_array_dims_rejected_before_allocating() {
        let schema = Arc::new(Schema::new("Big").field(FieldDef::new("v", FieldKind::array(1, FieldKind::U32))));
        let plan = Plan::build(&schema, Side::Unrestricted).unwrap();

        let mut writer = BitWriter::framed();
        writer.write_bits(u64::from(u32::MAX), ARRAY_DIM_BITS);
        let frame = writer.to_frame();
        let mut reader = BitReader::from_frame(&frame).unwrap();
        let mut files = InlineFiles;
        let err = plan.decode(&mut reader, &mut CodecContext::new(0, &mut files)).unwrap_err();
        assert!(matches!(err, crate::error::NetError::Codec(CodecError::ReadPastEnd { .. })));
    }

    #[test]
    fn test_file_plan_keeps_only_files() {
        let schema = Arc::new(
            Schema::new("Level")
                .field(FieldDef::new("id", FieldKind::U8))
                .field(FieldDef::new("map", FieldKind::File)),
        );
        let plan = Plan::build(&schema, Side::ServerOrigin).unwrap();
        let files = Plan::file_plan(&plan);
        assert_eq!(files.steps().len(), 1);
        assert_eq!(files.file_count(), 1);
        assert_eq!(files.steps()[0].path, vec![1]);

        let record = Record::new(vec![Value::U8(4), Value::File(NetFile::new("map.bin", vec![1, 2, 3]))]);
        let (decoded, _) = roundtrip(&plan, &record, 0);
        assert_eq!(decoded, record);
    }
}
