//! # Swarm Protocol
//!
//! Schema-driven message codecs and the frames that carry them.
//!
//! ## Ordinary Frame
//!
//! ```text
//! server → client:  [tag][sender][fields...]([sender][fields...])*
//! client → server:  [tag][fields...]
//! ```
//!
//! The tag is a ranged integer over the sending side's tag space; 0 marks a
//! control frame (see [`control`]). The sender is a ranged integer over
//! `[0, max_peers]`, where `max_peers` itself means "the server".
//!
//! ## Design Philosophy
//!
//! - Every bit counts: tags, peer IDs and enums use the narrowest width
//! - Plans are built once at startup; no reflection at runtime
//! - Each frame is a self-contained bit buffer, so a bad frame cannot
//!   corrupt the next one

pub mod control;
mod plan;
mod registry;
mod schema;
mod value;

pub use plan::{ArrayElement, CodecContext, FileCodec, Plan, Scalar, Step, StepCodec, ARRAY_DIM_BITS};
pub use registry::{NetMessage, Registry, RegistryBuilder, RegistryEntry, TagSpace};
pub use schema::{EnumDef, FieldDef, FieldKind, MessageDescriptor, Schema, Side, Visibility};
pub use value::{ArrayValue, FromValue, NetFile, Record, Value};
