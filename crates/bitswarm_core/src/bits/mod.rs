//! # Bit Cursor Codec
//!
//! Arbitrary-width packing into growable, bit-addressed buffers.
//!
//! ## Layers
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  BitWriter / BitReader (stateful cursors)    │
//! │  ranged, variable-length, strings, floats    │
//! ├──────────────────────────────────────────────┤
//! │  math (stateless offset arithmetic)          │
//! └──────────────────────────────────────────────┘
//! ```

pub mod math;
mod reader;
mod writer;

pub use math::bits_to_hold;
pub use reader::{BitReader, MAX_VAR_INT_BYTES};
pub use writer::{ranged_bits, wrap_angle, BitWriter, FRAME_HEADER_BITS, OVER_ALLOCATE_BYTES};
