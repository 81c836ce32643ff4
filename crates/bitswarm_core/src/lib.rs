//! # BITSWARM Core Engine
//!
//! Bit-exact serialization primitives designed for:
//! - Arbitrary bit widths (1..=64) at arbitrary bit offsets
//! - Dense encodings of small closed domains (peer IDs, tags, ordinals)
//! - Frames whose exact bit length survives byte-granular transports
//!
//! ## Architecture Rules
//!
//! 1. **Encode and decode are mirror images** - every write has exactly one matching read
//! 2. **Reads past the end are faults** - guarded `try_*` variants report them instead
//! 3. **Buffers are recycled** - writers are loaned from pools, not rebuilt per frame
//!
//! ## Example
//!
//! ```rust
//! use bitswarm_core::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::framed();
//! writer.write_ranged(0, 15, 9);
//! writer.write_string("swarm");
//! let frame = writer.to_frame();
//!
//! let mut reader = BitReader::from_frame(&frame).unwrap();
//! assert_eq!(reader.read_ranged(0, 15), 9);
//! assert_eq!(reader.try_read_string().unwrap(), "swarm");
//! assert!(reader.is_at_end());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod bits;
pub mod error;
pub mod memory;

pub use bits::{bits_to_hold, ranged_bits, BitReader, BitWriter};
pub use error::{CodecError, CodecResult};
pub use memory::{ObjectPool, Recycle, ScratchPool};
