//! # Bit Writer
//!
//! Growable, bit-addressed output buffer.
//!
//! ## Design
//!
//! - Grows ahead of need by a small fixed increment
//! - Every primitive lands at the current bit cursor, no alignment padding
//! - Framed writers reserve a 3-bit header recording the trailing pad bits,
//!   so a reader recovers the exact bit length from the byte count
//!
//! ```text
//!  byte 0          byte 1          ...  byte n-1
//!  [pad|payload...][payload........]    [payload|zero pad]
//!   3 bits
//! ```

use super::math;

/// Bytes allocated past the requested size on every growth.
pub const OVER_ALLOCATE_BYTES: usize = 4;

/// Width of the frame header holding the trailing pad count.
pub const FRAME_HEADER_BITS: usize = 3;

/// Growable bit-level writer.
///
/// Reused across frames through [`BitWriter::reset`], which keeps the
/// allocation.
#[derive(Clone, Debug, Default)]
pub struct BitWriter {
    /// Backing storage, always at least `byte_len()` long.
    data: Vec<u8>,
    /// Bits written, including the frame header when framed.
    length_bits: usize,
    /// Whether the first three bits are a padding header.
    framed: bool,
}

impl BitWriter {
    /// Creates an empty, unframed writer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: Vec::new(),
            length_bits: 0,
            framed: false,
        }
    }

    /// Creates an unframed writer with `bytes` of storage reserved.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            data: vec![0; bytes],
            length_bits: 0,
            framed: false,
        }
    }

    /// Creates a writer whose output starts with the 3-bit padding header.
    ///
    /// Frames produced this way are read back with
    /// [`BitReader::from_frame`](super::BitReader::from_frame).
    #[must_use]
    pub fn framed() -> Self {
        let mut writer = Self {
            data: Vec::new(),
            length_bits: FRAME_HEADER_BITS,
            framed: true,
        };
        writer.ensure_bits(0);
        writer
    }

    /// Returns true if the writer emits the padding header.
    #[inline]
    #[must_use]
    pub const fn is_framed(&self) -> bool {
        self.framed
    }

    /// Payload bits written, excluding the frame header.
    #[inline]
    #[must_use]
    pub const fn bit_len(&self) -> usize {
        if self.framed {
            self.length_bits - FRAME_HEADER_BITS
        } else {
            self.length_bits
        }
    }

    /// Returns true if no payload bits have been written.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bit_len() == 0
    }

    /// Output length in bytes, header included.
    #[inline]
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        (self.length_bits + 7) >> 3
    }

    /// Rewinds to an empty buffer, keeping the allocation and framing.
    pub fn reset(&mut self) {
        self.data.fill(0);
        self.length_bits = if self.framed { FRAME_HEADER_BITS } else { 0 };
    }

    /// Written bytes. For framed writers the header is only valid after
    /// [`BitWriter::finish`].
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.byte_len()]
    }

    /// Stamps the padding header (framed writers) and returns the output.
    pub fn finish(&mut self) -> &[u8] {
        if self.framed {
            let padding = (self.byte_len() * 8 - self.length_bits) as u8;
            math::write_byte(padding, FRAME_HEADER_BITS as u32, &mut self.data, 0);
        }
        self.as_bytes()
    }

    /// Finishes and copies the output into an owned frame.
    #[must_use]
    pub fn to_frame(&mut self) -> Vec<u8> {
        self.finish().to_vec()
    }

    #[inline]
    fn ensure_bits(&mut self, additional: usize) {
        let needed = (self.length_bits + additional + 7) >> 3;
        if self.data.len() < needed {
            self.data.resize(needed + OVER_ALLOCATE_BYTES, 0);
        }
    }

    /// Writes the low `num_bits` (0..=64) of `value`.
    #[inline]
    pub fn write_bits(&mut self, value: u64, num_bits: u32) {
        self.ensure_bits(num_bits as usize);
        math::write_u64(value, num_bits, &mut self.data, self.length_bits);
        self.length_bits += num_bits as usize;
    }

    /// Writes a single bit.
    #[inline]
    pub fn write_bool(&mut self, value: bool) {
        self.ensure_bits(1);
        math::write_byte(u8::from(value), 1, &mut self.data, self.length_bits);
        self.length_bits += 1;
    }

    /// Writes a full byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.ensure_bits(8);
        math::write_byte(value, 8, &mut self.data, self.length_bits);
        self.length_bits += 8;
    }

    /// Writes an `i8` as its native two's-complement byte.
    #[inline]
    pub fn write_i8(&mut self, value: i8) {
        self.write_u8(value as u8);
    }

    /// Writes a `u16` at full width.
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.write_bits(u64::from(value), 16);
    }

    /// Writes an `i16` at full width.
    #[inline]
    pub fn write_i16(&mut self, value: i16) {
        self.write_u16(value as u16);
    }

    /// Writes a `u32` at full width.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.write_bits(u64::from(value), 32);
    }

    /// Writes an `i32` at full width.
    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    /// Writes a `u64` at full width.
    #[inline]
    pub fn write_u64(&mut self, value: u64) {
        self.write_bits(value, 64);
    }

    /// Writes an `i64` at full width.
    #[inline]
    pub fn write_i64(&mut self, value: i64) {
        self.write_u64(value as u64);
    }

    /// Writes a signed integer in `num_bits` (1..=64) bits.
    ///
    /// Bit `num_bits - 1` is the sign. A negative value stores `!value` in
    /// the low bits, which [`BitReader::read_signed`](super::BitReader::read_signed)
    /// undoes as `-(low + 1)`. At 64 bits the native representation is used.
    pub fn write_signed(&mut self, value: i64, num_bits: u32) {
        debug_assert!((1..=64).contains(&num_bits));

        if num_bits == 64 {
            self.write_u64(value as u64);
            return;
        }

        let sign = 1u64 << (num_bits - 1);
        let low_mask = sign - 1;
        let raw = if value < 0 {
            sign | ((!value) as u64 & low_mask)
        } else {
            value as u64 & low_mask
        };
        self.write_bits(raw, num_bits);
    }

    /// Writes an `f32` as its raw bit pattern.
    #[inline]
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    /// Writes an `f64` as its raw bit pattern.
    #[inline]
    pub fn write_f64(&mut self, value: f64) {
        self.write_u64(value.to_bits());
    }

    /// Writes raw bytes at the current bit offset (no length prefix).
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.ensure_bits(bytes.len() * 8);
        math::write_bytes(bytes, &mut self.data, self.length_bits);
        self.length_bits += bytes.len() * 8;
    }

    /// Writes `value` in the variable-length encoding: 7 payload bits per
    /// byte, high bit set while more bytes follow.
    ///
    /// Returns the number of bytes emitted.
    pub fn write_var_u64(&mut self, value: u64) -> usize {
        let mut remaining = value;
        let mut count = 1;
        while remaining >= 0x80 {
            self.write_u8((remaining as u8) | 0x80);
            remaining >>= 7;
            count += 1;
        }
        self.write_u8(remaining as u8);
        count
    }

    /// Writes a UTF-8 string prefixed by its byte length as a variable-length integer.
    pub fn write_string(&mut self, value: &str) {
        self.write_var_u64(value.len() as u64);
        self.write_bytes(value.as_bytes());
    }

    /// Writes a length-prefixed byte block.
    pub fn write_byte_block(&mut self, bytes: &[u8]) {
        self.write_var_u64(bytes.len() as u64);
        self.write_bytes(bytes);
    }

    /// Writes `value - min` in `bits_to_hold(max - min)` bits.
    ///
    /// Returns the width used.
    pub fn write_ranged(&mut self, min: i64, max: i64, value: i64) -> u32 {
        debug_assert!(min <= max);
        debug_assert!(value >= min && value <= max, "ranged value {value} outside [{min}, {max}]");

        let bits = ranged_bits(min, max);
        self.write_bits(value.wrapping_sub(min) as u64, bits);
        bits
    }

    /// Quantizes `value` over `[min, max]` into `num_bits` (1..=32) bits.
    ///
    /// Values outside the range are clamped. The scaled value is truncated,
    /// so every code but the top one covers a full quantization step.
    pub fn write_ranged_f32(&mut self, value: f32, min: f32, max: f32, num_bits: u32) {
        debug_assert!((1..=32).contains(&num_bits));

        let max_code = ((1u64 << num_bits) - 1) as f64;
        let unit = ((f64::from(value) - f64::from(min)) / (f64::from(max) - f64::from(min))).clamp(0.0, 1.0);
        self.write_bits((unit * max_code) as u64, num_bits);
    }

    /// Packs an angle in radians into `num_bits` (1..=32) bits.
    ///
    /// The angle is wrapped to `[-π, π)`; the code that would represent a
    /// full turn wraps to zero.
    pub fn write_angle(&mut self, radians: f32, num_bits: u32) {
        debug_assert!((1..=32).contains(&num_bits));

        let steps = 1u64 << num_bits;
        let wrapped = wrap_angle(radians);
        let scaled = ((f64::from(wrapped) + std::f64::consts::PI) / std::f64::consts::TAU) * steps as f64;
        let mut code = scaled.round() as u64;
        if code >= steps {
            code = 0;
        }
        self.write_bits(code, num_bits);
    }
}

/// Bits used by a ranged value over `[min, max]`.
#[inline]
#[must_use]
pub const fn ranged_bits(min: i64, max: i64) -> u32 {
    math::bits_to_hold(max.wrapping_sub(min) as u64)
}

/// Wraps an angle in radians to `[-π, π)`.
#[inline]
#[must_use]
pub fn wrap_angle(radians: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    (radians + PI).rem_euclid(TAU) - PI
}
