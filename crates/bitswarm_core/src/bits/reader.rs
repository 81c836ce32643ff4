//! # Bit Reader
//!
//! Borrowed, bit-addressed cursor over a received frame.
//!
//! ## Design
//!
//! - Never allocates except for the returned value itself
//! - Plain `read_*` calls treat an overrun as a fault and panic
//! - `try_*` calls check the remaining bits first and return [`CodecError`]
//!
//! Decoding untrusted input should go through the `try_*` family.

use super::math;
use super::writer::{ranged_bits, FRAME_HEADER_BITS};
use crate::error::{CodecError, CodecResult};

/// Longest accepted variable-length integer, in bytes.
pub const MAX_VAR_INT_BYTES: usize = 10;

/// Bit cursor over a borrowed buffer.
#[derive(Clone, Debug)]
pub struct BitReader<'a> {
    data: &'a [u8],
    /// Declared length in bits; reads never pass it.
    length_bits: usize,
    /// Read cursor in bits.
    position: usize,
}

impl<'a> BitReader<'a> {
    /// Reads every bit of `data`.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            length_bits: data.len() * 8,
            position: 0,
        }
    }

    /// Reads the first `length_bits` bits of `data`.
    ///
    /// # Panics
    ///
    /// Panics if `length_bits` exceeds the buffer.
    #[must_use]
    pub fn with_bit_len(data: &'a [u8], length_bits: usize) -> Self {
        assert!(length_bits <= data.len() * 8, "bit length exceeds buffer");
        Self {
            data,
            length_bits,
            position: 0,
        }
    }

    /// Opens a frame produced by a framed [`BitWriter`](super::BitWriter).
    ///
    /// The 3-bit header yields the exact payload length; the cursor starts
    /// just past it.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidFrameHeader`] for an empty frame or a
    /// padding count that leaves no room for the header.
    pub fn from_frame(data: &'a [u8]) -> CodecResult<Self> {
        let Some(&first) = data.first() else {
            return Err(CodecError::InvalidFrameHeader { len: 0, padding: 0 });
        };
        let padding = first & 0b111;
        let total = data.len() * 8;
        if total < FRAME_HEADER_BITS + usize::from(padding) {
            return Err(CodecError::InvalidFrameHeader {
                len: data.len(),
                padding,
            });
        }
        Ok(Self {
            data,
            length_bits: total - usize::from(padding),
            position: FRAME_HEADER_BITS,
        })
    }

    /// Current cursor position in bits.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Declared length in bits.
    #[inline]
    #[must_use]
    pub const fn bit_len(&self) -> usize {
        self.length_bits
    }

    /// Bits left before the declared length.
    #[inline]
    #[must_use]
    pub const fn remaining_bits(&self) -> usize {
        self.length_bits - self.position
    }

    /// Returns true once every declared bit has been consumed.
    #[inline]
    #[must_use]
    pub const fn is_at_end(&self) -> bool {
        self.position >= self.length_bits
    }

    /// Checks that `bits` more bits can be read.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::ReadPastEnd`] otherwise.
    #[inline]
    pub const fn ensure(&self, bits: usize) -> CodecResult<()> {
        if bits > self.remaining_bits() {
            return Err(CodecError::ReadPastEnd {
                requested: bits,
                remaining: self.remaining_bits(),
            });
        }
        Ok(())
    }

    #[inline]
    fn advance(&mut self, bits: usize) -> usize {
        assert!(
            bits <= self.remaining_bits(),
            "read of {bits} bits past end of buffer ({} remaining)",
            self.remaining_bits()
        );
        let at = self.position;
        self.position += bits;
        at
    }

    // ------------------------------------------------------------------
    // Unguarded reads
    // ------------------------------------------------------------------

    /// Reads `num_bits` (0..=64) bits.
    #[inline]
    pub fn read_bits(&mut self, num_bits: u32) -> u64 {
        let at = self.advance(num_bits as usize);
        math::read_u64(self.data, num_bits, at)
    }

    /// Reads one bit.
    #[inline]
    pub fn read_bool(&mut self) -> bool {
        let at = self.advance(1);
        math::read_byte(self.data, 1, at) != 0
    }

    /// Reads a byte.
    #[inline]
    pub fn read_u8(&mut self) -> u8 {
        let at = self.advance(8);
        math::read_byte(self.data, 8, at)
    }

    /// Reads an `i8` by native cast.
    #[inline]
    pub fn read_i8(&mut self) -> i8 {
        self.read_u8() as i8
    }

    /// Reads a full-width `u16`.
    #[inline]
    pub fn read_u16(&mut self) -> u16 {
        let at = self.advance(16);
        math::read_u16(self.data, 16, at)
    }

    /// Reads a full-width `i16` by native cast.
    #[inline]
    pub fn read_i16(&mut self) -> i16 {
        self.read_u16() as i16
    }

    /// Reads a full-width `u32`.
    #[inline]
    pub fn read_u32(&mut self) -> u32 {
        let at = self.advance(32);
        math::read_u32(self.data, 32, at)
    }

    /// Reads a full-width `i32` by native cast.
    #[inline]
    pub fn read_i32(&mut self) -> i32 {
        self.read_u32() as i32
    }

    /// Reads a full-width `u64`.
    #[inline]
    pub fn read_u64(&mut self) -> u64 {
        self.read_bits(64)
    }

    /// Reads a full-width `i64` by native cast.
    #[inline]
    pub fn read_i64(&mut self) -> i64 {
        self.read_u64() as i64
    }

    /// Reads a signed integer written by
    /// [`BitWriter::write_signed`](super::BitWriter::write_signed).
    ///
    /// The value is not sign-extended: a set sign bit yields
    /// `-(low_bits + 1)`.
    pub fn read_signed(&mut self, num_bits: u32) -> i64 {
        debug_assert!((1..=64).contains(&num_bits));

        let raw = self.read_bits(num_bits);
        if num_bits == 64 {
            return raw as i64;
        }

        let sign = 1u64 << (num_bits - 1);
        if raw & sign == 0 {
            raw as i64
        } else {
            -((raw & (sign - 1)) as i64) - 1
        }
    }

    /// Reads an `f32` bit pattern, copying directly when byte-aligned.
    pub fn read_f32(&mut self) -> f32 {
        if self.position & 7 == 0 {
            let at = self.advance(32) >> 3;
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&self.data[at..at + 4]);
            return f32::from_le_bytes(raw);
        }
        f32::from_bits(self.read_u32())
    }

    /// Reads an `f64` bit pattern, copying directly when byte-aligned.
    pub fn read_f64(&mut self) -> f64 {
        if self.position & 7 == 0 {
            let at = self.advance(64) >> 3;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&self.data[at..at + 8]);
            return f64::from_le_bytes(raw);
        }
        f64::from_bits(self.read_u64())
    }

    /// Fills `dest` with bytes from the current bit offset.
    pub fn read_bytes_into(&mut self, dest: &mut [u8]) {
        let at = self.advance(dest.len() * 8);
        math::read_bytes(self.data, at, dest);
    }

    /// Reads a value written by
    /// [`BitWriter::write_ranged`](super::BitWriter::write_ranged).
    pub fn read_ranged(&mut self, min: i64, max: i64) -> i64 {
        let raw = self.read_bits(ranged_bits(min, max));
        min.wrapping_add(raw as i64)
    }

    /// Reads a value written by
    /// [`BitWriter::write_ranged_f32`](super::BitWriter::write_ranged_f32).
    pub fn read_ranged_f32(&mut self, min: f32, max: f32, num_bits: u32) -> f32 {
        let max_code = ((1u64 << num_bits) - 1) as f64;
        let code = self.read_bits(num_bits) as f64;
        (f64::from(min) + (code / max_code) * (f64::from(max) - f64::from(min))) as f32
    }

    /// Reads an angle written by
    /// [`BitWriter::write_angle`](super::BitWriter::write_angle), in `[-π, π)`.
    pub fn read_angle(&mut self, num_bits: u32) -> f32 {
        let steps = (1u64 << num_bits) as f64;
        let code = self.read_bits(num_bits) as f64;
        (code / steps * std::f64::consts::TAU - std::f64::consts::PI) as f32
    }

    // ------------------------------------------------------------------
    // Guarded reads
    // ------------------------------------------------------------------

    /// Guarded [`BitReader::read_bits`].
    ///
    /// # Errors
    ///
    /// [`CodecError::ReadPastEnd`] if fewer than `num_bits` remain.
    #[inline]
    pub fn try_read_bits(&mut self, num_bits: u32) -> CodecResult<u64> {
        self.ensure(num_bits as usize)?;
        Ok(self.read_bits(num_bits))
    }

    /// Guarded [`BitReader::read_bool`].
    ///
    /// # Errors
    ///
    /// [`CodecError::ReadPastEnd`] at the end of the buffer.
    #[inline]
    pub fn try_read_bool(&mut self) -> CodecResult<bool> {
        self.ensure(1)?;
        Ok(self.read_bool())
    }

    /// Guarded [`BitReader::read_u8`].
    ///
    /// # Errors
    ///
    /// [`CodecError::ReadPastEnd`] if fewer than 8 bits remain.
    #[inline]
    pub fn try_read_u8(&mut self) -> CodecResult<u8> {
        self.ensure(8)?;
        Ok(self.read_u8())
    }

    /// Guarded [`BitReader::read_i8`].
    ///
    /// # Errors
    ///
    /// [`CodecError::ReadPastEnd`] if fewer than 8 bits remain.
    #[inline]
    pub fn try_read_i8(&mut self) -> CodecResult<i8> {
        self.ensure(8)?;
        Ok(self.read_i8())
    }

    /// Guarded [`BitReader::read_u16`].
    ///
    /// # Errors
    ///
    /// [`CodecError::ReadPastEnd`] if fewer than 16 bits remain.
    #[inline]
    pub fn try_read_u16(&mut self) -> CodecResult<u16> {
        self.ensure(16)?;
        Ok(self.read_u16())
    }

    /// Guarded [`BitReader::read_i16`].
    ///
    /// # Errors
    ///
    /// [`CodecError::ReadPastEnd`] if fewer than 16 bits remain.
    #[inline]
    pub fn try_read_i16(&mut self) -> CodecResult<i16> {
        self.ensure(16)?;
        Ok(self.read_i16())
    }

    /// Guarded [`BitReader::read_u32`].
    ///
    /// # Errors
    ///
    /// [`CodecError::ReadPastEnd`] if fewer than 32 bits remain.
    #[inline]
    pub fn try_read_u32(&mut self) -> CodecResult<u32> {
        self.ensure(32)?;
        Ok(self.read_u32())
    }

    /// Guarded [`BitReader::read_i32`].
    ///
    /// # Errors
    ///
    /// [`CodecError::ReadPastEnd`] if fewer than 32 bits remain.
    #[inline]
    pub fn try_read_i32(&mut self) -> CodecResult<i32> {
        self.ensure(32)?;
        Ok(self.read_i32())
    }

    /// Guarded [`BitReader::read_u64`].
    ///
    /// # Errors
    ///
    /// [`CodecError::ReadPastEnd`] if fewer than 64 bits remain.
    #[inline]
    pub fn try_read_u64(&mut self) -> CodecResult<u64> {
        self.ensure(64)?;
        Ok(self.read_u64())
    }

    /// Guarded [`BitReader::read_i64`].
    ///
    /// # Errors
    ///
    /// [`CodecError::ReadPastEnd`] if fewer than 64 bits remain.
    #[inline]
    pub fn try_read_i64(&mut self) -> CodecResult<i64> {
        self.ensure(64)?;
        Ok(self.read_i64())
    }

    /// Guarded [`BitReader::read_signed`].
    ///
    /// # Errors
    ///
    /// [`CodecError::ReadPastEnd`] if fewer than `num_bits` remain.
    #[inline]
    pub fn try_read_signed(&mut self, num_bits: u32) -> CodecResult<i64> {
        self.ensure(num_bits as usize)?;
        Ok(self.read_signed(num_bits))
    }

    /// Guarded [`BitReader::read_f32`].
    ///
    /// # Errors
    ///
    /// [`CodecError::ReadPastEnd`] if fewer than 32 bits remain.
    #[inline]
    pub fn try_read_f32(&mut self) -> CodecResult<f32> {
        self.ensure(32)?;
        Ok(self.read_f32())
    }

    /// Guarded [`BitReader::read_f64`].
    ///
    /// # Errors
    ///
    /// [`CodecError::ReadPastEnd`] if fewer than 64 bits remain.
    #[inline]
    pub fn try_read_f64(&mut self) -> CodecResult<f64> {
        self.ensure(64)?;
        Ok(self.read_f64())
    }

    /// Reads `len` raw bytes into a new vector.
    ///
    /// The length is checked against the remaining bits before allocating.
    ///
    /// # Errors
    ///
    /// [`CodecError::ReadPastEnd`] if the buffer is too short.
    pub fn try_read_bytes(&mut self, len: usize) -> CodecResult<Vec<u8>> {
        self.ensure(len.saturating_mul(8))?;
        let mut out = vec![0u8; len];
        self.read_bytes_into(&mut out);
        Ok(out)
    }

    /// Reads a variable-length unsigned integer.
    ///
    /// # Errors
    ///
    /// [`CodecError::ReadPastEnd`] on truncation,
    /// [`CodecError::VarIntOverflow`] past [`MAX_VAR_INT_BYTES`].
    pub fn try_read_var_u64(&mut self) -> CodecResult<u64> {
        let mut value = 0u64;
        for index in 0..MAX_VAR_INT_BYTES {
            let byte = self.try_read_u8()?;
            // the last byte holds only bit 63
            if index == MAX_VAR_INT_BYTES - 1 && byte & 0x7E != 0 {
                return Err(CodecError::VarIntOverflow);
            }
            value |= u64::from(byte & 0x7F) << (7 * index);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(CodecError::VarIntOverflow)
    }

    /// Reads a length-prefixed byte block.
    ///
    /// # Errors
    ///
    /// Fails on a bad length prefix or a truncated payload.
    pub fn try_read_byte_block(&mut self) -> CodecResult<Vec<u8>> {
        let len = self.try_read_var_u64()?;
        let len = usize::try_from(len).map_err(|_| CodecError::ReadPastEnd {
            requested: usize::MAX,
            remaining: self.remaining_bits(),
        })?;
        self.try_read_bytes(len)
    }

    /// Reads a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Fails on truncation or invalid UTF-8.
    pub fn try_read_string(&mut self) -> CodecResult<String> {
        let bytes = self.try_read_byte_block()?;
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
    }

    /// Guarded [`BitReader::read_ranged`] that also rejects codes above `max`.
    ///
    /// # Errors
    ///
    /// [`CodecError::ReadPastEnd`] on truncation,
    /// [`CodecError::OutOfRange`] when the decoded value exceeds `max`.
    pub fn try_read_ranged(&mut self, min: i64, max: i64) -> CodecResult<i64> {
        let raw = self.try_read_bits(ranged_bits(min, max))?;
        if raw > max.wrapping_sub(min) as u64 {
            return Err(CodecError::OutOfRange {
                value: min.wrapping_add(raw as i64),
                min,
                max,
            });
        }
        Ok(min.wrapping_add(raw as i64))
    }

    /// Guarded [`BitReader::read_ranged_f32`].
    ///
    /// # Errors
    ///
    /// [`CodecError::ReadPastEnd`] if fewer than `num_bits` remain.
    pub fn try_read_ranged_f32(&mut self, min: f32, max: f32, num_bits: u32) -> CodecResult<f32> {
        self.ensure(num_bits as usize)?;
        Ok(self.read_ranged_f32(min, max, num_bits))
    }

    /// Guarded [`BitReader::read_angle`].
    ///
    /// # Errors
    ///
    /// [`CodecError::ReadPastEnd`] if fewer than `num_bits` remain.
    pub fn try_read_angle(&mut self, num_bits: u32) -> CodecResult<f32> {
        self.ensure(num_bits as usize)?;
        Ok(self.read_angle(num_bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitWriter;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_unsigned_round_trip_all_widths() {
        let mut rng = StdRng::seed_from_u64(0xB175);

        for bits in 1..=64u32 {
            let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
            let values = [0, 1, mask, mask >> 1, rng.gen::<u64>() & mask];

            // a one-bit prefix pushes every value off byte alignment
            for offset in 0..2 {
                let mut writer = BitWriter::new();
                for _ in 0..offset {
                    writer.write_bool(true);
                }
                for &v in &values {
                    writer.write_bits(v, bits);
                }

                let mut reader = BitReader::with_bit_len(writer.as_bytes(), writer.bit_len());
                for _ in 0..offset {
                    assert!(reader.read_bool());
                }
                for &v in &values {
                    assert_eq!(reader.read_bits(bits), v, "width {bits} offset {offset}");
                }
                assert!(reader.is_at_end());
            }
        }
    }

    #[test]
    fn test_signed_round_trip_all_widths() {
        let mut rng = StdRng::seed_from_u64(0x5167);

        for bits in 1..=64u32 {
            let (min, max) = if bits == 64 {
                (i64::MIN, i64::MAX)
            } else {
                (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
            };
            let values = [min, max, 0, (-1i64).max(min), rng.gen_range(min..=max)];

            let mut writer = BitWriter::new();
            writer.write_bool(false);
            for &v in &values {
                writer.write_signed(v, bits);
            }

            let mut reader = BitReader::with_bit_len(writer.as_bytes(), writer.bit_len());
            assert!(!reader.read_bool());
            for &v in &values {
                assert_eq!(reader.read_signed(bits), v, "width {bits}");
            }
        }
    }

    #[test]
    fn test_signed_decode_does_not_sign_extend() {
        // raw 0b1011 in four bits: low bits 3, so -(3 + 1)
        let data = [0b1011u8];
        let mut reader = BitReader::with_bit_len(&data, 4);
        assert_eq!(reader.read_signed(4), -4);
    }

    #[test]
    fn test_native_width_signed() {
        let mut writer = BitWriter::new();
        writer.write_i8(-128);
        writer.write_i16(-2);
        writer.write_i32(i32::MIN);
        writer.write_i64(-7);

        let mut reader = BitReader::new(writer.as_bytes());
        assert_eq!(reader.read_i8(), -128);
        assert_eq!(reader.read_i16(), -2);
        assert_eq!(reader.read_i32(), i32::MIN);
        assert_eq!(reader.read_i64(), -7);
    }

    #[test]
    fn test_floats_aligned_and_unaligned() {
        let floats = [0.0f32, -0.0, 1.5, f32::MIN_POSITIVE, f32::INFINITY, f32::from_bits(0x7FC0_0001)];
        let doubles = [0.0f64, -2.25, f64::MAX, f64::from_bits(0x7FF8_0000_0000_0001)];

        for offset in [0usize, 3] {
            let mut writer = BitWriter::new();
            writer.write_bits(0, offset as u32);
            for &f in &floats {
                writer.write_f32(f);
            }
            for &d in &doubles {
                writer.write_f64(d);
            }

            let mut reader = BitReader::with_bit_len(writer.as_bytes(), writer.bit_len());
            reader.read_bits(offset as u32);
            for &f in &floats {
                assert_eq!(reader.read_f32().to_bits(), f.to_bits());
            }
            for &d in &doubles {
                assert_eq!(reader.read_f64().to_bits(), d.to_bits());
            }
        }
    }

    #[test]
    fn test_var_u64_round_trip() {
        let values = [0u64, 127, 128, 16_384, 4_294_967_295, u64::MAX];

        let mut writer = BitWriter::new();
        writer.write_bool(true);
        for &v in &values {
            writer.write_var_u64(v);
        }

        let mut reader = BitReader::with_bit_len(writer.as_bytes(), writer.bit_len());
        reader.read_bool();
        for &v in &values {
            assert_eq!(reader.try_read_var_u64().unwrap(), v);
        }
    }

    #[test]
    fn test_var_u64_overflow() {
        let data = [0xFFu8; 11];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.try_read_var_u64(), Err(CodecError::VarIntOverflow));
    }

    #[test]
    fn test_var_u64_tenth_byte_beyond_bit_63() {
        let mut data = [0xFFu8; 10];
        data[9] = 0x01;
        assert_eq!(BitReader::new(&data).try_read_var_u64(), Ok(u64::MAX));

        data[9] = 0x02;
        assert_eq!(BitReader::new(&data).try_read_var_u64(), Err(CodecError::VarIntOverflow));
        data[9] = 0x7F;
        assert_eq!(BitReader::new(&data).try_read_var_u64(), Err(CodecError::VarIntOverflow));
    }

    #[test]
    fn test_strings() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b101, 3);
        writer.write_string("");
        writer.write_string("héllo swarm");

        let mut reader = BitReader::with_bit_len(writer.as_bytes(), writer.bit_len());
        reader.read_bits(3);
        assert_eq!(reader.try_read_string().unwrap(), "");
        assert_eq!(reader.try_read_string().unwrap(), "héllo swarm");
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_invalid_utf8() {
        let mut writer = BitWriter::new();
        writer.write_byte_block(&[0xC3, 0x28]);

        let mut reader = BitReader::new(writer.as_bytes());
        assert_eq!(reader.try_read_string(), Err(CodecError::InvalidUtf8));
    }

    #[test]
    fn test_ranged_round_trip_every_value() {
        for (min, max) in [(0i64, 0i64), (0, 1), (-3, 4), (10, 265), (-1000, -1)] {
            let mut writer = BitWriter::new();
            for v in min..=max {
                writer.write_ranged(min, max, v);
            }

            let mut reader = BitReader::with_bit_len(writer.as_bytes(), writer.bit_len());
            for v in min..=max {
                assert_eq!(reader.try_read_ranged(min, max).unwrap(), v);
            }
            assert!(reader.is_at_end());
        }
    }

    #[test]
    fn test_ranged_rejects_code_above_max() {
        // range [0, 4] uses 3 bits; code 7 is out of bounds
        let data = [0b111u8];
        let mut reader = BitReader::with_bit_len(&data, 3);
        assert_eq!(
            reader.try_read_ranged(0, 4),
            Err(CodecError::OutOfRange { value: 7, min: 0, max: 4 })
        );
    }

    #[test]
    fn test_ranged_f32_quantization() {
        let mut writer = BitWriter::new();
        writer.write_ranged_f32(0.5, 0.0, 1.0, 10);
        writer.write_ranged_f32(7.0, 0.0, 1.0, 10);

        let mut reader = BitReader::new(writer.as_bytes());
        assert!((reader.read_ranged_f32(0.0, 1.0, 10) - 0.5).abs() < 1.0 / 1023.0);
        assert!((reader.read_ranged_f32(0.0, 1.0, 10) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_ranged_f32_truncates_toward_lower_code() {
        let mut writer = BitWriter::new();
        writer.write_ranged_f32(0.999, 0.0, 1.0, 2);
        writer.write_ranged_f32(1.0, 0.0, 1.0, 2);

        let mut reader = BitReader::new(writer.as_bytes());
        assert_eq!(reader.read_bits(2), 2);
        assert_eq!(reader.read_bits(2), 3);
    }

    #[test]
    fn test_angle_round_trip() {
        let mut writer = BitWriter::new();
        writer.write_angle(1.0, 12);
        writer.write_angle(std::f32::consts::PI, 12);

        let mut reader = BitReader::new(writer.as_bytes());
        assert!((reader.read_angle(12) - 1.0).abs() < 0.002);
        // +π wraps to -π
        assert!((reader.read_angle(12) + std::f32::consts::PI).abs() < 0.002);
    }

    #[test]
    fn test_guarded_read_past_end() {
        let data = [0u8; 1];
        let mut reader = BitReader::with_bit_len(&data, 5);
        assert_eq!(reader.try_read_bits(5), Ok(0));
        assert_eq!(
            reader.try_read_bool(),
            Err(CodecError::ReadPastEnd { requested: 1, remaining: 0 })
        );
    }

    #[test]
    #[should_panic(expected = "past end of buffer")]
    fn test_unguarded_read_past_end_faults() {
        let data = [0u8; 1];
        let mut reader = BitReader::new(&data);
        reader.read_u16();
    }

    #[test]
    fn test_frame_round_trip() {
        let mut writer = BitWriter::framed();
        writer.write_bool(true);
        writer.write_ranged(0, 2, 2);
        writer.write_string("abc");
        let frame = writer.to_frame();

        let mut reader = BitReader::from_frame(&frame).unwrap();
        assert!(reader.read_bool());
        assert_eq!(reader.read_ranged(0, 2), 2);
        assert_eq!(reader.try_read_string().unwrap(), "abc");
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_frame_header_errors() {
        assert!(BitReader::from_frame(&[]).is_err());
        // one byte cannot hold 3 header bits plus 6 padding bits
        assert!(BitReader::from_frame(&[0b110]).is_err());
        assert!(BitReader::from_frame(&[0b101]).unwrap().is_at_end());
    }

    #[test]
    fn test_try_read_bytes_checks_before_allocating() {
        let mut writer = BitWriter::new();
        writer.write_var_u64(1 << 40);

        let mut reader = BitReader::new(writer.as_bytes());
        assert!(matches!(
            reader.try_read_byte_block(),
            Err(CodecError::ReadPastEnd { .. })
        ));
    }
}
