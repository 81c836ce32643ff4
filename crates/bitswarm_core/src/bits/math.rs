//! # Bit Arithmetic
//!
//! Stateless read/write of bit runs at arbitrary bit offsets.
//!
//! ## Layout
//!
//! Bit `n` of a stream lives in byte `n / 8` at position `n % 8`, counting
//! from the least significant bit. Multi-byte values are emitted in 8-bit
//! chunks, least significant chunk first, so a byte-aligned `u32` is laid
//! out exactly like `u32::to_le_bytes`.
//!
//! ```text
//!  offset 5, 8 bits of 0bHHHLLLLL
//!  byte p   : [L L L . . . . .]  low part, shifted up by 5
//!  byte p+1 : [. . . . . H H H]  high part, shifted down by 3
//! ```
//!
//! None of these functions grow the destination; callers size it first.

/// Writes the low `num_bits` (1..=8) of `source` at `dest_bit_offset`.
///
/// Bits of `dest` outside the written run are preserved.
#[inline]
pub fn write_byte(source: u8, num_bits: u32, dest: &mut [u8], dest_bit_offset: usize) {
    debug_assert!((1..=8).contains(&num_bits));

    let source = u32::from(source) & (0xFF >> (8 - num_bits));
    let p = dest_bit_offset >> 3;
    let bits_used = (dest_bit_offset & 7) as u32;

    if bits_used == 0 && num_bits == 8 {
        dest[p] = source as u8;
        return;
    }

    let bits_free = 8 - bits_used;
    if num_bits <= bits_free {
        let bits_left = bits_free - num_bits;
        let keep = (0xFF_u32 >> bits_free) | (0xFF_u32 << (8 - bits_left));
        dest[p] = ((u32::from(dest[p]) & keep) | (source << bits_used)) as u8;
        return;
    }

    dest[p] = ((u32::from(dest[p]) & (0xFF >> bits_free)) | (source << bits_used)) as u8;
    let spill = num_bits - bits_free;
    dest[p + 1] = ((u32::from(dest[p + 1]) & (0xFF << spill)) | (source >> bits_free)) as u8;
}

/// Reads `num_bits` (1..=8) starting at `read_bit_offset`.
#[inline]
#[must_use]
pub fn read_byte(source: &[u8], num_bits: u32, read_bit_offset: usize) -> u8 {
    debug_assert!((1..=8).contains(&num_bits));

    let p = read_bit_offset >> 3;
    let start = (read_bit_offset & 7) as u32;

    if start == 0 && num_bits == 8 {
        return source[p];
    }

    let first = u32::from(source[p]) >> start;
    let in_first = 8 - start;
    if num_bits <= in_first {
        return (first & (0xFF >> (8 - num_bits))) as u8;
    }

    let in_second = num_bits - in_first;
    let second = u32::from(source[p + 1]) & (0xFF >> (8 - in_second));
    (first | (second << in_first)) as u8
}

/// Copies whole bytes into `dest` starting at any bit offset.
///
/// Aligned offsets take a block copy; otherwise each source byte is split
/// into a low part for the current byte and a high part for the next.
pub fn write_bytes(source: &[u8], dest: &mut [u8], dest_bit_offset: usize) {
    let mut p = dest_bit_offset >> 3;
    let first_part = (dest_bit_offset & 7) as u32;

    if first_part == 0 {
        dest[p..p + source.len()].copy_from_slice(source);
        return;
    }

    let last_part = 8 - first_part;
    for &byte in source {
        let byte = u32::from(byte);
        dest[p] = ((u32::from(dest[p]) & (0xFF >> last_part)) | (byte << first_part)) as u8;
        p += 1;
        dest[p] = ((u32::from(dest[p]) & (0xFF << first_part)) | (byte >> last_part)) as u8;
    }
}

/// Fills `dest` with whole bytes read from any bit offset.
pub fn read_bytes(source: &[u8], read_bit_offset: usize, dest: &mut [u8]) {
    let mut p = read_bit_offset >> 3;
    let offset = (read_bit_offset & 7) as u32;

    if offset == 0 {
        dest.copy_from_slice(&source[p..p + dest.len()]);
        return;
    }

    for out in dest.iter_mut() {
        let low = u32::from(source[p]) >> offset;
        p += 1;
        let high = u32::from(source[p]) << (8 - offset);
        *out = (low | high) as u8;
    }
}

/// Writes the low `num_bits` (0..=64) of `source`, least significant chunk first.
pub fn write_u64(source: u64, num_bits: u32, dest: &mut [u8], dest_bit_offset: usize) {
    debug_assert!(num_bits <= 64);

    let mut value = source;
    let mut remaining = num_bits;
    let mut offset = dest_bit_offset;
    while remaining >= 8 {
        write_byte(value as u8, 8, dest, offset);
        value >>= 8;
        offset += 8;
        remaining -= 8;
    }
    if remaining > 0 {
        write_byte(value as u8, remaining, dest, offset);
    }
}

/// Reads `num_bits` (0..=64) into the low bits of a `u64`.
#[must_use]
pub fn read_u64(source: &[u8], num_bits: u32, read_bit_offset: usize) -> u64 {
    debug_assert!(num_bits <= 64);

    let mut value = 0u64;
    let mut shift = 0;
    let mut offset = read_bit_offset;
    while num_bits - shift >= 8 {
        value |= u64::from(read_byte(source, 8, offset)) << shift;
        offset += 8;
        shift += 8;
    }
    if num_bits > shift {
        value |= u64::from(read_byte(source, num_bits - shift, offset)) << shift;
    }
    value
}

/// Writes the low `num_bits` (0..=32) of a `u32`.
#[inline]
pub fn write_u32(source: u32, num_bits: u32, dest: &mut [u8], dest_bit_offset: usize) {
    debug_assert!(num_bits <= 32);
    write_u64(u64::from(source), num_bits, dest, dest_bit_offset);
}

/// Reads `num_bits` (0..=32) into a `u32`.
#[inline]
#[must_use]
pub fn read_u32(source: &[u8], num_bits: u32, read_bit_offset: usize) -> u32 {
    debug_assert!(num_bits <= 32);
    read_u64(source, num_bits, read_bit_offset) as u32
}

/// Writes the low `num_bits` (0..=16) of a `u16`.
#[inline]
pub fn write_u16(source: u16, num_bits: u32, dest: &mut [u8], dest_bit_offset: usize) {
    debug_assert!(num_bits <= 16);
    write_u64(u64::from(source), num_bits, dest, dest_bit_offset);
}

/// Reads `num_bits` (0..=16) into a `u16`.
#[inline]
#[must_use]
pub fn read_u16(source: &[u8], num_bits: u32, read_bit_offset: usize) -> u16 {
    debug_assert!(num_bits <= 16);
    read_u64(source, num_bits, read_bit_offset) as u16
}

/// Minimum number of bits (at least 1) that can hold every integer in `[0, value]`.
#[inline]
#[must_use]
pub const fn bits_to_hold(value: u64) -> u32 {
    let bits = 64 - value.leading_zeros();
    if bits == 0 {
        1
    } else {
        bits
    }
}
