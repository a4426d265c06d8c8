//! Functions for compressing/decompressing MZX0-formatted data
//!
//! MZX0 works in 2-byte units. Every operation starts with a control byte
//! whose low two bits select the operation and whose upper six bits hold a
//! count or index `n`:
//!
//! | op | meaning |
//! |----|---------|
//! | 0  | repeat the last unit `n + 1` times |
//! | 1  | copy `n + 1` units from `2 * (k + 1)` bytes back in the output, `k` being the next input byte |
//! | 2  | repeat unit `n` of the ring buffer |
//! | 3  | `n + 1` literal units, each also pushed into the 64-slot ring buffer |
//!
//! Every 0x1000 units the last unit is reset to the sentinel, which is all
//! zeroes, or all `0xFF` when the stream is xor'd.
//!
//! The encoder here only ever emits literal runs. It is what the game's own
//! tools produce, and the decoder stays fully general for everything else.

use crate::error::{Error, Result};
use crate::io_traits::ReadFields;
use std::convert::TryFrom;
use std::io::{Cursor, Read};

pub const MAGIC: &[u8; 4] = b"MZX0";
pub const HEADER_LEN: usize = 8;

/// Prefix found in front of compressed ATRAC (RIFF/WAVE) payloads
pub const ATRAC_PREFIX: &[u8; 7] = b"LV\x03\x00\x00\x09\x00";

const RING_LEN: usize = 64;
const CLEAR_INTERVAL: i32 = 0x1000;

// One full literal op: control byte 0xFF, 64 units
const LITERAL_BLOCK: usize = 0x80;

type Unit = [u8; 2];

/// Decompresses a raw MZX0 block (no `MZX0` header) to exactly `output_len` bytes
///
/// If `xor_mode` is true literal units are stored xor'd with `0xFF`
/// and the sentinel unit is `FF FF`.
pub fn decompress(src: &[u8], output_len: usize, xor_mode: bool) -> Result<Vec<u8>> {
    let key = if xor_mode { 0xFF } else { 0x00 };
    let sentinel: Unit = [key; 2];

    let mut ring = [sentinel; RING_LEN];
    let mut ring_pos = 0;
    let mut last = sentinel;
    let mut clear_count = 0_i32;

    let mut src = src.iter().copied();
    // Ops write whole units, so the last one may overshoot by a byte
    let mut dst = Vec::with_capacity(output_len + 1);

    'decode: while dst.len() < output_len {
        let flags = match src.next() {
            Some(flags) => flags,
            None => break,
        };

        if clear_count <= 0 {
            clear_count = CLEAR_INTERVAL;
            last = sentinel;
        }

        let n = usize::from(flags >> 2);
        clear_count -= if flags & 0x03 == 2 { 1 } else { n as i32 + 1 };

        match flags & 0x03 {
            0 => {
                for _ in 0..=n {
                    dst.extend_from_slice(&last);
                }
            }
            1 => {
                let k = match src.next() {
                    Some(k) => k,
                    None => break,
                };
                let distance = 2 * (usize::from(k) + 1);

                for _ in 0..=n {
                    let position = dst.len();
                    let start = position
                        .checked_sub(distance)
                        .ok_or(Error::DecodeWindowUnderflow { position, distance })?;

                    last = [dst[start], dst[start + 1]];
                    dst.extend_from_slice(&last);
                }
            }
            2 => {
                last = ring[n];
                dst.extend_from_slice(&last);
            }
            _ => {
                for _ in 0..=n {
                    let unit = match (src.next(), src.next()) {
                        (Some(lo), Some(hi)) => [lo ^ key, hi ^ key],
                        _ => {
                            tracing::debug!(written = dst.len(), "MZX0 input ended inside a literal run");
                            break 'decode;
                        }
                    };

                    ring[ring_pos] = unit;
                    ring_pos = (ring_pos + 1) % RING_LEN;

                    last = unit;
                    dst.extend_from_slice(&last);
                }
            }
        }
    }

    if dst.len() < output_len {
        tracing::debug!(
            written = dst.len(),
            expected = output_len,
            "MZX0 input exhausted early, zero padding"
        );
    }
    dst.resize(output_len, 0);

    Ok(dst)
}

/// Reads `input_len` bytes of raw MZX0 data from `src` and decompresses them
pub fn decompress_from<R: Read + ?Sized>(
    src: &mut R,
    input_len: usize,
    output_len: usize,
    xor_mode: bool,
) -> Result<Vec<u8>> {
    let mut block = Vec::with_capacity(input_len);
    src.take(input_len as u64).read_to_end(&mut block)?;

    decompress(&block, output_len, xor_mode)
}

/// Decompresses a whole `.mzx` file: optional ATRAC prefix, `MZX0` magic,
/// LE32 decompressed size, then the compressed block
pub fn decompress_file(data: &[u8], xor_mode: bool) -> Result<Vec<u8>> {
    let (data, skipped) = strip_atrac_prefix(data);

    let mut src = Cursor::new(data);
    let magic = src.read_magic::<4>()?;
    if &magic != MAGIC {
        return Err(Error::bad_magic("MZX0 magic", skipped as u64, MAGIC, &magic));
    }
    let [output_len] = src.read_fields::<u32, 1>()?;

    decompress(&data[HEADER_LEN..], output_len as usize, xor_mode)
}

/// Compresses `src` into a `.mzx` file, header included
///
/// Only literal runs are emitted: 0x80-byte blocks, then the even remainder,
/// then a single trailing byte padded out to a whole unit.
pub fn compress(src: &[u8], xor_mode: bool) -> Result<Vec<u8>> {
    let key = if xor_mode { 0xFF } else { 0x00 };

    let input_len = u32::try_from(src.len()).map_err(|_| Error::FieldOverflow {
        field: "MZX0 decompressed size",
        value: src.len() as u64,
        max: u64::from(u32::MAX),
    })?;

    let mut dst = Vec::with_capacity(HEADER_LEN + src.len() + src.len() / LITERAL_BLOCK + 3);
    dst.extend_from_slice(MAGIC);
    dst.extend_from_slice(&input_len.to_le_bytes());

    let mut blocks = src.chunks_exact(LITERAL_BLOCK);
    for block in &mut blocks {
        dst.push(0xFF);
        dst.extend(block.iter().map(|b| b ^ key));
    }

    let rest = blocks.remainder();
    let units = rest.len() / 2;
    if units > 0 {
        dst.push(((units - 1) * 4 + 3) as u8);
        dst.extend(rest[..units * 2].iter().map(|b| b ^ key));
    }

    if rest.len() % 2 == 1 {
        // The padding byte is never xor'd; it's cut off on decompression anyway
        dst.push(0x03);
        dst.push(rest[units * 2] ^ key);
        dst.push(0x00);
    }

    Ok(dst)
}

/// Reads exactly `input_len` bytes from `src` and compresses them
pub fn compress_from<R: Read + ?Sized>(src: &mut R, input_len: usize, xor_mode: bool) -> Result<Vec<u8>> {
    let mut data = vec![0; input_len];
    src.read_exact(&mut data)?;

    compress(&data, xor_mode)
}

/// Splits off the ATRAC prefix, returning the rest and how many bytes were skipped
pub fn strip_atrac_prefix(data: &[u8]) -> (&[u8], usize) {
    if data.starts_with(ATRAC_PREFIX) {
        (&data[ATRAC_PREFIX.len()..], ATRAC_PREFIX.len())
    } else {
        (data, 0)
    }
}

/// Whether `data` is a RIFF/WAVE file, which gets the ATRAC prefix when compressed
pub fn is_riff_wave(data: &[u8]) -> bool {
    data.len() >= 0x10 && &data[..4] == b"RIFF" && &data[8..0x10] == b"WAVEfmt "
}
