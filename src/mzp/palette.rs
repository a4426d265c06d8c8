//! Palettes for indexed images
//!
//! Entries are stored as R, G, B, A quads where alpha only uses the range
//! `0..=0x80`. Palettes shorter than 256 entries are padded with opaque black.

use crate::error::Result;
use std::io::Read;

pub const PALETTE_LEN: usize = 256;

const OPAQUE_BLACK: [u8; 4] = [0x00, 0x00, 0x00, 0xFF];

/// How palette entries are ordered on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteLayout {
    /// Entry `i` is quad `i`
    Linear,
    /// 0x80-byte pages of four 8-entry sub-blocks, the middle two swapped
    /// (the PS2 CLUT arrangement)
    BlockInterleaved,
}

impl PaletteLayout {
    /// Byte offset of entry `index` from the start of the palette
    fn quad_offset(self, index: usize) -> usize {
        match self {
            PaletteLayout::Linear => index * 4,
            PaletteLayout::BlockInterleaved => {
                let page = index / 32;
                let sub_block = (index % 32) / 8;
                let sub_block = (sub_block & 1) * 2 + (sub_block >> 1);
                page * 0x80 + sub_block * 0x20 + (index % 8) * 4
            }
        }
    }
}

/// Maps the stored 7-bit alpha onto the full byte range
///
/// `0x7F` and everything from `0x80` up become fully opaque.
pub fn expand_alpha(raw: u8) -> u8 {
    if raw < 0x80 {
        (raw << 1) + (raw >> 6)
    } else {
        0xFF
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: [[u8; 4]; PALETTE_LEN],
    declared: usize,
}

impl Palette {
    /// Reads `count` entries (at most 256) laid out as `layout`
    pub fn read<R: Read + ?Sized>(src: &mut R, layout: PaletteLayout, count: usize) -> Result<Palette> {
        let mut raw = vec![0; count * 4];
        src.read_exact(&mut raw)?;

        let mut colors = [OPAQUE_BLACK; PALETTE_LEN];
        for (index, color) in colors.iter_mut().enumerate().take(count) {
            let offset = layout.quad_offset(index);
            let quad = &raw[offset..offset + 4];
            *color = [quad[0], quad[1], quad[2], expand_alpha(quad[3])];
        }

        Ok(Palette {
            colors,
            declared: count,
        })
    }

    /// Number of entries actually stored in the file
    pub fn declared_len(&self) -> usize {
        self.declared
    }

    pub fn color(&self, index: u8) -> [u8; 4] {
        self.colors[usize::from(index)]
    }

    /// RGB triples for a PNG `PLTE` chunk
    pub fn rgb_bytes(&self) -> Vec<u8> {
        self.colors.iter().flat_map(|c| c[..3].iter().copied()).collect()
    }

    /// Alpha values for a PNG `tRNS` chunk
    pub fn alpha_bytes(&self) -> Vec<u8> {
        self.colors.iter().map(|c| c[3]).collect()
    }

    /// BGRA quads for a TGA colour map
    pub fn bgra_bytes(&self) -> Vec<u8> {
        self.colors
            .iter()
            .flat_map(|&[r, g, b, a]| [b, g, r, a])
            .collect()
    }
}
