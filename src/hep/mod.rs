//! HEP images, stored whole inside the tiles of `0x0C` bitmaps
//!
//! ```text
//! 0x00  magic      "HEP\0"
//! 0x04  file_size  header + width * height + palette
//! 0x08  unknown1
//! 0x0C  unknown2
//! 0x10  constant   always 0x10
//! 0x14  width
//! 0x18  height
//! 0x1C  transparency
//! 0x20  width * height palette indices
//!       256 RGBA palette quads
//! ```

use crate::error::{Error, Result};
use crate::io_traits::ReadFields;
use crate::mzp::header::Transparency;
use crate::mzp::palette::{Palette, PaletteLayout, PALETTE_LEN};
use std::io::Cursor;

pub const MAGIC: &[u8; 4] = b"HEP\0";
pub const HEADER_LEN: usize = 0x20;
pub const PALETTE_BYTES: usize = PALETTE_LEN * 4;

const CONSTANT_FIELD: u32 = 0x10;

#[derive(Debug, Clone)]
pub struct HepImage {
    pub width: u32,
    pub height: u32,
    pub transparency: Transparency,
    /// The two header words nobody has figured out yet, kept for reporting
    pub unknown: (u32, u32),
    pub indices: Vec<u8>,
    pub palette: Palette,
}

impl HepImage {
    pub fn parse(data: &[u8]) -> Result<HepImage> {
        let mut src = Cursor::new(data);

        let magic = src.read_magic::<4>()?;
        if &magic != MAGIC {
            return Err(Error::bad_magic("HEP magic", 0, MAGIC, &magic));
        }

        let [file_size, unknown1, unknown2, constant, width, height, transparency] =
            src.read_fields::<u32, 7>()?;

        if constant != CONSTANT_FIELD {
            return Err(Error::MalformedHeader {
                what: "HEP constant field",
                offset: 0x10,
                expected: format!("{:#X}", CONSTANT_FIELD),
                found: format!("{:#X}", constant),
            });
        }

        let pixels = u64::from(width) * u64::from(height);
        let expected_size = HEADER_LEN as u64 + pixels + PALETTE_BYTES as u64;
        if u64::from(file_size) != expected_size {
            return Err(Error::size_mismatch("HEP declared file size", expected_size, u64::from(file_size)));
        }
        if data.len() as u64 != expected_size {
            return Err(Error::size_mismatch("HEP data", expected_size, data.len() as u64));
        }

        let transparency = Transparency::from_raw("HEP", transparency, 0)?;

        let pixels = pixels as usize;
        let indices = data[HEADER_LEN..HEADER_LEN + pixels].to_vec();
        let palette = Palette::read(&mut &data[HEADER_LEN + pixels..], PaletteLayout::Linear, PALETTE_LEN)?;

        Ok(HepImage {
            width,
            height,
            transparency,
            unknown: (unknown1, unknown2),
            indices,
            palette,
        })
    }

    /// Resolves every index through the palette
    pub fn to_rgba(&self) -> Vec<u8> {
        self.indices
            .iter()
            .flat_map(|&index| self.palette.color(index))
            .collect()
    }
}
