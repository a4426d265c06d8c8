//! The bitmap header kept in an MZP's first entry

use super::palette::{Palette, PaletteLayout};
use crate::error::{Error, Result};
use crate::io_traits::ReadFields;
use serde::Serialize;
use std::io::Cursor;

pub const HEADER_LEN: usize = 0x10;

/// Every `(bmp_type, bmp_depth)` pair the decoder understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BitmapFormat {
    /// 16-colour linear palette, two pixels per byte
    Indexed4,
    /// 256-colour block-interleaved palette
    Indexed8,
    /// RGB565 plane followed by a refinement plane
    Rgb24,
    /// Like `Rgb24`, plus an alpha plane
    Rgba32,
    /// Every tile is a nested HEP image
    Hep,
}

impl BitmapFormat {
    pub fn from_type_depth(bmp_type: u16, bmp_depth: u8) -> Result<BitmapFormat> {
        match (bmp_type, bmp_depth) {
            (0x01, 0x00) | (0x01, 0x10) => Ok(BitmapFormat::Indexed4),
            (0x01, 0x01) | (0x01, 0x11) | (0x01, 0x91) => Ok(BitmapFormat::Indexed8),
            (0x08, 0x14) => Ok(BitmapFormat::Rgb24),
            (0x0B, 0x14) => Ok(BitmapFormat::Rgba32),
            (0x0C, 0x11) => Ok(BitmapFormat::Hep),
            // 0x03 (PEH) included
            _ => Err(Error::UnsupportedFormat { bmp_type, bmp_depth }),
        }
    }

    pub fn bits_per_pixel(self) -> u32 {
        match self {
            BitmapFormat::Indexed4 => 4,
            BitmapFormat::Indexed8 => 8,
            BitmapFormat::Rgb24 => 24,
            BitmapFormat::Rgba32 | BitmapFormat::Hep => 32,
        }
    }

    /// Bytes per pixel once a tile is decoded; 4bpp tiles are unpacked to a byte per pixel
    pub fn bytes_per_pixel(self) -> usize {
        std::cmp::max(1, self.bits_per_pixel() as usize / 8)
    }

    /// Palette layout and stored entry count, for indexed formats
    pub fn palette(self) -> Option<(PaletteLayout, usize)> {
        match self {
            BitmapFormat::Indexed4 => Some((PaletteLayout::Linear, 0x10)),
            BitmapFormat::Indexed8 => Some((PaletteLayout::BlockInterleaved, 0x100)),
            _ => None,
        }
    }
}

/// Per-tile transparency, also used by HEP headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Transparency {
    Transparent = 0,
    Partial = 1,
    Opaque = 2,
}

impl Transparency {
    pub(crate) fn from_raw(what: &'static str, value: u32, index: usize) -> Result<Transparency> {
        match value {
            0 => Ok(Transparency::Transparent),
            1 => Ok(Transparency::Partial),
            2 => Ok(Transparency::Opaque),
            _ => Err(Error::InvalidTransparencyByte { what, value, index }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitmapHeader {
    pub width: u16,
    pub height: u16,
    pub tile_width: u16,
    pub tile_height: u16,
    pub tile_x_count: u16,
    pub tile_y_count: u16,
    pub bmp_type: u16,
    pub bmp_depth: u8,
    /// Pixels trimmed from every edge of every tile
    pub tile_crop: u8,
    pub format: BitmapFormat,
}

impl BitmapHeader {
    pub fn tile_count(&self) -> usize {
        usize::from(self.tile_x_count) * usize::from(self.tile_y_count)
    }

    pub fn tile_pixels(&self) -> usize {
        usize::from(self.tile_width) * usize::from(self.tile_height)
    }

    /// Final width, with the crop taken off both sides of every tile column
    pub fn image_width(&self) -> usize {
        usize::from(self.width).saturating_sub(usize::from(self.tile_x_count) * usize::from(self.tile_crop) * 2)
    }

    /// Final height, with the crop taken off both sides of every tile row
    pub fn image_height(&self) -> usize {
        usize::from(self.height).saturating_sub(usize::from(self.tile_y_count) * usize::from(self.tile_crop) * 2)
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel()
    }
}

/// Everything stored in the header entry
#[derive(Debug, Clone)]
pub struct MzpHeader {
    pub bitmap: BitmapHeader,
    pub palette: Option<Palette>,
    pub tile_transparency: Vec<Transparency>,
}

impl MzpHeader {
    /// Parses the header entry: bitmap header, palette for indexed formats,
    /// then exactly one transparency byte per tile
    pub fn parse(entry: &[u8]) -> Result<MzpHeader> {
        let mut src = Cursor::new(entry);

        let [width, height, tile_width, tile_height, tile_x_count, tile_y_count, bmp_type] =
            src.read_fields::<u16, 7>()?;
        let [bmp_depth, tile_crop] = src.read_fields::<u8, 2>()?;

        let format = BitmapFormat::from_type_depth(bmp_type, bmp_depth)?;
        let bitmap = BitmapHeader {
            width,
            height,
            tile_width,
            tile_height,
            tile_x_count,
            tile_y_count,
            bmp_type,
            bmp_depth,
            tile_crop,
            format,
        };

        let palette = match format.palette() {
            Some((layout, count)) => Some(Palette::read(&mut src, layout, count)?),
            None => None,
        };

        let consumed = src.position() as usize;
        let remaining = entry.len() - consumed;
        if remaining != bitmap.tile_count() {
            return Err(Error::size_mismatch(
                "tile transparency table",
                bitmap.tile_count() as u64,
                remaining as u64,
            ));
        }

        let tile_transparency = entry[consumed..]
            .iter()
            .enumerate()
            .map(|(index, &value)| Transparency::from_raw("tile", u32::from(value), index))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            width,
            height,
            bmp_type,
            bmp_depth,
            bpp = format.bits_per_pixel(),
            "MZP format"
        );
        tracing::debug!(
            tile_width,
            tile_height,
            tile_x_count,
            tile_y_count,
            tile_crop,
            "MZP tile format"
        );

        Ok(MzpHeader {
            bitmap,
            palette,
            tile_transparency,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn header_bytes(bmp_type: u16, bmp_depth: u8, tiles: (u16, u16)) -> Vec<u8> {
        let mut data = Vec::new();
        for field in &[32, 16, 16, 16, tiles.0, tiles.1, bmp_type] {
            data.extend_from_slice(&field.to_le_bytes());
        }
        data.extend_from_slice(&[bmp_depth, 0]);
        data
    }

    #[test]
    fn truecolor_header() {
        let mut data = header_bytes(0x0B, 0x14, (2, 1));
        data.extend_from_slice(&[2, 1]);

        let header = MzpHeader::parse(&data).unwrap();
        assert_eq!(header.bitmap.format, BitmapFormat::Rgba32);
        assert_eq!(header.bitmap.bytes_per_pixel(), 4);
        assert!(header.palette.is_none());
        assert_eq!(
            header.tile_transparency,
            [Transparency::Opaque, Transparency::Partial]
        );
    }

    #[test]
    fn indexed4_header_reads_sixteen_colours() {
        let mut data = header_bytes(0x01, 0x10, (1, 1));
        data.extend_from_slice(&[0x7F; 16 * 4]);
        data.push(0);

        let header = MzpHeader::parse(&data).unwrap();
        assert_eq!(header.bitmap.format, BitmapFormat::Indexed4);
        assert_eq!(header.bitmap.bytes_per_pixel(), 1);
        let palette = header.palette.unwrap();
        assert_eq!(palette.declared_len(), 16);
        assert_eq!(palette.color(0), [0x7F, 0x7F, 0x7F, 0xFF]);
    }

    #[test]
    fn unsupported_pairs() {
        for &(bmp_type, bmp_depth) in &[(0x03, 0x01), (0x02, 0x00), (0x08, 0x15), (0x01, 0x02)] {
            let data = header_bytes(bmp_type, bmp_depth, (1, 1));
            assert!(matches!(
                MzpHeader::parse(&data),
                Err(Error::UnsupportedFormat { .. })
            ));
        }
    }

    #[test]
    fn transparency_table_must_fill_the_entry() {
        let mut data = header_bytes(0x08, 0x14, (2, 2));
        data.extend_from_slice(&[2, 2, 2]);
        assert!(matches!(
            MzpHeader::parse(&data),
            Err(Error::SizeMismatch { expected: 4, actual: 3, .. })
        ));

        data.extend_from_slice(&[2, 2]);
        assert!(matches!(
            MzpHeader::parse(&data),
            Err(Error::SizeMismatch { expected: 4, actual: 5, .. })
        ));
    }

    #[test]
    fn bad_transparency_byte() {
        let mut data = header_bytes(0x08, 0x14, (2, 1));
        data.extend_from_slice(&[2, 3]);
        assert!(matches!(
            MzpHeader::parse(&data),
            Err(Error::InvalidTransparencyByte { value: 3, index: 1, .. })
        ));
    }

    #[test]
    fn cropped_dimensions() {
        let header = BitmapHeader {
            width: 260,
            height: 132,
            tile_width: 130,
            tile_height: 132,
            tile_x_count: 2,
            tile_y_count: 1,
            bmp_type: 0x01,
            bmp_depth: 0x01,
            tile_crop: 2,
            format: BitmapFormat::Indexed8,
        };
        assert_eq!(header.image_width(), 252);
        assert_eq!(header.image_height(), 128);
        assert_eq!(header.tile_count(), 2);
    }
}
