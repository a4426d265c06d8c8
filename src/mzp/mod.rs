//! Decoding MZP tile images
//!
//! An MZP file is a `mrgd00` archive. Entry 0 is the [`MzpHeader`]; every
//! other entry is one MZX0-compressed tile. Tiles are laid out row-major and
//! overlap by `tile_crop` pixels on every edge, which are trimmed off while
//! the scanlines are put back together.

pub mod header;
pub mod palette;

pub use header::{BitmapFormat, BitmapHeader, MzpHeader, Transparency};
pub use palette::{expand_alpha, Palette, PaletteLayout};

use crate::error::{Error, Result};
use crate::hep::HepImage;
use crate::io_traits::ReadFields;
use crate::mrg::{read_entry, ArchiveIndex, Entry};
use crate::mzx;
use crate::raster::{PixelFormat, RasterImage};
use serde::Serialize;
use std::io::{Read, Seek, SeekFrom};

/// What to do when the grid has more tiles than the archive has tile entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendPolicy {
    /// Fail with [`Error::OutOfRange`]
    Strict,
    /// Reuse tiles from the start of the table
    WrapExtend,
}

impl Default for ExtendPolicy {
    fn default() -> Self {
        ExtendPolicy::Strict
    }
}

/// Things worth reporting about a decoded image that did not stop decoding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// Transparency tag of every HEP tile, in decode order
    pub hep_transparency: Vec<Transparency>,
    /// Distinct values of the two unknown HEP header words
    pub hep_unknown: Vec<(u32, u32)>,
    /// Grid indices that had to be wrapped back onto the tile table
    pub wrapped_tiles: Vec<usize>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub header: BitmapHeader,
    pub tile_transparency: Vec<Transparency>,
    /// Number of tile entries the archive actually had
    pub tile_entries: usize,
    /// `image_height` scanlines of `image_width * bytes_per_pixel` bytes
    pub rows: Vec<Vec<u8>>,
    pub palette: Option<Palette>,
    pub diagnostics: Diagnostics,
}

impl DecodedImage {
    pub fn width(&self) -> usize {
        self.header.image_width()
    }

    pub fn height(&self) -> usize {
        self.header.image_height()
    }

    pub fn is_indexed(&self) -> bool {
        self.palette.is_some()
    }

    /// A view of the scanlines for the image writers
    pub fn raster(&self) -> Result<RasterImage<'_>> {
        let format = match (self.header.format, &self.palette) {
            (BitmapFormat::Indexed4, Some(palette)) | (BitmapFormat::Indexed8, Some(palette)) => {
                PixelFormat::Indexed(palette)
            }
            (BitmapFormat::Rgb24, _) => PixelFormat::Rgb,
            (BitmapFormat::Rgba32, _) | (BitmapFormat::Hep, _) => PixelFormat::Rgba,
            (format, None) => {
                return Err(Error::MalformedHeader {
                    what: "palette",
                    offset: header::HEADER_LEN as u64,
                    expected: format!("a palette for {:?}", format),
                    found: "none".to_string(),
                })
            }
        };

        RasterImage::new(self.width() as u32, self.height() as u32, format, &self.rows)
    }

    pub fn summary(&self) -> TileSummary {
        let header = &self.header;

        let (hep_trans, hep_others) = if header.format == BitmapFormat::Hep {
            let tags = self
                .diagnostics
                .hep_transparency
                .iter()
                .map(|&t| (t as u8).to_string())
                .collect::<Vec<_>>()
                .join(" ");
            let others = self
                .diagnostics
                .hep_unknown
                .iter()
                .map(|&(u1, u2)| format!("{}{}", hex_le(u1), hex_le(u2)))
                .collect::<Vec<_>>()
                .join(" ");
            (Some(tags), Some(others))
        } else {
            (None, None)
        };

        let note = if self.diagnostics.wrapped_tiles.is_empty() {
            None
        } else {
            Some(format!(
                "{} tiles more than {} tile entries",
                header.tile_count(),
                self.tile_entries
            ))
        };

        TileSummary {
            width: header.width,
            height: header.height,
            bmp_type: header.bmp_type,
            bmp_depth: header.bmp_depth,
            bitmap_bpp: header.format.bits_per_pixel(),
            tile_width: header.tile_width,
            tile_height: header.tile_height,
            tile_x_count: header.tile_x_count,
            tile_y_count: header.tile_y_count,
            tile_crop: header.tile_crop,
            tile_trans: self
                .tile_transparency
                .iter()
                .map(|&t| format!("{:02x}", t as u8))
                .collect::<Vec<_>>()
                .join(" "),
            hep_trans,
            hep_others,
            note,
        }
    }
}

/// One line of `tiles_summary.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileSummary {
    pub width: u16,
    pub height: u16,
    pub bmp_type: u16,
    pub bmp_depth: u8,
    pub bitmap_bpp: u32,
    pub tile_width: u16,
    pub tile_height: u16,
    pub tile_x_count: u16,
    pub tile_y_count: u16,
    pub tile_crop: u8,
    pub tile_trans: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hep_trans: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hep_others: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

fn hex_le(value: u32) -> String {
    value.to_le_bytes().iter().map(|b| format!("{:02x}", b)).collect()
}

/// An opened MZP file: its archive index and parsed header entry
#[derive(Debug, Clone)]
pub struct MzpFile {
    pub index: ArchiveIndex,
    pub header: MzpHeader,
}

impl MzpFile {
    pub fn read<R: Read + Seek + ?Sized>(src: &mut R) -> Result<MzpFile> {
        let index = ArchiveIndex::read_combined(src)?;
        let first = index.entries.first().ok_or(Error::OutOfRange { index: 0, entries: 0 })?;

        let header = MzpHeader::parse(&read_entry(src, first)?)?;

        Ok(MzpFile { index, header })
    }

    pub fn tile_entries(&self) -> &[Entry] {
        &self.index.entries[1..]
    }

    pub fn decode<R: Read + Seek + ?Sized>(&self, src: &mut R, extend: ExtendPolicy) -> Result<DecodedImage> {
        decode_tile_grid(&self.header, self.tile_entries(), src, extend)
    }
}

/// Decodes every tile of the grid described by `header` and stitches the
/// cropped tiles into scanlines
pub fn decode_tile_grid<R: Read + Seek + ?Sized>(
    header: &MzpHeader,
    entries: &[Entry],
    src: &mut R,
    extend: ExtendPolicy,
) -> Result<DecodedImage> {
    let bitmap = &header.bitmap;
    let bpp = bitmap.bytes_per_pixel();
    let crop = usize::from(bitmap.tile_crop);
    let tile_width = usize::from(bitmap.tile_width);
    let tile_height = usize::from(bitmap.tile_height);

    if crop * 2 >= tile_width || crop * 2 >= tile_height {
        return Err(Error::AssemblyError {
            row: 0,
            reason: format!(
                "crop of {} leaves nothing of a {}x{} tile",
                crop, tile_width, tile_height
            ),
        });
    }

    let inner_width = tile_width - crop * 2;
    let inner_height = tile_height - crop * 2;
    let img_width = bitmap.image_width();
    let img_height = bitmap.image_height();
    let tile_row_len = tile_width * bpp;

    let mut diagnostics = Diagnostics::default();
    let mut rows = vec![Vec::with_capacity(img_width * bpp); img_height];

    for y in 0..usize::from(bitmap.tile_y_count) {
        let start_row = y * inner_height;
        let rowcount = img_height.min(start_row + inner_height).saturating_sub(start_row);

        for x in 0..usize::from(bitmap.tile_x_count) {
            let index = y * usize::from(bitmap.tile_x_count) + x;
            let entry = select_tile(entries, index, extend, &mut diagnostics)?;
            let tile = decode_tile(bitmap, src, entry, &mut diagnostics)?;

            if tile.len() % tile_row_len != 0 {
                return Err(Error::AssemblyError {
                    row: start_row,
                    reason: format!(
                        "tile {} decoded to {} bytes, not a whole number of {}-byte rows",
                        index,
                        tile.len(),
                        tile_row_len
                    ),
                });
            }

            for (i, tile_row) in tile.chunks_exact(tile_row_len).enumerate().skip(crop) {
                if i - crop >= rowcount {
                    break;
                }

                let cur_row = start_row + i - crop;
                let row = &mut rows[cur_row];
                let cur_px = row.len() / bpp;
                if cur_px != x * inner_width {
                    return Err(Error::AssemblyError {
                        row: cur_row,
                        reason: format!(
                            "tile {} starts at pixel {}, expected {}",
                            index,
                            cur_px,
                            x * inner_width
                        ),
                    });
                }

                let px_count = (img_width.saturating_sub(cur_px).min(inner_width) + crop * 2) * bpp;
                let kept = &tile_row[..px_count];
                row.extend_from_slice(&kept[crop * bpp..px_count - crop * bpp]);
            }

            tracing::trace!(index, x, y, bytes = tile.len(), "placed tile");
        }
    }

    let row_len = img_width * bpp;
    if let Some((index, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != row_len) {
        return Err(Error::AssemblyError {
            row: index,
            reason: format!("assembled {} bytes, expected {}", row.len(), row_len),
        });
    }

    Ok(DecodedImage {
        header: bitmap.clone(),
        tile_transparency: header.tile_transparency.clone(),
        tile_entries: entries.len(),
        rows,
        palette: header.palette.clone(),
        diagnostics,
    })
}

fn select_tile<'a>(
    entries: &'a [Entry],
    index: usize,
    extend: ExtendPolicy,
    diagnostics: &mut Diagnostics,
) -> Result<&'a Entry> {
    if let Some(entry) = entries.get(index) {
        return Ok(entry);
    }

    let out_of_range = Error::OutOfRange {
        index,
        entries: entries.len(),
    };
    if extend == ExtendPolicy::Strict || entries.is_empty() {
        return Err(out_of_range);
    }

    let wrapped = index % entries.len();
    tracing::warn!(index, wrapped, entries = entries.len(), "tile index past the tile table, wrapping");
    diagnostics.wrapped_tiles.push(index);
    diagnostics
        .warnings
        .push(format!("tile {} wrapped onto tile entry {}", index, wrapped));

    Ok(&entries[wrapped])
}

/// Reads one tile entry and decompresses it
fn read_tile<R: Read + Seek + ?Sized>(src: &mut R, entry: &Entry) -> Result<Vec<u8>> {
    if entry.size < mzx::HEADER_LEN as u64 {
        return Err(Error::size_mismatch("tile entry", mzx::HEADER_LEN as u64, entry.size));
    }

    src.seek(SeekFrom::Start(entry.offset))?;
    let magic = src.read_magic::<4>()?;
    if &magic != mzx::MAGIC {
        return Err(Error::bad_magic("tile signature", entry.offset, mzx::MAGIC, &magic));
    }
    let [output_len] = src.read_fields::<u32, 1>()?;

    let input_len = (entry.size - mzx::HEADER_LEN as u64) as usize;
    mzx::decompress_from(src, input_len, output_len as usize, false)
}

/// Decompresses a tile and converts it to final pixels: one index byte per
/// pixel for indexed formats, RGB or RGBA otherwise
fn decode_tile<R: Read + Seek + ?Sized>(
    bitmap: &BitmapHeader,
    src: &mut R,
    entry: &Entry,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<u8>> {
    let raw = read_tile(src, entry)?;

    match bitmap.format {
        BitmapFormat::Indexed4 => Ok(unpack_nibbles(&raw)),
        BitmapFormat::Indexed8 => Ok(raw),
        BitmapFormat::Rgb24 => merge_planes(&raw, bitmap.tile_pixels(), false),
        BitmapFormat::Rgba32 => merge_planes(&raw, bitmap.tile_pixels(), true),
        BitmapFormat::Hep => {
            let hep = HepImage::parse(&raw)?;
            if hep.width != u32::from(bitmap.tile_width) || hep.height != u32::from(bitmap.tile_height) {
                return Err(Error::MalformedHeader {
                    what: "HEP dimensions",
                    offset: entry.offset,
                    expected: format!("{}x{}", bitmap.tile_width, bitmap.tile_height),
                    found: format!("{}x{}", hep.width, hep.height),
                });
            }

            diagnostics.hep_transparency.push(hep.transparency);
            if !diagnostics.hep_unknown.contains(&hep.unknown) {
                if !diagnostics.hep_unknown.is_empty() {
                    diagnostics.warnings.push(format!(
                        "HEP tile at {:#X} has unknown fields {:#010X} {:#010X}",
                        entry.offset, hep.unknown.0, hep.unknown.1
                    ));
                }
                diagnostics.hep_unknown.push(hep.unknown);
            }

            Ok(hep.to_rgba())
        }
    }
}

/// Expands 4bpp data to a byte per pixel, low nibble first
fn unpack_nibbles(src: &[u8]) -> Vec<u8> {
    src.iter().flat_map(|&b| [b & 0x0F, b >> 4]).collect()
}

/// Combines the RGB565 plane, the 3-2-3 refinement plane, and with `alpha`
/// the alpha plane
fn merge_planes(src: &[u8], pixels: usize, alpha: bool) -> Result<Vec<u8>> {
    let planes = if alpha { 4 } else { 3 };
    if src.len() < pixels * planes {
        return Err(Error::size_mismatch(
            "true-colour tile planes",
            (pixels * planes) as u64,
            src.len() as u64,
        ));
    }

    let (rgb565, rest) = src.split_at(pixels * 2);
    let (offsets, alphas) = rest.split_at(pixels);

    let mut dst = Vec::with_capacity(pixels * planes);
    for (i, (unit, &offset)) in rgb565.chunks_exact(2).zip(offsets).enumerate() {
        let (p, q) = (unit[0], unit[1]);

        let r = q & 0xF8;
        let g = (q & 0x07) << 5 | (p & 0xE0) >> 3;
        let b = (p & 0x1F) << 3;

        dst.push(r + (offset >> 5));
        dst.push(g + ((offset & 0x1F) >> 3));
        dst.push(b + (offset & 0x07));
        if alpha {
            dst.push(alphas[i]);
        }
    }

    Ok(dst)
}
