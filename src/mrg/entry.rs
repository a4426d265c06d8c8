//! Entry descriptors and the sector arithmetic behind them
//!
//! Every archive entry is described by a handful of 16-bit fields that only
//! make sense together with the 0x800-byte sector size. There are three
//! incompatible encodings:
//!
//! * combined: sector index + byte offset within the sector, used by
//!   self-contained `mrgd00` archives (including MZP images)
//! * split: sector index with four extra high bits packed into the top nibble
//!   of the second word, used when a separate `.hed` index exists
//! * voice: like split, but the sector count shares the second word and the
//!   size is always a whole number of sectors

use crate::error::{Error, Result};
use crate::io_traits::{ReadFields, WriteFields};
use std::io::{Read, Write};

pub const SECTOR_SIZE: u64 = 0x800;

// Sector indices for split/voice entries are 20 bits wide
const MAX_SPLIT_SECTOR: u64 = 0xF_FFFF;
const MAX_VOICE_SECTORS: u64 = 0x0FFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryLayout {
    Combined,
    Split,
    Voice,
}

impl EntryLayout {
    pub fn descriptor_len(self) -> usize {
        match self {
            EntryLayout::Combined | EntryLayout::Split => 8,
            EntryLayout::Voice => 4,
        }
    }
}

/// A descriptor exactly as stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEntry {
    Combined {
        sector_offset: u16,
        byte_offset: u16,
        /// Number of sectors the entry touches, counted from its first sector
        size_sectors: u16,
        size_low: u16,
    },
    Split {
        offset_low: u16,
        offset_high: u16,
        size_sectors: u16,
        size_low: u16,
    },
    Voice {
        offset_low: u16,
        offset_size_high: u16,
    },
}

/// Absolute location of an entry's bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub offset: u64,
    pub size: u64,
}

impl RawEntry {
    pub fn layout(&self) -> EntryLayout {
        match self {
            RawEntry::Combined { .. } => EntryLayout::Combined,
            RawEntry::Split { .. } => EntryLayout::Split,
            RawEntry::Voice { .. } => EntryLayout::Voice,
        }
    }

    pub fn read<R: Read + ?Sized>(src: &mut R, layout: EntryLayout) -> Result<RawEntry> {
        Ok(match layout {
            EntryLayout::Combined => {
                let [sector_offset, byte_offset, size_sectors, size_low] = src.read_fields::<u16, 4>()?;
                RawEntry::Combined {
                    sector_offset,
                    byte_offset,
                    size_sectors,
                    size_low,
                }
            }
            EntryLayout::Split => {
                let [offset_low, offset_high, size_sectors, size_low] = src.read_fields::<u16, 4>()?;
                RawEntry::Split {
                    offset_low,
                    offset_high,
                    size_sectors,
                    size_low,
                }
            }
            EntryLayout::Voice => {
                let [offset_low, offset_size_high] = src.read_fields::<u16, 2>()?;
                RawEntry::Voice {
                    offset_low,
                    offset_size_high,
                }
            }
        })
    }

    pub fn write<W: Write + ?Sized>(&self, dst: &mut W) -> Result<()> {
        dst.write_fields(&self.fields())?;
        Ok(())
    }

    fn fields(&self) -> Vec<u16> {
        match *self {
            RawEntry::Combined {
                sector_offset,
                byte_offset,
                size_sectors,
                size_low,
            } => vec![sector_offset, byte_offset, size_sectors, size_low],
            RawEntry::Split {
                offset_low,
                offset_high,
                size_sectors,
                size_low,
            } => vec![offset_low, offset_high, size_sectors, size_low],
            RawEntry::Voice {
                offset_low,
                offset_size_high,
            } => vec![offset_low, offset_size_high],
        }
    }

    /// `.hed` indices fill unused slots (and their tail) with `FF FF FF FF`
    pub fn is_placeholder(&self) -> bool {
        self.fields()[..2] == [0xFFFF, 0xFFFF]
    }

    /// Converts the descriptor into an absolute offset and size
    ///
    /// `data_start` is where the archive's data area begins: right after the
    /// descriptor table for combined archives, 0 for `.hed`-indexed ones.
    pub fn resolve(&self, data_start: u64) -> Entry {
        match *self {
            RawEntry::Combined {
                sector_offset,
                byte_offset,
                size_sectors,
                size_low,
            } => {
                let byte_offset = u64::from(byte_offset);
                let size_low = u64::from(size_low);
                let mut size_sectors = u64::from(size_sectors);

                // The sector count includes the sector the entry starts in, so an
                // entry that straddles a boundary counts one sector too many.
                let spanned = size_sectors.saturating_sub(1) * SECTOR_SIZE;
                if size_low < spanned && size_low + byte_offset > spanned {
                    size_sectors -= 1;
                }

                Entry {
                    offset: data_start + u64::from(sector_offset) * SECTOR_SIZE + byte_offset,
                    size: high_size(size_sectors) | size_low,
                }
            }
            RawEntry::Split {
                offset_low,
                offset_high,
                size_sectors,
                size_low,
            } => {
                let size = if size_low == 0 {
                    u64::from(size_sectors) * SECTOR_SIZE
                } else {
                    high_size(u64::from(size_sectors)) | u64::from(size_low)
                };

                Entry {
                    offset: data_start + sector_address(offset_low, offset_high),
                    size,
                }
            }
            RawEntry::Voice {
                offset_low,
                offset_size_high,
            } => Entry {
                offset: data_start + sector_address(offset_low, offset_size_high),
                size: SECTOR_SIZE * u64::from(offset_size_high & 0x0FFF),
            },
        }
    }

    /// Builds the descriptor for an entry written at `offset` (relative to the
    /// data area) with `size` bytes of payload
    ///
    /// For voice entries `size` must already include the sector padding.
    pub fn pack(layout: EntryLayout, offset: u64, size: u64) -> Result<RawEntry> {
        match layout {
            EntryLayout::Combined => {
                let byte_offset = offset % SECTOR_SIZE;
                let mut size_sectors = div_ceil(size, SECTOR_SIZE);
                if byte_offset + size > size_sectors * SECTOR_SIZE {
                    size_sectors += 1;
                }

                Ok(RawEntry::Combined {
                    sector_offset: field_u16("sector offset", offset / SECTOR_SIZE)?,
                    byte_offset: byte_offset as u16,
                    size_sectors: field_u16("sector count", size_sectors)?,
                    size_low: size as u16,
                })
            }
            EntryLayout::Split => {
                let (offset_low, offset_high) = split_sector_address(offset)?;

                Ok(RawEntry::Split {
                    offset_low,
                    offset_high,
                    size_sectors: field_u16("sector count", div_ceil(size, SECTOR_SIZE))?,
                    size_low: size as u16,
                })
            }
            EntryLayout::Voice => {
                let (offset_low, offset_high) = split_sector_address(offset)?;

                if size % SECTOR_SIZE != 0 {
                    return Err(Error::size_mismatch(
                        "voice entry size",
                        div_ceil(size, SECTOR_SIZE) * SECTOR_SIZE,
                        size,
                    ));
                }
                let sectors = size / SECTOR_SIZE;
                if sectors > MAX_VOICE_SECTORS {
                    return Err(Error::FieldOverflow {
                        field: "voice sector count",
                        value: sectors,
                        max: MAX_VOICE_SECTORS,
                    });
                }

                Ok(RawEntry::Voice {
                    offset_low,
                    offset_size_high: offset_high | sectors as u16,
                })
            }
        }
    }
}

/// Padding written after an entry of `data_size` bytes when repacking
///
/// Combined archives pad to the next 8-byte boundary with `0xFF`, always
/// writing at least one byte. Split and voice archives pad to the next sector
/// with zeroes followed by `0C 00 .. 00` 16-byte blocks.
pub fn entry_padding(layout: EntryLayout, data_size: u64) -> Vec<u8> {
    match layout {
        EntryLayout::Combined => vec![0xFF; 8 - (data_size % 8) as usize],
        EntryLayout::Split | EntryLayout::Voice => {
            let pad_len = ((SECTOR_SIZE - data_size % SECTOR_SIZE) % SECTOR_SIZE) as usize;

            let mut padding = vec![0x00; pad_len % 0x10];
            for _ in 0..pad_len / 0x10 {
                padding.push(0x0C);
                padding.extend_from_slice(&[0x00; 0xF]);
            }
            padding
        }
    }
}

fn sector_address(offset_low: u16, offset_high: u16) -> u64 {
    let sector = (u64::from(offset_high & 0xF000) << 4) | u64::from(offset_low);
    sector * SECTOR_SIZE
}

fn split_sector_address(offset: u64) -> Result<(u16, u16)> {
    if offset % SECTOR_SIZE != 0 {
        return Err(Error::Misaligned {
            offset,
            alignment: SECTOR_SIZE,
        });
    }

    let sector = offset / SECTOR_SIZE;
    if sector > MAX_SPLIT_SECTOR {
        return Err(Error::FieldOverflow {
            field: "sector offset",
            value: sector,
            max: MAX_SPLIT_SECTOR,
        });
    }

    Ok(((sector & 0xFFFF) as u16, ((sector & 0xF_0000) >> 4) as u16))
}

fn high_size(size_sectors: u64) -> u64 {
    (SECTOR_SIZE * size_sectors.saturating_sub(1)) & 0xFFFF_0000
}

fn div_ceil(value: u64, divisor: u64) -> u64 {
    (value + divisor - 1) / divisor
}

fn field_u16(field: &'static str, value: u64) -> Result<u16> {
    if value > u64::from(u16::MAX) {
        return Err(Error::FieldOverflow {
            field,
            value,
            max: u64::from(u16::MAX),
        });
    }
    Ok(value as u16)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(layout: EntryLayout, offset: u64, size: u64) {
        let raw = RawEntry::pack(layout, offset, size).unwrap();
        let entry = raw.resolve(0);
        assert_eq!(
            entry,
            Entry { offset, size },
            "{:?} packed as {:?}",
            layout,
            raw
        );
    }

    #[test]
    fn combined_resolve() {
        let raw = RawEntry::Combined {
            sector_offset: 2,
            byte_offset: 0x10,
            size_sectors: 1,
            size_low: 0x100,
        };
        assert_eq!(
            raw.resolve(0x20),
            Entry {
                offset: 0x1030,
                size: 0x100
            }
        );
    }

    #[test]
    fn combined_boundary_correction() {
        // Crosses the 64K line only because of its byte offset
        let raw = RawEntry::pack(EntryLayout::Combined, 0x100, 0xFFF0).unwrap();
        assert_eq!(
            raw,
            RawEntry::Combined {
                sector_offset: 0,
                byte_offset: 0x100,
                size_sectors: 33,
                size_low: 0xFFF0,
            }
        );
        assert_eq!(raw.resolve(0).size, 0xFFF0);
    }

    #[test]
    fn combined_large_entry() {
        roundtrip(EntryLayout::Combined, 0x100, 0x12345);
    }

    #[test]
    fn combined_roundtrip() {
        let offsets = [0, 1, 0x7FF, 0x800, 0x801, 0x12345, 0xFFFF * SECTOR_SIZE + 0x7FF];
        let sizes = [0, 1, 0x7FF, 0x800, 0x801, 0xF7F0, 0xFFF0, 0xFFFF];
        for &offset in &offsets {
            for &size in &sizes {
                roundtrip(EntryLayout::Combined, offset, size);
            }
        }
    }

    #[test]
    fn split_roundtrip() {
        let offsets = [0, SECTOR_SIZE, 0x1_2345 * SECTOR_SIZE, MAX_SPLIT_SECTOR * SECTOR_SIZE];
        let sizes = [0, 1, 0x800, 0x10000, 0x12345, 0xFFFF * SECTOR_SIZE];
        for &offset in &offsets {
            for &size in &sizes {
                roundtrip(EntryLayout::Split, offset, size);
            }
        }
    }

    #[test]
    fn split_zero_size_low_means_whole_sectors() {
        let raw = RawEntry::Split {
            offset_low: 0x0001,
            offset_high: 0x1000,
            size_sectors: 0x40,
            size_low: 0,
        };
        assert_eq!(
            raw.resolve(0),
            Entry {
                offset: 0x1_0001 * SECTOR_SIZE,
                size: 0x20000
            }
        );
    }

    #[test]
    fn voice_entries() {
        roundtrip(EntryLayout::Voice, 0x1_2345 * SECTOR_SIZE, 3 * SECTOR_SIZE);

        let raw = RawEntry::Voice {
            offset_low: 0x0010,
            offset_size_high: 0x2005,
        };
        assert_eq!(
            raw.resolve(0),
            Entry {
                offset: 0x2_0010 * SECTOR_SIZE,
                size: 5 * SECTOR_SIZE
            }
        );

        assert!(matches!(
            RawEntry::pack(EntryLayout::Voice, 0, 0x801),
            Err(Error::SizeMismatch { expected: 0x1000, actual: 0x801, .. })
        ));
        assert!(matches!(
            RawEntry::pack(EntryLayout::Voice, 0, 0x1000 * SECTOR_SIZE),
            Err(Error::FieldOverflow { .. })
        ));
    }

    #[test]
    fn pack_rejects_bad_offsets() {
        assert!(matches!(
            RawEntry::pack(EntryLayout::Split, 0x801, 0x10),
            Err(Error::Misaligned { offset: 0x801, .. })
        ));
        assert!(matches!(
            RawEntry::pack(EntryLayout::Combined, 0x1_0000 * SECTOR_SIZE, 0x10),
            Err(Error::FieldOverflow { .. })
        ));
    }

    #[test]
    fn descriptor_bytes() {
        let data = [0x01, 0x00, 0x10, 0x00, 0x02, 0x00, 0x34, 0x12];
        let raw = RawEntry::read(&mut Cursor::new(&data[..]), EntryLayout::Combined).unwrap();
        assert_eq!(
            raw,
            RawEntry::Combined {
                sector_offset: 1,
                byte_offset: 0x10,
                size_sectors: 2,
                size_low: 0x1234,
            }
        );

        let mut written = Vec::new();
        raw.write(&mut written).unwrap();
        assert_eq!(written, data);

        let hed = [0xFF; 4];
        let raw = RawEntry::read(&mut &hed[..], EntryLayout::Voice).unwrap();
        assert!(raw.is_placeholder());
    }

    #[test]
    fn padding() {
        assert_eq!(entry_padding(EntryLayout::Combined, 0x10), [0xFF; 8]);
        assert_eq!(entry_padding(EntryLayout::Combined, 0x13), [0xFF; 5]);
        assert!(entry_padding(EntryLayout::Split, 0x1000).is_empty());

        let padding = entry_padding(EntryLayout::Split, 0x7DF);
        assert_eq!(padding.len(), 0x21);
        assert_eq!(padding[0], 0x00);
        assert_eq!(&padding[1..0x11], &[0x0C, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(padding[0x11], 0x0C);
    }
}
