//! Reading and writing `mrgd00` archives
//!
//! An archive is either self-contained (`mrgd00` magic, entry count and a
//! table of combined descriptors in front of the data) or a bare data file
//! whose split/voice descriptors live in a separate `.hed` index.

pub mod entry;

pub use entry::{entry_padding, Entry, EntryLayout, RawEntry, SECTOR_SIZE};

use crate::error::{Error, Result};
use crate::io_traits::{ReadFields, WriteFields};
use std::convert::TryFrom;
use std::io::{Cursor, Read, Seek, SeekFrom};

pub const MAGIC: &[u8; 6] = b"mrgd00";

const HEADER_LEN: u64 = 8;
const HED_TERMINATOR: [u8; 0x10] = [0xFF; 0x10];

/// The descriptor table of an archive, resolved to absolute locations
#[derive(Debug, Clone)]
pub struct ArchiveIndex {
    pub layout: EntryLayout,
    pub data_start: u64,
    pub entries: Vec<Entry>,
}

impl ArchiveIndex {
    /// Reads the header and descriptor table of a self-contained archive
    pub fn read_combined<R: Read + ?Sized>(src: &mut R) -> Result<ArchiveIndex> {
        let magic = src.read_magic::<6>()?;
        if &magic != MAGIC {
            return Err(Error::bad_magic("mrgd00 magic", 0, MAGIC, &magic));
        }

        let [count] = src.read_fields::<u16, 1>()?;
        let data_start = HEADER_LEN + u64::from(count) * 8;

        let mut entries = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            entries.push(RawEntry::read(src, EntryLayout::Combined)?.resolve(data_start));
        }

        tracing::debug!(count, data_start, "read mrgd00 descriptor table");

        Ok(ArchiveIndex {
            layout: EntryLayout::Combined,
            data_start,
            entries,
        })
    }

    /// Parses a `.hed` index
    ///
    /// Voice indices use 4-byte descriptors; they are told apart from split
    /// indices by a non-zero sector count in the first descriptor.
    pub fn parse_hed(hed: &[u8]) -> Result<ArchiveIndex> {
        if hed.len() < 4 {
            return Err(Error::size_mismatch("hed index", 4, hed.len() as u64));
        }

        let first_high = u16::from_le_bytes([hed[2], hed[3]]);
        let layout = if first_high & 0x0FFF == 0 {
            EntryLayout::Split
        } else {
            EntryLayout::Voice
        };

        let count = hed.len() / layout.descriptor_len();
        let mut src = Cursor::new(hed);
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let raw = RawEntry::read(&mut src, layout)?;
            if !raw.is_placeholder() {
                entries.push(raw.resolve(0));
            }
        }

        tracing::debug!(?layout, count = entries.len(), "parsed hed index");

        Ok(ArchiveIndex {
            layout,
            data_start: 0,
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reads the bytes of one entry
pub fn read_entry<R: Read + Seek + ?Sized>(src: &mut R, entry: &Entry) -> Result<Vec<u8>> {
    src.seek(SeekFrom::Start(entry.offset))?;

    let mut data = vec![0; entry.size as usize];
    src.read_exact(&mut data)?;
    Ok(data)
}

/// A repacked archive: the `.mrg` bytes, plus the `.hed` index for split and
/// voice layouts
#[derive(Debug, Clone)]
pub struct PackedArchive {
    pub mrg: Vec<u8>,
    pub hed: Option<Vec<u8>>,
}

/// Builds an archive one entry at a time
pub struct ArchiveWriter {
    layout: EntryLayout,
    data: Vec<u8>,
    descriptors: Vec<RawEntry>,
}

impl ArchiveWriter {
    pub fn new(layout: EntryLayout) -> ArchiveWriter {
        ArchiveWriter {
            layout,
            data: Vec::new(),
            descriptors: Vec::new(),
        }
    }

    /// Appends `payload` and its padding, returning where it landed relative
    /// to the data area
    pub fn add(&mut self, payload: &[u8]) -> Result<Entry> {
        let offset = self.data.len() as u64;
        let size = payload.len() as u64;
        let padding = entry_padding(self.layout, size);

        let raw = match self.layout {
            // Voice descriptors can only describe whole sectors
            EntryLayout::Voice => RawEntry::pack(self.layout, offset, size + padding.len() as u64)?,
            _ => RawEntry::pack(self.layout, offset, size)?,
        };

        self.data.extend_from_slice(payload);
        self.data.extend_from_slice(&padding);
        self.descriptors.push(raw);

        Ok(raw.resolve(0))
    }

    pub fn finish(self) -> Result<PackedArchive> {
        let mut table = Vec::with_capacity(self.descriptors.len() * self.layout.descriptor_len());
        for raw in &self.descriptors {
            raw.write(&mut table)?;
        }

        match self.layout {
            EntryLayout::Combined => {
                let count = u16::try_from(self.descriptors.len()).map_err(|_| Error::FieldOverflow {
                    field: "entry count",
                    value: self.descriptors.len() as u64,
                    max: u64::from(u16::MAX),
                })?;

                let mut mrg = Vec::with_capacity(HEADER_LEN as usize + table.len() + self.data.len());
                mrg.extend_from_slice(MAGIC);
                mrg.write_fields(&[count])?;
                mrg.extend_from_slice(&table);
                mrg.extend_from_slice(&self.data);

                Ok(PackedArchive { mrg, hed: None })
            }
            EntryLayout::Split | EntryLayout::Voice => {
                table.extend_from_slice(&HED_TERMINATOR);

                Ok(PackedArchive {
                    mrg: self.data,
                    hed: Some(table),
                })
            }
        }
    }
}
