use super::{PixelFormat, RasterImage};
use crate::error::{Error, Result};
use crate::io_traits::WriteFields;
use std::convert::TryFrom;

pub const HEADER_LEN: usize = 18;

const COLOR_MAPPED: u8 = 1;
const COLOR_MAP_LEN: u16 = 256;
const COLOR_MAP_DEPTH: u8 = 32;
/// Top-left origin, 8 alpha bits
const DESCRIPTOR: u8 = 0x20 | 0x08;

/// Encodes an indexed image as an uncompressed colour-mapped TGA with a BGRA colour map
pub fn encode(image: &RasterImage) -> Result<Vec<u8>> {
    let palette = match image.format {
        PixelFormat::Indexed(palette) => palette,
        _ => {
            return Err(Error::MalformedHeader {
                what: "TGA pixel format",
                offset: 0,
                expected: "indexed".to_string(),
                found: format!("{:?}", image.format),
            })
        }
    };

    let width = dimension("TGA width", image.width)?;
    let height = dimension("TGA height", image.height)?;

    let colormap = palette.bgra_bytes();
    let mut out = Vec::with_capacity(HEADER_LEN + colormap.len() + image.row_len() * image.rows.len());

    // id length, colour map type, image type
    out.write_fields(&[0, COLOR_MAPPED, COLOR_MAPPED])?;
    // first colour map entry, colour map length
    out.write_fields(&[0, COLOR_MAP_LEN])?;
    out.write_fields(&[COLOR_MAP_DEPTH])?;
    // x/y origin, width, height
    out.write_fields(&[0, 0, width, height])?;
    out.write_fields(&[8, DESCRIPTOR])?;

    out.extend_from_slice(&colormap);
    for row in image.rows {
        out.extend_from_slice(row);
    }

    Ok(out)
}

fn dimension(field: &'static str, value: u32) -> Result<u16> {
    u16::try_from(value).map_err(|_| Error::FieldOverflow {
        field,
        value: u64::from(value),
        max: u64::from(u16::MAX),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mzp::palette::{Palette, PaletteLayout};

    #[test]
    fn header_and_colormap() {
        let raw = [0x10, 0x20, 0x30, 0x40];
        let palette = Palette::read(&mut &raw[..], PaletteLayout::Linear, 1).unwrap();
        let rows = vec![vec![0, 1, 2], vec![3, 4, 5]];
        let image = RasterImage::new(3, 2, PixelFormat::Indexed(&palette), &rows).unwrap();

        let data = encode(&image).unwrap();
        assert_eq!(
            &data[..HEADER_LEN],
            [0, 1, 1, 0, 0, 0, 1, 32, 0, 0, 0, 0, 3, 0, 2, 0, 8, 0x28]
        );
        assert_eq!(&data[HEADER_LEN..HEADER_LEN + 8], [0x30, 0x20, 0x10, 0x81, 0, 0, 0, 0xFF]);
        assert_eq!(data.len(), HEADER_LEN + 1024 + 6);
        assert_eq!(&data[HEADER_LEN + 1024..], [0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn truecolor_is_rejected() {
        let rows = vec![vec![0; 3]];
        let image = RasterImage::new(1, 1, PixelFormat::Rgb, &rows).unwrap();
        assert!(matches!(encode(&image), Err(Error::MalformedHeader { .. })));
    }
}
