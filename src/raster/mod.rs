//! Writers for decoded images
//!
//! Both writers take finished scanlines: every row holds exactly
//! `width * bytes_per_pixel` bytes, top row first.

pub mod png;
pub mod tga;

use crate::error::{Error, Result};
use crate::mzp::palette::Palette;

/// What one pixel of a scanline is
#[derive(Debug, Clone, Copy)]
pub enum PixelFormat<'a> {
    /// One palette index per byte
    Indexed(&'a Palette),
    Rgb,
    Rgba,
}

impl PixelFormat<'_> {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Indexed(_) => 1,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }
}

/// How indexed images are stored in a PNG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteMode {
    /// Keep the indices, with `PLTE` and `tRNS` chunks
    Indexed,
    /// Look every index up and write RGBA
    Rgba,
}

impl Default for PaletteMode {
    fn default() -> Self {
        PaletteMode::Indexed
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RasterImage<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat<'a>,
    pub rows: &'a [Vec<u8>],
}

impl<'a> RasterImage<'a> {
    pub fn new(width: u32, height: u32, format: PixelFormat<'a>, rows: &'a [Vec<u8>]) -> Result<Self> {
        let image = RasterImage {
            width,
            height,
            format,
            rows,
        };
        image.check_rows()?;
        Ok(image)
    }

    pub fn row_len(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    fn check_rows(&self) -> Result<()> {
        if self.rows.len() != self.height as usize {
            return Err(Error::size_mismatch("raster rows", u64::from(self.height), self.rows.len() as u64));
        }

        let row_len = self.row_len();
        for (index, row) in self.rows.iter().enumerate() {
            if row.len() != row_len {
                return Err(Error::AssemblyError {
                    row: index,
                    reason: format!("expected {} bytes, found {}", row_len, row.len()),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rows_are_checked() {
        let rows = vec![vec![0; 6], vec![0; 6]];
        assert!(RasterImage::new(2, 2, PixelFormat::Rgb, &rows).is_ok());

        assert!(matches!(
            RasterImage::new(2, 3, PixelFormat::Rgb, &rows),
            Err(Error::SizeMismatch { expected: 3, actual: 2, .. })
        ));

        let rows = vec![vec![0; 8], vec![0; 7]];
        assert!(matches!(
            RasterImage::new(2, 2, PixelFormat::Rgba, &rows),
            Err(Error::AssemblyError { row: 1, .. })
        ));
    }
}
