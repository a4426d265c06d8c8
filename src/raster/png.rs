use super::{PaletteMode, PixelFormat, RasterImage};
use crate::error::Result;

/// Encodes `image` as an 8-bit PNG with every row unfiltered
///
/// Indexed images become colour type 3 with `PLTE` and `tRNS` chunks, or
/// colour type 6 when `mode` is [`PaletteMode::Rgba`].
pub fn encode(image: &RasterImage, mode: PaletteMode) -> Result<Vec<u8>> {
    let (color, palette, data) = match (image.format, mode) {
        (PixelFormat::Indexed(palette), PaletteMode::Indexed) => {
            (png::ColorType::Indexed, Some(palette), image.rows.concat())
        }
        (PixelFormat::Indexed(palette), PaletteMode::Rgba) => {
            let data: Vec<u8> = image
                .rows
                .iter()
                .flatten()
                .flat_map(|&index| palette.color(index))
                .collect();
            (png::ColorType::Rgba, None, data)
        }
        (PixelFormat::Rgb, _) => (png::ColorType::Rgb, None, image.rows.concat()),
        (PixelFormat::Rgba, _) => (png::ColorType::Rgba, None, image.rows.concat()),
    };

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, image.width, image.height);
        encoder.set_color(color);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Default);
        encoder.set_filter(png::FilterType::NoFilter);
        encoder.set_adaptive_filter(png::AdaptiveFilterType::NonAdaptive);
        if let Some(palette) = palette {
            encoder.set_palette(palette.rgb_bytes());
            encoder.set_trns(palette.alpha_bytes());
        }

        let mut writer = encoder.write_header()?;
        writer.write_image_data(&data)?;
        writer.finish()?;
    }

    tracing::trace!(width = image.width, height = image.height, ?color, bytes = out.len(), "encoded PNG");

    Ok(out)
}
