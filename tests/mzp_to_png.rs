use mrgd_rs::mrg::{ArchiveIndex, ArchiveWriter, EntryLayout};
use mrgd_rs::mzp::{BitmapFormat, ExtendPolicy, MzpFile};
use mrgd_rs::raster::{self, PaletteMode};
use mrgd_rs::{mzx, Error};
use std::io::Cursor;

const TILE: usize = 16;

/// Indexed-8bpp header for a 2x2 grid of 16x16 tiles, grayscale palette
fn grid_header() -> Vec<u8> {
    let mut header = Vec::new();
    for field in &[32_u16, 32, 16, 16, 2, 2, 0x01] {
        header.extend_from_slice(&field.to_le_bytes());
    }
    header.extend_from_slice(&[0x11, 0]);

    // Block-interleaved: pages of 0x80 bytes, sub-blocks 1 and 2 swapped
    let mut palette = vec![0; 0x400];
    for i in 0..256 {
        let block = (i % 32) / 8;
        let block = (block & 1) * 2 + (block >> 1);
        let offset = (i / 32) * 0x80 + block * 0x20 + (i % 8) * 4;
        palette[offset..offset + 4].copy_from_slice(&[i as u8, i as u8, i as u8, 0x80]);
    }
    header.extend_from_slice(&palette);

    header.extend_from_slice(&[2, 2, 1, 0]);
    header
}

fn grid_tiles() -> Vec<Vec<u8>> {
    (0..4)
        .map(|t| (0..TILE * TILE).map(|p| (t * 61 + p * 7) as u8).collect())
        .collect()
}

fn build_mzp() -> Vec<u8> {
    let mut writer = ArchiveWriter::new(EntryLayout::Combined);
    writer.add(&grid_header()).unwrap();
    for tile in grid_tiles() {
        writer.add(&mzx::compress(&tile, false).unwrap()).unwrap();
    }
    writer.finish().unwrap().mrg
}

/// The pixel at (x, y) of the stitched image, straight from the tile data
fn expected_index(tiles: &[Vec<u8>], x: usize, y: usize) -> u8 {
    let tile = (y / TILE) * 2 + x / TILE;
    tiles[tile][(y % TILE) * TILE + x % TILE]
}

#[test]
fn grid_survives_png_roundtrip() {
    let mut src = Cursor::new(build_mzp());
    let mzp = MzpFile::read(&mut src).unwrap();
    assert_eq!(mzp.header.bitmap.format, BitmapFormat::Indexed8);
    assert_eq!(mzp.tile_entries().len(), 4);

    let image = mzp.decode(&mut src, ExtendPolicy::Strict).unwrap();
    assert_eq!((image.width(), image.height()), (32, 32));

    let png = raster::png::encode(&image.raster().unwrap(), PaletteMode::Indexed).unwrap();

    let mut decoder = png::Decoder::new(&png[..]);
    decoder.set_transformations(png::Transformations::IDENTITY);
    let mut reader = decoder.read_info().unwrap();

    let plte = reader.info().palette.as_ref().unwrap().to_vec();
    for i in 0..256 {
        assert_eq!(&plte[i * 3..i * 3 + 3], [i as u8; 3]);
    }

    let mut pixels = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut pixels).unwrap();
    assert_eq!((info.width, info.height), (32, 32));
    assert_eq!(info.color_type, png::ColorType::Indexed);

    let tiles = grid_tiles();
    for y in 0..32 {
        for x in 0..32 {
            assert_eq!(pixels[y * info.line_size + x], expected_index(&tiles, x, y), "pixel ({}, {})", x, y);
        }
    }

    let summary = image.summary();
    assert_eq!(summary.tile_trans, "02 02 01 00");
    assert_eq!(summary.bitmap_bpp, 8);
}

#[test]
fn grid_to_rgba_and_tga() {
    let mut src = Cursor::new(build_mzp());
    let image = MzpFile::read(&mut src)
        .and_then(|mzp| mzp.decode(&mut src, ExtendPolicy::Strict))
        .unwrap();
    let raster = image.raster().unwrap();

    let png = raster::png::encode(&raster, PaletteMode::Rgba).unwrap();
    let mut reader = png::Decoder::new(&png[..]).read_info().unwrap();
    let mut pixels = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut pixels).unwrap();
    assert_eq!(info.color_type, png::ColorType::Rgba);

    let index = expected_index(&grid_tiles(), 20, 3);
    let at = 3 * info.line_size + 20 * 4;
    assert_eq!(&pixels[at..at + 4], [index, index, index, 0xFF]);

    let tga = raster::tga::encode(&raster).unwrap();
    assert_eq!(tga.len(), 18 + 0x400 + 32 * 32);
    assert_eq!(tga[18 + 0x400 + 3 * 32 + 20], index);
}

#[test]
fn split_archive_of_mzx_files() {
    let payloads: Vec<Vec<u8>> = vec![b"script text".to_vec(), (0..0x1234).map(|i| i as u8).collect()];

    let mut writer = ArchiveWriter::new(EntryLayout::Split);
    for payload in &payloads {
        writer.add(&mzx::compress(payload, true).unwrap()).unwrap();
    }
    let packed = writer.finish().unwrap();

    let index = ArchiveIndex::parse_hed(packed.hed.as_ref().unwrap()).unwrap();
    let mut src = Cursor::new(&packed.mrg);
    for (entry, payload) in index.entries.iter().zip(&payloads) {
        let data = mrgd_rs::mrg::read_entry(&mut src, entry).unwrap();
        assert_eq!(&mzx::decompress_file(&data, true).unwrap(), payload);
    }
}

#[test]
fn tiles_missing_from_archive() {
    let mut writer = ArchiveWriter::new(EntryLayout::Combined);
    writer.add(&grid_header()).unwrap();
    for tile in grid_tiles().iter().take(3) {
        writer.add(&mzx::compress(tile, false).unwrap()).unwrap();
    }
    let mut src = Cursor::new(writer.finish().unwrap().mrg);

    let mzp = MzpFile::read(&mut src).unwrap();
    assert!(matches!(
        mzp.decode(&mut src, ExtendPolicy::Strict),
        Err(Error::OutOfRange { index: 3, entries: 3 })
    ));

    let image = mzp.decode(&mut src, ExtendPolicy::WrapExtend).unwrap();
    assert_eq!(image.diagnostics.wrapped_tiles, [3]);
    // tile 3 reuses tile 0
    assert_eq!(image.rows[16][16..32], image.rows[0][..16]);
}
