//! mrgd - unpack/repack `mrgd00` archives, (de)compress MZX0 files and
//! extract MZP images

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mrgd_rs::mrg::{self, ArchiveIndex, ArchiveWriter, EntryLayout};
use mrgd_rs::mzp::{ExtendPolicy, MzpFile, TileSummary};
use mrgd_rs::mzx;
use mrgd_rs::raster::{self, PaletteMode};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "mrgd")]
#[command(about = "Tools for mrgd00 archives, MZX0 files and MZP images")]
#[command(version)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// MZX0 compression
    Mzx {
        #[command(subcommand)]
        command: MzxCommand,
    },

    /// MZP tile images
    Mzp {
        #[command(subcommand)]
        command: MzpCommand,
    },

    /// mrgd00 archives
    Mrg {
        #[command(subcommand)]
        command: MrgCommand,
    },
}

#[derive(Subcommand)]
enum MzxCommand {
    /// Decompress one or more .mzx files
    Decompress {
        /// Input .mzx files
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Literals are xor'd with 0xFF (1) or stored as-is (0)
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=1))]
        xor: u8,

        /// Output directory (defaults to next to each input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compress one or more files as .mzx
    Compress {
        /// Input files
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Literals are xor'd with 0xFF (1) or stored as-is (0)
        #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
        xor: u8,

        /// Output directory (defaults to next to each input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum MzpCommand {
    /// Extract MZP images to PNG
    Extract {
        /// Input .mzp files
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Output directory (defaults to the first input's directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write indexed images as RGBA, plus a TGA keeping the palette
        #[arg(long)]
        palette_convert: bool,

        /// Reuse tile entries when an image has more tiles than entries
        #[arg(long)]
        extend: bool,
    },
}

#[derive(Subcommand)]
enum MrgCommand {
    /// Unpack an archive, using its .hed index when there is one
    Unpack {
        /// Input .mrg file
        input: PathBuf,
    },

    /// Pack the files listed in filename_<name>.list into an archive
    Repack {
        /// Folder with the files to pack
        #[arg(short, long)]
        source: PathBuf,

        /// Self-contained archive instead of .mrg + .hed
        #[arg(short, long)]
        combine: bool,

        /// Output .mrg file
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    match cli.command {
        Commands::Mzx { command } => match command {
            MzxCommand::Decompress { input, xor, output } => {
                for path in &input {
                    mzx_decompress(path, xor == 1, output.as_deref())?;
                }
            }
            MzxCommand::Compress { input, xor, output } => {
                for path in &input {
                    mzx_compress(path, xor == 1, output.as_deref())?;
                }
            }
        },

        Commands::Mzp { command } => match command {
            MzpCommand::Extract {
                input,
                output,
                palette_convert,
                extend,
            } => {
                let extend = if extend {
                    ExtendPolicy::WrapExtend
                } else {
                    ExtendPolicy::Strict
                };
                mzp_extract(&input, output, palette_convert, extend)?;
            }
        },

        Commands::Mrg { command } => match command {
            MrgCommand::Unpack { input } => mrg_unpack(&input)?,
            MrgCommand::Repack {
                source,
                combine,
                output,
            } => mrg_repack(&source, combine, &output)?,
        },
    }

    Ok(())
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .with_context(|| format!("No file name in {:?}", path))
}

fn output_dir(path: &Path, output: Option<&Path>) -> PathBuf {
    match output {
        Some(dir) => dir.to_path_buf(),
        None => path.parent().map(Path::to_path_buf).unwrap_or_default(),
    }
}

fn mzx_decompress(path: &Path, xor_mode: bool, output: Option<&Path>) -> Result<()> {
    let data = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let decompressed =
        mzx::decompress_file(&data, xor_mode).with_context(|| format!("Failed to decompress {:?}", path))?;

    let ext = if mzx::is_riff_wave(&decompressed) { "wav" } else { "bin" };
    let dir = output_dir(path, output);
    fs::create_dir_all(&dir)?;
    let out = dir.join(format!("{}.{}", file_stem(path)?, ext));

    fs::write(&out, &decompressed).with_context(|| format!("Failed to write {:?}", out))?;
    tracing::info!("Decompressed {:?} -> {:?} ({:#X} bytes)", path, out, decompressed.len());
    Ok(())
}

fn mzx_compress(path: &Path, xor_mode: bool, output: Option<&Path>) -> Result<()> {
    let data = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;

    let mut compressed = Vec::new();
    if mzx::is_riff_wave(&data) {
        compressed.extend_from_slice(mzx::ATRAC_PREFIX);
    }
    compressed.extend(mzx::compress(&data, xor_mode)?);

    let dir = output_dir(path, output);
    fs::create_dir_all(&dir)?;
    let out = dir.join(format!("{}.mzx", file_stem(path)?));

    fs::write(&out, &compressed).with_context(|| format!("Failed to write {:?}", out))?;
    tracing::info!("Compressed {:?} -> {:?}", path, out);
    Ok(())
}

fn mzp_extract(input: &[PathBuf], output: Option<PathBuf>, palette_convert: bool, extend: ExtendPolicy) -> Result<()> {
    let dir = output.unwrap_or_else(|| output_dir(&input[0], None));
    fs::create_dir_all(&dir)?;

    let mode = if palette_convert {
        PaletteMode::Rgba
    } else {
        PaletteMode::Indexed
    };

    let mut summaries = BTreeMap::new();
    let mut failed = 0;
    for path in input {
        match extract_image(path, &dir, mode, extend) {
            Ok((name, summary)) => {
                summaries.insert(name, summary);
            }
            Err(e) => {
                tracing::error!("{:?}: {:#}", path, e);
                failed += 1;
            }
        }
    }

    let summary_path = dir.join("tiles_summary.json");
    let json = serde_json::to_string_pretty(&summaries)?;
    fs::write(&summary_path, json).with_context(|| format!("Failed to write {:?}", summary_path))?;

    if failed > 0 {
        bail!("{} of {} images failed to extract", failed, input.len());
    }
    Ok(())
}

fn extract_image(path: &Path, dir: &Path, mode: PaletteMode, extend: ExtendPolicy) -> Result<(String, TileSummary)> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut src = BufReader::new(file);

    let mzp = MzpFile::read(&mut src)?;
    let image = mzp.decode(&mut src, extend)?;
    for warning in &image.diagnostics.warnings {
        tracing::warn!("{:?}: {}", path, warning);
    }

    let stem = file_stem(path)?;
    let raster = image.raster()?;

    // Nothing is written until the whole image decoded
    let png = raster::png::encode(&raster, mode)?;
    let png_path = dir.join(format!("{}.png", stem));
    fs::write(&png_path, png).with_context(|| format!("Failed to write {:?}", png_path))?;

    if mode == PaletteMode::Rgba && image.is_indexed() {
        let tga = raster::tga::encode(&raster)?;
        let tga_path = dir.join(format!("{}.tga", stem));
        fs::write(&tga_path, tga).with_context(|| format!("Failed to write {:?}", tga_path))?;
    }

    tracing::info!(
        "Extracted {:?} ({}x{}, {:?})",
        path,
        image.width(),
        image.height(),
        image.header.format
    );

    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(stem);
    Ok((name, image.summary()))
}

fn mrg_unpack(input: &Path) -> Result<()> {
    let name = file_stem(input)?.to_lowercase();
    let hed_path = input.with_extension("hed");

    let index = if hed_path.exists() {
        tracing::info!("Using index {:?}", hed_path);
        let hed = fs::read(&hed_path).with_context(|| format!("Failed to read {:?}", hed_path))?;
        ArchiveIndex::parse_hed(&hed)?
    } else {
        let mut src = BufReader::new(File::open(input).with_context(|| format!("Failed to open {:?}", input))?);
        ArchiveIndex::read_combined(&mut src).with_context(|| format!("{:?} is not a mrgd00 archive", input))?
    };
    tracing::info!("{} archive with {} entries", name, index.len());

    let out_dir = input.with_file_name(format!("{}_unpack", name));
    fs::create_dir_all(&out_dir)?;

    let width = if index.len() < 10000 { 4 } else { 6 };
    let mut src = BufReader::new(File::open(input)?);
    let mut names = Vec::with_capacity(index.len());
    for (i, entry) in index.entries.iter().enumerate() {
        let data = mrg::read_entry(&mut src, entry).with_context(|| format!("Failed to read entry {}", i))?;

        let file_name = format!("{}_{:0width$}.bin", name, i, width = width);
        fs::write(out_dir.join(&file_name), &data)?;
        tracing::debug!("Saved {} ({:#X} bytes at {:#X})", file_name, entry.size, entry.offset);
        names.push(file_name);
    }

    let list_path = out_dir.join(format!("filename_{}.list", name));
    fs::write(&list_path, names.join("\n"))?;
    tracing::info!("Output directory {:?}", out_dir);
    Ok(())
}

fn mrg_repack(source: &Path, combine: bool, output: &Path) -> Result<()> {
    let name = file_stem(output)?;
    let list_path = source.join(format!("filename_{}.list", name));
    let list = fs::read_to_string(&list_path).with_context(|| format!("Failed to read {:?}", list_path))?;

    let layout = if combine {
        EntryLayout::Combined
    } else if name.starts_with("voice") {
        EntryLayout::Voice
    } else {
        EntryLayout::Split
    };

    let mut writer = ArchiveWriter::new(layout);
    for file_name in list.lines().filter(|l| !l.is_empty()) {
        let path = source.join(file_name);
        let data = fs::read(&path).with_context(|| format!("Failed to read {:?}", path))?;
        writer
            .add(&data)
            .with_context(|| format!("Failed to pack {:?}", path))?;
        tracing::debug!("Packed {}", file_name);
    }

    let packed = writer.finish()?;
    fs::write(output, &packed.mrg).with_context(|| format!("Failed to write {:?}", output))?;
    if let Some(hed) = packed.hed {
        let hed_path = output.with_extension("hed");
        fs::write(&hed_path, hed).with_context(|| format!("Failed to write {:?}", hed_path))?;
        tracing::info!("Saved {:?}", hed_path);
    }
    tracing::info!("Saved {:?}", output);
    Ok(())
}
