use std::path::PathBuf;

use clap::Parser;
use daggerfall_pak::PakFile;
use image::{Rgba, RgbaImage};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
struct Args {
    /// CLIMATE.PAK or POLITIC.PAK
    file: PathBuf,

    /// Output image, defaults to the input path with a png extension
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// spread the palette index over the channels so neighbouring climate and
// region ids stay distinguishable
fn index_to_rgba(idx: u8) -> Rgba<u8> {
    Rgba([
        idx.wrapping_mul(37),
        idx.wrapping_mul(73),
        idx.wrapping_mul(151),
        255,
    ])
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut pak = PakFile::new();
    pak.load(&args.file)?;

    let bitmap = pak.get_bitmap();

    let mut png = RgbaImage::new(bitmap.width as u32, bitmap.height as u32);
    for (x, y, pixel) in png.enumerate_pixels_mut() {
        *pixel = index_to_rgba(bitmap.data[y as usize * bitmap.width + x as usize]);
    }

    let out = args.out.unwrap_or_else(|| args.file.with_extension("png"));
    png.save(&out)?;

    println!("{}", out.display());

    Ok(())
}
