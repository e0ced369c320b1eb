use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use pocketboy_core::GameBoy;

/// Headless runner: executes a ROM for a number of frames, echoes the
/// serial debug output, and optionally dumps the final frame as raw RGBA.
struct Options {
    rom_path: PathBuf,
    frames: u32,
    fast: bool,
    out_path: Option<PathBuf>,
    boot_rom_path: Option<PathBuf>,
}

fn usage() -> ! {
    eprintln!(
        "Usage: pocketboy <rom_path> [--frames N] [--fast] [--out frame.rgba] [--boot-rom dmg.bin]"
    );
    std::process::exit(2);
}

fn parse_options() -> Result<Options> {
    let mut rom_path = None;
    let mut frames = 600;
    let mut fast = false;
    let mut out_path = None;
    let mut boot_rom_path = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--frames" => {
                let value = args.next().unwrap_or_else(|| usage());
                frames = value
                    .parse()
                    .with_context(|| format!("invalid frame count '{value}'"))?;
            }
            "--fast" => fast = true,
            "--out" => out_path = Some(PathBuf::from(args.next().unwrap_or_else(|| usage()))),
            "--boot-rom" => {
                boot_rom_path = Some(PathBuf::from(args.next().unwrap_or_else(|| usage())))
            }
            "--help" | "-h" => usage(),
            other if rom_path.is_none() => rom_path = Some(PathBuf::from(other)),
            other => bail!("unexpected argument '{other}'"),
        }
    }

    let Some(rom_path) = rom_path else { usage() };
    Ok(Options {
        rom_path,
        frames,
        fast,
        out_path,
        boot_rom_path,
    })
}

fn main() -> Result<()> {
    env_logger::init();
    let options = parse_options()?;

    let rom = std::fs::read(&options.rom_path)
        .with_context(|| format!("failed to read ROM '{}'", options.rom_path.display()))?;

    let mut gb = GameBoy::new();
    if let Some(boot_path) = &options.boot_rom_path {
        let image = std::fs::read(boot_path)
            .with_context(|| format!("failed to read boot ROM '{}'", boot_path.display()))?;
        gb.load_boot_rom(&image);
    }
    gb.load_rom(&rom);

    log::info!(
        "running '{}' for {} frames{}",
        options.rom_path.display(),
        options.frames,
        if options.fast { " (unpaced)" } else { "" }
    );
    gb.run_frames(options.frames, !options.fast)
        .context("emulation aborted")?;

    let serial = gb.serial_output();
    if !serial.is_empty() {
        println!("{}", String::from_utf8_lossy(serial));
    }

    if let Some(out_path) = &options.out_path {
        std::fs::write(out_path, gb.bitmap().bytes())
            .with_context(|| format!("failed to write '{}'", out_path.display()))?;
        log::info!("wrote frame to '{}'", out_path.display());
    }

    Ok(())
}
