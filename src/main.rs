use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use splicekit::{convert_file, init_logging, preflight, ConversionOutcome, Error, Palette};

#[derive(Parser, Debug)]
#[command(
    name = "splicekit",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_DATE"), ")"),
    about = "Multi-material G-code post-processor for Palette splicers",
    arg_required_else_help = true
)]
struct Cli {
    /// Log as JSON lines instead of plain text
    #[arg(long, global = true)]
    json_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a print and write its splice program
    Convert {
        /// Sliced G-code file
        input: PathBuf,

        /// Palette configuration (.json or .toml)
        #[arg(long, value_name = "FILE")]
        palette: PathBuf,

        /// Output G-code (default: <INPUT stem>.mcf.gcode next to the input)
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Run only the first pass and print its result as JSON
    Preflight {
        /// Sliced G-code file
        input: PathBuf,

        /// Palette configuration (.json or .toml)
        #[arg(long, value_name = "FILE")]
        palette: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_log)?;

    match cli.command {
        Commands::Convert {
            input,
            palette,
            output,
        } => {
            let palette = load_palette(&palette)?;
            let output = output.unwrap_or_else(|| default_output(&input));
            run_convert(&input, &output, palette)
        }
        Commands::Preflight { input, palette } => {
            let palette = load_palette(&palette)?;
            run_preflight(&input, &palette)
        }
    }
}

fn load_palette(path: &Path) -> anyhow::Result<Palette> {
    Palette::load_from_file(path)
        .with_context(|| format!("Failed to load palette from {}", path.display()))
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}.mcf.gcode", stem))
}

fn run_convert(input: &Path, output: &Path, palette: Palette) -> anyhow::Result<()> {
    let outcome = convert_file(input, output, Arc::new(palette)).map_err(presentable)?;

    let mut stdout = io::stdout().lock();
    match outcome {
        ConversionOutcome::Skipped { drives_used } => {
            writeln!(
                stdout,
                "Skipped: the print uses {} drive(s), no splicing needed",
                drives_used.len()
            )?;
        }
        ConversionOutcome::Converted(report) => {
            writeln!(stdout, "Wrote {}", output.display())?;
            if let Some(path) = &report.msf_path {
                writeln!(stdout, "Splice program: {}", path.display())?;
            }
            writeln!(
                stdout,
                "{} transitions, {} splices, {} pings, {:.2} mm of filament",
                report.transitions, report.splices, report.pings, report.total_filament
            )?;
            for (drive, length) in report.filament_by_drive.iter().enumerate() {
                if *length > 0.0 {
                    writeln!(stdout, "  drive {}: {:.2} mm", drive + 1, length)?;
                }
            }
        }
    }
    Ok(())
}

fn run_preflight(input: &Path, palette: &Palette) -> anyhow::Result<()> {
    let file = File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
    let result = preflight(BufReader::new(file), palette).map_err(presentable)?;

    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &result)?;
    writeln!(stdout)?;
    Ok(())
}

/// Render library errors the way a user should read them
fn presentable(err: Error) -> anyhow::Error {
    anyhow::anyhow!(err.user_message())
}
