//! Print the frames of a GSD trajectory.
use std::io::{BufWriter, Write};
use std::num::{NonZeroU64, ParseIntError};
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use gsdread::{Frame, FrameSelection, GSDReader, Range, ReaderOptions};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

fn frame_selection_parser(selection: &str) -> Result<FrameSelection, ParseIntError> {
    let mut components = selection.split(':');
    let start = components
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .transpose()?;
    let end = components
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .transpose()?;
    let step = components
        .next()
        .filter(|s| !s.is_empty())
        .map(NonZeroU64::from_str)
        .transpose()?;
    Ok(FrameSelection::Range(Range::new(start, end, step)))
}

/// Print the step, time, and unit cell of each frame in a GSD trajectory.
///
/// Each line holds the frame index, step, time, the unit cell as `Lx Ly Lz alpha beta gamma`, and
/// the raw `xy xz yz` tilt factors, separated by tabs.
#[derive(Parser)]
struct Args {
    /// Input path (gsd).
    input: PathBuf,

    /// Frame selection in the format `start:stop:step`. Each of these values optional.
    ///
    /// - `:100` will select the first 100 frames.
    ///
    /// - `3:14` will select the 4th up to and including the 14th frames, 11 frames in total.
    ///
    /// - `::2` will select every second frame.
    #[arg(short, long, value_parser=frame_selection_parser)]
    frame_selection: Option<FrameSelection>,

    /// Time between two consecutive frames.
    #[arg(long, default_value_t = 1.0)]
    dt: f64,

    /// Time of the first frame.
    #[arg(long, default_value_t = 0.0)]
    time_offset: f64,

    /// Also print the position of every particle below each frame.
    #[arg(long)]
    positions: bool,

    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Do not log anything.
    #[arg(short, long)]
    quiet: bool,
}

fn setup_logging(verbosity: u8, quiet: bool) {
    let level_filter = if quiet {
        LevelFilter::OFF
    } else {
        match verbosity {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(level_filter)
        .with(stderr_layer)
        .init();
}

fn main() -> gsdread::Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose, args.quiet);

    let options = ReaderOptions {
        dt: args.dt,
        time_offset: args.time_offset,
    };
    let mut reader = GSDReader::with_options(&args.input, options)?;
    let header = reader.header()?;
    let (major, minor) = header.version();
    let mut stdout = BufWriter::new(std::io::stdout().lock());
    writeln!(
        stdout,
        "# {} ({} schema, gsd {major}.{minor}): {} frames, {} particles",
        header.application,
        header.schema,
        reader.n_frames()?,
        reader.n_atoms(),
    )?;

    let frame_selection = args.frame_selection.unwrap_or_default();
    for idx in 0..reader.n_frames()? {
        match frame_selection.is_included(idx) {
            Some(true) => {}
            Some(false) => continue,
            None => break,
        }
        let frame = reader.read_frame(idx)?;
        write_frame(&mut stdout, frame, args.positions)?;
    }

    stdout.flush()?;
    reader.close();
    Ok(())
}

fn write_frame(out: &mut impl Write, frame: &Frame, positions: bool) -> std::io::Result<()> {
    write!(out, "{}\t{}\t{:.3}", frame.frame_index, frame.step, frame.time)?;
    for value in frame.box_dimensions.iter().chain(&frame.tilt_factors) {
        write!(out, "\t{value:.4}")?;
    }
    writeln!(out)?;

    if positions {
        for pos in &frame.positions {
            writeln!(out, "\t{:.4}\t{:.4}\t{:.4}", pos.x, pos.y, pos.z)?;
        }
    }
    Ok(())
}
