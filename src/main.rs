//! Write a chosen list of frames from an xtc trajectory to a new trajectory, in the order they
//! were listed.
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::debug;
use xtcpick::framelist::{parse_frame_list, read_frame_list};
use xtcpick::{write_selected_frames, MissingFrames, Options};

/// Extract frames from an xtc trajectory, in the order given by a frame list.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Topology path (pdb).
    topology: PathBuf,

    /// Input trajectory path (xtc).
    trajectory: PathBuf,

    /// Output trajectory path (xtc).
    ///
    /// When an atom selection is given, a pdb file with the selected atoms is written next to
    /// it, with the same name but a `.pdb` extension.
    output: PathBuf,

    /// File with one zero-based frame index per line. Read from standard input if omitted.
    ///
    /// Frames may be listed in any order, and more than once. They are written in that order.
    frame_list: Option<PathBuf>,

    /// Atom selection query, such as `protein and name CA` or `not resname SOL`.
    #[arg(short, long, default_value = "all")]
    selection: String,

    /// Skip frames that are listed but not in the trajectory, rather than failing.
    #[arg(long)]
    allow_missing: bool,

    /// Report every frame as it is found and written.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let frames = match &args.frame_list {
        Some(path) => read_frame_list(path)
            .with_context(|| format!("could not read frame list {}", path.display()))?,
        None => {
            debug!("reading the frame list from standard input");
            let stdin = std::io::stdin();
            parse_frame_list(stdin.lock()).context("could not read frame list from stdin")?
        }
    };

    let options = Options {
        selection: args.selection,
        missing: if args.allow_missing {
            MissingFrames::Skip
        } else {
            MissingFrames::Error
        },
        ..Options::new(args.topology, args.trajectory, args.output, frames)
    };
    write_selected_frames(&options).with_context(|| {
        format!(
            "could not extract frames from {} into {}",
            options.trajectory.display(),
            options.output.display()
        )
    })?;

    Ok(())
}
