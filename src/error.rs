use std::io;
use std::num::ParseIntError;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A failure reported by the xdrfile library while writing a trajectory.
    #[error("xtc error: {0}")]
    Xtc(String),

    /// A line in a frame list that is not a non-negative integer.
    #[error("frame list line {line}: invalid frame index {content:?}")]
    FrameList {
        line: usize,
        content: String,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid selection {query:?}: {reason}")]
    Selection { query: String, reason: String },

    #[error("topology line {line}: {reason}")]
    Topology { line: usize, reason: String },

    #[error("topology has {topology} atoms, but the trajectory has {trajectory}")]
    AtomCountMismatch { topology: usize, trajectory: usize },

    /// Requested frames that lie beyond the end of the trajectory.
    #[error("requested frames {missing:?} are not in the trajectory ({nframes} frames)")]
    MissingFrames { missing: Vec<usize>, nframes: usize },
}
