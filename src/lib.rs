//! Extract an ordered, possibly repeated selection of frames from an xtc trajectory.
//!
//! The heart of this crate is [`extract_frames`], which reads a trajectory in a single forward
//! pass and hands back snapshots in exactly the order they were requested. Around it live the
//! pieces needed to make a complete tool: an xtc [reader](XTCReader) and [writer](XTCWriter),
//! a PDB [`Topology`], and a small atom selection language ([`Query`]).
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use glam::{Mat3, Vec3};

use crate::reader::{read_compressed_positions, read_uncompressed_positions, Header};
pub use crate::error::{Error, Result};
pub use crate::extract::{
    extract_frames, write_selected_frames, FrameSource, MissingFrames, Options, Snapshot,
    XTCSource,
};
pub use crate::selection::{AtomSelection, Query};
pub use crate::topology::{Atom, Topology};
pub use crate::writer::XTCWriter;

pub mod error;
pub mod extract;
pub mod framelist;
pub mod order;
pub mod reader;
pub mod selection;
pub mod topology;
pub mod writer;

pub type BoxVec = Mat3;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Frame {
    pub step: u32,
    /// Time in picoseconds.
    pub time: f32,
    pub boxvec: BoxVec,
    /// Zero for frames that were stored uncompressed.
    pub precision: f32,
    /// Flattened positions in nm, `[x0, y0, z0, x1, ...]`.
    pub positions: Vec<f32>,
}

impl Frame {
    pub fn coords(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.positions.chunks_exact(3).map(Vec3::from_slice)
    }

    pub fn natoms(&self) -> usize {
        self.positions.len() / 3
    }

    /// Returns an owned copy of this [`Frame`] holding only the atoms in `selection`.
    ///
    /// The order of the atoms is preserved.
    pub fn select(&self, selection: &AtomSelection) -> Frame {
        let mut positions = self.positions.clone();
        retain_atoms(&mut positions, selection);
        Frame {
            positions,
            ..*self
        }
    }
}

/// Drop the positions of the atoms that are not included in `selection`, in place.
fn retain_atoms(positions: &mut Vec<f32>, selection: &AtomSelection) {
    if let AtomSelection::All = selection {
        return;
    }
    let natoms = positions.len() / 3;
    let mut kept = 0;
    for idx in 0..natoms {
        match selection.is_included(idx) {
            Some(true) => {}
            Some(false) => continue,
            None => break,
        }
        positions.copy_within(idx * 3..idx * 3 + 3, kept * 3);
        kept += 1;
    }
    positions.truncate(kept * 3);
}

/// Reads the frames of an xtc trajectory one at a time, front to back.
#[derive(Debug, Clone)]
pub struct XTCReader<R> {
    pub file: R,
    /// Number of frames read since the start of the trajectory.
    nread: usize,
    scratch: Vec<u8>,
}

impl XTCReader<std::fs::File> {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(Self::new(file))
    }
}

impl<R: Read> XTCReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            file: reader,
            nread: 0,
            scratch: Vec::new(),
        }
    }

    /// Returns the zero-based index of the frame that was read most recently, or [`None`] if
    /// no frame has been read yet.
    pub fn frame_index(&self) -> Option<usize> {
        self.nread.checked_sub(1)
    }

    /// A convenience function to read all frames in a trajectory.
    ///
    /// It is likely more efficient to use [`XTCReader::next_frame`] if you are only interested in
    /// the values of a single frame at a time.
    pub fn read_all_frames(&mut self) -> io::Result<Box<[Frame]>> {
        let mut frames = Vec::new();
        loop {
            let mut frame = Frame::default();
            if !self.next_frame(&mut frame)? {
                break;
            }
            frames.push(frame);
        }
        Ok(frames.into_boxed_slice())
    }

    /// Reads the next [`Frame`] into `frame`, returning `false` if the trajectory is exhausted.
    ///
    /// The buffer of `frame` is reused. A trajectory that ends in the middle of a frame is an
    /// error, not an exhausted trajectory.
    pub fn next_frame(&mut self, frame: &mut Frame) -> io::Result<bool> {
        let header = match Header::read(&mut self.file)? {
            Some(header) => header,
            None => return Ok(false),
        };
        let natoms = header.natoms;

        frame.positions.resize(natoms * 3, 0.0);
        if natoms <= 9 {
            // In case the number of atoms is very small, their positions are not compressed.
            read_uncompressed_positions(&mut self.file, &mut frame.positions)?;
            frame.precision = 0.0;
        } else {
            frame.precision = reader::read_f32(&mut self.file)?;
            read_compressed_positions(
                &mut self.file,
                &mut frame.positions,
                frame.precision,
                &mut self.scratch,
            )?;
        }
        self.nread += 1;

        frame.step = header.step;
        frame.time = header.time;
        frame.boxvec = header.boxvec;

        Ok(true)
    }
}

impl<R: Read + Seek> XTCReader<R> {
    /// Return to the start of the trajectory, so that the next frame read is the first one.
    pub fn home(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.nread = 0;
        Ok(())
    }
}
