//! Extraction of a requested list of frames, in the requested order.
use std::io::Read;
use std::path::PathBuf;

use log::{debug, info, warn};

use crate::order::{sort, unsort};
use crate::selection::{AtomSelection, Query};
use crate::topology::Topology;
use crate::{Error, Frame, Result, XTCReader, XTCWriter};

/// A trajectory that can be walked front to back, one frame at a time.
///
/// Implementations must yield consecutive frame indices starting at zero.
pub trait FrameSource {
    type Snapshot;

    /// Moves on to the next frame and returns its index, or [`None`] once the trajectory is
    /// exhausted.
    fn advance(&mut self) -> Result<Option<usize>>;

    /// Returns an owned copy of the current frame.
    fn snapshot(&self) -> Self::Snapshot;
}

/// What to do with requested frames that are not in the trajectory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MissingFrames {
    /// Fail with [`Error::MissingFrames`].
    #[default]
    Error,
    /// Leave them out of the output, and warn about it.
    Skip,
}

/// Collects snapshots of the `requested` frames from `source` in a single forward pass.
///
/// The snapshots are returned in the order of `requested`, and a frame that is requested
/// multiple times appears at each of its positions. Reading stops as soon as the last requested
/// frame has been taken.
pub fn extract_frames<S: FrameSource>(
    source: &mut S,
    requested: &[usize],
    missing: MissingFrames,
) -> Result<Vec<S::Snapshot>> {
    // Sorted descending, so the next frame we are looking for is at the end.
    let mut pending = sort(requested);
    pending.reverse();
    debug!("sorted frame list: {pending:?}");

    let mut snapshots = Vec::with_capacity(requested.len());
    let mut nread = 0;
    while !pending.is_empty() {
        let idx = match source.advance()? {
            Some(idx) => idx,
            None => break,
        };
        nread += 1;
        while pending.last() == Some(&idx) {
            snapshots.push(source.snapshot());
            pending.pop();
            debug!("get frame: {idx}");
        }
    }

    if !pending.is_empty() {
        pending.dedup();
        pending.reverse();
        match missing {
            MissingFrames::Error => {
                return Err(Error::MissingFrames {
                    missing: pending,
                    nframes: nread,
                })
            }
            MissingFrames::Skip => warn!(
                "skipping requested frames {pending:?}, the trajectory has only {nread} frames"
            ),
        }
    }

    Ok(unsort(snapshots, requested))
}

/// An owned copy of one frame, restricted to the selected atoms.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Zero-based index of the frame in the trajectory it was taken from.
    pub index: usize,
    pub frame: Frame,
}

/// A [`FrameSource`] over an xtc trajectory.
///
/// The reader decodes every frame into one reused buffer. Snapshots copy the selected atoms
/// out of it.
#[derive(Debug)]
pub struct XTCSource<R> {
    reader: XTCReader<R>,
    selection: AtomSelection,
    frame: Frame,
}

impl<R: Read> XTCSource<R> {
    pub fn new(reader: XTCReader<R>, selection: AtomSelection) -> Self {
        Self {
            reader,
            selection,
            frame: Frame::default(),
        }
    }
}

impl<R: Read> FrameSource for XTCSource<R> {
    type Snapshot = Snapshot;

    fn advance(&mut self) -> Result<Option<usize>> {
        let more = self.reader.next_frame(&mut self.frame)?;
        Ok(if more { self.reader.frame_index() } else { None })
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            index: self.reader.frame_index().unwrap_or_default(),
            frame: self.frame.select(&self.selection),
        }
    }
}

/// Everything [`write_selected_frames`] needs to know.
#[derive(Debug, Clone)]
pub struct Options {
    /// PDB file describing the atoms of the trajectory.
    pub topology: PathBuf,
    /// The xtc trajectory to read from.
    pub trajectory: PathBuf,
    /// Where the xtc trajectory with the requested frames is written.
    pub output: PathBuf,
    /// Zero-based frame indices, in the order they should be written.
    pub frames: Vec<usize>,
    /// Atom selection query, `all` by default.
    pub selection: String,
    pub missing: MissingFrames,
}

impl Options {
    pub fn new(
        topology: impl Into<PathBuf>,
        trajectory: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        frames: Vec<usize>,
    ) -> Self {
        Self {
            topology: topology.into(),
            trajectory: trajectory.into(),
            output: output.into(),
            frames,
            selection: "all".to_string(),
            missing: MissingFrames::default(),
        }
    }

    /// The path of the PDB file that describes the selected atoms, which sits next to the
    /// output trajectory.
    pub fn topology_output(&self) -> PathBuf {
        self.output.with_extension("pdb")
    }
}

/// Writes the requested frames of a trajectory to a new trajectory, in the requested order.
///
/// When the selection is anything but `all`, a PDB file describing the selected atoms is
/// written as well (see [`Options::topology_output`]), so that the new trajectory can be
/// opened on its own. Its coordinates are those of the first frame.
///
/// Returns the number of frames that were written.
pub fn write_selected_frames(options: &Options) -> Result<usize> {
    debug!("frame list: {:?}", options.frames);

    let topology = Topology::from_pdb(&options.topology)?;
    let query = Query::parse(&options.selection)?;
    let selection = query.evaluate(&topology);

    let mut reader = XTCReader::open(&options.trajectory)?;
    let mut first = Frame::default();
    let has_frames = reader.next_frame(&mut first)?;
    if has_frames && first.natoms() != topology.len() {
        return Err(Error::AtomCountMismatch {
            topology: topology.len(),
            trajectory: first.natoms(),
        });
    }
    info!(
        "selected {} of {} atoms with {:?}",
        selection.count(topology.len()),
        topology.len(),
        options.selection
    );

    reader.home()?;
    let mut source = XTCSource::new(reader, selection.clone());
    let snapshots = extract_frames(&mut source, &options.frames, options.missing)?;

    if !query.is_all() {
        let path = options.topology_output();
        let subset = if has_frames {
            topology.with_positions(&first).subset(&selection)
        } else {
            topology.subset(&selection)
        };
        subset.to_pdb(&path)?;
        info!("wrote the selected atoms to {}", path.display());
    }

    let mut writer = XTCWriter::create(&options.output)?;
    for snapshot in &snapshots {
        debug!("writing frame: {}", snapshot.index);
        writer.write_frame(&snapshot.frame)?;
    }
    let nframes = writer.finish()?;
    info!("wrote {nframes} frames to {}", options.output.display());

    Ok(nframes)
}
