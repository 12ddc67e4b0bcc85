use std::io;
use std::path::Path;

use log::warn;
use xdrfile::{Trajectory, XTCTrajectory};

use crate::{Error, Frame, Result};

/// Precision of every compressed frame written by [`XTCWriter`].
pub const PRECISION: f32 = 1000.0;

/// Largest absolute scaled coordinate that can be stored as an integer.
const MAXABS: f32 = (i32::MAX - 2) as f32;

fn map_xtc_err(err: xdrfile::Error) -> Error {
    Error::Xtc(err.to_string())
}

/// Writes [`Frame`]s to an xtc trajectory.
///
/// Frames with at most 9 atoms are stored uncompressed, larger frames are compressed with a
/// precision of [`PRECISION`]. The trajectory is flushed by [`XTCWriter::finish`], and when the
/// writer is dropped, so that frames written before an error are not lost.
pub struct XTCWriter {
    traj: XTCTrajectory,
    buffer: xdrfile::Frame,
    nwritten: usize,
}

impl XTCWriter {
    /// Creates the trajectory at `path`, truncating any existing file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let traj = XTCTrajectory::open_write(path.as_ref()).map_err(map_xtc_err)?;
        Ok(Self {
            traj,
            buffer: xdrfile::Frame::new(),
            nwritten: 0,
        })
    }

    /// Returns the number of frames written so far.
    pub fn nframes(&self) -> usize {
        self.nwritten
    }

    /// Encodes `frame` and appends it to the trajectory.
    ///
    /// Coordinates that cannot be stored at [`PRECISION`] are an [`io::ErrorKind::InvalidInput`]
    /// error, and nothing is written for the frame.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if let Some(&v) = frame
            .positions
            .iter()
            .find(|v| !((*v * PRECISION).abs() < MAXABS))
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("coordinate {v} cannot be stored with precision {PRECISION}"),
            )
            .into());
        }

        let buffer = &mut self.buffer;
        buffer.step = frame.step as usize;
        buffer.time = frame.time;
        buffer.box_vector = [0, 1, 2].map(|k| frame.boxvec.col(k).to_array());
        buffer.coords.clear();
        buffer.coords.extend(frame.coords().map(|c| c.to_array()));
        self.traj.write(buffer).map_err(map_xtc_err)?;

        self.nwritten += 1;
        Ok(())
    }

    /// Flushes the trajectory and returns the number of frames written.
    pub fn finish(mut self) -> Result<usize> {
        self.traj.flush().map_err(map_xtc_err)?;
        Ok(self.nwritten)
    }
}

impl Drop for XTCWriter {
    fn drop(&mut self) {
        if let Err(err) = self.traj.flush() {
            warn!("could not flush the trajectory: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use glam::{Mat3, Vec3};

    use super::*;
    use crate::reader::Header;
    use crate::XTCReader;

    fn decode(path: &Path) -> Vec<Frame> {
        let mut reader = XTCReader::open(path).unwrap();
        reader.read_all_frames().unwrap().into_vec()
    }

    fn write(path: &Path, frames: &[&Frame]) {
        let mut writer = XTCWriter::create(path).unwrap();
        for frame in frames {
            writer.write_frame(frame).unwrap();
        }
        assert_eq!(writer.finish().unwrap(), frames.len());
    }

    fn assert_close(a: &[f32], b: &[f32], tolerance: f32) {
        assert_eq!(a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            assert!((x - y).abs() <= tolerance, "value {i}: {x} != {y}");
        }
    }

    fn scratch(name: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        (dir, path)
    }

    #[test]
    fn small_frames_are_stored_raw() {
        let (_dir, path) = scratch("small.xtc");
        let frame = Frame {
            step: 7,
            time: 1.5,
            boxvec: Mat3::from_diagonal(Vec3::splat(3.0)),
            precision: 0.0,
            positions: vec![0.1234567, -2.0, 3.5, 4.0, 5.0, 6.0],
        };
        write(&path, &[&frame]);
        let len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(len as usize, Header::SIZE + 6 * 4);

        let frames = decode(&path);
        assert_eq!(frames.len(), 1);
        // Raw floats survive exactly.
        assert_eq!(frames[0].positions, frame.positions);
        assert_eq!(frames[0].step, 7);
        assert_eq!(frames[0].time, 1.5);
        assert_eq!(frames[0].boxvec, frame.boxvec);
    }

    #[test]
    fn compressed_frames() {
        // A few hundred waters on a lattice, with the hydrogens close to their oxygen.
        let mut positions = Vec::new();
        for w in 0..300 {
            let o = [
                (w % 10) as f32 * 0.31,
                ((w / 10) % 10) as f32 * 0.29,
                (w / 100) as f32 * 0.33 - 0.5,
            ];
            positions.extend(o);
            positions.extend([o[0] + 0.0957, o[1], o[2]]);
            positions.extend([o[0] - 0.024, o[1] + 0.0927, o[2]]);
        }
        let frame = Frame {
            step: 100,
            time: 0.2,
            boxvec: Mat3::from_diagonal(Vec3::new(3.1, 2.9, 1.0)),
            precision: PRECISION,
            positions,
        };

        let (_dir, path) = scratch("water.xtc");
        write(&path, &[&frame, &frame]);
        let len = std::fs::metadata(&path).unwrap().len() as usize;
        assert!(len < 2 * frame.positions.len() * 4, "should be compressed");

        let frames = decode(&path);
        assert_eq!(frames.len(), 2);
        for decoded in &frames {
            assert_eq!(decoded.step, 100);
            assert_eq!(decoded.precision, PRECISION);
            assert_close(&decoded.positions, &frame.positions, 0.5e-3 + 1e-6);
        }
    }

    #[test]
    fn large_box_with_an_atom_at_the_origin() {
        // Over 65 nm per dimension, with the first atom at the minimum corner.
        let positions: Vec<f32> = (0..12)
            .flat_map(|i| match i {
                0 => [0.0; 3],
                _ => {
                    let i = i as f32;
                    [i * 6.3, 70.0 - i * 5.9, (i * 17.0) % 69.0]
                }
            })
            .collect();
        let frame = Frame {
            boxvec: Mat3::from_diagonal(Vec3::splat(72.0)),
            precision: PRECISION,
            positions,
            ..Frame::default()
        };

        let (_dir, path) = scratch("large.xtc");
        write(&path, &[&frame]);
        let frames = decode(&path);
        assert_eq!(frames.len(), 1);
        assert_close(&frames[0].positions, &frame.positions, 0.5e-3 + 1e-5);
    }

    #[test]
    fn scattered_and_large_coordinates() {
        // Spread over more than 0xffffff precision units, which forces the per-dimension path.
        let positions: Vec<f32> = (0..40)
            .flat_map(|i| {
                let i = i as f32;
                [i * 523.7 - 9000.0, (i * 7.3) % 11.0, -i * 0.9]
            })
            .collect();
        let frame = Frame {
            positions,
            precision: PRECISION,
            ..Frame::default()
        };

        let (_dir, path) = scratch("scattered.xtc");
        write(&path, &[&frame]);
        // Large magnitudes lose some float resolution on the way in.
        assert_close(&decode(&path)[0].positions, &frame.positions, 2e-3);
    }

    #[test]
    fn unrepresentable_coordinates() {
        let mut positions = vec![0.0; 30];
        positions[4] = 1e9;
        let frame = Frame {
            positions,
            ..Frame::default()
        };
        let (_dir, path) = scratch("overflow.xtc");
        let mut writer = XTCWriter::create(&path).unwrap();
        match writer.write_frame(&frame) {
            Err(Error::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::InvalidInput),
            other => panic!("expected invalid input, got {other:?}"),
        }
        assert_eq!(writer.nframes(), 0);
    }

    #[test]
    fn dropping_flushes() {
        let frame = Frame {
            positions: (0..60).map(|v| v as f32 * 0.01).collect(),
            ..Frame::default()
        };
        let (_dir, path) = scratch("dropped.xtc");
        {
            let mut writer = XTCWriter::create(&path).unwrap();
            writer.write_frame(&frame).unwrap();
            writer.write_frame(&frame).unwrap();
        }
        assert_eq!(decode(&path).len(), 2);
    }
}
