#![allow(dead_code)]

use std::path::{Path, PathBuf};

use glam::Vec3;
use xtcpick::{Atom, BoxVec, Frame, Topology, XTCWriter};

pub const NFRAMES: usize = 10;
/// Four alanines of four backbone atoms each, followed by four waters.
pub const NATOMS: usize = 20;

/// A small system: a peptide on chain A and a few waters on chain W.
pub fn topology(natoms: usize) -> Topology {
    let atoms = (0..natoms)
        .map(|idx| {
            let (name, resname, chain, resid, hetero) = if idx < 16 {
                let name = ["N", "CA", "C", "O"][idx % 4];
                (name, "ALA", "A", idx as i32 / 4 + 1, false)
            } else {
                ("OW", "SOL", "W", idx as i32 - 11, true)
            };
            Atom {
                serial: idx + 1,
                name: name.to_string(),
                resname: resname.to_string(),
                chain: chain.to_string(),
                resid,
                element: name[..1].to_string(),
                position: Vec3::ZERO,
                hetero,
            }
        })
        .collect();
    Topology {
        atoms,
        boxvec: None,
    }
}

/// Frame `idx` of the test trajectory, recognizable by its step, time and coordinates.
pub fn frame(idx: usize, natoms: usize) -> Frame {
    let f = idx as f32;
    let positions = (0..natoms)
        .flat_map(|atom| {
            let a = atom as f32;
            [0.1 * a + f, 0.5 + 0.01 * f, 1.0 + 0.2 * a]
        })
        .collect();
    Frame {
        step: idx as u32 * 100,
        time: f * 2.0,
        boxvec: BoxVec::from_diagonal(Vec3::splat(5.0 + f)),
        precision: 1000.0,
        positions,
    }
}

/// Writes a topology and a trajectory of `nframes` frames to `dir`.
///
/// Returns the paths to the topology and the trajectory.
pub fn write_system(dir: &Path, natoms: usize, nframes: usize) -> (PathBuf, PathBuf) {
    let topology_path = dir.join("system.pdb");
    topology(natoms).to_pdb(&topology_path).unwrap();

    let trajectory_path = dir.join("trajectory.xtc");
    let mut writer = XTCWriter::create(&trajectory_path).unwrap();
    for idx in 0..nframes {
        writer.write_frame(&frame(idx, natoms)).unwrap();
    }
    writer.finish().unwrap();

    (topology_path, trajectory_path)
}

/// Whether two flattened coordinate lists agree up to the given tolerance.
pub fn close(a: &[f32], b: &[f32], tolerance: f32) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= tolerance)
}
