//! Atom identities read from and written to PDB files.
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use glam::Vec3;

use crate::selection::AtomSelection;
use crate::{BoxVec, Error, Frame};

/// Ångström per nanometer. Trajectories are in nm, PDB files in Å.
const ANGSTROM_PER_NM: f32 = 10.0;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Atom {
    pub serial: usize,
    pub name: String,
    pub resname: String,
    pub chain: String,
    pub resid: i32,
    pub element: String,
    /// Position in Å.
    pub position: Vec3,
    /// Whether this atom came from a `HETATM` record.
    pub hetero: bool,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Topology {
    pub atoms: Vec<Atom>,
    /// Unit cell vectors in Å, written out as a `CRYST1` record.
    pub boxvec: Option<BoxVec>,
}

impl Topology {
    pub fn from_pdb<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let file = File::open(path)?;
        Self::read_pdb(BufReader::new(file))
    }

    /// Reads the `ATOM` and `HETATM` records of the first model in a PDB file.
    pub fn read_pdb<R: BufRead>(reader: R) -> crate::Result<Self> {
        let mut atoms = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let lineno = idx + 1;
            let record = line.get(..6).unwrap_or(&line).trim_end();
            match record {
                "ATOM" | "HETATM" => {
                    let atom = parse_atom(&line, atoms.len() + 1).map_err(|reason| {
                        Error::Topology {
                            line: lineno,
                            reason,
                        }
                    })?;
                    atoms.push(atom);
                }
                // Only the first model describes the topology.
                "ENDMDL" => break,
                _ => {}
            }
        }
        Ok(Self {
            atoms,
            boxvec: None,
        })
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Returns the atoms included in `selection`, in their original order.
    pub fn subset(&self, selection: &AtomSelection) -> Topology {
        let atoms = self
            .atoms
            .iter()
            .enumerate()
            .map_while(|(idx, atom)| selection.is_included(idx).map(|inc| (inc, atom)))
            .filter_map(|(inc, atom)| inc.then(|| atom.clone()))
            .collect();
        Topology {
            atoms,
            boxvec: self.boxvec,
        }
    }

    /// Takes the positions and unit cell of `frame`, which must hold one position per atom.
    pub fn with_positions(mut self, frame: &Frame) -> Topology {
        debug_assert_eq!(frame.natoms(), self.atoms.len());
        for (atom, position) in self.atoms.iter_mut().zip(frame.coords()) {
            atom.position = position * ANGSTROM_PER_NM;
        }
        self.boxvec = Some(frame.boxvec * ANGSTROM_PER_NM);
        self
    }

    pub fn to_pdb<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.write_pdb(&mut out)?;
        out.flush()
    }

    /// Write the atoms as PDB records, renumbering the serials from 1.
    pub fn write_pdb<W: Write>(&self, mut out: W) -> io::Result<()> {
        if let Some(boxvec) = self.boxvec.filter(|b| *b != BoxVec::ZERO) {
            let [a, b, c] = [boxvec.x_axis, boxvec.y_axis, boxvec.z_axis];
            writeln!(
                out,
                "CRYST1{:>9.3}{:>9.3}{:>9.3}{:>7.2}{:>7.2}{:>7.2} P 1           1",
                a.length(),
                b.length(),
                c.length(),
                b.angle_between(c).to_degrees(),
                a.angle_between(c).to_degrees(),
                a.angle_between(b).to_degrees(),
            )?;
        }
        for (idx, atom) in self.atoms.iter().enumerate() {
            // PDB ATOM record format (columns 1-80)
            // ATOM  serial name altLoc resName chainID resSeq iCode  x y z occ bfac  element
            let name = if atom.name.len() < 4 {
                format!(" {:<3}", atom.name)
            } else {
                format!("{:<4}", atom.name)
            };
            writeln!(
                out,
                "{:<6}{:>5} {} {:>3} {:1}{:>4}    {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}",
                if atom.hetero { "HETATM" } else { "ATOM" },
                (idx + 1) % 100_000,
                name,
                atom.resname,
                atom.chain,
                atom.resid % 10_000,
                atom.position.x,
                atom.position.y,
                atom.position.z,
                1.00,
                0.00,
                atom.element,
            )?;
        }
        writeln!(out, "END")
    }
}

/// Parse the fixed columns of an `ATOM` or `HETATM` record.
fn parse_atom(line: &str, fallback_serial: usize) -> Result<Atom, String> {
    let column = |start: usize, end: usize| {
        line.get(start..end.min(line.len()))
            .unwrap_or_default()
            .trim()
    };

    // Large systems overflow the serial column, so fall back on counting.
    let serial = column(6, 11).parse().unwrap_or(fallback_serial);
    let name = column(12, 16).to_string();
    if name.is_empty() {
        return Err("atom without a name".to_string());
    }
    let resname = column(17, 21).to_string();
    let chain = column(21, 22).to_string();
    let resid = column(22, 26)
        .parse()
        .map_err(|_| format!("invalid residue number {:?}", column(22, 26)))?;

    let mut position = [0.0; 3];
    for (k, start) in [30, 38, 46].into_iter().enumerate() {
        let value = column(start, start + 8);
        position[k] = value
            .parse()
            .map_err(|_| format!("invalid coordinate {value:?}"))?;
    }

    let element = match column(76, 78) {
        "" => name
            .chars()
            .find(|c| c.is_ascii_alphabetic())
            .map(String::from)
            .unwrap_or_default(),
        element => element.to_string(),
    };

    Ok(Atom {
        serial,
        name,
        resname,
        chain,
        resid,
        element,
        position: Vec3::from_array(position),
        hetero: line.starts_with("HETATM"),
    })
}
