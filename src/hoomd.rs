//! The HOOMD schema on top of a [`GSDFile`].
//!
//! HOOMD only writes a chunk to a frame when its value differs from the first frame. When a chunk
//! is missing from some frame, the value from frame 0 is used. When frame 0 lacks it as well, the
//! schema default applies.
use std::io::{self, Read, Seek};

use glam::{IVec3, Vec3};

use crate::boxdim::TriclinicBox;
use crate::gsd::{GSDFile, Header, IndexEntry};

pub const SCHEMA: &str = "hoomd";

pub const STEP: &str = "configuration/step";
pub const BOX: &str = "configuration/box";
pub const N: &str = "particles/N";
pub const POSITION: &str = "particles/position";
pub const VELOCITY: &str = "particles/velocity";
pub const IMAGE: &str = "particles/image";

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// A GSD file that follows the HOOMD schema.
#[derive(Debug)]
pub struct HoomdTrajectory<R> {
    file: GSDFile<R>,
    floats: Vec<f32>,
    ints: Vec<i32>,
    uints: Vec<u64>,
}

impl<R: Read + Seek> HoomdTrajectory<R> {
    pub fn new(file: R) -> io::Result<Self> {
        let file = GSDFile::new(file)?;
        let schema = &file.header().schema;
        if schema != SCHEMA {
            return Err(invalid_data(format!(
                "expected a file with the '{SCHEMA}' schema, found '{schema}'"
            )));
        }
        Ok(Self {
            file,
            floats: Vec::new(),
            ints: Vec::new(),
            uints: Vec::new(),
        })
    }

    /// Returns a view of the frame at `index`, or [`None`] if the index is out of range.
    pub fn get(&mut self, index: usize) -> Option<HoomdFrame<'_, R>> {
        if index >= self.len() {
            return None;
        }
        Some(HoomdFrame { traj: self, index })
    }
}

impl<R> HoomdTrajectory<R> {
    /// Number of frames in the trajectory.
    pub fn len(&self) -> usize {
        self.file.nframes()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn header(&self) -> &Header {
        self.file.header()
    }

    /// Find `name` in `frame`, falling back to frame 0.
    fn chunk(&self, frame: usize, name: &str) -> Option<IndexEntry> {
        self.file
            .find_chunk(frame, name)
            .or_else(|| self.file.find_chunk(0, name))
    }
}

/// A single frame of a [`HoomdTrajectory`].
///
/// Every accessor reads from the underlying file.
pub struct HoomdFrame<'t, R> {
    traj: &'t mut HoomdTrajectory<R>,
    index: usize,
}

impl<R: Read + Seek> HoomdFrame<'_, R> {
    pub fn step(&mut self) -> io::Result<u64> {
        let Some(entry) = self.traj.chunk(self.index, STEP) else {
            return Ok(0);
        };
        let traj = &mut *self.traj;
        traj.file.read_u64s(&entry, &mut traj.uints)?;
        traj.uints
            .first()
            .copied()
            .ok_or_else(|| invalid_data(format!("frame {} has an empty step chunk", self.index)))
    }

    /// Returns the raw `[Lx, Ly, Lz, xy, xz, yz]` box.
    pub fn boxdim(&mut self) -> io::Result<TriclinicBox> {
        let Some(entry) = self.traj.chunk(self.index, BOX) else {
            return Ok(TriclinicBox::default());
        };
        let traj = &mut *self.traj;
        traj.file.read_f32s(&entry, &mut traj.floats)?;
        match traj.floats[..] {
            [lx, ly, lz, xy, xz, yz, ..] => Ok(TriclinicBox::from_raw([lx, ly, lz, xy, xz, yz])),
            _ => Err(invalid_data(format!(
                "frame {} has a box chunk with {} values, expected 6",
                self.index,
                traj.floats.len()
            ))),
        }
    }

    /// Returns the number of particles in this frame.
    pub fn particle_count(&mut self) -> io::Result<usize> {
        let Some(entry) = self.traj.chunk(self.index, N) else {
            return Ok(0);
        };
        let traj = &mut *self.traj;
        traj.file.read_u64s(&entry, &mut traj.uints)?;
        let n = traj.uints.first().copied().ok_or_else(|| {
            invalid_data(format!("frame {} has an empty particle count chunk", self.index))
        })?;
        usize::try_from(n).map_err(|_| invalid_data(format!("particle count {n} is too large")))
    }

    /// Read the positions of `natoms` particles into `out`.
    pub fn read_positions(&mut self, natoms: usize, out: &mut Vec<Vec3>) -> io::Result<()> {
        self.read_vec3s(POSITION, natoms, out)
    }

    /// Read the velocities of `natoms` particles into `out`.
    pub fn read_velocities(&mut self, natoms: usize, out: &mut Vec<Vec3>) -> io::Result<()> {
        self.read_vec3s(VELOCITY, natoms, out)
    }

    /// Read the periodic image counts of `natoms` particles into `out`.
    pub fn read_images(&mut self, natoms: usize, out: &mut Vec<IVec3>) -> io::Result<()> {
        out.clear();
        let Some(entry) = self.per_particle_chunk(IMAGE, natoms)? else {
            out.resize(natoms, IVec3::ZERO);
            return Ok(());
        };
        let traj = &mut *self.traj;
        traj.file.read_i32s(&entry, &mut traj.ints)?;
        out.extend(
            traj.ints
                .chunks_exact(3)
                .map(|c| IVec3::new(c[0], c[1], c[2])),
        );
        Ok(())
    }

    fn read_vec3s(&mut self, name: &str, natoms: usize, out: &mut Vec<Vec3>) -> io::Result<()> {
        out.clear();
        let Some(entry) = self.per_particle_chunk(name, natoms)? else {
            out.resize(natoms, Vec3::ZERO);
            return Ok(());
        };
        let traj = &mut *self.traj;
        traj.file.read_f32s(&entry, &mut traj.floats)?;
        out.extend(
            traj.floats
                .chunks_exact(3)
                .map(|c| Vec3::new(c[0], c[1], c[2])),
        );
        Ok(())
    }

    /// Look up a per-particle chunk and check that it has `natoms` rows of three columns.
    fn per_particle_chunk(&self, name: &str, natoms: usize) -> io::Result<Option<IndexEntry>> {
        let Some(entry) = self.traj.chunk(self.index, name) else {
            return Ok(None);
        };
        if entry.n != natoms as u64 || entry.m != 3 {
            return Err(invalid_data(format!(
                "frame {} has a '{name}' chunk of shape {}x{}, expected {natoms}x3",
                self.index, entry.n, entry.m
            )));
        }
        Ok(Some(entry))
    }
}
