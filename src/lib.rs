//! Random-access reading of HOOMD-blue GSD trajectories.
//!
//! A [`GSDReader`] owns an open trajectory and a single [`Frame`] that is overwritten by every
//! read. Frames can be requested by index with [`GSDReader::read_frame`], or in order with
//! [`GSDReader::read_next_frame`].
//!
//! ```no_run
//! # fn main() -> gsdread::Result<()> {
//! let mut reader = gsdread::GSDReader::open("trajectory.gsd")?;
//! while let Ok(frame) = reader.read_next_frame() {
//!     println!("{}\t{:?}", frame.step, frame.box_dimensions);
//! }
//! # Ok(())
//! # }
//! ```
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use glam::{IVec3, Vec3};
use tracing::{debug, instrument, trace, warn};

pub use crate::boxdim::TriclinicBox;
pub use crate::error::{Error, Result};
pub use crate::gsd::Header;
pub use crate::selection::{FrameSelection, Range};

pub mod boxdim;
mod error;
pub mod gsd;
pub mod hoomd;
pub mod selection;

use crate::hoomd::HoomdTrajectory;

/// Fails if GSD trajectories cannot be read on this platform.
///
/// This is checked before any file is touched.
pub fn check_platform() -> Result<()> {
    check_os(std::env::consts::OS)
}

fn check_os(os: &'static str) -> Result<()> {
    match os {
        "windows" => Err(Error::UnsupportedPlatform(os)),
        _ => Ok(()),
    }
}

/// Options that are applied to every decoded [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReaderOptions {
    /// Time between two consecutive frames.
    pub dt: f64,
    /// Time of the first frame.
    pub time_offset: f64,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            dt: 1.0,
            time_offset: 0.0,
        }
    }
}

/// The decoded state of a single frame.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Frame {
    /// Index of this frame in the trajectory.
    pub frame_index: usize,
    pub step: u64,
    /// `time_offset + frame * dt`, see [`ReaderOptions`].
    pub time: f64,
    /// Unit cell as `[Lx, Ly, Lz, alpha, beta, gamma]`, with the angles in degrees.
    pub box_dimensions: [f32; 6],
    /// The raw `[xy, xz, yz]` tilt factors of the box.
    pub tilt_factors: [f32; 3],
    pub positions: Vec<Vec3>,
    pub velocities: Vec<Vec3>,
    /// Number of times each particle has crossed a periodic boundary, per axis.
    pub images: Vec<IVec3>,
}

impl Frame {
    fn with_capacity(natoms: usize) -> Self {
        Self {
            positions: Vec::with_capacity(natoms),
            velocities: Vec::with_capacity(natoms),
            images: Vec::with_capacity(natoms),
            ..Self::default()
        }
    }

    pub fn natoms(&self) -> usize {
        self.positions.len()
    }

    /// Returns the box lengths and tilt factors this frame was decoded from.
    pub fn triclinic_box(&self) -> TriclinicBox {
        let [lx, ly, lz, ..] = self.box_dimensions;
        TriclinicBox {
            lengths: [lx, ly, lz],
            tilt: self.tilt_factors,
        }
    }
}

type Trajectory = HoomdTrajectory<BufReader<File>>;

/// A reader for GSD trajectories.
///
/// The particle count of the first frame is taken as the reference for the whole trajectory.
/// Reading a frame with a different number of particles fails with
/// [`Error::TopologyMismatch`].
#[derive(Debug)]
pub struct GSDReader {
    path: PathBuf,
    options: ReaderOptions,
    /// [`None`] while the reader is closed.
    file: Option<Trajectory>,
    /// Index of the last frame that was read.
    cursor: Option<usize>,
    natoms: usize,
    frame: Frame,
    /// Particle data is decoded into this frame before being committed to `frame`.
    staging: Frame,
}

impl GSDReader {
    /// Open the trajectory at `path` with the default [`ReaderOptions`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_options(path, ReaderOptions::default())
    }

    /// Open the trajectory at `path` and read its first frame.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn with_options<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self> {
        check_platform()?;

        let mut reader = Self {
            path: path.as_ref().to_path_buf(),
            options,
            file: None,
            cursor: None,
            natoms: 0,
            frame: Frame::default(),
            staging: Frame::default(),
        };
        reader.open_trajectory()?;

        let n_frames = reader.n_frames()?;
        let natoms = match reader.trajectory()?.get(0) {
            Some(mut first) => first.particle_count()?,
            None => return Err(Error::EndOfData { index: 0, n_frames }),
        };
        reader.natoms = natoms;
        reader.frame = Frame::with_capacity(reader.natoms);
        reader.staging = Frame::with_capacity(reader.natoms);
        debug!(n_frames, natoms = reader.natoms, "opened trajectory");

        reader.read_next_frame()?;
        Ok(reader)
    }

    /// Open the file for reading, replacing any handle that is currently held.
    ///
    /// The next call to [`GSDReader::read_next_frame`] will read the first frame.
    pub fn open_trajectory(&mut self) -> Result<()> {
        self.cursor = None;
        let file = BufReader::new(File::open(&self.path)?);
        self.file = Some(HoomdTrajectory::new(file)?);
        trace!(path = %self.path.display(), "opened file");
        Ok(())
    }

    /// Release the file handle.
    ///
    /// Closing a reader that is already closed does nothing.
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            debug!(path = %self.path.display(), "closed trajectory");
        }
    }

    /// Close and open the trajectory again.
    ///
    /// The reference particle count established by the first frame is kept.
    pub fn reopen(&mut self) -> Result<()> {
        self.close();
        self.open_trajectory()
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Number of frames in the trajectory.
    pub fn n_frames(&self) -> Result<usize> {
        self.file.as_ref().map(|file| file.len()).ok_or(Error::Closed)
    }

    /// Number of particles in every frame.
    pub fn n_atoms(&self) -> usize {
        self.natoms
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Index of the last frame that was read, if any.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn header(&self) -> Result<&Header> {
        self.file.as_ref().map(|file| file.header()).ok_or(Error::Closed)
    }

    /// The most recently decoded frame.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    fn trajectory(&mut self) -> Result<&mut Trajectory> {
        self.file.as_mut().ok_or(Error::Closed)
    }

    /// Read the frame after the one that was read last.
    ///
    /// Once the end of the trajectory is reached, this returns [`Error::EndOfData`].
    pub fn read_next_frame(&mut self) -> Result<&Frame> {
        let index = self.cursor.map_or(0, |cursor| cursor + 1);
        self.read_frame(index)
    }

    /// Read the frame at `index` and return it.
    ///
    /// The returned [`Frame`] is owned by the reader and is overwritten by the next read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EndOfData`] if `index` is beyond the end of the trajectory, and
    /// [`Error::TopologyMismatch`] if the frame holds a different number of particles than the
    /// first frame. In the latter case the particle data of the previously read frame is kept.
    pub fn read_frame(&mut self, index: usize) -> Result<&Frame> {
        let natoms = self.natoms;
        let file = self.file.as_mut().ok_or(Error::Closed)?;
        let n_frames = file.len();
        let Some(mut chunks) = file.get(index) else {
            return Err(Error::EndOfData { index, n_frames });
        };

        self.cursor = Some(index);
        let frame = &mut self.frame;
        frame.frame_index = index;
        frame.time = self.options.time_offset + index as f64 * self.options.dt;
        frame.step = chunks.step()?;

        // The tilt factors are kept as they are, the packed dimensions hold the angles.
        let boxdim = chunks.boxdim()?;
        let dimensions = boxdim.dimensions().ok_or_else(|| Error::MalformedBox {
            frame: index,
            raw: boxdim.to_raw(),
        })?;
        frame.box_dimensions = dimensions;
        frame.tilt_factors = boxdim.tilt;

        let found = chunks.particle_count()?;
        if found != natoms {
            warn!(frame = index, found, expected = natoms, "particle count changed");
            return Err(Error::TopologyMismatch {
                frame: index,
                found,
                expected: natoms,
            });
        }

        let staging = &mut self.staging;
        chunks.read_positions(natoms, &mut staging.positions)?;
        chunks.read_velocities(natoms, &mut staging.velocities)?;
        chunks.read_images(natoms, &mut staging.images)?;
        std::mem::swap(&mut frame.positions, &mut staging.positions);
        std::mem::swap(&mut frame.velocities, &mut staging.velocities);
        std::mem::swap(&mut frame.images, &mut staging.images);

        trace!(frame = index, step = frame.step, "read frame");
        Ok(&self.frame)
    }

    /// Append the [`Frame`]s included by `selection` to `frames`.
    ///
    /// Indices beyond the end of the trajectory are ignored. Returns the number of frames that
    /// were appended. Afterwards, the reader is positioned at the last frame that was read.
    pub fn read_frames(
        &mut self,
        frames: &mut impl Extend<Frame>,
        selection: &FrameSelection,
    ) -> Result<usize> {
        let n_frames = self.n_frames()?;
        let mut n = 0;
        for idx in 0..n_frames {
            match selection.is_included(idx) {
                Some(true) => {}
                Some(false) => continue,
                None => break,
            }
            let frame = self.read_frame(idx)?;
            frames.extend(Some(frame.clone()));
            n += 1;
        }
        Ok(n)
    }
}
