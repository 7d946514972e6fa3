use thiserror::Error;

/// Errors that can occur while reading a GSD trajectory.
///
/// Failures of the underlying file, including files that are not valid GSD containers, are
/// reported as [`Error::Io`]. The remaining variants are specific to decoding frames.
#[derive(Debug, Error)]
pub enum Error {
    /// The GSD format cannot be read on this platform.
    #[error("the GSD format is not supported on {0}")]
    UnsupportedPlatform(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested frame lies beyond the end of the trajectory.
    #[error("frame {index} is out of range for a trajectory of {n_frames} frames")]
    EndOfData { index: usize, n_frames: usize },

    /// A frame holds a different number of particles than the first frame.
    #[error(
        "frame {frame} has {found} particles but the initial frame has {expected} particles, \
         variable topologies are not supported"
    )]
    TopologyMismatch {
        frame: usize,
        found: usize,
        expected: usize,
    },

    /// The box of a frame has tilt factors that do not describe a parallelepiped.
    #[error("frame {frame} has a malformed box: {raw:?}")]
    MalformedBox { frame: usize, raw: [f32; 6] },

    /// The reader has been closed and must be reopened before frames can be read.
    #[error("the trajectory is closed")]
    Closed,
}

impl Error {
    /// Returns `true` if this error signals that a frame past the end of the trajectory was
    /// requested.
    ///
    /// This is the expected way for sequential reading to come to an end.
    pub fn is_end_of_data(&self) -> bool {
        matches!(self, Error::EndOfData { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
