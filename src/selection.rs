use std::num::NonZeroU64;

/// A selection of [`Frame`](super::Frame)s.
#[derive(Debug, Default, Clone)]
pub enum FrameSelection {
    /// Include all frames that are in a trajectory.
    #[default]
    All,
    /// Include frames that lie within a certain [`Range`].
    Range(Range),
    /// Include frames that match the indices in this list.
    ///
    /// Invariant: The indices in the FrameList are _unique_ and _sorted_.
    FrameList(Vec<usize>),
}

impl FrameSelection {
    /// Determine whether some index `idx` is included in this [`FrameSelection`].
    ///
    /// Will return [`None`] once the index is beyond the scope of this `FrameSelection`.
    pub fn is_included(&self, idx: usize) -> Option<bool> {
        match self {
            FrameSelection::All => Some(true),
            FrameSelection::Range(range) => range.is_included(idx as u64),
            FrameSelection::FrameList(indices) => {
                if *indices.last()? < idx {
                    None
                } else {
                    Some(indices.binary_search(&idx).is_ok())
                }
            }
        }
    }
}

/// Frames `start..end` of a trajectory, taking every `step`-th frame counted from `start`.
///
/// Without an `end`, the range runs to the last frame of the trajectory. A range with
/// `start >= end` selects nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: u64,
    /// Exclusive upper bound, if any.
    pub end: Option<u64>,
    pub step: NonZeroU64,
}

impl Range {
    /// Build a range, leaving out bounds as `start:end:step` does on the command line.
    pub fn new(start: Option<u64>, end: Option<u64>, step: Option<NonZeroU64>) -> Self {
        Self {
            start: start.unwrap_or(0),
            end,
            step: step.unwrap_or(NonZeroU64::MIN),
        }
    }

    fn is_included(&self, idx: u64) -> Option<bool> {
        match self.end {
            Some(end) if end <= idx => None,
            _ if idx < self.start => Some(false),
            _ => Some((idx - self.start) % self.step == 0),
        }
    }
}

impl Default for Range {
    fn default() -> Self {
        Self {
            start: 0,
            end: None,
            step: NonZeroU64::MIN,
        }
    }
}
