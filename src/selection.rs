//! Channel and velocity selection payloads
//!
//! These are the values carried by the configuration modifiers and by the
//! selection snapshot the worker publishes after applying them. They are
//! plain data; all interpretation happens in the underlying cursor.

use std::fmt;

use crate::error::{OutriderError, Result};

/// Per-window channel selection, stored as five parallel vectors.
///
/// Entry `i` of every vector describes spectral window `windows[i]`: starting
/// channel, channels per group, step between groups and number of groups.
/// The vectors always have equal length; windows are only added through
/// [`add_window`](Self::add_window).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSelection {
    windows: Vec<u32>,
    starts: Vec<u32>,
    widths: Vec<u32>,
    increments: Vec<u32>,
    group_counts: Vec<u32>,
}

impl ChannelSelection {
    /// Create an empty selection (meaning: every channel of every window)
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the selection for one spectral window
    pub fn add_window(
        &mut self,
        window: u32,
        start: u32,
        width: u32,
        increment: u32,
        group_count: u32,
    ) {
        self.windows.push(window);
        self.starts.push(start);
        self.widths.push(width);
        self.increments.push(increment);
        self.group_counts.push(group_count);
    }

    /// Number of selected windows
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Whether no explicit selection has been made
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn windows(&self) -> &[u32] {
        &self.windows
    }

    pub fn starts(&self) -> &[u32] {
        &self.starts
    }

    pub fn widths(&self) -> &[u32] {
        &self.widths
    }

    pub fn increments(&self) -> &[u32] {
        &self.increments
    }

    pub fn group_counts(&self) -> &[u32] {
        &self.group_counts
    }

    /// Check that every window entry is usable: widths, increments and group
    /// counts must all be at least one
    pub fn validate(&self) -> Result<()> {
        for i in 0..self.window_count() {
            if self.widths[i] == 0 {
                return Err(OutriderError::invalid_parameter(
                    "width",
                    format!("window {} selects zero channels per group", self.windows[i]),
                ));
            }
            if self.increments[i] == 0 {
                return Err(OutriderError::invalid_parameter(
                    "increment",
                    format!("window {} has zero group step", self.windows[i]),
                ));
            }
            if self.group_counts[i] == 0 {
                return Err(OutriderError::invalid_parameter(
                    "group_count",
                    format!("window {} selects zero groups", self.windows[i]),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ChannelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "all channels")
        } else {
            write!(f, "{} window(s)", self.window_count())
        }
    }
}

/// Reference frame for a velocity selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VelocityFrame {
    Topocentric,
    Geocentric,
    Barycentric,
    LsrKinematic,
    LsrDynamic,
}

/// Doppler convention for converting velocities to frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DopplerKind {
    Radio,
    Optical,
    Relativistic,
}

/// Regridding of channels onto a fixed radial-velocity ladder.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocitySelection {
    /// Number of output channels
    pub channel_count: u32,
    /// Radial velocity of the first channel, in m/s
    pub start: f64,
    /// Velocity step between channels, in m/s
    pub increment: f64,
    /// Reference frame the velocities are measured in
    pub frame: VelocityFrame,
    /// Doppler convention in use
    pub doppler: DopplerKind,
    /// Interpolate precisely instead of picking the nearest channel
    pub precise: bool,
}

impl VelocitySelection {
    pub fn validate(&self) -> Result<()> {
        if self.channel_count == 0 {
            return Err(OutriderError::invalid_parameter(
                "channel_count",
                "velocity selection needs at least one channel",
            ));
        }
        if self.increment == 0.0 {
            return Err(OutriderError::invalid_parameter(
                "increment",
                "velocity step must be non-zero",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for VelocitySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} channel(s) from {} m/s step {} m/s",
            self.channel_count, self.start, self.increment
        )
    }
}
