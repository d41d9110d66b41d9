//! This module defines the error types used by the `rover-navigation` crate.

#![warn(missing_docs)]

/// Error type for navigation operations.
///
/// This enum encapsulates the errors that can occur while configuring
/// the waypoint controller.
#[derive(Debug, PartialEq)]
pub enum NavigationError {
    /// Error for an invalid speed band.
    /// This variant is returned when the minimum speed exceeds the maximum speed
    /// or either bound is not finite.
    InvalidSpeedBounds(&'static str),
    /// Error for an invalid rate or magnitude limit.
    /// This variant is returned when an acceleration, steer rate, or steer angle
    /// limit is negative or not finite.
    InvalidLimit(&'static str),
}

impl core::fmt::Display for NavigationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NavigationError::InvalidSpeedBounds(msg) => write!(f, "Invalid speed bounds: {}", msg),
            NavigationError::InvalidLimit(msg) => write!(f, "Invalid control limit: {}", msg),
        }
    }
}

impl core::error::Error for NavigationError {}
