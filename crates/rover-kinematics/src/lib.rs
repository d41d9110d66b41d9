#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library for planar ground-vehicle kinematics."]
#![doc = ""]
#![doc = "This crate provides the vehicle pose and control types and a midpoint-rule"]
#![doc = "integrator that advances a pose under a constant speed and turn rate."]

use core::f64::consts::{PI, TAU};
use core::fmt;
use libm::{cos, sin};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Normalize an angle to be within `(-PI, PI]`.
///
/// Angles at `-PI` will be normalized to `PI`.
///
/// # Arguments
///
/// * `angle`: The angle in radians to normalize.
///
/// # Returns
///
/// The normalized angle in radians.
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle % TAU;
    if a > PI {
        a - TAU
    } else if a <= -PI {
        a + TAU
    } else {
        a
    }
}

/// A 2‑D pose `(x, y, heading)` in meters and radians (heading measured
/// counter‑clockwise from the x‑axis in the world frame).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// World‑frame x position (m).
    pub x: f64,
    /// World‑frame y position (m).
    pub y: f64,
    /// Heading (rad), normalized to `(-PI, PI]`.
    pub heading: f64,
}

impl Pose {
    /// Construct a new pose. The heading is normalized.
    ///
    /// # Arguments
    ///
    /// * `x`: World-frame x position in meters.
    /// * `y`: World-frame y position in meters.
    /// * `heading`: Heading in radians.
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Pose {
            x,
            y,
            heading: normalize_angle(heading),
        }
    }

    /// The pose as an `[x, y, heading]` array.
    pub const fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.heading]
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x: {:.2}, y: {:.2}, ψ: {:.2} rad)", self.x, self.y, self.heading)
    }
}

/// The commanded control input of the vehicle.
///
/// `turn_rate` is the steer command. It is applied directly as the angular
/// rate of the body over a step; there is no wheelbase conversion.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Control {
    /// Forward speed (m/s).
    pub speed: f64,
    /// Steer command, used as the heading rate (rad/s).
    pub turn_rate: f64,
}

impl Control {
    /// Construct a new control input.
    ///
    /// # Arguments
    ///
    /// * `speed`: Forward speed in m/s.
    /// * `turn_rate`: Heading rate in rad/s.
    pub const fn new(speed: f64, turn_rate: f64) -> Self {
        Control { speed, turn_rate }
    }

    /// The control as a `[speed, turn_rate]` array.
    pub const fn to_array(&self) -> [f64; 2] {
        [self.speed, self.turn_rate]
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(v: {:.2} m/s, ω: {:.2} rad/s)", self.speed, self.turn_rate)
    }
}

/// Advances `pose` by `dt` seconds under a constant `control`.
///
/// Translation is integrated along the heading at the middle of the interval
/// (midpoint rule), then the heading is advanced by the full turn and
/// normalized to `(-PI, PI]`.
///
/// # Arguments
///
/// * `pose`: The vehicle's current pose.
/// * `control`: The speed and turn rate held over the interval.
/// * `dt`: The step length in seconds.
///
/// # Returns
///
/// The vehicle's pose at the end of the interval.
pub fn predict(pose: Pose, control: Control, dt: f64) -> Pose {
    let turn = control.turn_rate * dt;
    let mid_heading = pose.heading + 0.5 * turn;
    let travel = control.speed * dt;

    Pose {
        x: pose.x + travel * cos(mid_heading),
        y: pose.y + travel * sin(mid_heading),
        heading: normalize_angle(pose.heading + turn),
    }
}
