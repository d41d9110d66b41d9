#![warn(missing_docs)]

//! Waypoint-following control law.
//!
//! The controller steers towards the current waypoint with a proportional
//! speed demand and a heading-error steer demand. Both demands are rate
//! limited per step and then clamped to their magnitude bounds.

use rover_kinematics::{Control, Pose, normalize_angle};
use tracing::{debug, info};

use crate::error::NavigationError;

/// Distance (m) under which the current waypoint counts as reached.
pub const ARRIVAL_RADIUS: f64 = 1.0;

/// Proportional gain from distance-to-target to demanded speed.
const SPEED_GAIN: f64 = 0.1;

/// A 2-D target position in world coordinates (meters).
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Waypoint {
    /// The x-coordinate in meters.
    pub x: f64,
    /// The y-coordinate in meters.
    pub y: f64,
}

impl Waypoint {
    /// Creates a new `Waypoint`.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rate and magnitude limits applied to the control input.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControlLimits {
    max_acceleration: f64,
    min_speed: f64,
    max_speed: f64,
    max_steer_rate: f64,
    max_steer_angle: f64,
}

impl ControlLimits {
    /// Creates a new set of control limits.
    ///
    /// # Arguments
    /// * `max_acceleration` - Largest speed change per second (m/s²)
    /// * `min_speed` - Lower speed bound (m/s)
    /// * `max_speed` - Upper speed bound (m/s)
    /// * `max_steer_rate` - Largest steer change per second (rad/s²)
    /// * `max_steer_angle` - Symmetric steer bound (rad/s)
    ///
    /// # Returns
    /// * `Result<Self, NavigationError>` - The limits or an error if any bound is inconsistent
    pub fn new(
        max_acceleration: f64,
        min_speed: f64,
        max_speed: f64,
        max_steer_rate: f64,
        max_steer_angle: f64,
    ) -> Result<Self, NavigationError> {
        if !min_speed.is_finite() || !max_speed.is_finite() {
            return Err(NavigationError::InvalidSpeedBounds("Speed bounds must be finite"));
        }
        if min_speed > max_speed {
            return Err(NavigationError::InvalidSpeedBounds(
                "Minimum speed must not exceed maximum speed",
            ));
        }
        for limit in [max_acceleration, max_steer_rate, max_steer_angle] {
            if !limit.is_finite() || limit < 0.0 {
                return Err(NavigationError::InvalidLimit(
                    "Acceleration and steer limits must be finite and non-negative",
                ));
            }
        }

        Ok(Self {
            max_acceleration,
            min_speed,
            max_speed,
            max_steer_rate,
            max_steer_angle,
        })
    }

    /// Returns the maximum acceleration.
    pub fn max_acceleration(&self) -> f64 {
        self.max_acceleration
    }

    /// Returns the minimum speed.
    pub fn min_speed(&self) -> f64 {
        self.min_speed
    }

    /// Returns the maximum speed.
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// Returns the maximum steer rate.
    pub fn max_steer_rate(&self) -> f64 {
        self.max_steer_rate
    }

    /// Returns the maximum steer angle.
    pub fn max_steer_angle(&self) -> f64 {
        self.max_steer_angle
    }
}

/// Outcome of one controller update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlUpdate {
    /// The control to apply over the next step.
    pub control: Control,
    /// Index of the waypoint being tracked. Equal to the waypoint count once
    /// the last waypoint has been reached.
    pub waypoint_index: usize,
    /// `false` once every waypoint has been reached.
    pub running: bool,
}

/// Steers the vehicle through an ordered list of waypoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaypointController {
    limits: ControlLimits,
}

impl WaypointController {
    /// Creates a controller enforcing `limits`.
    pub const fn new(limits: ControlLimits) -> Self {
        Self { limits }
    }

    /// Returns the limits enforced by this controller.
    pub fn limits(&self) -> &ControlLimits {
        &self.limits
    }

    /// Computes the control for the next step.
    ///
    /// If the vehicle is within [`ARRIVAL_RADIUS`] of the tracked waypoint the
    /// index advances by one. Advancing past the last waypoint ends the run and
    /// returns the incoming control unchanged.
    ///
    /// # Arguments
    /// * `pose` - Current vehicle pose
    /// * `control` - Control applied over the step just taken
    /// * `waypoints` - The full waypoint list
    /// * `waypoint_index` - Index of the waypoint currently tracked
    /// * `dt` - Step length in seconds
    pub fn compute_control(
        &self,
        pose: &Pose,
        control: Control,
        waypoints: &[Waypoint],
        waypoint_index: usize,
        dt: f64,
    ) -> ControlUpdate {
        let finished = ControlUpdate {
            control,
            waypoint_index: waypoint_index.min(waypoints.len()),
            running: false,
        };

        let Some(target) = waypoints.get(waypoint_index) else {
            return finished;
        };

        let mut index = waypoint_index;
        let mut target = *target;
        let (mut dx, mut dy) = (target.x - pose.x, target.y - pose.y);
        let mut distance = dx.hypot(dy);

        if distance < ARRIVAL_RADIUS {
            index += 1;
            info!(waypoint = waypoint_index, x = target.x, y = target.y, "Waypoint reached");
            match waypoints.get(index) {
                Some(next) => target = *next,
                None => {
                    info!("Final waypoint reached");
                    return ControlUpdate {
                        waypoint_index: index,
                        ..finished
                    };
                }
            }
            // The distance against the new target is sign-agnostic, while the
            // heading demand below always points from the vehicle to the target.
            dx = target.x - pose.x;
            dy = target.y - pose.y;
            distance = dx.hypot(dy);
        }

        let max_speed_step = self.limits.max_acceleration * dt;
        let speed_step = (SPEED_GAIN * distance - control.speed).clamp(-max_speed_step, max_speed_step);
        let speed = (control.speed + speed_step).clamp(self.limits.min_speed, self.limits.max_speed);

        let max_steer_step = self.limits.max_steer_rate * dt;
        let heading_error = normalize_angle(dy.atan2(dx) - pose.heading - control.turn_rate);
        let steer_step = heading_error.clamp(-max_steer_step, max_steer_step);
        let turn_rate = (control.turn_rate + steer_step)
            .clamp(-self.limits.max_steer_angle, self.limits.max_steer_angle);

        debug!(index, distance, speed, turn_rate, "Computed control");

        ControlUpdate {
            control: Control::new(speed, turn_rate),
            waypoint_index: index,
            running: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::PI;
    const EPSILON: f64 = 1e-9;

    fn limits() -> ControlLimits {
        ControlLimits::new(1.0, 0.0, 1.0, 0.5, 0.5).unwrap()
    }

    #[test]
    fn test_limits_constructor() {
        let l = limits();
        assert_eq!(l.max_acceleration(), 1.0);
        assert_eq!(l.min_speed(), 0.0);
        assert_eq!(l.max_speed(), 1.0);
        assert_eq!(l.max_steer_rate(), 0.5);
        assert_eq!(l.max_steer_angle(), 0.5);
        assert_eq!(*WaypointController::new(l).limits(), l);
    }

    #[test]
    fn test_limits_invalid_speed_bounds() {
        assert!(matches!(
            ControlLimits::new(1.0, 2.0, 1.0, 0.5, 0.5),
            Err(NavigationError::InvalidSpeedBounds(_))
        ));
        assert!(matches!(
            ControlLimits::new(1.0, 0.0, f64::INFINITY, 0.5, 0.5),
            Err(NavigationError::InvalidSpeedBounds(_))
        ));
    }

    #[test]
    fn test_limits_negative_rates() {
        assert!(matches!(
            ControlLimits::new(-1.0, 0.0, 1.0, 0.5, 0.5),
            Err(NavigationError::InvalidLimit(_))
        ));
        assert!(matches!(
            ControlLimits::new(1.0, 0.0, 1.0, -0.5, 0.5),
            Err(NavigationError::InvalidLimit(_))
        ));
        assert!(matches!(
            ControlLimits::new(1.0, 0.0, 1.0, 0.5, f64::NAN),
            Err(NavigationError::InvalidLimit(_))
        ));
    }

    #[test]
    fn test_speed_increment_is_rate_limited() {
        let controller = WaypointController::new(ControlLimits::new(0.5, 0.0, 10.0, 0.5, 0.5).unwrap());
        let waypoints = [Waypoint::new(50.0, 0.0)];
        // Demand is 0.1 * 50 = 5 m/s, but one step may only add 0.5 m/s.
        let update = controller.compute_control(&Pose::default(), Control::default(), &waypoints, 0, 1.0);
        assert!(update.running);
        assert_eq!(update.waypoint_index, 0);
        assert!((update.control.speed - 0.5).abs() < EPSILON);
        assert!((update.control.turn_rate - 0.0).abs() < EPSILON);
    }

    #[test]
    fn test_speed_is_clamped_to_bounds() {
        let controller = WaypointController::new(ControlLimits::new(10.0, 0.3, 1.0, 0.5, 0.5).unwrap());
        let far = [Waypoint::new(100.0, 0.0)];
        let update = controller.compute_control(&Pose::default(), Control::default(), &far, 0, 1.0);
        assert!((update.control.speed - 1.0).abs() < EPSILON);

        let near = [Waypoint::new(2.0, 0.0)];
        let update = controller.compute_control(&Pose::default(), Control::new(1.0, 0.0), &near, 0, 1.0);
        // Demand 0.2 m/s is below the 0.3 m/s floor.
        assert!((update.control.speed - 0.3).abs() < EPSILON);
    }

    #[test]
    fn test_steer_is_rate_limited_and_clamped() {
        let controller = WaypointController::new(ControlLimits::new(1.0, 0.0, 1.0, 0.2, 0.3).unwrap());
        let waypoints = [Waypoint::new(0.0, 10.0)]; // straight left, error PI/2

        let first = controller.compute_control(&Pose::default(), Control::default(), &waypoints, 0, 1.0);
        assert!((first.control.turn_rate - 0.2).abs() < EPSILON);

        let second = controller.compute_control(&Pose::default(), first.control, &waypoints, 0, 1.0);
        assert!((second.control.turn_rate - 0.3).abs() < EPSILON);
    }

    #[test]
    fn test_heading_error_accounts_for_current_steer() {
        let controller = WaypointController::new(ControlLimits::new(1.0, 0.0, 1.0, 1.0, 1.0).unwrap());
        let waypoints = [Waypoint::new(10.0, 0.0)];
        let pose = Pose::new(0.0, 0.0, 0.0);
        // Already aligned but steering left; the update must take the steer back out.
        let update = controller.compute_control(&pose, Control::new(0.5, 0.4), &waypoints, 0, 1.0);
        assert!((update.control.turn_rate - 0.0).abs() < EPSILON);
    }

    #[test]
    fn test_heading_error_is_normalized() {
        let controller = WaypointController::new(ControlLimits::new(1.0, 0.0, 1.0, 10.0, 10.0).unwrap());
        // Target just below the negative x-axis while facing just above it.
        let waypoints = [Waypoint::new(-10.0, -0.1)];
        let pose = Pose::new(0.0, 0.0, PI - 0.05);
        let update = controller.compute_control(&pose, Control::default(), &waypoints, 0, 1.0);
        let expected = normalize_angle((-0.1f64).atan2(-10.0) - (PI - 0.05));
        assert!((update.control.turn_rate - expected).abs() < EPSILON);
        assert!(update.control.turn_rate.abs() < 0.1);
    }

    #[test]
    fn test_arrival_advances_to_next_waypoint() {
        let controller = WaypointController::new(ControlLimits::new(1.0, 0.0, 1.0, 0.5, 0.5).unwrap());
        let waypoints = [Waypoint::new(0.5, 0.0), Waypoint::new(0.5, 20.0)];
        let update = controller.compute_control(&Pose::default(), Control::default(), &waypoints, 0, 1.0);
        assert!(update.running);
        assert_eq!(update.waypoint_index, 1);
        // Distance to new target ~20 m, demand 2 m/s limited to 1 m/s.
        assert!((update.control.speed - 1.0).abs() < EPSILON);
        // Heading demand points towards the new target (left).
        assert!((update.control.turn_rate - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_final_arrival_stops_without_updating_control() {
        let controller = WaypointController::new(limits());
        let waypoints = [Waypoint::new(0.2, 0.0)];
        let control = Control::new(0.7, 0.1);
        let update = controller.compute_control(&Pose::default(), control, &waypoints, 0, 1.0);
        assert!(!update.running);
        assert_eq!(update.waypoint_index, 1);
        assert_eq!(update.control, control);
    }

    #[test]
    fn test_index_past_end_reports_finished() {
        let controller = WaypointController::new(limits());
        let waypoints = [Waypoint::new(5.0, 0.0)];
        let update = controller.compute_control(&Pose::default(), Control::default(), &waypoints, 1, 1.0);
        assert!(!update.running);
        assert_eq!(update.waypoint_index, 1);

        let empty: [Waypoint; 0] = [];
        let update = controller.compute_control(&Pose::default(), Control::default(), &empty, 0, 1.0);
        assert!(!update.running);
        assert_eq!(update.waypoint_index, 0);
    }
}
