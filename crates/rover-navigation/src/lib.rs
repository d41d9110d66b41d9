//! Waypoint navigation for the simulated ground vehicle.

pub mod error;
pub mod waypoint;

pub use error::NavigationError;
pub use waypoint::{ARRIVAL_RADIUS, ControlLimits, ControlUpdate, Waypoint, WaypointController};
