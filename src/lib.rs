//! Event-generating simulator for evaluating localization and mapping
//! estimators.
//!
//! A [`Simulator`] drives a kinematic vehicle through a waypoint route and
//! reports what its sensors see as a time-ordered stream of [`Event`]s:
//! odometry, GPS fixes, laser landmark returns and a single initial condition.

pub mod blackboard;
pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod noise;
pub mod scenario;
pub mod sensors;
pub mod simulator;

pub use config::{RunConfig, SimulatorConfig};
pub use error::{Result, SimError};
pub use event::{Event, EventKind, LaserDetection};
pub use noise::{Covariance, NoiseModel};
pub use scenario::{Scenario, ScenarioDirectory, ScenarioSource};
pub use simulator::{GroundTruth, Simulator, SimulatorState};

pub use rover_kinematics::{Control, Pose};
pub use rover_navigation::{ControlLimits, Waypoint};
