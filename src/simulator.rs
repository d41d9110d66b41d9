//! The event-generating simulator.
//!
//! [`Simulator`] owns the clock and the true vehicle state. Every call to
//! [`Simulator::step`] predicts the pose, samples the sensors, runs the
//! waypoint controller and returns the events of that step in order.

use std::fmt;

use nalgebra::{Vector2, Vector3};
use rand::Rng;
use rover_kinematics::{Control, Pose, predict};
use rover_navigation::{Waypoint, WaypointController};
use tracing::{debug, info};

use crate::config::SimulatorConfig;
use crate::error::{Result, SimError};
use crate::event::Event;
use crate::noise::{Covariance, NoiseModel};
use crate::scenario::{Scenario, ScenarioSource};
use crate::sensors::{GpsSampler, LaserSampler};

/// Lifecycle of a simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatorState {
    NotStarted,
    Running,
    Finished,
}

impl fmt::Display for SimulatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulatorState::NotStarted => write!(f, "NotStarted"),
            SimulatorState::Running => write!(f, "Running"),
            SimulatorState::Finished => write!(f, "Finished"),
        }
    }
}

/// Noise-free simulator state, for evaluation only.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruth {
    pub time: f64,
    pub pose: Pose,
    pub control: Control,
    pub waypoint_index: usize,
    pub step_count: u64,
    /// Present only when the full state was requested.
    pub landmarks: Option<Vec<Vector3<f64>>>,
    /// Present only when the full state was requested.
    pub waypoints: Option<Vec<Waypoint>>,
}

/// Simulates one vehicle driving a waypoint route while its sensors report.
///
/// The random source is injected, so two simulators built from the same
/// configuration and the same seeded generator emit identical event streams.
pub struct Simulator<R> {
    dt: f64,
    enable_odometry: bool,
    noise: NoiseModel,
    odometry_covariance: Covariance,
    gps: GpsSampler,
    laser: LaserSampler,
    controller: WaypointController,
    rng: R,

    state: SimulatorState,
    scenario: Option<Scenario>,
    time: f64,
    pose: Pose,
    control: Control,
    waypoint_index: usize,
    step_count: u64,
}

impl<R: Rng> Simulator<R> {
    /// Builds a simulator from a configuration, validating it first.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidConfiguration` or `SimError::InvalidCovariance`
    /// if any option is out of range.
    pub fn new(config: &SimulatorConfig, rng: R) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            dt: config.dt,
            enable_odometry: config.enable_odometry,
            noise: NoiseModel::new(config.noise_scale)?,
            odometry_covariance: config.odometry_covariance()?,
            gps: GpsSampler::new(
                config.enable_gps,
                config.gps_measurement_period,
                config.gps_covariance()?,
            ),
            laser: LaserSampler::new(
                config.enable_laser,
                config.laser_measurement_period,
                config.laser_detection_range,
                config.laser_covariance()?,
            ),
            controller: WaypointController::new(config.control_limits()?),
            rng,
            state: SimulatorState::NotStarted,
            scenario: None,
            time: 0.0,
            pose: Pose::default(),
            control: Control::default(),
            waypoint_index: 0,
            step_count: 0,
        })
    }

    /// Loads the scenario and moves from `NotStarted` to `Running`.
    pub fn start<S: ScenarioSource + ?Sized>(&mut self, source: &S) -> Result<()> {
        if self.state != SimulatorState::NotStarted {
            return Err(SimError::InvalidState("start() may only be called once"));
        }

        let scenario = source.load()?;
        self.time = 0.0;
        self.step_count = 0;
        self.pose = scenario.initial_pose;
        self.control = Control::default();
        self.waypoint_index = 0;
        self.gps.reset();
        self.laser.reset();
        self.scenario = Some(scenario);
        self.state = SimulatorState::Running;

        info!(
            pose = %self.pose,
            dt = self.dt,
            gps_period = self.gps.schedule().period(),
            laser_period = self.laser.schedule().period(),
            laser_range = self.laser.detection_range(),
            max_speed = self.controller.limits().max_speed(),
            "Simulation started"
        );
        Ok(())
    }

    /// Advances the simulation by one step and returns its events in order.
    ///
    /// The first step opens with an odometry event carrying the zero control
    /// (when odometry is enabled) and then the initial condition. Within a
    /// step, GPS precedes laser, and the odometry of the new control comes
    /// last. The step that reaches the final waypoint emits no odometry.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidState` unless the simulator is running.
    pub fn step(&mut self) -> Result<Vec<Event>> {
        match self.state {
            SimulatorState::Running => {}
            SimulatorState::NotStarted => {
                return Err(SimError::InvalidState("step() called before start()"));
            }
            SimulatorState::Finished => {
                return Err(SimError::InvalidState("step() called after the run finished"));
            }
        }
        let Some(scenario) = self.scenario.as_ref() else {
            return Err(SimError::InvalidState("running without a scenario"));
        };

        let mut events = Vec::new();

        if self.step_count == 0 {
            if self.enable_odometry {
                events.push(Event::VehicleOdometry {
                    time: self.time,
                    measurement: Vector2::from(self.control.to_array()),
                    covariance: self.odometry_covariance.matrix().clone(),
                });
            }
            events.push(Event::InitialCondition {
                time: self.time,
                state: Vector3::from(self.pose.to_array()),
                covariance: Covariance::zeros(3).matrix().clone(),
            });
        }

        self.step_count += 1;
        self.time = self.step_count as f64 * self.dt;
        self.pose = predict(self.pose, self.control, self.dt);

        if let Some(event) = self.gps.sample(self.time, &self.pose, &self.noise, &mut self.rng) {
            events.push(event);
        }
        if let Some(event) = self.laser.sample(
            self.time,
            &self.pose,
            &scenario.landmarks,
            &self.noise,
            &mut self.rng,
        ) {
            events.push(event);
        }

        let update = self.controller.compute_control(
            &self.pose,
            self.control,
            &scenario.waypoints,
            self.waypoint_index,
            self.dt,
        );
        self.waypoint_index = update.waypoint_index;

        if !update.running {
            self.state = SimulatorState::Finished;
            info!(
                steps = self.step_count,
                time = self.time,
                pose = %self.pose,
                "Simulation finished"
            );
            return Ok(events);
        }
        self.control = update.control;

        if self.enable_odometry {
            let n = self.noise.sample(&self.odometry_covariance, &mut self.rng);
            events.push(Event::VehicleOdometry {
                time: self.time,
                measurement: Vector2::new(self.control.speed + n[0], self.control.turn_rate + n[1]),
                covariance: self.odometry_covariance.matrix().clone(),
            });
        }

        debug!(
            step = self.step_count,
            time = self.time,
            events = events.len(),
            waypoint = self.waypoint_index,
            "Step complete"
        );
        Ok(events)
    }
}

impl<R> Simulator<R> {
    /// `true` while the simulator is running.
    pub fn keep_running(&self) -> bool {
        self.state == SimulatorState::Running
    }

    pub fn state(&self) -> SimulatorState {
        self.state
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Snapshot of the true state. Landmarks and waypoints are included only
    /// when `include_full_state` is set and a scenario has been loaded.
    pub fn ground_truth(&self, include_full_state: bool) -> GroundTruth {
        let scenario = self.scenario.as_ref().filter(|_| include_full_state);
        GroundTruth {
            time: self.time,
            pose: self.pose,
            control: self.control,
            waypoint_index: self.waypoint_index,
            step_count: self.step_count,
            landmarks: scenario.map(|s| s.landmarks.clone()),
            waypoints: scenario.map(|s| s.waypoints.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use nalgebra::DMatrix;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn scenario() -> Scenario {
        Scenario {
            initial_pose: Pose::new(0.0, 0.0, 0.0),
            landmarks: vec![Vector3::new(5.0, 1.0, 0.5), Vector3::new(100.0, 0.0, 0.0)],
            waypoints: vec![Waypoint::new(10.0, 0.0)],
        }
    }

    fn quiet_config() -> SimulatorConfig {
        SimulatorConfig {
            noise_scale: 0.0,
            ..Default::default()
        }
    }

    fn started(config: &SimulatorConfig) -> Simulator<StdRng> {
        let mut sim = Simulator::new(config, StdRng::seed_from_u64(5)).unwrap();
        sim.start(&scenario()).unwrap();
        sim
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let config = SimulatorConfig { dt: -1.0, ..Default::default() };
        assert!(matches!(
            Simulator::new(&config, StdRng::seed_from_u64(0)),
            Err(SimError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_step_before_start() {
        let mut sim = Simulator::new(&quiet_config(), StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(sim.state(), SimulatorState::NotStarted);
        assert!(!sim.keep_running());
        assert!(matches!(sim.step(), Err(SimError::InvalidState(_))));
    }

    #[test]
    fn test_start_twice() {
        let mut sim = started(&quiet_config());
        assert!(matches!(sim.start(&scenario()), Err(SimError::InvalidState(_))));
        assert!(sim.keep_running());
    }

    #[test]
    fn test_first_step_announces_odometry_then_initial_condition() {
        let mut sim = started(&quiet_config());
        let events = sim.step().unwrap();
        let kinds: Vec<_> = events.iter().map(Event::kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::VehicleOdometry,
                EventKind::InitialCondition,
                EventKind::GpsObservation,
                EventKind::LaserObservation,
                EventKind::VehicleOdometry,
            ]
        );

        match &events[0] {
            Event::VehicleOdometry { time, measurement, .. } => {
                assert_eq!(*time, 0.0);
                assert_eq!(*measurement, Vector2::zeros());
            }
            other => panic!("unexpected event {other}"),
        }
        match &events[1] {
            Event::InitialCondition { time, state, covariance } => {
                assert_eq!(*time, 0.0);
                assert_eq!(*state, Vector3::zeros());
                assert_eq!(*covariance, DMatrix::zeros(3, 3));
            }
            other => panic!("unexpected event {other}"),
        }
        assert!(events[2..].iter().all(|e| (e.time() - 0.1).abs() < 1e-12));
    }

    #[test]
    fn test_initial_condition_is_emitted_once() {
        let mut sim = started(&quiet_config());
        let mut count = 0;
        for _ in 0..20 {
            count += sim
                .step()
                .unwrap()
                .iter()
                .filter(|e| e.kind() == EventKind::InitialCondition)
                .count();
        }
        assert_eq!(count, 1);
    }

    #[test]
    fn test_without_odometry_initial_condition_leads() {
        let config = SimulatorConfig {
            enable_odometry: false,
            ..quiet_config()
        };
        let mut sim = started(&config);
        let events = sim.step().unwrap();
        assert_eq!(events[0].kind(), EventKind::InitialCondition);
        assert!(events.iter().all(|e| e.kind() != EventKind::VehicleOdometry));
    }

    #[test]
    fn test_ground_truth_snapshot() {
        let mut sim = started(&quiet_config());
        sim.step().unwrap();

        let brief = sim.ground_truth(false);
        assert!(brief.landmarks.is_none());
        assert!(brief.waypoints.is_none());
        assert_eq!(brief.step_count, 1);

        let full = sim.ground_truth(true);
        assert_eq!(full.landmarks.as_ref().map(Vec::len), Some(2));
        assert_eq!(full.waypoints, Some(vec![Waypoint::new(10.0, 0.0)]));

        // Querying does not move the simulation.
        assert_eq!(sim.ground_truth(false), brief);
        assert_eq!(sim.time(), brief.time);
    }

    #[test]
    fn test_step_after_finish() {
        let config = SimulatorConfig {
            dt: 1.0,
            ..quiet_config()
        };
        let mut sim = started(&config);
        let mut steps = 0;
        while sim.keep_running() {
            sim.step().unwrap();
            steps += 1;
            assert!(steps < 1_000, "simulation did not finish");
        }
        assert_eq!(sim.state(), SimulatorState::Finished);
        assert_eq!(sim.ground_truth(false).waypoint_index, 1);
        assert!(matches!(sim.step(), Err(SimError::InvalidState(_))));
    }
}
