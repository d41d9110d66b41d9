//! Events handed to a localization/mapping estimator.
//!
//! Each event is self-contained: it carries its timestamp, its measurement
//! and the covariance of that measurement. Consumers dispatch on the variant.

use std::fmt;

use nalgebra::{DMatrix, Vector2, Vector3};

/// Discriminant of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    InitialCondition,
    VehicleOdometry,
    GpsObservation,
    LaserObservation,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::InitialCondition,
        EventKind::VehicleOdometry,
        EventKind::GpsObservation,
        EventKind::LaserObservation,
    ];
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::InitialCondition => write!(f, "InitialCondition"),
            EventKind::VehicleOdometry => write!(f, "VehicleOdometry"),
            EventKind::GpsObservation => write!(f, "GpsObservation"),
            EventKind::LaserObservation => write!(f, "LaserObservation"),
        }
    }
}

/// One landmark return inside a laser scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaserDetection {
    /// Index of the observed landmark in the scenario's landmark list.
    pub landmark: usize,
    /// Range (m).
    pub range: f64,
    /// Bearing in the vehicle frame (rad), normalized to `(-PI, PI]`.
    pub azimuth: f64,
    /// Elevation above the vehicle plane (rad).
    pub elevation: f64,
}

impl LaserDetection {
    /// The measurement as `[range, azimuth, elevation]`.
    pub fn measurement(&self) -> Vector3<f64> {
        Vector3::new(self.range, self.azimuth, self.elevation)
    }
}

/// A timestamped measurement or state announcement.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The starting state `[x, y, heading]`, announced once per run.
    InitialCondition {
        time: f64,
        state: Vector3<f64>,
        covariance: DMatrix<f64>,
    },
    /// A measurement of the control `[speed, turn_rate]`.
    VehicleOdometry {
        time: f64,
        measurement: Vector2<f64>,
        covariance: DMatrix<f64>,
    },
    /// A position fix `[x, y]`.
    GpsObservation {
        time: f64,
        position: Vector2<f64>,
        covariance: DMatrix<f64>,
    },
    /// Range/azimuth/elevation to every landmark within detection range.
    LaserObservation {
        time: f64,
        detections: Vec<LaserDetection>,
        covariance: DMatrix<f64>,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::InitialCondition { .. } => EventKind::InitialCondition,
            Event::VehicleOdometry { .. } => EventKind::VehicleOdometry,
            Event::GpsObservation { .. } => EventKind::GpsObservation,
            Event::LaserObservation { .. } => EventKind::LaserObservation,
        }
    }

    pub fn time(&self) -> f64 {
        match self {
            Event::InitialCondition { time, .. }
            | Event::VehicleOdometry { time, .. }
            | Event::GpsObservation { time, .. }
            | Event::LaserObservation { time, .. } => *time,
        }
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        match self {
            Event::InitialCondition { covariance, .. }
            | Event::VehicleOdometry { covariance, .. }
            | Event::GpsObservation { covariance, .. }
            | Event::LaserObservation { covariance, .. } => covariance,
        }
    }

    /// Landmark indices carried by a laser observation; `None` for other kinds.
    pub fn landmark_ids(&self) -> Option<Vec<usize>> {
        match self {
            Event::LaserObservation { detections, .. } => {
                Some(detections.iter().map(|d| d.landmark).collect())
            }
            _ => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::InitialCondition { time, state, .. } => write!(
                f,
                "[{time:.3}] InitialCondition (x: {:.2}, y: {:.2}, ψ: {:.2})",
                state.x, state.y, state.z
            ),
            Event::VehicleOdometry { time, measurement, .. } => write!(
                f,
                "[{time:.3}] VehicleOdometry (v: {:.2}, ω: {:.2})",
                measurement.x, measurement.y
            ),
            Event::GpsObservation { time, position, .. } => write!(
                f,
                "[{time:.3}] GpsObservation (x: {:.2}, y: {:.2})",
                position.x, position.y
            ),
            Event::LaserObservation { time, detections, .. } => write!(
                f,
                "[{time:.3}] LaserObservation ({} landmarks)",
                detections.len()
            ),
        }
    }
}
