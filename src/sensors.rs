//! Periodic GPS and laser samplers.
//!
//! Each sampler keeps its own schedule. A sampler fires when the simulation
//! clock has reached its next due time, then pushes that time one period on.

use nalgebra::{Vector2, Vector3};
use rand::Rng;
use rover_kinematics::{Pose, normalize_angle};
use tracing::debug;

use crate::event::{Event, LaserDetection};
use crate::noise::{Covariance, NoiseModel};

/// Rounding slack of the due check, relative to the period. `next_due` is a
/// running sum of periods while step times are `step * dt`.
const DUE_TOLERANCE: f64 = 1e-9;

/// Next-due bookkeeping for a periodic sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schedule {
    period: f64,
    next_due: f64,
}

impl Schedule {
    /// A schedule that is due immediately.
    pub fn new(period: f64) -> Self {
        Self { period, next_due: 0.0 }
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn next_due(&self) -> f64 {
        self.next_due
    }

    pub fn reset(&mut self) {
        self.next_due = 0.0;
    }

    pub fn is_due(&self, time: f64) -> bool {
        time + DUE_TOLERANCE * self.period >= self.next_due
    }

    fn advance(&mut self) {
        self.next_due += self.period;
    }
}

/// Emits noisy 2-D position fixes.
#[derive(Debug, Clone)]
pub struct GpsSampler {
    enabled: bool,
    schedule: Schedule,
    covariance: Covariance,
}

impl GpsSampler {
    pub fn new(enabled: bool, period: f64, covariance: Covariance) -> Self {
        Self {
            enabled,
            schedule: Schedule::new(period),
            covariance,
        }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn reset(&mut self) {
        self.schedule.reset();
    }

    /// Returns a GPS observation if the sensor is enabled and due.
    pub fn sample<R: Rng + ?Sized>(
        &mut self,
        time: f64,
        pose: &Pose,
        noise: &NoiseModel,
        rng: &mut R,
    ) -> Option<Event> {
        if !self.enabled || !self.schedule.is_due(time) {
            return None;
        }
        self.schedule.advance();

        let n = noise.sample(&self.covariance, rng);
        let position = Vector2::new(pose.x + n[0], pose.y + n[1]);
        debug!(time, x = position.x, y = position.y, "GPS fix");

        Some(Event::GpsObservation {
            time,
            position,
            covariance: self.covariance.matrix().clone(),
        })
    }
}

/// Emits range/azimuth/elevation returns for landmarks within range.
#[derive(Debug, Clone)]
pub struct LaserSampler {
    enabled: bool,
    schedule: Schedule,
    covariance: Covariance,
    detection_range: f64,
}

impl LaserSampler {
    pub fn new(enabled: bool, period: f64, detection_range: f64, covariance: Covariance) -> Self {
        Self {
            enabled,
            schedule: Schedule::new(period),
            covariance,
            detection_range,
        }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn detection_range(&self) -> f64 {
        self.detection_range
    }

    pub fn reset(&mut self) {
        self.schedule.reset();
    }

    /// Returns a laser observation if the sensor is enabled, due, and at
    /// least one landmark lies within detection range.
    pub fn sample<R: Rng + ?Sized>(
        &mut self,
        time: f64,
        pose: &Pose,
        landmarks: &[Vector3<f64>],
        noise: &NoiseModel,
        rng: &mut R,
    ) -> Option<Event> {
        if !self.enabled || !self.schedule.is_due(time) {
            return None;
        }
        self.schedule.advance();

        let visible = landmarks_in_range(pose, landmarks, self.detection_range);
        if visible.is_empty() {
            debug!(time, "Laser scan saw no landmarks");
            return None;
        }

        let std_devs = self.covariance.std_devs();
        let detections = visible
            .into_iter()
            .map(|landmark| {
                let offset = relative_offset(pose, &landmarks[landmark]);
                let planar = offset.x.hypot(offset.y);
                LaserDetection {
                    landmark,
                    range: offset.norm() + noise.sample_scalar(std_devs[0], rng),
                    azimuth: normalize_angle(
                        offset.y.atan2(offset.x) - pose.heading + noise.sample_scalar(std_devs[1], rng),
                    ),
                    elevation: offset.z.atan2(planar) + noise.sample_scalar(std_devs[2], rng),
                }
            })
            .collect::<Vec<_>>();
        debug!(time, landmarks = detections.len(), "Laser scan");

        Some(Event::LaserObservation {
            time,
            detections,
            covariance: self.covariance.matrix().clone(),
        })
    }
}

/// Offset from the vehicle (at height zero) to `landmark`.
fn relative_offset(pose: &Pose, landmark: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(landmark.x - pose.x, landmark.y - pose.y, landmark.z)
}

/// Indices of the landmarks whose true range from `pose` is within `range`.
pub fn landmarks_in_range(pose: &Pose, landmarks: &[Vector3<f64>], range: f64) -> Vec<usize> {
    landmarks
        .iter()
        .enumerate()
        .filter(|(_, lm)| relative_offset(pose, lm).norm() <= range)
        .map(|(i, _)| i)
        .collect()
}
