//! Scenario loading.
//!
//! A scenario directory holds three numeric tables, one sample per row:
//!
//! * `initial_pose.txt`: a single row `x y heading`
//! * `landmarks.txt`: `N` rows `x y z`
//! * `waypoints.txt`: `M >= 1` rows `x y`
//!
//! Values may be separated by whitespace or commas. Blank lines and text after
//! `#` are ignored.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use nalgebra::Vector3;
use rover_kinematics::Pose;
use rover_navigation::Waypoint;
use tracing::{debug, info};

use crate::error::{Result, SimError};

pub const INITIAL_POSE_FILE: &str = "initial_pose.txt";
pub const LANDMARKS_FILE: &str = "landmarks.txt";
pub const WAYPOINTS_FILE: &str = "waypoints.txt";

/// Initial conditions and the static world of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub initial_pose: Pose,
    pub landmarks: Vec<Vector3<f64>>,
    pub waypoints: Vec<Waypoint>,
}

/// Anything that can hand the simulator a scenario when it starts.
pub trait ScenarioSource {
    fn load(&self) -> Result<Scenario>;
}

impl ScenarioSource for Scenario {
    fn load(&self) -> Result<Scenario> {
        Ok(self.clone())
    }
}

/// A scenario stored as text tables in a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioDirectory {
    path: PathBuf,
}

impl ScenarioDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolves scenario `name` under `root`.
    pub fn resolve(root: impl AsRef<Path>, name: &str) -> Self {
        Self::new(root.as_ref().join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScenarioSource for ScenarioDirectory {
    fn load(&self) -> Result<Scenario> {
        if !self.path.is_dir() {
            return Err(SimError::ScenarioNotFound { path: self.path.clone() });
        }

        let pose_path = self.path.join(INITIAL_POSE_FILE);
        let pose_rows = read_table(&pose_path, 3)?;
        let [row] = pose_rows.as_slice() else {
            return Err(SimError::MalformedScenario {
                path: pose_path,
                reason: format!("expected exactly 1 row, found {}", pose_rows.len()),
            });
        };
        let initial_pose = Pose::new(row[0], row[1], row[2]);

        let landmarks = read_table(&self.path.join(LANDMARKS_FILE), 3)?
            .into_iter()
            .map(|r| Vector3::new(r[0], r[1], r[2]))
            .collect::<Vec<_>>();

        let waypoints_path = self.path.join(WAYPOINTS_FILE);
        let waypoints = read_table(&waypoints_path, 2)?
            .into_iter()
            .map(|r| Waypoint::new(r[0], r[1]))
            .collect::<Vec<_>>();
        if waypoints.is_empty() {
            return Err(SimError::MalformedScenario {
                path: waypoints_path,
                reason: "at least one waypoint is required".into(),
            });
        }

        info!(
            path = %self.path.display(),
            %initial_pose,
            landmarks = landmarks.len(),
            waypoints = waypoints.len(),
            "Loaded scenario"
        );

        Ok(Scenario {
            initial_pose,
            landmarks,
            waypoints,
        })
    }
}

/// Reads a numeric table whose rows all have `columns` entries.
fn read_table(path: &Path, columns: usize) -> Result<Vec<Vec<f64>>> {
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => SimError::ScenarioNotFound { path: path.to_path_buf() },
        _ => SimError::MalformedScenario {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })?;

    let rows = parse_table(&text, columns).map_err(|reason| SimError::MalformedScenario {
        path: path.to_path_buf(),
        reason,
    })?;
    debug!(path = %path.display(), rows = rows.len(), "Read scenario table");
    Ok(rows)
}

fn parse_table(text: &str, columns: usize) -> std::result::Result<Vec<Vec<f64>>, String> {
    let mut rows = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let content = line.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }

        let row = content
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|field| !field.is_empty())
            .map(|field| {
                field
                    .parse::<f64>()
                    .map_err(|_| format!("line {}: '{}' is not a number", number + 1, field))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if row.len() != columns {
            return Err(format!(
                "line {}: expected {} columns, found {}",
                number + 1,
                columns,
                row.len()
            ));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(format!("line {}: non-finite value", number + 1));
        }
        rows.push(row);
    }
    Ok(rows)
}
