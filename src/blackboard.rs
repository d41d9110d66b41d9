//! Shared run status.
//!
//! The simulation thread writes ground truth here. It never travels on the
//! event topic, so an estimator subscribed to events cannot see it.

use parking_lot::RwLock;
use std::{sync::Arc, time::Instant};

use crate::simulator::GroundTruth;

#[derive(Clone, Debug)]
pub struct RunStatus {
    pub truth: Option<GroundTruth>,
    pub finished: bool,
    pub started_at: Instant,
    pub faults: Vec<String>,
}

impl Default for RunStatus {
    fn default() -> Self {
        RunStatus {
            truth: None,
            finished: false,
            started_at: Instant::now(),
            faults: Vec::new(),
        }
    }
}

impl RunStatus {
    pub fn has_fault(&self, msg: &str) -> bool {
        self.faults.iter().any(|s| s == msg)
    }
}

pub type Blackboard = Arc<RwLock<RunStatus>>;

pub const FAULT_SINK_LAGGED: &str = "event sink lagged";
pub const FAULT_STEP_CAP: &str = "step cap reached";
pub const FAULT_NO_SUBSCRIBER: &str = "event published without subscribers";

pub fn snapshot(bb: &Blackboard) -> RunStatus {
    (*bb.read()).clone()
}

pub fn record_truth(bb: &Blackboard, truth: GroundTruth) {
    bb.write().truth = Some(truth);
}

pub fn mark_finished(bb: &Blackboard) {
    bb.write().finished = true;
}

pub fn raise_fault(bb: &Blackboard, msg: &str) {
    let mut g = bb.write();
    if !g.has_fault(msg) {
        g.faults.push(msg.to_string());
    }
}

/// Marks the run finished when dropped, including during a panic unwind.
pub struct FinishGuard(Blackboard);

impl FinishGuard {
    pub fn new(bb: &Blackboard) -> Self {
        FinishGuard(Arc::clone(bb))
    }
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        mark_finished(&self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_kinematics::{Control, Pose};

    #[test]
    fn test_record_and_finish() {
        let bb: Blackboard = Arc::default();
        assert!(snapshot(&bb).truth.is_none());

        let truth = GroundTruth {
            time: 1.5,
            pose: Pose::new(1.0, 2.0, 0.0),
            control: Control::new(0.5, 0.0),
            waypoint_index: 0,
            step_count: 15,
            landmarks: None,
            waypoints: None,
        };
        record_truth(&bb, truth.clone());
        mark_finished(&bb);

        let status = snapshot(&bb);
        assert_eq!(status.truth, Some(truth));
        assert!(status.finished);
    }

    #[test]
    fn test_faults_are_deduplicated() {
        let bb: Blackboard = Arc::default();
        raise_fault(&bb, FAULT_SINK_LAGGED);
        raise_fault(&bb, FAULT_SINK_LAGGED);
        raise_fault(&bb, FAULT_STEP_CAP);

        let status = snapshot(&bb);
        assert_eq!(status.faults.len(), 2);
        assert!(status.has_fault(FAULT_SINK_LAGGED));
        assert!(!status.has_fault(FAULT_NO_SUBSCRIBER));
    }

    #[test]
    fn test_guard_marks_finished_on_drop() {
        let bb: Blackboard = Arc::default();
        {
            let _guard = FinishGuard::new(&bb);
            assert!(!snapshot(&bb).finished);
        }
        assert!(snapshot(&bb).finished);
    }

    #[test]
    fn test_guard_marks_finished_when_thread_panics() {
        let bb: Blackboard = Arc::default();
        let handle = std::thread::spawn({
            let bb = Arc::clone(&bb);
            move || {
                let _guard = FinishGuard::new(&bb);
                panic!("simulation step blew up");
            }
        });
        assert!(handle.join().is_err());
        assert!(snapshot(&bb).finished);
    }
}
