use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::anyhow;
use rand::{SeedableRng, rngs::StdRng};
use spin_sleep::SpinSleeper;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};
use tracing_subscriber::{self, EnvFilter};

use rover_sim::blackboard::{
    self, Blackboard, FAULT_NO_SUBSCRIBER, FAULT_SINK_LAGGED, FAULT_STEP_CAP, FinishGuard,
};
use rover_sim::bus::Topic;
use rover_sim::config::{DEFAULT_CONFIG_PATH, load_config};
use rover_sim::{
    Event, EventKind, RunConfig, ScenarioDirectory, Simulator, SimulatorConfig,
};

const PROGRESS_PERIOD: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let settings = load_config(&config_path)?;
    let sim_config = SimulatorConfig::from_settings(&settings)?;
    let run_config = RunConfig::from_settings(&settings)?;

    let source = ScenarioDirectory::resolve(&run_config.scenario_root, &run_config.scenario);
    let mut simulator = Simulator::new(&sim_config, StdRng::seed_from_u64(run_config.seed))?;
    simulator.start(&source)?;
    info!(
        scenario = %source.path().display(),
        seed = run_config.seed,
        "Rover simulation ready"
    );

    let bb: Blackboard = Arc::default();
    let event_topic: Topic<Event> = Topic::new(run_config.event_buffer);
    let event_rx = event_topic.subscribe();

    info!("Spawning simulation thread...");
    let handle = std::thread::Builder::new()
        .name("simulation".into())
        .spawn({
            let bb = Arc::clone(&bb);
            let run_config = run_config.clone();
            move || {
                let _finished = FinishGuard::new(&bb);
                drive(&mut simulator, &event_topic, &bb, &run_config)
            }
        })?;

    let runtime = tokio::runtime::Runtime::new()?;
    let (tally, ()) = runtime.block_on(async {
        tokio::try_join!(event_sink(bb.clone(), event_rx), progress_reporter(bb.clone()))
    })?;

    let steps = handle
        .join()
        .map_err(|_| anyhow!("simulation thread panicked"))??;

    summarize(&bb, steps, &tally);
    Ok(())
}

/// Steps the simulator until it finishes or hits the step cap, publishing
/// events on the topic and ground truth on the blackboard.
fn drive(
    simulator: &mut Simulator<StdRng>,
    topic: &Topic<Event>,
    bb: &Blackboard,
    run_config: &RunConfig,
) -> anyhow::Result<u64> {
    info!("Simulation thread started.");
    let sleeper = SpinSleeper::new(1_000);
    let step_period = (run_config.realtime_factor > 0.0)
        .then(|| Duration::from_secs_f64(simulator.dt() / run_config.realtime_factor));

    let mut announced_no_subscriber = false;

    while simulator.keep_running() {
        if run_config.max_steps > 0 && simulator.step_count() >= run_config.max_steps {
            warn!(max_steps = run_config.max_steps, "Step cap reached before the final waypoint");
            blackboard::raise_fault(bb, FAULT_STEP_CAP);
            break;
        }

        let started = Instant::now();
        let events = simulator.step().map_err(|e| {
            error!("Simulation step failed: {}", e);
            e
        })?;
        for event in events {
            if topic.publish(event) == 0 && !announced_no_subscriber {
                warn!("No event subscriber; events are being dropped");
                blackboard::raise_fault(bb, FAULT_NO_SUBSCRIBER);
                announced_no_subscriber = true;
            }
        }
        blackboard::record_truth(bb, simulator.ground_truth(false));

        if let Some(period) = step_period {
            if let Some(remaining) = period.checked_sub(started.elapsed()) {
                sleeper.sleep(remaining);
            }
        }
    }

    blackboard::record_truth(bb, simulator.ground_truth(true));
    info!("Simulation thread finished.");
    Ok(simulator.step_count())
}

/// Tallies events by kind until the simulation drops the topic.
async fn event_sink(
    bb: Blackboard,
    mut rx: broadcast::Receiver<Arc<Event>>,
) -> anyhow::Result<BTreeMap<EventKind, u64>> {
    info!("Event sink started.");
    let mut tally = BTreeMap::new();
    loop {
        match rx.recv().await {
            Ok(event) => *tally.entry(event.kind()).or_insert(0) += 1,
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "Event sink lagged behind the simulation");
                blackboard::raise_fault(&bb, FAULT_SINK_LAGGED);
            }
            Err(RecvError::Closed) => break,
        }
    }
    info!("Event sink finished.");
    Ok(tally)
}

async fn progress_reporter(bb: Blackboard) -> anyhow::Result<()> {
    let mut tick = tokio::time::interval(PROGRESS_PERIOD);
    loop {
        tick.tick().await;
        let status = blackboard::snapshot(&bb);
        if status.finished {
            return Ok(());
        }
        if let Some(truth) = status.truth {
            info!(
                step = truth.step_count,
                time = truth.time,
                pose = %truth.pose,
                waypoint = truth.waypoint_index,
                "Progress"
            );
        }
    }
}

fn summarize(bb: &Blackboard, steps: u64, tally: &BTreeMap<EventKind, u64>) {
    let status = blackboard::snapshot(bb);
    let elapsed = status.started_at.elapsed();

    info!(steps, ?elapsed, "Run complete");
    if status.has_fault(FAULT_SINK_LAGGED) {
        warn!("Event counts are partial: the sink missed events while lagging");
    }
    for kind in EventKind::ALL {
        info!("  {:<18} {}", kind.to_string(), tally.get(&kind).copied().unwrap_or(0));
    }
    for fault in &status.faults {
        warn!("  fault: {}", fault);
    }

    let Some(truth) = status.truth else {
        return;
    };
    info!(pose = %truth.pose, time = truth.time, "Final ground truth");
    if let Some(last) = truth.waypoints.as_ref().and_then(|w| w.last()) {
        let distance = (last.x - truth.pose.x).hypot(last.y - truth.pose.y);
        info!(distance, "Distance to final waypoint");
    }
}
