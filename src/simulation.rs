//! In-process rehearsal of one transaction attempt.
//!
//! Runs a result context, an initiator consumer, and an external provider
//! handle on a private bus, and records what each side observed. Timestamps are
//! offsets from the start of the run on the tokio clock, so a paused clock
//! makes the whole timeline deterministic.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::channel::{Bus, BusMessage, ChannelHandle};
use crate::config::TransactionSettings;
use crate::error::SignalError;
use crate::host::HostWindow;
use crate::initiator::{InitiatorConsumer, TransactionView, WaitOutcome};
use crate::result_context::{ControllerState, ResultContext, ResultView};

/// Slack allowed past the grace period when waiting for the close request.
const CLOSE_WAIT_SLACK: Duration = Duration::from_secs(1);
const WATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub settings: TransactionSettings,
    /// Statuses the provider publishes, one per interval.
    pub statuses: Vec<String>,
    pub interval: Duration,
    /// Zero opens the initiator before the result context mounts; anything
    /// else opens it this long after.
    pub initiator_delay: Duration,
    pub initiator_wait: Duration,
    pub bus_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextRole {
    Initiator,
    Result,
    Provider,
}

impl ContextRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ContextRole::Initiator => "initiator",
            ContextRole::Result => "result",
            ContextRole::Provider => "provider",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub at_ms: u64,
    pub context: ContextRole,
    pub event: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub channel: String,
    pub timeline: Vec<TimelineEntry>,
    pub initiator: TransactionView,
    pub result: ResultView,
    pub outcome: WaitOutcome,
    pub close_requested_at_ms: Option<u64>,
}

#[derive(Clone)]
struct Recorder {
    start: Instant,
    log: mpsc::UnboundedSender<TimelineEntry>,
}

impl Recorder {
    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn record(&self, context: ContextRole, event: impl Into<String>) {
        let entry = TimelineEntry {
            at_ms: self.elapsed_ms(),
            context,
            event: event.into(),
        };
        let _ = self.log.send(entry);
    }
}

pub async fn run_simulation(plan: SimulationPlan) -> Result<SimulationReport, SignalError> {
    let bus = Bus::with_capacity(plan.bus_capacity);
    let (log_tx, mut log_rx) = mpsc::unbounded_channel();
    let recorder = Recorder {
        start: Instant::now(),
        log: log_tx,
    };
    info!(
        channel = %plan.settings.channel,
        statuses = plan.statuses.len(),
        "starting transaction simulation"
    );

    let close_requested_at = Arc::new(Mutex::new(None));
    let host = close_recorder(recorder.clone(), Arc::clone(&close_requested_at));

    let mut watchers = Vec::new();
    let (initiator, result) = if plan.initiator_delay.is_zero() {
        let initiator = open_initiator(&bus, &plan.settings, &recorder, &mut watchers);
        let result = mount_result(&bus, &plan.settings, host, &recorder, &mut watchers);
        (initiator, result)
    } else {
        let result = mount_result(&bus, &plan.settings, host, &recorder, &mut watchers);
        tokio::time::sleep(plan.initiator_delay).await;
        let initiator = open_initiator(&bus, &plan.settings, &recorder, &mut watchers);
        (initiator, result)
    };

    let provider = ChannelHandle::open(&bus, &plan.settings.channel)?;
    let publishing = publish_statuses(provider, plan.statuses.clone(), plan.interval, recorder.clone());

    let outcome = initiator.wait_for_terminal(plan.initiator_wait).await;
    recorder.record(ContextRole::Initiator, format!("wait ended: {}", describe(&outcome)));

    if result.is_finished() || matches!(outcome, WaitOutcome::Finished { .. }) {
        let bound = plan.settings.grace_period + CLOSE_WAIT_SLACK;
        let closing = tokio::time::timeout(
            bound,
            result.wait_for(|v| v.state == ControllerState::Closing),
        )
        .await;
        if closing.is_err() {
            debug!(channel = %plan.settings.channel, "result context did not close within bound");
        }
    }

    publishing.abort();
    let _ = publishing.await;
    let initiator_view = initiator.view();
    let result_view = result.view();
    initiator.close();
    drop(initiator);
    result.unmount();

    for watcher in watchers {
        let _ = tokio::time::timeout(WATCHER_DRAIN_TIMEOUT, watcher).await;
    }
    drop(recorder);
    log_rx.close();

    let mut timeline = Vec::new();
    while let Some(entry) = log_rx.recv().await {
        timeline.push(entry);
    }
    timeline.sort_by_key(|entry| entry.at_ms);

    let close_requested_at_ms = *close_requested_at.lock();
    Ok(SimulationReport {
        channel: plan.settings.channel.to_string(),
        timeline,
        initiator: initiator_view,
        result: result_view,
        outcome,
        close_requested_at_ms,
    })
}

fn describe(outcome: &WaitOutcome) -> String {
    match outcome {
        WaitOutcome::Finished { status } => format!("finished ({})", status),
        WaitOutcome::TimedOut { last_status, .. } => format!(
            "timed out (last status {})",
            last_status.as_deref().unwrap_or("none")
        ),
        WaitOutcome::Unavailable => "channel unavailable".to_string(),
    }
}

fn close_recorder(recorder: Recorder, slot: Arc<Mutex<Option<u64>>>) -> Arc<dyn HostWindow> {
    Arc::new(move || {
        let mut at = slot.lock();
        if at.is_none() {
            *at = Some(recorder.elapsed_ms());
        }
        recorder.record(ContextRole::Result, "host close requested");
    })
}

fn open_initiator(
    bus: &Bus,
    settings: &TransactionSettings,
    recorder: &Recorder,
    watchers: &mut Vec<JoinHandle<()>>,
) -> InitiatorConsumer {
    let initiator = InitiatorConsumer::open(bus, settings);
    recorder.record(ContextRole::Initiator, "listening");
    watchers.push(watch_initiator(initiator.subscribe(), recorder.clone()));
    initiator
}

fn mount_result(
    bus: &Bus,
    settings: &TransactionSettings,
    host: Arc<dyn HostWindow>,
    recorder: &Recorder,
    watchers: &mut Vec<JoinHandle<()>>,
) -> ResultContext {
    let result = ResultContext::mount(bus, settings, host);
    recorder.record(ContextRole::Result, "mounted");
    watchers.push(watch_result(result.subscribe(), recorder.clone()));
    result
}

fn publish_statuses(
    provider: ChannelHandle,
    statuses: Vec<String>,
    interval: Duration,
    recorder: Recorder,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        for status in statuses {
            tokio::time::sleep(interval).await;
            provider.send(&BusMessage::Status(status.clone()));
            recorder.record(ContextRole::Provider, format!("published {}", status));
        }
    })
}

fn watch_initiator(mut view: watch::Receiver<TransactionView>, recorder: Recorder) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = view.borrow_and_update().clone();
        while view.changed().await.is_ok() {
            let current = view.borrow_and_update().clone();
            if current.ready_observed && !last.ready_observed {
                recorder.record(ContextRole::Initiator, "readiness observed");
            }
            if current.status != last.status {
                if let Some(status) = &current.status {
                    recorder.record(ContextRole::Initiator, format!("status {}", status));
                }
            }
            if current.finished && !last.finished {
                recorder.record(ContextRole::Initiator, "finished");
            }
            last = current;
        }
    })
}

fn watch_result(mut view: watch::Receiver<ResultView>, recorder: Recorder) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = view.borrow_and_update().clone();
        while view.changed().await.is_ok() {
            let current = view.borrow_and_update().clone();
            if current.status != last.status {
                if let Some(status) = &current.status {
                    recorder.record(ContextRole::Result, format!("status {}", status));
                }
            }
            if current.state != last.state {
                recorder.record(ContextRole::Result, format!("state {}", current.state));
            }
            last = current;
        }
    })
}
