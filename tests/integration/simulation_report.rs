//! End-to-end simulation runs and their reports.

use std::time::Duration;

use txn_signal::channel::ChannelName;
use txn_signal::config::TransactionSettings;
use txn_signal::initiator::WaitOutcome;
use txn_signal::result_context::ControllerState;
use txn_signal::simulation::{run_simulation, ContextRole, SimulationPlan};

use crate::integration::test_utils::{PAID, PENDING};

fn plan(channel: &str, statuses: &[&str], initiator_delay: Duration) -> SimulationPlan {
    SimulationPlan {
        settings: TransactionSettings::new(ChannelName::new(channel).unwrap(), PAID),
        statuses: statuses.iter().map(|s| s.to_string()).collect(),
        interval: Duration::from_secs(1),
        initiator_delay,
        initiator_wait: Duration::from_secs(120),
        bus_capacity: 16,
    }
}

#[tokio::test(start_paused = true)]
async fn test_simulation_timeline_for_happy_path() {
    let report = run_simulation(plan("txn-sim-a", &[PENDING, PAID], Duration::ZERO))
        .await
        .unwrap();

    assert_eq!(report.channel, "txn-sim-a");
    assert_eq!(
        report.outcome,
        WaitOutcome::Finished {
            status: PAID.to_string()
        }
    );
    assert!(report.initiator.ready_observed);
    assert_eq!(report.result.state, ControllerState::Closing);
    let closed_at = report.close_requested_at_ms.unwrap();
    assert!((7_000..7_100).contains(&closed_at), "closed at {closed_at}");

    let events: Vec<(ContextRole, &str)> = report
        .timeline
        .iter()
        .map(|e| (e.context, e.event.as_str()))
        .collect();
    assert!(events.contains(&(ContextRole::Initiator, "readiness observed")));
    assert!(events.contains(&(ContextRole::Provider, "published payment.paid")));
    assert!(events.contains(&(ContextRole::Result, "host close requested")));
    let closes = events
        .iter()
        .filter(|(_, e)| *e == "host close requested")
        .count();
    assert_eq!(closes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_simulation_late_initiator_misses_readiness() {
    let report = run_simulation(plan("txn-sim-b", &[PAID], Duration::from_secs(2)))
        .await
        .unwrap();
    assert!(!report.initiator.ready_observed);
    assert!(report.initiator.finished);
    assert!(!report
        .timeline
        .iter()
        .any(|e| e.event == "readiness observed"));
}

#[tokio::test(start_paused = true)]
async fn test_simulation_duplicate_terminal_closes_once() {
    let report = run_simulation(plan("txn-sim-c", &[PAID, PAID], Duration::ZERO))
        .await
        .unwrap();
    let closed_at = report.close_requested_at_ms.unwrap();
    assert!((6_000..6_100).contains(&closed_at), "closed at {closed_at}");
    let closes = report
        .timeline
        .iter()
        .filter(|e| e.event == "host close requested")
        .count();
    assert_eq!(closes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_simulation_report_serializes() {
    let report = run_simulation(plan("txn-sim-d", &[PENDING], Duration::ZERO))
        .await
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["outcome"]["outcome"], "timed_out");
    assert_eq!(json["outcome"]["last_status"], PENDING);
    assert!(json["close_requested_at_ms"].is_null());
}
