//! A listener that opens after readiness was sent never sees it.

use std::time::Duration;

use txn_signal::channel::Bus;
use txn_signal::initiator::{InitiatorConsumer, WaitOutcome};
use txn_signal::result_context::{ControllerState, ResultContext};

use crate::integration::test_utils::{settings, wait_until, RecordingHost, PAID, PENDING};

#[tokio::test(start_paused = true)]
async fn test_late_initiator_misses_readiness() {
    let bus = Bus::new();
    let settings = settings("txn-late");
    let result = ResultContext::mount(&bus, &settings, RecordingHost::new().as_host());
    wait_until(&result.subscribe(), "announced", |v| {
        v.state == ControllerState::Waiting
    })
    .await;

    tokio::time::sleep(Duration::from_secs(2)).await;
    let initiator = InitiatorConsumer::open(&bus, &settings);
    assert!(!initiator.ready_observed());

    // Later statuses still arrive; only the one-shot readiness is lost.
    result.report_status(PENDING);
    let view = wait_until(&initiator.subscribe(), "pending", |v| v.status.is_some()).await;
    assert!(!view.ready_observed);

    result.report_status(PAID);
    assert_eq!(
        initiator.wait_for_terminal(Duration::from_secs(1)).await,
        WaitOutcome::Finished {
            status: PAID.to_string()
        }
    );
    assert!(!initiator.ready_observed());
}

#[tokio::test(start_paused = true)]
async fn test_missing_terminal_status_times_out() {
    let bus = Bus::new();
    let settings = settings("txn-stalled");
    let initiator = InitiatorConsumer::open(&bus, &settings);
    let result = ResultContext::mount(&bus, &settings, RecordingHost::new().as_host());
    wait_until(&initiator.subscribe(), "readiness", |v| v.ready_observed).await;
    result.report_status(PENDING);
    wait_until(&initiator.subscribe(), "pending", |v| v.status.is_some()).await;

    let outcome = initiator
        .wait_for_terminal(Duration::from_millis(600_000))
        .await;
    assert_eq!(
        outcome,
        WaitOutcome::TimedOut {
            last_status: Some(PENDING.to_string()),
            ready_observed: true,
        }
    );
    assert!(initiator.is_connected());
}
