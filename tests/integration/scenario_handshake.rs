//! Readiness, progress, and terminal status observed on both sides of one channel.

use std::time::Duration;

use txn_signal::channel::Bus;
use txn_signal::initiator::{InitiatorConsumer, WaitOutcome};
use txn_signal::result_context::{ControllerState, ResultContext};

use crate::integration::test_utils::{settings, wait_until, RecordingHost, PAID, PENDING};

#[tokio::test(start_paused = true)]
async fn test_full_handshake_closes_after_grace() {
    let bus = Bus::new();
    let settings = settings("txn-42");
    let host = RecordingHost::new();

    let initiator = InitiatorConsumer::open(&bus, &settings);
    let result = ResultContext::mount(&bus, &settings, host.as_host());

    let view = wait_until(&initiator.subscribe(), "readiness", |v| v.ready_observed).await;
    assert_eq!(view.status, None);
    assert!(!view.finished);

    result.report_status(PENDING);
    let view = wait_until(&initiator.subscribe(), "pending", |v| v.status.is_some()).await;
    assert_eq!(view.status.as_deref(), Some(PENDING));
    assert!(!view.finished);

    result.report_status(PAID);
    let outcome = initiator.wait_for_terminal(Duration::from_secs(1)).await;
    assert_eq!(
        outcome,
        WaitOutcome::Finished {
            status: PAID.to_string()
        }
    );
    let result_view = wait_until(&result.subscribe(), "result finished", |v| v.finished).await;
    assert_eq!(result_view.state, ControllerState::Finished);
    assert_eq!(result_view.status.as_deref(), Some(PAID));

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert_eq!(host.close_count(), 0, "closed before the grace period");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(host.close_count(), 1);
    assert_eq!(result.state(), ControllerState::Closing);

    // The initiator keeps its channel after the transaction finishes.
    assert!(initiator.is_connected());
    assert_eq!(initiator.status().as_deref(), Some(PAID));
}

#[tokio::test]
async fn test_result_context_reflects_external_provider() {
    let bus = Bus::new();
    let settings = settings("txn-provider");
    let host = RecordingHost::new();
    let result = ResultContext::mount(&bus, &settings, host.as_host());
    wait_until(&result.subscribe(), "waiting", |v| {
        v.state == ControllerState::Waiting
    })
    .await;

    let provider = txn_signal::channel::ChannelHandle::open(&bus, &settings.channel).unwrap();
    provider.send(&txn_signal::channel::BusMessage::status(PENDING));
    let view = wait_until(&result.subscribe(), "pending", |v| v.status.is_some()).await;
    assert_eq!(view.status.as_deref(), Some(PENDING));
    assert_eq!(view.state, ControllerState::Waiting);
}

#[tokio::test]
async fn test_rerender_does_not_resend_readiness() {
    let bus = Bus::new();
    let settings = settings("txn-rerender");
    let probe = txn_signal::channel::ChannelHandle::open(&bus, &settings.channel).unwrap();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    probe
        .on_message(move |raw| {
            let _ = tx.send(raw);
        })
        .unwrap();

    let result = ResultContext::mount(&bus, &settings, RecordingHost::new().as_host());
    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, serde_json::json!({ "transaction_window_ready": true }));

    result.rerender();
    result.rerender();
    let again = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(again.is_err(), "readiness was announced twice");
}
