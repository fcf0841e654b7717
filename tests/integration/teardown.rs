//! Unmounting releases the channel and cancels pending side effects.

use std::time::Duration;

use txn_signal::channel::{Bus, BusMessage, ChannelHandle};
use txn_signal::initiator::{InitiatorConsumer, WaitOutcome};
use txn_signal::result_context::{ControllerState, ResultContext};

use crate::integration::test_utils::{settings, wait_until, RecordingHost, PAID};

#[tokio::test(start_paused = true)]
async fn test_unmount_during_grace_never_closes_host() {
    let bus = Bus::new();
    let settings = settings("txn-teardown");
    let host = RecordingHost::new();
    let result = ResultContext::mount(&bus, &settings, host.as_host());
    wait_until(&result.subscribe(), "waiting", |v| {
        v.state == ControllerState::Waiting
    })
    .await;

    result.report_status(PAID);
    wait_until(&result.subscribe(), "finished", |v| v.finished).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    result.unmount();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(host.close_count(), 0);
    assert_eq!(bus.handle_count(&settings.channel), 0);
}

#[tokio::test]
async fn test_closed_handle_never_invokes_callback() {
    let bus = Bus::new();
    let settings = settings("txn-closed");
    let listener = ChannelHandle::open(&bus, &settings.channel).unwrap();
    let sender = ChannelHandle::open(&bus, &settings.channel).unwrap();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    listener
        .on_message(move |raw| {
            let _ = tx.send(raw);
        })
        .unwrap();

    listener.close();
    listener.close();
    sender.send(&BusMessage::status(PAID));

    // The callback (and its sender) is dropped on close, so the stream ends empty.
    let next = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
    assert!(matches!(next, Ok(None)));
    assert!(listener.is_closed());
    assert!(!listener.has_listener());
}

#[tokio::test]
async fn test_dropping_consumer_releases_channel() {
    let bus = Bus::new();
    let settings = settings("txn-drop");
    {
        let initiator = InitiatorConsumer::open(&bus, &settings);
        assert_eq!(bus.handle_count(&settings.channel), 1);
        assert!(initiator.is_connected());
    }
    assert_eq!(bus.handle_count(&settings.channel), 0);
    assert_eq!(bus.topic_count(), 0);

    let initiator = InitiatorConsumer::open(&bus, &settings);
    initiator.close();
    assert!(!initiator.is_connected());
    assert_eq!(
        initiator.wait_for_terminal(Duration::from_millis(10)).await,
        WaitOutcome::Unavailable
    );
}
