//! Degraded operation when the bus primitive is unavailable.

use std::time::Duration;

use txn_signal::channel::{Bus, ChannelHandle};
use txn_signal::error::ChannelError;
use txn_signal::initiator::{InitiatorConsumer, TransactionView, WaitOutcome};
use txn_signal::result_context::{ControllerState, ResultContext};

use crate::integration::test_utils::{settings, RecordingHost, PAID};

#[tokio::test(start_paused = true)]
async fn test_contexts_degrade_without_bus() {
    let bus = Bus::unsupported();
    let settings = settings("txn-nobus");
    let host = RecordingHost::new();

    let result = ResultContext::mount(&bus, &settings, host.as_host());
    let initiator = InitiatorConsumer::open(&bus, &settings);
    assert!(!result.is_channel_available());
    assert!(!initiator.is_connected());

    result.report_status(PAID);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(initiator.view(), TransactionView::default());
    assert_eq!(
        initiator.wait_for_terminal(Duration::from_secs(1)).await,
        WaitOutcome::Unavailable
    );
    assert_eq!(result.state(), ControllerState::Starting);
    assert_eq!(host.close_count(), 0);
}

#[test]
fn test_open_outside_runtime_is_unavailable() {
    let bus = Bus::new();
    let settings = settings("txn-noruntime");
    let err = ChannelHandle::open(&bus, &settings.channel).unwrap_err();
    assert!(matches!(err, ChannelError::Unavailable(_)));
    assert_eq!(bus.topic_count(), 0);
}
