//! Integration tests for configuration layering feeding real contexts

use std::time::Duration;

use tempfile::TempDir;
use txn_signal::channel::Bus;
use txn_signal::config::{ConfigLoader, DEFAULT_TERMINAL_STATUS};
use txn_signal::initiator::{InitiatorConsumer, WaitOutcome};
use txn_signal::result_context::{ControllerState, ResultContext};

use crate::integration::test_utils::{wait_until, with_isolated_env, RecordingHost};

fn write(path: &std::path::Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

#[test]
fn test_environment_specific_file_overrides_base() {
    let temp_dir = TempDir::new().unwrap();
    let ws = temp_dir.path().join("ws");
    write(
        &ws.join("config/config.toml"),
        "[transaction]\ngrace_period_ms = 3000\nterminal_status = \"order.settled\"\n",
    );
    write(
        &ws.join("config/staging.toml"),
        "[transaction]\ngrace_period_ms = 750\n",
    );

    let config = with_isolated_env(&temp_dir, || {
        std::env::set_var("TXN_SIGNAL_ENV", "staging");
        ConfigLoader::load(&ws)
    })
    .unwrap();
    assert_eq!(config.transaction.grace_period_ms, 750);
    assert_eq!(config.transaction.terminal_status, "order.settled");
}

#[test]
fn test_env_var_sets_bus_capacity() {
    let temp_dir = TempDir::new().unwrap();
    let config = with_isolated_env(&temp_dir, || {
        std::env::set_var("TXN_SIGNAL__BUS__CAPACITY", "4");
        ConfigLoader::load(temp_dir.path())
    })
    .unwrap();
    assert_eq!(config.bus.capacity, 4);
    assert_eq!(config.transaction.terminal_status, DEFAULT_TERMINAL_STATUS);
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.toml");
    let result = with_isolated_env(&temp_dir, || ConfigLoader::load_from_file(&missing));
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_configured_terminal_and_grace_drive_contexts() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("signal.toml");
    write(
        &file,
        "[transaction]\nchannel_prefix = \"order\"\nterminal_status = \"order.settled\"\ngrace_period_ms = 1000\n",
    );
    let config = with_isolated_env(&temp_dir, || ConfigLoader::load_from_file(&file)).unwrap();
    let settings = config.transaction.new_attempt().unwrap();
    assert!(settings.channel.as_str().starts_with("order-"));

    let bus = Bus::with_capacity(config.bus.capacity);
    let host = RecordingHost::new();
    let initiator = InitiatorConsumer::open(&bus, &settings);
    let result = ResultContext::mount(&bus, &settings, host.as_host());
    wait_until(&initiator.subscribe(), "readiness", |v| v.ready_observed).await;

    // The default terminal value is just another status under this config.
    result.report_status(DEFAULT_TERMINAL_STATUS);
    wait_until(&result.subscribe(), "status", |v| v.status.is_some()).await;
    assert!(!result.is_finished());

    result.report_status("order.settled");
    assert_eq!(
        initiator.wait_for_terminal(Duration::from_secs(1)).await,
        WaitOutcome::Finished {
            status: "order.settled".to_string()
        }
    );
    wait_until(&result.subscribe(), "finished", |v| v.finished).await;
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(host.close_count(), 1);
    assert_eq!(result.state(), ControllerState::Closing);
}
