//! Integration tests for the transaction completion signal

mod config_integration;
mod late_listener;
mod scenario_handshake;
mod simulation_report;
mod teardown;
mod test_utils;
mod unavailable;
