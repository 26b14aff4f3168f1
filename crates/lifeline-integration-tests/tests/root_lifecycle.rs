//! Root activation and deactivation driven by a configuration file.

mod common;

use std::fs;
use std::sync::Arc;

use common::Harness;
use lifeline_capsule::{CapsuleError, StopPolicy};
use lifeline_config::Config;
use lifeline_runtime::{ActivationSignal, Lifeline, RuntimeConfig, RuntimeError};
use lifeline_telemetry::{LogConfig, LogFormat};
use lifeline_test::{FailingCapsule, RecordingCapsule};

const CONFIG: &str = r#"
[runtime]
name = "orders"
stop_policy = "fail_fast"

[logging]
level = "debug"
format = "json"
directives = ["lifeline_presence=trace"]
"#;

fn load_config() -> Config {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lifeline.toml");
    fs::write(&path, CONFIG).unwrap();
    let config = Config::load_file(&path).unwrap();
    config.validate().unwrap();
    config
}

#[test]
fn test_config_file_drives_root_and_logging() {
    let config = load_config();
    let lifeline = Lifeline::from_config(&config);
    assert_eq!(lifeline.config().name, "orders");
    assert_eq!(lifeline.config().stop_policy, StopPolicy::FailFast);

    let logging = LogConfig::from_section(&config.logging);
    assert_eq!(logging.level, "debug");
    assert_eq!(logging.format, LogFormat::Json);
    assert_eq!(logging.directives, vec!["lifeline_presence=trace".to_string()]);
}

fn teardown_log(policy: StopPolicy) -> (Vec<String>, RuntimeError) {
    let h = Harness::with_config(RuntimeConfig::new("teardown").with_stop_policy(policy));
    let log = h.log.clone();
    h.when_active(move |lifeline| {
        lifeline.add_capsule(Arc::new(RecordingCapsule::new("first", &log)))?;
        lifeline.add_capsule(Arc::new(FailingCapsule::on_stop("broken").recording(&log)))?;
        lifeline.add_capsule(Arc::new(RecordingCapsule::new("last", &log)))?;
        Ok(())
    });
    h.activate();
    let err = h.lifeline.on_deactivate().unwrap_err();
    assert!(!h.lifeline.is_active());
    (h.log.entries_with_prefix("stop"), err)
}

#[test]
fn test_drain_all_stops_every_member() {
    let (stopped, err) = teardown_log(StopPolicy::DrainAll);
    assert_eq!(stopped, vec!["stop first", "stop broken", "stop last"]);
    assert!(err.to_string().contains("broken"));
}

#[test]
fn test_fail_fast_from_config_stops_at_first_failure() {
    let config = load_config();
    let h = Harness::new();
    let lifeline = Lifeline::from_config(&config);
    let log = h.log.clone();
    lifeline
        .when_active(move |lifeline| {
            lifeline.add_capsule(Arc::new(RecordingCapsule::new("first", &log)))?;
            lifeline.add_capsule(Arc::new(FailingCapsule::on_stop("broken").recording(&log)))?;
            lifeline.add_capsule(Arc::new(RecordingCapsule::new("last", &log)))?;
            Ok(())
        })
        .unwrap();
    lifeline
        .on_activate(ActivationSignal::new("orders", Arc::new(h.registry.clone())))
        .unwrap();

    assert!(lifeline.on_deactivate().is_err());
    assert_eq!(h.log.entries_with_prefix("stop"), vec!["stop first", "stop broken"]);

    let (stopped, _) = teardown_log(StopPolicy::FailFast);
    assert_eq!(stopped, vec!["stop first", "stop broken"]);
}

#[test]
fn test_duplicate_activation_is_rejected_without_side_effects() {
    let h = Harness::new();
    let log = h.log.clone();
    h.when_active(move |lifeline| {
        lifeline.add_capsule(Arc::new(RecordingCapsule::new("once", &log)))?;
        Ok(())
    });
    h.activate();

    let again = h
        .lifeline
        .on_activate(ActivationSignal::new("second", Arc::new(h.registry.clone())));
    assert!(matches!(again, Err(RuntimeError::AlreadyActive { name }) if name == "it"));
    assert_eq!(h.log.entries(), vec!["start once"]);
    assert_eq!(h.lifeline.signal().unwrap().name(), "it");

    h.deactivate();
    h.deactivate();
    assert_eq!(h.log.entries(), vec!["start once", "stop once"]);
}

#[test]
fn test_late_handler_and_failed_handler_share_teardown() {
    let h = Harness::new();
    let log = h.log.clone();
    h.when_active(move |lifeline| {
        lifeline.add_capsule(Arc::new(RecordingCapsule::new("partial", &log)))?;
        Err(CapsuleError::msg("handler gave up"))
    });

    let err = h
        .lifeline
        .on_activate(ActivationSignal::new("it", Arc::new(h.registry.clone())))
        .unwrap_err();
    assert!(err.to_string().contains("handler gave up"));
    assert!(h.lifeline.is_active());

    let log = h.log.clone();
    h.when_active(move |lifeline| {
        lifeline.add_capsule(Arc::new(RecordingCapsule::new("late", &log)))?;
        Ok(())
    });
    assert_eq!(h.lifeline.top_level_scope_count(), 2);

    h.deactivate();
    assert_eq!(
        h.log.entries(),
        vec!["start partial", "start late", "stop partial", "stop late"]
    );
}
