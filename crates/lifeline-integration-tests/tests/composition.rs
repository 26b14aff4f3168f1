//! Nested presence gates, watchers and providers composed inside root
//! handlers.

mod common;

use std::sync::Arc;

use common::Harness;
use lifeline_capsule::CapsuleError;
use lifeline_registry::{EventKind, Filter, Registry, properties};
use lifeline_runtime::ProvideOptions;
use lifeline_test::fixtures::{Greeter, Store};
use lifeline_test::RecordingCapsule;

struct Port(u16);

#[test]
fn test_three_level_cascade() {
    let h = Harness::new();
    let log = h.log.clone();
    h.when_active(move |lifeline| {
        let log = log.clone();
        lifeline.when_service_present::<Store, _>(move |lifeline, store| {
            let log = log.clone();
            let store = store.name().to_string();
            lifeline.when_service_present::<Greeter, _>(move |lifeline, greeter| {
                let log = log.clone();
                let outer = format!("{store}/{}", greeter.greeting());
                lifeline.when_service_present::<Port, _>(move |lifeline, port| {
                    let name = format!("{outer}/{}", port.0);
                    lifeline.add_capsule(Arc::new(RecordingCapsule::new(name, &log)))?;
                    Ok(())
                })?;
                Ok(())
            })?;
            Ok(())
        })?;
        Ok(())
    });
    h.activate();

    let store = h.publish(Store::new("db"));
    let greeter = h.publish(Greeter::new("hi"));
    h.publish(Port(80));
    assert_eq!(h.log.entries(), vec!["start db/hi/80"]);
    assert_eq!(h.registry.subscription_count(), 3);

    greeter.unregister().unwrap();
    assert_eq!(h.log.entries(), vec!["start db/hi/80", "stop db/hi/80"]);
    // The Port watcher closed; Store and Greeter are still watched.
    assert_eq!(h.registry.subscription_count(), 2);

    h.publish(Greeter::new("hey"));
    assert_eq!(h.log.entries_with_prefix("start"), vec!["start db/hi/80", "start db/hey/80"]);

    store.unregister().unwrap();
    assert_eq!(h.log.entries_with_prefix("stop"), vec!["stop db/hi/80", "stop db/hey/80"]);
    assert_eq!(h.registry.subscription_count(), 1);
    h.deactivate();
    assert_eq!(h.registry.subscription_count(), 0);
}

#[test]
fn test_failed_activation_stops_partial_scope_and_leaves_gate_disarmed() {
    let h = Harness::new();
    let log = h.log.clone();
    h.when_active(move |lifeline| {
        let log = log.clone();
        lifeline.when_service_present::<Store, _>(move |lifeline, store| {
            lifeline.add_capsule(Arc::new(RecordingCapsule::new(store.name(), &log)))?;
            if store.name() == "broken" {
                return Err(CapsuleError::msg("store is broken"));
            }
            Ok(())
        })?;
        Ok(())
    });
    h.activate();

    // The failure is reported to the registry's delivery, not the publisher.
    h.publish(Store::new("broken"));
    assert_eq!(h.log.entries(), vec!["start broken", "stop broken"]);

    h.publish(Store::new("healthy"));
    assert_eq!(h.log.entries(), vec!["start broken", "stop broken", "start healthy"]);
    h.deactivate();
    assert!(h.log.contains("stop healthy"));
}

#[test]
fn test_watcher_sees_every_lifecycle_event() {
    let h = Harness::new();
    let log = h.log.clone();
    h.when_active(move |lifeline| {
        let log = log.clone();
        lifeline.watch_services::<Greeter, _>(Some("(lang=en)"), move |_, event| {
            let greeting = event.downcast::<Greeter>().map(|g| g.greeting().to_string());
            let kind = match event.kind() {
                EventKind::Adding => "adding",
                EventKind::Modified => "modified",
                EventKind::Removed => "removed",
            };
            log.push(format!("{kind} {}", greeting.unwrap_or_default()));
            Ok(())
        })?;
        Ok(())
    });

    let hello = h.publish_with(Greeter::new("hello"), properties([("lang", "en")]));
    h.publish_with(Greeter::new("hallo"), properties([("lang", "de")]));
    h.activate();
    assert_eq!(h.log.entries(), vec!["adding hello"]);

    hello
        .set_properties(properties([("lang", "en"), ("tone", "warm")]))
        .unwrap();
    hello.unregister().unwrap();
    assert_eq!(h.log.entries(), vec!["adding hello", "modified hello", "removed hello"]);
    h.deactivate();
}

#[test]
fn test_provided_resources_are_ranked_and_typed() {
    let h = Harness::new();
    h.when_active(|lifeline| {
        lifeline.provides(Greeter::new("plain"))?;
        lifeline.provides_with(
            Greeter::new("preferred"),
            ProvideOptions::new()
                .with_type_name("greeting")
                .with_property("resource.ranking", 10),
        )?;
        Ok(())
    });
    h.activate();

    let best = h.lifeline.service::<Greeter>().unwrap().unwrap();
    assert_eq!(best.greeting(), "preferred");
    let by_alias = h.registry.references(Some(&Filter::object_class("greeting")));
    assert_eq!(by_alias.len(), 1);

    h.deactivate();
    assert!(h.registry.is_empty());
}
