//! End-to-end routing table scenarios: incremental events, evacuation,
//! bulk swaps with fresh and unfresh domains, and address collisions.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use cellroute_models::{DomainSet, ModificationTag};
use cellroute_routing_table::{
    Endpoint, MessagesToEmit, RegistryMessage, Route, RoutingKey, RoutingTable, TempTable,
};
use proptest::prelude::*;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

const DOMAIN: &str = "domain";

fn key() -> RoutingKey {
    RoutingKey::new("some-process-guid", 8080)
}

fn tag(index: u32) -> ModificationTag {
    ModificationTag::new("abc", index)
}

fn route(hostname: &str) -> Route {
    Route::new(hostname, "log-guid", "")
}

fn routes(hostnames: &[&str]) -> Vec<Route> {
    hostnames.iter().map(|h| route(h)).collect()
}

fn endpoint(guid: &str, host: &str, port: u32, evacuating: bool) -> Endpoint {
    Endpoint {
        instance_guid: guid.to_string(),
        index: 0,
        host: host.to_string(),
        domain: DOMAIN.to_string(),
        port,
        container_port: 8080,
        evacuating,
        modification_tag: Some(tag(1)),
    }
}

fn e1() -> Endpoint {
    endpoint("ig-1", "1.1.1.1", 11, false)
}

fn e2() -> Endpoint {
    endpoint("ig-2", "2.2.2.2", 22, false)
}

fn fresh(domains: &[&str]) -> DomainSet {
    domains.iter().copied().collect()
}

/// (instance guid, host, port, hostname) for each message, sorted.
fn summarize(messages: &[RegistryMessage]) -> Vec<(String, String, u32, String)> {
    let mut out: Vec<_> = messages
        .iter()
        .flat_map(|m| {
            m.uris.iter().map(move |uri| {
                (
                    m.private_instance_id.clone(),
                    m.host.clone(),
                    m.port,
                    uri.clone(),
                )
            })
        })
        .collect();
    out.sort();
    out
}

fn expected(endpoint: &Endpoint, hostnames: &[&str]) -> Vec<(String, String, u32, String)> {
    let mut out: Vec<_> = hostnames
        .iter()
        .map(|h| {
            (
                endpoint.instance_guid.clone(),
                endpoint.host.clone(),
                endpoint.port,
                h.to_string(),
            )
        })
        .collect();
    out.sort();
    out
}

fn registered(messages: &MessagesToEmit) -> Vec<(String, String, u32, String)> {
    summarize(&messages.registration_messages)
}

fn unregistered(messages: &MessagesToEmit) -> Vec<(String, String, u32, String)> {
    summarize(&messages.unregistration_messages)
}

fn table_with(hostnames: &[&str], endpoints: &[Endpoint]) -> RoutingTable {
    let table = RoutingTable::new();
    table.set_routes(&key(), routes(hostnames), Some(tag(1)));
    for endpoint in endpoints {
        table.add_endpoint(&key(), endpoint.clone());
    }
    table
}

fn snapshot(hostnames: &[&str], endpoints: &[Endpoint]) -> TempTable {
    TempTable::new(
        HashMap::from([(key(), routes(hostnames))]),
        HashMap::from([(key(), endpoints.to_vec())]),
    )
}

fn empty_snapshot() -> TempTable {
    TempTable::new(HashMap::new(), HashMap::new())
}

// =============================================================================
// Incremental updates
// =============================================================================

#[test]
fn routes_then_endpoint_registers_every_hostname() {
    let table = RoutingTable::new();

    let messages = table.set_routes(&key(), routes(&["h1", "h2"]), Some(tag(1)));
    assert!(messages.is_empty());

    let messages = table.add_endpoint(&key(), e1());
    assert_eq!(registered(&messages), expected(&e1(), &["h1", "h2"]));
    assert!(messages.unregistration_messages.is_empty());
}

#[test]
fn older_route_update_is_ignored() {
    let table = table_with(&["h1", "h2"], &[e1()]);

    let messages = table.set_routes(&key(), routes(&["h1"]), Some(tag(0)));

    assert!(messages.is_empty());
    let entry = table.entry(&key()).unwrap();
    assert_eq!(entry.routes, routes(&["h1", "h2"]));
}

#[test]
fn newer_route_update_unregisters_dropped_hostnames() {
    let table = table_with(&["h1", "h2"], &[e1()]);

    let messages = table.set_routes(&key(), routes(&["h1", "h3"]), Some(tag(2)));

    assert_eq!(registered(&messages), expected(&e1(), &["h1", "h3"]));
    assert_eq!(unregistered(&messages), expected(&e1(), &["h2"]));
}

#[test]
fn route_service_change_reregisters() {
    let table = table_with(&["h1"], &[e1()]);

    let messages = table.set_routes(
        &key(),
        vec![Route::new("h1", "log-guid", "https://rs.example.com")],
        Some(tag(2)),
    );

    assert_eq!(messages.registration_messages.len(), 1);
    assert_eq!(
        messages.registration_messages[0].route_service_url,
        "https://rs.example.com"
    );
    assert!(messages.unregistration_messages.is_empty());
}

#[test]
fn removing_routes_unregisters_and_keeps_endpoints() {
    let table = table_with(&["h1", "h2"], &[e1(), e2()]);

    let messages = table.remove_routes(&key(), Some(&tag(1)));

    let mut want = expected(&e1(), &["h1", "h2"]);
    want.extend(expected(&e2(), &["h1", "h2"]));
    want.sort();
    assert_eq!(unregistered(&messages), want);

    // Routes coming back register the retained endpoints.
    let messages = table.set_routes(&key(), routes(&["h1"]), Some(tag(2)));
    let mut want = expected(&e1(), &["h1"]);
    want.extend(expected(&e2(), &["h1"]));
    want.sort();
    assert_eq!(registered(&messages), want);
}

#[test]
fn re_adding_the_same_endpoint_emits_nothing() {
    let table = table_with(&["h1"], &[e1()]);
    assert!(table.add_endpoint(&key(), e1()).is_empty());
}

#[test]
fn evacuation_handoff_keeps_routes_registered() {
    let table = table_with(&["h1"], &[]);
    let instance = e1();
    let evacuating = endpoint("ig-1", "9.9.9.9", 99, true);

    let messages = table.add_endpoint(&key(), instance.clone());
    assert_eq!(registered(&messages), expected(&instance, &["h1"]));

    assert!(table.add_endpoint(&key(), evacuating.clone()).is_empty());
    assert!(table.remove_endpoint(&key(), &instance).is_empty());

    let replacement = e2();
    let messages = table.add_endpoint(&key(), replacement.clone());
    assert_eq!(registered(&messages), expected(&replacement, &["h1"]));

    let messages = table.remove_endpoint(&key(), &evacuating);
    assert_eq!(unregistered(&messages), expected(&evacuating, &["h1"]));
    assert!(messages.registration_messages.is_empty());
}

// =============================================================================
// Swap
// =============================================================================

#[test]
fn swap_with_fresh_domain_unregisters_missing_key() {
    let table = table_with(&["h1", "h2"], &[e1()]);

    let messages = table.swap(empty_snapshot(), Some(&fresh(&[DOMAIN])));

    assert_eq!(unregistered(&messages), expected(&e1(), &["h1", "h2"]));
    assert!(messages.registration_messages.is_empty());
    assert!(table.entry(&key()).is_none());
}

#[test]
fn swap_with_unfresh_domain_keeps_missing_key() {
    let table = table_with(&["h1", "h2"], &[e1()]);
    let before = table.entry(&key()).unwrap();

    let messages = table.swap(empty_snapshot(), Some(&fresh(&["other-domain"])));

    assert_eq!(registered(&messages), expected(&e1(), &["h1", "h2"]));
    assert!(messages.unregistration_messages.is_empty());
    assert_eq!(table.entry(&key()), Some(before));
}

#[test]
fn swap_without_freshness_gating_unregisters_missing_key() {
    let table = table_with(&["h1"], &[e1()]);

    let messages = table.swap(empty_snapshot(), None);

    assert_eq!(unregistered(&messages), expected(&e1(), &["h1"]));
    assert!(table.entry(&key()).is_none());
}

#[test]
fn swap_with_nothing_fresh_merges_old_hostnames() {
    let table = table_with(&["h1", "h2"], &[e1()]);

    let messages = table.swap(snapshot(&["h1", "h3"], &[e1()]), Some(&DomainSet::new()));

    assert_eq!(registered(&messages), expected(&e1(), &["h1", "h2", "h3"]));
    assert!(messages.unregistration_messages.is_empty());

    let hostnames: Vec<_> = table
        .entry(&key())
        .unwrap()
        .routes
        .into_iter()
        .map(|r| r.hostname)
        .collect();
    assert_eq!(hostnames, vec!["h1", "h3", "h2"]);
}

#[test]
fn swap_with_fresh_domain_drops_old_hostnames() {
    let table = table_with(&["h1", "h2"], &[e1()]);

    let messages = table.swap(snapshot(&["h1", "h3"], &[e1()]), Some(&fresh(&[DOMAIN])));

    assert_eq!(registered(&messages), expected(&e1(), &["h1", "h3"]));
    assert_eq!(unregistered(&messages), expected(&e1(), &["h2"]));
    assert_eq!(table.route_count(), 2);
}

#[test]
fn swap_with_fresh_domain_unregisters_vanished_endpoint() {
    let table = table_with(&["h1"], &[e1(), e2()]);

    let messages = table.swap(snapshot(&["h1"], &[e1()]), Some(&fresh(&[DOMAIN])));

    assert_eq!(registered(&messages), expected(&e1(), &["h1"]));
    assert_eq!(unregistered(&messages), expected(&e2(), &["h1"]));
    assert_eq!(table.entry(&key()).unwrap().endpoints.len(), 1);
}

#[test]
fn swap_adopts_new_keys() {
    let table = RoutingTable::new();

    let messages = table.swap(snapshot(&["h1"], &[e1()]), Some(&fresh(&[DOMAIN])));

    assert_eq!(registered(&messages), expected(&e1(), &["h1"]));
    assert_eq!(table.route_count(), 1);
}

// =============================================================================
// Address collisions
// =============================================================================

#[derive(Clone, Default)]
struct CapturedEvents(Arc<Mutex<Vec<BTreeMap<String, String>>>>);

impl CapturedEvents {
    fn with_message(&self, message: &str) -> Vec<BTreeMap<String, String>> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|fields| fields.get("message").map(String::as_str) == Some(message))
            .cloned()
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for CapturedEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.0.lock().unwrap().push(visitor.0);
    }
}

#[derive(Default)]
struct FieldVisitor(BTreeMap<String, String>);

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{:?}", value));
    }
}

fn capture<T>(f: impl FnOnce() -> T) -> (T, CapturedEvents) {
    let events = CapturedEvents::default();
    let subscriber = tracing_subscriber::registry().with(events.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, events)
}

#[test]
fn collision_is_logged_and_does_not_block_write() {
    let table = table_with(&["h1"], &[e1()]);
    let intruder = endpoint("ig-2", "1.1.1.1", 11, false);

    let (messages, events) = capture(|| table.add_endpoint(&key(), intruder.clone()));

    assert_eq!(registered(&messages), expected(&intruder, &["h1"]));
    assert_eq!(table.entry(&key()).unwrap().endpoints.len(), 2);
    assert_eq!(table.address_collisions(), 1);

    let collisions = events.with_message("collision detected with endpoint");
    assert_eq!(collisions.len(), 1);
    assert_eq!(collisions[0]["instance_guid_a"], "ig-1");
    assert_eq!(collisions[0]["instance_guid_b"], "ig-2");
    assert_eq!(collisions[0]["address"], "1.1.1.1:11");
}

#[test]
fn same_instance_at_same_address_is_not_a_collision() {
    let table = table_with(&["h1"], &[e1()]);

    let (_, events) = capture(|| {
        table.add_endpoint(&key(), endpoint("ig-1", "1.1.1.1", 11, true));
    });

    assert_eq!(table.address_collisions(), 0);
    assert!(events.with_message("collision detected with endpoint").is_empty());
}

#[test]
fn unfresh_swaps_keep_addresses_for_collision_detection() {
    let table = table_with(&["h1"], &[e1()]);

    table.swap(empty_snapshot(), Some(&DomainSet::new()));
    table.swap(empty_snapshot(), Some(&DomainSet::new()));

    let (_, events) = capture(|| {
        table.add_endpoint(&key(), endpoint("ig-2", "1.1.1.1", 11, false));
    });

    assert_eq!(table.address_collisions(), 1);
    assert_eq!(events.with_message("collision detected with endpoint").len(), 1);
}

#[test]
fn removed_endpoint_frees_its_address() {
    let table = table_with(&["h1"], &[e1()]);
    table.remove_endpoint(&key(), &e1());

    table.add_endpoint(&key(), endpoint("ig-2", "1.1.1.1", 11, false));

    assert_eq!(table.address_collisions(), 0);
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn older_tags_never_change_routes(current in 1u32..100, older in 0u32..100) {
        prop_assume!(older < current);

        let table = RoutingTable::new();
        table.set_routes(&key(), routes(&["h1", "h2"]), Some(tag(current)));
        table.add_endpoint(&key(), e1());
        let before = table.entry(&key());

        let messages = table.set_routes(&key(), routes(&["h3"]), Some(tag(older)));

        prop_assert!(messages.is_empty());
        prop_assert_eq!(table.entry(&key()), before);
    }

    #[test]
    fn full_reemission_matches_route_and_endpoint_counts(
        hostnames in proptest::collection::btree_set("[a-z]{1,8}", 0..5),
        instances in 0usize..4,
    ) {
        let table = RoutingTable::new();
        let hostnames: Vec<&str> = hostnames.iter().map(String::as_str).collect();
        table.set_routes(&key(), routes(&hostnames), None);
        for i in 0..instances {
            table.add_endpoint(
                &key(),
                endpoint(&format!("ig-{i}"), "1.1.1.1", 1000 + i as u32, false),
            );
        }

        let messages = table.messages_to_emit();

        prop_assert_eq!(
            messages.route_registration_count(),
            (hostnames.len() * instances) as u64
        );
        prop_assert!(messages.unregistration_messages.is_empty());
    }
}
