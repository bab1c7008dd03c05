use std::f64::consts::{PI, TAU};

use graphview::*;
use swanradar_layout::Canvas;

fn client(mac: &str, power: i32) -> ClientDevice {
    ClientDevice {
        mac: mac.to_string(),
        power: Some(power),
    }
}

fn ap(bssid: &str, power: i32, clients: Vec<ClientDevice>) -> AccessPoint {
    AccessPoint {
        power: Some(power),
        clients,
        ..AccessPoint::new(bssid)
    }
}

fn snapshot(aps: Vec<AccessPoint>) -> Snapshot {
    Snapshot {
        aps,
        ..Default::default()
    }
}

#[test]
fn test_single_ap_with_client() {
    let json = r#"{"aps":[{"bssid":"AA","essid":"Net1","power":-40,
        "clients":[{"mac":"C1","power":-55}]}],"alerts":[]}"#;
    let snapshot: Snapshot = serde_json::from_str(json).unwrap();
    let out = GraphModel::default().reconcile(&[], &[], &snapshot);

    assert_eq!(out.nodes.len(), 2);
    let aa = &out.nodes[0];
    assert_eq!(aa.id, "AA");
    assert_eq!(aa.kind, NodeKind::AccessPoint);
    assert_eq!(aa.tier, Tier::One);
    assert_eq!(aa.label, "Net1");
    assert_eq!(aa.client_count, 1);
    let c1 = &out.nodes[1];
    assert_eq!(c1.id, "C1");
    assert_eq!(c1.kind, NodeKind::Client);
    assert_eq!(c1.parent_id.as_deref(), Some("AA"));
    assert_eq!(c1.tier, Tier::Two);
    assert_eq!(out.links, vec![GraphLink::new("AA", "C1")]);
    assert_eq!(out.stats.created, 2);
}

#[test]
fn test_absent_entities_are_pruned() {
    let model = GraphModel::default();
    let first = model.reconcile(
        &[],
        &[],
        &snapshot(vec![
            ap("AA", -40, vec![client("C1", -50), client("C2", -60)]),
            ap("BB", -75, vec![client("C3", -80)]),
        ]),
    );
    let second = model.reconcile(
        &first.nodes,
        &first.links,
        &snapshot(vec![ap("AA", -40, vec![client("C2", -60)])]),
    );

    let ids: Vec<&str> = second.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["AA", "C2"]);
    assert_eq!(second.links, vec![GraphLink::new("AA", "C2")]);
    assert_eq!(second.stats.removed, 3);
    assert_eq!(second.stats.links_removed, 2);
    for link in &second.links {
        assert!(ids.contains(&link.source_id.as_str()));
        assert!(ids.contains(&link.target_id.as_str()));
    }
}

#[test]
fn test_initial_placement_follows_tier_ring() {
    let canvas = Canvas::default();
    let model = GraphModel::new(canvas, PlacementConfig::default());
    let aps = (0..4).map(|i| ap(&format!("AP{i}"), -40, vec![])).collect();
    let out = model.reconcile(&[], &[], &snapshot(aps));

    let center = canvas.center();
    for (i, node) in out.nodes.iter().enumerate() {
        let radius = node.position().distance(&center);
        assert!((radius - canvas.band_radius(0)).abs() < 1e-6);

        let angle = (node.y - center.y).atan2(node.x - center.x);
        let expected = TAU * i as f64 / 4.0;
        let mut diff = (angle - expected).rem_euclid(TAU);
        if diff > PI {
            diff -= TAU;
        }
        assert!(diff.abs() <= 0.25 + 1e-9, "AP{i} off by {diff}");
    }
}

#[test]
fn test_placement_is_deterministic() {
    let model = GraphModel::default();
    let snap = snapshot(vec![ap("AA", -60, vec![client("C1", -60)])]);
    let a = model.reconcile(&[], &[], &snap);
    let b = model.reconcile(&[], &[], &snap);
    assert_eq!(a.nodes, b.nodes);
}

#[test]
fn test_retained_nodes_keep_position_and_pin() {
    let model = GraphModel::default();
    let first = model.reconcile(&[], &[], &snapshot(vec![ap("AA", -40, vec![client("C1", -50)])]));

    let mut nodes = first.nodes.clone();
    nodes[0].x = 12.5;
    nodes[0].y = 99.0;
    nodes[0].pin = PinState::Pinned {
        fixed: nodes[0].position(),
    };

    // Signal drops into the outer band; position and pin stay put.
    let second = model.reconcile(
        &nodes,
        &first.links,
        &snapshot(vec![ap("AA", -85, vec![client("C1", -50)])]),
    );
    let aa = &second.nodes[0];
    assert_eq!(aa.tier, Tier::Three);
    assert_eq!((aa.x, aa.y), (12.5, 99.0));
    assert_eq!(aa.pin, nodes[0].pin);
    assert_eq!(second.nodes[1].position(), first.nodes[1].position());
    assert_eq!(second.stats.updated, 2);
    assert_eq!(second.stats.created, 0);
}

#[test]
fn test_missing_power_is_weak() {
    let mut a = AccessPoint::new("AA");
    a.clients.push(ClientDevice {
        mac: "C1".into(),
        power: None,
    });
    let out = GraphModel::default().reconcile(&[], &[], &snapshot(vec![a]));
    assert!(out.nodes.iter().all(|n| n.tier == Tier::Three));
    assert_eq!(out.nodes[0].signal_quality(), SignalQuality::Weak);
}

#[test]
fn test_client_moves_between_access_points() {
    let model = GraphModel::default();
    let first = model.reconcile(
        &[],
        &[],
        &snapshot(vec![
            ap("AA", -40, vec![client("C1", -50)]),
            ap("BB", -60, vec![]),
        ]),
    );
    let second = model.reconcile(
        &first.nodes,
        &first.links,
        &snapshot(vec![
            ap("AA", -40, vec![]),
            ap("BB", -60, vec![client("C1", -50)]),
        ]),
    );
    let c1 = second.nodes.iter().find(|n| n.id == "C1").unwrap();
    assert_eq!(c1.parent_id.as_deref(), Some("BB"));
    assert_eq!(second.links, vec![GraphLink::new("BB", "C1")]);
    assert_eq!(second.stats.links_removed, 1);
}
