use std::collections::{HashMap, HashSet};
use std::f64::consts::TAU;
use std::hash::{DefaultHasher, Hash, Hasher};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use swanradar_layout::{Canvas, LayoutError, Position, check_range};

use crate::edge::GraphLink;
use crate::node::{GraphNode, NodeKind, PinState, Tier};
use crate::snapshot::{AccessPoint, ClientDevice, Snapshot};

/// Where newly seen entities are first placed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Closest a new client is placed to its access point.
    pub client_distance_min: f64,
    pub client_distance_max: f64,
    /// Bound on the angular jitter of a new access point, in radians.
    pub angle_jitter: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            client_distance_min: 60.0,
            client_distance_max: 100.0,
            angle_jitter: 0.25,
        }
    }
}

impl PlacementConfig {
    /// Placement draws from these ranges, so they must be finite and ordered.
    pub fn validate(&self) -> Result<(), LayoutError> {
        check_range(
            "client_distance_min",
            self.client_distance_min,
            0.0,
            f64::INFINITY,
        )?;
        check_range(
            "client_distance_max",
            self.client_distance_max,
            self.client_distance_min,
            f64::INFINITY,
        )?;
        check_range("angle_jitter", self.angle_jitter, 0.0, TAU)
    }
}

/// Counters describing what a reconciliation changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    /// Entries skipped because their id was already taken in the same snapshot.
    pub duplicates: usize,
    /// Links dropped because an endpoint was missing.
    pub dropped_links: usize,
    pub links_removed: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
    pub stats: ReconcileStats,
}

/// Merges snapshots into a node/link set.
#[derive(Debug, Clone, Default)]
pub struct GraphModel {
    pub canvas: Canvas,
    pub placement: PlacementConfig,
}

impl GraphModel {
    pub fn new(canvas: Canvas, placement: PlacementConfig) -> Self {
        Self { canvas, placement }
    }

    /// Build the node and link set for `snapshot`, keeping identity, position
    /// and pin state of every entity already present in `prev_nodes`.
    ///
    /// Nodes come out grouped: each access point followed by its clients.
    /// Entities missing from the snapshot are dropped. The function has no
    /// side effects; new entities get a jitter seeded from their id.
    pub fn reconcile(
        &self,
        prev_nodes: &[GraphNode],
        prev_links: &[GraphLink],
        snapshot: &Snapshot,
    ) -> Reconciled {
        let previous: HashMap<&str, &GraphNode> =
            prev_nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let mut stats = ReconcileStats::default();

        // Access points claim their ids before any client does.
        let mut taken: HashSet<&str> = HashSet::new();
        let mut aps: Vec<&AccessPoint> = Vec::with_capacity(snapshot.aps.len());
        for ap in &snapshot.aps {
            if taken.insert(ap.bssid.as_str()) {
                aps.push(ap);
            } else {
                stats.duplicates += 1;
            }
        }
        let mut clients: Vec<Vec<&ClientDevice>> = Vec::with_capacity(aps.len());
        for ap in &aps {
            let mut own = Vec::with_capacity(ap.clients.len());
            for client in &ap.clients {
                if taken.insert(client.mac.as_str()) {
                    own.push(client);
                } else {
                    stats.duplicates += 1;
                }
            }
            clients.push(own);
        }

        let mut tier_count: HashMap<Tier, usize> = HashMap::new();
        for ap in &aps {
            *tier_count.entry(Tier::from_power(ap.power)).or_default() += 1;
        }

        let center = self.canvas.center();
        let mut tier_index: HashMap<Tier, usize> = HashMap::new();
        let mut nodes = Vec::with_capacity(taken.len());
        let mut links = Vec::new();

        for (ap, own) in aps.iter().zip(&clients) {
            let tier = Tier::from_power(ap.power);
            let index = tier_index.entry(tier).or_default();
            let index_in_tier = *index;
            *index += 1;

            let mut node = match previous.get(ap.bssid.as_str()) {
                Some(prev) => {
                    stats.updated += 1;
                    (*prev).clone()
                }
                None => {
                    stats.created += 1;
                    let count = tier_count.get(&tier).copied().unwrap_or(1).max(1);
                    let mut rng = seeded(&ap.bssid);
                    let jitter = self.placement.angle_jitter;
                    let angle = index_in_tier as f64 / count as f64 * TAU
                        + rng.random_range(-jitter..=jitter);
                    let pos = center.offset_polar(angle, self.canvas.band_radius(tier.band()));
                    blank(&ap.bssid, NodeKind::AccessPoint, pos)
                }
            };
            node.kind = NodeKind::AccessPoint;
            node.label = ap_label(ap);
            node.power = ap.power;
            node.tier = tier;
            node.parent_id = None;
            node.channel = ap.channel.clone();
            node.privacy = ap.privacy.clone();
            node.data_frames = ap.data_frames;
            node.client_count = own.len();
            let anchor = node.position();
            nodes.push(node);

            for (i, client) in own.iter().enumerate() {
                let mut node = match previous.get(client.mac.as_str()) {
                    Some(prev) => {
                        stats.updated += 1;
                        (*prev).clone()
                    }
                    None => {
                        stats.created += 1;
                        let angle = i as f64 / own.len() as f64 * TAU;
                        let distance = self.client_distance(&mut seeded(&client.mac));
                        blank(&client.mac, NodeKind::Client, anchor.offset_polar(angle, distance))
                    }
                };
                node.kind = NodeKind::Client;
                node.label = client.mac.clone();
                node.power = client.power;
                node.tier = Tier::from_power(client.power);
                node.parent_id = Some(ap.bssid.clone());
                node.channel = None;
                node.privacy = None;
                node.data_frames = 0;
                node.client_count = 0;
                nodes.push(node);
                links.push(GraphLink::new(ap.bssid.clone(), client.mac.clone()));
            }
        }

        let live: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let before = links.len();
        links.retain(|l| {
            live.contains(l.source_id.as_str()) && live.contains(l.target_id.as_str())
        });
        stats.dropped_links = before - links.len();
        stats.removed = prev_nodes
            .iter()
            .filter(|n| !live.contains(n.id.as_str()))
            .count();
        let kept: HashSet<&GraphLink> = links.iter().collect();
        stats.links_removed = prev_links.iter().filter(|l| !kept.contains(l)).count();

        Reconciled {
            nodes,
            links,
            stats,
        }
    }

    fn client_distance(&self, rng: &mut StdRng) -> f64 {
        let placement = &self.placement;
        rng.random_range(placement.client_distance_min..=placement.client_distance_max)
    }
}

/// Index pairs for `links` against `nodes`; links with a missing endpoint are skipped.
pub fn link_indices(nodes: &[GraphNode], links: &[GraphLink]) -> Vec<(usize, usize)> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();
    links
        .iter()
        .filter_map(|l| {
            let source = *index.get(l.source_id.as_str())?;
            let target = *index.get(l.target_id.as_str())?;
            Some((source, target))
        })
        .collect()
}

fn ap_label(ap: &AccessPoint) -> String {
    match ap.essid.as_deref().map(str::trim) {
        Some(essid) if !essid.is_empty() => essid.to_string(),
        _ => ap.bssid.clone(),
    }
}

fn seeded(id: &str) -> StdRng {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    StdRng::seed_from_u64(hasher.finish())
}

fn blank(id: &str, kind: NodeKind, pos: Position) -> GraphNode {
    GraphNode {
        id: id.to_string(),
        kind,
        label: id.to_string(),
        power: None,
        tier: Tier::Three,
        parent_id: None,
        channel: None,
        privacy: None,
        data_frames: 0,
        client_count: 0,
        x: pos.x,
        y: pos.y,
        pin: PinState::Floating,
    }
}
