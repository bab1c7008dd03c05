use chrono::{DateTime, Local};
use graphview::Snapshot;
use tracing::{debug, info};

/// Running counters over the stream, for the operator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamStats {
    pub messages: u64,
    /// Networks in the last snapshot.
    pub networks: usize,
    /// `total_clients` of the last snapshot.
    pub clients: u64,
    /// Viewers attached to the server, from the last status message.
    pub connected_clients: u64,
    pub total_traffic: u64,
    pub connects: u64,
    pub last_update: Option<DateTime<Local>>,
}

impl StreamStats {
    pub fn record_snapshot(&mut self, snapshot: &Snapshot, at: DateTime<Local>) {
        self.messages += 1;
        self.networks = snapshot.aps.len();
        self.clients = snapshot.total_clients;
        self.total_traffic = snapshot.total_traffic;
        self.last_update = Some(at);
        debug!(
            messages = self.messages,
            networks = self.networks,
            clients = self.clients,
            traffic = self.total_traffic,
            at = %at.format("%H:%M:%S"),
            "snapshot"
        );
    }

    pub fn record_status(&mut self, connected_clients: u64) {
        self.connected_clients = connected_clients;
    }

    pub fn record_connect(&mut self) {
        self.connects += 1;
    }

    pub fn log_summary(&self) {
        let last = self
            .last_update
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        info!(
            messages = self.messages,
            networks = self.networks,
            clients = self.clients,
            connected_clients = self.connected_clients,
            traffic = self.total_traffic,
            connects = self.connects,
            last_update = %last,
            "stream summary"
        );
    }
}
