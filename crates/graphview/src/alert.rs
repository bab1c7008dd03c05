use std::collections::HashMap;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::snapshot::AlertKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertConfig {
    /// Time spent in each of the two visual states.
    pub half_period: Duration,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            half_period: Duration::from_millis(500),
        }
    }
}

struct BlinkTask {
    kind: AlertKind,
    phase: watch::Receiver<bool>,
    handle: Option<JoinHandle<()>>,
}

impl BlinkTask {
    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Blinks flagged nodes, one cancellable task per node id.
///
/// Each task toggles a `watch` cell every half period; renderers read the
/// cell through [`AlertAnimator::is_highlighted`] and never wait on it.
pub struct AlertAnimator {
    config: AlertConfig,
    tasks: HashMap<String, BlinkTask>,
}

impl AlertAnimator {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            config,
            tasks: HashMap::new(),
        }
    }

    /// Make the running cycles match `flagged`: start new ones, stop the rest.
    /// Returns how many cycles were started and stopped.
    pub fn sync(&mut self, flagged: &HashMap<String, AlertKind>) -> (usize, usize) {
        let mut stopped = 0;
        self.tasks.retain(|id, task| {
            if flagged.contains_key(id) {
                return true;
            }
            task.cancel();
            stopped += 1;
            debug!(id = %id, "alert cycle stopped");
            false
        });

        let mut started = 0;
        for (id, kind) in flagged {
            match self.tasks.get_mut(id) {
                Some(task) => task.kind = kind.clone(),
                None => {
                    let task = self.spawn(id, kind.clone());
                    self.tasks.insert(id.clone(), task);
                    started += 1;
                }
            }
        }
        (started, stopped)
    }

    fn spawn(&self, id: &str, kind: AlertKind) -> BlinkTask {
        let (tx, phase) = watch::channel(true);
        let half = self.config.half_period.max(Duration::from_millis(1));
        let handle = match Handle::try_current() {
            Ok(runtime) => {
                let start = Instant::now() + half;
                Some(runtime.spawn(async move {
                    let mut interval = tokio::time::interval_at(start, half);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        interval.tick().await;
                        if tx.is_closed() {
                            break;
                        }
                        tx.send_modify(|on| *on = !*on);
                    }
                }))
            }
            Err(_) => {
                warn!(id = %id, "no async runtime; alert shown without blinking");
                None
            }
        };
        debug!(id = %id, kind = ?kind, half_ms = half.as_millis() as u64, "alert cycle started");
        BlinkTask {
            kind,
            phase,
            handle,
        }
    }

    /// Whether `id` is flagged and currently in its alert visual state.
    pub fn is_highlighted(&self, id: &str) -> bool {
        self.tasks
            .get(id)
            .map(|t| *t.phase.borrow())
            .unwrap_or(false)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn alert_kind(&self, id: &str) -> Option<&AlertKind> {
        self.tasks.get(id).map(|t| &t.kind)
    }

    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn cancel_all(&mut self) {
        for task in self.tasks.values_mut() {
            task.cancel();
        }
        if !self.tasks.is_empty() {
            debug!(count = self.tasks.len(), "all alert cycles stopped");
        }
        self.tasks.clear();
    }
}

impl Drop for AlertAnimator {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flagged(ids: &[&str]) -> HashMap<String, AlertKind> {
        ids.iter()
            .map(|id| (id.to_string(), AlertKind::HighTraffic))
            .collect()
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_toggles_each_half_period() {
        let mut animator = AlertAnimator::new(AlertConfig::default());
        assert_eq!(animator.sync(&flagged(&["AA"])), (1, 0));
        assert!(animator.is_highlighted("AA"));

        sleep_ms(250).await;
        assert!(animator.is_highlighted("AA"));
        sleep_ms(500).await;
        assert!(!animator.is_highlighted("AA"));
        sleep_ms(500).await;
        assert!(animator.is_highlighted("AA"));

        assert_eq!(animator.sync(&flagged(&[])), (0, 1));
        assert!(!animator.is_active("AA"));
        assert!(!animator.is_highlighted("AA"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_cycles() {
        let mut animator = AlertAnimator::new(AlertConfig::default());
        animator.sync(&flagged(&["AA"]));
        sleep_ms(250).await;
        animator.sync(&flagged(&["AA", "BB"]));

        // AA flipped at 500, BB flips at 750.
        sleep_ms(350).await;
        assert!(!animator.is_highlighted("AA"));
        assert!(animator.is_highlighted("BB"));
        sleep_ms(200).await;
        assert!(!animator.is_highlighted("AA"));
        assert!(!animator.is_highlighted("BB"));
        assert_eq!(animator.active_count(), 2);

        animator.cancel_all();
        assert_eq!(animator.active_count(), 0);
    }

    #[test]
    fn test_steady_highlight_without_runtime() {
        let mut animator = AlertAnimator::new(AlertConfig::default());
        animator.sync(&flagged(&["AA"]));
        assert!(animator.is_highlighted("AA"));
        assert_eq!(animator.alert_kind("AA"), Some(&AlertKind::HighTraffic));
    }
}
