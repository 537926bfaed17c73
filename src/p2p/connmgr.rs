//! Watermark-based connection pruning.
//!
//! Tracks when each connection opened. Once the count goes above high
//! water, the oldest connections that have outlived the grace period are
//! selected for closing until the count is back at low water.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::config::ConnLimits;

#[derive(Debug)]
pub struct ConnManager<K> {
    low_water: usize,
    high_water: usize,
    grace_period: Duration,
    open: HashMap<K, Instant>,
}

impl<K: Eq + Hash + Clone> ConnManager<K> {
    pub fn new(limits: ConnLimits) -> Self {
        Self {
            low_water: limits.low_water,
            high_water: limits.high_water,
            grace_period: limits.grace_period,
            open: HashMap::new(),
        }
    }

    pub fn opened(&mut self, key: K, at: Instant) {
        self.open.insert(key, at);
    }

    pub fn closed(&mut self, key: &K) {
        self.open.remove(key);
    }

    pub(crate) fn len(&self) -> usize {
        self.open.len()
    }

    /// Pick connections to close and stop tracking them.
    ///
    /// Returns an empty list while at or below high water. Connections
    /// younger than the grace period are never selected, so the result
    /// may leave the count above low water.
    pub fn prune(&mut self, now: Instant) -> Vec<K> {
        if self.open.len() <= self.high_water {
            return Vec::new();
        }
        let excess = self.open.len() - self.low_water;

        let mut eligible: Vec<(K, Instant)> = self
            .open
            .iter()
            .filter(|(_, opened)| now.saturating_duration_since(**opened) >= self.grace_period)
            .map(|(key, opened)| (key.clone(), *opened))
            .collect();
        eligible.sort_by_key(|(_, opened)| *opened);

        let victims: Vec<K> = eligible.into_iter().take(excess).map(|(key, _)| key).collect();
        for key in &victims {
            self.open.remove(key);
        }
        victims
    }
}
