//! Protocol histogram and time-bucketed packet volume.

use crate::pipeline::config::Resolution;
use crate::pipeline::types::Timestamp;
use std::collections::HashMap;

/// Packets per protocol label. Labels are taken verbatim from the decoder.
#[derive(Debug, Default, Clone)]
pub struct ProtocolHistogram {
    counts: HashMap<String, u64>,
}

impl ProtocolHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tally(&mut self, protocol: &str) {
        match self.counts.get_mut(protocol) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(protocol.to_string(), 1);
            }
        }
    }

    pub fn counts(&self) -> &HashMap<String, u64> {
        &self.counts
    }

    pub fn merge(&mut self, other: ProtocolHistogram) {
        for (label, count) in other.counts {
            *self.counts.entry(label).or_insert(0) += count;
        }
    }
}

/// Packets per fixed-width time bucket.
///
/// Buckets exist only for intervals that saw traffic, so a capture with a
/// long silent gap costs nothing for the gap.
#[derive(Debug, Clone)]
pub struct Timeline {
    resolution: Resolution,
    buckets:    HashMap<i64, u64>,
}

impl Timeline {
    pub fn new(resolution: Resolution) -> Self {
        Self { resolution, buckets: HashMap::new() }
    }

    pub fn bucket(&mut self, ts: Timestamp) {
        let start = ts.floor_to(self.resolution.width_secs());
        *self.buckets.entry(start).or_insert(0) += 1;
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Observed buckets as `(start_epoch_secs, packets)`, oldest first.
    pub fn sorted(&self) -> Vec<(i64, u64)> {
        let mut rows: Vec<(i64, u64)> = self.buckets.iter().map(|(k, v)| (*k, *v)).collect();
        rows.sort_unstable_by_key(|(start, _)| *start);
        rows
    }

    pub fn merge(&mut self, other: Timeline) {
        for (start, count) in other.buckets {
            *self.buckets.entry(start).or_insert(0) += count;
        }
    }
}
