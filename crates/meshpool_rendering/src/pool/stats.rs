//! Pool statistics and capacity-pressure warnings.

use crate::config::PoolConfig;
use meshpool_core::ArenaUsage;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Snapshot of the pool returned by
/// [`GeometryPool::capacity_report`](crate::GeometryPool::capacity_report).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PoolStats {
    /// Geometries queued and not yet removed.
    pub live_instances: u64,
    /// Upload entries flushed to the buffers.
    pub entries_flushed: u64,
    /// Upload batches flushed.
    pub batches_flushed: u64,
    /// Removal passes completed.
    pub removal_passes: u64,
    /// Removal entries applied.
    pub blocks_reclaimed: u64,
    /// Upload entries waiting for the next flush.
    pub pending_uploads: usize,
    /// Removal entries waiting for the next pass.
    pub pending_removals: usize,
    /// Vertex arena usage.
    pub vertex: ArenaUsage,
    /// Index arena usage.
    pub index: ArenaUsage,
}

/// Monotonic counters bumped by the worker.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub(crate) entries_flushed: AtomicU64,
    pub(crate) batches_flushed: AtomicU64,
    pub(crate) removal_passes: AtomicU64,
    pub(crate) blocks_reclaimed: AtomicU64,
}

/// Logs a warning once per threshold crossing; re-arms when usage drops back.
#[derive(Debug, Default)]
pub(crate) struct PressureMonitor {
    vertex_warned: AtomicBool,
    index_warned: AtomicBool,
    instances_warned: AtomicBool,
}

impl PressureMonitor {
    pub(crate) fn check(
        &self,
        config: &PoolConfig,
        vertex: &ArenaUsage,
        index: &ArenaUsage,
        live_instances: u64,
    ) {
        for (label, usage, warned) in [
            ("vertex", vertex, &self.vertex_warned),
            ("index", index, &self.index_warned),
        ] {
            let ratio = usage.fill_ratio();
            let over = ratio >= config.fill_warning_ratio;
            if over && !warned.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    buffer = label,
                    used_bytes = usage.used_bytes,
                    capacity = usage.capacity,
                    largest_free = usage.largest_free,
                    live_instances,
                    "{label} buffer is {:.1}% full",
                    ratio * 100.0
                );
            } else if !over {
                warned.store(false, Ordering::Relaxed);
            }
        }

        let threshold = config.instance_warning_threshold();
        let over = threshold > 0 && live_instances >= threshold;
        if over && !self.instances_warned.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                live_instances,
                threshold,
                vertex_used = vertex.used_bytes,
                vertex_capacity = vertex.capacity,
                index_used = index.used_bytes,
                index_capacity = index.capacity,
                "live instance count is approaching the configured estimate"
            );
        } else if !over {
            self.instances_warned.store(false, Ordering::Relaxed);
        }
    }

    #[cfg(test)]
    fn is_warned(&self) -> (bool, bool, bool) {
        (
            self.vertex_warned.load(Ordering::Relaxed),
            self.index_warned.load(Ordering::Relaxed),
            self.instances_warned.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(used: u64, capacity: u64) -> ArenaUsage {
        ArenaUsage {
            capacity,
            used_bytes: used,
            free_bytes: capacity - used,
            ..ArenaUsage::default()
        }
    }

    #[test]
    fn test_warns_once_and_rearms() {
        let config = PoolConfig {
            instance_estimate: 2,
            lod_levels: 3,
            fill_warning_ratio: 0.5,
            ..PoolConfig::default()
        };
        let monitor = PressureMonitor::default();

        monitor.check(&config, &usage(10, 100), &usage(10, 100), 0);
        assert_eq!(monitor.is_warned(), (false, false, false));

        monitor.check(&config, &usage(60, 100), &usage(10, 100), 3);
        assert_eq!(monitor.is_warned(), (true, false, true));

        monitor.check(&config, &usage(20, 100), &usage(10, 100), 1);
        assert_eq!(monitor.is_warned(), (false, false, false));
    }
}
