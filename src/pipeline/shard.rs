//! Sharded aggregation.
//!
//! The selected stream is cut into contiguous chunks, each chunk is
//! aggregated by its own pipeline on a scoped thread with no shared state,
//! and the partial pipelines are merged in chunk order on the calling thread.

use crate::error::DecodeError;
use crate::pipeline::config::RunConfig;
use crate::pipeline::types::PacketSummary;
use crate::pipeline::vendor::VendorTable;
use crate::pipeline::Pipeline;
use std::thread;

type Item = Result<PacketSummary, DecodeError>;

/// Aggregates `items` across `cfg.workers` threads and returns the merged
/// pipeline. The result is identical to a single ordered pass.
pub fn run_sharded<'v>(items: Vec<Item>, cfg: &RunConfig, vendors: &'v VendorTable) -> Pipeline<'v> {
    let shards = split(items, cfg.workers);

    let mut partials: Vec<Pipeline<'v>> = thread::scope(|scope| {
        let handles: Vec<_> = shards
            .into_iter()
            .map(|shard| {
                let cfg = cfg.clone();
                scope.spawn(move || Pipeline::new(cfg, vendors).run(shard))
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect::<Vec<_>>()
    })
    .into_iter()
    .rev()
    .collect();

    // Partials were reversed so `pop` yields them in stream order.
    let mut merged = partials.pop().unwrap_or_else(|| Pipeline::new(cfg.clone(), vendors));
    while let Some(next) = partials.pop() {
        merged.merge(next);
    }
    merged
}

/// Splits `items` into at most `workers` contiguous, non-empty chunks.
fn split(mut items: Vec<Item>, workers: usize) -> Vec<Vec<Item>> {
    let workers = workers.max(1);
    let chunk = ((items.len() + workers - 1) / workers).max(1);
    let mut shards = Vec::with_capacity(workers);
    while items.len() > chunk {
        let tail = items.split_off(chunk);
        shards.push(items);
        items = tail;
    }
    if !items.is_empty() {
        shards.push(items);
    }
    shards
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::mixed;

    #[test]
    fn test_split_is_contiguous() {
        let shards = split(mixed(), 3);
        assert_eq!(shards.iter().map(Vec::len).collect::<Vec<_>>(), vec![3, 3, 2]);
        assert_eq!(shards.concat(), mixed());
        assert!(split(Vec::<Item>::new(), 4).is_empty());
    }

    #[test]
    fn test_sharded_run_matches_single_pass() {
        let vendors = VendorTable::empty();
        let single = Pipeline::new(RunConfig::default(), &vendors).run(mixed());
        for workers in 1..=5 {
            let cfg = RunConfig { workers, ..RunConfig::default() };
            let sharded = run_sharded(mixed(), &cfg, &vendors);
            assert_eq!(sharded.report(), single.report(), "workers = {}", workers);
        }
    }

    #[test]
    fn test_sharded_empty_input() {
        let vendors = VendorTable::empty();
        let cfg = RunConfig { workers: 4, ..RunConfig::default() };
        let p = run_sharded(Vec::<Item>::new(), &cfg, &vendors);
        assert_eq!(p.packets(), 0);
        assert!(p.span().is_none());
    }
}
