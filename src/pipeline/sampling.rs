//! Stream filters applied before aggregation.
//!
//! Sampling and limiting thin the input; the aggregates never see the
//! packets that were skipped and need no knowledge of the policy.

use crate::pipeline::config::RunConfig;
use std::sync::atomic::{AtomicBool, Ordering};

/// Keeps items at positions 0, `stride`, 2×`stride`, ... and stops once
/// `limit` of the kept items decoded successfully.
///
/// Decode failures still pass through so they are counted, but they never
/// use up the limit.
pub fn select<I, T, E>(source: I, stride: u64, limit: Option<u64>) -> impl Iterator<Item = Result<T, E>>
where
    I: Iterator<Item = Result<T, E>>,
{
    let stride = usize::try_from(stride.max(1)).unwrap_or(usize::MAX);
    let mut remaining = limit.unwrap_or(u64::MAX);
    source.step_by(stride).take_while(move |item| {
        if remaining == 0 {
            return false;
        }
        if item.is_ok() {
            remaining -= 1;
        }
        true
    })
}

/// [`select`] driven by a run configuration.
pub fn select_for<I, T, E>(source: I, cfg: &RunConfig) -> impl Iterator<Item = Result<T, E>>
where
    I: Iterator<Item = Result<T, E>>,
{
    select(source, cfg.stride, cfg.limit)
}

/// Ends the stream at the first item read after `shutdown` is raised.
pub fn until_shutdown<'a, I>(source: I, shutdown: &'a AtomicBool) -> impl Iterator<Item = I::Item> + 'a
where
    I: Iterator + 'a,
{
    source.take_while(move |_| !shutdown.load(Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(range: std::ops::Range<u32>) -> impl Iterator<Item = Result<u32, ()>> {
        range.map(Ok)
    }

    #[test]
    fn test_stride_one_keeps_everything() {
        let kept: Vec<_> = select(ok(0..10), 1, None).collect();
        assert_eq!(kept, ok(0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_stride_keeps_multiples() {
        let kept: Vec<_> = select(ok(0..10), 3, None).collect();
        assert_eq!(kept, vec![Ok(0), Ok(3), Ok(6), Ok(9)]);
    }

    #[test]
    fn test_limit_caps_kept_items() {
        assert_eq!(select(ok(0..10), 1, Some(4)).count(), 4);
        assert_eq!(select(ok(0..3), 1, Some(40)).count(), 3);
        let kept: Vec<_> = select(ok(0..100), 10, Some(2)).collect();
        assert_eq!(kept, vec![Ok(0), Ok(10)]);
    }

    #[test]
    fn test_decode_failures_do_not_count_toward_limit() {
        let input: Vec<Result<u32, ()>> = vec![Ok(0), Err(()), Ok(1), Ok(2), Err(()), Ok(3)];
        let kept: Vec<_> = select(input.into_iter(), 1, Some(3)).collect();
        assert_eq!(kept, vec![Ok(0), Err(()), Ok(1), Ok(2)]);
    }

    #[test]
    fn test_shutdown_stops_stream() {
        let flag = AtomicBool::new(false);
        let mut it = until_shutdown(0..10u32, &flag);
        assert_eq!(it.next(), Some(0));
        flag.store(true, Ordering::Relaxed);
        assert_eq!(it.next(), None);
    }
}
