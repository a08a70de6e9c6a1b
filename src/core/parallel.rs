/*!
# Parallel Fan-Out Helper

The two embarrassingly-parallel phases of the engine (degenerate-pair
detection and edge enumeration) both follow the same scheduling model: split
the node range into contiguous slices, let each worker emit a local result
list, and concatenate the lists on the master in slice order. This module
provides that fan-out on top of Rayon.

Workers never share mutable state; all mutation happens on the master after
the join barrier.
*/

use std::ops::Range;

use rayon::prelude::*;

/// Runs `f` over contiguous sub-ranges of `0..len` on the Rayon pool and
/// concatenates the per-range results in range order.
///
/// The range is split into one slice per available thread. Result order is
/// therefore deterministic for a fixed pool size, which keeps downstream
/// tiebreaks reproducible.
pub fn fan_out<T, F>(len: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(Range<usize>) -> Vec<T> + Sync,
{
    if len == 0 {
        return Vec::new();
    }
    let workers = rayon::current_num_threads().max(1);
    let chunk = len.div_ceil(workers);
    let ranges: Vec<Range<usize>> = (0..len)
        .step_by(chunk)
        .map(|start| start..(start + chunk).min(len))
        .collect();
    ranges
        .into_par_iter()
        .map(&f)
        .collect::<Vec<Vec<T>>>()
        .into_iter()
        .flatten()
        .collect()
}
