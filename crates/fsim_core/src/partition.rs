//! Work partitioning of global trial indices across distributed workers.

use std::ops::Range;

/// Returns the half-open range of trial indices owned by `rank`.
///
/// `n_tasks` items are split as evenly as possible over `world_size`
/// workers. The `n_tasks % world_size` highest-ranked workers receive one
/// extra item, so the ranges of ranks `0..world_size` tile `0..n_tasks` in
/// order with sizes differing by at most one.
///
/// # Panics
///
/// Panics if `world_size` is zero.
///
/// # Arguments
///
/// * `rank` - Worker rank, below `world_size`
/// * `world_size` - Number of workers
/// * `n_tasks` - Total number of items
pub fn work_range(rank: usize, world_size: usize, n_tasks: usize) -> Range<usize> {
    assert!(world_size > 0, "work_range needs at least one worker");
    let base = n_tasks / world_size;
    let diff = n_tasks % world_size;
    let first_long = world_size - diff;

    let start = rank * base + rank.saturating_sub(first_long);
    let len = if rank >= first_long { base + 1 } else { base };
    start..start + len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_over_three() {
        let ranges: Vec<_> = (0..3).map(|r| work_range(r, 3, 10)).collect();
        assert_eq!(ranges, vec![0..3, 3..6, 6..10]);
    }

    #[test]
    fn ranges_tile_exactly() {
        for world_size in 1..=9 {
            for n_tasks in 0..=40 {
                let mut next = 0;
                let mut sizes = Vec::new();
                for rank in 0..world_size {
                    let range = work_range(rank, world_size, n_tasks);
                    assert_eq!(range.start, next, "gap or overlap at rank {rank}");
                    next = range.end;
                    sizes.push(range.len());
                }
                assert_eq!(next, n_tasks);
                assert_eq!(sizes.iter().sum::<usize>(), n_tasks);
                let (min, max) = (sizes.iter().min().unwrap(), sizes.iter().max().unwrap());
                assert!(max - min <= 1);
                // extra items go to the highest ranks
                assert!(sizes.windows(2).all(|w| w[0] <= w[1]));
            }
        }
    }

    #[test]
    fn more_workers_than_tasks() {
        let ranges: Vec<_> = (0..4).map(|r| work_range(r, 4, 2)).collect();
        assert_eq!(ranges, vec![0..0, 0..0, 0..1, 1..2]);
    }
}
