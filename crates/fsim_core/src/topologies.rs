//! Topology generators: the regular square grid and the grid with a slit.
//!
//! Both generators lay nodes out row-major with spacing
//! [`GRID_SPACING`](fsim_common::defaults::GRID_SPACING) and insert, for every
//! node, the link to its right neighbour before the link to its upper
//! neighbour. Edge ids therefore follow a stable scan order.

use crate::TopologyError;
use crate::topology::Topology;
use crate::vec2::Vec2;
use fsim_common::defaults::GRID_SPACING;

fn grid_position(i: usize, side: usize) -> Vec2 {
    let x = i % side;
    let y = i / side;
    Vec2::new(x as f64 * GRID_SPACING, y as f64 * GRID_SPACING)
}

/// Builds an `side` x `side` square grid.
///
/// Node `i` sits at column `i % side`, row `i / side`. Every node is linked
/// to its right and upper neighbours when they exist.
///
/// # Returns
///
/// The grid topology, or an error if `side` is zero.
pub fn square_grid(side: usize) -> Result<Topology, TopologyError> {
    if side == 0 {
        return Err(TopologyError::EmptyGrid);
    }

    let n = side * side;
    let mut edges = Vec::with_capacity(2 * n);
    let mut positions = Vec::with_capacity(n);

    for i in 0..n {
        let x = i % side;
        let y = i / side;
        positions.push(grid_position(i, side));

        if x < side - 1 {
            edges.push((i, i + 1));
        }
        if y < side - 1 {
            edges.push((i, i + side));
        }
    }

    Topology::new(n, edges, positions)
}

/// Side of the diamond a slit node lies on.
///
/// The diamond is the set of nodes at L1 distance `radius` from the grid
/// centre. Its corners get their own sides; the flanks are split into the
/// lower-left/right and upper-left/right runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Bottom,
    LowerLeft,
    LowerRight,
    Left,
    Right,
    UpperLeft,
    UpperRight,
    Top,
}

fn diamond_side(x: usize, y: usize, centre: usize, radius: usize) -> Option<Side> {
    let dx = x as isize - centre as isize;
    let dy = y as isize - centre as isize;
    let r = radius as isize;
    if dx.abs() + dy.abs() != r {
        return None;
    }
    let side = match (dx.signum(), dy.signum()) {
        (0, -1) => Side::Bottom,
        (0, _) => Side::Top,
        (-1, 0) => Side::Left,
        (_, 0) => Side::Right,
        (-1, -1) => Side::LowerLeft,
        (_, -1) => Side::LowerRight,
        (-1, _) => Side::UpperLeft,
        _ => Side::UpperRight,
    };
    Some(side)
}

/// Builds a square grid cut open along a diamond around its centre.
///
/// The `4 * radius` nodes at L1 distance `radius` from the centre node are
/// duplicated. The duplicates are appended after the `side * side` grid
/// nodes, in scan order, and share the position of their original. Links
/// crossing the diamond are re-attached to either the original or the
/// duplicate depending on the side of the diamond, so that the inside and
/// the outside of the slit meet only where the original wiring keeps them
/// together (the left and right corners, where the endpoints sit in the
/// reference experiment).
///
/// # Arguments
///
/// * `side` - Grid side length
/// * `radius` - L1 radius of the diamond, at least one and small enough to
///   fit inside the grid
///
/// # Returns
///
/// The split grid, or an error if the diamond does not fit.
pub fn split_square_grid(side: usize, radius: usize) -> Result<Topology, TopologyError> {
    if side == 0 {
        return Err(TopologyError::EmptyGrid);
    }
    let centre = (side - 1) / 2;
    if radius == 0 || radius > centre {
        return Err(TopologyError::DefectTooLarge { side, radius });
    }

    let n = side * side;
    let side_of = |i: usize| diamond_side(i % side, i / side, centre, radius);

    let mut duplicate = vec![None; n];
    let mut next = n;
    for (i, slot) in duplicate.iter_mut().enumerate() {
        if side_of(i).is_some() {
            *slot = Some(next);
            next += 1;
        }
    }
    debug_assert_eq!(next, n + 4 * radius);

    let mut positions: Vec<Vec2> = (0..n).map(|i| grid_position(i, side)).collect();
    positions.extend((0..n).filter(|&i| duplicate[i].is_some()).map(|i| grid_position(i, side)));

    let dup = |i: usize| duplicate[i].unwrap_or(i);
    let mut edges = Vec::with_capacity(2 * n);

    for i in 0..n {
        let x = i % side;
        let y = i / side;
        let right = (x < side - 1).then_some(i + 1);
        let up = (y < side - 1).then_some(i + side);

        match side_of(i) {
            None => {
                if let Some(j) = right {
                    match side_of(j) {
                        Some(Side::LowerRight | Side::UpperRight) => edges.push((i, dup(j))),
                        _ => edges.push((i, j)),
                    }
                }
                if let Some(j) = up {
                    match side_of(j) {
                        Some(Side::UpperLeft | Side::Top | Side::UpperRight) => {
                            edges.push((i, dup(j)))
                        }
                        _ => edges.push((i, j)),
                    }
                }
            }
            Some(s) => {
                let (right_from_dup, up_from_dup) = match s {
                    Side::Bottom | Side::LowerRight => (false, true),
                    Side::LowerLeft => (true, true),
                    Side::UpperLeft => (true, false),
                    Side::Left | Side::Right | Side::UpperRight | Side::Top => (false, false),
                };
                if let Some(j) = right {
                    edges.push((if right_from_dup { dup(i) } else { i }, j));
                }
                if let Some(j) = up {
                    edges.push((if up_from_dup { dup(i) } else { i }, j));
                }
            }
        }
    }

    Topology::new(next, edges, positions)
}
