use std::sync::OnceLock;

use crate::engine::{Grid, Rank};

static RANK_VALUES: OnceLock<Box<[f64]>> = OnceLock::new();

pub(crate) fn warm() {
    let _ = rank_values();
}

fn rank_values() -> &'static [f64] {
    RANK_VALUES
        .get_or_init(|| (0..=Rank::MAX).map(|rank| 3f64.powi(i32::from(rank))).collect())
        .as_ref()
}

/// Static value of a grid: the sum of `3^rank` over all cells.
///
/// Empty cells count as `3^0 = 1`, so a grid with more room scores higher
/// than the same tiles packed tighter.
///
/// ```
/// use tile_merge::engine::Grid;
/// use tile_merge::expectimax::static_value;
/// let g = Grid::from_rows(&[[1u8, 2], [0, 0]]).unwrap();
/// assert_eq!(static_value(&g), 3.0 + 9.0 + 1.0 + 1.0);
/// ```
#[inline]
pub fn static_value(grid: &Grid) -> f64 {
    let values = rank_values();
    grid.cells().iter().map(|&rank| values[usize::from(rank)]).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_static_value_counts_empty_cells() {
        assert_eq!(static_value(&Grid::new(4, 4)), 16.0);
        let g = Grid::from_rows(&[[11u8, 0, 0]]).unwrap();
        assert_eq!(static_value(&g), 177_147.0 + 2.0);
    }

    #[test]
    fn it_static_value_rewards_merges() {
        let before = Grid::from_rows(&[[3u8, 3]]).unwrap();
        let after = Grid::from_rows(&[[4u8, 0]]).unwrap();
        assert!(static_value(&after) > static_value(&before));
    }
}
