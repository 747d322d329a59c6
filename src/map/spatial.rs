use std::collections::HashMap;

/// Screen-space hash grid of accepted label anchors.
/// Cells are as wide as the query radius, so a proximity check only looks at the
/// 3x3 block of cells around the query point.
pub struct ScreenGrid {
    cells: HashMap<(i32, i32), Vec<(f64, f64)>>,
    cell_size: f64,
}

impl ScreenGrid {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cells: HashMap::new(),
            cell_size: cell_size.max(1.0),
        }
    }

    #[inline(always)]
    fn to_cell(&self, x: f64, y: f64) -> (i32, i32) {
        ((x / self.cell_size).floor() as i32, (y / self.cell_size).floor() as i32)
    }

    pub fn insert(&mut self, x: f64, y: f64) {
        let cell = self.to_cell(x, y);
        self.cells.entry(cell).or_default().push((x, y));
    }

    /// True if any stored point lies strictly closer than `radius` to (x, y).
    /// `radius` must not exceed the cell size.
    pub fn any_within(&self, x: f64, y: f64, radius: f64) -> bool {
        debug_assert!(radius <= self.cell_size);
        let (cx, cy) = self.to_cell(x, y);
        let r2 = radius * radius;

        for dy in -1..=1 {
            for dx in -1..=1 {
                if let Some(points) = self.cells.get(&(cx + dx, cy + dy)) {
                    let hit = points.iter().any(|&(px, py)| {
                        let (ddx, ddy) = (px - x, py - y);
                        ddx * ddx + ddy * ddy < r2
                    });
                    if hit {
                        return true;
                    }
                }
            }
        }
        false
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbouring_cells_are_checked() {
        let mut grid = ScreenGrid::new(50.0);
        grid.insert(49.0, 49.0);
        // Different cell, 2px away
        assert!(grid.any_within(51.0, 49.0, 50.0));
        assert!(!grid.any_within(149.0, 49.0, 50.0));
    }

    #[test]
    fn test_radius_is_exclusive() {
        let mut grid = ScreenGrid::new(50.0);
        grid.insert(0.0, 0.0);
        assert!(!grid.any_within(50.0, 0.0, 50.0));
        assert!(grid.any_within(49.9, 0.0, 50.0));
    }

    #[test]
    fn test_clear() {
        let mut grid = ScreenGrid::new(10.0);
        grid.insert(1.0, 1.0);
        grid.insert(100.0, 1.0);
        assert!(grid.any_within(100.0, 2.0, 5.0));
        grid.clear();
        assert!(!grid.any_within(1.0, 1.0, 5.0));
        assert!(!grid.any_within(100.0, 2.0, 5.0));
    }
}
