//! Fixed-size 2-D grid of per-tile values.

use crate::coords::TilePos;
use crate::error::{Error, Result};

/// Row-major grid covering tiles `(0, 0)..(width, height)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileGrid<T> {
    width: u32,
    height: u32,
    cells: Vec<T>,
}

impl<T: Clone> TileGrid<T> {
    /// Create a grid with every cell set to `value`.
    pub fn filled(width: u32, height: u32, value: T) -> Self {
        Self {
            width,
            height,
            cells: vec![value; width as usize * height as usize],
        }
    }
}

impl<T> TileGrid<T> {
    /// Create a grid from row-major cells.
    pub fn from_vec(width: u32, height: u32, cells: Vec<T>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if cells.len() != expected {
            return Err(Error::InvalidData(format!(
                "grid {width}x{height} needs {expected} cells, got {}",
                cells.len()
            )));
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Grid width in tiles.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in tiles.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Total number of tiles.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if the grid has no tiles.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Check if a tile position lies inside the grid.
    pub const fn contains(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    #[inline]
    fn index(&self, pos: TilePos) -> Option<usize> {
        self.contains(pos)
            .then(|| pos.y as usize * self.width as usize + pos.x as usize)
    }

    /// Get the value at a tile position.
    pub fn get(&self, pos: TilePos) -> Option<&T> {
        self.index(pos).map(|i| &self.cells[i])
    }

    /// Get a mutable reference to the value at a tile position.
    pub fn get_mut(&mut self, pos: TilePos) -> Option<&mut T> {
        self.index(pos).map(|i| &mut self.cells[i])
    }

    /// Replace the value at a tile position.
    pub fn set(&mut self, pos: TilePos, value: T) -> Result<()> {
        let slot = self
            .get_mut(pos)
            .ok_or_else(|| Error::OutOfBounds(format!("tile {pos} outside grid")))?;
        *slot = value;
        Ok(())
    }

    /// Iterate over every tile position and its value.
    pub fn iter(&self) -> impl Iterator<Item = (TilePos, &T)> {
        let width = self.width as usize;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, v)| (TilePos::new((i % width) as i32, (i / width) as i32), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_grid_bounds() {
        let grid = TileGrid::filled(4, 3, 7u8);
        assert_eq!(grid.len(), 12);
        assert!(grid.contains(TilePos::new(3, 2)));
        assert!(!grid.contains(TilePos::new(4, 0)));
        assert!(!grid.contains(TilePos::new(0, -1)));
        assert_eq!(grid.get(TilePos::new(3, 2)), Some(&7));
        assert_eq!(grid.get(TilePos::new(-1, 0)), None);
    }

    #[test]
    fn from_vec_rejects_wrong_length() {
        let err = TileGrid::from_vec(2, 2, vec![0u8; 3]).unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn set_and_iterate_row_major() {
        let mut grid = TileGrid::filled(2, 2, 0u8);
        grid.set(TilePos::new(1, 0), 1).unwrap();
        grid.set(TilePos::new(0, 1), 2).unwrap();
        assert!(grid.set(TilePos::new(2, 2), 3).is_err());

        let cells: Vec<_> = grid.iter().map(|(p, v)| (p, *v)).collect();
        assert_eq!(
            cells,
            vec![
                (TilePos::new(0, 0), 0),
                (TilePos::new(1, 0), 1),
                (TilePos::new(0, 1), 2),
                (TilePos::new(1, 1), 0),
            ]
        );
    }
}
