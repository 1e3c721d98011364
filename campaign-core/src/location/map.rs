use crate::ids::RecordId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("Cell ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("No level {0}")]
    NoLevel(usize),
}

/// Terrain of one grid cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    #[default]
    Empty,
    Floor,
    Wall,
    Door,
    Water,
    Difficult,
    Stairs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Npc,
    Monster,
    Loot,
    Trap,
    Entrance,
    Note,
}

/// A point of interest on a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapMarker {
    pub x: u32,
    pub y: u32,
    pub kind: MarkerKind,
    #[serde(default)]
    pub label: String,
}

/// One floor of a tactical map. Cells are stored row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapLevel {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub cells: Vec<CellType>,
    #[serde(default)]
    pub markers: Vec<MapMarker>,
}

impl MapLevel {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            cells: vec![CellType::Empty; (width as usize) * (height as usize)],
            markers: Vec::new(),
        }
    }

    fn index(&self, x: u32, y: u32) -> Result<usize, MapError> {
        if x >= self.width || y >= self.height {
            return Err(MapError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(y as usize * self.width as usize + x as usize)
    }

    /// `None` outside the grid.
    pub fn cell(&self, x: u32, y: u32) -> Option<CellType> {
        let index = self.index(x, y).ok()?;
        self.cells.get(index).copied()
    }

    pub fn set_cell(&mut self, x: u32, y: u32, cell: CellType) -> Result<(), MapError> {
        let index = self.index(x, y)?;
        // Stored maps may carry a short cell vector.
        if self.cells.len() <= index {
            self.cells.resize(index + 1, CellType::Empty);
        }
        self.cells[index] = cell;
        Ok(())
    }

    pub fn add_marker(&mut self, marker: MapMarker) -> Result<(), MapError> {
        self.index(marker.x, marker.y)?;
        self.markers.push(marker);
        Ok(())
    }

    pub fn markers_at(&self, x: u32, y: u32) -> impl Iterator<Item = &MapMarker> {
        self.markers.iter().filter(move |m| m.x == x && m.y == y)
    }
}

/// Multi-level tactical map for a location, stored in the `maps` bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapData {
    pub location_id: RecordId,
    #[serde(default)]
    pub levels: Vec<MapLevel>,
}

impl MapData {
    pub fn new(location_id: RecordId) -> Self {
        Self {
            location_id,
            levels: Vec::new(),
        }
    }

    /// Add an empty level and return its index.
    pub fn add_level(&mut self, name: impl Into<String>, width: u32, height: u32) -> usize {
        self.levels.push(MapLevel::new(name, width, height));
        self.levels.len() - 1
    }

    pub fn level(&self, index: usize) -> Option<&MapLevel> {
        self.levels.get(index)
    }

    pub fn level_mut(&mut self, index: usize) -> Result<&mut MapLevel, MapError> {
        self.levels.get_mut(index).ok_or(MapError::NoLevel(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cells_row_major() {
        let mut level = MapLevel::new("Ground", 3, 2);
        level.set_cell(2, 1, CellType::Door).unwrap();
        assert_eq!(level.cells[5], CellType::Door);
        assert_eq!(level.cell(2, 1), Some(CellType::Door));
        assert_eq!(level.cell(0, 0), Some(CellType::Empty));
    }

    #[test]
    fn test_bounds_checked() {
        let mut level = MapLevel::new("Ground", 3, 2);
        assert_eq!(level.cell(3, 0), None);
        assert_eq!(
            level.set_cell(0, 2, CellType::Wall),
            Err(MapError::OutOfBounds {
                x: 0,
                y: 2,
                width: 3,
                height: 2
            })
        );
        let marker = MapMarker {
            x: 9,
            y: 9,
            kind: MarkerKind::Trap,
            label: "pit".to_string(),
        };
        assert!(level.add_marker(marker).is_err());
    }

    #[test]
    fn test_levels_and_markers() {
        let mut map = MapData::new(RecordId::new());
        let cellar = map.add_level("Cellar", 4, 4);
        let level = map.level_mut(cellar).unwrap();
        level
            .add_marker(MapMarker {
                x: 1,
                y: 1,
                kind: MarkerKind::Loot,
                label: "chest".to_string(),
            })
            .unwrap();

        assert_eq!(map.level(cellar).unwrap().markers_at(1, 1).count(), 1);
        assert_eq!(map.level_mut(7), Err(MapError::NoLevel(7)));
    }

    #[test]
    fn test_short_cell_vector_tolerated() {
        let json = r#"{"name":"L","width":2,"height":2,"cells":["wall"]}"#;
        let mut level: MapLevel = serde_json::from_str(json).unwrap();
        assert_eq!(level.cell(1, 1), None);
        level.set_cell(1, 1, CellType::Water).unwrap();
        assert_eq!(level.cell(1, 1), Some(CellType::Water));
    }
}
