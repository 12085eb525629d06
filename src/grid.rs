use std::fmt;
use std::path::Path;
use std::str::FromStr;

use image::{self, GenericImageView, Pixel};
use serde::{Deserialize, Serialize};

/// A pixel position, and the key of the matching graph node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub row : usize,
    pub col : usize,
}

impl Coord {
    pub const fn new(row : usize, col : usize) -> Self {
        Coord { row, col }
    }
}

impl From<(usize, usize)> for Coord {
    fn from((row, col) : (usize, usize)) -> Self {
        Coord { row, col }
    }
}

// Wire label used by the hosted solver: "row,col".
impl fmt::Display for Coord {
    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.row, self.col)
    }
}

impl FromStr for Coord {
    type Err = GridError;

    fn from_str(s : &str) -> Result<Self, Self::Err> {
        let bad = || GridError::BadLabel(s.to_string());
        let (row, col) = s.split_once(',').ok_or_else(bad)?;
        let row = row.trim().parse().map_err(|_| bad())?;
        let col = col.trim().parse().map_err(|_| bad())?;
        Ok(Coord { row, col })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("pixel grid has no cells")]
    Empty,

    #[error("row {row} has {found} cells, expected {expected}")]
    Ragged { row : usize, expected : usize, found : usize },

    #[error("cell ({row}, {col}) holds {value}, expected 0 or 1")]
    NonBinary { row : usize, col : usize, value : u8 },

    #[error("{rows}x{cols} grid exceeds {max} cells per side")]
    TooLarge { rows : usize, cols : usize, max : usize },

    #[error("not a coordinate label: {0:?}")]
    BadLabel(String),

    #[error("could not read grid image: {0}")]
    Image(#[from] image::ImageError),
}

/// Largest accepted grid side. Every cell becomes a model variable.
pub const MAX_SIDE : usize = 64;

fn check_size(rows : usize, cols : usize) -> Result<(), GridError> {
    if rows == 0 || cols == 0 {
        return Err(GridError::Empty);
    }
    if rows > MAX_SIDE || cols > MAX_SIDE {
        return Err(GridError::TooLarge { rows, cols, max : MAX_SIDE });
    }
    Ok(())
}

/// Rectangular black/white grid. `1` is a black cell, `0` a white one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelGrid {
    rows : usize,
    cols : usize,
    cells : Vec<u8>,
}

impl PixelGrid {
    pub fn new(rows : Vec<Vec<u8>>) -> Result<Self, GridError> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        check_size(rows.len(), cols)?;
        let mut cells = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(GridError::Ragged { row : i, expected : cols, found : row.len() });
            }
            for (j, &value) in row.iter().enumerate() {
                if value > 1 {
                    return Err(GridError::NonBinary { row : i, col : j, value });
                }
                cells.push(value);
            }
        }
        Ok(PixelGrid { rows : rows.len(), cols, cells })
    }

    /// The 3x3 grid the exercise ships with.
    pub fn example() -> Self {
        PixelGrid { rows : 3, cols : 3, cells : vec![0, 0, 0, 1, 0, 1, 1, 1, 1] }
    }

    /// Loads a grid from an image file. Image rows become grid rows; dark
    /// pixels (luma below 128) are black.
    pub fn from_image(path : &Path) -> Result<Self, GridError> {
        let (w, h) = image::image_dimensions(path)?;
        check_size(h as usize, w as usize)?;
        let img = image::open(path)?;
        let mut cells = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                let luma = img.get_pixel(x, y).to_luma()[0];
                cells.push(u8::from(luma < 128));
            }
        }
        tracing::debug!(rows = h, cols = w, path = %path.display(), "loaded grid image");
        Ok(PixelGrid { rows : h as usize, cols : w as usize, cells })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn contains(&self, c : Coord) -> bool {
        c.row < self.rows && c.col < self.cols
    }

    /// Panics if `c` lies outside the grid.
    pub fn get(&self, c : Coord) -> u8 {
        assert!(self.contains(c), "{c} outside {}x{} grid", self.rows, self.cols);
        self.cells[c.row * self.cols + c.col]
    }

    /// Row-major iteration over every cell.
    pub fn cells(&self) -> impl Iterator<Item = (Coord, u8)> + '_ {
        let cols = self.cols;
        self.cells.iter().enumerate().map(move |(i, &v)| (Coord::new(i / cols, i % cols), v))
    }
}
