//! Occupancy grid rendering
//!
//! Writes the map as a binary PGM image and prints a character preview.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use misty_client::{Cell, SlamMap};

fn shade(cell: Cell) -> u8 {
    match cell {
        Cell::Unknown => 128,
        Cell::Open => 255,
        Cell::Occupied => 0,
        Cell::Covered => 200,
        Cell::Other(_) => 64,
    }
}

fn glyph(cell: Cell) -> char {
    match cell {
        Cell::Unknown => ' ',
        Cell::Open => '.',
        Cell::Occupied => '#',
        Cell::Covered => '+',
        Cell::Other(_) => '?',
    }
}

/// Encode `map` as a binary (P5) PGM image
pub fn to_pgm(map: &SlamMap) -> Vec<u8> {
    let mut out = format!("P5\n{} {}\n255\n", map.width, map.height).into_bytes();
    out.extend(map.grid.iter().map(|&v| shade(Cell::from(v))));
    out
}

pub fn write_pgm(map: &SlamMap, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(&to_pgm(map))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// One line per grid row, top row first
pub fn ascii(map: &SlamMap) -> String {
    map.rows()
        .map(|row| row.iter().map(|&v| glyph(Cell::from(v))).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}
