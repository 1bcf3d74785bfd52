//! Print-export page tiling.
//!
//! The editor exports a floor plan as a multi-page document by slicing the
//! rendered map into page-sized tiles. This module owns the arithmetic: how
//! many pages, which map rectangle lands on each page, and where on the page
//! it sits in millimeters. Rasterizing the tiles is the consumer's job.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bench::Rect;

pub const A4_WIDTH_MM: f32 = 210.0;
pub const A4_HEIGHT_MM: f32 = 297.0;
pub const DEFAULT_MARGIN_MM: f32 = 10.0;

#[derive(Debug, Error, PartialEq)]
pub enum ExportError {
    #[error("scale must be positive, got {0} px/mm")]
    InvalidScale(f32),
    #[error("margins leave no printable area")]
    MarginTooLarge,
}

/// Physical page geometry plus the map-to-paper scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageSpec {
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    pub margin_mm: f32,
    /// Map pixels per printed millimeter.
    pub px_per_mm: f32,
}

impl PageSpec {
    pub fn a4_portrait(px_per_mm: f32) -> Self {
        Self {
            page_width_mm: A4_WIDTH_MM,
            page_height_mm: A4_HEIGHT_MM,
            margin_mm: DEFAULT_MARGIN_MM,
            px_per_mm,
        }
    }

    pub fn a4_landscape(px_per_mm: f32) -> Self {
        Self {
            page_width_mm: A4_HEIGHT_MM,
            page_height_mm: A4_WIDTH_MM,
            margin_mm: DEFAULT_MARGIN_MM,
            px_per_mm,
        }
    }

    fn printable_mm(&self) -> (f32, f32) {
        (
            self.page_width_mm - 2.0 * self.margin_mm,
            self.page_height_mm - 2.0 * self.margin_mm,
        )
    }
}

/// One page of the export: the map rectangle it shows and where that
/// rectangle sits on the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
    pub page: u32,
    pub col: u32,
    pub row: u32,
    /// Source rectangle in map pixels. Edge tiles are cropped to the map.
    pub src: Rect,
    /// Placement on the page, millimeters from the top-left page corner.
    pub origin_x_mm: f32,
    pub origin_y_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilePlan {
    pub cols: u32,
    pub rows: u32,
    pub spec: PageSpec,
    pub tiles: Vec<Tile>,
}

/// Slices a `map_width x map_height` pixel map into page tiles.
pub fn plan_tiles(
    map_width: f32,
    map_height: f32,
    spec: &PageSpec,
) -> Result<TilePlan, ExportError> {
    if !(spec.px_per_mm > 0.0) {
        return Err(ExportError::InvalidScale(spec.px_per_mm));
    }

    let (printable_w_mm, printable_h_mm) = spec.printable_mm();
    if printable_w_mm <= 0.0 || printable_h_mm <= 0.0 {
        return Err(ExportError::MarginTooLarge);
    }

    if map_width <= 0.0 || map_height <= 0.0 {
        return Ok(TilePlan {
            cols: 0,
            rows: 0,
            spec: *spec,
            tiles: Vec::new(),
        });
    }

    let tile_w_px = printable_w_mm * spec.px_per_mm;
    let tile_h_px = printable_h_mm * spec.px_per_mm;

    let cols = (map_width / tile_w_px).ceil() as u32;
    let rows = (map_height / tile_h_px).ceil() as u32;

    let mut tiles = Vec::with_capacity((cols * rows) as usize);
    for row in 0..rows {
        for col in 0..cols {
            let x = col as f32 * tile_w_px;
            let y = row as f32 * tile_h_px;
            let src = Rect {
                x,
                y,
                width: (map_width - x).min(tile_w_px),
                height: (map_height - y).min(tile_h_px),
            };

            tiles.push(Tile {
                page: row * cols + col,
                col,
                row,
                origin_x_mm: spec.margin_mm,
                origin_y_mm: spec.margin_mm,
                width_mm: src.width / spec.px_per_mm,
                height_mm: src.height / spec.px_per_mm,
                src,
            });
        }
    }

    Ok(TilePlan {
        cols,
        rows,
        spec: *spec,
        tiles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_fitting_one_printable_area_is_a_single_tile() {
        // Printable area: 190 x 277 mm; at 2 px/mm that is 380 x 554 px.
        let spec = PageSpec::a4_portrait(2.0);
        let plan = plan_tiles(380.0, 554.0, &spec).unwrap();

        assert_eq!((plan.cols, plan.rows), (1, 1));
        let tile = &plan.tiles[0];
        assert_eq!(tile.src.width, 380.0);
        assert_eq!(tile.width_mm, 190.0);
        assert_eq!(tile.origin_x_mm, DEFAULT_MARGIN_MM);
    }

    #[test]
    fn remainder_produces_a_cropped_edge_tile() {
        let spec = PageSpec::a4_portrait(2.0);
        // One full column (380 px) plus a 20 px sliver.
        let plan = plan_tiles(400.0, 100.0, &spec).unwrap();

        assert_eq!((plan.cols, plan.rows), (2, 1));
        assert_eq!(plan.tiles.len(), 2);

        let edge = &plan.tiles[1];
        assert_eq!(edge.src.x, 380.0);
        assert_eq!(edge.src.width, 20.0);
        assert_eq!(edge.width_mm, 10.0);
    }

    #[test]
    fn tiles_cover_the_map_exactly() {
        let spec = PageSpec::a4_landscape(3.0);
        let (map_w, map_h) = (2000.0, 900.0);
        let plan = plan_tiles(map_w, map_h, &spec).unwrap();

        assert_eq!(plan.tiles.len(), (plan.cols * plan.rows) as usize);

        // Sum of a row of tile widths spans the map width, ditto heights.
        let row_width: f32 = plan
            .tiles
            .iter()
            .filter(|t| t.row == 0)
            .map(|t| t.src.width)
            .sum();
        let col_height: f32 = plan
            .tiles
            .iter()
            .filter(|t| t.col == 0)
            .map(|t| t.src.height)
            .sum();
        assert!((row_width - map_w).abs() < 1e-3);
        assert!((col_height - map_h).abs() < 1e-3);

        // Pages are numbered row-major without gaps.
        for (i, tile) in plan.tiles.iter().enumerate() {
            assert_eq!(tile.page as usize, i);
        }
    }

    #[test]
    fn empty_map_yields_an_empty_plan() {
        let spec = PageSpec::a4_portrait(2.0);
        let plan = plan_tiles(0.0, 600.0, &spec).unwrap();
        assert!(plan.tiles.is_empty());
        assert_eq!((plan.cols, plan.rows), (0, 0));
    }

    #[test]
    fn bad_specs_are_rejected() {
        let err = plan_tiles(100.0, 100.0, &PageSpec::a4_portrait(0.0)).unwrap_err();
        assert_eq!(err, ExportError::InvalidScale(0.0));

        let mut spec = PageSpec::a4_portrait(2.0);
        spec.margin_mm = 120.0;
        let err = plan_tiles(100.0, 100.0, &spec).unwrap_err();
        assert_eq!(err, ExportError::MarginTooLarge);
    }
}
