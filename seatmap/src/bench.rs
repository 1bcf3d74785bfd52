//! Bench and floor-plan data model.
//!
//! ## Coordinates
//!
//! - Map space is measured in pixels, origin at the top-left, y growing down.
//! - A bench position is the top-left corner of its footprint.
//! - Row footprints are derived from seat count and orientation; fixtures
//!   (bimah, ark, columns) carry explicit dimensions instead.

use serde::{Deserialize, Serialize};

/// Width of one seat along the bench axis, in map pixels.
pub const SEAT_PITCH: f32 = 50.0;

/// Depth of a seat row perpendicular to the bench axis, in map pixels.
pub const BENCH_DEPTH: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchKind {
    /// A row of assignable seats.
    Row,
    /// A decorative fixed element. Holds no seats and is never displaced
    /// by the spacing resolver.
    Fixture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// One placed element of the floor plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bench {
    pub id: u32,
    pub kind: BenchKind,
    pub x: f32,
    pub y: f32,
    pub orientation: Orientation,
    /// Number of seats in a row. Ignored for fixtures.
    #[serde(default)]
    pub seats: u32,
    /// Explicit footprint, fixtures only. Rows derive theirs.
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Bench {
    pub fn row(id: u32, x: f32, y: f32, orientation: Orientation, seats: u32) -> Self {
        Self {
            id,
            kind: BenchKind::Row,
            x,
            y,
            orientation,
            seats,
            width: 0.0,
            height: 0.0,
            label: None,
        }
    }

    pub fn fixture(id: u32, x: f32, y: f32, width: f32, height: f32, label: &str) -> Self {
        Self {
            id,
            kind: BenchKind::Fixture,
            x,
            y,
            orientation: Orientation::Horizontal,
            seats: 0,
            width,
            height,
            label: Some(label.to_string()),
        }
    }

    pub fn is_fixture(&self) -> bool {
        self.kind == BenchKind::Fixture
    }

    /// Footprint of this element in map space.
    pub fn rect(&self) -> Rect {
        let (w, h) = match self.kind {
            BenchKind::Fixture => (self.width, self.height),
            BenchKind::Row => {
                let along = self.seats as f32 * SEAT_PITCH;
                match self.orientation {
                    Orientation::Horizontal => (along, BENCH_DEPTH),
                    Orientation::Vertical => (BENCH_DEPTH, along),
                }
            }
        };

        Rect {
            x: self.x,
            y: self.y,
            width: w,
            height: h,
        }
    }

    /// Center point of every seat, first to last along the bench axis.
    /// Empty for fixtures.
    pub fn seat_positions(&self) -> Vec<(f32, f32)> {
        if self.is_fixture() {
            return Vec::new();
        }

        (0..self.seats)
            .map(|i| {
                let along = (i as f32 + 0.5) * SEAT_PITCH;
                match self.orientation {
                    Orientation::Horizontal => (self.x + along, self.y + BENCH_DEPTH / 2.0),
                    Orientation::Vertical => (self.x + BENCH_DEPTH / 2.0, self.y + along),
                }
            })
            .collect()
    }
}

/// Axis-aligned box in map pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Strict overlap: touching edges do not count.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// A named floor plan. This is the JSON document the storage layer persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatMap {
    pub name: String,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub benches: Vec<Bench>,
}

impl SeatMap {
    pub fn new(name: &str, width: f32, height: f32) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            benches: Vec::new(),
        }
    }

    pub fn bench(&self, id: u32) -> Option<&Bench> {
        self.benches.iter().find(|b| b.id == id)
    }

    /// Appends a bench under a freshly allocated id and returns it.
    pub fn add_bench(&mut self, mut bench: Bench) -> u32 {
        let id = self.benches.iter().map(|b| b.id).max().map_or(0, |m| m + 1);
        bench.id = id;
        self.benches.push(bench);
        id
    }

    /// Removes a bench. Returns false if the id is unknown.
    pub fn remove_bench(&mut self, id: u32) -> bool {
        let before = self.benches.len();
        self.benches.retain(|b| b.id != id);
        self.benches.len() != before
    }

    /// True if `(bench_id, seat)` names an assignable seat on this map.
    pub fn seat_exists(&self, seat: SeatRef) -> bool {
        self.bench(seat.bench_id)
            .is_some_and(|b| !b.is_fixture() && seat.seat < b.seats)
    }
}

/// One assignable seat: a bench plus the seat index along it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeatRef {
    pub bench_id: u32,
    pub seat: u32,
}
