//! # Seatmap
//!
//! Shared floor-plan model for the seat-map service.
//!
//! Everything in here is pure geometry and data: the server persists these
//! structures as JSON blobs and runs the spacing resolver on every write, the
//! tester binary uses them to emit demo plans. No I/O, no async.

pub mod bench;
pub mod export;
pub mod layout;

pub use bench::{Bench, BenchKind, Orientation, Rect, SeatMap, SeatRef};
pub use layout::{resolve_spacing, translate_selection, LayoutError, MAX_RELAX_PASSES};
