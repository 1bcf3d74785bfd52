//! Emits a resolved demo floor plan for poking at the map routes by hand:
//! `curl -X PUT localhost:1111/maps/demo -d @../demo-map.json`.

use std::fs;

use anyhow::Result;
use seatmap::{Bench, Orientation, SeatMap, layout::resolve_spacing};

fn main() -> Result<()> {
    let mut map = SeatMap::new("demo", 1200.0, 900.0);

    map.add_bench(Bench::fixture(0, 500.0, 60.0, 200.0, 120.0, "bimah"));
    map.add_bench(Bench::fixture(0, 540.0, 780.0, 120.0, 80.0, "ark"));

    // Two blocks of rows, deliberately dropped too close together.
    for i in 0..6 {
        map.add_bench(Bench::row(
            0,
            80.0,
            220.0 + 35.0 * i as f32,
            Orientation::Horizontal,
            8,
        ));
        map.add_bench(Bench::row(
            0,
            700.0,
            220.0 + 35.0 * i as f32,
            Orientation::Horizontal,
            8,
        ));
    }

    let passes = resolve_spacing(&mut map);

    println!("Benches: {}", map.benches.len());
    println!("Relax passes: {passes}");

    fs::write("../demo-map.json", serde_json::to_string_pretty(&map)?)?;
    println!("Wrote ../demo-map.json");

    Ok(())
}
