//! Floor-plan routes.
//!
//! Maps are stored as JSON blobs under `map:<name>` storage keys. Every
//! write path clamps and re-resolves spacing through the `seatmap` crate,
//! so a stored plan is always overlap-free; seat assignments that point at
//! benches a write removed are pruned alongside.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use seatmap::{
    LayoutError, SeatMap, SeatRef,
    export::{PageSpec, TilePlan, plan_tiles},
    layout::{clamp_to_bounds, resolve_spacing, translate_selection},
};

use crate::{
    auth::AuthUser, database::AssignmentRow, error::AppError, state::AppState,
    utils::valid_storage_key,
};

fn blob_key(name: &str) -> Result<String, AppError> {
    if !valid_storage_key(name) {
        return Err(AppError::MalformedPayload);
    }

    Ok(format!("map:{name}"))
}

pub fn load_map(state: &AppState, name: &str) -> Result<SeatMap, AppError> {
    let raw = state.db.get_blob(&blob_key(name)?)?.ok_or(AppError::NotFound)?;

    serde_json::from_str(&raw).map_err(|e| AppError::Internal(format!("stored map is corrupt: {e}")))
}

fn store_map(state: &AppState, name: &str, map: &SeatMap) -> Result<(), AppError> {
    let raw = serde_json::to_string(map)
        .map_err(|e| AppError::Internal(format!("map serialization failed: {e}")))?;
    state.db.put_blob(&blob_key(name)?, &raw)?;

    // Assignments pointing at seats the write removed are dead; drop them.
    for assignment in state.db.assignments(name)? {
        let seat = SeatRef {
            bench_id: assignment.bench_id,
            seat: assignment.seat,
        };
        if !map.seat_exists(seat) {
            state.db.unassign_seat(name, seat.bench_id, seat.seat)?;
        }
    }

    Ok(())
}

pub async fn get_map_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<SeatMap>, AppError> {
    Ok(Json(load_map(&state, &name)?))
}

pub async fn put_map_handler(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(name): Path<String>,
    Json(mut map): Json<SeatMap>,
) -> Result<Json<SeatMap>, AppError> {
    if map.width <= 0.0 || map.height <= 0.0 {
        return Err(AppError::MalformedPayload);
    }

    map.name = name.clone();
    let (width, height) = (map.width, map.height);
    for bench in &mut map.benches {
        clamp_to_bounds(bench, width, height);
    }
    let passes = resolve_spacing(&mut map);

    store_map(&state, &name, &map)?;
    info!("Stored map {name} ({} benches, {passes} passes)", map.benches.len());

    Ok(Json(map))
}

#[derive(Deserialize)]
pub struct LayoutRequest {
    /// Multi-selection: every bench translates by the same delta.
    pub ids: Vec<u32>,
    pub dx: f32,
    pub dy: f32,
}

#[derive(Debug, Serialize)]
pub struct LayoutResponse {
    pub passes: usize,
    pub map: SeatMap,
}

pub async fn layout_handler(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(name): Path<String>,
    Json(payload): Json<LayoutRequest>,
) -> Result<Json<LayoutResponse>, AppError> {
    let mut map = load_map(&state, &name)?;

    translate_selection(&mut map, &payload.ids, payload.dx, payload.dy).map_err(
        |LayoutError::UnknownBench(_)| AppError::MalformedPayload,
    )?;
    let passes = resolve_spacing(&mut map);

    store_map(&state, &name, &map)?;

    Ok(Json(LayoutResponse { passes, map }))
}

#[derive(Deserialize)]
pub struct ExportParams {
    #[serde(default)]
    pub px_per_mm: Option<f32>,
    #[serde(default)]
    pub landscape: Option<bool>,
}

const DEFAULT_PX_PER_MM: f32 = 2.0;

pub async fn export_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<ExportParams>,
) -> Result<Json<TilePlan>, AppError> {
    let map = load_map(&state, &name)?;

    let px_per_mm = params.px_per_mm.unwrap_or(DEFAULT_PX_PER_MM);
    let spec = if params.landscape.unwrap_or(false) {
        PageSpec::a4_landscape(px_per_mm)
    } else {
        PageSpec::a4_portrait(px_per_mm)
    };

    let plan = plan_tiles(map.width, map.height, &spec).map_err(|_| AppError::MalformedPayload)?;
    Ok(Json(plan))
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub worshiper_id: i64,
}

pub async fn assign_handler(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path((name, bench_id, seat)): Path<(String, u32, u32)>,
    Json(payload): Json<AssignRequest>,
) -> Result<StatusCode, AppError> {
    let map = load_map(&state, &name)?;
    if !map.seat_exists(SeatRef { bench_id, seat }) {
        return Err(AppError::NotFound);
    }

    state
        .db
        .worshiper(payload.worshiper_id)?
        .ok_or(AppError::NotFound)?;

    state
        .db
        .assign_seat(&name, bench_id, seat, payload.worshiper_id)?;
    info!("Assigned {name}/{bench_id}/{seat} to worshiper {}", payload.worshiper_id);

    Ok(StatusCode::NO_CONTENT)
}

pub async fn unassign_handler(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path((name, bench_id, seat)): Path<(String, u32, u32)>,
) -> Result<StatusCode, AppError> {
    // Idempotent: clearing an empty seat is fine.
    state.db.unassign_seat(&name, bench_id, seat)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn assignments_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Vec<AssignmentRow>>, AppError> {
    Ok(Json(state.db.assignments(&name)?))
}
