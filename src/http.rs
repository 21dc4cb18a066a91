//! HTTP boundary: routing, request-shape validation, error-to-status
//! mapping, and the response envelope. No decision logic lives here — every
//! handler maps a validated, typed request onto one engine operation.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{MatchedPath, Path, Query, Request, State},
    http::{StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use ulid::Ulid;

use crate::engine::{Engine, EngineError};
use crate::limits::*;
use crate::model::{Ms, Room, RoomFilter, RoomPatch};
use crate::observability;

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/rooms/stats", get(get_stats))
        .route("/api/rooms/allocate", post(allocate_room))
        .route("/api/rooms", get(list_rooms).post(add_room))
        .route(
            "/api/rooms/{id}",
            get(get_room).put(update_room).delete(delete_room),
        )
        .route("/api/rooms/{id}/deallocate", patch(deallocate_room))
        .fallback(unknown_route)
        .layer(middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

// ── Envelope & errors ────────────────────────────────────

#[derive(Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    message: String,
    data: T,
}

fn respond<T: Serialize>(status: StatusCode, message: impl Into<String>, data: T) -> Response {
    let body = Envelope { success: true, message: message.into(), data };
    (status, Json(body)).into_response()
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, message: message.into() }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        let status = match &e {
            EngineError::Validation { .. }
            | EngineError::InvalidState(_)
            | EngineError::LimitExceeded(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::Wal(_) => {
                // Unexpected fault: full detail in the log, opaque message out.
                tracing::error!("internal error: {e}");
                return Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "Internal server error".into(),
                };
            }
        };
        Self { status, message: e.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "success": false, "message": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ── Wire shapes ──────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoomBody {
    id: String,
    room_no: String,
    capacity: u32,
    #[serde(rename = "hasAC")]
    has_ac: bool,
    has_attached_washroom: bool,
    is_allocated: bool,
    allocated_to: Option<String>,
    allocated_students: u32,
    created_at: Ms,
    updated_at: Ms,
}

impl From<Room> for RoomBody {
    fn from(room: Room) -> Self {
        Self {
            id: room.id.to_string(),
            is_allocated: room.is_allocated(),
            allocated_to: room.allocated_to().map(str::to_string),
            allocated_students: room.allocated_students(),
            room_no: room.room_no,
            capacity: room.capacity,
            has_ac: room.has_ac,
            has_attached_washroom: room.has_washroom,
            created_at: room.created_at,
            updated_at: room.updated_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddRoomBody {
    room_no: String,
    capacity: i64,
    #[serde(rename = "hasAC")]
    has_ac: bool,
    has_attached_washroom: bool,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UpdateRoomBody {
    room_no: Option<String>,
    capacity: Option<i64>,
    #[serde(rename = "hasAC")]
    has_ac: Option<bool>,
    has_attached_washroom: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AllocateBody {
    students: i64,
    #[serde(rename = "needsAC")]
    needs_ac: bool,
    needs_washroom: bool,
    #[serde(default)]
    group_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    min_capacity: Option<i64>,
    #[serde(rename = "hasAC")]
    has_ac: Option<bool>,
    has_attached_washroom: Option<bool>,
    is_allocated: Option<bool>,
    page: Option<usize>,
    limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaginationBody {
    total: usize,
    page: usize,
    limit: usize,
    total_pages: usize,
}

#[derive(Serialize)]
struct RoomListBody {
    rooms: Vec<RoomBody>,
    pagination: PaginationBody,
}

#[derive(Serialize)]
struct AllocationBody {
    allocated: bool,
    room: Option<RoomBody>,
}

#[derive(Serialize)]
struct StatsBody {
    total: usize,
    allocated: usize,
    available: usize,
    #[serde(rename = "withAC")]
    with_ac: usize,
    #[serde(rename = "withWashroom")]
    with_washroom: usize,
}

// ── Handlers ─────────────────────────────────────────────

fn parse_id(raw: &str) -> Result<Ulid, ApiError> {
    Ulid::from_string(raw).map_err(|_| ApiError::bad_request(format!("Invalid room id: {raw}")))
}

/// Range-check an integer field before it is narrowed for the engine.
fn check_capacity(capacity: i64) -> Result<u32, ApiError> {
    if !(i64::from(MIN_CAPACITY)..=i64::from(MAX_CAPACITY)).contains(&capacity) {
        return Err(ApiError::bad_request(format!(
            "Capacity must be an integer between {MIN_CAPACITY} and {MAX_CAPACITY}"
        )));
    }
    Ok(capacity as u32)
}

async fn health() -> Response {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as Ms);
    Json(serde_json::json!({
        "success": true,
        "message": "Server is running",
        "timestamp": timestamp,
    }))
    .into_response()
}

async fn get_stats(State(engine): State<Arc<Engine>>) -> Response {
    let stats = engine.stats().await;
    respond(
        StatusCode::OK,
        "Success",
        StatsBody {
            total: stats.total,
            allocated: stats.allocated,
            available: stats.available,
            with_ac: stats.with_ac,
            with_washroom: stats.with_washroom,
        },
    )
}

async fn add_room(
    State(engine): State<Arc<Engine>>,
    Json(body): Json<AddRoomBody>,
) -> Result<Response, ApiError> {
    let capacity = check_capacity(body.capacity)?;
    let room = engine
        .add_room(&body.room_no, capacity, body.has_ac, body.has_attached_washroom)
        .await?;
    let message = format!("Room {} added successfully", room.room_no);
    Ok(respond(StatusCode::CREATED, message, RoomBody::from(room)))
}

async fn list_rooms(
    State(engine): State<Arc<Engine>>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let min_capacity = match params.min_capacity {
        Some(min) if min < 1 => {
            return Err(ApiError::bad_request("minCapacity must be a positive integer"));
        }
        Some(min) => Some(u32::try_from(min).unwrap_or(u32::MAX)),
        None => None,
    };
    let filter = RoomFilter {
        min_capacity,
        has_ac: params.has_ac,
        has_washroom: params.has_attached_washroom,
        is_allocated: params.is_allocated,
    };
    let page = engine
        .list_rooms(
            &filter,
            params.page.unwrap_or(1),
            params.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        )
        .await?;

    Ok(respond(
        StatusCode::OK,
        "Success",
        RoomListBody {
            rooms: page.rooms.into_iter().map(RoomBody::from).collect(),
            pagination: PaginationBody {
                total: page.total,
                page: page.page,
                limit: page.limit,
                total_pages: page.total_pages,
            },
        },
    ))
}

async fn get_room(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let room = engine.get_room(parse_id(&id)?).await?;
    Ok(respond(StatusCode::OK, "Success", RoomBody::from(room)))
}

async fn update_room(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateRoomBody>,
) -> Result<Response, ApiError> {
    let patch = RoomPatch {
        room_no: body.room_no,
        capacity: body.capacity.map(check_capacity).transpose()?,
        has_ac: body.has_ac,
        has_washroom: body.has_attached_washroom,
    };
    let room = engine.update_room(parse_id(&id)?, patch).await?;
    Ok(respond(StatusCode::OK, "Room updated successfully", RoomBody::from(room)))
}

async fn delete_room(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    engine.delete_room(parse_id(&id)?).await?;
    Ok(respond(StatusCode::OK, "Room deleted successfully", ()))
}

async fn allocate_room(
    State(engine): State<Arc<Engine>>,
    Json(body): Json<AllocateBody>,
) -> Result<Response, ApiError> {
    if body.students < 1 {
        return Err(ApiError::bad_request("Number of students must be a positive integer"));
    }
    let students = u32::try_from(body.students).unwrap_or(u32::MAX);

    let outcome = engine
        .allocate(students, body.needs_ac, body.needs_washroom, body.group_name)
        .await?;

    let message = match &outcome.room {
        Some(room) => format!("Room {} allocated successfully", room.room_no),
        None => "No room available matching the specified requirements".to_string(),
    };
    Ok(respond(
        StatusCode::OK,
        message,
        AllocationBody {
            allocated: outcome.allocated,
            room: outcome.room.map(RoomBody::from),
        },
    ))
}

async fn deallocate_room(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let room = engine.deallocate(parse_id(&id)?).await?;
    let message = format!("Room {} deallocated successfully", room.room_no);
    Ok(respond(StatusCode::OK, message, RoomBody::from(room)))
}

async fn unknown_route(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Route {uri} not found"))
}

// ── Middleware ───────────────────────────────────────────

/// Request RED metrics, keyed on the matched route template so path
/// parameters don't explode label cardinality.
async fn track_metrics(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());

    let start = Instant::now();
    let response = next.run(req).await;

    metrics::counter!(
        observability::REQUESTS_TOTAL,
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    metrics::histogram!(
        observability::REQUEST_DURATION_SECONDS,
        "method" => method,
        "path" => path
    )
    .record(start.elapsed().as_secs_f64());

    response
}
