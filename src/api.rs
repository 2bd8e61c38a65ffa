use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post, put};
use axum::Router;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use ulid::Ulid;

use crate::auth::Identity;
use crate::engine::{Engine, EngineError, ErrorKind};
use crate::model::{Booking, BookingView, GroundInfo, PendingSlot};
use crate::observability::{REQUESTS_TOTAL, REQUEST_DURATION_SECONDS};

pub type AppState = Arc<Engine>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub fn router(engine: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // user surface
        .route("/user/register", post(register_user))
        .route("/user/grounds", get(list_grounds))
        .route("/user/ground/:id", get(get_ground))
        .route("/user/search-ground", post(search_ground))
        .route("/user/sports", get(list_sports))
        .route("/user/recommendation", get(recommendation))
        .route("/user/book-slot/:ground_id", post(book_slot))
        .route("/user/remove-slot/:booking_id", post(remove_slot))
        .route("/user/bookings", get(user_bookings))
        .route("/user/bookslot", post(request_slot))
        // admin surface
        .route("/admin/ground", post(create_ground))
        .route("/admin/grounds", get(admin_grounds))
        .route("/admin/ground/:id", put(update_ground).delete(delete_ground))
        .route("/admin/bookings", get(admin_bookings))
        .route("/admin/pending-slots", get(admin_pending_slots))
        .route("/admin/pending-slots/:id/approve", post(approve_pending))
        .route("/admin/pending-slots/:id/reject", post(reject_pending))
        .route("/admin/cancel-slot/:booking_id", post(admin_cancel_slot))
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

// ── Request DTOs ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchGroundRequest {
    pub sport: String,
}

#[derive(Debug, Deserialize)]
pub struct BookSlotRequest {
    pub date: NaiveDate,
    pub time_slot: String,
}

#[derive(Debug, Deserialize)]
pub struct RequestSlotRequest {
    pub ground_id: Ulid,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
}

fn default_published() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct GroundRequest {
    pub name: String,
    #[serde(default)]
    pub available_slots: Vec<String>,
    #[serde(default)]
    pub sports: Vec<String>,
    #[serde(default = "default_published")]
    pub published: bool,
}

// ── Error mapping and instrumentation ────────────────────────────

fn map_engine_error(err: EngineError) -> (StatusCode, Json<ApiError>) {
    let status = match err.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::ValidationFailed => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ApiError {
            error: err.to_string(),
            code: err.kind().as_str().to_string(),
        }),
    )
}

fn forbidden() -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::FORBIDDEN,
        Json(ApiError {
            error: "admin role required".to_string(),
            code: "unauthorized".to_string(),
        }),
    )
}

fn require_admin(identity: &Identity) -> ApiResult<()> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(forbidden())
    }
}

/// Drive an engine operation, recording RED metrics per operation and
/// mapping failures to the uniform HTTP error shape.
async fn run<T>(
    op: &'static str,
    fut: impl Future<Output = Result<T, EngineError>>,
) -> ApiResult<T> {
    let start = Instant::now();
    let result = fut.await;
    metrics::histogram!(REQUEST_DURATION_SECONDS, "op" => op)
        .record(start.elapsed().as_secs_f64());
    let status = match &result {
        Ok(_) => "ok",
        Err(e) => e.kind().as_str(),
    };
    metrics::counter!(REQUESTS_TOTAL, "op" => op, "status" => status).increment(1);
    result.map_err(map_engine_error)
}

// ── Handlers ─────────────────────────────────────────────────────

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn register_user(
    State(engine): State<AppState>,
    identity: Identity,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    run(
        "register_user",
        engine.register_user(identity.user_id, req.username),
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": identity.user_id })),
    ))
}

async fn list_grounds(State(engine): State<AppState>) -> Json<Vec<GroundInfo>> {
    Json(engine.list_grounds(true).await)
}

async fn get_ground(
    State(engine): State<AppState>,
    Path(id): Path<Ulid>,
) -> ApiResult<Json<GroundInfo>> {
    match engine.get_ground_info(id).await {
        Some(info) => Ok(Json(info)),
        None => Err(map_engine_error(EngineError::GroundNotFound(id))),
    }
}

async fn search_ground(
    State(engine): State<AppState>,
    identity: Identity,
    Json(req): Json<SearchGroundRequest>,
) -> ApiResult<Json<Vec<GroundInfo>>> {
    let grounds = run(
        "search_ground",
        engine.search_grounds(identity.user_id, &req.sport),
    )
    .await?;
    Ok(Json(grounds))
}

async fn list_sports(State(engine): State<AppState>) -> Json<Vec<String>> {
    Json(engine.list_sports().await)
}

async fn recommendation(
    State(engine): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<Vec<GroundInfo>>> {
    let grounds = run("recommendation", engine.recommend(identity.user_id)).await?;
    Ok(Json(grounds))
}

async fn book_slot(
    State(engine): State<AppState>,
    identity: Identity,
    Path(ground_id): Path<Ulid>,
    Json(req): Json<BookSlotRequest>,
) -> ApiResult<Json<Booking>> {
    let booking = run(
        "book_slot",
        engine.create_booking(ground_id, identity.user_id, req.date, &req.time_slot),
    )
    .await?;
    Ok(Json(booking))
}

async fn remove_slot(
    State(engine): State<AppState>,
    identity: Identity,
    Path(booking_id): Path<Ulid>,
) -> ApiResult<Json<serde_json::Value>> {
    run(
        "remove_slot",
        engine.cancel_booking(booking_id, identity.user_id, false),
    )
    .await?;
    Ok(Json(serde_json::json!({ "canceled": booking_id })))
}

async fn user_bookings(
    State(engine): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<Vec<BookingView>>> {
    let bookings = run("user_bookings", engine.list_user_bookings(identity.user_id)).await?;
    Ok(Json(bookings))
}

async fn request_slot(
    State(engine): State<AppState>,
    identity: Identity,
    Json(req): Json<RequestSlotRequest>,
) -> ApiResult<(StatusCode, Json<PendingSlot>)> {
    let pending = run(
        "request_slot",
        engine.request_slot(
            req.ground_id,
            identity.user_id,
            req.date,
            req.start_time,
            req.end_time,
        ),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(pending)))
}

async fn create_ground(
    State(engine): State<AppState>,
    identity: Identity,
    Json(req): Json<GroundRequest>,
) -> ApiResult<(StatusCode, Json<GroundInfo>)> {
    require_admin(&identity)?;
    let info = run(
        "create_ground",
        engine.create_ground(
            identity.user_id,
            req.name,
            req.available_slots,
            req.sports,
            req.published,
        ),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(info)))
}

async fn admin_grounds(
    State(engine): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<Vec<GroundInfo>>> {
    require_admin(&identity)?;
    Ok(Json(engine.list_grounds_by_admin(identity.user_id).await))
}

async fn update_ground(
    State(engine): State<AppState>,
    identity: Identity,
    Path(id): Path<Ulid>,
    Json(req): Json<GroundRequest>,
) -> ApiResult<Json<GroundInfo>> {
    require_admin(&identity)?;
    let info = run(
        "update_ground",
        engine.update_ground(id, req.name, req.available_slots, req.sports, req.published),
    )
    .await?;
    Ok(Json(info))
}

async fn delete_ground(
    State(engine): State<AppState>,
    identity: Identity,
    Path(id): Path<Ulid>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&identity)?;
    run("delete_ground", engine.delete_ground(id)).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

async fn admin_bookings(
    State(engine): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<Vec<BookingView>>> {
    require_admin(&identity)?;
    Ok(Json(engine.list_all_bookings().await))
}

async fn admin_pending_slots(
    State(engine): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<Vec<PendingSlot>>> {
    require_admin(&identity)?;
    Ok(Json(engine.list_pending()))
}

async fn approve_pending(
    State(engine): State<AppState>,
    identity: Identity,
    Path(id): Path<Ulid>,
) -> ApiResult<Json<Booking>> {
    require_admin(&identity)?;
    let booking = run("approve_pending", engine.approve_pending(id)).await?;
    Ok(Json(booking))
}

async fn reject_pending(
    State(engine): State<AppState>,
    identity: Identity,
    Path(id): Path<Ulid>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&identity)?;
    run("reject_pending", engine.reject_pending(id)).await?;
    Ok(Json(serde_json::json!({ "rejected": id })))
}

async fn admin_cancel_slot(
    State(engine): State<AppState>,
    identity: Identity,
    Path(booking_id): Path<Ulid>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&identity)?;
    run(
        "admin_cancel_slot",
        engine.cancel_booking(booking_id, identity.user_id, true),
    )
    .await?;
    Ok(Json(serde_json::json!({ "canceled": booking_id })))
}
