//! REST API for the packing decision service.
//!
//! Exposes the session lifecycle over HTTP: start a packing session,
//! inspect the cage, and request the next placement decision. The session
//! is process-wide mutable state behind a single mutex that is held for
//! the full duration of every handler touching it.
//!
//! Uses Axum as the web framework and supports CORS.

use std::sync::{Arc, Mutex};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::{
    Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::anchors::AnchorEngine;
use crate::config::{ApiConfig, CageDefaults, SolverConfig};
use crate::model::{CageTrolley, Item, ValidationError};
use crate::packer::{HeuristicPacker, MctsPacker, Packer, Placement};

/// Shared state of the API server.
///
/// The cage session lives for the whole process and survives across
/// decisions; a new `/start_packing` call replaces it.
#[derive(Clone)]
struct ApiState {
    session: Arc<Mutex<Option<CageTrolley>>>,
    solver: SolverConfig,
    cage_defaults: CageDefaults,
}

/// Item payload of the decision endpoint.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ItemDto {
    pub id: u64,
    #[schema(value_type = [f64; 3], example = json!([30.0, 40.0, 20.0]))]
    pub base_dimensions: (f64, f64, f64),
    pub weight: f64,
    #[serde(default = "all_rotations")]
    pub allowed_rotations: Vec<u8>,
    #[serde(default)]
    pub is_fragile: bool,
}

fn all_rotations() -> Vec<u8> {
    (0..6).collect()
}

impl ItemDto {
    fn into_item(self, measurement_error: f64) -> Result<Item, ValidationError> {
        Item::new(
            self.id,
            self.base_dimensions.into(),
            self.weight,
            self.allowed_rotations,
            self.is_fragile,
            measurement_error,
        )
    }
}

impl From<&Item> for ItemDto {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            base_dimensions: item.base_dimensions.as_tuple(),
            weight: item.weight,
            allowed_rotations: item.allowed_rotations.clone(),
            is_fragile: item.is_fragile,
        }
    }
}

/// Request body for `/start_packing`; omitted fields fall back to the
/// configured cage defaults.
#[derive(Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "C001",
    "dimensions": [100.0, 100.0, 150.0],
    "weight_limit": 300.0
}))]
pub struct StartPackingRequest {
    pub id: Option<String>,
    #[schema(value_type = Option<[f64; 3]>)]
    pub dimensions: Option<(f64, f64, f64)>,
    pub weight_limit: Option<f64>,
}

/// Request body for `/decide_next_move`.
#[derive(Deserialize, ToSchema)]
#[schema(example = json!({
    "strategy": "ems",
    "algorithm": "mcts",
    "num_simu": 200,
    "candidate_items": [
        { "id": 1, "base_dimensions": [30.0, 40.0, 20.0], "weight": 5.0 }
    ]
}))]
pub struct DecideMoveRequest {
    /// Free-space strategy: "cp" (corner points) or "ems" (surfaces).
    pub strategy: String,
    /// Decision algorithm: "heuristics" or "mcts".
    pub algorithm: String,
    /// MCTS iteration budget; defaults to the configured value.
    pub num_simu: Option<usize>,
    /// Seed for reproducible MCTS decisions; random when omitted.
    pub rng_seed: Option<u64>,
    pub candidate_items: Vec<ItemDto>,
}

/// A packed item as reported in the cage state.
#[derive(Serialize, ToSchema)]
pub struct PackedItemDto {
    pub id: u64,
    #[schema(value_type = [f64; 3])]
    pub base_dimensions: (f64, f64, f64),
    pub weight: f64,
    pub is_fragile: bool,
    #[schema(value_type = [f64; 3])]
    pub position: (f64, f64, f64),
    pub rotation_type: u8,
}

/// Snapshot of the cage session.
#[derive(Serialize, ToSchema)]
pub struct CageStateDto {
    pub id: String,
    #[schema(value_type = [f64; 3])]
    pub dimensions: (f64, f64, f64),
    pub weight_limit: f64,
    pub current_weight: f64,
    pub packed_items: Vec<PackedItemDto>,
}

impl From<&CageTrolley> for CageStateDto {
    fn from(cage: &CageTrolley) -> Self {
        Self {
            id: cage.id.clone(),
            dimensions: cage.dimensions.as_tuple(),
            weight_limit: cage.weight_limit,
            current_weight: cage.current_weight(),
            packed_items: cage
                .packed_items
                .iter()
                .map(|item| PackedItemDto {
                    id: item.id,
                    base_dimensions: item.base_dimensions.as_tuple(),
                    weight: item.weight,
                    is_fragile: item.is_fragile,
                    position: item
                        .placement
                        .map(|p| p.position.as_tuple())
                        .unwrap_or((0.0, 0.0, 0.0)),
                    rotation_type: item.placement.map(|p| p.rotation).unwrap_or(0),
                })
                .collect(),
        }
    }
}

/// The decided move.
#[derive(Serialize, ToSchema)]
pub struct PlacementDto {
    pub item: ItemDto,
    #[schema(value_type = [f64; 3])]
    pub position: (f64, f64, f64),
    pub rotation_type: u8,
}

/// Unified response envelope of the session endpoints.
#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    /// "success" or "no_move_possible".
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cage_state: Option<CageStateDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<PlacementDto>,
}

impl SessionResponse {
    fn success() -> Self {
        Self {
            status: "success".to_string(),
            message: None,
            cage_state: None,
            decision: None,
        }
    }

    fn no_move(message: impl Into<String>) -> Self {
        Self {
            status: "no_move_possible".to_string(),
            message: Some(message.into()),
            cage_state: None,
            decision: None,
        }
    }

    fn with_cage_state(mut self, cage: &CageTrolley) -> Self {
        self.cage_state = Some(cage.into());
        self
    }

    fn with_decision(mut self, decision: PlacementDto) -> Self {
        self.decision = Some(decision);
        self
    }
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            details: details.into(),
        }),
    )
        .into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn no_session_error() -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "No packing session",
        "No session is active. Call /start_packing first.",
    )
}

#[derive(Clone, Copy)]
enum Algorithm {
    Heuristics,
    Mcts,
}

fn parse_strategy(raw: &str) -> Option<AnchorEngine> {
    match raw.to_ascii_lowercase().as_str() {
        "cp" => Some(AnchorEngine::CornerPoint),
        "ems" => Some(AnchorEngine::SupportSurface),
        _ => None,
    }
}

fn parse_algorithm(raw: &str) -> Option<Algorithm> {
    match raw.to_ascii_lowercase().as_str() {
        "heuristics" => Some(Algorithm::Heuristics),
        "mcts" => Some(Algorithm::Mcts),
        _ => None,
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_start_packing, handle_get_cage_state, handle_decide_next_move),
    components(schemas(
        StartPackingRequest,
        DecideMoveRequest,
        SessionResponse,
        CageStateDto,
        PackedItemDto,
        PlacementDto,
        ItemDto,
        ErrorResponse
    )),
    tags((name = "packing", description = "Online 3D bin-packing decisions"))
)]
struct ApiDoc;

/// Starts the API server.
///
/// Configures CORS for cross-origin requests and blocks until the server
/// is terminated.
pub async fn start_api_server(config: ApiConfig, solver: SolverConfig, cage_defaults: CageDefaults) {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let state = ApiState {
        session: Arc::new(Mutex::new(None)),
        solver,
        cage_defaults,
    };

    let app = Router::new()
        .route("/start_packing", post(handle_start_packing))
        .route("/get_cage_state", get(handle_get_cage_state))
        .route("/decide_next_move", post(handle_decide_next_move))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .layer(cors)
        .with_state(state);

    let addr = config.socket_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            panic!("could not bind API server to {}: {}", addr, err);
        }
    };

    info!(
        "🚀 cage packing service running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        info!("   local access: http://localhost:{}", config.port());
    }
    info!("📦 endpoints: POST /start_packing, GET /get_cage_state, POST /decide_next_move");
    info!("📑 documentation: GET /docs/openapi.json");

    if let Err(err) = axum::serve(listener, app).await {
        warn!("API server terminated with an error: {err}");
    }
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// Handler for POST /start_packing.
///
/// Creates a fresh cage session, replacing any in-flight one.
#[utoipa::path(
    post,
    path = "/start_packing",
    request_body = StartPackingRequest,
    responses(
        (status = 200, description = "Session initialized", body = SessionResponse),
        (status = 400, description = "Invalid cage parameters", body = ErrorResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Malformed request body", body = ErrorResponse)
    ),
    tag = "packing"
)]
async fn handle_start_packing(
    State(state): State<ApiState>,
    payload: Result<Json<StartPackingRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };

    let id = request.id.unwrap_or_else(|| "C001".to_string());
    let dimensions = request
        .dimensions
        .map(Into::into)
        .unwrap_or(state.cage_defaults.dimensions);
    let weight_limit = request
        .weight_limit
        .unwrap_or(state.cage_defaults.weight_limit);

    let cage = match CageTrolley::new(id, dimensions, weight_limit) {
        Ok(cage) => cage,
        Err(err) => {
            return error_response(StatusCode::BAD_REQUEST, "Invalid cage parameters", err.to_string());
        }
    };

    info!("📥 /start_packing: new session for cage {}", cage.id);
    let response = SessionResponse::success().with_cage_state(&cage);

    let mut session = state.session.lock().expect("session mutex poisoned");
    *session = Some(cage);

    (StatusCode::OK, Json(response)).into_response()
}

/// Handler for GET /get_cage_state.
#[utoipa::path(
    get,
    path = "/get_cage_state",
    responses(
        (status = 200, description = "Current cage state", body = SessionResponse),
        (status = 404, description = "No active session", body = ErrorResponse)
    ),
    tag = "packing"
)]
async fn handle_get_cage_state(State(state): State<ApiState>) -> Response {
    let session = state.session.lock().expect("session mutex poisoned");
    match session.as_ref() {
        Some(cage) => {
            let response = SessionResponse::success().with_cage_state(cage);
            (StatusCode::OK, Json(response)).into_response()
        }
        None => no_session_error(),
    }
}

/// Handler for POST /decide_next_move.
///
/// Computes the best next placement for the candidate items and commits
/// it to the session cage. "No move possible" is a normal outcome, not an
/// error.
#[utoipa::path(
    post,
    path = "/decide_next_move",
    request_body = DecideMoveRequest,
    responses(
        (status = 200, description = "Decision made or no move possible", body = SessionResponse),
        (status = 400, description = "Unknown strategy/algorithm or invalid items", body = ErrorResponse),
        (status = 404, description = "No active session", body = ErrorResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Malformed request body", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    ),
    tag = "packing"
)]
async fn handle_decide_next_move(
    State(state): State<ApiState>,
    payload: Result<Json<DecideMoveRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };

    let Some(engine) = parse_strategy(&request.strategy) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Unknown strategy",
            format!("'{}' is not one of: cp, ems", request.strategy),
        );
    };
    let Some(algorithm) = parse_algorithm(&request.algorithm) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Unknown algorithm",
            format!("'{}' is not one of: heuristics, mcts", request.algorithm),
        );
    };

    let mut solver = state.solver;
    if let Some(num_simu) = request.num_simu {
        solver.num_simulations = num_simu;
    }
    let seed = request.rng_seed.unwrap_or_else(rand::random);

    let candidate_dtos = request.candidate_items;
    let converted: Result<Vec<Item>, ValidationError> = candidate_dtos
        .iter()
        .cloned()
        .map(|dto| dto.into_item(solver.measurement_error))
        .collect();
    let candidates = match converted {
        Ok(items) => items,
        Err(err) => {
            return error_response(StatusCode::BAD_REQUEST, "Invalid item data", err.to_string());
        }
    };

    info!(
        "📥 /decide_next_move: {} candidates, strategy {}, algorithm {}",
        candidates.len(),
        request.strategy,
        request.algorithm
    );

    // The decision is CPU-bound; run it off the async executor while
    // holding the session lock for the whole decision + commit.
    let session = Arc::clone(&state.session);
    let result = tokio::task::spawn_blocking(move || {
        let mut guard = session.lock().expect("session mutex poisoned");
        let Some(cage) = guard.as_mut() else {
            return Ok(DecisionOutcome::NoSession);
        };

        let mut packer: Box<dyn Packer> = match algorithm {
            Algorithm::Heuristics => Box::new(HeuristicPacker::new(engine, solver)),
            Algorithm::Mcts => Box::new(MctsPacker::new(engine, solver, seed)),
        };
        packer
            .pack(cage, &candidates)
            .map(|placement| match placement {
                Some(placement) => DecisionOutcome::Placed(placement),
                None => DecisionOutcome::NoMove,
            })
    })
    .await;

    let outcome = match result {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Packing state corrupt",
                err.to_string(),
            );
        }
        Err(err) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Decision task failed",
                err.to_string(),
            );
        }
    };

    match outcome {
        DecisionOutcome::NoSession => no_session_error(),
        DecisionOutcome::NoMove => {
            info!("   no feasible placement found");
            let response =
                SessionResponse::no_move("No feasible placement exists for the candidate items.");
            (StatusCode::OK, Json(response)).into_response()
        }
        DecisionOutcome::Placed(placement) => {
            info!(
                "   placed item {} at {:?} rotation {}",
                placement.item_id, placement.position, placement.rotation
            );
            let item_dto = candidate_dtos
                .into_iter()
                .find(|dto| dto.id == placement.item_id)
                .expect("decision refers to a candidate");
            let response = SessionResponse::success().with_decision(PlacementDto {
                item: item_dto,
                position: placement.position.as_tuple(),
                rotation_type: placement.rotation,
            });
            (StatusCode::OK, Json(response)).into_response()
        }
    }
}

enum DecisionOutcome {
    NoSession,
    NoMove,
    Placed(Placement),
}
