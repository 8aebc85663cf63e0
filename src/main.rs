use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{Bytes, Full},
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod knowledge;
mod mock;
mod model;
mod plantnet;
mod resolver;
mod utils;

use model::Model;
use plantnet::PlantNetClient;
use resolver::{CropDiagnosisResolver, DiagnosisRecord};
use utils::Config;

const MODEL_PATH: &str = "./model/frozen_graph.pb";
const CLASS_LIST_PATH: &str = "./model/class_list.txt";

struct AppState {
    resolver: CropDiagnosisResolver,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let model = if utils::ensure_model_files(MODEL_PATH, CLASS_LIST_PATH).await {
        match Model::new(MODEL_PATH, CLASS_LIST_PATH) {
            Ok(model) => {
                info!("Classifier loaded with {} classes", model.class_count());
                Some(model)
            }
            Err(err) => {
                warn!("Failed to load classifier: {err:#}; continuing without it");
                None
            }
        }
    } else {
        None
    };

    let plantnet = PlantNetClient::new(config.plantnet_api_key.clone())?;
    let state = Arc::new(AppState {
        resolver: CropDiagnosisResolver::new(model, plantnet),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on http://{addr}");
    axum::Server::bind(&addr)
        .serve(app(state, config.body_limit_bytes).into_make_service())
        .await?;
    Ok(())
}

fn app(state: Arc<AppState>, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/api/analyze-crop", post(analyze_crop))
        .route("/api/weather", get(weather))
        .route("/api/field-data/:field_name", get(field_data))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    image: Option<String>,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    detections: Vec<DiagnosisRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(AnalyzeResponse {
            detections: Vec::new(),
            note: None,
            error: Some(message.into()),
        }),
    )
        .into_response()
}

async fn analyze_crop(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "No image data provided");
    };
    let Some(image_b64) = request.image.filter(|s| !s.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "No image data provided");
    };

    // Browsers send data URLs; the payload follows the first comma.
    let encoded = image_b64
        .split_once(',')
        .map(|(_, rest)| rest)
        .unwrap_or(image_b64.as_str());

    let image_data = match STANDARD.decode(encoded.trim()) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Rejecting payload with undecodable base64: {err}");
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Invalid image format: {err}"),
            );
        }
    };

    match state.resolver.analyze(&image_data).await {
        Ok(analysis) => (
            StatusCode::OK,
            Json(AnalyzeResponse {
                detections: analysis.detections,
                note: analysis.note,
                error: None,
            }),
        )
            .into_response(),
        Err(err) => {
            warn!("Rejecting undecodable image: {err}");
            error_response(
                StatusCode::BAD_REQUEST,
                format!("Invalid image format: {err}"),
            )
        }
    }
}

async fn weather() -> Json<serde_json::Value> {
    Json(json!({
        "temperature": 28,
        "humidity": 65,
        "rainfall": 120
    }))
}

async fn field_data(Path(field_name): Path<String>) -> Json<serde_json::Value> {
    Json(json!({
        "field_name": field_name,
        "soil_type": "Loamy",
        "crop": "Wheat",
        "area": "2 hectares"
    }))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK" }))
}

fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> axum::http::Response<Full<Bytes>> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    error!("Handler panicked: {detail}");

    let body = json!({
        "detections": [],
        "error": format!("Internal Server Error: {detail}")
    })
    .to_string();
    axum::http::Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::from(body))
        .expect("static panic response")
}
