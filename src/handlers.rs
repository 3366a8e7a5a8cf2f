use crate::analyzer::{analyze_extracted_contract, ContractReport};
use crate::comparison::{parse_ranking_table, ComparisonService};
use crate::config::Config;
use crate::contract_store::ContractStore;
use crate::errors::AppError;
use crate::extraction::ExtractionService;
use crate::gemini_client::{GeminiClient, RetryPolicy};
use crate::models::{CompareResponse, DeleteResponse};
use crate::rate_limiter::RateLimiter;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Html,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Stored contract collection.
    pub store: Arc<ContractStore>,
    /// Generative-AI client; `None` when no API key is configured.
    pub gemini: Option<GeminiClient>,
}

impl AppState {
    /// Wires the store and, when an API key is configured, the Gemini client
    /// with its process-wide rate limiter.
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let store = Arc::new(ContractStore::new(config.contracts_path.clone()));

        let gemini = match config.google_api_key.clone() {
            Some(api_key) => {
                let limiter = Arc::new(RateLimiter::new(config.min_call_interval));
                let retry = RetryPolicy {
                    max_attempts: config.max_retries,
                    base_delay: config.retry_base_delay,
                };
                Some(GeminiClient::new(
                    config.gemini_base_url.clone(),
                    api_key,
                    config.gemini_model.clone(),
                    retry,
                    limiter,
                )?)
            }
            None => None,
        };

        Ok(Self {
            config,
            store,
            gemini,
        })
    }

    fn gemini(&self) -> Result<GeminiClient, AppError> {
        self.gemini.clone().ok_or_else(|| {
            AppError::ConfigError("GOOGLE_API_KEY environment variable is not set".to_string())
        })
    }
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "contract-comparator",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

async fn serve_page(state: &AppState, page: &str) -> Result<Html<String>, AppError> {
    let path = state.config.static_dir.join(page);
    tokio::fs::read_to_string(&path)
        .await
        .map(Html)
        .map_err(|_| AppError::NotFound(format!("{} not found", page)))
}

/// GET /
///
/// Comparison form.
pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    serve_page(&state, "index.html").await
}

/// GET /extractor
///
/// PDF extraction form.
pub async fn extractor(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    serve_page(&state, "extractor.html").await
}

/// POST /extract
///
/// Extracts one contract level from an uploaded PDF.
///
/// Expects a multipart form with a `pdf_file` file field and a `level_name`
/// text field.
///
/// # Returns
///
/// * `Result<Json<Value>, AppError>` - The extracted contract record or an error.
pub async fn extract(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    tracing::info!("POST /extract");

    let mut pdf: Option<(String, Vec<u8>)> = None;
    let mut level_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("pdf_file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;
                pdf = Some((filename, bytes.to_vec()));
            }
            Some("level_name") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid level name: {}", e)))?;
                level_name = Some(text);
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        pdf.ok_or_else(|| AppError::BadRequest("No PDF file provided".to_string()))?;
    if filename.is_empty() {
        return Err(AppError::BadRequest("No selected file".to_string()));
    }
    let level_name = level_name
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .ok_or_else(|| AppError::BadRequest("No level name provided".to_string()))?;

    tracing::info!("Received file: {} ({} bytes), level: {}", filename, bytes.len(), level_name);

    let service = ExtractionService::new(&state.config, state.gemini()?, state.store.clone());
    let extracted = service.extract(bytes, &filename, &level_name).await?;

    Ok(Json(extracted))
}

/// POST /compare
///
/// Ranks stored contracts against the user's needs.
///
/// # Returns
///
/// * `Result<Json<CompareResponse>, AppError>` - Markdown table and its parsed rows.
pub async fn compare(
    State(state): State<Arc<AppState>>,
    Json(user_data): Json<Value>,
) -> Result<Json<CompareResponse>, AppError> {
    tracing::info!("POST /compare");

    let service = ComparisonService::new(state.gemini()?, state.store.clone());
    let table = service.find_top_contracts(&user_data).await?;
    let rows = parse_ranking_table(&table);

    tracing::info!("Comparison returned {} ranked contracts", rows.len());
    Ok(Json(CompareResponse { table, rows }))
}

/// GET /api/contracts
///
/// Returns the stored contract collection.
pub async fn get_contracts(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let contracts = state.store.list().await?;
    tracing::info!(
        "Contracts served: {} records",
        contracts.as_array().map(Vec::len).unwrap_or(0)
    );
    Ok(Json(contracts))
}

/// DELETE /api/contracts/delete/:level_id
///
/// Removes a contract from the collection.
pub async fn delete_contract(
    State(state): State<Arc<AppState>>,
    Path(level_id): Path<String>,
) -> (StatusCode, Json<DeleteResponse>) {
    tracing::info!("DELETE contract {}", level_id);

    match state.store.delete(&level_id).await {
        Ok(message) => (
            StatusCode::OK,
            Json(DeleteResponse {
                success: true,
                message,
            }),
        ),
        Err(e) => {
            let status = match e.root() {
                AppError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => {
                    tracing::error!("Failed to delete contract {}: {}", level_id, e);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            let message = match e.root() {
                AppError::NotFound(msg) | AppError::StorageError(msg) => msg.clone(),
                other => other.to_string(),
            };
            (
                status,
                Json(DeleteResponse {
                    success: false,
                    message,
                }),
            )
        }
    }
}

/// POST /api/analyze
///
/// Analyzes the guarantees of a contract record sent in the body.
pub async fn analyze_contract(Json(contract): Json<Value>) -> Result<Json<ContractReport>, AppError> {
    let report = analyze_extracted_contract(&contract)?;
    tracing::info!(
        "Analyzed contract '{}': {} guarantees",
        report.contract_info.contract_name,
        report.analysis.summary.total_guarantees
    );
    Ok(Json(report))
}

/// GET /api/contracts/:level_id/analysis
///
/// Analyzes a stored contract.
pub async fn stored_contract_analysis(
    State(state): State<Arc<AppState>>,
    Path(level_id): Path<String>,
) -> Result<Json<ContractReport>, AppError> {
    let contract = state.store.find(&level_id).await?.ok_or_else(|| {
        AppError::NotFound(format!("Contract with level_id '{}' not found.", level_id))
    })?;

    Ok(Json(analyze_extracted_contract(&contract)?))
}
