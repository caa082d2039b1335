//! Endpoint handlers and router assembly.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use clickhouse_flatfile_transfer::{
    infer_flat_file_schema, list_tables, preview_rows, quote_ident, quote_table,
    transfer_database_to_file, transfer_file_to_database, ClickHouseClient, ClickHouseReader,
    FlatFileReader, Preview, TransferError, TransferResult,
};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::models::{
    parse_source, strip_type_suffix, IngestRequest, IngestResponse, PreviewRequest, SchemaRequest,
    Source,
};

/// Rows returned by `/preview`.
pub const PREVIEW_LIMIT: usize = 100;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
}

/// Assemble the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/schema", post(schema))
        .route("/preview", post(preview))
        .route("/ingest", post(ingest))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Table list for a ClickHouse source, or inferred columns for a flat file.
async fn schema(
    State(state): State<AppState>,
    Json(req): Json<SchemaRequest>,
) -> Result<Response, ApiError> {
    match parse_source(&req.source)? {
        Source::ClickHouse => {
            let client = ClickHouseClient::new(req.click_house_config.connection()?)?;
            let tables = list_tables(&client).await?;
            Ok(Json(tables).into_response())
        }
        Source::FlatFile => {
            let path = state
                .config
                .resolve_data_path(req.flat_file_config.file_name()?)?;
            let columns =
                infer_flat_file_schema(&path, req.flat_file_config.delimiter()).await?;
            Ok(Json(columns).into_response())
        }
    }
}

/// First rows of either source, re-encoded to display text.
async fn preview(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<Preview>, ApiError> {
    let preview = match parse_source(&req.source)? {
        Source::ClickHouse => {
            if req.table_name.is_empty() || req.columns.is_empty() {
                return Err(ApiError::bad_request("missing table name or columns"));
            }
            let client = ClickHouseClient::new(req.click_house_config.connection()?)?;
            let query = format!(
                "{} LIMIT {PREVIEW_LIMIT}",
                select_query(&req.columns, &req.table_name)
            );
            info!(%query, "running preview query");
            preview_rows(ClickHouseReader::new(&client, query), PREVIEW_LIMIT).await?
        }
        Source::FlatFile => {
            let path = state
                .config
                .resolve_data_path(req.flat_file_config.file_name()?)?;
            let reader = FlatFileReader::new(path, req.flat_file_config.delimiter());
            preview_rows(reader, PREVIEW_LIMIT).await?
        }
    };
    Ok(Json(preview))
}

/// Run a transfer in either direction.
///
/// ClickHouse sources select the requested columns and write to the fixed
/// output file; flat-file sources load into the requested table. A failed
/// transfer surfaces the error kind, message, and partial record count.
async fn ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let source = parse_source(&req.source)?;
    if req.selected_columns.is_empty() {
        return Err(ApiError::bad_request("no columns selected"));
    }
    let client = ClickHouseClient::new(req.click_house_config.connection()?)?;
    let table = req.click_house_config.table()?;
    let delimiter = req.flat_file_config.delimiter();

    match source {
        Source::ClickHouse => {
            tokio::fs::create_dir_all(&state.config.output_dir)
                .await
                .map_err(TransferError::Io)?;
            let output = state.config.output_file();
            let query = select_query(&req.selected_columns, table);
            info!(%query, output = %output.display(), "running ingestion");
            let result = transfer_database_to_file(&client, &query, &output, delimiter).await;
            respond(result, Some(output))
        }
        Source::FlatFile => {
            let path = state
                .config
                .resolve_data_path(req.flat_file_config.file_name()?)?;
            info!(file = %path.display(), table, "running ingestion");
            let result = transfer_file_to_database(&client, &path, delimiter, table).await;
            respond(result, None)
        }
    }
}

fn select_query(columns: &[String], table: &str) -> String {
    let cols = columns
        .iter()
        .map(|c| quote_ident(strip_type_suffix(c)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {cols} FROM {}", quote_table(table))
}

fn respond(result: TransferResult, output: Option<PathBuf>) -> Result<Json<IngestResponse>, ApiError> {
    match result.error {
        Some(error) => Err(ApiError::from_transfer(error, result.record_count)),
        None => Ok(Json(IngestResponse {
            status: "success".to_string(),
            record_count: result.record_count,
            output_file: output.map(|p| p.display().to_string()),
        })),
    }
}
