//! HTTP surface for capacity and history queries.
//!
//! The API is read-only over the indexer's database: it never mutates the
//! trust graph. Zero capacity is a successful answer; only malformed queries
//! and storage failures map to error statuses.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;

use creditnet_core::constants::DEFAULT_MAX_HOPS;
use creditnet_core::error::CoreError;
use creditnet_core::types::Address;
use creditnet_indexer::directory::SqliteDirectory;
use creditnet_indexer::flow::FlowService;
use creditnet_indexer::storage::{HistoryEntry, Storage};

#[derive(Clone)]
struct AppState {
    storage: Storage,
    flow: FlowService,
    default_max_hops: u32,
}

/// Runtime configuration for the CreditNet API server.
#[derive(Debug, Clone)]
pub struct ApiRuntimeConfig {
    database_url: String,
    port: u16,
    default_max_hops: u32,
}

impl ApiRuntimeConfig {
    /// Build runtime configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://creditnet.db".to_string());
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);
        let default_max_hops: u32 = std::env::var("CREDITNET_DEFAULT_MAX_HOPS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_HOPS);

        Ok(Self {
            database_url,
            port,
            default_max_hops,
        })
    }

    /// Build deterministic test configuration over an existing database.
    pub fn for_test(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            port: 0,
            default_max_hops: DEFAULT_MAX_HOPS,
        }
    }
}

async fn build_state(config: &ApiRuntimeConfig) -> anyhow::Result<AppState> {
    let storage = Storage::new(&config.database_url, None, None).await?;
    storage.run_migrations().await?;

    Ok(AppState {
        flow: FlowService::new(storage.clone()),
        storage,
        default_max_hops: config.default_max_hops,
    })
}

fn router_for_state(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/capacity", get(get_capacity))
        .route("/v1/history/:address", get(get_history))
        .route("/v1/accounts", get(get_accounts))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Build an in-process API router from explicit runtime config.
pub async fn build_app(config: &ApiRuntimeConfig) -> anyhow::Result<Router> {
    let state = build_state(config).await?;
    Ok(router_for_state(state))
}

/// Run the API server with explicit runtime configuration.
pub async fn run_with_config(config: ApiRuntimeConfig) -> anyhow::Result<()> {
    let state = build_state(&config).await?;
    let storage_for_shutdown = state.storage.clone();
    let app = router_for_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    println!("CreditNet API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    storage_for_shutdown.close().await;
    println!("CreditNet API server shutdown complete");
    Ok(())
}

/// Run the API server using environment-driven configuration.
pub async fn run_from_env() -> anyhow::Result<()> {
    run_with_config(ApiRuntimeConfig::from_env()?).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            eprintln!("Failed to install Ctrl+C handler: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                eprintln!("Failed to install SIGTERM handler: {}", err);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    println!("Shutdown signal received");
}

async fn health(State(_state): State<AppState>) -> &'static str {
    "OK"
}

const ERROR_CODE_INVALID_REQUEST: &str = "invalid_request";
const ERROR_CODE_STORE_UNAVAILABLE: &str = "store_unavailable";
const ERROR_CODE_INTERNAL_ERROR: &str = "internal_error";

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorInfo,
}

#[derive(Serialize)]
struct ErrorInfo {
    code: &'static str,
    message: String,
}

fn api_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: ErrorInfo {
                code,
                message: message.into(),
            },
        }),
    )
}

fn bad_request(msg: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    api_error(StatusCode::BAD_REQUEST, ERROR_CODE_INVALID_REQUEST, msg)
}

fn store_unavailable(msg: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    api_error(
        StatusCode::SERVICE_UNAVAILABLE,
        ERROR_CODE_STORE_UNAVAILABLE,
        msg,
    )
}

fn internal_error<E: std::fmt::Display>(err: E) -> (StatusCode, Json<ErrorResponse>) {
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        ERROR_CODE_INTERNAL_ERROR,
        format!("Internal error: {}", err),
    )
}

#[derive(Debug, Deserialize)]
struct CapacityQuery {
    source: String,
    target: String,
    #[serde(rename = "maxHops", alias = "max_hops")]
    max_hops: Option<u32>,
}

#[derive(Serialize)]
struct CapacityResponse {
    source: String,
    target: String,
    #[serde(rename = "maxHops")]
    max_hops: u32,
    /// Decimal string; JSON numbers cannot carry exact decimal amounts.
    capacity: String,
}

async fn get_capacity(
    State(state): State<AppState>,
    Query(query): Query<CapacityQuery>,
) -> Result<Json<CapacityResponse>, (StatusCode, Json<ErrorResponse>)> {
    if query.source.is_empty() {
        return Err(bad_request("source must not be empty"));
    }
    if query.target.is_empty() {
        return Err(bad_request("target must not be empty"));
    }

    let source = Address::from(query.source);
    let target = Address::from(query.target);
    let max_hops = query.max_hops.unwrap_or(state.default_max_hops);

    let capacity = state
        .flow
        .max_flow(&source, &target, max_hops)
        .await
        .map_err(|e| match e {
            CoreError::SelfCapacity | CoreError::InvalidHopBound(_) => bad_request(e.to_string()),
            CoreError::StoreUnavailable(_) => store_unavailable(e.to_string()),
            other => internal_error(other),
        })?;

    Ok(Json(CapacityResponse {
        source: source.to_string(),
        target: target.to_string(),
        max_hops,
        capacity: capacity.to_string(),
    }))
}

#[derive(Serialize)]
struct HistoryItem {
    direction: String,
    #[serde(rename = "counterpartyUsername")]
    counterparty_username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    /// Signed decimal string.
    #[serde(rename = "limitChange")]
    limit_change: String,
    #[serde(rename = "ledgerIndex")]
    ledger_index: u64,
    #[serde(rename = "ledgerHash")]
    ledger_hash: String,
    #[serde(rename = "txnHash")]
    txn_hash: String,
    #[serde(rename = "txnDate")]
    txn_date: i64,
}

#[derive(Serialize)]
struct HistoryResponse {
    address: String,
    transactions: Vec<HistoryItem>,
}

fn history_item(entry: HistoryEntry) -> HistoryItem {
    HistoryItem {
        direction: entry.direction.as_str().to_string(),
        counterparty_username: entry.record.counterparty_username,
        message: entry.record.message,
        limit_change: entry.record.limit_change.to_string(),
        ledger_index: entry.record.ledger_index,
        ledger_hash: entry.record.ledger_hash,
        txn_hash: entry.record.txn_hash,
        txn_date: entry.record.txn_date,
    }
}

async fn get_history(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<HistoryResponse>, (StatusCode, Json<ErrorResponse>)> {
    if address.is_empty() {
        return Err(bad_request("address must not be empty"));
    }

    let account = Address::from(address);
    let entries = state
        .storage
        .list_history(&account)
        .await
        .map_err(internal_error)?;

    Ok(Json(HistoryResponse {
        address: account.to_string(),
        transactions: entries.into_iter().map(history_item).collect(),
    }))
}

#[derive(Serialize)]
struct AccountItem {
    address: String,
    username: String,
}

#[derive(Serialize)]
struct AccountsResponse {
    accounts: Vec<AccountItem>,
}

async fn get_accounts(
    State(state): State<AppState>,
) -> Result<Json<AccountsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let directory = SqliteDirectory::new(state.storage.clone());
    let accounts = directory.list_accounts().await.map_err(internal_error)?;

    Ok(Json(AccountsResponse {
        accounts: accounts
            .into_iter()
            .map(|a| AccountItem {
                address: a.address.to_string(),
                username: a.username,
            })
            .collect(),
    }))
}
