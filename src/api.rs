use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tokio::task;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::aggregator::{self, CountFilter};
use crate::config::Config;
use crate::db::{self, SharedConn};
use crate::error::InputError;
use crate::models::{ApprovalActivity, BotCount, Token, TokenCount};
use crate::report::TokenReport;

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub value: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub limit: Option<u32>, // recent approvals, defaults to 10
}

#[derive(Debug, Serialize)]
pub struct TokenView {
    pub token: Token,
    pub total: i64,
    pub bots: Vec<BotCount>,
    pub recent: Vec<ApprovalActivity>,
}

#[derive(Debug)]
pub enum ApiError {
    NotFound,
    BadRequest(InputError),
    Internal(eyre::Report),
}

impl From<eyre::Report> for ApiError {
    fn from(e: eyre::Report) -> Self {
        ApiError::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "token not found".to_string()),
            ApiError::BadRequest(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Internal(e) => {
                error!("API error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(cfg: Arc<Config>, conn: SharedConn) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "Approval scope API running" }))
        .route("/tokens/:address", get({
            let conn = Arc::clone(&conn);
            move |Path(address): Path<String>, Query(q): Query<TokenQuery>| {
                let conn = Arc::clone(&conn);
                async move { get_token(conn, address, q.limit.unwrap_or(10)).await.map(Json) }
            }
        }))
        .route("/approvals/top", get({
            let cfg = Arc::clone(&cfg);
            let conn = Arc::clone(&conn);
            move || {
                let cfg = Arc::clone(&cfg);
                let conn = Arc::clone(&conn);
                async move { get_top(cfg, conn).await.map(Json) }
            }
        }))
        .route("/approvals/range", get({
            let cfg = Arc::clone(&cfg);
            let conn = Arc::clone(&conn);
            move |Query(q): Query<RangeQuery>| {
                let cfg = Arc::clone(&cfg);
                let conn = Arc::clone(&conn);
                async move { get_range(cfg, conn, q).await.map(Json) }
            }
        }))
        .layer(cors)
}

pub async fn serve(cfg: Arc<Config>, conn: SharedConn) -> eyre::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], cfg.port));
    let app = router(cfg, conn);
    info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

pub fn filter_from_query(q: &RangeQuery) -> Result<CountFilter, InputError> {
    match (q.value, q.min, q.max) {
        (Some(value), _, _) if value > 0 => Ok(CountFilter::Fixed(value)),
        (Some(value), _, _) => Err(InputError::TooSmall { value, floor: 0 }),
        (None, Some(min), Some(max)) => {
            if min <= 0 {
                Err(InputError::TooSmall { value: min, floor: 0 })
            } else if max <= min {
                Err(InputError::TooSmall { value: max, floor: min })
            } else {
                Ok(CountFilter::Range { min, max })
            }
        }
        _ => Err(InputError::Empty),
    }
}

// ---------- DB wrappers (spawn_blocking) ----------

async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(eyre::eyre!("db task failed: {e}")))?
}

async fn get_token(conn: SharedConn, address: String, limit: u32) -> Result<TokenView, ApiError> {
    blocking(move || {
        let db = db::lock(&conn)?;
        let report = TokenReport::load(&db, &address)?;
        let total = report.total();
        let token = report.token.ok_or(ApiError::NotFound)?;
        let recent = db::recent_approvals(&db, token.id, limit)?;
        Ok(TokenView {
            token,
            total,
            bots: report.bots,
            recent,
        })
    })
    .await
}

async fn get_top(cfg: Arc<Config>, conn: SharedConn) -> Result<Vec<TokenCount>, ApiError> {
    let now = Utc::now().timestamp();
    blocking(move || {
        let db = db::lock(&conn)?;
        Ok(aggregator::top_tokens(&db, now, cfg.show_all_window, cfg.show_all_limit)?)
    })
    .await
}

async fn get_range(
    cfg: Arc<Config>,
    conn: SharedConn,
    q: RangeQuery,
) -> Result<Vec<TokenCount>, ApiError> {
    let filter = filter_from_query(&q).map_err(ApiError::BadRequest)?;
    let now = Utc::now().timestamp();
    blocking(move || {
        let db = db::lock(&conn)?;
        Ok(aggregator::tokens_in_range(
            &db,
            now,
            cfg.show_range_window,
            filter,
            cfg.show_range_limit,
        )?)
    })
    .await
}
