//! §6 HTTP surface (collaborator): a single route `GET /ip/<address>?datetime=<t>`
//! that forwards to [`Database::lookup`]. 200 with JSON on hit, 200 with
//! `{}` on miss, 400 on a malformed address.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::db::Database;
use crate::error::WhipError;
use crate::lookup::LookupMode;

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    datetime: Option<String>,
}

pub fn router(db: Arc<Database>) -> Router {
    Router::new().route("/ip/:address", get(lookup_handler)).with_state(db)
}

async fn lookup_handler(
    State(db): State<Arc<Database>>,
    Path(address): Path<String>,
    Query(query): Query<LookupQuery>,
) -> Response {
    let mode = LookupMode::from_query(query.datetime.as_deref());
    match db.lookup(&address, mode) {
        Ok(Some(bytes)) => (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], bytes).into_response(),
        Ok(None) => (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], b"{}".to_vec()).into_response(),
        Err(WhipError::MalformedAddress { .. }) => StatusCode::BAD_REQUEST.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn serve(db: Arc<Database>, host: &str, port: u16) -> std::io::Result<()> {
    let app = router(db);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "http surface listening");
    axum::serve(listener, app).await
}
