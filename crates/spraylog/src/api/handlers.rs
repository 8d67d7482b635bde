//! Request handlers for the records API.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::record::{NewRecord, Record};
use crate::storage::{Storage, StorageHandle};

/// Run one storage operation on a fresh handle, off the async runtime.
///
/// The handle is dropped when `op` returns, whatever the outcome.
async fn with_handle<T, F>(storage: Storage, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&StorageHandle) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let handle = storage.handle()?;
        op(&handle)
    })
    .await
    .map_err(|e| Error::internal(format!("storage task failed: {e}")))?
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /api/records`
pub async fn list_records(State(storage): State<Storage>) -> Result<Json<Vec<Record>>> {
    let records = with_handle(storage, StorageHandle::list).await?;
    Ok(Json(records))
}

/// `POST /api/records`
pub async fn create_record(
    State(storage): State<Storage>,
    body: Bytes,
) -> Result<(StatusCode, Json<Record>)> {
    // Rejected payloads never reach storage
    let candidate = NewRecord::from_json_slice(&body)?;

    let record = with_handle(storage, move |handle| handle.create(&candidate)).await?;
    info!(id = record.id, field = %record.field, "Created record");
    Ok((StatusCode::CREATED, Json(record)))
}

/// `DELETE /api/records/{id}`
pub async fn delete_record(
    State(storage): State<Storage>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    with_handle(storage, move |handle| handle.delete(id)).await?;
    info!(id, "Deleted record");
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/records`
///
/// Removes every record without confirmation.
pub async fn delete_all_records(State(storage): State<Storage>) -> Result<StatusCode> {
    let removed = with_handle(storage, StorageHandle::delete_all).await?;
    warn!(removed, "Deleted all records");
    Ok(StatusCode::NO_CONTENT)
}
