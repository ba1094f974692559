use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::backend::Bucket;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Public blob URLs: `/storage/<bucket>/<key>`.
pub async fn serve(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> AppResult<Response> {
    let bucket: Bucket = bucket.parse().map_err(|_| AppError::NotFound)?;
    let blob = state
        .backend
        .blobs
        .download(bucket, &key)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, blob.content_type),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", blob.cache_control),
            ),
        ],
        blob.data,
    )
        .into_response())
}
