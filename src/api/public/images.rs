use axum::{
    extract::{Extension, Path},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::images::ImageHost;
use crate::middleware::logging::ApiError;

pub fn images_router() -> Router {
    Router::new().route("/images/:version/:folder/:public_id", get(print_image))
}

pub async fn print_image(
    Path((version, folder, public_id)): Path<(String, String, String)>,
    Extension(images): Extension<Arc<dyn ImageHost>>,
) -> Result<impl IntoResponse, ApiError> {
    let id = format!("{version}/{folder}/{public_id}");
    let stored = images
        .open(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Image not found with {id} id")))?;

    let stream = ReaderStream::new(stored.file);
    let body = axum::body::Body::from_stream(stream);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&stored.content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("inline"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    Ok((headers, body))
}
