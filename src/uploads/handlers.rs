use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::error::Error;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: String,
}

/// `POST /upload?filename=...` — store the raw request body under the given
/// name and return the share URL.
pub async fn upload_file(
    query: web::Query<UploadQuery>,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    if body.is_empty() {
        return Err(Error::Validation("No file content".to_string()));
    }

    let file_url = state.uploads.save(&query.filename, &body).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "File uploaded",
        "file_url": file_url
    })))
}

/// `GET /uploads/{filename}` — serve a previously stored file.
pub async fn serve_file(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let filename = path.into_inner();
    let (bytes, content_type) = state.uploads.read(&filename).await?;
    Ok(HttpResponse::Ok().content_type(content_type).body(bytes))
}
