//! Storage HTTP Routes
//!
//! Endpoints for uploading, listing, downloading and deleting files.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{
        multipart::MultipartRejection,
        rejection::{BytesRejection, PathRejection},
        FromRef, Multipart, Path, State,
    },
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use mime_guess::{mime, Mime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::file_storage::{validate_filename, NameGenerator, StorageBackend, StoredFile};

use super::api_key::{ApiKeyGate, RequireApiKey};
use super::config::GatewayConfig;
use super::errors::{ApiError, ApiResult};
use super::upload::{receive_files, UploadLimits, UploadedFile};

/// Path prefix under which stored files are served
pub const FILES_PREFIX: &str = "/files/";

// ==================
// Shared State
// ==================

/// Storage state shared across handlers
#[derive(Debug)]
pub struct StorageState {
    pub config: GatewayConfig,
    pub backend: Arc<dyn StorageBackend>,
    pub names: NameGenerator,
    pub gate: ApiKeyGate,
}

impl StorageState {
    pub fn new(config: GatewayConfig, backend: Arc<dyn StorageBackend>) -> Self {
        let gate = ApiKeyGate::new(&config.api_key);
        Self {
            config,
            backend,
            names: NameGenerator::new(),
            gate,
        }
    }

    /// Public URL of a stored file
    pub fn file_url(&self, storage_name: &str) -> String {
        format!(
            "{}{}{}",
            self.config.base_url(),
            FILES_PREFIX,
            urlencoding::encode(storage_name)
        )
    }

    fn upload_limits(&self, field: &'static str, max_files: usize) -> UploadLimits {
        UploadLimits {
            field,
            max_files,
            max_file_size: self.config.max_file_size,
        }
    }
}

impl FromRef<Arc<StorageState>> for ApiKeyGate {
    fn from_ref(state: &Arc<StorageState>) -> Self {
        state.gate.clone()
    }
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFileResponse {
    pub original_name: String,
    pub filename: String,
    pub size: u64,
    pub mimetype: String,
    pub url: String,
    pub download_url: String,
}

impl UploadedFileResponse {
    fn new(file: UploadedFile, state: &StorageState) -> Self {
        let url = state.file_url(&file.stored.storage_name);
        Self {
            original_name: file.original_name,
            filename: file.stored.storage_name,
            size: file.stored.size,
            mimetype: file.mime_type,
            download_url: url.clone(),
            url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct FileEntry {
    pub filename: String,
    pub size: u64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub url: String,
}

impl FileEntry {
    fn new(file: StoredFile, state: &StorageState) -> Self {
        Self {
            url: state.file_url(&file.storage_name),
            filename: file.storage_name,
            size: file.size,
            created: file.created_at,
            modified: file.modified_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FilesListResponse {
    pub success: bool,
    pub data: Vec<FileEntry>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteByUrlRequest {
    #[serde(default)]
    pub url: Option<String>,
}

// ==================
// Storage Routes
// ==================

/// Create storage routes
pub fn storage_routes(state: Arc<StorageState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/upload", post(upload_file_handler))
        .route("/upload/multiple", post(upload_multiple_handler))
        .route("/files", get(list_files_handler))
        .route(
            "/files/:filename",
            get(download_file_handler).delete(delete_file_handler),
        )
        .route("/delete", delete(delete_by_url_handler))
        // Applies to the routes above, so it must stay last.
        .method_not_allowed_fallback(method_not_allowed_handler)
        .with_state(state)
}

// ==================
// Helper Functions
// ==================

/// Extract the storage name from a file URL of the form `<domain>/files/<name>`.
///
/// The URL is parsed with WHATWG semantics, so dot segments are resolved before
/// the path is inspected. The remainder is percent-decoded and must pass the
/// path guard.
pub fn filename_from_url(raw: &str) -> ApiResult<String> {
    let parsed = Url::parse(raw).map_err(|_| ApiError::MalformedUrl)?;
    let encoded = parsed
        .path()
        .strip_prefix(FILES_PREFIX)
        .ok_or(ApiError::InvalidUrl)?;
    let filename = urlencoding::decode(encoded).map_err(|_| ApiError::InvalidFilename)?;
    validate_filename(&filename)?;
    Ok(filename.into_owned())
}

/// Remove `filename` after confirming it exists. A concurrent delete that wins
/// the race surfaces as not-found.
async fn remove_file(state: &StorageState, filename: &str) -> ApiResult<()> {
    if !state.backend.exists(filename).await? {
        return Err(ApiError::NotFound(filename.to_string()));
    }
    state.backend.delete(filename).await?;
    tracing::info!(filename = %filename, "file deleted");
    Ok(())
}

/// Unwrap the `:filename` segment. Segments that do not decode to UTF-8 are
/// rejected like any other unusable name.
fn path_filename(path: Result<Path<String>, PathRejection>) -> ApiResult<String> {
    path.map(|Path(filename)| filename).map_err(|rejection| {
        tracing::warn!(reason = %rejection.body_text(), "rejected filename segment");
        ApiError::InvalidFilename
    })
}

/// Only `application/json` bodies are read; anything else carries no URL.
fn is_json_request(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Mime>().ok())
        .is_some_and(|m| m.type_() == mime::APPLICATION && m.subtype() == mime::JSON)
}

fn guard_filename(filename: &str) -> ApiResult<()> {
    validate_filename(filename).map(|_| ()).map_err(|e| {
        tracing::warn!(filename = %filename, "rejected unsafe filename");
        ApiError::from(e)
    })
}

// ==================
// Handlers
// ==================

async fn index_handler() -> Json<Value> {
    Json(json!({
        "name": "Filegate file server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "upload": "POST /upload (API key required)",
            "uploadMultiple": "POST /upload/multiple (API key required)",
            "download": "GET /files/:filename (no API key)",
            "list": "GET /files (API key required)",
            "delete": "DELETE /files/:filename (API key required)",
            "deleteByUrl": "DELETE /delete (API key required, JSON body with url)",
        },
        "apiKey": "Required in the X-API-Key header or the apikey query parameter",
    }))
}

async fn upload_file_handler(
    State(state): State<Arc<StorageState>>,
    _key: RequireApiKey,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse<UploadedFileResponse>>> {
    // A body that is not multipart carries no file.
    let mut multipart = multipart.map_err(|_| ApiError::NoFileProvided)?;

    let limits = state.upload_limits("file", 1);
    let file = receive_files(&state, &mut multipart, limits)
        .await?
        .into_iter()
        .next()
        .ok_or(ApiError::NoFileProvided)?;

    Ok(Json(UploadResponse {
        success: true,
        message: "File uploaded successfully".to_string(),
        data: UploadedFileResponse::new(file, &state),
    }))
}

async fn upload_multiple_handler(
    State(state): State<Arc<StorageState>>,
    _key: RequireApiKey,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse<Vec<UploadedFileResponse>>>> {
    let mut multipart = multipart.map_err(|_| ApiError::NoFileProvided)?;

    let limits = state.upload_limits("files", state.config.max_files);
    let files = receive_files(&state, &mut multipart, limits).await?;
    if files.is_empty() {
        return Err(ApiError::NoFileProvided);
    }

    let message = format!("{} file(s) uploaded successfully", files.len());
    let data = files
        .into_iter()
        .map(|file| UploadedFileResponse::new(file, &state))
        .collect();

    Ok(Json(UploadResponse {
        success: true,
        message,
        data,
    }))
}

async fn download_file_handler(
    State(state): State<Arc<StorageState>>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Response> {
    let filename = path_filename(path)?;
    guard_filename(&filename)?;

    let body = state.backend.read(&filename).await?;

    let mut headers = HeaderMap::new();
    let content_type = HeaderValue::from_str(&body.file.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.file.size));

    Ok((headers, Body::from_stream(body.stream)).into_response())
}

async fn list_files_handler(
    State(state): State<Arc<StorageState>>,
    _key: RequireApiKey,
) -> ApiResult<Json<FilesListResponse>> {
    let files = state.backend.list().await?;
    let data: Vec<FileEntry> = files
        .into_iter()
        .map(|file| FileEntry::new(file, &state))
        .collect();

    Ok(Json(FilesListResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

async fn delete_file_handler(
    State(state): State<Arc<StorageState>>,
    _key: RequireApiKey,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<DeleteResponse>> {
    let filename = path_filename(path)?;
    guard_filename(&filename)?;
    remove_file(&state, &filename).await?;

    Ok(Json(DeleteResponse {
        success: true,
        message: "File deleted successfully".to_string(),
        filename,
        url: None,
    }))
}

async fn delete_by_url_handler(
    State(state): State<Arc<StorageState>>,
    _key: RequireApiKey,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Json<DeleteResponse>> {
    if !is_json_request(&headers) {
        return Err(ApiError::MissingUrl);
    }
    let body = body.map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))?;

    let request: DeleteByUrlRequest = if body.iter().all(u8::is_ascii_whitespace) {
        DeleteByUrlRequest { url: None }
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?
    };

    let url = request
        .url
        .filter(|url| !url.is_empty())
        .ok_or(ApiError::MissingUrl)?;

    let filename = filename_from_url(&url).map_err(|e| {
        tracing::warn!(url = %url, code = e.code(), "rejected delete-by-url target");
        e
    })?;
    remove_file(&state, &filename).await?;

    Ok(Json(DeleteResponse {
        success: true,
        message: "File deleted successfully".to_string(),
        filename,
        url: Some(url),
    }))
}

/// JSON 404 for unknown routes
pub async fn fallback_handler() -> ApiError {
    ApiError::RouteNotFound
}

async fn method_not_allowed_handler() -> ApiError {
    ApiError::MethodNotAllowed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("http://localhost:3000/files/photo_1700000000000.jpg").unwrap(),
            "photo_1700000000000.jpg"
        );
        assert_eq!(
            filename_from_url("https://cdn.example.com/files/my%20doc_1.pdf?x=1#frag").unwrap(),
            "my doc_1.pdf"
        );
    }

    #[test]
    fn test_filename_from_url_malformed() {
        assert!(matches!(filename_from_url("not a url"), Err(ApiError::MalformedUrl)));
        assert!(matches!(filename_from_url("/files/a.txt"), Err(ApiError::MalformedUrl)));
    }

    #[test]
    fn test_filename_from_url_wrong_prefix() {
        assert!(matches!(
            filename_from_url("http://localhost:3000/other/a.txt"),
            Err(ApiError::InvalidUrl)
        ));
        // Dot segments are resolved away from /files/ before inspection.
        assert!(matches!(
            filename_from_url("http://localhost:3000/files/../../etc/passwd"),
            Err(ApiError::InvalidUrl)
        ));
    }

    #[test]
    fn test_filename_from_url_traversal() {
        for url in [
            "http://localhost:3000/files/",
            "http://localhost:3000/files/a/b.txt",
            "http://localhost:3000/files/..%2F..%2Fetc%2Fpasswd",
            "http://localhost:3000/files/a%5Cb",
            "http://localhost:3000/files/x..y",
        ] {
            assert!(
                matches!(filename_from_url(url), Err(ApiError::InvalidFilename)),
                "{url} should be rejected"
            );
        }
    }

    fn headers_with(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn test_is_json_request() {
        assert!(is_json_request(&headers_with("application/json")));
        assert!(is_json_request(&headers_with("application/json; charset=utf-8")));
        assert!(!is_json_request(&headers_with("text/plain")));
        assert!(!is_json_request(&headers_with("application/x-www-form-urlencoded")));
        assert!(!is_json_request(&HeaderMap::new()));
    }

    #[test]
    fn test_file_url_encodes_name() {
        let config = GatewayConfig {
            domain: "http://files.local/".to_string(),
            ..Default::default()
        };
        let state = StorageState::new(config, Arc::new(crate::file_storage::MemoryBackend::new()));
        assert_eq!(state.file_url("a b_1.txt"), "http://files.local/files/a%20b_1.txt");
    }
}
