//! Filesystem call handlers
//!
//! Each handler parses its query, runs the matching orchestrator call and
//! answers HTTP 200 with a response frame. Parameter problems are reported
//! in-band as `EINVAL` without touching storage.

use axum::extract::Query;
use axum::extract::State;
use axum::extract::rejection::QueryRejection;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::IntoResponse;
use axum::response::Response;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use vtfs_core::Errno;
use vtfs_core::InodeNumber;
use vtfs_core::ResponseFrame;
use vtfs_core::StorageBackend;

use crate::server::AppState;

/// Next cursor returned alongside an `iterate_dir` entry.
pub const NEXT_OFFSET_HEADER: &str = "x-next-offset";

// ============================================================================
// Query parameters
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TokenParams {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct EntryParams {
    pub token: String,
    pub parent: InodeNumber,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateParams {
    pub token: String,
    pub parent: InodeNumber,
    pub name: String,
    pub mode: u32,
}

#[derive(Debug, Deserialize)]
pub struct IterateParams {
    pub token: String,
    pub dir_ino: InodeNumber,
    pub offset: u64,
}

#[derive(Debug, Deserialize)]
pub struct InodeParams {
    pub token: String,
    pub ino: InodeNumber,
}

#[derive(Debug, Deserialize)]
pub struct ReadParams {
    pub token: String,
    pub ino: InodeNumber,
    pub len: u64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct WriteParams {
    pub token: String,
    pub ino: InodeNumber,
    pub len: u64,
    pub offset: i64,
    /// Standard base64; empty for a zero-length write.
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct LinkParams {
    pub token: String,
    pub target_ino: InodeNumber,
    pub parent: InodeNumber,
    pub name: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn init<B: StorageBackend>(
    State(state): State<AppState<B>>,
    params: Result<Query<TokenParams>, QueryRejection>,
) -> Response {
    let Query(p) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_params("init", rejection),
    };
    let result = state.run("init", move |fs| fs.init(&p.token)).await;
    frame_response(result.map(|()| ResponseFrame::empty()))
}

pub async fn get_root<B: StorageBackend>(
    State(state): State<AppState<B>>,
    params: Result<Query<TokenParams>, QueryRejection>,
) -> Response {
    let Query(p) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_params("get_root", rejection),
    };
    let result = state.run("get_root", move |fs| fs.get_root(&p.token)).await;
    frame_response(result.map(|meta| ResponseFrame::node_meta(&meta)))
}

pub async fn lookup<B: StorageBackend>(
    State(state): State<AppState<B>>,
    params: Result<Query<EntryParams>, QueryRejection>,
) -> Response {
    let Query(p) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_params("lookup", rejection),
    };
    let result = state.run("lookup", move |fs| fs.lookup(&p.token, p.parent, &p.name)).await;
    frame_response(result.map(|meta| ResponseFrame::node_meta(&meta)))
}

pub async fn iterate_dir<B: StorageBackend>(
    State(state): State<AppState<B>>,
    params: Result<Query<IterateParams>, QueryRejection>,
) -> Response {
    let Query(p) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_params("iterate_dir", rejection),
    };
    let result = state.run("iterate_dir", move |fs| fs.iterate_dir(&p.token, p.dir_ino, p.offset)).await;
    match result {
        Ok((dirent, next_offset)) => {
            let mut response = frame_response(Ok(ResponseFrame::dirent(&dirent)));
            response.headers_mut().insert(NEXT_OFFSET_HEADER, HeaderValue::from(next_offset));
            response
        }
        Err(frame) => frame_response(Err(frame)),
    }
}

pub async fn create_file<B: StorageBackend>(
    State(state): State<AppState<B>>,
    params: Result<Query<CreateParams>, QueryRejection>,
) -> Response {
    let Query(p) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_params("create_file", rejection),
    };
    let result = state.run("create_file", move |fs| fs.create_file(&p.token, p.parent, &p.name, p.mode)).await;
    frame_response(result.map(|meta| ResponseFrame::node_meta(&meta)))
}

pub async fn mkdir<B: StorageBackend>(
    State(state): State<AppState<B>>,
    params: Result<Query<CreateParams>, QueryRejection>,
) -> Response {
    let Query(p) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_params("mkdir", rejection),
    };
    let result = state.run("mkdir", move |fs| fs.create_dir(&p.token, p.parent, &p.name, p.mode)).await;
    frame_response(result.map(|meta| ResponseFrame::node_meta(&meta)))
}

pub async fn unlink<B: StorageBackend>(
    State(state): State<AppState<B>>,
    params: Result<Query<EntryParams>, QueryRejection>,
) -> Response {
    let Query(p) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_params("unlink", rejection),
    };
    let result = state.run("unlink", move |fs| fs.unlink(&p.token, p.parent, &p.name)).await;
    frame_response(result.map(|()| ResponseFrame::empty()))
}

pub async fn rmdir<B: StorageBackend>(
    State(state): State<AppState<B>>,
    params: Result<Query<EntryParams>, QueryRejection>,
) -> Response {
    let Query(p) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_params("rmdir", rejection),
    };
    let result = state.run("rmdir", move |fs| fs.rmdir(&p.token, p.parent, &p.name)).await;
    frame_response(result.map(|()| ResponseFrame::empty()))
}

pub async fn read<B: StorageBackend>(
    State(state): State<AppState<B>>,
    params: Result<Query<ReadParams>, QueryRejection>,
) -> Response {
    let Query(p) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_params("read", rejection),
    };
    let result = state.run("read", move |fs| fs.read(&p.token, p.ino, p.len, p.offset)).await;
    frame_response(result.map(ResponseFrame::bytes))
}

pub async fn write<B: StorageBackend>(
    State(state): State<AppState<B>>,
    params: Result<Query<WriteParams>, QueryRejection>,
) -> Response {
    let Query(p) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_params("write", rejection),
    };
    let data = match STANDARD.decode(p.data.as_bytes()) {
        Ok(data) => data,
        Err(err) => {
            tracing::debug!(error = %err, "write payload is not valid base64");
            return frame_response(Err(ResponseFrame::Err(Errno::Einval.wire_code())));
        }
    };
    let result = state.run("write", move |fs| fs.write(&p.token, p.ino, &data, p.len, p.offset)).await;
    frame_response(result.map(ResponseFrame::i64_payload))
}

pub async fn link<B: StorageBackend>(
    State(state): State<AppState<B>>,
    params: Result<Query<LinkParams>, QueryRejection>,
) -> Response {
    let Query(p) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_params("link", rejection),
    };
    let result = state.run("link", move |fs| fs.link(&p.token, p.target_ino, p.parent, &p.name)).await;
    frame_response(result.map(|()| ResponseFrame::empty()))
}

pub async fn count_links<B: StorageBackend>(
    State(state): State<AppState<B>>,
    params: Result<Query<InodeParams>, QueryRejection>,
) -> Response {
    let Query(p) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_params("count_links", rejection),
    };
    let result = state.run("count_links", move |fs| fs.count_links(&p.token, p.ino)).await;
    frame_response(result.map(ResponseFrame::u32_payload))
}

// ============================================================================
// Response helpers
// ============================================================================

fn invalid_params(op: &'static str, rejection: QueryRejection) -> Response {
    tracing::debug!(op, error = %rejection.body_text(), "rejecting malformed parameters");
    frame_response(Err(ResponseFrame::Err(Errno::Einval.wire_code())))
}

/// HTTP 200 carrying the frame; errors travel in-band.
fn frame_response(result: Result<ResponseFrame, ResponseFrame>) -> Response {
    let frame = result.unwrap_or_else(|frame| frame);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream"),
            (header::CONNECTION, "close"),
        ],
        frame.encode(),
    )
        .into_response()
}
