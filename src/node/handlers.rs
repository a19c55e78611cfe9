use axum::{
    Router,
    extract::{ConnectInfo, DefaultBodyLimit, Extension, Multipart, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use super::service::Node;
use super::types::ReadOutcome;
use crate::error::NodeError;
use crate::metadata::types::FileId;
use crate::peer::protocol::*;

/// Longest artificial delay a read may ask for.
const MAX_READ_DELAY: Duration = Duration::from_secs(300);

/// Builds the node's HTTP surface.
pub fn router(node: Arc<Node>) -> Router {
    Router::new()
        .route(ENDPOINT_ROOT, get(handle_root))
        .route(ENDPOINT_WRITE, post(handle_write))
        .route(ENDPOINT_READ, get(handle_read))
        .route(ENDPOINT_FILE_EXISTS, get(handle_file_exists))
        .route(ENDPOINT_TRANSFER, put(handle_transfer))
        .route(ENDPOINT_REPLICATE, put(handle_replicate))
        .route(ENDPOINT_DELETE, delete(handle_delete))
        .route(ENDPOINT_CAN_MOVE_FILE, get(handle_can_move_file))
        .route(ENDPOINT_CAPACITY, get(handle_capacity))
        .route(ENDPOINT_LOGS, get(handle_logs))
        // Uploads are bounded by the storage limit, not by axum's 2 MB default.
        .layer(DefaultBodyLimit::disable())
        .layer(Extension(node))
}

/// Requester identity: the `ip` override when given, else the remote host.
fn requester(ip: Option<String>, remote: Option<ConnectInfo<SocketAddr>>) -> String {
    ip.filter(|ip| !ip.is_empty())
        .or_else(|| remote.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_default()
}

fn error_status(err: &NodeError) -> StatusCode {
    match err {
        NodeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        NodeError::NotFound(_) => StatusCode::NOT_FOUND,
        NodeError::AlreadyExists(_) => StatusCode::CONFLICT,
        NodeError::CapacityExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        NodeError::PeerUnreachable { .. } | NodeError::PeerProtocol { .. } => {
            StatusCode::BAD_GATEWAY
        }
        // Pass the destination's own answer through.
        NodeError::PeerRejected { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        NodeError::InternalInconsistency(_) | NodeError::Store(_) | NodeError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: NodeError) -> Response {
    let status = error_status(&err);
    if status.is_server_error() {
        tracing::error!("{}", err);
    } else {
        tracing::debug!("{}", err);
    }
    (status, err.to_string()).into_response()
}

pub async fn handle_root() -> &'static str {
    "hello!"
}

pub async fn handle_write(
    Extension(node): Extension<Arc<Node>>,
    remote: Option<ConnectInfo<SocketAddr>>,
    Query(query): Query<WriteQuery>,
    mut multipart: Multipart,
) -> Response {
    let requester = requester(query.ip, remote);

    let mut payload = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(MULTIPART_FILE_FIELD) => {
                match field.bytes().await {
                    Ok(bytes) => {
                        payload = Some(bytes.to_vec());
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Failed to read upload: {}", e);
                        return (StatusCode::BAD_REQUEST, e.body_text()).into_response();
                    }
                }
            }
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Malformed multipart body: {}", e);
                return (StatusCode::BAD_REQUEST, e.body_text()).into_response();
            }
        }
    }

    match node
        .write(payload, &requester, query.uuid.map(FileId))
        .await
    {
        Ok(file_id) => (StatusCode::CREATED, file_id.to_string()).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_read(
    Extension(node): Extension<Arc<Node>>,
    remote: Option<ConnectInfo<SocketAddr>>,
    Query(query): Query<ReadQuery>,
) -> Response {
    let requester = requester(query.ip, remote);
    // Out-of-range values (negative, NaN, too large) mean no delay.
    let delay = query
        .delay
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .filter(|delay| !delay.is_zero() && *delay <= MAX_READ_DELAY);
    let file_id = FileId(query.uuid);

    match node.read(&file_id, &requester, delay).await {
        Ok(ReadOutcome::ServeLocal { bytes }) => (StatusCode::OK, bytes).into_response(),
        Ok(ReadOutcome::Redirect { address }) => (
            StatusCode::FOUND,
            [(header::LOCATION, read_location(&address, file_id.as_str()))],
        )
            .into_response(),
        Ok(ReadOutcome::NotFound) => {
            (StatusCode::NOT_FOUND, format!("File {} not found", file_id)).into_response()
        }
        Err(e) => error_response(e),
    }
}

pub async fn handle_file_exists(
    Extension(node): Extension<Arc<Node>>,
    Query(query): Query<FileQuery>,
) -> (StatusCode, String) {
    if node.exists(&FileId(query.uuid)).await {
        (StatusCode::OK, node.address().to_string())
    } else {
        (StatusCode::NOT_FOUND, String::new())
    }
}

pub async fn handle_transfer(
    Extension(node): Extension<Arc<Node>>,
    remote: Option<ConnectInfo<SocketAddr>>,
    Query(query): Query<MoveQuery>,
) -> Response {
    let requester = requester(query.ip, remote);
    match node
        .transfer(&FileId(query.uuid), &query.destination, &requester)
        .await
    {
        Ok(size) => (StatusCode::CREATED, size.to_string()).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_replicate(
    Extension(node): Extension<Arc<Node>>,
    remote: Option<ConnectInfo<SocketAddr>>,
    Query(query): Query<MoveQuery>,
) -> Response {
    let requester = requester(query.ip, remote);
    match node
        .replicate(&FileId(query.uuid), &query.destination, &requester)
        .await
    {
        Ok(size) => (StatusCode::CREATED, size.to_string()).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_delete(
    Extension(node): Extension<Arc<Node>>,
    Query(query): Query<FileQuery>,
) -> Response {
    match node.delete(&FileId(query.uuid)).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_can_move_file(
    Extension(node): Extension<Arc<Node>>,
    Query(query): Query<CapacityQuery>,
) -> Response {
    match node.capacity_query(query.file_size).await {
        Ok(decision) if decision.accepted => {
            (StatusCode::OK, decision.space_left.to_string()).into_response()
        }
        Ok(decision) => {
            (StatusCode::PAYLOAD_TOO_LARGE, decision.space_left.to_string()).into_response()
        }
        Err(e) => error_response(e),
    }
}

pub async fn handle_capacity(Extension(node): Extension<Arc<Node>>) -> (StatusCode, String) {
    (StatusCode::OK, node.capacity_report().to_string())
}

pub async fn handle_logs(
    Extension(node): Extension<Arc<Node>>,
    Query(query): Query<LogQuery>,
) -> Response {
    match node.fetch_log(query.date.as_deref()).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/tab-separated-values")],
            bytes,
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}
