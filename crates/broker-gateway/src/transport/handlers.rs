use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use broker_core::error::GatewayError;
use broker_core::protocol::{Reply, RequestEnvelope, ResponseEnvelope};

use crate::app_state::AppState;

fn respond(reply: Reply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_REQUEST);
    (status, Json(reply.body)).into_response()
}

/// Body read failures (including the size limit) become decode errors so the
/// caller still gets an envelope.
fn decode(body: Result<Bytes, BytesRejection>) -> Result<RequestEnvelope, Response> {
    let body = body.map_err(|rej| {
        tracing::debug!(status = %rej.status(), "rejecting unreadable body");
        respond(Reply::from_error(&GatewayError::Decode(rej.body_text())))
    })?;
    RequestEnvelope::from_json(&body).map_err(|e| {
        tracing::debug!(error = %e, "rejecting undecodable body");
        respond(Reply::from_error(&e))
    })
}

pub async fn broker() -> Response {
    (StatusCode::OK, Json(ResponseEnvelope::ok("Hit the broker", None))).into_response()
}

/// `POST /handle`: route by action.
pub async fn handle_submission(
    State(app): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let envelope = match decode(body) {
        Ok(env) => env,
        Err(res) => return res,
    };
    respond(app.router().dispatch(envelope).await)
}

/// `POST /log/{variant}`: named log-delivery operation.
pub async fn log_via(
    State(app): State<AppState>,
    Path(variant): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let envelope = match decode(body) {
        Ok(env) => env,
        Err(res) => return res,
    };
    respond(app.router().dispatch_log(&variant, envelope).await)
}
