use super::server::ApiState;
use crate::error::GatewayError;
use crate::gateway::{friendly_input_name, ircc_code, resolve_app_name};
use crate::status::StatusRecord;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct PowerRequest {
    pub action: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    pub action: Option<String>,
    pub volume: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RemoteRequest {
    pub command: Option<String>,
}

/// Body of app-launch and input-switch requests
#[derive(Debug, Deserialize)]
pub struct ContentRequest {
    pub uri: Option<String>,
    pub title: Option<String>,
}

fn ok(body: Value) -> Response {
    let mut envelope = json!({ "success": true });
    if let (Some(target), Value::Object(fields)) = (envelope.as_object_mut(), body) {
        target.extend(fields);
    }
    (StatusCode::OK, Json(envelope)).into_response()
}

fn fail(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "success": false, "error": error.into() })),
    )
        .into_response()
}

/// Unwrap a JSON body, answering 400 in the usual envelope when it does not parse
fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(value)| value).map_err(|rejection| {
        warn!("Rejected request body: {}", rejection.body_text());
        fail(StatusCode::BAD_REQUEST, rejection.body_text())
    })
}

fn device_failure(action: &str, error: GatewayError) -> Response {
    warn!("{} failed: {}", action, error);
    fail(StatusCode::BAD_GATEWAY, error.to_string())
}

/// Cached status; never touches the device
pub async fn status_handler(State(state): State<ApiState>) -> Json<StatusRecord> {
    Json(state.cache.get_status())
}

/// Liveness of the background poller
pub async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let liveness = state.poller.liveness();
    let (status, label) = if liveness.running {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "stopped")
    };

    (
        status,
        Json(json!({
            "status": label,
            "running": liveness.running,
            "lastCycle": liveness.last_cycle,
        })),
    )
}

/// Prometheus text exposition built from the cached record
pub async fn metrics_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let body = render_metrics(&state.cache.get_status());
    (
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

pub(crate) fn render_metrics(status: &StatusRecord) -> String {
    let title = status.title.replace('\\', "\\\\").replace('"', "\\\"");
    let power_labels = format!("state=\"{}\"", status.power);
    let title_labels = format!("title=\"{}\"", title);

    let mut out = String::new();
    push_gauge(
        &mut out,
        "tv_power_status",
        "TV power state (1=active, 0.5=standby, 0=off)",
        Some(&power_labels),
        status.power.metric_value(),
    );
    push_gauge(
        &mut out,
        "tv_volume",
        "Current TV volume level",
        None,
        status.volume,
    );
    push_gauge(
        &mut out,
        "tv_muted",
        "Whether TV is muted (1=muted, 0=unmuted)",
        None,
        u8::from(status.muted),
    );
    push_gauge(
        &mut out,
        "tv_now_playing",
        "Current TV channel or app",
        Some(&title_labels),
        1,
    );
    push_gauge(
        &mut out,
        "tv_now_playing_id",
        "Stable numeric code of the current content (0=unknown)",
        None,
        status.now_playing_id,
    );
    out
}

fn push_gauge(
    out: &mut String,
    name: &str,
    help: &str,
    labels: Option<&str>,
    value: impl std::fmt::Display,
) {
    out.push_str(&format!("# HELP {} {}\n# TYPE {} gauge\n", name, help, name));
    match labels {
        Some(labels) => out.push_str(&format!("{}{{{}}} {}\n", name, labels, value)),
        None => out.push_str(&format!("{} {}\n", name, value)),
    }
}

pub async fn power_handler(
    State(state): State<ApiState>,
    body: Result<Json<PowerRequest>, JsonRejection>,
) -> Response {
    let request = match parse_body(body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let on = match request.action.as_deref() {
        Some("on") => true,
        Some("off") => false,
        _ => return fail(StatusCode::BAD_REQUEST, "Invalid action"),
    };

    let message = if on {
        "TV power on command sent"
    } else {
        "TV turned off"
    };

    match state.gateway.set_power(on).await {
        Ok(()) => ok(json!({ "message": message })),
        Err(e) => device_failure("setPowerStatus", e),
    }
}

pub async fn volume_handler(
    State(state): State<ApiState>,
    body: Result<Json<VolumeRequest>, JsonRejection>,
) -> Response {
    let request = match parse_body(body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let action = request.action.unwrap_or_default();

    let result = match action.as_str() {
        "mute" => state.gateway.set_mute(true).await,
        "unmute" => state.gateway.set_mute(false).await,
        "up" => state.gateway.set_volume("+5").await,
        "down" => state.gateway.set_volume("-5").await,
        "set" => {
            let level = match request.volume {
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::String(s)) => s,
                None => "50".to_string(),
                Some(_) => return fail(StatusCode::BAD_REQUEST, "Invalid volume"),
            };
            state.gateway.set_volume(&level).await
        }
        _ => return fail(StatusCode::BAD_REQUEST, "Invalid action"),
    };

    match result {
        Ok(()) => ok(json!({ "message": format!("Volume {} successful", action) })),
        Err(e) => device_failure("volume command", e),
    }
}

pub async fn remote_handler(
    State(state): State<ApiState>,
    body: Result<Json<RemoteRequest>, JsonRejection>,
) -> Response {
    let request = match parse_body(body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let Some(command) = request.command.filter(|c| !c.is_empty()) else {
        return fail(StatusCode::BAD_REQUEST, "Command required");
    };
    let Some(code) = ircc_code(&command) else {
        return fail(
            StatusCode::BAD_REQUEST,
            format!("Unknown command: {}", command),
        );
    };

    match state.gateway.send_ircc(code).await {
        Ok(()) => ok(json!({ "message": format!("Command {} sent", command) })),
        Err(e) => device_failure("IRCC", e),
    }
}

/// Launch an app and record it as the current content
pub async fn launch_handler(
    State(state): State<ApiState>,
    body: Result<Json<ContentRequest>, JsonRejection>,
) -> Response {
    let request = match parse_body(body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let Some(uri) = request.uri.filter(|uri| !uri.is_empty()) else {
        return fail(StatusCode::BAD_REQUEST, "Application URI required");
    };

    if let Err(e) = state.gateway.launch_app(&uri).await {
        return device_failure("setActiveApp", e);
    }

    let title = request
        .title
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| resolve_app_name(&uri));
    info!("Launched {} ({})", title, uri);
    state.cache.update_override(&title, &uri);

    ok(json!({ "message": "Application launched" }))
}

/// Switch input and record it as the current content
pub async fn switch_input_handler(
    State(state): State<ApiState>,
    body: Result<Json<ContentRequest>, JsonRejection>,
) -> Response {
    let request = match parse_body(body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let Some(uri) = request.uri.filter(|uri| !uri.is_empty()) else {
        return fail(StatusCode::BAD_REQUEST, "Source URI required");
    };

    if let Err(e) = state.gateway.switch_input(&uri).await {
        return device_failure("setPlayContent", e);
    }

    let title = request
        .title
        .filter(|title| !title.is_empty())
        .or_else(|| friendly_input_name(&uri))
        .unwrap_or_else(|| uri.clone());
    info!("Switched input to {} ({})", title, uri);
    state.cache.update_override(&title, &uri);

    ok(json!({ "message": "Input switched" }))
}

pub async fn applications_handler(State(state): State<ApiState>) -> Response {
    match state.gateway.application_list().await {
        Ok(applications) => ok(json!({ "applications": applications })),
        Err(e) => device_failure("getApplicationList", e),
    }
}

pub async fn inputs_handler(State(state): State<ApiState>) -> Response {
    match state.gateway.source_list().await {
        Ok(inputs) => ok(json!({ "inputs": inputs })),
        Err(e) => device_failure("getSourceList", e),
    }
}

/// HDMI inputs with their user labels and connection state
pub async fn hdmi_inputs_handler(State(state): State<ApiState>) -> Response {
    match state.gateway.hdmi_inputs().await {
        Ok(inputs) => ok(json!({ "inputs": inputs })),
        Err(e) => device_failure("getCurrentExternalInputsStatus", e),
    }
}
