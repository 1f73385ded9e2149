use anyhow::{Context, Result};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

#[cfg(feature = "slowdown")]
use super::slowdown_request;
use super::{log_requests, metrics::make_metrics_app, state::*};
use crate::error::SyncError;
use crate::pipeline::{PipelineReport, RecordingSelector};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
}

/// JSON envelope returned by the recording routes.
#[derive(Serialize, Debug)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PipelineReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    fn ok(data: PipelineReport) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    fn message(message: &str) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.to_string()),
            error: None,
        }
    }

    fn error(error: impl Into<String>, data: Option<PipelineReport>) -> Self {
        Self {
            success: false,
            data,
            message: None,
            error: Some(error.into()),
        }
    }
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    };
    Json(stats)
}

/// Map a run result onto a status code and envelope. `empty` is the response
/// used when no region found anything.
fn respond(
    result: Result<PipelineReport, SyncError>,
    empty: (StatusCode, Envelope),
) -> Response {
    match result {
        Err(e) => {
            error!("Pipeline run failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Envelope::error(e.to_string(), None)),
            )
                .into_response()
        }
        Ok(report) if report.has_failed_regions() => {
            let summary = report
                .first_error()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "Region failed".to_string());
            (
                StatusCode::BAD_GATEWAY,
                Json(Envelope::error(summary, Some(report))),
            )
                .into_response()
        }
        Ok(report) if report.is_empty() => {
            let (status, envelope) = empty;
            (status, Json(envelope)).into_response()
        }
        Ok(report) => (StatusCode::OK, Json(Envelope::ok(report))).into_response(),
    }
}

/// Runs the pipeline on its own task; the run carries on if the client goes away.
async fn run_detached(
    pipeline: GuardedPipeline,
    selector: RecordingSelector,
    empty: (StatusCode, Envelope),
) -> Response {
    match tokio::spawn(async move { pipeline.run(selector).await }).await {
        Ok(result) => respond(result, empty),
        Err(e) => {
            error!("Pipeline task ended abnormally: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Envelope::error("Pipeline run aborted", None)),
            )
                .into_response()
        }
    }
}

async fn list_recordings(State(pipeline): State<GuardedPipeline>) -> Response {
    run_detached(
        pipeline,
        RecordingSelector::All,
        (StatusCode::OK, Envelope::message("No recordings found")),
    )
    .await
}

async fn get_recording(
    State(pipeline): State<GuardedPipeline>,
    Path(object_id): Path<String>,
) -> Response {
    if !RecordingSelector::is_safe_object_id(&object_id) {
        return (
            StatusCode::BAD_REQUEST,
            Json(Envelope::error("Invalid recording id", None)),
        )
            .into_response();
    }

    run_detached(
        pipeline,
        RecordingSelector::Object(object_id),
        (
            StatusCode::NOT_FOUND,
            Envelope::error("Recording not found", None),
        ),
    )
    .await
}

pub fn make_app(state: ServerState) -> Router {
    let recording_routes: Router = Router::new()
        .route("/list/", get(list_recordings))
        .route("/recording/{object_id}/", get(get_recording))
        .with_state(state.clone());

    let mut app: Router = Router::new()
        .route("/", get(home))
        .with_state(state.clone())
        .nest("/recordings", recording_routes);

    #[cfg(feature = "slowdown")]
    {
        app = app.layer(middleware::from_fn(slowdown_request));
    }
    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));

    app
}

pub async fn run_server(
    state: ServerState,
    shutdown: CancellationToken,
) -> Result<()> {
    let port = state.config.port;
    let metrics_port = state.config.metrics_port;
    let app = make_app(state);

    let metrics_listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;
    let metrics_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let served = axum::serve(metrics_listener, make_metrics_app())
            .with_graceful_shutdown(async move { metrics_shutdown.cancelled().await })
            .await;
        if let Err(e) = served {
            error!("Metrics server stopped: {}", e);
        }
    });

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Ready to serve at port {}!", port);
    info!("Metrics available at port {}!", metrics_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
