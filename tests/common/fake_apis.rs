//! Fake storage and CRM APIs
//!
//! One axum server on a random port plays both collaborators. Tests script
//! its behavior (objects, export statuses, archive bytes, leads) and inspect
//! what it received through call counters.

use super::constants::*;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Default)]
struct FakeState {
    objects: HashMap<String, Vec<String>>,
    page_size: Option<usize>,
    statuses: VecDeque<String>,
    last_status: Option<String>,
    archive: Vec<u8>,
    leads: HashMap<String, Vec<Value>>,
    failing: HashMap<String, StatusCode>,
    exported: Vec<Vec<String>>,
    lead_searches: Vec<String>,
    uploads: Vec<String>,
    attachments: Vec<(String, String)>,
    calls: HashMap<String, usize>,
}

type SharedState = Arc<Mutex<FakeState>>;

/// Handle to a running fake API server.
pub struct FakeApis {
    pub base_url: String,
    state: SharedState,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl FakeApis {
    pub async fn spawn() -> Self {
        let state: SharedState = Arc::new(Mutex::new(FakeState::default()));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let app = make_fake_app(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Fake API server failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn add_object(&self, region: &str, id: &str) {
        self.state
            .lock()
            .unwrap()
            .objects
            .entry(region.to_string())
            .or_default()
            .push(id.to_string());
    }

    /// Split object search results into pages of `size`.
    pub fn set_page_size(&self, size: usize) {
        self.state.lock().unwrap().page_size = Some(size);
    }

    /// Statuses returned by successive status checks; the last one repeats.
    /// Without a script every check reports DONE.
    pub fn set_statuses(&self, statuses: &[&str]) {
        self.state.lock().unwrap().statuses = statuses.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_archive(&self, bytes: Vec<u8>) {
        self.state.lock().unwrap().archive = bytes;
    }

    /// Leads returned for the exact `filter[PHONE]` value `key`.
    pub fn add_lead(&self, key: &str, id: &str, phone: &str) {
        self.state
            .lock()
            .unwrap()
            .leads
            .entry(key.to_string())
            .or_default()
            .push(json!({"ID": id, "PHONE": [{"VALUE": phone, "VALUE_TYPE": "WORK"}]}));
    }

    /// Make every call to `endpoint` answer with `status`.
    pub fn fail(&self, endpoint: &str, status: StatusCode) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(endpoint.to_string(), status);
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        *self.state.lock().unwrap().calls.get(endpoint).unwrap_or(&0)
    }

    pub fn exported(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().exported.clone()
    }

    pub fn lead_searches(&self) -> Vec<String> {
        self.state.lock().unwrap().lead_searches.clone()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn attachments(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().attachments.clone()
    }
}

/// Count the call and return the scripted failure, if any.
fn enter(state: &SharedState, endpoint: &str) -> Option<Response> {
    let mut state = state.lock().unwrap();
    *state.calls.entry(endpoint.to_string()).or_insert(0) += 1;
    state.failing.get(endpoint).map(|status| {
        (
            *status,
            Json(json!({"error": "SCRIPTED", "error_description": "scripted failure"})),
        )
            .into_response()
    })
}

fn has_bearer(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", ACCESS_TOKEN))
        .unwrap_or(false)
}

async fn token(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if let Some(failure) = enter(&state, "token") {
        return failure;
    }
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == BASIC_AUTH)
        .unwrap_or(false);
    if !authorized || form.get("grant_type").map(String::as_str) != Some("client_credentials") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({"access_token": ACCESS_TOKEN, "token_type": "bearer", "expires_in": 1800}))
        .into_response()
}

async fn regions(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    if let Some(failure) = enter(&state, "regions") {
        return failure;
    }
    if !has_bearer(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut regions: Vec<String> = state.lock().unwrap().objects.keys().cloned().collect();
    if regions.is_empty() {
        regions.push(HOME_REGION.to_string());
    }
    regions.sort();
    Json(regions.into_iter().map(|name| json!({"name": name})).collect::<Vec<_>>())
        .into_response()
}

async fn objects(
    State(state): State<SharedState>,
    Path(region): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(failure) = enter(&state, "objects") {
        return failure;
    }
    if !has_bearer(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let state = state.lock().unwrap();
    let all = state.objects.get(&region).cloned().unwrap_or_default();
    let filter = query.get("filter").cloned().unwrap_or_default();
    let matching: Vec<String> = match filter.strip_prefix("id==") {
        Some(id) => all.into_iter().filter(|o| o == id).collect(),
        None => all,
    };

    let items = |ids: &[String]| -> Vec<Value> {
        ids.iter()
            .map(|id| json!({"id": id, "objectState": "AVAILABLE", "type": "callcenterrecording"}))
            .collect()
    };

    match state.page_size {
        None => Json(json!({"content": items(&matching)})).into_response(),
        Some(size) => {
            let page: usize = query
                .get("page")
                .and_then(|p| p.parse().ok())
                .unwrap_or(0);
            let total_pages = matching.len().div_ceil(size).max(1);
            let start = (page * size).min(matching.len());
            let end = (start + size).min(matching.len());
            Json(json!({
                "content": items(&matching[start..end]),
                "number": page,
                "totalPages": total_pages,
                "last": page + 1 >= total_pages,
            }))
            .into_response()
        }
    }
}

async fn bulk_start(
    State(state): State<SharedState>,
    Path(region): Path<String>,
    headers: HeaderMap,
    Json(ids): Json<Vec<String>>,
) -> Response {
    if let Some(failure) = enter(&state, "bulk_start") {
        return failure;
    }
    if !has_bearer(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut state = state.lock().unwrap();
    state.exported.push(ids);
    let zip_name = format!("bulk-{}-{}.zip", region, state.exported.len());
    Json(json!({"zipName": zip_name})).into_response()
}

async fn bulk_status(
    State(state): State<SharedState>,
    Path((_region, _zip_name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Some(failure) = enter(&state, "bulk_status") {
        return failure;
    }
    if !has_bearer(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut state = state.lock().unwrap();
    if let Some(next) = state.statuses.pop_front() {
        state.last_status = Some(next);
    }
    let status = state
        .last_status
        .clone()
        .unwrap_or_else(|| "DONE".to_string());
    Json(json!({"status": status})).into_response()
}

async fn bulk_download(
    State(state): State<SharedState>,
    Path((_region, _zip_name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Some(failure) = enter(&state, "bulk_download") {
        return failure;
    }
    if !has_bearer(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let archive = state.lock().unwrap().archive.clone();
    ([(header::CONTENT_TYPE, "application/zip")], archive).into_response()
}

async fn lead_list(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    if key != WEBHOOK_KEY {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if let Some(failure) = enter(&state, "lead_list") {
        return failure;
    }
    let phone = query
        .iter()
        .find(|(k, _)| k == "filter[PHONE]")
        .map(|(_, v)| v.clone())
        .unwrap_or_default();
    let mut state = state.lock().unwrap();
    state.lead_searches.push(phone.clone());
    let leads = state.leads.get(&phone).cloned().unwrap_or_default();
    Json(json!({"result": leads, "total": leads.len()})).into_response()
}

async fn upload_file(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if key != WEBHOOK_KEY {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if let Some(failure) = enter(&state, "upload") {
        return failure;
    }
    let is_multipart = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);
    if !is_multipart {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let text = String::from_utf8_lossy(&body);
    let file_name = text
        .split("filename=\"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .unwrap_or_default()
        .to_string();
    if file_name.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let mut state = state.lock().unwrap();
    state.uploads.push(file_name);
    let id = state.uploads.len();
    Json(json!({"result": {"ID": id, "file": {"url": format!("https://crm.test/disk/{}", id)}}}))
        .into_response()
}

async fn lead_update(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Form(form): Form<Vec<(String, String)>>,
) -> Response {
    if key != WEBHOOK_KEY {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if let Some(failure) = enter(&state, "lead_update") {
        return failure;
    }
    let lead_id = form.iter().find(|(k, _)| k == "ID").map(|(_, v)| v.clone());
    let field = format!("fields[{}]", ATTACHMENT_FIELD);
    let url = form.iter().find(|(k, _)| *k == field).map(|(_, v)| v.clone());
    match (lead_id, url) {
        (Some(lead_id), Some(url)) => {
            state.lock().unwrap().attachments.push((lead_id, url));
            Json(json!({"result": true})).into_response()
        }
        _ => (StatusCode::BAD_REQUEST, Json(json!({"result": false}))).into_response(),
    }
}

async fn timeline_comment(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Json(_body): Json<Value>,
) -> Response {
    if key != WEBHOOK_KEY {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if let Some(failure) = enter(&state, "comment") {
        return failure;
    }
    Json(json!({"result": 1})).into_response()
}

fn make_fake_app(state: SharedState) -> Router {
    Router::new()
        .route("/oauth/v2/token", post(token))
        .route("/storage/{region}/v3/regions", get(regions))
        .route("/storage/{region}/v3/objects", get(objects))
        .route("/storage/{region}/v3/bulk/download/start", post(bulk_start))
        .route(
            "/storage/{region}/v3/bulk/download/status/{zip_name}",
            get(bulk_status),
        )
        .route(
            "/storage/{region}/v3/bulk/download/{zip_name}",
            get(bulk_download),
        )
        .route("/rest/1/{key}/crm.lead.list.json", get(lead_list))
        .route("/rest/1/{key}/disk.storage.uploadfile.json", post(upload_file))
        .route("/rest/1/{key}/crm.lead.update.json", post(lead_update))
        .route(
            "/rest/1/{key}/crm.timeline.comment.add.json",
            post(timeline_comment),
        )
        .with_state(state)
}
