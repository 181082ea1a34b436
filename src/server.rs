//! HTTP endpoints: public site data, oracle flows, and the token-gated
//! admin console.

use std::{
    future::Future,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use anyhow::Result;
use axum::{
    extract::{Path as UrlPath, Query as UrlQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    ai::{self, AiClient},
    config::Settings,
    gate, model, seo,
    store::{self, Query, Store},
};

/// Wrong-token attempts tolerated before the admin API answers
/// "too many requests".
const MAX_FAILED_LOGINS: u32 = 5;

/// Collections editable through the generic admin CRUD routes.
const ADMIN_COLLECTIONS: &[&str] = &[
    "articles",
    "rituals",
    "guides",
    "testimonials",
    "vip_content",
    "transactions",
    "subscriptions",
    "notifications",
    "messages",
];

/// Shared state behind every handler.
pub struct AppState {
    pub store: Store,
    pub site_domain: String,
    pub admin_token: Option<String>,
    pub ai: Option<AiClient>,
    pub verbose: bool,
    failed_logins: AtomicU32,
}

impl AppState {
    pub fn new(store: Store, cfg: &Settings, ai: Option<AiClient>, verbose: bool) -> Self {
        Self {
            store,
            site_domain: cfg.site_domain.clone(),
            admin_token: cfg.admin_token.clone(),
            ai,
            verbose,
            failed_logins: AtomicU32::new(0),
        }
    }
}

/// Response body for the `/healthz` endpoint.
#[derive(Serialize, Deserialize)]
struct Health {
    /// Always "ok" when the server is running.
    status: String,
}

/// Start the HTTP server.
pub async fn serve_http(
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let app = router(state);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Build the full route table.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(site_info))
        .route("/healthz", get(healthz))
        .route("/api/articles", get(list_articles))
        .route("/api/articles/:id", get(get_article))
        .route("/api/articles/:id/like", post(like_article))
        .route(
            "/api/articles/:id/comments",
            get(list_comments).post(post_comment),
        )
        .route("/api/rituals", get(list_rituals))
        .route("/api/rituals/:id", get(get_ritual))
        .route("/api/guides", get(list_guides))
        .route("/api/guides/:id", get(get_guide))
        .route("/api/testimonials", get(list_testimonials))
        .route("/api/vip", get(list_vip))
        .route("/api/settings/:section", get(public_settings))
        .route("/api/contact", post(post_contact))
        .route("/api/profile", post(create_profile))
        .route("/api/profile/:id", get(get_profile))
        .route("/api/profile/:id/theme", put(set_theme))
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/read", post(read_notifications))
        .route("/api/oracle/reading", post(oracle_reading))
        .route("/api/oracle/dream", post(oracle_dream))
        .route("/api/oracle/herbal", post(oracle_herbal))
        .route("/admin/docs/:collection", get(admin_list).post(admin_create))
        .route(
            "/admin/docs/:collection/:id",
            put(admin_update).delete(admin_delete),
        )
        .route(
            "/admin/settings/:section",
            get(admin_get_settings).put(admin_put_settings),
        )
        .route("/admin/profiles/:id/premium", put(set_premium))
        .route("/admin/audit", get(audit_all))
        .route("/admin/audit/:id", get(audit_one))
        .route("/admin/ai/article", post(ai_article))
        .route("/admin/ai/ritual", post(ai_ritual))
        .route("/admin/ai/guide", post(ai_guide))
        .route("/admin/ai/seo-opportunities", post(ai_seo))
        .with_state(state)
}

fn err(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}

/// Check the admin bearer token. Failure messages follow the original's
/// taxonomy: missing credential, invalid credential, too many attempts.
fn check_admin(state: &AppState, headers: &HeaderMap) -> std::result::Result<(), Response> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(err(
            StatusCode::SERVICE_UNAVAILABLE,
            "admin interface is not configured",
        ));
    };
    let supplied = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match supplied {
        None => Err(err(StatusCode::UNAUTHORIZED, "authentication required")),
        Some(token) if token == expected => {
            state.failed_logins.store(0, Ordering::Relaxed);
            Ok(())
        }
        Some(_) => {
            let failures = state.failed_logins.fetch_add(1, Ordering::Relaxed) + 1;
            if failures >= MAX_FAILED_LOGINS {
                Err(err(
                    StatusCode::TOO_MANY_REQUESTS,
                    "too many failed attempts, try again later",
                ))
            } else {
                Err(err(StatusCode::UNAUTHORIZED, "invalid credentials"))
            }
        }
    }
}

/// Service information document.
async fn site_info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.verbose {
        println!("[http] GET /");
    }
    (
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Json(json!({
            "name": "sanctum",
            "software": "sanctum",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

/// Health check endpoint.
async fn healthz(State(state): State<Arc<AppState>>) -> Json<Health> {
    if state.verbose {
        println!("[http] GET /healthz");
    }
    Json(Health {
        status: "ok".to_string(),
    })
}

/// URL query parameters accepted by the list endpoints.
#[derive(Deserialize, Default)]
struct ListParams {
    tag: Option<String>,
    vip: Option<bool>,
    limit: Option<usize>,
    target: Option<String>,
}

/// List a collection, degrading to an empty page on storage errors.
fn list_page(state: &AppState, collection: &str, q: &Query) -> Json<Vec<Value>> {
    match state.store.list(collection, q) {
        Ok(docs) => {
            if state.verbose {
                println!("[http] GET {collection} -> {} docs", docs.len());
            }
            Json(docs)
        }
        Err(e) => {
            eprintln!("[http] list {collection} error: {e}");
            Json(vec![])
        }
    }
}

fn get_doc(state: &AppState, collection: &str, id: &str) -> Response {
    match state.store.get(collection, id) {
        Ok(Some(doc)) => Json(doc).into_response(),
        Ok(None) => err(StatusCode::NOT_FOUND, "not found"),
        Err(e) => {
            eprintln!("[http] get {collection}/{id} error: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

async fn list_articles(
    State(state): State<Arc<AppState>>,
    UrlQuery(p): UrlQuery<ListParams>,
) -> Json<Vec<Value>> {
    let q = Query {
        tag: p.tag,
        vip: p.vip,
        limit: p.limit,
        ..Default::default()
    };
    list_page(&state, "articles", &q)
}

async fn get_article(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
) -> Response {
    get_doc(&state, "articles", &id)
}

async fn like_article(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
) -> Response {
    match state.store.bump_likes(&id) {
        Ok(Some(likes)) => Json(json!({"likes": likes})).into_response(),
        Ok(None) => err(StatusCode::NOT_FOUND, "not found"),
        Err(e) => {
            eprintln!("[http] like {id} error: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

async fn list_comments(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
) -> Json<Vec<Value>> {
    match state.store.list_comments(&id) {
        Ok(docs) => Json(docs),
        Err(e) => {
            eprintln!("[http] comments {id} error: {e}");
            Json(vec![])
        }
    }
}

#[derive(Deserialize)]
struct CommentRequest {
    name: String,
    text: String,
}

async fn post_comment(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
    Json(req): Json<CommentRequest>,
) -> Response {
    match state.store.get("articles", &id) {
        Ok(Some(_)) => {}
        Ok(None) => return err(StatusCode::NOT_FOUND, "not found"),
        Err(e) => {
            eprintln!("[http] comment lookup {id} error: {e}");
            return err(StatusCode::INTERNAL_SERVER_ERROR, "storage error");
        }
    }
    let comment = model::Comment {
        id: store::new_id(),
        name: req.name,
        text: req.text,
        created_at: store::now_ms(),
    };
    match state.store.add_comment(&id, &comment) {
        Ok(()) => (StatusCode::CREATED, Json(comment)).into_response(),
        Err(e) => {
            eprintln!("[http] comment store {id} error: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

async fn list_rituals(
    State(state): State<Arc<AppState>>,
    UrlQuery(p): UrlQuery<ListParams>,
) -> Json<Vec<Value>> {
    let q = Query {
        limit: p.limit,
        ..Default::default()
    };
    list_page(&state, "rituals", &q)
}

async fn get_ritual(State(state): State<Arc<AppState>>, UrlPath(id): UrlPath<String>) -> Response {
    get_doc(&state, "rituals", &id)
}

async fn list_guides(
    State(state): State<Arc<AppState>>,
    UrlQuery(p): UrlQuery<ListParams>,
) -> Json<Vec<Value>> {
    let q = Query {
        limit: p.limit,
        ..Default::default()
    };
    list_page(&state, "guides", &q)
}

async fn get_guide(State(state): State<Arc<AppState>>, UrlPath(id): UrlPath<String>) -> Response {
    get_doc(&state, "guides", &id)
}

async fn list_testimonials(State(state): State<Arc<AppState>>) -> Json<Vec<Value>> {
    list_page(&state, "testimonials", &Query::default())
}

async fn list_vip(State(state): State<Arc<AppState>>) -> Json<Vec<Value>> {
    list_page(&state, "vip_content", &Query::default())
}

/// Public settings read; the `api_keys` section stays admin-only.
async fn public_settings(
    State(state): State<Arc<AppState>>,
    UrlPath(section): UrlPath<String>,
) -> Response {
    if !model::PUBLIC_SETTINGS_SECTIONS.contains(&section.as_str()) {
        return err(StatusCode::NOT_FOUND, "unknown settings section");
    }
    match state.store.get("settings", &section) {
        Ok(Some(doc)) => Json(doc).into_response(),
        Ok(None) => Json(json!({})).into_response(),
        Err(e) => {
            eprintln!("[http] settings {section} error: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

#[derive(Deserialize)]
struct ContactRequest {
    name: String,
    email: String,
    message: String,
}

async fn post_contact(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ContactRequest>,
) -> Response {
    let message = model::Message {
        id: store::new_id(),
        name: req.name,
        email: req.email,
        message: req.message,
        created_at: store::now_ms(),
    };
    let doc = match serde_json::to_value(&message) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("[http] contact encode error: {e}");
            return err(StatusCode::INTERNAL_SERVER_ERROR, "storage error");
        }
    };
    match state.store.put("messages", &message.id, &doc) {
        Ok(()) => (StatusCode::CREATED, Json(message)).into_response(),
        Err(e) => {
            eprintln!("[http] contact store error: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

fn load_profile(state: &AppState, id: &str) -> Result<Option<model::DeviceProfile>> {
    Ok(match state.store.get("profiles", id)? {
        Some(doc) => Some(serde_json::from_value(doc)?),
        None => None,
    })
}

fn save_profile(state: &AppState, profile: &model::DeviceProfile) -> Result<()> {
    state
        .store
        .put("profiles", &profile.id, &serde_json::to_value(profile)?)
}

/// Register a new device and hand back its generated id.
async fn create_profile(State(state): State<Arc<AppState>>) -> Response {
    let profile = model::DeviceProfile::new(store::new_id(), store::now_ms());
    match save_profile(&state, &profile) {
        Ok(()) => (StatusCode::CREATED, Json(profile)).into_response(),
        Err(e) => {
            eprintln!("[http] profile create error: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

async fn get_profile(State(state): State<Arc<AppState>>, UrlPath(id): UrlPath<String>) -> Response {
    match load_profile(&state, &id) {
        Ok(Some(profile)) => Json(profile).into_response(),
        Ok(None) => err(StatusCode::NOT_FOUND, "unknown device profile"),
        Err(e) => {
            eprintln!("[http] profile {id} error: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

#[derive(Deserialize)]
struct ThemeRequest {
    theme: String,
}

async fn set_theme(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
    Json(req): Json<ThemeRequest>,
) -> Response {
    let mut profile = match load_profile(&state, &id) {
        Ok(Some(p)) => p,
        Ok(None) => return err(StatusCode::NOT_FOUND, "unknown device profile"),
        Err(e) => {
            eprintln!("[http] profile {id} error: {e}");
            return err(StatusCode::INTERNAL_SERVER_ERROR, "storage error");
        }
    };
    profile.theme = req.theme;
    match save_profile(&state, &profile) {
        Ok(()) => Json(profile).into_response(),
        Err(e) => {
            eprintln!("[http] profile {id} save error: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

/// Latest notifications for a device, merged with global broadcasts.
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    UrlQuery(p): UrlQuery<ListParams>,
) -> Json<Vec<Value>> {
    let q = Query {
        target: Some(p.target.unwrap_or_else(|| model::GLOBAL_TARGET.into())),
        limit: Some(p.limit.unwrap_or(50).min(50)),
        ..Default::default()
    };
    list_page(&state, "notifications", &q)
}

#[derive(Deserialize)]
struct ReadRequest {
    target: String,
}

async fn read_notifications(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReadRequest>,
) -> Response {
    match state.store.mark_notifications_read(&req.target) {
        Ok(updated) => Json(json!({"updated": updated})).into_response(),
        Err(e) => {
            eprintln!("[http] notifications read error: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadingRequest {
    device_id: String,
    cards: Vec<String>,
    question: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DreamRequest {
    device_id: String,
    dream: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HerbalRequest {
    device_id: String,
    ailment: String,
}

async fn oracle_reading(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReadingRequest>,
) -> Response {
    let prompt = ai::prompts::oracle_reading(&req.cards, req.question.as_deref());
    oracle_flow(&state, &req.device_id, prompt).await
}

async fn oracle_dream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DreamRequest>,
) -> Response {
    let prompt = ai::prompts::dream_interpretation(&req.dream);
    oracle_flow(&state, &req.device_id, prompt).await
}

async fn oracle_herbal(
    State(state): State<Arc<AppState>>,
    Json(req): Json<HerbalRequest>,
) -> Response {
    let prompt = ai::prompts::herbal_prescription(&req.ailment);
    oracle_flow(&state, &req.device_id, prompt).await
}

/// Shared gate-then-generate flow for the free reading features. Usage is
/// only consumed after a successful generation.
async fn oracle_flow(state: &AppState, device_id: &str, prompt: String) -> Response {
    let mut profile = match load_profile(state, device_id) {
        Ok(Some(p)) => p,
        Ok(None) => return err(StatusCode::NOT_FOUND, "unknown device profile"),
        Err(e) => {
            eprintln!("[http] profile {device_id} error: {e}");
            return err(StatusCode::INTERNAL_SERVER_ERROR, "storage error");
        }
    };
    let now = store::now_ms();
    if !gate::can_use(&profile, now) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "free reading not yet available",
                "retryIn": gate::time_remaining(&profile, now),
            })),
        )
            .into_response();
    }
    let Some(client) = &state.ai else {
        return err(StatusCode::SERVICE_UNAVAILABLE, "AI is not configured");
    };
    match client.generate(&prompt, false).await {
        Ok(html) => {
            gate::register_usage(&mut profile, now);
            if let Err(e) = save_profile(state, &profile) {
                eprintln!("[http] profile {device_id} save error: {e}");
            }
            Json(json!({
                "html": html,
                "timeRemaining": gate::time_remaining(&profile, now),
            }))
            .into_response()
        }
        Err(e) => {
            eprintln!("[http] oracle error: {e}");
            err(
                StatusCode::BAD_GATEWAY,
                "the oracle is silent right now, try again later",
            )
        }
    }
}

/// Assign a fresh id and ordering stamp where missing; force `forced_id`
/// when updating through the URL.
fn prepare_doc(
    collection: &str,
    forced_id: Option<&str>,
    doc: &mut Value,
) -> std::result::Result<String, String> {
    let stamp_field = store::order_field(collection);
    let obj = doc
        .as_object_mut()
        .ok_or("document must be a JSON object")?;
    let id = match forced_id {
        Some(id) => {
            obj.insert("id".into(), Value::String(id.to_string()));
            id.to_string()
        }
        None => match obj.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let id = store::new_id();
                obj.insert("id".into(), Value::String(id.clone()));
                id
            }
        },
    };
    if obj.get(stamp_field).and_then(Value::as_u64).is_none() {
        obj.insert(stamp_field.into(), store::now_ms().into());
    }
    Ok(id)
}

/// Validate a document against its collection's record type before storing.
fn validate_doc(collection: &str, doc: &Value) -> std::result::Result<(), String> {
    fn check<T: DeserializeOwned>(doc: &Value) -> std::result::Result<(), String> {
        serde_json::from_value::<T>(doc.clone())
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
    match collection {
        "articles" => check::<model::Article>(doc),
        "rituals" => check::<model::Ritual>(doc),
        "guides" => check::<model::Guide>(doc),
        "testimonials" => check::<model::Testimonial>(doc),
        "vip_content" => check::<model::VipContent>(doc),
        "transactions" => check::<model::Transaction>(doc),
        "subscriptions" => check::<model::Subscription>(doc),
        "notifications" => check::<model::Notification>(doc),
        "messages" => check::<model::Message>(doc),
        other => Err(format!("collection is not editable here: {other}")),
    }
}

async fn admin_list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    UrlPath(collection): UrlPath<String>,
    UrlQuery(p): UrlQuery<ListParams>,
) -> Response {
    if let Err(resp) = check_admin(&state, &headers) {
        return resp;
    }
    if !ADMIN_COLLECTIONS.contains(&collection.as_str()) {
        return err(StatusCode::NOT_FOUND, "unknown collection");
    }
    let q = Query {
        limit: p.limit,
        target: p.target,
        ..Default::default()
    };
    list_page(&state, &collection, &q).into_response()
}

async fn admin_create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    UrlPath(collection): UrlPath<String>,
    Json(mut doc): Json<Value>,
) -> Response {
    if let Err(resp) = check_admin(&state, &headers) {
        return resp;
    }
    if !ADMIN_COLLECTIONS.contains(&collection.as_str()) {
        return err(StatusCode::NOT_FOUND, "unknown collection");
    }
    let id = match prepare_doc(&collection, None, &mut doc) {
        Ok(id) => id,
        Err(e) => return err(StatusCode::BAD_REQUEST, &e),
    };
    if let Err(e) = validate_doc(&collection, &doc) {
        return err(StatusCode::BAD_REQUEST, &e);
    }
    match state.store.put(&collection, &id, &doc) {
        Ok(()) => (StatusCode::CREATED, Json(doc)).into_response(),
        Err(e) => {
            eprintln!("[http] create {collection} error: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

async fn admin_update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    UrlPath((collection, id)): UrlPath<(String, String)>,
    Json(mut doc): Json<Value>,
) -> Response {
    if let Err(resp) = check_admin(&state, &headers) {
        return resp;
    }
    if !ADMIN_COLLECTIONS.contains(&collection.as_str()) {
        return err(StatusCode::NOT_FOUND, "unknown collection");
    }
    if let Err(e) = prepare_doc(&collection, Some(&id), &mut doc) {
        return err(StatusCode::BAD_REQUEST, &e);
    }
    if let Err(e) = validate_doc(&collection, &doc) {
        return err(StatusCode::BAD_REQUEST, &e);
    }
    match state.store.put(&collection, &id, &doc) {
        Ok(()) => Json(doc).into_response(),
        Err(e) => {
            eprintln!("[http] update {collection}/{id} error: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

async fn admin_delete(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    UrlPath((collection, id)): UrlPath<(String, String)>,
) -> Response {
    if let Err(resp) = check_admin(&state, &headers) {
        return resp;
    }
    if !ADMIN_COLLECTIONS.contains(&collection.as_str()) {
        return err(StatusCode::NOT_FOUND, "unknown collection");
    }
    match state.store.delete(&collection, &id) {
        Ok(deleted) => Json(json!({"deleted": deleted})).into_response(),
        Err(e) => {
            eprintln!("[http] delete {collection}/{id} error: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

async fn admin_get_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    UrlPath(section): UrlPath<String>,
) -> Response {
    if let Err(resp) = check_admin(&state, &headers) {
        return resp;
    }
    if !model::SETTINGS_SECTIONS.contains(&section.as_str()) {
        return err(StatusCode::NOT_FOUND, "unknown settings section");
    }
    match state.store.get("settings", &section) {
        Ok(Some(doc)) => Json(doc).into_response(),
        Ok(None) => Json(json!({})).into_response(),
        Err(e) => {
            eprintln!("[http] settings {section} error: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

async fn admin_put_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    UrlPath(section): UrlPath<String>,
    Json(doc): Json<Value>,
) -> Response {
    if let Err(resp) = check_admin(&state, &headers) {
        return resp;
    }
    if !model::SETTINGS_SECTIONS.contains(&section.as_str()) {
        return err(StatusCode::NOT_FOUND, "unknown settings section");
    }
    if !doc.is_object() {
        return err(StatusCode::BAD_REQUEST, "settings must be a JSON object");
    }
    match state.store.put("settings", &section, &doc) {
        Ok(()) => Json(doc).into_response(),
        Err(e) => {
            eprintln!("[http] settings {section} save error: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

#[derive(Deserialize)]
struct PremiumRequest {
    premium: bool,
}

async fn set_premium(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    UrlPath(id): UrlPath<String>,
    Json(req): Json<PremiumRequest>,
) -> Response {
    if let Err(resp) = check_admin(&state, &headers) {
        return resp;
    }
    let mut profile = match load_profile(&state, &id) {
        Ok(Some(p)) => p,
        Ok(None) => return err(StatusCode::NOT_FOUND, "unknown device profile"),
        Err(e) => {
            eprintln!("[http] profile {id} error: {e}");
            return err(StatusCode::INTERNAL_SERVER_ERROR, "storage error");
        }
    };
    profile.premium = req.premium;
    match save_profile(&state, &profile) {
        Ok(()) => Json(profile).into_response(),
        Err(e) => {
            eprintln!("[http] profile {id} save error: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

fn audit_report(state: &AppState, doc: &Value) -> Option<Value> {
    let article: model::Article = serde_json::from_value(doc.clone()).ok()?;
    let audit = seo::audit_article(&article, &state.site_domain);
    Some(json!({
        "id": article.id,
        "title": article.title,
        "score": audit.score,
        "issues": audit.issues,
    }))
}

async fn audit_all(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(resp) = check_admin(&state, &headers) {
        return resp;
    }
    let docs = match state.store.list("articles", &Query::default()) {
        Ok(docs) => docs,
        Err(e) => {
            eprintln!("[http] audit error: {e}");
            return err(StatusCode::INTERNAL_SERVER_ERROR, "storage error");
        }
    };
    let reports: Vec<Value> = docs.iter().filter_map(|d| audit_report(&state, d)).collect();
    Json(reports).into_response()
}

async fn audit_one(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    UrlPath(id): UrlPath<String>,
) -> Response {
    if let Err(resp) = check_admin(&state, &headers) {
        return resp;
    }
    match state.store.get("articles", &id) {
        Ok(Some(doc)) => match audit_report(&state, &doc) {
            Some(report) => Json(report).into_response(),
            None => err(StatusCode::INTERNAL_SERVER_ERROR, "article is malformed"),
        },
        Ok(None) => err(StatusCode::NOT_FOUND, "not found"),
        Err(e) => {
            eprintln!("[http] audit {id} error: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

/// Run one generation request and validate the draft before returning it.
/// Drafts are handed back to the console, never stored directly.
async fn generate_draft<T: DeserializeOwned + Serialize>(
    state: &AppState,
    kind: &'static str,
    prompt: String,
) -> Response {
    let Some(client) = &state.ai else {
        return err(StatusCode::SERVICE_UNAVAILABLE, "AI is not configured");
    };
    match client.generate(&prompt, true).await {
        Ok(raw) => match ai::parse_draft::<T>(kind, &raw) {
            Ok(draft) => Json(draft).into_response(),
            Err(e) => {
                eprintln!("[http] {kind} parse error: {e}");
                err(
                    StatusCode::BAD_GATEWAY,
                    "the generator returned an unusable draft",
                )
            }
        },
        Err(e) => {
            eprintln!("[http] {kind} request error: {e}");
            err(
                StatusCode::BAD_GATEWAY,
                "content generation failed, try again later",
            )
        }
    }
}

#[derive(Deserialize)]
struct AiArticleRequest {
    topic: String,
    keyword: Option<String>,
}

async fn ai_article(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AiArticleRequest>,
) -> Response {
    if let Err(resp) = check_admin(&state, &headers) {
        return resp;
    }
    let prompt = ai::prompts::article_draft(&req.topic, req.keyword.as_deref());
    generate_draft::<ai::ArticleDraft>(&state, "article draft", prompt).await
}

#[derive(Deserialize)]
struct AiTopicRequest {
    topic: String,
}

async fn ai_ritual(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AiTopicRequest>,
) -> Response {
    if let Err(resp) = check_admin(&state, &headers) {
        return resp;
    }
    let prompt = ai::prompts::ritual_draft(&req.topic);
    generate_draft::<ai::RitualDraft>(&state, "ritual draft", prompt).await
}

#[derive(Deserialize)]
struct AiGuideRequest {
    name: String,
    line: String,
}

async fn ai_guide(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AiGuideRequest>,
) -> Response {
    if let Err(resp) = check_admin(&state, &headers) {
        return resp;
    }
    let prompt = ai::prompts::guide_draft(&req.name, &req.line);
    generate_draft::<ai::GuideDraft>(&state, "guide draft", prompt).await
}

async fn ai_seo(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AiTopicRequest>,
) -> Response {
    if let Err(resp) = check_admin(&state, &headers) {
        return resp;
    }
    let titles: Vec<String> = state
        .store
        .list("articles", &Query::default())
        .unwrap_or_default()
        .iter()
        .filter_map(|d| d.get("title").and_then(Value::as_str).map(str::to_string))
        .collect();
    let prompt = ai::prompts::seo_opportunities(&req.topic, &titles);
    let Some(client) = &state.ai else {
        return err(StatusCode::SERVICE_UNAVAILABLE, "AI is not configured");
    };
    match client.generate(&prompt, true).await {
        Ok(raw) => match ai::parse_draft::<ai::SeoOpportunityList>("seo opportunities", &raw) {
            Ok(list) => Json(list.opportunities).into_response(),
            Err(e) => {
                eprintln!("[http] seo opportunities parse error: {e}");
                err(
                    StatusCode::BAD_GATEWAY,
                    "the generator returned an unusable draft",
                )
            }
        },
        Err(e) => {
            eprintln!("[http] seo opportunities request error: {e}");
            err(
                StatusCode::BAD_GATEWAY,
                "content generation failed, try again later",
            )
        }
    }
}
