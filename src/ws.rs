//! WebSocket subscriptions: snapshot replay plus live pushes.
//!
//! Frames are JSON arrays. A client sends `["SUB", id, {filter}]` and
//! receives `["DOC", id, doc]` for every matching stored document, then
//! `["EOSE", id]`, then further `["DOC", …]` / `["GONE", id, docId]` frames
//! as documents change. `["CLOSE", id]` cancels a subscription. Malformed
//! frames are ignored. Snapshots are ordered per collection; there is no
//! cross-collection ordering guarantee.

use std::{collections::HashMap, future::Future, net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;

use crate::live::{Change, Op};
use crate::model;
use crate::store::{Query, Store};

/// One active subscription's filter.
#[derive(Debug, Clone, PartialEq)]
struct SubSpec {
    collection: String,
    /// Device id for notification feeds; global broadcasts always match.
    target: Option<String>,
    /// Article id for comment feeds.
    article: Option<String>,
}

/// Start the WebSocket server.
pub async fn serve_ws(
    addr: SocketAddr,
    store: Store,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let app = Router::new()
        .route("/", get(handler))
        .with_state(Arc::new(store));
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Handle the HTTP upgrade and spawn the connection processor.
async fn handler(ws: WebSocketUpgrade, State(store): State<Arc<Store>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| async move { process(socket, store).await })
}

/// Drive one connection: react to client frames and forward live changes.
async fn process(mut socket: WebSocket, store: Arc<Store>) {
    let mut rx = store.hub().subscribe();
    let mut subs: HashMap<String, SubSpec> = HashMap::new();
    loop {
        tokio::select! {
            msg = socket.next() => {
                let Some(Ok(msg)) = msg else { break };
                if let Message::Text(txt) = msg {
                    if handle_frame(&mut socket, &store, &mut subs, &txt).await.is_err() {
                        break;
                    }
                }
            }
            change = rx.recv() => {
                match change {
                    Ok(change) => {
                        if forward_change(&mut socket, &subs, &change).await.is_err() {
                            break;
                        }
                    }
                    // dropped behind; clients re-sync by resubscribing
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
}

/// Process one client frame. Returns `Err` only when the socket is gone.
async fn handle_frame(
    socket: &mut WebSocket,
    store: &Store,
    subs: &mut HashMap<String, SubSpec>,
    txt: &str,
) -> std::result::Result<(), axum::Error> {
    let Ok(val) = serde_json::from_str::<Value>(txt) else {
        return Ok(());
    };
    let Some(arr) = val.as_array() else {
        return Ok(());
    };
    match arr.first().and_then(|v| v.as_str()) {
        Some("SUB") if arr.len() >= 3 => {
            let sub = arr[1].as_str().unwrap_or_default().to_string();
            let Some((spec, limit)) = parse_spec(&arr[2]) else {
                return Ok(());
            };
            for doc in snapshot(store, &spec, limit) {
                let frame = serde_json::json!(["DOC", sub, doc]);
                socket.send(Message::Text(frame.to_string())).await?;
            }
            let eose = serde_json::json!(["EOSE", sub]);
            socket.send(Message::Text(eose.to_string())).await?;
            subs.insert(sub, spec);
        }
        Some("CLOSE") => {
            if let Some(sub) = arr.get(1).and_then(|v| v.as_str()) {
                subs.remove(sub);
            }
        }
        _ => {}
    }
    Ok(())
}

/// Push one change to every subscription it matches.
async fn forward_change(
    socket: &mut WebSocket,
    subs: &HashMap<String, SubSpec>,
    change: &Change,
) -> std::result::Result<(), axum::Error> {
    for (sub, spec) in subs {
        if !matches(spec, change) {
            continue;
        }
        let frame = match change.op {
            Op::Put => serde_json::json!(["DOC", sub, change.doc]),
            Op::Delete => serde_json::json!(["GONE", sub, change.id]),
        };
        socket.send(Message::Text(frame.to_string())).await?;
    }
    Ok(())
}

/// Parse a subscription filter object. `collection` is required.
fn parse_spec(val: &Value) -> Option<(SubSpec, Option<usize>)> {
    let collection = val.get("collection")?.as_str()?.to_string();
    let target = val
        .get("target")
        .and_then(Value::as_str)
        .map(str::to_string);
    let article = val
        .get("article")
        .and_then(Value::as_str)
        .map(str::to_string);
    let limit = val.get("limit").and_then(Value::as_u64).map(|v| v as usize);
    Some((
        SubSpec {
            collection,
            target,
            article,
        },
        limit,
    ))
}

/// Load the documents a fresh subscription starts from. Storage errors
/// degrade to an empty snapshot.
fn snapshot(store: &Store, spec: &SubSpec, limit: Option<usize>) -> Vec<Value> {
    if spec.collection == "comments" {
        let Some(article) = &spec.article else {
            return vec![];
        };
        return store.list_comments(article).unwrap_or_default();
    }
    let limit = if spec.collection == "notifications" {
        // the feed caps at the latest 50
        Some(limit.unwrap_or(50).min(50))
    } else {
        limit
    };
    let q = Query {
        target: spec.target.clone(),
        limit,
        ..Default::default()
    };
    store.list(&spec.collection, &q).unwrap_or_default()
}

/// Whether a live change belongs to a subscription.
fn matches(spec: &SubSpec, change: &Change) -> bool {
    if spec.collection != change.collection {
        return false;
    }
    if change.collection == "comments" {
        return match (&spec.article, &change.parent) {
            (Some(article), Some(parent)) => article == parent,
            _ => false,
        };
    }
    // deletes carry no body to filter on; the id is enough for the client
    if change.op == Op::Delete {
        return true;
    }
    if let (Some(target), "notifications") = (&spec.target, change.collection.as_str()) {
        let t = change
            .doc
            .as_ref()
            .and_then(|d| d.get("target"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        return t == target || t == model::GLOBAL_TARGET;
    }
    true
}
