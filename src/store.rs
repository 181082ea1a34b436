//! File-backed document store with collection semantics.
//!
//! Documents are plain JSON objects written atomically under
//! `collections/<name>/<id>.json`. Every mutation appends one line to the
//! change log and publishes on the live feed. Guarantees are per-document
//! only: there are no cross-document transactions and no referential
//! integrity (deleting an article leaves its comments behind).

use std::{
    collections::HashSet,
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{anyhow, bail, Result};
use rand::RngCore;
use serde_json::{to_writer, Value};
use sha1::{Digest, Sha1};

use crate::live::{Change, Hub, Op};
use crate::model;

/// Persistent store rooted at `root`, with a shared live feed.
#[derive(Clone)]
pub struct Store {
    root: PathBuf,
    hub: Hub,
}

/// Filters accepted by [`Store::list`], shared by the HTTP and WS interfaces.
#[derive(Debug, Default, Clone)]
pub struct Query {
    /// Article tag filter, resolved through the tag index.
    pub tag: Option<String>,
    /// Notification target; matches the device id or the global marker.
    pub target: Option<String>,
    /// Article VIP flag filter.
    pub vip: Option<bool>,
    /// Lower bound on the ordering timestamp.
    pub since: Option<u64>,
    /// Upper bound on the ordering timestamp.
    pub until: Option<u64>,
    /// Maximum number of documents, newest first.
    pub limit: Option<usize>,
}

impl Store {
    /// Create a store rooted at `root`.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            hub: Hub::new(),
        }
    }

    /// Live feed shared by all clones of this store.
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Ensure the on-disk directory structure exists.
    pub fn init(&self) -> Result<()> {
        for collection in model::COLLECTIONS {
            fs::create_dir_all(self.root.join("collections").join(collection))?;
        }
        for dir in ["comments", "log", "index/by-tag"] {
            fs::create_dir_all(self.root.join(dir))?;
        }
        Ok(())
    }

    fn doc_path(&self, collection: &str, id: &str) -> PathBuf {
        self.root
            .join("collections")
            .join(collection)
            .join(format!("{id}.json"))
    }

    /// Create or replace a document. Last write wins.
    pub fn put(&self, collection: &str, id: &str, doc: &Value) -> Result<()> {
        ensure_collection(collection)?;
        validate_key(id)?;
        write_json_atomic(&self.doc_path(collection, id), doc)?;
        self.log_change("put", collection, id)?;
        if collection == "articles" {
            self.index_article_tags(id, doc)?;
        }
        self.hub.publish(Change {
            collection: collection.into(),
            parent: None,
            id: id.into(),
            op: Op::Put,
            doc: Some(doc.clone()),
        });
        Ok(())
    }

    /// Load a document, or `None` if absent.
    pub fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        ensure_collection(collection)?;
        validate_key(id)?;
        let path = self.doc_path(collection, id);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    /// Remove a document. Returns whether anything was deleted. Comments of a
    /// deleted article are intentionally left in place.
    pub fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        ensure_collection(collection)?;
        validate_key(id)?;
        let path = self.doc_path(collection, id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        self.log_change("delete", collection, id)?;
        self.hub.publish(Change {
            collection: collection.into(),
            parent: None,
            id: id.into(),
            op: Op::Delete,
            doc: None,
        });
        Ok(true)
    }

    /// List a collection newest-first, applying the query filters.
    pub fn list(&self, collection: &str, q: &Query) -> Result<Vec<Value>> {
        ensure_collection(collection)?;
        let mut docs = if collection == "articles" && q.tag.is_some() {
            let tag = q.tag.as_deref().unwrap();
            let path = self
                .root
                .join("index/by-tag")
                .join(format!("{}.txt", tag_key(tag)));
            read_ids(&path)?
                .into_iter()
                .filter_map(|id| self.get(collection, &id).ok().flatten())
                .collect()
        } else {
            self.read_collection(collection)?
        };
        // The index is append-only and may hold stale entries; trust the
        // document's own tags.
        if let Some(tag) = &q.tag {
            docs.retain(|d| doc_tags(d).iter().any(|t| t == tag));
        }
        if let Some(vip) = q.vip {
            docs.retain(|d| d.get("vip").and_then(Value::as_bool).unwrap_or(false) == vip);
        }
        if let Some(target) = &q.target {
            docs.retain(|d| {
                let t = d.get("target").and_then(Value::as_str).unwrap_or_default();
                t == target || t == model::GLOBAL_TARGET
            });
        }
        let key = order_field(collection);
        if let Some(since) = q.since {
            docs.retain(|d| stamp(d, key) >= since);
        }
        if let Some(until) = q.until {
            docs.retain(|d| stamp(d, key) <= until);
        }
        docs.sort_by_key(|d| std::cmp::Reverse(stamp(d, key)));
        if let Some(limit) = q.limit {
            docs.truncate(limit);
        }
        Ok(docs)
    }

    fn read_collection(&self, collection: &str) -> Result<Vec<Value>> {
        let dir = self.root.join("collections").join(collection);
        if !dir.exists() {
            return Ok(vec![]);
        }
        let mut docs = vec![];
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(data) = fs::read_to_string(entry.path()) {
                if let Ok(doc) = serde_json::from_str::<Value>(&data) {
                    docs.push(doc);
                }
            }
        }
        Ok(docs)
    }

    /// Ingest a document file into a collection. Documents without an id get
    /// a stable content-derived one so re-imports are idempotent; documents
    /// without an ordering timestamp are stamped with the current time.
    pub fn import(&self, collection: &str, mut doc: Value) -> Result<String> {
        ensure_collection(collection)?;
        let stamp_field = order_field(collection);
        let obj = doc
            .as_object_mut()
            .ok_or_else(|| anyhow!("document must be a JSON object"))?;
        let id = match obj.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let id = stable_id(&Value::Object(obj.clone()));
                obj.insert("id".into(), Value::String(id.clone()));
                id
            }
        };
        if obj.get(stamp_field).and_then(Value::as_u64).is_none() {
            obj.insert(stamp_field.into(), now_ms().into());
        }
        self.put(collection, &id, &doc)?;
        Ok(id)
    }

    /// Increment an article's likes counter. Returns the new count, or
    /// `None` if the article does not exist.
    pub fn bump_likes(&self, article_id: &str) -> Result<Option<u64>> {
        let Some(mut doc) = self.get("articles", article_id)? else {
            return Ok(None);
        };
        let likes = doc.get("likes").and_then(Value::as_u64).unwrap_or(0) + 1;
        doc["likes"] = likes.into();
        self.put("articles", article_id, &doc)?;
        Ok(Some(likes))
    }

    fn comments_dir(&self, article_id: &str) -> PathBuf {
        self.root.join("comments").join(article_id)
    }

    /// Store a comment under its article and publish it on the feed.
    pub fn add_comment(&self, article_id: &str, comment: &model::Comment) -> Result<()> {
        validate_key(article_id)?;
        validate_key(&comment.id)?;
        let path = self
            .comments_dir(article_id)
            .join(format!("{}.json", comment.id));
        let doc = serde_json::to_value(comment)?;
        write_json_atomic(&path, &doc)?;
        self.log_change("put", "comments", &comment.id)?;
        self.hub.publish(Change {
            collection: "comments".into(),
            parent: Some(article_id.into()),
            id: comment.id.clone(),
            op: Op::Put,
            doc: Some(doc),
        });
        Ok(())
    }

    /// Comments for an article in creation order, oldest first.
    pub fn list_comments(&self, article_id: &str) -> Result<Vec<Value>> {
        validate_key(article_id)?;
        let dir = self.comments_dir(article_id);
        if !dir.exists() {
            return Ok(vec![]);
        }
        let mut comments = vec![];
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if let Ok(data) = fs::read_to_string(entry.path()) {
                if let Ok(doc) = serde_json::from_str::<Value>(&data) {
                    comments.push(doc);
                }
            }
        }
        comments.sort_by_key(|d| stamp(d, "createdAt"));
        Ok(comments)
    }

    /// Flag every unread notification addressed exactly to `target` as read.
    /// Global broadcasts keep their shared flag untouched. This is a batch of
    /// per-document writes, not a transaction.
    pub fn mark_notifications_read(&self, target: &str) -> Result<usize> {
        let mut updated = 0;
        for mut doc in self.read_collection("notifications")? {
            let addressed = doc.get("target").and_then(Value::as_str) == Some(target);
            let read = doc.get("read").and_then(Value::as_bool).unwrap_or(false);
            if !addressed || read {
                continue;
            }
            let Some(id) = doc.get("id").and_then(Value::as_str).map(str::to_string) else {
                continue;
            };
            doc["read"] = true.into();
            self.put("notifications", &id, &doc)?;
            updated += 1;
        }
        Ok(updated)
    }

    /// Rebuild the article tag index from the document tree.
    pub fn reindex(&self) -> Result<()> {
        let dir = self.root.join("index/by-tag");
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;
        let articles = self.root.join("collections/articles");
        if !articles.exists() {
            return Ok(());
        }
        for entry in walkdir::WalkDir::new(articles) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let data = fs::read_to_string(entry.path())?;
            if let Ok(doc) = serde_json::from_str::<Value>(&data) {
                if let Some(id) = doc.get("id").and_then(Value::as_str) {
                    self.index_article_tags(id, &doc)?;
                }
            }
        }
        Ok(())
    }

    /// Record an article id under each of its tags.
    fn index_article_tags(&self, id: &str, doc: &Value) -> Result<()> {
        for tag in doc_tags(doc) {
            self.append_index(&tag, id)?;
        }
        Ok(())
    }

    /// Append an article id to a tag's index file unless already present.
    fn append_index(&self, tag: &str, id: &str) -> Result<()> {
        let path = self
            .root
            .join("index/by-tag")
            .join(format!("{}.txt", tag_key(tag)));
        if read_ids(&path)?.contains(id) {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut f = fs::OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(f, "{id}")?;
        Ok(())
    }

    /// Append one line to the newline-delimited change log.
    fn log_change(&self, op: &str, collection: &str, id: &str) -> Result<()> {
        let path = self.root.join("log/changes.ndjson");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut f = fs::OpenOptions::new().create(true).append(true).open(path)?;
        serde_json::to_writer(
            &mut f,
            &serde_json::json!({"op": op, "collection": collection, "id": id, "ts": now_ms()}),
        )?;
        f.write_all(b"\n")?;
        Ok(())
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Fresh random document id.
pub fn new_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Stable id derived from a document's content.
fn stable_id(doc: &Value) -> String {
    let mut hasher = Sha1::new();
    hasher.update(doc.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Reject ids and keys that could escape the store directory.
pub fn validate_key(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("document id cannot be empty");
    }
    if name.contains('/') || name.contains('\\') {
        bail!("document id cannot contain path separators");
    }
    if name == "." || name == ".." {
        bail!("document id cannot be '.' or '..'");
    }
    if name.chars().any(|c| c.is_control()) {
        bail!("document id cannot contain control characters");
    }
    Ok(())
}

fn ensure_collection(collection: &str) -> Result<()> {
    if model::COLLECTIONS.contains(&collection) {
        return Ok(());
    }
    bail!("unknown collection: {collection}")
}

/// Field used for ordering a collection's feed.
pub(crate) fn order_field(collection: &str) -> &'static str {
    // Notifications carry a sender-supplied timestamp; everything else is
    // stamped by the server on creation.
    if collection == "notifications" {
        "timestamp"
    } else {
        "createdAt"
    }
}

fn stamp(doc: &Value, key: &str) -> u64 {
    doc.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn doc_tags(doc: &Value) -> Vec<String> {
    doc.get("tags")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Filesystem-safe key for a tag's index file.
fn tag_key(tag: &str) -> String {
    tag.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Read newline-separated ids from an index file.
fn read_ids(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        return Ok(Default::default());
    }
    let data = fs::read_to_string(path)?;
    Ok(data.lines().map(|s| s.to_string()).collect())
}

/// Write a JSON document atomically via a temp file in the same directory.
fn write_json_atomic(path: &Path, doc: &Value) -> Result<()> {
    let parent = path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&parent)?;
    let tmp = tempfile::NamedTempFile::new_in(&parent)?;
    to_writer(&tmp, doc)?;
    tmp.persist(path)?;
    Ok(())
}
