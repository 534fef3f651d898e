use std::io::{BufRead, BufReader};
use std::thread;

use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::feed::{FeedSink, Subscription, SubscriptionSource};
use crate::http_client::stream_client;

/// Realtime Database node consumed through the REST streaming endpoint.
#[derive(Debug, Clone)]
pub struct FirebaseSource {
    db_url: String,
    auth: Option<String>,
}

impl FirebaseSource {
    pub fn new(db_url: impl Into<String>, auth: Option<String>) -> Self {
        Self {
            db_url: db_url.into().trim_end_matches('/').to_string(),
            auth,
        }
    }

    pub fn stream_url(&self, collection: &str) -> String {
        let base = format!("{}/{}.json", self.db_url, collection.trim_matches('/'));
        match self.auth.as_deref() {
            Some(token) => format!("{base}?auth={token}"),
            None => base,
        }
    }
}

impl SubscriptionSource for FirebaseSource {
    fn subscribe(&self, collection: &str, sink: FeedSink) -> Result<Subscription> {
        let handle = sink.handle();
        let url = self.stream_url(collection);
        let collection = collection.to_string();
        thread::Builder::new()
            .name(format!("firebase-{collection}"))
            .spawn(move || {
                info!(collection = %collection, "opening firebase stream");
                let message = match stream_collection(&url, &sink) {
                    Ok(StreamEnd::Cancelled) => return,
                    Ok(StreamEnd::Terminal(message)) => message,
                    Err(err) => format!("{err:#}"),
                };
                if !sink.is_cancelled() {
                    warn!(collection = %collection, "firebase stream ended: {message}");
                    let _ = sink.error(message);
                }
            })
            .context("failed to spawn firebase stream thread")?;
        Ok(handle)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum StreamEnd {
    Cancelled,
    Terminal(String),
}

fn stream_collection(url: &str, sink: &FeedSink) -> Result<StreamEnd> {
    let client = stream_client()?;
    let resp = client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .send()
        .context("request failed")?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().unwrap_or_default();
        return Ok(StreamEnd::Terminal(http_error_message(status.as_u16(), &body)));
    }

    let mut parser = SseParser::default();
    let mut tree = RemoteTree::default();
    for line in BufReader::new(resp).lines() {
        let line = line.context("stream read failed")?;
        if sink.is_cancelled() {
            return Ok(StreamEnd::Cancelled);
        }
        let Some(event) = parser.push_line(&line) else {
            continue;
        };
        match tree.apply(&event)? {
            StreamStep::Changed => {
                if !sink.snapshot(tree.collection()) {
                    return Ok(StreamEnd::Cancelled);
                }
            }
            StreamStep::Idle => {}
            StreamStep::Terminal(message) => return Ok(StreamEnd::Terminal(message)),
        }
    }

    if sink.is_cancelled() {
        return Ok(StreamEnd::Cancelled);
    }
    Ok(StreamEnd::Terminal("stream closed by server".to_string()))
}

fn http_error_message(status: u16, body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if status == 401 || status == 403 => {
            format!("permission-denied: {}", parsed.error)
        }
        Ok(parsed) => format!("http {status}: {}", parsed.error),
        Err(_) if status == 401 || status == 403 => "permission-denied".to_string(),
        Err(_) => format!("http {status}"),
    }
}

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub name: String,
    pub data: String,
}

/// Line-oriented server-sent-events framing.
#[derive(Debug, Default)]
pub struct SseParser {
    name: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    /// Feed one line (without its terminator). Returns an event on the blank
    /// line that closes it.
    pub fn push_line(&mut self, line: &str) -> Option<SseEvent> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            if self.name.is_none() && self.data.is_empty() {
                return None;
            }
            let name = self.name.take().unwrap_or_else(|| "message".to_string());
            let data = std::mem::take(&mut self.data).join("\n");
            return Some(SseEvent { name, data });
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.name = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamStep {
    Changed,
    Idle,
    Terminal(String),
}

#[derive(Debug, Deserialize)]
struct PathData {
    path: String,
    data: Value,
}

/// Local copy of the streamed node, rebuilt from `put` / `patch` events.
#[derive(Debug, Clone, Default)]
pub struct RemoteTree {
    root: Value,
}

impl RemoteTree {
    pub fn apply(&mut self, event: &SseEvent) -> Result<StreamStep> {
        match event.name.as_str() {
            "put" => {
                let payload: PathData =
                    serde_json::from_str(&event.data).context("invalid put payload")?;
                self.put(&payload.path, payload.data);
                Ok(StreamStep::Changed)
            }
            "patch" => {
                let payload: PathData =
                    serde_json::from_str(&event.data).context("invalid patch payload")?;
                self.patch(&payload.path, payload.data);
                Ok(StreamStep::Changed)
            }
            "keep-alive" => Ok(StreamStep::Idle),
            "cancel" => Ok(StreamStep::Terminal(event_message(
                &event.data,
                "permission-denied",
            ))),
            "auth_revoked" => Ok(StreamStep::Terminal(event_message(
                &event.data,
                "auth-revoked",
            ))),
            other => {
                debug!(event = other, "ignoring unknown stream event");
                Ok(StreamStep::Idle)
            }
        }
    }

    pub fn put(&mut self, path: &str, data: Value) {
        let segments = split_path(path);
        set_at(&mut self.root, &segments, data);
    }

    pub fn patch(&mut self, path: &str, data: Value) {
        let Value::Object(children) = data else {
            self.put(path, data);
            return;
        };
        let base = split_path(path);
        for (key, value) in children {
            let mut segments = base.clone();
            segments.extend(split_path(&key));
            set_at(&mut self.root, &segments, value);
        }
    }

    /// Current contents, `None` when the node is empty.
    pub fn collection(&self) -> Option<Value> {
        match &self.root {
            Value::Null => None,
            Value::Object(map) if map.is_empty() => None,
            Value::Array(items) if items.is_empty() => None,
            other => Some(other.clone()),
        }
    }
}

fn event_message(data: &str, fallback: &str) -> String {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::String(text)) if !text.is_empty() => format!("{fallback}: {text}"),
        _ => fallback.to_string(),
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|seg| !seg.is_empty()).collect()
}

/// Write `value` at `segments` below `node`; `null` deletes and prunes
/// parents left empty. Returns true when `node` itself ends up empty.
fn set_at(node: &mut Value, segments: &[&str], value: Value) -> bool {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return node.is_null();
    };

    if let Value::Array(items) = node {
        let converted: Map<String, Value> = std::mem::take(items)
            .into_iter()
            .enumerate()
            .filter(|(_, item)| !item.is_null())
            .map(|(idx, item)| (idx.to_string(), item))
            .collect();
        *node = Value::Object(converted);
    }
    if !node.is_object() {
        if value.is_null() {
            return node.is_null();
        }
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return false;
    };

    if rest.is_empty() && value.is_null() {
        map.shift_remove(*head);
    } else {
        let child = map.entry(head.to_string()).or_insert(Value::Null);
        if set_at(child, rest, value) {
            map.shift_remove(*head);
        }
    }

    if map.is_empty() {
        *node = Value::Null;
        return true;
    }
    false
}
