// Session store module
// In-memory sessions keyed by a random id carried in a cookie

use hyper::header::{HeaderMap, COOKIE};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::results::DiagnosisResult;

/// One diagnosis kept in the session history
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub filename: String,
    pub result: DiagnosisResult,
    pub image_data: String,
    pub mime_type: String,
    pub timestamp: String,
}

/// Per-user session data
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub logged_in: bool,
    pub results_history: Vec<HistoryEntry>,
    pub settings: Value,
}

impl Session {
    /// Fresh logged-in session
    pub fn logged_in() -> Self {
        Self {
            logged_in: true,
            results_history: Vec::new(),
            settings: default_settings(),
        }
    }
}

/// Display settings applied when a user logs in
pub fn default_settings() -> Value {
    serde_json::json!({
        "theme": "dark",
        "notifications": true,
        "highlight_color": "#ff0000",
        "language": "en",
        "contrast": "normal",
        "font_size": "medium"
    })
}

/// Concurrent session store
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session and return its id
    pub async fn create(&self, session: Session) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.sessions.write().await.insert(id.clone(), session);
        id
    }

    /// Replace the session stored under `id`, keeping the id
    pub async fn insert(&self, id: &str, session: Session) {
        self.sessions.write().await.insert(id.to_string(), session);
    }

    pub async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Apply `f` to the session if it exists
    pub async fn update<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.sessions.write().await.get_mut(id).map(f)
    }

    pub async fn remove(&self, id: &str) -> Option<Session> {
        self.sessions.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Read a cookie value from the request headers
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// `Set-Cookie` value for a session id
pub fn session_cookie(name: &str, id: &str) -> String {
    format!("{name}={id}; Path=/; HttpOnly; SameSite=Lax")
}

/// `Set-Cookie` value that clears the session cookie
pub fn expired_cookie(name: &str) -> String {
    format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
