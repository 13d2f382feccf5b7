//! Application state management
//!
//! Author: hephaex@gmail.com

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use leia_core::AppConfig;
use leia_rag::Assistant;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::handlers::chat::ChatMessage;

/// Sessions idle for longer than this are dropped
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);
/// Upper bound on live chat sessions
pub const MAX_SESSIONS: usize = 1_000;

/// One web chat conversation
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub messages: Vec<ChatMessage>,
    pub last_used: Instant,
}

impl ChatSession {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            last_used: Instant::now(),
        }
    }
}

/// Drop sessions idle past `idle_ttl`, then the least recently used ones
/// until there is room for one more below `max`
pub fn evict_sessions(
    sessions: &mut HashMap<Uuid, ChatSession>,
    now: Instant,
    idle_ttl: Duration,
    max: usize,
) {
    sessions.retain(|_, session| now.saturating_duration_since(session.last_used) <= idle_ttl);

    while !sessions.is_empty() && sessions.len() >= max {
        let oldest = sessions
            .iter()
            .min_by_key(|(_, session)| session.last_used)
            .map(|(id, _)| *id);
        match oldest {
            Some(id) => {
                sessions.remove(&id);
            }
            None => break,
        }
    }
}

/// Per-endpoint request statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct EndpointMetrics {
    pub requests: u64,
    pub total_latency_us: u64,
    pub status_counts: BTreeMap<u16, u64>,
}

impl EndpointMetrics {
    pub fn average_latency_ms(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.total_latency_us as f64 / self.requests as f64 / 1000.0
        }
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Question answering
    pub assistant: Assistant,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Statistics keyed by route template
    pub metrics: RwLock<HashMap<String, EndpointMetrics>>,
    /// Web chat sessions, evicted on idle or over capacity
    pub sessions: RwLock<HashMap<Uuid, ChatSession>>,
}

impl AppState {
    /// Create new application state with config
    pub fn new(config: AppConfig, assistant: Assistant) -> Self {
        Self {
            config,
            assistant,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            metrics: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Store a new session, evicting stale ones first
    pub async fn open_session(&self, messages: Vec<ChatMessage>) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        evict_sessions(&mut sessions, Instant::now(), SESSION_IDLE_TTL, MAX_SESSIONS);
        if sessions.len() < before {
            tracing::debug!(evicted = before - sessions.len(), "Chat sessions evicted");
        }
        sessions.insert(id, ChatSession::new(messages));
        id
    }

    /// Record one finished request
    pub async fn record_request(&self, endpoint: String, status: u16, latency_us: u64) {
        self.request_count.fetch_add(1, Ordering::SeqCst);

        let mut metrics = self.metrics.write().await;
        let entry = metrics.entry(endpoint).or_default();
        entry.requests += 1;
        entry.total_latency_us += latency_us;
        *entry.status_counts.entry(status).or_insert(0) += 1;
    }
}
