//! Sync context and structured event emission
//!
//! Everything an orchestrator shares with its siblings is passed in through
//! a [`SyncContext`] built by the process entry point: the static
//! configuration, the membership cache, the event sink and the change
//! notifier. There is no module-level state.

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::{MembershipCache, MemoryCache};
use crate::config::AppConfig;
use crate::notify::{ChangeNotifier, LogNotifier};

/// Severity of a [`SyncEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Structured record of one orchestration step
#[derive(Debug, Clone, Serialize)]
pub struct SyncEvent {
    pub level: LogLevel,
    pub operation: &'static str,
    pub org: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    pub status: String,
    pub correlation_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SyncEvent {
    pub fn new(
        level: LogLevel,
        operation: &'static str,
        org: impl Into<String>,
        status: impl Into<String>,
        correlation_id: Uuid,
    ) -> Self {
        SyncEvent {
            level,
            operation,
            org: org.into(),
            team: None,
            status: status.into(),
            correlation_id,
            detail: None,
        }
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Receives structured events from the orchestrators
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &SyncEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &SyncEvent) {
        let team = event.team.as_deref().unwrap_or("");
        let detail = event.detail.as_deref().unwrap_or("");
        macro_rules! emit_at {
            ($level:ident) => {
                tracing::$level!(
                    operation = event.operation,
                    org = %event.org,
                    team,
                    status = %event.status,
                    correlation_id = %event.correlation_id,
                    detail,
                    "sync event"
                )
            };
        }
        match event.level {
            LogLevel::Debug => emit_at!(debug),
            LogLevel::Info => emit_at!(info),
            LogLevel::Warning => emit_at!(warn),
            LogLevel::Error => emit_at!(error),
        }
    }
}

/// Shared state for one process, handed to every orchestrator
#[derive(Clone)]
pub struct SyncContext {
    pub config: Arc<AppConfig>,
    pub cache: Arc<dyn MembershipCache>,
    pub events: Arc<dyn EventSink>,
    pub notifier: Arc<dyn ChangeNotifier>,
}

impl SyncContext {
    /// In-memory cache, tracing sink and log notifier
    pub fn new(config: AppConfig) -> Self {
        SyncContext {
            config: Arc::new(config),
            cache: Arc::new(MemoryCache::new()),
            events: Arc::new(TracingSink),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn MembershipCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub(crate) fn emit(&self, event: SyncEvent) {
        self.events.emit(&event);
    }
}
