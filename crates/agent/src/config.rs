//! Agent configuration

use std::time::Duration;

use debugger_protocol::DEFAULT_MAX_REF_DEPTH;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::Result;

/// Per-session agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub session_id: String,
    /// WebSocket endpoint of the debugging backend
    pub endpoint: String,
    pub command_timeout_ms: u64,
    /// Ask for script sources in `scripts`
    pub include_source: bool,
    pub max_ref_depth: usize,
    /// Diagnostics kept in memory, oldest dropped first
    pub diagnostic_history: usize,
    /// Message sent after every command so the backend services it
    pub yield_message: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            session_id: Uuid::now_v7().to_string(),
            endpoint: "ws://127.0.0.1:9222".to_string(),
            command_timeout_ms: 10_000,
            include_source: true,
            max_ref_depth: DEFAULT_MAX_REF_DEPTH,
            diagnostic_history: 256,
            yield_message: None,
        }
    }
}

impl AgentConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_yield_message(mut self, message: impl Into<String>) -> Self {
        self.yield_message = Some(message.into());
        self
    }

    pub fn endpoint_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.endpoint)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AgentConfig =
            serde_json::from_str(r#"{ "command_timeout_ms": 250, "include_source": false }"#)
                .unwrap();

        assert_eq!(config.command_timeout(), Duration::from_millis(250));
        assert!(!config.include_source);
        assert_eq!(config.max_ref_depth, DEFAULT_MAX_REF_DEPTH);
        assert!(!config.session_id.is_empty());
        assert!(config.yield_message.is_none());
    }

    #[test]
    fn test_yield_message() {
        let config: AgentConfig =
            serde_json::from_str(r#"{ "yield_message": "{\"type\":\"yield\"}" }"#).unwrap();
        assert_eq!(config.yield_message.as_deref(), Some(r#"{"type":"yield"}"#));

        let config = AgentConfig::default().with_yield_message("ping");
        assert_eq!(config.yield_message.as_deref(), Some("ping"));
    }

    #[test]
    fn test_sessions_get_distinct_ids() {
        assert_ne!(AgentConfig::default().session_id, AgentConfig::default().session_id);
    }

    #[test]
    fn test_endpoint_url() {
        let config = AgentConfig::default().with_endpoint("ws://localhost:9229/debug");
        assert_eq!(config.endpoint_url().unwrap().port(), Some(9229));

        let bad = AgentConfig::default().with_endpoint("not a url");
        assert!(bad.endpoint_url().is_err());
    }
}
