//! Net Agent - resource registry for the inspected page
//!
//! One entry per HTTP request/response cycle, keyed by the backend's
//! identifier. Created on `willSendRequest`, finalized on
//! `didFinishLoading`/`didFailLoading`, wiped on `reset`.

use std::collections::HashMap;

use dashmap::DashMap;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Lifecycle step reported for a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourcePhase {
    WillSendRequest,
    DidReceiveResponse,
    DidReceiveContentLength,
    DidFinishLoading,
    DidFailLoading,
    LoadedFromMemoryCache,
}

impl ResourcePhase {
    /// Map a protocol event name to its phase
    pub fn from_event(name: &str) -> Option<Self> {
        match name {
            "willSendRequest" => Some(ResourcePhase::WillSendRequest),
            "didReceiveResponse" => Some(ResourcePhase::DidReceiveResponse),
            "didReceiveContentLength" => Some(ResourcePhase::DidReceiveContentLength),
            "didFinishLoading" => Some(ResourcePhase::DidFinishLoading),
            "didFailLoading" => Some(ResourcePhase::DidFailLoading),
            "didLoadResourceFromMemoryCache" => Some(ResourcePhase::LoadedFromMemoryCache),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourcePhase::WillSendRequest => "willSendRequest",
            ResourcePhase::DidReceiveResponse => "didReceiveResponse",
            ResourcePhase::DidReceiveContentLength => "didReceiveContentLength",
            ResourcePhase::DidFinishLoading => "didFinishLoading",
            ResourcePhase::DidFailLoading => "didFailLoading",
            ResourcePhase::LoadedFromMemoryCache => "didLoadResourceFromMemoryCache",
        }
    }
}

/// One HTTP request/response cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub identifier: String,
    pub url: String,
    pub document_url: Option<String>,
    pub main_resource: bool,
    pub request_method: String,
    pub request_headers: HashMap<String, String>,
    pub response_headers: HashMap<String, String>,
    pub status_code: Option<u16>,
    pub mime_type: Option<String>,
    pub expected_content_length: Option<i64>,
    pub content_length: u64,
    pub start_time: Option<f64>,
    pub response_received_time: Option<f64>,
    pub end_time: Option<f64>,
    pub finished: bool,
    pub failed: bool,
    pub cached: bool,
}

impl Resource {
    /// Host part of the URL, empty when it does not parse
    pub fn domain(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn last_path_component(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .unwrap_or_default()
    }

    /// Seconds from request start to the first response byte
    pub fn latency(&self) -> Option<f64> {
        Some(self.response_received_time? - self.start_time?)
    }

    /// Seconds from request start to completion
    pub fn duration(&self) -> Option<f64> {
        Some(self.end_time? - self.start_time?)
    }

    pub fn is_complete(&self) -> bool {
        self.finished || self.failed
    }
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("malformed {phase:?} payload: {source}")]
    Malformed {
        phase: ResourcePhase,
        #[source]
        source: serde_json::Error,
    },

    #[error("{phase:?} for unknown resource {identifier}")]
    Unknown {
        identifier: String,
        phase: ResourcePhase,
    },
}

fn identifier<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("invalid identifier: {}", other))),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WillSendRequest {
    #[serde(deserialize_with = "identifier")]
    pub identifier: String,
    pub url: String,
    #[serde(default, rename = "documentURL")]
    pub document_url: Option<String>,
    #[serde(default)]
    pub main_resource: bool,
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub request_headers: HashMap<String, String>,
    #[serde(default)]
    pub start_time: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidReceiveResponse {
    #[serde(deserialize_with = "identifier")]
    pub identifier: String,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub expected_content_length: Option<i64>,
    #[serde(default)]
    pub response_headers: HashMap<String, String>,
    #[serde(default)]
    pub response_received_time: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidReceiveContentLength {
    #[serde(deserialize_with = "identifier")]
    pub identifier: String,
    pub length_received: u64,
}

/// Payload of both `didFinishLoading` and `didFailLoading`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingEnded {
    #[serde(deserialize_with = "identifier")]
    pub identifier: String,
    #[serde(default)]
    pub finish_time: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedFromMemoryCache {
    #[serde(deserialize_with = "identifier")]
    pub identifier: String,
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub content_length: u64,
    #[serde(default)]
    pub time: Option<f64>,
}

/// All resources of the inspected page
pub struct NetAgent {
    resources: DashMap<String, Resource>,
}

impl NetAgent {
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
        }
    }

    /// Apply a lifecycle event body. Returns the updated resource.
    pub fn apply(&self, phase: ResourcePhase, body: &Value) -> Result<Resource, ResourceError> {
        fn parse<T: serde::de::DeserializeOwned>(
            phase: ResourcePhase,
            body: &Value,
        ) -> Result<T, ResourceError> {
            serde_json::from_value(body.clone())
                .map_err(|source| ResourceError::Malformed { phase, source })
        }

        match phase {
            ResourcePhase::WillSendRequest => Ok(self.will_send_request(parse(phase, body)?)),
            ResourcePhase::DidReceiveResponse => self.did_receive_response(parse(phase, body)?),
            ResourcePhase::DidReceiveContentLength => {
                self.did_receive_content_length(parse(phase, body)?)
            }
            ResourcePhase::DidFinishLoading => self.did_finish_loading(parse(phase, body)?),
            ResourcePhase::DidFailLoading => self.did_fail_loading(parse(phase, body)?),
            ResourcePhase::LoadedFromMemoryCache => {
                Ok(self.loaded_from_memory_cache(parse(phase, body)?))
            }
        }
    }

    /// Create a resource, or restart it on redirect
    pub fn will_send_request(&self, payload: WillSendRequest) -> Resource {
        let mut entry = self
            .resources
            .entry(payload.identifier.clone())
            .or_insert_with(|| Resource {
                identifier: payload.identifier.clone(),
                ..Resource::default()
            });

        let resource = entry.value_mut();
        if !resource.url.is_empty() {
            tracing::debug!(
                "[NetAgent] Redirect {}: {} -> {}",
                payload.identifier,
                resource.url,
                payload.url
            );
        }
        resource.url = payload.url;
        if payload.document_url.is_some() {
            resource.document_url = payload.document_url;
        }
        resource.main_resource |= payload.main_resource;
        resource.request_method = payload.http_method.unwrap_or_else(|| "GET".to_string());
        resource.request_headers = payload.request_headers;
        resource.start_time = payload.start_time;
        resource.response_received_time = None;
        resource.end_time = None;
        resource.clone()
    }

    pub fn did_receive_response(
        &self,
        payload: DidReceiveResponse,
    ) -> Result<Resource, ResourceError> {
        self.update(&payload.identifier, ResourcePhase::DidReceiveResponse, |r| {
            r.status_code = payload.status_code;
            r.mime_type = payload.mime_type;
            r.expected_content_length = payload.expected_content_length;
            r.response_headers = payload.response_headers;
            r.response_received_time = payload.response_received_time;
        })
    }

    pub fn did_receive_content_length(
        &self,
        payload: DidReceiveContentLength,
    ) -> Result<Resource, ResourceError> {
        self.update(
            &payload.identifier,
            ResourcePhase::DidReceiveContentLength,
            |r| r.content_length += payload.length_received,
        )
    }

    pub fn did_finish_loading(&self, payload: LoadingEnded) -> Result<Resource, ResourceError> {
        self.update(&payload.identifier, ResourcePhase::DidFinishLoading, |r| {
            r.finished = true;
            r.end_time = payload.finish_time;
        })
    }

    pub fn did_fail_loading(&self, payload: LoadingEnded) -> Result<Resource, ResourceError> {
        self.update(&payload.identifier, ResourcePhase::DidFailLoading, |r| {
            r.failed = true;
            r.end_time = payload.finish_time;
        })
    }

    pub fn loaded_from_memory_cache(&self, payload: LoadedFromMemoryCache) -> Resource {
        let resource = Resource {
            identifier: payload.identifier.clone(),
            url: payload.url,
            request_method: "GET".to_string(),
            status_code: payload.status_code,
            mime_type: payload.mime_type,
            content_length: payload.content_length,
            start_time: payload.time,
            response_received_time: payload.time,
            end_time: payload.time,
            finished: true,
            cached: true,
            ..Resource::default()
        };
        self.resources.insert(payload.identifier, resource.clone());
        resource
    }

    fn update(
        &self,
        identifier: &str,
        phase: ResourcePhase,
        apply: impl FnOnce(&mut Resource),
    ) -> Result<Resource, ResourceError> {
        let mut entry = self
            .resources
            .get_mut(identifier)
            .ok_or_else(|| ResourceError::Unknown {
                identifier: identifier.to_string(),
                phase,
            })?;
        apply(entry.value_mut());
        Ok(entry.value().clone())
    }

    pub fn get(&self, identifier: &str) -> Option<Resource> {
        self.resources.get(identifier).map(|r| r.value().clone())
    }

    /// All resources, ordered by start time
    pub fn all(&self) -> Vec<Resource> {
        let mut resources: Vec<_> = self.resources.iter().map(|r| r.value().clone()).collect();
        resources.sort_by(|a, b| {
            a.start_time
                .unwrap_or(f64::MAX)
                .total_cmp(&b.start_time.unwrap_or(f64::MAX))
                .then_with(|| a.identifier.cmp(&b.identifier))
        });
        resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Drop everything (navigation)
    pub fn reset(&self) {
        self.resources.clear();
    }
}

impl Default for NetAgent {
    fn default() -> Self {
        Self::new()
    }
}
