use crate::config::GlobalProbeSet;
use crate::flatten::{FlatMap, flatten};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single analysis request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub url: String,
}

impl AnalysisRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Which representations of a JSON body are kept on a captured response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyShape {
    pub flatten: bool,
    pub include_raw: bool,
}

/// A JSON network response observed during the page's lifetime
///
/// Serialized as `{url, status, flattened, raw?}` when flattening is enabled,
/// or `{url, status, body}` when only the raw body is kept.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CapturedResponse {
    pub url: String,
    pub status: u16,
    #[serde(default, rename = "flattened")]
    pub flattened_body: Option<FlatMap>,
    #[serde(default, rename = "raw", alias = "body", deserialize_with = "probed")]
    pub raw_body: Option<Value>,
}

impl CapturedResponse {
    /// Build a captured response from a parsed body
    ///
    /// Without flattening the raw body is always kept, so a response never
    /// ends up with no payload at all.
    pub fn from_body(url: String, status: u16, body: Value, shape: BodyShape) -> Self {
        let flattened_body = shape.flatten.then(|| flatten(&body, ""));
        let raw_body = (shape.include_raw || !shape.flatten).then_some(body);
        Self {
            url,
            status,
            flattened_body,
            raw_body,
        }
    }
}

impl Serialize for CapturedResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("url", &self.url)?;
        map.serialize_entry("status", &self.status)?;
        match (&self.flattened_body, &self.raw_body) {
            (Some(flat), raw) => {
                map.serialize_entry("flattened", flat)?;
                if let Some(raw) = raw {
                    map.serialize_entry("raw", raw)?;
                }
            }
            (None, Some(raw)) => map.serialize_entry("body", raw)?,
            (None, None) => {}
        }
        map.end()
    }
}

/// Click metadata reported by the in-page listener
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapturedClickEvent {
    pub tag: String,
    pub id: String,
    pub class: String,
    pub text: String,
    pub dataset: BTreeMap<String, String>,
}

/// Well-known page globals read once after navigation settles
///
/// The probed globals distinguish "not probed" (`None`, omitted from JSON)
/// from "probed but undefined" (`Some(Value::Null)`, serialized as `null`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSnapshot {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "probed")]
    pub user: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "probed")]
    pub data_layer: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "probed")]
    pub analytics_meta: Option<Value>,
}

impl GlobalSnapshot {
    /// Snapshot used when the page could not be probed at all
    ///
    /// Every global in `probes` is reported as `null`, the same as if the page
    /// never defined it.
    pub fn unavailable(location: &str, probes: GlobalProbeSet) -> Self {
        let full = probes == GlobalProbeSet::Full;
        Self {
            title: String::new(),
            location: location.to_string(),
            user: full.then_some(Value::Null),
            data_layer: Some(Value::Null),
            analytics_meta: full.then_some(Value::Null),
        }
    }
}

// A present key, even `null`, means the value was there.
fn probed<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// How the navigation wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationStatus {
    Settled,
    TimedOut,
}

/// Optional navigation annotation on a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationSummary {
    pub outcome: NavigationStatus,
    pub elapsed_ms: u64,
}

/// The analysis result for one URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub url_analyzed: String,
    pub globals: GlobalSnapshot,
    pub api_responses: Vec<CapturedResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_events: Option<Vec<CapturedClickEvent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation: Option<NavigationSummary>,
}
