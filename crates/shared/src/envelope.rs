//! Event envelope
//!
//! Application events travel as `{ meta: { tabId, version }, data }`. Older
//! trackers send the bare payload; those are represented as
//! [`Envelope::Legacy`] until [`Envelope::normalize`] wraps them. Wrapped
//! payloads are kept exactly as received.

use serde_json::{json, Value};

/// Version stamped on envelopes synthesized for legacy payloads
pub const LEGACY_VERSION: u64 = 1;

/// Raw `meta.tabId` of a payload, if the key is present.
///
/// A missing or null `meta` counts as absent. A present `tabId` is returned
/// as-is, whatever its type.
pub fn meta_tab_id(payload: &Value) -> Option<&Value> {
    payload.get("meta")?.get("tabId")
}

/// Envelope metadata used for addressing and stamping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    pub tab_id: Option<Value>,
    pub version: Option<Value>,
}

impl Meta {
    pub fn legacy(tab_id: &str) -> Self {
        Self {
            tab_id: Some(Value::String(tab_id.to_string())),
            version: Some(Value::from(LEGACY_VERSION)),
        }
    }

    fn from_payload(payload: &Value) -> Self {
        Self {
            tab_id: meta_tab_id(payload).cloned(),
            version: payload
                .get("meta")
                .and_then(|meta| meta.get("version"))
                .cloned(),
        }
    }

    fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        if let Some(tab) = &self.tab_id {
            map.insert("tabId".to_string(), tab.clone());
        }
        if let Some(version) = &self.version {
            map.insert("version".to_string(), version.clone());
        }
        Value::Object(map)
    }
}

/// Inbound payload, either already wrapped or a legacy bare payload
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Legacy(Value),
    Wrapped {
        meta: Meta,
        /// Payload as it goes out on the wire
        raw: Value,
    },
}

impl Envelope {
    /// Classify a raw payload. Anything carrying a `meta` key counts as wrapped.
    pub fn from_payload(payload: Value) -> Self {
        let wrapped = payload
            .as_object()
            .is_some_and(|map| map.contains_key("meta"));
        if wrapped {
            Envelope::Wrapped {
                meta: Meta::from_payload(&payload),
                raw: payload,
            }
        } else {
            Envelope::Legacy(payload)
        }
    }

    /// Canonical wrapped form, synthesizing meta for legacy payloads
    pub fn normalize(self, own_tab_id: &str) -> Self {
        match self {
            Envelope::Legacy(data) => {
                let meta = Meta::legacy(own_tab_id);
                let raw = json!({ "meta": meta.to_value(), "data": data });
                Envelope::Wrapped { meta, raw }
            }
            wrapped => wrapped,
        }
    }

    /// Raw `meta.tabId`, if the envelope carries one
    pub fn tab_id(&self) -> Option<&Value> {
        match self {
            Envelope::Wrapped { meta, .. } => meta.tab_id.as_ref(),
            Envelope::Legacy(_) => None,
        }
    }

    /// Application payload; `None` when a wrapped payload has no `data` key
    pub fn data(&self) -> Option<&Value> {
        match self {
            Envelope::Wrapped { raw, .. } => raw.get("data"),
            Envelope::Legacy(payload) => Some(payload),
        }
    }

    /// Wire representation
    pub fn to_value(&self) -> Value {
        match self {
            Envelope::Legacy(payload) => payload.clone(),
            Envelope::Wrapped { raw, .. } => raw.clone(),
        }
    }
}
