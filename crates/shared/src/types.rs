//! Common types used across the assist relay

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::AssistError;

// =============================================================================
// ID Wrappers
// =============================================================================

/// Connection ID wrapper, assigned once per accepted socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ConnectionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Which side of an assist call a connection belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End-user browser tab
    Session,
    /// Support agent
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Session => "session",
            Role::Agent => "agent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AssistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session" => Ok(Role::Session),
            "agent" => Ok(Role::Agent),
            other => Err(AssistError::UnknownIdentity(other.to_string())),
        }
    }
}

// =============================================================================
// Session Info
// =============================================================================

/// Free-form attributes describing a live session (user, device, page ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionInfo(pub Map<String, Value>);

impl SessionInfo {
    /// Key used to deduplicate tabs of the same logical session
    pub const SESSION_ID_KEY: &'static str = "sessionID";
    pub const TAB_ID_KEY: &'static str = "tabId";
    pub const USER_AGENT_KEY: &'static str = "userAgent";

    /// Parse the handshake representation. Anything that is not a JSON object
    /// yields `None`.
    pub fn from_json_str(raw: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set `key` only when it is not already present
    pub fn insert_default(&mut self, key: &str, value: Value) {
        self.0.entry(key.to_string()).or_insert(value);
    }

    pub fn session_id(&self) -> Option<String> {
        match self.0.get(Self::SESSION_ID_KEY)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Shallow merge of `data` followed by the originating tab id.
    ///
    /// Only object payloads contribute keys. The tab id is always stamped,
    /// verbatim when given and `null` when the update did not name one.
    pub fn merge(&mut self, data: Option<&Value>, tab_id: Option<&Value>) {
        if let Some(Value::Object(fields)) = data {
            for (key, value) in fields {
                self.0.insert(key.clone(), value.clone());
            }
        }
        let tab = tab_id.cloned().unwrap_or(Value::Null);
        self.0.insert(Self::TAB_ID_KEY.to_string(), tab);
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}
