//! Claims of a validated token.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// Claims extracted from a token that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    /// `sub`, if present.
    pub subject: Option<String>,
    /// `iss`.
    pub issuer: String,
    /// `aud`, normalised to a list.
    pub audience: Vec<String>,
    /// `exp`.
    pub expires_at: DateTime<Utc>,
    raw: Map<String, Value>,
}

impl Claims {
    /// Build from a decoded claim set. Returns `None` if `iss` or `exp` is missing.
    pub fn from_map(raw: Map<String, Value>) -> Option<Self> {
        let issuer = raw.get("iss")?.as_str()?.to_string();
        let exp = raw.get("exp")?.as_i64()?;
        let expires_at = Utc.timestamp_opt(exp, 0).single()?;

        let audience = match raw.get("aud") {
            Some(Value::String(aud)) => vec![aud.clone()],
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        };

        Some(Self {
            subject: raw.get("sub").and_then(Value::as_str).map(String::from),
            issuer,
            audience,
            expires_at,
            raw,
        })
    }

    /// Raw claim value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }

    /// Whether `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.raw.contains_key(name)
    }

    /// Roles held in claim `name`, which may be a string or an array of strings.
    pub fn roles(&self, name: &str) -> Vec<String> {
        match self.raw.get(name) {
            Some(Value::String(role)) if !role.trim().is_empty() => vec![role.clone()],
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(Value::as_str)
                .filter(|r| !r.trim().is_empty())
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        }
    }
}
