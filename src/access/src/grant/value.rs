//! Canonical grant values
//!
//! Backing stores hand grant flags over in whatever shape the row happened
//! to be written with. [`GrantValue::normalize`] is the only place those
//! shapes are interpreted:
//!
//! | raw                                                        | value       |
//! |------------------------------------------------------------|-------------|
//! | `true`, `1`, `"1"`, `"yes"`, `"y"`, `"true"`                | Granted     |
//! | `false`, `0`, `"0"`, `"no"`, `"n"`, `"false"`, `""`, `null` | Denied      |
//! | absent, any other number/string, arrays, objects           | Unspecified |
//!
//! Strings are trimmed and compared ignoring ASCII case. `Unspecified`
//! never authorizes; [`GrantValue::canonical`] collapses it to `Denied`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tri-state grant value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantValue {
    /// Explicitly granted
    Granted,
    /// Explicitly denied (or revoked)
    Denied,
    /// Missing or unparseable
    Unspecified,
}

impl GrantValue {
    /// Normalize a raw backing-store value; `None` means the field was absent
    pub fn normalize(raw: Option<&Value>) -> Self {
        match raw {
            None => Self::Unspecified,
            Some(Value::Null) => Self::Denied,
            Some(Value::Bool(true)) => Self::Granted,
            Some(Value::Bool(false)) => Self::Denied,
            Some(Value::Number(n)) => match n.as_f64() {
                Some(x) if x == 1.0 => Self::Granted,
                Some(x) if x == 0.0 => Self::Denied,
                _ => Self::Unspecified,
            },
            Some(Value::String(s)) => Self::from_text(s),
            Some(Value::Array(_)) | Some(Value::Object(_)) => Self::Unspecified,
        }
    }

    /// Normalize a textual flag (the string column case)
    pub fn from_text(raw: &str) -> Self {
        let text = raw.trim();
        if text.is_empty() {
            return Self::Denied;
        }

        match text.to_ascii_lowercase().as_str() {
            "1" | "yes" | "y" | "true" => Self::Granted,
            "0" | "no" | "n" | "false" => Self::Denied,
            _ => Self::Unspecified,
        }
    }

    /// Collapse to the two values decisions are made on
    pub fn canonical(self) -> Self {
        match self {
            Self::Granted => Self::Granted,
            Self::Denied | Self::Unspecified => Self::Denied,
        }
    }

    /// Whether this value authorizes access
    pub fn is_granted(self) -> bool {
        self == Self::Granted
    }
}

impl From<bool> for GrantValue {
    fn from(granted: bool) -> Self {
        if granted {
            Self::Granted
        } else {
            Self::Denied
        }
    }
}
