use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ============================================================================
// Trip Share Models
// ============================================================================

/// Level of access a share grant confers. Ownership is not a stored level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[default]
    ReadWrite,
}

impl AccessLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::ReadWrite => "read_write",
        }
    }

    /// Convert from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "read_write" => Some(AccessLevel::ReadWrite),
            _ => None,
        }
    }
}

impl TryFrom<&str> for AccessLevel {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value).ok_or_else(|| format!("Invalid access level: {}", value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareGrant {
    pub trip_id: String,
    pub account_id: String,
    pub access_level: AccessLevel,
    pub created_at: NaiveDateTime,
}
