use serde::{Deserialize, Serialize};

/// Session key holding the logged-in user's id.
pub const CURR_USER_KEY: &str = "curr_user";

/// Name of the signed session cookie.
pub const SESSION_COOKIE: &str = "session";

pub const SESSION_LIFETIME_DAYS: i64 = 31;

/// Claims carried by the signed session cookie.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// Serialized under [`CURR_USER_KEY`].
    #[serde(rename = "curr_user", default, skip_serializing_if = "Option::is_none")]
    pub curr_user: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flashes: Vec<Flash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
    pub exp: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlashCategory {
    Success,
    Info,
    Warning,
    Danger,
}

impl FlashCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FlashCategory::Success => "success",
            FlashCategory::Info => "info",
            FlashCategory::Warning => "warning",
            FlashCategory::Danger => "danger",
        }
    }
}

/// One-shot notice shown on the next rendered page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flash {
    pub category: FlashCategory,
    pub message: String,
}
