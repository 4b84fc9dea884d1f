//! # Provider Registry Models
//!
//! External text-generation providers and their credentials. A provider can
//! be registered without an active credential; the resolver treats that as
//! "unavailable" and falls back rather than failing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire protocol spoken by a provider endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderProtocol {
    /// OpenAI chat-completions with bearer authentication.
    OpenAiChat,
    /// Messages API authenticated with an `x-api-key` header.
    AnthropicMessages,
    /// `generateContent` API authenticated with a `key` query parameter.
    GoogleGenerative,
    /// OpenAI-compatible reseller (bearer auth plus attribution headers).
    OpenAiCompatible,
}

impl fmt::Display for ProviderProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAiChat => write!(f, "open_ai_chat"),
            Self::AnthropicMessages => write!(f, "anthropic_messages"),
            Self::GoogleGenerative => write!(f, "google_generative"),
            Self::OpenAiCompatible => write!(f, "open_ai_compatible"),
        }
    }
}

impl std::str::FromStr for ProviderProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open_ai_chat" => Ok(Self::OpenAiChat),
            "anthropic_messages" => Ok(Self::AnthropicMessages),
            "google_generative" => Ok(Self::GoogleGenerative),
            "open_ai_compatible" => Ok(Self::OpenAiCompatible),
            _ => Err(format!("Invalid provider protocol: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub provider_id: String,
    pub name: String,
    pub protocol: ProviderProtocol,
    pub base_url: String,
    pub default_model: String,
    /// Lower values are preferred when falling back.
    pub priority: i32,
    pub is_active: bool,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCredential {
    pub provider_id: String,
    pub api_key: String,
    pub is_active: bool,
}

impl fmt::Debug for ProviderCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredential")
            .field("provider_id", &self.provider_id)
            .field("api_key", &"[REDACTED]")
            .field("is_active", &self.is_active)
            .finish()
    }
}
